#![doc(html_root_url = "https://docs.rs/form-rules-dom/0.1.0")]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

//! Two-way binding between a rendered adaptive form and its rule engine model.
//!
//! Model changes are projected onto the DOM by [`projector::ChangeProjector`],
//! user input is fed back into the model by [`capture::EventCapture`],
//! and [`bootstrap::Bridge`] wires both onto a restored model instance.
//!
//! The rule engine itself stays external: see [`adapter`] for the boundary and [`js`] for its JavaScript bindings.

#[cfg(doctest)]
pub mod readme {
	doc_comment::doctest!("../README.md");
}

pub mod adapter;
pub mod bootstrap;
pub mod capture;
pub mod compare;
pub mod config;
pub mod dom;
pub mod error;
pub mod js;
mod log;
pub mod model;
pub mod projector;
pub mod registry;

pub use error::{Error, Result};

use core::{future::Future, pin::Pin};

/// A boxed, thread-bound future, as returned by the asynchronous collaborator traits.
pub type LocalBoxFuture<'a, T> = Pin<Box<dyn 'a + Future<Output = T>>>;
