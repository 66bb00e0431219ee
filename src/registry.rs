//! Late-bound observers of model elements.
//!
//! Custom components rendered before the model exists register here,
//! and receive their model element each time a model is restored for their form.

use crate::adapter::{FieldHandle, FormInstance};
use hashbrown::HashMap;
use std::{cell::RefCell, rc::Rc};
use tracing::{instrument, trace, warn};
use web_sys::Element;

/// Why a subscription callback is invoked.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubscriptionPhase {
	/// A model was restored, and this is the field's (possibly absent) element in it.
	Register,
}

impl SubscriptionPhase {
	#[must_use]
	pub fn as_str(self) -> &'static str {
		match self {
			Self::Register => "register",
		}
	}
}

pub type SubscriptionCallback = Rc<dyn Fn(&Element, Option<Rc<dyn FieldHandle>>, SubscriptionPhase)>;

#[derive(Clone)]
struct Subscription {
	field_id: String,
	field_div: Element,
	callback: SubscriptionCallback,
}

/// Form instance id → field id → callback, in registration order per form.
///
/// Entries are never removed. Every restoration of a form's model re-invokes all of that form's callbacks.
///
/// Callbacks may subscribe again while being notified.
#[derive(Default)]
pub struct SubscriptionRegistry {
	forms: RefCell<HashMap<String, Vec<Subscription>>>,
}

impl SubscriptionRegistry {
	#[must_use]
	pub fn new() -> Self {
		Self::default()
	}

	/// Records `callback` for the field `field_div` stands for (by its `data-id`).
	///
	/// A second subscription for the same field replaces the first in place.
	#[instrument(skip(self, field_div, callback))]
	pub fn subscribe(&self, field_div: &Element, form_id: &str, callback: SubscriptionCallback) {
		let field_id = match field_div.get_attribute("data-id") {
			Some(field_id) => field_id,
			None => return warn!("Ignoring subscription for an element without `data-id`."),
		};

		let mut forms = self.forms.borrow_mut();
		let subscriptions = forms.entry_ref(form_id).or_default();
		let subscription = Subscription { field_id, field_div: field_div.clone(), callback };
		match subscriptions.iter_mut().find(|existing| existing.field_id == subscription.field_id) {
			Some(existing) => *existing = subscription,
			None => subscriptions.push(subscription),
		}
	}

	/// Hands each field subscribed under `form_id` its element in the freshly restored `instance`.
	#[instrument(skip(self, instance))]
	pub fn notify_on_restore(&self, form_id: &str, instance: &dyn FormInstance) {
		let subscriptions = match self.forms.borrow().get(form_id) {
			Some(subscriptions) => subscriptions.clone(),
			None => return trace!("No subscriptions."),
		};

		for Subscription { field_id, field_div, callback } in subscriptions {
			let element = instance.get_element(&field_id);
			if element.is_none() {
				trace!("No model element {:?} for subscribed field.", field_id);
			}
			callback(&field_div, element, SubscriptionPhase::Register);
		}
	}

	#[must_use]
	pub fn subscription_count(&self, form_id: &str) -> usize {
		self.forms.borrow().get(form_id).map_or(0, Vec::len)
	}
}
