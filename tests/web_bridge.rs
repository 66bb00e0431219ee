use form_rules_dom::{
	adapter::{FieldHandle, FormFactory, FunctionRegistrar, SubmitHandler},
	bootstrap::Bridge,
	config::Config,
	js::AfbRuntime,
	model::ModelEvent,
	registry::{SubscriptionCallback, SubscriptionPhase},
	Error, LocalBoxFuture, Result,
};
use js_sys::{Array, Function, Reflect, JSON};
use serde_json::{json, Value};
use std::{cell::RefCell, rc::Rc};
use wasm_bindgen::{JsCast, JsValue};
use wasm_bindgen_test::{wasm_bindgen_test, wasm_bindgen_test_configure};
use web_sys::{Element, Event, EventInit, HtmlInputElement};

mod web_model_;
use web_model_::{field_change, mount, Call, MockRuntime, Mounted, RecordingRenderer};

wasm_bindgen_test_configure!(run_in_browser);

const FORM: &str = r#"<div data-id="f1" class="form-root">
	<div class="field-wrapper" data-id="name"><input id="name" type="text"></div>
	<div class="field-wrapper" data-id="rating"><input id="rating" type="text"></div>
</div>"#;

fn root(mounted: &Mounted) -> Element {
	mounted.0.query_selector("[data-id=f1]").unwrap().unwrap()
}

fn name_input(mounted: &Mounted) -> HtmlInputElement {
	mounted.0.query_selector("#name").unwrap().unwrap().dyn_into().unwrap()
}

fn wire(bridge: &Bridge, mounted: &Mounted) -> Result<()> {
	bridge.wire(&json!({ "id": "f1" }), &root(mounted), None, Rc::new(RecordingRenderer::default()), None).map(drop)
}

fn name_value(value: &str) -> ModelEvent {
	ModelEvent::FieldChanged(field_change(json!({ "id": "name", "fieldType": "text-input" }), "value", json!(value), json!(null)))
}

type Seen = Rc<RefCell<Vec<(String, Option<String>, SubscriptionPhase)>>>;

fn recording_callback(seen: &Seen) -> SubscriptionCallback {
	let seen = Rc::clone(seen);
	Rc::new(move |field_div: &Element, element: Option<Rc<dyn FieldHandle>>, phase: SubscriptionPhase| {
		seen.borrow_mut().push((field_div.get_attribute("data-id").unwrap(), element.map(|element| element.id()), phase));
	})
}

#[wasm_bindgen_test]
fn subscriptions_fire_on_every_restore() {
	let mounted = mount(FORM);
	let runtime = MockRuntime::new(&["name"]);
	let bridge = Bridge::new(Config::default(), runtime.clone());
	let seen = Seen::default();

	let name = mounted.0.query_selector("[data-id=name]").unwrap().unwrap();
	let rating = mounted.0.query_selector("[data-id=rating]").unwrap().unwrap();
	bridge.subscribe(&name, "f1", recording_callback(&seen));
	bridge.subscribe(&rating, "f1", recording_callback(&seen));
	bridge.subscribe(&name, "other", recording_callback(&seen));
	assert!(seen.borrow().is_empty());

	wire(&bridge, &mounted).unwrap();
	wire(&bridge, &mounted).unwrap();

	let once = [
		("name".to_owned(), Some("name".to_owned()), SubscriptionPhase::Register),
		("rating".to_owned(), None, SubscriptionPhase::Register),
	];
	assert_eq!(*seen.borrow(), [once.clone(), once].concat());
}

#[wasm_bindgen_test]
fn resubscribing_replaces_and_bare_elements_are_ignored() {
	let mounted = mount(FORM);
	let bridge = Bridge::new(Config::default(), MockRuntime::new(&["name"]));
	let first = Seen::default();
	let second = Seen::default();

	let name = mounted.0.query_selector("[data-id=name]").unwrap().unwrap();
	bridge.subscribe(&name, "f1", recording_callback(&first));
	bridge.subscribe(&name, "f1", recording_callback(&second));
	bridge.subscribe(&name_input(&mounted), "f1", recording_callback(&first));
	assert_eq!(bridge.registry().subscription_count("f1"), 1);

	wire(&bridge, &mounted).unwrap();

	assert!(first.borrow().is_empty());
	assert_eq!(second.borrow().len(), 1);
}

#[wasm_bindgen_test]
fn callbacks_may_subscribe_while_notified() {
	let mounted = mount(FORM);
	let bridge = Rc::new(Bridge::new(Config::default(), MockRuntime::new(&["name"])));
	let rating = mounted.0.query_selector("[data-id=rating]").unwrap().unwrap();
	let seen = Seen::default();

	let callback: SubscriptionCallback = {
		let bridge = Rc::downgrade(&bridge);
		let seen = Rc::clone(&seen);
		Rc::new(move |_: &Element, _: Option<Rc<dyn FieldHandle>>, _: SubscriptionPhase| {
			if let Some(bridge) = bridge.upgrade() {
				bridge.subscribe(&rating, "f1", recording_callback(&seen));
			}
		})
	};
	let name = mounted.0.query_selector("[data-id=name]").unwrap().unwrap();
	bridge.subscribe(&name, "f1", callback);

	wire(&bridge, &mounted).unwrap();
	assert_eq!(bridge.registry().subscription_count("f1"), 2);
	wire(&bridge, &mounted).unwrap();
	assert_eq!(seen.borrow().len(), 1);
}

#[wasm_bindgen_test]
fn model_changes_reach_the_dom() {
	let mounted = mount(FORM);
	let runtime = MockRuntime::new(&["name"]);
	let bridge = Bridge::new(Config::default(), runtime.clone());

	wire(&bridge, &mounted).unwrap();
	runtime.latest().emit(name_value("Ada"));

	assert_eq!(name_input(&mounted).value(), "Ada");
	assert_eq!(bridge.generation(), 1);
}

#[wasm_bindgen_test]
fn superseded_models_are_ignored() {
	let mounted = mount(FORM);
	let runtime = MockRuntime::new(&["name"]);
	let bridge = Bridge::new(Config::default(), runtime.clone());

	wire(&bridge, &mounted).unwrap();
	let stale = runtime.latest();
	wire(&bridge, &mounted).unwrap();
	let current = runtime.latest();
	assert_eq!(bridge.generation(), 2);
	assert_eq!(runtime.live_forms(), 1);

	stale.emit(name_value("stale"));
	assert_eq!(name_input(&mounted).value(), "");
	current.emit(name_value("current"));
	assert_eq!(name_input(&mounted).value(), "current");

	let input = name_input(&mounted);
	input.set_value("typed");
	let init = EventInit::new();
	init.set_bubbles(true);
	input.dispatch_event(&Event::new_with_event_init_dict("change", &init).unwrap()).unwrap();
	assert!(stale.calls().is_empty());
	assert_eq!(current.calls(), [Call::SetValue("name".to_owned(), Some(json!("typed")))]);
}

/// A JavaScript rule engine runtime that records every engine it restores, in `engines`.
/// Each engine emits `{ type, payload }` actions to its subscribers through `emit(type, payload)`.
const SCRIPTED_RUNTIME: &str = r#"
	const engines = [];
	return {
		engines,
		restoreFormInstance() {
			const handlers = {};
			const engine = {
				getElement() {},
				subscribe(handler, type) {
					(handlers[type] = handlers[type] || []).push(handler);
				},
				emit(type, payload) {
					for (const handler of handlers[type] || []) {
						handler({ type, payload });
					}
				},
			};
			engines.push(engine);
			return engine;
		},
	};
"#;

#[wasm_bindgen_test]
fn superseded_engines_may_keep_emitting() {
	let mounted = mount(FORM);
	let runtime = Function::new_no_args(SCRIPTED_RUNTIME).call0(&JsValue::NULL).unwrap();
	let bridge = Bridge::new(Config::default(), Rc::new(runtime.clone().unchecked_into::<AfbRuntime>()));

	wire(&bridge, &mounted).unwrap();
	wire(&bridge, &mounted).unwrap();

	let engines: Array = Reflect::get(&runtime, &JsValue::from_str("engines")).unwrap().dyn_into().unwrap();
	assert_eq!(engines.length(), 2);
	let emit_value = |engine: u32, value: &str| {
		let engine = engines.get(engine);
		let emit: Function = Reflect::get(&engine, &JsValue::from_str("emit")).unwrap().dyn_into().unwrap();
		let payload = json!({
			"field": { "id": "name", "fieldType": "text-input" },
			"changes": [{ "propertyName": "value", "currentValue": value, "prevValue": null }],
		});
		let payload = JSON::parse(&payload.to_string()).unwrap();
		emit.call2(&engine, &JsValue::from_str("fieldChanged"), &payload)
	};

	assert!(emit_value(0, "stale").is_ok());
	assert_eq!(name_input(&mounted).value(), "");
	assert!(emit_value(1, "current").is_ok());
	assert_eq!(name_input(&mounted).value(), "current");
}

#[wasm_bindgen_test]
fn failed_restore_keeps_previous_wiring() {
	let mounted = mount(FORM);
	let runtime = MockRuntime::new(&["name"]);
	let bridge = Bridge::new(Config::default(), runtime.clone());

	wire(&bridge, &mounted).unwrap();
	runtime.reject.set(true);
	assert!(matches!(wire(&bridge, &mounted), Err(Error::Restore(_))));

	assert_eq!(bridge.generation(), 1);
	runtime.latest().emit(name_value("still wired"));
	assert_eq!(name_input(&mounted).value(), "still wired");
}

#[derive(Default)]
struct RecordingSubmitHandler {
	outcomes: RefCell<Vec<(&'static str, Value)>>,
}

impl SubmitHandler for RecordingSubmitHandler {
	fn submit_success(&self, payload: &Value, _: &Element) {
		self.outcomes.borrow_mut().push(("success", payload.clone()));
	}

	fn submit_failure(&self, payload: &Value, _: &Element) {
		self.outcomes.borrow_mut().push(("failure", payload.clone()));
	}
}

#[wasm_bindgen_test]
fn submit_outcomes_reach_the_handler() {
	let mounted = mount(FORM);
	let runtime = MockRuntime::new(&["name"]);
	let handler = Rc::new(RecordingSubmitHandler::default());
	let bridge = Bridge::new(Config::default(), runtime.clone()).with_submit_handler(handler.clone());

	wire(&bridge, &mounted).unwrap();
	let form = runtime.latest();
	form.emit(ModelEvent::SubmitSuccess(json!({ "thankYouMessage": "Thanks" })));
	form.emit(ModelEvent::SubmitError(json!({ "status": 502 })));

	assert_eq!(
		*handler.outcomes.borrow(),
		[("success", json!({ "thankYouMessage": "Thanks" })), ("failure", json!({ "status": 502 }))]
	);
}

struct FailingRegistrar {
	calls: RefCell<Vec<(Option<String>, Option<String>)>>,
}

impl FunctionRegistrar for FailingRegistrar {
	fn register(&self, functions_path: Option<&str>, code_base_path: Option<&str>) -> LocalBoxFuture<'_, Result<()>> {
		self.calls.borrow_mut().push((functions_path.map(str::to_owned), code_base_path.map(str::to_owned)));
		Box::pin(async { Err(Error::Js("module not found".to_owned())) })
	}
}

struct EchoFactory;

impl FormFactory for EchoFactory {
	type Form = Value;

	fn create_form(&self, definition: Value) -> LocalBoxFuture<'_, Result<Value>> {
		Box::pin(async move { Ok(definition) })
	}
}

#[wasm_bindgen_test]
async fn initialize_survives_missing_data_and_functions() {
	let config = Config {
		data_endpoint: "/no-such-endpoint/".to_owned(),
		code_base_path: Some("/scripts".to_owned()),
		..Config::default()
	};
	let bridge = Bridge::new(config, MockRuntime::new(&[]));
	let registrar = FailingRegistrar { calls: RefCell::default() };

	let definition = json!({ "id": "f1", "properties": { "customFunctionsPath": "/functions.js" } });
	let form = bridge.initialize(definition, &registrar, &EchoFactory).await.unwrap();

	assert_eq!(form, json!({ "id": "f1", "properties": { "customFunctionsPath": "/functions.js" }, "data": null }));
	assert_eq!(*registrar.calls.borrow(), [(Some("/functions.js".to_owned()), Some("/scripts".to_owned()))]);
}
