//! End-to-end dynamic value behavior: a component definition with mixed
//! static and dynamic entries, mounted against a live store.

use std::rc::Rc;

use pforge_components::{BindingDefinition, ComponentValueListener, DynamicValueWatcher};
use pforge_datasources::{DataSourceStore, ValueMap};
use serde_json::{Value, json};

fn mapping(raw: Value) -> ValueMap {
    raw.as_object().expect("object literal").clone()
}

fn store_with_record() -> DataSourceStore {
    let store = DataSourceStore::new();
    store
        .add_source("ds_id", vec![mapping(json!({ "id": "id1", "value": "test-value" }))])
        .unwrap();
    store
}

fn change_value(store: &DataSourceStore) {
    store
        .get("ds_id")
        .unwrap()
        .get_record("id1")
        .unwrap()
        .set("value", json!("changed-value"));
}

fn dynamic_attribute() -> Value {
    json!({
        "kind": "datasource-reference",
        "defaultValue": "default",
        "path": "ds_id.id1.value",
    })
}

#[test]
fn static_and_dynamic_attributes_resolve_together() {
    let store = store_with_record();
    let definition = mapping(json!({
        "tagName": "input",
        "attributes": {
            "staticAttribute": "some title",
            "dynamicAttribute": dynamic_attribute(),
        },
    }));

    let (component, _listener) = ComponentValueListener::attach(&store, &definition);
    assert_eq!(
        component.attribute("dynamicAttribute"),
        Some(json!("test-value"))
    );
    assert_eq!(
        component.attribute("staticAttribute"),
        Some(json!("some title"))
    );
}

#[test]
fn dynamic_attributes_listen_to_change() {
    let store = store_with_record();
    let definition = mapping(json!({
        "tagName": "input",
        "attributes": { "dynamicAttribute": dynamic_attribute() },
    }));
    let (component, _listener) = ComponentValueListener::attach(&store, &definition);

    change_value(&store);
    assert_eq!(
        component.attribute("dynamicAttribute"),
        Some(json!("changed-value"))
    );
}

#[test]
fn rebinding_listens_to_the_latest_target_only() {
    let store = store_with_record();
    store
        .get("ds_id")
        .unwrap()
        .add_record(mapping(json!({ "id": "id2", "value": "second-value" })))
        .unwrap();

    let definition = mapping(json!({
        "attributes": { "dynamicAttribute": dynamic_attribute() },
    }));
    let (component, mut listener) = ComponentValueListener::attach(&store, &definition);

    // Rebind the same attribute to another record.
    listener.set_attributes(&mapping(json!({
        "dynamicAttribute": {
            "kind": "datasource-reference",
            "defaultValue": "default",
            "path": "ds_id.id2.value",
        },
    })));
    assert_eq!(
        component.attribute("dynamicAttribute"),
        Some(json!("second-value"))
    );

    // The old record no longer drives the attribute.
    change_value(&store);
    assert_eq!(
        component.attribute("dynamicAttribute"),
        Some(json!("second-value"))
    );

    store
        .get("ds_id")
        .unwrap()
        .get_record("id2")
        .unwrap()
        .set("value", json!("latest"));
    assert_eq!(component.attribute("dynamicAttribute"), Some(json!("latest")));
}

#[test]
fn replacing_with_a_static_value_stops_listening() {
    let store = store_with_record();
    let definition = mapping(json!({
        "attributes": { "dynamicAttribute": dynamic_attribute() },
    }));
    let (component, mut listener) = ComponentValueListener::attach(&store, &definition);

    listener.set_attributes(&mapping(json!({ "dynamicAttribute": "static-value" })));
    change_value(&store);
    assert_eq!(
        component.attribute("dynamicAttribute"),
        Some(json!("static-value"))
    );
}

#[test]
fn replacing_a_static_value_with_a_binding_starts_listening() {
    let store = store_with_record();
    let definition = mapping(json!({
        "attributes": { "dynamicAttribute": "static-value" },
    }));
    let (component, mut listener) = ComponentValueListener::attach(&store, &definition);

    listener.set_attributes(&mapping(json!({ "dynamicAttribute": dynamic_attribute() })));
    assert_eq!(
        component.attribute("dynamicAttribute"),
        Some(json!("test-value"))
    );

    change_value(&store);
    assert_eq!(
        component.attribute("dynamicAttribute"),
        Some(json!("changed-value"))
    );
}

#[test]
fn removing_the_attribute_stops_listening() {
    let store = store_with_record();
    let definition = mapping(json!({
        "attributes": { "dynamicAttribute": dynamic_attribute() },
    }));
    let (component, mut listener) = ComponentValueListener::attach(&store, &definition);

    listener.remove_attributes(&["dynamicAttribute"]);
    change_value(&store);
    assert_eq!(component.attribute("dynamicAttribute"), None);
}

#[test]
fn style_like_properties_fall_back_to_their_default() {
    // A binding whose source does not exist resolves to the declared
    // default and never subscribes.
    let store = DataSourceStore::new();
    let definition = mapping(json!({
        "color": {
            "kind": "datasource-reference",
            "defaultValue": "black",
            "path": "unknown.id1.color",
        },
    }));
    let (component, _listener) = ComponentValueListener::attach(&store, &definition);
    assert_eq!(component.get("color"), Some(json!("black")));
}

#[test]
fn serialization_never_bakes_in_resolved_values() {
    let store = store_with_record();
    let definition = mapping(json!({
        "attributes": {
            "staticAttribute": "some title",
            "dynamicAttribute": dynamic_attribute(),
        },
    }));
    let (component, listener) = ComponentValueListener::attach(&store, &definition);

    // Even after a change propagated into the component…
    change_value(&store);
    assert_eq!(
        component.attribute("dynamicAttribute"),
        Some(json!("changed-value"))
    );

    // …the persisted shape is the original declarative definition.
    let serialized = listener.serializable_attributes(&component.attributes());
    assert_eq!(serialized.get("dynamicAttribute"), Some(&dynamic_attribute()));
    assert_eq!(serialized.get("staticAttribute"), Some(&json!("some title")));

    let roundtrip = BindingDefinition::classify(serialized.get("dynamicAttribute").unwrap())
        .expect("serialized shape classifies again");
    assert_eq!(roundtrip.to_value(), dynamic_attribute());
}

#[test]
fn update_callbacks_stop_after_the_listener_is_dropped() {
    let store = store_with_record();
    let definition = mapping(json!({
        "attributes": { "dynamicAttribute": dynamic_attribute() },
    }));
    let component = {
        let (component, listener) = ComponentValueListener::attach(&store, &definition);
        drop(listener);
        component
    };

    change_value(&store);
    assert_eq!(
        component.attribute("dynamicAttribute"),
        Some(json!("test-value")),
        "teardown on drop must silence the write-back"
    );
}

#[test]
fn a_raw_watcher_supports_arbitrary_targets() {
    // The watcher is target-agnostic: anything with a (key, value) update
    // callback can consume it.
    let store = store_with_record();
    let seen: Rc<std::cell::RefCell<Vec<(String, Value)>>> =
        Rc::new(std::cell::RefCell::new(Vec::new()));
    let sink = Rc::clone(&seen);
    let mut watcher = DynamicValueWatcher::new(
        &store,
        Rc::new(move |key, value| sink.borrow_mut().push((key.to_string(), value))),
    );

    watcher.watch(&mapping(json!({ "content": dynamic_attribute() })));
    change_value(&store);

    assert_eq!(
        *seen.borrow(),
        vec![("content".to_string(), json!("changed-value"))]
    );
}
