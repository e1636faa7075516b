//! End-to-end collection expansion: store-backed loops, nested scopes, and
//! expanded definitions that stay live through the watchers.

use pforge_components::{
    CollectionDefinition, ComponentValueListener, EvalContext, expand_collection,
};
use pforge_datasources::{DataSourceStore, ValueMap};
use serde_json::{Value, json};

fn mapping(raw: Value) -> ValueMap {
    raw.as_object().expect("object literal").clone()
}

fn parse(raw: Value) -> CollectionDefinition {
    serde_json::from_value(raw).expect("collection definition parses")
}

#[test]
fn expansion_produces_indexed_scope_variables() {
    let store = DataSourceStore::new();
    let definition = parse(json!({
        "config": { "dataSource": ["a", "b", "c"] },
        "block": {
            "content": { "kind": "collection-scope-reference", "variableKind": "current_item" },
            "index": { "kind": "collection-scope-reference", "variableKind": "current_index" },
            "total": { "kind": "collection-scope-reference", "variableKind": "total_items" },
            "remaining": { "kind": "collection-scope-reference", "variableKind": "remaining_items" },
        },
    }));

    let expanded = definition.expand(&EvalContext::new(&store));
    assert_eq!(expanded.len(), 3);
    let indices: Vec<&Value> = expanded.iter().map(|c| &c["index"]).collect();
    assert_eq!(indices, vec![&json!("0"), &json!("1"), &json!("2")]);
    let remaining: Vec<&Value> = expanded.iter().map(|c| &c["remaining"]).collect();
    assert_eq!(remaining, vec![&json!("2"), &json!("1"), &json!("0")]);
    for component in &expanded {
        assert_eq!(component["total"], json!("3"));
    }
}

#[test]
fn nested_loops_resolve_outer_items_for_every_inner_iteration() {
    let store = DataSourceStore::new();
    let definition = parse(json!({
        "collectionName": "outer",
        "config": { "dataSource": [{ "x": 1 }, { "x": 2 }] },
        "block": {
            "type": "collection-component",
            "collectionDefinition": {
                "config": { "dataSource": [10, 20] },
                "block": {
                    "from_outer": {
                        "kind": "collection-scope-reference",
                        "scopeName": "outer",
                        "variableKind": "current_item",
                        "path": "x",
                    },
                },
            },
        },
    }));

    let expanded = definition.expand(&EvalContext::new(&store));
    let first_inner = expanded[0]["components"].as_array().unwrap();
    let second_inner = expanded[1]["components"].as_array().unwrap();
    assert!(first_inner.iter().all(|c| c["from_outer"] == json!(1)));
    assert!(second_inner.iter().all(|c| c["from_outer"] == json!(2)));
}

#[test]
fn empty_store_backed_source_expands_to_nothing() {
    let store = DataSourceStore::new();
    store.add_source("empty", vec![]).unwrap();

    let raw = json!({
        "type": "collection-component",
        "collectionDefinition": {
            "config": {
                "dataSource": { "kind": "datasource-reference", "path": "empty" },
            },
            "block": { "tagName": "li" },
        },
    });
    let template_before = raw.clone();

    let expanded = expand_collection(&raw, &EvalContext::new(&store)).unwrap();
    assert!(expanded.is_empty());
    assert_eq!(raw, template_before, "expansion never mutates its input");
}

#[test]
fn record_field_paths_feed_collections() {
    let store = DataSourceStore::new();
    store
        .add_source(
            "catalog",
            vec![mapping(json!({
                "id": "c1",
                "tags": ["new", "sale", "featured"],
            }))],
        )
        .unwrap();

    let definition = parse(json!({
        "config": {
            "dataSource": { "kind": "datasource-reference", "path": "catalog.c1.tags" },
        },
        "block": {
            "tag": { "kind": "collection-scope-reference", "variableKind": "current_item" },
        },
    }));

    let expanded = definition.expand(&EvalContext::new(&store));
    let tags: Vec<&Value> = expanded.iter().map(|c| &c["tag"]).collect();
    assert_eq!(tags, vec![&json!("new"), &json!("sale"), &json!("featured")]);
}

#[test]
fn expanded_components_stay_live_through_their_watchers() {
    // Scope placeholders are fixed at expansion time, but data-source
    // bindings inside the template come out declarative — mounting the
    // expanded definition wires them to the store as usual.
    let store = DataSourceStore::new();
    store
        .add_source("labels", vec![mapping(json!({ "id": "l1", "text": "hello" }))])
        .unwrap();

    let definition = parse(json!({
        "config": { "dataSource": [0, 1] },
        "block": {
            "position": { "kind": "collection-scope-reference", "variableKind": "current_index" },
            "label": { "kind": "datasource-reference", "path": "labels.l1.text" },
        },
    }));

    let expanded = definition.expand(&EvalContext::new(&store));
    let mounted: Vec<_> = expanded
        .iter()
        .map(|component| {
            ComponentValueListener::attach(&store, component.as_object().unwrap())
        })
        .collect();

    assert_eq!(mounted[0].0.get("position"), Some(json!("0")));
    assert_eq!(mounted[1].0.get("position"), Some(json!("1")));
    assert_eq!(mounted[0].0.get("label"), Some(json!("hello")));

    store
        .get("labels")
        .unwrap()
        .get_record("l1")
        .unwrap()
        .set("text", json!("updated"));
    for (component, _listener) in &mounted {
        assert_eq!(component.get("label"), Some(json!("updated")));
    }
}

#[test]
fn collection_definitions_round_trip_through_serde() {
    let raw = json!({
        "collectionName": "products",
        "config": {
            "startIndex": 1,
            "endIndex": 4,
            "dataSource": { "kind": "datasource-reference", "path": "catalog" },
        },
        "block": {
            "tagName": "li",
            "content": { "kind": "collection-scope-reference", "variableKind": "current_item", "path": "name" },
        },
    });

    let definition = parse(raw.clone());
    assert_eq!(serde_json::to_value(&definition).unwrap(), raw);
}
