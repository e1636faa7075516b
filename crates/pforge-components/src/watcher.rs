//! Batch watching of key/value mappings.
//!
//! A [`DynamicValueWatcher`] is the per-target orchestration unit: given a
//! mapping of keys to raw values (literals or declarative bindings), it
//! resolves statics eagerly, hands dynamics to the [`ListenerManager`], and
//! serializes live keys back to their declarative form so persistence never
//! bakes in a resolved value.
//!
//! Per-key state machine: `unbound → static` or `unbound → watched`;
//! `static → watched` and `watched → static` both pass through teardown,
//! and `watched → watched` (rebinding) replaces the subscription. There is
//! no transition that skips teardown.

use std::rc::Rc;

use serde_json::Value;

use pforge_datasources::{DataSourceStore, ValueMap};

use crate::definition::BindingDefinition;
use crate::eval::{EvalContext, evaluate};
use crate::listener::{ChangeCallback, ListenerManager};
use crate::scope::ScopeChain;

/// Watches one mapping's worth of dynamic values for a single target.
pub struct DynamicValueWatcher {
    listeners: ListenerManager,
    store: DataSourceStore,
    scopes: ScopeChain,
    update_fn: ChangeCallback,
}

impl std::fmt::Debug for DynamicValueWatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DynamicValueWatcher")
            .field("watched", &self.listeners.len())
            .finish()
    }
}

impl DynamicValueWatcher {
    /// Watcher with no enclosing loop scope. `update_fn` receives
    /// `(key, new_value)` whenever a watched binding changes.
    #[must_use]
    pub fn new(store: &DataSourceStore, update_fn: ChangeCallback) -> Self {
        Self::with_scopes(store, ScopeChain::new(), update_fn)
    }

    /// Watcher resolving collection-scope references against `scopes`.
    #[must_use]
    pub fn with_scopes(
        store: &DataSourceStore,
        scopes: ScopeChain,
        update_fn: ChangeCallback,
    ) -> Self {
        Self {
            listeners: ListenerManager::new(store),
            store: store.clone(),
            scopes,
            update_fn,
        }
    }

    /// Shallow copy of `values` with every dynamic entry replaced by its
    /// currently-resolved value (JSON `null` when the reference resolves to
    /// nothing). Static entries pass through unchanged. Used at
    /// construction time so a new target starts correct without waiting
    /// for a change event.
    #[must_use]
    pub fn resolve_static(store: &DataSourceStore, values: &ValueMap) -> ValueMap {
        let ctx = EvalContext::new(store);
        resolve_with(&ctx, values)
    }

    /// Like [`resolve_static`](Self::resolve_static), but resolving against
    /// this watcher's store and scope chain.
    #[must_use]
    pub fn resolve(&self, values: &ValueMap) -> ValueMap {
        let ctx = EvalContext::with_scopes(&self.store, self.scopes.clone());
        resolve_with(&ctx, values)
    }

    /// Whether no entry of `values` classifies as dynamic.
    #[must_use]
    pub fn are_static(values: &ValueMap) -> bool {
        values.values().all(|value| !BindingDefinition::is_binding(value))
    }

    /// Register every dynamic entry of `values`; re-watching a key
    /// replaces its subscription. A non-dynamic entry under a previously
    /// watched key unwatches it (the value went static).
    pub fn watch(&mut self, values: &ValueMap) {
        for (key, value) in values {
            match BindingDefinition::classify(value) {
                Some(definition) => self.listeners.watch(
                    key,
                    definition,
                    &self.scopes,
                    Rc::clone(&self.update_fn),
                ),
                None => self.listeners.unwatch(key),
            }
        }
    }

    /// Tear down the listed keys, with no replacement.
    pub fn remove(&mut self, keys: &[&str]) {
        for key in keys {
            self.listeners.unwatch(key);
        }
    }

    /// Tear down everything watched.
    pub fn clear(&mut self) {
        self.listeners.unwatch_all();
    }

    /// For each key of `values`: the original declarative shape when the
    /// key is watched, the given value otherwise. Persisted output never
    /// bakes in a resolved value for a key that is supposed to stay
    /// dynamic.
    #[must_use]
    pub fn serialize_values(&self, values: &ValueMap) -> ValueMap {
        values
            .iter()
            .map(|(key, value)| match self.listeners.to_declarative(key) {
                Some(definition) => (key.clone(), definition.to_value()),
                None => (key.clone(), value.clone()),
            })
            .collect()
    }

    /// All watched keys with their declarative shapes.
    #[must_use]
    pub fn definitions(&self) -> ValueMap {
        self.listeners
            .definitions()
            .map(|(key, definition)| (key.to_string(), definition.to_value()))
            .collect()
    }

    /// Whether `key` currently has a live entry.
    #[must_use]
    pub fn is_watched(&self, key: &str) -> bool {
        self.listeners.is_watched(key)
    }

    /// Number of watched keys.
    #[must_use]
    pub fn watched_len(&self) -> usize {
        self.listeners.len()
    }
}

fn resolve_with(ctx: &EvalContext, values: &ValueMap) -> ValueMap {
    values
        .iter()
        .map(|(key, value)| match BindingDefinition::classify(value) {
            Some(definition) => (
                key.clone(),
                evaluate(&definition, ctx).value.unwrap_or(Value::Null),
            ),
            None => (key.clone(), value.clone()),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::cell::RefCell;

    fn sample_store() -> DataSourceStore {
        let store = DataSourceStore::new();
        store
            .add_source(
                "ds",
                vec![json!({ "id": "r1", "value": "live" }).as_object().unwrap().clone()],
            )
            .unwrap();
        store
    }

    fn mapping(raw: Value) -> ValueMap {
        raw.as_object().unwrap().clone()
    }

    fn recorder() -> (Rc<RefCell<Vec<(String, Value)>>>, ChangeCallback) {
        let log: Rc<RefCell<Vec<(String, Value)>>> = Rc::new(RefCell::new(Vec::new()));
        let l = Rc::clone(&log);
        let callback: ChangeCallback = Rc::new(move |key, value| {
            l.borrow_mut().push((key.to_string(), value));
        });
        (log, callback)
    }

    fn dynamic_entry() -> Value {
        json!({ "kind": "datasource-reference", "path": "ds.r1.value", "defaultValue": "d" })
    }

    #[test]
    fn resolve_static_replaces_only_dynamics() {
        let store = sample_store();
        let values = mapping(json!({
            "plain": "as-is",
            "bound": dynamic_entry(),
        }));

        let resolved = DynamicValueWatcher::resolve_static(&store, &values);
        assert_eq!(resolved.get("plain"), Some(&json!("as-is")));
        assert_eq!(resolved.get("bound"), Some(&json!("live")));
    }

    #[test]
    fn unresolvable_dynamic_resolves_to_null_without_default() {
        let store = sample_store();
        let values = mapping(json!({
            "bound": { "kind": "datasource-reference", "path": "missing.r.f" },
        }));
        let resolved = DynamicValueWatcher::resolve_static(&store, &values);
        assert_eq!(resolved.get("bound"), Some(&Value::Null));
    }

    #[test]
    fn are_static_detects_any_binding() {
        assert!(DynamicValueWatcher::are_static(&mapping(
            json!({ "a": 1, "b": [2, 3] })
        )));
        assert!(!DynamicValueWatcher::are_static(&mapping(json!({
            "a": 1,
            "b": dynamic_entry(),
        }))));
    }

    #[test]
    fn watch_pushes_updates_through_the_callback() {
        let store = sample_store();
        let (log, callback) = recorder();
        let mut watcher = DynamicValueWatcher::new(&store, callback);

        watcher.watch(&mapping(json!({ "title": dynamic_entry(), "plain": 1 })));
        assert!(watcher.is_watched("title"));
        assert!(!watcher.is_watched("plain"));

        store
            .get("ds")
            .unwrap()
            .get_record("r1")
            .unwrap()
            .set("value", json!("updated"));
        assert_eq!(*log.borrow(), vec![("title".to_string(), json!("updated"))]);
    }

    #[test]
    fn static_value_under_a_watched_key_unwatches_it() {
        let store = sample_store();
        let (log, callback) = recorder();
        let mut watcher = DynamicValueWatcher::new(&store, callback);

        watcher.watch(&mapping(json!({ "title": dynamic_entry() })));
        watcher.watch(&mapping(json!({ "title": "now static" })));
        assert!(!watcher.is_watched("title"));

        store
            .get("ds")
            .unwrap()
            .get_record("r1")
            .unwrap()
            .set("value", json!("updated"));
        assert!(log.borrow().is_empty(), "no callback after going static");
    }

    #[test]
    fn rewatching_replaces_instead_of_duplicating() {
        let store = sample_store();
        let (log, callback) = recorder();
        let mut watcher = DynamicValueWatcher::new(&store, callback);

        watcher.watch(&mapping(json!({ "title": dynamic_entry() })));
        watcher.watch(&mapping(json!({ "title": dynamic_entry() })));

        store
            .get("ds")
            .unwrap()
            .get_record("r1")
            .unwrap()
            .set("value", json!("once"));
        assert_eq!(log.borrow().len(), 1, "exactly one live subscription");
    }

    #[test]
    fn remove_tears_down_without_replacement() {
        let store = sample_store();
        let (log, callback) = recorder();
        let mut watcher = DynamicValueWatcher::new(&store, callback);

        watcher.watch(&mapping(json!({ "title": dynamic_entry() })));
        watcher.remove(&["title"]);
        assert_eq!(watcher.watched_len(), 0);

        store
            .get("ds")
            .unwrap()
            .get_record("r1")
            .unwrap()
            .set("value", json!("updated"));
        assert!(log.borrow().is_empty());
    }

    #[test]
    fn serialize_returns_the_declarative_shape_for_watched_keys() {
        let store = sample_store();
        let (_, callback) = recorder();
        let mut watcher = DynamicValueWatcher::new(&store, callback);

        let values = mapping(json!({ "title": dynamic_entry(), "plain": 7 }));
        watcher.watch(&values);

        // The live mapping a caller would hold has the *resolved* value…
        let resolved = watcher.resolve(&values);
        assert_eq!(resolved.get("title"), Some(&json!("live")));

        // …but serialization recovers the original definition.
        let serialized = watcher.serialize_values(&resolved);
        assert_eq!(serialized.get("title"), Some(&dynamic_entry()));
        assert_eq!(serialized.get("plain"), Some(&json!(7)));

        let definitions = watcher.definitions();
        assert_eq!(definitions.len(), 1);
        assert_eq!(definitions.get("title"), Some(&dynamic_entry()));
    }
}
