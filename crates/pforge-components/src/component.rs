//! The component-tree collaborator and its per-target wiring.
//!
//! The editor's real component tree lives outside this engine; what the
//! engine needs from it is a mutation surface — set a property, merge
//! attributes, update a trait (and push the new value into the trait's
//! visual control). [`Component`] models exactly that surface.
//!
//! [`ComponentValueListener`] is the per-component orchestration: three
//! independent [`DynamicValueWatcher`]s — properties, attributes, traits —
//! each with its own write-back path, because each target kind mutates and
//! serializes differently.

use std::cell::RefCell;
use std::rc::Rc;

use serde_json::Value;

use pforge_datasources::{DataSourceStore, ValueMap};

use crate::definition::BindingDefinition;
use crate::eval::{EvalContext, evaluate};
use crate::listener::ChangeCallback;
use crate::scope::ScopeChain;
use crate::watcher::DynamicValueWatcher;

/// A named trait with its backing value and the value shown by its visual
/// control.
#[derive(Clone, Debug, PartialEq)]
pub struct TraitEntry {
    pub name: String,
    pub value: Value,
    /// What the trait's control currently displays.
    pub control_value: Value,
}

/// Minimal shared component model: properties, attributes, traits.
///
/// Cheap shared handle (`Rc<RefCell>` inner); the watchers' write-back
/// callbacks hold clones of it.
#[derive(Clone, Default)]
pub struct Component {
    inner: Rc<RefCell<ComponentInner>>,
}

#[derive(Default)]
struct ComponentInner {
    properties: ValueMap,
    attributes: ValueMap,
    traits: Vec<TraitEntry>,
}

impl std::fmt::Debug for Component {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = self.inner.borrow();
        f.debug_struct("Component")
            .field("properties", &inner.properties.len())
            .field("attributes", &inner.attributes.len())
            .field("traits", &inner.traits.len())
            .finish()
    }
}

impl Component {
    /// An empty component.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set one property.
    pub fn set(&self, key: impl Into<String>, value: Value) {
        self.inner.borrow_mut().properties.insert(key.into(), value);
    }

    /// Read one property.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<Value> {
        self.inner.borrow().properties.get(key).cloned()
    }

    /// All properties.
    #[must_use]
    pub fn properties(&self) -> ValueMap {
        self.inner.borrow().properties.clone()
    }

    /// Merge attributes into the component.
    pub fn set_attributes(&self, values: ValueMap) {
        let mut inner = self.inner.borrow_mut();
        for (key, value) in values {
            inner.attributes.insert(key, value);
        }
    }

    /// Drop the listed attributes.
    pub fn remove_attributes(&self, keys: &[&str]) {
        let mut inner = self.inner.borrow_mut();
        let retained: ValueMap = inner
            .attributes
            .iter()
            .filter(|(key, _)| !keys.contains(&key.as_str()))
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect();
        inner.attributes = retained;
    }

    /// Read one attribute.
    #[must_use]
    pub fn attribute(&self, key: &str) -> Option<Value> {
        self.inner.borrow().attributes.get(key).cloned()
    }

    /// All attributes.
    #[must_use]
    pub fn attributes(&self) -> ValueMap {
        self.inner.borrow().attributes.clone()
    }

    /// Add a trait. Its control starts out displaying the backing value.
    pub fn add_trait(&self, name: impl Into<String>, value: Value) {
        let name = name.into();
        self.inner.borrow_mut().traits.push(TraitEntry {
            name,
            control_value: value.clone(),
            value,
        });
    }

    /// Update a trait's backing value. Returns whether the trait exists.
    pub fn update_trait(&self, name: &str, value: Value) -> bool {
        let mut inner = self.inner.borrow_mut();
        match inner.traits.iter_mut().find(|t| t.name == name) {
            Some(entry) => {
                entry.value = value;
                true
            }
            None => false,
        }
    }

    /// Push a value into a trait's visual control.
    pub fn set_trait_control(&self, name: &str, value: Value) -> bool {
        let mut inner = self.inner.borrow_mut();
        match inner.traits.iter_mut().find(|t| t.name == name) {
            Some(entry) => {
                entry.control_value = value;
                true
            }
            None => false,
        }
    }

    /// A trait's backing value.
    #[must_use]
    pub fn trait_value(&self, name: &str) -> Option<Value> {
        self.inner
            .borrow()
            .traits
            .iter()
            .find(|t| t.name == name)
            .map(|t| t.value.clone())
    }

    /// What a trait's control displays.
    #[must_use]
    pub fn trait_control(&self, name: &str) -> Option<Value> {
        self.inner
            .borrow()
            .traits
            .iter()
            .find(|t| t.name == name)
            .map(|t| t.control_value.clone())
    }

    /// All traits, in declaration order.
    #[must_use]
    pub fn traits(&self) -> Vec<TraitEntry> {
        self.inner.borrow().traits.clone()
    }
}

/// Per-component dynamic-value orchestration: one watcher per target kind.
pub struct ComponentValueListener {
    component: Component,
    properties: DynamicValueWatcher,
    attributes: DynamicValueWatcher,
    traits: DynamicValueWatcher,
}

impl std::fmt::Debug for ComponentValueListener {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ComponentValueListener")
            .field("properties", &self.properties)
            .field("attributes", &self.attributes)
            .field("traits", &self.traits)
            .finish()
    }
}

impl ComponentValueListener {
    /// Wire three watchers to `component`, outside any loop scope.
    #[must_use]
    pub fn new(store: &DataSourceStore, component: &Component) -> Self {
        Self::with_scopes(store, ScopeChain::new(), component)
    }

    /// Wire three watchers to `component`, resolving scope references
    /// against `scopes`.
    #[must_use]
    pub fn with_scopes(store: &DataSourceStore, scopes: ScopeChain, component: &Component) -> Self {
        let target = component.clone();
        let on_property: ChangeCallback = Rc::new(move |key, value| {
            target.set(key, value);
        });

        let target = component.clone();
        let on_attribute: ChangeCallback = Rc::new(move |key, value| {
            let mut single = ValueMap::new();
            single.insert(key.to_string(), value);
            target.set_attributes(single);
        });

        // Trait updates push into the control as well, not just the
        // backing data.
        let target = component.clone();
        let on_trait: ChangeCallback = Rc::new(move |key, value| {
            target.update_trait(key, value.clone());
            target.set_trait_control(key, value);
        });

        Self {
            component: component.clone(),
            properties: DynamicValueWatcher::with_scopes(store, scopes.clone(), on_property),
            attributes: DynamicValueWatcher::with_scopes(store, scopes.clone(), on_attribute),
            traits: DynamicValueWatcher::with_scopes(store, scopes, on_trait),
        }
    }

    /// Resolve a whole component definition to its static form: top-level
    /// properties plus the nested `attributes` map and `traits` values.
    #[must_use]
    pub fn evaluate_component_def(store: &DataSourceStore, definition: &ValueMap) -> ValueMap {
        let mut resolved = DynamicValueWatcher::resolve_static(store, definition);
        if let Some(Value::Object(attributes)) = definition.get("attributes") {
            resolved.insert(
                "attributes".to_string(),
                Value::Object(DynamicValueWatcher::resolve_static(store, attributes)),
            );
        }
        if let Some(Value::Array(traits)) = definition.get("traits") {
            let ctx = EvalContext::new(store);
            let resolved_traits = traits
                .iter()
                .map(|entry| resolve_trait_def(&ctx, entry))
                .collect();
            resolved.insert("traits".to_string(), Value::Array(resolved_traits));
        }
        resolved
    }

    /// Mount a raw component definition: build a component with statics and
    /// initial dynamic values resolved, and watch every dynamic entry.
    #[must_use]
    pub fn attach(store: &DataSourceStore, definition: &ValueMap) -> (Component, Self) {
        Self::attach_scoped(store, ScopeChain::new(), definition)
    }

    /// [`attach`](Self::attach) inside an enclosing loop scope.
    pub fn attach_scoped(
        store: &DataSourceStore,
        scopes: ScopeChain,
        definition: &ValueMap,
    ) -> (Component, Self) {
        let component = Component::new();
        let mut listener = Self::with_scopes(store, scopes, &component);

        for (key, value) in listener.properties.resolve(&top_level_props(definition)) {
            component.set(key, value);
        }
        if let Some(Value::Object(attributes)) = definition.get("attributes") {
            component.set_attributes(listener.attributes.resolve(attributes));
        }
        if let Some(Value::Array(traits)) = definition.get("traits") {
            for (name, value) in listener.traits.resolve(&trait_values(traits)) {
                component.add_trait(name, value);
            }
        }

        listener.watch_component_def(definition);
        (component, listener)
    }

    /// Register every dynamic entry of a component definition with the
    /// right watcher.
    pub fn watch_component_def(&mut self, definition: &ValueMap) {
        self.properties.watch(&top_level_props(definition));
        if let Some(Value::Object(attributes)) = definition.get("attributes") {
            self.attributes.watch(attributes);
        }
        if let Some(Value::Array(traits)) = definition.get("traits") {
            self.traits.watch(&trait_values(traits));
        }
    }

    /// Watch a property mapping.
    pub fn watch_properties(&mut self, properties: &ValueMap) {
        self.properties.watch(properties);
    }

    /// Watch an attribute mapping without dropping existing listeners.
    pub fn watch_attributes(&mut self, attributes: &ValueMap) {
        self.attributes.watch(attributes);
    }

    /// Replace the component's attributes: previous attribute listeners are
    /// torn down, the new mapping is resolved into the component, and its
    /// dynamics are watched.
    pub fn set_attributes(&mut self, attributes: &ValueMap) {
        self.attributes.clear();
        self.component
            .set_attributes(self.attributes.resolve(attributes));
        self.attributes.watch(attributes);
    }

    /// Drop attributes and their listeners.
    pub fn remove_attributes(&mut self, keys: &[&str]) {
        self.attributes.remove(keys);
        self.component.remove_attributes(keys);
    }

    /// Watch trait values by trait name.
    pub fn watch_traits(&mut self, traits: &[Value]) {
        self.traits.watch(&trait_values(traits));
    }

    /// Declarative shapes of all watched properties.
    #[must_use]
    pub fn serializable_properties(&self) -> ValueMap {
        self.properties.definitions()
    }

    /// For each attribute: its declarative shape when watched, the given
    /// value otherwise.
    #[must_use]
    pub fn serializable_attributes(&self, attributes: &ValueMap) -> ValueMap {
        self.attributes.serialize_values(attributes)
    }

    /// Declarative shapes of all watched traits.
    #[must_use]
    pub fn serializable_traits(&self) -> ValueMap {
        self.traits.definitions()
    }

    /// The component this listener writes back into.
    #[must_use]
    pub fn component(&self) -> &Component {
        &self.component
    }
}

/// Everything except the nested per-target maps.
fn top_level_props(definition: &ValueMap) -> ValueMap {
    definition
        .iter()
        .filter(|(key, _)| key.as_str() != "attributes" && key.as_str() != "traits")
        .map(|(key, value)| (key.clone(), value.clone()))
        .collect()
}

/// Trait definitions (`[{ name, value }, ...]`) flattened to a name→value
/// mapping. Entries without a name are skipped.
fn trait_values(traits: &[Value]) -> ValueMap {
    traits
        .iter()
        .filter_map(|entry| {
            let map = entry.as_object()?;
            let name = map.get("name")?.as_str()?;
            Some((
                name.to_string(),
                map.get("value").cloned().unwrap_or(Value::Null),
            ))
        })
        .collect()
}

fn resolve_trait_def(ctx: &EvalContext, entry: &Value) -> Value {
    let Some(map) = entry.as_object() else {
        return entry.clone();
    };
    let mut map = map.clone();
    if let Some(value) = map.get("value") {
        if let Some(definition) = BindingDefinition::classify(value) {
            let resolved = evaluate(&definition, ctx).value.unwrap_or(Value::Null);
            map.insert("value".to_string(), resolved);
        }
    }
    Value::Object(map)
}
