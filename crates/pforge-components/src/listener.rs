//! Per-key subscription ownership.
//!
//! A [`ListenerManager`] owns, for each logical key, at most one live
//! listener entry: the binding's declarative definition plus the
//! subscriptions that keep it updating. Registering a key always tears
//! down whatever was there first, so there is never a race between an old
//! and a new subscription for the same key — the scoped-resource
//! discipline makes forgotten cleanup impossible.
//!
//! # Invariants
//!
//! 1. One entry per key; `watch` replaces, never accumulates.
//! 2. Teardown is synchronous: after `unwatch` returns (or the manager is
//!    dropped), the key's callback cannot fire again, including for
//!    notifications of the same synchronous turn.
//! 3. `to_declarative` returns the definition as registered, never a
//!    resolved value.

use std::rc::Rc;

use ahash::AHashMap;
use serde_json::Value;
use tracing::{debug, trace};

use pforge_datasources::{DataSourceStore, Subscription};

use crate::definition::BindingDefinition;
use crate::eval::{EvalContext, evaluate};
use crate::scope::ScopeChain;

/// Callback invoked with `(key, new_value)` when a watched binding's value
/// changes.
pub type ChangeCallback = Rc<dyn Fn(&str, Value)>;

/// Owned map from key to a single live listener entry.
pub struct ListenerManager {
    store: DataSourceStore,
    entries: AHashMap<String, ListenerEntry>,
}

struct ListenerEntry {
    definition: BindingDefinition,
    subscriptions: Vec<Subscription>,
}

impl std::fmt::Debug for ListenerManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ListenerManager")
            .field("entries", &self.entries.len())
            .finish()
    }
}

impl ListenerManager {
    /// Create a manager reading from `store`.
    #[must_use]
    pub fn new(store: &DataSourceStore) -> Self {
        Self {
            store: store.clone(),
            entries: AHashMap::new(),
        }
    }

    /// Register a binding under `key`, replacing any existing entry.
    ///
    /// The binding is evaluated once; each observable dependency gets a
    /// subscription whose callback re-evaluates the definition and invokes
    /// `on_change(key, new_value)`. A binding with no dependencies (loop
    /// variables, unresolved references) keeps its declarative entry but
    /// owns no subscriptions.
    pub fn watch(
        &mut self,
        key: &str,
        definition: BindingDefinition,
        scopes: &ScopeChain,
        on_change: ChangeCallback,
    ) {
        self.unwatch(key);

        let ctx = EvalContext::with_scopes(&self.store, scopes.clone());
        let evaluated = evaluate(&definition, &ctx);
        let mut subscriptions = Vec::with_capacity(evaluated.deps.len());
        if !evaluated.deps.is_empty() {
            let notify: Rc<dyn Fn()> = {
                let key = key.to_string();
                let definition = definition.clone();
                let store = self.store.clone();
                let scopes = scopes.clone();
                Rc::new(move || {
                    let ctx = EvalContext::with_scopes(&store, scopes.clone());
                    let current = evaluate(&definition, &ctx);
                    on_change(&key, current.value.unwrap_or(Value::Null));
                })
            };
            for dep in &evaluated.deps {
                subscriptions.push(dep.subscribe(Rc::clone(&notify)));
            }
        }
        trace!(key, subscriptions = subscriptions.len(), "binding watched");
        self.entries.insert(
            key.to_string(),
            ListenerEntry {
                definition,
                subscriptions,
            },
        );
    }

    /// Tear down the entry under `key`. A key with no entry is a no-op.
    pub fn unwatch(&mut self, key: &str) {
        if self.entries.remove(key).is_some() {
            trace!(key, "binding unwatched");
        }
    }

    /// Tear down every entry.
    pub fn unwatch_all(&mut self) {
        if !self.entries.is_empty() {
            debug!(entries = self.entries.len(), "all bindings unwatched");
        }
        self.entries.clear();
    }

    /// The declarative shape registered under `key`, for persistence.
    #[must_use]
    pub fn to_declarative(&self, key: &str) -> Option<&BindingDefinition> {
        self.entries.get(key).map(|entry| &entry.definition)
    }

    /// Whether `key` has a live entry.
    #[must_use]
    pub fn is_watched(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    /// Whether `key` owns at least one live subscription (an entry can be
    /// declarative-only when its reference did not resolve).
    #[must_use]
    pub fn has_subscriptions(&self, key: &str) -> bool {
        self.entries
            .get(key)
            .is_some_and(|entry| !entry.subscriptions.is_empty())
    }

    /// Iterate over `(key, definition)` pairs of live entries.
    pub fn definitions(&self) -> impl Iterator<Item = (&str, &BindingDefinition)> {
        self.entries
            .iter()
            .map(|(key, entry)| (key.as_str(), &entry.definition))
    }

    /// Number of live entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether nothing is watched.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
