//! Binding evaluation.
//!
//! [`evaluate`] is a pure query: given a classified [`BindingDefinition`]
//! and an explicit [`EvalContext`] (the store and the current scope chain —
//! there is no ambient state), it produces the binding's current value and
//! the observable handles the value depends on. The caller decides what to
//! do with the handles; evaluation itself never subscribes and never
//! mutates anything.
//!
//! # Failure Modes
//!
//! | Failure | Behavior |
//! |---------|----------|
//! | Malformed or unknown path | Default value, no deps |
//! | Missing source/record/field | Default value, no deps |
//! | Absent scope (or misspelled name) | No value, no deps |
//! | Conditional operand unresolvable | Operand treated as undefined |

use std::rc::Rc;

use serde_json::Value;
use tracing::warn;

use pforge_datasources::{DataPath, DataRecord, DataSource, DataSourceStore, Subscription, pluck};

use crate::definition::{BindingDefinition, CollectionScopeRef, DataSourceRef, VariableKind};
use crate::scope::{ScopeChain, ScopeRecord};

/// Everything a binding may resolve against, passed explicitly.
#[derive(Clone, Debug)]
pub struct EvalContext {
    store: DataSourceStore,
    scopes: ScopeChain,
}

impl EvalContext {
    /// Context with no enclosing loop scope.
    #[must_use]
    pub fn new(store: &DataSourceStore) -> Self {
        Self {
            store: store.clone(),
            scopes: ScopeChain::new(),
        }
    }

    /// Context carrying an existing scope chain.
    #[must_use]
    pub fn with_scopes(store: &DataSourceStore, scopes: ScopeChain) -> Self {
        Self {
            store: store.clone(),
            scopes,
        }
    }

    /// The shared data-source store.
    #[must_use]
    pub fn store(&self) -> &DataSourceStore {
        &self.store
    }

    /// The current scope chain.
    #[must_use]
    pub fn scopes(&self) -> &ScopeChain {
        &self.scopes
    }

    /// A child context whose chain is this one extended by `frame`.
    #[must_use]
    pub fn scoped(&self, frame: ScopeRecord) -> Self {
        Self {
            store: self.store.clone(),
            scopes: self.scopes.extended(frame),
        }
    }
}

/// What a live binding can be subscribed to.
#[derive(Clone, Debug)]
pub enum ObservableHandle {
    /// A single record; notifies on field changes.
    Record(DataRecord),
    /// A whole record set; notifies on add/remove/reset/change.
    Source(DataSource),
}

impl ObservableHandle {
    /// Subscribe `on_notify` to the underlying emitter. The payload is
    /// irrelevant to binding updates — subscribers re-evaluate.
    pub fn subscribe(&self, on_notify: Rc<dyn Fn()>) -> Subscription {
        match self {
            Self::Record(record) => record.on_change(move |_| on_notify()),
            Self::Source(source) => source.on_event(move |_| on_notify()),
        }
    }
}

/// Result of evaluating a binding: the current value (when it resolved)
/// and the handles it depends on. No deps means the binding is settled —
/// there is nothing to subscribe to.
#[derive(Clone, Debug)]
pub struct Evaluated {
    /// Current value; `None` when the reference resolved to nothing and no
    /// default was declared.
    pub value: Option<Value>,
    /// Observable dependencies of the value.
    pub deps: Vec<ObservableHandle>,
}

impl Evaluated {
    /// A result with no observable dependencies.
    #[must_use]
    pub fn settled(value: Option<Value>) -> Self {
        Self {
            value,
            deps: Vec::new(),
        }
    }

    /// Whether the binding has nothing to subscribe to.
    #[must_use]
    pub fn is_settled(&self) -> bool {
        self.deps.is_empty()
    }
}

/// Evaluate a binding against the context.
#[must_use]
pub fn evaluate(definition: &BindingDefinition, ctx: &EvalContext) -> Evaluated {
    match definition {
        BindingDefinition::DataSource(reference) => evaluate_data_source(reference, ctx),
        BindingDefinition::CollectionScope(reference) => {
            Evaluated::settled(resolve_scope_ref(reference, ctx.scopes()))
        }
        BindingDefinition::Conditional(conditional) => {
            let (value, deps) = conditional.resolve(ctx);
            Evaluated { value, deps }
        }
    }
}

fn evaluate_data_source(reference: &DataSourceRef, ctx: &EvalContext) -> Evaluated {
    let Some(path) = DataPath::parse(&reference.path) else {
        warn!(path = %reference.path, "malformed data-source path");
        return Evaluated::settled(reference.default_value.clone());
    };
    let Some(source) = ctx.store().get(&path.source) else {
        warn!(path = %reference.path, "data source not found");
        return Evaluated::settled(reference.default_value.clone());
    };
    match &path.record {
        // One segment: the whole record set, in storage order.
        None => Evaluated {
            value: Some(Value::Array(source.values())),
            deps: vec![ObservableHandle::Source(source)],
        },
        Some(record_id) => {
            let Some(record) = source.get_record(record_id) else {
                warn!(path = %reference.path, "record not found");
                return Evaluated::settled(reference.default_value.clone());
            };
            match pluck(&record.value(), path.fields.iter().map(String::as_str)) {
                Some(value) => Evaluated {
                    value: Some(value),
                    deps: vec![ObservableHandle::Record(record)],
                },
                None => {
                    warn!(path = %reference.path, "field not found");
                    Evaluated::settled(reference.default_value.clone())
                }
            }
        }
    }
}

/// Resolve a collection-scope reference against a chain. Loop variables are
/// fixed at expansion time, so there is never anything to subscribe to.
pub(crate) fn resolve_scope_ref(
    reference: &CollectionScopeRef,
    scopes: &ScopeChain,
) -> Option<Value> {
    let frame = scopes.lookup(reference.scope_name.as_deref())?;
    match reference.variable_kind {
        VariableKind::CurrentItem => match &reference.path {
            None => Some(frame.current_item.clone()),
            Some(path) => pluck(&frame.current_item, path.split('.')),
        },
        kind => frame.variable(kind),
    }
}

/// Resolve a raw operand value: a classifiable binding evaluates (its deps
/// accumulate into `deps`); anything else passes through as a literal.
pub(crate) fn resolve_operand(
    raw: &Value,
    ctx: &EvalContext,
    deps: &mut Vec<ObservableHandle>,
) -> Option<Value> {
    match BindingDefinition::classify(raw) {
        Some(definition) => {
            let evaluated = evaluate(&definition, ctx);
            deps.extend(evaluated.deps);
            evaluated.value
        }
        None => Some(raw.clone()),
    }
}
