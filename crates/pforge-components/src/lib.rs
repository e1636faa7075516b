#![forbid(unsafe_code)]

//! Dynamic value bindings and collection expansion for PageForge.
//!
//! Component properties, attributes, and traits are either literals or
//! declarative *bindings* — references into the data-source store, into an
//! enclosing collection loop's scope, or conditional expressions. This
//! crate classifies raw values once at the boundary into a closed
//! [`BindingDefinition`] sum, evaluates them against an explicit
//! [`EvalContext`], keeps bound targets synchronized through per-key
//! single-owner subscriptions, and expands collection block templates into
//! concrete component definitions with loop scopes chained through nested
//! expansions.
//!
//! The moving parts, leaves first:
//!
//! - [`definition`]: the declarative binding shape and its classifier.
//! - [`condition`]: conditional expression trees.
//! - [`scope`]: per-iteration loop variables and the scope chain.
//! - [`eval`]: pure binding evaluation to `(value, observable deps)`.
//! - [`listener`]: at most one live subscription per logical key.
//! - [`watcher`]: batch classify/resolve/subscribe per target mapping.
//! - [`component`]: the component collaborator and its per-target wiring.
//! - [`collection`]: the collection expander.
//!
//! No failure in this engine is fatal: unresolved references degrade to
//! defaults, malformed binding shapes are used literally, and late change
//! notifications for torn-down keys are ignored.

pub mod collection;
pub mod component;
pub mod condition;
pub mod definition;
pub mod eval;
pub mod listener;
pub mod scope;
pub mod watcher;

pub use collection::{
    COLLECTION_COMPONENT_TYPE, CollectionConfig, CollectionDataSource, CollectionDefinition,
    EndBound, expand_collection,
};
pub use component::{Component, ComponentValueListener, TraitEntry};
pub use condition::{
    Condition, ConditionalExpression, Expression, LogicGroup, LogicalOperator, Operator,
};
pub use definition::{
    BindingDefinition, COLLECTION_SCOPE_KIND, CONDITIONAL_KIND, CollectionScopeRef,
    DATA_SOURCE_KIND, DataSourceRef, VariableKind,
};
pub use eval::{EvalContext, Evaluated, ObservableHandle, evaluate};
pub use listener::{ChangeCallback, ListenerManager};
pub use scope::{ScopeChain, ScopeRecord};
pub use watcher::DynamicValueWatcher;
