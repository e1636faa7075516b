//! The declarative binding shape and its classifier.
//!
//! A component property, attribute, or trait value is either a plain
//! literal or a *binding*: an object literal whose `kind` field names one
//! of the recognized binding kinds. Classification happens once, at the
//! boundary; from then on a [`BindingDefinition`] is carried as a closed
//! sum and evaluators match on it exhaustively.
//!
//! Classification is non-recursive: an object that merely *contains* a
//! binding somewhere in a nested field is itself static. Callers that want
//! to reach nested bindings (the collection expander does) recurse
//! explicitly.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::condition::ConditionalExpression;

/// `kind` discriminant for data-source references.
pub const DATA_SOURCE_KIND: &str = "datasource-reference";
/// `kind` discriminant for collection-scope references.
pub const COLLECTION_SCOPE_KIND: &str = "collection-scope-reference";
/// `kind` discriminant for conditional expressions.
pub const CONDITIONAL_KIND: &str = "conditional";

/// A declarative dynamic value, as persisted.
///
/// The serialized form is the wire/persistence shape: a JSON object tagged
/// by `kind`. Deserialization failure is not an error condition — a shape
/// that does not parse is simply not a binding.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind")]
pub enum BindingDefinition {
    /// Reference into the data-source store.
    #[serde(rename = "datasource-reference")]
    DataSource(DataSourceRef),
    /// Reference to a variable of an enclosing collection loop.
    #[serde(rename = "collection-scope-reference")]
    CollectionScope(CollectionScopeRef),
    /// A conditional expression choosing between two values.
    #[serde(rename = "conditional")]
    Conditional(ConditionalExpression),
}

/// `{ kind: "datasource-reference", path, defaultValue? }`
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DataSourceRef {
    /// Dotted path: `source`, `source.record`, or `source.record.field...`.
    pub path: String,
    /// Value to fall back to when the path does not resolve.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_value: Option<Value>,
}

/// `{ kind: "collection-scope-reference", scopeName?, variableKind, path? }`
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CollectionScopeRef {
    /// Name of the enclosing collection to resolve against; innermost
    /// scope when omitted.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scope_name: Option<String>,
    /// Which loop variable to read.
    pub variable_kind: VariableKind,
    /// For `current_item`: dotted field path into the item.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
}

/// Loop variables exposed by one collection iteration.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VariableKind {
    CurrentItem,
    CurrentIndex,
    FirstIndex,
    LastIndex,
    CollectionName,
    TotalItems,
    RemainingItems,
}

impl BindingDefinition {
    /// Classify a raw value. Returns the parsed definition when the value
    /// is an object with a recognized `kind` and a well-formed body;
    /// everything else — `null`, primitives, arrays, unknown or malformed
    /// shapes — is static.
    #[must_use]
    pub fn classify(value: &Value) -> Option<Self> {
        let object = value.as_object()?;
        match object.get("kind").and_then(Value::as_str)? {
            DATA_SOURCE_KIND | COLLECTION_SCOPE_KIND | CONDITIONAL_KIND => {
                serde_json::from_value(value.clone()).ok()
            }
            _ => None,
        }
    }

    /// Whether a raw value is a recognizable binding.
    #[must_use]
    pub fn is_binding(value: &Value) -> bool {
        Self::classify(value).is_some()
    }

    /// The persisted declarative shape.
    #[must_use]
    pub fn to_value(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}
