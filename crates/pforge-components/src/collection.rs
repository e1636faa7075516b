//! Collection expansion.
//!
//! A collection block declares a loop — a data source, optional bounds, an
//! optional name — and a per-iteration component template. Expansion turns
//! it into one concrete component definition per item, substituting
//! collection-scope placeholders against a [`ScopeChain`] that nested
//! expansions extend.
//!
//! # Invariants
//!
//! 1. Expansion is a pure transform: the template (and the whole block
//!    definition) is never mutated; every output is a fresh tree.
//! 2. Scope substitution reaches every nested object and array of the
//!    clone; data-source and conditional bindings are left declarative for
//!    the watchers to pick up at construction time.
//! 3. A nested collection block expands with the current chain as its
//!    parent, which is what lets an inner loop read an outer loop's
//!    variables by name or implicitly.
//!
//! # Failure Modes
//!
//! | Failure | Behavior |
//! |---------|----------|
//! | Data source resolves to nothing | Empty expansion, not an error |
//! | Bounds select nothing | Empty expansion |
//! | Misspelled scope name | Field dropped (object) or nulled (array) |
//! | Malformed nested block | Left in place untouched |

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, trace};

use pforge_datasources::ValueMap;

use crate::condition::ConditionalExpression;
use crate::definition::BindingDefinition;
use crate::eval::{EvalContext, evaluate, resolve_scope_ref};
use crate::scope::ScopeRecord;

/// Component `type` marking a collection block.
pub const COLLECTION_COMPONENT_TYPE: &str = "collection-component";

/// A whole collection block: name, loop configuration, per-iteration
/// template.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CollectionDefinition {
    /// Name other scopes use to reach this loop's variables.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub collection_name: Option<String>,
    /// The loop configuration.
    pub config: CollectionConfig,
    /// Component definition instantiated once per item.
    pub block: Value,
}

/// `{ startIndex?, endIndex?, dataSource }`
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CollectionConfig {
    /// First item to include; 0 when omitted.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_index: Option<usize>,
    /// Last item to include; the natural end when omitted.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_index: Option<EndBound>,
    /// Where the items come from.
    pub data_source: CollectionDataSource,
}

/// An end bound: a fixed index or a conditional evaluated with the same
/// evaluator as every other binding.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum EndBound {
    Index(usize),
    Conditional(ConditionalExpression),
}

/// A collection's item source: a literal array, or any binding — a
/// data-source reference, an outer loop's item (collection-scope
/// reference), or a conditional.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CollectionDataSource {
    Items(Vec<Value>),
    Binding(BindingDefinition),
}

impl CollectionDefinition {
    /// Parse a definition out of a raw `collectionDefinition` value.
    #[must_use]
    pub fn from_value(value: &Value) -> Option<Self> {
        serde_json::from_value(value.clone()).ok()
    }

    /// Expand the block into one component definition per item.
    ///
    /// `ctx` carries the store and the parent scope chain; each iteration
    /// gets the chain extended by its own [`ScopeRecord`]. An empty or
    /// unresolvable item sequence yields an empty expansion.
    #[must_use]
    pub fn expand(&self, ctx: &EvalContext) -> Vec<Value> {
        let items = self.resolve_items(ctx);
        if items.is_empty() {
            debug!(collection = ?self.collection_name, "collection resolved to no items");
            return Vec::new();
        }

        let first = self.config.start_index.unwrap_or(0);
        let last = self.resolve_end(ctx, items.len());
        if first >= items.len() || first > last {
            debug!(
                first,
                last,
                total = items.len(),
                "collection bounds select nothing"
            );
            return Vec::new();
        }

        let window = &items[first..=last];
        let total = window.len();
        debug!(collection = ?self.collection_name, total, "expanding collection");

        window
            .iter()
            .enumerate()
            .map(|(index, item)| {
                let frame = ScopeRecord {
                    collection_name: self.collection_name.clone(),
                    current_index: index,
                    current_item: item.clone(),
                    first_index: first,
                    last_index: last,
                    total_items: total,
                    remaining_items: total - (index + 1),
                };
                let ctx = ctx.scoped(frame);
                substitute(&self.block, &ctx).unwrap_or(Value::Null)
            })
            .collect()
    }

    fn resolve_items(&self, ctx: &EvalContext) -> Vec<Value> {
        match &self.config.data_source {
            CollectionDataSource::Items(items) => items.clone(),
            CollectionDataSource::Binding(definition) => {
                match evaluate(definition, ctx).value {
                    Some(Value::Array(items)) => items,
                    // A keyed collection iterates its values in order.
                    Some(Value::Object(map)) => map.into_iter().map(|(_, v)| v).collect(),
                    Some(_) | None => Vec::new(),
                }
            }
        }
    }

    /// Resolve the end bound to an inclusive index, clamped to the
    /// sequence. `total` is at least 1 here.
    fn resolve_end(&self, ctx: &EvalContext, total: usize) -> usize {
        match &self.config.end_index {
            None => total - 1,
            Some(EndBound::Index(index)) => (*index).min(total - 1),
            Some(EndBound::Conditional(conditional)) => {
                let (value, _) = conditional.resolve(ctx);
                match value.as_ref().and_then(Value::as_u64) {
                    Some(index) => (index as usize).min(total - 1),
                    None => total - 1,
                }
            }
        }
    }
}

/// Expand a raw component definition if it is a collection block.
#[must_use]
pub fn expand_collection(value: &Value, ctx: &EvalContext) -> Option<Vec<Value>> {
    let map = value.as_object()?;
    if !is_collection_block(map) {
        return None;
    }
    let definition = CollectionDefinition::from_value(map.get("collectionDefinition")?)?;
    Some(definition.expand(ctx))
}

fn is_collection_block(map: &ValueMap) -> bool {
    map.get("type").and_then(Value::as_str) == Some(COLLECTION_COMPONENT_TYPE)
        && map.contains_key("collectionDefinition")
}

/// Clone-and-substitute walk. Returns `None` only for a scope reference
/// that resolved to nothing; containers always come back (with offending
/// fields dropped).
fn substitute(value: &Value, ctx: &EvalContext) -> Option<Value> {
    match value {
        Value::Object(map) => {
            if let Some(BindingDefinition::CollectionScope(reference)) =
                BindingDefinition::classify(value)
            {
                return resolve_scope_ref(&reference, ctx.scopes());
            }
            if is_collection_block(map) {
                return Some(expand_block(map, ctx));
            }
            let mut out = ValueMap::new();
            for (key, field) in map {
                match substitute(field, ctx) {
                    Some(resolved) => {
                        out.insert(key.clone(), resolved);
                    }
                    None => {
                        trace!(key = %key, "scope reference did not resolve; field dropped");
                    }
                }
            }
            Some(Value::Object(out))
        }
        Value::Array(items) => Some(Value::Array(
            items
                .iter()
                .map(|item| substitute(item, ctx).unwrap_or(Value::Null))
                .collect(),
        )),
        scalar => Some(scalar.clone()),
    }
}

/// Expand a nested collection block in place: its declarative definition is
/// kept verbatim (persistence round-trips), its expansion lands beside it
/// as `components`, and its remaining fields are substituted against the
/// enclosing scope.
fn expand_block(map: &ValueMap, ctx: &EvalContext) -> Value {
    let Some(definition) = map
        .get("collectionDefinition")
        .and_then(CollectionDefinition::from_value)
    else {
        return Value::Object(map.clone());
    };
    let components = definition.expand(ctx);

    let mut out = ValueMap::new();
    for (key, field) in map {
        if key == "collectionDefinition" {
            out.insert(key.clone(), field.clone());
            continue;
        }
        if let Some(resolved) = substitute(field, ctx) {
            out.insert(key.clone(), resolved);
        }
    }
    out.insert("components".to_string(), Value::Array(components));
    Value::Object(out)
}
