//! Loop scopes for collection expansion.
//!
//! Each iteration of a collection gets one [`ScopeRecord`] — the loop-local
//! variables visible to placeholders inside that iteration's template. A
//! [`ScopeChain`] stacks the records of enclosing loops, innermost last;
//! extending the chain builds a new chain and leaves the parent untouched,
//! so sibling iterations and nested expansions never alias each other's
//! scopes.

use std::rc::Rc;

use serde_json::Value;

use crate::definition::VariableKind;

/// Loop-local variables of one collection iteration. Immutable after
/// construction; shared by reference into every placeholder of the
/// iteration.
#[derive(Clone, Debug, PartialEq)]
pub struct ScopeRecord {
    /// Name of the collection, when the loop was given one.
    pub collection_name: Option<String>,
    /// 0-based position within the resolved (bounded) sequence.
    pub current_index: usize,
    /// The item at this position.
    pub current_item: Value,
    /// Resolved start bound of the loop.
    pub first_index: usize,
    /// Resolved end bound of the loop.
    pub last_index: usize,
    /// Length of the resolved sequence.
    pub total_items: usize,
    /// Items after this one: `total_items - (current_index + 1)`.
    pub remaining_items: usize,
}

impl ScopeRecord {
    /// Read one loop variable. Index-like variables and counts substitute
    /// as strings, the way the editor renders them into text content.
    /// An unnamed loop has no `collection_name` to read.
    #[must_use]
    pub fn variable(&self, kind: VariableKind) -> Option<Value> {
        match kind {
            VariableKind::CurrentItem => Some(self.current_item.clone()),
            VariableKind::CurrentIndex => Some(Value::String(self.current_index.to_string())),
            VariableKind::FirstIndex => Some(Value::String(self.first_index.to_string())),
            VariableKind::LastIndex => Some(Value::String(self.last_index.to_string())),
            VariableKind::CollectionName => self.collection_name.clone().map(Value::String),
            VariableKind::TotalItems => Some(Value::String(self.total_items.to_string())),
            VariableKind::RemainingItems => Some(Value::String(self.remaining_items.to_string())),
        }
    }
}

/// Stack of enclosing loop scopes, innermost last.
#[derive(Clone, Debug, Default)]
pub struct ScopeChain {
    frames: Vec<Rc<ScopeRecord>>,
}

impl ScopeChain {
    /// An empty chain (no enclosing loop).
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A new chain with `frame` pushed as the innermost scope. The
    /// receiver is not modified.
    #[must_use]
    pub fn extended(&self, frame: ScopeRecord) -> Self {
        let mut frames = self.frames.clone();
        frames.push(Rc::new(frame));
        Self { frames }
    }

    /// The innermost scope, if any.
    #[must_use]
    pub fn innermost(&self) -> Option<&ScopeRecord> {
        self.frames.last().map(|frame| &**frame)
    }

    /// Resolve a scope: by name (searching innermost to outermost) or the
    /// innermost scope when no name is given.
    #[must_use]
    pub fn lookup(&self, name: Option<&str>) -> Option<&ScopeRecord> {
        match name {
            None => self.innermost(),
            Some(name) => self
                .frames
                .iter()
                .rev()
                .find(|frame| frame.collection_name.as_deref() == Some(name))
                .map(|frame| &**frame),
        }
    }

    /// Number of enclosing scopes.
    #[must_use]
    pub fn depth(&self) -> usize {
        self.frames.len()
    }

    /// Whether there is no enclosing loop.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }
}
