//! A single observable record.

use std::cell::RefCell;
use std::rc::Rc;

use serde_json::Value;
use tracing::trace;

use crate::ValueMap;
use crate::error::DataSourceError;
use crate::events::{Listeners, RecordEvent, Subscription};

/// An ordered mapping of fields to values, identified by its `id` field,
/// that emits a change event whenever a field takes a new value.
///
/// `DataRecord` is a cheap shared handle (`Rc` inner); clones observe the
/// same underlying record. Writing a value equal to the current one is a
/// no-op and emits nothing.
#[derive(Clone)]
pub struct DataRecord {
    inner: Rc<RecordInner>,
}

struct RecordInner {
    id: String,
    fields: RefCell<ValueMap>,
    changes: Listeners<RecordEvent>,
}

impl std::fmt::Debug for DataRecord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DataRecord")
            .field("id", &self.inner.id)
            .field("fields", &self.inner.fields.borrow().len())
            .finish()
    }
}

impl DataRecord {
    /// Build a record from its field map. The map must carry a string `id`.
    pub fn from_fields(fields: ValueMap) -> Result<Self, DataSourceError> {
        let id = fields
            .get("id")
            .and_then(Value::as_str)
            .ok_or(DataSourceError::MissingRecordId)?
            .to_string();
        Ok(Self {
            inner: Rc::new(RecordInner {
                id,
                fields: RefCell::new(fields),
                changes: Listeners::new(),
            }),
        })
    }

    /// The record id.
    #[must_use]
    pub fn id(&self) -> &str {
        &self.inner.id
    }

    /// Current value of a field.
    #[must_use]
    pub fn get(&self, field: &str) -> Option<Value> {
        self.inner.fields.borrow().get(field).cloned()
    }

    /// The whole record as a JSON object, fields in insertion order.
    #[must_use]
    pub fn value(&self) -> Value {
        Value::Object(self.inner.fields.borrow().clone())
    }

    /// Set a field. Returns whether the value actually changed; an equal
    /// write emits no event.
    pub fn set(&self, field: impl Into<String>, value: Value) -> bool {
        let field = field.into();
        {
            let mut fields = self.inner.fields.borrow_mut();
            if fields.get(&field) == Some(&value) {
                return false;
            }
            fields.insert(field.clone(), value.clone());
        }
        trace!(record = %self.inner.id, field = %field, "record field changed");
        self.inner.changes.emit(&RecordEvent {
            record: self.inner.id.clone(),
            field,
            value,
        });
        true
    }

    /// Set several fields at once. One change event fires per field that
    /// actually changed. Returns the number of changed fields.
    pub fn set_many(&self, values: ValueMap) -> usize {
        let mut changed = 0;
        for (field, value) in values {
            if self.set(field, value) {
                changed += 1;
            }
        }
        changed
    }

    /// Subscribe to field changes.
    pub fn on_change(&self, callback: impl Fn(&RecordEvent) + 'static) -> Subscription {
        self.inner.changes.subscribe(callback)
    }
}
