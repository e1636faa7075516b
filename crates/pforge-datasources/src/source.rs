//! An ordered, observable set of records.
//!
//! # Invariants
//!
//! 1. Record ids are unique within a source; iteration follows insertion
//!    order.
//! 2. Every record-level change is forwarded as a source-level
//!    [`SourceEvent::RecordChanged`], so one subscription on the source sees
//!    adds, removes, resets, and field changes.
//! 3. Removing a record detaches its forwarding immediately; a removed
//!    record can keep living (and changing) on its own without notifying
//!    the source.

use std::cell::RefCell;
use std::rc::Rc;

use serde_json::Value;
use tracing::trace;

use crate::ValueMap;
use crate::error::DataSourceError;
use crate::events::{Listeners, SourceEvent, Subscription};
use crate::record::DataRecord;

/// A named, ordered collection of [`DataRecord`]s.
///
/// Cheap shared handle (`Rc` inner); clones observe the same set.
#[derive(Clone)]
pub struct DataSource {
    inner: Rc<SourceInner>,
}

struct SourceInner {
    id: String,
    records: RefCell<Vec<DataRecord>>,
    forwards: RefCell<Vec<(String, Subscription)>>,
    events: Listeners<SourceEvent>,
}

impl std::fmt::Debug for DataSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DataSource")
            .field("id", &self.inner.id)
            .field("records", &self.inner.records.borrow().len())
            .finish()
    }
}

impl DataSource {
    /// Create an empty source.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            inner: Rc::new(SourceInner {
                id: id.into(),
                records: RefCell::new(Vec::new()),
                forwards: RefCell::new(Vec::new()),
                events: Listeners::new(),
            }),
        }
    }

    /// Create a source pre-populated with records.
    pub fn with_records(
        id: impl Into<String>,
        records: Vec<ValueMap>,
    ) -> Result<Self, DataSourceError> {
        let source = Self::new(id);
        for fields in records {
            source.add_record(fields)?;
        }
        Ok(source)
    }

    /// The source id.
    #[must_use]
    pub fn id(&self) -> &str {
        &self.inner.id
    }

    /// Append a record. Rejects duplicate record ids.
    pub fn add_record(&self, fields: ValueMap) -> Result<DataRecord, DataSourceError> {
        let record = DataRecord::from_fields(fields)?;
        if self.get_record(record.id()).is_some() {
            return Err(DataSourceError::DuplicateRecord {
                source: self.inner.id.clone(),
                record: record.id().to_string(),
            });
        }
        self.attach(&record);
        self.inner.records.borrow_mut().push(record.clone());
        trace!(source = %self.inner.id, record = %record.id(), "record added");
        self.inner
            .events
            .emit(&SourceEvent::RecordAdded(record.id().to_string()));
        Ok(record)
    }

    /// Remove a record by id.
    pub fn remove_record(&self, id: &str) -> Result<DataRecord, DataSourceError> {
        let record = {
            let mut records = self.inner.records.borrow_mut();
            let position = records.iter().position(|r| r.id() == id).ok_or_else(|| {
                DataSourceError::UnknownRecord {
                    source: self.inner.id.clone(),
                    record: id.to_string(),
                }
            })?;
            records.remove(position)
        };
        self.inner.forwards.borrow_mut().retain(|(rid, _)| rid != id);
        trace!(source = %self.inner.id, record = %id, "record removed");
        self.inner
            .events
            .emit(&SourceEvent::RecordRemoved(id.to_string()));
        Ok(record)
    }

    /// Replace the whole record set. Emits a single [`SourceEvent::Reset`].
    pub fn reset(&self, records: Vec<ValueMap>) -> Result<Vec<DataRecord>, DataSourceError> {
        // Validate the batch before touching the live set.
        let mut fresh = Vec::with_capacity(records.len());
        for fields in records {
            let record = DataRecord::from_fields(fields)?;
            if fresh.iter().any(|r: &DataRecord| r.id() == record.id()) {
                return Err(DataSourceError::DuplicateRecord {
                    source: self.inner.id.clone(),
                    record: record.id().to_string(),
                });
            }
            fresh.push(record);
        }

        self.inner.forwards.borrow_mut().clear();
        for record in &fresh {
            self.attach(record);
        }
        *self.inner.records.borrow_mut() = fresh.clone();
        trace!(source = %self.inner.id, records = fresh.len(), "record set reset");
        self.inner.events.emit(&SourceEvent::Reset);
        Ok(fresh)
    }

    /// Look up a record by id.
    #[must_use]
    pub fn get_record(&self, id: &str) -> Option<DataRecord> {
        self.inner
            .records
            .borrow()
            .iter()
            .find(|r| r.id() == id)
            .cloned()
    }

    /// All records, in insertion order.
    #[must_use]
    pub fn records(&self) -> Vec<DataRecord> {
        self.inner.records.borrow().clone()
    }

    /// All record values, in insertion order.
    #[must_use]
    pub fn values(&self) -> Vec<Value> {
        self.inner.records.borrow().iter().map(DataRecord::value).collect()
    }

    /// Number of records.
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.records.borrow().len()
    }

    /// Whether the source has no records.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inner.records.borrow().is_empty()
    }

    /// Subscribe to add/remove/reset/change notifications.
    pub fn on_event(&self, callback: impl Fn(&SourceEvent) + 'static) -> Subscription {
        self.inner.events.subscribe(callback)
    }

    fn attach(&self, record: &DataRecord) {
        let weak = Rc::downgrade(&self.inner);
        let sub = record.on_change(move |event| {
            if let Some(inner) = weak.upgrade() {
                inner
                    .events
                    .emit(&SourceEvent::RecordChanged(event.clone()));
            }
        });
        self.inner
            .forwards
            .borrow_mut()
            .push((record.id().to_string(), sub));
    }
}
