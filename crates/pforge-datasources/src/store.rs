//! The named data-source registry.

use std::cell::RefCell;
use std::rc::Rc;

use ahash::AHashMap;
use serde_json::Value;
use tracing::trace;

use crate::ValueMap;
use crate::error::DataSourceError;
use crate::path::{DataPath, pluck};
use crate::source::DataSource;

/// Registry of named [`DataSource`]s shared by every watcher and expansion.
///
/// Cheap shared handle (`Rc` inner). The store itself is passive: watchers
/// and expansions only read from it and subscribe to its sources.
///
/// # Example
///
/// ```
/// use pforge_datasources::DataSourceStore;
/// use serde_json::json;
///
/// let store = DataSourceStore::new();
/// store
///     .add_source(
///         "products",
///         vec![json!({ "id": "p1", "price": 42 }).as_object().unwrap().clone()],
///     )
///     .unwrap();
///
/// assert_eq!(store.get_value("products.p1.price", json!(0)), json!(42));
/// assert_eq!(store.get_value("products.p9.price", json!(0)), json!(0));
/// ```
#[derive(Clone, Default)]
pub struct DataSourceStore {
    inner: Rc<StoreInner>,
}

#[derive(Default)]
struct StoreInner {
    sources: RefCell<AHashMap<String, DataSource>>,
}

impl std::fmt::Debug for DataSourceStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DataSourceStore")
            .field("sources", &self.inner.sources.borrow().len())
            .finish()
    }
}

impl DataSourceStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a source. Rejects duplicate source ids.
    pub fn add(&self, source: DataSource) -> Result<(), DataSourceError> {
        let mut sources = self.inner.sources.borrow_mut();
        if sources.contains_key(source.id()) {
            return Err(DataSourceError::DuplicateSource(source.id().to_string()));
        }
        trace!(source = %source.id(), "data source registered");
        sources.insert(source.id().to_string(), source);
        Ok(())
    }

    /// Build and register a source from record field maps.
    pub fn add_source(
        &self,
        id: impl Into<String>,
        records: Vec<ValueMap>,
    ) -> Result<DataSource, DataSourceError> {
        let source = DataSource::with_records(id, records)?;
        self.add(source.clone())?;
        Ok(source)
    }

    /// Look up a source by id.
    #[must_use]
    pub fn get(&self, id: &str) -> Option<DataSource> {
        self.inner.sources.borrow().get(id).cloned()
    }

    /// Unregister a source.
    pub fn remove(&self, id: &str) -> Option<DataSource> {
        self.inner.sources.borrow_mut().remove(id)
    }

    /// Number of registered sources.
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.sources.borrow().len()
    }

    /// Whether no source is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inner.sources.borrow().is_empty()
    }

    /// Resolve a dotted path to its current value, if everything along the
    /// way exists. A single-segment path enumerates the source's records in
    /// storage order.
    #[must_use]
    pub fn resolve(&self, path: &str) -> Option<Value> {
        let path = DataPath::parse(path)?;
        let source = self.get(&path.source)?;
        match &path.record {
            None => Some(Value::Array(source.values())),
            Some(record) => {
                let record = source.get_record(record)?;
                pluck(&record.value(), path.fields.iter().map(String::as_str))
            }
        }
    }

    /// Resolve a dotted path, falling back to `default` when any step is
    /// missing.
    #[must_use]
    pub fn get_value(&self, path: &str, default: Value) -> Value {
        self.resolve(path).unwrap_or(default)
    }
}
