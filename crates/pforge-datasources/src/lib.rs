#![forbid(unsafe_code)]

//! Observable data sources for PageForge.
//!
//! A [`DataSourceStore`] holds named [`DataSource`]s; each source is an
//! ordered set of [`DataRecord`]s, and each record is an ordered mapping of
//! fields to JSON values. Records and sources emit change notifications
//! through weakly-held subscriber callbacks; a [`Subscription`] is an RAII
//! guard that silences its callback the moment it is dropped.
//!
//! Everything here is single-threaded (`Rc`/`RefCell` sharing) and fully
//! synchronous: emitting an event runs every live subscriber to completion
//! before control returns to the mutator.

pub mod error;
pub mod events;
pub mod path;
pub mod record;
pub mod source;
pub mod store;

pub use error::DataSourceError;
pub use events::{Listeners, RecordEvent, SourceEvent, Subscription};
pub use path::{DataPath, pluck};
pub use record::DataRecord;
pub use source::DataSource;
pub use store::DataSourceStore;

/// Ordered field/value mapping used by records and component definitions.
pub type ValueMap = serde_json::Map<String, serde_json::Value>;
