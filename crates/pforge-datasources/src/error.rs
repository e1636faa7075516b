//! Errors for data-source mutations.

/// Errors from store and source mutations.
///
/// Lookups return `Option` and never error; only operations that would
/// corrupt the registry (duplicate ids, removing what is not there) are
/// rejected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DataSourceError {
    /// A source with this id is already registered.
    DuplicateSource(String),
    /// A record with this id already exists in the source.
    DuplicateRecord { source: String, record: String },
    /// The record to remove does not exist in the source.
    UnknownRecord { source: String, record: String },
    /// A record definition is missing its `id` field.
    MissingRecordId,
}

impl std::fmt::Display for DataSourceError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::DuplicateSource(id) => write!(f, "data source '{id}' already exists"),
            Self::DuplicateRecord { source, record } => {
                write!(f, "record '{record}' already exists in source '{source}'")
            }
            Self::UnknownRecord { source, record } => {
                write!(f, "no record '{record}' in source '{source}'")
            }
            Self::MissingRecordId => write!(f, "record definition has no 'id' field"),
        }
    }
}

impl std::error::Error for DataSourceError {}
