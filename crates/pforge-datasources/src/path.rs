//! Dotted reference paths.
//!
//! A reference path names a source, optionally a record within it, and
//! optionally a field path within the record: `"products.p1.price"` or just
//! `"products"` to enumerate the whole record set. Parsing never panics;
//! malformed input (empty string, empty segment) yields `None`.

use serde_json::Value;

/// A parsed dotted reference: source id, optional record id, field path.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DataPath {
    /// The data-source id (first segment).
    pub source: String,
    /// The record id (second segment, if any).
    pub record: Option<String>,
    /// Remaining segments, drilling into the record's fields.
    pub fields: Vec<String>,
}

impl DataPath {
    /// Parse a dotted path. Returns `None` for an empty path or a path with
    /// an empty segment.
    #[must_use]
    pub fn parse(raw: &str) -> Option<Self> {
        if raw.is_empty() {
            return None;
        }
        let mut parts = raw.split('.');
        let source = parts.next()?.to_string();
        let record = parts.next().map(str::to_string);
        let fields: Vec<String> = parts.map(str::to_string).collect();

        if source.is_empty()
            || record.as_deref() == Some("")
            || fields.iter().any(String::is_empty)
        {
            return None;
        }
        Some(Self {
            source,
            record,
            fields,
        })
    }
}

impl std::fmt::Display for DataPath {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.source)?;
        if let Some(record) = &self.record {
            write!(f, ".{record}")?;
        }
        for field in &self.fields {
            write!(f, ".{field}")?;
        }
        Ok(())
    }
}

/// Drill into a value by successive segments: objects by key, arrays by
/// numeric index. Any miss along the way yields `None`.
pub fn pluck<'a>(value: &Value, segments: impl IntoIterator<Item = &'a str>) -> Option<Value> {
    let mut current = value;
    for segment in segments {
        current = match current {
            Value::Object(map) => map.get(segment)?,
            Value::Array(items) => items.get(segment.parse::<usize>().ok()?)?,
            _ => return None,
        };
    }
    Some(current.clone())
}
