//! The loosely-typed row shape exchanged with the persistence layer.
//!
//! A [`Record`] is an ordered map of column name to JSON value. Ordering is by
//! key, so iteration and serialisation are independent of insertion order.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Primary key column.
pub const ID_FIELD: &str = "id";
/// Creation timestamp column (unix milliseconds).
pub const CREATED_AT_FIELD: &str = "created_at";
/// Last-modification timestamp column (unix milliseconds).
pub const UPDATED_AT_FIELD: &str = "updated_at";
/// Column holding the opaque serialised integrity tag.
pub const TAG_FIELD: &str = "metadata_tag";

/// A single row: column name to value.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Record(BTreeMap<String, Value>);

impl Record {
    /// Create an empty record.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert.
    pub fn with(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.insert(field, value);
        self
    }

    /// Insert or replace a column, returning the previous value.
    pub fn insert(&mut self, field: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        self.0.insert(field.into(), value.into())
    }

    pub fn remove(&mut self, field: &str) -> Option<Value> {
        self.0.remove(field)
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.0.get(field)
    }

    /// Return the column as a string slice, if present and a string.
    pub fn get_str(&self, field: &str) -> Option<&str> {
        self.0.get(field).and_then(Value::as_str)
    }

    pub fn contains(&self, field: &str) -> bool {
        self.0.contains_key(field)
    }

    /// The row's primary key, if set.
    pub fn id(&self) -> Option<&str> {
        self.get_str(ID_FIELD)
    }

    /// The row's serialised integrity tag, if set.
    pub fn tag(&self) -> Option<&str> {
        self.get_str(TAG_FIELD)
    }

    /// Iterate columns in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for Record {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
    }
}
