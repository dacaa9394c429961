//! Records and batches
//!
//! A [`Record`] is one source row: an ordered mapping of field name to value.
//! A [`Batch`] is a non-empty, bounded group of records submitted together.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::ids::TableName;

/// One source row
///
/// Field order is the order in which fields were produced (header order for
/// delimited input). Records are immutable once built.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Record(Map<String, Value>);

impl Record {
    /// Creates a record from a JSON object
    pub fn from_map(fields: Map<String, Value>) -> Self {
        Self(fields)
    }

    /// Value of a field
    pub fn get(&self, field: &str) -> Option<&Value> {
        self.0.get(field)
    }

    /// Iterate fields in order
    pub fn fields(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.0.iter()
    }

    /// Field names in order
    pub fn field_names(&self) -> impl Iterator<Item = &String> {
        self.0.keys()
    }

    /// Number of fields
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether the record has no fields
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Borrow the underlying JSON object
    pub fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }

    /// Consume into the underlying JSON object
    pub fn into_map(self) -> Map<String, Value> {
        self.0
    }

    /// Item key for the given key attributes
    ///
    /// Returns `None` when any key attribute is missing, null or empty.
    /// The key is the JSON array of the raw key values, so composite parts
    /// never run into each other and `1` stays distinct from `"1"`.
    pub fn item_key(&self, key_attributes: &[String]) -> Option<String> {
        if key_attributes.is_empty() {
            return None;
        }

        let mut parts = Vec::with_capacity(key_attributes.len());
        for attribute in key_attributes {
            match self.0.get(attribute)? {
                Value::Null => return None,
                Value::String(s) if s.is_empty() => return None,
                value => parts.push(value),
            }
        }
        serde_json::to_string(&parts).ok()
    }

    /// Render a value the way it appears in delimited text
    pub fn render_value(value: &Value) -> String {
        match value {
            Value::Null => String::new(),
            Value::String(s) => s.clone(),
            other => other.to_string(),
        }
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for Record {
    fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> Self {
        Self(
            iter.into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }
}

/// A bounded, non-empty group of records
#[derive(Debug, Clone, PartialEq)]
pub struct Batch {
    records: Vec<Record>,
}

impl Batch {
    /// Creates a batch, enforcing `0 < len <= max_size`
    pub fn try_new(records: Vec<Record>, max_size: usize) -> Result<Self, String> {
        if records.is_empty() {
            return Err("A batch must contain at least one record".to_string());
        }
        if records.len() > max_size {
            return Err(format!(
                "Batch of {} records exceeds the maximum batch size of {}",
                records.len(),
                max_size
            ));
        }
        Ok(Self { records })
    }

    /// Number of records
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Always false; batches are never empty
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Borrow the records
    pub fn records(&self) -> &[Record] {
        &self.records
    }

    /// Consume into the records
    pub fn into_records(self) -> Vec<Record> {
        self.records
    }
}

/// All items scanned from one table
///
/// Not transactionally consistent: items written during the scan may or may
/// not appear.
#[derive(Debug, Clone, PartialEq)]
pub struct Snapshot {
    /// Source table
    pub table: TableName,
    /// Items in scan order
    pub items: Vec<Record>,
    /// Pages read
    pub pages: usize,
}

impl Snapshot {
    /// Number of items
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Whether the table was empty
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Union of field names in first-seen order
    pub fn field_names(&self) -> Vec<String> {
        let mut seen = std::collections::HashSet::new();
        let mut names = Vec::new();
        for item in &self.items {
            for name in item.field_names() {
                if seen.insert(name.as_str()) {
                    names.push(name.clone());
                }
            }
        }
        names
    }
}
