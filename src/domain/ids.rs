//! Domain identifier types with validation
//!
//! Newtype wrappers for store table names and blob keys.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Store table identifier
///
/// Table names are 3-255 characters of `[A-Za-z0-9_.-]`.
///
/// # Examples
///
/// ```
/// use ferry::domain::ids::TableName;
/// use std::str::FromStr;
///
/// let table = TableName::from_str("customer_orders").unwrap();
/// assert_eq!(table.as_str(), "customer_orders");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct TableName(String);

impl TableName {
    /// Creates a new TableName, validating its format
    pub fn new(name: impl Into<String>) -> Result<Self, String> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err("Table name cannot be empty".to_string());
        }

        if !(3..=255).contains(&name.len()) {
            return Err(format!(
                "Table name must be between 3 and 255 characters, got {} ('{}')",
                name.len(),
                name
            ));
        }

        if let Some(c) = name
            .chars()
            .find(|c| !(c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.')))
        {
            return Err(format!(
                "Invalid character '{c}' in table name '{name}'. Allowed: A-Z a-z 0-9 _ - ."
            ));
        }

        Ok(Self(name))
    }

    /// Returns the table name as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Consumes self and returns the inner String
    pub fn into_inner(self) -> String {
        self.0
    }
}

impl fmt::Display for TableName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for TableName {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl TryFrom<String> for TableName {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<TableName> for String {
    fn from(value: TableName) -> Self {
        value.0
    }
}

impl AsRef<str> for TableName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Blob object key within a container
///
/// Keys may contain `/` separators but must not be absolute, contain `..`
/// segments or control characters.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct BlobKey(String);

impl BlobKey {
    /// Creates a new BlobKey
    pub fn new(key: impl Into<String>) -> Result<Self, String> {
        let key = key.into();
        if key.trim().is_empty() {
            return Err("Blob key cannot be empty".to_string());
        }

        if key.starts_with('/') {
            return Err(format!("Blob key must be relative, got '{key}'"));
        }

        if key.split('/').any(|segment| segment == "..") {
            return Err(format!("Blob key must not contain '..' segments: '{key}'"));
        }

        if key.chars().any(char::is_control) {
            return Err("Blob key must not contain control characters".to_string());
        }

        Ok(Self(key))
    }

    /// Returns the key as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Lowercased file extension, if any
    pub fn extension(&self) -> Option<String> {
        let file_name = self.0.rsplit('/').next().unwrap_or(&self.0);
        file_name
            .rsplit_once('.')
            .map(|(_, ext)| ext.to_ascii_lowercase())
    }
}

impl fmt::Display for BlobKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for BlobKey {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl TryFrom<String> for BlobKey {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<BlobKey> for String {
    fn from(value: BlobKey) -> Self {
        value.0
    }
}

impl AsRef<str> for BlobKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
