//! Blob exporter
//!
//! Serializes a [`Snapshot`] into one document and writes it under
//! `<prefix>-<table>-<region>-<timestamp>.<ext>`.

use crate::adapters::blob::SharedBlobStore;
use crate::config::ExportFormat;
use crate::domain::{BlobKey, FerryError, Record, Result, Snapshot, TableName};
use chrono::{DateTime, Utc};
use serde::Serialize;

/// Timestamp format shared by every export blob of one run
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d-%H:%M:%S";

/// Format the run start time for blob keys
pub fn run_timestamp(started_at: DateTime<Utc>) -> String {
    started_at.format(TIMESTAMP_FORMAT).to_string()
}

/// Where an export ended up
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExportReceipt {
    /// Destination container
    pub container: String,
    /// Blob key
    pub blob_key: BlobKey,
    /// Serialized size
    pub bytes: usize,
    /// Items in the document
    pub items: usize,
    /// False for dry runs
    pub written: bool,
}

/// Writes snapshots to the blob store
pub struct BlobExporter {
    blobs: SharedBlobStore,
    container: String,
    format: ExportFormat,
    key_prefix: String,
    region: String,
    timestamp: String,
    dry_run: bool,
}

impl BlobExporter {
    /// Create an exporter
    pub fn new(
        blobs: SharedBlobStore,
        container: impl Into<String>,
        format: ExportFormat,
        key_prefix: impl Into<String>,
        region: impl Into<String>,
        started_at: DateTime<Utc>,
    ) -> Self {
        Self {
            blobs,
            container: container.into(),
            format,
            key_prefix: key_prefix.into(),
            region: region.into(),
            timestamp: run_timestamp(started_at),
            dry_run: false,
        }
    }

    /// Serialize without writing
    pub fn dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    /// Blob key for a table
    pub fn blob_key(&self, table: &TableName) -> Result<BlobKey> {
        let key = format!(
            "{}-{}-{}-{}.{}",
            self.key_prefix,
            table,
            self.region,
            self.timestamp,
            self.format.extension()
        );
        BlobKey::new(key).map_err(FerryError::Configuration)
    }

    /// Write one snapshot as one blob
    ///
    /// # Errors
    ///
    /// Serialization failures, and the blob store's error when the write
    /// fails.
    pub async fn export(&self, snapshot: &Snapshot) -> Result<ExportReceipt> {
        let blob_key = self.blob_key(&snapshot.table)?;
        let body = serialize(snapshot, self.format)?;
        let bytes = body.len();

        if self.dry_run {
            tracing::info!(
                table = %snapshot.table,
                blob = %blob_key,
                bytes,
                "Dry run: export not written"
            );
        } else {
            self.blobs
                .put(&self.container, &blob_key, body, self.format.content_type())
                .await?;
            tracing::info!(
                table = %snapshot.table,
                container = %self.container,
                blob = %blob_key,
                items = snapshot.len(),
                bytes,
                "Export written"
            );
        }

        Ok(ExportReceipt {
            container: self.container.clone(),
            blob_key,
            bytes,
            items: snapshot.len(),
            written: !self.dry_run,
        })
    }
}

/// Serialize a snapshot in the given format
///
/// JSON is a pretty-printed array of objects. CSV uses the union of field
/// names in first-seen order as its header; missing fields are empty.
pub fn serialize(snapshot: &Snapshot, format: ExportFormat) -> Result<Vec<u8>> {
    match format {
        ExportFormat::Json => Ok(serde_json::to_vec_pretty(&snapshot.items)?),
        ExportFormat::Csv => {
            let header = snapshot.field_names();
            if header.is_empty() {
                return Ok(Vec::new());
            }

            let mut writer = csv::Writer::from_writer(Vec::new());
            writer.write_record(&header)?;
            for item in &snapshot.items {
                writer.write_record(header.iter().map(|name| cell(item, name)))?;
            }
            writer
                .into_inner()
                .map_err(|e| FerryError::Serialization(e.to_string()))
        }
    }
}

fn cell(item: &Record, name: &str) -> String {
    item.get(name).map(Record::render_value).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::blob::MemoryBlobStore;
    use crate::domain::ErrorKind;
    use chrono::TimeZone;
    use serde_json::{json, Value};
    use std::sync::Arc;

    fn started() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 9, 7, 5, 1).unwrap()
    }

    fn snapshot() -> Snapshot {
        Snapshot {
            table: TableName::new("users").unwrap(),
            items: vec![
                [("id", json!("1")), ("name", json!("Ada")), ("age", json!(36))]
                    .into_iter()
                    .collect(),
                [("id", json!("2")), ("email", json!("g@navy.mil"))]
                    .into_iter()
                    .collect(),
            ],
            pages: 1,
        }
    }

    fn exporter(blobs: Arc<MemoryBlobStore>, format: ExportFormat) -> BlobExporter {
        BlobExporter::new(blobs, "exports", format, "source", "eu-west-1", started())
    }

    #[test]
    fn test_run_timestamp_format() {
        assert_eq!(run_timestamp(started()), "2024-03-09-07:05:01");
    }

    #[test]
    fn test_blob_key_pattern() {
        let exporter = exporter(Arc::new(MemoryBlobStore::new()), ExportFormat::Json);
        let key = exporter.blob_key(&TableName::new("users").unwrap()).unwrap();
        assert_eq!(key.as_str(), "source-users-eu-west-1-2024-03-09-07:05:01.json");
    }

    #[test]
    fn test_json_document_is_array_of_objects() {
        let body = serialize(&snapshot(), ExportFormat::Json).unwrap();
        let doc: Value = serde_json::from_slice(&body).unwrap();
        let items = doc.as_array().unwrap();
        assert_eq!(items.len(), 2);
        assert_eq!(items[0]["age"], 36);
    }

    #[test]
    fn test_csv_header_is_field_union() {
        let body = serialize(&snapshot(), ExportFormat::Csv).unwrap();
        let text = String::from_utf8(body).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "id,name,age,email");
        assert_eq!(lines[1], "1,Ada,36,");
        assert_eq!(lines[2], "2,,,g@navy.mil");
    }

    #[test]
    fn test_empty_snapshot() {
        let empty = Snapshot {
            table: TableName::new("users").unwrap(),
            items: vec![],
            pages: 1,
        };
        assert_eq!(serialize(&empty, ExportFormat::Json).unwrap(), b"[]");
        assert!(serialize(&empty, ExportFormat::Csv).unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_export_writes_one_blob() {
        let blobs = Arc::new(MemoryBlobStore::new());
        let receipt = exporter(blobs.clone(), ExportFormat::Csv)
            .export(&snapshot())
            .await
            .unwrap();

        assert!(receipt.written);
        assert_eq!(receipt.items, 2);
        let keys = blobs.keys("exports").await;
        assert_eq!(keys, vec![receipt.blob_key.to_string()]);
        let stored = blobs.object("exports", receipt.blob_key.as_str()).await.unwrap();
        assert_eq!(stored.content_type, "text/csv");
        assert_eq!(stored.body.len(), receipt.bytes);
    }

    #[tokio::test]
    async fn test_dry_run_writes_nothing() {
        let blobs = Arc::new(MemoryBlobStore::new());
        let receipt = exporter(blobs.clone(), ExportFormat::Json)
            .dry_run(true)
            .export(&snapshot())
            .await
            .unwrap();

        assert!(!receipt.written);
        assert!(receipt.bytes > 0);
        assert!(blobs.keys("exports").await.is_empty());
    }

    #[tokio::test]
    async fn test_rejected_write_is_blob_write_error() {
        let blobs = Arc::new(MemoryBlobStore::new());
        blobs.reject_writes("exports").await;

        let err = exporter(blobs, ExportFormat::Json)
            .export(&snapshot())
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::BlobWrite);
    }
}
