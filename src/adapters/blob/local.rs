//! Local directory blob store
//!
//! Objects live at `<root>/<container>/<key>`. Writes go to a sibling
//! temporary file that is renamed over the object once complete, so a
//! failed write never leaves a truncated object behind.

use super::traits::{validate_container, BlobStore};
use crate::domain::{BlobError, BlobKey, Result};
use async_trait::async_trait;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

/// Filesystem-backed [`BlobStore`]
#[derive(Debug, Clone)]
pub struct LocalBlobStore {
    root: PathBuf,
}

impl LocalBlobStore {
    /// Create a store rooted at `root`
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Root directory
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn object_path(&self, container: &str, key: &BlobKey) -> Result<PathBuf> {
        validate_container(container)?;
        Ok(self.root.join(container).join(key.as_str()))
    }
}

#[async_trait]
impl BlobStore for LocalBlobStore {
    fn backend_name(&self) -> &'static str {
        "local"
    }

    async fn get(&self, container: &str, key: &BlobKey) -> Result<Vec<u8>> {
        let path = self.object_path(container, key)?;
        tokio::fs::read(&path).await.map_err(|e| {
            let location = format!("{container}/{key}");
            let err = match e.kind() {
                ErrorKind::NotFound => BlobError::NotFound(location),
                ErrorKind::PermissionDenied => BlobError::AccessDenied(location),
                _ => BlobError::ReadFailed(format!("{location}: {e}")),
            };
            err.into()
        })
    }

    async fn put(
        &self,
        container: &str,
        key: &BlobKey,
        body: Vec<u8>,
        _content_type: &str,
    ) -> Result<()> {
        let path = self.object_path(container, key)?;
        let location = format!("{container}/{key}");
        let map_err = |e: std::io::Error| match e.kind() {
            ErrorKind::PermissionDenied => BlobError::AccessDenied(location.clone()),
            _ => BlobError::WriteFailed(format!("{location}: {e}")),
        };

        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await.map_err(map_err)?;
        }

        let staging = staging_path(&path);
        let written = match tokio::fs::write(&staging, body).await {
            Ok(()) => tokio::fs::rename(&staging, &path).await,
            Err(e) => Err(e),
        };
        if let Err(e) = written {
            let _ = tokio::fs::remove_file(&staging).await;
            return Err(map_err(e).into());
        }

        tracing::debug!(path = %path.display(), "Blob written");
        Ok(())
    }
}

fn staging_path(path: &Path) -> PathBuf {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    path.with_file_name(format!(".{name}.{}.partial", std::process::id()))
}
