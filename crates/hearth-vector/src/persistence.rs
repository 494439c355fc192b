//! Snapshot persistence for backing indexes.
//!
//! Committed records (vectors included) are written to disk after each
//! mutation so a restart can reload them without re-embedding. Every
//! snapshot carries [`IndexMetadata`], which is checked against the active
//! embedding provider before the records are trusted.

use crate::types::IndexRecord;
use chrono::{DateTime, Utc};
use hearth_core::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Metadata stored alongside a persisted index.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexMetadata {
    /// Number of documents indexed.
    pub document_count: usize,

    /// Embedding dimension.
    pub embedding_dimension: usize,

    /// Build timestamp.
    pub built_at: DateTime<Utc>,

    /// Embedding provider name.
    pub provider: String,

    /// Model name used for embeddings.
    pub model: String,
}

impl IndexMetadata {
    /// Metadata stamped with the current time.
    pub fn new(
        document_count: usize,
        embedding_dimension: usize,
        provider: impl Into<String>,
        model: impl Into<String>,
    ) -> Self {
        Self {
            document_count,
            embedding_dimension,
            built_at: Utc::now(),
            provider: provider.into(),
            model: model.into(),
        }
    }

    /// Whether vectors stored under this metadata can be searched with a
    /// provider of the given dimension.
    ///
    /// An empty index is compatible with anything.
    pub fn is_compatible(&self, dimension: usize) -> bool {
        self.document_count == 0 || self.embedding_dimension == dimension
    }
}

/// Everything a memory index needs to restart.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexSnapshot {
    pub metadata: IndexMetadata,
    pub records: Vec<IndexRecord>,
}

#[derive(Serialize)]
struct SnapshotRef<'a> {
    metadata: &'a IndexMetadata,
    records: &'a [IndexRecord],
}

/// Write a snapshot of `records`, replacing any previous one.
///
/// Encoding runs on the caller; the file write runs on the blocking pool.
pub async fn save_snapshot(
    path: &Path,
    metadata: &IndexMetadata,
    records: &[IndexRecord],
) -> Result<()> {
    let bytes = serde_json::to_vec(&SnapshotRef { metadata, records })?;
    let path = path.to_path_buf();
    tokio::task::spawn_blocking(move || write_atomic(&path, &bytes))
        .await
        .map_err(|e| Error::operation(format!("Snapshot write task failed: {e}")))?
}

/// Load a snapshot. A missing file is not an error.
pub fn load_snapshot(path: &Path) -> Result<Option<IndexSnapshot>> {
    let bytes = match std::fs::read(path) {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(Error::io_with_path(e, path)),
    };
    Ok(Some(serde_json::from_slice(&bytes)?))
}

/// Write to a sibling temp file, then rename over the target.
fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(|e| Error::io_with_path(e, parent))?;
    }
    let tmp = tmp_path(path);
    std::fs::write(&tmp, bytes).map_err(|e| Error::io_with_path(e, &tmp))?;
    std::fs::rename(&tmp, path).map_err(|e| Error::io_with_path(e, path))?;
    Ok(())
}

fn tmp_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().unwrap_or_default().to_os_string();
    name.push(".tmp");
    path.with_file_name(name)
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Document;

    fn snapshot() -> IndexSnapshot {
        IndexSnapshot {
            metadata: IndexMetadata::new(1, 3, "mock", "mock"),
            records: vec![IndexRecord::new(
                Document::new("p1", "flat").with_metadata("city", "Oslo"),
                vec![0.1, 0.2, 0.3],
            )],
        }
    }

    #[tokio::test]
    async fn test_snapshot_reload_keeps_vectors() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("properties.json");
        let expected = snapshot();

        save_snapshot(&path, &expected.metadata, &expected.records)
            .await
            .unwrap();
        let loaded = load_snapshot(&path).unwrap().unwrap();

        assert_eq!(loaded, expected);
        assert_eq!(loaded.records[0].embedding, vec![0.1, 0.2, 0.3]);
        assert!(!tmp_path(&path).exists());
    }

    #[tokio::test]
    async fn test_save_snapshot_failure_leaves_previous() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("properties.json");
        let first = snapshot();
        save_snapshot(&path, &first.metadata, &first.records)
            .await
            .unwrap();

        std::fs::create_dir(tmp_path(&path)).unwrap();
        let empty = IndexMetadata::new(0, 0, "mock", "mock");
        assert!(save_snapshot(&path, &empty, &[]).await.is_err());

        let loaded = load_snapshot(&path).unwrap().unwrap();
        assert_eq!(loaded.records.len(), 1);
    }

    #[test]
    fn test_load_snapshot_missing_is_none() {
        let dir = tempfile::tempdir().unwrap();
        assert!(load_snapshot(&dir.path().join("absent.json")).unwrap().is_none());
    }

    #[test]
    fn test_load_snapshot_corrupt() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.json");
        std::fs::write(&path, "not json").unwrap();
        assert!(matches!(load_snapshot(&path), Err(Error::Serialization(_))));
    }

    #[test]
    fn test_metadata_compatibility() {
        let metadata = IndexMetadata::new(10, 384, "mock", "mock");
        assert!(metadata.is_compatible(384));
        assert!(!metadata.is_compatible(768));
        assert!(IndexMetadata::new(0, 384, "mock", "mock").is_compatible(768));
    }
}
