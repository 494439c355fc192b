//! Backing vector index trait and in-memory implementation.
//!
//! A backing index owns `(id, vector, text, metadata)` records and answers
//! filtered nearest-neighbour queries with raw distances. It is not assumed
//! to be thread-safe: the store serializes every call behind one lock, so
//! mutating operations take `&mut self`.
//!
//! # Implementations
//!
//! - `MemoryIndex`: exact search over a `Vec`, optional JSON snapshot on disk
//! - `LancedbIndex`: LanceDB table (requires `vector-lancedb` feature)

use crate::embedding::EmbeddingProvider;
use crate::filter::{SearchFilter, matches_filter};
use crate::persistence::{self, IndexMetadata};
use crate::types::{Document, IndexRecord, StoreConfig};
use async_trait::async_trait;
use hearth_core::{Error, Result};
use log::{debug, info, warn};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// A backing vector index.
#[async_trait]
pub trait VectorIndex: Send + Sync {
    /// Which of the given ids are already stored.
    async fn existing_ids(&self, ids: &[String]) -> Result<HashSet<String>>;

    /// Fetch documents by id. Unknown ids are skipped.
    async fn get(&self, ids: &[String]) -> Result<Vec<Document>>;

    /// Insert records. Ids already stored are skipped, never overwritten.
    ///
    /// Returns the number of records inserted.
    async fn add(&mut self, records: Vec<IndexRecord>) -> Result<usize>;

    /// Delete by id; returns the number removed.
    async fn delete(&mut self, ids: &[String]) -> Result<usize>;

    /// Delete every record matching the filter; returns the number removed.
    async fn delete_where(&mut self, filter: &SearchFilter) -> Result<usize>;

    /// Nearest neighbours of `vector`, closest first, with raw distances.
    async fn search(
        &self,
        vector: &[f32],
        k: usize,
        filter: Option<&SearchFilter>,
    ) -> Result<Vec<(Document, f32)>>;

    /// Documents matching the filter without vector ranking.
    async fn scan(&self, filter: Option<&SearchFilter>, limit: usize) -> Result<Vec<Document>>;

    /// Number of stored records.
    async fn count(&self) -> Result<usize>;

    /// Remove every record.
    async fn clear(&mut self) -> Result<()>;

    /// Backend name for diagnostics.
    fn name(&self) -> &str;
}

/// Squared Euclidean distance.
pub fn squared_l2(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b).map(|(x, y)| (x - y) * (x - y)).sum()
}

// ============================================================================
// Memory index
// ============================================================================

/// Exact in-process index.
///
/// When opened with a path, the full record set is written as a JSON
/// snapshot after every mutation and reloaded on the next open.
#[derive(Debug, Default)]
pub struct MemoryIndex {
    records: Vec<IndexRecord>,
    ids: HashSet<String>,
    dimension: Option<usize>,
    snapshot_path: Option<PathBuf>,
    provider: String,
    model: String,
}

impl MemoryIndex {
    /// An empty, non-persistent index.
    pub fn new() -> Self {
        Self::default()
    }

    /// Open a persistent index at `path`, reloading any compatible snapshot.
    ///
    /// A snapshot built with a different embedding dimension is ignored
    /// (with a warning) and overwritten on the next mutation.
    pub fn open(path: impl AsRef<Path>, provider: &dyn EmbeddingProvider) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let mut index = Self {
            snapshot_path: Some(path.clone()),
            provider: provider.name().to_string(),
            model: provider.model().to_string(),
            ..Self::default()
        };

        match persistence::load_snapshot(&path)? {
            Some(snapshot) if snapshot.metadata.is_compatible(provider.dimension()) => {
                info!(
                    "Reloaded {} records from {}",
                    snapshot.records.len(),
                    path.display()
                );
                for record in snapshot.records {
                    index.insert(record);
                }
            }
            Some(snapshot) => {
                warn!(
                    "Ignoring snapshot at {}: dimension {} does not match provider dimension {}",
                    path.display(),
                    snapshot.metadata.embedding_dimension,
                    provider.dimension()
                );
            }
            None => debug!("No snapshot at {}; starting empty", path.display()),
        }

        Ok(index)
    }

    /// Where the snapshot is written, if persistent.
    pub fn snapshot_path(&self) -> Option<&Path> {
        self.snapshot_path.as_deref()
    }

    fn insert(&mut self, record: IndexRecord) -> bool {
        if self.ids.contains(&record.document.id) {
            return false;
        }
        self.dimension.get_or_insert(record.dimension());
        self.ids.insert(record.document.id.clone());
        self.records.push(record);
        true
    }

    /// Install `records` as the committed state.
    fn replace(&mut self, records: Vec<IndexRecord>) {
        self.ids = records.iter().map(|r| r.document.id.clone()).collect();
        self.dimension = records.first().map(IndexRecord::dimension);
        self.records = records;
    }

    /// Snapshot `records` if persistent. Nothing in memory changes here.
    async fn write_snapshot(&self, records: &[IndexRecord]) -> Result<()> {
        let Some(path) = &self.snapshot_path else {
            return Ok(());
        };
        let metadata = IndexMetadata::new(
            records.len(),
            records.first().map_or(0, IndexRecord::dimension),
            self.provider.clone(),
            self.model.clone(),
        );
        persistence::save_snapshot(path, &metadata, records).await
    }

    /// Drop records failing `keep`; memory changes only after the snapshot
    /// is written.
    async fn commit_retain<F>(&mut self, keep: F) -> Result<usize>
    where
        F: Fn(&IndexRecord) -> bool + Send,
    {
        let kept: Vec<IndexRecord> = self.records.iter().filter(|r| keep(r)).cloned().collect();
        let removed = self.records.len() - kept.len();
        if removed > 0 {
            self.write_snapshot(&kept).await?;
            self.replace(kept);
        }
        Ok(removed)
    }
}

#[async_trait]
impl VectorIndex for MemoryIndex {
    async fn existing_ids(&self, ids: &[String]) -> Result<HashSet<String>> {
        Ok(ids.iter().filter(|id| self.ids.contains(*id)).cloned().collect())
    }

    async fn get(&self, ids: &[String]) -> Result<Vec<Document>> {
        Ok(ids
            .iter()
            .filter_map(|id| self.records.iter().find(|r| &r.document.id == id))
            .map(|r| r.document.clone())
            .collect())
    }

    async fn add(&mut self, records: Vec<IndexRecord>) -> Result<usize> {
        let expected = self.dimension.or_else(|| records.first().map(IndexRecord::dimension));
        if let Some(dim) = expected
            && let Some(bad) = records.iter().find(|r| r.dimension() != dim)
        {
            return Err(Error::backend(format!(
                "Record '{}' has dimension {}, index expects {dim}",
                bad.document.id,
                bad.dimension()
            )));
        }

        let before = self.records.len();
        let mut inserted = 0;
        for record in records {
            if self.insert(record) {
                inserted += 1;
            }
        }

        let written = self.write_snapshot(&self.records).await;
        if let Err(e) = written {
            let rolled_back: Vec<String> = self.records[before..]
                .iter()
                .map(|r| r.document.id.clone())
                .collect();
            self.records.truncate(before);
            for id in rolled_back {
                self.ids.remove(&id);
            }
            if self.records.is_empty() {
                self.dimension = None;
            }
            return Err(e);
        }
        Ok(inserted)
    }

    async fn delete(&mut self, ids: &[String]) -> Result<usize> {
        let doomed: HashSet<&String> = ids.iter().collect();
        self.commit_retain(|r| !doomed.contains(&r.document.id)).await
    }

    async fn delete_where(&mut self, filter: &SearchFilter) -> Result<usize> {
        self.commit_retain(|r| !filter.matches(&r.document.metadata)).await
    }

    async fn search(
        &self,
        vector: &[f32],
        k: usize,
        filter: Option<&SearchFilter>,
    ) -> Result<Vec<(Document, f32)>> {
        if let Some(dim) = self.dimension
            && dim != vector.len()
        {
            return Err(Error::backend(format!(
                "Query vector has dimension {}, index expects {dim}",
                vector.len()
            )));
        }

        let mut hits: Vec<(&IndexRecord, f32)> = self
            .records
            .iter()
            .filter(|r| matches_filter(filter, &r.document.metadata))
            .map(|r| (r, squared_l2(&r.embedding, vector)))
            .collect();
        hits.sort_by(|a, b| a.1.total_cmp(&b.1));
        hits.truncate(k);

        Ok(hits
            .into_iter()
            .map(|(r, d)| (r.document.clone(), d))
            .collect())
    }

    async fn scan(&self, filter: Option<&SearchFilter>, limit: usize) -> Result<Vec<Document>> {
        Ok(self
            .records
            .iter()
            .filter(|r| matches_filter(filter, &r.document.metadata))
            .take(limit)
            .map(|r| r.document.clone())
            .collect())
    }

    async fn count(&self) -> Result<usize> {
        Ok(self.records.len())
    }

    async fn clear(&mut self) -> Result<()> {
        self.write_snapshot(&[]).await?;
        self.replace(Vec::new());
        Ok(())
    }

    fn name(&self) -> &str {
        "memory"
    }
}

// ============================================================================
// Factory
// ============================================================================

/// Default database directory when none is configured.
pub const DEFAULT_DB_PATH: &str = "./data/vector_db";

/// Create the backing index named by the configuration.
///
/// Returns `Ok(None)` for backend "none" or when there is no embedding
/// provider to produce vectors.
pub async fn create_vector_index(
    config: &StoreConfig,
    provider: Option<&Arc<dyn EmbeddingProvider>>,
) -> Result<Option<Box<dyn VectorIndex>>> {
    if config.backend == "none" {
        return Ok(None);
    }
    let Some(provider) = provider else {
        warn!(
            "Backend '{}' needs an embedding provider; running without a backing index",
            config.backend
        );
        return Ok(None);
    };
    let db_path = config.db_path.as_deref().unwrap_or(DEFAULT_DB_PATH);

    match config.backend.as_str() {
        "memory" if config.persist => {
            let path = Path::new(db_path).join(format!("{}.json", config.collection));
            Ok(Some(Box::new(MemoryIndex::open(path, provider.as_ref())?)))
        }
        "memory" => Ok(Some(Box::new(MemoryIndex::new()))),
        #[cfg(feature = "vector-lancedb")]
        "lancedb" => {
            let index =
                crate::lancedb::LancedbIndex::open(db_path, &config.collection, provider.as_ref())
                    .await?;
            Ok(Some(Box::new(index)))
        }
        #[cfg(not(feature = "vector-lancedb"))]
        "lancedb" => Err(Error::config(
            "Backend 'lancedb' requires the vector-lancedb feature",
        )),
        other => Err(Error::config(format!(
            "Unknown vector backend: '{other}'. Expected memory, lancedb or none"
        ))),
    }
}

// ============================================================================
// Tests
// ============================================================================
