//! Embedding provider trait and mock implementation.
//!
//! This module defines the `EmbeddingProvider` trait that abstracts over
//! different embedding generation backends (fastembed, remote APIs, etc.).
//!
//! # Providers
//!
//! - `MockEmbeddingProvider`: Deterministic hashed bag-of-words vectors
//! - `FastEmbedProvider`: Local embedding via fastembed (requires `vector-fastembed` feature)

use crate::types::StoreConfig;
use async_trait::async_trait;
use hearth_core::{Error, Result};
use std::sync::Arc;

/// Dimension used by the mock provider when none is configured.
pub const DEFAULT_MOCK_DIMENSION: usize = 384;

/// Trait for generating text embeddings.
///
/// Implementations wrap specific embedding libraries and provide a uniform
/// async interface. The trait requires `Send + Sync` so a provider can be
/// shared between the indexer and concurrent searches.
///
/// # Thread Safety
///
/// Implementations should handle internal synchronization (e.g., `Arc<Mutex<>>`)
/// for thread-unsafe underlying libraries.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Generate an embedding for a query string.
    async fn embed_query(&self, text: &str) -> Result<Vec<f32>>;

    /// Generate embeddings for a batch of document texts.
    ///
    /// Default implementation calls `embed_query` for each text sequentially.
    /// Backends that support native batching should override this.
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let mut results = Vec::with_capacity(texts.len());
        for text in texts {
            results.push(self.embed_query(text).await?);
        }
        Ok(results)
    }

    /// The embedding dimension.
    fn dimension(&self) -> usize;

    /// The provider name for diagnostics.
    fn name(&self) -> &str;

    /// The model identifier.
    fn model(&self) -> &str {
        self.name()
    }
}

/// Check that a batch result has one vector per text and the expected width.
pub fn validate_embeddings(vectors: &[Vec<f32>], expected: usize, dimension: usize) -> Result<()> {
    if vectors.len() != expected {
        return Err(Error::embedding(format!(
            "Provider returned {} vectors for {expected} texts",
            vectors.len()
        )));
    }
    if let Some((i, v)) = vectors.iter().enumerate().find(|(_, v)| v.len() != dimension) {
        return Err(Error::embedding(format!(
            "Vector {i} has dimension {}, expected {dimension}",
            v.len()
        )));
    }
    if vectors.iter().flatten().any(|x| !x.is_finite()) {
        return Err(Error::embedding("Provider returned non-finite values"));
    }
    Ok(())
}

/// A mock embedding provider for testing.
///
/// Hashes each lowercase token into a bucket and L2-normalizes the counts,
/// so texts sharing words land close together and the same text always
/// yields the same vector.
#[derive(Debug, Clone)]
pub struct MockEmbeddingProvider {
    dimension: usize,
}

impl MockEmbeddingProvider {
    /// Create a new mock provider with the given dimension.
    pub fn new(dimension: usize) -> Self {
        Self {
            dimension: dimension.max(1),
        }
    }

    fn deterministic_embedding(&self, text: &str) -> Vec<f32> {
        let mut embedding = vec![0.0f32; self.dimension];
        for token in crate::hybrid::tokenize(text) {
            let bucket = (fnv1a(token.as_bytes()) % self.dimension as u64) as usize;
            embedding[bucket] += 1.0;
        }

        let norm: f32 = embedding.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 {
            for val in &mut embedding {
                *val /= norm;
            }
        }
        embedding
    }
}

impl Default for MockEmbeddingProvider {
    fn default() -> Self {
        Self::new(DEFAULT_MOCK_DIMENSION)
    }
}

fn fnv1a(bytes: &[u8]) -> u64 {
    let mut hash: u64 = 0xcbf2_9ce4_8422_2325;
    for b in bytes {
        hash ^= u64::from(*b);
        hash = hash.wrapping_mul(0x0100_0000_01b3);
    }
    hash
}

#[async_trait]
impl EmbeddingProvider for MockEmbeddingProvider {
    async fn embed_query(&self, text: &str) -> Result<Vec<f32>> {
        Ok(self.deterministic_embedding(text))
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        Ok(texts
            .iter()
            .map(|t| self.deterministic_embedding(t))
            .collect())
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn name(&self) -> &str {
        "mock"
    }
}

/// Create an embedding provider from configuration.
///
/// Returns `Ok(None)` for provider "none".
pub fn create_embedding_provider(config: &StoreConfig) -> Result<Option<Arc<dyn EmbeddingProvider>>> {
    match config.provider.as_str() {
        "none" => Ok(None),
        "mock" => {
            let dimension = if config.dimension == 0 {
                DEFAULT_MOCK_DIMENSION
            } else {
                config.dimension
            };
            Ok(Some(Arc::new(MockEmbeddingProvider::new(dimension))))
        }
        #[cfg(feature = "vector-fastembed")]
        "fastembed" => {
            let provider = crate::fastembed::FastEmbedProvider::new(&config.model, None)?;
            Ok(Some(Arc::new(provider)))
        }
        #[cfg(not(feature = "vector-fastembed"))]
        "fastembed" => Err(Error::config(
            "Provider 'fastembed' requires the vector-fastembed feature",
        )),
        other => Err(Error::config(format!(
            "Unknown embedding provider: '{other}'. Expected mock, fastembed or none"
        ))),
    }
}

// ============================================================================
// Tests
// ============================================================================
