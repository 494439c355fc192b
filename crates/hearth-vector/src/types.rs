//! Common types for the listing search engine.
//!
//! These types are shared by the backing indexes, the fallback cache, the
//! ranker and the store, and are always available regardless of feature
//! flags.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

// ============================================================================
// Configuration
// ============================================================================

/// Store configuration.
///
/// Controls backend selection, embedding model, storage paths, and the
/// candidate over-fetching used by hybrid search.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Backing index type: "memory", "lancedb" or "none".
    pub backend: String,

    /// Embedding provider: "mock", "fastembed" or "none".
    pub provider: String,

    /// Embedding model name (e.g., "bge-small-en-v1.5").
    pub model: String,

    /// Embedding dimension for providers that cannot detect it (0 = default).
    pub dimension: usize,

    /// Path to the vector database directory.
    pub db_path: Option<String>,

    /// Collection (table) name inside the database.
    pub collection: String,

    /// Whether the backing index is persisted to `db_path` (default on).
    pub persist: bool,

    /// Batch size for embedding operations.
    pub batch_size: usize,

    /// Default number of results.
    pub default_k: usize,

    /// Default weight of vector similarity in hybrid search.
    pub default_alpha: f64,

    /// Candidate multiplier for plain hybrid queries.
    pub fetch_multiplier: usize,

    /// Candidate multiplier when sorting or radius filtering runs after retrieval.
    pub post_process_multiplier: usize,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: "memory".to_string(),
            provider: "mock".to_string(),
            model: "bge-small-en-v1.5".to_string(),
            dimension: 0,
            db_path: None,
            collection: "properties".to_string(),
            persist: true,
            batch_size: 100,
            default_k: 5,
            default_alpha: 0.7,
            fetch_multiplier: 3,
            post_process_multiplier: 5,
        }
    }
}

// ============================================================================
// Metadata
// ============================================================================

/// A primitive metadata value.
///
/// Metadata is restricted to primitives; structured values are dropped at
/// the boundary by [`MetadataValue::from_json`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MetadataValue {
    /// Boolean flag.
    Bool(bool),
    /// Numeric value (integers are widened to `f64`).
    Number(f64),
    /// Free-form string.
    String(String),
    /// Explicit null.
    Null,
}

impl MetadataValue {
    /// Convert a JSON value, dropping anything that is not a finite primitive.
    pub fn from_json(value: &serde_json::Value) -> Option<Self> {
        match value {
            serde_json::Value::Null => Some(Self::Null),
            serde_json::Value::Bool(b) => Some(Self::Bool(*b)),
            serde_json::Value::Number(n) => n.as_f64().filter(|f| f.is_finite()).map(Self::Number),
            serde_json::Value::String(s) => Some(Self::String(s.clone())),
            serde_json::Value::Array(_) | serde_json::Value::Object(_) => None,
        }
    }

    /// Convert back to JSON.
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Self::Bool(b) => serde_json::Value::Bool(*b),
            Self::Number(n) => serde_json::Number::from_f64(*n)
                .map(serde_json::Value::Number)
                .unwrap_or(serde_json::Value::Null),
            Self::String(s) => serde_json::Value::String(s.clone()),
            Self::Null => serde_json::Value::Null,
        }
    }

    /// Numeric view of the value.
    ///
    /// Numbers coerce directly and strings coerce when they parse as a
    /// finite float. Booleans and nulls are not numeric.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Number(n) => Some(*n),
            Self::String(s) => s.trim().parse::<f64>().ok().filter(|f| f.is_finite()),
            Self::Bool(_) | Self::Null => None,
        }
    }

    /// String view of the value.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    /// Boolean view of the value.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Whether this is an explicit null.
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Loose equality: numbers compare numerically, everything else exactly.
    pub fn loosely_equals(&self, other: &MetadataValue) -> bool {
        match (self, other) {
            (Self::Number(a), Self::Number(b)) => (a - b).abs() < f64::EPSILON,
            (a, b) => a == b,
        }
    }
}

impl fmt::Display for MetadataValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bool(b) => write!(f, "{b}"),
            Self::Number(n) => write!(f, "{n}"),
            Self::String(s) => f.write_str(s),
            Self::Null => f.write_str("null"),
        }
    }
}

impl From<&str> for MetadataValue {
    fn from(value: &str) -> Self {
        Self::String(value.to_string())
    }
}

impl From<String> for MetadataValue {
    fn from(value: String) -> Self {
        Self::String(value)
    }
}

impl From<bool> for MetadataValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<f64> for MetadataValue {
    fn from(value: f64) -> Self {
        if value.is_finite() {
            Self::Number(value)
        } else {
            Self::Null
        }
    }
}

impl From<i64> for MetadataValue {
    fn from(value: i64) -> Self {
        Self::Number(value as f64)
    }
}

impl From<i32> for MetadataValue {
    fn from(value: i32) -> Self {
        Self::Number(f64::from(value))
    }
}

/// Ordered mapping of field name to primitive value.
pub type Metadata = BTreeMap<String, MetadataValue>;

/// Metadata key holding a listing's source URL.
pub const SOURCE_FIELD: &str = "source_url";

// ============================================================================
// Documents
// ============================================================================

/// A document ready for indexing.
///
/// `text` is what gets embedded and lexically scored; `metadata` drives
/// filtering, geo checks and sorting. Documents are immutable once
/// committed; updates are a delete followed by an insert.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    /// Unique document identifier.
    pub id: String,

    /// Searchable text.
    pub text: String,

    /// Primitive metadata.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub metadata: Metadata,
}

impl Document {
    /// Create a new document.
    pub fn new(id: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            text: text.into(),
            metadata: Metadata::new(),
        }
    }

    /// Add a metadata key-value pair. Null values are not stored.
    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<MetadataValue>) -> Self {
        let value = value.into();
        if !value.is_null() {
            self.metadata.insert(key.into(), value);
        }
        self
    }

    /// Look up a metadata value.
    pub fn get(&self, key: &str) -> Option<&MetadataValue> {
        self.metadata.get(key)
    }

    /// Numeric metadata value, if present and numeric.
    pub fn number(&self, key: &str) -> Option<f64> {
        self.get(key).and_then(MetadataValue::as_f64)
    }

    /// The listing source this document came from.
    pub fn source(&self) -> Option<&str> {
        self.get(SOURCE_FIELD).and_then(MetadataValue::as_str)
    }
}

/// A document with its computed embedding vector.
///
/// Only the backing index keeps these; the store drops vectors after commit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexRecord {
    /// The original document.
    pub document: Document,

    /// The embedding vector.
    pub embedding: Vec<f32>,
}

impl IndexRecord {
    /// Create a new index record.
    pub fn new(document: Document, embedding: Vec<f32>) -> Self {
        Self {
            document,
            embedding,
        }
    }

    /// The embedding dimension.
    pub fn dimension(&self) -> usize {
        self.embedding.len()
    }
}

// ============================================================================
// Search types
// ============================================================================

/// A ranked search hit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredResult {
    /// The matched document.
    pub document: Document,

    /// Ranking score (higher is better).
    pub score: f64,
}

impl ScoredResult {
    /// Create a new scored result.
    pub fn new(document: Document, score: f64) -> Self {
        Self { document, score }
    }
}

/// Direction of a metadata sort.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    /// Smallest first.
    Asc,
    /// Largest first.
    #[default]
    Desc,
}

impl FromStr for SortOrder {
    type Err = hearth_core::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "asc" | "ascending" => Ok(Self::Asc),
            "desc" | "descending" => Ok(Self::Desc),
            other => Err(hearth_core::Error::invalid_data(format!(
                "Unknown sort order: '{other}'. Expected 'asc' or 'desc'"
            ))),
        }
    }
}

impl fmt::Display for SortOrder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Asc => f.write_str("asc"),
            Self::Desc => f.write_str("desc"),
        }
    }
}

// ============================================================================
// Index statistics
// ============================================================================

/// Snapshot of what the store currently holds.
///
/// Recomputed on every call; never cached.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexStats {
    /// Backing index count when non-zero, otherwise the fallback cache count.
    pub total_documents: usize,

    /// Documents committed to the backing index.
    pub backend_documents: usize,

    /// Documents held by the fallback cache.
    pub cache_documents: usize,

    /// Collection name.
    pub collection: String,

    /// Database path, when persisted.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub db_path: Option<String>,

    /// Backing index name ("memory", "lancedb", or "none").
    pub backend: String,

    /// Embedding provider name ("none" when absent).
    pub embedding_provider: String,

    /// Embedding model name ("none" when absent).
    pub embedding_model: String,

    /// Whether a background indexing job is running.
    pub indexing_in_progress: bool,
}

// ============================================================================
// Tests
// ============================================================================
