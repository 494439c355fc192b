//! Hybrid search engine for property listings.
//!
//! This crate indexes listings into a vector store and answers queries
//! that combine semantic similarity, BM25 keyword scoring, metadata
//! filters, geographic restrictions and field sorting. When the vector
//! store is missing or failing, searches degrade to keyword scoring over
//! an in-memory fallback cache.
//!
//! # Features
//!
//! - `vector-lancedb`: Enable LanceDB-based vector storage and ANN search
//! - `vector-fastembed`: Enable local embedding generation via fastembed
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      hearth-vector                          │
//! ├─────────────────────────────────────────────────────────────┤
//! │  ListingStore (indexing coordinator + search entry points)  │
//! │  ├── IndexWorker (single-flight background indexing)        │
//! │  └── FallbackCache (degraded keyword search)                │
//! ├─────────────────────────────────────────────────────────────┤
//! │  EmbeddingProvider trait                                    │
//! │  ├── MockEmbeddingProvider (always available)               │
//! │  └── FastEmbedProvider (feature: vector-fastembed)          │
//! ├─────────────────────────────────────────────────────────────┤
//! │  VectorIndex trait                                          │
//! │  ├── MemoryIndex (in-memory, optional JSON snapshot)        │
//! │  └── LancedbIndex (feature: vector-lancedb)                 │
//! ├─────────────────────────────────────────────────────────────┤
//! │  FilterBuilder / SearchFilter (request → conditions)        │
//! │  Geo (bounding box pre-filter, haversine post-check)        │
//! │  HybridRanker (BM25 + similarity blend), sort stage         │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Example
//!
//! ```rust,ignore
//! use hearth_vector::{HybridSearchParams, ListingStore, SortOrder, StoreConfig};
//!
//! let store = ListingStore::from_config(StoreConfig::default()).await?;
//! store.index(listings, 100).await;
//!
//! let params = HybridSearchParams::new("quiet flat with balcony")
//!     .with_filter("city", "Warsaw")
//!     .with_filter("rooms", 2)
//!     .with_sort("price", SortOrder::Asc)
//!     .with_k(10);
//!
//! for result in store.hybrid_search(&params).await {
//!     println!("{}: {:.3}", result.document.id, result.score);
//! }
//! ```

// Core modules (always available)
pub mod backend;
pub mod embedding;
pub mod types;

// Query shaping
pub mod filter;
pub mod geo;
pub mod hybrid;
pub mod sort;

// Indexing and storage
pub mod cache;
pub mod listing;
pub mod persistence;
pub mod store;
pub mod worker;

// Feature-gated backend modules
#[cfg(feature = "vector-fastembed")]
pub mod fastembed;

#[cfg(feature = "vector-lancedb")]
pub mod lancedb;

// Re-exports: core types
pub use types::{
    Document, IndexRecord, IndexStats, Metadata, MetadataValue, ScoredResult, SortOrder,
    StoreConfig,
};

// Re-exports: traits
pub use backend::{MemoryIndex, VectorIndex};
pub use embedding::{EmbeddingProvider, MockEmbeddingProvider};
pub use listing::{IntoDocument, Listing, ListingType, PropertyType};

// Re-exports: query shaping
pub use filter::{FilterBuilder, FilterRequest, SearchFilter};
pub use geo::{GeoBounds, GeoRadius};
pub use hybrid::HybridRanker;

// Re-exports: store
pub use cache::FallbackCache;
pub use store::{HybridSearchParams, IndexOptions, ListingStore};
pub use worker::IndexHandle;

// Re-exports: factories
pub use backend::create_vector_index;
pub use embedding::create_embedding_provider;

// Feature-gated re-exports
#[cfg(feature = "vector-fastembed")]
pub use fastembed::FastEmbedProvider;

#[cfg(feature = "vector-lancedb")]
pub use lancedb::LancedbIndex;
