//! The listing store: indexing coordinator and search entry points.
//!
//! # Locking
//!
//! Two independent locks, never held together:
//!
//! - the fallback cache's own lock, held for one append/read/clear;
//! - the commit lock around the backing index, held for every backend call
//!   (reads included, since the backend is not assumed thread-safe).
//!
//! Embedding runs outside both, so searches never wait on it.
//!
//! # Degraded mode
//!
//! When there is no backing index, or a backend call fails, searches fall
//! back to keyword scoring over the fallback cache. Search methods never
//! return errors; indexing always returns a count.

use crate::backend::{DEFAULT_DB_PATH, VectorIndex, create_vector_index};
use crate::cache::FallbackCache;
use crate::embedding::{EmbeddingProvider, create_embedding_provider, validate_embeddings};
use crate::filter::{FilterBuilder, FilterRequest, SearchFilter};
use crate::geo::{GeoBounds, GeoQuery, GeoRadius};
use crate::hybrid::{HybridRanker, distance_to_similarity};
use crate::listing::IntoDocument;
use crate::sort::{RELEVANCE, sort_results};
use crate::types::{
    Document, IndexRecord, IndexStats, SOURCE_FIELD, ScoredResult, SortOrder, StoreConfig,
};
use crate::worker::{IndexHandle, IndexWorker};
use hearth_core::Result;
use log::{debug, error, info, warn};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::Mutex;

// ============================================================================
// Parameters
// ============================================================================

/// Options for an indexing run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexOptions {
    /// Documents per embedding batch.
    pub batch_size: usize,

    /// Clear the store before indexing.
    pub replace_existing: bool,
}

impl Default for IndexOptions {
    fn default() -> Self {
        Self {
            batch_size: 100,
            replace_existing: false,
        }
    }
}

impl IndexOptions {
    /// Options with the given batch size.
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }

    /// Clear the store before indexing.
    pub fn replacing(mut self) -> Self {
        self.replace_existing = true;
        self
    }
}

/// Parameters for [`ListingStore::hybrid_search`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HybridSearchParams {
    /// Free-text query. Empty means "no lexical component".
    pub query: String,

    /// Field-level filter request.
    pub filters: FilterRequest,

    /// Number of results; the store default when unset.
    pub k: Option<usize>,

    /// Vector weight in [0, 1]; the store default when unset.
    pub alpha: Option<f64>,

    /// Radius restriction.
    pub geo: Option<GeoRadius>,

    /// Explicit box restriction.
    pub bbox: Option<GeoBounds>,

    /// Metadata field to sort by after ranking.
    pub sort_by: Option<String>,

    /// Sort direction.
    pub sort_order: SortOrder,
}

impl HybridSearchParams {
    /// Parameters for a query.
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            ..Self::default()
        }
    }

    /// Add one filter entry.
    pub fn with_filter(mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.filters.insert(key.into(), value.into());
        self
    }

    /// Replace the filter request.
    pub fn with_filters(mut self, filters: FilterRequest) -> Self {
        self.filters = filters;
        self
    }

    /// Number of results.
    pub fn with_k(mut self, k: usize) -> Self {
        self.k = Some(k);
        self
    }

    /// Vector weight.
    pub fn with_alpha(mut self, alpha: f64) -> Self {
        self.alpha = Some(alpha);
        self
    }

    /// Radius restriction from optional parts; incomplete parts disable it.
    pub fn with_radius(mut self, lat: Option<f64>, lon: Option<f64>, radius_km: Option<f64>) -> Self {
        self.geo = GeoRadius::from_parts(lat, lon, radius_km);
        self
    }

    /// Explicit box restriction.
    pub fn with_bbox(mut self, bbox: GeoBounds) -> Self {
        self.bbox = Some(bbox);
        self
    }

    /// Sort by a metadata field.
    pub fn with_sort(mut self, field: impl Into<String>, order: SortOrder) -> Self {
        self.sort_by = Some(field.into());
        self.sort_order = order;
        self
    }

    fn sorts_by_field(&self) -> bool {
        self.sort_by
            .as_deref()
            .is_some_and(|f| !f.trim().is_empty() && f != RELEVANCE)
    }

    fn geo_queries(&self) -> Vec<GeoQuery> {
        let mut queries = Vec::new();
        if let Some(radius) = self.geo {
            queries.push(GeoQuery::Radius(radius));
        }
        if let Some(bbox) = self.bbox.filter(|b| !b.is_unbounded()) {
            queries.push(GeoQuery::Box(bbox));
        }
        queries
    }
}

/// Candidates before final ranking.
enum Candidates {
    /// From the backing index, with raw distances.
    Vector(Vec<(Document, f32)>),
    /// From the fallback cache, already keyword-scored.
    Keyword(Vec<ScoredResult>),
}

// ============================================================================
// Store
// ============================================================================

/// Hybrid search store for property listings.
pub struct ListingStore {
    config: StoreConfig,
    provider: Option<Arc<dyn EmbeddingProvider>>,
    index: Option<Mutex<Box<dyn VectorIndex>>>,
    cache: FallbackCache,
    ranker: HybridRanker,
    filters: FilterBuilder,
    worker: IndexWorker,
}

impl ListingStore {
    /// A store with no provider and no backing index (fallback cache only).
    pub fn new(config: StoreConfig) -> Self {
        Self {
            config,
            provider: None,
            index: None,
            cache: FallbackCache::new(),
            ranker: HybridRanker::default(),
            filters: FilterBuilder::listings(),
            worker: IndexWorker::new(),
        }
    }

    /// Build provider and backing index from configuration.
    ///
    /// Unknown provider or backend names are configuration errors. A
    /// provider or backend that fails to start degrades the store to the
    /// fallback cache instead.
    pub async fn from_config(config: StoreConfig) -> Result<Self> {
        let provider = match create_embedding_provider(&config) {
            Ok(provider) => provider,
            Err(e) if e.is_recoverable() => {
                warn!("Embedding provider unavailable; keyword search only: {e}");
                None
            }
            Err(e) => return Err(e),
        };

        let index = match create_vector_index(&config, provider.as_ref()).await {
            Ok(index) => index,
            Err(e) if e.is_recoverable() => {
                warn!("Backing index unavailable; using fallback cache only: {e}");
                None
            }
            Err(e) => return Err(e),
        };

        let mut store = Self::new(config);
        store.provider = provider;
        store.index = index.map(Mutex::new);
        info!(
            "Listing store ready (backend: {}, provider: {})",
            store.backend_name(),
            store.provider_name()
        );
        Ok(store)
    }

    /// Use an embedding provider.
    pub fn with_provider(mut self, provider: Arc<dyn EmbeddingProvider>) -> Self {
        self.provider = Some(provider);
        self
    }

    /// Use a backing index.
    pub fn with_backend(mut self, index: Box<dyn VectorIndex>) -> Self {
        self.index = Some(Mutex::new(index));
        self
    }

    /// Spawn background indexing onto a specific runtime.
    pub fn with_runtime(mut self, runtime: tokio::runtime::Handle) -> Self {
        self.worker = IndexWorker::with_runtime(runtime);
        self
    }

    /// Use a custom filter mapping.
    pub fn with_filter_builder(mut self, filters: FilterBuilder) -> Self {
        self.filters = filters;
        self
    }

    /// Store configuration.
    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    /// Translate a filter request with this store's field mapping.
    pub fn build_filter(&self, request: &FilterRequest) -> Option<SearchFilter> {
        self.filters.build(request)
    }

    /// Whether a background indexing job is running.
    pub fn is_indexing(&self) -> bool {
        self.worker.is_busy()
    }

    fn backend_name(&self) -> &'static str {
        match (&self.index, &self.provider) {
            (Some(_), Some(_)) => "vector",
            _ => "none",
        }
    }

    fn provider_name(&self) -> String {
        self.provider
            .as_ref()
            .map(|p| p.name().to_string())
            .unwrap_or_else(|| "none".to_string())
    }

    /// Effective on-disk location of the backing index, if it has one.
    fn db_path(&self) -> Option<String> {
        let on_disk = self.config.persist || self.config.backend == "lancedb";
        (self.index.is_some() && on_disk).then(|| {
            self.config
                .db_path
                .clone()
                .unwrap_or_else(|| DEFAULT_DB_PATH.to_string())
        })
    }

    /// Backing index and provider, when both exist.
    fn vector_path(&self) -> Option<(&Mutex<Box<dyn VectorIndex>>, &Arc<dyn EmbeddingProvider>)> {
        self.index.as_ref().zip(self.provider.as_ref())
    }

    // ------------------------------------------------------------------------
    // Indexing
    // ------------------------------------------------------------------------

    /// Index items in batches; returns how many documents were committed.
    pub async fn index<T: IntoDocument>(&self, items: Vec<T>, batch_size: usize) -> usize {
        self.index_with_options(items, IndexOptions::default().with_batch_size(batch_size))
            .await
    }

    /// Index items with explicit options.
    ///
    /// Items that fail conversion are skipped. Ids already in the backing
    /// index are dropped before embedding. Each batch is added to the
    /// fallback cache before it is embedded, then committed under the
    /// commit lock. A failing batch is logged and skipped.
    pub async fn index_with_options<T: IntoDocument>(&self, items: Vec<T>, options: IndexOptions) -> usize {
        if options.replace_existing {
            self.clear().await;
        }

        let documents = convert(items);
        if documents.is_empty() {
            warn!("No valid documents to index");
            return 0;
        }

        let Some((index, provider)) = self.vector_path() else {
            let added = self.cache.append(documents);
            info!("No backing index; cached {added} documents in memory");
            return added;
        };

        let batch_size = options.batch_size.max(1);
        let mut total = 0;

        for (n, chunk) in documents.chunks(batch_size).enumerate() {
            let batch_no = n + 1;
            let mut batch = chunk.to_vec();
            let ids: Vec<String> = batch.iter().map(|d| d.id.clone()).collect();

            let existing = index.lock().await.existing_ids(&ids).await;
            match existing {
                Ok(existing) => batch.retain(|d| !existing.contains(&d.id)),
                Err(e) => warn!("Batch {batch_no}: duplicate check failed, indexing all: {e}"),
            }
            if batch.is_empty() {
                debug!("Batch {batch_no}: every document already indexed");
                continue;
            }

            self.cache.append(batch.iter().cloned());

            let texts: Vec<String> = batch.iter().map(|d| d.text.clone()).collect();
            let vectors = match provider.embed_batch(&texts).await {
                Ok(vectors) => vectors,
                Err(e) => {
                    error!("Batch {batch_no}: embedding failed, skipping {} documents: {e}", batch.len());
                    continue;
                }
            };
            if let Err(e) = validate_embeddings(&vectors, texts.len(), provider.dimension()) {
                error!("Batch {batch_no}: {e}");
                continue;
            }

            let records: Vec<IndexRecord> = batch
                .into_iter()
                .zip(vectors)
                .map(|(doc, vector)| IndexRecord::new(doc, vector))
                .collect();

            let committed = index.lock().await.add(records).await;
            match committed {
                Ok(added) => {
                    total += added;
                    info!("Added batch {batch_no}: {added} documents");
                }
                Err(e) => error!("Batch {batch_no}: commit failed: {e}"),
            }
        }

        if total > 0 {
            info!("Total documents committed: {total}");
        }
        total
    }

    /// Index in the background.
    ///
    /// Single-flight: while a job is running, the running job's handle is
    /// returned and `items` are dropped. Fails only when no Tokio runtime
    /// is available.
    pub fn index_async<T>(self: &Arc<Self>, items: Vec<T>, options: IndexOptions) -> Result<IndexHandle>
    where
        T: IntoDocument + Send + 'static,
    {
        let store = Arc::clone(self);
        self.worker
            .submit(move || async move { store.index_with_options(items, options).await })
    }

    // ------------------------------------------------------------------------
    // Search
    // ------------------------------------------------------------------------

    /// Similarity search.
    ///
    /// With a backing index, scores are `1 / (1 + distance)` in backend
    /// order. In degraded mode, scores are keyword overlap counts.
    pub async fn search(&self, query: &str, k: usize, filter: Option<&SearchFilter>) -> Vec<ScoredResult> {
        match self.candidates(query, k, filter).await {
            Candidates::Vector(hits) => hits
                .into_iter()
                .map(|(doc, distance)| ScoredResult::new(doc, distance_to_similarity(distance)))
                .collect(),
            Candidates::Keyword(results) => results,
        }
    }

    /// Filtered, geo-restricted, re-ranked and optionally sorted search.
    pub async fn hybrid_search(&self, params: &HybridSearchParams) -> Vec<ScoredResult> {
        let k = params.k.unwrap_or(self.config.default_k);
        if k == 0 {
            return Vec::new();
        }
        let alpha = params.alpha.unwrap_or(self.config.default_alpha);

        let geo = params.geo_queries();
        let filter = SearchFilter::all_of(
            self.filters
                .build(&params.filters)
                .into_iter()
                .chain(geo.iter().filter_map(GeoQuery::pre_filter)),
        );

        let post_process = params.sorts_by_field() || geo.iter().any(GeoQuery::needs_post_check);
        let multiplier = if post_process {
            self.config.post_process_multiplier
        } else {
            self.config.fetch_multiplier
        };
        let fetch_k = k.saturating_mul(multiplier.max(1));
        debug!("Hybrid search fetching {fetch_k} candidates (k = {k})");

        let mut results = match self.candidates(&params.query, fetch_k, filter.as_ref()).await {
            Candidates::Vector(mut hits) => {
                hits.retain(|(doc, _)| geo.iter().all(|g| g.accepts(&doc.metadata)));
                self.ranker.rank(&params.query, hits, alpha)
            }
            Candidates::Keyword(mut scored) => {
                scored.retain(|r| geo.iter().all(|g| g.accepts(&r.document.metadata)));
                scored
            }
        };

        sort_results(&mut results, params.sort_by.as_deref(), params.sort_order);
        results.truncate(k);
        results
    }

    /// Documents matching a filter, without query text.
    pub async fn search_by_metadata(&self, filter: Option<&SearchFilter>, k: usize) -> Vec<Document> {
        if let Some(index) = &self.index {
            let scanned = index.lock().await.scan(filter, k).await;
            match scanned {
                Ok(docs) => return docs,
                Err(e) => warn!("Backend scan failed; using fallback cache: {e}"),
            }
        }
        let mut docs = self.cache.matching(filter);
        docs.truncate(k);
        docs
    }

    async fn candidates(&self, query: &str, k: usize, filter: Option<&SearchFilter>) -> Candidates {
        if let Some((index, provider)) = self.vector_path() {
            match vector_candidates(index, provider.as_ref(), query, k, filter).await {
                Ok(hits) => {
                    debug!("Backend returned {} candidates", hits.len());
                    return Candidates::Vector(hits);
                }
                Err(e) => warn!("Backend search failed; using keyword fallback: {e}"),
            }
        }
        Candidates::Keyword(self.cache.search(&self.ranker, query, filter, k))
    }

    // ------------------------------------------------------------------------
    // Lookup and maintenance
    // ------------------------------------------------------------------------

    /// Fetch documents by id, in request order.
    ///
    /// Ids the backing index does not know (including documents still being
    /// embedded) are looked up in the fallback cache.
    pub async fn get_by_id(&self, ids: &[String]) -> Vec<Document> {
        let mut found = Vec::new();
        if let Some(index) = &self.index {
            let fetched = index.lock().await.get(ids).await;
            match fetched {
                Ok(docs) => found = docs,
                Err(e) => warn!("Backend lookup failed; using fallback cache: {e}"),
            }
        }

        let known: HashSet<&str> = found.iter().map(|d| d.id.as_str()).collect();
        let missing: Vec<String> = ids
            .iter()
            .filter(|id| !known.contains(id.as_str()))
            .cloned()
            .collect();
        if missing.is_empty() {
            return found;
        }

        let cached = self.cache.get_by_ids(&missing);
        ids.iter()
            .filter_map(|id| {
                found
                    .iter()
                    .chain(cached.iter())
                    .find(|d| &d.id == id)
                    .cloned()
            })
            .collect()
    }

    /// Delete every document from one listing source.
    ///
    /// Returns the number removed from the backing index, or from the
    /// fallback cache when there is no backing index.
    pub async fn delete_by_source(&self, source: &str) -> usize {
        let Some(index) = &self.index else {
            let from_cache = self.cache.remove_where(|d| d.source() == Some(source));
            info!("Deleted {from_cache} cached documents from source {source}");
            return from_cache;
        };

        let filter = SearchFilter::equals(SOURCE_FIELD, source);
        let deleted = index.lock().await.delete_where(&filter).await;
        match deleted {
            Ok(removed) => {
                self.cache.remove_where(|d| d.source() == Some(source));
                info!("Deleted {removed} documents from source {source}");
                removed
            }
            Err(e) => {
                error!("Failed to delete documents from source {source}: {e}");
                0
            }
        }
    }

    /// Remove every document from the backing index and the fallback cache.
    ///
    /// The cache is kept when the backing index cannot be cleared.
    pub async fn clear(&self) {
        if let Some(index) = &self.index {
            let cleared = index.lock().await.clear().await;
            if let Err(e) = cleared {
                error!("Failed to clear backing index: {e}");
                return;
            }
        }
        self.cache.clear();
        info!("Cleared listing store");
    }

    /// Current counts and identity. Recomputed on every call.
    pub async fn stats(&self) -> IndexStats {
        let (backend, backend_documents) = match &self.index {
            Some(index) => {
                let guard = index.lock().await;
                let count = match guard.count().await {
                    Ok(count) => count,
                    Err(e) => {
                        warn!("Backend count failed: {e}");
                        0
                    }
                };
                (guard.name().to_string(), count)
            }
            None => ("none".to_string(), 0),
        };
        let cache_documents = self.cache.len();

        IndexStats {
            total_documents: if backend_documents > 0 {
                backend_documents
            } else {
                cache_documents
            },
            backend_documents,
            cache_documents,
            collection: self.config.collection.clone(),
            db_path: self.db_path(),
            backend,
            embedding_provider: self.provider_name(),
            embedding_model: self
                .provider
                .as_ref()
                .map(|p| p.model().to_string())
                .unwrap_or_else(|| "none".to_string()),
            indexing_in_progress: self.worker.is_busy(),
        }
    }
}

impl std::fmt::Debug for ListingStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ListingStore")
            .field("collection", &self.config.collection)
            .field("backend", &self.index.is_some())
            .field("provider", &self.provider_name())
            .field("cached", &self.cache.len())
            .finish()
    }
}

/// Convert items, skipping failures and repeated ids.
fn convert<T: IntoDocument>(items: Vec<T>) -> Vec<Document> {
    let mut seen = HashSet::new();
    let mut documents = Vec::with_capacity(items.len());
    for (position, item) in items.into_iter().enumerate() {
        match item.into_document() {
            Ok(doc) if seen.insert(doc.id.clone()) => documents.push(doc),
            Ok(doc) => debug!("Skipping repeated id {} at position {position}", doc.id),
            Err(e) => warn!("Skipping item at position {position}: {e}"),
        }
    }
    documents
}

/// Query the backing index. The query is embedded before the lock is taken.
async fn vector_candidates(
    index: &Mutex<Box<dyn VectorIndex>>,
    provider: &dyn EmbeddingProvider,
    query: &str,
    k: usize,
    filter: Option<&SearchFilter>,
) -> Result<Vec<(Document, f32)>> {
    if query.trim().is_empty() {
        let docs = index.lock().await.scan(filter, k).await?;
        return Ok(docs.into_iter().map(|d| (d, 0.0)).collect());
    }
    let vector = provider.embed_query(query).await?;
    index.lock().await.search(&vector, k, filter).await
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::MemoryIndex;
    use crate::embedding::MockEmbeddingProvider;
    use crate::listing::Listing;
    use serde_json::json;

    fn vector_store() -> ListingStore {
        ListingStore::new(StoreConfig::default())
            .with_provider(Arc::new(MockEmbeddingProvider::new(64)))
            .with_backend(Box::new(MemoryIndex::new()))
    }

    fn doc(id: &str, text: &str) -> Document {
        Document::new(id, text).with_metadata("city", "Lisbon")
    }

    // ------------------------------------------------------------------------
    // Parameter tests
    // ------------------------------------------------------------------------

    #[test]
    fn test_hybrid_params_builder() {
        let params = HybridSearchParams::new("loft")
            .with_filter("city", "Berlin")
            .with_k(3)
            .with_alpha(0.2)
            .with_radius(Some(52.5), Some(13.4), Some(2.0))
            .with_sort("price", SortOrder::Asc);
        assert_eq!(params.k, Some(3));
        assert!(params.geo.is_some());
        assert!(params.sorts_by_field());
        assert_eq!(params.geo_queries().len(), 1);
    }

    #[test]
    fn test_hybrid_params_incomplete_radius_disabled() {
        let params = HybridSearchParams::new("loft").with_radius(Some(52.5), None, Some(2.0));
        assert!(params.geo.is_none());
        assert!(params.geo_queries().is_empty());
    }

    #[test]
    fn test_hybrid_params_relevance_sort_is_not_field_sort() {
        let params = HybridSearchParams::new("x").with_sort("relevance", SortOrder::Asc);
        assert!(!params.sorts_by_field());
    }

    #[test]
    fn test_index_options_default() {
        let options = IndexOptions::default();
        assert_eq!(options.batch_size, 100);
        assert!(!options.replace_existing);
        assert!(options.replacing().replace_existing);
    }

    #[test]
    fn test_convert_skips_bad_and_repeated() {
        let docs = convert(vec![
            Document::new("a", "x"),
            Document::new("", "bad"),
            Document::new("a", "again"),
        ]);
        assert_eq!(docs.len(), 1);
        assert_eq!(docs[0].text, "x");
    }

    // ------------------------------------------------------------------------
    // Indexing tests
    // ------------------------------------------------------------------------

    #[tokio::test]
    async fn test_index_commits_and_caches() {
        let store = vector_store();
        let added = store
            .index(vec![doc("1", "garden flat"), doc("2", "pool villa")], 1)
            .await;
        assert_eq!(added, 2);

        let stats = store.stats().await;
        assert_eq!(stats.backend_documents, 2);
        assert_eq!(stats.cache_documents, 2);
        assert_eq!(stats.total_documents, 2);
        assert_eq!(stats.backend, "memory");
        assert_eq!(stats.embedding_provider, "mock");
    }

    #[tokio::test]
    async fn test_index_without_backend_counts_cache_appends() {
        let store = ListingStore::new(StoreConfig::default());
        assert_eq!(store.index(vec![doc("1", "a"), doc("2", "b")], 100).await, 2);
        assert_eq!(store.index(vec![doc("2", "b")], 100).await, 0);

        let stats = store.stats().await;
        assert_eq!(stats.backend, "none");
        assert_eq!(stats.total_documents, 2);
    }

    #[tokio::test]
    async fn test_index_listings_from_json() {
        let store = vector_store();
        let items = vec![
            json!({"id": "l1", "city": "Porto", "has_garden": true}),
            json!({"id": "l2"}),
            json!("not a listing"),
        ];
        assert_eq!(store.index(items, 10).await, 1);
    }

    #[tokio::test]
    async fn test_replace_existing_clears_first() {
        let store = vector_store();
        store.index(vec![doc("old", "old flat")], 10).await;
        let added = store
            .index_with_options(vec![doc("new", "new flat")], IndexOptions::default().replacing())
            .await;
        assert_eq!(added, 1);
        assert!(store.get_by_id(&["old".into()]).await.is_empty());
        assert_eq!(store.stats().await.total_documents, 1);
    }

    #[tokio::test]
    async fn test_index_async_single_flight() {
        let store = Arc::new(vector_store());
        let first = store
            .index_async(vec![doc("1", "a"), doc("2", "b")], IndexOptions::default())
            .unwrap();
        let second = store
            .index_async(vec![doc("3", "c")], IndexOptions::default())
            .unwrap();
        assert_eq!(first.id(), second.id());
        assert_eq!(second.wait().await, 2);
        assert!(store.get_by_id(&["3".into()]).await.is_empty());
    }

    // ------------------------------------------------------------------------
    // Search tests
    // ------------------------------------------------------------------------

    #[tokio::test]
    async fn test_search_scores_descending() {
        let store = vector_store();
        store
            .index(
                vec![
                    doc("1", "garden house"),
                    doc("2", "city studio"),
                    doc("3", "house with garden"),
                ],
                10,
            )
            .await;
        let results = store.search("garden house", 3, None).await;
        assert_eq!(results.len(), 3);
        assert!(results.windows(2).all(|w| w[0].score >= w[1].score));
        assert_eq!(results[0].document.id, "1");
    }

    #[tokio::test]
    async fn test_hybrid_search_applies_filters() {
        let store = vector_store();
        let listings = vec![
            Listing {
                rooms: Some(3.0),
                price: Some(500000.0),
                ..Listing::new("a", "Madrid")
            },
            Listing {
                rooms: Some(1.0),
                price: Some(400000.0),
                ..Listing::new("b", "Madrid")
            },
            Listing {
                rooms: Some(3.0),
                price: Some(450000.0),
                ..Listing::new("c", "Sevilla")
            },
        ];
        store.index(listings, 10).await;

        let params = HybridSearchParams::new("apartment")
            .with_filter("city", "Madrid")
            .with_filter("rooms", 2)
            .with_k(5);
        let results = store.hybrid_search(&params).await;
        let ids: Vec<_> = results.iter().map(|r| r.document.id.as_str()).collect();
        assert_eq!(ids, vec!["a"]);
    }

    #[tokio::test]
    async fn test_hybrid_search_zero_k() {
        let store = vector_store();
        store.index(vec![doc("1", "a")], 10).await;
        assert!(store.hybrid_search(&HybridSearchParams::new("a").with_k(0)).await.is_empty());
    }

    #[tokio::test]
    async fn test_search_by_metadata() {
        let store = vector_store();
        store
            .index(
                vec![
                    doc("1", "a").with_metadata("has_pool", true),
                    doc("2", "b").with_metadata("has_pool", false),
                ],
                10,
            )
            .await;
        let filter = SearchFilter::flag("has_pool", true);
        let docs = store.search_by_metadata(Some(&filter), 10).await;
        assert_eq!(docs.len(), 1);
        assert_eq!(docs[0].id, "1");
    }

    // ------------------------------------------------------------------------
    // Maintenance tests
    // ------------------------------------------------------------------------

    #[tokio::test]
    async fn test_get_by_id_request_order() {
        let store = vector_store();
        store.index(vec![doc("1", "a"), doc("2", "b")], 10).await;
        let docs = store
            .get_by_id(&["2".into(), "nope".into(), "1".into()])
            .await;
        let ids: Vec<_> = docs.iter().map(|d| d.id.as_str()).collect();
        assert_eq!(ids, vec!["2", "1"]);
    }

    #[tokio::test]
    async fn test_delete_by_source_purges_both() {
        let store = vector_store();
        store
            .index(
                vec![
                    doc("1", "a").with_metadata(SOURCE_FIELD, "https://a.test"),
                    doc("2", "b").with_metadata(SOURCE_FIELD, "https://b.test"),
                ],
                10,
            )
            .await;
        assert_eq!(store.delete_by_source("https://a.test").await, 1);

        let stats = store.stats().await;
        assert_eq!(stats.backend_documents, 1);
        assert_eq!(stats.cache_documents, 1);
    }

    #[tokio::test]
    async fn test_clear_empties_everything() {
        let store = vector_store();
        store.index(vec![doc("1", "a")], 10).await;
        store.clear().await;
        let stats = store.stats().await;
        assert_eq!(stats.total_documents, 0);
        assert_eq!(stats.cache_documents, 0);
    }

    #[tokio::test]
    async fn test_from_config_defaults() {
        let config = StoreConfig {
            persist: false,
            ..Default::default()
        };
        let store = ListingStore::from_config(config).await.unwrap();
        let stats = store.stats().await;
        assert_eq!(stats.backend, "memory");
        assert_eq!(stats.collection, "properties");
        assert!(stats.db_path.is_none());
    }

    #[tokio::test]
    async fn test_default_config_survives_restart() {
        let dir = tempfile::tempdir().unwrap();
        let config = StoreConfig {
            db_path: Some(dir.path().to_string_lossy().into_owned()),
            ..Default::default()
        };

        {
            let store = ListingStore::from_config(config.clone()).await.unwrap();
            assert_eq!(store.index(vec![doc("1", "flat near the river")], 10).await, 1);
        }

        let reopened = ListingStore::from_config(config).await.unwrap();
        let stats = reopened.stats().await;
        assert_eq!(stats.backend_documents, 1);
        assert_eq!(stats.total_documents, 1);
        assert!(stats.db_path.is_some());
        assert_eq!(reopened.search("river", 1, None).await.len(), 1);
    }

    #[tokio::test]
    async fn test_from_config_unknown_backend_errors() {
        let config = StoreConfig {
            backend: "floppy".into(),
            ..Default::default()
        };
        assert!(ListingStore::from_config(config).await.is_err());
    }
}
