//! In-process fallback cache.
//!
//! Holds every document handed to the indexer, in insertion order, so that
//! reads can be served before embeddings are committed and whenever the
//! backing index is missing or failing. Guarded by its own lock, which is
//! only held for the duration of a single append, read or clear.

use crate::filter::{SearchFilter, matches_filter};
use crate::hybrid::HybridRanker;
use crate::types::{Document, ScoredResult};
use parking_lot::Mutex;
use std::collections::HashSet;

#[derive(Debug, Default)]
struct CacheState {
    documents: Vec<Document>,
    ids: HashSet<String>,
}

/// Ordered, id-unique document list.
#[derive(Debug, Default)]
pub struct FallbackCache {
    state: Mutex<CacheState>,
}

impl FallbackCache {
    /// Create an empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append documents whose ids are not already cached.
    ///
    /// Returns how many were added.
    pub fn append(&self, documents: impl IntoIterator<Item = Document>) -> usize {
        let mut state = self.state.lock();
        let mut added = 0;
        for doc in documents {
            if state.ids.insert(doc.id.clone()) {
                state.documents.push(doc);
                added += 1;
            }
        }
        added
    }

    /// Number of cached documents.
    pub fn len(&self) -> usize {
        self.state.lock().documents.len()
    }

    /// Whether the cache is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Whether a document id is cached.
    pub fn contains(&self, id: &str) -> bool {
        self.state.lock().ids.contains(id)
    }

    /// Copy of every cached document.
    pub fn snapshot(&self) -> Vec<Document> {
        self.state.lock().documents.clone()
    }

    /// Drop everything.
    pub fn clear(&self) {
        let mut state = self.state.lock();
        state.documents.clear();
        state.ids.clear();
    }

    /// Documents with the given ids, in request order. Unknown ids are skipped.
    pub fn get_by_ids(&self, ids: &[String]) -> Vec<Document> {
        let state = self.state.lock();
        ids.iter()
            .filter_map(|id| state.documents.iter().find(|d| &d.id == id))
            .cloned()
            .collect()
    }

    /// Remove documents matching a predicate; returns how many were removed.
    pub fn remove_where(&self, predicate: impl Fn(&Document) -> bool) -> usize {
        let mut state = self.state.lock();
        let before = state.documents.len();
        let CacheState { documents, ids } = &mut *state;
        documents.retain(|d| {
            let remove = predicate(d);
            if remove {
                ids.remove(&d.id);
            }
            !remove
        });
        before - documents.len()
    }

    /// Documents passing the filter, in insertion order.
    pub fn matching(&self, filter: Option<&SearchFilter>) -> Vec<Document> {
        self.state
            .lock()
            .documents
            .iter()
            .filter(|d| matches_filter(filter, &d.metadata))
            .cloned()
            .collect()
    }

    /// Degraded keyword search.
    ///
    /// Filtering happens under the lock; scoring happens on the copied
    /// documents after it is released.
    pub fn search(
        &self,
        ranker: &HybridRanker,
        query: &str,
        filter: Option<&SearchFilter>,
        k: usize,
    ) -> Vec<ScoredResult> {
        let candidates = self.matching(filter);
        let mut results = ranker.rank_lexical(query, candidates);
        results.truncate(k);
        results
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doc(id: &str, text: &str, city: &str) -> Document {
        Document::new(id, text).with_metadata("city", city)
    }

    // ------------------------------------------------------------------------
    // Mutation tests
    // ------------------------------------------------------------------------

    #[test]
    fn test_append_skips_known_ids() {
        let cache = FallbackCache::new();
        assert_eq!(cache.append(vec![doc("1", "a", "X"), doc("2", "b", "X")]), 2);
        assert_eq!(cache.append(vec![doc("2", "b", "X"), doc("3", "c", "X")]), 1);
        assert_eq!(cache.len(), 3);
        assert!(cache.contains("3"));
    }

    #[test]
    fn test_append_dedups_within_call() {
        let cache = FallbackCache::new();
        assert_eq!(cache.append(vec![doc("1", "a", "X"), doc("1", "a", "X")]), 1);
    }

    #[test]
    fn test_clear() {
        let cache = FallbackCache::new();
        cache.append(vec![doc("1", "a", "X")]);
        cache.clear();
        assert!(cache.is_empty());
        assert_eq!(cache.append(vec![doc("1", "a", "X")]), 1);
    }

    #[test]
    fn test_remove_where_updates_ids() {
        let cache = FallbackCache::new();
        cache.append(vec![doc("1", "a", "X"), doc("2", "b", "Y")]);
        assert_eq!(cache.remove_where(|d| d.id == "1"), 1);
        assert!(!cache.contains("1"));
        assert_eq!(cache.len(), 1);
    }

    // ------------------------------------------------------------------------
    // Read tests
    // ------------------------------------------------------------------------

    #[test]
    fn test_get_by_ids_request_order() {
        let cache = FallbackCache::new();
        cache.append(vec![doc("1", "a", "X"), doc("2", "b", "X")]);
        let found = cache.get_by_ids(&["2".into(), "missing".into(), "1".into()]);
        let ids: Vec<_> = found.iter().map(|d| d.id.as_str()).collect();
        assert_eq!(ids, vec!["2", "1"]);
    }

    #[test]
    fn test_search_applies_filter_and_limit() {
        let cache = FallbackCache::new();
        cache.append(vec![
            doc("1", "garden flat", "Lyon"),
            doc("2", "garden balcony house", "Paris"),
            doc("3", "garden", "Paris"),
        ]);
        let filter = SearchFilter::equals("city", "Paris");
        let results = cache.search(&HybridRanker::default(), "garden balcony", Some(&filter), 1);
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].document.id, "2");
    }

    #[test]
    fn test_search_without_overlap_is_empty() {
        let cache = FallbackCache::new();
        cache.append(vec![doc("1", "studio", "Lyon")]);
        assert!(cache
            .search(&HybridRanker::default(), "pool", None, 5)
            .is_empty());
    }
}
