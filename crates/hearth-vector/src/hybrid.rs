//! Hybrid ranking.
//!
//! Blends vector similarity from the backing index with a lexical BM25
//! score computed over the candidate set:
//!
//! ```text
//! similarity = 1 / (1 + distance)
//! lexical    = min-max normalized BM25 over the candidates
//! final      = alpha * similarity + (1 - alpha) * lexical
//! ```
//!
//! `alpha = 1.0` keeps the backend ordering, `alpha = 0.0` ranks purely by
//! lexical relevance. Ties keep candidate order.

use crate::types::{Document, ScoredResult};
use std::collections::{HashMap, HashSet};

/// Default BM25 term-frequency saturation.
pub const DEFAULT_K1: f64 = 1.5;

/// Default BM25 length normalization.
pub const DEFAULT_B: f64 = 0.75;

/// Convert a raw backend distance to a similarity in (0, 1].
///
/// Negative or non-finite distances are treated as an exact match.
pub fn distance_to_similarity(distance: f32) -> f64 {
    let d = f64::from(distance);
    if !d.is_finite() || d <= 0.0 {
        return 1.0;
    }
    1.0 / (1.0 + d)
}

/// Lowercase word tokens.
pub fn tokenize(text: &str) -> Vec<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(str::to_lowercase)
        .collect()
}

/// Count of query tokens that occur in the text (substring match).
///
/// The degraded-mode score. A query token repeated n times counts n times.
pub fn keyword_overlap(query_tokens: &[String], text: &str) -> usize {
    let haystack = text.to_lowercase();
    query_tokens
        .iter()
        .filter(|t| haystack.contains(t.as_str()))
        .count()
}

/// Min-max normalize scores to [0, 1] in place.
///
/// With zero variance every score becomes 1.0 when the shared value is
/// positive, otherwise 0.0.
pub fn min_max_normalize(scores: &mut [f64]) {
    let Some(min) = scores.iter().copied().reduce(f64::min) else {
        return;
    };
    let max = scores.iter().copied().fold(min, f64::max);
    let span = max - min;

    if span > 0.0 {
        for s in scores.iter_mut() {
            *s = (*s - min) / span;
        }
    } else {
        let fill = if max > 0.0 { 1.0 } else { 0.0 };
        scores.iter_mut().for_each(|s| *s = fill);
    }
}

// ============================================================================
// Ranker
// ============================================================================

/// BM25-based hybrid ranker.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HybridRanker {
    k1: f64,
    b: f64,
}

impl Default for HybridRanker {
    fn default() -> Self {
        Self {
            k1: DEFAULT_K1,
            b: DEFAULT_B,
        }
    }
}

impl HybridRanker {
    /// Create a ranker with custom BM25 parameters.
    pub fn new(k1: f64, b: f64) -> Self {
        Self { k1, b }
    }

    /// BM25 score of each text against the query, using the texts themselves
    /// as the corpus.
    pub fn bm25_scores(&self, query: &str, texts: &[&str]) -> Vec<f64> {
        let query_terms: HashSet<String> = tokenize(query).into_iter().collect();
        let docs: Vec<Vec<String>> = texts.iter().map(|t| tokenize(t)).collect();

        let n = docs.len() as f64;
        let total_len: usize = docs.iter().map(Vec::len).sum();
        if docs.is_empty() || total_len == 0 || query_terms.is_empty() {
            return vec![0.0; docs.len()];
        }
        let avg_len = total_len as f64 / n;

        let term_freqs: Vec<HashMap<&str, usize>> = docs
            .iter()
            .map(|tokens| {
                let mut tf = HashMap::new();
                for t in tokens {
                    *tf.entry(t.as_str()).or_insert(0) += 1;
                }
                tf
            })
            .collect();

        let idf: HashMap<&str, f64> = query_terms
            .iter()
            .map(|term| {
                let df = term_freqs
                    .iter()
                    .filter(|tf| tf.contains_key(term.as_str()))
                    .count() as f64;
                (term.as_str(), ((n - df + 0.5) / (df + 0.5) + 1.0).ln())
            })
            .collect();

        docs.iter()
            .zip(&term_freqs)
            .map(|(tokens, tf)| {
                let len_norm = 1.0 - self.b + self.b * tokens.len() as f64 / avg_len;
                idf.iter()
                    .map(|(term, idf)| {
                        let f = *tf.get(term).unwrap_or(&0) as f64;
                        if f == 0.0 {
                            0.0
                        } else {
                            idf * f * (self.k1 + 1.0) / (f + self.k1 * len_norm)
                        }
                    })
                    .sum()
            })
            .collect()
    }

    /// Rank backend candidates.
    ///
    /// `candidates` carry the raw backend distance. An empty or whitespace
    /// query keeps the backend order and scores by similarity alone.
    pub fn rank(&self, query: &str, candidates: Vec<(Document, f32)>, alpha: f64) -> Vec<ScoredResult> {
        let alpha = if alpha.is_finite() { alpha.clamp(0.0, 1.0) } else { 1.0 };

        if query.trim().is_empty() {
            return candidates
                .into_iter()
                .map(|(doc, distance)| ScoredResult::new(doc, distance_to_similarity(distance)))
                .collect();
        }

        let mut lexical = {
            let texts: Vec<&str> = candidates.iter().map(|(d, _)| d.text.as_str()).collect();
            self.bm25_scores(query, &texts)
        };
        min_max_normalize(&mut lexical);

        let mut results: Vec<ScoredResult> = candidates
            .into_iter()
            .zip(lexical)
            .map(|((doc, distance), lex)| {
                let score = alpha * distance_to_similarity(distance) + (1.0 - alpha) * lex;
                ScoredResult::new(doc, score)
            })
            .collect();

        sort_by_score(&mut results);
        results
    }

    /// Rank documents when no backend distance exists.
    ///
    /// Scores are the keyword overlap counts; documents with no overlap are
    /// dropped. An empty query keeps every document with score 0.
    pub fn rank_lexical(&self, query: &str, documents: Vec<Document>) -> Vec<ScoredResult> {
        let tokens = tokenize(query);
        if tokens.is_empty() {
            return documents
                .into_iter()
                .map(|doc| ScoredResult::new(doc, 0.0))
                .collect();
        }

        let mut results: Vec<ScoredResult> = documents
            .into_iter()
            .filter_map(|doc| {
                let overlap = keyword_overlap(&tokens, &doc.text);
                (overlap > 0).then(|| ScoredResult::new(doc, overlap as f64))
            })
            .collect();

        sort_by_score(&mut results);
        results
    }
}

/// Stable sort by descending score.
pub fn sort_by_score(results: &mut [ScoredResult]) {
    results.sort_by(|a, b| b.score.total_cmp(&a.score));
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn candidates() -> Vec<(Document, f32)> {
        vec![
            (Document::new("a", "bright studio near the station"), 0.1),
            (Document::new("b", "quiet flat with garden"), 0.5),
            (Document::new("c", "house with garden and balcony garden view"), 0.9),
        ]
    }

    fn ids(results: &[ScoredResult]) -> Vec<&str> {
        results.iter().map(|r| r.document.id.as_str()).collect()
    }

    // ------------------------------------------------------------------------
    // Helper tests
    // ------------------------------------------------------------------------

    #[test]
    fn test_distance_to_similarity() {
        assert_eq!(distance_to_similarity(0.0), 1.0);
        assert!((distance_to_similarity(1.0) - 0.5).abs() < 1e-12);
        assert_eq!(distance_to_similarity(-0.2), 1.0);
        assert_eq!(distance_to_similarity(f32::NAN), 1.0);
    }

    #[test]
    fn test_tokenize() {
        assert_eq!(tokenize("Garden, Balcony!  2-bed"), vec!["garden", "balcony", "2", "bed"]);
        assert!(tokenize("   ").is_empty());
    }

    #[test]
    fn test_keyword_overlap_counts_repeated_terms() {
        let tokens = tokenize("garden garden balcony pool");
        assert_eq!(keyword_overlap(&tokens, "Big GARDEN and a balcony"), 3);
        assert_eq!(keyword_overlap(&tokens, "studio"), 0);
    }

    #[test]
    fn test_min_max_normalize() {
        let mut s = vec![2.0, 4.0, 6.0];
        min_max_normalize(&mut s);
        assert_eq!(s, vec![0.0, 0.5, 1.0]);
    }

    #[test]
    fn test_min_max_zero_variance() {
        let mut positive = vec![3.0, 3.0];
        min_max_normalize(&mut positive);
        assert_eq!(positive, vec![1.0, 1.0]);

        let mut zero = vec![0.0, 0.0];
        min_max_normalize(&mut zero);
        assert_eq!(zero, vec![0.0, 0.0]);

        let mut empty: Vec<f64> = vec![];
        min_max_normalize(&mut empty);
        assert!(empty.is_empty());
    }

    #[test]
    fn test_bm25_prefers_matching_documents() {
        let ranker = HybridRanker::default();
        let scores = ranker.bm25_scores("garden", &["flat in town", "flat with garden"]);
        assert_eq!(scores[0], 0.0);
        assert!(scores[1] > 0.0);
    }

    #[test]
    fn test_bm25_empty_inputs() {
        let ranker = HybridRanker::default();
        assert!(ranker.bm25_scores("garden", &[]).is_empty());
        assert_eq!(ranker.bm25_scores("", &["a b"]), vec![0.0]);
        assert_eq!(ranker.bm25_scores("garden", &[""]), vec![0.0]);
    }

    // ------------------------------------------------------------------------
    // Ranking tests
    // ------------------------------------------------------------------------

    #[test]
    fn test_alpha_one_keeps_backend_order() {
        let results = HybridRanker::default().rank("garden balcony", candidates(), 1.0);
        assert_eq!(ids(&results), vec!["a", "b", "c"]);
    }

    #[test]
    fn test_alpha_zero_orders_by_lexical() {
        let results = HybridRanker::default().rank("garden balcony", candidates(), 0.0);
        assert_eq!(ids(&results), vec!["c", "b", "a"]);
        assert_eq!(results[0].score, 1.0);
        assert_eq!(results[2].score, 0.0);
    }

    #[test]
    fn test_empty_query_passes_through() {
        let results = HybridRanker::default().rank("  ", candidates(), 0.0);
        assert_eq!(ids(&results), vec!["a", "b", "c"]);
        assert!((results[0].score - 1.0 / 1.1).abs() < 1e-6);
    }

    #[test]
    fn test_ties_keep_candidate_order() {
        let tied = vec![
            (Document::new("x", "same text"), 0.3),
            (Document::new("y", "same text"), 0.3),
            (Document::new("z", "same text"), 0.3),
        ];
        let results = HybridRanker::default().rank("text", tied, 0.5);
        assert_eq!(ids(&results), vec!["x", "y", "z"]);
    }

    #[test]
    fn test_alpha_out_of_range_clamped() {
        let high = HybridRanker::default().rank("garden", candidates(), 7.0);
        let one = HybridRanker::default().rank("garden", candidates(), 1.0);
        assert_eq!(high, one);
    }

    #[test]
    fn test_rank_lexical_orders_by_overlap() {
        let docs = vec![
            Document::new("1", "flat with garden"),
            Document::new("2", "studio"),
            Document::new("3", "garden and balcony"),
        ];
        let results = HybridRanker::default().rank_lexical("garden balcony", docs);
        assert_eq!(ids(&results), vec!["3", "1"]);
        assert_eq!(results[0].score, 2.0);
    }
}
