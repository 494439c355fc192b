//! Post-ranking sort by a metadata field.

use crate::types::{MetadataValue, ScoredResult, SortOrder};

/// Sort field that keeps the ranker's order.
pub const RELEVANCE: &str = "relevance";

/// Re-order results by a numeric metadata field.
///
/// Values are coerced to numbers; missing or non-numeric values always end
/// up last regardless of `order`. `None` or `"relevance"` leaves the order
/// unchanged. The sort is stable.
pub fn sort_results(results: &mut [ScoredResult], field: Option<&str>, order: SortOrder) {
    let Some(field) = field.map(str::trim).filter(|f| !f.is_empty() && *f != RELEVANCE) else {
        return;
    };

    let missing = match order {
        SortOrder::Asc => f64::INFINITY,
        SortOrder::Desc => f64::NEG_INFINITY,
    };
    let key = |r: &ScoredResult| {
        r.document
            .get(field)
            .and_then(MetadataValue::as_f64)
            .unwrap_or(missing)
    };

    match order {
        SortOrder::Asc => results.sort_by(|a, b| key(a).total_cmp(&key(b))),
        SortOrder::Desc => results.sort_by(|a, b| key(b).total_cmp(&key(a))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Document;

    fn results() -> Vec<ScoredResult> {
        vec![
            ScoredResult::new(Document::new("mid", "").with_metadata("price", 500.0), 0.9),
            ScoredResult::new(Document::new("none", ""), 0.8),
            ScoredResult::new(Document::new("low", "").with_metadata("price", "100"), 0.7),
            ScoredResult::new(Document::new("bool", "").with_metadata("price", true), 0.6),
            ScoredResult::new(Document::new("high", "").with_metadata("price", 900.0), 0.5),
        ]
    }

    fn ids(results: &[ScoredResult]) -> Vec<&str> {
        results.iter().map(|r| r.document.id.as_str()).collect()
    }

    #[test]
    fn test_sort_ascending_missing_last() {
        let mut r = results();
        sort_results(&mut r, Some("price"), SortOrder::Asc);
        assert_eq!(ids(&r), vec!["low", "mid", "high", "none", "bool"]);
    }

    #[test]
    fn test_sort_descending_missing_last() {
        let mut r = results();
        sort_results(&mut r, Some("price"), SortOrder::Desc);
        assert_eq!(ids(&r), vec!["high", "mid", "low", "none", "bool"]);
    }

    #[test]
    fn test_relevance_is_noop() {
        let mut r = results();
        sort_results(&mut r, Some("relevance"), SortOrder::Asc);
        assert_eq!(ids(&r), vec!["mid", "none", "low", "bool", "high"]);

        sort_results(&mut r, None, SortOrder::Asc);
        assert_eq!(ids(&r), vec!["mid", "none", "low", "bool", "high"]);
    }

    #[test]
    fn test_unknown_field_keeps_order() {
        let mut r = results();
        sort_results(&mut r, Some("area_sqm"), SortOrder::Desc);
        assert_eq!(ids(&r), vec!["mid", "none", "low", "bool", "high"]);
    }
}
