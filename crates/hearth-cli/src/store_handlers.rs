//! Handler functions for the search engine commands.
//!
//! Implements `hearth {index,search,get,delete,stats,clear}` against an
//! opened [`ListingStore`].

use crate::cli::SearchArgs;
use crate::config::HearthConfig;
use hearth_core::{Error, Result};
use hearth_vector::{
    Document, FilterRequest, HybridSearchParams, IndexOptions, IndexStats, ListingStore,
    ScoredResult,
};
use std::path::Path;

/// Open the store described by the configuration.
pub async fn open_store(config: &HearthConfig) -> Result<ListingStore> {
    ListingStore::from_config(config.store_config()?).await
}

// ============================================================================
// Command handlers
// ============================================================================

/// Index listings from a JSON array file.
pub async fn handle_index(
    store: &ListingStore,
    file: &Path,
    batch_size: Option<usize>,
    replace: bool,
) -> Result<usize> {
    let items = read_listings(file)?;
    tracing::info!("Loaded {} listings from {}", items.len(), file.display());

    let mut options = IndexOptions::default()
        .with_batch_size(batch_size.unwrap_or(store.config().batch_size));
    if replace {
        options = options.replacing();
    }

    let added = store.index_with_options(items, options).await;
    println!("Indexed {added} new listings");
    Ok(added)
}

/// Run a hybrid search and print the results.
pub async fn handle_search(store: &ListingStore, args: SearchArgs) -> Result<Vec<ScoredResult>> {
    let params = search_params(&args)?;
    let results = store.hybrid_search(&params).await;

    if args.json {
        let json = serde_json::to_string_pretty(&results)?;
        println!("{json}");
    } else if results.is_empty() {
        println!("No matching listings");
    } else {
        for (rank, result) in results.iter().enumerate() {
            println!("{}", format_result(rank + 1, result));
        }
    }
    Ok(results)
}

/// Print listings by id.
pub async fn handle_get(store: &ListingStore, ids: &[String]) -> Result<Vec<Document>> {
    let docs = store.get_by_id(ids).await;
    if docs.len() < ids.len() {
        tracing::warn!("Found {} of {} requested listings", docs.len(), ids.len());
    }
    let json = serde_json::to_string_pretty(&docs)?;
    println!("{json}");
    Ok(docs)
}

/// Delete the listings of one source.
pub async fn handle_delete(store: &ListingStore, source: &str) -> Result<usize> {
    let removed = store.delete_by_source(source).await;
    println!("Deleted {removed} listings from {source}");
    Ok(removed)
}

/// Print index statistics.
pub async fn handle_stats(store: &ListingStore) -> Result<IndexStats> {
    let stats = store.stats().await;
    println!("Collection:          {}", stats.collection);
    println!("Backend:             {}", stats.backend);
    if let Some(path) = &stats.db_path {
        println!("Database path:       {path}");
    }
    println!(
        "Embedding:           {} ({})",
        stats.embedding_provider, stats.embedding_model
    );
    println!("Total documents:     {}", stats.total_documents);
    println!("  in backend:        {}", stats.backend_documents);
    println!("  in fallback cache: {}", stats.cache_documents);
    Ok(stats)
}

/// Remove every listing.
pub async fn handle_clear(store: &ListingStore) -> Result<()> {
    store.clear().await;
    println!("Cleared collection {}", store.config().collection);
    Ok(())
}

// ============================================================================
// Helpers
// ============================================================================

fn read_listings(file: &Path) -> Result<Vec<serde_json::Value>> {
    let content = std::fs::read_to_string(file).map_err(|e| Error::io_with_path(e, file))?;
    match serde_json::from_str::<serde_json::Value>(&content)? {
        serde_json::Value::Array(items) => Ok(items),
        _ => Err(Error::invalid_data(format!(
            "{} must contain a JSON array of listings",
            file.display()
        ))),
    }
}

fn search_params(args: &SearchArgs) -> Result<HybridSearchParams> {
    let mut params = HybridSearchParams::new(args.query.as_str())
        .with_filters(parse_filters(&args.filters)?)
        .with_radius(args.lat, args.lon, args.radius_km);
    params.k = args.k;
    params.alpha = args.alpha;
    if let Some(field) = &args.sort_by {
        params = params.with_sort(field.as_str(), args.order);
    }
    Ok(params)
}

/// Parse `key=value` pairs; values are JSON when they parse as JSON.
pub fn parse_filters(pairs: &[String]) -> Result<FilterRequest> {
    let mut request = FilterRequest::new();
    for pair in pairs {
        let (key, raw) = pair
            .split_once('=')
            .ok_or_else(|| Error::invalid_data(format!("Filter '{pair}' is not KEY=VALUE")))?;
        let key = key.trim();
        if key.is_empty() {
            return Err(Error::invalid_data(format!("Filter '{pair}' has an empty key")));
        }
        let raw = raw.trim();
        let value = serde_json::from_str(raw)
            .unwrap_or_else(|_| serde_json::Value::String(raw.to_string()));
        request.insert(key.to_string(), value);
    }
    Ok(request)
}

fn format_result(rank: usize, result: &ScoredResult) -> String {
    let doc = &result.document;
    let mut line = format!("{rank:>3}. [{:.3}] {}", result.score, doc.id);
    if let Some(city) = doc.get("city") {
        line.push_str(&format!("  {city}"));
    }
    if let Some(price) = doc.number("price") {
        line.push_str(&format!("  {price:.0}"));
        if let Some(currency) = doc.get("currency").and_then(|c| c.as_str()) {
            line.push_str(&format!(" {currency}"));
        }
    }
    if let Some(rooms) = doc.number("rooms").filter(|r| *r > 0.0) {
        line.push_str(&format!("  {rooms} rooms"));
    }
    line
}

// ============================================================================
// Tests
// ============================================================================
