//! LanceDB backing index.
//!
//! Stores listing records in a LanceDB table on disk. Records survive a
//! restart: [`LancedbIndex::open`] reattaches to an existing table instead
//! of rebuilding it.
//!
//! # Schema
//!
//! | Column | Type | Purpose |
//! |--------|------|---------|
//! | `id` | Utf8 | Unique document identifier |
//! | `text` | Utf8 | Searchable text |
//! | `metadata` | Utf8 | JSON-serialized primitive metadata |
//! | `vector` | FixedSizeList<Float32> | Embedding vector |
//!
//! Filters are pushed down as SQL over `json_extract(metadata, ...)` and
//! re-checked in-process on the returned rows.
//!
//! # Feature Gate
//!
//! This module requires the `vector-lancedb` feature.

use crate::backend::VectorIndex;
use crate::embedding::EmbeddingProvider;
use crate::filter::{SearchFilter, matches_filter};
use crate::types::{Document, IndexRecord, Metadata, MetadataValue};
use arrow_array::{
    Array, FixedSizeListArray, Float32Array, RecordBatch, RecordBatchIterator, StringArray,
};
use arrow_schema::{DataType, Field, Schema};
use async_trait::async_trait;
use futures::TryStreamExt;
use hearth_core::{Error, Result};
use lancedb::query::{ExecutableQuery, QueryBase};
use log::{debug, info, warn};
use std::collections::HashSet;
use std::sync::Arc;

/// LanceDB-backed vector index.
pub struct LancedbIndex {
    connection: lancedb::Connection,
    table_name: String,
    table: Option<lancedb::Table>,
    dimension: i32,
}

impl LancedbIndex {
    /// Connect to the database at `db_path` and attach to `table_name`.
    ///
    /// An existing table whose vector width differs from the provider's
    /// dimension is ignored and replaced on the first insert.
    pub async fn open(
        db_path: &str,
        table_name: &str,
        provider: &dyn EmbeddingProvider,
    ) -> Result<Self> {
        let connection = lancedb::connect(db_path)
            .execute()
            .await
            .map_err(|e| Error::backend(format!("Failed to connect to LanceDB: {e}")))?;

        let dimension = i32::try_from(provider.dimension())
            .map_err(|_| Error::config("Embedding dimension too large"))?;

        let names = connection
            .table_names()
            .execute()
            .await
            .map_err(|e| Error::backend(format!("Failed to list tables: {e}")))?;

        let mut table = None;
        if names.iter().any(|n| n == table_name) {
            let existing = connection
                .open_table(table_name)
                .execute()
                .await
                .map_err(|e| Error::backend(format!("Failed to open table: {e}")))?;
            let schema = existing
                .schema()
                .await
                .map_err(|e| Error::backend(format!("Failed to read table schema: {e}")))?;

            match vector_width(&schema) {
                Some(width) if width == dimension => {
                    info!("Attached to existing LanceDB table '{table_name}'");
                    table = Some(existing);
                }
                other => warn!(
                    "LanceDB table '{table_name}' has vector width {other:?}, provider uses {dimension}; table will be replaced"
                ),
            }
        }

        Ok(Self {
            connection,
            table_name: table_name.to_string(),
            table,
            dimension,
        })
    }

    async fn select(&self, predicate: Option<String>, limit: Option<usize>) -> Result<Vec<Document>> {
        let Some(table) = &self.table else {
            return Ok(Vec::new());
        };
        let mut query = table.query();
        if let Some(predicate) = predicate {
            query = query.only_if(predicate);
        }
        if let Some(limit) = limit {
            query = query.limit(limit);
        }

        let batches: Vec<RecordBatch> = query
            .execute()
            .await
            .map_err(|e| Error::backend(format!("LanceDB query failed: {e}")))?
            .try_collect()
            .await
            .map_err(|e| Error::backend(format!("Failed to collect results: {e}")))?;

        let mut documents = Vec::new();
        for batch in &batches {
            documents.extend(parse_rows(batch)?.into_iter().map(|(doc, _)| doc));
        }
        Ok(documents)
    }

    async fn delete_predicate(&mut self, predicate: &str) -> Result<usize> {
        let Some(table) = &self.table else {
            return Ok(0);
        };
        let before = count_rows(table).await?;
        table
            .delete(predicate)
            .await
            .map_err(|e| Error::backend(format!("LanceDB delete failed: {e}")))?;
        let after = count_rows(table).await?;
        Ok(before.saturating_sub(after))
    }
}

async fn count_rows(table: &lancedb::Table) -> Result<usize> {
    table
        .count_rows(None)
        .await
        .map_err(|e| Error::backend(format!("Failed to count rows: {e}")))
}

#[async_trait]
impl VectorIndex for LancedbIndex {
    async fn existing_ids(&self, ids: &[String]) -> Result<HashSet<String>> {
        if ids.is_empty() {
            return Ok(HashSet::new());
        }
        let found = self.select(Some(id_predicate(ids)), None).await?;
        Ok(found.into_iter().map(|d| d.id).collect())
    }

    async fn get(&self, ids: &[String]) -> Result<Vec<Document>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let found = self.select(Some(id_predicate(ids)), None).await?;
        Ok(ids
            .iter()
            .filter_map(|id| found.iter().find(|d| &d.id == id).cloned())
            .collect())
    }

    async fn add(&mut self, records: Vec<IndexRecord>) -> Result<usize> {
        let ids: Vec<String> = records.iter().map(|r| r.document.id.clone()).collect();
        let existing = self.existing_ids(&ids).await?;
        let mut seen = HashSet::new();
        let fresh: Vec<IndexRecord> = records
            .into_iter()
            .filter(|r| !existing.contains(&r.document.id) && seen.insert(r.document.id.clone()))
            .collect();
        if fresh.is_empty() {
            return Ok(0);
        }

        let batch = build_record_batch(&fresh, self.dimension)?;
        let schema = batch.schema();
        let batches = RecordBatchIterator::new(vec![Ok(batch)], schema);

        match &self.table {
            Some(table) => {
                table
                    .add(Box::new(batches))
                    .execute()
                    .await
                    .map_err(|e| Error::backend(format!("Failed to add rows: {e}")))?;
            }
            None => {
                let table = self
                    .connection
                    .create_table(&self.table_name, Box::new(batches))
                    .mode(lancedb::database::CreateTableMode::Overwrite)
                    .execute()
                    .await
                    .map_err(|e| Error::backend(format!("Failed to create LanceDB table: {e}")))?;
                self.table = Some(table);
            }
        }

        debug!("Wrote {} rows to '{}'", fresh.len(), self.table_name);
        Ok(fresh.len())
    }

    async fn delete(&mut self, ids: &[String]) -> Result<usize> {
        if ids.is_empty() {
            return Ok(0);
        }
        self.delete_predicate(&id_predicate(ids)).await
    }

    async fn delete_where(&mut self, filter: &SearchFilter) -> Result<usize> {
        self.delete_predicate(&filter_to_sql(filter)).await
    }

    async fn search(
        &self,
        vector: &[f32],
        k: usize,
        filter: Option<&SearchFilter>,
    ) -> Result<Vec<(Document, f32)>> {
        let Some(table) = &self.table else {
            return Ok(Vec::new());
        };

        let mut query = table
            .vector_search(vector.to_vec())
            .map_err(|e| Error::backend(format!("Failed to create vector search: {e}")))?
            .limit(k);
        if let Some(filter) = filter.filter(|f| !f.is_empty()) {
            query = query.only_if(filter_to_sql(filter));
        }

        let batches: Vec<RecordBatch> = query
            .execute()
            .await
            .map_err(|e| Error::backend(format!("Vector search failed: {e}")))?
            .try_collect()
            .await
            .map_err(|e| Error::backend(format!("Failed to collect results: {e}")))?;

        let mut hits = Vec::new();
        for batch in &batches {
            hits.extend(parse_rows(batch)?);
        }
        hits.retain(|(doc, _)| matches_filter(filter, &doc.metadata));
        hits.sort_by(|a, b| a.1.total_cmp(&b.1));
        hits.truncate(k);
        Ok(hits)
    }

    async fn scan(&self, filter: Option<&SearchFilter>, limit: usize) -> Result<Vec<Document>> {
        let predicate = filter.filter(|f| !f.is_empty()).map(filter_to_sql);
        let mut docs = self.select(predicate, Some(limit)).await?;
        docs.retain(|d| matches_filter(filter, &d.metadata));
        Ok(docs)
    }

    async fn count(&self) -> Result<usize> {
        match &self.table {
            Some(table) => count_rows(table).await,
            None => Ok(0),
        }
    }

    async fn clear(&mut self) -> Result<()> {
        self.delete_predicate("true").await.map(|_| ())
    }

    fn name(&self) -> &str {
        "lancedb"
    }
}

impl std::fmt::Debug for LancedbIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LancedbIndex")
            .field("table", &self.table_name)
            .field("attached", &self.table.is_some())
            .field("dimension", &self.dimension)
            .finish()
    }
}

// ============================================================================
// Filter translation
// ============================================================================

fn quote(s: &str) -> String {
    format!("'{}'", s.replace('\'', "''"))
}

fn json_field(field: &str) -> String {
    format!("json_extract(metadata, '$.{}')", field.replace('\'', "''"))
}

fn numeric_field(field: &str) -> String {
    format!("CAST({} AS DOUBLE)", json_field(field))
}

fn literal_condition(field: &str, value: &MetadataValue) -> String {
    match value {
        MetadataValue::Number(n) => format!("{} = {n}", numeric_field(field)),
        MetadataValue::Bool(b) => format!("{} = {}", json_field(field), quote(&b.to_string())),
        MetadataValue::String(s) => format!("{} = {}", json_field(field), quote(s)),
        MetadataValue::Null => format!("{} IS NULL", json_field(field)),
    }
}

fn id_predicate(ids: &[String]) -> String {
    let list: Vec<String> = ids.iter().map(|id| quote(id)).collect();
    format!("id IN ({})", list.join(", "))
}

/// Translate a filter tree into a LanceDB SQL predicate.
pub fn filter_to_sql(filter: &SearchFilter) -> String {
    match filter {
        SearchFilter::Equals { field, value } => literal_condition(field, value),
        SearchFilter::Range { field, min, max } => {
            let column = numeric_field(field);
            match (min, max) {
                (Some(lo), Some(hi)) => format!("{column} >= {lo} AND {column} <= {hi}"),
                (Some(lo), None) => format!("{column} >= {lo}"),
                (None, Some(hi)) => format!("{column} <= {hi}"),
                (None, None) => format!("{} IS NOT NULL", json_field(field)),
            }
        }
        SearchFilter::In { field, values } => {
            if values.is_empty() {
                return "false".to_string();
            }
            let parts: Vec<String> = values.iter().map(|v| literal_condition(field, v)).collect();
            format!("({})", parts.join(" OR "))
        }
        SearchFilter::Boolean { field, value } => {
            literal_condition(field, &MetadataValue::Bool(*value))
        }
        SearchFilter::AllOf(children) => {
            if children.is_empty() {
                return "true".to_string();
            }
            let parts: Vec<String> = children
                .iter()
                .map(|c| format!("({})", filter_to_sql(c)))
                .collect();
            parts.join(" AND ")
        }
    }
}

// ============================================================================
// Arrow schema and batch construction
// ============================================================================

/// Create the Arrow schema for the listing table.
fn make_schema(dimension: i32) -> Arc<Schema> {
    Arc::new(Schema::new(vec![
        Field::new("id", DataType::Utf8, false),
        Field::new("text", DataType::Utf8, false),
        Field::new("metadata", DataType::Utf8, false),
        Field::new(
            "vector",
            DataType::FixedSizeList(
                Arc::new(Field::new("item", DataType::Float32, true)),
                dimension,
            ),
            false,
        ),
    ]))
}

fn vector_width(schema: &Schema) -> Option<i32> {
    match schema.field_with_name("vector").ok()?.data_type() {
        DataType::FixedSizeList(_, size) => Some(*size),
        _ => None,
    }
}

/// Build an Arrow RecordBatch from index records.
fn build_record_batch(records: &[IndexRecord], dimension: i32) -> Result<RecordBatch> {
    let schema = make_schema(dimension);

    let ids: Vec<&str> = records.iter().map(|r| r.document.id.as_str()).collect();
    let texts: Vec<&str> = records.iter().map(|r| r.document.text.as_str()).collect();
    let metadata_strings = records
        .iter()
        .map(|r| serde_json::to_string(&r.document.metadata))
        .collect::<std::result::Result<Vec<String>, _>>()?;
    let metadata_refs: Vec<&str> = metadata_strings.iter().map(|s| s.as_str()).collect();

    let all_values: Vec<f32> = records
        .iter()
        .flat_map(|r| r.embedding.iter().copied())
        .collect();

    let vector_array = FixedSizeListArray::try_new(
        Arc::new(Field::new("item", DataType::Float32, true)),
        dimension,
        Arc::new(Float32Array::from(all_values)),
        None,
    )
    .map_err(|e| Error::backend(format!("Failed to create vector array: {e}")))?;

    RecordBatch::try_new(
        schema,
        vec![
            Arc::new(StringArray::from(ids)),
            Arc::new(StringArray::from(texts)),
            Arc::new(StringArray::from(metadata_refs)),
            Arc::new(vector_array),
        ],
    )
    .map_err(|e| Error::backend(format!("Failed to create RecordBatch: {e}")))
}

fn string_column<'a>(batch: &'a RecordBatch, name: &str) -> Result<&'a StringArray> {
    batch
        .column_by_name(name)
        .ok_or_else(|| Error::backend(format!("Missing '{name}' column in results")))?
        .as_any()
        .downcast_ref::<StringArray>()
        .ok_or_else(|| Error::backend(format!("'{name}' column is not StringArray")))
}

/// Parse rows into documents with their `_distance` (0 when absent).
fn parse_rows(batch: &RecordBatch) -> Result<Vec<(Document, f32)>> {
    let id_col = string_column(batch, "id")?;
    let text_col = string_column(batch, "text")?;
    let metadata_col = string_column(batch, "metadata")?;
    let distance_col = batch
        .column_by_name("_distance")
        .and_then(|c| c.as_any().downcast_ref::<Float32Array>());

    let mut rows = Vec::with_capacity(batch.num_rows());
    for i in 0..batch.num_rows() {
        let metadata: Metadata = serde_json::from_str(metadata_col.value(i)).unwrap_or_default();
        let document = Document {
            id: id_col.value(i).to_string(),
            text: text_col.value(i).to_string(),
            metadata,
        };
        let distance = distance_col
            .filter(|c| !c.is_null(i))
            .map(|c| c.value(i))
            .unwrap_or(0.0);
        rows.push((document, distance));
    }
    Ok(rows)
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embedding::MockEmbeddingProvider;

    fn make_records(dimension: usize) -> Vec<IndexRecord> {
        vec![
            IndexRecord::new(
                Document::new("p-1", "loft in Gracia")
                    .with_metadata("city", "Barcelona")
                    .with_metadata("price", 1200.0),
                vec![0.1; dimension],
            ),
            IndexRecord::new(
                Document::new("p-2", "villa with pool")
                    .with_metadata("city", "Marbella")
                    .with_metadata("has_pool", true),
                vec![0.2; dimension],
            ),
            IndexRecord::new(
                Document::new("p-3", "studio near beach").with_metadata("city", "Barcelona"),
                vec![0.3; dimension],
            ),
        ]
    }

    // ------------------------------------------------------------------------
    // Schema and batch tests
    // ------------------------------------------------------------------------

    #[test]
    fn test_make_schema() {
        let schema = make_schema(384);
        assert_eq!(schema.fields().len(), 4);
        assert_eq!(schema.field(0).name(), "id");
        assert_eq!(vector_width(&schema), Some(384));
    }

    #[test]
    fn test_build_record_batch() {
        let batch = build_record_batch(&make_records(8), 8).unwrap();
        assert_eq!(batch.num_rows(), 3);
        assert_eq!(batch.num_columns(), 4);
    }

    #[test]
    fn test_parse_rows_round_trips_metadata() {
        let batch = build_record_batch(&make_records(4), 4).unwrap();
        let rows = parse_rows(&batch).unwrap();
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[0].0.id, "p-1");
        assert_eq!(rows[0].0.number("price"), Some(1200.0));
        // Without a _distance column the distance defaults to 0.
        assert_eq!(rows[0].1, 0.0);
    }

    #[test]
    fn test_build_record_batch_empty() {
        let batch = build_record_batch(&[], 4).unwrap();
        assert_eq!(batch.num_rows(), 0);
    }

    // ------------------------------------------------------------------------
    // SQL translation tests
    // ------------------------------------------------------------------------

    #[test]
    fn test_filter_to_sql_leaves() {
        assert_eq!(
            filter_to_sql(&SearchFilter::equals("city", "L'Hospitalet")),
            "json_extract(metadata, '$.city') = 'L''Hospitalet'"
        );
        assert_eq!(
            filter_to_sql(&SearchFilter::at_least("price", 300.0)),
            "CAST(json_extract(metadata, '$.price') AS DOUBLE) >= 300"
        );
        assert_eq!(
            filter_to_sql(&SearchFilter::flag("has_pool", true)),
            "json_extract(metadata, '$.has_pool') = 'true'"
        );
    }

    #[test]
    fn test_filter_to_sql_composites() {
        let filter = SearchFilter::AllOf(vec![
            SearchFilter::one_of("energy_cert", vec!["A".into(), "B".into()]),
            SearchFilter::range("rooms", Some(1.0), Some(3.0)),
        ]);
        let sql = filter_to_sql(&filter);
        assert!(sql.contains(" OR "));
        assert!(sql.contains(" AND "));
        assert_eq!(filter_to_sql(&SearchFilter::AllOf(vec![])), "true");
    }

    #[test]
    fn test_id_predicate() {
        assert_eq!(
            id_predicate(&["a".into(), "b'c".into()]),
            "id IN ('a', 'b''c')"
        );
    }

    // ------------------------------------------------------------------------
    // Database tests
    // ------------------------------------------------------------------------

    #[tokio::test]
    async fn test_lancedb_add_search_and_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let db_path = dir.path().join("listings_db");
        let db_path = db_path.to_str().unwrap();
        let provider = MockEmbeddingProvider::new(4);

        let mut index = LancedbIndex::open(db_path, "properties", &provider)
            .await
            .unwrap();
        assert_eq!(index.count().await.unwrap(), 0);
        assert!(index.search(&[0.1; 4], 5, None).await.unwrap().is_empty());

        assert_eq!(index.add(make_records(4)).await.unwrap(), 3);
        assert_eq!(index.add(make_records(4)).await.unwrap(), 0);

        let hits = index.search(&[0.1; 4], 2, None).await.unwrap();
        assert_eq!(hits[0].0.id, "p-1");

        let reopened = LancedbIndex::open(db_path, "properties", &provider)
            .await
            .unwrap();
        assert_eq!(reopened.count().await.unwrap(), 3);
        let got = reopened.get(&["p-3".into(), "p-1".into()]).await.unwrap();
        assert_eq!(got[0].id, "p-3");
    }

    #[tokio::test]
    async fn test_lancedb_delete_and_clear() {
        let dir = tempfile::tempdir().unwrap();
        let db_path = dir.path().join("delete_db");
        let provider = MockEmbeddingProvider::new(4);

        let mut index = LancedbIndex::open(db_path.to_str().unwrap(), "properties", &provider)
            .await
            .unwrap();
        index.add(make_records(4)).await.unwrap();

        assert_eq!(index.delete(&["p-2".into()]).await.unwrap(), 1);
        index.clear().await.unwrap();
        assert_eq!(index.count().await.unwrap(), 0);
    }
}
