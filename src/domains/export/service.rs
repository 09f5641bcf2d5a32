use futures::stream::{self, Stream, StreamExt, TryStreamExt};
use std::pin::Pin;
use std::sync::Arc;
use std::time::Instant;
use tokio::io::{AsyncWrite, AsyncWriteExt};

use crate::domains::content::{FieldValueProvider, RecordStore, SchemaProvider, TaxonomyProvider};
use crate::domains::export::columns::ColumnPlan;
use crate::domains::export::discovery::FieldDiscoveryService;
use crate::domains::export::types::{
    ExportDocument, ExportStats, Record, RecordEntry, RecordType, RecordTypeInfo, Selection,
};
use crate::domains::export::writers::{encode_document, CsvConfig};
use crate::errors::{ExportError, ExportResult};

/// Finite, single-pass sequence of rows. The header is always the first item.
pub type RowStream = Pin<Box<dyn Stream<Item = ExportResult<Vec<String>>> + Send>>;

/// Builds CSV exports of one record type from the injected collaborators.
///
/// Each call works on its own snapshot: resolve schema, build header, fetch
/// all records in one call, map every record to a row. Nothing is kept
/// between calls.
#[derive(Clone)]
pub struct ExportService {
    records: Arc<dyn RecordStore>,
    discovery: FieldDiscoveryService,
    values: Arc<dyn FieldValueProvider>,
    taxonomy: Arc<dyn TaxonomyProvider>,
}

impl std::fmt::Debug for ExportService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExportService")
            .field("records", &"<RecordStore>")
            .field("discovery", &self.discovery)
            .field("values", &"<FieldValueProvider>")
            .field("taxonomy", &"<TaxonomyProvider>")
            .finish()
    }
}

impl ExportService {
    pub fn new(
        records: Arc<dyn RecordStore>,
        schema: Arc<dyn SchemaProvider>,
        values: Arc<dyn FieldValueProvider>,
        taxonomy: Arc<dyn TaxonomyProvider>,
    ) -> Self {
        Self {
            records,
            discovery: FieldDiscoveryService::new(schema),
            values,
            taxonomy,
        }
    }

    /// Wire all four collaborators to one backend.
    pub fn from_content<C>(content: Arc<C>) -> Self
    where
        C: RecordStore + SchemaProvider + FieldValueProvider + TaxonomyProvider + 'static,
    {
        Self::new(content.clone(), content.clone(), content.clone(), content)
    }

    pub fn discovery(&self) -> &FieldDiscoveryService {
        &self.discovery
    }

    pub async fn list_record_types(&self) -> ExportResult<Vec<RecordTypeInfo>> {
        self.records.list_record_types().await
    }

    /// Header first, then one row per record in store order.
    ///
    /// Schema resolution and the bulk fetch happen before this returns, so a
    /// failure of either is reported here rather than mid-stream. Per-record
    /// lookups run lazily as the stream is polled.
    pub async fn produce_rows(&self, record_type: &str, selection: &Selection) -> ExportResult<RowStream> {
        let record_type = RecordType::parse(record_type)?;

        let schema = self.discovery.discover(&record_type).await?;
        let plan = Arc::new(ColumnPlan::resolve(schema, selection));
        let header = plan.header();

        let entries = self.records.query_all(&record_type).await?;
        log::info!(
            "Exporting {} {} records with {} of {} requested fields",
            entries.len(),
            record_type,
            plan.fields().len(),
            selection.len()
        );

        let values = self.values.clone();
        let taxonomy = self.taxonomy.clone();
        let rows = stream::iter(entries).then(move |entry| {
            let values = values.clone();
            let taxonomy = taxonomy.clone();
            let plan = plan.clone();
            async move {
                let record = snapshot(entry, values.as_ref(), taxonomy.as_ref()).await?;
                Ok::<_, ExportError>(plan.row_for(&record))
            }
        });

        Ok(Box::pin(stream::once(async move { Ok::<_, ExportError>(header) }).chain(rows)))
    }

    /// Whole document in memory; fails without a partial result.
    pub async fn generate(&self, record_type: &str, selection: &Selection) -> ExportResult<ExportDocument> {
        let mut rows = self.produce_rows(record_type, selection).await?;

        let header = match rows.try_next().await? {
            Some(header) => header,
            None => return Err(ExportError::Serialization("row stream produced no header".to_string())),
        };

        let mut document = ExportDocument::new(header);
        while let Some(row) = rows.try_next().await? {
            document.push_row(row)?;
        }
        Ok(document)
    }

    /// Generate the whole document, then write it to `writer` in one go.
    ///
    /// Nothing reaches the writer unless generation succeeded.
    pub async fn write_csv<W>(
        &self,
        record_type: &str,
        selection: &Selection,
        writer: &mut W,
        config: &CsvConfig,
    ) -> ExportResult<ExportStats>
    where
        W: AsyncWrite + Unpin + Send,
    {
        let start = Instant::now();
        let document = self.generate(record_type, selection).await?;
        let bytes = encode_document(&document, config)?;
        writer.write_all(&bytes).await?;
        writer.flush().await?;

        Ok(ExportStats {
            records_written: document.record_count(),
            bytes_written: bytes.len(),
            duration_ms: start.elapsed().as_millis() as u64,
        })
    }
}

async fn snapshot(
    entry: RecordEntry,
    values: &dyn FieldValueProvider,
    taxonomy: &dyn TaxonomyProvider,
) -> ExportResult<Record> {
    let terms = taxonomy.terms_of(&entry.id).await?;
    let field_values = values.field_values(&entry.id).await?;
    Ok(Record {
        id: entry.id,
        title: entry.title,
        terms,
        field_values,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domains::content::{Collaborator, InMemoryContentStore};
    use crate::domains::export::types::FieldDefinition;
    use serde_json::json;

    fn article_store() -> InMemoryContentStore {
        InMemoryContentStore::new()
            .with_record_type("article", "Articles")
            .with_schema_group(
                "article",
                "g1",
                vec![
                    FieldDefinition::new("k1", "n1", "Summary"),
                    FieldDefinition::new("k2", "n2", "Author"),
                ],
            )
            .with_record("article", "1", "Hello", &["News"], vec![("n2", json!("Jane"))])
    }

    fn selection(keys: &[&str]) -> Selection {
        keys.iter().copied().collect()
    }

    async fn csv_for(service: &ExportService, record_type: &str, keys: &[&str]) -> String {
        let mut out = Vec::new();
        service
            .write_csv(record_type, &selection(keys), &mut out, &CsvConfig::default())
            .await
            .unwrap();
        String::from_utf8(out).unwrap()
    }

    fn decode(bytes: &[u8]) -> Vec<Vec<String>> {
        csv::ReaderBuilder::new()
            .has_headers(false)
            .from_reader(bytes)
            .records()
            .map(|r| r.unwrap().iter().map(str::to_string).collect())
            .collect()
    }

    #[tokio::test]
    async fn test_single_selected_field() {
        let service = ExportService::from_content(Arc::new(article_store()));
        assert_eq!(
            csv_for(&service, "article", &["k2"]).await,
            "Title,Taxonomies,Author\nHello,News,Jane\n"
        );
    }

    #[tokio::test]
    async fn test_unknown_key_ignored() {
        let service = ExportService::from_content(Arc::new(article_store()));
        assert_eq!(
            csv_for(&service, "article", &["k2", "bogus"]).await,
            csv_for(&service, "article", &["k2"]).await
        );
    }

    #[tokio::test]
    async fn test_type_without_schema_group() {
        let store = InMemoryContentStore::new().with_record("note", "7", "X", &[], vec![]);
        let service = ExportService::from_content(Arc::new(store));
        assert_eq!(csv_for(&service, "note", &["k1"]).await, "Title,Taxonomies\nX,\n");
    }

    #[tokio::test]
    async fn test_empty_result_is_header_only() {
        let store = article_store();
        let service = ExportService::from_content(Arc::new(store));
        let document = service.generate("product", &selection(&["k1"])).await.unwrap();
        assert_eq!(document.record_count(), 0);
        assert_eq!(document.header(), &["Title".to_string(), "Taxonomies".to_string()]);
    }

    #[tokio::test]
    async fn test_rows_match_header_width_and_missing_values_are_empty() {
        let store = article_store()
            .with_record("article", "2", "Second", &[], vec![("n1", json!("Brief"))])
            .with_record("article", "3", "Third", &["A", "B"], vec![]);
        let service = ExportService::from_content(Arc::new(store));
        let document = service.generate("article", &selection(&["k2", "k1"])).await.unwrap();

        assert_eq!(document.header(), &["Title", "Taxonomies", "Summary", "Author"]);
        for row in document.rows() {
            assert_eq!(row.len(), document.width());
        }
        assert_eq!(document.rows()[0], vec!["Hello", "News", "", "Jane"]);
        assert_eq!(document.rows()[1], vec!["Second", "", "Brief", ""]);
        assert_eq!(document.rows()[2], vec!["Third", "A, B", "", ""]);
    }

    #[tokio::test]
    async fn test_round_trip_with_awkward_values() {
        let store = InMemoryContentStore::new()
            .with_schema_group("article", "g1", vec![FieldDefinition::new("k1", "body", "Body, \"quoted\"")])
            .with_record(
                "article",
                "1",
                "Comma, \"quote\"",
                &["Line\nbreak", "Plain"],
                vec![("body", json!("multi\r\nline, \"text\""))],
            )
            .with_record("article", "2", "", &[], vec![]);
        let service = ExportService::from_content(Arc::new(store));
        let document = service.generate("article", &selection(&["k1"])).await.unwrap();
        let bytes = encode_document(&document, &CsvConfig::default()).unwrap();

        let decoded = decode(&bytes);
        let expected: Vec<Vec<String>> = document.all_rows().cloned().collect();
        assert_eq!(decoded, expected);
    }

    #[tokio::test]
    async fn test_records_fetched_in_one_bulk_call() {
        let store = Arc::new(
            article_store().with_record("article", "2", "Second", &[], vec![]),
        );
        let service = ExportService::from_content(store.clone());
        service.generate("article", &Selection::empty()).await.unwrap();
        assert_eq!(store.bulk_queries(), 1);
    }

    #[tokio::test]
    async fn test_empty_record_type_rejected_before_any_lookup() {
        let store = Arc::new(article_store());
        let service = ExportService::from_content(store.clone());
        let mut out = Vec::new();
        let err = service
            .write_csv("", &Selection::empty(), &mut out, &CsvConfig::default())
            .await
            .unwrap_err();
        assert!(err.is_invalid_argument());
        assert!(out.is_empty());
        assert_eq!(store.bulk_queries(), 0);
    }

    #[tokio::test]
    async fn test_collaborator_failures_produce_no_output() {
        for collaborator in [
            Collaborator::RecordStore,
            Collaborator::SchemaProvider,
            Collaborator::FieldValueProvider,
            Collaborator::TaxonomyProvider,
        ] {
            let service = ExportService::from_content(Arc::new(article_store().with_unavailable(collaborator)));
            let mut out = Vec::new();
            let err = service
                .write_csv("article", &selection(&["k2"]), &mut out, &CsvConfig::default())
                .await
                .unwrap_err();
            assert!(err.is_collaborator_unavailable(), "{:?}", collaborator);
            assert!(out.is_empty(), "{:?} leaked partial output", collaborator);
        }
    }

    #[tokio::test]
    async fn test_produce_rows_streams_header_first() {
        let service = ExportService::from_content(Arc::new(article_store()));
        let rows: Vec<Vec<String>> = service
            .produce_rows("article", &selection(&["k1", "k2"]))
            .await
            .unwrap()
            .try_collect()
            .await
            .unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0], vec!["Title", "Taxonomies", "Summary", "Author"]);
        assert_eq!(rows[1], vec!["Hello", "News", "", "Jane"]);
    }

    #[tokio::test]
    async fn test_list_record_types() {
        let service = ExportService::from_content(Arc::new(article_store()));
        let types = service.list_record_types().await.unwrap();
        assert_eq!(types, vec![RecordTypeInfo { name: "article".into(), label: "Articles".into() }]);
    }
}
