use chrono::{Local, NaiveDate};
use regex::Regex;
use serde::Serialize;
use std::path::PathBuf;
use std::sync::OnceLock;
use std::time::Instant;
use tokio::io::BufWriter;

use crate::domains::export::service::ExportService;
use crate::domains::export::types::{ExportStats, RecordType, Selection};
use crate::domains::export::writers::{CsvConfig, StreamingCsvWriter};
use crate::errors::{ExportError, ExportResult};

pub const CSV_CONTENT_TYPE: &str = "text/csv";

/// Mode of delivered files: owner read/write, everyone else read.
#[cfg(unix)]
const EXPORT_FILE_MODE: u32 = 0o644;

fn unsafe_filename_chars() -> &'static Regex {
    static UNSAFE: OnceLock<Regex> = OnceLock::new();
    UNSAFE.get_or_init(|| Regex::new(r"[^A-Za-z0-9_-]").unwrap())
}

/// Execution date on the local clock
pub fn export_date() -> NaiveDate {
    Local::now().date_naive()
}

/// `post_data_<recordType>_<YYYYMMDD>.csv`, with characters that are unsafe in
/// a file name replaced by `_`.
pub fn attachment_filename(record_type: &RecordType, date: NaiveDate) -> String {
    let safe_type = unsafe_filename_chars().replace_all(record_type.as_str(), "_");
    format!("post_data_{}_{}.csv", safe_type, date.format("%Y%m%d"))
}

/// A finished export ready to hand to a download response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attachment {
    pub filename: String,
    pub content_type: &'static str,
    pub body: Vec<u8>,
    pub stats: ExportStats,
}

impl Attachment {
    /// Response headers: served as a download, never cached.
    pub fn headers(&self) -> Vec<(&'static str, String)> {
        vec![
            ("Content-Type", self.content_type.to_string()),
            (
                "Content-Disposition",
                format!("attachment; filename=\"{}\"", self.filename),
            ),
            ("Pragma", "no-cache".to_string()),
            ("Expires", "0".to_string()),
        ]
    }
}

/// Build the whole attachment in memory, dated today.
pub async fn build_attachment(
    service: &ExportService,
    record_type: &str,
    selection: &Selection,
    config: &CsvConfig,
) -> ExportResult<Attachment> {
    build_attachment_dated(service, record_type, selection, config, export_date()).await
}

pub async fn build_attachment_dated(
    service: &ExportService,
    record_type: &str,
    selection: &Selection,
    config: &CsvConfig,
    date: NaiveDate,
) -> ExportResult<Attachment> {
    let record_type = RecordType::parse(record_type)?;
    let mut body = Vec::new();
    let stats = service
        .write_csv(record_type.as_str(), selection, &mut body, config)
        .await?;

    Ok(Attachment {
        filename: attachment_filename(&record_type, date),
        content_type: CSV_CONTENT_TYPE,
        body,
        stats,
    })
}

/// Where a file delivery ended up.
#[derive(Debug, Clone, Serialize)]
pub struct DeliveredExport {
    pub path: PathBuf,
    pub filename: String,
    pub stats: ExportStats,
}

/// Streams exports into files under one output directory.
///
/// Rows go to a hidden temporary file next to the destination, which is only
/// renamed into place once every row has been written. A failed export leaves
/// nothing behind.
#[derive(Debug, Clone)]
pub struct FileDelivery {
    output_dir: PathBuf,
    config: CsvConfig,
}

impl FileDelivery {
    pub fn new(output_dir: impl Into<PathBuf>, config: CsvConfig) -> Self {
        Self {
            output_dir: output_dir.into(),
            config,
        }
    }

    pub async fn deliver(
        &self,
        service: &ExportService,
        record_type: &str,
        selection: &Selection,
    ) -> ExportResult<DeliveredExport> {
        self.deliver_dated(service, record_type, selection, export_date()).await
    }

    pub async fn deliver_dated(
        &self,
        service: &ExportService,
        record_type: &str,
        selection: &Selection,
        date: NaiveDate,
    ) -> ExportResult<DeliveredExport> {
        let started = Instant::now();
        let record_type = RecordType::parse(record_type)?;
        let filename = attachment_filename(&record_type, date);
        let path = self.output_dir.join(&filename);

        let rows = service.produce_rows(record_type.as_str(), selection).await?;

        tokio::fs::create_dir_all(&self.output_dir).await?;
        let temp = tempfile::Builder::new()
            .prefix(".post_export")
            .suffix(".tmp")
            .tempfile_in(&self.output_dir)?;
        let file = tokio::fs::File::from_std(temp.as_file().try_clone()?);

        let mut writer = StreamingCsvWriter::new(BufWriter::new(file), self.config.clone()).started_at(started);
        if let Err(e) = writer.write_stream(rows).await {
            log::error!("Export of {} aborted, discarding partial file: {}", record_type, e);
            return Err(e);
        }
        let (buffered, stats) = writer.finish().await?;
        let file = buffered.into_inner();
        file.sync_all().await?;
        drop(file);

        // tempfile creates 0600 files
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            temp.as_file()
                .set_permissions(std::fs::Permissions::from_mode(EXPORT_FILE_MODE))?;
        }

        temp.persist(&path)
            .map_err(|e| ExportError::Io(format!("failed to persist {}: {}", path.display(), e.error)))?;

        log::info!(
            "Wrote {} ({} records, {} bytes, {} ms)",
            path.display(),
            stats.records_written,
            stats.bytes_written,
            stats.duration_ms
        );

        Ok(DeliveredExport { path, filename, stats })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domains::content::{Collaborator, InMemoryContentStore};
    use crate::domains::export::types::FieldDefinition;
    use serde_json::json;
    use std::sync::Arc;

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 3, 7).unwrap()
    }

    fn store() -> InMemoryContentStore {
        InMemoryContentStore::new()
            .with_schema_group("article", "g1", vec![FieldDefinition::new("k2", "n2", "Author")])
            .with_record("article", "1", "Hello", &["News"], vec![("n2", json!("Jane"))])
    }

    fn selection() -> Selection {
        vec!["k2"].into_iter().collect()
    }

    #[test]
    fn test_filename_pattern() {
        let article = RecordType::parse("article").unwrap();
        assert_eq!(attachment_filename(&article, date()), "post_data_article_20250307.csv");

        let sneaky = RecordType::parse("../etc/x").unwrap();
        assert_eq!(attachment_filename(&sneaky, date()), "post_data____etc_x_20250307.csv");
    }

    #[tokio::test]
    async fn test_attachment_headers_and_body() {
        let service = ExportService::from_content(Arc::new(store()));
        let attachment = build_attachment_dated(&service, "article", &selection(), &CsvConfig::default(), date())
            .await
            .unwrap();

        assert_eq!(attachment.body, b"Title,Taxonomies,Author\nHello,News,Jane\n");
        assert_eq!(attachment.stats.records_written, 1);
        let headers = attachment.headers();
        assert!(headers.contains(&("Content-Type", "text/csv".to_string())));
        assert!(headers.contains(&(
            "Content-Disposition",
            "attachment; filename=\"post_data_article_20250307.csv\"".to_string()
        )));
        assert!(headers.contains(&("Pragma", "no-cache".to_string())));
        assert!(headers.contains(&("Expires", "0".to_string())));
    }

    #[tokio::test]
    async fn test_file_delivery_writes_named_file() {
        let dir = tempfile::tempdir().unwrap();
        let service = ExportService::from_content(Arc::new(store()));
        let delivery = FileDelivery::new(dir.path(), CsvConfig::default());

        let delivered = delivery
            .deliver_dated(&service, "article", &selection(), date())
            .await
            .unwrap();

        assert_eq!(delivered.filename, "post_data_article_20250307.csv");
        assert_eq!(delivered.stats.records_written, 1);
        let contents = std::fs::read_to_string(&delivered.path).unwrap();
        assert_eq!(contents, "Title,Taxonomies,Author\nHello,News,Jane\n");
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 1);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_delivered_file_is_world_readable() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let service = ExportService::from_content(Arc::new(store()));
        let delivery = FileDelivery::new(dir.path(), CsvConfig::default());

        let delivered = delivery
            .deliver_dated(&service, "article", &selection(), date())
            .await
            .unwrap();

        let mode = std::fs::metadata(&delivered.path).unwrap().permissions().mode() & 0o777;
        assert_eq!(mode, 0o644);
    }

    #[tokio::test]
    async fn test_failed_delivery_leaves_no_file() {
        let dir = tempfile::tempdir().unwrap();
        let service = ExportService::from_content(Arc::new(
            store().with_unavailable(Collaborator::TaxonomyProvider),
        ));
        let delivery = FileDelivery::new(dir.path(), CsvConfig::default());

        let err = delivery
            .deliver_dated(&service, "article", &selection(), date())
            .await
            .unwrap_err();

        assert!(err.is_collaborator_unavailable());
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn test_empty_record_type_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let service = ExportService::from_content(Arc::new(store()));
        let delivery = FileDelivery::new(dir.path(), CsvConfig::default());
        let err = delivery.deliver_dated(&service, " ", &selection(), date()).await.unwrap_err();
        assert!(err.is_invalid_argument());
    }
}
