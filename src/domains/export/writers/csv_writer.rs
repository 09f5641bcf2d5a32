use futures::stream::StreamExt;
use std::time::Instant;
use tokio::io::{AsyncWrite, AsyncWriteExt};

use crate::domains::export::service::RowStream;
use crate::domains::export::types::{ExportDocument, ExportStats};
use crate::errors::{ExportError, ExportResult};

/// UTF-8 byte-order mark some spreadsheet applications need to detect UTF-8
pub const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CsvConfig {
    pub delimiter: u8,
    pub quote_char: u8,
    pub include_bom: bool,
}

impl Default for CsvConfig {
    fn default() -> Self {
        Self {
            delimiter: b',',
            quote_char: b'"',
            include_bom: false,
        }
    }
}

impl CsvConfig {
    fn builder(&self) -> csv::WriterBuilder {
        let mut builder = csv::WriterBuilder::new();
        builder
            .delimiter(self.delimiter)
            .quote(self.quote_char)
            .quote_style(csv::QuoteStyle::Necessary)
            .double_quote(true)
            .terminator(csv::Terminator::Any(b'\n'));
        builder
    }
}

/// Encode a single row, including its line terminator.
///
/// Fields containing the delimiter, the quote character or a line break are
/// quoted; embedded quotes are doubled.
pub fn encode_row(row: &[String], config: &CsvConfig) -> ExportResult<Vec<u8>> {
    let mut buffer = Vec::new();
    {
        let mut wtr = config.builder().from_writer(&mut buffer);
        wtr.write_record(row)?;
        wtr.flush()?;
    }
    Ok(buffer)
}

/// Encode a whole document in memory.
pub fn encode_document(document: &ExportDocument, config: &CsvConfig) -> ExportResult<Vec<u8>> {
    let mut buffer = Vec::new();
    if config.include_bom {
        buffer.extend_from_slice(UTF8_BOM);
    }
    {
        let mut wtr = config.builder().from_writer(&mut buffer);
        for row in document.all_rows() {
            wtr.write_record(row)?;
        }
        wtr.flush()?;
    }
    Ok(buffer)
}

/// Writes rows to an async sink as they are produced.
///
/// The first row written is taken to be the header; every later row must have
/// the same width.
pub struct StreamingCsvWriter<W: AsyncWrite + Unpin + Send> {
    inner: W,
    config: CsvConfig,
    width: Option<usize>,
    rows_written: usize,
    bytes_written: usize,
    start_time: Instant,
}

impl<W: AsyncWrite + Unpin + Send> StreamingCsvWriter<W> {
    pub fn new(writer: W, config: CsvConfig) -> Self {
        Self {
            inner: writer,
            config,
            width: None,
            rows_written: 0,
            bytes_written: 0,
            start_time: Instant::now(),
        }
    }

    /// Count `duration_ms` from `start` instead of from construction, so the
    /// stats cover work done before the first row arrived.
    pub fn started_at(mut self, start: Instant) -> Self {
        self.start_time = start;
        self
    }

    pub async fn write_row(&mut self, row: &[String]) -> ExportResult<()> {
        match self.width {
            None => {
                if self.config.include_bom {
                    self.inner.write_all(UTF8_BOM).await?;
                    self.bytes_written += UTF8_BOM.len();
                }
                self.width = Some(row.len());
            }
            Some(width) if width != row.len() => {
                return Err(ExportError::Serialization(format!(
                    "row {} has {} columns, header has {}",
                    self.rows_written,
                    row.len(),
                    width
                )));
            }
            Some(_) => {}
        }

        let buffer = encode_row(row, &self.config)?;
        self.inner.write_all(&buffer).await?;
        self.rows_written += 1;
        self.bytes_written += buffer.len();
        Ok(())
    }

    /// Drain `rows` into the sink, stopping at the first error.
    pub async fn write_stream(&mut self, mut rows: RowStream) -> ExportResult<()> {
        while let Some(row) = rows.next().await {
            self.write_row(&row?).await?;
        }
        Ok(())
    }

    pub async fn flush(&mut self) -> ExportResult<()> {
        self.inner.flush().await?;
        Ok(())
    }

    pub fn stats(&self) -> ExportStats {
        ExportStats {
            records_written: self.rows_written.saturating_sub(1),
            bytes_written: self.bytes_written,
            duration_ms: self.start_time.elapsed().as_millis() as u64,
        }
    }

    /// Flush and hand back the sink with the final statistics.
    pub async fn finish(mut self) -> ExportResult<(W, ExportStats)> {
        self.flush().await?;
        let stats = self.stats();
        Ok((self.inner, stats))
    }
}
