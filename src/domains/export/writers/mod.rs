pub mod csv_writer;

pub use csv_writer::{encode_document, encode_row, CsvConfig, StreamingCsvWriter, UTF8_BOM};
