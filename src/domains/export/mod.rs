pub mod columns;
pub mod delivery;
pub mod discovery;
pub mod service;
pub mod types;
pub mod writers;

pub use columns::ColumnPlan;
pub use delivery::{attachment_filename, build_attachment, Attachment, DeliveredExport, FileDelivery};
pub use discovery::FieldDiscoveryService;
pub use service::{ExportService, RowStream};
pub use types::{
    ExportDocument, ExportRequest, ExportStats, FieldDefinition, Record, RecordType, RecordTypeInfo,
    Selection,
};
pub use writers::{CsvConfig, StreamingCsvWriter};
