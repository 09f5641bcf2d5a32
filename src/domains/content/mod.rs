pub mod memory;
pub mod repository;
pub mod values;

pub use memory::InMemoryContentStore;
pub use repository::{
    Collaborator, FieldValueProvider, RecordStore, SchemaProvider, SqliteContentRepository,
    TaxonomyProvider,
};
pub use values::normalize_field_value;
