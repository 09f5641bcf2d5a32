use async_trait::async_trait;
use serde_json::Value;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::domains::content::repository::{
    Collaborator, FieldValueProvider, RecordStore, SchemaProvider, TaxonomyProvider,
};
use crate::domains::content::values::normalize_field_value;
use crate::domains::export::types::{
    FieldDefinition, RecordEntry, RecordType, RecordTypeInfo, SchemaGroup,
};
use crate::errors::ExportResult;

#[derive(Debug, Clone)]
struct StoredRecord {
    record_type: String,
    entry: RecordEntry,
    terms: Vec<String>,
    values: HashMap<String, String>,
}

/// In-memory content for hosts that already hold their records, and for tests.
///
/// Built up front with the `with_*` methods; read-only afterwards. A
/// collaborator can be marked unreachable to exercise failure paths.
#[derive(Debug, Default)]
pub struct InMemoryContentStore {
    record_types: Vec<RecordTypeInfo>,
    groups: Vec<(String, SchemaGroup)>,
    fields: HashMap<String, Vec<FieldDefinition>>,
    records: Vec<StoredRecord>,
    unavailable: HashSet<Collaborator>,
    bulk_queries: AtomicUsize,
}

impl InMemoryContentStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_record_type(mut self, name: &str, label: &str) -> Self {
        self.record_types.push(RecordTypeInfo {
            name: name.to_string(),
            label: label.to_string(),
        });
        self
    }

    /// Attach a schema group to `record_type`. Groups keep insertion order.
    pub fn with_schema_group(
        mut self,
        record_type: &str,
        group_id: &str,
        fields: Vec<FieldDefinition>,
    ) -> Self {
        let group = SchemaGroup {
            id: group_id.to_string(),
            title: group_id.to_string(),
        };
        self.groups.push((record_type.to_string(), group));
        self.fields.insert(group_id.to_string(), fields);
        self
    }

    /// Add a record. Values are normalized as they would be by any provider.
    pub fn with_record(
        mut self,
        record_type: &str,
        id: &str,
        title: &str,
        terms: &[&str],
        values: Vec<(&str, Value)>,
    ) -> Self {
        self.records.push(StoredRecord {
            record_type: record_type.to_string(),
            entry: RecordEntry {
                id: id.to_string(),
                title: title.to_string(),
            },
            terms: terms.iter().map(|t| t.to_string()).collect(),
            values: values
                .into_iter()
                .map(|(name, value)| (name.to_string(), normalize_field_value(&value)))
                .collect(),
        });
        self
    }

    pub fn with_unavailable(mut self, collaborator: Collaborator) -> Self {
        self.unavailable.insert(collaborator);
        self
    }

    /// How many times `query_all` has been called
    pub fn bulk_queries(&self) -> usize {
        self.bulk_queries.load(Ordering::SeqCst)
    }

    fn check(&self, collaborator: Collaborator) -> ExportResult<()> {
        if self.unavailable.contains(&collaborator) {
            return Err(collaborator.unavailable("connection refused"));
        }
        Ok(())
    }

    fn find(&self, record_id: &str) -> Option<&StoredRecord> {
        self.records.iter().find(|r| r.entry.id == record_id)
    }
}

#[async_trait]
impl RecordStore for InMemoryContentStore {
    async fn list_record_types(&self) -> ExportResult<Vec<RecordTypeInfo>> {
        self.check(Collaborator::RecordStore)?;
        Ok(self.record_types.clone())
    }

    async fn query_all(&self, record_type: &RecordType) -> ExportResult<Vec<RecordEntry>> {
        self.bulk_queries.fetch_add(1, Ordering::SeqCst);
        self.check(Collaborator::RecordStore)?;
        Ok(self
            .records
            .iter()
            .filter(|r| r.record_type == record_type.as_str())
            .map(|r| r.entry.clone())
            .collect())
    }
}

#[async_trait]
impl SchemaProvider for InMemoryContentStore {
    async fn schema_groups_for(&self, record_type: &RecordType) -> ExportResult<Vec<SchemaGroup>> {
        self.check(Collaborator::SchemaProvider)?;
        Ok(self
            .groups
            .iter()
            .filter(|(owner, _)| owner == record_type.as_str())
            .map(|(_, group)| group.clone())
            .collect())
    }

    async fn fields_of(&self, group: &SchemaGroup) -> ExportResult<Vec<FieldDefinition>> {
        self.check(Collaborator::SchemaProvider)?;
        Ok(self.fields.get(&group.id).cloned().unwrap_or_default())
    }
}

#[async_trait]
impl FieldValueProvider for InMemoryContentStore {
    async fn field_values(&self, record_id: &str) -> ExportResult<HashMap<String, String>> {
        self.check(Collaborator::FieldValueProvider)?;
        Ok(self.find(record_id).map(|r| r.values.clone()).unwrap_or_default())
    }
}

#[async_trait]
impl TaxonomyProvider for InMemoryContentStore {
    async fn terms_of(&self, record_id: &str) -> ExportResult<Vec<String>> {
        self.check(Collaborator::TaxonomyProvider)?;
        Ok(self.find(record_id).map(|r| r.terms.clone()).unwrap_or_default())
    }
}
