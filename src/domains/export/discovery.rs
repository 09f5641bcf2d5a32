use std::sync::Arc;

use crate::domains::content::SchemaProvider;
use crate::domains::export::types::{FieldDefinition, RecordType};
use crate::errors::ExportResult;

/// Resolves the custom fields available for a record type.
///
/// Only the first schema group the provider returns is used. When a type has
/// several groups, fields from the later ones are not offered and not
/// exported. Merging groups would change the exported column set, so it stays
/// this way until product decides otherwise.
///
/// Results are not cached; every call asks the provider again.
#[derive(Clone)]
pub struct FieldDiscoveryService {
    schema: Arc<dyn SchemaProvider>,
}

impl std::fmt::Debug for FieldDiscoveryService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FieldDiscoveryService")
            .field("schema", &"<SchemaProvider>")
            .finish()
    }
}

impl FieldDiscoveryService {
    pub fn new(schema: Arc<dyn SchemaProvider>) -> Self {
        Self { schema }
    }

    /// Ordered field definitions for `record_type`; empty when the type has no
    /// schema group.
    pub async fn discover_fields(&self, record_type: &str) -> ExportResult<Vec<FieldDefinition>> {
        let record_type = RecordType::parse(record_type)?;
        self.discover(&record_type).await
    }

    pub async fn discover(&self, record_type: &RecordType) -> ExportResult<Vec<FieldDefinition>> {
        let groups = self.schema.schema_groups_for(record_type).await?;

        let Some(first) = groups.first() else {
            log::debug!("No schema group registered for {}", record_type);
            return Ok(Vec::new());
        };

        if groups.len() > 1 {
            log::warn!(
                "{} has {} schema groups; only '{}' is used",
                record_type,
                groups.len(),
                first.id
            );
        }

        let fields = self.schema.fields_of(first).await?;
        log::debug!("Discovered {} fields for {}", fields.len(), record_type);
        Ok(fields)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domains::content::{Collaborator, InMemoryContentStore};

    fn article_fields() -> Vec<FieldDefinition> {
        vec![
            FieldDefinition::new("k1", "n1", "Summary"),
            FieldDefinition::new("k2", "n2", "Author"),
        ]
    }

    #[tokio::test]
    async fn test_discovers_fields_in_schema_order() {
        let store = InMemoryContentStore::new().with_schema_group("article", "g1", article_fields());
        let service = FieldDiscoveryService::new(Arc::new(store));
        assert_eq!(service.discover_fields("article").await.unwrap(), article_fields());
    }

    #[tokio::test]
    async fn test_no_group_is_empty_not_error() {
        let service = FieldDiscoveryService::new(Arc::new(InMemoryContentStore::new()));
        assert!(service.discover_fields("event").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_only_first_group_is_used() {
        let store = InMemoryContentStore::new()
            .with_schema_group("article", "g1", article_fields())
            .with_schema_group("article", "g2", vec![FieldDefinition::new("k9", "n9", "Extra")]);
        let service = FieldDiscoveryService::new(Arc::new(store));
        let keys: Vec<_> = service
            .discover_fields("article")
            .await
            .unwrap()
            .into_iter()
            .map(|f| f.key)
            .collect();
        assert_eq!(keys, vec!["k1", "k2"]);
    }

    #[tokio::test]
    async fn test_empty_record_type_is_invalid_argument() {
        let service = FieldDiscoveryService::new(Arc::new(InMemoryContentStore::new()));
        assert!(service.discover_fields("").await.unwrap_err().is_invalid_argument());
    }

    #[tokio::test]
    async fn test_provider_failure_propagates() {
        let store = InMemoryContentStore::new().with_unavailable(Collaborator::SchemaProvider);
        let service = FieldDiscoveryService::new(Arc::new(store));
        assert!(service.discover_fields("article").await.unwrap_err().is_collaborator_unavailable());
    }

    #[tokio::test]
    async fn test_serializes_as_key_name_label_objects() {
        let store = InMemoryContentStore::new().with_schema_group("article", "g1", article_fields());
        let service = FieldDiscoveryService::new(Arc::new(store));
        let fields = service.discover_fields("article").await.unwrap();
        let json = serde_json::to_value(&fields).unwrap();
        assert_eq!(json[1], serde_json::json!({"key": "k2", "name": "n2", "label": "Author"}));
    }
}
