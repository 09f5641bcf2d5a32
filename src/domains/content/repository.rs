use async_trait::async_trait;
use sqlx::{Row, SqlitePool};
use std::collections::HashMap;

use crate::domains::content::values::normalize_stored_value;
use crate::domains::export::types::{
    FieldDefinition, RecordEntry, RecordType, RecordTypeInfo, SchemaGroup,
};
use crate::errors::{DbError, ExportError, ExportResult};

/// The external systems the export reads from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Collaborator {
    RecordStore,
    SchemaProvider,
    FieldValueProvider,
    TaxonomyProvider,
}

impl Collaborator {
    pub fn name(&self) -> &'static str {
        match self {
            Collaborator::RecordStore => "record store",
            Collaborator::SchemaProvider => "schema provider",
            Collaborator::FieldValueProvider => "field value provider",
            Collaborator::TaxonomyProvider => "taxonomy provider",
        }
    }

    pub fn unavailable<E: std::fmt::Display>(&self, reason: E) -> ExportError {
        ExportError::collaborator(self.name(), reason)
    }
}

/// Supplies every record of a type in one bulk call.
#[async_trait]
pub trait RecordStore: Send + Sync {
    async fn list_record_types(&self) -> ExportResult<Vec<RecordTypeInfo>>;

    /// All records of `record_type`, in store order. No pagination.
    async fn query_all(&self, record_type: &RecordType) -> ExportResult<Vec<RecordEntry>>;
}

/// Supplies the custom field schema registered for a record type.
#[async_trait]
pub trait SchemaProvider: Send + Sync {
    /// Groups attached to `record_type`, in provider order.
    async fn schema_groups_for(&self, record_type: &RecordType) -> ExportResult<Vec<SchemaGroup>>;

    /// Fields of one group, in display order.
    async fn fields_of(&self, group: &SchemaGroup) -> ExportResult<Vec<FieldDefinition>>;
}

/// Supplies a record's custom field values, already normalized to strings
/// and keyed by field name.
#[async_trait]
pub trait FieldValueProvider: Send + Sync {
    async fn field_values(&self, record_id: &str) -> ExportResult<HashMap<String, String>>;
}

/// Supplies the names of the terms attached to a record.
#[async_trait]
pub trait TaxonomyProvider: Send + Sync {
    async fn terms_of(&self, record_id: &str) -> ExportResult<Vec<String>>;
}

/// SQLite-backed implementation of all four collaborators
#[derive(Debug, Clone)]
pub struct SqliteContentRepository {
    pool: SqlitePool,
}

impl SqliteContentRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

fn db_failure(collaborator: Collaborator, error: sqlx::Error) -> ExportError {
    let error = DbError::from(error);
    log::error!("{} query failed: {}", collaborator.name(), error);
    collaborator.unavailable(error)
}

#[async_trait]
impl RecordStore for SqliteContentRepository {
    async fn list_record_types(&self) -> ExportResult<Vec<RecordTypeInfo>> {
        let rows = sqlx::query("SELECT name, label FROM post_types WHERE public = 1 ORDER BY name")
            .fetch_all(&self.pool)
            .await
            .map_err(|e| db_failure(Collaborator::RecordStore, e))?;

        rows.iter()
            .map(|row| {
                Ok(RecordTypeInfo {
                    name: row.try_get("name").map_err(|e| db_failure(Collaborator::RecordStore, e))?,
                    label: row.try_get("label").map_err(|e| db_failure(Collaborator::RecordStore, e))?,
                })
            })
            .collect()
    }

    async fn query_all(&self, record_type: &RecordType) -> ExportResult<Vec<RecordEntry>> {
        let rows = sqlx::query(
            "SELECT id, title FROM posts WHERE post_type = ? ORDER BY published_at DESC, id ASC",
        )
        .bind(record_type.as_str())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| db_failure(Collaborator::RecordStore, e))?;

        log::debug!("Fetched {} {} records", rows.len(), record_type);

        rows.iter()
            .map(|row| {
                Ok(RecordEntry {
                    id: row.try_get("id").map_err(|e| db_failure(Collaborator::RecordStore, e))?,
                    title: row.try_get("title").map_err(|e| db_failure(Collaborator::RecordStore, e))?,
                })
            })
            .collect()
    }
}

#[async_trait]
impl SchemaProvider for SqliteContentRepository {
    async fn schema_groups_for(&self, record_type: &RecordType) -> ExportResult<Vec<SchemaGroup>> {
        let rows = sqlx::query(
            r#"
                SELECT g.id, g.title
                FROM field_groups g
                JOIN field_group_locations l ON l.group_id = g.id
                WHERE l.post_type = ?
                ORDER BY g.menu_order ASC, g.id ASC
            "#,
        )
        .bind(record_type.as_str())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| db_failure(Collaborator::SchemaProvider, e))?;

        rows.iter()
            .map(|row| {
                Ok(SchemaGroup {
                    id: row.try_get("id").map_err(|e| db_failure(Collaborator::SchemaProvider, e))?,
                    title: row.try_get("title").map_err(|e| db_failure(Collaborator::SchemaProvider, e))?,
                })
            })
            .collect()
    }

    async fn fields_of(&self, group: &SchemaGroup) -> ExportResult<Vec<FieldDefinition>> {
        let rows = sqlx::query(
            "SELECT field_key, name, label FROM fields WHERE group_id = ? ORDER BY position ASC, field_key ASC",
        )
        .bind(&group.id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| db_failure(Collaborator::SchemaProvider, e))?;

        rows.iter()
            .map(|row| {
                Ok(FieldDefinition {
                    key: row.try_get("field_key").map_err(|e| db_failure(Collaborator::SchemaProvider, e))?,
                    name: row.try_get("name").map_err(|e| db_failure(Collaborator::SchemaProvider, e))?,
                    label: row.try_get("label").map_err(|e| db_failure(Collaborator::SchemaProvider, e))?,
                })
            })
            .collect()
    }
}

#[async_trait]
impl FieldValueProvider for SqliteContentRepository {
    async fn field_values(&self, record_id: &str) -> ExportResult<HashMap<String, String>> {
        let rows = sqlx::query("SELECT field_name, value FROM post_field_values WHERE post_id = ?")
            .bind(record_id)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| db_failure(Collaborator::FieldValueProvider, e))?;

        let mut values = HashMap::with_capacity(rows.len());
        for row in &rows {
            let name: String = row
                .try_get("field_name")
                .map_err(|e| db_failure(Collaborator::FieldValueProvider, e))?;
            let raw: Option<String> = row
                .try_get("value")
                .map_err(|e| db_failure(Collaborator::FieldValueProvider, e))?;
            values.insert(name, normalize_stored_value(raw.as_deref()));
        }
        Ok(values)
    }
}

#[async_trait]
impl TaxonomyProvider for SqliteContentRepository {
    async fn terms_of(&self, record_id: &str) -> ExportResult<Vec<String>> {
        sqlx::query_scalar::<_, String>(
            r#"
                SELECT t.name
                FROM post_terms pt
                JOIN terms t ON t.id = pt.term_id
                WHERE pt.post_id = ?
                ORDER BY t.name ASC, t.id ASC
            "#,
        )
        .bind(record_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| db_failure(Collaborator::TaxonomyProvider, e))
    }
}
