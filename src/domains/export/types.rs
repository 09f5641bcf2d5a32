use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};
use std::fmt;

use crate::errors::{ExportError, ExportResult, ValidationError};
use crate::validation::{Validate, ValidationBuilder};

/// Fixed leading column holding the record title
pub const TITLE_COLUMN: &str = "Title";
/// Fixed second column holding the joined term names
pub const TAXONOMIES_COLUMN: &str = "Taxonomies";
/// Separator used when joining a record's terms into one cell
pub const TERM_SEPARATOR: &str = ", ";

/// Identifier of a category of records ("post", "article", "product", ...).
///
/// Always non-empty; control characters and surrounding whitespace are
/// stripped on parse.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct RecordType(String);

impl RecordType {
    pub fn parse(raw: &str) -> ExportResult<Self> {
        let cleaned: String = raw.chars().filter(|c| !c.is_control()).collect();
        let cleaned = cleaned.trim().to_string();
        ValidationBuilder::new("record_type", Some(cleaned.clone()))
            .required()
            .validate()?;
        Ok(Self(cleaned))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RecordType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A record type as listed by the record store, with its display label.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordTypeInfo {
    pub name: String,
    pub label: String,
}

/// One custom field available for a record type.
///
/// `key` is what callers select, `name` is the lookup key into a record's
/// field values and `label` becomes the column header.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldDefinition {
    pub key: String,
    pub name: String,
    pub label: String,
}

impl FieldDefinition {
    pub fn new(key: impl Into<String>, name: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            name: name.into(),
            label: label.into(),
        }
    }
}

/// Opaque handle to a bundle of field definitions attached to a record type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchemaGroup {
    pub id: String,
    pub title: String,
}

/// What the record store hands back for each stored record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordEntry {
    pub id: String,
    pub title: String,
}

/// Snapshot of one record taken at export time.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Record {
    pub id: String,
    pub title: String,
    pub terms: Vec<String>,
    pub field_values: HashMap<String, String>,
}

impl Record {
    pub fn joined_terms(&self) -> String {
        self.terms.join(TERM_SEPARATOR)
    }

    /// Value for `name`, or the empty string when the record has none.
    pub fn value_of(&self, name: &str) -> &str {
        self.field_values.get(name).map(String::as_str).unwrap_or("")
    }
}

/// Field keys chosen by the caller for one export.
///
/// Acts purely as a filter: order and duplicates in the submitted keys have no
/// effect on the produced columns.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Selection {
    keys: BTreeSet<String>,
}

impl Selection {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.keys.contains(key)
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }
}

impl<S: Into<String>> FromIterator<S> for Selection {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self {
            keys: iter.into_iter().map(Into::into).collect(),
        }
    }
}

/// Header plus one row per record, every row the same width as the header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportDocument {
    header: Vec<String>,
    rows: Vec<Vec<String>>,
}

impl ExportDocument {
    pub fn new(header: Vec<String>) -> Self {
        Self { header, rows: Vec::new() }
    }

    pub fn push_row(&mut self, row: Vec<String>) -> ExportResult<()> {
        if row.len() != self.header.len() {
            return Err(ExportError::Serialization(format!(
                "row has {} columns, header has {}",
                row.len(),
                self.header.len()
            )));
        }
        self.rows.push(row);
        Ok(())
    }

    pub fn header(&self) -> &[String] {
        &self.header
    }

    pub fn rows(&self) -> &[Vec<String>] {
        &self.rows
    }

    pub fn width(&self) -> usize {
        self.header.len()
    }

    /// Number of data rows, not counting the header
    pub fn record_count(&self) -> usize {
        self.rows.len()
    }

    /// Header followed by the data rows.
    pub fn all_rows(&self) -> impl Iterator<Item = &Vec<String>> {
        std::iter::once(&self.header).chain(self.rows.iter())
    }
}

/// Export request as submitted by a host (FFI payload, form post).
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ExportRequest {
    pub record_type: String,
    #[serde(default)]
    pub fields: Vec<String>,
}

impl ExportRequest {
    /// Capture the submitted request once into validated, immutable values.
    pub fn into_parts(self) -> ExportResult<(RecordType, Selection)> {
        self.validate()?;
        let record_type = RecordType::parse(&self.record_type)?;
        let selection = self.fields.into_iter().collect();
        Ok((record_type, selection))
    }
}

impl Validate for ExportRequest {
    fn validate(&self) -> Result<(), ValidationError> {
        ValidationBuilder::new("record_type", Some(self.record_type.clone()))
            .required()
            .not_blank()
            .validate()
    }
}

/// Export statistics for monitoring
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExportStats {
    pub records_written: usize,
    pub bytes_written: usize,
    pub duration_ms: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_type_rejects_empty() {
        assert!(RecordType::parse("").unwrap_err().is_invalid_argument());
        assert!(RecordType::parse("  ").unwrap_err().is_invalid_argument());
    }

    #[test]
    fn test_record_type_trims() {
        assert_eq!(RecordType::parse(" article ").unwrap().as_str(), "article");
    }

    #[test]
    fn test_record_type_strips_control_chars() {
        assert_eq!(RecordType::parse("article\t").unwrap().as_str(), "article");
        assert_eq!(RecordType::parse("\narti\rcle\n").unwrap().as_str(), "article");
        assert!(RecordType::parse("\t\n").unwrap_err().is_invalid_argument());
    }

    #[test]
    fn test_terms_join() {
        let record = Record {
            terms: vec!["A".to_string(), "B".to_string()],
            ..Default::default()
        };
        assert_eq!(record.joined_terms(), "A, B");
        assert_eq!(Record::default().joined_terms(), "");
    }

    #[test]
    fn test_missing_value_is_empty() {
        let record = Record::default();
        assert_eq!(record.value_of("nope"), "");
    }

    #[test]
    fn test_selection_ignores_duplicates() {
        let selection: Selection = vec!["k2", "k1", "k2"].into_iter().collect();
        assert_eq!(selection.len(), 2);
        assert!(selection.contains("k1"));
        assert!(!selection.contains("k3"));
    }

    #[test]
    fn test_document_rejects_ragged_rows() {
        let mut doc = ExportDocument::new(vec![TITLE_COLUMN.into(), TAXONOMIES_COLUMN.into()]);
        assert!(doc.push_row(vec!["only one".into()]).is_err());
        doc.push_row(vec!["X".into(), String::new()]).unwrap();
        assert_eq!(doc.record_count(), 1);
        assert_eq!(doc.all_rows().count(), 2);
    }

    #[test]
    fn test_request_into_parts() {
        let request: ExportRequest =
            serde_json::from_str(r#"{"record_type":"article","fields":["k2","bogus"]}"#).unwrap();
        let (record_type, selection) = request.into_parts().unwrap();
        assert_eq!(record_type.as_str(), "article");
        assert!(selection.contains("k2"));

        let missing: ExportRequest = serde_json::from_str(r#"{"record_type":""}"#).unwrap();
        assert!(missing.into_parts().unwrap_err().is_invalid_argument());
    }
}
