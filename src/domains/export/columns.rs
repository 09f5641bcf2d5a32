use crate::domains::export::types::{
    FieldDefinition, Record, Selection, TAXONOMIES_COLUMN, TITLE_COLUMN,
};

/// The selected subset of a record type's schema, in schema order.
///
/// Built once per export and shared by the header and every row so the two
/// can never disagree on width or column order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnPlan {
    fields: Vec<FieldDefinition>,
}

impl ColumnPlan {
    /// Keep the schema fields whose key is selected. Selection keys that match
    /// no field are dropped silently.
    pub fn resolve(schema: Vec<FieldDefinition>, selection: &Selection) -> Self {
        let fields = schema
            .into_iter()
            .filter(|field| selection.contains(&field.key))
            .collect();
        Self { fields }
    }

    pub fn fields(&self) -> &[FieldDefinition] {
        &self.fields
    }

    pub fn width(&self) -> usize {
        2 + self.fields.len()
    }

    pub fn header(&self) -> Vec<String> {
        let mut header = Vec::with_capacity(self.width());
        header.push(TITLE_COLUMN.to_string());
        header.push(TAXONOMIES_COLUMN.to_string());
        header.extend(self.fields.iter().map(|f| f.label.clone()));
        header
    }

    pub fn row_for(&self, record: &Record) -> Vec<String> {
        let mut row = Vec::with_capacity(self.width());
        row.push(record.title.clone());
        row.push(record.joined_terms());
        row.extend(self.fields.iter().map(|f| record.value_of(&f.name).to_string()));
        row
    }
}
