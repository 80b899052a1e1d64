//! In-memory tabular relations: a schema plus row-major values.

mod display;
mod value;

pub use value::{DataType, Value};

use crate::engine::EngineError;
use serde::Serialize;
use std::collections::HashSet;

pub type Row = Vec<Value>;

/// Named, typed column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Field {
    pub name: String,
    pub data_type: DataType,
    pub nullable: bool,
}

impl Field {
    pub fn new(name: impl Into<String>, data_type: DataType) -> Self {
        Self {
            name: name.into(),
            data_type,
            nullable: true,
        }
    }

    pub fn with_nullable(mut self, nullable: bool) -> Self {
        self.nullable = nullable;
        self
    }
}

/// Ordered set of uniquely named fields.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Schema {
    fields: Vec<Field>,
}

impl Schema {
    pub fn new(fields: Vec<Field>) -> Result<Self, EngineError> {
        let mut seen = HashSet::with_capacity(fields.len());
        for field in &fields {
            if !seen.insert(field.name.as_str()) {
                return Err(EngineError::DuplicateColumn(field.name.clone()));
            }
        }

        Ok(Self { fields })
    }

    pub fn fields(&self) -> &[Field] {
        &self.fields
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.fields.iter().position(|field| field.name == name)
    }

    pub fn field(&self, name: &str) -> Option<&Field> {
        self.fields.iter().find(|field| field.name == name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.index_of(name).is_some()
    }

    pub fn names(&self) -> Vec<&str> {
        self.fields.iter().map(|field| field.name.as_str()).collect()
    }

    /// Index of `name`, or a `MissingColumn` error listing what is available.
    pub fn require(&self, name: &str) -> Result<usize, EngineError> {
        self.index_of(name)
            .ok_or_else(|| EngineError::MissingColumn {
                column: name.to_string(),
                available: self.names().join(", "),
            })
    }
}

/// Immutable relation. Every row has one value per schema field and each
/// value conforms to its field's type.
#[derive(Debug, Clone, PartialEq)]
pub struct Relation {
    schema: Schema,
    rows: Vec<Row>,
}

impl Relation {
    pub fn new(schema: Schema, rows: Vec<Row>) -> Result<Self, EngineError> {
        for (row_index, row) in rows.iter().enumerate() {
            if row.len() != schema.len() {
                return Err(EngineError::RowArity {
                    row: row_index,
                    expected: schema.len(),
                    found: row.len(),
                });
            }

            for (field, value) in schema.fields().iter().zip(row) {
                let nullable_ok = field.nullable || !value.is_null();
                if !value.conforms_to(field.data_type) || !nullable_ok {
                    return Err(EngineError::ValueType {
                        row: row_index,
                        column: field.name.clone(),
                        expected: field.data_type,
                        value: value.to_string(),
                    });
                }
            }
        }

        Ok(Self { schema, rows })
    }

    /// Builds a relation with nullable columns from `(name, type)` pairs.
    pub fn from_columns(columns: &[(&str, DataType)], rows: Vec<Row>) -> Result<Self, EngineError> {
        let fields = columns
            .iter()
            .map(|(name, data_type)| Field::new(*name, *data_type))
            .collect();
        Self::new(Schema::new(fields)?, rows)
    }

    pub fn empty(schema: Schema) -> Self {
        Self {
            schema,
            rows: Vec::new(),
        }
    }

    /// Skips validation; callers guarantee rows already match `schema`.
    pub(crate) fn from_parts(schema: Schema, rows: Vec<Row>) -> Self {
        Self { schema, rows }
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    pub fn into_rows(self) -> Vec<Row> {
        self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn column(&self, name: &str) -> Result<impl Iterator<Item = &Value> + '_, EngineError> {
        let index = self.schema.require(name)?;
        Ok(self.rows.iter().map(move |row| &row[index]))
    }

    pub fn value(&self, row: usize, name: &str) -> Option<&Value> {
        let index = self.schema.index_of(name)?;
        self.rows.get(row).map(|values| &values[index])
    }

    pub fn require_columns(&self, names: &[&str]) -> Result<(), EngineError> {
        names
            .iter()
            .try_for_each(|name| self.schema.require(name).map(|_| ()))
    }

    /// Rows as JSON objects keyed by column name.
    pub fn to_json_records(&self) -> Vec<serde_json::Map<String, serde_json::Value>> {
        self.rows
            .iter()
            .map(|row| {
                self.schema
                    .fields()
                    .iter()
                    .zip(row)
                    .map(|(field, value)| {
                        let json = serde_json::to_value(value).unwrap_or(serde_json::Value::Null);
                        (field.name.clone(), json)
                    })
                    .collect()
            })
            .collect()
    }
}
