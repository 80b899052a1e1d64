//! Relational primitives the reconciliation workflow is written against.

mod hash;

pub use hash::HashJoinEngine;

use crate::relation::{DataType, Relation, Value};

/// The minimum set of relational operations reconciliation needs.
///
/// Joins are "on column name": both sides carry a column called `on`, and
/// the output keeps a single copy of it.
pub trait RelationalEngine: Send + Sync {
    /// Rows pairing every left row with each right row sharing its key.
    /// Null keys never match.
    ///
    /// An Int64 key joined against a Float64 key is compared as Float64, so
    /// integer ids beyond 2^53 can round onto the same key and match.
    fn inner_join(&self, left: &Relation, right: &Relation, on: &str)
        -> Result<Relation, EngineError>;

    /// Left rows whose key has no match on the right. Null keys never
    /// match, so left rows with a null key are kept.
    fn left_anti_join(
        &self,
        left: &Relation,
        right: &Relation,
        on: &str,
    ) -> Result<Relation, EngineError>;

    fn select(&self, relation: &Relation, columns: &[&str]) -> Result<Relation, EngineError>;

    /// Appends a column holding `value` on every row.
    fn with_literal_column(
        &self,
        relation: &Relation,
        name: &str,
        data_type: DataType,
        value: Value,
    ) -> Result<Relation, EngineError>;

    /// Concatenates two relations with the same column names, matched by
    /// name rather than position. Duplicates are kept.
    fn union_by_name(&self, left: &Relation, right: &Relation) -> Result<Relation, EngineError>;
}

/// Error enumeration for relational operations.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("column '{column}' not found (available: {available})")]
    MissingColumn { column: String, available: String },
    #[error("column '{0}' appears more than once")]
    DuplicateColumn(String),
    #[error("column '{0}' exists on both sides of the join")]
    AmbiguousColumn(String),
    #[error("join key '{column}' has incompatible types: {left} vs {right}")]
    KeyType {
        column: String,
        left: DataType,
        right: DataType,
    },
    #[error("union requires the same columns on both sides: [{left}] vs [{right}]")]
    UnionColumns { left: String, right: String },
    #[error("row {row} has {found} values but the schema has {expected} columns")]
    RowArity {
        row: usize,
        expected: usize,
        found: usize,
    },
    #[error("value '{value}' in row {row} does not fit column '{column}' ({expected})")]
    ValueType {
        row: usize,
        column: String,
        expected: DataType,
        value: String,
    },
    #[error("literal '{value}' does not fit column '{column}' ({expected})")]
    LiteralType {
        column: String,
        expected: DataType,
        value: String,
    },
    #[error("relational backend failure: {0}")]
    Backend(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl EngineError {
    /// Column the error refers to, when there is one.
    pub fn column(&self) -> Option<&str> {
        match self {
            Self::MissingColumn { column, .. }
            | Self::KeyType { column, .. }
            | Self::ValueType { column, .. }
            | Self::LiteralType { column, .. } => Some(column),
            Self::DuplicateColumn(column) | Self::AmbiguousColumn(column) => Some(column),
            Self::UnionColumns { .. } | Self::RowArity { .. } | Self::Backend(_) => None,
        }
    }
}
