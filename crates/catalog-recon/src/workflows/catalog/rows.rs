use super::{ReconcileError, CATEGORY_NAME, PRODUCT_NAME, RECONCILED};
use crate::relation::{Relation, Value};
use serde::Serialize;

/// Typed view of one reconciled row.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct ProductCategoryRow {
    pub product_name: String,
    pub category_name: Option<String>,
}

impl ProductCategoryRow {
    pub fn new(product_name: impl Into<String>, category_name: Option<&str>) -> Self {
        Self {
            product_name: product_name.into(),
            category_name: category_name.map(str::to_string),
        }
    }

    pub fn is_orphan(&self) -> bool {
        self.category_name.is_none()
    }
}

fn text(value: &Value) -> Option<String> {
    if value.is_null() {
        return None;
    }
    Some(value.as_str().map_or_else(|| value.to_string(), str::to_owned))
}

/// Converts a reconciled relation into typed rows. A null product name
/// becomes an empty string.
pub fn product_category_rows(relation: &Relation) -> Result<Vec<ProductCategoryRow>, ReconcileError> {
    let lookup = |name: &str| {
        relation
            .schema()
            .require(name)
            .map_err(|err| ReconcileError::from_engine(RECONCILED, err))
    };
    let product = lookup(PRODUCT_NAME)?;
    let category = lookup(CATEGORY_NAME)?;

    Ok(relation
        .rows()
        .iter()
        .map(|row| ProductCategoryRow {
            product_name: text(&row[product]).unwrap_or_default(),
            category_name: text(&row[category]),
        })
        .collect())
}

/// Row counts of a reconciliation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ReconciliationSummary {
    pub total: usize,
    pub matched: usize,
    pub orphans: usize,
}

impl ReconciliationSummary {
    /// Splits rows on a null category name. A link to a category whose name
    /// is null is therefore counted as an orphan.
    pub fn from_rows(rows: &[ProductCategoryRow]) -> Self {
        let orphans = rows.iter().filter(|row| row.is_orphan()).count();
        Self {
            total: rows.len(),
            matched: rows.len() - orphans,
            orphans,
        }
    }
}
