mod dangling;
mod loader;
mod rows;

pub use dangling::{dangling_links, dangling_links_with, DanglingLink, MissingReference};
pub use loader::{load_csv, load_csv_path, CatalogFiles, CatalogSources, LoadError};
pub use rows::{product_category_rows, ProductCategoryRow, ReconciliationSummary};

use crate::engine::{EngineError, HashJoinEngine, RelationalEngine};
use crate::relation::{DataType, Relation, Value};
use tracing::{debug, error, info};

pub const PRODUCT_ID: &str = "product_id";
pub const PRODUCT_NAME: &str = "product_name";
pub const CATEGORY_ID: &str = "category_id";
pub const CATEGORY_NAME: &str = "category_name";

pub(crate) const PRODUCTS: &str = "products";
pub(crate) const CATEGORIES: &str = "categories";
pub(crate) const PRODUCT_CATEGORIES: &str = "product_categories";
pub(crate) const RECONCILED: &str = "reconciled";

/// Failure of a reconciliation run. Every variant keeps the engine error
/// that caused it as its `source`.
#[derive(Debug, thiserror::Error)]
pub enum ReconcileError {
    #[error("schema error in {relation} relation: {source}")]
    Schema {
        relation: String,
        column: String,
        #[source]
        source: EngineError,
    },
    #[error("invalid input data: {0}")]
    InvalidData(#[source] EngineError),
    #[error("unexpected engine failure: {0}")]
    Engine(#[source] EngineError),
}

impl ReconcileError {
    pub(crate) fn from_engine(relation: &str, source: EngineError) -> Self {
        match source {
            EngineError::MissingColumn { .. }
            | EngineError::DuplicateColumn(_)
            | EngineError::AmbiguousColumn(_) => Self::Schema {
                relation: relation.to_string(),
                column: source.column().unwrap_or_default().to_string(),
                source,
            },
            EngineError::KeyType { .. }
            | EngineError::UnionColumns { .. }
            | EngineError::RowArity { .. }
            | EngineError::ValueType { .. }
            | EngineError::LiteralType { .. } => Self::InvalidData(source),
            EngineError::Backend(_) => Self::Engine(source),
        }
    }

    pub(crate) fn log(&self) {
        match self {
            Self::Schema {
                relation, column, ..
            } => error!(%relation, %column, error = %self, "reconciliation schema error"),
            Self::InvalidData(_) => error!(error = %self, "reconciliation received invalid data"),
            Self::Engine(_) => error!(error = %self, "reconciliation failed unexpectedly"),
        }
    }
}

/// Maps every product to its categories, with a null category for
/// products that have no link row.
///
/// Runs on the in-memory [`HashJoinEngine`]; see [`reconcile_with`].
pub fn reconcile(
    products: &Relation,
    categories: &Relation,
    product_categories: &Relation,
) -> Result<Relation, ReconcileError> {
    reconcile_with(&HashJoinEngine, products, categories, product_categories)
}

/// Produces `(product_name, category_name)` rows:
///
/// 1. products ⋈ product_categories ⋈ categories, one row per resolvable link;
/// 2. products with no link row at all, with a null `category_name`;
///
/// concatenated by column name. A product whose only links point at missing
/// categories appears in neither set, see [`dangling_links`].
///
/// Errors are logged before they are returned.
pub fn reconcile_with<E>(
    engine: &E,
    products: &Relation,
    categories: &Relation,
    product_categories: &Relation,
) -> Result<Relation, ReconcileError>
where
    E: RelationalEngine + ?Sized,
{
    let result = run(engine, products, categories, product_categories);
    match &result {
        Ok(relation) => info!(rows = relation.len(), "product categories reconciled"),
        Err(err) => err.log(),
    }
    result
}

/// Checks the three inputs expose the columns reconciliation reads.
pub fn validate_inputs(
    products: &Relation,
    categories: &Relation,
    product_categories: &Relation,
) -> Result<(), ReconcileError> {
    let required: [(&str, &Relation, [&str; 2]); 3] = [
        (PRODUCTS, products, [PRODUCT_ID, PRODUCT_NAME]),
        (CATEGORIES, categories, [CATEGORY_ID, CATEGORY_NAME]),
        (PRODUCT_CATEGORIES, product_categories, [PRODUCT_ID, CATEGORY_ID]),
    ];

    for (name, relation, columns) in required {
        relation
            .require_columns(&columns)
            .map_err(|err| ReconcileError::from_engine(name, err))?;
    }

    Ok(())
}

fn run<E>(
    engine: &E,
    products: &Relation,
    categories: &Relation,
    product_categories: &Relation,
) -> Result<Relation, ReconcileError>
where
    E: RelationalEngine + ?Sized,
{
    validate_inputs(products, categories, product_categories)?;

    let step = |relation: &'static str| {
        move |err: EngineError| ReconcileError::from_engine(relation, err)
    };

    // Narrow inputs first so unrelated columns cannot collide in the joins.
    let products = engine
        .select(products, &[PRODUCT_ID, PRODUCT_NAME])
        .map_err(step(PRODUCTS))?;
    let categories = engine
        .select(categories, &[CATEGORY_ID, CATEGORY_NAME])
        .map_err(step(CATEGORIES))?;
    let links = engine
        .select(product_categories, &[PRODUCT_ID, CATEGORY_ID])
        .map_err(step(PRODUCT_CATEGORIES))?;

    let linked = engine
        .inner_join(&products, &links, PRODUCT_ID)
        .map_err(step(PRODUCT_CATEGORIES))?;
    let resolved = engine
        .inner_join(&linked, &categories, CATEGORY_ID)
        .map_err(step(CATEGORIES))?;
    let matched = engine
        .select(&resolved, &[PRODUCT_NAME, CATEGORY_NAME])
        .map_err(step(CATEGORIES))?;

    let unlinked = engine
        .left_anti_join(&products, &links, PRODUCT_ID)
        .map_err(step(PRODUCT_CATEGORIES))?;
    let orphans = engine
        .select(&unlinked, &[PRODUCT_NAME])
        .map_err(step(PRODUCTS))?;
    let orphans = engine
        .with_literal_column(&orphans, CATEGORY_NAME, DataType::Utf8, Value::Null)
        .map_err(step(PRODUCTS))?;

    debug!(
        matched = matched.len(),
        orphans = orphans.len(),
        "reconciliation branches computed"
    );

    engine
        .union_by_name(&matched, &orphans)
        .map_err(step(PRODUCTS))
}
