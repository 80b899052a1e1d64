use super::{ReconcileError, CATEGORIES, CATEGORY_ID, PRODUCTS, PRODUCT_CATEGORIES, PRODUCT_ID};
use crate::engine::{HashJoinEngine, RelationalEngine};
use crate::relation::{Relation, Value};
use serde::Serialize;
use std::collections::HashSet;
use tracing::warn;

/// Which side of a link row fails to resolve.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MissingReference {
    Product,
    Category,
    Both,
}

impl MissingReference {
    pub const fn label(self) -> &'static str {
        match self {
            Self::Product => "unknown product",
            Self::Category => "unknown category",
            Self::Both => "unknown product and category",
        }
    }
}

/// Link row that the inner joins of a reconciliation silently drop.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DanglingLink {
    pub product_id: Value,
    pub category_id: Value,
    pub missing: MissingReference,
}

pub fn dangling_links(
    products: &Relation,
    categories: &Relation,
    product_categories: &Relation,
) -> Result<Vec<DanglingLink>, ReconcileError> {
    dangling_links_with(&HashJoinEngine, products, categories, product_categories)
}

/// Lists the `product_categories` rows whose product or category does not
/// exist, in link order. Null references count as unresolved.
pub fn dangling_links_with<E>(
    engine: &E,
    products: &Relation,
    categories: &Relation,
    product_categories: &Relation,
) -> Result<Vec<DanglingLink>, ReconcileError>
where
    E: RelationalEngine + ?Sized,
{
    let result = find(engine, products, categories, product_categories);
    match &result {
        Ok(dangling) if !dangling.is_empty() => {
            warn!(count = dangling.len(), "link rows reference unknown records")
        }
        Ok(_) => {}
        Err(err) => err.log(),
    }
    result
}

fn find<E>(
    engine: &E,
    products: &Relation,
    categories: &Relation,
    product_categories: &Relation,
) -> Result<Vec<DanglingLink>, ReconcileError>
where
    E: RelationalEngine + ?Sized,
{
    let step = |relation: &'static str| {
        move |err| ReconcileError::from_engine(relation, err)
    };

    let links = engine
        .select(product_categories, &[PRODUCT_ID, CATEGORY_ID])
        .map_err(step(PRODUCT_CATEGORIES))?;
    let product_ids = engine
        .select(products, &[PRODUCT_ID])
        .map_err(step(PRODUCTS))?;
    let category_ids = engine
        .select(categories, &[CATEGORY_ID])
        .map_err(step(CATEGORIES))?;

    let without_product = engine
        .left_anti_join(&links, &product_ids, PRODUCT_ID)
        .map_err(step(PRODUCTS))?;
    let without_category = engine
        .left_anti_join(&links, &category_ids, CATEGORY_ID)
        .map_err(step(CATEGORIES))?;

    let unknown_products: HashSet<&Value> = without_product
        .column(PRODUCT_ID)
        .map_err(step(PRODUCTS))?
        .collect();
    let unknown_categories: HashSet<&Value> = without_category
        .column(CATEGORY_ID)
        .map_err(step(CATEGORIES))?
        .collect();

    let dangling = links
        .rows()
        .iter()
        .filter_map(|row| {
            let (product_id, category_id) = (&row[0], &row[1]);
            let missing = match (
                unknown_products.contains(product_id),
                unknown_categories.contains(category_id),
            ) {
                (true, true) => MissingReference::Both,
                (true, false) => MissingReference::Product,
                (false, true) => MissingReference::Category,
                (false, false) => return None,
            };
            Some(DanglingLink {
                product_id: product_id.clone(),
                category_id: category_id.clone(),
                missing,
            })
        })
        .collect();

    Ok(dangling)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::relation::DataType;

    fn ids(name: &str, label: &str, values: &[i64]) -> Relation {
        Relation::from_columns(
            &[(name, DataType::Int64), (label, DataType::Utf8)],
            values
                .iter()
                .map(|id| vec![Value::from(*id), Value::from(format!("{label}-{id}"))])
                .collect(),
        )
        .expect("relation")
    }

    #[test]
    fn classifies_each_unresolved_link() {
        let products = ids(PRODUCT_ID, "product_name", &[1, 2]);
        let categories = ids(CATEGORY_ID, "category_name", &[10]);
        let links = Relation::from_columns(
            &[(PRODUCT_ID, DataType::Int64), (CATEGORY_ID, DataType::Int64)],
            vec![
                vec![Value::from(1), Value::from(10)],
                vec![Value::from(1), Value::from(11)],
                vec![Value::from(3), Value::from(10)],
                vec![Value::from(4), Value::from(12)],
                vec![Value::Null, Value::from(10)],
            ],
        )
        .expect("links");

        let dangling = dangling_links(&products, &categories, &links).expect("diagnostic runs");

        let summary: Vec<_> = dangling
            .iter()
            .map(|link| (link.product_id.clone(), link.category_id.clone(), link.missing))
            .collect();
        assert_eq!(
            summary,
            vec![
                (Value::from(1), Value::from(11), MissingReference::Category),
                (Value::from(3), Value::from(10), MissingReference::Product),
                (Value::from(4), Value::from(12), MissingReference::Both),
                (Value::Null, Value::from(10), MissingReference::Product),
            ]
        );
    }

    #[test]
    fn resolved_links_produce_nothing() {
        let products = ids(PRODUCT_ID, "product_name", &[1]);
        let categories = ids(CATEGORY_ID, "category_name", &[10]);
        let links = Relation::from_columns(
            &[(PRODUCT_ID, DataType::Int64), (CATEGORY_ID, DataType::Int64)],
            vec![vec![Value::from(1), Value::from(10)]],
        )
        .expect("links");

        assert!(dangling_links(&products, &categories, &links)
            .expect("diagnostic runs")
            .is_empty());
    }

    #[test]
    fn missing_link_column_is_a_schema_error() {
        let products = ids(PRODUCT_ID, "product_name", &[1]);
        let categories = ids(CATEGORY_ID, "category_name", &[10]);
        let links = ids(PRODUCT_ID, "note", &[1]);

        let error = dangling_links(&products, &categories, &links).expect_err("no category_id");
        assert!(matches!(error, ReconcileError::Schema { ref column, .. } if column == CATEGORY_ID));
    }
}
