use catalog_recon::engine::{EngineError, HashJoinEngine, RelationalEngine};
use catalog_recon::relation::{DataType, Relation, Row, Value};
use catalog_recon::workflows::catalog::{
    product_category_rows, reconcile, reconcile_with, ProductCategoryRow, ReconcileError,
    ReconciliationSummary, CATEGORY_ID, CATEGORY_NAME, PRODUCT_ID, PRODUCT_NAME,
};
use std::collections::HashMap;
use std::io;
use std::sync::{Arc, Mutex};
use std::thread;

/// In-memory log sink for a scoped subscriber.
#[derive(Clone, Default)]
struct CapturedLogs(Arc<Mutex<Vec<u8>>>);

impl io::Write for CapturedLogs {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0
            .lock()
            .expect("log buffer poisoned")
            .extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

fn with_captured_logs<T>(run: impl FnOnce() -> T) -> (T, String) {
    let logs = CapturedLogs::default();
    let writer = logs.clone();
    let subscriber = tracing_subscriber::fmt()
        .with_writer(move || writer.clone())
        .with_ansi(false)
        .finish();

    let result = tracing::subscriber::with_default(subscriber, run);
    let buffer = logs.0.lock().expect("log buffer poisoned");
    (result, String::from_utf8_lossy(&buffer).into_owned())
}

fn products(rows: &[(i64, &str)]) -> Relation {
    Relation::from_columns(
        &[(PRODUCT_ID, DataType::Int64), (PRODUCT_NAME, DataType::Utf8)],
        rows.iter()
            .map(|(id, name)| vec![Value::from(*id), Value::from(*name)])
            .collect(),
    )
    .expect("valid products")
}

fn categories(rows: &[(i64, &str)]) -> Relation {
    Relation::from_columns(
        &[(CATEGORY_ID, DataType::Int64), (CATEGORY_NAME, DataType::Utf8)],
        rows.iter()
            .map(|(id, name)| vec![Value::from(*id), Value::from(*name)])
            .collect(),
    )
    .expect("valid categories")
}

fn links(rows: &[(i64, i64)]) -> Relation {
    Relation::from_columns(
        &[(PRODUCT_ID, DataType::Int64), (CATEGORY_ID, DataType::Int64)],
        rows.iter()
            .map(|(product, category)| vec![Value::from(*product), Value::from(*category)])
            .collect(),
    )
    .expect("valid links")
}

fn sorted_rows(relation: &Relation) -> Vec<ProductCategoryRow> {
    let mut rows = product_category_rows(relation).expect("typed rows");
    rows.sort();
    rows
}

#[test]
fn pairs_linked_products_and_keeps_orphans() {
    let output = reconcile(
        &products(&[(1, "Pen"), (2, "Mug")]),
        &categories(&[(10, "Office")]),
        &links(&[(1, 10)]),
    )
    .expect("reconcile succeeds");

    assert_eq!(
        sorted_rows(&output),
        vec![
            ProductCategoryRow::new("Mug", None),
            ProductCategoryRow::new("Pen", Some("Office")),
        ]
    );
}

#[test]
fn product_without_any_links_gets_null_category() {
    let output = reconcile(
        &products(&[(1, "Pen")]),
        &categories(&[]),
        &links(&[]),
    )
    .expect("reconcile succeeds");

    assert_eq!(sorted_rows(&output), vec![ProductCategoryRow::new("Pen", None)]);
}

#[test]
fn link_to_unknown_category_is_dropped_but_product_is_not_an_orphan() {
    let output = reconcile(
        &products(&[(1, "Pen")]),
        &categories(&[(10, "Office")]),
        &links(&[(1, 10), (1, 11)]),
    )
    .expect("reconcile succeeds");

    assert_eq!(
        sorted_rows(&output),
        vec![ProductCategoryRow::new("Pen", Some("Office"))]
    );
}

#[test]
fn product_whose_only_link_dangles_is_absent() {
    let output = reconcile(
        &products(&[(1, "Pen"), (2, "Mug")]),
        &categories(&[(10, "Office")]),
        &links(&[(1, 11)]),
    )
    .expect("reconcile succeeds");

    assert_eq!(sorted_rows(&output), vec![ProductCategoryRow::new("Mug", None)]);
}

#[test]
fn missing_product_name_column_is_a_schema_error() {
    let ids_only = Relation::from_columns(
        &[(PRODUCT_ID, DataType::Int64)],
        vec![vec![Value::from(1)]],
    )
    .expect("valid relation");

    let error = reconcile(&ids_only, &categories(&[(10, "Office")]), &links(&[(1, 10)]))
        .expect_err("schema error expected");

    match error {
        ReconcileError::Schema {
            relation, column, ..
        } => {
            assert_eq!(relation, "products");
            assert_eq!(column, PRODUCT_NAME);
        }
        other => panic!("expected schema error, got {other:?}"),
    }
}

#[test]
fn schema_errors_are_logged_before_they_are_returned() {
    let ids_only = Relation::from_columns(
        &[(PRODUCT_ID, DataType::Int64)],
        vec![vec![Value::from(1)]],
    )
    .expect("valid relation");

    let (result, logs) = with_captured_logs(|| {
        reconcile(&ids_only, &categories(&[(10, "Office")]), &links(&[(1, 10)]))
    });

    assert!(matches!(result, Err(ReconcileError::Schema { .. })));
    assert!(logs.contains("ERROR"), "logs: {logs}");
    assert!(logs.contains("reconciliation schema error"), "logs: {logs}");
    assert!(logs.contains(PRODUCT_NAME), "logs: {logs}");
}

#[test]
fn invalid_key_types_are_logged_before_they_are_returned() {
    let text_links = Relation::from_columns(
        &[(PRODUCT_ID, DataType::Utf8), (CATEGORY_ID, DataType::Int64)],
        vec![vec![Value::from("P-1"), Value::from(10)]],
    )
    .expect("valid relation");

    let (result, logs) = with_captured_logs(|| {
        reconcile(
            &products(&[(1, "Pen")]),
            &categories(&[(10, "Office")]),
            &text_links,
        )
    });

    assert!(matches!(result, Err(ReconcileError::InvalidData(_))));
    assert!(
        logs.contains("reconciliation received invalid data"),
        "logs: {logs}"
    );
}

#[test]
fn row_counts_partition_into_matched_and_orphans() {
    let products = products(&[(1, "Pen"), (2, "Mug"), (3, "Lamp"), (4, "Card")]);
    let categories = categories(&[(10, "Office"), (20, "Kitchen"), (30, "Lighting")]);
    let links = links(&[(1, 10), (2, 20), (3, 10), (3, 30), (3, 30)]);

    let output = reconcile(&products, &categories, &links).expect("reconcile succeeds");
    let rows = product_category_rows(&output).expect("typed rows");
    let summary = ReconciliationSummary::from_rows(&rows);

    assert_eq!(summary.matched, 5);
    assert_eq!(summary.orphans, 1);
    assert_eq!(summary.total, output.len());

    let mut per_product: HashMap<&str, usize> = HashMap::new();
    for row in &rows {
        *per_product.entry(row.product_name.as_str()).or_default() += 1;
    }
    assert_eq!(per_product.get("Pen"), Some(&1));
    assert_eq!(per_product.get("Lamp"), Some(&3), "one row per link, no deduplication");
    assert_eq!(per_product.get("Card"), Some(&1));

    let orphan_names: Vec<_> = rows
        .iter()
        .filter(|row| row.is_orphan())
        .map(|row| row.product_name.as_str())
        .collect();
    assert_eq!(orphan_names, vec!["Card"]);
}

#[test]
fn repeated_runs_return_the_same_rows() {
    let products = products(&[(1, "Pen"), (2, "Mug"), (3, "Lamp")]);
    let categories = categories(&[(10, "Office"), (20, "Kitchen")]);
    let links = links(&[(1, 10), (1, 20), (3, 20)]);

    let first = reconcile(&products, &categories, &links).expect("first run");
    let second = reconcile(&products, &categories, &links).expect("second run");

    assert_eq!(sorted_rows(&first), sorted_rows(&second));
}

#[test]
fn concurrent_runs_share_inputs_without_interference() {
    let inputs = Arc::new((
        products(&[(1, "Pen"), (2, "Mug")]),
        categories(&[(10, "Office")]),
        links(&[(1, 10)]),
    ));

    let handles: Vec<_> = (0..4)
        .map(|_| {
            let inputs = Arc::clone(&inputs);
            thread::spawn(move || {
                let (products, categories, links) = &*inputs;
                reconcile(products, categories, links).expect("reconcile succeeds")
            })
        })
        .collect();

    for handle in handles {
        let output = handle.join().expect("thread completes");
        assert_eq!(output.len(), 2);
    }
}

/// Delegates to the hash engine but fails every union, the last step.
struct FailingUnion;

impl RelationalEngine for FailingUnion {
    fn inner_join(
        &self,
        left: &Relation,
        right: &Relation,
        on: &str,
    ) -> Result<Relation, EngineError> {
        HashJoinEngine.inner_join(left, right, on)
    }

    fn left_anti_join(
        &self,
        left: &Relation,
        right: &Relation,
        on: &str,
    ) -> Result<Relation, EngineError> {
        HashJoinEngine.left_anti_join(left, right, on)
    }

    fn select(&self, relation: &Relation, columns: &[&str]) -> Result<Relation, EngineError> {
        HashJoinEngine.select(relation, columns)
    }

    fn with_literal_column(
        &self,
        relation: &Relation,
        name: &str,
        data_type: DataType,
        value: Value,
    ) -> Result<Relation, EngineError> {
        HashJoinEngine.with_literal_column(relation, name, data_type, value)
    }

    fn union_by_name(&self, _left: &Relation, _right: &Relation) -> Result<Relation, EngineError> {
        Err(EngineError::Backend("shuffle stage lost".into()))
    }
}

#[test]
fn engine_failures_propagate_with_original_cause() {
    let error = reconcile_with(
        &FailingUnion,
        &products(&[(1, "Pen")]),
        &categories(&[]),
        &links(&[]),
    )
    .expect_err("union fails");

    match error {
        ReconcileError::Engine(source) => assert_eq!(
            source.to_string(),
            "relational backend failure: shuffle stage lost"
        ),
        other => panic!("expected engine error, got {other:?}"),
    }
}

#[test]
fn engine_failures_are_logged_before_they_are_returned() {
    let (result, logs) = with_captured_logs(|| {
        reconcile_with(
            &FailingUnion,
            &products(&[(1, "Pen")]),
            &categories(&[]),
            &links(&[]),
        )
    });

    assert!(matches!(result, Err(ReconcileError::Engine(_))));
    assert!(
        logs.contains("reconciliation failed unexpectedly"),
        "logs: {logs}"
    );
    assert!(logs.contains("shuffle stage lost"), "logs: {logs}");
}

#[test]
fn dynamic_engine_handles_are_accepted() {
    let engine: Box<dyn RelationalEngine> = Box::new(HashJoinEngine);
    let output = reconcile_with(
        engine.as_ref(),
        &products(&[(1, "Pen")]),
        &categories(&[(10, "Office")]),
        &links(&[(1, 10)]),
    )
    .expect("reconcile succeeds");

    let rows: Vec<Row> = output.into_rows();
    assert_eq!(rows, vec![vec![Value::from("Pen"), Value::from("Office")]]);
}
