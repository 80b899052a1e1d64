use crate::infra::AppState;
use axum::http::{header, StatusCode};
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Extension, Json, Router};
use catalog_recon::error::AppError;
use catalog_recon::workflows::catalog::{
    product_category_rows, CatalogSources, DanglingLink, ProductCategoryRow,
    ReconciliationSummary,
};
use serde::{Deserialize, Serialize};
use serde_json::json;

#[derive(Debug, Deserialize)]
pub(crate) struct ReconcileRequest {
    pub(crate) products_csv: String,
    pub(crate) categories_csv: String,
    pub(crate) product_categories_csv: String,
    #[serde(default)]
    pub(crate) include_dangling: bool,
}

#[derive(Debug, Serialize)]
pub(crate) struct ReconcileResponse {
    pub(crate) rows: Vec<ProductCategoryRow>,
    pub(crate) summary: ReconciliationSummary,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) dangling_links: Option<Vec<DanglingLink>>,
}

pub(crate) fn catalog_routes() -> Router {
    Router::new()
        .route("/health", get(healthcheck))
        .route("/ready", get(readiness_endpoint))
        .route("/metrics", get(metrics_endpoint))
        .route("/api/v1/catalog/reconcile", post(reconcile_endpoint))
}

pub(crate) async fn healthcheck() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

pub(crate) async fn readiness_endpoint(Extension(state): Extension<AppState>) -> impl IntoResponse {
    let ready = state.readiness.load(std::sync::atomic::Ordering::Relaxed);
    let status = if ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    let payload = if ready {
        json!({ "status": "ready" })
    } else {
        json!({ "status": "initializing" })
    };

    (status, Json(payload))
}

pub(crate) async fn metrics_endpoint(Extension(state): Extension<AppState>) -> impl IntoResponse {
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        state.metrics.render(),
    )
}

pub(crate) async fn reconcile_endpoint(
    Json(payload): Json<ReconcileRequest>,
) -> Result<Json<ReconcileResponse>, AppError> {
    let ReconcileRequest {
        products_csv,
        categories_csv,
        product_categories_csv,
        include_dangling,
    } = payload;

    let sources =
        CatalogSources::from_csv_strings(&products_csv, &categories_csv, &product_categories_csv)?;
    let output = sources.reconcile()?;
    let rows = product_category_rows(&output)?;
    let summary = ReconciliationSummary::from_rows(&rows);
    let dangling_links = if include_dangling {
        Some(sources.dangling_links()?)
    } else {
        None
    };

    Ok(Json(ReconcileResponse {
        rows,
        summary,
        dangling_links,
    }))
}
