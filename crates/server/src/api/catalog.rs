//! Catalog API handlers.

use axum::{extract::State, http::StatusCode, Json};
use serde::Serialize;
use std::sync::Arc;
use tracing::error;

use dbexport_core::catalog::{CatalogError, ColumnsCatalog, ScriptsCatalog};

use crate::state::AppState;

/// Error response
#[derive(Debug, Serialize)]
pub struct CatalogErrorResponse {
    pub error: String,
}

fn catalog_failure(e: CatalogError) -> (StatusCode, Json<CatalogErrorResponse>) {
    error!("Catalog read failed: {}", e);
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(CatalogErrorResponse {
            error: e.to_string(),
        }),
    )
}

/// The scripts catalog, as served to selection UIs.
pub async fn get_scripts(
    State(state): State<Arc<AppState>>,
) -> Result<Json<ScriptsCatalog>, (StatusCode, Json<CatalogErrorResponse>)> {
    state
        .catalog()
        .scripts()
        .await
        .map(Json)
        .map_err(catalog_failure)
}

/// The columns catalog backing custom-columns exports.
pub async fn get_columns(
    State(state): State<Arc<AppState>>,
) -> Result<Json<ColumnsCatalog>, (StatusCode, Json<CatalogErrorResponse>)> {
    state
        .catalog()
        .columns()
        .await
        .map(Json)
        .map_err(catalog_failure)
}
