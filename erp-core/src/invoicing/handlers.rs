use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::Json,
};
use serde_json::{json, Value};
use tracing::info;

use crate::error::InvoiceError;
use crate::invoicing::types::{InvoiceRequest, Page, PageQuery};
use crate::models::InvoiceResponse;
use crate::AppState;

/// GET /invoices — paginated list, newest first.
pub async fn list_invoices(
    State(state): State<AppState>,
    Query(query): Query<PageQuery>,
) -> Result<Json<Page<InvoiceResponse>>, InvoiceError> {
    let page = state.invoices.get_all(query.page(), query.limit()).await?;
    Ok(Json(page))
}

/// GET /invoices/:id
pub async fn get_invoice(
    State(state): State<AppState>,
    Path(invoice_id): Path<i64>,
) -> Result<Json<InvoiceResponse>, InvoiceError> {
    let invoice = state.invoices.get_by_id(invoice_id).await?;
    Ok(Json(invoice))
}

/// POST /invoices
pub async fn create_invoice(
    State(state): State<AppState>,
    Json(request): Json<InvoiceRequest>,
) -> Result<(StatusCode, Json<InvoiceResponse>), InvoiceError> {
    info!(
        "create invoice request for client {} with {} items",
        request.client_id,
        request.items.len()
    );
    let invoice = state.invoices.create(&request).await?;
    Ok((StatusCode::CREATED, Json(invoice)))
}

/// PUT /invoices/:id
pub async fn update_invoice(
    State(state): State<AppState>,
    Path(invoice_id): Path<i64>,
    Json(request): Json<InvoiceRequest>,
) -> Result<Json<InvoiceResponse>, InvoiceError> {
    info!("update invoice request for invoice {}", invoice_id);
    let invoice = state.invoices.update(invoice_id, &request).await?;
    Ok(Json(invoice))
}

/// DELETE /invoices/:id
pub async fn delete_invoice(
    State(state): State<AppState>,
    Path(invoice_id): Path<i64>,
) -> Result<Json<Value>, InvoiceError> {
    state.invoices.delete(invoice_id).await?;
    Ok(Json(json!({ "message": "Invoice deleted" })))
}
