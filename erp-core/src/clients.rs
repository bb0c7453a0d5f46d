//! CRUD endpoints for clients.
//!
//! Clients are external collaborators to the invoice core: invoices
//! reference them by id and snapshot their fields at write time, so edits
//! here never affect existing invoices.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::Json,
};
use serde_json::{json, Value};

use crate::error::ApiError;
use crate::models::client::ClientInput;
use crate::models::Client;
use crate::AppState;

const RETURNING: &str = "id, name, email, phone, created_at, updated_at";

/// GET /clients
pub async fn list_clients(State(state): State<AppState>) -> Result<Json<Vec<Client>>, ApiError> {
    let clients = sqlx::query_as::<_, Client>(
        "SELECT id, name, email, phone, created_at, updated_at FROM clients ORDER BY id",
    )
    .fetch_all(&state.db)
    .await?;
    Ok(Json(clients))
}

/// GET /clients/:id
pub async fn get_client(
    State(state): State<AppState>,
    Path(client_id): Path<i64>,
) -> Result<Json<Client>, ApiError> {
    let client = sqlx::query_as::<_, Client>(
        "SELECT id, name, email, phone, created_at, updated_at FROM clients WHERE id = $1",
    )
    .bind(client_id)
    .fetch_optional(&state.db)
    .await?
    .ok_or_else(|| ApiError::not_found("Client not found"))?;
    Ok(Json(client))
}

/// POST /clients
pub async fn create_client(
    State(state): State<AppState>,
    Json(input): Json<ClientInput>,
) -> Result<(StatusCode, Json<Client>), ApiError> {
    let client = sqlx::query_as::<_, Client>(&format!(
        "INSERT INTO clients (name, email, phone) VALUES ($1, $2, $3) RETURNING {RETURNING}"
    ))
    .bind(&input.name)
    .bind(&input.email)
    .bind(&input.phone)
    .fetch_one(&state.db)
    .await
    .map_err(|err| {
        if ApiError::is_unique_violation(&err) {
            ApiError::conflict("A client with this email or phone already exists")
        } else {
            err.into()
        }
    })?;
    Ok((StatusCode::CREATED, Json(client)))
}

/// PUT /clients/:id
pub async fn update_client(
    State(state): State<AppState>,
    Path(client_id): Path<i64>,
    Json(input): Json<ClientInput>,
) -> Result<Json<Client>, ApiError> {
    let client = sqlx::query_as::<_, Client>(&format!(
        "UPDATE clients SET name = $2, email = $3, phone = $4, updated_at = NOW() \
         WHERE id = $1 RETURNING {RETURNING}"
    ))
    .bind(client_id)
    .bind(&input.name)
    .bind(&input.email)
    .bind(&input.phone)
    .fetch_optional(&state.db)
    .await
    .map_err(|err| {
        if ApiError::is_unique_violation(&err) {
            ApiError::conflict("A client with this email or phone already exists")
        } else {
            ApiError::from(err)
        }
    })?
    .ok_or_else(|| ApiError::not_found("Client not found"))?;
    Ok(Json(client))
}

/// DELETE /clients/:id
pub async fn delete_client(
    State(state): State<AppState>,
    Path(client_id): Path<i64>,
) -> Result<Json<Value>, ApiError> {
    let deleted = sqlx::query("DELETE FROM clients WHERE id = $1")
        .bind(client_id)
        .execute(&state.db)
        .await
        .map_err(|err| {
            if ApiError::is_foreign_key_violation(&err) {
                ApiError::conflict("Client still has invoices")
            } else {
                ApiError::from(err)
            }
        })?;
    if deleted.rows_affected() == 0 {
        return Err(ApiError::not_found("Client not found"));
    }
    Ok(Json(json!({ "message": "Client deleted" })))
}
