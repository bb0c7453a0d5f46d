//! CRUD endpoints for products.
//!
//! Products are external collaborators to the invoice core. `stock` is only
//! ever mutated by the stock controller inside an invoice transaction, but
//! these endpoints may replace it wholesale (restocking, corrections).

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::Json,
};
use rust_decimal::Decimal;
use serde_json::{json, Value};

use crate::error::ApiError;
use crate::invoicing::types::{page_offset, total_pages, Page, PageQuery};
use crate::models::product::ProductInput;
use crate::models::Product;
use crate::AppState;

const COLUMNS: &str = "id, name, description, price, stock, created_at, updated_at";

fn validate(input: &ProductInput) -> Result<(), ApiError> {
    if input.price < Decimal::ZERO {
        return Err(ApiError::bad_request("Product price cannot be negative"));
    }
    if input.stock < 0 {
        return Err(ApiError::bad_request("Product stock cannot be negative"));
    }
    Ok(())
}

/// GET /products — paginated list, newest first.
pub async fn list_products(
    State(state): State<AppState>,
    Query(query): Query<PageQuery>,
) -> Result<Json<Page<Product>>, ApiError> {
    let page = query.page();
    let limit = query.limit();

    let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM products")
        .fetch_one(&state.db)
        .await?;

    let results = sqlx::query_as::<_, Product>(&format!(
        "SELECT {COLUMNS} FROM products ORDER BY id DESC OFFSET $1 LIMIT $2"
    ))
    .bind(page_offset(page, limit))
    .bind(limit)
    .fetch_all(&state.db)
    .await?;

    Ok(Json(Page {
        results,
        total,
        page,
        total_pages: total_pages(total, limit),
        limit,
    }))
}

/// GET /products/:id
pub async fn get_product(
    State(state): State<AppState>,
    Path(product_id): Path<i64>,
) -> Result<Json<Product>, ApiError> {
    let product =
        sqlx::query_as::<_, Product>(&format!("SELECT {COLUMNS} FROM products WHERE id = $1"))
            .bind(product_id)
            .fetch_optional(&state.db)
            .await?
            .ok_or_else(|| ApiError::not_found("Product not found"))?;
    Ok(Json(product))
}

/// POST /products
pub async fn create_product(
    State(state): State<AppState>,
    Json(input): Json<ProductInput>,
) -> Result<(StatusCode, Json<Product>), ApiError> {
    validate(&input)?;
    let product = sqlx::query_as::<_, Product>(&format!(
        "INSERT INTO products (name, description, price, stock) \
         VALUES ($1, $2, $3, $4) RETURNING {COLUMNS}"
    ))
    .bind(&input.name)
    .bind(&input.description)
    .bind(input.price)
    .bind(input.stock)
    .fetch_one(&state.db)
    .await?;
    Ok((StatusCode::CREATED, Json(product)))
}

/// PUT /products/:id
pub async fn update_product(
    State(state): State<AppState>,
    Path(product_id): Path<i64>,
    Json(input): Json<ProductInput>,
) -> Result<Json<Product>, ApiError> {
    validate(&input)?;
    let product = sqlx::query_as::<_, Product>(&format!(
        "UPDATE products SET name = $2, description = $3, price = $4, stock = $5, \
         updated_at = NOW() WHERE id = $1 RETURNING {COLUMNS}"
    ))
    .bind(product_id)
    .bind(&input.name)
    .bind(&input.description)
    .bind(input.price)
    .bind(input.stock)
    .fetch_optional(&state.db)
    .await?
    .ok_or_else(|| ApiError::not_found("Product not found"))?;
    Ok(Json(product))
}

/// DELETE /products/:id
///
/// Existing invoice lines keep presenting through their snapshot fields;
/// their `product_id` is set to NULL by the schema.
pub async fn delete_product(
    State(state): State<AppState>,
    Path(product_id): Path<i64>,
) -> Result<Json<Value>, ApiError> {
    let deleted = sqlx::query("DELETE FROM products WHERE id = $1")
        .bind(product_id)
        .execute(&state.db)
        .await?;
    if deleted.rows_affected() == 0 {
        return Err(ApiError::not_found("Product not found"));
    }
    Ok(Json(json!({ "message": "Product deleted" })))
}
