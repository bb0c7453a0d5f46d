use sqlx::{Postgres, Transaction};

use crate::error::InvoiceError;
use crate::models::{Client, Product};

/// Catalog reads for the invoice core.
///
/// Both lookups run through the caller's open transaction so they observe
/// row locks taken by the stock controller and any uncommitted writes of the
/// enclosing operation. An unresolved id is a precondition failure
/// (`ClientNotFound` / `ProductNotFound`), not an internal error.

/// Resolve a client by id through the given transaction.
pub async fn find_client(
    tx: &mut Transaction<'_, Postgres>,
    client_id: i64,
) -> Result<Client, InvoiceError> {
    sqlx::query_as::<_, Client>(
        "SELECT id, name, email, phone, created_at, updated_at
         FROM clients WHERE id = $1",
    )
    .bind(client_id)
    .fetch_optional(&mut **tx)
    .await?
    .ok_or(InvoiceError::ClientNotFound(client_id))
}

/// Resolve a product by id through the given transaction.
pub async fn find_product(
    tx: &mut Transaction<'_, Postgres>,
    product_id: i64,
) -> Result<Product, InvoiceError> {
    sqlx::query_as::<_, Product>(
        "SELECT id, name, description, price, stock, created_at, updated_at
         FROM products WHERE id = $1",
    )
    .bind(product_id)
    .fetch_optional(&mut **tx)
    .await?
    .ok_or(InvoiceError::ProductNotFound(product_id))
}
