use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Product model representing a catalog entry.
///
/// This struct maps to the `products` table. `stock` is mutated only by the
/// stock controller inside an invoice transaction; every other field is
/// managed through the product CRUD endpoints.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Product {
    /// Unique identifier for the product
    pub id: i64,

    /// Product name
    pub name: String,

    /// Product description
    pub description: Option<String>,

    /// Unit price (non-negative)
    pub price: Decimal,

    /// Units currently in stock (non-negative)
    pub stock: i32,

    /// Timestamp when the product was created
    #[serde(rename = "createdAt")]
    pub created_at: DateTime<Utc>,

    /// Timestamp when the product was last updated
    #[serde(rename = "updatedAt")]
    pub updated_at: DateTime<Utc>,
}

/// Product creation/update request
#[derive(Debug, Clone, Deserialize)]
pub struct ProductInput {
    pub name: String,
    pub description: Option<String>,
    pub price: Decimal,
    pub stock: i32,
}
