use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use crate::models::{Client, Product};

/// Invoice model representing a persisted invoice header.
///
/// This struct maps to the `invoices` table. The `client_*` columns are
/// snapshot fields: they copy the referenced client's data at write time and
/// never change afterwards, so the invoice stays presentable even if the
/// client row is later edited or removed.
///
/// JSON field names follow the wire contract consumed by the front-end
/// (`ClientId`, `clientName`, ...).
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Invoice {
    /// Unique identifier for the invoice
    pub id: i64,

    /// Invoice date (never in the future)
    pub date: NaiveDate,

    /// Invoice total, always equal to the sum of its lines
    pub total: Decimal,

    /// Free-form status label, defaults to "pending"
    pub status: String,

    /// ID of the referenced client
    #[serde(rename = "ClientId")]
    pub client_id: i64,

    /// Snapshot of the client name at write time
    #[serde(rename = "clientName")]
    pub client_name: String,

    /// Snapshot of the client email at write time
    #[serde(rename = "clientEmail")]
    pub client_email: Option<String>,

    /// Snapshot of the client phone at write time
    #[serde(rename = "clientPhone")]
    pub client_phone: Option<String>,

    /// Timestamp when the invoice was created
    #[serde(rename = "createdAt")]
    pub created_at: DateTime<Utc>,

    /// Timestamp when the invoice was last updated
    #[serde(rename = "updatedAt")]
    pub updated_at: DateTime<Utc>,
}

/// Invoice line model.
///
/// Lines exist only as part of an invoice; they are inserted and deleted by
/// the invoice coordinator and never mutated independently. `price` and the
/// `product_*` snapshot columns come from the authoritative catalog row at
/// write time, never from caller input.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct InvoiceItem {
    /// Unique identifier for the line
    pub id: i64,

    /// Owning invoice
    #[serde(rename = "InvoiceId")]
    pub invoice_id: i64,

    /// Referenced product; None once the product has been deleted
    #[serde(rename = "ProductId")]
    pub product_id: Option<i64>,

    /// Quantity invoiced (positive integer)
    pub quantity: i32,

    /// Unit price charged, equal to the product price when the line was written
    pub price: Decimal,

    /// Snapshot of the product name at write time
    #[serde(rename = "productName")]
    pub product_name: String,

    /// Snapshot of the product description at write time
    #[serde(rename = "productDescription")]
    pub product_description: Option<String>,

    /// Snapshot of the product price at write time
    #[serde(rename = "productPrice")]
    pub product_price: Decimal,

    /// Timestamp when the line was created
    #[serde(rename = "createdAt")]
    pub created_at: DateTime<Utc>,

    /// Timestamp when the line was last updated
    #[serde(rename = "updatedAt")]
    pub updated_at: DateTime<Utc>,
}

/// Invoice line as returned over HTTP, with the current product row joined
/// in for display. The snapshot fields on the line itself stay authoritative
/// for invoice content.
#[derive(Debug, Clone, Serialize)]
pub struct InvoiceItemResponse {
    #[serde(flatten)]
    pub item: InvoiceItem,

    /// Current catalog row, when the product still exists
    #[serde(rename = "Product")]
    pub product: Option<Product>,
}

/// Invoice as returned over HTTP: header plus current client row and lines.
#[derive(Debug, Clone, Serialize)]
pub struct InvoiceResponse {
    #[serde(flatten)]
    pub invoice: Invoice,

    /// Current client row, when the client still exists
    #[serde(rename = "Client")]
    pub client: Option<Client>,

    /// Lines belonging to this invoice, ordered by line id
    #[serde(rename = "InvoiceItems")]
    pub items: Vec<InvoiceItemResponse>,
}
