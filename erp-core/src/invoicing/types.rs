use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Invoice create/update request.
///
/// Note the deliberate absence of any price field: unit prices always come
/// from the catalog, so a `price` key sent by a caller is dropped during
/// deserialization.
#[derive(Debug, Clone, Deserialize)]
pub struct InvoiceRequest {
    /// ID of the client the invoice is for
    #[serde(rename = "clientId")]
    pub client_id: i64,

    /// Invoice date (ISO-8601, must not be in the future)
    pub date: NaiveDate,

    /// Optional status label; defaults to "pending" on create and is
    /// preserved on update when omitted
    pub status: Option<String>,

    /// Requested lines
    pub items: Vec<ItemRequest>,
}

/// One requested line: a product reference and a quantity.
#[derive(Debug, Clone, Deserialize)]
pub struct ItemRequest {
    #[serde(rename = "productId")]
    pub product_id: i64,

    /// Requested quantity. Accepted as any JSON number so that a fractional
    /// or non-positive value reaches the assembler and is reported as
    /// `InvalidQuantity` instead of dying as a deserialization error.
    pub quantity: f64,
}

/// A request item after its price, name and description have been replaced
/// with authoritative catalog values.
#[derive(Debug, Clone)]
pub struct SecuredItem {
    pub product_id: i64,
    pub quantity: i32,
    /// Unit price charged, taken from the catalog
    pub price: Decimal,
    pub product_name: String,
    pub product_description: Option<String>,
    pub product_price: Decimal,
}

/// Fully validated invoice proposal, ready to be persisted.
///
/// Client fields are snapshots taken from the resolved client row; `total`
/// is the exact sum of `price * quantity` over `items`.
#[derive(Debug, Clone)]
pub struct InvoiceDraft {
    pub client_id: i64,
    pub date: NaiveDate,
    pub status: Option<String>,
    pub total: Decimal,
    pub client_name: String,
    pub client_email: Option<String>,
    pub client_phone: Option<String>,
    pub items: Vec<SecuredItem>,
}

/// Pagination envelope shared by the list endpoints.
#[derive(Debug, Clone, Serialize)]
pub struct Page<T> {
    pub results: Vec<T>,
    pub total: i64,
    pub page: i64,
    #[serde(rename = "totalPages")]
    pub total_pages: i64,
    pub limit: i64,
}

/// Pagination query parameters (`?page=&limit=`), defaulting to 1 and 10.
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct PageQuery {
    pub page: Option<i64>,
    pub limit: Option<i64>,
}

impl PageQuery {
    pub fn page(&self) -> i64 {
        self.page.unwrap_or(1).max(1)
    }

    pub fn limit(&self) -> i64 {
        self.limit.unwrap_or(10).max(1)
    }
}

/// Number of pages needed to show `total` rows at `limit` rows per page.
pub fn total_pages(total: i64, limit: i64) -> i64 {
    if total <= 0 {
        return 0;
    }
    total / limit + i64::from(total % limit != 0)
}

/// Row offset of `page`, saturating instead of overflowing so an absurd
/// page number degrades into an empty out-of-range page.
pub fn page_offset(page: i64, limit: i64) -> i64 {
    (page - 1).saturating_mul(limit)
}
