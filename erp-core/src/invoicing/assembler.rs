use chrono::NaiveDate;
use rust_decimal::Decimal;
use sqlx::{Postgres, Transaction};

use crate::error::InvoiceError;
use crate::invoicing::catalog;
use crate::invoicing::types::{InvoiceDraft, InvoiceRequest, SecuredItem};
use crate::models::Product;

/// Validate and normalize an invoice request into a persistable draft.
///
/// Resolves the client and every product through the caller's transaction,
/// replaces caller-supplied values with authoritative catalog data, snapshots
/// client and product fields, and computes the exact total. Runs no writes;
/// stock reservation is the coordinator's job.
pub async fn assemble(
    tx: &mut Transaction<'_, Postgres>,
    request: &InvoiceRequest,
    today: NaiveDate,
) -> Result<InvoiceDraft, InvoiceError> {
    let date = validate_date(request.date, today)?;
    let client = catalog::find_client(tx, request.client_id).await?;

    if request.items.is_empty() {
        return Err(InvoiceError::EmptyItems);
    }

    let mut items = Vec::with_capacity(request.items.len());
    for item in &request.items {
        let product = catalog::find_product(tx, item.product_id).await?;
        items.push(secure_item(&product, item.quantity)?);
    }

    let total = compute_total(&items);

    Ok(InvoiceDraft {
        client_id: client.id,
        date,
        status: request.status.clone(),
        total,
        client_name: client.name,
        client_email: client.email,
        client_phone: client.phone,
        items,
    })
}

/// An invoice may be dated today or in the past, never in the future.
pub fn validate_date(date: NaiveDate, today: NaiveDate) -> Result<NaiveDate, InvoiceError> {
    if date > today {
        return Err(InvoiceError::DateInFuture);
    }
    Ok(date)
}

/// Build a secured item from the authoritative product row.
///
/// The unit price, name and description always come from the catalog; any
/// price in the request was already dropped at deserialization. The quantity
/// arrives as a raw JSON number and must be an integral value of at least 1;
/// fractional, non-positive or oversized quantities are reported as
/// `InvalidQuantity`.
pub fn secure_item(product: &Product, requested: f64) -> Result<SecuredItem, InvoiceError> {
    let integral =
        requested.fract() == 0.0 && requested >= 1.0 && requested <= f64::from(i32::MAX);
    if !integral {
        return Err(InvoiceError::InvalidQuantity {
            product_id: product.id,
            quantity: requested,
        });
    }
    let quantity = requested as i32;

    Ok(SecuredItem {
        product_id: product.id,
        quantity,
        price: product.price,
        product_name: product.name.clone(),
        product_description: product.description.clone(),
        product_price: product.price,
    })
}

/// Exact invoice total: `Σ price * quantity` in fixed-point decimal.
pub fn compute_total(items: &[SecuredItem]) -> Decimal {
    items
        .iter()
        .map(|item| item.price * Decimal::from(item.quantity))
        .sum()
}
