use std::collections::HashMap;
use std::sync::Arc;

use sqlx::{PgPool, Postgres, Transaction};
use tracing::info;

use crate::clock::Clock;
use crate::error::InvoiceError;
use crate::invoicing::types::{
    page_offset, total_pages, InvoiceDraft, InvoiceRequest, Page, SecuredItem,
};
use crate::invoicing::{assembler, stock};
use crate::models::{Client, Invoice, InvoiceItem, InvoiceItemResponse, InvoiceResponse, Product};

const SELECT_INVOICE: &str = "SELECT id, date, total, status, client_id, client_name, \
     client_email, client_phone, created_at, updated_at FROM invoices";

const SELECT_ITEMS: &str = "SELECT id, invoice_id, product_id, quantity, price, product_name, \
     product_description, product_price, created_at, updated_at FROM invoice_items";

/// Invoice transaction coordinator.
///
/// The only entry point to invoice mutation. Every operation runs inside a
/// single database transaction with row-level locking on the product rows it
/// touches; any failure between begin and commit rolls the whole operation
/// back (sqlx transactions roll back when dropped without a commit).
///
/// Constructed from a connection pool and a clock so tests can substitute
/// both.
#[derive(Clone)]
pub struct InvoiceService {
    pool: PgPool,
    clock: Arc<dyn Clock>,
}

impl InvoiceService {
    /// Creates a new invoice service.
    ///
    /// # Arguments
    ///
    /// * `pool` - PostgreSQL connection pool
    /// * `clock` - Source of "today" for date validation
    pub fn new(pool: PgPool, clock: Arc<dyn Clock>) -> Self {
        Self { pool, clock }
    }

    /// Create an invoice.
    ///
    /// Assembles the request against the catalog, reserves stock for every
    /// line, then persists the header and lines, all in one transaction.
    /// Returns the invoice reloaded with its client and lines.
    pub async fn create(&self, request: &InvoiceRequest) -> Result<InvoiceResponse, InvoiceError> {
        let mut tx = self.begin().await?;

        let draft = assembler::assemble(&mut tx, request, self.clock.today()).await?;
        for item in &draft.items {
            stock::reserve(&mut tx, item.product_id, item.quantity).await?;
        }

        let invoice_id = insert_header(&mut tx, &draft).await?;
        for item in &draft.items {
            insert_line(&mut tx, invoice_id, item).await?;
        }

        tx.commit().await?;
        info!(
            "created invoice {} with {} lines, total {}",
            invoice_id,
            draft.items.len(),
            draft.total
        );

        self.get_by_id(invoice_id).await
    }

    /// Update an invoice by replacing its lines.
    ///
    /// Releases the stock held by the existing lines, then assembles and
    /// reserves the new ones inside the same transaction. The release runs
    /// first so a caller changing quantities is not double-counted against
    /// its own prior reservation; if anything later fails, the rollback also
    /// undoes the release.
    pub async fn update(
        &self,
        invoice_id: i64,
        request: &InvoiceRequest,
    ) -> Result<InvoiceResponse, InvoiceError> {
        let mut tx = self.begin().await?;

        assembler::validate_date(request.date, self.clock.today())?;

        let existing = sqlx::query_as::<_, Invoice>(&format!("{SELECT_INVOICE} WHERE id = $1"))
            .bind(invoice_id)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or(InvoiceError::InvoiceNotFound(invoice_id))?;

        let old_lines =
            sqlx::query_as::<_, InvoiceItem>(&format!("{SELECT_ITEMS} WHERE invoice_id = $1"))
                .bind(invoice_id)
                .fetch_all(&mut *tx)
                .await?;
        for line in &old_lines {
            if let Some(product_id) = line.product_id {
                stock::release(&mut tx, product_id, line.quantity).await?;
            }
        }

        let draft = assembler::assemble(&mut tx, request, self.clock.today()).await?;
        for item in &draft.items {
            stock::reserve(&mut tx, item.product_id, item.quantity).await?;
        }

        // Status is preserved unless the request supplies a replacement.
        let status = draft.status.clone().unwrap_or(existing.status);
        sqlx::query(
            "UPDATE invoices SET client_id = $2, date = $3, status = $4, total = $5, \
             client_name = $6, client_email = $7, client_phone = $8, updated_at = NOW() \
             WHERE id = $1",
        )
        .bind(invoice_id)
        .bind(draft.client_id)
        .bind(draft.date)
        .bind(&status)
        .bind(draft.total)
        .bind(&draft.client_name)
        .bind(&draft.client_email)
        .bind(&draft.client_phone)
        .execute(&mut *tx)
        .await?;

        sqlx::query("DELETE FROM invoice_items WHERE invoice_id = $1")
            .bind(invoice_id)
            .execute(&mut *tx)
            .await?;
        for item in &draft.items {
            insert_line(&mut tx, invoice_id, item).await?;
        }

        tx.commit().await?;
        info!(
            "updated invoice {}: {} lines, total {}",
            invoice_id,
            draft.items.len(),
            draft.total
        );

        self.get_by_id(invoice_id).await
    }

    /// Delete an invoice and its lines.
    ///
    /// Stock is not restored: a deleted invoice represents goods that have
    /// already left inventory.
    pub async fn delete(&self, invoice_id: i64) -> Result<(), InvoiceError> {
        let mut tx = self.begin().await?;

        sqlx::query_scalar::<_, i64>("SELECT id FROM invoices WHERE id = $1")
            .bind(invoice_id)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or(InvoiceError::InvoiceNotFound(invoice_id))?;

        sqlx::query("DELETE FROM invoice_items WHERE invoice_id = $1")
            .bind(invoice_id)
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM invoices WHERE id = $1")
            .bind(invoice_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        info!("deleted invoice {}", invoice_id);
        Ok(())
    }

    /// Fetch one invoice with its client reference and lines.
    pub async fn get_by_id(&self, invoice_id: i64) -> Result<InvoiceResponse, InvoiceError> {
        let invoice = sqlx::query_as::<_, Invoice>(&format!("{SELECT_INVOICE} WHERE id = $1"))
            .bind(invoice_id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or(InvoiceError::InvoiceNotFound(invoice_id))?;

        let mut composed = self.compose(vec![invoice]).await?;
        Ok(composed.remove(0))
    }

    /// Fetch a page of invoices ordered by descending id.
    ///
    /// Out-of-range pages return empty results with accurate counts.
    pub async fn get_all(
        &self,
        page: i64,
        limit: i64,
    ) -> Result<Page<InvoiceResponse>, InvoiceError> {
        let page = page.max(1);
        let limit = limit.max(1);

        let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM invoices")
            .fetch_one(&self.pool)
            .await?;

        let invoices = sqlx::query_as::<_, Invoice>(&format!(
            "{SELECT_INVOICE} ORDER BY id DESC OFFSET $1 LIMIT $2"
        ))
        .bind(page_offset(page, limit))
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        let results = self.compose(invoices).await?;

        Ok(Page {
            results,
            total,
            page,
            total_pages: total_pages(total, limit),
            limit,
        })
    }

    /// Open a transaction with a bounded lock wait, so contended product
    /// rows surface a lock-wait timeout the stock controller can retry on.
    async fn begin(&self) -> Result<Transaction<'static, Postgres>, InvoiceError> {
        let mut tx = self.pool.begin().await?;
        sqlx::query("SET LOCAL lock_timeout = '1s'")
            .execute(&mut *tx)
            .await?;
        Ok(tx)
    }

    /// Attach current client and product rows plus lines to invoice headers,
    /// preserving the input order. Reads committed state through the pool.
    async fn compose(
        &self,
        invoices: Vec<Invoice>,
    ) -> Result<Vec<InvoiceResponse>, InvoiceError> {
        if invoices.is_empty() {
            return Ok(Vec::new());
        }

        let invoice_ids: Vec<i64> = invoices.iter().map(|invoice| invoice.id).collect();
        let client_ids: Vec<i64> = invoices.iter().map(|invoice| invoice.client_id).collect();

        let clients = sqlx::query_as::<_, Client>(
            "SELECT id, name, email, phone, created_at, updated_at \
             FROM clients WHERE id = ANY($1)",
        )
        .bind(&client_ids)
        .fetch_all(&self.pool)
        .await?;
        let clients: HashMap<i64, Client> =
            clients.into_iter().map(|client| (client.id, client)).collect();

        let items = sqlx::query_as::<_, InvoiceItem>(&format!(
            "{SELECT_ITEMS} WHERE invoice_id = ANY($1) ORDER BY id"
        ))
        .bind(&invoice_ids)
        .fetch_all(&self.pool)
        .await?;

        let product_ids: Vec<i64> = items.iter().filter_map(|item| item.product_id).collect();
        let products = sqlx::query_as::<_, Product>(
            "SELECT id, name, description, price, stock, created_at, updated_at \
             FROM products WHERE id = ANY($1)",
        )
        .bind(&product_ids)
        .fetch_all(&self.pool)
        .await?;
        let products: HashMap<i64, Product> =
            products.into_iter().map(|product| (product.id, product)).collect();

        let mut lines: HashMap<i64, Vec<InvoiceItemResponse>> = HashMap::new();
        for item in items {
            let product = item.product_id.and_then(|id| products.get(&id).cloned());
            lines
                .entry(item.invoice_id)
                .or_default()
                .push(InvoiceItemResponse { item, product });
        }

        Ok(invoices
            .into_iter()
            .map(|invoice| InvoiceResponse {
                client: clients.get(&invoice.client_id).cloned(),
                items: lines.remove(&invoice.id).unwrap_or_default(),
                invoice,
            })
            .collect())
    }
}

async fn insert_header(
    tx: &mut Transaction<'_, Postgres>,
    draft: &InvoiceDraft,
) -> Result<i64, InvoiceError> {
    let invoice_id: i64 = sqlx::query_scalar(
        "INSERT INTO invoices (date, total, status, client_id, client_name, \
         client_email, client_phone) \
         VALUES ($1, $2, COALESCE($3, 'pending'), $4, $5, $6, $7) \
         RETURNING id",
    )
    .bind(draft.date)
    .bind(draft.total)
    .bind(&draft.status)
    .bind(draft.client_id)
    .bind(&draft.client_name)
    .bind(&draft.client_email)
    .bind(&draft.client_phone)
    .fetch_one(&mut **tx)
    .await?;
    Ok(invoice_id)
}

async fn insert_line(
    tx: &mut Transaction<'_, Postgres>,
    invoice_id: i64,
    item: &SecuredItem,
) -> Result<(), InvoiceError> {
    sqlx::query(
        "INSERT INTO invoice_items (invoice_id, product_id, quantity, price, \
         product_name, product_description, product_price) \
         VALUES ($1, $2, $3, $4, $5, $6, $7)",
    )
    .bind(invoice_id)
    .bind(item.product_id)
    .bind(item.quantity)
    .bind(item.price)
    .bind(&item.product_name)
    .bind(&item.product_description)
    .bind(item.product_price)
    .execute(&mut **tx)
    .await?;
    Ok(())
}
