//! ERP back-end: clients, products and invoices over PostgreSQL.
//!
//! The heart of the crate is the [`invoicing`] module, whose
//! [`invoicing::InvoiceService`] keeps product stock, frozen line snapshots
//! and monetary totals consistent under concurrent access. The `clients` and
//! `products` modules provide the surrounding catalog CRUD.

pub mod clients;
pub mod clock;
pub mod db;
pub mod error;
pub mod invoicing;
pub mod models;
pub mod products;

use sqlx::PgPool;

use crate::invoicing::InvoiceService;

/// Application state containing shared resources.
///
/// This struct holds the database connection pool and the invoice service,
/// and is cloned into every route handler.
#[derive(Clone)]
pub struct AppState {
    /// PostgreSQL connection pool
    pub db: PgPool,

    /// Invoice transaction coordinator
    pub invoices: InvoiceService,
}
