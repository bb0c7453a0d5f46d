pub mod assembler;
pub mod catalog;
pub mod coordinator;
pub mod handlers;
pub mod stock;
pub mod types;

#[cfg(test)]
mod tests;

pub use coordinator::InvoiceService;
pub use handlers::{create_invoice, delete_invoice, get_invoice, list_invoices, update_invoice};
pub use types::*;
