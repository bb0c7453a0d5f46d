pub mod client;
pub mod invoice;
pub mod product;

pub use client::Client;
pub use invoice::{Invoice, InvoiceItem, InvoiceItemResponse, InvoiceResponse};
pub use product::Product;
