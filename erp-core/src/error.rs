use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;
use tracing::error;

/// Errors produced by the invoice transaction core.
///
/// Every variant except `Storage` is a reportable precondition failure: the
/// enclosing transaction is rolled back and the kind is surfaced to the
/// caller. `Storage` wraps unexpected database errors and is surfaced as an
/// opaque internal error.
#[derive(Debug, Error)]
pub enum InvoiceError {
    /// Invoice date is after today
    #[error("invoice date cannot be in the future")]
    DateInFuture,

    /// Request referenced a client id that does not exist
    #[error("client {0} not found")]
    ClientNotFound(i64),

    /// Request referenced a product id that does not exist
    #[error("product {0} not found")]
    ProductNotFound(i64),

    /// Update/delete/get targeted an invoice id that does not exist
    #[error("invoice {0} not found")]
    InvoiceNotFound(i64),

    /// Request carried no items
    #[error("an invoice requires at least one item")]
    EmptyItems,

    /// Item quantity was not a positive integer
    #[error("invalid quantity {quantity} for product {product_id}")]
    InvalidQuantity { product_id: i64, quantity: f64 },

    /// Requested quantity exceeds the units currently in stock
    #[error("insufficient stock for product '{product}': available {available}, requested {requested}")]
    InsufficientStock {
        product: String,
        available: i32,
        requested: i32,
    },

    /// The product row lock could not be acquired within the retry budget
    #[error("stock is locked by another operation, try again")]
    StockContention,

    /// Any other database failure
    #[error("storage failure")]
    Storage(#[from] sqlx::Error),
}

impl IntoResponse for InvoiceError {
    fn into_response(self) -> Response {
        let status = match &self {
            InvoiceError::DateInFuture
            | InvoiceError::ClientNotFound(_)
            | InvoiceError::ProductNotFound(_)
            | InvoiceError::EmptyItems
            | InvoiceError::InvalidQuantity { .. }
            | InvoiceError::InsufficientStock { .. } => StatusCode::BAD_REQUEST,
            InvoiceError::InvoiceNotFound(_) => StatusCode::NOT_FOUND,
            InvoiceError::StockContention => StatusCode::CONFLICT,
            InvoiceError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let body = match &self {
            InvoiceError::Storage(err) => {
                error!("storage failure: {}", err);
                json!({ "error": "internal server error" })
            }
            InvoiceError::InsufficientStock {
                product,
                available,
                requested,
            } => json!({
                "error": self.to_string(),
                "details": {
                    "product": product,
                    "available": available,
                    "requested": requested,
                },
            }),
            _ => json!({ "error": self.to_string() }),
        };

        (status, Json(body)).into_response()
    }
}

/// HTTP-level error for the plain CRUD surfaces (clients, products).
///
/// These endpoints sit outside the invoice core and do not share its error
/// taxonomy; they only need a status code and a message rendered in the
/// `{ "error": ... }` envelope.
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub message: String,
}

impl ApiError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: message.into(),
        }
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::NOT_FOUND,
            message: message.into(),
        }
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::CONFLICT,
            message: message.into(),
        }
    }

    pub fn internal(cause: impl std::fmt::Display) -> Self {
        error!("internal error: {}", cause);
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            message: "internal server error".to_string(),
        }
    }

    /// True when the wrapped database error is a unique constraint violation.
    pub fn is_unique_violation(err: &sqlx::Error) -> bool {
        matches!(
            err,
            sqlx::Error::Database(db) if db.code().as_deref() == Some("23505")
        )
    }

    /// True when the wrapped database error is a foreign key violation.
    pub fn is_foreign_key_violation(err: &sqlx::Error) -> bool {
        matches!(
            err,
            sqlx::Error::Database(db) if db.code().as_deref() == Some("23503")
        )
    }
}

impl From<sqlx::Error> for ApiError {
    fn from(err: sqlx::Error) -> Self {
        ApiError::internal(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(json!({ "error": self.message }))).into_response()
    }
}
