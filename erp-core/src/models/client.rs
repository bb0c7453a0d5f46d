use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Client model representing a customer in the system.
///
/// This struct maps to the `clients` table. Clients are created and edited
/// through their own CRUD endpoints; the invoice core only ever reads them
/// and copies their fields into invoice snapshots.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Client {
    /// Unique identifier for the client
    pub id: i64,

    /// Client name
    pub name: String,

    /// Client email address (unique when present)
    pub email: Option<String>,

    /// Client phone number (unique when present)
    pub phone: Option<String>,

    /// Timestamp when the client was created
    #[serde(rename = "createdAt")]
    pub created_at: DateTime<Utc>,

    /// Timestamp when the client was last updated
    #[serde(rename = "updatedAt")]
    pub updated_at: DateTime<Utc>,
}

/// Client creation/update request
#[derive(Debug, Clone, Deserialize)]
pub struct ClientInput {
    pub name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
}
