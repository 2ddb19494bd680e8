//! Order read model
//!
//! Orders are owned by the checkout flow; this service only lists them for the
//! authenticated customer.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Order summary
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, PartialEq)]
pub struct Order {
    pub id: String,
    pub display_id: i64,
    pub customer_id: String,
    pub email: String,
    pub status: String,
    pub currency_code: String,
    /// Minor units
    pub total: i64,
    pub created_at: DateTime<Utc>,
}

/// Paginated order listing
#[derive(Debug, Clone, Serialize)]
pub struct OrderList {
    pub orders: Vec<Order>,
    pub count: i64,
}
