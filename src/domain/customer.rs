//! Customer domain models

use super::common::Metadata;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use validator::Validate;

/// Customer entity
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, PartialEq)]
pub struct Customer {
    pub id: String,
    pub email: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub phone: Option<String>,
    pub has_account: bool,
    #[sqlx(json)]
    pub metadata: Metadata,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Default for Customer {
    fn default() -> Self {
        let now = Utc::now();
        Self {
            id: String::new(),
            email: String::new(),
            first_name: None,
            last_name: None,
            phone: None,
            has_account: false,
            metadata: Metadata::new(),
            created_at: now,
            updated_at: now,
        }
    }
}

/// Customer address
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, PartialEq)]
pub struct CustomerAddress {
    pub id: String,
    pub customer_id: String,
    pub address_name: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub company: Option<String>,
    pub address_1: Option<String>,
    pub address_2: Option<String>,
    pub city: Option<String>,
    pub province: Option<String>,
    pub postal_code: Option<String>,
    pub country_code: Option<String>,
    pub phone: Option<String>,
    pub is_default_shipping: bool,
    pub is_default_billing: bool,
    pub created_at: DateTime<Utc>,
}

/// Customer with its addresses (API response shape)
#[derive(Debug, Clone, Serialize)]
pub struct CustomerWithAddresses {
    #[serde(flatten)]
    pub customer: Customer,
    pub addresses: Vec<CustomerAddress>,
}

/// Input for creating a customer
#[derive(Debug, Clone, PartialEq)]
pub struct CreateCustomerInput {
    pub email: String,
    pub has_account: bool,
}

/// Input for updating a customer profile
#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct UpdateCustomerInput {
    #[validate(length(max = 255))]
    pub first_name: Option<String>,
    #[validate(length(max = 255))]
    pub last_name: Option<String>,
    #[validate(length(max = 64))]
    pub phone: Option<String>,
    pub metadata: Option<Metadata>,
}

impl UpdateCustomerInput {
    pub fn is_empty(&self) -> bool {
        self.first_name.is_none()
            && self.last_name.is_none()
            && self.phone.is_none()
            && self.metadata.is_none()
    }
}
