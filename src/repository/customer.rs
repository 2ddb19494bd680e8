//! Customer repository

use crate::domain::{
    generate_id, prefix, CreateCustomerInput, Customer, CustomerAddress, UpdateCustomerInput,
};
use crate::error::{AppError, Result};
use async_trait::async_trait;
use sqlx::MySqlPool;

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CustomerRepository: Send + Sync {
    /// Insert a customer. A taken email yields `AppError::Conflict`.
    async fn create(&self, input: &CreateCustomerInput) -> Result<Customer>;
    async fn find_by_id(&self, id: &str) -> Result<Option<Customer>>;
    /// Exact, case-sensitive email match, oldest first
    async fn list_by_email(&self, email: &str) -> Result<Vec<Customer>>;
    async fn update(&self, id: &str, input: &UpdateCustomerInput) -> Result<Customer>;
    async fn list_addresses(&self, customer_id: &str) -> Result<Vec<CustomerAddress>>;
}

pub struct CustomerRepositoryImpl {
    pool: MySqlPool,
}

impl CustomerRepositoryImpl {
    pub fn new(pool: MySqlPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl CustomerRepository for CustomerRepositoryImpl {
    async fn create(&self, input: &CreateCustomerInput) -> Result<Customer> {
        let id = generate_id(prefix::CUSTOMER);

        sqlx::query(
            r#"
            INSERT INTO customers (id, email, has_account, metadata, created_at, updated_at)
            VALUES (?, ?, ?, JSON_OBJECT(), NOW(), NOW())
            "#,
        )
        .bind(&id)
        .bind(&input.email)
        .bind(input.has_account)
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::from_write(e, "Customer with this email"))?;

        self.find_by_id(&id)
            .await?
            .ok_or_else(|| AppError::Internal(anyhow::anyhow!("Failed to create customer")))
    }

    async fn find_by_id(&self, id: &str) -> Result<Option<Customer>> {
        let customer = sqlx::query_as::<_, Customer>(
            r#"
            SELECT id, email, first_name, last_name, phone, has_account, metadata,
                   created_at, updated_at
            FROM customers
            WHERE id = ?
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(customer)
    }

    async fn list_by_email(&self, email: &str) -> Result<Vec<Customer>> {
        let customers = sqlx::query_as::<_, Customer>(
            r#"
            SELECT id, email, first_name, last_name, phone, has_account, metadata,
                   created_at, updated_at
            FROM customers
            WHERE email = ?
            ORDER BY created_at ASC, id ASC
            "#,
        )
        .bind(email)
        .fetch_all(&self.pool)
        .await?;

        Ok(customers)
    }

    async fn update(&self, id: &str, input: &UpdateCustomerInput) -> Result<Customer> {
        let metadata = input
            .metadata
            .as_ref()
            .map(serde_json::to_string)
            .transpose()
            .map_err(|e| AppError::Internal(e.into()))?;

        let result = sqlx::query(
            r#"
            UPDATE customers
            SET first_name = COALESCE(?, first_name),
                last_name = COALESCE(?, last_name),
                phone = COALESCE(?, phone),
                metadata = CASE
                    WHEN ? IS NULL THEN metadata
                    ELSE JSON_MERGE_PATCH(COALESCE(metadata, JSON_OBJECT()), CAST(? AS JSON))
                END,
                updated_at = NOW()
            WHERE id = ?
            "#,
        )
        .bind(&input.first_name)
        .bind(&input.last_name)
        .bind(&input.phone)
        .bind(&metadata)
        .bind(&metadata)
        .bind(id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound("Customer not found".to_string()));
        }

        self.find_by_id(id)
            .await?
            .ok_or_else(|| AppError::NotFound("Customer not found".to_string()))
    }

    async fn list_addresses(&self, customer_id: &str) -> Result<Vec<CustomerAddress>> {
        let addresses = sqlx::query_as::<_, CustomerAddress>(
            r#"
            SELECT id, customer_id, address_name, first_name, last_name, company,
                   address_1, address_2, city, province, postal_code, country_code,
                   phone, is_default_shipping, is_default_billing, created_at
            FROM customer_addresses
            WHERE customer_id = ?
            ORDER BY created_at ASC
            "#,
        )
        .bind(customer_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(addresses)
    }
}
