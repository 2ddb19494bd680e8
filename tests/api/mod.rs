//! In-memory repositories shared by the integration tests
//!
//! No external dependencies (database, Redis) are required.


use async_trait::async_trait;
use chrono::{Duration, Utc};
use serde_json::json;
use std::sync::atomic::{AtomicBool, Ordering};
use storefront_core::config::JwtConfig;
use storefront_core::domain::{
    AuthIdentity, CreateAuthIdentityInput, CreateCustomerInput, Customer, CustomerAddress,
    Metadata, Order, ProviderIdentity, UpdateCustomerInput, EMAILPASS_PROVIDER,
};
use storefront_core::error::{AppError, Result};
use storefront_core::jwt::JwtManager;
use storefront_core::repository::{AuthIdentityRepository, CustomerRepository, OrderRepository};
use tokio::sync::RwLock;

pub fn create_test_jwt_manager() -> JwtManager {
    JwtManager::new(JwtConfig {
        secret: "test-secret-key-for-http-testing".to_string(),
        issuer: "https://shop.test".to_string(),
        token_ttl_secs: 3600,
    })
}

fn store_down() -> AppError {
    AppError::Internal(anyhow::anyhow!("store unavailable"))
}

pub fn metadata(value: serde_json::Value) -> Metadata {
    value.as_object().cloned().unwrap_or_default()
}

/// Emailpass identity whose provider identity carries `email` in user_metadata
pub fn emailpass_identity(id: &str, email: &str) -> AuthIdentity {
    AuthIdentity {
        id: id.to_string(),
        provider_identities: vec![ProviderIdentity {
            id: format!("provid_{}", id),
            auth_identity_id: id.to_string(),
            provider: EMAILPASS_PROVIDER.to_string(),
            entity_id: email.to_string(),
            user_metadata: metadata(json!({ "email": email })),
            ..Default::default()
        }],
        ..Default::default()
    }
}

pub fn customer(id: &str, email: &str) -> Customer {
    Customer {
        id: id.to_string(),
        email: email.to_string(),
        has_account: true,
        ..Default::default()
    }
}

pub fn order(id: &str, customer_id: &str, display_id: i64, minutes_ago: i64) -> Order {
    Order {
        id: id.to_string(),
        display_id,
        customer_id: customer_id.to_string(),
        email: "jane@example.com".to_string(),
        status: "completed".to_string(),
        currency_code: "eur".to_string(),
        total: 2500,
        created_at: Utc::now() - Duration::minutes(minutes_ago),
    }
}

// ============================================================================
// Auth identities
// ============================================================================

pub struct TestAuthIdentityRepository {
    identities: RwLock<Vec<AuthIdentity>>,
    fail_merge: AtomicBool,
    fail_lookups: AtomicBool,
}

impl TestAuthIdentityRepository {
    pub fn new() -> Self {
        Self {
            identities: RwLock::new(vec![]),
            fail_merge: AtomicBool::new(false),
            fail_lookups: AtomicBool::new(false),
        }
    }

    pub async fn add_identity(&self, identity: AuthIdentity) {
        self.identities.write().await.push(identity);
    }

    pub async fn get(&self, id: &str) -> Option<AuthIdentity> {
        self.identities
            .read()
            .await
            .iter()
            .find(|i| i.id == id)
            .cloned()
    }

    pub fn set_fail_merge(&self, fail: bool) {
        self.fail_merge.store(fail, Ordering::SeqCst);
    }

    pub fn set_fail_lookups(&self, fail: bool) {
        self.fail_lookups.store(fail, Ordering::SeqCst);
    }
}

impl Default for TestAuthIdentityRepository {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl AuthIdentityRepository for TestAuthIdentityRepository {
    async fn create(&self, input: &CreateAuthIdentityInput) -> Result<AuthIdentity> {
        let mut identities = self.identities.write().await;
        let taken = identities.iter().any(|i| {
            i.provider_identities
                .iter()
                .any(|p| p.provider == input.provider && p.entity_id == input.entity_id)
        });
        if taken {
            return Err(AppError::Conflict(
                "Identity with this email already exists".to_string(),
            ));
        }

        let id = format!("authid_{}", identities.len() + 1);
        let identity = AuthIdentity {
            id: id.clone(),
            provider_identities: vec![ProviderIdentity {
                id: format!("provid_{}", identities.len() + 1),
                auth_identity_id: id,
                provider: input.provider.clone(),
                entity_id: input.entity_id.clone(),
                user_metadata: input.user_metadata.clone(),
                provider_metadata: input.provider_metadata.clone(),
                created_at: Utc::now(),
            }],
            ..Default::default()
        };
        identities.push(identity.clone());
        Ok(identity)
    }

    async fn find_by_id(&self, id: &str) -> Result<Option<AuthIdentity>> {
        if self.fail_lookups.load(Ordering::SeqCst) {
            return Err(store_down());
        }
        Ok(self.get(id).await)
    }

    async fn find_by_provider_entity(
        &self,
        provider: &str,
        entity_id: &str,
    ) -> Result<Option<AuthIdentity>> {
        Ok(self
            .identities
            .read()
            .await
            .iter()
            .find(|i| {
                i.provider_identities
                    .iter()
                    .any(|p| p.provider == provider && p.entity_id == entity_id)
            })
            .cloned())
    }

    async fn merge_app_metadata(&self, id: &str, partial: &Metadata) -> Result<()> {
        if self.fail_merge.load(Ordering::SeqCst) {
            return Err(store_down());
        }
        let mut identities = self.identities.write().await;
        let identity = identities
            .iter_mut()
            .find(|i| i.id == id)
            .ok_or_else(|| AppError::NotFound(format!("Auth identity {} not found", id)))?;
        for (key, value) in partial {
            identity.app_metadata.insert(key.clone(), value.clone());
        }
        identity.updated_at = Utc::now();
        Ok(())
    }
}

// ============================================================================
// Customers
// ============================================================================

pub struct TestCustomerRepository {
    customers: RwLock<Vec<Customer>>,
    addresses: RwLock<Vec<CustomerAddress>>,
    /// Inserted by a "concurrent writer" right before the next create
    racing_insert: RwLock<Option<Customer>>,
    fail_lookups: AtomicBool,
}

impl TestCustomerRepository {
    pub fn new() -> Self {
        Self {
            customers: RwLock::new(vec![]),
            addresses: RwLock::new(vec![]),
            racing_insert: RwLock::new(None),
            fail_lookups: AtomicBool::new(false),
        }
    }

    pub async fn add_customer(&self, customer: Customer) {
        self.customers.write().await.push(customer);
    }

    #[allow(dead_code)]
    pub async fn add_address(&self, address: CustomerAddress) {
        self.addresses.write().await.push(address);
    }

    pub async fn all(&self) -> Vec<Customer> {
        self.customers.read().await.clone()
    }

    /// Make the next `create` lose a race against `winner`
    pub async fn race_next_create(&self, winner: Customer) {
        *self.racing_insert.write().await = Some(winner);
    }

    pub fn set_fail_lookups(&self, fail: bool) {
        self.fail_lookups.store(fail, Ordering::SeqCst);
    }
}

impl Default for TestCustomerRepository {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CustomerRepository for TestCustomerRepository {
    async fn create(&self, input: &CreateCustomerInput) -> Result<Customer> {
        let mut customers = self.customers.write().await;

        if let Some(winner) = self.racing_insert.write().await.take() {
            customers.push(winner);
        }

        if customers.iter().any(|c| c.email == input.email) {
            return Err(AppError::Conflict(
                "Customer with this email already exists".to_string(),
            ));
        }

        let customer = Customer {
            id: format!("cus_{}", customers.len() + 1),
            email: input.email.clone(),
            has_account: input.has_account,
            ..Default::default()
        };
        customers.push(customer.clone());
        Ok(customer)
    }

    async fn find_by_id(&self, id: &str) -> Result<Option<Customer>> {
        Ok(self
            .customers
            .read()
            .await
            .iter()
            .find(|c| c.id == id)
            .cloned())
    }

    async fn list_by_email(&self, email: &str) -> Result<Vec<Customer>> {
        if self.fail_lookups.load(Ordering::SeqCst) {
            return Err(store_down());
        }
        Ok(self
            .customers
            .read()
            .await
            .iter()
            .filter(|c| c.email == email)
            .cloned()
            .collect())
    }

    async fn update(&self, id: &str, input: &UpdateCustomerInput) -> Result<Customer> {
        let mut customers = self.customers.write().await;
        let customer = customers
            .iter_mut()
            .find(|c| c.id == id)
            .ok_or_else(|| AppError::NotFound("Customer not found".to_string()))?;

        if let Some(first_name) = &input.first_name {
            customer.first_name = Some(first_name.clone());
        }
        if let Some(last_name) = &input.last_name {
            customer.last_name = Some(last_name.clone());
        }
        if let Some(phone) = &input.phone {
            customer.phone = Some(phone.clone());
        }
        if let Some(patch) = &input.metadata {
            for (key, value) in patch {
                if value.is_null() {
                    customer.metadata.remove(key);
                } else {
                    customer.metadata.insert(key.clone(), value.clone());
                }
            }
        }
        customer.updated_at = Utc::now();
        Ok(customer.clone())
    }

    async fn list_addresses(&self, customer_id: &str) -> Result<Vec<CustomerAddress>> {
        Ok(self
            .addresses
            .read()
            .await
            .iter()
            .filter(|a| a.customer_id == customer_id)
            .cloned()
            .collect())
    }
}

// ============================================================================
// Orders
// ============================================================================

pub struct TestOrderRepository {
    orders: RwLock<Vec<Order>>,
}

impl TestOrderRepository {
    pub fn new() -> Self {
        Self {
            orders: RwLock::new(vec![]),
        }
    }

    pub async fn add_order(&self, order: Order) {
        self.orders.write().await.push(order);
    }
}

impl Default for TestOrderRepository {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl OrderRepository for TestOrderRepository {
    async fn list_by_customer(
        &self,
        customer_id: &str,
        offset: i64,
        limit: i64,
    ) -> Result<Vec<Order>> {
        let mut orders: Vec<Order> = self
            .orders
            .read()
            .await
            .iter()
            .filter(|o| o.customer_id == customer_id)
            .cloned()
            .collect();
        orders.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(orders
            .into_iter()
            .skip(offset as usize)
            .take(limit as usize)
            .collect())
    }

    async fn count_by_customer(&self, customer_id: &str) -> Result<i64> {
        Ok(self
            .orders
            .read()
            .await
            .iter()
            .filter(|o| o.customer_id == customer_id)
            .count() as i64)
    }
}
