//! Customer profile and order history

use crate::domain::{CustomerWithAddresses, OrderList, UpdateCustomerInput};
use crate::error::{AppError, Result};
use crate::repository::{CustomerRepository, OrderRepository};
use std::sync::Arc;
use validator::Validate;

pub struct CustomerService<C: CustomerRepository, O: OrderRepository> {
    customers: Arc<C>,
    orders: Arc<O>,
}

impl<C: CustomerRepository, O: OrderRepository> CustomerService<C, O> {
    pub fn new(customers: Arc<C>, orders: Arc<O>) -> Self {
        Self { customers, orders }
    }

    pub async fn get_with_addresses(&self, id: &str) -> Result<CustomerWithAddresses> {
        let customer = self
            .customers
            .find_by_id(id)
            .await?
            .ok_or_else(|| AppError::NotFound("Customer not found".to_string()))?;
        let addresses = self.customers.list_addresses(&customer.id).await?;

        Ok(CustomerWithAddresses {
            customer,
            addresses,
        })
    }

    pub async fn update(&self, id: &str, input: UpdateCustomerInput) -> Result<CustomerWithAddresses> {
        input.validate()?;

        if !input.is_empty() {
            self.customers.update(id, &input).await?;
        }

        self.get_with_addresses(id).await
    }

    pub async fn list_orders(&self, customer_id: &str, offset: i64, limit: i64) -> Result<OrderList> {
        let orders = self
            .orders
            .list_by_customer(customer_id, offset, limit)
            .await?;
        let count = self.orders.count_by_customer(customer_id).await?;

        Ok(OrderList { orders, count })
    }
}
