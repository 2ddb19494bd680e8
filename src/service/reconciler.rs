//! Auth identity to customer reconciliation
//!
//! Runs for every `auth.identity.created` event and makes sure an `emailpass`
//! identity ends up linked to exactly one customer through
//! `app_metadata.customer_id`. Safe to run any number of times for the same
//! identity: the email lookup happens before any customer is created, and the
//! unique index on `customers.email` turns a lost race into a `Conflict` that
//! the next delivery resolves through the same lookup.

use crate::domain::{
    CreateCustomerInput, IdentityCreatedEvent, Metadata, CUSTOMER_ID_KEY, EMAILPASS_PROVIDER,
};
use crate::error::Result;
use crate::repository::{AuthIdentityRepository, CustomerRepository};
use metrics::{counter, histogram};
use std::sync::Arc;
use std::time::Instant;
use tracing::{error, info, warn};

/// Terminal result of one reconciliation run
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReconcileOutcome {
    /// Not an `emailpass` identity; nothing was read or written
    Skipped { provider: String },
    /// The identity was deleted before the event was handled
    IdentityNotFound,
    /// No usable email on the first provider identity
    EmailMissing,
    /// `app_metadata.customer_id` now points at `customer_id`
    Linked { customer_id: String, created: bool },
}

impl ReconcileOutcome {
    pub fn label(&self) -> &'static str {
        match self {
            ReconcileOutcome::Skipped { .. } => "skipped",
            ReconcileOutcome::IdentityNotFound => "identity_not_found",
            ReconcileOutcome::EmailMissing => "email_missing",
            ReconcileOutcome::Linked { created: true, .. } => "created",
            ReconcileOutcome::Linked { created: false, .. } => "reused",
        }
    }
}

pub struct IdentityReconciler<I: AuthIdentityRepository, C: CustomerRepository> {
    identities: Arc<I>,
    customers: Arc<C>,
}

impl<I: AuthIdentityRepository, C: CustomerRepository> IdentityReconciler<I, C> {
    pub fn new(identities: Arc<I>, customers: Arc<C>) -> Self {
        Self {
            identities,
            customers,
        }
    }

    /// Handle an `auth.identity.created` event.
    ///
    /// Terminal conditions come back as `Ok` outcomes. Store failures are
    /// returned as errors so the delivering side retries.
    pub async fn handle(&self, event: &IdentityCreatedEvent) -> Result<ReconcileOutcome> {
        let started = Instant::now();
        let result = self.reconcile(event).await;

        let outcome_label = match &result {
            Ok(outcome) => outcome.label(),
            Err(_) => "error",
        };
        counter!("storefront_identity_reconcile_total", "outcome" => outcome_label).increment(1);
        histogram!("storefront_identity_reconcile_duration_seconds")
            .record(started.elapsed().as_secs_f64());

        if let Err(e) = &result {
            warn!(
                auth_identity_id = %event.id,
                error = %e,
                "Identity reconciliation failed, delivery should be retried"
            );
        }

        result
    }

    async fn reconcile(&self, event: &IdentityCreatedEvent) -> Result<ReconcileOutcome> {
        if event.provider != EMAILPASS_PROVIDER {
            return Ok(ReconcileOutcome::Skipped {
                provider: event.provider.clone(),
            });
        }

        let Some(identity) = self.identities.find_by_id(&event.id).await? else {
            warn!(auth_identity_id = %event.id, "Auth identity not found, skipping reconciliation");
            return Ok(ReconcileOutcome::IdentityNotFound);
        };

        let Some(email) = identity.resolve_email() else {
            error!(
                auth_identity_id = %identity.id,
                "No email found on auth identity, cannot link a customer"
            );
            return Ok(ReconcileOutcome::EmailMissing);
        };

        // The store may compare with a padding collation; only a byte-exact
        // email counts as a match
        let existing = self.customers.list_by_email(email).await?;
        let (customer_id, created) = match existing.into_iter().find(|c| c.email == email) {
            Some(customer) => (customer.id, false),
            None => {
                let customer = self
                    .customers
                    .create(&CreateCustomerInput {
                        email: email.to_string(),
                        has_account: true,
                    })
                    .await?;
                (customer.id, true)
            }
        };

        let mut patch = Metadata::new();
        patch.insert(
            CUSTOMER_ID_KEY.to_string(),
            serde_json::Value::String(customer_id.clone()),
        );
        self.identities
            .merge_app_metadata(&identity.id, &patch)
            .await?;

        info!(
            auth_identity_id = %identity.id,
            customer_id = %customer_id,
            created,
            "Linked auth identity to customer"
        );

        Ok(ReconcileOutcome::Linked {
            customer_id,
            created,
        })
    }
}
