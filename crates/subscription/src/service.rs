//! Subscription checks and overrides against a store and billing provider.

use chrono::{DateTime, Utc};
use serde::{Serialize, Serializer};
use tracing::info;

use crate::admin::{apply_override, OverrideConfirmation, OverrideRequest};
use crate::billing::BillingProvider;
use crate::error::{Result, SubscriptionError};
use crate::reconcile::reconcile;
use crate::record::{format_timestamp, Plan, SubscriptionRecord};
use crate::store::SubscriptionStore;

/// An authenticated caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserIdentity {
    pub user_id: String,
    pub email: Option<String>,
}

/// The reply of a subscription check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SubscriptionCheck {
    pub subscribed: bool,
    pub subscription_tier: Plan,
    pub subscription_plan: Plan,
    #[serde(
        skip_serializing_if = "Option::is_none",
        serialize_with = "serialize_end"
    )]
    pub subscription_end: Option<DateTime<Utc>>,
}

fn serialize_end<S: Serializer>(end: &Option<DateTime<Utc>>, s: S) -> std::result::Result<S::Ok, S::Error> {
    match end {
        Some(ts) => s.serialize_str(&format_timestamp(ts)),
        None => s.serialize_none(),
    }
}

impl From<&SubscriptionRecord> for SubscriptionCheck {
    fn from(record: &SubscriptionRecord) -> Self {
        Self {
            subscribed: record.subscribed(),
            subscription_tier: record.plan,
            subscription_plan: record.plan,
            subscription_end: record.subscription_end,
        }
    }
}

/// Runs reconciliation and overrides.
pub struct SubscriptionService<B, S> {
    billing: B,
    store: S,
}

impl<B: BillingProvider, S: SubscriptionStore> SubscriptionService<B, S> {
    pub fn new(billing: B, store: S) -> Self {
        Self { billing, store }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Reconcile a user's stored state with the billing provider.
    ///
    /// A failed billing lookup leaves the stored state untouched.
    pub async fn check(&self, identity: &UserIdentity) -> Result<SubscriptionCheck> {
        let email = identity
            .email
            .as_deref()
            .filter(|email| !email.trim().is_empty())
            .ok_or(SubscriptionError::MissingField("email"))?;

        let current = self
            .store
            .load(&identity.user_id)
            .await?
            .unwrap_or_else(|| SubscriptionRecord::new(&identity.user_id))
            .with_email(email);

        let lookup = self.billing.lookup(email).await?;
        let outcome = reconcile(&lookup, &current);

        info!(
            "Reconciled subscription for {}: rule={}, plan={}, override={}",
            identity.user_id,
            outcome.rule.as_str(),
            outcome.next.plan,
            outcome.next.manual_override
        );

        self.store.save(&outcome.writes).await?;

        Ok(SubscriptionCheck::from(&outcome.next))
    }

    /// Force a user's plan.
    pub async fn set_override(&self, request: &OverrideRequest) -> Result<OverrideConfirmation> {
        request.validate()?;

        let current = self
            .store
            .load(&request.user_id)
            .await?
            .unwrap_or_else(|| SubscriptionRecord::new(&request.user_id));

        let (next, confirmation) = apply_override(&current, request);
        self.store.save(&next.projections()).await?;

        info!("{}", confirmation.message);
        Ok(confirmation)
    }

    /// The stored plan of a user, without contacting billing.
    pub async fn plan_for(&self, user_id: &str) -> Result<Plan> {
        Ok(self
            .store
            .load(user_id)
            .await?
            .map(|record| record.plan)
            .unwrap_or_default())
    }
}
