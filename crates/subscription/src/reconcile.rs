//! Pure reconciliation of stored state against the billing provider.
//!
//! Rules are checked in order and the first match wins:
//!
//! 1. Pro with a manual override and no active billing subscription keeps
//!    Pro and the override. Billing id and end date are cleared.
//! 2. No billing customer and not Pro becomes Free without an override.
//! 3. No billing customer but Pro (without override) keeps Pro.
//! 4. A billing customer is authoritative: Pro with the period end when a
//!    subscription is active, Free and cancelled otherwise. Both clear the
//!    override.

use chrono::{DateTime, Utc};

use crate::record::{Plan, Projections, SubscriptionRecord, SubscriptionStatus};

/// An active subscription at the billing provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActiveSubscription {
    pub id: String,
    pub current_period_end: DateTime<Utc>,
}

/// What the billing provider knows about an email.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BillingLookup {
    NoCustomer,
    Customer {
        id: String,
        active: Option<ActiveSubscription>,
    },
}

impl BillingLookup {
    pub fn active_subscription(&self) -> Option<&ActiveSubscription> {
        match self {
            BillingLookup::NoCustomer => None,
            BillingLookup::Customer { active, .. } => active.as_ref(),
        }
    }
}

/// Which rule produced a reconciliation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconcileRule {
    PreserveManualOverride,
    NoCustomerFree,
    PreserveUnbilledPro,
    ActiveSubscription,
    NoActiveSubscription,
}

impl ReconcileRule {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReconcileRule::PreserveManualOverride => "preserve_manual_override",
            ReconcileRule::NoCustomerFree => "no_customer_free",
            ReconcileRule::PreserveUnbilledPro => "preserve_unbilled_pro",
            ReconcileRule::ActiveSubscription => "active_subscription",
            ReconcileRule::NoActiveSubscription => "no_active_subscription",
        }
    }
}

/// The outcome of one reconciliation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reconciliation {
    pub next: SubscriptionRecord,
    pub writes: Projections,
    pub rule: ReconcileRule,
}

/// Decide the next subscription state. Performs no I/O.
pub fn reconcile(lookup: &BillingLookup, current: &SubscriptionRecord) -> Reconciliation {
    let has_active = lookup.active_subscription().is_some();

    let (rule, next) = if current.plan == Plan::Pro && current.manual_override && !has_active {
        (
            ReconcileRule::PreserveManualOverride,
            SubscriptionRecord {
                plan: Plan::Pro,
                status: SubscriptionStatus::Active,
                subscription_end: None,
                billing_customer_id: None,
                manual_override: true,
                ..current.clone()
            },
        )
    } else {
        match lookup {
            BillingLookup::NoCustomer if current.plan != Plan::Pro => (
                ReconcileRule::NoCustomerFree,
                SubscriptionRecord {
                    plan: Plan::Free,
                    status: SubscriptionStatus::Active,
                    subscription_end: None,
                    billing_customer_id: None,
                    manual_override: false,
                    ..current.clone()
                },
            ),
            BillingLookup::NoCustomer => (
                ReconcileRule::PreserveUnbilledPro,
                SubscriptionRecord {
                    plan: Plan::Pro,
                    status: SubscriptionStatus::Active,
                    subscription_end: None,
                    billing_customer_id: None,
                    manual_override: false,
                    ..current.clone()
                },
            ),
            BillingLookup::Customer {
                id,
                active: Some(subscription),
            } => (
                ReconcileRule::ActiveSubscription,
                SubscriptionRecord {
                    plan: Plan::Pro,
                    status: SubscriptionStatus::Active,
                    subscription_end: Some(subscription.current_period_end),
                    billing_customer_id: Some(id.clone()),
                    manual_override: false,
                    ..current.clone()
                },
            ),
            BillingLookup::Customer { id, active: None } => (
                ReconcileRule::NoActiveSubscription,
                SubscriptionRecord {
                    plan: Plan::Free,
                    status: SubscriptionStatus::Cancelled,
                    subscription_end: None,
                    billing_customer_id: Some(id.clone()),
                    manual_override: false,
                    ..current.clone()
                },
            ),
        }
    };

    let writes = next.projections();
    Reconciliation { next, writes, rule }
}
