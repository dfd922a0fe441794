//! Database models.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// The profile projection of a user's subscription.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct Profile {
    /// User identifier from the identity provider.
    pub user_id: String,
    /// "free" or "pro".
    pub subscription_plan: String,
    /// "active" or "cancelled".
    pub subscription_status: String,
    /// End of the current billing period (RFC 3339), if billed.
    pub subscription_end_date: Option<String>,
    /// Billing-provider customer id, if one exists.
    pub billing_customer_id: Option<String>,
    /// Plan was set by an administrator.
    pub manual_override: bool,
    /// When the profile was created.
    pub created_at: String,
    /// When the profile was last updated.
    pub updated_at: String,
}

/// The subscriber projection of a user's subscription.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct Subscriber {
    /// User identifier from the identity provider.
    pub user_id: String,
    /// Email used for billing-provider lookups.
    pub email: Option<String>,
    /// Billing-provider customer id, if one exists.
    pub billing_customer_id: Option<String>,
    /// Whether the user currently has the paid tier.
    pub subscribed: bool,
    /// "free" or "pro".
    pub subscription_tier: String,
    /// End of the current billing period (RFC 3339), if billed.
    pub subscription_end: Option<String>,
    /// Plan was set by an administrator.
    pub manual_override: bool,
    /// When the row was last updated.
    pub updated_at: String,
}

/// Values written to a user's profile row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProfileUpdate {
    pub user_id: String,
    pub subscription_plan: String,
    pub subscription_status: String,
    pub subscription_end_date: Option<String>,
    pub billing_customer_id: Option<String>,
    pub manual_override: bool,
}

/// Values written to a user's subscriber row.
///
/// A `None` email keeps the stored one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubscriberUpdate {
    pub user_id: String,
    pub email: Option<String>,
    pub billing_customer_id: Option<String>,
    pub subscribed: bool,
    pub subscription_tier: String,
    pub subscription_end: Option<String>,
    pub manual_override: bool,
}
