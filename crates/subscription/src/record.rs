//! The subscription record and its two stored projections.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, SecondsFormat, Utc};
use database::{Profile, ProfileUpdate, Subscriber, SubscriberUpdate};
use serde::{Deserialize, Serialize};

use crate::error::SubscriptionError;

/// Subscription plan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Plan {
    #[default]
    Free,
    Pro,
}

impl Plan {
    pub fn as_str(&self) -> &'static str {
        match self {
            Plan::Free => "free",
            Plan::Pro => "pro",
        }
    }
}

impl fmt::Display for Plan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Plan {
    type Err = SubscriptionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "free" => Ok(Plan::Free),
            "pro" => Ok(Plan::Pro),
            other => Err(SubscriptionError::InvalidRecord(format!(
                "unknown plan: {other}"
            ))),
        }
    }
}

/// Status of the subscription as last reconciled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SubscriptionStatus {
    #[default]
    Active,
    Cancelled,
}

impl SubscriptionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SubscriptionStatus::Active => "active",
            SubscriptionStatus::Cancelled => "cancelled",
        }
    }
}

impl FromStr for SubscriptionStatus {
    type Err = SubscriptionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "active" => Ok(SubscriptionStatus::Active),
            "cancelled" => Ok(SubscriptionStatus::Cancelled),
            other => Err(SubscriptionError::InvalidRecord(format!(
                "unknown subscription status: {other}"
            ))),
        }
    }
}

/// One user's subscription state.
///
/// `subscribed` is not stored here; it is always derived from the plan so
/// the two projections can never disagree about it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubscriptionRecord {
    pub user_id: String,
    pub email: Option<String>,
    pub plan: Plan,
    pub status: SubscriptionStatus,
    pub subscription_end: Option<DateTime<Utc>>,
    pub billing_customer_id: Option<String>,
    pub manual_override: bool,
}

impl SubscriptionRecord {
    /// The record of a user who has never been reconciled.
    pub fn new(user_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            email: None,
            plan: Plan::Free,
            status: SubscriptionStatus::Active,
            subscription_end: None,
            billing_customer_id: None,
            manual_override: false,
        }
    }

    pub fn with_email(mut self, email: impl Into<String>) -> Self {
        self.email = Some(email.into());
        self
    }

    /// Whether the user has the paid tier.
    pub fn subscribed(&self) -> bool {
        self.plan == Plan::Pro
    }

    /// Rebuild the record from stored rows.
    ///
    /// The profile row is authoritative; the subscriber row only
    /// contributes the email. Returns `None` when neither row exists.
    pub fn from_rows(
        profile: Option<Profile>,
        subscriber: Option<Subscriber>,
    ) -> Result<Option<Self>, SubscriptionError> {
        let email = subscriber.as_ref().and_then(|s| s.email.clone());

        match (profile, subscriber) {
            (Some(profile), _) => Ok(Some(Self {
                user_id: profile.user_id,
                email,
                plan: profile.subscription_plan.parse()?,
                status: profile.subscription_status.parse()?,
                subscription_end: parse_timestamp(profile.subscription_end_date.as_deref())?,
                billing_customer_id: profile.billing_customer_id,
                manual_override: profile.manual_override,
            })),
            (None, Some(subscriber)) => Ok(Some(Self {
                user_id: subscriber.user_id,
                email,
                plan: subscriber.subscription_tier.parse()?,
                status: SubscriptionStatus::Active,
                subscription_end: parse_timestamp(subscriber.subscription_end.as_deref())?,
                billing_customer_id: subscriber.billing_customer_id,
                manual_override: subscriber.manual_override,
            })),
            (None, None) => Ok(None),
        }
    }

    /// Both rows that mirror this record.
    pub fn projections(&self) -> Projections {
        let end = self.subscription_end.as_ref().map(format_timestamp);

        Projections {
            profile: ProfileUpdate {
                user_id: self.user_id.clone(),
                subscription_plan: self.plan.as_str().to_string(),
                subscription_status: self.status.as_str().to_string(),
                subscription_end_date: end.clone(),
                billing_customer_id: self.billing_customer_id.clone(),
                manual_override: self.manual_override,
            },
            subscriber: SubscriberUpdate {
                user_id: self.user_id.clone(),
                email: self.email.clone(),
                billing_customer_id: self.billing_customer_id.clone(),
                subscribed: self.subscribed(),
                subscription_tier: self.plan.as_str().to_string(),
                subscription_end: end,
                manual_override: self.manual_override,
            },
        }
    }
}

/// The pair of row writes that must land together.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Projections {
    pub profile: ProfileUpdate,
    pub subscriber: SubscriberUpdate,
}

/// ISO-8601 with millisecond precision and a `Z` suffix.
pub fn format_timestamp(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Millis, true)
}

fn parse_timestamp(value: Option<&str>) -> Result<Option<DateTime<Utc>>, SubscriptionError> {
    value
        .map(|raw| {
            DateTime::parse_from_rfc3339(raw)
                .map(|ts| ts.with_timezone(&Utc))
                .map_err(|e| SubscriptionError::InvalidRecord(format!("bad timestamp {raw}: {e}")))
        })
        .transpose()
}
