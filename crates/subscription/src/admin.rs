//! Administrator plan overrides.

use serde::{Deserialize, Serialize};

use crate::error::{Result, SubscriptionError};
use crate::record::{Plan, SubscriptionRecord, SubscriptionStatus};

/// A request to force a user's plan.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OverrideRequest {
    pub user_id: String,
    #[serde(default, rename = "subscriptionPlan")]
    pub plan: Option<Plan>,
    #[serde(default)]
    pub enable: Option<bool>,
}

impl OverrideRequest {
    pub fn new(user_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            plan: None,
            enable: None,
        }
    }

    pub fn with_plan(mut self, plan: Plan) -> Self {
        self.plan = Some(plan);
        self
    }

    pub fn with_enable(mut self, enable: bool) -> Self {
        self.enable = Some(enable);
        self
    }

    /// Defaults to Pro.
    pub fn plan(&self) -> Plan {
        self.plan.unwrap_or(Plan::Pro)
    }

    /// Defaults to true.
    pub fn enable(&self) -> bool {
        self.enable.unwrap_or(true)
    }

    pub fn validate(&self) -> Result<()> {
        if self.user_id.trim().is_empty() {
            return Err(SubscriptionError::MissingField("userId"));
        }
        Ok(())
    }
}

/// Reply sent back after an override was stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OverrideConfirmation {
    pub success: bool,
    pub message: String,
    pub subscription_plan: Plan,
    pub manual_override: bool,
}

impl OverrideConfirmation {
    fn new(request: &OverrideRequest) -> Self {
        let verb = if request.enable() {
            "upgraded"
        } else {
            "downgraded"
        };
        Self {
            success: true,
            message: format!(
                "User {} {} to {} with manual override",
                request.user_id,
                verb,
                request.plan()
            ),
            subscription_plan: request.plan(),
            manual_override: request.enable(),
        }
    }
}

/// Apply an override to the current record.
///
/// The plan and override flag are written unconditionally; billing fields
/// are left as they were.
pub fn apply_override(
    current: &SubscriptionRecord,
    request: &OverrideRequest,
) -> (SubscriptionRecord, OverrideConfirmation) {
    let next = SubscriptionRecord {
        plan: request.plan(),
        status: SubscriptionStatus::Active,
        manual_override: request.enable(),
        ..current.clone()
    };

    (next, OverrideConfirmation::new(request))
}
