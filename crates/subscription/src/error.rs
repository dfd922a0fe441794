//! Error types for subscription operations.

use thiserror::Error;

use crate::billing::BillingError;

/// Errors that can occur while checking or overriding a subscription.
#[derive(Debug, Error)]
pub enum SubscriptionError {
    /// A required input was missing or empty.
    #[error("{0} is required")]
    MissingField(&'static str),

    /// The billing lookup failed; no state was changed.
    #[error("billing lookup failed: {0}")]
    Billing(#[from] BillingError),

    /// Reading or writing the projections failed; no partial write was kept.
    #[error(transparent)]
    Database(#[from] database::DatabaseError),

    /// A stored row holds a value this service does not understand.
    #[error("invalid stored record: {0}")]
    InvalidRecord(String),
}

/// Result type for subscription operations.
pub type Result<T> = std::result::Result<T, SubscriptionError>;
