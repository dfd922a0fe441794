//! Subscription state for the assistant backend.
//!
//! A user's plan lives in two stored projections that must always agree.
//! [`SubscriptionService::check`] reconciles them with the billing provider;
//! [`SubscriptionService::set_override`] lets an administrator force a plan
//! that later checks preserve until billing reports an active subscription.
//!
//! # Example
//!
//! ```no_run
//! use database::Database;
//! use subscription::{StripeBilling, SubscriptionService, UserIdentity};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let db = Database::connect("sqlite:assistant.db?mode=rwc").await?;
//! db.migrate().await?;
//!
//! let service = SubscriptionService::new(StripeBilling::from_env()?, db);
//! let check = service
//!     .check(&UserIdentity {
//!         user_id: "u1".to_string(),
//!         email: Some("user@example.com".to_string()),
//!     })
//!     .await?;
//! println!("subscribed: {}", check.subscribed);
//! # Ok(())
//! # }
//! ```

pub mod admin;
pub mod billing;
pub mod error;
pub mod reconcile;
pub mod record;
pub mod service;
pub mod store;

pub use admin::{apply_override, OverrideConfirmation, OverrideRequest};
pub use billing::{BillingCustomer, BillingError, BillingProvider, StripeBilling, StripeConfig};
pub use error::{Result, SubscriptionError};
pub use reconcile::{reconcile, ActiveSubscription, BillingLookup, ReconcileRule, Reconciliation};
pub use record::{Plan, Projections, SubscriptionRecord, SubscriptionStatus};
pub use service::{SubscriptionCheck, SubscriptionService, UserIdentity};
pub use store::SubscriptionStore;
