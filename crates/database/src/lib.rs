//! SQLite persistence for subscription state.
//!
//! This crate stores the two mirrored projections of a user's subscription,
//! `profiles` and `subscribers`, using SQLx with SQLite. Both rows of a user
//! are always written in a single transaction.
//!
//! # Example
//!
//! ```no_run
//! use database::{subscription, Database, ProfileUpdate, SubscriberUpdate};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // Connect and run migrations
//!     let db = Database::connect("sqlite:assistant.db?mode=rwc").await?;
//!     db.migrate().await?;
//!
//!     let profile = ProfileUpdate {
//!         user_id: "c27fb365-0c84-4cf2-8555-814bb065e448".to_string(),
//!         subscription_plan: "free".to_string(),
//!         subscription_status: "active".to_string(),
//!         subscription_end_date: None,
//!         billing_customer_id: None,
//!         manual_override: false,
//!     };
//!     let subscriber = SubscriberUpdate {
//!         user_id: profile.user_id.clone(),
//!         email: Some("user@example.com".to_string()),
//!         billing_customer_id: None,
//!         subscribed: false,
//!         subscription_tier: "free".to_string(),
//!         subscription_end: None,
//!         manual_override: false,
//!     };
//!     subscription::upsert_projections(db.pool(), &profile, &subscriber).await?;
//!
//!     Ok(())
//! }
//! ```

pub mod error;
pub mod models;
pub mod subscription;

pub use error::{DatabaseError, Result};
pub use models::{Profile, ProfileUpdate, Subscriber, SubscriberUpdate};

use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::SqlitePool;
use std::str::FromStr;

/// Database connection wrapper.
#[derive(Debug, Clone)]
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    /// Default pool size for database connections.
    const DEFAULT_POOL_SIZE: u32 = 10;

    /// Connect to a SQLite database.
    ///
    /// The URL should be in the format `sqlite:path/to/db.sqlite?mode=rwc`.
    /// Use `?mode=rwc` to create the database file if it doesn't exist.
    ///
    /// # Example
    ///
    /// ```no_run
    /// # async fn example() -> database::Result<()> {
    /// let db = database::Database::connect("sqlite:data/assistant.db?mode=rwc").await?;
    /// # Ok(())
    /// # }
    /// ```
    pub async fn connect(url: &str) -> Result<Self> {
        Self::connect_with_pool_size(url, Self::DEFAULT_POOL_SIZE).await
    }

    /// Connect to a SQLite database with a custom pool size.
    ///
    /// In-memory databases are per connection, so tests use a pool size of 1.
    pub async fn connect_with_pool_size(url: &str, pool_size: u32) -> Result<Self> {
        let options = SqliteConnectOptions::from_str(url)?
            .create_if_missing(true)
            .foreign_keys(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(pool_size)
            .acquire_timeout(std::time::Duration::from_secs(30))
            .connect_with(options)
            .await?;

        tracing::info!(
            "Connected to database: {} (pool size: {})",
            url,
            pool_size
        );

        Ok(Self { pool })
    }

    /// Run database migrations.
    ///
    /// This should be called once after connecting to ensure the schema is up to date.
    pub async fn migrate(&self) -> Result<()> {
        tracing::info!("Running database migrations...");

        sqlx::migrate!("./migrations").run(&self.pool).await?;

        tracing::info!("Migrations complete");
        Ok(())
    }

    /// Get a reference to the connection pool.
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Close the database connection pool.
    pub async fn close(&self) {
        self.pool.close().await;
    }
}
