//! Profile and subscriber storage.
//!
//! The two rows describe the same subscription and are only ever written
//! together, inside one transaction.

use sqlx::SqlitePool;

use crate::models::{Profile, ProfileUpdate, Subscriber, SubscriberUpdate};
use crate::Result;

/// Get a user's profile row.
pub async fn get_profile(pool: &SqlitePool, user_id: &str) -> Result<Option<Profile>> {
    let record = sqlx::query_as::<_, Profile>(
        r#"
        SELECT user_id, subscription_plan, subscription_status, subscription_end_date,
               billing_customer_id, manual_override, created_at, updated_at
        FROM profiles
        WHERE user_id = ?
        "#,
    )
    .bind(user_id)
    .fetch_optional(pool)
    .await?;

    Ok(record)
}

/// Get a user's subscriber row.
pub async fn get_subscriber(pool: &SqlitePool, user_id: &str) -> Result<Option<Subscriber>> {
    let record = sqlx::query_as::<_, Subscriber>(
        r#"
        SELECT user_id, email, billing_customer_id, subscribed, subscription_tier,
               subscription_end, manual_override, updated_at
        FROM subscribers
        WHERE user_id = ?
        "#,
    )
    .bind(user_id)
    .fetch_optional(pool)
    .await?;

    Ok(record)
}

/// Upsert both projections of one user atomically.
///
/// Either both rows are written or neither is.
pub async fn upsert_projections(
    pool: &SqlitePool,
    profile: &ProfileUpdate,
    subscriber: &SubscriberUpdate,
) -> Result<()> {
    let mut tx = pool.begin().await?;

    sqlx::query(
        r#"
        INSERT INTO profiles (
            user_id, subscription_plan, subscription_status, subscription_end_date,
            billing_customer_id, manual_override
        )
        VALUES (?, ?, ?, ?, ?, ?)
        ON CONFLICT(user_id) DO UPDATE SET
            subscription_plan = excluded.subscription_plan,
            subscription_status = excluded.subscription_status,
            subscription_end_date = excluded.subscription_end_date,
            billing_customer_id = excluded.billing_customer_id,
            manual_override = excluded.manual_override,
            updated_at = datetime('now')
        "#,
    )
    .bind(&profile.user_id)
    .bind(&profile.subscription_plan)
    .bind(&profile.subscription_status)
    .bind(&profile.subscription_end_date)
    .bind(&profile.billing_customer_id)
    .bind(profile.manual_override)
    .execute(&mut *tx)
    .await?;

    sqlx::query(
        r#"
        INSERT INTO subscribers (
            user_id, email, billing_customer_id, subscribed, subscription_tier,
            subscription_end, manual_override
        )
        VALUES (?, ?, ?, ?, ?, ?, ?)
        ON CONFLICT(user_id) DO UPDATE SET
            email = COALESCE(excluded.email, subscribers.email),
            billing_customer_id = excluded.billing_customer_id,
            subscribed = excluded.subscribed,
            subscription_tier = excluded.subscription_tier,
            subscription_end = excluded.subscription_end,
            manual_override = excluded.manual_override,
            updated_at = datetime('now')
        "#,
    )
    .bind(&subscriber.user_id)
    .bind(&subscriber.email)
    .bind(&subscriber.billing_customer_id)
    .bind(subscriber.subscribed)
    .bind(&subscriber.subscription_tier)
    .bind(&subscriber.subscription_end)
    .bind(subscriber.manual_override)
    .execute(&mut *tx)
    .await?;

    tx.commit().await?;

    tracing::debug!(
        "Updated subscription projections for {}: plan={}, override={}",
        profile.user_id,
        profile.subscription_plan,
        profile.manual_override
    );

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Database;

    async fn test_db() -> Database {
        let db = Database::connect_with_pool_size("sqlite::memory:", 1)
            .await
            .unwrap();
        db.migrate().await.unwrap();
        db
    }

    fn pro_profile(user_id: &str) -> ProfileUpdate {
        ProfileUpdate {
            user_id: user_id.to_string(),
            subscription_plan: "pro".to_string(),
            subscription_status: "active".to_string(),
            subscription_end_date: Some("2030-01-01T00:00:00+00:00".to_string()),
            billing_customer_id: Some("cus_123".to_string()),
            manual_override: false,
        }
    }

    fn pro_subscriber(user_id: &str) -> SubscriberUpdate {
        SubscriberUpdate {
            user_id: user_id.to_string(),
            email: Some("user@example.com".to_string()),
            billing_customer_id: Some("cus_123".to_string()),
            subscribed: true,
            subscription_tier: "pro".to_string(),
            subscription_end: Some("2030-01-01T00:00:00+00:00".to_string()),
            manual_override: false,
        }
    }

    #[tokio::test]
    async fn test_get_missing_rows() {
        let db = test_db().await;
        assert!(get_profile(db.pool(), "nobody").await.unwrap().is_none());
        assert!(get_subscriber(db.pool(), "nobody").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_upsert_creates_both_rows() {
        let db = test_db().await;

        upsert_projections(db.pool(), &pro_profile("u1"), &pro_subscriber("u1"))
            .await
            .unwrap();

        let profile = get_profile(db.pool(), "u1").await.unwrap().unwrap();
        assert_eq!(profile.subscription_plan, "pro");
        assert_eq!(profile.billing_customer_id, Some("cus_123".to_string()));
        assert!(!profile.manual_override);

        let subscriber = get_subscriber(db.pool(), "u1").await.unwrap().unwrap();
        assert!(subscriber.subscribed);
        assert_eq!(subscriber.email, Some("user@example.com".to_string()));
    }

    #[tokio::test]
    async fn test_upsert_keeps_email_when_absent() {
        let db = test_db().await;

        upsert_projections(db.pool(), &pro_profile("u1"), &pro_subscriber("u1"))
            .await
            .unwrap();

        let subscriber = SubscriberUpdate {
            email: None,
            subscribed: false,
            subscription_tier: "free".to_string(),
            ..pro_subscriber("u1")
        };
        let profile = ProfileUpdate {
            subscription_plan: "free".to_string(),
            ..pro_profile("u1")
        };
        upsert_projections(db.pool(), &profile, &subscriber)
            .await
            .unwrap();

        let stored = get_subscriber(db.pool(), "u1").await.unwrap().unwrap();
        assert_eq!(stored.email, Some("user@example.com".to_string()));
        assert_eq!(stored.subscription_tier, "free");
        assert!(!stored.subscribed);
    }

    #[tokio::test]
    async fn test_failed_second_write_rolls_back_first() {
        let db = test_db().await;

        upsert_projections(db.pool(), &pro_profile("u1"), &pro_subscriber("u1"))
            .await
            .unwrap();

        let profile = ProfileUpdate {
            subscription_plan: "free".to_string(),
            manual_override: true,
            ..pro_profile("u1")
        };
        let invalid_subscriber = SubscriberUpdate {
            subscription_tier: "platinum".to_string(),
            ..pro_subscriber("u1")
        };

        let result = upsert_projections(db.pool(), &profile, &invalid_subscriber).await;
        assert!(result.is_err());

        let stored = get_profile(db.pool(), "u1").await.unwrap().unwrap();
        assert_eq!(stored.subscription_plan, "pro");
        assert!(!stored.manual_override);
    }
}
