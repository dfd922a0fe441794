//! Persistence seam for subscription records.

use async_trait::async_trait;
use database::{subscription, Database};

use crate::error::Result;
use crate::record::{Projections, SubscriptionRecord};

/// Storage for subscription records.
///
/// `save` must write both projections atomically: either both rows change
/// or neither does.
#[async_trait]
pub trait SubscriptionStore: Send + Sync {
    async fn load(&self, user_id: &str) -> Result<Option<SubscriptionRecord>>;

    async fn save(&self, projections: &Projections) -> Result<()>;
}

#[async_trait]
impl SubscriptionStore for Database {
    async fn load(&self, user_id: &str) -> Result<Option<SubscriptionRecord>> {
        let profile = subscription::get_profile(self.pool(), user_id).await?;
        let subscriber = subscription::get_subscriber(self.pool(), user_id).await?;
        SubscriptionRecord::from_rows(profile, subscriber)
    }

    async fn save(&self, projections: &Projections) -> Result<()> {
        subscription::upsert_projections(self.pool(), &projections.profile, &projections.subscriber)
            .await?;
        Ok(())
    }
}
