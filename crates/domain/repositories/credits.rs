use anyhow::Result;
use async_trait::async_trait;
use mockall::automock;
use uuid::Uuid;

/// The user balance is owned by the store and only ever moves through its atomic increment.
#[automock]
#[async_trait]
pub trait CreditRepository {
    async fn add_user_credits(&self, user_id: Uuid, credits_to_add: i32) -> Result<()>;
}
