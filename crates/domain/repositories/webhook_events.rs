use anyhow::Result;
use async_trait::async_trait;
use mockall::automock;

use crate::domain::entities::webhook_events::{InsertWebhookEventEntity, WebhookEventEntity};

#[automock]
#[async_trait]
pub trait WebhookEventRepository {
    async fn find_by_event_id(&self, event_id: &str) -> Result<Option<WebhookEventEntity>>;

    /// Upserts on `event_id`: one row per provider event, latest outcome wins.
    async fn record_event(&self, event: InsertWebhookEventEntity) -> Result<()>;
}
