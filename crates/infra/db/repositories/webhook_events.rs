use anyhow::Result;
use async_trait::async_trait;
use chrono::Utc;
use diesel::{OptionalExtension, RunQueryDsl, insert_into, prelude::*, upsert::excluded};
use std::sync::Arc;

use crate::{
    domain,
    infra::db::postgres::{postgres_connection::PgPoolSquad, schema::webhook_events},
};
use domain::{
    entities::webhook_events::{InsertWebhookEventEntity, WebhookEventEntity},
    repositories::webhook_events::WebhookEventRepository,
};

pub struct WebhookEventPostgres {
    db_pool: Arc<PgPoolSquad>,
}

impl WebhookEventPostgres {
    pub fn new(db_pool: Arc<PgPoolSquad>) -> Self {
        Self { db_pool }
    }
}

#[async_trait]
impl WebhookEventRepository for WebhookEventPostgres {
    async fn find_by_event_id(&self, event_id: &str) -> Result<Option<WebhookEventEntity>> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        let result = webhook_events::table
            .filter(webhook_events::event_id.eq(event_id))
            .select(WebhookEventEntity::as_select())
            .first::<WebhookEventEntity>(&mut conn)
            .optional()?;

        Ok(result)
    }

    async fn record_event(&self, event: InsertWebhookEventEntity) -> Result<()> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        insert_into(webhook_events::table)
            .values(&event)
            .on_conflict(webhook_events::event_id)
            .do_update()
            .set((
                webhook_events::processed.eq(excluded(webhook_events::processed)),
                webhook_events::error.eq(excluded(webhook_events::error)),
                webhook_events::payload.eq(excluded(webhook_events::payload)),
                webhook_events::updated_at.eq(Utc::now()),
            ))
            .execute(&mut conn)?;

        Ok(())
    }
}
