use chrono::{DateTime, Utc};
use diesel::prelude::*;

use crate::infra::db::postgres::schema::webhook_events;

#[derive(Debug, Clone, PartialEq, Identifiable, Selectable, Queryable)]
#[diesel(table_name = webhook_events, primary_key(event_id))]
pub struct WebhookEventEntity {
    pub event_id: String,
    pub event_type: String,
    pub processed: bool,
    pub payload: serde_json::Value,
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Insertable)]
#[diesel(table_name = webhook_events)]
pub struct InsertWebhookEventEntity {
    pub event_id: String,
    pub event_type: String,
    pub processed: bool,
    pub payload: serde_json::Value,
    pub error: Option<String>,
}
