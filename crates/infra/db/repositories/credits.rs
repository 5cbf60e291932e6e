use anyhow::Result;
use async_trait::async_trait;
use diesel::{
    RunQueryDsl, sql_query,
    sql_types::{Integer, Uuid as SqlUuid},
};
use std::sync::Arc;
use uuid::Uuid;

use crate::{
    domain::repositories::credits::CreditRepository,
    infra::db::postgres::postgres_connection::PgPoolSquad,
};

pub struct CreditPostgres {
    db_pool: Arc<PgPoolSquad>,
}

impl CreditPostgres {
    pub fn new(db_pool: Arc<PgPoolSquad>) -> Self {
        Self { db_pool }
    }
}

#[async_trait]
impl CreditRepository for CreditPostgres {
    async fn add_user_credits(&self, user_id: Uuid, credits_to_add: i32) -> Result<()> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        // The increment happens inside the procedure as `credits = credits + delta`.
        sql_query("SELECT add_user_credits($1, $2)")
            .bind::<SqlUuid, _>(user_id)
            .bind::<Integer, _>(credits_to_add)
            .execute(&mut conn)?;

        Ok(())
    }
}
