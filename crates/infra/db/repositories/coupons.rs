use anyhow::{Context, Result};
use async_trait::async_trait;
use diesel::{
    QueryableByName, RunQueryDsl, sql_query,
    sql_types::{Bool, Integer, Nullable, Text, Uuid as SqlUuid},
};
use std::sync::Arc;
use uuid::Uuid;

use crate::{
    domain::{
        repositories::coupons::CouponRepository,
        value_objects::coupons::{CouponRedemption, CouponValidation},
    },
    infra::db::postgres::postgres_connection::PgPoolSquad,
};

#[derive(Debug, QueryableByName)]
struct CouponValidationRow {
    #[diesel(sql_type = Bool)]
    is_valid: bool,
    #[diesel(sql_type = Nullable<Integer>)]
    discount_amount: Option<i32>,
    #[diesel(sql_type = Nullable<SqlUuid>)]
    coupon_id: Option<Uuid>,
    #[diesel(sql_type = Nullable<Text>)]
    error_message: Option<String>,
}

impl From<CouponValidationRow> for CouponValidation {
    fn from(row: CouponValidationRow) -> Self {
        Self {
            is_valid: row.is_valid,
            discount_amount: row.discount_amount.unwrap_or(0),
            coupon_id: row.coupon_id,
            error_message: row.error_message,
        }
    }
}

pub struct CouponPostgres {
    db_pool: Arc<PgPoolSquad>,
}

impl CouponPostgres {
    pub fn new(db_pool: Arc<PgPoolSquad>) -> Self {
        Self { db_pool }
    }
}

#[async_trait]
impl CouponRepository for CouponPostgres {
    async fn validate_coupon(
        &self,
        code: &str,
        user_id: Uuid,
        amount: i32,
    ) -> Result<CouponValidation> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        let row = sql_query(
            "SELECT is_valid, discount_amount, coupon_id, error_message \
             FROM validate_coupon($1, $2, $3)",
        )
        .bind::<Text, _>(code)
        .bind::<SqlUuid, _>(user_id)
        .bind::<Integer, _>(amount)
        .get_result::<CouponValidationRow>(&mut conn)
        .context("validate_coupon returned no row")?;

        Ok(row.into())
    }

    async fn apply_coupon(&self, redemption: CouponRedemption) -> Result<()> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        sql_query("SELECT apply_coupon($1, $2, $3, $4, $5)")
            .bind::<SqlUuid, _>(redemption.coupon_id)
            .bind::<SqlUuid, _>(redemption.user_id)
            .bind::<Text, _>(redemption.payment_id)
            .bind::<Integer, _>(redemption.original_amount)
            .bind::<Integer, _>(redemption.discount_amount)
            .execute(&mut conn)?;

        Ok(())
    }
}
