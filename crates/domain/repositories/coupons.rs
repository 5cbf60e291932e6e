use anyhow::Result;
use async_trait::async_trait;
use mockall::automock;
use uuid::Uuid;

use crate::domain::value_objects::coupons::{CouponRedemption, CouponValidation};

#[automock]
#[async_trait]
pub trait CouponRepository {
    async fn validate_coupon(
        &self,
        code: &str,
        user_id: Uuid,
        amount: i32,
    ) -> Result<CouponValidation>;

    async fn apply_coupon(&self, redemption: CouponRedemption) -> Result<()>;
}
