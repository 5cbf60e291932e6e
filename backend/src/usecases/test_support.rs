//! In-memory store and Stripe double shared by the use case tests.

use std::{
    collections::HashMap,
    sync::{
        Mutex,
        atomic::{AtomicUsize, Ordering},
    },
};

use anyhow::{Result, anyhow, bail};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use crates::{
    domain::{
        entities::{
            transactions::{InsertTransactionEntity, TransactionEntity},
            webhook_events::{InsertWebhookEventEntity, WebhookEventEntity},
        },
        repositories::{
            coupons::CouponRepository, credits::CreditRepository,
            transactions::TransactionRepository, webhook_events::WebhookEventRepository,
        },
        value_objects::{
            coupons::{CouponRedemption, CouponValidation},
            enums::transaction_statuses::TransactionStatus,
        },
    },
    payments::stripe_client::{
        CheckoutSessionRequest, CreatedCheckoutSession, StripeCheckoutSession, StripeEvent,
        WebhookSignatureError, compute_signature, construct_event,
    },
};
use uuid::Uuid;

use crate::usecases::stripe_gateway::StripeGateway;

pub const WEBHOOK_SECRET: &str = "whsec_test_secret";

#[derive(Debug, Clone)]
struct StoredCoupon {
    id: Uuid,
    discount_amount: i32,
    usage_limit: Option<i32>,
    usage_count: i32,
}

#[derive(Default)]
struct StoreState {
    transactions: HashMap<Uuid, TransactionEntity>,
    balances: HashMap<Uuid, i32>,
    coupons: HashMap<String, StoredCoupon>,
    redemptions: Vec<CouponRedemption>,
    webhook_events: HashMap<String, WebhookEventEntity>,
    failing_credit_calls: usize,
}

/// Mirrors the guarded UPDATEs of the Postgres adapters over a mutex.
#[derive(Default)]
pub struct InMemoryStore {
    state: Mutex<StoreState>,
}

pub fn pending_transaction(bundle_id: &str, credits: i32) -> TransactionEntity {
    let now = Utc::now();
    TransactionEntity {
        id: Uuid::new_v4(),
        user_id: Uuid::new_v4(),
        bundle_id: bundle_id.to_string(),
        stripe_session_id: format!("cs_test_{}", Uuid::new_v4().simple()),
        stripe_payment_intent_id: None,
        amount: 499,
        currency: "usd".to_string(),
        status: TransactionStatus::Pending.to_string(),
        credits_purchased: credits,
        credits_added: 0,
        metadata: serde_json::json!({}),
        reconcile_lease_until: None,
        created_at: now,
        updated_at: now,
    }
}

pub fn checkout_session(transaction: &TransactionEntity, payment_status: &str) -> StripeCheckoutSession {
    StripeCheckoutSession {
        id: transaction.stripe_session_id.clone(),
        mode: Some("payment".to_string()),
        status: Some("complete".to_string()),
        payment_status: Some(payment_status.to_string()),
        payment_intent: Some("pi_test_1".to_string()),
        amount_total: Some(i64::from(transaction.amount)),
        currency: Some(transaction.currency.clone()),
        client_reference_id: Some(transaction.user_id.to_string()),
        customer_details: None,
        url: None,
        metadata: HashMap::from([
            ("user_id".to_string(), transaction.user_id.to_string()),
            ("bundle_id".to_string(), transaction.bundle_id.clone()),
            ("credits".to_string(), transaction.credits_purchased.to_string()),
        ]),
    }
}

/// Serialises `event` and signs it the way Stripe would right now.
pub fn signed_event(event: &serde_json::Value, secret: &str) -> (Vec<u8>, String) {
    let payload = event.to_string().into_bytes();
    let timestamp = Utc::now().timestamp().to_string();
    let signature = compute_signature(secret, &timestamp, &payload).unwrap();
    (payload, format!("t={timestamp},v1={signature}"))
}

impl InMemoryStore {
    fn lock(&self) -> std::sync::MutexGuard<'_, StoreState> {
        self.state.lock().unwrap()
    }

    pub fn seed_transaction(&self, transaction: TransactionEntity) -> TransactionEntity {
        self.lock()
            .transactions
            .insert(transaction.id, transaction.clone());
        transaction
    }

    pub fn transaction(&self, transaction_id: Uuid) -> Option<TransactionEntity> {
        self.lock().transactions.get(&transaction_id).cloned()
    }

    pub fn transaction_by_session(&self, session_id: &str) -> Option<TransactionEntity> {
        self.lock()
            .transactions
            .values()
            .find(|row| row.stripe_session_id == session_id)
            .cloned()
    }

    pub fn transaction_count(&self) -> usize {
        self.lock().transactions.len()
    }

    pub fn balance(&self, user_id: Uuid) -> i32 {
        self.lock().balances.get(&user_id).copied().unwrap_or(0)
    }

    pub fn hold_lease(&self, transaction_id: Uuid, until: DateTime<Utc>) {
        if let Some(row) = self.lock().transactions.get_mut(&transaction_id) {
            row.reconcile_lease_until = Some(until);
        }
    }

    pub fn fail_next_credit_calls(&self, count: usize) {
        self.lock().failing_credit_calls = count;
    }

    pub fn add_coupon(&self, code: &str, discount_amount: i32, usage_limit: Option<i32>) -> Uuid {
        let id = Uuid::new_v4();
        self.lock().coupons.insert(
            code.to_string(),
            StoredCoupon {
                id,
                discount_amount,
                usage_limit,
                usage_count: 0,
            },
        );
        id
    }

    pub fn set_coupon_usage(&self, code: &str, usage_count: i32) {
        if let Some(coupon) = self.lock().coupons.get_mut(code) {
            coupon.usage_count = usage_count;
        }
    }

    pub fn redemptions(&self) -> Vec<CouponRedemption> {
        self.lock().redemptions.clone()
    }

    pub fn webhook_event(&self, event_id: &str) -> Option<WebhookEventEntity> {
        self.lock().webhook_events.get(event_id).cloned()
    }
}

#[async_trait]
impl TransactionRepository for InMemoryStore {
    async fn insert_pending(&self, transaction: InsertTransactionEntity) -> Result<Uuid> {
        let mut state = self.lock();
        if state
            .transactions
            .values()
            .any(|row| row.stripe_session_id == transaction.stripe_session_id)
        {
            bail!("duplicate stripe_session_id {}", transaction.stripe_session_id);
        }
        let now = Utc::now();
        let id = Uuid::new_v4();
        state.transactions.insert(
            id,
            TransactionEntity {
                id,
                user_id: transaction.user_id,
                bundle_id: transaction.bundle_id,
                stripe_session_id: transaction.stripe_session_id,
                stripe_payment_intent_id: transaction.stripe_payment_intent_id,
                amount: transaction.amount,
                currency: transaction.currency,
                status: transaction.status,
                credits_purchased: transaction.credits_purchased,
                credits_added: transaction.credits_added,
                metadata: transaction.metadata,
                reconcile_lease_until: None,
                created_at: now,
                updated_at: now,
            },
        );
        Ok(id)
    }

    async fn find_by_id(&self, transaction_id: Uuid) -> Result<Option<TransactionEntity>> {
        Ok(self.transaction(transaction_id))
    }

    async fn find_by_session_id(&self, session_id: &str) -> Result<Option<TransactionEntity>> {
        Ok(self.transaction_by_session(session_id))
    }

    async fn acquire_reconcile_lease(
        &self,
        transaction_id: Uuid,
        now: DateTime<Utc>,
        lease_until: DateTime<Utc>,
    ) -> Result<bool> {
        let mut state = self.lock();
        let Some(row) = state.transactions.get_mut(&transaction_id) else {
            return Ok(false);
        };
        match row.reconcile_lease_until {
            Some(held_until) if held_until >= now => Ok(false),
            _ => {
                row.reconcile_lease_until = Some(lease_until);
                Ok(true)
            }
        }
    }

    async fn release_reconcile_lease(&self, transaction_id: Uuid) -> Result<()> {
        if let Some(row) = self.lock().transactions.get_mut(&transaction_id) {
            row.reconcile_lease_until = None;
        }
        Ok(())
    }

    async fn record_reconciliation(
        &self,
        transaction_id: Uuid,
        payment_intent_id: Option<String>,
        credits_delta: i32,
    ) -> Result<bool> {
        let credits_delta = credits_delta.max(0);
        let mut state = self.lock();
        let Some(row) = state.transactions.get_mut(&transaction_id) else {
            return Ok(false);
        };
        if row.status() == TransactionStatus::Failed
            || row.credits_added > row.credits_purchased - credits_delta
        {
            return Ok(false);
        }
        row.status = TransactionStatus::Succeeded.to_string();
        if payment_intent_id.is_some() {
            row.stripe_payment_intent_id = payment_intent_id;
        }
        row.credits_added += credits_delta;
        row.reconcile_lease_until = None;
        row.updated_at = Utc::now();
        Ok(true)
    }

    async fn mark_succeeded_if_pending(&self, transaction_id: Uuid) -> Result<bool> {
        let mut state = self.lock();
        match state.transactions.get_mut(&transaction_id) {
            Some(row) if row.status() == TransactionStatus::Pending => {
                row.status = TransactionStatus::Succeeded.to_string();
                row.updated_at = Utc::now();
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn mark_failed_by_session_id(&self, session_id: &str) -> Result<bool> {
        let mut state = self.lock();
        match state
            .transactions
            .values_mut()
            .find(|row| row.stripe_session_id == session_id)
        {
            Some(row) if row.status() == TransactionStatus::Pending => {
                row.status = TransactionStatus::Failed.to_string();
                row.updated_at = Utc::now();
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn update_pending_status_by_payment_intent(
        &self,
        payment_intent_id: &str,
        status: TransactionStatus,
    ) -> Result<usize> {
        let mut state = self.lock();
        let mut moved = 0;
        for row in state.transactions.values_mut().filter(|row| {
            row.stripe_payment_intent_id.as_deref() == Some(payment_intent_id)
                && row.status() == TransactionStatus::Pending
        }) {
            row.status = status.to_string();
            row.updated_at = Utc::now();
            moved += 1;
        }
        Ok(moved)
    }

    async fn list_under_credited(
        &self,
        updated_before: DateTime<Utc>,
        limit: i64,
    ) -> Result<Vec<TransactionEntity>> {
        let state = self.lock();
        let mut rows: Vec<TransactionEntity> = state
            .transactions
            .values()
            .filter(|row| {
                let stale_lease = row
                    .reconcile_lease_until
                    .is_some_and(|until| until <= updated_before);
                row.status() != TransactionStatus::Failed
                    && row.credits_added < row.credits_purchased
                    && ((row.status() == TransactionStatus::Succeeded
                        && row.updated_at <= updated_before)
                        || stale_lease)
            })
            .cloned()
            .collect();
        rows.sort_by_key(|row| row.updated_at);
        rows.truncate(usize::try_from(limit).unwrap_or(0));
        Ok(rows)
    }
}

#[async_trait]
impl CreditRepository for InMemoryStore {
    async fn add_user_credits(&self, user_id: Uuid, credits_to_add: i32) -> Result<()> {
        let mut state = self.lock();
        if state.failing_credit_calls > 0 {
            state.failing_credit_calls -= 1;
            bail!("add_user_credits: connection refused");
        }
        *state.balances.entry(user_id).or_insert(0) += credits_to_add;
        Ok(())
    }
}

#[async_trait]
impl CouponRepository for InMemoryStore {
    async fn validate_coupon(
        &self,
        code: &str,
        _user_id: Uuid,
        _amount: i32,
    ) -> Result<CouponValidation> {
        let state = self.lock();
        let Some(coupon) = state.coupons.get(code) else {
            return Ok(CouponValidation::rejected("Coupon not found"));
        };
        if coupon
            .usage_limit
            .is_some_and(|limit| coupon.usage_count >= limit)
        {
            return Ok(CouponValidation::rejected("Coupon usage limit reached"));
        }
        Ok(CouponValidation {
            is_valid: true,
            discount_amount: coupon.discount_amount,
            coupon_id: Some(coupon.id),
            error_message: None,
        })
    }

    async fn apply_coupon(&self, redemption: CouponRedemption) -> Result<()> {
        let mut state = self.lock();
        if !state
            .coupons
            .values()
            .any(|coupon| coupon.id == redemption.coupon_id)
        {
            bail!("coupon {} not found", redemption.coupon_id);
        }
        // UNIQUE (coupon_id, payment_id): a replayed redemption is a no-op.
        if state.redemptions.iter().any(|existing| {
            existing.coupon_id == redemption.coupon_id && existing.payment_id == redemption.payment_id
        }) {
            return Ok(());
        }
        if let Some(coupon) = state
            .coupons
            .values_mut()
            .find(|coupon| coupon.id == redemption.coupon_id)
        {
            coupon.usage_count += 1;
        }
        state.redemptions.push(redemption);
        Ok(())
    }
}

#[async_trait]
impl WebhookEventRepository for InMemoryStore {
    async fn find_by_event_id(&self, event_id: &str) -> Result<Option<WebhookEventEntity>> {
        Ok(self.webhook_event(event_id))
    }

    async fn record_event(&self, event: InsertWebhookEventEntity) -> Result<()> {
        let now = Utc::now();
        let mut state = self.lock();
        let created_at = state
            .webhook_events
            .get(&event.event_id)
            .map(|existing| existing.created_at)
            .unwrap_or(now);
        state.webhook_events.insert(
            event.event_id.clone(),
            WebhookEventEntity {
                event_id: event.event_id,
                event_type: event.event_type,
                processed: event.processed,
                payload: event.payload,
                error: event.error,
                created_at,
                updated_at: now,
            },
        );
        Ok(())
    }
}

/// Stripe double: records checkout requests, serves canned sessions and
/// verifies signatures against [`WEBHOOK_SECRET`].
#[derive(Default)]
pub struct FakeStripe {
    created: Mutex<Vec<CheckoutSessionRequest>>,
    sessions: Mutex<HashMap<String, StripeCheckoutSession>>,
    counter: AtomicUsize,
}

impl FakeStripe {
    pub fn created_requests(&self) -> Vec<CheckoutSessionRequest> {
        self.created.lock().unwrap().clone()
    }

    pub fn put_session(&self, session: StripeCheckoutSession) {
        self.sessions
            .lock()
            .unwrap()
            .insert(session.id.clone(), session);
    }
}

#[async_trait]
impl StripeGateway for FakeStripe {
    async fn create_checkout_session(
        &self,
        request: CheckoutSessionRequest,
    ) -> Result<CreatedCheckoutSession> {
        let n = self.counter.fetch_add(1, Ordering::SeqCst) + 1;
        self.created.lock().unwrap().push(request);
        let id = format!("cs_test_{n}");
        Ok(CreatedCheckoutSession {
            url: Some(format!("https://checkout.stripe.com/c/pay/{id}")),
            id,
        })
    }

    async fn retrieve_checkout_session(&self, session_id: &str) -> Result<StripeCheckoutSession> {
        self.sessions
            .lock()
            .unwrap()
            .get(session_id)
            .cloned()
            .ok_or_else(|| anyhow!("No such checkout.session: {session_id}"))
    }

    fn verify_webhook_signature(
        &self,
        payload: &[u8],
        signature: &str,
    ) -> std::result::Result<StripeEvent, WebhookSignatureError> {
        construct_event(payload, signature, WEBHOOK_SECRET, 300, Utc::now().timestamp())
    }
}
