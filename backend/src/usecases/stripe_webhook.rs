use std::sync::Arc;

use anyhow::{Result as AnyResult, anyhow};
use crates::{
    domain::{
        entities::webhook_events::InsertWebhookEventEntity,
        repositories::{
            coupons::CouponRepository, credits::CreditRepository,
            transactions::TransactionRepository, webhook_events::WebhookEventRepository,
        },
        value_objects::{
            bundles::BundleCatalog,
            checkout::metadata_keys,
            enums::{
                checkout_payment_statuses::CheckoutPaymentStatus,
                transaction_statuses::TransactionStatus,
            },
            reconciliation::{ReconciliationInput, ReconciliationOutcome},
        },
    },
    payments::stripe_client::{StripeClient, StripeEvent, WebhookSignatureError},
};
use thiserror::Error;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::usecases::{reconciliation::ReconciliationUseCase, stripe_gateway::StripeGateway};

pub const CHECKOUT_SESSION_COMPLETED: &str = "checkout.session.completed";
pub const CHECKOUT_SESSION_ASYNC_PAYMENT_SUCCEEDED: &str =
    "checkout.session.async_payment_succeeded";
pub const CHECKOUT_SESSION_ASYNC_PAYMENT_FAILED: &str = "checkout.session.async_payment_failed";
pub const CHECKOUT_SESSION_EXPIRED: &str = "checkout.session.expired";
pub const PAYMENT_INTENT_SUCCEEDED: &str = "payment_intent.succeeded";
pub const PAYMENT_INTENT_PAYMENT_FAILED: &str = "payment_intent.payment_failed";

#[derive(Debug, Error)]
pub enum WebhookError {
    #[error("missing stripe-signature header")]
    MissingSignature,
    #[error("signature verification failed: {0}")]
    InvalidSignature(#[from] WebhookSignatureError),
}

impl WebhookError {
    pub fn status_code(&self) -> axum::http::StatusCode {
        match self {
            WebhookError::MissingSignature | WebhookError::InvalidSignature(_) => {
                axum::http::StatusCode::BAD_REQUEST
            }
        }
    }
}

pub type WebhookResult<T> = std::result::Result<T, WebhookError>;

/// What a verified delivery led to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WebhookDispatch {
    /// The event id was already processed.
    Duplicate,
    Reconciled(ReconciliationOutcome),
    /// Delayed payment method; credits wait for `async_payment_succeeded`.
    AwaitingPayment,
    StatusUpdated { rows: usize },
    Ignored,
    Failed(String),
}

impl WebhookDispatch {
    /// An in-progress reconciliation stays unprocessed so a redelivery dispatches again.
    fn processed(&self) -> bool {
        !matches!(
            self,
            WebhookDispatch::Failed(_)
                | WebhookDispatch::Reconciled(ReconciliationOutcome::InProgress { .. })
        )
    }

    fn error_text(&self) -> Option<String> {
        match self {
            WebhookDispatch::Failed(reason) => Some(reason.clone()),
            WebhookDispatch::Reconciled(ReconciliationOutcome::InProgress { transaction_id }) => {
                Some(format!(
                    "transaction {transaction_id} is being reconciled by another delivery"
                ))
            }
            WebhookDispatch::Reconciled(ReconciliationOutcome::PartialSuccess {
                missing_credits,
                reason,
                ..
            }) => Some(format!("{missing_credits} credits pending repair: {reason}")),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WebhookAck {
    pub event_id: String,
    pub event_type: String,
    pub dispatch: WebhookDispatch,
}

pub struct StripeWebhookUseCase<T, Cr, Co, W, S>
where
    T: TransactionRepository + Send + Sync + 'static,
    Cr: CreditRepository + Send + Sync + 'static,
    Co: CouponRepository + Send + Sync + 'static,
    W: WebhookEventRepository + Send + Sync + 'static,
    S: StripeGateway + 'static,
{
    reconciliation: Arc<ReconciliationUseCase<T, Cr, Co>>,
    transaction_repo: Arc<T>,
    webhook_event_repo: Arc<W>,
    stripe_client: Arc<S>,
    catalog: Arc<BundleCatalog>,
}

impl<T, Cr, Co, W, S> StripeWebhookUseCase<T, Cr, Co, W, S>
where
    T: TransactionRepository + Send + Sync + 'static,
    Cr: CreditRepository + Send + Sync + 'static,
    Co: CouponRepository + Send + Sync + 'static,
    W: WebhookEventRepository + Send + Sync + 'static,
    S: StripeGateway + 'static,
{
    pub fn new(
        reconciliation: Arc<ReconciliationUseCase<T, Cr, Co>>,
        transaction_repo: Arc<T>,
        webhook_event_repo: Arc<W>,
        stripe_client: Arc<S>,
        catalog: Arc<BundleCatalog>,
    ) -> Self {
        Self {
            reconciliation,
            transaction_repo,
            webhook_event_repo,
            stripe_client,
            catalog,
        }
    }

    /// Verifies and dispatches one delivery. Once the signature checks out the
    /// delivery is acknowledged whatever the handler outcome.
    pub async fn handle_stripe_webhook(
        &self,
        payload: &[u8],
        signature: Option<&str>,
    ) -> WebhookResult<WebhookAck> {
        debug!(payload_len = payload.len(), "stripe webhook: payload received");

        let signature = signature
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .ok_or_else(|| {
                let err = WebhookError::MissingSignature;
                warn!(
                    status = err.status_code().as_u16(),
                    "stripe webhook: missing signature header"
                );
                err
            })?;

        let event = self
            .stripe_client
            .verify_webhook_signature(payload, signature)
            .map_err(|err| {
                let err = WebhookError::InvalidSignature(err);
                warn!(
                    error = %err,
                    status = err.status_code().as_u16(),
                    "stripe webhook: verification failed"
                );
                err
            })?;

        let event_id = event.id.clone();
        let event_type = event.type_.clone();
        info!(%event_id, %event_type, "stripe webhook: event verified");

        match self.webhook_event_repo.find_by_event_id(&event_id).await {
            Ok(Some(logged)) if logged.processed => {
                info!(%event_id, %event_type, "stripe webhook: duplicate event skipped");
                return Ok(WebhookAck {
                    event_id,
                    event_type,
                    dispatch: WebhookDispatch::Duplicate,
                });
            }
            Ok(_) => {}
            Err(err) => warn!(
                %event_id,
                db_error = ?err,
                "stripe webhook: event log lookup failed, dispatching anyway"
            ),
        }

        let dispatch = match self.dispatch(&event).await {
            Ok(dispatch) => dispatch,
            Err(err) => {
                error!(%event_id, %event_type, error = ?err, "stripe webhook: handler failed");
                WebhookDispatch::Failed(err.to_string())
            }
        };

        let logged_event = InsertWebhookEventEntity {
            event_id: event_id.clone(),
            event_type: event_type.clone(),
            processed: dispatch.processed(),
            payload: serde_json::from_slice(payload).unwrap_or(serde_json::Value::Null),
            error: dispatch.error_text(),
        };
        if let Err(err) = self.webhook_event_repo.record_event(logged_event).await {
            error!(%event_id, db_error = ?err, "stripe webhook: failed to record event");
        }

        info!(%event_id, %event_type, dispatch = ?dispatch, "stripe webhook: event handled");
        Ok(WebhookAck {
            event_id,
            event_type,
            dispatch,
        })
    }

    async fn dispatch(&self, event: &StripeEvent) -> AnyResult<WebhookDispatch> {
        match event.type_.as_str() {
            CHECKOUT_SESSION_COMPLETED | CHECKOUT_SESSION_ASYNC_PAYMENT_SUCCEEDED => {
                self.handle_checkout_paid(event).await
            }
            CHECKOUT_SESSION_ASYNC_PAYMENT_FAILED | CHECKOUT_SESSION_EXPIRED => {
                let session = StripeClient::extract_checkout_session(event)
                    .ok_or_else(|| anyhow!("event does not carry a checkout session"))?;
                let moved = self
                    .transaction_repo
                    .mark_failed_by_session_id(&session.id)
                    .await?;
                info!(session_id = %session.id, moved, "stripe webhook: checkout session marked failed");
                Ok(WebhookDispatch::StatusUpdated {
                    rows: usize::from(moved),
                })
            }
            PAYMENT_INTENT_SUCCEEDED => {
                self.update_by_payment_intent(event, TransactionStatus::Succeeded)
                    .await
            }
            PAYMENT_INTENT_PAYMENT_FAILED => {
                self.update_by_payment_intent(event, TransactionStatus::Failed)
                    .await
            }
            other => {
                debug!(event_type = other, "stripe webhook: unhandled event type");
                Ok(WebhookDispatch::Ignored)
            }
        }
    }

    async fn handle_checkout_paid(&self, event: &StripeEvent) -> AnyResult<WebhookDispatch> {
        let session = StripeClient::extract_checkout_session(event)
            .ok_or_else(|| anyhow!("event does not carry a checkout session"))?;

        let payment_status = session
            .payment_status
            .as_deref()
            .and_then(CheckoutPaymentStatus::from_str);
        if payment_status == Some(CheckoutPaymentStatus::Unpaid) {
            info!(
                session_id = %session.id,
                "stripe webhook: checkout completed but unpaid, waiting for async payment"
            );
            return Ok(WebhookDispatch::AwaitingPayment);
        }

        let user_id = session
            .metadata
            .get(metadata_keys::USER_ID)
            .or(session.client_reference_id.as_ref())
            .and_then(|raw| Uuid::parse_str(raw).ok())
            .ok_or_else(|| anyhow!("checkout session {} has no valid user id", session.id))?;

        let bundle_id = session
            .metadata
            .get(metadata_keys::BUNDLE_ID)
            .cloned()
            .unwrap_or_default();

        let intended_credits = session
            .metadata
            .get(metadata_keys::CREDITS)
            .and_then(|raw| raw.parse::<i32>().ok())
            .or_else(|| self.catalog.find(&bundle_id).map(|bundle| bundle.credits))
            .ok_or_else(|| {
                anyhow!(
                    "checkout session {} carries no credits for bundle {:?}",
                    session.id,
                    bundle_id
                )
            })?;

        let outcome = self
            .reconciliation
            .reconcile(ReconciliationInput {
                user_id,
                bundle_id,
                intended_credits,
                session_id: session.id.clone(),
                payment_intent_id: session.payment_intent.clone(),
            })
            .await?;

        Ok(WebhookDispatch::Reconciled(outcome))
    }

    /// Matches rows by payment intent id, which is only known once a session has
    /// been reconciled. Inside Checkout a declined attempt can still be retried, so
    /// a pending session only fails through `checkout.session.expired` or
    /// `checkout.session.async_payment_failed`.
    async fn update_by_payment_intent(
        &self,
        event: &StripeEvent,
        status: TransactionStatus,
    ) -> AnyResult<WebhookDispatch> {
        let payment_intent = StripeClient::extract_payment_intent(event)
            .ok_or_else(|| anyhow!("event does not carry a payment intent"))?;

        if let Some(last_error) = &payment_intent.last_payment_error {
            warn!(
                payment_intent_id = %payment_intent.id,
                code = ?last_error.code,
                message = ?last_error.message,
                "stripe webhook: payment intent reported an error"
            );
        }

        let rows = self
            .transaction_repo
            .update_pending_status_by_payment_intent(&payment_intent.id, status)
            .await?;
        info!(
            payment_intent_id = %payment_intent.id,
            status = %status,
            rows,
            "stripe webhook: payment intent status applied"
        );
        Ok(WebhookDispatch::StatusUpdated { rows })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::usecases::{
        session_verifier::SessionVerifierUseCase,
        test_support::{
            FakeStripe, InMemoryStore, WEBHOOK_SECRET, checkout_session, pending_transaction,
            signed_event,
        },
    };
    use chrono::Duration;
    use serde_json::json;

    type Webhooks =
        StripeWebhookUseCase<InMemoryStore, InMemoryStore, InMemoryStore, InMemoryStore, FakeStripe>;

    fn usecase(store: &Arc<InMemoryStore>) -> Webhooks {
        let reconciliation = ReconciliationUseCase::new(
            Arc::clone(store),
            Arc::clone(store),
            Arc::clone(store),
            Duration::seconds(60),
        );
        StripeWebhookUseCase::new(
            Arc::new(reconciliation),
            Arc::clone(store),
            Arc::clone(store),
            Arc::new(FakeStripe::default()),
            Arc::new(BundleCatalog::standard()),
        )
    }

    fn completed_event(event_id: &str, session_id: &str, user_id: Uuid, credits: &str) -> serde_json::Value {
        json!({
            "id": event_id,
            "type": CHECKOUT_SESSION_COMPLETED,
            "data": { "object": {
                "id": session_id,
                "payment_status": "paid",
                "payment_intent": "pi_test_1",
                "client_reference_id": user_id.to_string(),
                "metadata": {
                    "user_id": user_id.to_string(),
                    "bundle_id": "starter",
                    "credits": credits
                }
            }}
        })
    }

    #[tokio::test]
    async fn duplicated_completion_credits_once() {
        let store = Arc::new(InMemoryStore::default());
        let transaction = store.seed_transaction(pending_transaction("starter", 4));
        let webhooks = usecase(&store);
        let body = completed_event("evt_1", &transaction.stripe_session_id, transaction.user_id, "4");
        let (payload, header) = signed_event(&body, WEBHOOK_SECRET);

        let first = webhooks
            .handle_stripe_webhook(&payload, Some(&header))
            .await
            .unwrap();
        let second = webhooks
            .handle_stripe_webhook(&payload, Some(&header))
            .await
            .unwrap();

        assert!(matches!(
            first.dispatch,
            WebhookDispatch::Reconciled(ReconciliationOutcome::Credited { credits_added: 4, .. })
        ));
        assert_eq!(second.dispatch, WebhookDispatch::Duplicate);
        assert_eq!(store.transaction(transaction.id).unwrap().credits_added, 4);
        assert_eq!(store.balance(transaction.user_id), 4);

        let logged = store.webhook_event("evt_1").unwrap();
        assert!(logged.processed);
        assert_eq!(logged.error, None);
    }

    #[tokio::test]
    async fn distinct_events_for_same_session_credit_once() {
        let store = Arc::new(InMemoryStore::default());
        let transaction = store.seed_transaction(pending_transaction("starter", 4));
        let webhooks = usecase(&store);

        for event_id in ["evt_a", "evt_b", "evt_c"] {
            let body = completed_event(event_id, &transaction.stripe_session_id, transaction.user_id, "4");
            let (payload, header) = signed_event(&body, WEBHOOK_SECRET);
            webhooks
                .handle_stripe_webhook(&payload, Some(&header))
                .await
                .unwrap();
        }

        assert_eq!(store.balance(transaction.user_id), 4);
        assert_eq!(store.transaction(transaction.id).unwrap().credits_added, 4);
    }

    #[tokio::test]
    async fn bad_signature_mutates_nothing() {
        let store = Arc::new(InMemoryStore::default());
        let transaction = store.seed_transaction(pending_transaction("starter", 4));
        let webhooks = usecase(&store);
        let body = completed_event("evt_1", &transaction.stripe_session_id, transaction.user_id, "4");
        let (payload, header) = signed_event(&body, "whsec_attacker");

        let err = webhooks
            .handle_stripe_webhook(&payload, Some(&header))
            .await
            .unwrap_err();
        assert_eq!(err.status_code(), axum::http::StatusCode::BAD_REQUEST);

        let err = webhooks
            .handle_stripe_webhook(&payload, None)
            .await
            .unwrap_err();
        assert!(matches!(err, WebhookError::MissingSignature));

        assert_eq!(store.transaction(transaction.id).unwrap(), transaction);
        assert!(store.webhook_event("evt_1").is_none());
        assert_eq!(store.balance(transaction.user_id), 0);
    }

    #[tokio::test]
    async fn unpaid_completion_waits_for_async_success() {
        let store = Arc::new(InMemoryStore::default());
        let transaction = store.seed_transaction(pending_transaction("starter", 4));
        let webhooks = usecase(&store);

        let mut body = completed_event("evt_1", &transaction.stripe_session_id, transaction.user_id, "4");
        body["data"]["object"]["payment_status"] = json!("unpaid");
        let (payload, header) = signed_event(&body, WEBHOOK_SECRET);
        let ack = webhooks
            .handle_stripe_webhook(&payload, Some(&header))
            .await
            .unwrap();
        assert_eq!(ack.dispatch, WebhookDispatch::AwaitingPayment);
        assert_eq!(store.transaction(transaction.id).unwrap().status, "pending");

        let mut body = completed_event("evt_2", &transaction.stripe_session_id, transaction.user_id, "4");
        body["type"] = json!(CHECKOUT_SESSION_ASYNC_PAYMENT_SUCCEEDED);
        let (payload, header) = signed_event(&body, WEBHOOK_SECRET);
        webhooks
            .handle_stripe_webhook(&payload, Some(&header))
            .await
            .unwrap();
        assert_eq!(store.balance(transaction.user_id), 4);
    }

    #[tokio::test]
    async fn missing_credit_metadata_falls_back_to_catalog() {
        let store = Arc::new(InMemoryStore::default());
        let transaction = store.seed_transaction(pending_transaction("starter", 4));
        let webhooks = usecase(&store);
        let mut body = completed_event("evt_1", &transaction.stripe_session_id, transaction.user_id, "4");
        body["data"]["object"]["metadata"]
            .as_object_mut()
            .unwrap()
            .remove("credits");
        let (payload, header) = signed_event(&body, WEBHOOK_SECRET);

        webhooks
            .handle_stripe_webhook(&payload, Some(&header))
            .await
            .unwrap();

        assert_eq!(store.balance(transaction.user_id), 4);
    }

    #[tokio::test]
    async fn handler_failure_is_acknowledged_and_logged_unprocessed() {
        let store = Arc::new(InMemoryStore::default());
        let webhooks = usecase(&store);
        let body = json!({
            "id": "evt_bad",
            "type": CHECKOUT_SESSION_COMPLETED,
            "data": { "object": { "id": "cs_1", "payment_status": "paid", "metadata": {} } }
        });
        let (payload, header) = signed_event(&body, WEBHOOK_SECRET);

        let ack = webhooks
            .handle_stripe_webhook(&payload, Some(&header))
            .await
            .unwrap();

        assert!(matches!(ack.dispatch, WebhookDispatch::Failed(_)));
        let logged = store.webhook_event("evt_bad").unwrap();
        assert!(!logged.processed);
        assert!(logged.error.unwrap().contains("no valid user id"));
    }

    #[tokio::test]
    async fn partial_success_is_logged_with_missing_credits() {
        let store = Arc::new(InMemoryStore::default());
        let transaction = store.seed_transaction(pending_transaction("starter", 4));
        store.fail_next_credit_calls(1);
        let webhooks = usecase(&store);
        let body = completed_event("evt_1", &transaction.stripe_session_id, transaction.user_id, "4");
        let (payload, header) = signed_event(&body, WEBHOOK_SECRET);

        webhooks
            .handle_stripe_webhook(&payload, Some(&header))
            .await
            .unwrap();

        let logged = store.webhook_event("evt_1").unwrap();
        assert!(logged.processed);
        assert!(logged.error.unwrap().starts_with("4 credits pending repair"));
        assert_eq!(store.transaction(transaction.id).unwrap().status, "succeeded");
    }

    #[tokio::test]
    async fn expired_session_fails_pending_transaction() {
        let store = Arc::new(InMemoryStore::default());
        let transaction = store.seed_transaction(pending_transaction("starter", 4));
        let webhooks = usecase(&store);
        let body = json!({
            "id": "evt_exp",
            "type": CHECKOUT_SESSION_EXPIRED,
            "data": { "object": { "id": transaction.stripe_session_id, "status": "expired" } }
        });
        let (payload, header) = signed_event(&body, WEBHOOK_SECRET);

        let ack = webhooks
            .handle_stripe_webhook(&payload, Some(&header))
            .await
            .unwrap();

        assert_eq!(ack.dispatch, WebhookDispatch::StatusUpdated { rows: 1 });
        assert_eq!(store.transaction(transaction.id).unwrap().status, "failed");
    }

    #[tokio::test]
    async fn payment_intent_events_only_move_pending_rows() {
        let store = Arc::new(InMemoryStore::default());
        let mut seeded = pending_transaction("starter", 4);
        seeded.stripe_payment_intent_id = Some("pi_1".to_string());
        let transaction = store.seed_transaction(seeded);
        let webhooks = usecase(&store);

        let body = json!({
            "id": "evt_pi_ok",
            "type": PAYMENT_INTENT_SUCCEEDED,
            "data": { "object": { "id": "pi_1", "status": "succeeded" } }
        });
        let (payload, header) = signed_event(&body, WEBHOOK_SECRET);
        let ack = webhooks
            .handle_stripe_webhook(&payload, Some(&header))
            .await
            .unwrap();
        assert_eq!(ack.dispatch, WebhookDispatch::StatusUpdated { rows: 1 });

        let body = json!({
            "id": "evt_pi_fail",
            "type": PAYMENT_INTENT_PAYMENT_FAILED,
            "data": { "object": { "id": "pi_1", "status": "requires_payment_method" } }
        });
        let (payload, header) = signed_event(&body, WEBHOOK_SECRET);
        let ack = webhooks
            .handle_stripe_webhook(&payload, Some(&header))
            .await
            .unwrap();
        assert_eq!(ack.dispatch, WebhookDispatch::StatusUpdated { rows: 0 });

        let stored = store.transaction(transaction.id).unwrap();
        assert_eq!(stored.status, "succeeded");
        assert_eq!(stored.credits_added, 0);
    }

    #[tokio::test]
    async fn delivery_under_held_lease_is_redispatched_once_lease_expires() {
        let store = Arc::new(InMemoryStore::default());
        let transaction = store.seed_transaction(pending_transaction("starter", 4));
        store.hold_lease(transaction.id, chrono::Utc::now() + Duration::seconds(60));
        let webhooks = usecase(&store);
        let body = completed_event("evt_1", &transaction.stripe_session_id, transaction.user_id, "4");
        let (payload, header) = signed_event(&body, WEBHOOK_SECRET);

        let first = webhooks
            .handle_stripe_webhook(&payload, Some(&header))
            .await
            .unwrap();
        assert!(matches!(
            first.dispatch,
            WebhookDispatch::Reconciled(ReconciliationOutcome::InProgress { .. })
        ));
        let logged = store.webhook_event("evt_1").unwrap();
        assert!(!logged.processed);
        assert!(logged.error.unwrap().contains("being reconciled"));
        assert_eq!(store.balance(transaction.user_id), 0);

        // The lease holder died without recording anything.
        store.hold_lease(transaction.id, chrono::Utc::now() - Duration::seconds(1));

        let redelivery = webhooks
            .handle_stripe_webhook(&payload, Some(&header))
            .await
            .unwrap();
        assert!(matches!(
            redelivery.dispatch,
            WebhookDispatch::Reconciled(ReconciliationOutcome::Credited { credits_added: 4, .. })
        ));
        let logged = store.webhook_event("evt_1").unwrap();
        assert!(logged.processed);
        assert_eq!(logged.error, None);
        assert_eq!(store.balance(transaction.user_id), 4);
        assert_eq!(store.transaction(transaction.id).unwrap().credits_added, 4);
    }

    #[tokio::test]
    async fn verifier_running_before_and_after_webhook_never_changes_credits() {
        let store = Arc::new(InMemoryStore::default());
        let transaction = store.seed_transaction(pending_transaction("starter", 4));
        let stripe = Arc::new(FakeStripe::default());
        stripe.put_session(checkout_session(&transaction, "paid"));
        let verifier = SessionVerifierUseCase::new(
            Arc::clone(&store),
            stripe,
            Arc::new(BundleCatalog::standard()),
        );
        let webhooks = usecase(&store);
        let session_id = Some(transaction.stripe_session_id.clone());

        verifier.verify_session(session_id.clone()).await.unwrap();
        let stored = store.transaction(transaction.id).unwrap();
        assert_eq!(stored.status, "succeeded");
        assert_eq!(stored.credits_added, 0);

        let body = completed_event("evt_1", &transaction.stripe_session_id, transaction.user_id, "4");
        let (payload, header) = signed_event(&body, WEBHOOK_SECRET);
        let ack = webhooks
            .handle_stripe_webhook(&payload, Some(&header))
            .await
            .unwrap();
        assert!(matches!(
            ack.dispatch,
            WebhookDispatch::Reconciled(ReconciliationOutcome::Credited { credits_added: 4, .. })
        ));

        let response = verifier.verify_session(session_id).await.unwrap();
        assert_eq!(response.transaction.unwrap().credits_added, 4);

        let body = completed_event("evt_2", &transaction.stripe_session_id, transaction.user_id, "4");
        let (payload, header) = signed_event(&body, WEBHOOK_SECRET);
        let replay = webhooks
            .handle_stripe_webhook(&payload, Some(&header))
            .await
            .unwrap();
        assert!(matches!(
            replay.dispatch,
            WebhookDispatch::Reconciled(ReconciliationOutcome::AlreadyCredited { .. })
        ));

        let stored = store.transaction(transaction.id).unwrap();
        assert_eq!(stored.status, "succeeded");
        assert_eq!(stored.credits_added, 4);
        assert_eq!(store.balance(transaction.user_id), 4);
    }

    #[tokio::test]
    async fn failed_card_attempt_inside_checkout_does_not_fail_the_session() {
        let store = Arc::new(InMemoryStore::default());
        let transaction = store.seed_transaction(pending_transaction("starter", 4));
        let webhooks = usecase(&store);

        let body = json!({
            "id": "evt_pi_declined",
            "type": PAYMENT_INTENT_PAYMENT_FAILED,
            "data": { "object": {
                "id": "pi_test_1",
                "status": "requires_payment_method",
                "last_payment_error": { "code": "card_declined", "message": "Your card was declined." }
            }}
        });
        let (payload, header) = signed_event(&body, WEBHOOK_SECRET);
        let ack = webhooks
            .handle_stripe_webhook(&payload, Some(&header))
            .await
            .unwrap();
        assert_eq!(ack.dispatch, WebhookDispatch::StatusUpdated { rows: 0 });
        assert_eq!(store.transaction(transaction.id).unwrap().status, "pending");

        // The customer retries with another card and the session completes.
        let body = completed_event("evt_1", &transaction.stripe_session_id, transaction.user_id, "4");
        let (payload, header) = signed_event(&body, WEBHOOK_SECRET);
        webhooks
            .handle_stripe_webhook(&payload, Some(&header))
            .await
            .unwrap();
        assert_eq!(store.balance(transaction.user_id), 4);
    }

    #[tokio::test]
    async fn unknown_event_type_is_ignored() {
        let store = Arc::new(InMemoryStore::default());
        let webhooks = usecase(&store);
        let body = json!({
            "id": "evt_other",
            "type": "customer.created",
            "data": { "object": { "id": "cus_1" } }
        });
        let (payload, header) = signed_event(&body, WEBHOOK_SECRET);

        let ack = webhooks
            .handle_stripe_webhook(&payload, Some(&header))
            .await
            .unwrap();

        assert_eq!(ack.dispatch, WebhookDispatch::Ignored);
        assert!(store.webhook_event("evt_other").unwrap().processed);
    }
}
