use anyhow::Result as AnyResult;
use async_trait::async_trait;
use crates::payments::stripe_client::{
    CheckoutSessionRequest, CreatedCheckoutSession, StripeCheckoutSession, StripeClient,
    StripeEvent, WebhookSignatureError,
};

/// The slice of Stripe the payment use cases depend on.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait StripeGateway: Send + Sync {
    async fn create_checkout_session(
        &self,
        request: CheckoutSessionRequest,
    ) -> AnyResult<CreatedCheckoutSession>;

    async fn retrieve_checkout_session(&self, session_id: &str)
    -> AnyResult<StripeCheckoutSession>;

    fn verify_webhook_signature(
        &self,
        payload: &[u8],
        signature: &str,
    ) -> Result<StripeEvent, WebhookSignatureError>;
}

#[async_trait]
impl StripeGateway for StripeClient {
    async fn create_checkout_session(
        &self,
        request: CheckoutSessionRequest,
    ) -> AnyResult<CreatedCheckoutSession> {
        self.create_checkout_session(request).await
    }

    async fn retrieve_checkout_session(
        &self,
        session_id: &str,
    ) -> AnyResult<StripeCheckoutSession> {
        self.retrieve_checkout_session(session_id).await
    }

    fn verify_webhook_signature(
        &self,
        payload: &[u8],
        signature: &str,
    ) -> Result<StripeEvent, WebhookSignatureError> {
        self.verify_webhook_signature(payload, signature)
    }
}
