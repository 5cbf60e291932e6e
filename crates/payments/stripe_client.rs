use std::{collections::HashMap, time::Duration};

use anyhow::Result;
use hmac::{Hmac, Mac};
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE};
use serde::Deserialize;
use sha2::Sha256;
use thiserror::Error;
use tracing::error;

type HmacSha256 = Hmac<Sha256>;

const STRIPE_API_BASE: &str = "https://api.stripe.com/v1";

/// Maximum age of a webhook timestamp in the future, to absorb clock skew.
const WEBHOOK_FUTURE_SKEW_SECS: i64 = 60;

#[derive(Debug, Clone)]
pub struct StripeClientConfig {
    pub secret_key: String,
    pub webhook_secret: String,
    pub success_url: String,
    pub cancel_url: String,
    pub webhook_tolerance_secs: i64,
    pub http_timeout_secs: u64,
}

/// Checkout Session ids look like `cs_test_a1B2c3`.
pub fn is_checkout_session_id(value: &str) -> bool {
    value.strip_prefix("cs_").is_some_and(|rest| {
        !rest.is_empty()
            && rest
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_')
    })
}

/// The id is pushed as a single encoded path segment, so it cannot walk out of
/// `/checkout/sessions`.
fn checkout_session_url(session_id: &str) -> Result<reqwest::Url> {
    let mut url = reqwest::Url::parse(STRIPE_API_BASE)?;
    url.path_segments_mut()
        .map_err(|_| anyhow::anyhow!("Stripe API base cannot be a base URL"))?
        .extend(["checkout", "sessions", session_id]);
    Ok(url)
}

/// Minimal Stripe client built on reqwest.
pub struct StripeClient {
    http: reqwest::Client,
    secret_key: String,
    webhook_secret: String,
    success_url: String,
    cancel_url: String,
    webhook_tolerance_secs: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StripeEvent {
    pub id: String,
    #[serde(rename = "type")]
    pub type_: String,
    pub created: Option<i64>,
    pub livemode: Option<bool>,
    pub data: StripeEventData,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StripeEventData {
    pub object: serde_json::Value,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StripeCheckoutSession {
    pub id: String,
    pub mode: Option<String>,
    pub status: Option<String>,
    pub payment_status: Option<String>,
    pub payment_intent: Option<String>,
    pub amount_total: Option<i64>,
    pub currency: Option<String>,
    pub client_reference_id: Option<String>,
    pub customer_details: Option<StripeCustomerDetails>,
    pub url: Option<String>,
    #[serde(default)]
    pub metadata: HashMap<String, String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StripeCustomerDetails {
    pub email: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StripePaymentIntent {
    pub id: String,
    pub status: Option<String>,
    pub last_payment_error: Option<StripePaymentError>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StripePaymentError {
    pub code: Option<String>,
    pub message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct StripeErrorEnvelope {
    error: StripeErrorDetails,
}

#[derive(Debug, Deserialize)]
struct StripeErrorDetails {
    #[serde(rename = "type")]
    type_: Option<String>,
    code: Option<String>,
    message: Option<String>,
    param: Option<String>,
}

/// How the single checkout line item is priced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CheckoutLineItem {
    /// A price registered in the Stripe dashboard.
    Price { price_id: String },
    /// An ad-hoc `price_data` amount, used when a discount changes the price.
    Amount {
        unit_amount: i32,
        currency: String,
        product_name: String,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckoutSessionRequest {
    pub line_item: CheckoutLineItem,
    pub client_reference_id: String,
    pub metadata: HashMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct CreatedCheckoutSession {
    pub id: String,
    pub url: Option<String>,
}

#[derive(Debug, Error)]
pub enum WebhookSignatureError {
    #[error("missing timestamp in stripe-signature")]
    MissingTimestamp,
    #[error("missing v1 signature in stripe-signature")]
    MissingSignature,
    #[error("invalid timestamp in stripe-signature")]
    InvalidTimestamp,
    #[error("webhook timestamp outside tolerance (age {age_secs}s)")]
    TimestampOutOfTolerance { age_secs: i64 },
    #[error("webhook signature mismatch")]
    Mismatch,
    #[error("invalid webhook secret")]
    InvalidSecret,
    #[error("invalid event payload: {0}")]
    InvalidPayload(String),
}

/// Hex HMAC-SHA256 of `"{timestamp}.{payload}"`, as Stripe signs webhook deliveries.
pub fn compute_signature(secret: &str, timestamp: &str, payload: &[u8]) -> Result<String> {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())?;
    mac.update(timestamp.as_bytes());
    mac.update(b".");
    mac.update(payload);
    Ok(hex::encode(mac.finalize().into_bytes()))
}

/// Verifies a `stripe-signature` header (`t=...,v1=...[,v1=...]`) and parses the event.
/// https://stripe.com/docs/webhooks/signatures
pub fn construct_event(
    payload: &[u8],
    signature_header: &str,
    webhook_secret: &str,
    tolerance_secs: i64,
    now_ts: i64,
) -> std::result::Result<StripeEvent, WebhookSignatureError> {
    let mut timestamp: Option<&str> = None;
    let mut signatures: Vec<&str> = Vec::new();

    for part in signature_header.split(',') {
        let part = part.trim();
        if let Some(rest) = part.strip_prefix("t=") {
            timestamp = Some(rest);
        } else if let Some(rest) = part.strip_prefix("v1=") {
            signatures.push(rest);
        }
    }

    let timestamp = timestamp.ok_or(WebhookSignatureError::MissingTimestamp)?;
    if signatures.is_empty() {
        return Err(WebhookSignatureError::MissingSignature);
    }

    let timestamp_value: i64 = timestamp
        .parse()
        .map_err(|_| WebhookSignatureError::InvalidTimestamp)?;
    let age_secs = now_ts - timestamp_value;
    if age_secs > tolerance_secs || age_secs < -WEBHOOK_FUTURE_SKEW_SECS {
        return Err(WebhookSignatureError::TimestampOutOfTolerance { age_secs });
    }

    let mut mac = HmacSha256::new_from_slice(webhook_secret.as_bytes())
        .map_err(|_| WebhookSignatureError::InvalidSecret)?;
    mac.update(timestamp.as_bytes());
    mac.update(b".");
    mac.update(payload);

    // Stripe sends several v1 entries while a secret is being rolled.
    let matched = signatures.iter().any(|signature| {
        hex::decode(signature)
            .map(|provided| mac.clone().verify_slice(&provided).is_ok())
            .unwrap_or(false)
    });
    if !matched {
        return Err(WebhookSignatureError::Mismatch);
    }

    serde_json::from_slice(payload)
        .map_err(|err| WebhookSignatureError::InvalidPayload(err.to_string()))
}

impl StripeClient {
    pub fn new(config: StripeClientConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.http_timeout_secs))
            .build()?;

        Ok(Self {
            http,
            secret_key: config.secret_key,
            webhook_secret: config.webhook_secret,
            success_url: config.success_url,
            cancel_url: config.cancel_url,
            webhook_tolerance_secs: config.webhook_tolerance_secs,
        })
    }

    async fn ensure_success(
        resp: reqwest::Response,
        context: &str,
    ) -> Result<reqwest::Response> {
        if resp.status().is_success() {
            return Ok(resp);
        }

        let status = resp.status();
        let request_id = resp
            .headers()
            .get("request-id")
            .or_else(|| resp.headers().get("stripe-request-id"))
            .and_then(|value| value.to_str().ok())
            .map(|value| value.to_string());

        let body = match resp.text().await {
            Ok(text) if !text.is_empty() => text,
            Ok(_) => "<empty response body>".to_string(),
            Err(err) => format!("<failed to read response body: {err}>"),
        };

        let details = serde_json::from_str::<StripeErrorEnvelope>(&body)
            .ok()
            .map(|envelope| envelope.error);

        error!(
            status = %status,
            stripe_request_id = ?request_id,
            stripe_error_type = ?details.as_ref().and_then(|d| d.type_.as_deref()),
            stripe_error_code = ?details.as_ref().and_then(|d| d.code.as_deref()),
            stripe_error_param = ?details.as_ref().and_then(|d| d.param.as_deref()),
            stripe_error_message = ?details.as_ref().and_then(|d| d.message.as_deref()),
            context = %context,
            "stripe api request failed"
        );

        anyhow::bail!(
            "Stripe API request failed: {} (status {}, request_id={:?})",
            context,
            status,
            request_id
        );
    }

    fn success_url_with_session_placeholder(&self) -> String {
        let separator = if self.success_url.contains('?') { '&' } else { '?' };
        format!("{}{}session_id={{CHECKOUT_SESSION_ID}}", self.success_url, separator)
    }

    fn checkout_form(&self, request: CheckoutSessionRequest) -> Vec<(String, String)> {
        let mut body: Vec<(String, String)> = vec![
            ("mode".to_string(), "payment".to_string()),
            ("line_items[0][quantity]".to_string(), "1".to_string()),
            (
                "success_url".to_string(),
                self.success_url_with_session_placeholder(),
            ),
            ("cancel_url".to_string(), self.cancel_url.clone()),
            (
                "client_reference_id".to_string(),
                request.client_reference_id,
            ),
        ];

        match request.line_item {
            CheckoutLineItem::Price { price_id } => {
                body.push(("line_items[0][price]".to_string(), price_id));
            }
            CheckoutLineItem::Amount {
                unit_amount,
                currency,
                product_name,
            } => {
                body.push((
                    "line_items[0][price_data][currency]".to_string(),
                    currency,
                ));
                body.push((
                    "line_items[0][price_data][unit_amount]".to_string(),
                    unit_amount.to_string(),
                ));
                body.push((
                    "line_items[0][price_data][product_data][name]".to_string(),
                    product_name,
                ));
            }
        }

        let mut metadata: Vec<(String, String)> = request.metadata.into_iter().collect();
        metadata.sort();
        for (key, value) in metadata {
            body.push((format!("metadata[{}]", key), value));
        }

        body
    }

    /// Creates a one-off payment Checkout Session.
    pub async fn create_checkout_session(
        &self,
        request: CheckoutSessionRequest,
    ) -> Result<CreatedCheckoutSession> {
        // https://stripe.com/docs/api/checkout/sessions/create
        let body = self.checkout_form(request);

        let resp = self
            .http
            .post(format!("{STRIPE_API_BASE}/checkout/sessions"))
            .header(AUTHORIZATION, format!("Bearer {}", self.secret_key))
            .header(CONTENT_TYPE, "application/x-www-form-urlencoded")
            .form(&body)
            .send()
            .await?;
        let resp = Self::ensure_success(resp, "create checkout session").await?;

        let created: CreatedCheckoutSession = resp.json().await?;
        Ok(created)
    }

    pub async fn retrieve_checkout_session(&self, session_id: &str) -> Result<StripeCheckoutSession> {
        // https://stripe.com/docs/api/checkout/sessions/retrieve
        let resp = self
            .http
            .get(checkout_session_url(session_id)?)
            .header(AUTHORIZATION, format!("Bearer {}", self.secret_key))
            .send()
            .await?;
        let resp = Self::ensure_success(resp, "retrieve checkout session").await?;

        let session: StripeCheckoutSession = resp.json().await?;
        Ok(session)
    }

    pub fn verify_webhook_signature(
        &self,
        payload: &[u8],
        signature_header: &str,
    ) -> std::result::Result<StripeEvent, WebhookSignatureError> {
        construct_event(
            payload,
            signature_header,
            &self.webhook_secret,
            self.webhook_tolerance_secs,
            chrono::Utc::now().timestamp(),
        )
    }

    pub fn extract_checkout_session(event: &StripeEvent) -> Option<StripeCheckoutSession> {
        serde_json::from_value(event.data.object.clone()).ok()
    }

    pub fn extract_payment_intent(event: &StripeEvent) -> Option<StripePaymentIntent> {
        serde_json::from_value(event.data.object.clone()).ok()
    }
}
