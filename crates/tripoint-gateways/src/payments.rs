//! Payment gateway client
//!
//! Creates hosted checkout sessions and verifies inbound webhook signatures
//! (`t=...,v1=...` HMAC-SHA256 scheme with a timestamp tolerance). An
//! unverifiable webhook is rejected here and never reaches the booking core.

use async_trait::async_trait;
use chrono::Utc;
use hmac::{Hmac, Mac};
use serde::Deserialize;
use sha2::Sha256;
use tracing::{debug, instrument, warn};
use tripoint_core::models::PaymentKind;
use tripoint_core::traits::{CheckoutRequest, CheckoutSession, PaymentGateway, WebhookEvent};
use tripoint_core::{AppError, AppResult};

type HmacSha256 = Hmac<Sha256>;

/// Maximum accepted age of a webhook timestamp, seconds
const SIGNATURE_TOLERANCE_SECS: i64 = 300;

/// Stripe-style checkout gateway
pub struct StripeCheckoutClient {
    http: reqwest::Client,
    api_base: String,
    secret_key: String,
    webhook_secret: String,
    success_url_base: String,
    currency: String,
}

#[derive(Debug, Deserialize)]
struct RawSession {
    id: String,
    url: String,
}

#[derive(Debug, Deserialize)]
struct RawWebhookEnvelope {
    id: String,
    #[serde(rename = "type")]
    event_type: String,
    data: RawWebhookData,
}

#[derive(Debug, Deserialize)]
struct RawWebhookData {
    object: RawWebhookSession,
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
struct RawWebhookSession {
    id: String,
    metadata: RawMetadata,
    amount_total: Option<i64>,
    payment_intent: Option<String>,
    customer: Option<String>,
    customer_details: Option<RawCustomerDetails>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
struct RawMetadata {
    booking_id: Option<String>,
    payment_type: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
struct RawCustomerDetails {
    email: Option<String>,
}

impl StripeCheckoutClient {
    /// Create a checkout client
    pub fn new(
        api_base: &str,
        secret_key: &str,
        webhook_secret: &str,
        success_url_base: &str,
        currency: &str,
    ) -> AppResult<Self> {
        let http = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .build()
            .map_err(|e| AppError::Internal(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            http,
            api_base: api_base.trim_end_matches('/').to_string(),
            secret_key: secret_key.to_string(),
            webhook_secret: webhook_secret.to_string(),
            success_url_base: success_url_base.trim_end_matches('/').to_string(),
            currency: currency.to_string(),
        })
    }

    /// Verify the `t=...,v1=...` signature header against the raw payload
    ///
    /// `now_ts` is injected so the tolerance window is testable.
    fn verify_signature(&self, payload: &[u8], header: &str, now_ts: i64) -> AppResult<()> {
        let mut timestamp: Option<i64> = None;
        let mut signatures: Vec<&str> = Vec::new();

        for part in header.split(',') {
            match part.trim().split_once('=') {
                Some(("t", value)) => timestamp = value.parse().ok(),
                Some(("v1", value)) => signatures.push(value),
                _ => {}
            }
        }

        let timestamp = timestamp.ok_or(AppError::InvalidSignature)?;
        if signatures.is_empty() {
            return Err(AppError::InvalidSignature);
        }

        if (now_ts - timestamp).abs() > SIGNATURE_TOLERANCE_SECS {
            warn!("Webhook timestamp outside tolerance");
            return Err(AppError::InvalidSignature);
        }

        let mut mac = HmacSha256::new_from_slice(self.webhook_secret.as_bytes())
            .map_err(|_| AppError::InvalidSignature)?;
        mac.update(timestamp.to_string().as_bytes());
        mac.update(b".");
        mac.update(payload);

        let verified = signatures.iter().any(|sig| {
            hex::decode(sig)
                .ok()
                .map(|bytes| mac.clone().verify_slice(&bytes).is_ok())
                .unwrap_or(false)
        });

        if !verified {
            return Err(AppError::InvalidSignature);
        }

        Ok(())
    }

    /// Compute a valid signature header for a payload (tests)
    #[cfg(test)]
    fn sign(&self, payload: &[u8], timestamp: i64) -> String {
        let mut mac = HmacSha256::new_from_slice(self.webhook_secret.as_bytes())
            .expect("HMAC accepts any key length");
        mac.update(timestamp.to_string().as_bytes());
        mac.update(b".");
        mac.update(payload);
        format!("t={},v1={}", timestamp, hex::encode(mac.finalize().into_bytes()))
    }

    fn parse_event(payload: &[u8]) -> AppResult<WebhookEvent> {
        let envelope: RawWebhookEnvelope = serde_json::from_slice(payload)
            .map_err(|e| AppError::InvalidInput(format!("Malformed webhook payload: {}", e)))?;

        let session = envelope.data.object;
        let customer_id = session
            .customer
            .or_else(|| session.customer_details.and_then(|d| d.email));

        Ok(WebhookEvent {
            id: envelope.id,
            event_type: envelope.event_type,
            session_id: if session.id.is_empty() {
                None
            } else {
                Some(session.id)
            },
            booking_id: session.metadata.booking_id,
            payment_kind: session
                .metadata
                .payment_type
                .as_deref()
                .and_then(PaymentKind::from_str),
            amount_total: session.amount_total,
            payment_intent_id: session.payment_intent,
            customer_id,
        })
    }
}

#[async_trait]
impl PaymentGateway for StripeCheckoutClient {
    #[instrument(skip(self, request), fields(booking_id = %request.booking_id))]
    async fn create_checkout_session(
        &self,
        request: &CheckoutRequest,
    ) -> AppResult<CheckoutSession> {
        debug!(
            "Creating {} checkout session for booking {}",
            request.kind, request.booking_id
        );

        let success_url = format!(
            "{}/pay/{}/success?session_id={{CHECKOUT_SESSION_ID}}",
            self.success_url_base, request.token
        );
        let cancel_url = format!("{}/pay/{}", self.success_url_base, request.token);
        let product_name = match request.kind {
            PaymentKind::Deposit => "Booking deposit",
            PaymentKind::Balance => "Booking balance",
        };
        let amount = request.amount_minor.to_string();
        let kind = request.kind.to_string();

        let form: Vec<(&str, &str)> = vec![
            ("mode", "payment"),
            ("payment_method_types[0]", "card"),
            ("line_items[0][price_data][currency]", self.currency.as_str()),
            ("line_items[0][price_data][unit_amount]", amount.as_str()),
            ("line_items[0][price_data][product_data][name]", product_name),
            (
                "line_items[0][price_data][product_data][description]",
                request.description.as_str(),
            ),
            ("line_items[0][quantity]", "1"),
            ("customer_email", request.customer_email.as_str()),
            ("success_url", success_url.as_str()),
            ("cancel_url", cancel_url.as_str()),
            ("metadata[booking_id]", request.booking_id.as_str()),
            ("metadata[token]", request.token.as_str()),
            ("metadata[payment_type]", kind.as_str()),
        ];

        let session: RawSession = self
            .http
            .post(format!("{}/v1/checkout/sessions", self.api_base))
            .bearer_auth(&self.secret_key)
            .form(&form)
            .send()
            .await
            .map_err(|e| {
                warn!("Checkout session creation failed: {}", e);
                AppError::Upstream(format!("Checkout session creation failed: {}", e))
            })?
            .error_for_status()
            .map_err(|e| AppError::Upstream(format!("Checkout session creation failed: {}", e)))?
            .json()
            .await
            .map_err(|e| AppError::Upstream(format!("Checkout response parse failed: {}", e)))?;

        Ok(CheckoutSession {
            id: session.id,
            url: session.url,
        })
    }

    fn verify_webhook(&self, payload: &[u8], signature_header: &str) -> AppResult<WebhookEvent> {
        self.verify_signature(payload, signature_header, Utc::now().timestamp())?;
        Self::parse_event(payload)
    }
}
