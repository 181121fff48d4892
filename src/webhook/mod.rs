//! Webhook handler for asynchronous payment-status events.
//!
//! Verifies the provider signature first and fails closed. A confirmed
//! payment creates exactly one order: redeliveries hit the idempotency
//! lookup, and failures after verification are dead-lettered and
//! acknowledged rather than bounced back to the provider.

use std::fmt;
use std::sync::Arc;

use chrono::Utc;
use serde_json::Value;

use crate::checkout::{CheckoutError, CheckoutRequest, CheckoutService};
use crate::payment::signature::{self, SignatureError};
use crate::payment::{
    PaymentIntent, WebhookEvent, DEFAULT_TOLERANCE_SECS, PAYMENT_FAILED, PAYMENT_SUCCEEDED,
};
use crate::reconcile::{DeadLetter, DeadLetterStore, Replay, ReplayError};

/// Errors that bounce a delivery back to the provider with HTTP 400.
/// Everything after successful verification is acknowledged instead.
#[derive(Debug)]
pub enum WebhookError {
    Signature(SignatureError),
    BadEnvelope(String),
}

impl fmt::Display for WebhookError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WebhookError::Signature(e) => write!(f, "signature verification failed: {}", e),
            WebhookError::BadEnvelope(msg) => write!(f, "unparsable event envelope: {}", msg),
        }
    }
}

impl std::error::Error for WebhookError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            WebhookError::Signature(e) => Some(e),
            WebhookError::BadEnvelope(_) => None,
        }
    }
}

impl From<SignatureError> for WebhookError {
    fn from(err: SignatureError) -> Self {
        WebhookError::Signature(err)
    }
}

/// What a verified delivery amounted to. All variants acknowledge with
/// `{"received": true}`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WebhookOutcome {
    /// A new order was created; carries the order number.
    OrderCreated(String),
    /// Redelivery of a payment that already has an order.
    AlreadyProcessed(String),
    /// Order creation failed; the event was dead-lettered for replay.
    Deferred(String),
    /// Payment failed at the provider. Logged only.
    PaymentFailed(String),
    /// Event type this flow does not act on.
    Unhandled(String),
}

#[derive(Clone)]
pub struct WebhookHandler {
    secret: String,
    tolerance_secs: i64,
    checkout: Arc<CheckoutService>,
    dead_letters: Arc<DeadLetterStore>,
}

impl WebhookHandler {
    pub fn new(
        secret: impl Into<String>,
        checkout: Arc<CheckoutService>,
        dead_letters: Arc<DeadLetterStore>,
    ) -> Self {
        Self {
            secret: secret.into(),
            tolerance_secs: DEFAULT_TOLERANCE_SECS,
            checkout,
            dead_letters,
        }
    }

    pub fn with_tolerance_secs(mut self, tolerance_secs: i64) -> Self {
        self.tolerance_secs = tolerance_secs;
        self
    }

    pub fn dead_letters(&self) -> &Arc<DeadLetterStore> {
        &self.dead_letters
    }

    /// Handle one raw delivery: verify, parse, dispatch on event type.
    pub fn handle(
        &self,
        payload: &[u8],
        signature_header: &str,
    ) -> Result<WebhookOutcome, WebhookError> {
        signature::verify(
            payload,
            signature_header,
            &self.secret,
            self.tolerance_secs,
            Utc::now().timestamp(),
        )?;

        let event: WebhookEvent = serde_json::from_slice(payload)
            .map_err(|e| WebhookError::BadEnvelope(e.to_string()))?;

        match event.event_type.as_str() {
            PAYMENT_SUCCEEDED => Ok(self.on_payment_succeeded(&event.data.object)),
            PAYMENT_FAILED => {
                tracing::warn!(
                    intent_id = %event.data.object.id,
                    amount = event.data.object.amount,
                    "payment failed at provider; no order created"
                );
                Ok(WebhookOutcome::PaymentFailed(event.data.object.id.clone()))
            }
            other => {
                tracing::debug!(event_type = other, "ignoring unhandled event type");
                Ok(WebhookOutcome::Unhandled(other.to_string()))
            }
        }
    }

    fn on_payment_succeeded(&self, intent: &PaymentIntent) -> WebhookOutcome {
        match self.checkout.orders().find_by_payment_intent(&intent.id) {
            Ok(Some(existing)) => {
                tracing::info!(
                    intent_id = %intent.id,
                    order_number = %existing.order_number,
                    "redelivered payment confirmation; order already exists"
                );
                return WebhookOutcome::AlreadyProcessed(existing.order_number);
            }
            Ok(None) => {}
            Err(err) => return self.defer(intent, err.to_string()),
        }

        match fulfill_intent(&self.checkout, intent) {
            Ok(Fulfillment::Created(order_number)) => {
                tracing::info!(
                    intent_id = %intent.id,
                    order_number = %order_number,
                    "order created from payment confirmation"
                );
                WebhookOutcome::OrderCreated(order_number)
            }
            Ok(Fulfillment::Existing(order_number)) => {
                tracing::info!(
                    intent_id = %intent.id,
                    order_number = %order_number,
                    "concurrent delivery lost the insert race; order already exists"
                );
                WebhookOutcome::AlreadyProcessed(order_number)
            }
            Err(err) => self.defer(intent, err.to_string()),
        }
    }

    /// Record the failure for replay and acknowledge anyway. The provider
    /// sees success either way; losing the dead letter on top of the
    /// original failure is the one thing worth shouting about.
    fn defer(&self, intent: &PaymentIntent, error: String) -> WebhookOutcome {
        tracing::error!(
            intent_id = %intent.id,
            %error,
            "payment confirmed but order creation failed; dead-lettering"
        );
        let payload = serde_json::to_value(intent).unwrap_or(Value::Null);
        if let Err(err) = self.dead_letters.record(&intent.id, payload, &error) {
            tracing::error!(
                intent_id = %intent.id,
                %err,
                "failed to record dead letter; payment is unreconciled"
            );
        }
        WebhookOutcome::Deferred(intent.id.clone())
    }
}

/// How a fulfillment attempt ended: a fresh order, or the existing one found
/// when the insert-time intent-id constraint fired.
enum Fulfillment {
    Created(String),
    Existing(String),
}

/// Shared by the webhook path and dead-letter replay: pull the checkout blob
/// off the intent's metadata and run it through order creation. Losing the
/// insert race to a concurrent delivery of the same intent is not a failure.
fn fulfill_intent(
    checkout: &CheckoutService,
    intent: &PaymentIntent,
) -> Result<Fulfillment, ReplayError> {
    let blob = intent
        .checkout_blob()
        .ok_or_else(|| ReplayError(format!("intent {} has no checkout metadata", intent.id)))?;
    let request: CheckoutRequest = serde_json::from_str(blob)
        .map_err(|e| ReplayError(format!("unparsable checkout metadata: {}", e)))?;
    match checkout.fulfill(request, &intent.id) {
        Ok(order) => Ok(Fulfillment::Created(order.order_number)),
        Err(CheckoutError::AlreadyPlaced { order_number, .. }) => {
            Ok(Fulfillment::Existing(order_number))
        }
        Err(e) => Err(ReplayError(e.to_string())),
    }
}

impl Replay for WebhookHandler {
    fn replay(&self, letter: &DeadLetter) -> Result<String, ReplayError> {
        let intent: PaymentIntent = serde_json::from_value(letter.payload.clone())
            .map_err(|e| ReplayError(format!("unparsable dead letter payload: {}", e)))?;

        // The order may have materialized since the letter was recorded.
        match self.checkout.orders().find_by_payment_intent(&intent.id) {
            Ok(Some(existing)) => return Ok(existing.order_number),
            Ok(None) => {}
            Err(err) => return Err(ReplayError(err.to_string())),
        }

        match fulfill_intent(&self.checkout, &intent)? {
            Fulfillment::Created(order_number) | Fulfillment::Existing(order_number) => {
                Ok(order_number)
            }
        }
    }
}
