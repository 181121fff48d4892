use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Event type for a completed charge.
pub const PAYMENT_SUCCEEDED: &str = "payment_intent.succeeded";
/// Event type for a failed charge.
pub const PAYMENT_FAILED: &str = "payment_intent.payment_failed";

/// Metadata key under which the storefront stores the serialized checkout
/// payload when it creates the payment intent.
pub const CHECKOUT_METADATA_KEY: &str = "checkout";

/// Provider event envelope, as delivered to the webhook endpoint.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct WebhookEvent {
    pub id: String,
    #[serde(rename = "type")]
    pub event_type: String,
    pub data: EventData,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct EventData {
    pub object: PaymentIntent,
}

/// Provider-side object representing an attempted charge. Treated as opaque
/// apart from the fields this flow reads.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PaymentIntent {
    pub id: String,
    /// Amount in the provider's smallest currency unit (cents).
    pub amount: i64,
    #[serde(default)]
    pub currency: String,
    #[serde(default)]
    pub metadata: HashMap<String, String>,
}

impl PaymentIntent {
    /// The serialized checkout payload stashed in metadata at intent creation.
    pub fn checkout_blob(&self) -> Option<&str> {
        self.metadata.get(CHECKOUT_METADATA_KEY).map(|s| s.as_str())
    }
}
