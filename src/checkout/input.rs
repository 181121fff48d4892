use serde::{Deserialize, Serialize};

use crate::money::Cents;
use crate::order::{CustomerInfo, PaymentStatus};

/// Guest-checkout payload: customer contact fields, line items, client-side
/// pricing breakdown, and (when the storefront already created a payment
/// intent) the provider reference and payment status.
///
/// Serializable both ways because the same struct is stashed as the
/// `checkout` metadata blob on payment intents and replayed from dead
/// letters.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutRequest {
    pub customer: CustomerInfo,
    pub items: Vec<CheckoutItem>,
    #[serde(with = "crate::money")]
    pub subtotal: Cents,
    #[serde(with = "crate::money")]
    pub shipping: Cents,
    #[serde(with = "crate::money")]
    pub tax: Cents,
    #[serde(default, with = "crate::money")]
    pub discount: Cents,
    #[serde(with = "crate::money")]
    pub total: Cents,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payment_intent_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payment_status: Option<PaymentStatus>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutItem {
    /// Product reference for stock reservation. Items without one (ad-hoc or
    /// legacy listings) skip inventory entirely.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub product_id: Option<String>,
    pub title: String,
    #[serde(with = "crate::money")]
    pub price: Cents,
    pub quantity: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub selected_capacity: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub selected_color: Option<String>,
}
