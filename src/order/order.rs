use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::money::Cents;

use super::status::{OrderStatus, PaymentStatus, StatusChange};

/// Denormalized recipient snapshot captured at order time.
///
/// Not a live reference to a customer profile — later edits to the customer's
/// account never rewrite a placed order.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomerInfo {
    pub full_name: String,
    pub email: String,
    pub phone: String,
    pub address: String,
    pub city: String,
    pub zipcode: String,
    pub country: String,
}

/// One line item within an order. Title and unit price are snapshots of the
/// product at order time; `subtotal` is always derived server-side as
/// price × quantity.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderItem {
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
    #[serde(with = "crate::money")]
    pub subtotal: Cents,
}

/// Pricing breakdown. All amounts are integer cents and non-negative;
/// `total` is verified against the server-side recomputation at checkout.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Pricing {
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
}

/// Payment sub-record.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentRecord {
    pub method: String,
    pub status: PaymentStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transaction_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub paid_at: Option<DateTime<Utc>>,
}

/// One customer purchase.
///
/// Identified by a generated human-readable order number, distinct from any
/// store-internal key. Created once at checkout completion; mutated only by
/// admin status updates; deleted only by explicit admin delete.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    pub order_number: String,
    pub customer: CustomerInfo,
    pub items: Vec<OrderItem>,
    pub pricing: Pricing,
    pub payment: PaymentRecord,
    pub status: OrderStatus,
    pub status_history: Vec<StatusChange>,
    pub created_at: DateTime<Utc>,
}

impl Order {
    /// Create an order with its history seeded from the initial status, so the
    /// log is complete from the first transition.
    pub fn new(
        order_number: impl Into<String>,
        customer: CustomerInfo,
        items: Vec<OrderItem>,
        pricing: Pricing,
        payment: PaymentRecord,
        status: OrderStatus,
    ) -> Self {
        Self {
            order_number: order_number.into(),
            customer,
            items,
            pricing,
            payment,
            status,
            status_history: vec![StatusChange::now(
                status,
                Some("order created".to_string()),
                None,
            )],
            created_at: Utc::now(),
        }
    }

    /// Set the order status and append to the history log.
    ///
    /// Every status-changing path must go through here — setting `status`
    /// directly would leave the history incomplete.
    pub fn set_status(
        &mut self,
        status: OrderStatus,
        note: Option<String>,
        actor: Option<String>,
    ) {
        self.status = status;
        self.status_history.push(StatusChange::now(status, note, actor));
    }
}
