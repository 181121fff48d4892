use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Overall order lifecycle state.
///
/// The happy path runs pending → confirmed → processing → shipped → delivered,
/// with cancelled/returned as terminal alternates. No state machine is
/// enforced: the admin status update may set any status from any status.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderStatus {
    #[default]
    Pending,
    Confirmed,
    Processing,
    Shipped,
    Delivered,
    Cancelled,
    Returned,
}

/// Payment state within an order's payment sub-record.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentStatus {
    #[default]
    Pending,
    Processing,
    Completed,
    Failed,
    Refunded,
}

/// One entry in an order's append-only status history.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusChange {
    pub status: OrderStatus,
    pub at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub actor: Option<String>,
}

impl StatusChange {
    pub fn now(status: OrderStatus, note: Option<String>, actor: Option<String>) -> Self {
        Self {
            status,
            at: Utc::now(),
            note,
            actor,
        }
    }
}
