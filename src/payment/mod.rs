//! Payment-gateway boundary: signed webhook verification and the event
//! envelope this flow reads.
//!
//! Payment-intent creation and retrieval belong to the storefront and the
//! provider SDK; they are consumed as opaque external services and not
//! reimplemented here.

mod event;
pub mod signature;

pub use event::{
    EventData, PaymentIntent, WebhookEvent, CHECKOUT_METADATA_KEY, PAYMENT_FAILED,
    PAYMENT_SUCCEEDED,
};
pub use signature::{SignatureError, DEFAULT_TOLERANCE_SECS};
