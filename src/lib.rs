//! orderdesk — order placement and payment reconciliation for a multi-vendor
//! storefront.
//!
//! One flow, end to end: a guest checkout or a signed payment-provider
//! webhook produces an order record, stock is reserved with a conditional
//! decrement that can never oversell, and any confirmed payment that fails
//! to produce an order is dead-lettered and replayed until it does.

pub mod catalog;
pub mod checkout;
pub mod config;
pub mod http;
pub mod money;
pub mod order;
pub mod payment;
pub mod reconcile;
pub mod store;
pub mod webhook;

mod error;

pub use catalog::{Product, ProductStore};
pub use checkout::{CheckoutError, CheckoutRequest, CheckoutService};
pub use config::Config;
pub use error::StoreError;
pub use order::{Order, OrderNumberGenerator, OrderStatus, PaymentStatus};
pub use reconcile::{DeadLetterStore, ReconcileWorker};
pub use store::OrderStore;
pub use webhook::{WebhookHandler, WebhookOutcome};
