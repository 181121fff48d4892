//! Order domain model: the order document, its status vocabulary, and the
//! order-number generator.

mod number;
mod order;
mod status;

pub use number::OrderNumberGenerator;
pub use order::{CustomerInfo, Order, OrderItem, PaymentRecord, Pricing};
pub use status::{OrderStatus, PaymentStatus, StatusChange};
