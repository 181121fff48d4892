use std::fmt;

/// Errors surfaced by the in-process document stores.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    LockPoisoned(&'static str),
    /// The order-number unique constraint was violated. The generated number
    /// is best-effort unique; this is the backstop that turns a collision
    /// into a write failure instead of a silent overwrite.
    DuplicateOrderNumber(String),
    /// An order for this payment intent already exists. Enforced at insert
    /// time under the write lock, so concurrent deliveries of the same
    /// payment confirmation cannot both insert.
    DuplicatePaymentIntent {
        intent_id: String,
        order_number: String,
    },
    UnknownProduct(String),
    /// A conditional stock decrement found fewer units than requested.
    OutOfStock {
        product_id: String,
        requested: u32,
        available: i64,
    },
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoreError::LockPoisoned(operation) => {
                write!(f, "store lock poisoned during {}", operation)
            }
            StoreError::DuplicateOrderNumber(number) => {
                write!(f, "order number already exists: {}", number)
            }
            StoreError::DuplicatePaymentIntent {
                intent_id,
                order_number,
            } => write!(
                f,
                "payment intent {} already has order {}",
                intent_id, order_number
            ),
            StoreError::UnknownProduct(id) => write!(f, "unknown product: {}", id),
            StoreError::OutOfStock {
                product_id,
                requested,
                available,
            } => write!(
                f,
                "insufficient stock for product {} (requested {}, available {})",
                product_id, requested, available
            ),
        }
    }
}

impl std::error::Error for StoreError {}
