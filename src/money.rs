//! Integer-cents money handling.
//!
//! All amounts are stored as integer cents internally and cross the JSON
//! boundary as decimal numbers, so `27.00` in a request becomes `2700` and
//! serializes back as `27.0`. Use with serde field attributes:
//!
//! ```ignore
//! #[serde(with = "crate::money")]
//! pub total: Cents,
//! ```

use serde::{Deserialize, Deserializer, Serializer};

pub type Cents = i64;

/// Convert a decimal amount (e.g. `19.99`) to cents, rounding half away from zero.
pub fn from_decimal(amount: f64) -> Cents {
    (amount * 100.0).round() as Cents
}

/// Convert cents back to a decimal amount.
pub fn to_decimal(cents: Cents) -> f64 {
    cents as f64 / 100.0
}

pub fn serialize<S: Serializer>(cents: &Cents, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_f64(to_decimal(*cents))
}

pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Cents, D::Error> {
    f64::deserialize(deserializer).map(from_decimal)
}
