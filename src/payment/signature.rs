//! Webhook signature verification.
//!
//! The provider signs each delivery with an HMAC-SHA256 over
//! `"{timestamp}.{payload}"` and sends it as a header of the form
//! `t=<unix seconds>,v1=<hex digest>`. Verification fails closed: any
//! missing or malformed part, an out-of-tolerance timestamp, or a digest
//! mismatch rejects the delivery.

use std::fmt;

use hmac::{Hmac, Mac};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// Replay-protection window for the signed timestamp.
pub const DEFAULT_TOLERANCE_SECS: i64 = 300;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SignatureError {
    MissingTimestamp,
    MissingSignature,
    BadTimestamp(String),
    /// Timestamp is outside the allowed window (replay protection).
    OutsideTolerance { age_secs: i64 },
    Mismatch,
    InvalidSecret,
}

impl fmt::Display for SignatureError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SignatureError::MissingTimestamp => write!(f, "signature header missing timestamp"),
            SignatureError::MissingSignature => write!(f, "signature header missing v1 digest"),
            SignatureError::BadTimestamp(t) => write!(f, "unparsable signature timestamp: {}", t),
            SignatureError::OutsideTolerance { age_secs } => {
                write!(f, "signature timestamp outside tolerance ({}s old)", age_secs)
            }
            SignatureError::Mismatch => write!(f, "signature does not match payload"),
            SignatureError::InvalidSecret => write!(f, "webhook secret rejected by HMAC"),
        }
    }
}

impl std::error::Error for SignatureError {}

/// Verify a signed webhook delivery against the shared secret.
///
/// `now` is the verifier's unix-seconds clock, passed in so tests control it.
/// Digest comparison is constant-time (via `Mac::verify_slice`). Multiple
/// `v1` entries are accepted if any matches, which is how providers roll
/// secrets without dropping deliveries.
pub fn verify(
    payload: &[u8],
    signature_header: &str,
    secret: &str,
    tolerance_secs: i64,
    now: i64,
) -> Result<(), SignatureError> {
    let (timestamp, candidates) = parse_header(signature_header)?;

    let age = now - timestamp;
    if age.abs() > tolerance_secs {
        return Err(SignatureError::OutsideTolerance { age_secs: age });
    }

    for candidate in &candidates {
        let Ok(expected) = hex::decode(candidate) else {
            continue;
        };
        let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
            .map_err(|_| SignatureError::InvalidSecret)?;
        mac.update(timestamp.to_string().as_bytes());
        mac.update(b".");
        mac.update(payload);
        if mac.verify_slice(&expected).is_ok() {
            return Ok(());
        }
    }

    Err(SignatureError::Mismatch)
}

/// Produce a `t=...,v1=...` header value for a payload. Used when acting as
/// the signing side (test harnesses, replay tooling).
pub fn sign(payload: &[u8], secret: &str, timestamp: i64) -> Result<String, SignatureError> {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|_| SignatureError::InvalidSecret)?;
    mac.update(timestamp.to_string().as_bytes());
    mac.update(b".");
    mac.update(payload);
    Ok(format!(
        "t={},v1={}",
        timestamp,
        hex::encode(mac.finalize().into_bytes())
    ))
}

fn parse_header(header: &str) -> Result<(i64, Vec<&str>), SignatureError> {
    let mut timestamp: Option<&str> = None;
    let mut candidates = Vec::new();

    for part in header.split(',') {
        match part.trim().split_once('=') {
            Some(("t", value)) => timestamp = Some(value),
            Some(("v1", value)) => candidates.push(value),
            _ => {}
        }
    }

    let timestamp = timestamp.ok_or(SignatureError::MissingTimestamp)?;
    if candidates.is_empty() {
        return Err(SignatureError::MissingSignature);
    }
    let timestamp = timestamp
        .parse::<i64>()
        .map_err(|_| SignatureError::BadTimestamp(timestamp.to_string()))?;

    Ok((timestamp, candidates))
}
