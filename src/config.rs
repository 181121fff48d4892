//! Environment configuration. Secrets are environment-supplied and treated
//! as opaque.

use std::env;
use std::fmt;

use crate::payment::DEFAULT_TOLERANCE_SECS;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    MissingVar(&'static str),
    InvalidVar(&'static str, String),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::MissingVar(name) => {
                write!(f, "missing required environment variable: {}", name)
            }
            ConfigError::InvalidVar(name, value) => {
                write!(f, "invalid value for {}: {}", name, value)
            }
        }
    }
}

impl std::error::Error for ConfigError {}

#[derive(Debug, Clone)]
pub struct Config {
    /// Bind address for the HTTP server.
    pub addr: String,
    /// Shared secret for webhook signature verification.
    pub webhook_secret: String,
    /// Prefix for generated order numbers.
    pub order_prefix: String,
    /// Replay-protection window for webhook timestamps, in seconds.
    pub signature_tolerance_secs: i64,
    /// Seconds between reconciliation drains.
    pub reconcile_interval_secs: u64,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            addr: env::var("ORDERDESK_ADDR").unwrap_or_else(|_| "0.0.0.0:3000".to_string()),
            webhook_secret: env::var("STRIPE_WEBHOOK_SECRET")
                .map_err(|_| ConfigError::MissingVar("STRIPE_WEBHOOK_SECRET"))?,
            order_prefix: env::var("ORDER_PREFIX").unwrap_or_else(|_| "ORD-".to_string()),
            signature_tolerance_secs: parse_var(
                "WEBHOOK_TOLERANCE_SECS",
                DEFAULT_TOLERANCE_SECS,
            )?,
            reconcile_interval_secs: parse_var("RECONCILE_INTERVAL_SECS", 30)?,
        })
    }
}

fn parse_var<T: std::str::FromStr>(name: &'static str, default: T) -> Result<T, ConfigError> {
    match env::var(name) {
        Ok(raw) => raw
            .parse::<T>()
            .map_err(|_| ConfigError::InvalidVar(name, raw)),
        Err(_) => Ok(default),
    }
}
