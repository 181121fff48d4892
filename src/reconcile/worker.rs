use std::fmt;
use std::sync::Arc;

use chrono::Duration;

use crate::error::StoreError;

use super::dead_letter::{DeadLetter, DeadLetterStore};

/// Error from replaying one dead letter.
#[derive(Debug)]
pub struct ReplayError(pub String);

impl fmt::Display for ReplayError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::error::Error for ReplayError {}

/// Replays a dead-lettered payment confirmation through order creation.
/// Returns the order number (created now, or found via the idempotency
/// lookup if the order materialized since the letter was recorded).
pub trait Replay {
    fn replay(&self, letter: &DeadLetter) -> Result<String, ReplayError>;
}

/// Outcome of processing one claimed letter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LetterOutcome {
    Resolved,
    Released,
    Abandoned,
    Skipped,
}

/// Result of a batch drain.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct DrainResult {
    pub claimed: usize,
    pub resolved: usize,
    pub released: usize,
    pub abandoned: usize,
}

/// Periodic reconciliation worker.
///
/// Claims a batch of replayable letters from the store (taking a lease so
/// concurrent workers never double-process), replays each through the
/// order-creation path, and writes the outcome back: success resolves the
/// letter, failure releases it for retry until `max_attempts`, after which
/// it is abandoned for manual inspection.
pub struct ReconcileWorker<R> {
    store: Arc<DeadLetterStore>,
    replayer: R,
    worker_id: String,
    batch_size: usize,
    lease: Duration,
    max_attempts: u32,
}

impl<R> ReconcileWorker<R> {
    pub fn new(store: Arc<DeadLetterStore>, replayer: R) -> Self {
        Self {
            store,
            replayer,
            worker_id: format!("reconcile-{}", std::process::id()),
            batch_size: 10,
            lease: Duration::seconds(60),
            max_attempts: 3,
        }
    }

    pub fn with_worker_id(mut self, id: impl Into<String>) -> Self {
        self.worker_id = id.into();
        self
    }

    pub fn with_batch_size(mut self, size: usize) -> Self {
        self.batch_size = size;
        self
    }

    pub fn with_lease(mut self, lease: Duration) -> Self {
        self.lease = lease;
        self
    }

    pub fn with_max_attempts(mut self, max: u32) -> Self {
        self.max_attempts = max;
        self
    }

    pub fn worker_id(&self) -> &str {
        &self.worker_id
    }
}

impl<R: Replay> ReconcileWorker<R> {
    /// Replay one claimed letter and record the outcome on it.
    pub fn process_one(&self, letter: &mut DeadLetter) -> LetterOutcome {
        if !letter.is_in_flight() {
            return LetterOutcome::Skipped;
        }

        match self.replayer.replay(letter) {
            Ok(order_number) => {
                tracing::info!(
                    key = %letter.key,
                    order_number = %order_number,
                    attempts = letter.attempts,
                    "dead letter reconciled"
                );
                letter.resolve();
                LetterOutcome::Resolved
            }
            Err(err) => {
                if letter.attempts >= self.max_attempts {
                    tracing::error!(
                        key = %letter.key,
                        attempts = letter.attempts,
                        %err,
                        "dead letter abandoned after max attempts"
                    );
                    letter.abandon(err.to_string());
                    LetterOutcome::Abandoned
                } else {
                    tracing::warn!(
                        key = %letter.key,
                        attempts = letter.attempts,
                        %err,
                        "dead letter replay failed; released for retry"
                    );
                    letter.release(err.to_string());
                    LetterOutcome::Released
                }
            }
        }
    }

    /// Claim and replay one batch.
    pub fn drain(&self) -> Result<DrainResult, StoreError> {
        let mut letters =
            self.store
                .claim_batch(&self.worker_id, self.batch_size, self.lease)?;

        let mut result = DrainResult {
            claimed: letters.len(),
            ..DrainResult::default()
        };
        for letter in &mut letters {
            match self.process_one(letter) {
                LetterOutcome::Resolved => result.resolved += 1,
                LetterOutcome::Released => result.released += 1,
                LetterOutcome::Abandoned => result.abandoned += 1,
                LetterOutcome::Skipped => {}
            }
            self.store.save(letter)?;
        }
        Ok(result)
    }
}
