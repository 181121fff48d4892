//! Dead-letter store and reconciliation worker.
//!
//! The webhook handler acknowledges every signed delivery so the provider
//! never enters a redelivery storm, which means a confirmed payment can fail
//! to produce an order (bad metadata, persistence failure). Those failures
//! land here instead of disappearing: recorded per payment intent id, claimed
//! under a lease, and replayed until an order exists or attempts run out.

mod dead_letter;
mod worker;

pub use dead_letter::{DeadLetter, DeadLetterStatus, DeadLetterStore};
pub use worker::{DrainResult, LetterOutcome, ReconcileWorker, Replay, ReplayError};
