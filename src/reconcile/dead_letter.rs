use std::collections::HashMap;
use std::sync::RwLock;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::StoreError;

/// Status of a dead-lettered webhook delivery.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeadLetterStatus {
    #[default]
    Pending,
    InFlight,
    Resolved,
    Abandoned,
}

/// A payment confirmation that failed to produce an order record, kept for
/// replay. Keyed by the provider's payment intent id, which doubles as the
/// idempotency key: one letter per confirmed payment, and replay finds any
/// order that was created in the meantime.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DeadLetter {
    pub key: String,
    /// Serialized payment intent (id, amount, metadata) — everything replay
    /// needs to reconstruct the order.
    pub payload: Value,
    pub status: DeadLetterStatus,
    pub attempts: u32,
    pub last_error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub worker_id: Option<String>,
    pub leased_until: Option<DateTime<Utc>>,
}

impl DeadLetter {
    pub fn new(key: impl Into<String>, payload: Value, error: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            payload,
            status: DeadLetterStatus::Pending,
            attempts: 0,
            last_error: Some(error.into()),
            created_at: Utc::now(),
            worker_id: None,
            leased_until: None,
        }
    }

    pub fn is_pending(&self) -> bool {
        self.status == DeadLetterStatus::Pending
    }

    pub fn is_in_flight(&self) -> bool {
        self.status == DeadLetterStatus::InFlight
    }

    pub fn is_resolved(&self) -> bool {
        self.status == DeadLetterStatus::Resolved
    }

    pub fn is_abandoned(&self) -> bool {
        self.status == DeadLetterStatus::Abandoned
    }

    /// Lease expired while in flight — the claiming worker died mid-replay.
    pub fn lease_expired(&self, now: DateTime<Utc>) -> bool {
        self.is_in_flight() && self.leased_until.map(|until| until < now).unwrap_or(true)
    }

    pub fn claim(&mut self, worker_id: &str, lease: Duration) {
        self.status = DeadLetterStatus::InFlight;
        self.attempts += 1;
        self.worker_id = Some(worker_id.to_string());
        self.leased_until = Some(Utc::now() + lease);
    }

    pub fn resolve(&mut self) {
        self.status = DeadLetterStatus::Resolved;
        self.worker_id = None;
        self.leased_until = None;
    }

    /// Back to pending for another attempt.
    pub fn release(&mut self, error: impl Into<String>) {
        self.status = DeadLetterStatus::Pending;
        self.last_error = Some(error.into());
        self.worker_id = None;
        self.leased_until = None;
    }

    /// Out of attempts; parked for manual inspection.
    pub fn abandon(&mut self, error: impl Into<String>) {
        self.status = DeadLetterStatus::Abandoned;
        self.last_error = Some(error.into());
        self.worker_id = None;
        self.leased_until = None;
    }
}

/// Durable (process-lifetime) store of failed reconciliation attempts.
pub struct DeadLetterStore {
    letters: RwLock<HashMap<String, DeadLetter>>,
}

impl DeadLetterStore {
    pub fn new() -> Self {
        Self {
            letters: RwLock::new(HashMap::new()),
        }
    }

    /// Record a failed delivery. Idempotent per key: a redelivered failure
    /// for an already-recorded payment updates the error note but does not
    /// reset replay progress. Returns whether a new letter was created.
    pub fn record(
        &self,
        key: &str,
        payload: Value,
        error: &str,
    ) -> Result<bool, StoreError> {
        let mut letters = self
            .letters
            .write()
            .map_err(|_| StoreError::LockPoisoned("dead letter record"))?;
        match letters.get_mut(key) {
            Some(existing) => {
                if !existing.is_resolved() {
                    existing.last_error = Some(error.to_string());
                }
                Ok(false)
            }
            None => {
                letters.insert(key.to_string(), DeadLetter::new(key, payload, error));
                Ok(true)
            }
        }
    }

    pub fn get(&self, key: &str) -> Result<Option<DeadLetter>, StoreError> {
        let letters = self
            .letters
            .read()
            .map_err(|_| StoreError::LockPoisoned("dead letter read"))?;
        Ok(letters.get(key).cloned())
    }

    /// Claim up to `limit` replayable letters (pending, or in flight with an
    /// expired lease) for the given worker. Claims happen under the write
    /// lock so two workers never take the same letter.
    pub fn claim_batch(
        &self,
        worker_id: &str,
        limit: usize,
        lease: Duration,
    ) -> Result<Vec<DeadLetter>, StoreError> {
        let mut letters = self
            .letters
            .write()
            .map_err(|_| StoreError::LockPoisoned("dead letter claim"))?;
        let now = Utc::now();

        let mut claimed = Vec::new();
        for letter in letters.values_mut() {
            if claimed.len() >= limit {
                break;
            }
            if letter.is_pending() || letter.lease_expired(now) {
                letter.claim(worker_id, lease);
                claimed.push(letter.clone());
            }
        }
        Ok(claimed)
    }

    /// Write back a processed letter.
    pub fn save(&self, letter: &DeadLetter) -> Result<(), StoreError> {
        let mut letters = self
            .letters
            .write()
            .map_err(|_| StoreError::LockPoisoned("dead letter save"))?;
        letters.insert(letter.key.clone(), letter.clone());
        Ok(())
    }

    pub fn pending_count(&self) -> Result<usize, StoreError> {
        let letters = self
            .letters
            .read()
            .map_err(|_| StoreError::LockPoisoned("dead letter count"))?;
        Ok(letters.values().filter(|l| l.is_pending()).count())
    }

    /// Letters parked after exhausting replay attempts, for manual review.
    pub fn abandoned(&self) -> Result<Vec<DeadLetter>, StoreError> {
        let letters = self
            .letters
            .read()
            .map_err(|_| StoreError::LockPoisoned("dead letter list"))?;
        Ok(letters.values().filter(|l| l.is_abandoned()).cloned().collect())
    }
}

impl Default for DeadLetterStore {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn record_is_idempotent_per_key() {
        let store = DeadLetterStore::new();
        assert!(store.record("pi_1", json!({"id": "pi_1"}), "boom").unwrap());
        assert!(!store.record("pi_1", json!({"id": "pi_1"}), "boom again").unwrap());

        let letter = store.get("pi_1").unwrap().unwrap();
        assert_eq!(letter.last_error.as_deref(), Some("boom again"));
        assert_eq!(store.pending_count().unwrap(), 1);
    }

    #[test]
    fn claim_marks_in_flight_and_counts_attempts() {
        let store = DeadLetterStore::new();
        store.record("pi_1", json!({}), "boom").unwrap();

        let claimed = store
            .claim_batch("worker-1", 10, Duration::seconds(60))
            .unwrap();
        assert_eq!(claimed.len(), 1);
        assert_eq!(claimed[0].attempts, 1);
        assert!(claimed[0].is_in_flight());

        // already claimed, lease still valid — nothing left to claim
        let again = store
            .claim_batch("worker-2", 10, Duration::seconds(60))
            .unwrap();
        assert!(again.is_empty());
    }

    #[test]
    fn expired_lease_is_reclaimable() {
        let store = DeadLetterStore::new();
        store.record("pi_1", json!({}), "boom").unwrap();

        let claimed = store
            .claim_batch("worker-1", 10, Duration::seconds(-1))
            .unwrap();
        assert_eq!(claimed.len(), 1);

        let reclaimed = store
            .claim_batch("worker-2", 10, Duration::seconds(60))
            .unwrap();
        assert_eq!(reclaimed.len(), 1);
        assert_eq!(reclaimed[0].attempts, 2);
        assert_eq!(reclaimed[0].worker_id.as_deref(), Some("worker-2"));
    }

    #[test]
    fn lifecycle_transitions() {
        let mut letter = DeadLetter::new("pi_1", json!({}), "boom");
        assert!(letter.is_pending());

        letter.claim("w", Duration::seconds(60));
        assert!(letter.is_in_flight());

        letter.release("retry later");
        assert!(letter.is_pending());
        assert_eq!(letter.last_error.as_deref(), Some("retry later"));

        letter.claim("w", Duration::seconds(60));
        letter.abandon("max attempts");
        assert!(letter.is_abandoned());

        let mut other = DeadLetter::new("pi_2", json!({}), "boom");
        other.claim("w", Duration::seconds(60));
        other.resolve();
        assert!(other.is_resolved());
        assert!(other.leased_until.is_none());
    }

    #[test]
    fn resolved_letter_not_reclaimed_or_rerecorded() {
        let store = DeadLetterStore::new();
        store.record("pi_1", json!({}), "boom").unwrap();
        let mut letter = store
            .claim_batch("w", 1, Duration::seconds(60))
            .unwrap()
            .remove(0);
        letter.resolve();
        store.save(&letter).unwrap();

        assert!(store
            .claim_batch("w", 10, Duration::seconds(60))
            .unwrap()
            .is_empty());
        // a late redelivery of the same failure does not reopen it
        assert!(!store.record("pi_1", json!({}), "late").unwrap());
        assert!(store.get("pi_1").unwrap().unwrap().is_resolved());
    }
}
