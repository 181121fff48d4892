use chrono::Utc;
use rand::Rng;

/// Generates human-readable order numbers: configured prefix, millisecond
/// timestamp, zero-padded random suffix (e.g. `ORD-17253008123450042`).
///
/// This is a best-effort uniqueness strategy, not a guaranteed-unique key.
/// The order store's unique constraint is the backstop: a collision surfaces
/// as a write error, never a silent overwrite.
///
/// Both the suffix and the clock are injectable so tests can force collisions
/// deterministically.
pub struct OrderNumberGenerator {
    prefix: String,
    suffix: Box<dyn Fn() -> u32 + Send + Sync>,
    clock: Box<dyn Fn() -> i64 + Send + Sync>,
}

impl OrderNumberGenerator {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            suffix: Box::new(|| rand::rng().random_range(0..10_000)),
            clock: Box::new(|| Utc::now().timestamp_millis()),
        }
    }

    /// Replace the random suffix source.
    pub fn with_suffix_source<F>(mut self, suffix: F) -> Self
    where
        F: Fn() -> u32 + Send + Sync + 'static,
    {
        self.suffix = Box::new(suffix);
        self
    }

    /// Replace the millisecond clock.
    pub fn with_clock<F>(mut self, clock: F) -> Self
    where
        F: Fn() -> i64 + Send + Sync + 'static,
    {
        self.clock = Box::new(clock);
        self
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    pub fn generate(&self) -> String {
        format!(
            "{}{}{:04}",
            self.prefix,
            (self.clock)(),
            (self.suffix)() % 10_000
        )
    }
}

impl Default for OrderNumberGenerator {
    fn default() -> Self {
        Self::new("ORD-")
    }
}
