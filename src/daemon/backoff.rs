//! Flush failure backoff.
//!
//! After `n` consecutive failed flushes the next `min(32, n²)` scheduled
//! flushes are skipped. One success clears the failure count; a config change
//! clears both the count and the pending skips.

#![allow(missing_docs)]

/// Upper bound on skipped flush cycles after a failure.
pub const MAX_SKIPPED_FLUSHES: u32 = 32;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FlushBackoff {
    failures: u32,
    skip_remaining: u32,
}

impl FlushBackoff {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether this cycle should attempt a flush. A suppressed cycle consumes
    /// one pending skip.
    pub fn should_attempt(&mut self) -> bool {
        if self.skip_remaining > 0 {
            self.skip_remaining -= 1;
            return false;
        }
        true
    }

    pub fn record_success(&mut self) {
        self.failures = 0;
    }

    /// Count a failure and arm the skip window. Returns the failure count.
    pub fn record_failure(&mut self) -> u32 {
        self.failures = self.failures.saturating_add(1);
        self.skip_remaining = self.failures.saturating_mul(self.failures).min(MAX_SKIPPED_FLUSHES);
        self.failures
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }

    #[must_use]
    pub fn failures(&self) -> u32 {
        self.failures
    }

    #[must_use]
    pub fn skip_remaining(&self) -> u32 {
        self.skip_remaining
    }
}
