//! Bounded retry for storage writes

use tracing::warn;

use crate::error::{LedgerError, Result};

/// Number of attempts made for a storage write before it is surfaced
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    attempts: u32,
}

impl RetryPolicy {
    /// At least one attempt is always made
    pub fn new(attempts: u32) -> Self {
        Self {
            attempts: attempts.max(1),
        }
    }

    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    /// Run `op` until it succeeds, fails permanently, or attempts run out.
    ///
    /// Transient failures that exhaust the budget become
    /// [`LedgerError::Storage`].
    pub fn run<T, F>(&self, what: &str, mut op: F) -> Result<T>
    where
        F: FnMut() -> Result<T>,
    {
        let mut attempt = 0;
        loop {
            attempt += 1;
            match op() {
                Ok(value) => return Ok(value),
                Err(e) if e.is_transient() && attempt < self.attempts => {
                    warn!(
                        "{} failed (attempt {}/{}): {}",
                        what, attempt, self.attempts, e
                    );
                }
                Err(e) if e.is_transient() => {
                    return Err(LedgerError::Storage {
                        attempts: attempt,
                        message: format!("{}: {}", what, e),
                    });
                }
                Err(e) => return Err(e),
            }
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(3)
    }
}
