//! Per-run deadlines
//!
//! A run checks its deadline before each gate and between protocol phases.
//! Expiry aborts the run; everything it allocated is dropped (and wire keys
//! zeroized) on the way out.

use std::time::{Duration, Instant};

use crate::error::{ProtocolError, Result};

#[derive(Debug, Clone, Copy)]
pub struct Deadline {
    started: Instant,
    limit: Duration,
}

impl Deadline {
    /// Deadline `limit` from now
    pub fn after(limit: Duration) -> Self {
        Self {
            started: Instant::now(),
            limit,
        }
    }

    /// A deadline that never expires in practice
    pub fn unbounded() -> Self {
        Self::after(Duration::MAX)
    }

    pub fn check(&self) -> Result<()> {
        let elapsed = self.started.elapsed();
        if elapsed >= self.limit {
            return Err(ProtocolError::Timeout {
                elapsed_ms: elapsed.as_millis(),
            });
        }
        Ok(())
    }
}
