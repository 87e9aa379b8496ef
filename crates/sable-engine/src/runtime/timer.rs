//! Wall-clock budget tracking.

use std::time::{Duration, Instant};

use crate::error::FatalError;

/// The absolute deadline of one program run.
///
/// The deadline is computed once at run start and shared by every pass,
/// so recompile-and-replay passes spend the same budget, not a fresh one.
#[derive(Debug, Clone, Copy)]
pub struct Timer {
    deadline: Instant,
    limit_seconds: u64,
}

impl Timer {
    /// Start a budget of `limit_seconds` from now.
    pub fn start(limit_seconds: u64) -> Self {
        Timer {
            deadline: Instant::now() + Duration::from_secs(limit_seconds),
            limit_seconds,
        }
    }

    /// The configured budget.
    pub fn limit_seconds(&self) -> u64 {
        self.limit_seconds
    }

    /// Time left before the deadline; zero once passed.
    pub fn remaining(&self) -> Duration {
        self.deadline.saturating_duration_since(Instant::now())
    }

    /// Fail once the deadline has passed. Checked at loop iteration
    /// boundaries, never mid-expression.
    pub fn check(&self) -> Result<(), FatalError> {
        if Instant::now() >= self.deadline {
            Err(FatalError::MaxExecutionTimeExceeded {
                seconds: self.limit_seconds,
            })
        } else {
            Ok(())
        }
    }
}
