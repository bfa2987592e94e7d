//! Cooperative cancellation for long-running fingerprinting passes.
//!
//! A [`CancellationToken`] is cheap to clone and shared between the CLI (which trips it on
//! Ctrl-C) and the hashing code (which polls it between traversal waves and before every
//! filesystem read). An optional deadline turns the token into a timeout.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use super::DifferError;

/// Shared cancellation flag with an optional deadline.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
    deadline: Option<Instant>,
}

impl CancellationToken {
    /// Creates a token that is never cancelled unless [`cancel`](Self::cancel) is called.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a token that reports cancellation once `timeout` has elapsed.
    #[must_use]
    pub fn with_timeout(timeout: Duration) -> Self {
        Self {
            cancelled: Arc::new(AtomicBool::new(false)),
            deadline: Some(Instant::now() + timeout),
        }
    }

    /// Returns a clone sharing this token's flag that also expires after `timeout`.
    #[must_use]
    pub fn with_deadline(&self, timeout: Duration) -> Self {
        Self {
            cancelled: Arc::clone(&self.cancelled),
            deadline: Some(Instant::now() + timeout),
        }
    }

    /// Signals cancellation to every clone of this token.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    /// Returns `true` if the token was cancelled or its deadline has passed.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst) || self.deadline_passed()
    }

    /// Returns `Err(DifferError::Cancelled)` if the run should stop.
    pub fn check(&self) -> Result<(), DifferError> {
        if self.cancelled.load(Ordering::SeqCst) {
            return Err(DifferError::Cancelled {
                reason: "interrupted".to_string(),
            });
        }
        if self.deadline_passed() {
            return Err(DifferError::Cancelled {
                reason: "deadline exceeded".to_string(),
            });
        }
        Ok(())
    }

    fn deadline_passed(&self) -> bool {
        self.deadline.is_some_and(|deadline| Instant::now() >= deadline)
    }
}
