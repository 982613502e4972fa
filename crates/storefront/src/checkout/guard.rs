//! Exactly-once submission.

use std::sync::Arc;
use std::sync::atomic::{AtomicU8, Ordering};

use serde::Serialize;

use super::SubmitError;

const IDLE: u8 = 0;
const IN_FLIGHT: u8 = 1;
const COMPLETED: u8 = 2;

/// Submission state of one checkout draft.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SubmissionState {
    Idle,
    InFlight,
    Completed,
}

/// Shared latch ensuring at most one order is created per draft.
///
/// Clones share state. `Idle -> InFlight` is a single atomic step, so two
/// concurrent submissions cannot both start. A failed attempt returns the
/// latch to `Idle`; a successful one leaves it `Completed` for good.
#[derive(Debug, Clone, Default)]
pub struct SubmissionGuard {
    state: Arc<AtomicU8>,
}

impl SubmissionGuard {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn state(&self) -> SubmissionState {
        match self.state.load(Ordering::Acquire) {
            IN_FLIGHT => SubmissionState::InFlight,
            COMPLETED => SubmissionState::Completed,
            _ => SubmissionState::Idle,
        }
    }

    /// Claim the latch for one attempt.
    ///
    /// # Errors
    ///
    /// Returns `AlreadyInFlight` while another attempt runs, or
    /// `AlreadySubmitted` once an order has been created.
    pub fn try_begin(&self) -> Result<SubmissionTicket<'_>, SubmitError> {
        match self
            .state
            .compare_exchange(IDLE, IN_FLIGHT, Ordering::AcqRel, Ordering::Acquire)
        {
            Ok(_) => Ok(SubmissionTicket {
                guard: self,
                completed: false,
            }),
            Err(COMPLETED) => Err(SubmitError::AlreadySubmitted),
            Err(_) => Err(SubmitError::AlreadyInFlight),
        }
    }
}

/// An in-flight attempt. Dropping it without [`complete`](Self::complete)
/// releases the latch.
#[derive(Debug)]
pub struct SubmissionTicket<'a> {
    guard: &'a SubmissionGuard,
    completed: bool,
}

impl SubmissionTicket<'_> {
    /// Mark the draft as submitted.
    pub fn complete(mut self) {
        self.guard.state.store(COMPLETED, Ordering::Release);
        self.completed = true;
    }
}

impl Drop for SubmissionTicket<'_> {
    fn drop(&mut self) {
        if !self.completed {
            self.guard.state.store(IDLE, Ordering::Release);
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_second_attempt_while_in_flight_is_refused() {
        let guard = SubmissionGuard::new();
        let shared = guard.clone();

        let ticket = guard.try_begin().unwrap();
        assert_eq!(shared.state(), SubmissionState::InFlight);
        assert!(matches!(shared.try_begin(), Err(SubmitError::AlreadyInFlight)));
        drop(ticket);
        assert_eq!(shared.state(), SubmissionState::Idle);
    }

    #[test]
    fn test_completed_guard_refuses_forever() {
        let guard = SubmissionGuard::new();
        guard.try_begin().unwrap().complete();
        assert_eq!(guard.state(), SubmissionState::Completed);
        assert!(matches!(guard.try_begin(), Err(SubmitError::AlreadySubmitted)));
    }
}
