//! Global fetch pacing with Fibonacci escalation.
//!
//! One policy instance paces every fetch against the platform, whichever
//! URL is being processed. A failure on one URL raises the delay applied to
//! the *next* fetch for any URL; any success drops back to the normal range.
//! The policy is pure state and arithmetic — callers await the returned
//! delay themselves.

use rand::Rng;

use magpie_core::BackoffState;

/// Multipliers applied to the base delay on consecutive failures. The index
/// saturates at the table end.
const FIBONACCI: [u32; 12] = [1, 1, 2, 3, 5, 8, 13, 21, 34, 55, 89, 144];

/// Global rate limiter with Fibonacci backoff.
#[derive(Debug, Clone)]
pub struct BackoffPolicy {
    min_delay: f64,
    max_delay: f64,
    max_backoff: f64,
    state: BackoffState,
}

impl BackoffPolicy {
    /// Create a policy drawing normal delays from `[min_delay, max_delay]`
    /// and capping escalated delays at `max_backoff` (all in seconds).
    pub fn new(min_delay: f64, max_delay: f64, max_backoff: f64) -> Self {
        Self {
            min_delay,
            max_delay,
            max_backoff,
            state: BackoffState::default(),
        }
    }

    /// Base delay for escalation: the midpoint of the normal range.
    pub fn base_delay(&self) -> f64 {
        (self.min_delay + self.max_delay) / 2.0
    }

    /// Draw a fresh delay for normal operation, uniform in `[min, max]`.
    pub fn next_normal_delay(&self) -> f64 {
        rand::thread_rng().gen_range(self.min_delay..=self.max_delay)
    }

    /// The delay the next fetch must wait: the escalated delay while in the
    /// penalty box, otherwise a fresh normal draw.
    pub fn current_delay(&self) -> f64 {
        if self.state.current_delay > 0.0 {
            self.state.current_delay
        } else {
            self.next_normal_delay()
        }
    }

    /// Escalate after a failure and return the new delay.
    pub fn on_failure(&mut self) -> f64 {
        let idx = (self.state.fibonacci_index as usize).min(FIBONACCI.len() - 1);
        let multiplier = FIBONACCI[idx];

        self.state.current_delay = (self.base_delay() * f64::from(multiplier)).min(self.max_backoff);
        self.state.fibonacci_index = self.state.fibonacci_index.saturating_add(1);

        self.state.current_delay
    }

    /// Reset after a success: the next delay is a normal draw again.
    pub fn on_success(&mut self) {
        self.state = BackoffState::default();
    }

    /// Snapshot for persistence.
    pub fn state(&self) -> BackoffState {
        self.state
    }

    /// Restore a persisted snapshot, so a restart resumes an active penalty
    /// instead of resetting it.
    pub fn restore(&mut self, state: BackoffState) {
        self.state = state;
    }
}
