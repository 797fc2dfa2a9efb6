//! Debounce state machine
//!
//! ```text
//!            notify(now)                    poll(now >= deadline)
//!   Idle ───────────────→ Pending{deadline} ─────────────────────→ Idle (fire)
//!                           │      ↑
//!                           └──────┘ notify(now): deadline = now + window
//! ```
//!
//! The clock is passed in by the caller, so the machine itself never waits
//! and can be driven by tests with synthetic instants.

use tokio::time::{Duration, Instant};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DebounceState {
    Idle,
    Pending { deadline: Instant },
}

#[derive(Debug, Clone)]
pub struct Debouncer {
    window: Duration,
    state: DebounceState,
}

impl Debouncer {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            state: DebounceState::Idle,
        }
    }

    /// Record a change notification, (re)starting the quiet window
    pub fn notify(&mut self, now: Instant) {
        self.state = DebounceState::Pending {
            deadline: now + self.window,
        };
    }

    /// Returns `true` exactly once per burst, when the quiet window has elapsed
    pub fn poll(&mut self, now: Instant) -> bool {
        match self.state {
            DebounceState::Pending { deadline } if now >= deadline => {
                self.state = DebounceState::Idle;
                true
            }
            _ => false,
        }
    }

    /// Drop a pending burst without firing
    pub fn cancel(&mut self) {
        self.state = DebounceState::Idle;
    }

    pub fn deadline(&self) -> Option<Instant> {
        match self.state {
            DebounceState::Idle => None,
            DebounceState::Pending { deadline } => Some(deadline),
        }
    }

    pub fn state(&self) -> DebounceState {
        self.state
    }
}
