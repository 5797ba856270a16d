// crates/scope-gate-core/src/runtime/clock.rs
// ============================================================================
// Module: Scope Gate Clocks
// Description: System and fixed clocks for credential expiry checks.
// Purpose: Keep time an explicit collaborator so expiry is testable.
// Dependencies: crate::interfaces, time
// ============================================================================

//! ## Overview
//! [`SystemClock`] reads UTC wall time. [`FixedClock`] holds a settable
//! instant for expiry tests.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::Mutex;

use time::Duration;
use time::OffsetDateTime;

use crate::interfaces::Clock;

// ============================================================================
// SECTION: Clocks
// ============================================================================

/// Clock backed by the system time (UTC).
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> OffsetDateTime {
        OffsetDateTime::now_utc()
    }
}

/// Manually driven clock for tests.
#[derive(Debug)]
pub struct FixedClock {
    /// Current time.
    now: Mutex<OffsetDateTime>,
}

impl FixedClock {
    /// Creates a clock stopped at `now`.
    #[must_use]
    pub const fn new(now: OffsetDateTime) -> Self {
        Self {
            now: Mutex::new(now),
        }
    }

    /// Moves the clock to `now`.
    pub fn set(&self, now: OffsetDateTime) {
        if let Ok(mut guard) = self.now.lock() {
            *guard = now;
        }
    }

    /// Advances the clock.
    pub fn advance(&self, by: Duration) {
        if let Ok(mut guard) = self.now.lock() {
            *guard += by;
        }
    }
}

impl Clock for FixedClock {
    fn now(&self) -> OffsetDateTime {
        self.now.lock().map_or(OffsetDateTime::UNIX_EPOCH, |guard| *guard)
    }
}
