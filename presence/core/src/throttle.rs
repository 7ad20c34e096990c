//! Presence Update Throttling
//!
//! Discord drops activity updates sent more often than once every 15
//! seconds. [`UpdateThrottle`] tracks when the last `SET_ACTIVITY` frame
//! went out and tells the client whether the next one may go now or how
//! long it has to wait.
//!
//! # Design
//!
//! - One send per interval per connection
//! - Updates inside the window are deferred, never dropped
//! - Deferred updates coalesce: only the latest value is sent when the
//!   window reopens (the client owns that part)

use std::time::Duration;

use tokio::time::Instant;

/// Reference minimum interval between activity updates
pub const DEFAULT_UPDATE_INTERVAL: Duration = Duration::from_millis(15_000);

/// Outcome of a throttle check
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ThrottleDecision {
    /// The update may be written immediately
    SendNow,

    /// The update must wait
    Defer {
        /// Time remaining until the window reopens
        remaining: Duration,
    },
}

impl ThrottleDecision {
    /// Check if the update may go out now
    #[must_use]
    pub fn is_send_now(&self) -> bool {
        matches!(self, Self::SendNow)
    }

    /// Get the deferral delay if any
    #[must_use]
    pub fn remaining(&self) -> Option<Duration> {
        match self {
            Self::Defer { remaining } => Some(*remaining),
            Self::SendNow => None,
        }
    }
}

/// Minimum-interval throttle for a single connection
#[derive(Clone, Debug)]
pub struct UpdateThrottle {
    /// Minimum time between two sends (zero = unthrottled)
    interval: Duration,

    /// When the last update was written
    last_sent: Option<Instant>,
}

impl Default for UpdateThrottle {
    fn default() -> Self {
        Self::new(DEFAULT_UPDATE_INTERVAL)
    }
}

impl UpdateThrottle {
    /// Create a throttle with the given minimum interval
    #[must_use]
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            last_sent: None,
        }
    }

    /// Create a throttle that never defers
    #[must_use]
    pub fn disabled() -> Self {
        Self::new(Duration::ZERO)
    }

    /// Configured minimum interval
    #[must_use]
    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Whether this throttle ever defers
    #[must_use]
    pub fn is_enabled(&self) -> bool {
        !self.interval.is_zero()
    }

    /// When the last update was written, if any
    #[must_use]
    pub fn last_sent(&self) -> Option<Instant> {
        self.last_sent
    }

    /// Decide whether an update requested at `now` may go out
    #[must_use]
    pub fn check(&self, now: Instant) -> ThrottleDecision {
        let Some(last_sent) = self.last_sent else {
            return ThrottleDecision::SendNow;
        };

        let elapsed = now.saturating_duration_since(last_sent);
        if elapsed >= self.interval {
            ThrottleDecision::SendNow
        } else {
            ThrottleDecision::Defer {
                remaining: self.interval - elapsed,
            }
        }
    }

    /// Record that an update was written at `now`
    pub fn record_send(&mut self, now: Instant) {
        self.last_sent = Some(now);
    }

    /// Put back the send time seen before a write that failed
    pub fn restore(&mut self, last_sent: Option<Instant>) {
        self.last_sent = last_sent;
    }

    /// Forget the last send (new session)
    pub fn reset(&mut self) {
        self.last_sent = None;
    }
}
