//! Live-user presence: session timing config and count change suppression.

use std::time::Duration;

// ---------------------------------------------------------------------------
// SessionConfig
// ---------------------------------------------------------------------------

/// Timing knobs for connection handling.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// How long connect/disconnect bursts are coalesced before one
    /// `updateUserCount` broadcast goes out.
    ///
    /// Default: 100 ms.
    pub count_debounce: Duration,

    /// How long a new connection has to send its `hello`.
    ///
    /// Default: 5 seconds.
    pub handshake_timeout: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            count_debounce: Duration::from_millis(100),
            handshake_timeout: Duration::from_secs(5),
        }
    }
}

// ---------------------------------------------------------------------------
// PresenceTracker
// ---------------------------------------------------------------------------

/// Remembers the last broadcast live-user count so an unchanged value is
/// never sent twice.
#[derive(Debug, Default)]
pub struct PresenceTracker {
    last_broadcast: Option<usize>,
}

impl PresenceTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feeds the freshly computed count. Returns `Some(count)` if it differs
    /// from the last broadcast value (and records it), `None` otherwise.
    pub fn observe(&mut self, count: usize) -> Option<usize> {
        if self.last_broadcast == Some(count) {
            return None;
        }
        self.last_broadcast = Some(count);
        Some(count)
    }

    pub fn last_broadcast(&self) -> Option<usize> {
        self.last_broadcast
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_observe_first_value_is_broadcast() {
        let mut tracker = PresenceTracker::new();
        assert_eq!(tracker.observe(0), Some(0));
    }

    #[test]
    fn test_observe_unchanged_value_is_suppressed() {
        let mut tracker = PresenceTracker::new();
        tracker.observe(3);
        assert_eq!(tracker.observe(3), None);
        assert_eq!(tracker.last_broadcast(), Some(3));
    }

    #[test]
    fn test_observe_change_after_bounce_back() {
        // 2 → 3 → 2 within one window is coalesced by the caller; here
        // each observed value differs from the previous broadcast.
        let mut tracker = PresenceTracker::new();
        assert_eq!(tracker.observe(2), Some(2));
        assert_eq!(tracker.observe(3), Some(3));
        assert_eq!(tracker.observe(2), Some(2));
    }

    #[test]
    fn test_session_config_defaults() {
        let config = SessionConfig::default();
        assert_eq!(config.count_debounce, Duration::from_millis(100));
        assert_eq!(config.handshake_timeout, Duration::from_secs(5));
    }
}
