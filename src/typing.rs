//! Rate limiting for outbound typing indicators.

use std::collections::HashMap;
use std::time::Duration;
use tokio::time::Instant;

use crate::model::ChannelId;

/// Default minimum spacing between two typing signals for one channel.
pub const DEFAULT_TYPING_WINDOW: Duration = Duration::from_secs(10);

/// Emits at most one typing signal per channel per window.
///
/// State is per channel and survives channel switches, so hopping away and
/// back does not re-arm the signal early.
#[derive(Debug)]
pub struct TypingDebouncer {
    window: Duration,
    last_sent: HashMap<ChannelId, Instant>,
}

impl Default for TypingDebouncer {
    fn default() -> Self {
        Self::new(DEFAULT_TYPING_WINDOW)
    }
}

impl TypingDebouncer {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            last_sent: HashMap::new(),
        }
    }

    /// Whether a typing signal should be sent now for `channel_id`.
    ///
    /// Returns false for blank input. When it returns true the emission is
    /// recorded, so the caller must actually send the signal.
    pub fn notify_typing(&mut self, channel_id: &ChannelId, input: &str, now: Instant) -> bool {
        if input.trim().is_empty() {
            return false;
        }
        if let Some(last) = self.last_sent.get(channel_id) {
            if now.saturating_duration_since(*last) < self.window {
                return false;
            }
        }
        self.last_sent.insert(channel_id.clone(), now);
        true
    }

    /// Drop the state of a closed channel.
    pub fn forget(&mut self, channel_id: &ChannelId) {
        self.last_sent.remove(channel_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blank_input_never_emits() {
        let mut debouncer = TypingDebouncer::default();
        let id = ChannelId::new("1");
        let now = Instant::now();
        assert!(!debouncer.notify_typing(&id, "", now));
        assert!(!debouncer.notify_typing(&id, "   \n", now));
        // Blank input does not consume the window
        assert!(debouncer.notify_typing(&id, "h", now));
    }

    #[test]
    fn test_window_suppresses_repeats() {
        let mut debouncer = TypingDebouncer::default();
        let id = ChannelId::new("1");
        let start = Instant::now();
        assert!(debouncer.notify_typing(&id, "h", start));
        assert!(!debouncer.notify_typing(&id, "he", start + Duration::from_secs(3)));
        assert!(!debouncer.notify_typing(&id, "hel", start + Duration::from_millis(9_999)));
        assert!(debouncer.notify_typing(&id, "hell", start + Duration::from_secs(10)));
    }

    #[test]
    fn test_channels_are_independent_and_survive_switches() {
        let mut debouncer = TypingDebouncer::default();
        let (a, b) = (ChannelId::new("1"), ChannelId::new("2"));
        let start = Instant::now();
        assert!(debouncer.notify_typing(&a, "x", start));
        assert!(debouncer.notify_typing(&b, "x", start));
        // Back on A two seconds later: still inside A's window
        assert!(!debouncer.notify_typing(&a, "xy", start + Duration::from_secs(2)));
    }

    #[test]
    fn test_forget_rearms() {
        let mut debouncer = TypingDebouncer::new(Duration::from_secs(5));
        let id = ChannelId::new("1");
        let start = Instant::now();
        assert!(debouncer.notify_typing(&id, "x", start));
        debouncer.forget(&id);
        assert!(debouncer.notify_typing(&id, "x", start + Duration::from_secs(1)));
    }
}
