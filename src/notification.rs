//! Per-channel read/unread bookkeeping.

use chrono::{DateTime, Utc};
use std::collections::HashMap;

use crate::model::{ChannelId, MessageId};

/// What the client knows about one channel's position in its history.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NotificationState {
    /// Highest message id rendered while the channel was active.
    pub last_rendered_message_id: Option<MessageId>,
    /// Highest message id acknowledged by the background sweep.
    pub last_seen_message_id: Option<MessageId>,
    pub unread_count: u32,
    /// Time of the newest known message, for recency ordering.
    pub last_message_timestamp: Option<DateTime<Utc>>,
}

impl NotificationState {
    /// Reset unread when the channel becomes active. Ids are kept.
    pub fn clear_unread(&mut self) {
        self.unread_count = 0;
    }

    /// Record the newest message time. Returns whether it changed.
    pub fn record_timestamp(&mut self, ts: DateTime<Utc>) -> bool {
        if self.last_message_timestamp == Some(ts) {
            return false;
        }
        self.last_message_timestamp = Some(ts);
        true
    }

    /// Called when the channel stops being the active one.
    ///
    /// Whatever was rendered has been seen, so the background sweep must
    /// not count it as unread later.
    pub fn on_deactivated(&mut self) {
        if self.last_rendered_message_id > self.last_seen_message_id {
            self.last_seen_message_id = self.last_rendered_message_id.clone();
        }
    }
}

/// Session-wide map of [`NotificationState`], created lazily per channel.
#[derive(Debug, Default)]
pub struct NotificationStore {
    states: HashMap<ChannelId, NotificationState>,
}

impl NotificationStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, channel_id: &ChannelId) -> Option<&NotificationState> {
        self.states.get(channel_id)
    }

    /// State for a channel, created on first observation.
    pub fn entry(&mut self, channel_id: &ChannelId) -> &mut NotificationState {
        self.states.entry(channel_id.clone()).or_default()
    }

    pub fn unread(&self, channel_id: &ChannelId) -> u32 {
        self.states.get(channel_id).map_or(0, |s| s.unread_count)
    }

    pub fn last_message_timestamp(&self, channel_id: &ChannelId) -> Option<DateTime<Utc>> {
        self.states
            .get(channel_id)
            .and_then(|s| s.last_message_timestamp)
    }

    pub fn clear_unread(&mut self, channel_id: &ChannelId) {
        self.entry(channel_id).clear_unread();
    }

    /// Drop everything about a closed channel.
    pub fn remove(&mut self, channel_id: &ChannelId) -> Option<NotificationState> {
        self.states.remove(channel_id)
    }

    /// Sum of unread counts across all channels.
    #[cfg(test)]
    pub fn total_unread(&self) -> u32 {
        self.states.values().map(|s| s.unread_count).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_lazy_creation_and_clear() {
        let mut store = NotificationStore::new();
        let id = ChannelId::new("1");
        assert!(store.get(&id).is_none());
        assert_eq!(store.unread(&id), 0);

        store.entry(&id).unread_count = 3;
        store.entry(&id).last_seen_message_id = Some(MessageId::new("10"));
        assert_eq!(store.unread(&id), 3);

        store.clear_unread(&id);
        assert_eq!(store.unread(&id), 0);
        // Ids survive the reset
        assert_eq!(
            store.get(&id).unwrap().last_seen_message_id,
            Some(MessageId::new("10"))
        );
    }

    #[test]
    fn test_remove_clears_everything() {
        let mut store = NotificationStore::new();
        let id = ChannelId::new("1");
        store.entry(&id).unread_count = 2;
        assert!(store.remove(&id).is_some());
        assert!(store.get(&id).is_none());
        assert_eq!(store.total_unread(), 0);
    }

    #[test]
    fn test_record_timestamp_reports_change() {
        let mut state = NotificationState::default();
        let ts = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        assert!(state.record_timestamp(ts));
        assert!(!state.record_timestamp(ts));
        assert!(state.record_timestamp(ts + chrono::Duration::seconds(1)));
    }

    #[test]
    fn test_on_deactivated_promotes_rendered_boundary() {
        let mut state = NotificationState {
            last_rendered_message_id: Some(MessageId::new("20")),
            last_seen_message_id: Some(MessageId::new("9")),
            ..Default::default()
        };
        state.on_deactivated();
        assert_eq!(state.last_seen_message_id, Some(MessageId::new("20")));

        // Never moves backwards
        state.last_rendered_message_id = Some(MessageId::new("5"));
        state.on_deactivated();
        assert_eq!(state.last_seen_message_id, Some(MessageId::new("20")));
    }
}
