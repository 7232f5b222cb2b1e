//! Recency ordering of the channel list.

use crate::model::{Channel, ChannelId};
use crate::notification::NotificationStore;

/// Orders channels by their newest message, newest first.
///
/// Sorting on every poll tick would be wasted work, so the sorter keeps a
/// dirty flag: it is set whenever a `last_message_timestamp` changes and
/// cleared once an order has been materialized.
#[derive(Debug, Default)]
pub struct ChannelSorter {
    dirty: bool,
}

impl ChannelSorter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn mark_dirty(&mut self) {
        self.dirty = true;
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Sort unconditionally and clear the dirty flag.
    ///
    /// Channels without a recorded timestamp go last, keeping their input
    /// order among themselves.
    pub fn sort(&mut self, channels: &[&Channel], states: &NotificationStore) -> Vec<ChannelId> {
        let mut keyed: Vec<_> = channels
            .iter()
            .map(|c| (states.last_message_timestamp(&c.id), c.id.clone()))
            .collect();
        // Stable sort: `None` compares below every `Some`, so reversing the
        // key comparison puts newest first and untimed channels last.
        keyed.sort_by(|a, b| b.0.cmp(&a.0));
        self.dirty = false;
        keyed.into_iter().map(|(_, id)| id).collect()
    }

    /// Sort only if something changed since the last sort.
    pub fn sort_if_dirty(
        &mut self,
        channels: &[&Channel],
        states: &NotificationStore,
    ) -> Option<Vec<ChannelId>> {
        if !self.dirty {
            return None;
        }
        Some(self.sort(channels, states))
    }
}

/// Case-insensitive substring filter on display names, preserving order.
pub fn filter_by_name<'a>(channels: &[&'a Channel], term: &str) -> Vec<&'a Channel> {
    let term = term.trim().to_lowercase();
    channels
        .iter()
        .filter(|c| term.is_empty() || c.name.to_lowercase().contains(&term))
        .copied()
        .collect()
}
