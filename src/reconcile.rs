//! Reconciliation of a freshly fetched snapshot against a channel's state.
//!
//! Comparing the snapshot's tail id with the recorded boundary is the only
//! de-duplication mechanism: polling the same snapshot any number of times
//! yields `NoChange` and leaves the state untouched.

use crate::model::{Channel, Message, MessageId};
use crate::notification::NotificationState;

/// What changed, and what the caller should do about it.
#[derive(Debug, Clone, PartialEq)]
pub struct ReconcileDelta {
    /// New boundary id (the snapshot's tail).
    pub tail_id: MessageId,
    /// Messages strictly newer than the previous boundary. Empty on the
    /// first observation of a channel.
    pub new_messages: Vec<Message>,
    /// The whole snapshot must be re-rendered (active channel only).
    pub rerender: bool,
    /// The DM list order may have changed and should be re-sorted now.
    pub resort_dms: bool,
    /// The channel's unread badge changed.
    pub badge_update: bool,
    /// How many unread messages were added.
    pub unread_delta: u32,
    /// `last_message_timestamp` moved.
    pub timestamp_changed: bool,
    /// Newest new message from someone else, for a toast (active channel).
    pub notify: Option<Message>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ReconcileOutcome {
    NoChange,
    Changed(ReconcileDelta),
}

impl ReconcileOutcome {
    pub fn is_change(&self) -> bool {
        matches!(self, Self::Changed(_))
    }
}

/// Reconcile `snapshot` (oldest-first) for `channel` into `state`.
///
/// The active path (`is_active_channel`) advances the render boundary and
/// keeps unread pinned at zero. The background path advances the seen
/// boundary and counts messages from other authors as unread.
pub fn reconcile(
    channel: &Channel,
    snapshot: &[Message],
    state: &mut NotificationState,
    is_active_channel: bool,
    self_author_id: &str,
) -> ReconcileOutcome {
    let Some(tail) = snapshot.last() else {
        return ReconcileOutcome::NoChange;
    };

    let boundary = if is_active_channel {
        &state.last_rendered_message_id
    } else {
        &state.last_seen_message_id
    };
    if boundary.as_ref() == Some(&tail.id) {
        return ReconcileOutcome::NoChange;
    }
    // The seen boundary only moves forward (an older tail follows deletions).
    if !is_active_channel && boundary.as_ref().is_some_and(|seen| tail.id < *seen) {
        return ReconcileOutcome::NoChange;
    }

    // First sighting seeds the boundary without notifying anything.
    let new_messages: Vec<Message> = match boundary {
        Some(previous) => snapshot
            .iter()
            .filter(|m| m.id > *previous)
            .cloned()
            .collect(),
        None => Vec::new(),
    };

    let tail_id = tail.id.clone();
    let timestamp_changed = state.record_timestamp(tail.timestamp);

    if is_active_channel {
        state.last_rendered_message_id = Some(tail_id.clone());
        state.unread_count = 0;
        let notify = new_messages
            .iter()
            .rev()
            .find(|m| m.author.id != self_author_id)
            .cloned();
        return ReconcileOutcome::Changed(ReconcileDelta {
            tail_id,
            new_messages,
            rerender: true,
            resort_dms: channel.is_dm(),
            badge_update: false,
            unread_delta: 0,
            timestamp_changed,
            notify,
        });
    }

    state.last_seen_message_id = Some(tail_id.clone());
    let unread_delta = new_messages
        .iter()
        .filter(|m| m.author.id != self_author_id)
        .count() as u32;
    state.unread_count += unread_delta;

    ReconcileOutcome::Changed(ReconcileDelta {
        tail_id,
        new_messages,
        rerender: false,
        resort_dms: unread_delta > 0 && channel.is_dm(),
        badge_update: unread_delta > 0,
        unread_delta,
        timestamp_changed,
        notify: None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ChannelId, ChannelKind, GuildId, User};
    use chrono::{Duration, TimeZone, Utc};

    const ME: &str = "1";

    fn dm() -> Channel {
        Channel {
            id: ChannelId::new("100"),
            kind: ChannelKind::Dm { recipients: vec![] },
            name: "bob".into(),
        }
    }

    fn guild_channel() -> Channel {
        Channel {
            id: ChannelId::new("200"),
            kind: ChannelKind::GuildChannel {
                guild_id: GuildId::new("9"),
            },
            name: "general".into(),
        }
    }

    fn msg(id: u64, author: &str) -> Message {
        let base = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
        Message {
            id: MessageId::new(id.to_string()),
            channel_id: ChannelId::new("100"),
            author: User {
                id: author.into(),
                username: format!("user{author}"),
                display_name: None,
                avatar: None,
            },
            content: format!("message {id}"),
            reply: None,
            attachments: vec![],
            embeds: vec![],
            mentions: vec![],
            timestamp: base + Duration::seconds(id as i64),
        }
    }

    fn changed(outcome: ReconcileOutcome) -> ReconcileDelta {
        match outcome {
            ReconcileOutcome::Changed(delta) => delta,
            ReconcileOutcome::NoChange => panic!("expected a change"),
        }
    }

    #[test]
    fn test_empty_snapshot_is_no_change() {
        let mut state = NotificationState::default();
        assert_eq!(reconcile(&dm(), &[], &mut state, true, ME), ReconcileOutcome::NoChange);
        assert_eq!(reconcile(&dm(), &[], &mut state, false, ME), ReconcileOutcome::NoChange);
        assert_eq!(state, NotificationState::default());
    }

    #[test]
    fn test_unchanged_tail_is_idempotent() {
        let snapshot = vec![msg(10, "2"), msg(11, "2")];
        for active in [true, false] {
            let mut state = NotificationState::default();
            assert!(reconcile(&dm(), &snapshot, &mut state, active, ME).is_change());
            let before = state.clone();
            for _ in 0..5 {
                assert_eq!(
                    reconcile(&dm(), &snapshot, &mut state, active, ME),
                    ReconcileOutcome::NoChange
                );
            }
            assert_eq!(state, before);
        }
    }

    #[test]
    fn test_first_observation_seeds_without_notifying() {
        let mut state = NotificationState::default();
        let delta = changed(reconcile(&dm(), &[msg(10, "2")], &mut state, false, ME));
        assert!(delta.new_messages.is_empty());
        assert_eq!(delta.unread_delta, 0);
        assert!(!delta.badge_update);
        assert!(delta.timestamp_changed);
        assert_eq!(state.last_seen_message_id, Some(MessageId::new("10")));
        assert_eq!(state.unread_count, 0);

        let mut state = NotificationState::default();
        let delta = changed(reconcile(&dm(), &[msg(10, "2")], &mut state, true, ME));
        assert!(delta.new_messages.is_empty());
        assert!(delta.notify.is_none());
        assert!(delta.rerender);
        assert_eq!(state.last_rendered_message_id, Some(MessageId::new("10")));
    }

    #[test]
    fn test_background_counts_each_new_message_once() {
        let mut state = NotificationState::default();
        reconcile(&dm(), &[msg(10, "2")], &mut state, false, ME);

        // Three messages arrive in the gap
        let snapshot = vec![msg(10, "2"), msg(11, "2"), msg(12, "3"), msg(13, "2")];
        let delta = changed(reconcile(&dm(), &snapshot, &mut state, false, ME));
        assert_eq!(delta.new_messages.len(), 3);
        assert_eq!(delta.unread_delta, 3);
        assert!(delta.resort_dms);
        assert!(delta.badge_update);
        assert_eq!(state.unread_count, 3);
        assert_eq!(state.last_seen_message_id, Some(MessageId::new("13")));

        // Polling again does not double count
        assert_eq!(reconcile(&dm(), &snapshot, &mut state, false, ME), ReconcileOutcome::NoChange);
        assert_eq!(state.unread_count, 3);
    }

    #[test]
    fn test_background_ignores_own_messages() {
        let mut state = NotificationState::default();
        reconcile(&dm(), &[msg(10, "2")], &mut state, false, ME);

        let delta = changed(reconcile(&dm(), &[msg(11, ME)], &mut state, false, ME));
        assert_eq!(delta.unread_delta, 0);
        assert!(!delta.badge_update);
        assert!(!delta.resort_dms);
        // Still advances and still moves the recency timestamp
        assert!(delta.timestamp_changed);
        assert_eq!(state.last_seen_message_id, Some(MessageId::new("11")));
        assert_eq!(state.unread_count, 0);
    }

    #[test]
    fn test_background_boundary_never_moves_backwards() {
        let mut state = NotificationState::default();
        reconcile(&dm(), &[msg(10, "2"), msg(12, "2")], &mut state, false, ME);
        let before = state.clone();

        // Message 12 was deleted; the tail is now older than the boundary
        assert_eq!(
            reconcile(&dm(), &[msg(10, "2")], &mut state, false, ME),
            ReconcileOutcome::NoChange
        );
        assert_eq!(state, before);
        assert_eq!(state.last_seen_message_id, Some(MessageId::new("12")));

        // A later message still counts once
        let delta = changed(reconcile(&dm(), &[msg(10, "2"), msg(13, "3")], &mut state, false, ME));
        assert_eq!(delta.unread_delta, 1);
        assert_eq!(state.last_seen_message_id, Some(MessageId::new("13")));
    }

    #[test]
    fn test_background_guild_channel_does_not_resort_dms() {
        let mut state = NotificationState::default();
        reconcile(&guild_channel(), &[msg(10, "2")], &mut state, false, ME);
        let delta = changed(reconcile(&guild_channel(), &[msg(11, "2")], &mut state, false, ME));
        assert_eq!(delta.unread_delta, 1);
        assert!(delta.badge_update);
        assert!(!delta.resort_dms);
    }

    #[test]
    fn test_active_path_rerenders_and_pins_unread() {
        let mut state = NotificationState {
            unread_count: 4,
            ..Default::default()
        };
        reconcile(&dm(), &[msg(10, "2")], &mut state, true, ME);
        assert_eq!(state.unread_count, 0);

        let snapshot = vec![msg(10, "2"), msg(11, "3"), msg(12, ME)];
        let delta = changed(reconcile(&dm(), &snapshot, &mut state, true, ME));
        assert!(delta.rerender);
        assert!(delta.resort_dms);
        assert_eq!(delta.new_messages.len(), 2);
        // Newest message from someone else
        assert_eq!(delta.notify.map(|m| m.id), Some(MessageId::new("11")));
        assert_eq!(state.unread_count, 0);
        assert_eq!(state.last_rendered_message_id, Some(MessageId::new("12")));
        // Active path leaves the sweep boundary alone
        assert_eq!(state.last_seen_message_id, None);
    }

    #[test]
    fn test_active_guild_channel_does_not_resort_dms() {
        let mut state = NotificationState::default();
        let delta = changed(reconcile(&guild_channel(), &[msg(10, "2")], &mut state, true, ME));
        assert!(!delta.resort_dms);
    }

    #[test]
    fn test_active_unread_stays_zero_across_interleavings() {
        // Alternate background-shaped snapshots and active polls; whenever
        // the channel is active its unread count must read zero.
        let mut state = NotificationState::default();
        let mut next_id = 10;
        for round in 0..20 {
            next_id += 1 + round % 3;
            let snapshot: Vec<Message> = (10..=next_id).map(|id| msg(id, "2")).collect();
            let active = round % 2 == 0;
            if active {
                state.clear_unread();
            } else {
                state.on_deactivated();
            }
            reconcile(&dm(), &snapshot, &mut state, active, ME);
            if active {
                assert_eq!(state.unread_count, 0, "round {round}");
            }
        }
    }
}
