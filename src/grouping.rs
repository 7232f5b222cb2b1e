//! Decides whether a message visually attaches to the one before it.

use crate::model::Message;

/// Maximum gap (in milliseconds) between two messages of the same author
/// for the later one to join the earlier one's group.
pub const GROUP_WINDOW_MS: i64 = 900_000;

/// Whether `current` should be grouped under `previous`.
///
/// Grouped messages omit the avatar and author header. A message groups
/// when the previous one exists, has the same author, and was sent at most
/// 15 minutes earlier.
pub fn should_group(current: &Message, previous: Option<&Message>) -> bool {
    let Some(previous) = previous else {
        return false;
    };

    if current.author.id != previous.author.id {
        return false;
    }

    let gap = current.timestamp - previous.timestamp;
    gap.num_milliseconds() <= GROUP_WINDOW_MS
}

/// Grouping decision for every message of an oldest-first snapshot.
pub fn group_flags(messages: &[Message]) -> Vec<bool> {
    messages
        .iter()
        .enumerate()
        .map(|(i, msg)| should_group(msg, i.checked_sub(1).map(|p| &messages[p])))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ChannelId, MessageId, User};
    use chrono::{Duration, TimeZone, Utc};

    fn msg(id: &str, author: &str, offset_ms: i64) -> Message {
        let base = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
        Message {
            id: MessageId::new(id),
            channel_id: ChannelId::new("1"),
            author: User {
                id: author.into(),
                username: author.into(),
                display_name: None,
                avatar: None,
            },
            content: String::new(),
            reply: None,
            attachments: vec![],
            embeds: vec![],
            mentions: vec![],
            timestamp: base + Duration::milliseconds(offset_ms),
        }
    }

    #[test]
    fn test_no_previous_never_groups() {
        assert!(!should_group(&msg("1", "a", 0), None));
    }

    #[test]
    fn test_window_boundary() {
        let first = msg("1", "a", 0);
        assert!(should_group(&msg("2", "a", 900_000), Some(&first)));
        assert!(!should_group(&msg("2", "a", 900_001), Some(&first)));
        assert!(should_group(&msg("2", "a", 1), Some(&first)));
    }

    #[test]
    fn test_different_authors_never_group() {
        let first = msg("1", "a", 0);
        assert!(!should_group(&msg("2", "b", 0), Some(&first)));
        assert!(!should_group(&msg("2", "b", 10), Some(&first)));
    }

    #[test]
    fn test_group_flags() {
        let messages = vec![
            msg("1", "a", 0),
            msg("2", "a", 60_000),
            msg("3", "b", 61_000),
            msg("4", "b", 2_000_000),
        ];
        assert_eq!(group_flags(&messages), vec![false, true, false, false]);
    }
}
