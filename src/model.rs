//! Typed records for channels, guilds and messages.
//!
//! Everything here is validated at the relay boundary (see `relay::wire`),
//! so the rest of the client never sees partially-shaped objects.

use chrono::{DateTime, Utc};
use std::cmp::Ordering;
use std::fmt;

/// Opaque, stable channel identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ChannelId(pub String);

/// Guild (server) identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct GuildId(pub String);

/// Message identifier, totally ordered by creation time.
///
/// Ids are decimal snowflakes. Comparing by length first and then
/// lexicographically gives numeric order without parsing.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MessageId(pub String);

impl Ord for MessageId {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0
            .len()
            .cmp(&other.0.len())
            .then_with(|| self.0.cmp(&other.0))
    }
}

impl PartialOrd for MessageId {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

macro_rules! string_id {
    ($ty:ident) => {
        impl $ty {
            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $ty {
            fn from(s: &str) -> Self {
                Self(s.to_string())
            }
        }
    };
}

string_id!(ChannelId);
string_id!(GuildId);
string_id!(MessageId);

/// A user referenced by a channel or message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct User {
    pub id: String,
    pub username: String,
    /// Global display name, preferred over the username when present.
    pub display_name: Option<String>,
    /// Avatar hash on the CDN.
    pub avatar: Option<String>,
}

impl User {
    /// Name shown in the UI: display name if set, otherwise username.
    pub fn shown_name(&self) -> &str {
        self.display_name.as_deref().unwrap_or(&self.username)
    }
}

/// The authenticated user the relay acts for.
pub type CurrentUser = User;

/// Message author. Same shape as any other user.
pub type Author = User;

/// What kind of conversation a channel is.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChannelKind {
    /// Direct message (one-to-one or group).
    Dm { recipients: Vec<User> },
    /// Text-capable channel inside a guild.
    GuildChannel { guild_id: GuildId },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Channel {
    pub id: ChannelId,
    pub kind: ChannelKind,
    pub name: String,
}

impl Channel {
    pub fn is_dm(&self) -> bool {
        matches!(self.kind, ChannelKind::Dm { .. })
    }

    pub fn guild_id(&self) -> Option<&GuildId> {
        match &self.kind {
            ChannelKind::GuildChannel { guild_id } => Some(guild_id),
            ChannelKind::Dm { .. } => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Guild {
    pub id: GuildId,
    pub name: String,
}

/// The message a reply points at, as shown above the reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplyRef {
    pub author: User,
    pub content: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attachment {
    pub url: String,
    pub filename: String,
    pub content_type: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Embed {
    pub image_url: Option<String>,
    pub thumbnail_url: Option<String>,
    pub video_url: Option<String>,
}

/// Entry of the side-channel mention list sent with each message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MentionedUser {
    pub id: String,
    pub username: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub id: MessageId,
    pub channel_id: ChannelId,
    pub author: Author,
    pub content: String,
    pub reply: Option<ReplyRef>,
    pub attachments: Vec<Attachment>,
    pub embeds: Vec<Embed>,
    pub mentions: Vec<MentionedUser>,
    pub timestamp: DateTime<Utc>,
}

/// Display name for a DM channel. One-to-one DMs use the recipient's shown
/// name; group DMs (and DMs without recipients) use the channel name, then
/// "Unknown".
pub fn dm_display_name(is_group: bool, name: Option<&str>, recipients: &[User]) -> String {
    if !is_group {
        if let Some(first) = recipients.first() {
            return first.shown_name().to_string();
        }
    }
    match name {
        Some(n) if !n.is_empty() => n.to_string(),
        _ => "Unknown".to_string(),
    }
}
