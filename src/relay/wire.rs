//! Wire shapes returned by the relay and their conversion into the model.
//!
//! The relay forwards the remote service's JSON mostly untouched, so these
//! types are lenient about optional fields and strict about the fields the
//! synchronization engine depends on (ids, authors, timestamps).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::RelayError;
use crate::model::{
    dm_display_name, Attachment, Channel, ChannelId, ChannelKind, Embed, Guild, GuildId,
    MentionedUser, Message, MessageId, ReplyRef, User,
};
use crate::validation::validate_snowflake;

/// Channel type codes of the remote service.
const TYPE_GUILD_TEXT: u8 = 0;
const TYPE_DM: u8 = 1;
const TYPE_GROUP_DM: u8 = 3;
const TYPE_GUILD_ANNOUNCEMENT: u8 = 5;

#[derive(Debug, Clone, Deserialize)]
pub struct WireUser {
    pub id: String,
    pub username: String,
    #[serde(default)]
    pub global_name: Option<String>,
    #[serde(default)]
    pub avatar: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WireGuild {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WireChannel {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: u8,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub recipients: Vec<WireUser>,
    #[serde(default)]
    pub guild_id: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WireAttachment {
    pub url: String,
    pub filename: String,
    #[serde(default)]
    pub content_type: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WireEmbedMedia {
    #[serde(default)]
    pub url: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct WireEmbed {
    #[serde(default)]
    pub image: Option<WireEmbedMedia>,
    #[serde(default)]
    pub thumbnail: Option<WireEmbedMedia>,
    #[serde(default)]
    pub video: Option<WireEmbedMedia>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WireReferencedMessage {
    pub author: WireUser,
    #[serde(default)]
    pub content: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WireMessage {
    pub id: String,
    #[serde(default)]
    pub channel_id: Option<String>,
    pub author: WireUser,
    #[serde(default)]
    pub content: String,
    pub timestamp: String,
    #[serde(default)]
    pub mentions: Vec<WireUser>,
    #[serde(default)]
    pub referenced_message: Option<Box<WireReferencedMessage>>,
    #[serde(default)]
    pub attachments: Vec<WireAttachment>,
    #[serde(default)]
    pub embeds: Vec<WireEmbed>,
}

/// Body of `POST /api/messages/{channel}`.
#[derive(Debug, Serialize)]
pub struct SendMessageBody<'a> {
    pub content: &'a str,
}

/// Body of `POST /api/dms/create`.
#[derive(Debug, Serialize)]
pub struct OpenDmBody<'a> {
    #[serde(rename = "recipientId")]
    pub recipient_id: &'a str,
}

fn malformed(what: &str, err: impl std::fmt::Display) -> RelayError {
    RelayError::MalformedSnapshot(format!("{what}: {err}"))
}

impl TryFrom<WireUser> for User {
    type Error = RelayError;

    fn try_from(w: WireUser) -> Result<Self, Self::Error> {
        validate_snowflake(&w.id).map_err(|e| malformed("user id", e))?;
        Ok(User {
            id: w.id,
            username: w.username,
            display_name: w.global_name.filter(|n| !n.is_empty()),
            avatar: w.avatar,
        })
    }
}

impl TryFrom<WireGuild> for Guild {
    type Error = RelayError;

    fn try_from(w: WireGuild) -> Result<Self, Self::Error> {
        validate_snowflake(&w.id).map_err(|e| malformed("guild id", e))?;
        Ok(Guild {
            id: GuildId(w.id),
            name: w.name,
        })
    }
}

impl WireChannel {
    /// Validate into a [`Channel`].
    ///
    /// Returns `Ok(None)` for channel kinds the client does not display
    /// (voice, categories, threads, ...). `guild_hint` fills in the guild
    /// for listings that omit `guild_id`.
    pub fn into_channel(self, guild_hint: Option<&GuildId>) -> Result<Option<Channel>, RelayError> {
        validate_snowflake(&self.id).map_err(|e| malformed("channel id", e))?;
        match self.kind {
            TYPE_DM | TYPE_GROUP_DM => {
                let recipients = self
                    .recipients
                    .into_iter()
                    .map(User::try_from)
                    .collect::<Result<Vec<_>, _>>()?;
                let is_group = self.kind == TYPE_GROUP_DM;
                let name = dm_display_name(is_group, self.name.as_deref(), &recipients);
                Ok(Some(Channel {
                    id: ChannelId(self.id),
                    kind: ChannelKind::Dm { recipients },
                    name,
                }))
            }
            TYPE_GUILD_TEXT | TYPE_GUILD_ANNOUNCEMENT => {
                let guild_id = match (self.guild_id, guild_hint) {
                    (Some(id), _) => GuildId(id),
                    (None, Some(hint)) => hint.clone(),
                    (None, None) => {
                        return Err(RelayError::MalformedSnapshot(format!(
                            "guild channel {} has no guild id",
                            self.id
                        )))
                    }
                };
                Ok(Some(Channel {
                    id: ChannelId(self.id),
                    kind: ChannelKind::GuildChannel { guild_id },
                    name: self.name.unwrap_or_default(),
                }))
            }
            _ => Ok(None),
        }
    }
}

impl WireMessage {
    /// Validate into a [`Message`] belonging to `channel_id`.
    pub fn into_message(self, channel_id: &ChannelId) -> Result<Message, RelayError> {
        validate_snowflake(&self.id).map_err(|e| malformed("message id", e))?;
        let timestamp = DateTime::parse_from_rfc3339(&self.timestamp)
            .map_err(|e| malformed("message timestamp", e))?
            .with_timezone(&Utc);
        let author = User::try_from(self.author)?;
        let reply = match self.referenced_message {
            Some(referenced) => Some(ReplyRef {
                author: User::try_from(referenced.author)?,
                content: referenced.content,
            }),
            None => None,
        };
        let channel_id = match self.channel_id {
            Some(id) if id != channel_id.as_str() => {
                return Err(RelayError::MalformedSnapshot(format!(
                    "message {} belongs to channel {id}, expected {channel_id}",
                    self.id
                )))
            }
            _ => channel_id.clone(),
        };

        Ok(Message {
            id: MessageId(self.id),
            channel_id,
            author,
            content: self.content,
            reply,
            attachments: self
                .attachments
                .into_iter()
                .map(|a| Attachment {
                    url: a.url,
                    filename: a.filename,
                    content_type: a.content_type,
                })
                .collect(),
            embeds: self
                .embeds
                .into_iter()
                .map(|e| Embed {
                    image_url: e.image.and_then(|m| m.url),
                    thumbnail_url: e.thumbnail.and_then(|m| m.url),
                    video_url: e.video.and_then(|m| m.url),
                })
                .collect(),
            mentions: self
                .mentions
                .into_iter()
                .map(|u| MentionedUser {
                    id: u.id,
                    username: u.username,
                })
                .collect(),
            timestamp,
        })
    }
}

/// Decode a message listing, ordered oldest-first by id.
pub fn decode_messages(channel_id: &ChannelId, body: &str) -> Result<Vec<Message>, RelayError> {
    let wire: Vec<WireMessage> =
        serde_json::from_str(body).map_err(|e| malformed("message list", e))?;
    let mut messages = wire
        .into_iter()
        .map(|m| m.into_message(channel_id))
        .collect::<Result<Vec<_>, _>>()?;
    // The relay already reverses into oldest-first; sorting keeps the tail
    // correct even if it ever hands back a different order.
    messages.sort_by(|a, b| a.id.cmp(&b.id));
    Ok(messages)
}

/// Decode a channel listing, dropping kinds the client does not display.
pub fn decode_channels(body: &str, guild_hint: Option<&GuildId>) -> Result<Vec<Channel>, RelayError> {
    let wire: Vec<WireChannel> =
        serde_json::from_str(body).map_err(|e| malformed("channel list", e))?;
    let mut channels = Vec::with_capacity(wire.len());
    for w in wire {
        if let Some(channel) = w.into_channel(guild_hint)? {
            channels.push(channel);
        }
    }
    Ok(channels)
}
