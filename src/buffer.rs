use chrono::{DateTime, Local, TimeZone, Utc};

use crate::grouping::group_flags;
use crate::model::{Attachment, ChannelId, Embed, Message, User};
use crate::render::{escape_html, ContentRenderer};

/// Avatar CDN base; per-user avatars live under `/avatars/{id}/{hash}.png`.
pub const AVATAR_CDN: &str = "https://cdn.discordapp.com";
/// Shown for users without a custom avatar.
pub const DEFAULT_AVATAR_URL: &str = "https://cdn.discordapp.com/embed/avatars/0.png";

/// Reply previews are cut to this many characters.
const REPLY_PREVIEW_CHARS: usize = 50;
/// Toast bodies are cut to this many characters.
const NOTIFICATION_PREVIEW_CHARS: usize = 100;

/// Inline media attached to a rendered message.
#[derive(Clone, Debug, PartialEq)]
pub enum MediaItem {
    /// Still image or GIF.
    Image { url: String, alt: String },
    /// Embed preview thumbnail.
    Thumbnail { url: String },
    /// Video; embedded GIF-style videos loop silently.
    Video { url: String, looping: bool },
    /// Any other attachment, shown as a download link.
    FileLink { url: String, filename: String },
}

/// The quoted message above a reply.
#[derive(Clone, Debug, PartialEq)]
pub struct ReplyPreview {
    pub author_name: String,
    /// Escaped and truncated content.
    pub content: String,
}

/// A message ready for display.
#[derive(Clone, Debug, PartialEq)]
pub struct RenderedMessage {
    pub id: String,
    pub author_id: String,
    pub author_name: String,
    pub avatar_url: String,
    /// Local wall-clock time, `HH:MM`.
    pub timestamp: String,
    /// Attaches to the previous message (no avatar/header).
    pub grouped: bool,
    pub reply: Option<ReplyPreview>,
    /// Safe markup from [`ContentRenderer`].
    pub body: String,
    pub media: Vec<MediaItem>,
}

/// Render an oldest-first snapshot for display.
pub fn render_snapshot(messages: &[Message], renderer: &ContentRenderer) -> Vec<RenderedMessage> {
    render_snapshot_in(messages, renderer, &Local)
}

/// Same as [`render_snapshot`] with an explicit display time zone.
pub fn render_snapshot_in<Tz>(
    messages: &[Message],
    renderer: &ContentRenderer,
    tz: &Tz,
) -> Vec<RenderedMessage>
where
    Tz: TimeZone,
    Tz::Offset: std::fmt::Display,
{
    messages
        .iter()
        .zip(group_flags(messages))
        .map(|(msg, grouped)| RenderedMessage {
            id: msg.id.to_string(),
            author_id: msg.author.id.clone(),
            author_name: msg.author.shown_name().to_string(),
            avatar_url: avatar_url(&msg.author),
            timestamp: clock_time(msg.timestamp, tz),
            grouped,
            reply: msg.reply.as_ref().map(|r| ReplyPreview {
                author_name: r.author.shown_name().to_string(),
                content: escape_html(&truncate_with_ellipsis(&r.content, REPLY_PREVIEW_CHARS)),
            }),
            body: renderer.render(&msg.content, &msg.mentions),
            media: media_items(&msg.attachments, &msg.embeds),
        })
        .collect()
}

pub fn avatar_url(user: &User) -> String {
    match &user.avatar {
        Some(hash) => format!("{AVATAR_CDN}/avatars/{}/{hash}.png", user.id),
        None => DEFAULT_AVATAR_URL.to_string(),
    }
}

pub fn clock_time<Tz>(ts: DateTime<Utc>, tz: &Tz) -> String
where
    Tz: TimeZone,
    Tz::Offset: std::fmt::Display,
{
    ts.with_timezone(tz).format("%H:%M").to_string()
}

/// Keep at most `max` characters, appending `...` when something was cut.
pub fn truncate_with_ellipsis(text: &str, max: usize) -> String {
    match text.char_indices().nth(max) {
        Some((cut, _)) => format!("{}...", &text[..cut]),
        None => text.to_string(),
    }
}

/// Plain-text body for a toast notification.
pub fn notification_preview(content: &str) -> String {
    truncate_with_ellipsis(content, NOTIFICATION_PREVIEW_CHARS)
}

fn media_items(attachments: &[Attachment], embeds: &[Embed]) -> Vec<MediaItem> {
    let mut items = Vec::new();

    for attachment in attachments {
        let content_type = attachment.content_type.as_deref().unwrap_or("");
        let item = if content_type.starts_with("image/") {
            MediaItem::Image {
                url: attachment.url.clone(),
                alt: attachment.filename.clone(),
            }
        } else if content_type.starts_with("video/") {
            MediaItem::Video {
                url: attachment.url.clone(),
                looping: false,
            }
        } else {
            MediaItem::FileLink {
                url: attachment.url.clone(),
                filename: attachment.filename.clone(),
            }
        };
        items.push(item);
    }

    for embed in embeds {
        if let Some(url) = &embed.image_url {
            items.push(MediaItem::Image {
                url: url.clone(),
                alt: String::new(),
            });
        }
        if let Some(url) = &embed.thumbnail_url {
            items.push(MediaItem::Thumbnail { url: url.clone() });
        }
        // Tenor/GIPHY style GIFs arrive as video embeds
        if let Some(url) = &embed.video_url {
            items.push(MediaItem::Video {
                url: url.clone(),
                looping: true,
            });
        }
    }

    items
}

/// Front-end copy of one channel's rendered view.
#[derive(Default, Clone, Debug)]
pub struct ChannelBuffer {
    pub channel_id: Option<ChannelId>,
    pub name: String,
    pub messages: Vec<RenderedMessage>,
    /// Number of unread messages, as last reported by the backend
    pub unread_count: u32,
}

impl ChannelBuffer {
    pub fn new(channel_id: ChannelId, name: impl Into<String>) -> Self {
        Self {
            channel_id: Some(channel_id),
            name: name.into(),
            messages: Vec::new(),
            unread_count: 0,
        }
    }

    /// Replace the view with a fresh render. Returns the messages that were
    /// not present before, oldest-first.
    pub fn replace_messages(&mut self, messages: Vec<RenderedMessage>) -> &[RenderedMessage] {
        let previous_tail = self.messages.last().map(|m| m.id.clone());
        self.messages = messages;
        let start = match previous_tail {
            Some(tail) => self
                .messages
                .iter()
                .position(|m| m.id == tail)
                .map_or(0, |i| i + 1),
            None => 0,
        };
        &self.messages[start..]
    }

    pub fn clear_unread(&mut self) {
        self.unread_count = 0;
    }
}
