//! Backend event processing for the terminal front end.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::buffer::{MediaItem, RenderedMessage};
use crate::protocol::GuiEvent;
use crate::state::ClientState;

static EMOJI_TAG_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"<img class="emoji"[^>]*alt="([^"]*)"[^>]*>"#).expect("emoji tag regex pattern is valid")
});
static TAG_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"<[^>]+>").expect("tag regex pattern is valid"));

/// Apply one event to the state, queueing whatever should be printed.
pub fn apply_event(state: &mut ClientState, event: GuiEvent) {
    match event {
        GuiEvent::Ready { username } => {
            state.is_ready = true;
            state.log(format!("Signed in as {}. Type /help for commands.", username));
            state.username = username;
        }

        GuiEvent::Fatal(msg) => {
            state.log(format!("Fatal: {}", msg));
        }

        GuiEvent::Error(msg) => {
            state.log(format!("Error: {}", msg));
        }

        GuiEvent::DmsLoaded(dms) => {
            state.log(format!("{} direct messages", dms.len()));
            state.dms = dms;
        }

        GuiEvent::GuildsLoaded(guilds) => {
            state.log(format!("{} servers", guilds.len()));
            state.guilds = guilds;
        }

        GuiEvent::GuildChannelsLoaded { guild_id, channels } => {
            let guild_name = state
                .find_guild(guild_id.as_str())
                .map(|g| g.name.clone())
                .unwrap_or_else(|| guild_id.to_string());
            state.say(format!("Channels in {}:", guild_name));
            for channel in &channels {
                state.say(format!("  #{} ({})", channel.name, channel.id));
            }
            state.guild_channels.insert(guild_id, channels);
        }

        GuiEvent::ActiveChannelChanged { channel_id, name } => {
            // A new session starts with a full render; print all of it
            let buffer = state.ensure_buffer(&channel_id);
            buffer.clear_unread();
            buffer.messages.clear();
            state.active_channel = Some(channel_id);
            state.say(format!("--- {} ---", name));
        }

        GuiEvent::ActiveChannelCleared => {
            state.active_channel = None;
            state.log("No channel open");
        }

        GuiEvent::MessagesRendered {
            channel_id,
            messages,
        } => {
            let is_active = state.active_channel.as_ref() == Some(&channel_id);
            let buffer = state.ensure_buffer(&channel_id);
            let added: Vec<RenderedMessage> = buffer.replace_messages(messages).to_vec();
            if is_active {
                for msg in &added {
                    for line in message_lines(msg) {
                        state.say(line);
                    }
                }
            }
        }

        GuiEvent::UnreadChanged { channel_id, count } => {
            state.ensure_buffer(&channel_id).unread_count = count;
            if count > 0 {
                let name = state
                    .channel(&channel_id)
                    .map(|c| c.name.clone())
                    .unwrap_or_else(|| channel_id.to_string());
                state.log(format!("{} unread in {}", count, name));
            }
        }

        GuiEvent::DmOrderChanged(order) => {
            state.apply_dm_order(&order);
        }

        GuiEvent::Notification {
            channel_name,
            author,
            preview,
            ..
        } => {
            state.say(format!("\x07[{}] {}: {}", channel_name, author, preview));
        }

        GuiEvent::MessageSent { .. } => {}

        GuiEvent::DmOpened(channel) => {
            state.log(format!("Opened DM with {}", channel.name));
            state.add_dm(channel);
        }

        GuiEvent::ChannelClosed(channel_id) => {
            let name = state
                .channel(&channel_id)
                .map(|c| c.name.clone())
                .unwrap_or_else(|| channel_id.to_string());
            state.remove_channel(&channel_id);
            state.log(format!("Closed {}", name));
        }

        GuiEvent::ActionFailed { action, message } => {
            state.log(format!("Could not {}: {}", action, message));
        }
    }
}

/// Terminal lines for one rendered message.
pub fn message_lines(msg: &RenderedMessage) -> Vec<String> {
    let mut lines = Vec::new();
    if let Some(reply) = &msg.reply {
        lines.push(format!("  ┌ {}: {}", reply.author_name, markup_to_text(&reply.content)));
    }
    let body = markup_to_text(&msg.body);
    if msg.grouped {
        lines.push(format!("        {}", body));
    } else {
        lines.push(format!("[{}] {}: {}", msg.timestamp, msg.author_name, body));
    }
    for item in &msg.media {
        lines.push(match item {
            MediaItem::Image { url, .. } => format!("        [image] {}", url),
            MediaItem::Thumbnail { url } => format!("        [preview] {}", url),
            MediaItem::Video { url, .. } => format!("        [video] {}", url),
            MediaItem::FileLink { url, filename } => format!("        [file] {} {}", filename, url),
        });
    }
    lines
}

/// Flatten rendered markup for a terminal: emoji become `:name:`, other
/// tags are dropped and entities are decoded.
pub fn markup_to_text(markup: &str) -> String {
    let text = EMOJI_TAG_RE.replace_all(markup, "$1");
    let text = TAG_RE.replace_all(&text, "");
    text.replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&amp;", "&")
}
