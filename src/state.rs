//! Front-end state, mirrored from backend events.
//!
//! `ClientState` holds what the terminal shows: the DM list in recency
//! order, loaded guilds and their channels, one buffer per opened channel,
//! and pending output lines. The backend stays the source of truth; this
//! is only updated from `GuiEvent`s.

use chrono::Local;
use std::collections::HashMap;

use crate::buffer::ChannelBuffer;
use crate::model::{Channel, ChannelId, Guild, GuildId};
use crate::sorter::filter_by_name;

/// Keep the system log from growing without bound.
const MAX_SYSTEM_LOG: usize = 500;

#[derive(Default)]
pub struct ClientState {
    /// Bootstrap finished.
    pub is_ready: bool,

    /// Display name of the signed-in user.
    pub username: String,

    /// DMs, most recent first.
    pub dms: Vec<Channel>,

    pub guilds: Vec<Guild>,

    /// Text channels of each loaded guild.
    pub guild_channels: HashMap<GuildId, Vec<Channel>>,

    /// Rendered views keyed by channel.
    pub buffers: HashMap<ChannelId, ChannelBuffer>,

    /// Currently active channel.
    pub active_channel: Option<ChannelId>,

    /// Timestamped system messages.
    pub system_log: Vec<String>,

    /// Lines waiting to be printed.
    output: Vec<String>,
}

impl ClientState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a line for display.
    pub fn say(&mut self, line: impl Into<String>) {
        self.output.push(line.into());
    }

    /// Queue a system line and keep it in the log.
    pub fn log(&mut self, msg: impl Into<String>) {
        let ts = Local::now().format("%H:%M:%S").to_string();
        let line = format!("[{}] {}", ts, msg.into());
        self.system_log.push(line.clone());
        if self.system_log.len() > MAX_SYSTEM_LOG {
            self.system_log.remove(0);
        }
        self.output.push(line);
    }

    pub fn drain_output(&mut self) -> Vec<String> {
        std::mem::take(&mut self.output)
    }

    /// Every known channel: DMs first, then guild channels.
    pub fn all_channels(&self) -> Vec<&Channel> {
        let mut all: Vec<&Channel> = self.dms.iter().collect();
        for guild in &self.guilds {
            if let Some(channels) = self.guild_channels.get(&guild.id) {
                all.extend(channels.iter());
            }
        }
        all
    }

    pub fn channel(&self, id: &ChannelId) -> Option<&Channel> {
        self.all_channels().into_iter().find(|c| &c.id == id)
    }

    /// Resolve user input to a channel: exact id, then exact name
    /// (case-insensitive), then a unique partial name match.
    pub fn find_channel(&self, query: &str) -> Option<&Channel> {
        let query = query.trim().trim_start_matches('#');
        let all = self.all_channels();
        if let Some(c) = all.iter().find(|c| c.id.as_str() == query) {
            return Some(*c);
        }
        if let Some(c) = all.iter().find(|c| c.name.eq_ignore_ascii_case(query)) {
            return Some(*c);
        }
        match filter_by_name(&all, query).as_slice() {
            [only] => Some(*only),
            _ => None,
        }
    }

    pub fn find_guild(&self, query: &str) -> Option<&Guild> {
        let query = query.trim();
        self.guilds
            .iter()
            .find(|g| g.id.as_str() == query)
            .or_else(|| self.guilds.iter().find(|g| g.name.eq_ignore_ascii_case(query)))
    }

    /// Get a mutable reference to a buffer, creating it if needed.
    pub fn ensure_buffer(&mut self, id: &ChannelId) -> &mut ChannelBuffer {
        let name = self
            .channel(id)
            .map(|c| c.name.clone())
            .unwrap_or_else(|| id.to_string());
        self.buffers
            .entry(id.clone())
            .or_insert_with(|| ChannelBuffer::new(id.clone(), name))
    }

    pub fn unread(&self, id: &ChannelId) -> u32 {
        self.buffers.get(id).map_or(0, |b| b.unread_count)
    }

    /// Reorder the DM list to match the backend's order. DMs missing from
    /// `order` keep their relative position at the end.
    pub fn apply_dm_order(&mut self, order: &[ChannelId]) {
        let rank = |c: &Channel| order.iter().position(|id| id == &c.id).unwrap_or(usize::MAX);
        self.dms.sort_by_key(rank);
    }

    pub fn add_dm(&mut self, dm: Channel) {
        if !self.dms.iter().any(|c| c.id == dm.id) {
            self.dms.insert(0, dm);
        }
    }

    pub fn remove_channel(&mut self, id: &ChannelId) {
        self.dms.retain(|c| &c.id != id);
        for channels in self.guild_channels.values_mut() {
            channels.retain(|c| &c.id != id);
        }
        self.buffers.remove(id);
        if self.active_channel.as_ref() == Some(id) {
            self.active_channel = None;
        }
    }

    /// One line per channel with its unread badge.
    pub fn channel_lines(&self, channels: &[&Channel]) -> Vec<String> {
        channels
            .iter()
            .map(|c| {
                let marker = if self.active_channel.as_ref() == Some(&c.id) {
                    '*'
                } else {
                    ' '
                };
                match self.unread(&c.id) {
                    0 => format!("{} {} ({})", marker, c.name, c.id),
                    n => format!("{} {} ({}) [{}]", marker, c.name, c.id, n),
                }
            })
            .collect()
    }
}
