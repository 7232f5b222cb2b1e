//! Everything the backend knows about the current session.
//!
//! `SessionContext` is owned by the scheduler and only touched from its
//! loop; nothing here is shared across tasks.

use std::collections::HashMap;

use crate::backend::PollHandle;
use crate::model::{Channel, ChannelId, CurrentUser, Guild, GuildId};
use crate::notification::NotificationStore;
use crate::sorter::ChannelSorter;

/// The channel currently being fast-polled.
#[derive(Debug)]
pub struct ActiveSession {
    pub channel_id: ChannelId,
    /// Strictly increasing across sessions.
    pub generation: u64,
    pub handle: PollHandle,
    /// Pending post-send refetch, if any.
    pub refetch: Option<PollHandle>,
    /// Whether this session has rendered at least once.
    pub rendered: bool,
    /// A fetch was wanted while another one for the channel was in flight.
    pub fetch_pending: bool,
}

#[derive(Debug, Default)]
pub struct SessionContext {
    pub me: Option<CurrentUser>,
    pub channels: HashMap<ChannelId, Channel>,
    /// DM ids, most recent first once sorted.
    pub dm_order: Vec<ChannelId>,
    pub guilds: Vec<Guild>,
    /// Loaded guild channel ids per guild, in relay order.
    pub guild_channels: HashMap<GuildId, Vec<ChannelId>>,
    pub notifications: NotificationStore,
    pub sorter: ChannelSorter,
    pub active: Option<ActiveSession>,
    last_generation: u64,
}

impl SessionContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn self_id(&self) -> &str {
        self.me.as_ref().map_or("", |me| me.id.as_str())
    }

    pub fn next_generation(&mut self) -> u64 {
        self.last_generation += 1;
        self.last_generation
    }

    pub fn is_active(&self, channel_id: &ChannelId) -> bool {
        self.active
            .as_ref()
            .is_some_and(|s| &s.channel_id == channel_id)
    }

    /// Whether `generation` belongs to the current active session on
    /// `channel_id`.
    pub fn is_current(&self, channel_id: &ChannelId, generation: u64) -> bool {
        self.active
            .as_ref()
            .is_some_and(|s| s.generation == generation && &s.channel_id == channel_id)
    }

    /// Replace the DM list.
    pub fn set_dms(&mut self, dms: Vec<Channel>) {
        self.channels.retain(|_, c| !c.is_dm());
        self.dm_order = dms.iter().map(|c| c.id.clone()).collect();
        for dm in dms {
            self.channels.insert(dm.id.clone(), dm);
        }
    }

    /// Add one DM at the top of the list. Returns false if already known.
    pub fn add_dm(&mut self, dm: Channel) -> bool {
        if self.channels.contains_key(&dm.id) {
            return false;
        }
        self.dm_order.insert(0, dm.id.clone());
        self.channels.insert(dm.id.clone(), dm);
        true
    }

    pub fn set_guild_channels(&mut self, guild_id: &GuildId, channels: Vec<Channel>) {
        if let Some(old) = self.guild_channels.remove(guild_id) {
            for id in old {
                if !self.is_active(&id) {
                    self.channels.remove(&id);
                }
            }
        }
        let ids: Vec<ChannelId> = channels.iter().map(|c| c.id.clone()).collect();
        for channel in channels {
            self.channels.insert(channel.id.clone(), channel);
        }
        self.guild_channels.insert(guild_id.clone(), ids);
    }

    /// Forget a channel entirely, notification state included.
    pub fn remove_channel(&mut self, channel_id: &ChannelId) -> Option<Channel> {
        let channel = self.channels.remove(channel_id)?;
        self.dm_order.retain(|id| id != channel_id);
        if let Some(guild_id) = channel.guild_id() {
            if let Some(ids) = self.guild_channels.get_mut(guild_id) {
                ids.retain(|id| id != channel_id);
            }
        }
        self.notifications.remove(channel_id);
        Some(channel)
    }

    /// DMs in their current display order.
    pub fn dm_channels(&self) -> Vec<&Channel> {
        self.dm_order
            .iter()
            .filter_map(|id| self.channels.get(id))
            .collect()
    }

    /// Channels the background sweep should visit, never the active one.
    pub fn sweep_targets(&self, include_guild_channels: bool) -> Vec<ChannelId> {
        let mut targets: Vec<ChannelId> = self.dm_order.clone();
        if include_guild_channels {
            for guild in &self.guilds {
                if let Some(ids) = self.guild_channels.get(&guild.id) {
                    targets.extend(ids.iter().cloned());
                }
            }
        }
        targets.retain(|id| !self.is_active(id));
        targets
    }

    /// Re-sort the DM list if any timestamp moved since the last sort.
    pub fn resort_dms_if_dirty(&mut self) -> Option<Vec<ChannelId>> {
        let dms: Vec<&Channel> = self
            .dm_order
            .iter()
            .filter_map(|id| self.channels.get(id))
            .collect();
        let order = self.sorter.sort_if_dirty(&dms, &self.notifications)?;
        self.dm_order = order.clone();
        Some(order)
    }
}
