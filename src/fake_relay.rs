//! In-memory [`MessageRelay`] for scheduler and flow tests.
//!
//! Fetches can be gated per channel so a test decides when (and in which
//! order) responses come back.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{Duration, TimeZone, Utc};
use tokio::sync::oneshot;

use crate::error::RelayError;
use crate::model::{
    Channel, ChannelId, ChannelKind, CurrentUser, Guild, GuildId, Message, MessageId, User,
};
use crate::relay::MessageRelay;

pub const ME: &str = "1";

pub fn user(id: &str, name: &str) -> User {
    User {
        id: id.into(),
        username: name.into(),
        display_name: None,
        avatar: None,
    }
}

pub fn dm(id: &str, name: &str) -> Channel {
    Channel {
        id: ChannelId::new(id),
        kind: ChannelKind::Dm {
            recipients: vec![user(&format!("9{id}"), name)],
        },
        name: name.into(),
    }
}

pub fn text_channel(id: &str, guild: &str) -> Channel {
    Channel {
        id: ChannelId::new(id),
        kind: ChannelKind::GuildChannel {
            guild_id: GuildId::new(guild),
        },
        name: format!("chan-{id}"),
    }
}

/// Message `id` in `channel`, timestamped `id` seconds after a fixed epoch.
pub fn message(channel: &str, id: u64, author: &str, content: &str) -> Message {
    let base = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
    Message {
        id: MessageId::new(id.to_string()),
        channel_id: ChannelId::new(channel),
        author: user(author, &format!("user{author}")),
        content: content.into(),
        reply: None,
        attachments: vec![],
        embeds: vec![],
        mentions: vec![],
        timestamp: base + Duration::seconds(id as i64),
    }
}

#[derive(Default)]
struct FakeState {
    dms: Vec<Channel>,
    guilds: Vec<Guild>,
    guild_channels: HashMap<GuildId, Vec<Channel>>,
    messages: HashMap<ChannelId, Vec<Message>>,
    failing: HashSet<ChannelId>,
    gates: HashMap<ChannelId, VecDeque<oneshot::Receiver<()>>>,
    next_id: u64,
    fail_user: bool,
    fail_sends: bool,
    fetches: Vec<(ChannelId, u32)>,
    sent: Vec<(ChannelId, String)>,
    typing: Vec<ChannelId>,
    closed: Vec<ChannelId>,
}

pub struct FakeRelay {
    me: CurrentUser,
    state: Mutex<FakeState>,
}

impl Default for FakeRelay {
    fn default() -> Self {
        Self::new()
    }
}

impl FakeRelay {
    pub fn new() -> Self {
        Self {
            me: user(ME, "me"),
            state: Mutex::new(FakeState {
                next_id: 1_000,
                ..Default::default()
            }),
        }
    }

    fn with<R>(&self, f: impl FnOnce(&mut FakeState) -> R) -> R {
        let mut state = self.state.lock().unwrap();
        f(&mut state)
    }

    pub fn add_dm(&self, channel: Channel) {
        self.with(|s| s.dms.push(channel));
    }

    pub fn add_guild(&self, guild: Guild, channels: Vec<Channel>) {
        self.with(|s| {
            s.guild_channels.insert(guild.id.clone(), channels);
            s.guilds.push(guild);
        });
    }

    pub fn push_message(&self, msg: Message) {
        self.with(|s| {
            s.messages
                .entry(msg.channel_id.clone())
                .or_default()
                .push(msg)
        });
    }

    pub fn set_failing(&self, channel: &ChannelId, failing: bool) {
        self.with(|s| {
            if failing {
                s.failing.insert(channel.clone());
            } else {
                s.failing.remove(channel);
            }
        });
    }

    pub fn fail_current_user(&self) {
        self.with(|s| s.fail_user = true);
    }

    pub fn fail_sends(&self) {
        self.with(|s| s.fail_sends = true);
    }

    /// Hold the next fetch of `channel` until the returned sender fires.
    pub fn gate_next_fetch(&self, channel: &ChannelId) -> oneshot::Sender<()> {
        let (tx, rx) = oneshot::channel();
        self.with(|s| s.gates.entry(channel.clone()).or_default().push_back(rx));
        tx
    }

    pub fn fetches(&self) -> Vec<(ChannelId, u32)> {
        self.with(|s| s.fetches.clone())
    }

    pub fn fetch_count(&self, channel: &ChannelId) -> usize {
        self.with(|s| s.fetches.iter().filter(|(c, _)| c == channel).count())
    }

    pub fn sent(&self) -> Vec<(ChannelId, String)> {
        self.with(|s| s.sent.clone())
    }

    pub fn typing(&self) -> Vec<ChannelId> {
        self.with(|s| s.typing.clone())
    }

    pub fn closed(&self) -> Vec<ChannelId> {
        self.with(|s| s.closed.clone())
    }
}

#[async_trait]
impl MessageRelay for FakeRelay {
    async fn current_user(&self) -> Result<CurrentUser, RelayError> {
        if self.with(|s| s.fail_user) {
            return Err(RelayError::RemoteRejection {
                status: 401,
                body: "unauthorized".into(),
            });
        }
        Ok(self.me.clone())
    }

    async fn list_guilds(&self) -> Result<Vec<Guild>, RelayError> {
        Ok(self.with(|s| s.guilds.clone()))
    }

    async fn list_dm_channels(&self) -> Result<Vec<Channel>, RelayError> {
        Ok(self.with(|s| s.dms.clone()))
    }

    async fn list_channels(&self, guild_id: &GuildId) -> Result<Vec<Channel>, RelayError> {
        self.with(|s| s.guild_channels.get(guild_id).cloned())
            .ok_or_else(|| RelayError::RemoteRejection {
                status: 404,
                body: "unknown guild".into(),
            })
    }

    async fn fetch_messages(
        &self,
        channel_id: &ChannelId,
        limit: u32,
        _before: Option<&MessageId>,
    ) -> Result<Vec<Message>, RelayError> {
        let gate = self.with(|s| {
            s.fetches.push((channel_id.clone(), limit));
            s.gates.get_mut(channel_id).and_then(VecDeque::pop_front)
        });
        if let Some(gate) = gate {
            let _ = gate.await;
        }
        self.with(|s| {
            if s.failing.contains(channel_id) {
                return Err(RelayError::transport("connection refused"));
            }
            let all = s.messages.get(channel_id).cloned().unwrap_or_default();
            let skip = all.len().saturating_sub(limit as usize);
            Ok(all[skip..].to_vec())
        })
    }

    async fn send_message(&self, channel_id: &ChannelId, text: &str) -> Result<Message, RelayError> {
        let me = self.me.clone();
        self.with(|s| {
            if s.fail_sends {
                return Err(RelayError::RemoteRejection {
                    status: 403,
                    body: "missing access".into(),
                });
            }
            s.next_id += 1;
            s.sent.push((channel_id.clone(), text.to_string()));
            let mut msg = message(channel_id.as_str(), s.next_id, &me.id, text);
            msg.author = me;
            s.messages
                .entry(channel_id.clone())
                .or_default()
                .push(msg.clone());
            Ok(msg)
        })
    }

    async fn send_typing(&self, channel_id: &ChannelId) -> Result<(), RelayError> {
        self.with(|s| s.typing.push(channel_id.clone()));
        Ok(())
    }

    async fn close_channel(&self, channel_id: &ChannelId) -> Result<(), RelayError> {
        self.with(|s| {
            s.closed.push(channel_id.clone());
            s.dms.retain(|c| &c.id != channel_id);
        });
        Ok(())
    }

    async fn open_dm(&self, recipient_id: &str) -> Result<Channel, RelayError> {
        let channel = dm(&format!("5{recipient_id}"), &format!("user{recipient_id}"));
        self.with(|s| {
            if !s.dms.iter().any(|c| c.id == channel.id) {
                s.dms.push(channel.clone());
            }
        });
        Ok(channel)
    }
}
