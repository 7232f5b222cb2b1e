use crate::buffer::RenderedMessage;
use crate::model::{Channel, ChannelId, Guild, GuildId};

/// Actions sent from the front end to the Backend
#[derive(Debug, Clone)]
pub enum BackendAction {
    /// Make a channel the active one
    SelectChannel(ChannelId),
    /// Load the text channels of a guild
    SelectGuild(GuildId),
    /// Close a channel (DMs are closed on the relay too)
    CloseChannel(ChannelId),
    /// Send a message to the active channel
    SendMessage { text: String },
    /// The compose box changed; may emit a typing signal
    InputChanged { text: String },
    /// Open a DM with a user id
    OpenDm { recipient_id: String },
    /// Stop every task and exit the backend thread
    Shutdown,
}

/// User-initiated operations whose failures are reported back
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UserAction {
    Select,
    Send,
    Typing,
    Close,
    OpenDm,
    LoadGuild,
}

impl std::fmt::Display for UserAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Select => "select channel",
            Self::Send => "send message",
            Self::Typing => "typing indicator",
            Self::Close => "close channel",
            Self::OpenDm => "open DM",
            Self::LoadGuild => "load guild channels",
        };
        f.write_str(name)
    }
}

/// Events sent from the Backend to the front end
#[derive(Debug, Clone)]
pub enum GuiEvent {
    /// Bootstrap finished; the signed-in user's display name
    Ready { username: String },
    /// Bootstrap failed; nothing else will happen
    Fatal(String),
    /// DM list, in recency order
    DmsLoaded(Vec<Channel>),
    GuildsLoaded(Vec<Guild>),
    GuildChannelsLoaded { guild_id: GuildId, channels: Vec<Channel> },
    ActiveChannelChanged { channel_id: ChannelId, name: String },
    ActiveChannelCleared,
    /// Full re-render of the active channel
    MessagesRendered {
        channel_id: ChannelId,
        messages: Vec<RenderedMessage>,
    },
    UnreadChanged { channel_id: ChannelId, count: u32 },
    /// New DM order, newest first
    DmOrderChanged(Vec<ChannelId>),
    /// New message from someone else on the active channel
    Notification {
        channel_id: ChannelId,
        channel_name: String,
        author: String,
        preview: String,
    },
    MessageSent { channel_id: ChannelId },
    /// A DM was opened and added to the known set
    DmOpened(Channel),
    ChannelClosed(ChannelId),
    ActionFailed { action: UserAction, message: String },
    /// Non-fatal backend error for the system log
    Error(String),
}
