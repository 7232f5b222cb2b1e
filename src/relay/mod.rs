//! The message relay: the only way the client talks to the message store.
//!
//! - `wire`: serde shapes of relay responses and their validation
//! - `http`: `HttpRelay`, the reqwest-backed implementation

mod http;
pub mod wire;

pub use http::HttpRelay;

use async_trait::async_trait;

use crate::error::RelayError;
use crate::model::{Channel, ChannelId, CurrentUser, Guild, GuildId, Message, MessageId};

/// Pull-based access to the remote message store.
///
/// Every call may fail with [`RelayError`]. Implementations must return
/// messages oldest-first and must only return fully validated records.
#[async_trait]
pub trait MessageRelay: Send + Sync {
    /// The user the relay is authenticated as.
    async fn current_user(&self) -> Result<CurrentUser, RelayError>;

    async fn list_guilds(&self) -> Result<Vec<Guild>, RelayError>;

    async fn list_dm_channels(&self) -> Result<Vec<Channel>, RelayError>;

    /// Text-capable channels of a guild.
    async fn list_channels(&self, guild_id: &GuildId) -> Result<Vec<Channel>, RelayError>;

    /// Most recent `limit` messages (older than `before` if given), oldest-first.
    async fn fetch_messages(
        &self,
        channel_id: &ChannelId,
        limit: u32,
        before: Option<&MessageId>,
    ) -> Result<Vec<Message>, RelayError>;

    async fn send_message(&self, channel_id: &ChannelId, text: &str) -> Result<Message, RelayError>;

    async fn send_typing(&self, channel_id: &ChannelId) -> Result<(), RelayError>;

    async fn close_channel(&self, channel_id: &ChannelId) -> Result<(), RelayError>;

    /// Open (or fetch the existing) DM channel with a user.
    async fn open_dm(&self, recipient_id: &str) -> Result<Channel, RelayError>;
}
