//! HTTP implementation of [`MessageRelay`] against the relay's REST routes.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Response, StatusCode};
use serde::de::DeserializeOwned;
use tracing::debug;

use super::wire::{self, OpenDmBody, SendMessageBody, WireChannel, WireGuild, WireMessage, WireUser};
use super::MessageRelay;
use crate::error::RelayError;
use crate::model::{Channel, ChannelId, CurrentUser, Guild, GuildId, Message, MessageId, User};

/// Client for the authenticating relay.
///
/// The relay holds the credentials; this client only needs its base URL.
#[derive(Debug, Clone)]
pub struct HttpRelay {
    client: reqwest::Client,
    base_url: String,
}

impl HttpRelay {
    /// Build a client for the relay at `base_url` (e.g. `http://localhost:3000`).
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, RelayError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| RelayError::Transport {
                message: format!("failed to build HTTP client: {e}"),
                source: Some(Box::new(e)),
            })?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Read the body, turning non-success statuses into `RemoteRejection`.
    async fn read_body(response: Response) -> Result<String, RelayError> {
        let status = response.status();
        let body = response.text().await?;
        debug!(status = %status, bytes = body.len(), "relay response");
        if !status.is_success() {
            return Err(rejection(status, body));
        }
        Ok(body)
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, RelayError> {
        let response = self.client.get(self.url(path)).send().await?;
        let body = Self::read_body(response).await?;
        serde_json::from_str(&body)
            .map_err(|e| RelayError::MalformedSnapshot(format!("{path}: {e}")))
    }
}

fn rejection(status: StatusCode, body: String) -> RelayError {
    RelayError::RemoteRejection {
        status: status.as_u16(),
        body,
    }
}

#[async_trait]
impl MessageRelay for HttpRelay {
    async fn current_user(&self) -> Result<CurrentUser, RelayError> {
        let user: WireUser = self.get_json("/api/user").await?;
        User::try_from(user)
    }

    async fn list_guilds(&self) -> Result<Vec<Guild>, RelayError> {
        let guilds: Vec<WireGuild> = self.get_json("/api/guilds").await?;
        guilds.into_iter().map(Guild::try_from).collect()
    }

    async fn list_dm_channels(&self) -> Result<Vec<Channel>, RelayError> {
        let response = self.client.get(self.url("/api/dms")).send().await?;
        let body = Self::read_body(response).await?;
        wire::decode_channels(&body, None)
    }

    async fn list_channels(&self, guild_id: &GuildId) -> Result<Vec<Channel>, RelayError> {
        let path = format!("/api/channels/{guild_id}");
        let response = self.client.get(self.url(&path)).send().await?;
        let body = Self::read_body(response).await?;
        wire::decode_channels(&body, Some(guild_id))
    }

    async fn fetch_messages(
        &self,
        channel_id: &ChannelId,
        limit: u32,
        before: Option<&MessageId>,
    ) -> Result<Vec<Message>, RelayError> {
        let mut query = vec![("limit", limit.to_string())];
        if let Some(before) = before {
            query.push(("before", before.to_string()));
        }
        let response = self
            .client
            .get(self.url(&format!("/api/messages/{channel_id}")))
            .query(&query)
            .send()
            .await?;
        let body = Self::read_body(response).await?;
        wire::decode_messages(channel_id, &body)
    }

    async fn send_message(&self, channel_id: &ChannelId, text: &str) -> Result<Message, RelayError> {
        let response = self
            .client
            .post(self.url(&format!("/api/messages/{channel_id}")))
            .json(&SendMessageBody { content: text })
            .send()
            .await?;
        let body = Self::read_body(response).await?;
        let message: WireMessage = serde_json::from_str(&body)
            .map_err(|e| RelayError::MalformedSnapshot(format!("sent message: {e}")))?;
        message.into_message(channel_id)
    }

    async fn send_typing(&self, channel_id: &ChannelId) -> Result<(), RelayError> {
        let response = self
            .client
            .post(self.url(&format!("/api/typing/{channel_id}")))
            .send()
            .await?;
        Self::read_body(response).await.map(|_| ())
    }

    async fn close_channel(&self, channel_id: &ChannelId) -> Result<(), RelayError> {
        let response = self
            .client
            .delete(self.url(&format!("/api/dms/{channel_id}")))
            .send()
            .await?;
        Self::read_body(response).await.map(|_| ())
    }

    async fn open_dm(&self, recipient_id: &str) -> Result<Channel, RelayError> {
        let response = self
            .client
            .post(self.url("/api/dms/create"))
            .json(&OpenDmBody { recipient_id })
            .send()
            .await?;
        let body = Self::read_body(response).await?;
        let channel: WireChannel = serde_json::from_str(&body)
            .map_err(|e| RelayError::MalformedSnapshot(format!("opened DM: {e}")))?;
        channel.into_channel(None)?.ok_or_else(|| {
            RelayError::MalformedSnapshot("relay returned a non-DM channel".to_string())
        })
    }
}
