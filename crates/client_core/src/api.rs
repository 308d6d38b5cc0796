use async_trait::async_trait;
use reqwest::{header, Client, RequestBuilder};
use serde::de::DeserializeOwned;
use shared::{
    domain::{ChannelId, Credential, GuildId},
    protocol::{AuthenticateRequest, Channel, Guild, Identity, Message, Role, SendMessageRequest},
};
use tracing::debug;

use crate::error::ClientError;

/// Chat platform operations the session needs, as seen through the relay.
#[async_trait]
pub trait ChatApi: Send + Sync {
    async fn verify_identity(&self, credential: &Credential) -> Result<Identity, ClientError>;
    async fn list_guilds(&self, credential: &Credential) -> Result<Vec<Guild>, ClientError>;
    async fn list_direct_channels(&self, credential: &Credential)
        -> Result<Vec<Channel>, ClientError>;
    async fn list_guild_channels(
        &self,
        credential: &Credential,
        guild_id: &GuildId,
    ) -> Result<Vec<Channel>, ClientError>;
    async fn list_guild_roles(
        &self,
        credential: &Credential,
        guild_id: &GuildId,
    ) -> Result<Vec<Role>, ClientError>;
    /// Newest first, as the platform returns them.
    async fn list_messages(
        &self,
        credential: &Credential,
        channel_id: &ChannelId,
    ) -> Result<Vec<Message>, ClientError>;
    async fn send_message(
        &self,
        credential: &Credential,
        channel_id: &ChannelId,
        content: &str,
    ) -> Result<Message, ClientError>;
}

/// [`ChatApi`] over the relay's `/api` routes.
#[derive(Clone)]
pub struct RelayClient {
    http: Client,
    relay_url: String,
}

impl RelayClient {
    pub fn new(relay_url: impl Into<String>) -> Self {
        Self {
            http: Client::new(),
            relay_url: relay_url.into().trim_end_matches('/').to_string(),
        }
    }

    pub fn relay_url(&self) -> &str {
        &self.relay_url
    }

    fn authed(&self, builder: RequestBuilder, credential: &Credential) -> RequestBuilder {
        builder
            .header(header::AUTHORIZATION, credential.bearer_authorization())
            .header(header::ACCEPT, "application/json")
    }

    async fn get<T: DeserializeOwned>(
        &self,
        credential: &Credential,
        path: &str,
    ) -> Result<T, ClientError> {
        let request = self.authed(self.http.get(format!("{}{path}", self.relay_url)), credential);
        read_json(request, path, ClientError::from_response).await
    }
}

async fn read_json<T: DeserializeOwned>(
    request: RequestBuilder,
    path: &str,
    classify: fn(u16, &str) -> ClientError,
) -> Result<T, ClientError> {
    let response = request.send().await?;
    let status = response.status();
    debug!(path, status = status.as_u16(), "relay call finished");
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(classify(status.as_u16(), &body));
    }
    response
        .json::<T>()
        .await
        .map_err(|e| ClientError::Transport(format!("invalid response from {path}: {e}")))
}

#[async_trait]
impl ChatApi for RelayClient {
    async fn verify_identity(&self, credential: &Credential) -> Result<Identity, ClientError> {
        let path = "/api/authenticate";
        let request = self
            .http
            .post(format!("{}{path}", self.relay_url))
            .json(&AuthenticateRequest {
                token: Some(credential.expose().to_string()),
            });
        read_json(request, path, ClientError::from_verification_response).await
    }

    async fn list_guilds(&self, credential: &Credential) -> Result<Vec<Guild>, ClientError> {
        self.get(credential, "/api/guilds").await
    }

    async fn list_direct_channels(
        &self,
        credential: &Credential,
    ) -> Result<Vec<Channel>, ClientError> {
        self.get(credential, "/api/users/me/dms").await
    }

    async fn list_guild_channels(
        &self,
        credential: &Credential,
        guild_id: &GuildId,
    ) -> Result<Vec<Channel>, ClientError> {
        self.get(credential, &format!("/api/guilds/{guild_id}/channels"))
            .await
    }

    async fn list_guild_roles(
        &self,
        credential: &Credential,
        guild_id: &GuildId,
    ) -> Result<Vec<Role>, ClientError> {
        self.get(credential, &format!("/api/guilds/{guild_id}/roles"))
            .await
    }

    async fn list_messages(
        &self,
        credential: &Credential,
        channel_id: &ChannelId,
    ) -> Result<Vec<Message>, ClientError> {
        self.get(credential, &format!("/api/channels/{channel_id}/messages"))
            .await
    }

    async fn send_message(
        &self,
        credential: &Credential,
        channel_id: &ChannelId,
        content: &str,
    ) -> Result<Message, ClientError> {
        let path = format!("/api/channels/{channel_id}/messages");
        let request = self
            .authed(self.http.post(format!("{}{path}", self.relay_url)), credential)
            .json(&SendMessageRequest {
                content: Some(content.to_string()),
            });
        read_json(request, &path, ClientError::from_response).await
    }
}

#[cfg(test)]
#[path = "tests/api_tests.rs"]
mod tests;
