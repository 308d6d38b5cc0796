use std::time::Duration;

use reqwest::{header, Client, Method, StatusCode};
use serde::de::DeserializeOwned;
use serde_json::Value;
use shared::{
    domain::{ChannelId, ChannelKind, Credential, GuildId},
    error::{ApiError, ErrorCode},
    protocol::{Channel, Guild, Identity, Message, Role, SendMessageRequest},
};
use thiserror::Error;
use tracing::{debug, warn};
use url::Url;

pub const DEFAULT_UPSTREAM_BASE_URL: &str = "https://discord.com/api/v10";
/// Size of the message window requested per channel, newest first.
pub const MESSAGE_WINDOW: u32 = 50;

#[derive(Debug, Error)]
pub enum RelayError {
    #[error("{0}")]
    Validation(String),
    #[error("Authorization header required")]
    MissingCredential,
    #[error("the provided token does not belong to a bot")]
    NotAutomated,
    #[error("upstream returned {status}")]
    Upstream { status: StatusCode, body: String },
    /// Carries detail for logs only; clients see a fixed message.
    #[error("upstream request failed")]
    Transport(String),
}

impl RelayError {
    pub fn status(&self) -> StatusCode {
        match self {
            RelayError::Validation(_) => StatusCode::BAD_REQUEST,
            RelayError::MissingCredential => StatusCode::UNAUTHORIZED,
            RelayError::NotAutomated => StatusCode::FORBIDDEN,
            RelayError::Upstream { status, .. } => *status,
            RelayError::Transport(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn code(&self) -> ErrorCode {
        match self {
            RelayError::Validation(_) => ErrorCode::Validation,
            RelayError::MissingCredential => ErrorCode::Unauthorized,
            RelayError::NotAutomated => ErrorCode::Forbidden,
            RelayError::Upstream { .. } => ErrorCode::Upstream,
            RelayError::Transport(_) => ErrorCode::Internal,
        }
    }

    /// The `{error}` envelope. Upstream failures carry the upstream body as the message.
    pub fn envelope(&self) -> ApiError {
        match self {
            RelayError::Upstream { status, body } if body.trim().is_empty() => {
                ApiError::new(format!("upstream request failed with status {}", status.as_u16()))
            }
            RelayError::Upstream { body, .. } => ApiError::new(body.clone()),
            other => ApiError::new(other.to_string()),
        }
    }
}

#[derive(Debug, Error)]
pub enum ContextError {
    #[error("invalid upstream base url '{url}': {source}")]
    InvalidBaseUrl {
        url: String,
        source: url::ParseError,
    },
    #[error("failed to build upstream http client: {0}")]
    Client(#[from] reqwest::Error),
}

/// A call to forward upstream, relative to the configured base url.
#[derive(Debug, Clone)]
pub struct RelayRequest {
    pub method: Method,
    pub path: String,
    pub query: Vec<(String, String)>,
    pub body: Option<Value>,
}

impl RelayRequest {
    pub fn get(path: impl Into<String>) -> Self {
        Self {
            method: Method::GET,
            path: path.into(),
            query: Vec::new(),
            body: None,
        }
    }

    pub fn post(path: impl Into<String>, body: Value) -> Self {
        Self {
            method: Method::POST,
            path: path.into(),
            query: Vec::new(),
            body: Some(body),
        }
    }

    pub fn with_query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((key.into(), value.into()));
        self
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum RelayResponse {
    Json { status: StatusCode, body: Value },
    NoContent,
}

#[derive(Clone)]
pub struct ApiContext {
    http: Client,
    base_url: String,
}

impl ApiContext {
    pub fn new(base_url: &str, timeout: Option<Duration>) -> Result<Self, ContextError> {
        let base_url = base_url.trim().trim_end_matches('/').to_string();
        Url::parse(&base_url).map_err(|source| ContextError::InvalidBaseUrl {
            url: base_url.clone(),
            source,
        })?;

        let mut builder = Client::builder();
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        Ok(Self {
            http: builder.build()?,
            base_url,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn endpoint(&self, request: &RelayRequest) -> Result<Url, RelayError> {
        let raw = format!("{}/{}", self.base_url, request.path.trim_start_matches('/'));
        let mut url = Url::parse(&raw)
            .map_err(|e| RelayError::Validation(format!("invalid upstream path: {e}")))?;
        if !request.query.is_empty() {
            url.query_pairs_mut().extend_pairs(&request.query);
        }
        Ok(url)
    }
}

/// Forwards one call upstream with the bot credential attached.
///
/// Non-2xx responses come back as [`RelayError::Upstream`] with the original
/// status and body. A 204 is never parsed. Connection failures and unparseable
/// success bodies become [`RelayError::Transport`].
pub async fn forward(
    ctx: &ApiContext,
    credential: &Credential,
    request: RelayRequest,
) -> Result<RelayResponse, RelayError> {
    let url = ctx.endpoint(&request)?;
    let mut builder = ctx
        .http
        .request(request.method.clone(), url)
        .header(header::AUTHORIZATION, credential.bot_authorization())
        .header(header::ACCEPT, "application/json");
    if let Some(body) = &request.body {
        builder = builder.json(body);
    }

    let response = builder.send().await.map_err(|e| {
        warn!(method = %request.method, path = %request.path, error = %e, "upstream transport failure");
        RelayError::Transport(e.to_string())
    })?;
    let status = response.status();
    debug!(method = %request.method, path = %request.path, status = status.as_u16(), "upstream call finished");

    if status == StatusCode::NO_CONTENT {
        return Ok(RelayResponse::NoContent);
    }

    let bytes = response
        .bytes()
        .await
        .map_err(|e| RelayError::Transport(e.to_string()))?;

    if !status.is_success() {
        return Err(RelayError::Upstream {
            status,
            body: String::from_utf8_lossy(&bytes).into_owned(),
        });
    }

    let body = serde_json::from_slice(&bytes).map_err(|e| {
        warn!(path = %request.path, error = %e, "upstream returned a non-JSON success body");
        RelayError::Transport(e.to_string())
    })?;
    Ok(RelayResponse::Json { status, body })
}

async fn fetch_json<T: DeserializeOwned>(
    ctx: &ApiContext,
    credential: &Credential,
    request: RelayRequest,
) -> Result<T, RelayError> {
    match forward(ctx, credential, request).await? {
        RelayResponse::Json { body, .. } => {
            serde_json::from_value(body).map_err(|e| RelayError::Transport(e.to_string()))
        }
        RelayResponse::NoContent => Err(RelayError::Transport(
            "expected a JSON body but upstream returned no content".into(),
        )),
    }
}

/// Resolves the credential's account; only automated accounts are accepted.
pub async fn verify_identity(
    ctx: &ApiContext,
    credential: &Credential,
) -> Result<Identity, RelayError> {
    let identity: Identity = fetch_json(ctx, credential, RelayRequest::get("/users/@me")).await?;
    if !identity.bot {
        return Err(RelayError::NotAutomated);
    }
    Ok(identity)
}

pub async fn list_guilds(ctx: &ApiContext, credential: &Credential) -> Result<Vec<Guild>, RelayError> {
    fetch_json(ctx, credential, RelayRequest::get("/users/@me/guilds")).await
}

pub async fn list_direct_channels(
    ctx: &ApiContext,
    credential: &Credential,
) -> Result<Vec<Channel>, RelayError> {
    let channels: Vec<Channel> =
        fetch_json(ctx, credential, RelayRequest::get("/users/@me/channels")).await?;
    Ok(channels
        .into_iter()
        .filter(|channel| channel.kind == ChannelKind::Direct)
        .collect())
}

pub async fn list_guild_channels(
    ctx: &ApiContext,
    credential: &Credential,
    guild_id: &GuildId,
) -> Result<Vec<Channel>, RelayError> {
    fetch_json(
        ctx,
        credential,
        RelayRequest::get(format!("/guilds/{guild_id}/channels")),
    )
    .await
}

pub async fn list_guild_roles(
    ctx: &ApiContext,
    credential: &Credential,
    guild_id: &GuildId,
) -> Result<Vec<Role>, RelayError> {
    fetch_json(
        ctx,
        credential,
        RelayRequest::get(format!("/guilds/{guild_id}/roles")),
    )
    .await
}

/// Newest-first window of the channel's messages, as upstream returns it.
pub async fn list_messages(
    ctx: &ApiContext,
    credential: &Credential,
    channel_id: &ChannelId,
) -> Result<Vec<Message>, RelayError> {
    fetch_json(
        ctx,
        credential,
        RelayRequest::get(format!("/channels/{channel_id}/messages"))
            .with_query("limit", MESSAGE_WINDOW.to_string()),
    )
    .await
}

pub async fn send_message(
    ctx: &ApiContext,
    credential: &Credential,
    channel_id: &ChannelId,
    request: SendMessageRequest,
) -> Result<Message, RelayError> {
    let content = request
        .content
        .as_deref()
        .map(str::trim)
        .filter(|content| !content.is_empty())
        .ok_or_else(|| RelayError::Validation("message content is required".into()))?;

    fetch_json(
        ctx,
        credential,
        RelayRequest::post(
            format!("/channels/{channel_id}/messages"),
            serde_json::json!({ "content": content }),
        ),
    )
    .await
}

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;
