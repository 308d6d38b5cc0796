use std::{net::SocketAddr, sync::Arc};

use axum::{
    body::Bytes,
    extract::{Path, Query, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use reqwest::Method;
use server_api::{
    forward, list_direct_channels, list_guild_channels, list_guild_roles, list_guilds,
    list_messages, send_message, verify_identity, ApiContext, RelayError, RelayRequest,
    RelayResponse,
};
use shared::{
    domain::{ChannelId, Credential, GuildId},
    error::ApiError,
    protocol::{AuthenticateRequest, Channel, Guild, Identity, Message, Role, SendMessageRequest},
};
use tower_http::limit::RequestBodyLimitLayer;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

mod app_state;
mod config;

use app_state::AppState;
use config::{load_settings, prepare_upstream_base_url};

type HttpResult<T> = Result<T, (StatusCode, Json<ApiError>)>;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let settings = load_settings();
    let upstream_base_url = prepare_upstream_base_url(&settings.upstream_base_url)?;
    let api = ApiContext::new(&upstream_base_url, settings.upstream_timeout()).map_err(|error| {
        error!(%upstream_base_url, %error, "failed to build upstream client");
        error
    })?;

    let state = AppState { api };
    let app = build_router(Arc::new(state), settings.max_body_bytes);

    let addr: SocketAddr = settings.server_bind.parse()?;
    info!(%addr, upstream = %upstream_base_url, "relay listening");
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

fn build_router(state: Arc<AppState>, max_body_bytes: usize) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/api/authenticate", post(authenticate))
        .route("/api/guilds", get(http_list_guilds))
        .route("/api/guilds/:guild_id/channels", get(http_list_channels))
        .route("/api/guilds/:guild_id/roles", get(http_list_roles))
        .route("/api/users/me/dms", get(http_list_direct_channels))
        .route(
            "/api/channels/:channel_id/messages",
            get(http_list_messages).post(http_send_message),
        )
        .route(
            "/api/discord/*path",
            get(relay_get).post(relay_post),
        )
        .layer(RequestBodyLimitLayer::new(max_body_bytes))
        .with_state(state)
}

async fn healthz() -> &'static str {
    "ok"
}

fn reject(err: RelayError) -> (StatusCode, Json<ApiError>) {
    match &err {
        RelayError::Transport(detail) => error!(%detail, "relay transport failure"),
        other => warn!(status = other.status().as_u16(), code = ?other.code(), "relay request rejected"),
    }
    (err.status(), Json(err.envelope()))
}

fn credential_from(headers: &HeaderMap) -> Result<Credential, RelayError> {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(Credential::from_authorization_header)
        .ok_or(RelayError::MissingCredential)
}

async fn authenticate(
    State(state): State<Arc<AppState>>,
    Json(req): Json<AuthenticateRequest>,
) -> HttpResult<Json<Identity>> {
    let credential = req
        .token
        .as_deref()
        .and_then(Credential::parse)
        .ok_or_else(|| reject(RelayError::Validation("token is required".into())))?;
    let identity = verify_identity(&state.api, &credential)
        .await
        .map_err(reject)?;
    info!(bot_id = %identity.id, "bot credential verified");
    Ok(Json(identity))
}

async fn http_list_guilds(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> HttpResult<Json<Vec<Guild>>> {
    let credential = credential_from(&headers).map_err(reject)?;
    let guilds = list_guilds(&state.api, &credential).await.map_err(reject)?;
    Ok(Json(guilds))
}

async fn http_list_direct_channels(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> HttpResult<Json<Vec<Channel>>> {
    let credential = credential_from(&headers).map_err(reject)?;
    let channels = list_direct_channels(&state.api, &credential)
        .await
        .map_err(reject)?;
    Ok(Json(channels))
}

async fn http_list_channels(
    State(state): State<Arc<AppState>>,
    Path(guild_id): Path<String>,
    headers: HeaderMap,
) -> HttpResult<Json<Vec<Channel>>> {
    let credential = credential_from(&headers).map_err(reject)?;
    let channels = list_guild_channels(&state.api, &credential, &GuildId(guild_id))
        .await
        .map_err(reject)?;
    Ok(Json(channels))
}

async fn http_list_roles(
    State(state): State<Arc<AppState>>,
    Path(guild_id): Path<String>,
    headers: HeaderMap,
) -> HttpResult<Json<Vec<Role>>> {
    let credential = credential_from(&headers).map_err(reject)?;
    let roles = list_guild_roles(&state.api, &credential, &GuildId(guild_id))
        .await
        .map_err(reject)?;
    Ok(Json(roles))
}

async fn http_list_messages(
    State(state): State<Arc<AppState>>,
    Path(channel_id): Path<String>,
    headers: HeaderMap,
) -> HttpResult<Json<Vec<Message>>> {
    let credential = credential_from(&headers).map_err(reject)?;
    let messages = list_messages(&state.api, &credential, &ChannelId(channel_id))
        .await
        .map_err(reject)?;
    Ok(Json(messages))
}

async fn http_send_message(
    State(state): State<Arc<AppState>>,
    Path(channel_id): Path<String>,
    headers: HeaderMap,
    Json(req): Json<SendMessageRequest>,
) -> HttpResult<Json<Message>> {
    let credential = credential_from(&headers).map_err(reject)?;
    let message = send_message(&state.api, &credential, &ChannelId(channel_id), req)
        .await
        .map_err(reject)?;
    Ok(Json(message))
}

async fn relay_get(
    State(state): State<Arc<AppState>>,
    Path(path): Path<String>,
    Query(query): Query<Vec<(String, String)>>,
    headers: HeaderMap,
) -> Response {
    relay(
        &state,
        &headers,
        RelayRequest {
            method: Method::GET,
            path,
            query,
            body: None,
        },
    )
    .await
}

async fn relay_post(
    State(state): State<Arc<AppState>>,
    Path(path): Path<String>,
    Query(query): Query<Vec<(String, String)>>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let body = if body.is_empty() {
        None
    } else {
        match serde_json::from_slice(&body) {
            Ok(value) => Some(value),
            Err(e) => {
                return reject(RelayError::Validation(format!("request body must be JSON: {e}")))
                    .into_response()
            }
        }
    };
    relay(
        &state,
        &headers,
        RelayRequest {
            method: Method::POST,
            path,
            query,
            body,
        },
    )
    .await
}

/// Catch-all forwarding: upstream bodies and statuses pass through unwrapped.
async fn relay(state: &AppState, headers: &HeaderMap, request: RelayRequest) -> Response {
    let credential = match credential_from(headers) {
        Ok(credential) => credential,
        Err(err) => return reject(err).into_response(),
    };

    match forward(&state.api, &credential, request).await {
        Ok(RelayResponse::Json { status, body }) => (status, Json(body)).into_response(),
        Ok(RelayResponse::NoContent) => StatusCode::NO_CONTENT.into_response(),
        Err(RelayError::Upstream { status, body }) => {
            warn!(status = status.as_u16(), "upstream rejected relayed request");
            (status, [(header::CONTENT_TYPE, "application/json")], body).into_response()
        }
        Err(err) => reject(err).into_response(),
    }
}

#[cfg(test)]
#[path = "tests/main_tests.rs"]
mod tests;
