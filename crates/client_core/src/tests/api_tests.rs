use super::*;
use axum::{
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use std::sync::{Arc, Mutex};
use tokio::net::TcpListener;

#[derive(Clone, Default)]
struct RelayState {
    authorizations: Arc<Mutex<Vec<String>>>,
    sent: Arc<Mutex<Vec<serde_json::Value>>>,
}

async fn authenticate(Json(body): Json<serde_json::Value>) -> Response {
    if body["token"] == "human" {
        return (
            StatusCode::FORBIDDEN,
            Json(serde_json::json!({"error": "the provided token does not belong to a bot"})),
        )
            .into_response();
    }
    Json(serde_json::json!({"id": "1", "username": "helper", "discriminator": "0", "bot": true}))
        .into_response()
}

async fn guilds(State(state): State<RelayState>, headers: HeaderMap) -> Json<serde_json::Value> {
    let auth = headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string();
    state.authorizations.lock().expect("lock").push(auth);
    Json(serde_json::json!([{"id": "1", "name": "One"}, {"id": "2", "name": "Two", "icon": "abc"}]))
}

async fn channels(Path(guild_id): Path<String>) -> Response {
    (
        StatusCode::NOT_FOUND,
        Json(serde_json::json!({"error": format!("Unknown Guild {guild_id}")})),
    )
        .into_response()
}

async fn send(
    State(state): State<RelayState>,
    Path(channel_id): Path<String>,
    Json(body): Json<serde_json::Value>,
) -> Response {
    if channel_id == "locked" {
        let upstream = serde_json::json!({"message": "Missing Permissions", "code": 50013});
        return (
            StatusCode::FORBIDDEN,
            Json(serde_json::json!({"error": upstream.to_string()})),
        )
            .into_response();
    }
    state.sent.lock().expect("lock").push(body.clone());
    Json(serde_json::json!({
        "id": "50",
        "content": body["content"],
        "timestamp": "2024-02-02T10:00:00Z",
        "author": {"id": "1", "username": "helper", "discriminator": "0", "bot": true},
        "channel_id": channel_id
    }))
    .into_response()
}

async fn garbage() -> &'static str {
    "not json"
}

async fn spawn_relay(state: RelayState) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("addr");
    let app = Router::new()
        .route("/api/authenticate", post(authenticate))
        .route("/api/guilds", get(guilds))
        .route("/api/guilds/:guild_id/channels", get(channels))
        .route("/api/guilds/:guild_id/roles", get(garbage))
        .route("/api/channels/:channel_id/messages", post(send))
        .with_state(state);
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
    format!("http://{addr}/")
}

fn credential(raw: &str) -> Credential {
    Credential::parse(raw).expect("credential")
}

#[test]
fn relay_url_trailing_slash_is_dropped() {
    let client = RelayClient::new("http://localhost:8787/");
    assert_eq!(client.relay_url(), "http://localhost:8787");
}

#[tokio::test]
async fn verify_identity_maps_forbidden_to_auth_error() {
    let client = RelayClient::new(spawn_relay(RelayState::default()).await);

    let identity = client
        .verify_identity(&credential("bot-token"))
        .await
        .expect("bot identity");
    assert!(identity.bot);

    let err = client
        .verify_identity(&credential("human"))
        .await
        .expect_err("human token");
    assert!(err.requires_reauth());
    assert_eq!(err.to_string(), "the provided token does not belong to a bot");
}

#[tokio::test]
async fn list_calls_send_bearer_credential() {
    let state = RelayState::default();
    let client = RelayClient::new(spawn_relay(state.clone()).await);

    let guilds = client.list_guilds(&credential("tok")).await.expect("guilds");
    assert_eq!(guilds.len(), 2);
    assert_eq!(guilds[1].icon.as_deref(), Some("abc"));
    assert_eq!(
        state.authorizations.lock().expect("lock").as_slice(),
        ["Bearer tok".to_string()]
    );
}

#[tokio::test]
async fn relay_error_envelope_becomes_upstream_error() {
    let client = RelayClient::new(spawn_relay(RelayState::default()).await);
    let err = client
        .list_guild_channels(&credential("tok"), &GuildId::from("77"))
        .await
        .expect_err("missing guild");
    assert_eq!(
        err,
        ClientError::Upstream {
            status: 404,
            message: "Unknown Guild 77".into()
        }
    );
}

#[tokio::test]
async fn unparseable_success_body_is_a_transport_error() {
    let client = RelayClient::new(spawn_relay(RelayState::default()).await);
    let err = client
        .list_guild_roles(&credential("tok"), &GuildId::from("1"))
        .await
        .expect_err("garbage body");
    assert!(matches!(err, ClientError::Transport(_)));
}

#[tokio::test]
async fn send_message_posts_content_body() {
    let state = RelayState::default();
    let client = RelayClient::new(spawn_relay(state.clone()).await);
    let message = client
        .send_message(&credential("tok"), &ChannelId::from("9"), "hello there")
        .await
        .expect("sent");
    assert_eq!(message.content, "hello there");
    assert_eq!(
        state.sent.lock().expect("lock")[0],
        serde_json::json!({"content": "hello there"})
    );
}

#[tokio::test]
async fn forbidden_send_is_an_upstream_error() {
    let client = RelayClient::new(spawn_relay(RelayState::default()).await);
    let err = client
        .send_message(&credential("tok"), &ChannelId::from("locked"), "hello")
        .await
        .expect_err("locked channel");
    assert_eq!(
        err,
        ClientError::Upstream {
            status: 403,
            message: "Missing Permissions".into()
        }
    );
    assert!(!err.requires_reauth());
}

#[tokio::test]
async fn unreachable_relay_is_a_transport_error() {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("addr");
    drop(listener);
    let client = RelayClient::new(format!("http://{addr}"));
    let err = client
        .list_guilds(&credential("tok"))
        .await
        .expect_err("closed port");
    assert!(matches!(err, ClientError::Transport(_)));
}
