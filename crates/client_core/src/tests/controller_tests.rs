use super::*;
use crate::credential_store::MemoryCredentialStore;
use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use shared::{
    domain::{ChannelId, ChannelKind, Credential, GuildId, MessageId, UserId},
    protocol::{Channel, Guild, Identity, Message, Role},
};
use std::sync::Mutex;

#[derive(Default)]
struct FakeApi {
    calls: Mutex<Vec<String>>,
    messages: Mutex<Vec<Message>>,
    fail_sends: bool,
}

impl FakeApi {
    fn record(&self, call: impl Into<String>) {
        self.calls.lock().expect("lock").push(call.into());
    }

    fn calls(&self) -> Vec<String> {
        self.calls.lock().expect("lock").clone()
    }

    fn count(&self, prefix: &str) -> usize {
        self.calls().iter().filter(|c| c.starts_with(prefix)).count()
    }
}

fn identity(id: &str, bot: bool) -> Identity {
    Identity {
        id: UserId::new(id),
        username: format!("user-{id}"),
        discriminator: "0".into(),
        global_name: None,
        avatar: None,
        bot,
    }
}

fn text_channel(id: &str, position: i64) -> Channel {
    Channel {
        id: ChannelId::new(id),
        kind: ChannelKind::Text,
        name: Some(id.to_string()),
        parent_id: None,
        position: Some(position),
        recipients: Vec::new(),
    }
}

#[async_trait]
impl ChatApi for FakeApi {
    async fn verify_identity(&self, credential: &Credential) -> Result<Identity, ClientError> {
        self.record("verify");
        match credential.expose() {
            "bot-token" => Ok(identity("1", true)),
            "human-token" => Ok(identity("2", false)),
            _ => Err(ClientError::from_response(401, r#"{"error":"401: Unauthorized"}"#)),
        }
    }

    async fn list_guilds(&self, _: &Credential) -> Result<Vec<Guild>, ClientError> {
        self.record("guilds");
        Ok(vec![
            Guild {
                id: GuildId::new("g1"),
                name: "One".into(),
                icon: None,
            },
            Guild {
                id: GuildId::new("g2"),
                name: "Two".into(),
                icon: None,
            },
        ])
    }

    async fn list_direct_channels(&self, _: &Credential) -> Result<Vec<Channel>, ClientError> {
        self.record("dms");
        Ok(Vec::new())
    }

    async fn list_guild_channels(
        &self,
        _: &Credential,
        guild_id: &GuildId,
    ) -> Result<Vec<Channel>, ClientError> {
        self.record(format!("channels:{guild_id}"));
        Ok(vec![
            text_channel(&format!("{guild_id}-b"), 2),
            text_channel(&format!("{guild_id}-a"), 1),
        ])
    }

    async fn list_guild_roles(
        &self,
        _: &Credential,
        guild_id: &GuildId,
    ) -> Result<Vec<Role>, ClientError> {
        self.record(format!("roles:{guild_id}"));
        Ok(Vec::new())
    }

    async fn list_messages(
        &self,
        _: &Credential,
        channel_id: &ChannelId,
    ) -> Result<Vec<Message>, ClientError> {
        self.record(format!("messages:{channel_id}"));
        let mut newest_first = self.messages.lock().expect("lock").clone();
        newest_first.reverse();
        Ok(newest_first)
    }

    async fn send_message(
        &self,
        _: &Credential,
        channel_id: &ChannelId,
        content: &str,
    ) -> Result<Message, ClientError> {
        self.record(format!("send:{channel_id}"));
        if self.fail_sends {
            return Err(ClientError::Upstream {
                status: 500,
                message: "Internal Server Error".into(),
            });
        }
        let mut messages = self.messages.lock().expect("lock");
        let message = Message {
            id: MessageId::new(format!("m{}", messages.len() + 1)),
            content: content.to_string(),
            author: identity("1", true),
            timestamp: Utc
                .with_ymd_and_hms(2024, 1, 1, 0, messages.len() as u32, 0)
                .unwrap(),
            embeds: Vec::new(),
            attachments: Vec::new(),
            mentions: Vec::new(),
        };
        messages.push(message.clone());
        Ok(message)
    }
}

#[tokio::test]
async fn login_cascades_to_first_guild_channel_and_messages() {
    let mut controller = SessionController::new(FakeApi::default(), MemoryCredentialStore::new());
    controller.login("bot-token").await.expect("login");

    let state = controller.state();
    assert_eq!(state.selected_guild(), Some(&GuildId::new("g1")));
    assert_eq!(state.selected_channel_id(), Some(&ChannelId::new("g1-a")));
    assert_eq!(
        controller.api().calls(),
        ["verify", "guilds", "dms", "channels:g1", "roles:g1", "messages:g1-a"]
    );
    let stored = controller.store.load().await.expect("load");
    assert_eq!(stored.map(|c| c.expose().to_string()), Some("bot-token".into()));
}

#[tokio::test]
async fn non_bot_login_is_refused_and_not_stored() {
    let mut controller = SessionController::new(FakeApi::default(), MemoryCredentialStore::new());
    let err = controller.login("human-token").await.unwrap_err();
    assert_eq!(err, ClientError::not_automated());
    assert!(controller.state().credential().is_none());
    assert!(controller.store.load().await.expect("load").is_none());
    assert_eq!(controller.api().calls(), ["verify"]);
}

#[tokio::test]
async fn resume_uses_stored_credential() {
    let store = MemoryCredentialStore::with_credential(Credential::parse("bot-token").unwrap());
    let mut controller = SessionController::new(FakeApi::default(), store);
    assert!(controller.resume().await.expect("resume"));
    assert!(controller.state().identity().is_some());
}

#[tokio::test]
async fn resume_with_rejected_credential_clears_it() {
    let store = MemoryCredentialStore::with_credential(Credential::parse("revoked").unwrap());
    let mut controller = SessionController::new(FakeApi::default(), store);
    let err = controller.resume().await.unwrap_err();
    assert!(err.requires_reauth());
    assert!(controller.store.load().await.expect("load").is_none());
}

#[tokio::test]
async fn resume_without_stored_credential_does_nothing() {
    let mut controller = SessionController::new(FakeApi::default(), MemoryCredentialStore::new());
    assert!(!controller.resume().await.expect("resume"));
    assert!(controller.api().calls().is_empty());
}

#[tokio::test]
async fn sent_message_appears_after_refetch() {
    let mut controller = SessionController::new(FakeApi::default(), MemoryCredentialStore::new());
    controller.login("bot-token").await.expect("login");

    for text in ["first", "second"] {
        controller
            .dispatch(Action::SetDraft(text.into()))
            .await
            .expect("draft");
        controller
            .dispatch(Action::SubmitComposer)
            .await
            .expect("send");
    }

    let contents: Vec<&str> = controller
        .state()
        .messages()
        .iter()
        .map(|m| m.content.as_str())
        .collect();
    assert_eq!(contents, ["first", "second"]);
    assert_eq!(controller.state().draft(), "");
    assert_eq!(controller.api().count("messages:g1-a"), 3);
}

#[tokio::test]
async fn failed_send_keeps_the_draft() {
    let api = FakeApi {
        fail_sends: true,
        ..FakeApi::default()
    };
    let mut controller = SessionController::new(api, MemoryCredentialStore::new());
    controller.login("bot-token").await.expect("login");
    controller
        .dispatch(Action::SetDraft("hello".into()))
        .await
        .expect("draft");
    controller
        .dispatch(Action::SubmitComposer)
        .await
        .expect("dispatch");

    assert_eq!(controller.state().draft(), "hello");
    assert_eq!(controller.api().count("messages:"), 1);
}

#[tokio::test]
async fn selecting_the_same_channel_twice_fetches_once() {
    let mut controller = SessionController::new(FakeApi::default(), MemoryCredentialStore::new());
    controller.login("bot-token").await.expect("login");

    controller
        .dispatch(Action::SelectChannel(ChannelId::new("g1-b")))
        .await
        .expect("select");
    controller
        .dispatch(Action::SelectChannel(ChannelId::new("g1-b")))
        .await
        .expect("select again");
    assert_eq!(controller.api().count("messages:g1-b"), 1);
}

#[tokio::test]
async fn switching_guilds_loads_the_new_channel_list() {
    let mut controller = SessionController::new(FakeApi::default(), MemoryCredentialStore::new());
    controller.login("bot-token").await.expect("login");
    controller
        .dispatch(Action::SelectGuild(GuildId::new("g2")))
        .await
        .expect("select guild");

    let state = controller.state();
    assert_eq!(state.selected_channel_id(), Some(&ChannelId::new("g2-a")));
    assert!(state.channels().iter().all(|c| c.id.as_str().starts_with("g2")));
}

#[tokio::test]
async fn logout_clears_the_store() {
    let mut controller = SessionController::new(FakeApi::default(), MemoryCredentialStore::new());
    controller.login("bot-token").await.expect("login");
    controller.dispatch(Action::Logout).await.expect("logout");
    assert!(controller.store.load().await.expect("load").is_none());
    assert!(controller.state().guilds().is_empty());
}
