use std::collections::VecDeque;

use tracing::{debug, warn};

use crate::{
    api::ChatApi,
    credential_store::CredentialStore,
    error::ClientError,
    session::{Action, Command, Event, SessionState},
};

/// Runs [`SessionState`] against a live [`ChatApi`], persisting the credential
/// through a [`CredentialStore`]. Commands run one at a time, except the two
/// initial list fetches which are issued together.
pub struct SessionController<A, S> {
    api: A,
    store: S,
    state: SessionState,
}

impl<A: ChatApi, S: CredentialStore> SessionController<A, S> {
    pub fn new(api: A, store: S) -> Self {
        Self {
            api,
            store,
            state: SessionState::new(),
        }
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub fn api(&self) -> &A {
        &self.api
    }

    /// Re-verifies a previously stored credential. Returns whether a session
    /// was established.
    pub async fn resume(&mut self) -> Result<bool, ClientError> {
        let stored = match self.store.load().await {
            Ok(stored) => stored,
            Err(err) => {
                warn!(error = %err, "failed to read stored credential");
                None
            }
        };
        let Some(credential) = stored else {
            return Ok(false);
        };
        self.login(credential.expose()).await?;
        Ok(true)
    }

    pub async fn login(&mut self, raw: &str) -> Result<(), ClientError> {
        self.dispatch(Action::SubmitCredential(raw.to_string()))
            .await?;
        match self.state.auth_error() {
            Some(err) => Err(err.clone()),
            None => Ok(()),
        }
    }

    pub async fn dispatch(&mut self, action: Action) -> Result<(), ClientError> {
        let commands = self.state.apply(action)?;
        self.run(commands).await;
        Ok(())
    }

    async fn run(&mut self, commands: Vec<Command>) {
        let mut queue = VecDeque::from(commands);
        while let Some(command) = queue.pop_front() {
            for event in self.execute(command).await {
                queue.extend(self.state.handle(event));
            }
        }
    }

    async fn execute(&self, command: Command) -> Vec<Event> {
        debug!(?command, "executing session command");
        match command {
            Command::VerifyCredential {
                credential,
                session,
            } => vec![Event::IdentityVerified {
                session,
                result: self.api.verify_identity(&credential).await,
            }],
            Command::PersistCredential(credential) => {
                if let Err(err) = self.store.store(&credential).await {
                    warn!(error = %err, "failed to persist credential");
                }
                Vec::new()
            }
            Command::ClearCredential => {
                if let Err(err) = self.store.clear().await {
                    warn!(error = %err, "failed to clear stored credential");
                }
                Vec::new()
            }
            Command::LoadInitialLists { session } => {
                let Some(credential) = self.state.credential() else {
                    return Vec::new();
                };
                let (guilds, direct_channels) = futures::join!(
                    self.api.list_guilds(credential),
                    self.api.list_direct_channels(credential)
                );
                vec![Event::InitialListsLoaded {
                    session,
                    guilds,
                    direct_channels,
                }]
            }
            Command::LoadGuild { ticket } => {
                let Some(credential) = self.state.credential() else {
                    return Vec::new();
                };
                let channels = self
                    .api
                    .list_guild_channels(credential, &ticket.target)
                    .await;
                let roles = self.api.list_guild_roles(credential, &ticket.target).await;
                vec![
                    Event::ChannelsLoaded {
                        ticket: ticket.clone(),
                        result: channels,
                    },
                    Event::RolesLoaded {
                        ticket,
                        result: roles,
                    },
                ]
            }
            Command::LoadMessages { ticket } => {
                let Some(credential) = self.state.credential() else {
                    return Vec::new();
                };
                let result = self.api.list_messages(credential, &ticket.target).await;
                vec![Event::MessagesLoaded { ticket, result }]
            }
            Command::SendMessage {
                channel_id,
                content,
            } => {
                let Some(credential) = self.state.credential() else {
                    return Vec::new();
                };
                let result = self
                    .api
                    .send_message(credential, &channel_id, &content)
                    .await;
                vec![Event::MessageSent {
                    channel_id,
                    content,
                    result,
                }]
            }
        }
    }
}

#[cfg(test)]
#[path = "tests/controller_tests.rs"]
mod tests;
