//! Session state and its transitions.
//!
//! [`SessionState::apply`] handles operator actions and
//! [`SessionState::handle`] handles fetch results. Both only mutate state and
//! return the [`Command`]s to run next; executing them is the job of
//! [`crate::controller::SessionController`] or any other host loop.
//!
//! Every fetch carries a [`FetchTicket`]. A result is applied only while its
//! ticket still names the current selection and generation, so a slow
//! response for an abandoned guild or channel never overwrites newer state.

use shared::{
    domain::{ChannelId, ChannelKind, Credential, GuildId},
    protocol::{Channel, Guild, Identity, Message, Role},
};
use tracing::{error, info, warn};

use crate::{error::ClientError, mentions::MentionDirectory};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    Unauthenticated,
    Verifying,
    Authenticated,
}

/// Which side of the navigation is active once signed in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Scope {
    Guild(GuildId),
    Direct,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionStatus {
    Unauthenticated,
    Verifying,
    Authenticated,
    GuildSelected(GuildId),
    DirectSelected,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchTicket<T> {
    pub target: T,
    pub generation: u64,
}

#[derive(Debug, Clone)]
pub enum Action {
    SubmitCredential(String),
    SelectGuild(GuildId),
    SelectChannel(ChannelId),
    SelectDirect(ChannelId),
    OpenDirectHub,
    SetDraft(String),
    SubmitComposer,
    Refresh,
    Logout,
}

#[derive(Debug, Clone)]
pub enum Command {
    VerifyCredential {
        credential: Credential,
        session: u64,
    },
    PersistCredential(Credential),
    ClearCredential,
    /// Guild list and direct conversations, fetched concurrently.
    LoadInitialLists {
        session: u64,
    },
    /// Channel list, then role list.
    LoadGuild {
        ticket: FetchTicket<GuildId>,
    },
    LoadMessages {
        ticket: FetchTicket<ChannelId>,
    },
    SendMessage {
        channel_id: ChannelId,
        content: String,
    },
}

#[derive(Debug, Clone)]
pub enum Event {
    IdentityVerified {
        session: u64,
        result: Result<Identity, ClientError>,
    },
    InitialListsLoaded {
        session: u64,
        guilds: Result<Vec<Guild>, ClientError>,
        direct_channels: Result<Vec<Channel>, ClientError>,
    },
    ChannelsLoaded {
        ticket: FetchTicket<GuildId>,
        result: Result<Vec<Channel>, ClientError>,
    },
    RolesLoaded {
        ticket: FetchTicket<GuildId>,
        result: Result<Vec<Role>, ClientError>,
    },
    MessagesLoaded {
        ticket: FetchTicket<ChannelId>,
        result: Result<Vec<Message>, ClientError>,
    },
    MessageSent {
        channel_id: ChannelId,
        content: String,
        result: Result<Message, ClientError>,
    },
}

#[derive(Debug)]
pub struct SessionState {
    phase: SessionPhase,
    credential: Option<Credential>,
    pending_credential: Option<Credential>,
    identity: Option<Identity>,
    guilds: Vec<Guild>,
    direct_channels: Vec<Channel>,
    scope: Option<Scope>,
    channels: Vec<Channel>,
    roles: Vec<Role>,
    selected_channel: Option<ChannelId>,
    messages: Vec<Message>,
    draft: String,
    auth_error: Option<ClientError>,
    last_error: Option<ClientError>,
    loading_channels: bool,
    loading_messages: bool,
    session_generation: u64,
    guild_generation: u64,
    channel_generation: u64,
}

impl Default for SessionState {
    fn default() -> Self {
        Self {
            phase: SessionPhase::Unauthenticated,
            credential: None,
            pending_credential: None,
            identity: None,
            guilds: Vec::new(),
            direct_channels: Vec::new(),
            scope: None,
            channels: Vec::new(),
            roles: Vec::new(),
            selected_channel: None,
            messages: Vec::new(),
            draft: String::new(),
            auth_error: None,
            last_error: None,
            loading_channels: false,
            loading_messages: false,
            session_generation: 0,
            guild_generation: 0,
            channel_generation: 0,
        }
    }
}

impl SessionState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn phase(&self) -> SessionPhase {
        self.phase
    }

    pub fn status(&self) -> SessionStatus {
        match (self.phase, &self.scope) {
            (SessionPhase::Unauthenticated, _) => SessionStatus::Unauthenticated,
            (SessionPhase::Verifying, _) => SessionStatus::Verifying,
            (SessionPhase::Authenticated, None) => SessionStatus::Authenticated,
            (SessionPhase::Authenticated, Some(Scope::Guild(id))) => {
                SessionStatus::GuildSelected(id.clone())
            }
            (SessionPhase::Authenticated, Some(Scope::Direct)) => SessionStatus::DirectSelected,
        }
    }

    pub fn credential(&self) -> Option<&Credential> {
        self.credential.as_ref()
    }

    pub fn identity(&self) -> Option<&Identity> {
        self.identity.as_ref()
    }

    pub fn guilds(&self) -> &[Guild] {
        &self.guilds
    }

    pub fn direct_channels(&self) -> &[Channel] {
        &self.direct_channels
    }

    pub fn scope(&self) -> Option<&Scope> {
        self.scope.as_ref()
    }

    pub fn selected_guild(&self) -> Option<&GuildId> {
        match &self.scope {
            Some(Scope::Guild(id)) => Some(id),
            _ => None,
        }
    }

    /// Channels of the selected guild, ordered by position.
    pub fn channels(&self) -> &[Channel] {
        &self.channels
    }

    pub fn roles(&self) -> &[Role] {
        &self.roles
    }

    pub fn selected_channel_id(&self) -> Option<&ChannelId> {
        self.selected_channel.as_ref()
    }

    pub fn selected_channel(&self) -> Option<&Channel> {
        let id = self.selected_channel.as_ref()?;
        self.channels
            .iter()
            .chain(self.direct_channels.iter())
            .find(|channel| &channel.id == id)
    }

    /// Oldest first.
    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn draft(&self) -> &str {
        &self.draft
    }

    pub fn auth_error(&self) -> Option<&ClientError> {
        self.auth_error.as_ref()
    }

    pub fn last_error(&self) -> Option<&ClientError> {
        self.last_error.as_ref()
    }

    pub fn is_verifying(&self) -> bool {
        self.phase == SessionPhase::Verifying
    }

    pub fn is_loading_channels(&self) -> bool {
        self.loading_channels
    }

    pub fn is_loading_messages(&self) -> bool {
        self.loading_messages
    }

    /// Lookup tables for labelling the mentions in `message`.
    pub fn mention_directory(&self, message: &Message) -> MentionDirectory {
        let directory = MentionDirectory::new().with_users(message.mentions.iter().cloned());
        if self.selected_guild().is_none() {
            return directory;
        }
        directory
            .with_roles(self.roles.iter().cloned())
            .with_channels(self.channels.iter().cloned())
    }

    pub fn apply(&mut self, action: Action) -> Result<Vec<Command>, ClientError> {
        self.last_error = None;
        match action {
            Action::SubmitCredential(raw) => self.submit_credential(&raw),
            Action::SelectGuild(guild_id) => {
                self.require_session()?;
                Ok(self.select_guild(guild_id))
            }
            Action::SelectChannel(channel_id) => {
                self.require_session()?;
                Ok(self.select_channel(channel_id))
            }
            Action::SelectDirect(channel_id) => {
                self.require_session()?;
                Ok(self.select_direct(channel_id))
            }
            Action::OpenDirectHub => {
                self.require_session()?;
                self.open_direct_hub();
                Ok(Vec::new())
            }
            Action::SetDraft(text) => {
                self.draft = text;
                Ok(Vec::new())
            }
            Action::SubmitComposer => self.submit_composer(),
            Action::Refresh => {
                self.require_session()?;
                Ok(self.refresh_messages())
            }
            Action::Logout => Ok(self.logout()),
        }
    }

    pub fn handle(&mut self, event: Event) -> Vec<Command> {
        match event {
            Event::IdentityVerified { session, result } => self.on_identity(session, result),
            Event::InitialListsLoaded {
                session,
                guilds,
                direct_channels,
            } => self.on_initial_lists(session, guilds, direct_channels),
            Event::ChannelsLoaded { ticket, result } => self.on_channels(ticket, result),
            Event::RolesLoaded { ticket, result } => self.on_roles(ticket, result),
            Event::MessagesLoaded { ticket, result } => self.on_messages(ticket, result),
            Event::MessageSent {
                channel_id,
                content,
                result,
            } => self.on_message_sent(channel_id, content, result),
        }
    }

    fn require_session(&self) -> Result<(), ClientError> {
        if self.phase == SessionPhase::Authenticated {
            Ok(())
        } else {
            Err(ClientError::Validation("not signed in".into()))
        }
    }

    fn submit_credential(&mut self, raw: &str) -> Result<Vec<Command>, ClientError> {
        let Some(credential) = Credential::parse(raw) else {
            let err = ClientError::Validation("token is required".into());
            self.auth_error = Some(err.clone());
            return Err(err);
        };

        self.reset_collections();
        self.credential = None;
        self.identity = None;
        self.auth_error = None;
        self.phase = SessionPhase::Verifying;
        self.session_generation += 1;
        self.pending_credential = Some(credential.clone());

        Ok(vec![Command::VerifyCredential {
            credential,
            session: self.session_generation,
        }])
    }

    fn on_identity(&mut self, session: u64, result: Result<Identity, ClientError>) -> Vec<Command> {
        if session != self.session_generation || self.phase != SessionPhase::Verifying {
            return Vec::new();
        }
        let pending = self.pending_credential.take();

        let failure = match (result, pending) {
            (Ok(identity), Some(credential)) if identity.bot => {
                info!(bot_id = %identity.id, "signed in");
                self.phase = SessionPhase::Authenticated;
                self.identity = Some(identity);
                self.credential = Some(credential.clone());
                return vec![
                    Command::PersistCredential(credential),
                    Command::LoadInitialLists { session },
                ];
            }
            (Ok(_), Some(_)) => ClientError::not_automated(),
            (Err(err), _) => err,
            (Ok(_), None) => ClientError::Validation("token is required".into()),
        };

        warn!(error = %failure, "credential verification failed");
        self.phase = SessionPhase::Unauthenticated;
        self.credential = None;
        self.identity = None;
        self.auth_error = Some(failure);
        vec![Command::ClearCredential]
    }

    fn on_initial_lists(
        &mut self,
        session: u64,
        guilds: Result<Vec<Guild>, ClientError>,
        direct_channels: Result<Vec<Channel>, ClientError>,
    ) -> Vec<Command> {
        if session != self.session_generation || self.phase != SessionPhase::Authenticated {
            return Vec::new();
        }

        match guilds {
            Ok(guilds) => self.guilds = guilds,
            Err(err) => {
                warn!(error = %err, "failed to load guilds");
                let commands = self.record_failure(err);
                if self.phase != SessionPhase::Authenticated {
                    return commands;
                }
            }
        }
        match direct_channels {
            Ok(channels) => {
                self.direct_channels = channels
                    .into_iter()
                    .filter(|channel| channel.kind == ChannelKind::Direct)
                    .collect();
            }
            Err(err) => {
                warn!(error = %err, "failed to load direct conversations");
                let commands = self.record_failure(err);
                if self.phase != SessionPhase::Authenticated {
                    return commands;
                }
            }
        }

        if self.scope.is_some() || self.selected_channel.is_some() {
            return Vec::new();
        }
        if let Some(first) = self.guilds.first() {
            let guild_id = first.id.clone();
            return self.select_guild(guild_id);
        }
        if let Some(first) = self.direct_channels.first() {
            let channel_id = first.id.clone();
            return self.select_direct(channel_id);
        }
        Vec::new()
    }

    /// Re-selecting the current guild reloads it.
    fn select_guild(&mut self, guild_id: GuildId) -> Vec<Command> {
        self.scope = Some(Scope::Guild(guild_id.clone()));
        self.channels.clear();
        self.roles.clear();
        self.clear_channel_selection();
        self.guild_generation += 1;
        self.loading_channels = true;

        vec![Command::LoadGuild {
            ticket: FetchTicket {
                target: guild_id,
                generation: self.guild_generation,
            },
        }]
    }

    fn select_channel(&mut self, channel_id: ChannelId) -> Vec<Command> {
        if self.selected_channel.as_ref() == Some(&channel_id) {
            return Vec::new();
        }
        self.selected_channel = Some(channel_id);
        self.messages.clear();
        self.load_selected_messages()
    }

    fn select_direct(&mut self, channel_id: ChannelId) -> Vec<Command> {
        if self.scope != Some(Scope::Direct) {
            self.leave_guild();
        }
        self.select_channel(channel_id)
    }

    fn open_direct_hub(&mut self) {
        self.leave_guild();
        self.clear_channel_selection();
    }

    fn leave_guild(&mut self) {
        self.scope = Some(Scope::Direct);
        self.channels.clear();
        self.roles.clear();
        self.guild_generation += 1;
        self.loading_channels = false;
    }

    fn clear_channel_selection(&mut self) {
        self.selected_channel = None;
        self.messages.clear();
        self.channel_generation += 1;
        self.loading_messages = false;
    }

    fn refresh_messages(&mut self) -> Vec<Command> {
        if self.selected_channel.is_none() {
            return Vec::new();
        }
        self.load_selected_messages()
    }

    fn load_selected_messages(&mut self) -> Vec<Command> {
        let Some(channel_id) = self.selected_channel.clone() else {
            return Vec::new();
        };
        self.channel_generation += 1;
        self.loading_messages = true;
        vec![Command::LoadMessages {
            ticket: FetchTicket {
                target: channel_id,
                generation: self.channel_generation,
            },
        }]
    }

    fn guild_ticket_is_current(&self, ticket: &FetchTicket<GuildId>) -> bool {
        ticket.generation == self.guild_generation
            && self.selected_guild() == Some(&ticket.target)
    }

    fn on_channels(
        &mut self,
        ticket: FetchTicket<GuildId>,
        result: Result<Vec<Channel>, ClientError>,
    ) -> Vec<Command> {
        if !self.guild_ticket_is_current(&ticket) {
            return Vec::new();
        }
        self.loading_channels = false;

        let mut channels = match result {
            Ok(channels) => channels,
            Err(err) => {
                warn!(guild_id = %ticket.target, error = %err, "failed to load channels");
                self.channels.clear();
                return self.record_failure(err);
            }
        };
        channels.sort_by_key(|channel| channel.position.unwrap_or(0));
        self.channels = channels;

        let selected_is_text_channel = self.selected_channel.as_ref().is_some_and(|id| {
            self.channels
                .iter()
                .any(|channel| channel.kind == ChannelKind::Text && &channel.id == id)
        });
        if selected_is_text_channel {
            return Vec::new();
        }

        let first_text = self
            .channels
            .iter()
            .find(|channel| channel.kind == ChannelKind::Text)
            .map(|channel| channel.id.clone());
        match first_text {
            Some(channel_id) => self.select_channel(channel_id),
            None => {
                self.clear_channel_selection();
                Vec::new()
            }
        }
    }

    fn on_roles(
        &mut self,
        ticket: FetchTicket<GuildId>,
        result: Result<Vec<Role>, ClientError>,
    ) -> Vec<Command> {
        if !self.guild_ticket_is_current(&ticket) {
            return Vec::new();
        }
        match result {
            Ok(roles) => {
                self.roles = roles;
                Vec::new()
            }
            Err(err) => {
                warn!(guild_id = %ticket.target, error = %err, "failed to load roles");
                self.roles.clear();
                self.record_failure(err)
            }
        }
    }

    fn on_messages(
        &mut self,
        ticket: FetchTicket<ChannelId>,
        result: Result<Vec<Message>, ClientError>,
    ) -> Vec<Command> {
        if ticket.generation != self.channel_generation
            || self.selected_channel.as_ref() != Some(&ticket.target)
        {
            return Vec::new();
        }
        self.loading_messages = false;

        match result {
            Ok(mut messages) => {
                messages.reverse();
                self.messages = messages;
                Vec::new()
            }
            Err(err) => {
                warn!(channel_id = %ticket.target, error = %err, "failed to load messages");
                self.messages.clear();
                self.record_failure(err)
            }
        }
    }

    fn submit_composer(&mut self) -> Result<Vec<Command>, ClientError> {
        self.require_session()?;
        let Some(channel_id) = self.selected_channel.clone() else {
            return Err(ClientError::Validation("no channel selected".into()));
        };
        let content = self.draft.trim().to_string();
        if content.is_empty() {
            return Err(ClientError::Validation("message content is required".into()));
        }

        self.draft.clear();
        Ok(vec![Command::SendMessage {
            channel_id,
            content,
        }])
    }

    fn on_message_sent(
        &mut self,
        channel_id: ChannelId,
        content: String,
        result: Result<Message, ClientError>,
    ) -> Vec<Command> {
        match result {
            Ok(_) => {
                if self.selected_channel.as_ref() == Some(&channel_id) {
                    self.load_selected_messages()
                } else {
                    Vec::new()
                }
            }
            Err(err) => {
                error!(%channel_id, error = %err, "failed to send message");
                let commands = self.record_failure(err);
                self.draft = content;
                commands
            }
        }
    }

    fn logout(&mut self) -> Vec<Command> {
        if self.phase != SessionPhase::Unauthenticated {
            info!("signed out");
        }
        self.reset_collections();
        self.phase = SessionPhase::Unauthenticated;
        self.credential = None;
        self.pending_credential = None;
        self.identity = None;
        self.auth_error = None;
        self.session_generation += 1;
        vec![Command::ClearCredential]
    }

    /// Rejected credentials end the session; anything else stays on screen.
    fn record_failure(&mut self, err: ClientError) -> Vec<Command> {
        if err.requires_reauth() {
            let commands = self.logout();
            self.auth_error = Some(err);
            return commands;
        }
        self.last_error = Some(err);
        Vec::new()
    }

    fn reset_collections(&mut self) {
        self.guilds.clear();
        self.direct_channels.clear();
        self.scope = None;
        self.channels.clear();
        self.roles.clear();
        self.draft.clear();
        self.last_error = None;
        self.loading_channels = false;
        self.guild_generation += 1;
        self.clear_channel_selection();
    }
}

#[cfg(test)]
#[path = "tests/session_tests.rs"]
mod tests;
