use std::collections::HashMap;

use shared::{
    domain::{ChannelId, RoleId, UserId},
    protocol::{Channel, Identity, Role},
};

use crate::content::MentionKind;

/// Lookup tables used to label mentions. Any table may be empty.
#[derive(Debug, Clone, Default)]
pub struct MentionDirectory {
    users: HashMap<UserId, Identity>,
    roles: HashMap<RoleId, Role>,
    channels: HashMap<ChannelId, Channel>,
}

impl MentionDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_users(mut self, users: impl IntoIterator<Item = Identity>) -> Self {
        self.users
            .extend(users.into_iter().map(|user| (user.id.clone(), user)));
        self
    }

    pub fn with_roles(mut self, roles: impl IntoIterator<Item = Role>) -> Self {
        self.roles
            .extend(roles.into_iter().map(|role| (role.id.clone(), role)));
        self
    }

    pub fn with_channels(mut self, channels: impl IntoIterator<Item = Channel>) -> Self {
        self.channels
            .extend(channels.into_iter().map(|channel| (channel.id.clone(), channel)));
        self
    }

    /// Human-readable label for a mention; unknown ids get a generic placeholder.
    pub fn resolve(&self, kind: MentionKind, id: &str) -> String {
        match kind {
            MentionKind::Broadcast => id.to_string(),
            MentionKind::User => match self.users.get(&UserId::new(id)) {
                Some(user) => {
                    let tag = user_tag(user);
                    if tag.starts_with('@') {
                        tag
                    } else {
                        format!("@{tag}")
                    }
                }
                None => "@user".to_string(),
            },
            MentionKind::Role => match self.roles.get(&RoleId::new(id)) {
                Some(role) => format!("@{}", role.name),
                None => "@role".to_string(),
            },
            MentionKind::Channel => match self
                .channels
                .get(&ChannelId::new(id))
                .and_then(|channel| channel.name.as_deref())
            {
                Some(name) => format!("#{name}"),
                None => "#channel".to_string(),
            },
        }
    }
}

/// Preferred display name, else the username with its legacy `#discriminator`
/// when one is set (`"0"` marks accounts without one).
pub fn user_tag(user: &Identity) -> String {
    if let Some(display) = user.global_name.as_deref().filter(|name| !name.is_empty()) {
        return display.to_string();
    }
    if user.discriminator.is_empty() || user.discriminator == "0" {
        user.username.clone()
    } else {
        format!("{}#{}", user.username, user.discriminator)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::domain::ChannelKind;

    fn identity(username: &str, discriminator: &str, global_name: Option<&str>) -> Identity {
        Identity {
            id: UserId::from("7"),
            username: username.into(),
            discriminator: discriminator.into(),
            global_name: global_name.map(Into::into),
            avatar: None,
            bot: false,
        }
    }

    #[test]
    fn zero_discriminator_is_never_appended() {
        let directory = MentionDirectory::new().with_users([identity("bob", "0", None)]);
        assert_eq!(directory.resolve(MentionKind::User, "7"), "@bob");
    }

    #[test]
    fn legacy_discriminator_only_follows_the_username() {
        let plain = MentionDirectory::new().with_users([identity("bob", "1234", None)]);
        assert_eq!(plain.resolve(MentionKind::User, "7"), "@bob#1234");

        let named = MentionDirectory::new().with_users([identity("bob", "1234", Some("Bobby"))]);
        assert_eq!(named.resolve(MentionKind::User, "7"), "@Bobby");
    }

    #[test]
    fn display_names_already_prefixed_are_not_doubled() {
        let directory = MentionDirectory::new().with_users([identity("bob", "0", Some("@bobby"))]);
        assert_eq!(directory.resolve(MentionKind::User, "7"), "@bobby");
    }

    #[test]
    fn roles_and_channels_use_their_names() {
        let directory = MentionDirectory::new()
            .with_roles([Role {
                id: RoleId::from("5"),
                name: "mods".into(),
                color: 0,
            }])
            .with_channels([Channel {
                id: ChannelId::from("9"),
                kind: ChannelKind::Text,
                name: Some("general".into()),
                parent_id: None,
                position: Some(0),
                recipients: Vec::new(),
            }]);
        assert_eq!(directory.resolve(MentionKind::Role, "5"), "@mods");
        assert_eq!(directory.resolve(MentionKind::Channel, "9"), "#general");
    }

    #[test]
    fn unknown_entities_get_placeholders() {
        let directory = MentionDirectory::default();
        assert_eq!(directory.resolve(MentionKind::User, "1"), "@user");
        assert_eq!(directory.resolve(MentionKind::Role, "1"), "@role");
        assert_eq!(directory.resolve(MentionKind::Channel, "1"), "#channel");
    }

    #[test]
    fn broadcasts_resolve_verbatim() {
        let directory = MentionDirectory::default();
        assert_eq!(directory.resolve(MentionKind::Broadcast, "@everyone"), "@everyone");
        assert_eq!(directory.resolve(MentionKind::Broadcast, "@here"), "@here");
    }
}
