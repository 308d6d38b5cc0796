use std::fmt;

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};

macro_rules! id_newtype {
    ($name:ident) => {
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub String);

        impl $name {
            pub fn new(raw: impl Into<String>) -> Self {
                Self(raw.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                Self(value.to_string())
            }
        }
    };
}

id_newtype!(UserId);
id_newtype!(GuildId);
id_newtype!(ChannelId);
id_newtype!(RoleId);
id_newtype!(MessageId);
id_newtype!(AttachmentId);

/// Channel type as reported by the upstream platform.
///
/// Only the kinds the client renders get their own variant; anything else is
/// kept as [`ChannelKind::Other`] so unknown channels survive a round trip.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "u8", into = "u8")]
pub enum ChannelKind {
    Text,
    Direct,
    Voice,
    Group,
    Category,
    Other(u8),
}

impl ChannelKind {
    pub fn is_conversation(self) -> bool {
        matches!(self, ChannelKind::Direct | ChannelKind::Group)
    }
}

impl From<u8> for ChannelKind {
    fn from(value: u8) -> Self {
        match value {
            0 => ChannelKind::Text,
            1 => ChannelKind::Direct,
            2 => ChannelKind::Voice,
            3 => ChannelKind::Group,
            4 => ChannelKind::Category,
            other => ChannelKind::Other(other),
        }
    }
}

impl From<ChannelKind> for u8 {
    fn from(value: ChannelKind) -> Self {
        match value {
            ChannelKind::Text => 0,
            ChannelKind::Direct => 1,
            ChannelKind::Voice => 2,
            ChannelKind::Group => 3,
            ChannelKind::Category => 4,
            ChannelKind::Other(other) => other,
        }
    }
}

/// Secret identifying the automated account. Never printed: `Debug` is redacted.
pub struct Credential(SecretString);

impl Credential {
    /// Trims the operator input; blank input is not a credential.
    pub fn parse(raw: &str) -> Option<Self> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return None;
        }
        Some(Self(SecretString::from(trimmed.to_string())))
    }

    pub fn expose(&self) -> &str {
        self.0.expose_secret()
    }

    /// Value for the upstream `Authorization` header.
    pub fn bot_authorization(&self) -> String {
        format!("Bot {}", self.expose())
    }

    /// Value for the local relay's `Authorization` header.
    pub fn bearer_authorization(&self) -> String {
        format!("Bearer {}", self.expose())
    }

    /// Reads `Bearer <token>` or `Bot <token>` from an `Authorization` header value.
    pub fn from_authorization_header(value: &str) -> Option<Self> {
        let mut parts = value.trim().splitn(2, ' ');
        let scheme = parts.next()?;
        let token = parts.next()?;
        if !scheme.eq_ignore_ascii_case("bearer") && !scheme.eq_ignore_ascii_case("bot") {
            return None;
        }
        Self::parse(token)
    }
}

impl Clone for Credential {
    fn clone(&self) -> Self {
        Self(SecretString::from(self.expose().to_string()))
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Credential([REDACTED])")
    }
}

impl PartialEq for Credential {
    fn eq(&self, other: &Self) -> bool {
        self.expose() == other.expose()
    }
}
