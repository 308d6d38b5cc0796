use thiserror::Error;

const FALLBACK_MESSAGE: &str = "Failed to communicate with the chat platform.";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ClientError {
    #[error("{0}")]
    Validation(String),
    #[error("{message}")]
    Auth { status: u16, message: String },
    #[error("{message} (status {status})")]
    Upstream { status: u16, message: String },
    #[error("transport failure: {0}")]
    Transport(String),
}

impl ClientError {
    /// Classifies a non-2xx relay response by status and extracts its message.
    ///
    /// Only 401 rejects the credential itself; a 403 here is a per-resource
    /// permission failure such as an unreadable channel.
    pub fn from_response(status: u16, body: &str) -> Self {
        let message = error_message(body);
        match status {
            401 => ClientError::Auth { status, message },
            _ => ClientError::Upstream { status, message },
        }
    }

    /// Like [`ClientError::from_response`], for the credential check, where a
    /// 403 means the account is not allowed to use the console at all.
    pub fn from_verification_response(status: u16, body: &str) -> Self {
        match status {
            403 => ClientError::Auth {
                status,
                message: error_message(body),
            },
            _ => Self::from_response(status, body),
        }
    }

    pub fn not_automated() -> Self {
        ClientError::Auth {
            status: 403,
            message: "The provided token does not belong to a bot.".into(),
        }
    }

    pub fn requires_reauth(&self) -> bool {
        matches!(self, ClientError::Auth { .. })
    }
}

impl From<reqwest::Error> for ClientError {
    fn from(value: reqwest::Error) -> Self {
        ClientError::Transport(value.to_string())
    }
}

/// Relay envelope `error`, then an upstream `message`, then the raw body.
/// An envelope that wraps the upstream JSON body yields the inner `message`.
fn error_message(body: &str) -> String {
    if let Ok(value) = serde_json::from_str::<serde_json::Value>(body) {
        for key in ["error", "message"] {
            if let Some(message) = value.get(key).and_then(|v| v.as_str()) {
                if !message.trim().is_empty() {
                    return upstream_message(message).unwrap_or_else(|| message.to_string());
                }
            }
        }
    }
    let trimmed = body.trim();
    if trimmed.is_empty() {
        FALLBACK_MESSAGE.to_string()
    } else {
        trimmed.to_string()
    }
}

fn upstream_message(text: &str) -> Option<String> {
    let inner = serde_json::from_str::<serde_json::Value>(text).ok()?;
    inner
        .get("message")
        .and_then(|v| v.as_str())
        .filter(|message| !message.trim().is_empty())
        .map(str::to_string)
}
