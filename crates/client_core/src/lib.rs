//! Client side of the chat console: the relay client, the session state
//! machine that drives it, and the content pipeline that turns message
//! bodies into renderable segments.

pub mod api;
pub mod content;
pub mod controller;
pub mod credential_store;
pub mod display;
pub mod error;
pub mod mentions;
pub mod session;

pub use api::{ChatApi, RelayClient};
pub use content::{parse_content, render_plain, ContentSegment, MentionKind};
pub use controller::SessionController;
pub use credential_store::{CredentialStore, FileCredentialStore, MemoryCredentialStore};
pub use error::ClientError;
pub use mentions::{user_tag, MentionDirectory};
pub use session::{Action, SessionState, SessionStatus};
