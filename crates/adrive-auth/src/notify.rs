//! Best-effort credential broadcast to sibling processes
//!
//! Login, logout, and token refreshes are announced to cooperating
//! processes (upload/download workers, other windows) so they can pick up
//! fresh tokens without re-reading the store. Delivery is fire-and-forget:
//! implementors swallow their own failures.

/// One credential lifecycle announcement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TokenAnnouncement {
    Login {
        user_id: String,
        name: String,
        access_token: String,
    },
    Refresh {
        user_id: String,
        name: String,
        access_token: String,
        open_api_access_token: Option<String>,
    },
    Logout {
        user_id: String,
    },
}

impl TokenAnnouncement {
    /// Account the announcement concerns.
    pub fn user_id(&self) -> &str {
        match self {
            TokenAnnouncement::Login { user_id, .. }
            | TokenAnnouncement::Refresh { user_id, .. }
            | TokenAnnouncement::Logout { user_id } => user_id,
        }
    }
}

/// Fire-and-forget announcement transport.
pub trait TokenBroadcast: Send + Sync {
    fn announce(&self, announcement: TokenAnnouncement);
}

/// Broadcast that goes nowhere. Used for single-process operation and tests.
#[derive(Debug, Default)]
pub struct NullBroadcast;

impl TokenBroadcast for NullBroadcast {
    fn announce(&self, _announcement: TokenAnnouncement) {}
}
