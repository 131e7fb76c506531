//! Aliyun Drive credential library
//!
//! Everything below the account directory: the per-account credential
//! record and its persistent store, the refresh coordinator for the three
//! credential families, the profile fetchers, and the collaborator
//! boundaries (transport, messaging, broadcast) the surrounding
//! application plugs into.
//!
//! Credential flow:
//! 1. Records load from `store::CredentialStore` at startup
//! 2. `refresh::TokenRefresher` validates/renews the primary credential
//! 3. `profile::ProfileClient` populates derived fields after login
//! 4. Session and open-API credentials renew on their own cooldowns
//! 5. Every successful refresh persists the record and broadcasts it

pub mod constants;
pub mod error;
pub mod format;
pub mod messaging;
pub mod notify;
pub mod profile;
pub mod record;
pub mod refresh;
pub mod settings;
pub mod signature;
pub mod store;
pub mod transport;

#[cfg(test)]
mod testutil;

pub use constants::*;
pub use error::{Error, Result};
pub use messaging::{Messenger, NullMessenger};
pub use notify::{NullBroadcast, TokenAnnouncement, TokenBroadcast};
pub use profile::{ProfileClient, SpaceInfo, VipInfo};
pub use record::{CredentialRecord, device_id_for};
pub use refresh::{RefreshCooldowns, RefreshStatus, TokenRefresher};
pub use settings::OpenApiSettings;
pub use signature::{DeviceSignature, device_signature};
pub use store::CredentialStore;
pub use transport::{ApiResponse, HttpTransport, Transport, is_success};
