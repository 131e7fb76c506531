//! Per-account credential record
//!
//! One `CredentialRecord` per account, keyed by `user_id`, holding the
//! three credential families (primary OAuth, open-API OAuth, device
//! session) plus best-effort profile fields. The record is the unit of
//! persistence: the store serialises it as-is, and a save/load round-trip
//! is field-for-field lossless.
//!
//! `expires_at` (unix milliseconds) is authoritative for refresh
//! scheduling. Profile fields may be stale; they are overwritten by the
//! profile fetchers whenever they succeed.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Derive the stable device id for an account.
///
/// UUID v5 over the account id in the URL namespace — deterministic, so
/// every process derives the same device id for the same account.
pub fn device_id_for(user_id: &str) -> String {
    Uuid::new_v5(&Uuid::NAMESPACE_URL, user_id.as_bytes()).to_string()
}

/// All credential and profile state for one account.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CredentialRecord {
    // Identity
    pub user_id: String,
    #[serde(default)]
    pub user_name: String,
    #[serde(default)]
    pub nick_name: String,
    #[serde(default)]
    pub avatar: String,
    #[serde(default)]
    pub device_id: String,

    // Primary OAuth material
    #[serde(default)]
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: String,
    #[serde(default)]
    pub token_type: String,
    /// Access-token lifetime in seconds, as issued
    #[serde(default)]
    pub expires_in: u64,
    /// Absolute expiry as unix timestamp in milliseconds
    #[serde(default)]
    pub expires_at: u64,
    /// Issuing origin tag ("account" after a primary refresh)
    #[serde(default)]
    pub token_from: String,

    // Open-API OAuth material
    #[serde(default)]
    pub open_api_enabled: bool,
    #[serde(default)]
    pub open_api_access_token: String,
    #[serde(default)]
    pub open_api_refresh_token: String,

    // Session material
    #[serde(default)]
    pub signature: String,
    #[serde(default)]
    pub public_key: String,
    #[serde(default)]
    pub secret_key: String,

    // Profile / derived fields (best-effort)
    #[serde(default)]
    pub used_size: u64,
    #[serde(default)]
    pub total_size: u64,
    #[serde(default)]
    pub space_info: String,
    #[serde(default)]
    pub vip_name: String,
    #[serde(default)]
    pub vip_expire: String,
    #[serde(default)]
    pub default_drive_id: String,
    #[serde(default)]
    pub sbox_drive_id: String,
    #[serde(default)]
    pub album_drive_id: String,
    #[serde(default)]
    pub role: String,
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub spu_id: String,
    #[serde(default)]
    pub plan_name: String,
    #[serde(default)]
    pub plan_expired: bool,
    #[serde(default)]
    pub pin_setup: bool,
    #[serde(default)]
    pub is_first_login: bool,
    #[serde(default)]
    pub need_rp_verify: bool,
}

impl CredentialRecord {
    /// An empty record pre-keyed with the given account id.
    pub fn for_user(user_id: impl Into<String>) -> Self {
        let user_id = user_id.into();
        let device_id = device_id_for(&user_id);
        Self {
            user_id,
            device_id,
            ..Self::default()
        }
    }

    /// Milliseconds until the primary access token expires (0 if already past).
    pub fn millis_to_expiry(&self, now_millis: u64) -> u64 {
        self.expires_at.saturating_sub(now_millis)
    }

    /// Unix milliseconds at which the current primary token was issued.
    ///
    /// Reconstructed from the absolute expiry minus the issued lifetime.
    pub fn token_issued_at(&self) -> u64 {
        self.expires_at.saturating_sub(self.expires_in * 1000)
    }
}
