//! Credential refresh coordination
//!
//! Three credential families (primary OAuth, open-API OAuth, device
//! session) share one pattern: at most one in-flight network refresh per
//! (account, family), plus a cooldown window that short-circuits redundant
//! refreshes to success without touching the network. Serialisation uses
//! one async mutex per (account, family) key; the guard is RAII, so the
//! lock releases on every exit path regardless of outcome.
//!
//! Failure classification: the remote body code
//! `InvalidParameter.RefreshToken` is terminal — the stored refresh token
//! is dead and the account must re-authenticate. Every other failure is
//! transient and left to the periodic sweep or the caller to retry. For
//! the primary family a terminal failure purges the persisted record
//! (plus an interactive message in visible mode); removing the in-memory
//! directory entry is the caller's decision.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::Mutex as StdMutex;
use std::time::{Duration, Instant};

use serde::Deserialize;
use serde_json::json;
use tokio::sync::Mutex as TokioMutex;
use tracing::{debug, info, warn};

use crate::constants::{
    INVALID_REFRESH_TOKEN_CODE, OPEN_API_COOLDOWN, PRIMARY_COOLDOWN, RATE_LIMITED_CODE,
    SESSION_COOLDOWN, SESSION_DEVICE_NAME, SESSION_ENDPOINT, SESSION_MODEL_NAME, TOKEN_ENDPOINT,
    TOKEN_FROM_ACCOUNT,
};
use crate::messaging::Messenger;
use crate::notify::{TokenAnnouncement, TokenBroadcast};
use crate::record::{CredentialRecord, device_id_for};
use crate::settings::OpenApiSettings;
use crate::signature::device_signature;
use crate::store::CredentialStore;
use crate::transport::{Transport, is_success};

/// Outcome of one refresh attempt.
///
/// `Refreshed` and `StillFresh` are the success outcomes of the boolean
/// contract; the three failure variants let callers distinguish "retry
/// later" from "re-authentication required" from "nothing to refresh".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshStatus {
    /// A network refresh ran and the record was updated
    Refreshed,
    /// Inside the cooldown window; the existing credential is assumed valid
    StillFresh,
    /// The record lacks the token material this family requires
    MissingToken,
    /// Transient remote failure; retry later
    TransientFailure,
    /// The stored refresh token was explicitly rejected; re-authentication required
    InvalidRefreshToken,
}

impl RefreshStatus {
    /// The boolean success contract: refreshed or still within cooldown.
    pub fn is_ok(self) -> bool {
        matches!(self, RefreshStatus::Refreshed | RefreshStatus::StillFresh)
    }
}

/// Cooldown windows per credential family, injectable for tests.
#[derive(Debug, Clone, Copy)]
pub struct RefreshCooldowns {
    pub session: Duration,
    pub primary: Duration,
    pub open_api: Duration,
}

impl Default for RefreshCooldowns {
    fn default() -> Self {
        Self {
            session: SESSION_COOLDOWN,
            primary: PRIMARY_COOLDOWN,
            open_api: OPEN_API_COOLDOWN,
        }
    }
}

/// Per-family refresh gate: keyed locks plus last-success instants.
///
/// Lock entries are created lazily on first use; last-success entries live
/// for the process lifetime (they are what the cooldown compares against).
struct RefreshGate {
    cooldown: Duration,
    locks: StdMutex<HashMap<String, Arc<TokioMutex<()>>>>,
    last_success: StdMutex<HashMap<String, Instant>>,
}

impl RefreshGate {
    fn new(cooldown: Duration) -> Self {
        Self {
            cooldown,
            locks: StdMutex::new(HashMap::new()),
            last_success: StdMutex::new(HashMap::new()),
        }
    }

    /// The per-account mutex for this family. Check-and-create happens
    /// under the table lock, so two concurrent callers always converge on
    /// the same mutex.
    fn entry(&self, user_id: &str) -> Arc<TokioMutex<()>> {
        let mut locks = self.locks.lock().expect("lock table poisoned");
        locks
            .entry(user_id.to_string())
            .or_insert_with(|| Arc::new(TokioMutex::new(())))
            .clone()
    }

    fn within_cooldown(&self, user_id: &str) -> bool {
        let last = self.last_success.lock().expect("cooldown table poisoned");
        match last.get(user_id) {
            Some(at) => at.elapsed() < self.cooldown,
            None => false,
        }
    }

    fn mark_refreshed(&self, user_id: &str) {
        let mut last = self.last_success.lock().expect("cooldown table poisoned");
        last.insert(user_id.to_string(), Instant::now());
    }
}

/// Typed primary token response.
///
/// Required fields are validated before any record mutation: a 2xx body
/// missing them is a transient failure, never a partial overwrite.
#[derive(Debug, Deserialize)]
struct PrimaryTokenResponse {
    access_token: String,
    refresh_token: String,
    expires_in: u64,
    #[serde(default)]
    token_type: String,
    user_id: String,
    #[serde(default)]
    user_name: String,
    #[serde(default)]
    nick_name: String,
    #[serde(default)]
    avatar: String,
    #[serde(default)]
    default_drive_id: String,
    #[serde(default)]
    default_sbox_drive_id: String,
    #[serde(default)]
    role: String,
    #[serde(default)]
    status: String,
    #[serde(default)]
    expire_time: String,
    #[serde(default)]
    pin_setup: bool,
    #[serde(default)]
    is_first_login: bool,
    #[serde(default)]
    need_rp_verify: bool,
}

impl PrimaryTokenResponse {
    fn is_complete(&self) -> bool {
        !self.access_token.is_empty() && !self.refresh_token.is_empty() && !self.user_id.is_empty()
    }

    /// Absolute expiry in unix millis: the response's own timestamp when
    /// parseable, otherwise now + expires_in.
    fn expires_at(&self, now_millis: u64) -> u64 {
        chrono::DateTime::parse_from_rfc3339(&self.expire_time)
            .map(|dt| dt.timestamp_millis().max(0) as u64)
            .unwrap_or(now_millis + self.expires_in * 1000)
    }
}

/// Typed open-API token response.
#[derive(Debug, Deserialize)]
struct OpenApiTokenResponse {
    access_token: String,
    refresh_token: String,
}

/// Current unix time in milliseconds.
pub(crate) fn now_millis() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

/// Refresh coordinator for all three credential families.
///
/// One shared instance per process; the gate tables are process-wide state
/// rebuilt empty on restart. Records are borrowed for the duration of one
/// call and mutated in place on success — the coordinator never caches
/// them.
pub struct TokenRefresher {
    transport: Arc<dyn Transport>,
    store: Arc<CredentialStore>,
    messenger: Arc<dyn Messenger>,
    broadcast: Arc<dyn TokenBroadcast>,
    settings: OpenApiSettings,
    session_gate: RefreshGate,
    primary_gate: RefreshGate,
    open_api_gate: RefreshGate,
}

impl TokenRefresher {
    pub fn new(
        transport: Arc<dyn Transport>,
        store: Arc<CredentialStore>,
        messenger: Arc<dyn Messenger>,
        broadcast: Arc<dyn TokenBroadcast>,
        settings: OpenApiSettings,
    ) -> Self {
        Self::with_cooldowns(
            transport,
            store,
            messenger,
            broadcast,
            settings,
            RefreshCooldowns::default(),
        )
    }

    pub fn with_cooldowns(
        transport: Arc<dyn Transport>,
        store: Arc<CredentialStore>,
        messenger: Arc<dyn Messenger>,
        broadcast: Arc<dyn TokenBroadcast>,
        settings: OpenApiSettings,
        cooldowns: RefreshCooldowns,
    ) -> Self {
        Self {
            transport,
            store,
            messenger,
            broadcast,
            settings,
            session_gate: RefreshGate::new(cooldowns.session),
            primary_gate: RefreshGate::new(cooldowns.primary),
            open_api_gate: RefreshGate::new(cooldowns.open_api),
        }
    }

    /// Refresh the primary OAuth credential.
    ///
    /// On success every credential and identity field from the response
    /// overwrites the record (full replacement), the device id is
    /// re-derived from the returned account id, and the record persists.
    /// A terminal rejection purges the persisted record; in visible mode
    /// it additionally raises an interactive error.
    pub async fn refresh_primary(
        &self,
        record: &mut CredentialRecord,
        visible: bool,
    ) -> RefreshStatus {
        if record.refresh_token.is_empty() {
            return RefreshStatus::MissingToken;
        }

        let key = record.user_id.clone();
        let lock = self.primary_gate.entry(&key);
        let _guard = lock.lock().await;

        if self.primary_gate.within_cooldown(&key) {
            debug!(user_id = %key, "primary token inside cooldown, skipping refresh");
            return RefreshStatus::StillFresh;
        }

        let body = json!({
            "refresh_token": record.refresh_token,
            "grant_type": "refresh_token",
        });
        let resp = match self.transport.post(TOKEN_ENDPOINT, body, "").await {
            Ok(resp) => resp,
            Err(e) => {
                warn!(user_id = %key, error = %e, "primary token refresh request failed");
                if visible {
                    self.messenger
                        .error(&format!("刷新账号[{}] token 失败", record.user_name));
                }
                return RefreshStatus::TransientFailure;
            }
        };

        if is_success(resp.code) {
            let parsed: PrimaryTokenResponse = match serde_json::from_value(resp.body) {
                Ok(parsed) => parsed,
                Err(e) => {
                    warn!(user_id = %key, error = %e, "malformed primary token response");
                    return RefreshStatus::TransientFailure;
                }
            };
            if !parsed.is_complete() {
                warn!(user_id = %key, "primary token response missing required fields");
                return RefreshStatus::TransientFailure;
            }

            let now = now_millis();
            record.expires_at = parsed.expires_at(now);
            record.access_token = parsed.access_token;
            record.refresh_token = parsed.refresh_token;
            record.expires_in = parsed.expires_in;
            record.token_type = parsed.token_type;
            record.user_id = parsed.user_id;
            record.user_name = parsed.user_name;
            record.nick_name = parsed.nick_name;
            record.avatar = parsed.avatar;
            record.default_drive_id = parsed.default_drive_id;
            record.sbox_drive_id = parsed.default_sbox_drive_id;
            record.role = parsed.role;
            record.status = parsed.status;
            record.pin_setup = parsed.pin_setup;
            record.is_first_login = parsed.is_first_login;
            record.need_rp_verify = parsed.need_rp_verify;
            record.device_id = device_id_for(&record.user_id);
            record.token_from = TOKEN_FROM_ACCOUNT.into();

            self.primary_gate.mark_refreshed(&record.user_id);
            self.broadcast.announce(TokenAnnouncement::Refresh {
                user_id: record.user_id.clone(),
                name: record.user_name.clone(),
                access_token: record.access_token.clone(),
                open_api_access_token: None,
            });
            if let Err(e) = self.store.save_account(record).await {
                warn!(user_id = %record.user_id, error = %e, "failed to persist refreshed record");
            }
            info!(user_id = %record.user_id, "primary token refreshed");
            return RefreshStatus::Refreshed;
        }

        let body_code = resp.body_code().unwrap_or_default();
        if body_code == INVALID_REFRESH_TOKEN_CODE {
            warn!(user_id = %key, "primary refresh token rejected, purging persisted record");
            if visible {
                self.messenger.error(&format!(
                    "刷新账号[{}] token 失败，需要重新登录",
                    record.user_name
                ));
            }
            if let Err(e) = self.store.delete_account(&key).await {
                warn!(user_id = %key, error = %e, "failed to purge persisted record");
            }
            return RefreshStatus::InvalidRefreshToken;
        }

        warn!(user_id = %key, code = resp.code, body_code = %body_code, "primary token refresh failed");
        if visible {
            self.messenger
                .error(&format!("刷新账号[{}] token 失败", record.user_name));
        }
        RefreshStatus::TransientFailure
    }

    /// Refresh the open-API OAuth credential.
    ///
    /// Success replaces only the open token pair. A `429` body code is
    /// always surfaced as a distinct user warning, though it is handled
    /// like any other transient failure.
    pub async fn refresh_open_api(
        &self,
        record: &mut CredentialRecord,
        visible: bool,
    ) -> RefreshStatus {
        if record.open_api_refresh_token.is_empty() {
            return RefreshStatus::MissingToken;
        }

        let key = record.user_id.clone();
        let lock = self.open_api_gate.entry(&key);
        let _guard = lock.lock().await;

        if self.open_api_gate.within_cooldown(&key) {
            debug!(user_id = %key, "open-API token inside cooldown, skipping refresh");
            return RefreshStatus::StillFresh;
        }

        let url = self.settings.token_endpoint();
        let body = json!({
            "refresh_token": record.open_api_refresh_token,
            "grant_type": "refresh_token",
            "client_id": self.settings.client_id,
            "client_secret": self.settings.client_secret_value(),
        });
        let resp = match self.transport.post(url, body, "").await {
            Ok(resp) => resp,
            Err(e) => {
                warn!(user_id = %key, error = %e, "open-API token refresh request failed");
                if visible {
                    self.messenger.error(&format!(
                        "刷新账号[{}] OpenApiToken 失败, 请检查配置",
                        record.user_name
                    ));
                }
                return RefreshStatus::TransientFailure;
            }
        };

        if is_success(resp.code) {
            let parsed: OpenApiTokenResponse =
                match serde_json::from_value::<OpenApiTokenResponse>(resp.body) {
                Ok(parsed)
                    if !parsed.access_token.is_empty() && !parsed.refresh_token.is_empty() =>
                {
                    parsed
                }
                _ => {
                    warn!(user_id = %key, "malformed open-API token response");
                    return RefreshStatus::TransientFailure;
                }
            };

            record.open_api_access_token = parsed.access_token;
            record.open_api_refresh_token = parsed.refresh_token;

            self.open_api_gate.mark_refreshed(&key);
            self.broadcast.announce(TokenAnnouncement::Refresh {
                user_id: record.user_id.clone(),
                name: record.user_name.clone(),
                access_token: record.access_token.clone(),
                open_api_access_token: Some(record.open_api_access_token.clone()),
            });
            if let Err(e) = self.store.save_account(record).await {
                warn!(user_id = %key, error = %e, "failed to persist refreshed record");
            }
            info!(user_id = %key, "open-API token refreshed");
            return RefreshStatus::Refreshed;
        }

        let body_code = resp.body_code().unwrap_or_default();
        if body_code != INVALID_REFRESH_TOKEN_CODE {
            warn!(user_id = %key, code = resp.code, body_code = %body_code, "open-API token refresh failed");
        }
        if body_code == RATE_LIMITED_CODE {
            self.messenger
                .warning("重复获取OpenApiAccessToken，请稍后再试");
        }
        if visible {
            self.messenger.error(&format!(
                "刷新账号[{}] OpenApiToken 失败, 请检查配置",
                record.user_name
            ));
        }
        if body_code == INVALID_REFRESH_TOKEN_CODE {
            RefreshStatus::InvalidRefreshToken
        } else {
            RefreshStatus::TransientFailure
        }
    }

    /// Refresh the device-session credential.
    ///
    /// Derives the session key pair deterministically, registers the
    /// public key, and on success stores the signature triple. Only the
    /// session fields change; no purge on failure.
    pub async fn refresh_session(
        &self,
        record: &mut CredentialRecord,
        visible: bool,
    ) -> RefreshStatus {
        if record.user_id.is_empty() || record.access_token.is_empty() {
            return RefreshStatus::MissingToken;
        }

        let key = record.user_id.clone();
        let lock = self.session_gate.entry(&key);
        let _guard = lock.lock().await;

        if self.session_gate.within_cooldown(&key) {
            debug!(user_id = %key, "session inside cooldown, skipping refresh");
            return RefreshStatus::StillFresh;
        }

        let sig = device_signature(0, &record.user_id, &record.device_id);
        let body = json!({
            "deviceName": SESSION_DEVICE_NAME,
            "modelName": SESSION_MODEL_NAME,
            "pubKey": sig.public_key,
        });
        let resp = match self.transport.post(SESSION_ENDPOINT, body, &key).await {
            Ok(resp) => resp,
            Err(e) => {
                warn!(user_id = %key, error = %e, "session refresh request failed");
                if visible {
                    self.messenger
                        .error(&format!("刷新账号[{}] session 失败", record.user_name));
                }
                return RefreshStatus::TransientFailure;
            }
        };

        if is_success(resp.code) {
            self.session_gate.mark_refreshed(&key);
            record.signature = sig.signature;
            record.public_key = sig.public_key;
            record.secret_key = sig.secret_key;
            if let Err(e) = self.store.save_account(record).await {
                warn!(user_id = %key, error = %e, "failed to persist refreshed record");
            }
            info!(user_id = %key, "session refreshed");
            return RefreshStatus::Refreshed;
        }

        warn!(
            user_id = %key,
            code = resp.code,
            body_code = %resp.body_code().unwrap_or_default(),
            "session refresh failed"
        );
        if visible {
            self.messenger
                .error(&format!("刷新账号[{}] session 失败", record.user_name));
        }
        RefreshStatus::TransientFailure
    }
}
