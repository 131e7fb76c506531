//! In-memory account directory
//!
//! The directory owns the runtime map of known accounts (keyed by account
//! id, ascending order) and tracks which one is active. It composes the
//! store, the refresh coordinator, and the profile client into the
//! account lifecycle operations: startup load, login, logoff with
//! fallback, account switching, the periodic credential sweep, and the
//! on-demand profile refresh.
//!
//! The map lock is never held across a network call: records are cloned
//! out, worked on, and written back only if the entry still exists (a
//! concurrent logoff wins over a stale write-back).

use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::Mutex as StdMutex;

use tokio::sync::Mutex as TokioMutex;
use tracing::{debug, info, warn};

use adrive_auth::constants::DEFAULT_ACCOUNT_KEY;
use adrive_auth::messaging::Messenger;
use adrive_auth::notify::{TokenAnnouncement, TokenBroadcast};
use adrive_auth::profile::ProfileClient;
use adrive_auth::record::CredentialRecord;
use adrive_auth::refresh::{RefreshStatus, TokenRefresher};
use adrive_auth::store::CredentialStore;

use crate::hooks::SessionHooks;

/// Sweep threshold: primary and open-API credentials renew once expiry is
/// closer than this (milliseconds).
const TOKEN_RENEW_WINDOW_MS: u64 = 3 * 60 * 60 * 1000;

/// Sweep threshold: the session credential additionally renews once
/// expiry is closer than this (milliseconds).
const SESSION_RENEW_WINDOW_MS: u64 = 60 * 60 * 1000;

/// After a credential refresh is forced, token material younger than this
/// (seconds) is considered fresh enough to skip the network renewal.
const FORCE_REFRESH_MIN_AGE_SECS: u64 = 600;

fn now_millis() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

/// Runtime account directory.
///
/// One instance per process, shared behind `Arc` with the sweep task and
/// the application front-end.
pub struct AccountDirectory {
    accounts: TokioMutex<BTreeMap<String, CredentialRecord>>,
    active: StdMutex<Option<String>>,
    store: Arc<CredentialStore>,
    refresher: Arc<TokenRefresher>,
    profile: ProfileClient,
    messenger: Arc<dyn Messenger>,
    broadcast: Arc<dyn TokenBroadcast>,
    hooks: Arc<dyn SessionHooks>,
}

impl AccountDirectory {
    pub fn new(
        store: Arc<CredentialStore>,
        refresher: Arc<TokenRefresher>,
        profile: ProfileClient,
        messenger: Arc<dyn Messenger>,
        broadcast: Arc<dyn TokenBroadcast>,
        hooks: Arc<dyn SessionHooks>,
    ) -> Self {
        Self {
            accounts: TokioMutex::new(BTreeMap::new()),
            active: StdMutex::new(None),
            store,
            refresher,
            profile,
            messenger,
            broadcast,
            hooks,
        }
    }

    /// Load every persisted account, validate each through a silent
    /// primary refresh, and log in the saved default (or the first record
    /// that validates when the default does not).
    ///
    /// Returns whether any account ended up active. When none does, the
    /// login screen is signalled.
    pub async fn load_all(&self) -> bool {
        let records = self.store.all_accounts().await;
        let preferred = self
            .store
            .value(DEFAULT_ACCOUNT_KEY)
            .await
            .unwrap_or_default();
        info!(count = records.len(), "loading persisted accounts");

        self.accounts.lock().await.clear();

        let mut logged_in = false;
        let mut fallback: Option<CredentialRecord> = None;
        for mut record in records {
            if record.user_id.is_empty() {
                continue;
            }
            let status = self.refresher.refresh_primary(&mut record, false).await;
            if !status.is_ok() {
                debug!(user_id = %record.user_id, ?status, "persisted account failed validation");
                continue;
            }
            self.accounts
                .lock()
                .await
                .insert(record.user_id.clone(), record.clone());
            if !logged_in && record.user_id == preferred {
                logged_in = self.login(record).await;
            } else if fallback.is_none() {
                fallback = Some(record);
            }
        }

        if !logged_in {
            if let Some(record) = fallback {
                logged_in = self.login(record).await;
            }
        }
        if !logged_in {
            self.clear_active();
            self.hooks.show_login();
        }
        logged_in
    }

    /// Make the given record the active account.
    ///
    /// The record is trusted as-is (callers validate first when that
    /// matters): it is inserted, the profile and session are refreshed
    /// best-effort, the default-account preference and the record
    /// persist, and the activation is announced.
    pub async fn login(&self, record: CredentialRecord) -> bool {
        if record.user_id.is_empty() {
            return false;
        }
        let key = format!("userlogin_{}", now_millis());
        self.messenger.loading(&key, "加载用户信息中...");

        let mut record = record;
        self.accounts
            .lock()
            .await
            .insert(record.user_id.clone(), record.clone());

        self.profile.refresh_profile(&mut record).await;
        self.refresher.refresh_session(&mut record, true).await;

        if let Err(e) = self.store.save_value(DEFAULT_ACCOUNT_KEY, &record.user_id).await {
            warn!(user_id = %record.user_id, error = %e, "failed to persist default account");
        }
        if let Err(e) = self.store.save_account(&record).await {
            warn!(user_id = %record.user_id, error = %e, "failed to persist account");
        }
        self.accounts
            .lock()
            .await
            .insert(record.user_id.clone(), record.clone());

        self.set_active(&record.user_id);
        self.hooks.reset_account_views();
        self.hooks.account_activated(&record.user_id);
        self.broadcast.announce(TokenAnnouncement::Login {
            user_id: record.user_id.clone(),
            name: record.user_name.clone(),
            access_token: record.access_token.clone(),
        });
        info!(user_id = %record.user_id, "account logged in");
        self.messenger.success(&key, "加载用户成功!");
        true
    }

    /// Remove an account everywhere and fall back to the next one that
    /// still validates (map order). With no survivor the directory goes
    /// inactive and the login screen is signalled.
    pub async fn logoff(&self, user_id: &str) -> bool {
        if let Err(e) = self.store.delete_account(user_id).await {
            warn!(user_id, error = %e, "failed to delete account from store");
        }
        self.accounts.lock().await.remove(user_id);
        self.broadcast.announce(TokenAnnouncement::Logout {
            user_id: user_id.to_string(),
        });
        info!(user_id, "account logged off");

        let remaining: Vec<CredentialRecord> =
            self.accounts.lock().await.values().cloned().collect();
        for mut record in remaining {
            let status = self.refresher.refresh_primary(&mut record, false).await;
            if status.is_ok() {
                self.accounts
                    .lock()
                    .await
                    .insert(record.user_id.clone(), record.clone());
                return self.login(record).await;
            }
            if status == RefreshStatus::InvalidRefreshToken {
                self.accounts.lock().await.remove(&record.user_id);
            }
        }

        self.clear_active();
        self.hooks.account_cleared();
        self.hooks.reset_account_views();
        self.hooks.show_login();
        false
    }

    /// Switch the active account to a known record, validating its
    /// primary credential first. A record that no longer validates is
    /// removed and the user is told to re-authenticate it.
    pub async fn switch_account(&self, user_id: &str) -> bool {
        let Some(mut record) = self.accounts.lock().await.get(user_id).cloned() else {
            return false;
        };

        let status = self.refresher.refresh_primary(&mut record, false).await;
        if !status.is_ok() {
            self.messenger
                .warning(&format!("该账号需要重新登陆[{}]", record.user_name));
            if let Err(e) = self.store.delete_account(user_id).await {
                warn!(user_id, error = %e, "failed to delete account from store");
            }
            self.accounts.lock().await.remove(user_id);
            return false;
        }

        self.accounts
            .lock()
            .await
            .insert(record.user_id.clone(), record.clone());
        self.login(record).await
    }

    /// One sweep pass over every persisted account, renewing credentials
    /// by expiry proximity: primary and open-API inside three hours,
    /// session additionally inside one hour. All refreshes are silent;
    /// only a terminal rejection removes the directory entry.
    pub async fn periodic_sweep(&self) {
        let now = now_millis();
        for mut record in self.store.all_accounts().await {
            if record.user_id.is_empty() || record.refresh_token.is_empty() {
                continue;
            }
            let remaining = record.millis_to_expiry(now);
            if remaining >= TOKEN_RENEW_WINDOW_MS {
                continue;
            }
            debug!(user_id = %record.user_id, remaining_ms = remaining, "sweep renewing credentials");

            let primary = self.refresher.refresh_primary(&mut record, false).await;
            if primary == RefreshStatus::InvalidRefreshToken {
                self.accounts.lock().await.remove(&record.user_id);
                continue;
            }
            self.refresher.refresh_open_api(&mut record, false).await;
            if remaining < SESSION_RENEW_WINDOW_MS {
                self.refresher.refresh_session(&mut record, false).await;
            }

            let mut accounts = self.accounts.lock().await;
            if accounts.contains_key(&record.user_id) {
                accounts.insert(record.user_id.clone(), record);
            }
        }
    }

    /// Refresh an account's profile fields on demand.
    ///
    /// With `force` set and token material older than ten minutes, the
    /// primary and session credentials renew first (interactively); a
    /// terminal rejection removes the account. Otherwise only the profile
    /// reads run.
    pub async fn force_refresh_profile(&self, user_id: &str, force: bool) -> bool {
        let Some(mut record) = self.accounts.lock().await.get(user_id).cloned() else {
            return false;
        };
        if record.access_token.is_empty() {
            return false;
        }

        let token_age_secs = now_millis().saturating_sub(record.token_issued_at()) / 1000;
        if force && token_age_secs >= FORCE_REFRESH_MIN_AGE_SECS {
            let primary = self.refresher.refresh_primary(&mut record, true).await;
            let session = self.refresher.refresh_session(&mut record, true).await;
            if primary == RefreshStatus::InvalidRefreshToken {
                self.accounts.lock().await.remove(user_id);
                return false;
            }
            if !primary.is_ok() || !session.is_ok() {
                return false;
            }
            self.profile.refresh_profile(&mut record).await;
            self.set_active(&record.user_id);
            self.hooks.account_activated(&record.user_id);
        } else {
            self.profile.refresh_profile(&mut record).await;
        }

        if let Err(e) = self.store.save_account(&record).await {
            warn!(user_id = %record.user_id, error = %e, "failed to persist account");
        }
        let mut accounts = self.accounts.lock().await;
        if accounts.contains_key(&record.user_id) {
            accounts.insert(record.user_id.clone(), record);
        }
        true
    }

    /// Run the daily sign-in for a known account.
    pub async fn sign_in(&self, user_id: &str) -> bool {
        let Some(record) = self.accounts.lock().await.get(user_id).cloned() else {
            return false;
        };
        if record.access_token.is_empty() {
            return false;
        }
        self.profile.sign_in(&record.user_id).await
    }

    /// Id of the active account, if any.
    pub fn active_account(&self) -> Option<String> {
        self.active.lock().expect("active slot poisoned").clone()
    }

    /// All known records in ascending account-id order.
    pub async fn account_list(&self) -> Vec<CredentialRecord> {
        self.accounts.lock().await.values().cloned().collect()
    }

    /// One known record by account id.
    pub async fn get(&self, user_id: &str) -> Option<CredentialRecord> {
        self.accounts.lock().await.get(user_id).cloned()
    }

    fn set_active(&self, user_id: &str) {
        *self.active.lock().expect("active slot poisoned") = Some(user_id.to_string());
    }

    fn clear_active(&self) {
        *self.active.lock().expect("active slot poisoned") = None;
    }
}
