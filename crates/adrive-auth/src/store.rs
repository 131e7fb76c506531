//! Persistent account store
//!
//! A JSON file holding every account's `CredentialRecord` plus a small
//! string key-value section (the default-account preference lives there).
//! All writes use atomic temp-file + rename to prevent corruption on
//! crash, and a tokio Mutex serialises concurrent writers (refresh
//! coordinator, directory, sweep).
//!
//! Accounts live in a `BTreeMap`, so every enumeration — including the
//! directory's load/fallback scans — observes the same documented order:
//! ascending `user_id`.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::error::{Error, Result};
use crate::record::CredentialRecord;

#[derive(Debug, Default, Serialize, Deserialize)]
struct StoreState {
    #[serde(default)]
    accounts: BTreeMap<String, CredentialRecord>,
    #[serde(default)]
    values: BTreeMap<String, String>,
}

/// File-backed account store.
///
/// Reads clone out of the in-memory state under a brief lock, so callers
/// never hold the lock across their own awaits.
pub struct CredentialStore {
    path: PathBuf,
    state: Mutex<StoreState>,
}

impl CredentialStore {
    /// Load the store from the given file path.
    ///
    /// A missing file is a cold start: an empty store is created on disk
    /// immediately so later loads take the normal path.
    pub async fn load(path: PathBuf) -> Result<Self> {
        let state = if path.exists() {
            let contents = tokio::fs::read_to_string(&path)
                .await
                .map_err(|e| Error::Io(format!("reading account store: {e}")))?;
            let state: StoreState = serde_json::from_str(&contents)
                .map_err(|e| Error::StoreParse(format!("parsing account store: {e}")))?;
            info!(path = %path.display(), accounts = state.accounts.len(), "loaded account store");
            state
        } else {
            info!(path = %path.display(), "account store not found, starting empty");
            let state = StoreState::default();
            write_atomic(&path, &state).await?;
            state
        };

        Ok(Self {
            path,
            state: Mutex::new(state),
        })
    }

    /// All persisted records in ascending `user_id` order.
    pub async fn all_accounts(&self) -> Vec<CredentialRecord> {
        let state = self.state.lock().await;
        state.accounts.values().cloned().collect()
    }

    /// One record by account id.
    pub async fn account(&self, user_id: &str) -> Option<CredentialRecord> {
        let state = self.state.lock().await;
        state.accounts.get(user_id).cloned()
    }

    /// Insert or replace a record and persist.
    ///
    /// A record with an empty `user_id` is rejected: the account id is the
    /// sole store key.
    pub async fn save_account(&self, record: &CredentialRecord) -> Result<()> {
        if record.user_id.is_empty() {
            return Err(Error::NotFound("record has no user_id".into()));
        }
        let mut state = self.state.lock().await;
        state
            .accounts
            .insert(record.user_id.clone(), record.clone());
        debug!(user_id = %record.user_id, "saved account");
        write_atomic(&self.path, &state).await
    }

    /// Remove a record and persist. Returns whether it existed.
    pub async fn delete_account(&self, user_id: &str) -> Result<bool> {
        let mut state = self.state.lock().await;
        let removed = state.accounts.remove(user_id).is_some();
        if removed {
            debug!(user_id, "deleted account");
            write_atomic(&self.path, &state).await?;
        }
        Ok(removed)
    }

    /// Read a string value (e.g. the default-account preference).
    pub async fn value(&self, key: &str) -> Option<String> {
        let state = self.state.lock().await;
        state.values.get(key).cloned()
    }

    /// Write a string value and persist.
    pub async fn save_value(&self, key: &str, value: &str) -> Result<()> {
        let mut state = self.state.lock().await;
        state.values.insert(key.to_string(), value.to_string());
        write_atomic(&self.path, &state).await
    }

    /// Number of stored accounts.
    pub async fn len(&self) -> usize {
        let state = self.state.lock().await;
        state.accounts.len()
    }

    /// Whether no accounts are stored.
    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

/// Write the store state to disk atomically.
///
/// Temp file in the same directory, then rename over the target. The file
/// is chmod 0600 since it holds token material.
async fn write_atomic(path: &Path, state: &StoreState) -> Result<()> {
    let json = serde_json::to_string_pretty(state)
        .map_err(|e| Error::StoreParse(format!("serializing account store: {e}")))?;

    let dir = path
        .parent()
        .ok_or_else(|| Error::Io("store path has no parent directory".into()))?;

    let tmp_path = dir.join(format!(".accounts.tmp.{}", std::process::id()));

    tokio::fs::write(&tmp_path, json.as_bytes())
        .await
        .map_err(|e| Error::Io(format!("writing temp store file: {e}")))?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let perms = std::fs::Permissions::from_mode(0o600);
        tokio::fs::set_permissions(&tmp_path, perms)
            .await
            .map_err(|e| Error::Io(format!("setting store file permissions: {e}")))?;
    }

    tokio::fs::rename(&tmp_path, path)
        .await
        .map_err(|e| Error::Io(format!("renaming temp store file: {e}")))?;

    debug!(path = %path.display(), "persisted account store");
    Ok(())
}
