//! Open-API settings loading
//!
//! The open-API credential family carries operator-supplied configuration:
//! a client id/secret pair and an optional OAuth endpoint override. The
//! client secret is never stored in the TOML directly — it resolves from
//! the `ADRIVE_OPENAPI_SECRET` env var or `client_secret_file`, in that
//! order.

use std::path::{Path, PathBuf};

use common::Secret;
use serde::Deserialize;

use crate::constants::OPEN_API_TOKEN_ENDPOINT;

/// Secret resolution env var, checked before `client_secret_file`.
const SECRET_ENV: &str = "ADRIVE_OPENAPI_SECRET";

/// Operator configuration for the open-API credential family.
#[derive(Debug, Default, Deserialize)]
pub struct OpenApiSettings {
    /// Whether the open-API family is in use at all
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub client_id: String,
    #[serde(skip)]
    pub client_secret: Option<Secret<String>>,
    /// Path to a file containing the client secret (alternative to the env var)
    #[serde(default)]
    pub client_secret_file: Option<PathBuf>,
    /// Replacement OAuth endpoint; empty/absent means the service default
    #[serde(default)]
    pub oauth_url: Option<String>,
}

impl OpenApiSettings {
    /// Load settings from a TOML file, then overlay the secret sources.
    pub fn load(path: &Path) -> common::Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let mut settings: OpenApiSettings = toml::from_str(&contents)?;

        if let Some(ref url) = settings.oauth_url {
            if !url.is_empty() && !url.starts_with("http://") && !url.starts_with("https://") {
                return Err(common::Error::Config(format!(
                    "oauth_url must start with http:// or https://, got: {url}"
                )));
            }
        }

        if let Ok(secret) = std::env::var(SECRET_ENV) {
            settings.client_secret = Some(Secret::new(secret));
        } else if let Some(ref secret_file) = settings.client_secret_file {
            let secret = std::fs::read_to_string(secret_file).map_err(|e| {
                common::Error::Config(format!(
                    "failed to read client_secret_file {}: {e}",
                    secret_file.display()
                ))
            })?;
            let secret = secret.trim().to_owned();
            if !secret.is_empty() {
                settings.client_secret = Some(Secret::new(secret));
            }
        }

        Ok(settings)
    }

    /// Endpoint the open-API refresh should POST to.
    ///
    /// The override applies only when the family is enabled and the
    /// configured URL is non-empty.
    pub fn token_endpoint(&self) -> &str {
        match self.oauth_url {
            Some(ref url) if self.enabled && !url.is_empty() => url,
            _ => OPEN_API_TOKEN_ENDPOINT,
        }
    }

    /// Client secret as a plain string, empty when unset.
    pub fn client_secret_value(&self) -> &str {
        self.client_secret
            .as_ref()
            .map(|s| s.expose().as_str())
            .unwrap_or("")
    }
}
