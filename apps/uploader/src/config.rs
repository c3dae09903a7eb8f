//! Uploader configuration.
//!
//! Read from `~/.config/cloudmux/config.json` (`%APPDATA%\cloudmux` on
//! Windows). A missing file yields defaults; an unparsable one is logged and
//! ignored. Command-line flags are applied on top.

use std::path::{Path, PathBuf};

use cloudmux_upload::EngineConfig;
use serde::{Deserialize, Serialize};

/// Contents of `config.json`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct UploaderConfig {
    /// Root of the remote upload API, e.g. `https://open-api.example.com`.
    pub base_url: String,

    /// Fixed bearer token. Takes precedence over client credentials.
    #[serde(skip_serializing_if = "String::is_empty")]
    pub access_token: String,

    #[serde(rename = "clientID", skip_serializing_if = "String::is_empty")]
    pub client_id: String,

    #[serde(skip_serializing_if = "String::is_empty")]
    pub client_secret: String,

    pub engine: EngineConfig,
}

/// How the uploader authenticates.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthMode {
    Bearer(String),
    ClientCredentials { id: String, secret: String },
}

impl UploaderConfig {
    /// Loads the config from the default location.
    pub fn load() -> anyhow::Result<Self> {
        Self::load_from(&default_config_path()?)
    }

    /// Loads the config from `path`, falling back to defaults.
    pub fn load_from(path: &Path) -> anyhow::Result<Self> {
        if !path.exists() {
            tracing::debug!(path = %path.display(), "no config file, using defaults");
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)?;
        match serde_json::from_str::<Self>(&content) {
            Ok(config) => Ok(config),
            Err(e) => {
                tracing::warn!(
                    path = %path.display(),
                    error = %e,
                    "failed to parse config, using defaults"
                );
                Ok(Self::default())
            }
        }
    }

    pub fn auth_mode(&self) -> anyhow::Result<AuthMode> {
        if !self.access_token.is_empty() {
            return Ok(AuthMode::Bearer(self.access_token.clone()));
        }
        if !self.client_id.is_empty() && !self.client_secret.is_empty() {
            return Ok(AuthMode::ClientCredentials {
                id: self.client_id.clone(),
                secret: self.client_secret.clone(),
            });
        }
        anyhow::bail!("no credentials configured: set accessToken or clientID and clientSecret")
    }
}

/// Returns `<config dir>/cloudmux/config.json`.
pub fn default_config_path() -> anyhow::Result<PathBuf> {
    Ok(config_base_dir()?.join("cloudmux").join("config.json"))
}

fn config_base_dir() -> anyhow::Result<PathBuf> {
    #[cfg(target_os = "windows")]
    {
        let appdata = std::env::var("APPDATA")
            .map_err(|_| anyhow::anyhow!("APPDATA is not set"))?;
        Ok(PathBuf::from(appdata))
    }

    #[cfg(not(target_os = "windows"))]
    {
        if let Ok(xdg) = std::env::var("XDG_CONFIG_HOME")
            && !xdg.is_empty()
        {
            return Ok(PathBuf::from(xdg));
        }
        let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".into());
        Ok(PathBuf::from(home).join(".config"))
    }
}
