use std::fs;
use std::path::{Path, PathBuf};

use anyhow::Context;
use chrono_tz::Tz;
use serde::Deserialize;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::auth::DEFAULT_TOKEN_TTL_HOURS;

pub const CONFIG_ENV_VAR: &str = "DOCKET_SERVER_CONFIG";
pub const DEFAULT_CONFIG_FILE: &str = "docket-server.toml";

/// Server settings. Every key is optional in the TOML file.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind: String,
    pub data_dir: PathBuf,
    pub jwt_secret: Option<String>,
    pub token_ttl_hours: i64,
    pub timezone: Option<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "127.0.0.1:5000".to_string(),
            data_dir: PathBuf::from(".docket-server"),
            jwt_secret: None,
            token_ttl_hours: DEFAULT_TOKEN_TTL_HOURS,
            timezone: None,
        }
    }
}

impl ServerConfig {
    /// Explicit path first, then `$DOCKET_SERVER_CONFIG`, then
    /// `docket-server.toml` in the working directory. No file means defaults.
    #[tracing::instrument]
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        let Some(path) = resolve_config_path(path) else {
            debug!("no server config file; using defaults");
            return Ok(Self::default());
        };

        info!(config = %path.display(), "loading server config");
        let raw = fs::read_to_string(&path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        Self::from_toml(&raw).with_context(|| format!("failed to parse TOML {}", path.display()))
    }

    pub fn from_toml(raw: &str) -> anyhow::Result<Self> {
        let cfg: Self = toml::from_str(raw)?;
        if cfg.token_ttl_hours <= 0 {
            anyhow::bail!("token_ttl_hours must be positive");
        }
        Ok(cfg)
    }

    /// The configured secret, or a random one that only lives as long as the
    /// process.
    pub fn jwt_secret(&self) -> String {
        match self.jwt_secret.as_deref().map(str::trim) {
            Some(secret) if !secret.is_empty() => secret.to_string(),
            _ => {
                warn!("no jwt_secret configured; tokens will not survive a restart");
                format!("{}{}", Uuid::new_v4().simple(), Uuid::new_v4().simple())
            }
        }
    }

    pub fn timezone(&self) -> Tz {
        docket_core::datetime::resolve_timezone(self.timezone.as_deref())
    }
}

fn resolve_config_path(path: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = path {
        return Some(path.to_path_buf());
    }

    if let Ok(raw) = std::env::var(CONFIG_ENV_VAR)
        && !raw.trim().is_empty()
    {
        return Some(PathBuf::from(raw));
    }

    let local = PathBuf::from(DEFAULT_CONFIG_FILE);
    local.exists().then_some(local)
}

#[cfg(test)]
mod tests {
    use super::ServerConfig;

    #[test]
    fn missing_keys_take_defaults() {
        let cfg = ServerConfig::from_toml("bind = \"0.0.0.0:8080\"\n").expect("parse");
        assert_eq!(cfg.bind, "0.0.0.0:8080");
        assert_eq!(cfg.token_ttl_hours, 24 * 7);
        assert!(cfg.jwt_secret.is_none());
    }

    #[test]
    fn rejects_non_positive_ttl() {
        assert!(ServerConfig::from_toml("token_ttl_hours = 0\n").is_err());
        assert!(ServerConfig::from_toml("bind = 3\n").is_err());
    }

    #[test]
    fn generated_secret_is_random() {
        let cfg = ServerConfig::default();
        assert_ne!(cfg.jwt_secret(), cfg.jwt_secret());

        let cfg = ServerConfig::from_toml("jwt_secret = \"s3cret\"\n").expect("parse");
        assert_eq!(cfg.jwt_secret(), "s3cret");
    }
}
