// Copyright (c) 2024-2025 Jesse Morgan / Morgan Forge
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Gate configuration.
//!
//! Everything that was a process-wide constant in earlier revisions of the
//! gate (salt, key lists, page catalogs, timing windows) lives here as one
//! immutable configuration object, constructed once at startup and passed
//! by reference into the registry, policy and codec. There is no runtime
//! mutation path.
//!
//! Configuration is read from `~/.pagegate/config.json`; a missing file
//! yields the built-in defaults.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;

/// Session lifetime: 30 minutes.
pub const DEFAULT_SESSION_LIFETIME_MS: i64 = 30 * 60 * 1000;

/// How often an open page view re-runs the validator.
pub const DEFAULT_RECHECK_INTERVAL_SECS: u64 = 60;

fn default_lifetime() -> i64 {
    DEFAULT_SESSION_LIFETIME_MS
}

fn default_recheck() -> u64 {
    DEFAULT_RECHECK_INTERVAL_SECS
}

fn default_salt() -> String {
    "purge_secret_2025".to_string()
}

fn default_free_keys() -> Vec<String> {
    vec!["IMPOOR".to_string()]
}

fn default_premium_keys() -> Vec<String> {
    vec![
        "CHARLESISPOOR".to_string(),
        "UNHIIN".to_string(),
        "SOSAPARTY".to_string(),
    ]
}

fn default_free_pages() -> Vec<String> {
    vec!["games.html".to_string()]
}

fn default_premium_pages() -> Vec<String> {
    [
        "games.html",
        "apps.html",
        "tools.html",
        "roadmap.html",
        "themes.html",
        "chat.html",
        "credits.html",
        "settings.html",
        "admin.html",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

fn default_public_pages() -> Vec<String> {
    vec!["index.html".to_string(), "blocked.html".to_string()]
}

fn default_blocked_destination() -> String {
    "blocked.html".to_string()
}

fn default_bind_address() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    8790
}

/// Immutable gate configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GateConfig {
    /// Maximum session age before a validation reads `Expired`.
    #[serde(default = "default_lifetime")]
    pub session_lifetime_ms: i64,

    /// Interval between periodic re-validations of an open page view.
    #[serde(default = "default_recheck")]
    pub recheck_interval_secs: u64,

    /// Shared secret folded into every integrity token.
    #[serde(default = "default_salt")]
    pub salt: String,

    /// Keys that classify as free tier (stored upper-cased).
    #[serde(default = "default_free_keys")]
    pub free_keys: Vec<String>,

    /// Keys that classify as premium tier (stored upper-cased).
    #[serde(default = "default_premium_keys")]
    pub premium_keys: Vec<String>,

    /// Pages a free session may view.
    #[serde(default = "default_free_pages")]
    pub free_pages: Vec<String>,

    /// Pages a premium session may view.
    #[serde(default = "default_premium_pages")]
    pub premium_pages: Vec<String>,

    /// Documents that bypass the gate entirely. Non-document assets bypass
    /// it regardless of this list.
    #[serde(default = "default_public_pages")]
    pub public_pages: Vec<String>,

    /// Where a denied page view is sent. One-way navigation.
    #[serde(default = "default_blocked_destination")]
    pub blocked_destination: String,

    /// Append gate decisions to the audit log file.
    #[serde(default)]
    pub audit_log_enabled: bool,

    /// Page host bind address (localhost only by default).
    #[serde(default = "default_bind_address")]
    pub bind_address: String,

    /// Page host port.
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for GateConfig {
    fn default() -> Self {
        Self {
            session_lifetime_ms: default_lifetime(),
            recheck_interval_secs: default_recheck(),
            salt: default_salt(),
            free_keys: default_free_keys(),
            premium_keys: default_premium_keys(),
            free_pages: default_free_pages(),
            premium_pages: default_premium_pages(),
            public_pages: default_public_pages(),
            blocked_destination: default_blocked_destination(),
            audit_log_enabled: false,
            bind_address: default_bind_address(),
            port: default_port(),
        }
    }
}

impl GateConfig {
    /// Directory holding the config file and the audit log.
    pub fn config_dir() -> PathBuf {
        dirs::home_dir()
            .map(|h| h.join(".pagegate"))
            .unwrap_or_else(|| PathBuf::from(".pagegate"))
    }

    /// Path of the JSON config file.
    pub fn config_path() -> PathBuf {
        Self::config_dir().join("config.json")
    }

    /// Load the configuration, falling back to defaults when no file
    /// exists. A file that exists but fails to parse is an error rather
    /// than a silent fallback.
    pub fn load() -> Result<Self> {
        let path = Self::config_path();
        if !path.exists() {
            tracing::debug!("no config file at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let raw = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        let config: Self = serde_json::from_str(&raw)
            .with_context(|| format!("Failed to parse config file {}", path.display()))?;
        Ok(config)
    }

    /// Write the configuration to disk, creating the directory if needed.
    pub fn save(&self) -> Result<()> {
        let dir = Self::config_dir();
        if !dir.exists() {
            fs::create_dir_all(&dir)
                .with_context(|| format!("Failed to create config dir {}", dir.display()))?;
        }

        let path = Self::config_path();
        let raw = serde_json::to_string_pretty(self).context("Failed to serialize config")?;
        fs::write(&path, raw)
            .with_context(|| format!("Failed to write config file {}", path.display()))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_carry_the_catalog() {
        let config = GateConfig::default();
        assert_eq!(config.session_lifetime_ms, 30 * 60 * 1000);
        assert_eq!(config.free_keys, vec!["IMPOOR"]);
        assert!(config.premium_keys.contains(&"SOSAPARTY".to_string()));
        assert_eq!(config.free_pages, vec!["games.html"]);
        assert!(config.premium_pages.contains(&"admin.html".to_string()));
        assert!(config.public_pages.contains(&"blocked.html".to_string()));
        assert_eq!(config.blocked_destination, "blocked.html");
    }

    #[test]
    fn test_partial_config_parses_with_defaults() {
        let config: GateConfig = serde_json::from_str(r#"{"port": 9999}"#).unwrap();
        assert_eq!(config.port, 9999);
        assert_eq!(config.salt, "purge_secret_2025");
        assert_eq!(config.recheck_interval_secs, DEFAULT_RECHECK_INTERVAL_SECS);
    }

    #[test]
    fn test_config_round_trips_through_json() {
        let config = GateConfig::default();
        let raw = serde_json::to_string(&config).unwrap();
        let back: GateConfig = serde_json::from_str(&raw).unwrap();
        assert_eq!(back.premium_pages, config.premium_pages);
        assert_eq!(back.session_lifetime_ms, config.session_lifetime_ms);
    }
}
