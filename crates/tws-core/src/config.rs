use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::backoff::{BackoffConfig, BackoffSettings};
use crate::request::{StreamFilterParams, DEFAULT_ENDPOINT};
use crate::transport::CurlOptions;

/// One backoff curve (optional section in config.toml).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BackoffCurveConfig {
    /// First wait in seconds after a successful connection (e.g. 0.5 = 500ms).
    pub initial_interval_secs: f64,
    /// Growth factor per retry.
    pub multiplier: f64,
    /// Ceiling for a single wait, in seconds.
    pub max_interval_secs: u64,
    /// Jitter factor in [0, 1]; 0 disables jitter.
    #[serde(default)]
    pub randomization_factor: f64,
    /// Stop retrying after this many seconds without a successful connection.
    #[serde(default)]
    pub max_elapsed_secs: Option<u64>,
    /// Stop retrying after this many waits without a successful connection.
    #[serde(default)]
    pub max_retries: Option<u32>,
}

impl From<BackoffConfig> for BackoffCurveConfig {
    fn from(c: BackoffConfig) -> Self {
        Self {
            initial_interval_secs: c.initial_interval.as_secs_f64(),
            multiplier: c.multiplier,
            max_interval_secs: c.max_interval.as_secs(),
            randomization_factor: c.randomization_factor,
            max_elapsed_secs: c.max_elapsed_time.map(|d| d.as_secs()),
            max_retries: c.max_retries,
        }
    }
}

impl BackoffCurveConfig {
    pub fn to_backoff_config(&self) -> BackoffConfig {
        BackoffConfig {
            initial_interval: Duration::from_secs_f64(self.initial_interval_secs.max(0.0)),
            multiplier: self.multiplier,
            max_interval: Duration::from_secs(self.max_interval_secs),
            randomization_factor: self.randomization_factor,
            max_elapsed_time: self.max_elapsed_secs.map(Duration::from_secs),
            max_retries: self.max_retries,
        }
    }
}

/// Overrides for the two reconnect curves.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BackoffSection {
    /// Curve for HTTP 503.
    #[serde(default)]
    pub standard: Option<BackoffCurveConfig>,
    /// Curve for HTTP 429/420.
    #[serde(default)]
    pub aggressive: Option<BackoffCurveConfig>,
}

/// Global configuration loaded from `~/.config/tws/config.toml`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TwsConfig {
    /// Stream endpoint; `/stream` is appended.
    pub endpoint: String,
    /// Environment variable holding the bearer token.
    pub token_env: String,
    /// Reconnect when the stream is silent this long (keep-alives count).
    /// Unset: wait forever.
    #[serde(default)]
    pub stall_timeout_secs: Option<u64>,
    /// Default field/expansion selectors; CLI flags override per list.
    #[serde(default)]
    pub filter: Option<StreamFilterParams>,
    /// Optional backoff overrides; built-in curves are used when missing.
    #[serde(default)]
    pub backoff: Option<BackoffSection>,
}

impl Default for TwsConfig {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            token_env: "TWITTER_TOKEN".to_string(),
            stall_timeout_secs: None,
            filter: None,
            backoff: None,
        }
    }
}

impl TwsConfig {
    /// Curves for new sessions, falling back to built-ins per curve.
    pub fn backoff_settings(&self) -> BackoffSettings {
        let defaults = BackoffSettings::default();
        let section = self.backoff.clone().unwrap_or_default();
        BackoffSettings {
            standard: section
                .standard
                .map(|c| c.to_backoff_config())
                .unwrap_or(defaults.standard),
            aggressive: section
                .aggressive
                .map(|c| c.to_backoff_config())
                .unwrap_or(defaults.aggressive),
        }
    }

    /// libcurl options for the stream transport.
    pub fn curl_options(&self) -> CurlOptions {
        CurlOptions {
            stall_timeout: self.stall_timeout_secs.map(Duration::from_secs),
            ..CurlOptions::default()
        }
    }
}

pub fn config_path() -> Result<PathBuf> {
    let xdg_dirs = xdg::BaseDirectories::with_prefix("tws")?;
    Ok(xdg_dirs.place_config_file("config.toml")?)
}

/// Load configuration from disk, creating a default file if none exists.
pub fn load_or_init() -> Result<TwsConfig> {
    load_or_init_at(&config_path()?)
}

pub fn load_or_init_at(path: &Path) -> Result<TwsConfig> {
    if !path.exists() {
        let default_cfg = TwsConfig::default();
        let toml = toml::to_string_pretty(&default_cfg)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, toml)?;
        tracing::info!("created default config at {}", path.display());
        return Ok(default_cfg);
    }

    let data = fs::read_to_string(path)
        .with_context(|| format!("reading {}", path.display()))?;
    let cfg: TwsConfig =
        toml::from_str(&data).with_context(|| format!("parsing {}", path.display()))?;
    Ok(cfg)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_values() {
        let cfg = TwsConfig::default();
        assert_eq!(cfg.endpoint, DEFAULT_ENDPOINT);
        assert_eq!(cfg.token_env, "TWITTER_TOKEN");
        assert!(cfg.filter.is_none());
        assert_eq!(cfg.backoff_settings(), BackoffSettings::default());
        assert!(cfg.curl_options().stall_timeout.is_none());
    }

    #[test]
    fn config_toml_roundtrip() {
        let cfg = TwsConfig::default();
        let toml = toml::to_string_pretty(&cfg).unwrap();
        let parsed: TwsConfig = toml::from_str(&toml).unwrap();
        assert_eq!(parsed, cfg);
    }

    #[test]
    fn config_toml_filter_and_backoff() {
        let toml = r#"
            endpoint = "http://127.0.0.1:8080/2/tweets/search"
            token_env = "MY_TOKEN"

            [filter]
            expansions = ["author_id"]
            tweet_fields = ["created_at", "lang"]

            [backoff.aggressive]
            initial_interval_secs = 2.0
            multiplier = 2.0
            max_interval_secs = 60
            max_retries = 2
        "#;
        let cfg: TwsConfig = toml::from_str(toml).unwrap();
        assert!(cfg.stall_timeout_secs.is_none());
        let with_stall = format!("stall_timeout_secs = 90\n{}", toml);
        let cfg: TwsConfig = toml::from_str(&with_stall).unwrap();
        assert_eq!(cfg.curl_options().stall_timeout, Some(Duration::from_secs(90)));
        assert_eq!(cfg.token_env, "MY_TOKEN");
        let filter = cfg.filter.as_ref().unwrap();
        assert_eq!(filter.expansions, vec!["author_id"]);
        assert_eq!(filter.tweet_fields, vec!["created_at", "lang"]);
        assert!(filter.user_fields.is_empty());

        let settings = cfg.backoff_settings();
        assert_eq!(settings.standard, BackoffConfig::standard());
        assert_eq!(settings.aggressive.initial_interval, Duration::from_secs(2));
        assert_eq!(settings.aggressive.max_retries, Some(2));
        assert_eq!(settings.aggressive.randomization_factor, 0.0);
        assert!(settings.aggressive.max_elapsed_time.is_none());
    }

    #[test]
    fn curve_config_converts_both_ways() {
        let curve = BackoffCurveConfig::from(BackoffConfig::aggressive());
        assert_eq!(curve.max_interval_secs, 960);
        assert_eq!(curve.to_backoff_config(), BackoffConfig::aggressive());
    }

    #[test]
    fn load_or_init_creates_default_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");
        let cfg = load_or_init_at(&path).unwrap();
        assert_eq!(cfg, TwsConfig::default());
        assert!(path.exists());
        let again = load_or_init_at(&path).unwrap();
        assert_eq!(again, cfg);
    }

    #[test]
    fn load_rejects_malformed_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "endpoint = [").unwrap();
        assert!(load_or_init_at(&path).is_err());
    }
}
