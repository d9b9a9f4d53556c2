//! Configuration system: TOML file + env var overrides + smart defaults.

#![allow(missing_docs)]

use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::core::errors::{Result, TtvError};
use crate::core::paths::{config_dir, data_dir, expand_tilde, resolve_absolute_path};

/// Full configuration model.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub tail: TailConfig,
    pub display: DisplayConfig,
    pub paths: PathsConfig,
}

/// Dashboard server endpoint settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ServerConfig {
    /// Base URL of the dashboard server, e.g. `http://localhost:8080`.
    pub base_url: String,
    /// Per-request timeout. `0` disables the timeout.
    pub request_timeout_ms: u64,
}

/// Tail session knobs.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct TailConfig {
    /// Delay between the completion of one cycle and the start of the next.
    pub poll_interval_ms: u64,
    /// Upper bound on buffered display entries.
    pub max_entries: usize,
    /// Payloads longer than this many characters are truncated.
    pub max_payload_length: usize,
    /// A view within this many rows of its end counts as "at bottom".
    pub bottom_tolerance: usize,
    /// Consecutive failed cycles before the status label reports staleness.
    pub stale_after_failures: u32,
}

/// Rendering preferences for formatted magnitudes.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct DisplayConfig {
    pub decimals: usize,
}

/// Filesystem paths used by ttv.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct PathsConfig {
    pub config_file: PathBuf,
    pub jsonl_log: PathBuf,
    pub sqlite_db: PathBuf,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8080".to_string(),
            request_timeout_ms: 10_000,
        }
    }
}

impl Default for TailConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: 1_000,
            max_entries: 1_000,
            max_payload_length: 1_024,
            bottom_tolerance: 1,
            stale_after_failures: 5,
        }
    }
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self { decimals: 1 }
    }
}

impl Default for PathsConfig {
    fn default() -> Self {
        let data = data_dir();
        Self {
            config_file: config_dir().join("config.toml"),
            jsonl_log: data.join("activity.jsonl"),
            sqlite_db: data.join("activity.sqlite3"),
        }
    }
}

impl ServerConfig {
    /// Request timeout, or `None` when disabled.
    #[must_use]
    pub fn request_timeout(&self) -> Option<Duration> {
        (self.request_timeout_ms > 0).then(|| Duration::from_millis(self.request_timeout_ms))
    }
}

impl TailConfig {
    #[must_use]
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

impl Config {
    /// Default configuration path.
    #[must_use]
    pub fn default_path() -> PathBuf {
        PathsConfig::default().config_file
    }

    /// Load config from default or explicit path, then apply env overrides.
    ///
    /// Missing config file is not an error when loading from default path; defaults are used.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let path_buf = path.map_or_else(Self::default_path, resolve_absolute_path);
        let is_explicit_path = path.is_some();

        let mut cfg = if path_buf.exists() {
            let raw = fs::read_to_string(&path_buf).map_err(|source| TtvError::Io {
                path: path_buf.clone(),
                source,
            })?;
            let parsed: Self = toml::from_str(&raw)?;
            parsed
        } else if is_explicit_path {
            return Err(TtvError::MissingConfig { path: path_buf });
        } else {
            Self::default()
        };

        cfg.paths.config_file = path_buf;
        cfg.apply_env_overrides_from(env_var)?;
        cfg.normalize();
        cfg.validate()?;
        Ok(cfg)
    }

    /// Deterministic hash of the effective config for logging.
    ///
    /// FNV-1a over the canonical JSON form, stable across processes.
    pub fn stable_hash(&self) -> Result<String> {
        let canonical = serde_json::to_string(self)?;
        let mut hash: u64 = 0xcbf2_9ce4_8422_2325;
        for byte in canonical.as_bytes() {
            hash ^= u64::from(*byte);
            hash = hash.wrapping_mul(0x0100_0000_01b3);
        }
        Ok(format!("{hash:016x}"))
    }

    fn apply_env_overrides_from<F>(&mut self, mut lookup: F) -> Result<()>
    where
        F: FnMut(&str) -> Option<String>,
    {
        // server
        if let Some(raw) = lookup("TTV_SERVER_BASE_URL") {
            self.server.base_url = raw;
        }
        if let Some(raw) = lookup("TTV_SERVER_REQUEST_TIMEOUT_MS") {
            self.server.request_timeout_ms = parse_env("TTV_SERVER_REQUEST_TIMEOUT_MS", &raw)?;
        }
        // tail
        if let Some(raw) = lookup("TTV_TAIL_POLL_INTERVAL_MS") {
            self.tail.poll_interval_ms = parse_env("TTV_TAIL_POLL_INTERVAL_MS", &raw)?;
        }
        if let Some(raw) = lookup("TTV_TAIL_MAX_ENTRIES") {
            self.tail.max_entries = parse_env("TTV_TAIL_MAX_ENTRIES", &raw)?;
        }
        if let Some(raw) = lookup("TTV_TAIL_MAX_PAYLOAD_LENGTH") {
            self.tail.max_payload_length = parse_env("TTV_TAIL_MAX_PAYLOAD_LENGTH", &raw)?;
        }
        if let Some(raw) = lookup("TTV_TAIL_BOTTOM_TOLERANCE") {
            self.tail.bottom_tolerance = parse_env("TTV_TAIL_BOTTOM_TOLERANCE", &raw)?;
        }
        if let Some(raw) = lookup("TTV_TAIL_STALE_AFTER_FAILURES") {
            self.tail.stale_after_failures = parse_env("TTV_TAIL_STALE_AFTER_FAILURES", &raw)?;
        }
        // display
        if let Some(raw) = lookup("TTV_DISPLAY_DECIMALS") {
            self.display.decimals = parse_env("TTV_DISPLAY_DECIMALS", &raw)?;
        }
        // paths
        if let Some(raw) = lookup("TTV_PATHS_JSONL_LOG") {
            self.paths.jsonl_log = PathBuf::from(raw);
        }
        if let Some(raw) = lookup("TTV_PATHS_SQLITE_DB") {
            self.paths.sqlite_db = PathBuf::from(raw);
        }
        Ok(())
    }

    fn normalize(&mut self) {
        let trimmed = self.server.base_url.trim().trim_end_matches('/');
        self.server.base_url = trimmed.to_string();
        self.paths.jsonl_log = expand_tilde(&self.paths.jsonl_log);
        self.paths.sqlite_db = expand_tilde(&self.paths.sqlite_db);
    }

    /// Check value ranges. Called by [`Config::load`]; call again after overriding fields.
    pub fn validate(&self) -> Result<()> {
        let url = &self.server.base_url;
        if !(url.starts_with("http://") || url.starts_with("https://")) {
            return Err(TtvError::InvalidConfig {
                details: format!("server.base_url must be an http(s) URL, got {url:?}"),
            });
        }
        if self.tail.poll_interval_ms == 0 {
            return Err(TtvError::InvalidConfig {
                details: "tail.poll_interval_ms must be >= 1".to_string(),
            });
        }
        if self.tail.max_entries == 0 {
            return Err(TtvError::InvalidConfig {
                details: "tail.max_entries must be >= 1".to_string(),
            });
        }
        if self.tail.max_payload_length == 0 {
            return Err(TtvError::InvalidConfig {
                details: "tail.max_payload_length must be >= 1".to_string(),
            });
        }
        if self.tail.stale_after_failures == 0 {
            return Err(TtvError::InvalidConfig {
                details: "tail.stale_after_failures must be >= 1".to_string(),
            });
        }
        if self.display.decimals > 6 {
            return Err(TtvError::InvalidConfig {
                details: format!(
                    "display.decimals must be in [0, 6], got {}",
                    self.display.decimals
                ),
            });
        }
        Ok(())
    }
}

fn env_var(name: &str) -> Option<String> {
    env::var(name).ok().filter(|raw| !raw.trim().is_empty())
}

fn parse_env<T>(name: &str, raw: &str) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    raw.trim().parse::<T>().map_err(|error| TtvError::ConfigParse {
        context: "env",
        details: format!("{name}={raw:?}: {error}"),
    })
}

#[cfg(test)]
mod tests {
    use super::{Config, TtvError};
    use std::collections::HashMap;
    use std::path::Path;

    fn vars(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(name, value)| ((*name).to_string(), (*value).to_string()))
            .collect()
    }

    #[test]
    fn default_config_is_valid() {
        let cfg = Config::default();
        assert!(cfg.validate().is_ok());
        assert_eq!(cfg.tail.poll_interval_ms, 1_000);
        assert_eq!(cfg.tail.max_entries, 1_000);
        assert_eq!(cfg.tail.max_payload_length, 1_024);
        assert_eq!(cfg.tail.bottom_tolerance, 1);
    }

    #[test]
    fn base_url_must_be_http() {
        let mut cfg = Config::default();
        cfg.server.base_url = "ftp://broker-dash".to_string();
        let err = cfg.validate().expect_err("expected invalid url");
        match err {
            TtvError::InvalidConfig { details } => assert!(details.contains("base_url")),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn zero_poll_interval_rejected() {
        let mut cfg = Config::default();
        cfg.tail.poll_interval_ms = 0;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn zero_max_entries_rejected() {
        let mut cfg = Config::default();
        cfg.tail.max_entries = 0;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn stable_hash_changes_when_config_changes() {
        let cfg = Config::default();
        let before = cfg.stable_hash().expect("hash should compute");
        let mut modified = Config::default();
        modified.tail.max_entries += 1;
        let after = modified.stable_hash().expect("hash should compute");
        assert_ne!(before, after);
        assert_eq!(before, Config::default().stable_hash().unwrap());
    }

    #[test]
    fn env_overrides_apply() {
        let env = vars(&[
            ("TTV_SERVER_BASE_URL", "https://dash.internal:9000"),
            ("TTV_TAIL_POLL_INTERVAL_MS", "250"),
            ("TTV_TAIL_MAX_ENTRIES", "50"),
            ("TTV_DISPLAY_DECIMALS", "2"),
        ]);
        let mut cfg = Config::default();
        cfg.apply_env_overrides_from(|name| env.get(name).cloned())
            .expect("overrides should apply");
        assert_eq!(cfg.server.base_url, "https://dash.internal:9000");
        assert_eq!(cfg.tail.poll_interval_ms, 250);
        assert_eq!(cfg.tail.max_entries, 50);
        assert_eq!(cfg.display.decimals, 2);
    }

    #[test]
    fn env_override_parse_failure_is_reported() {
        let env = vars(&[("TTV_TAIL_MAX_ENTRIES", "lots")]);
        let mut cfg = Config::default();
        let err = cfg
            .apply_env_overrides_from(|name| env.get(name).cloned())
            .expect_err("expected parse failure");
        assert_eq!(err.code(), "TTV-1003");
        assert!(err.to_string().contains("TTV_TAIL_MAX_ENTRIES"));
    }

    #[test]
    fn normalize_strips_trailing_slash() {
        let mut cfg = Config::default();
        cfg.server.base_url = "http://localhost:8080/ ".to_string();
        cfg.normalize();
        assert_eq!(cfg.server.base_url, "http://localhost:8080");
    }

    #[test]
    fn normalize_expands_log_paths() {
        let mut cfg = Config::default();
        cfg.paths.jsonl_log = "~/ttv/activity.jsonl".into();
        cfg.normalize();
        assert_eq!(
            cfg.paths.jsonl_log,
            crate::core::paths::home_dir().join("ttv").join("activity.jsonl")
        );
        assert!(cfg.paths.sqlite_db.is_absolute());
    }

    #[test]
    fn request_timeout_zero_disables() {
        let mut cfg = Config::default();
        assert!(cfg.server.request_timeout().is_some());
        cfg.server.request_timeout_ms = 0;
        assert!(cfg.server.request_timeout().is_none());
    }

    #[test]
    fn load_partial_toml_keeps_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            "[server]\nbase_url = \"http://dash:8080/\"\n\n[tail]\nmax_entries = 200\n",
        )
        .unwrap();
        let cfg = Config::load(Some(&path)).expect("config should load");
        assert_eq!(cfg.server.base_url, "http://dash:8080");
        assert_eq!(cfg.tail.max_entries, 200);
        assert_eq!(cfg.tail.poll_interval_ms, 1_000);
        assert_eq!(cfg.paths.config_file, path.canonicalize().unwrap());
    }

    #[test]
    fn load_explicit_missing_file_fails() {
        let err = Config::load(Some(Path::new("/nonexistent_ttv_dir_4242/config.toml")))
            .expect_err("explicit missing path must fail");
        assert_eq!(err.code(), "TTV-1002");
    }

    #[test]
    fn load_rejects_invalid_values() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[display]\ndecimals = 9\n").unwrap();
        let err = Config::load(Some(&path)).expect_err("decimals out of range");
        assert_eq!(err.code(), "TTV-1001");
    }
}
