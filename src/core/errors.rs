//! TTV-prefixed error types with structured error codes.

#![allow(missing_docs)]

use std::path::{Path, PathBuf};

use thiserror::Error;

/// Shared `Result` alias for the project.
pub type Result<T> = std::result::Result<T, TtvError>;

/// Top-level error type for the topic tail viewer.
#[derive(Debug, Error)]
pub enum TtvError {
    #[error("[TTV-1001] invalid configuration: {details}")]
    InvalidConfig { details: String },

    #[error("[TTV-1002] missing configuration file: {path}")]
    MissingConfig { path: PathBuf },

    #[error("[TTV-1003] configuration parse failure in {context}: {details}")]
    ConfigParse {
        context: &'static str,
        details: String,
    },

    #[error("[TTV-2001] transport failure for {endpoint}: {details}")]
    Transport { endpoint: String, details: String },

    #[error("[TTV-2002] malformed payload from {endpoint}: {details}")]
    MalformedPayload { endpoint: String, details: String },

    #[error("[TTV-2003] server returned HTTP {status} for {endpoint}")]
    HttpStatus { endpoint: String, status: u16 },

    #[error("[TTV-2101] serialization failure in {context}: {details}")]
    Serialization {
        context: &'static str,
        details: String,
    },

    #[error("[TTV-2102] SQL failure in {context}: {details}")]
    Sql {
        context: &'static str,
        details: String,
    },

    #[error("[TTV-3002] IO failure at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("[TTV-3003] channel closed in component {component}")]
    ChannelClosed { component: &'static str },

    #[error("[TTV-3900] runtime failure: {details}")]
    Runtime { details: String },
}

impl TtvError {
    /// Stable machine-parseable error code.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::InvalidConfig { .. } => "TTV-1001",
            Self::MissingConfig { .. } => "TTV-1002",
            Self::ConfigParse { .. } => "TTV-1003",
            Self::Transport { .. } => "TTV-2001",
            Self::MalformedPayload { .. } => "TTV-2002",
            Self::HttpStatus { .. } => "TTV-2003",
            Self::Serialization { .. } => "TTV-2101",
            Self::Sql { .. } => "TTV-2102",
            Self::Io { .. } => "TTV-3002",
            Self::ChannelClosed { .. } => "TTV-3003",
            Self::Runtime { .. } => "TTV-3900",
        }
    }

    /// Whether a later attempt might succeed without operator action.
    ///
    /// Tail cycles never retry immediately; this only informs log severity.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Transport { .. }
                | Self::HttpStatus { .. }
                | Self::MalformedPayload { .. }
                | Self::Io { .. }
                | Self::ChannelClosed { .. }
                | Self::Sql { .. }
                | Self::Runtime { .. }
        )
    }

    /// Convenience constructor for IO errors with a known path.
    #[must_use]
    pub fn io(path: impl AsRef<Path>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.as_ref().to_path_buf(),
            source,
        }
    }
}

#[cfg(feature = "sqlite")]
impl From<rusqlite::Error> for TtvError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Sql {
            context: "rusqlite",
            details: value.to_string(),
        }
    }
}

impl From<serde_json::Error> for TtvError {
    fn from(value: serde_json::Error) -> Self {
        Self::Serialization {
            context: "serde_json",
            details: value.to_string(),
        }
    }
}

impl From<toml::de::Error> for TtvError {
    fn from(value: toml::de::Error) -> Self {
        Self::ConfigParse {
            context: "toml",
            details: value.to_string(),
        }
    }
}

impl From<reqwest::Error> for TtvError {
    fn from(value: reqwest::Error) -> Self {
        let endpoint = value
            .url()
            .map_or_else(|| "<unknown>".to_string(), ToString::to_string);
        if let Some(status) = value.status() {
            return Self::HttpStatus {
                endpoint,
                status: status.as_u16(),
            };
        }
        if value.is_decode() {
            return Self::MalformedPayload {
                endpoint,
                details: value.to_string(),
            };
        }
        Self::Transport {
            endpoint,
            details: value.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn all_variants() -> Vec<TtvError> {
        vec![
            TtvError::InvalidConfig {
                details: String::new(),
            },
            TtvError::MissingConfig {
                path: PathBuf::new(),
            },
            TtvError::ConfigParse {
                context: "",
                details: String::new(),
            },
            TtvError::Transport {
                endpoint: String::new(),
                details: String::new(),
            },
            TtvError::MalformedPayload {
                endpoint: String::new(),
                details: String::new(),
            },
            TtvError::HttpStatus {
                endpoint: String::new(),
                status: 500,
            },
            TtvError::Serialization {
                context: "",
                details: String::new(),
            },
            TtvError::Sql {
                context: "",
                details: String::new(),
            },
            TtvError::Io {
                path: PathBuf::new(),
                source: std::io::Error::other("test"),
            },
            TtvError::ChannelClosed { component: "" },
            TtvError::Runtime {
                details: String::new(),
            },
        ]
    }

    #[test]
    fn error_codes_are_unique() {
        let errors = all_variants();
        let codes: Vec<&str> = errors.iter().map(TtvError::code).collect();
        let unique: std::collections::HashSet<&&str> = codes.iter().collect();
        assert_eq!(
            codes.len(),
            unique.len(),
            "error codes must be unique: {codes:?}"
        );
    }

    #[test]
    fn display_carries_code_prefix() {
        for err in all_variants() {
            let msg = err.to_string();
            assert!(
                msg.contains(err.code()),
                "display should contain {}: {msg}",
                err.code()
            );
            assert!(err.code().starts_with("TTV-"));
        }
    }

    #[test]
    fn config_errors_are_not_retryable() {
        assert!(
            !TtvError::InvalidConfig {
                details: String::new()
            }
            .is_retryable()
        );
        assert!(
            !TtvError::MissingConfig {
                path: PathBuf::new()
            }
            .is_retryable()
        );
        assert!(
            TtvError::Transport {
                endpoint: "http://x".to_string(),
                details: "refused".to_string()
            }
            .is_retryable()
        );
        assert!(
            TtvError::MalformedPayload {
                endpoint: "http://x".to_string(),
                details: "not an array".to_string()
            }
            .is_retryable()
        );
    }

    #[test]
    fn io_convenience_constructor() {
        let err = TtvError::io(
            "/tmp/ttv.jsonl",
            std::io::Error::new(std::io::ErrorKind::NotFound, "gone"),
        );
        assert_eq!(err.code(), "TTV-3002");
        assert!(err.to_string().contains("/tmp/ttv.jsonl"));
    }

    #[test]
    fn from_serde_json_error() {
        let json_err = serde_json::from_str::<serde_json::Value>("not json").unwrap_err();
        let err: TtvError = json_err.into();
        assert_eq!(err.code(), "TTV-2101");
    }

    #[test]
    fn from_toml_error() {
        let toml_err = toml::from_str::<toml::Value>("= invalid").unwrap_err();
        let err: TtvError = toml_err.into();
        assert_eq!(err.code(), "TTV-1003");
    }

    #[cfg(feature = "sqlite")]
    #[test]
    fn from_rusqlite_error() {
        let sql_err =
            rusqlite::Error::SqliteFailure(rusqlite::ffi::Error::new(1), Some("test".to_string()));
        let err: TtvError = sql_err.into();
        assert_eq!(err.code(), "TTV-2102");
    }
}
