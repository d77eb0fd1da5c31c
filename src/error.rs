//! Error types for Tunecast
//!
//! All modules use `TunecastResult<T>` as their return type.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for Tunecast operations
pub type TunecastResult<T> = Result<T, TunecastError>;

/// All errors that can occur in Tunecast
#[derive(Error, Debug)]
pub enum TunecastError {
    // Retrieval errors
    #[error("Nothing found: {0}")]
    NotFound(String),

    #[error("Upstream rate limit: {0}")]
    RateLimited(String),

    #[error("Timed out: {0}")]
    Timeout(String),

    #[error("Artifact too large: {size_mb} MB (limit {limit_mb} MB)")]
    QuotaExceeded { size_mb: u64, limit_mb: u64 },

    #[error("Provider error: {0}")]
    Transport(String),

    #[error("Provider unavailable: {0}")]
    ProviderUnavailable(String),

    // Cache errors
    #[error("Cache store error: {0}")]
    Persistence(String),

    // Operator errors
    #[error("Station already running for channel {0}")]
    AlreadyRunning(String),

    #[error("Station is not running")]
    NotRunning,

    #[error("Unknown mood: {0}")]
    UnknownMood(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("No vote is running")]
    NoActiveVote,

    #[error("Download failed: {0}")]
    DownloadFailed(String),

    #[error("Station stopped after {0} consecutive download failures")]
    ErrorBudgetExhausted(u32),

    // Configuration errors
    #[error("Invalid configuration at {path}: {reason}")]
    ConfigInvalid { path: PathBuf, reason: String },

    #[error("Failed to create config directory {path}: {source}")]
    ConfigDirCreate {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // IO errors
    #[error("IO error: {context}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },

    // Process errors
    #[error("Command failed: {command}")]
    CommandFailed {
        command: String,
        #[source]
        source: std::io::Error,
    },

    // Serialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("TOML serialize error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),

    // General errors
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Retrieval failure classes carried inside a failed `RetrievalResult`.
///
/// Unlike `TunecastError` this is plain data: it is cloned, compared and
/// serialized alongside results.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    NotFound,
    RateLimited,
    Timeout,
    QuotaExceeded,
    Transport,
    Persistence,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::NotFound => "not_found",
            Self::RateLimited => "rate_limited",
            Self::Timeout => "timeout",
            Self::QuotaExceeded => "quota_exceeded",
            Self::Transport => "transport",
            Self::Persistence => "persistence",
        };
        write!(f, "{}", name)
    }
}

impl ErrorKind {
    /// Whether another attempt can plausibly succeed. An oversized
    /// artifact stays oversized.
    pub fn is_retryable(&self) -> bool {
        !matches!(self, Self::QuotaExceeded)
    }
}

impl TunecastError {
    /// Create an IO error with context
    pub fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            context: context.into(),
            source,
        }
    }

    /// Create a command failed error
    pub fn command_failed(command: impl Into<String>, source: std::io::Error) -> Self {
        Self::CommandFailed {
            command: command.into(),
            source,
        }
    }

    /// Retrieval class of this error. Anything outside the retrieval
    /// taxonomy counts as a transport fault.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::NotFound(_) => ErrorKind::NotFound,
            Self::RateLimited(_) => ErrorKind::RateLimited,
            Self::Timeout(_) => ErrorKind::Timeout,
            Self::QuotaExceeded { .. } => ErrorKind::QuotaExceeded,
            Self::Persistence(_) => ErrorKind::Persistence,
            _ => ErrorKind::Transport,
        }
    }

    /// Get actionable hint for the error
    pub fn hint(&self) -> Option<&'static str> {
        match self {
            Self::ProviderUnavailable(_) => Some("Install yt-dlp or set retrieval.source = \"archive\""),
            Self::RateLimited(_) => Some("Set retrieval.cookies_file or wait before retrying"),
            Self::UnknownMood(_) => Some("Run: tunecast moods"),
            Self::ErrorBudgetExhausted(_) => {
                Some("Check network access, or run: tunecast search <query>")
            }
            Self::ConfigInvalid { .. } => Some("Run: tunecast config init --force"),
            Self::DownloadFailed(_) => Some("Preview matches with: tunecast search <query>"),
            _ => None,
        }
    }
}
