//! Value types shared by the retrieval pipeline, cache and scheduler

use crate::error::ErrorKind;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

/// Upstream content source
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Source {
    /// YouTube via yt-dlp
    YouTube,
    /// Internet Archive audio collections
    InternetArchive,
}

impl Source {
    /// Stable tag used in cache keys
    pub fn tag(&self) -> &'static str {
        match self {
            Self::YouTube => "youtube",
            Self::InternetArchive => "internet_archive",
        }
    }
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::YouTube => "YouTube",
            Self::InternetArchive => "Internet Archive",
        };
        write!(f, "{}", name)
    }
}

/// Immutable description of one playable track
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackRef {
    pub title: String,
    pub artist: String,
    pub duration_seconds: u32,
    pub source: Source,
    /// Stable upstream key, when the provider exposes one
    #[serde(default)]
    pub identifier: Option<String>,
}

impl TrackRef {
    /// Create a track reference
    pub fn new(
        title: impl Into<String>,
        artist: impl Into<String>,
        duration_seconds: u32,
        source: Source,
        identifier: Option<String>,
    ) -> Self {
        Self {
            title: title.into(),
            artist: artist.into(),
            duration_seconds,
            source,
            identifier,
        }
    }

    /// "Artist - Title"
    pub fn display_name(&self) -> String {
        format!("{} - {}", self.artist, self.title)
    }

    /// Key used for dedup and the recency set.
    ///
    /// Falls back to the normalized display name when the provider gave no
    /// identifier.
    pub fn dedup_key(&self) -> String {
        match &self.identifier {
            Some(id) => id.clone(),
            None => normalize_query(&self.display_name()),
        }
    }

    /// Input to hand to `RetrievalPipeline::download_with_retry`
    pub fn download_target(&self) -> String {
        match &self.identifier {
            Some(id) => id.clone(),
            None => format!("{} {}", self.artist, self.title),
        }
    }
}

/// Lower-case and trim a query so incidental differences map to one key
pub fn normalize_query(query: &str) -> String {
    query.trim().to_lowercase()
}

/// Error half of a failed retrieval
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetrievalError {
    pub kind: ErrorKind,
    pub message: String,
}

impl fmt::Display for RetrievalError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind, self.message)
    }
}

/// Outcome of a download.
///
/// Fields are private: a result is built through `success` or `failure`,
/// so a success flag never travels with an error.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetrievalResult {
    success: bool,
    #[serde(default)]
    artifact_path: Option<PathBuf>,
    #[serde(default)]
    track: Option<TrackRef>,
    #[serde(default)]
    error: Option<RetrievalError>,
}

impl RetrievalResult {
    /// Successful retrieval of a local artifact
    pub fn success(artifact_path: impl Into<PathBuf>, track: TrackRef) -> Self {
        Self {
            success: true,
            artifact_path: Some(artifact_path.into()),
            track: Some(track),
            error: None,
        }
    }

    /// Failed retrieval
    pub fn failure(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            success: false,
            artifact_path: None,
            track: None,
            error: Some(RetrievalError {
                kind,
                message: message.into(),
            }),
        }
    }

    pub fn is_success(&self) -> bool {
        self.success
    }

    pub fn artifact_path(&self) -> Option<&Path> {
        self.artifact_path.as_deref()
    }

    pub fn track(&self) -> Option<&TrackRef> {
        self.track.as_ref()
    }

    pub fn error(&self) -> Option<&RetrievalError> {
        self.error.as_ref()
    }

    /// Whether the decoded payload obeys the success/error exclusivity.
    /// Cache entries that fail this are treated as corrupt.
    pub fn is_well_formed(&self) -> bool {
        if self.success {
            self.error.is_none() && self.track.is_some() && self.artifact_path.is_some()
        } else {
            self.error.is_some()
        }
    }
}

/// Inclusive duration window in seconds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DurationBounds {
    pub min_secs: u32,
    pub max_secs: u32,
}

impl DurationBounds {
    pub fn new(min_secs: u32, max_secs: u32) -> Self {
        Self { min_secs, max_secs }
    }

    /// Positive and within bounds
    pub fn admits(&self, duration_secs: u32) -> bool {
        duration_secs > 0 && duration_secs >= self.min_secs && duration_secs <= self.max_secs
    }
}

impl Default for DurationBounds {
    fn default() -> Self {
        Self {
            min_secs: 60,
            max_secs: 1200,
        }
    }
}

/// Constraints passed down to a `SearchProvider`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SearchFilters {
    pub duration: DurationBounds,
    /// Minimum view/play count, when the provider reports one
    pub min_popularity: Option<u64>,
}

impl SearchFilters {
    /// Same filters without popularity floors
    pub fn without_popularity(&self) -> Self {
        Self {
            duration: self.duration,
            min_popularity: None,
        }
    }
}
