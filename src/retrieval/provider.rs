//! Upstream provider abstraction
//!
//! Provides the traits a content source implements so the pipeline can
//! search and fetch without knowing which backend it talks to:
//! - `YtDlpProvider`: YouTube through the yt-dlp executable
//! - `ArchiveProvider`: Internet Archive HTTP APIs

use crate::error::TunecastResult;
use crate::model::{SearchFilters, Source, TrackRef};
use async_trait::async_trait;
use std::path::PathBuf;

/// A downloaded artifact and the metadata the provider resolved for it
#[derive(Debug, Clone)]
pub struct FetchedArtifact {
    pub path: PathBuf,
    pub track: TrackRef,
}

/// Search side of a content source
#[async_trait]
pub trait SearchProvider: Send + Sync {
    /// Query the source.
    ///
    /// May return fewer than `limit` items. Errors use the retrieval
    /// taxonomy (`NotFound`, `RateLimited`, `Timeout`, `Transport`).
    async fn search(
        &self,
        query: &str,
        limit: usize,
        filters: &SearchFilters,
    ) -> TunecastResult<Vec<TrackRef>>;

    /// Source tag used for cache keys
    fn source(&self) -> Source;
}

/// Download side of a content source
#[async_trait]
pub trait DownloadProvider: Send + Sync {
    /// Fetch one artifact by opaque identifier
    async fn fetch(&self, identifier: &str) -> TunecastResult<FetchedArtifact>;

    /// Whether `input` already is an opaque identifier rather than a
    /// free-text query
    fn is_identifier(&self, input: &str) -> bool {
        !input.is_empty() && input.len() <= 64 && !input.chars().any(char::is_whitespace)
    }

    /// Human-readable backend name for display
    fn provider_name(&self) -> &'static str;
}

/// A backend that can both search and download
pub trait MediaProvider: SearchProvider + DownloadProvider {}

impl<T: SearchProvider + DownloadProvider> MediaProvider for T {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::TunecastError;

    struct Stub;

    #[async_trait]
    impl DownloadProvider for Stub {
        async fn fetch(&self, identifier: &str) -> TunecastResult<FetchedArtifact> {
            Err(TunecastError::NotFound(identifier.to_string()))
        }

        fn provider_name(&self) -> &'static str {
            "stub"
        }
    }

    #[test]
    fn default_identifier_heuristic() {
        assert!(Stub.is_identifier("dQw4w9WgXcQ"));
        assert!(Stub.is_identifier("78_take-five_dave-brubeck"));
        assert!(!Stub.is_identifier("dave brubeck take five"));
        assert!(!Stub.is_identifier(""));
    }
}
