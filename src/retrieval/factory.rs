//! Provider factory
//!
//! Builds the backend selected by `retrieval.source`.

use crate::config::schema::{RetrievalConfig, SourceKind};
use crate::retrieval::archive::ArchiveProvider;
use crate::retrieval::provider::MediaProvider;
use crate::retrieval::ytdlp::YtDlpProvider;
use std::path::PathBuf;
use std::sync::Arc;

/// Create the configured provider writing artifacts to `downloads_dir`
pub fn create_provider(config: &RetrievalConfig, downloads_dir: PathBuf) -> Arc<dyn MediaProvider> {
    match config.source {
        SourceKind::Youtube => Arc::new(YtDlpProvider::new(config, downloads_dir)),
        SourceKind::Archive => Arc::new(ArchiveProvider::new(config, downloads_dir)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Source;

    #[test]
    fn source_follows_config() {
        let mut config = RetrievalConfig::default();
        let provider = create_provider(&config, PathBuf::from("/tmp"));
        assert_eq!(provider.source(), Source::YouTube);
        assert_eq!(provider.provider_name(), "yt-dlp");

        config.source = SourceKind::Archive;
        let provider = create_provider(&config, PathBuf::from("/tmp"));
        assert_eq!(provider.source(), Source::InternetArchive);
    }
}
