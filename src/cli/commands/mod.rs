//! CLI command implementations

pub mod cache;
pub mod config;
pub mod fetch;
pub mod moods;
pub mod run;
pub mod search;

pub use cache::execute as cache;
pub use config::execute as config;
pub use fetch::execute as fetch;
pub use moods::execute as moods;
pub use run::execute as run;
pub use search::execute as search;

use crate::cache::{FileStore, ResultCache};
use crate::config::schema::SourceKind;
use crate::config::{Config, ConfigManager};
use crate::error::{TunecastError, TunecastResult};
use crate::retrieval::{create_provider, PipelineSettings, RetrievalPipeline, YtDlpProvider};
use std::sync::Arc;

/// Open the result cache, on disk unless `persistent` is false
async fn open_cache(config: &Config, persistent: bool) -> TunecastResult<Arc<ResultCache>> {
    let ttl = config.cache.ttl();
    if !persistent {
        return Ok(Arc::new(ResultCache::in_memory(ttl)));
    }
    let store = FileStore::open(ConfigManager::cache_dir(config)).await?;
    Ok(Arc::new(ResultCache::new(Arc::new(store), ttl)))
}

/// Wire the configured provider, `cache` and retry settings together
fn build_pipeline(config: &Config, cache: Arc<ResultCache>) -> RetrievalPipeline {
    let provider = create_provider(&config.retrieval, ConfigManager::downloads_dir(config));
    RetrievalPipeline::new(
        provider,
        cache,
        PipelineSettings::from_config(&config.retrieval),
    )
}

/// Fail early when the configured downloader cannot run
async fn ensure_provider_available(config: &Config) -> TunecastResult<()> {
    if config.retrieval.source != SourceKind::Youtube {
        return Ok(());
    }
    let ytdlp = YtDlpProvider::new(&config.retrieval, ConfigManager::downloads_dir(config));
    if !ytdlp.is_available().await {
        return Err(TunecastError::ProviderUnavailable(format!(
            "{} not found or not runnable",
            config.retrieval.ytdlp_binary
        )));
    }
    Ok(())
}
