//! Retrieval pipeline
//!
//! Turns a free-text query or an upstream identifier into a local audio
//! artifact. Searches go through three tiers of decreasing strictness,
//! downloads consult the result cache first, and every download holds a
//! permit from a process-wide semaphore so upstream sees a bounded number
//! of concurrent fetches.
//!
//! Failures are values: `download` and `download_with_retry` always return
//! a `RetrievalResult`, never an error.

mod archive;
mod factory;
mod provider;
mod retry;
mod tier;
mod ytdlp;

pub use archive::ArchiveProvider;
pub use factory::create_provider;
pub use provider::{DownloadProvider, FetchedArtifact, MediaProvider, SearchProvider};
pub use retry::RetryPolicy;
pub use tier::{is_denylisted, quality_score, SearchTier};
pub use ytdlp::YtDlpProvider;

use crate::cache::ResultCache;
use crate::config::schema::RetrievalConfig;
use crate::error::{ErrorKind, TunecastError, TunecastResult};
use crate::model::{RetrievalError, RetrievalResult, SearchFilters, Source, TrackRef};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tracing::{debug, info, warn};

/// Candidates considered when a free-text query has to be resolved to an
/// identifier before downloading
const RESOLVE_LIMIT: usize = 5;

/// Shortest on-demand query accepted
const MIN_QUERY_CHARS: usize = 2;

/// Trim an on-demand query and check its length in characters
pub fn validate_query(query: &str, max_chars: usize) -> TunecastResult<String> {
    let query = query.trim();
    let chars = query.chars().count();
    if chars < MIN_QUERY_CHARS {
        return Err(TunecastError::InvalidInput(format!(
            "query too short, give at least {} characters",
            MIN_QUERY_CHARS
        )));
    }
    if chars > max_chars {
        return Err(TunecastError::InvalidInput(format!(
            "query too long ({} characters, limit {})",
            chars, max_chars
        )));
    }
    Ok(query.to_string())
}

/// Knobs of the pipeline that do not come from the providers
#[derive(Debug, Clone)]
pub struct PipelineSettings {
    pub retry: RetryPolicy,
    pub max_concurrent: usize,
    pub fetch_timeout: Duration,
    pub max_file_size_mb: u64,
    /// Filters used when a query is resolved for download
    pub filters: SearchFilters,
}

impl PipelineSettings {
    pub fn from_config(config: &RetrievalConfig) -> Self {
        Self {
            retry: RetryPolicy::from_config(config),
            max_concurrent: config.max_concurrent.max(1),
            fetch_timeout: config.download_timeout(),
            max_file_size_mb: config.max_file_size_mb,
            filters: config.search_filters(),
        }
    }
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self::from_config(&RetrievalConfig::default())
    }
}

/// Search + download front end shared by every station in the process
pub struct RetrievalPipeline {
    provider: Arc<dyn MediaProvider>,
    cache: Arc<ResultCache>,
    admission: Arc<Semaphore>,
    settings: PipelineSettings,
}

impl RetrievalPipeline {
    pub fn new(
        provider: Arc<dyn MediaProvider>,
        cache: Arc<ResultCache>,
        settings: PipelineSettings,
    ) -> Self {
        let admission = Arc::new(Semaphore::new(settings.max_concurrent.max(1)));
        Self {
            provider,
            cache,
            admission,
            settings,
        }
    }

    pub fn source(&self) -> Source {
        self.provider.source()
    }

    pub fn provider_name(&self) -> &'static str {
        self.provider.provider_name()
    }

    pub fn cache(&self) -> &Arc<ResultCache> {
        &self.cache
    }

    /// Filters used for station refills
    pub fn default_filters(&self) -> SearchFilters {
        self.settings.filters
    }

    /// Search through the strict, relaxed and minimal tiers in turn.
    ///
    /// Returns the first non-empty tier. A provider error on one tier is
    /// logged and the next tier is tried; exhausting all tiers yields an
    /// empty list.
    pub async fn search(&self, query: &str, limit: usize, filters: &SearchFilters) -> Vec<TrackRef> {
        for tier in SearchTier::all() {
            let provider_filters = tier.provider_filters(filters);
            let attempt = tokio::time::timeout(
                self.settings.fetch_timeout,
                self.provider.search(query, limit, &provider_filters),
            )
            .await
            .unwrap_or_else(|_| Err(TunecastError::Timeout(format!("search '{}'", query))));

            match attempt {
                Ok(items) => {
                    let found = items.len();
                    let refined = tier.refine(items, filters, limit);
                    if !refined.is_empty() {
                        info!(
                            query,
                            %tier,
                            found,
                            kept = refined.len(),
                            "Search tier produced results"
                        );
                        return refined;
                    }
                    debug!(query, %tier, found, "Search tier empty after filtering");
                }
                Err(e) => {
                    warn!(query, %tier, error = %e, "Search tier failed");
                }
            }
        }

        warn!(query, "All search tiers exhausted");
        Vec::new()
    }

    /// Single download attempt, consulting the cache first.
    ///
    /// Does not write to the cache; `download_with_retry` does that.
    pub async fn download(&self, input: &str) -> RetrievalResult {
        match self.download_inner(input, false).await {
            Ok((result, _)) => result,
            Err(e) => RetrievalResult::failure(e.kind(), e.to_string()),
        }
    }

    /// Download with bounded retries.
    ///
    /// Every attempt holds one admission permit for its duration. Between
    /// failed attempts the pipeline backs off linearly, using the larger
    /// rate-limit base when upstream reported throttling. Successful fresh
    /// results are cached under the input and under the resolved
    /// identifier.
    pub async fn download_with_retry(&self, input: &str) -> RetrievalResult {
        self.retry(input, false).await
    }

    /// Download a track picked from search results.
    ///
    /// A track that carries a provider identifier is fetched by that id
    /// without going through query resolution. Otherwise its artist and
    /// title are downloaded as free text.
    pub async fn download_track(&self, track: &TrackRef) -> RetrievalResult {
        match track.identifier.as_deref() {
            Some(id) => self.retry(id, true).await,
            None => {
                let query = track.download_target();
                self.retry(&query, false).await
            }
        }
    }

    async fn retry(&self, input: &str, known_id: bool) -> RetrievalResult {
        let max_attempts = self.settings.retry.max_attempts.max(1);
        let mut last_error: Option<RetrievalError> = None;
        let mut attempts = 0;

        for attempt in 1..=max_attempts {
            attempts = attempt;
            let outcome = {
                let _permit = match self.admission.acquire().await {
                    Ok(permit) => permit,
                    Err(_) => {
                        return RetrievalResult::failure(
                            ErrorKind::Transport,
                            "download admission closed",
                        )
                    }
                };
                self.download_inner(input, known_id).await
            };

            let error = match outcome {
                Ok((result, cached)) if result.is_success() => {
                    if !cached {
                        self.remember(input, known_id, &result).await;
                    }
                    return result;
                }
                Ok((result, _)) => result.error().cloned().unwrap_or(RetrievalError {
                    kind: ErrorKind::Transport,
                    message: "download failed without detail".to_string(),
                }),
                Err(e) => RetrievalError {
                    kind: e.kind(),
                    message: e.to_string(),
                },
            };

            warn!(
                input,
                attempt,
                max_attempts,
                kind = %error.kind,
                error = %error.message,
                "Download attempt failed"
            );

            let rate_limited = error.kind == ErrorKind::RateLimited;
            let retryable = error.kind.is_retryable();
            last_error = Some(error);

            if !retryable {
                break;
            }
            if attempt < max_attempts {
                let pause = self.settings.retry.backoff(attempt, rate_limited);
                debug!(input, pause_ms = pause.as_millis() as u64, "Backing off");
                tokio::time::sleep(pause).await;
            }
        }

        let (kind, message) = match last_error {
            Some(e) => (e.kind, e.to_string()),
            None => (ErrorKind::Transport, "no attempt made".to_string()),
        };
        RetrievalResult::failure(kind, format!("failed after {} attempts: {}", attempts, message))
    }

    async fn remember(&self, input: &str, known_id: bool, result: &RetrievalResult) {
        let source = self.source();
        self.cache.set(&self.input_key(input, known_id), source, result).await;

        if let Some(id) = result.track().and_then(|t| t.identifier.as_deref()) {
            if id != input {
                self.cache.set(id, source, result).await;
            }
        }
    }

    /// Cache key for an input: identifiers key on themselves, free text is
    /// namespaced so it can never collide with an identifier
    fn input_key(&self, input: &str, known_id: bool) -> String {
        let trimmed = input.trim();
        if known_id || self.provider.is_identifier(trimmed) {
            trimmed.to_string()
        } else {
            format!("search:{}", trimmed)
        }
    }

    /// One attempt. The flag reports whether the result came from cache.
    async fn download_inner(
        &self,
        input: &str,
        known_id: bool,
    ) -> TunecastResult<(RetrievalResult, bool)> {
        let input = input.trim();
        if input.is_empty() {
            return Err(TunecastError::NotFound("empty download input".to_string()));
        }

        let source = self.source();
        if let Some(hit) = self.cache.get(&self.input_key(input, known_id), source).await {
            debug!(input, "Cache hit");
            return Ok((hit, true));
        }

        let identifier = if known_id || self.provider.is_identifier(input) {
            input.to_string()
        } else {
            let filters = self.settings.filters;
            let candidates = self.search(input, RESOLVE_LIMIT, &filters).await;
            let resolved = candidates
                .into_iter()
                .find_map(|t| t.identifier)
                .ok_or_else(|| TunecastError::NotFound(format!("no match for '{}'", input)))?;

            if let Some(hit) = self.cache.get(&resolved, source).await {
                debug!(input, identifier = %resolved, "Cache hit after resolving");
                return Ok((hit, true));
            }
            resolved
        };

        let fetched = tokio::time::timeout(
            self.settings.fetch_timeout,
            self.provider.fetch(&identifier),
        )
        .await
        .map_err(|_| {
            TunecastError::Timeout(format!(
                "fetching {} took longer than {}s",
                identifier,
                self.settings.fetch_timeout.as_secs()
            ))
        })??;

        self.enforce_quota(&fetched).await?;

        info!(
            identifier = %identifier,
            track = %fetched.track.display_name(),
            "Downloaded"
        );
        Ok((RetrievalResult::success(fetched.path, fetched.track), false))
    }

    /// Reject and delete artifacts above the size limit
    async fn enforce_quota(&self, fetched: &FetchedArtifact) -> TunecastResult<()> {
        let meta = tokio::fs::metadata(&fetched.path).await.map_err(|e| {
            TunecastError::io(format!("reading {}", fetched.path.display()), e)
        })?;

        let limit_bytes = self.settings.max_file_size_mb.saturating_mul(1024 * 1024);
        if meta.len() > limit_bytes {
            if let Err(e) = tokio::fs::remove_file(&fetched.path).await {
                warn!(path = %fetched.path.display(), error = %e, "Could not remove oversized artifact");
            }
            return Err(TunecastError::QuotaExceeded {
                size_mb: meta.len() / (1024 * 1024),
                limit_mb: self.settings.max_file_size_mb,
            });
        }
        Ok(())
    }
}
