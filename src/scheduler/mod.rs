//! Playback scheduler
//!
//! One `PlaybackScheduler` drives one station. Its loop, per iteration:
//!
//! 1. start a genre vote when the mode has run out
//! 2. discard the playlist if the mode changed, refill it when low
//! 3. pop a random candidate that was not played recently
//! 4. download it through the shared `RetrievalPipeline`
//! 5. publish and wait for the cooldown, a skip or a stop
//!
//! Consecutive download failures are counted against an `ErrorBudget`;
//! exhausting it stops the station with a single fatal notice.
//!
//! Operator commands are methods on the scheduler and return
//! `TunecastResult` or `bool`; none of them panic.

mod budget;
mod cooldown;
mod presenter;

pub use budget::ErrorBudget;
pub use cooldown::WaitOutcome;
pub use presenter::{format_duration, CaptionContext, ConsolePresenter, Presenter};

use crate::config::schema::{SchedulerConfig, VotingConfig};
use crate::error::{TunecastError, TunecastResult};
use crate::mode::{ModeController, ModeState};
use crate::model::TrackRef;
use crate::playlist::PlaylistBuffer;
use crate::retrieval::RetrievalPipeline;
use crate::voting::{VoteSnapshot, VoterId, VotingCoordinator};
use chrono::Utc;
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, Notify};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Text of the one notice sent when the error budget runs out
pub const FATAL_NOTICE: &str = "Radio stopped after repeated download errors";

/// Extra time a vote hold lasts beyond the vote itself
const VOTE_HOLD_GRACE: Duration = Duration::from_secs(5);

/// Point-in-time view of a station
#[derive(Debug, Clone, Serialize)]
pub struct StationStatus {
    pub running: bool,
    pub channel: Option<String>,
    pub mode: Option<ModeState>,
    pub vote: Option<VoteSnapshot>,
    pub now_playing: Option<TrackRef>,
    pub consecutive_failures: u32,
    pub error_budget: u32,
}

struct RunHandle {
    channel: String,
    stop: CancellationToken,
    skip: Arc<Notify>,
    done: CancellationToken,
    task: JoinHandle<()>,
}

struct Shared {
    pipeline: Arc<RetrievalPipeline>,
    presenter: Arc<dyn Presenter>,
    mode: Arc<Mutex<ModeController>>,
    voting: VotingCoordinator,
    budget: ErrorBudget,
    config: SchedulerConfig,
    voting_config: VotingConfig,
    now_playing: Mutex<Option<TrackRef>>,
}

/// Autonomous station loop plus its operator surface
pub struct PlaybackScheduler {
    shared: Arc<Shared>,
    run: Mutex<Option<RunHandle>>,
}

impl PlaybackScheduler {
    pub fn new(
        pipeline: Arc<RetrievalPipeline>,
        presenter: Arc<dyn Presenter>,
        mode: ModeController,
        config: SchedulerConfig,
        voting_config: VotingConfig,
    ) -> Self {
        let mode = Arc::new(Mutex::new(mode));
        let voting = VotingCoordinator::new(mode.clone(), voting_config.mode_ttl());
        Self {
            shared: Arc::new(Shared {
                pipeline,
                presenter,
                mode,
                voting,
                budget: ErrorBudget::new(config.error_budget),
                config,
                voting_config,
                now_playing: Mutex::new(None),
            }),
            run: Mutex::new(None),
        }
    }

    /// Start the loop for `channel`
    pub async fn start(&self, channel: &str) -> TunecastResult<()> {
        let mut run = self.run.lock().await;
        if let Some(handle) = run.as_ref() {
            if !handle.done.is_cancelled() {
                return Err(TunecastError::AlreadyRunning(handle.channel.clone()));
            }
        }

        self.shared.budget.reset();
        let stop = CancellationToken::new();
        let skip = Arc::new(Notify::new());
        let done = CancellationToken::new();

        let task = tokio::spawn({
            let shared = self.shared.clone();
            let channel = channel.to_string();
            let stop = stop.clone();
            let skip = skip.clone();
            let done = done.clone();
            async move {
                let _done = done.drop_guard();
                station_loop(shared, channel, stop, skip).await;
            }
        });

        info!(channel, "Station started");
        *run = Some(RunHandle {
            channel: channel.to_string(),
            stop,
            skip,
            done,
            task,
        });
        Ok(())
    }

    /// Stop the loop and wait for it to return.
    ///
    /// Interrupts the current wait, then cancels any vote the loop left
    /// running. Also reaps a loop that already ended on its own.
    pub async fn stop(&self) -> TunecastResult<()> {
        let handle = self.run.lock().await.take().ok_or(TunecastError::NotRunning)?;

        handle.stop.cancel();
        if let Err(e) = handle.task.await {
            warn!(channel = %handle.channel, error = %e, "Station task ended abnormally");
        }
        self.shared.voting.cancel().await;
        *self.shared.now_playing.lock().await = None;

        info!(channel = %handle.channel, "Station stopped");
        Ok(())
    }

    /// Cut the current cooldown short. False when not running.
    pub async fn skip(&self) -> bool {
        match self.run.lock().await.as_ref() {
            Some(handle) if !handle.done.is_cancelled() => {
                handle.skip.notify_one();
                debug!(channel = %handle.channel, "Skip requested");
                true
            }
            _ => false,
        }
    }

    pub async fn set_genre(&self, genre: &str) -> TunecastResult<()> {
        self.shared
            .voting
            .override_mode(|mode, ttl| mode.set_genre(genre, ttl))
            .await
    }

    pub async fn set_mood(&self, mood: &str) -> TunecastResult<()> {
        self.shared
            .voting
            .override_mode(|mode, ttl| mode.set_mood(mood, ttl))
            .await
    }

    pub async fn set_artist(&self, artist: &str) -> TunecastResult<()> {
        self.shared
            .voting
            .override_mode(|mode, ttl| mode.set_artist(artist, ttl))
            .await
    }

    pub async fn register_vote(&self, genre: &str, voter: VoterId) -> bool {
        self.shared.voting.register_vote(genre, voter).await
    }

    /// Decide the running vote for `genre`, whatever the ballots say
    pub async fn force_vote(&self, genre: &str) -> TunecastResult<()> {
        self.shared.voting.force(genre).await
    }

    /// Close the running vote now. Returns the winner.
    pub async fn finish_vote(&self) -> TunecastResult<String> {
        self.shared
            .voting
            .resolve()
            .await
            .ok_or(TunecastError::NoActiveVote)
    }

    pub async fn is_running(&self) -> bool {
        self.run
            .lock()
            .await
            .as_ref()
            .is_some_and(|handle| !handle.done.is_cancelled())
    }

    /// Resolve once the current loop has returned, for any reason
    pub async fn finished(&self) {
        let done = self.run.lock().await.as_ref().map(|h| h.done.clone());
        if let Some(done) = done {
            done.cancelled().await;
        }
    }

    pub async fn status(&self) -> StationStatus {
        let (running, channel) = match self.run.lock().await.as_ref() {
            Some(handle) => (!handle.done.is_cancelled(), Some(handle.channel.clone())),
            None => (false, None),
        };
        let mode = self.shared.mode.lock().await.state().cloned();

        StationStatus {
            running,
            channel,
            mode,
            vote: self.shared.voting.snapshot().await,
            now_playing: self.shared.now_playing.lock().await.clone(),
            consecutive_failures: self.shared.budget.failures(),
            error_budget: self.shared.budget.ceiling(),
        }
    }
}

async fn notify(shared: &Shared, text: &str) {
    if let Err(e) = shared.presenter.notify(text).await {
        warn!(error = %e, "Presenter notify failed");
    }
}

/// Start a vote if the mode ran out and none is running
async fn maybe_start_vote(shared: &Shared) {
    let pool = {
        let mode = shared.mode.lock().await;
        if !mode.is_expired(Utc::now()) {
            return;
        }
        mode.genre_pool().to_vec()
    };

    let duration = shared.voting_config.duration();
    let Some(candidates) = shared
        .voting
        .start(&pool, shared.voting_config.sample_size, duration)
        .await
    else {
        return;
    };

    let hold = chrono::Duration::from_std(duration + VOTE_HOLD_GRACE)
        .ok()
        .and_then(|d| Utc::now().checked_add_signed(d))
        .unwrap_or(chrono::DateTime::<Utc>::MAX_UTC);
    shared.mode.lock().await.defer_expiry(hold);

    notify(
        shared,
        &format!(
            "Vote for the next genre ({}s): {}",
            duration.as_secs(),
            candidates.join(", ")
        ),
    )
    .await;
}

async fn remove_artifact(path: PathBuf) {
    match tokio::fs::remove_file(&path).await {
        Ok(()) => debug!(path = %path.display(), "Artifact removed"),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => warn!(path = %path.display(), error = %e, "Could not remove artifact"),
    }
}

async fn station_loop(
    shared: Arc<Shared>,
    channel: String,
    stop: CancellationToken,
    skip: Arc<Notify>,
) {
    let config = &shared.config;
    let mut buffer = PlaylistBuffer::new(config.recency_capacity);

    notify(&shared, "Radio started").await;

    while !stop.is_cancelled() {
        maybe_start_vote(&shared).await;

        let invalidated = shared.mode.lock().await.take_invalidation();
        if invalidated {
            buffer.clear();
            if let Some(state) = shared.mode.lock().await.state().cloned() {
                notify(&shared, &format!("Now playing {}: {}", state.kind, state.value)).await;
            }
        }

        if buffer.len() < config.low_water {
            let query = shared.mode.lock().await.current_query();
            let filters = shared.pipeline.default_filters();
            let pipeline = &shared.pipeline;

            let added = tokio::select! {
                _ = stop.cancelled() => break,
                added = buffer.ensure_filled(config.low_water, || {
                    pipeline.search(&query, config.fill_size, &filters)
                }) => added,
            };
            debug!(channel = %channel, query = %query, added, "Refill finished");

            if buffer.is_empty() {
                warn!(channel = %channel, query = %query, "Refill found nothing, backing off");
                if !cooldown::backoff(config.empty_backoff(), &stop).await {
                    break;
                }
                continue;
            }
        }

        let Some(track) = buffer.pop_random() else {
            continue;
        };
        let key = track.dedup_key();
        if buffer.was_recently_played(&key) {
            continue;
        }
        buffer.mark_played(&key);

        let result = tokio::select! {
            _ = stop.cancelled() => break,
            result = shared.pipeline.download_track(&track) => result,
        };

        let (path, played) = match (result.artifact_path(), result.track()) {
            (Some(path), Some(played)) if result.is_success() => (path.to_path_buf(), played.clone()),
            _ => {
                let failures = shared.budget.record_failure();
                let reason = result
                    .error()
                    .map(|e| e.to_string())
                    .unwrap_or_else(|| "unknown".to_string());
                warn!(
                    channel = %channel,
                    track = %track.display_name(),
                    failures,
                    ceiling = shared.budget.ceiling(),
                    error = %reason,
                    "Download failed"
                );

                if shared.budget.is_exhausted() {
                    error!(channel = %channel, failures, "Error budget exhausted, stopping station");
                    notify(&shared, FATAL_NOTICE).await;
                    break;
                }
                if !cooldown::backoff(config.failure_backoff(), &stop).await {
                    break;
                }
                continue;
            }
        };

        shared.budget.reset();
        *shared.now_playing.lock().await = Some(played.clone());

        let context = CaptionContext {
            channel: channel.clone(),
            mode: shared.mode.lock().await.state().cloned(),
            source: played.source,
        };
        if let Err(e) = shared.presenter.publish(&path, &played, &context).await {
            warn!(channel = %channel, error = %e, "Publish failed");
        } else {
            info!(channel = %channel, track = %played.display_name(), "Published");
        }

        let outcome = cooldown::cooldown(
            config.cooldown.wait_for(played.duration_seconds),
            &skip,
            &stop,
        )
        .await;
        debug!(channel = %channel, ?outcome, "Cooldown ended");

        if config.remove_after_publish {
            remove_artifact(path).await;
        }
        if outcome == WaitOutcome::Stopped {
            break;
        }
    }

    shared.voting.cancel().await;
    *shared.now_playing.lock().await = None;
    info!(channel = %channel, "Station loop finished");
}
