//! Configuration schema for Tunecast
//!
//! Configuration is stored at `~/.config/tunecast/config.toml`

use crate::model::{DurationBounds, SearchFilters};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

/// Root configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// General settings
    pub general: GeneralConfig,

    /// Playback loop settings
    pub scheduler: SchedulerConfig,

    /// Search and download settings
    pub retrieval: RetrievalConfig,

    /// Result cache settings
    pub cache: CacheConfig,

    /// Genre voting settings
    pub voting: VotingConfig,

    /// Genre pool, qualifiers and moods
    pub library: LibraryConfig,
}

/// General application settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Log format: "text" or "json"
    pub log_format: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_format: "text".to_string(),
        }
    }
}

/// How long the scheduler waits after publishing a track
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "policy", rename_all = "snake_case")]
pub enum CooldownPolicy {
    /// Fixed pause regardless of the track
    Fixed { secs: u64 },
    /// Track length plus padding, capped at `max_secs`
    TrackDuration { padding_secs: u64, max_secs: u64 },
    /// Wait until skipped or stopped
    SkipOnly,
}

impl CooldownPolicy {
    /// Wait for a track of `track_secs`, or `None` for an open-ended wait
    pub fn wait_for(&self, track_secs: u32) -> Option<Duration> {
        match *self {
            Self::Fixed { secs } => Some(Duration::from_secs(secs)),
            Self::TrackDuration {
                padding_secs,
                max_secs,
            } => Some(Duration::from_secs(
                (u64::from(track_secs) + padding_secs).min(max_secs),
            )),
            Self::SkipOnly => None,
        }
    }
}

impl Default for CooldownPolicy {
    fn default() -> Self {
        Self::Fixed { secs: 90 }
    }
}

/// Playback loop configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    /// Consecutive download failures before the station stops itself
    pub error_budget: u32,

    /// Refill the playlist buffer when it holds fewer candidates than this
    pub low_water: usize,

    /// Candidates requested per refill search
    pub fill_size: usize,

    /// Pause after a refill that found nothing
    pub empty_backoff_secs: u64,

    /// Pause after a failed download
    pub failure_backoff_secs: u64,

    /// Identifiers remembered to avoid repeats
    pub recency_capacity: usize,

    /// Delete the artifact once its cooldown ends
    pub remove_after_publish: bool,

    /// Post-publish wait
    pub cooldown: CooldownPolicy,
}

impl SchedulerConfig {
    pub fn empty_backoff(&self) -> Duration {
        Duration::from_secs(self.empty_backoff_secs)
    }

    pub fn failure_backoff(&self) -> Duration {
        Duration::from_secs(self.failure_backoff_secs)
    }
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            error_budget: 10,
            low_water: 3,
            fill_size: 30,
            empty_backoff_secs: 10,
            failure_backoff_secs: 30,
            recency_capacity: 500,
            remove_after_publish: false,
            cooldown: CooldownPolicy::default(),
        }
    }
}

/// Which provider backs the retrieval pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    Youtube,
    Archive,
}

/// Retrieval configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrievalConfig {
    /// Provider backing search and download
    pub source: SourceKind,

    /// Download attempts per track
    pub max_retries: u32,

    /// Linear backoff base between attempts
    pub retry_delay_secs: f64,

    /// Backoff base when the provider reports throttling
    pub rate_limit_delay_secs: f64,

    /// Concurrent downloads admitted across all stations
    pub max_concurrent: usize,

    /// Per-fetch timeout
    pub download_timeout_secs: u64,

    /// Largest artifact accepted
    pub max_file_size_mb: u64,

    /// Shortest track considered
    pub min_duration_secs: u32,

    /// Longest track considered
    pub max_duration_secs: u32,

    /// Minimum view count for strict searches
    pub min_popularity: Option<u64>,

    /// yt-dlp executable
    pub ytdlp_binary: String,

    /// Netscape cookie jar handed to yt-dlp
    pub cookies_file: Option<PathBuf>,

    /// Where artifacts are written (default: state dir)
    pub downloads_dir: Option<PathBuf>,

    /// Longest on-demand query accepted, in characters
    pub max_query_chars: usize,
}

impl RetrievalConfig {
    pub fn retry_delay(&self) -> Duration {
        Duration::from_secs_f64(self.retry_delay_secs.max(0.0))
    }

    pub fn rate_limit_delay(&self) -> Duration {
        Duration::from_secs_f64(self.rate_limit_delay_secs.max(0.0))
    }

    pub fn download_timeout(&self) -> Duration {
        Duration::from_secs(self.download_timeout_secs)
    }

    /// Filters for a strict search
    pub fn search_filters(&self) -> SearchFilters {
        SearchFilters {
            duration: DurationBounds::new(self.min_duration_secs, self.max_duration_secs),
            min_popularity: self.min_popularity,
        }
    }
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            source: SourceKind::Youtube,
            max_retries: 5,
            retry_delay_secs: 5.0,
            rate_limit_delay_secs: 60.0,
            max_concurrent: 3,
            download_timeout_secs: 120,
            max_file_size_mb: 49,
            min_duration_secs: 60,
            max_duration_secs: 1200,
            min_popularity: Some(10_000),
            ytdlp_binary: "yt-dlp".to_string(),
            cookies_file: None,
            downloads_dir: None,
            max_query_chars: 150,
        }
    }
}

/// Result cache configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Entry lifetime in days
    pub ttl_days: u32,

    /// Interval of the background sweep (0 = disabled)
    pub sweep_interval_secs: u64,

    /// Cache directory (default: state dir)
    pub dir: Option<PathBuf>,
}

impl CacheConfig {
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(u64::from(self.ttl_days) * 86_400)
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl_days: 7,
            sweep_interval_secs: 3600,
            dir: None,
        }
    }
}

/// Voting configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VotingConfig {
    /// Genres offered per poll
    pub sample_size: usize,

    /// Poll length
    pub duration_secs: u64,

    /// How long a chosen mode lasts before the next poll
    pub mode_ttl_secs: u64,
}

impl VotingConfig {
    pub fn duration(&self) -> Duration {
        Duration::from_secs(self.duration_secs)
    }

    pub fn mode_ttl(&self) -> Duration {
        Duration::from_secs(self.mode_ttl_secs)
    }
}

impl Default for VotingConfig {
    fn default() -> Self {
        Self {
            sample_size: 16,
            duration_secs: 60,
            mode_ttl_secs: 3600,
        }
    }
}

/// A genre and its relative weight inside a mood
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeightedGenre {
    pub genre: String,
    pub weight: u32,
}

impl WeightedGenre {
    pub fn new(genre: &str, weight: u32) -> Self {
        Self {
            genre: genre.to_string(),
            weight,
        }
    }
}

/// Genre pool, search qualifiers and mood table
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LibraryConfig {
    /// Genres offered in votes and used when no mode is set
    pub genres: Vec<String>,

    /// Suffixes mixed into searches to diversify results
    pub qualifiers: Vec<String>,

    /// Mood name to weighted genres
    pub moods: BTreeMap<String, Vec<WeightedGenre>>,
}

impl Default for LibraryConfig {
    fn default() -> Self {
        let genres = [
            "music",
            "chill",
            "lofi",
            "jazz",
            "rock",
            "pop",
            "electronic",
            "ambient",
            "русский рок",
            "русский поп",
            "шансон",
            "бардовская песня",
            "эстрада",
            "фолк",
            "классика",
            "рэп",
            "инди",
            "метал",
            "блюз",
            "кантри",
        ]
        .iter()
        .map(|g| g.to_string())
        .collect();

        let mut moods = BTreeMap::new();
        moods.insert(
            "chill".to_string(),
            vec![
                WeightedGenre::new("lofi", 5),
                WeightedGenre::new("ambient", 3),
                WeightedGenre::new("jazz", 2),
            ],
        );
        moods.insert(
            "energetic".to_string(),
            vec![
                WeightedGenre::new("rock", 4),
                WeightedGenre::new("electronic", 4),
                WeightedGenre::new("метал", 2),
            ],
        );
        moods.insert(
            "sad".to_string(),
            vec![
                WeightedGenre::new("блюз", 4),
                WeightedGenre::new("инди", 3),
                WeightedGenre::new("бардовская песня", 2),
            ],
        );
        moods.insert(
            "happy".to_string(),
            vec![
                WeightedGenre::new("pop", 5),
                WeightedGenre::new("эстрада", 2),
                WeightedGenre::new("кантри", 2),
            ],
        );
        moods.insert(
            "focus".to_string(),
            vec![
                WeightedGenre::new("классика", 4),
                WeightedGenre::new("ambient", 3),
                WeightedGenre::new("lofi", 3),
            ],
        );

        Self {
            genres,
            qualifiers: vec![
                "official audio".to_string(),
                "music".to_string(),
                "audio".to_string(),
            ],
            moods,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_serializes() {
        let config = Config::default();
        let toml = toml::to_string_pretty(&config).unwrap();
        assert!(toml.contains("[scheduler]"));
        assert!(toml.contains("[retrieval]"));
        assert!(toml.contains("policy = \"fixed\""));
    }

    #[test]
    fn config_deserializes_empty() {
        let config: Config = toml::from_str("").unwrap();
        assert_eq!(config.scheduler.error_budget, 10);
        assert_eq!(config.voting.sample_size, 16);
        assert_eq!(config.library.genres.len(), 20);
    }

    #[test]
    fn config_deserializes_partial() {
        let toml = r#"
            [scheduler]
            error_budget = 3
            cooldown = { policy = "track_duration", padding_secs = 5, max_secs = 600 }
        "#;
        let config: Config = toml::from_str(toml).unwrap();
        assert_eq!(config.scheduler.error_budget, 3);
        assert_eq!(config.scheduler.low_water, 3); // default preserved
        assert_eq!(
            config.scheduler.cooldown,
            CooldownPolicy::TrackDuration {
                padding_secs: 5,
                max_secs: 600
            }
        );
    }

    #[test]
    fn cooldown_policies() {
        assert_eq!(
            CooldownPolicy::Fixed { secs: 90 }.wait_for(300),
            Some(Duration::from_secs(90))
        );
        let by_track = CooldownPolicy::TrackDuration {
            padding_secs: 10,
            max_secs: 200,
        };
        assert_eq!(by_track.wait_for(100), Some(Duration::from_secs(110)));
        assert_eq!(by_track.wait_for(500), Some(Duration::from_secs(200)));
        assert_eq!(CooldownPolicy::SkipOnly.wait_for(100), None);
    }

    #[test]
    fn every_mood_genre_is_weighted() {
        let library = LibraryConfig::default();
        for (mood, genres) in &library.moods {
            assert!(!genres.is_empty(), "{mood} has no genres");
            assert!(genres.iter().all(|g| g.weight > 0));
        }
    }
}
