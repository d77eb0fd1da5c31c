//! YouTube provider backed by the yt-dlp executable
//!
//! Search runs `yt-dlp --flat-playlist --dump-json ytsearchN:<query>` and
//! reads one JSON object per line. Fetch extracts audio to
//! `<downloads_dir>/<id>.mp3` and reads the resolved metadata from the
//! same JSON dump. Processes are killed when the calling future is
//! dropped, so the pipeline's timeout really stops the download.

use crate::config::schema::RetrievalConfig;
use crate::error::{TunecastError, TunecastResult};
use crate::model::{SearchFilters, Source, TrackRef};
use crate::retrieval::provider::{DownloadProvider, FetchedArtifact, SearchProvider};
use async_trait::async_trait;
use serde::Deserialize;
use std::path::PathBuf;
use std::process::Stdio;
use tokio::process::Command;
use tracing::debug;

/// Lines of yt-dlp output kept in error messages
const ERROR_TAIL_LINES: usize = 5;

const WATCH_URL: &str = "https://www.youtube.com/watch?v=";

/// One entry of `--dump-json` output. Flat search results carry a subset
/// of these fields.
#[derive(Debug, Deserialize)]
struct YtDlpEntry {
    id: Option<String>,
    title: Option<String>,
    channel: Option<String>,
    uploader: Option<String>,
    duration: Option<f64>,
    view_count: Option<u64>,
}

impl YtDlpEntry {
    fn into_track(self) -> Option<TrackRef> {
        let id = self.id.filter(|id| !id.is_empty())?;
        let artist = self
            .channel
            .or(self.uploader)
            .unwrap_or_else(|| "Unknown Artist".to_string());
        Some(TrackRef::new(
            self.title.unwrap_or_else(|| "Unknown Title".to_string()),
            artist,
            self.duration.map(|d| d.max(0.0) as u32).unwrap_or(0),
            Source::YouTube,
            Some(id),
        ))
    }
}

/// `SearchProvider` + `DownloadProvider` over yt-dlp
pub struct YtDlpProvider {
    binary: String,
    downloads_dir: PathBuf,
    cookies_file: Option<PathBuf>,
    max_file_size_mb: u64,
}

impl YtDlpProvider {
    pub fn new(config: &RetrievalConfig, downloads_dir: PathBuf) -> Self {
        Self {
            binary: config.ytdlp_binary.clone(),
            downloads_dir,
            cookies_file: config.cookies_file.clone(),
            max_file_size_mb: config.max_file_size_mb,
        }
    }

    /// Check if the yt-dlp executable can be run
    pub async fn is_available(&self) -> bool {
        Command::new(&self.binary)
            .arg("--version")
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .await
            .map(|s| s.success())
            .unwrap_or(false)
    }

    fn search_args(&self, query: &str, limit: usize) -> Vec<String> {
        let mut args = vec![
            "--flat-playlist".to_string(),
            "--dump-json".to_string(),
            "--ignore-errors".to_string(),
            "--no-warnings".to_string(),
            "--force-ipv4".to_string(),
        ];
        args.extend(self.cookie_args());
        args.push(format!("ytsearch{}:{}", limit.max(1), query));
        args
    }

    fn fetch_args(&self, identifier: &str) -> Vec<String> {
        let template = self.downloads_dir.join("%(id)s.%(ext)s");
        let mut args = vec![
            "--format".to_string(),
            "bestaudio/best".to_string(),
            "--extract-audio".to_string(),
            "--audio-format".to_string(),
            "mp3".to_string(),
            "--audio-quality".to_string(),
            "192K".to_string(),
            "--no-playlist".to_string(),
            "--max-filesize".to_string(),
            format!("{}M", self.max_file_size_mb),
            "--socket-timeout".to_string(),
            "30".to_string(),
            "--force-ipv4".to_string(),
            "--output".to_string(),
            template.to_string_lossy().into_owned(),
            "--dump-json".to_string(),
            "--no-simulate".to_string(),
            "--no-warnings".to_string(),
        ];
        args.extend(self.cookie_args());
        args.push("--".to_string());
        args.push(format!("{}{}", WATCH_URL, identifier));
        args
    }

    fn cookie_args(&self) -> Vec<String> {
        match &self.cookies_file {
            Some(path) if path.exists() => {
                vec!["--cookies".to_string(), path.to_string_lossy().into_owned()]
            }
            _ => Vec::new(),
        }
    }

    /// Execute yt-dlp and return the output
    async fn exec(&self, args: &[String]) -> TunecastResult<std::process::Output> {
        debug!(binary = %self.binary, ?args, "Executing");

        Command::new(&self.binary)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| match e.kind() {
                std::io::ErrorKind::NotFound => TunecastError::ProviderUnavailable(format!(
                    "{} not found on PATH",
                    self.binary
                )),
                _ => TunecastError::command_failed(self.binary.clone(), e),
            })
    }

    fn artifact_path(&self, identifier: &str) -> PathBuf {
        self.downloads_dir.join(format!("{}.mp3", identifier))
    }
}

fn parse_entries(stdout: &str) -> Vec<YtDlpEntry> {
    stdout
        .lines()
        .map(str::trim)
        .filter(|line| line.starts_with('{'))
        .filter_map(|line| serde_json::from_str::<YtDlpEntry>(line).ok())
        .collect()
}

fn admits(view_count: Option<u64>, track: &TrackRef, filters: &SearchFilters) -> bool {
    if !filters.duration.admits(track.duration_seconds) {
        return false;
    }
    // Unknown view counts pass; flat results do not always carry them
    match (filters.min_popularity, view_count) {
        (Some(min), Some(views)) => views >= min,
        _ => true,
    }
}

fn tail(text: &str) -> String {
    let lines: Vec<&str> = text.lines().filter(|l| !l.trim().is_empty()).collect();
    let start = lines.len().saturating_sub(ERROR_TAIL_LINES);
    lines[start..].join("\n")
}

/// Pull the byte count out of
/// "File is larger than max-filesize (123 bytes > 45 bytes)"
fn oversize_mb(output: &str) -> Option<u64> {
    let after = output.split("max-filesize (").nth(1)?;
    let digits: String = after.chars().take_while(|c| c.is_ascii_digit()).collect();
    digits.parse::<u64>().ok().map(|bytes| bytes / (1024 * 1024))
}

/// Map yt-dlp output to the retrieval error taxonomy
fn classify_failure(output: &str, limit_mb: u64) -> TunecastError {
    let lowered = output.to_lowercase();

    if lowered.contains("larger than max-filesize") {
        return TunecastError::QuotaExceeded {
            size_mb: oversize_mb(output).unwrap_or(limit_mb.saturating_add(1)),
            limit_mb,
        };
    }

    let throttled = ["http error 429", "too many requests", "rate-limit", "rate limit", "not a bot"];
    if throttled.iter().any(|needle| lowered.contains(needle)) {
        return TunecastError::RateLimited(tail(output));
    }

    if lowered.contains("timed out") {
        return TunecastError::Timeout(tail(output));
    }

    let missing = [
        "video unavailable",
        "private video",
        "this video is not available",
        "has been removed",
        "no video formats",
    ];
    if missing.iter().any(|needle| lowered.contains(needle)) {
        return TunecastError::NotFound(tail(output));
    }

    TunecastError::Transport(tail(output))
}

#[async_trait]
impl SearchProvider for YtDlpProvider {
    async fn search(
        &self,
        query: &str,
        limit: usize,
        filters: &SearchFilters,
    ) -> TunecastResult<Vec<TrackRef>> {
        let output = self.exec(&self.search_args(query, limit)).await?;
        let stdout = String::from_utf8_lossy(&output.stdout);
        let entries = parse_entries(&stdout);

        if entries.is_empty() && !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(classify_failure(&stderr, self.max_file_size_mb));
        }

        let tracks = entries
            .into_iter()
            .filter_map(|entry| {
                let views = entry.view_count;
                let track = entry.into_track()?;
                admits(views, &track, filters).then_some(track)
            })
            .collect();

        Ok(tracks)
    }

    fn source(&self) -> Source {
        Source::YouTube
    }
}

#[async_trait]
impl DownloadProvider for YtDlpProvider {
    async fn fetch(&self, identifier: &str) -> TunecastResult<FetchedArtifact> {
        if !self.is_identifier(identifier) {
            return Err(TunecastError::NotFound(format!(
                "'{}' is not a video id",
                identifier
            )));
        }

        let output = self.exec(&self.fetch_args(identifier)).await?;
        let stdout = String::from_utf8_lossy(&output.stdout);
        let stderr = String::from_utf8_lossy(&output.stderr);

        if !output.status.success() {
            return Err(classify_failure(&stderr, self.max_file_size_mb));
        }

        let path = self.artifact_path(identifier);
        if !tokio::fs::try_exists(&path).await.unwrap_or(false) {
            // yt-dlp exits 0 when it skips an oversized file
            let combined = format!("{}\n{}", stdout, stderr);
            return Err(match classify_failure(&combined, self.max_file_size_mb) {
                TunecastError::Transport(_) => TunecastError::Transport(format!(
                    "yt-dlp finished but {} was not created",
                    path.display()
                )),
                other => other,
            });
        }

        let track = parse_entries(&stdout)
            .into_iter()
            .find_map(YtDlpEntry::into_track)
            .unwrap_or_else(|| {
                TrackRef::new(
                    identifier,
                    "Unknown Artist",
                    0,
                    Source::YouTube,
                    Some(identifier.to_string()),
                )
            });

        Ok(FetchedArtifact { path, track })
    }

    /// YouTube video ids are 11 characters of the URL-safe base64 alphabet
    fn is_identifier(&self, input: &str) -> bool {
        is_video_id(input)
    }

    fn provider_name(&self) -> &'static str {
        "yt-dlp"
    }
}

fn is_video_id(input: &str) -> bool {
    input.len() == 11
        && input
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::DurationBounds;
    use std::path::Path;
    use tempfile::TempDir;

    fn provider(dir: &Path) -> YtDlpProvider {
        YtDlpProvider::new(&RetrievalConfig::default(), dir.to_path_buf())
    }

    #[test]
    fn parses_flat_search_output() {
        let stdout = r#"
{"id": "djV11Xbc914", "title": "a-ha - Take On Me", "channel": "a-ha", "duration": 225.0, "view_count": 2000000000}
WARNING: something noisy
{"id": "", "title": "broken"}
{"id": "abcdefghijk", "title": "No channel", "uploader": "Someone", "duration": null}
"#;
        let tracks: Vec<_> = parse_entries(stdout)
            .into_iter()
            .filter_map(YtDlpEntry::into_track)
            .collect();

        assert_eq!(tracks.len(), 2);
        assert_eq!(tracks[0].artist, "a-ha");
        assert_eq!(tracks[0].duration_seconds, 225);
        assert_eq!(tracks[1].artist, "Someone");
        assert_eq!(tracks[1].duration_seconds, 0);
    }

    #[test]
    fn popularity_floor_skips_unknown_counts() {
        let filters = SearchFilters {
            duration: DurationBounds::new(60, 600),
            min_popularity: Some(1000),
        };
        let track = TrackRef::new("t", "a", 200, Source::YouTube, Some("x".into()));

        assert!(!admits(Some(10), &track, &filters));
        assert!(admits(Some(5000), &track, &filters));
        assert!(admits(None, &track, &filters));
    }

    #[test]
    fn classifies_failures() {
        assert!(matches!(
            classify_failure("ERROR: HTTP Error 429: Too Many Requests", 49),
            TunecastError::RateLimited(_)
        ));
        assert!(matches!(
            classify_failure("ERROR: [youtube] abc: Video unavailable", 49),
            TunecastError::NotFound(_)
        ));
        assert!(matches!(
            classify_failure("ERROR: something else broke", 49),
            TunecastError::Transport(_)
        ));

        match classify_failure(
            "[download] File is larger than max-filesize (104857600 bytes > 51380224 bytes). Aborting.",
            49,
        ) {
            TunecastError::QuotaExceeded { size_mb, limit_mb } => {
                assert_eq!(size_mb, 100);
                assert_eq!(limit_mb, 49);
            }
            other => panic!("unexpected: {other}"),
        }
    }

    #[test]
    fn video_id_shape() {
        assert!(is_video_id("dQw4w9WgXcQ"));
        assert!(is_video_id("a-b_c-d_e-f"));
        assert!(!is_video_id("dQw4w9WgXc"));
        assert!(!is_video_id("never gonna"));
    }

    #[test]
    fn fetch_args_target_downloads_dir() {
        let temp = TempDir::new().unwrap();
        let args = provider(temp.path()).fetch_args("dQw4w9WgXcQ");

        assert!(args.contains(&"49M".to_string()));
        assert!(args.iter().any(|a| a.ends_with("%(id)s.%(ext)s")));
        assert_eq!(
            args.last().map(String::as_str),
            Some("https://www.youtube.com/watch?v=dQw4w9WgXcQ")
        );
        assert!(!args.contains(&"--cookies".to_string()));
    }

    #[test]
    fn cookies_are_passed_only_when_present() {
        let temp = TempDir::new().unwrap();
        let cookies = temp.path().join("cookies.txt");
        let config = RetrievalConfig {
            cookies_file: Some(cookies.clone()),
            ..Default::default()
        };
        let ytdlp = YtDlpProvider::new(&config, temp.path().to_path_buf());
        assert!(!ytdlp.search_args("jazz", 5).contains(&"--cookies".to_string()));

        std::fs::write(&cookies, "# Netscape HTTP Cookie File\n").unwrap();
        let args = ytdlp.search_args("jazz", 5);
        assert!(args.contains(&"--cookies".to_string()));
        assert_eq!(args.last().map(String::as_str), Some("ytsearch5:jazz"));
    }

    #[tokio::test]
    async fn missing_binary_is_unavailable() {
        let temp = TempDir::new().unwrap();
        let config = RetrievalConfig {
            ytdlp_binary: "tunecast-no-such-ytdlp".to_string(),
            ..Default::default()
        };
        let ytdlp = YtDlpProvider::new(&config, temp.path().to_path_buf());

        assert!(!ytdlp.is_available().await);
        let err = ytdlp
            .search("jazz", 5, &SearchFilters::default())
            .await
            .unwrap_err();
        assert!(matches!(err, TunecastError::ProviderUnavailable(_)));
    }
}
