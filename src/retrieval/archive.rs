//! Internet Archive provider
//!
//! Search uses the `advancedsearch.php` endpoint restricted to audio items.
//! Fetch reads the item metadata, picks the first VBR MP3 file and streams
//! it to `<downloads_dir>/<identifier>.mp3`. HTTP runs on the blocking pool
//! through `ureq`.

use crate::config::schema::RetrievalConfig;
use crate::error::{TunecastError, TunecastResult};
use crate::model::{SearchFilters, Source, TrackRef};
use crate::retrieval::provider::{DownloadProvider, FetchedArtifact, SearchProvider};
use async_trait::async_trait;
use rand::Rng;
use serde_json::Value;
use std::io::Read;
use std::path::PathBuf;
use std::time::Duration;
use tracing::{debug, warn};

const SEARCH_URL: &str = "https://archive.org/advancedsearch.php";
const METADATA_URL: &str = "https://archive.org/metadata";
const DOWNLOAD_URL: &str = "https://archive.org/download";

/// Result pages sampled at random so repeated genre searches vary
const RANDOM_PAGES: u32 = 3;

/// `SearchProvider` + `DownloadProvider` over archive.org
pub struct ArchiveProvider {
    agent: ureq::Agent,
    downloads_dir: PathBuf,
    max_file_size_mb: u64,
}

impl ArchiveProvider {
    pub fn new(config: &RetrievalConfig, downloads_dir: PathBuf) -> Self {
        let agent: ureq::Agent = ureq::Agent::config_builder()
            .timeout_connect(Some(Duration::from_secs(10)))
            .timeout_global(Some(config.download_timeout()))
            .build()
            .into();

        Self {
            agent,
            downloads_dir,
            max_file_size_mb: config.max_file_size_mb,
        }
    }

    fn search_page(
        agent: &ureq::Agent,
        query: &str,
        limit: usize,
        page: u32,
    ) -> TunecastResult<Vec<Value>> {
        let cleaned = query.replace('"', " ");
        let q = format!(
            "mediatype:audio AND (subject:\"{}\" OR title:({}))",
            cleaned.trim(),
            cleaned.trim()
        );
        let rows = limit.max(1).to_string();
        let page = page.to_string();

        let mut response = agent
            .get(SEARCH_URL)
            .query("q", &q)
            .query("fl[]", "identifier")
            .query("fl[]", "title")
            .query("fl[]", "creator")
            .query("fl[]", "length")
            .query("fl[]", "downloads")
            .query("rows", &rows)
            .query("page", &page)
            .query("output", "json")
            .call()
            .map_err(|e| classify_http(e, "archive search"))?;

        let body = response
            .body_mut()
            .read_to_string()
            .map_err(|e| classify_http(e, "archive search body"))?;
        parse_docs(&body)
    }

    fn fetch_blocking(
        agent: &ureq::Agent,
        identifier: &str,
        target: PathBuf,
        limit_mb: u64,
    ) -> TunecastResult<FetchedArtifact> {
        let mut response = agent
            .get(format!("{}/{}", METADATA_URL, identifier))
            .call()
            .map_err(|e| classify_http(e, "archive metadata"))?;
        let body = response
            .body_mut()
            .read_to_string()
            .map_err(|e| classify_http(e, "archive metadata body"))?;
        let metadata: Value = serde_json::from_str(&body)?;

        let file_name = pick_mp3(&metadata).ok_or_else(|| {
            TunecastError::NotFound(format!("{} has no VBR MP3 file", identifier))
        })?;
        let track = track_from_metadata(identifier, &metadata, &file_name);

        let url = format!(
            "{}/{}/{}",
            DOWNLOAD_URL,
            urlencoding::encode(identifier),
            urlencoding::encode(&file_name)
        );
        debug!(url = %url, "Downloading archive file");

        let response = agent
            .get(&url)
            .call()
            .map_err(|e| classify_http(e, "archive download"))?;

        let limit_bytes = limit_mb.saturating_mul(1024 * 1024);
        let mut reader = response.into_body().into_reader().take(limit_bytes + 1);
        let mut file = std::fs::File::create(&target)
            .map_err(|e| TunecastError::io(format!("creating {}", target.display()), e))?;
        let written = std::io::copy(&mut reader, &mut file)
            .map_err(|e| TunecastError::io(format!("writing {}", target.display()), e))?;
        drop(file);

        if written > limit_bytes {
            if let Err(e) = std::fs::remove_file(&target) {
                warn!(path = %target.display(), error = %e, "Could not remove partial download");
            }
            return Err(TunecastError::QuotaExceeded {
                size_mb: written / (1024 * 1024),
                limit_mb,
            });
        }

        Ok(FetchedArtifact {
            path: target,
            track,
        })
    }
}

fn classify_http(error: ureq::Error, what: &str) -> TunecastError {
    match error {
        ureq::Error::StatusCode(429) | ureq::Error::StatusCode(503) => {
            TunecastError::RateLimited(format!("{}: throttled by archive.org", what))
        }
        ureq::Error::StatusCode(404) => TunecastError::NotFound(format!("{}: 404", what)),
        ureq::Error::StatusCode(code) => TunecastError::Transport(format!("{}: HTTP {}", what, code)),
        ureq::Error::Timeout(_) => TunecastError::Timeout(what.to_string()),
        other => TunecastError::Transport(format!("{}: {}", what, other)),
    }
}

fn parse_docs(body: &str) -> TunecastResult<Vec<Value>> {
    let data: Value = serde_json::from_str(body)?;
    Ok(data
        .pointer("/response/docs")
        .and_then(Value::as_array)
        .cloned()
        .unwrap_or_default())
}

/// First string of a field that may be a string or an array of strings
fn text_field(doc: &Value, key: &str) -> Option<String> {
    match doc.get(key)? {
        Value::String(s) => Some(s.clone()),
        Value::Array(items) => items.iter().find_map(|v| v.as_str().map(String::from)),
        _ => None,
    }
}

/// Archive lengths come as seconds ("225.3"), clock time ("3:45") or numbers
fn parse_length(value: Option<&Value>) -> u32 {
    let text = match value {
        Some(Value::Number(n)) => return n.as_f64().map(|f| f.max(0.0) as u32).unwrap_or(0),
        Some(Value::String(s)) => s.trim().to_string(),
        Some(Value::Array(items)) => return parse_length(items.first()),
        _ => return 0,
    };

    if text.contains(':') {
        text.split(':')
            .map(|part| part.trim().parse::<f64>().unwrap_or(0.0))
            .fold(0.0, |acc, part| acc * 60.0 + part)
            .max(0.0) as u32
    } else {
        text.parse::<f64>().map(|f| f.max(0.0) as u32).unwrap_or(0)
    }
}

fn doc_to_track(doc: &Value) -> Option<(TrackRef, Option<u64>)> {
    let identifier = text_field(doc, "identifier")?;
    let track = TrackRef::new(
        text_field(doc, "title").unwrap_or_else(|| "Unknown Title".to_string()),
        text_field(doc, "creator").unwrap_or_else(|| "Unknown Artist".to_string()),
        parse_length(doc.get("length")),
        Source::InternetArchive,
        Some(identifier),
    );
    let downloads = doc.get("downloads").and_then(Value::as_u64);
    Some((track, downloads))
}

fn pick_mp3(metadata: &Value) -> Option<String> {
    metadata
        .get("files")?
        .as_array()?
        .iter()
        .filter(|f| f.get("format").and_then(Value::as_str) == Some("VBR MP3"))
        .find_map(|f| f.get("name").and_then(Value::as_str).map(String::from))
}

fn track_from_metadata(identifier: &str, metadata: &Value, file_name: &str) -> TrackRef {
    let meta = metadata.get("metadata").cloned().unwrap_or(Value::Null);
    let file = metadata
        .get("files")
        .and_then(Value::as_array)
        .and_then(|files| {
            files
                .iter()
                .find(|f| f.get("name").and_then(Value::as_str) == Some(file_name))
        })
        .cloned()
        .unwrap_or(Value::Null);

    let title = text_field(&file, "title")
        .or_else(|| text_field(&meta, "title"))
        .unwrap_or_else(|| identifier.to_string());
    let artist = text_field(&file, "artist")
        .or_else(|| text_field(&file, "creator"))
        .or_else(|| text_field(&meta, "creator"))
        .unwrap_or_else(|| "Unknown Artist".to_string());

    TrackRef::new(
        title,
        artist,
        parse_length(file.get("length")),
        Source::InternetArchive,
        Some(identifier.to_string()),
    )
}

/// Charset and length archive.org allows for item ids; also safe as a file stem
fn is_valid_item_id(input: &str) -> bool {
    (3..=100).contains(&input.len())
        && !input.starts_with('.')
        && input
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.'))
}

/// Guess whether free-text input names an item rather than a search
fn is_archive_identifier(input: &str) -> bool {
    input.len() >= 5
        && is_valid_item_id(input)
        // Plain words are genre queries, not item ids
        && input
            .chars()
            .any(|c| c.is_ascii_digit() || matches!(c, '_' | '.'))
}

#[async_trait]
impl SearchProvider for ArchiveProvider {
    async fn search(
        &self,
        query: &str,
        limit: usize,
        filters: &SearchFilters,
    ) -> TunecastResult<Vec<TrackRef>> {
        let agent = self.agent.clone();
        let query = query.to_string();
        let page = rand::thread_rng().gen_range(1..=RANDOM_PAGES);

        let docs = tokio::task::spawn_blocking(move || {
            let docs = Self::search_page(&agent, &query, limit, page)?;
            if docs.is_empty() && page > 1 {
                return Self::search_page(&agent, &query, limit, 1);
            }
            Ok(docs)
        })
        .await
        .map_err(|e| TunecastError::Internal(format!("archive search task: {}", e)))??;

        let tracks = docs
            .iter()
            .filter_map(doc_to_track)
            .filter(|(track, downloads)| {
                let duration_ok = filters.duration.admits(track.duration_seconds);
                let popular = match (filters.min_popularity, downloads) {
                    (Some(min), Some(count)) => *count >= min,
                    _ => true,
                };
                duration_ok && popular
            })
            .map(|(track, _)| track)
            .collect();

        Ok(tracks)
    }

    fn source(&self) -> Source {
        Source::InternetArchive
    }
}

#[async_trait]
impl DownloadProvider for ArchiveProvider {
    async fn fetch(&self, identifier: &str) -> TunecastResult<FetchedArtifact> {
        if !is_valid_item_id(identifier) {
            return Err(TunecastError::InvalidInput(format!(
                "'{}' is not an archive identifier",
                identifier
            )));
        }

        let agent = self.agent.clone();
        let id = identifier.to_string();
        let target = self.downloads_dir.join(format!("{}.mp3", identifier));
        let limit_mb = self.max_file_size_mb;

        tokio::task::spawn_blocking(move || Self::fetch_blocking(&agent, &id, target, limit_mb))
            .await
            .map_err(|e| TunecastError::Internal(format!("archive fetch task: {}", e)))?
    }

    fn is_identifier(&self, input: &str) -> bool {
        is_archive_identifier(input)
    }

    fn provider_name(&self) -> &'static str {
        "archive.org"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parses_search_docs() {
        let body = json!({
            "response": {
                "numFound": 2,
                "docs": [
                    {"identifier": "78_take-five_dave-brubeck", "title": "Take Five",
                     "creator": ["Dave Brubeck Quartet"], "length": "5:24", "downloads": 1200},
                    {"title": "no identifier"}
                ]
            }
        })
        .to_string();

        let docs = parse_docs(&body).unwrap();
        let tracks: Vec<_> = docs.iter().filter_map(doc_to_track).collect();
        assert_eq!(tracks.len(), 1);
        let (track, downloads) = &tracks[0];
        assert_eq!(track.artist, "Dave Brubeck Quartet");
        assert_eq!(track.duration_seconds, 324);
        assert_eq!(*downloads, Some(1200));
    }

    #[test]
    fn empty_response_has_no_docs() {
        assert!(parse_docs("{}").unwrap().is_empty());
        assert!(parse_docs("not json").is_err());
    }

    #[test]
    fn length_formats() {
        assert_eq!(parse_length(Some(&json!("225.7"))), 225);
        assert_eq!(parse_length(Some(&json!("1:02:03"))), 3723);
        assert_eq!(parse_length(Some(&json!(61))), 61);
        assert_eq!(parse_length(None), 0);
    }

    #[test]
    fn picks_first_vbr_mp3_and_its_tags() {
        let metadata = json!({
            "metadata": {"title": "Album", "creator": "Band"},
            "files": [
                {"name": "cover.jpg", "format": "JPEG"},
                {"name": "01 Intro.flac", "format": "Flac"},
                {"name": "01 Intro.mp3", "format": "VBR MP3", "title": "Intro", "length": "61.2"},
                {"name": "02 Outro.mp3", "format": "VBR MP3"}
            ]
        });

        let name = pick_mp3(&metadata).unwrap();
        assert_eq!(name, "01 Intro.mp3");

        let track = track_from_metadata("album_1999", &metadata, &name);
        assert_eq!(track.title, "Intro");
        assert_eq!(track.artist, "Band");
        assert_eq!(track.duration_seconds, 61);
        assert_eq!(track.identifier.as_deref(), Some("album_1999"));
    }

    #[test]
    fn identifier_shape() {
        assert!(is_archive_identifier("78_take-five_dave-brubeck"));
        assert!(is_archive_identifier("gd1977-05-08.sbd"));
        assert!(!is_archive_identifier("jazz"));
        assert!(!is_archive_identifier("smooth jazz 1999"));
    }

    #[test]
    fn hyphenated_item_ids_are_fetchable() {
        assert!(!is_archive_identifier("CharlieParker-Ornithology"));
        assert!(is_valid_item_id("CharlieParker-Ornithology"));
        assert!(!is_valid_item_id("../etc"));
        assert!(!is_valid_item_id("two words"));
    }

    #[tokio::test]
    async fn fetch_rejects_malformed_ids_without_network() {
        let dir = tempfile::TempDir::new().unwrap();
        let provider = ArchiveProvider::new(&RetrievalConfig::default(), dir.path().to_path_buf());
        let err = provider.fetch("not an id").await.unwrap_err();
        assert!(matches!(err, TunecastError::InvalidInput(_)));
    }

    #[test]
    fn http_errors_map_to_taxonomy() {
        assert!(matches!(
            classify_http(ureq::Error::StatusCode(429), "x"),
            TunecastError::RateLimited(_)
        ));
        assert!(matches!(
            classify_http(ureq::Error::StatusCode(404), "x"),
            TunecastError::NotFound(_)
        ));
        assert!(matches!(
            classify_http(ureq::Error::StatusCode(500), "x"),
            TunecastError::Transport(_)
        ));
    }
}
