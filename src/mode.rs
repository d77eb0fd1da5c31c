//! Track-selection mode
//!
//! A station is steered by exactly one of a genre, a mood (a weighted set
//! of genres) or a pinned artist. Every change replaces the state wholesale
//! and flags the playlist for a full discard.

use crate::config::schema::{LibraryConfig, WeightedGenre};
use crate::error::{TunecastError, TunecastResult};
use chrono::{DateTime, Utc};
use rand::distributions::WeightedIndex;
use rand::prelude::*;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;
use tracing::info;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ModeKind {
    Genre,
    Mood,
    Artist,
}

impl fmt::Display for ModeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Genre => "genre",
            Self::Mood => "mood",
            Self::Artist => "artist",
        };
        write!(f, "{}", name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ModeState {
    pub kind: ModeKind,
    pub value: String,
    pub expires_at: DateTime<Utc>,
}

fn expiry(now: DateTime<Utc>, ttl: Duration) -> DateTime<Utc> {
    chrono::Duration::from_std(ttl)
        .ok()
        .and_then(|ttl| now.checked_add_signed(ttl))
        .unwrap_or(DateTime::<Utc>::MAX_UTC)
}

/// Owner of the station's `ModeState`
#[derive(Debug)]
pub struct ModeController {
    genres: Vec<String>,
    qualifiers: Vec<String>,
    moods: BTreeMap<String, Vec<WeightedGenre>>,
    state: Option<ModeState>,
    /// Expiry pushed out while a vote is running
    hold_until: Option<DateTime<Utc>>,
    invalidated: bool,
}

impl ModeController {
    pub fn new(library: &LibraryConfig) -> Self {
        Self {
            genres: library.genres.clone(),
            qualifiers: library.qualifiers.clone(),
            moods: library.moods.clone(),
            state: None,
            hold_until: None,
            invalidated: false,
        }
    }

    pub fn set_genre(&mut self, genre: &str, ttl: Duration) -> TunecastResult<()> {
        let genre = non_empty(genre, "genre")?;
        self.replace(ModeKind::Genre, genre, ttl);
        Ok(())
    }

    pub fn set_mood(&mut self, mood: &str, ttl: Duration) -> TunecastResult<()> {
        let mood = mood.trim().to_lowercase();
        match self.moods.get(&mood) {
            Some(genres) if genres.iter().any(|g| g.weight > 0) => {
                self.replace(ModeKind::Mood, mood, ttl);
                Ok(())
            }
            _ => Err(TunecastError::UnknownMood(mood)),
        }
    }

    pub fn set_artist(&mut self, artist: &str, ttl: Duration) -> TunecastResult<()> {
        let artist = non_empty(artist, "artist")?;
        self.replace(ModeKind::Artist, artist, ttl);
        Ok(())
    }

    fn replace(&mut self, kind: ModeKind, value: String, ttl: Duration) {
        let state = ModeState {
            kind,
            value,
            expires_at: expiry(Utc::now(), ttl),
        };
        info!(mode = %state.kind, value = %state.value, expires_at = %state.expires_at, "Mode changed");
        self.state = Some(state);
        self.hold_until = None;
        self.invalidated = true;
    }

    /// Search query for the next refill
    pub fn current_query(&self) -> String {
        self.current_query_with(&mut rand::thread_rng())
    }

    pub fn current_query_with<R: Rng + ?Sized>(&self, rng: &mut R) -> String {
        let base = match &self.state {
            Some(ModeState {
                kind: ModeKind::Mood,
                value,
                ..
            }) => self.mood_genre(value, rng),
            Some(state) => Some(state.value.clone()),
            None => None,
        };
        let base = base
            .or_else(|| self.genres.choose(rng).cloned())
            .unwrap_or_else(|| "music".to_string());

        match self.qualifiers.choose(rng) {
            Some(qualifier) if rng.gen_bool(0.5) => format!("{} {}", base, qualifier),
            _ => base,
        }
    }

    fn mood_genre<R: Rng + ?Sized>(&self, mood: &str, rng: &mut R) -> Option<String> {
        let genres = self.moods.get(mood)?;
        let index = WeightedIndex::new(genres.iter().map(|g| g.weight)).ok()?;
        Some(genres[index.sample(rng)].genre.clone())
    }

    /// True when no mode is set or it has run out. A pending vote hold
    /// counts as unexpired.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        if self.hold_until.is_some_and(|hold| now < hold) {
            return false;
        }
        match &self.state {
            Some(state) => now >= state.expires_at,
            None => true,
        }
    }

    /// Keep `is_expired` false until `until`, without touching the mode
    pub fn defer_expiry(&mut self, until: DateTime<Utc>) {
        self.hold_until = Some(until);
    }

    /// Whether the playlist must be discarded; clears the flag
    pub fn take_invalidation(&mut self) -> bool {
        std::mem::take(&mut self.invalidated)
    }

    pub fn state(&self) -> Option<&ModeState> {
        self.state.as_ref()
    }

    pub fn genre_pool(&self) -> &[String] {
        &self.genres
    }
}

fn non_empty(value: &str, what: &str) -> TunecastResult<String> {
    let value = value.trim();
    if value.is_empty() {
        return Err(TunecastError::InvalidInput(format!("{} must not be empty", what)));
    }
    Ok(value.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;

    fn controller() -> ModeController {
        ModeController::new(&LibraryConfig::default())
    }

    const HOUR: Duration = Duration::from_secs(3600);

    #[test]
    fn starts_expired() {
        let mode = controller();
        assert!(mode.is_expired(Utc::now()));
        assert!(mode.state().is_none());
    }

    #[test]
    fn setting_a_mode_replaces_the_others() {
        let mut mode = controller();
        mode.set_genre("jazz", HOUR).unwrap();
        mode.set_artist("Miles Davis", HOUR).unwrap();

        let state = mode.state().unwrap();
        assert_eq!(state.kind, ModeKind::Artist);
        assert_eq!(state.value, "Miles Davis");
        assert!(!mode.is_expired(Utc::now()));
        assert!(mode.is_expired(Utc::now() + chrono::Duration::hours(2)));
    }

    #[test]
    fn every_change_invalidates_once() {
        let mut mode = controller();
        assert!(!mode.take_invalidation());
        mode.set_mood("chill", HOUR).unwrap();
        assert!(mode.take_invalidation());
        assert!(!mode.take_invalidation());
    }

    #[test]
    fn unknown_mood_is_rejected() {
        let mut mode = controller();
        let err = mode.set_mood("grumpy", HOUR).unwrap_err();
        assert!(matches!(err, TunecastError::UnknownMood(_)));
        assert!(mode.state().is_none());
        assert!(mode.set_artist("   ", HOUR).is_err());
    }

    #[test]
    fn mood_query_draws_from_its_genres() {
        let mut mode = controller();
        mode.set_mood("Chill", HOUR).unwrap();
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..50 {
            let query = mode.current_query_with(&mut rng);
            assert!(
                ["lofi", "ambient", "jazz"].iter().any(|g| query.starts_with(g)),
                "{query}"
            );
        }
    }

    #[test]
    fn no_mode_falls_back_to_pool() {
        let mode = controller();
        let mut rng = StdRng::seed_from_u64(1);
        let query = mode.current_query_with(&mut rng);
        assert!(mode.genre_pool().iter().any(|g| query.starts_with(g.as_str())));
    }

    #[test]
    fn hold_defers_expiry() {
        let mut mode = controller();
        let now = Utc::now();
        mode.defer_expiry(now + chrono::Duration::seconds(60));
        assert!(!mode.is_expired(now));
        assert!(mode.is_expired(now + chrono::Duration::seconds(61)));
    }

    #[test]
    fn huge_ttl_does_not_overflow() {
        let mut mode = controller();
        mode.set_genre("rock", Duration::MAX).unwrap();
        assert!(!mode.is_expired(Utc::now()));
    }
}
