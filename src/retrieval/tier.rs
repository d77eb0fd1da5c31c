//! Search tiers and the result-quality heuristic
//!
//! A search runs up to three tiers, loosening constraints each time:
//!
//! | Tier | Provider filters | Quality heuristic |
//! |------|------------------|-------------------|
//! | Strict | duration + popularity | denylist + ranking |
//! | Relaxed | duration | denylist + ranking |
//! | Minimal | duration | none |

use crate::model::{SearchFilters, TrackRef};
use std::collections::HashSet;
use std::fmt;

/// Title fragments that mark non-canonical uploads
const DENYLIST: &[&str] = &[
    "live",
    "concert",
    "#shorts",
    "shorts",
    "compilation",
    "full album",
    "mix 20",
    "megamix",
    "nonstop",
    "hour",
    "hours",
    "reaction",
    "cover",
    "karaoke",
    "tutorial",
    "lyrics video",
];

/// Title/channel fragments that mark canonical audio uploads
const PREFERRED: &[&str] = &["official audio", "official music", "- topic", "vevo", "(audio)"];

/// Filter strictness level
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchTier {
    Strict,
    Relaxed,
    Minimal,
}

impl SearchTier {
    /// All tiers in the order they are attempted
    pub fn all() -> &'static [Self] {
        &[Self::Strict, Self::Relaxed, Self::Minimal]
    }

    /// Filters handed to the provider for this tier
    pub fn provider_filters(&self, base: &SearchFilters) -> SearchFilters {
        match self {
            Self::Strict => *base,
            Self::Relaxed | Self::Minimal => base.without_popularity(),
        }
    }

    fn applies_quality(&self) -> bool {
        !matches!(self, Self::Minimal)
    }

    /// Post-process provider results for this tier.
    ///
    /// Drops out-of-bounds durations, applies the quality heuristic where
    /// the tier asks for it, dedups by identifier and truncates to `limit`.
    pub fn refine(&self, items: Vec<TrackRef>, filters: &SearchFilters, limit: usize) -> Vec<TrackRef> {
        let mut kept: Vec<(i32, TrackRef)> = items
            .into_iter()
            .filter(|t| filters.duration.admits(t.duration_seconds))
            .filter(|t| !self.applies_quality() || !is_denylisted(t))
            .map(|t| {
                let score = if self.applies_quality() { quality_score(&t) } else { 0 };
                (score, t)
            })
            .collect();

        // Stable sort keeps provider order among equal scores
        kept.sort_by(|a, b| b.0.cmp(&a.0));

        let mut seen = HashSet::new();
        kept.into_iter()
            .map(|(_, t)| t)
            .filter(|t| seen.insert(t.dedup_key()))
            .take(limit)
            .collect()
    }
}

impl fmt::Display for SearchTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Strict => "strict",
            Self::Relaxed => "relaxed",
            Self::Minimal => "minimal",
        };
        write!(f, "{}", name)
    }
}

fn words(text: &str) -> Vec<String> {
    text.to_lowercase()
        .split(|c: char| !c.is_alphanumeric() && c != '#')
        .filter(|w| !w.is_empty())
        .map(String::from)
        .collect()
}

/// True when the title looks like a live set, short, or compilation
pub fn is_denylisted(track: &TrackRef) -> bool {
    let title = track.title.to_lowercase();
    let title_words = words(&track.title);

    DENYLIST.iter().any(|needle| {
        if needle.contains(' ') {
            title.contains(needle)
        } else {
            title_words.iter().any(|w| w == needle)
        }
    })
}

/// Higher is better; 0 for an unremarkable upload
pub fn quality_score(track: &TrackRef) -> i32 {
    let haystack = format!("{} {}", track.title, track.artist).to_lowercase();
    PREFERRED
        .iter()
        .filter(|needle| haystack.contains(*needle))
        .count() as i32
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{DurationBounds, Source};

    fn t(id: &str, title: &str, artist: &str, secs: u32) -> TrackRef {
        TrackRef::new(title, artist, secs, Source::YouTube, Some(id.to_string()))
    }

    fn filters() -> SearchFilters {
        SearchFilters {
            duration: DurationBounds::new(60, 600),
            min_popularity: Some(1000),
        }
    }

    #[test]
    fn denylist_matches_whole_words() {
        assert!(is_denylisted(&t("a", "Nirvana - Lithium (Live at Reading)", "x", 200)));
        assert!(is_denylisted(&t("b", "Best of 80s Compilation", "x", 200)));
        // "alive" must not trip the "live" rule
        assert!(!is_denylisted(&t("c", "Pearl Jam - Alive", "x", 200)));
    }

    #[test]
    fn strict_ranks_canonical_uploads_first() {
        let items = vec![
            t("a", "Song A", "Some Channel", 200),
            t("b", "Song B (Official Audio)", "Band - Topic", 200),
        ];
        let refined = SearchTier::Strict.refine(items, &filters(), 10);
        assert_eq!(refined[0].identifier.as_deref(), Some("b"));
    }

    #[test]
    fn every_tier_drops_bad_durations() {
        let items = vec![
            t("a", "Zero", "x", 0),
            t("b", "Too long", "x", 3600),
            t("c", "Fine", "x", 180),
        ];
        for tier in SearchTier::all() {
            let refined = tier.refine(items.clone(), &filters(), 10);
            assert_eq!(refined.len(), 1);
            assert_eq!(refined[0].title, "Fine");
        }
    }

    #[test]
    fn minimal_skips_quality_filter() {
        let items = vec![t("a", "Song (Live)", "x", 200)];
        assert!(SearchTier::Relaxed.refine(items.clone(), &filters(), 10).is_empty());
        assert_eq!(SearchTier::Minimal.refine(items, &filters(), 10).len(), 1);
    }

    #[test]
    fn refine_dedups_and_truncates() {
        let items = vec![
            t("a", "One", "x", 200),
            t("a", "One again", "x", 200),
            t("b", "Two", "x", 200),
            t("c", "Three", "x", 200),
        ];
        let refined = SearchTier::Minimal.refine(items, &filters(), 2);
        let ids: Vec<_> = refined.iter().map(|t| t.dedup_key()).collect();
        assert_eq!(ids, vec!["a", "b"]);
    }

    #[test]
    fn relaxed_drops_popularity_only() {
        let relaxed = SearchTier::Relaxed.provider_filters(&filters());
        assert_eq!(relaxed.min_popularity, None);
        assert_eq!(relaxed.duration, filters().duration);
        assert_eq!(SearchTier::Strict.provider_filters(&filters()), filters());
    }
}
