//! Candidate queue and recency window for one station

use crate::model::TrackRef;
use rand::seq::SliceRandom;
use rand::Rng;
use std::collections::{HashSet, VecDeque};
use std::future::Future;
use tracing::debug;

/// Bounded set of recently played keys with FIFO eviction
#[derive(Debug)]
pub struct RecencySet {
    order: VecDeque<String>,
    members: HashSet<String>,
    capacity: usize,
}

impl RecencySet {
    pub fn new(capacity: usize) -> Self {
        Self {
            order: VecDeque::with_capacity(capacity),
            members: HashSet::with_capacity(capacity),
            capacity: capacity.max(1),
        }
    }

    /// Record `key`, evicting the oldest member when full.
    /// Returns false if it was already present.
    pub fn insert(&mut self, key: &str) -> bool {
        if self.members.contains(key) {
            return false;
        }
        while self.order.len() >= self.capacity {
            if let Some(oldest) = self.order.pop_front() {
                self.members.remove(&oldest);
            }
        }
        self.order.push_back(key.to_string());
        self.members.insert(key.to_string());
        true
    }

    pub fn contains(&self, key: &str) -> bool {
        self.members.contains(key)
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }
}

/// Shuffled candidates for the active mode
#[derive(Debug)]
pub struct PlaylistBuffer {
    items: Vec<TrackRef>,
    recent: RecencySet,
}

impl PlaylistBuffer {
    pub fn new(recency_capacity: usize) -> Self {
        Self {
            items: Vec::new(),
            recent: RecencySet::new(recency_capacity),
        }
    }

    /// Top up the buffer when it holds fewer than `min_size` candidates.
    ///
    /// `fetch` runs at most once. Its results are shuffled, stripped of
    /// recently played and already queued tracks, then appended. Returns the
    /// number of candidates added; zero tells the caller to back off.
    pub async fn ensure_filled<F, Fut>(&mut self, min_size: usize, fetch: F) -> usize
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Vec<TrackRef>>,
    {
        if self.items.len() >= min_size {
            return 0;
        }

        let mut fetched = fetch().await;
        fetched.shuffle(&mut rand::thread_rng());

        let mut queued: HashSet<String> = self.items.iter().map(TrackRef::dedup_key).collect();
        let before = self.items.len();
        for track in fetched {
            let key = track.dedup_key();
            if self.recent.contains(&key) || !queued.insert(key) {
                continue;
            }
            self.items.push(track);
        }

        let added = self.items.len() - before;
        debug!(added, queued = self.items.len(), "Playlist refilled");
        added
    }

    /// Remove one candidate chosen uniformly at random
    pub fn pop_random(&mut self) -> Option<TrackRef> {
        self.pop_random_with(&mut rand::thread_rng())
    }

    pub fn pop_random_with<R: Rng + ?Sized>(&mut self, rng: &mut R) -> Option<TrackRef> {
        if self.items.is_empty() {
            return None;
        }
        let index = rng.gen_range(0..self.items.len());
        Some(self.items.swap_remove(index))
    }

    pub fn mark_played(&mut self, key: &str) {
        self.recent.insert(key);
    }

    pub fn was_recently_played(&self, key: &str) -> bool {
        self.recent.contains(key)
    }

    /// Drop every queued candidate. The recency window survives.
    pub fn clear(&mut self) {
        self.items.clear();
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}
