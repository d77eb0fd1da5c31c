//! Time-boxed genre polls
//!
//! A round moves `Idle -> Running -> Resolved -> Idle`. While running, one
//! ballot per voter is kept; a new ballot retracts the old one. The round
//! resolves when its timer fires or when an operator closes it, and the
//! winner becomes the station's genre.
//!
//! Lock order is always vote state first, then the mode controller. Every
//! path that changes the mode while a round may be running goes through
//! this type so the timer is cancelled before the mode is written.

use crate::error::{TunecastError, TunecastResult};
use crate::mode::ModeController;
use chrono::{DateTime, Utc};
use rand::seq::SliceRandom;
use serde::Serialize;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Opaque participant id as delivered by the chat layer
pub type VoterId = u64;

#[derive(Debug)]
struct Round {
    id: Uuid,
    candidates: Vec<String>,
    tally: HashMap<String, HashSet<VoterId>>,
    deadline: DateTime<Utc>,
    timer: CancellationToken,
}

#[derive(Debug, Default)]
enum Phase {
    #[default]
    Idle,
    Running(Round),
}

/// Read-only view of a running round
#[derive(Debug, Clone, Serialize)]
pub struct VoteSnapshot {
    pub round: Uuid,
    pub candidates: Vec<String>,
    /// Ballot count per candidate, in candidate order
    pub tally: Vec<(String, usize)>,
    pub deadline: DateTime<Utc>,
}

struct Shared {
    mode: Arc<Mutex<ModeController>>,
    mode_ttl: Duration,
    phase: Mutex<Phase>,
}

/// Runs genre polls against a shared `ModeController`
#[derive(Clone)]
pub struct VotingCoordinator {
    shared: Arc<Shared>,
}

impl VotingCoordinator {
    pub fn new(mode: Arc<Mutex<ModeController>>, mode_ttl: Duration) -> Self {
        Self {
            shared: Arc::new(Shared {
                mode,
                mode_ttl,
                phase: Mutex::new(Phase::Idle),
            }),
        }
    }

    /// Open a round over `sample_size` genres drawn from `pool`.
    ///
    /// Returns the candidates, or `None` when a round is already running or
    /// the pool is empty. The round resolves itself after `duration`.
    pub async fn start(
        &self,
        pool: &[String],
        sample_size: usize,
        duration: Duration,
    ) -> Option<Vec<String>> {
        let candidates: Vec<String> = pool
            .choose_multiple(&mut rand::thread_rng(), sample_size.max(1))
            .cloned()
            .collect();
        if candidates.is_empty() {
            return None;
        }
        self.open_round(candidates, duration).await
    }

    async fn open_round(&self, candidates: Vec<String>, duration: Duration) -> Option<Vec<String>> {
        let mut phase = self.shared.phase.lock().await;
        if matches!(*phase, Phase::Running(_)) {
            return None;
        }

        let id = Uuid::new_v4();
        let timer = CancellationToken::new();
        let deadline = chrono::Duration::from_std(duration)
            .ok()
            .and_then(|d| Utc::now().checked_add_signed(d))
            .unwrap_or(DateTime::<Utc>::MAX_UTC);

        *phase = Phase::Running(Round {
            id,
            candidates: candidates.clone(),
            tally: HashMap::new(),
            deadline,
            timer: timer.clone(),
        });
        drop(phase);

        let this = self.clone();
        tokio::spawn(async move {
            tokio::select! {
                _ = timer.cancelled() => {
                    debug!(round = %id, "Vote timer cancelled");
                }
                _ = tokio::time::sleep(duration) => {
                    this.resolve_round(Some(id)).await;
                }
            }
        });

        info!(round = %id, candidates = candidates.len(), "Vote started");
        Some(candidates)
    }

    /// Record `voter`'s ballot for `genre`, retracting any earlier one.
    /// False when no round is running or `genre` is not on the ballot.
    pub async fn register_vote(&self, genre: &str, voter: VoterId) -> bool {
        let mut phase = self.shared.phase.lock().await;
        let Phase::Running(round) = &mut *phase else {
            return false;
        };
        let Some(genre) = round.candidates.iter().find(|c| c.eq_ignore_ascii_case(genre.trim()))
        else {
            return false;
        };

        for ballots in round.tally.values_mut() {
            ballots.remove(&voter);
        }
        round.tally.entry(genre.clone()).or_default().insert(voter);
        debug!(round = %round.id, voter, genre = %genre, "Vote registered");
        true
    }

    /// Close the running round now and apply its winner
    pub async fn resolve(&self) -> Option<String> {
        self.resolve_round(None).await
    }

    /// Resolve the running round if it is `expected` (any round for `None`)
    async fn resolve_round(&self, expected: Option<Uuid>) -> Option<String> {
        let mut phase = self.shared.phase.lock().await;
        let matches = match &*phase {
            Phase::Running(round) => expected.map_or(true, |id| id == round.id),
            Phase::Idle => false,
        };
        if !matches {
            return None;
        }
        let Phase::Running(round) = std::mem::take(&mut *phase) else {
            return None;
        };
        round.timer.cancel();

        let winner = pick_winner(&round.candidates, &round.tally, &mut rand::thread_rng())?;
        let ballots: usize = round.tally.values().map(HashSet::len).sum();

        let mut mode = self.shared.mode.lock().await;
        if let Err(e) = mode.set_genre(&winner, self.shared.mode_ttl) {
            warn!(round = %round.id, error = %e, "Could not apply vote winner");
            return None;
        }
        info!(round = %round.id, winner = %winner, ballots, "Vote resolved");
        Some(winner)
    }

    /// Abort the running round, if any, without changing the mode
    pub async fn cancel(&self) -> bool {
        let mut phase = self.shared.phase.lock().await;
        match std::mem::take(&mut *phase) {
            Phase::Running(round) => {
                round.timer.cancel();
                info!(round = %round.id, "Vote cancelled");
                true
            }
            Phase::Idle => false,
        }
    }

    /// Apply an operator change to the mode, cancelling any running round
    /// first so its timer cannot overwrite the override.
    pub async fn override_mode<F>(&self, change: F) -> TunecastResult<()>
    where
        F: FnOnce(&mut ModeController, Duration) -> TunecastResult<()>,
    {
        let mut phase = self.shared.phase.lock().await;
        let mut mode = self.shared.mode.lock().await;

        // A rejected change leaves both the mode and the round as they were
        change(&mut mode, self.shared.mode_ttl)?;
        if let Phase::Running(round) = std::mem::take(&mut *phase) {
            round.timer.cancel();
            info!(round = %round.id, "Vote overridden by operator");
        }
        Ok(())
    }

    /// Force the running round's outcome to `genre`
    pub async fn force(&self, genre: &str) -> TunecastResult<()> {
        if !self.is_running().await {
            return Err(TunecastError::NoActiveVote);
        }
        self.override_mode(|mode, ttl| mode.set_genre(genre, ttl)).await
    }

    pub async fn is_running(&self) -> bool {
        matches!(*self.shared.phase.lock().await, Phase::Running(_))
    }

    pub async fn snapshot(&self) -> Option<VoteSnapshot> {
        let phase = self.shared.phase.lock().await;
        let Phase::Running(round) = &*phase else {
            return None;
        };
        let tally = round
            .candidates
            .iter()
            .map(|c| (c.clone(), round.tally.get(c).map_or(0, HashSet::len)))
            .collect();
        Some(VoteSnapshot {
            round: round.id,
            candidates: round.candidates.clone(),
            tally,
            deadline: round.deadline,
        })
    }
}

/// Largest ballot set wins; ties go to the earliest candidate; an empty
/// tally picks a candidate at random.
fn pick_winner<R: rand::Rng + ?Sized>(
    candidates: &[String],
    tally: &HashMap<String, HashSet<VoterId>>,
    rng: &mut R,
) -> Option<String> {
    let mut best: Option<(&String, usize)> = None;
    for candidate in candidates {
        let count = tally.get(candidate).map_or(0, HashSet::len);
        if count > 0 && best.map_or(true, |(_, top)| count > top) {
            best = Some((candidate, count));
        }
    }

    match best {
        Some((winner, _)) => Some(winner.clone()),
        None => candidates.choose(rng).cloned(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::schema::LibraryConfig;
    use crate::mode::ModeKind;

    fn coordinator() -> (Arc<Mutex<ModeController>>, VotingCoordinator) {
        let mode = Arc::new(Mutex::new(ModeController::new(&LibraryConfig::default())));
        let voting = VotingCoordinator::new(mode.clone(), Duration::from_secs(3600));
        (mode, voting)
    }

    fn genres(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn majority_wins() {
        let mut tally = HashMap::new();
        tally.insert("rock".to_string(), HashSet::from([1, 2]));
        tally.insert("jazz".to_string(), HashSet::from([3]));
        let winner = pick_winner(&genres(&["jazz", "rock"]), &tally, &mut rand::thread_rng());
        assert_eq!(winner.as_deref(), Some("rock"));
    }

    #[test]
    fn tie_goes_to_first_candidate() {
        let mut tally = HashMap::new();
        tally.insert("rock".to_string(), HashSet::from([1]));
        tally.insert("jazz".to_string(), HashSet::from([2]));
        let winner = pick_winner(&genres(&["jazz", "rock"]), &tally, &mut rand::thread_rng());
        assert_eq!(winner.as_deref(), Some("jazz"));
    }

    #[test]
    fn empty_tally_picks_a_candidate() {
        let candidates = genres(&["rock", "jazz"]);
        for _ in 0..20 {
            let winner = pick_winner(&candidates, &HashMap::new(), &mut rand::thread_rng());
            assert!(candidates.contains(&winner.unwrap()));
        }
    }

    #[tokio::test]
    async fn revote_keeps_one_ballot() {
        let (_, voting) = coordinator();
        voting
            .open_round(genres(&["rock", "jazz", "pop"]), Duration::from_secs(60))
            .await
            .unwrap();

        assert!(voting.register_vote("rock", 7).await);
        assert!(voting.register_vote("jazz", 7).await);
        assert!(!voting.register_vote("polka", 7).await);

        let snapshot = voting.snapshot().await.unwrap();
        let total: usize = snapshot.tally.iter().map(|(_, n)| n).sum();
        assert_eq!(total, 1);
        assert_eq!(snapshot.tally[1], ("jazz".to_string(), 1));
    }

    #[tokio::test]
    async fn votes_rejected_when_idle() {
        let (_, voting) = coordinator();
        assert!(!voting.register_vote("rock", 1).await);
        assert!(voting.resolve().await.is_none());
    }

    #[tokio::test]
    async fn second_start_is_a_noop() {
        let (_, voting) = coordinator();
        let pool = genres(&["rock", "jazz"]);
        assert!(voting.start(&pool, 2, Duration::from_secs(60)).await.is_some());
        assert!(voting.start(&pool, 2, Duration::from_secs(60)).await.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn unattended_vote_lands_on_a_sampled_genre() {
        let (mode, voting) = coordinator();
        let pool = LibraryConfig::default().genres;

        let sample = voting
            .start(&pool, 16, Duration::from_secs(60))
            .await
            .unwrap();
        assert_eq!(sample.len(), 16);

        tokio::time::sleep(Duration::from_secs(61)).await;

        assert!(!voting.is_running().await);
        let mode = mode.lock().await;
        let state = mode.state().unwrap();
        assert_eq!(state.kind, ModeKind::Genre);
        assert!(sample.contains(&state.value));
    }

    #[tokio::test(start_paused = true)]
    async fn override_cancels_the_timer() {
        let (mode, voting) = coordinator();
        voting
            .open_round(genres(&["rock", "jazz"]), Duration::from_secs(60))
            .await
            .unwrap();
        voting.register_vote("rock", 1).await;

        voting
            .override_mode(|m, ttl| m.set_artist("Nina Simone", ttl))
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_secs(120)).await;

        let mode = mode.lock().await;
        assert_eq!(mode.state().unwrap().kind, ModeKind::Artist);
    }

    #[tokio::test]
    async fn failed_override_keeps_the_round() {
        let (_, voting) = coordinator();
        voting
            .open_round(genres(&["rock"]), Duration::from_secs(60))
            .await
            .unwrap();

        let err = voting
            .override_mode(|m, ttl| m.set_mood("grumpy", ttl))
            .await
            .unwrap_err();
        assert!(matches!(err, TunecastError::UnknownMood(_)));
        assert!(voting.is_running().await);
    }

    #[tokio::test]
    async fn resolve_applies_the_leader() {
        let (mode, voting) = coordinator();
        voting
            .open_round(genres(&["rock", "jazz"]), Duration::from_secs(60))
            .await
            .unwrap();
        voting.register_vote("JAZZ", 4).await;

        assert_eq!(voting.resolve().await.as_deref(), Some("jazz"));
        assert_eq!(mode.lock().await.state().unwrap().value, "jazz");
        assert!(voting.force("rock").await.is_err());
    }
}
