use crate::error::StoreError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Mutex;

/// Number of finished games kept on a profile
pub const RECENT_GAMES: usize = 10;
const XP_PER_LEVEL: u64 = 1000;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameRecord {
    pub session_id: String,
    pub track_id: String,
    pub score: u64,
    pub max_combo: u32,
    pub coins_earned: u64,
    pub experience_earned: u64,
    pub played_at: DateTime<Utc>,
}

/// A player's persistent balances and history
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    pub username: String,
    pub coins_available: u64,
    pub coins_total: u64,
    pub experience: u64,
    pub best_score: u64,
    pub total_games: u64,
    /// Newest first
    pub recent_games: Vec<GameRecord>,
}

impl Identity {
    pub fn new(username: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            coins_available: 0,
            coins_total: 0,
            experience: 0,
            best_score: 0,
            total_games: 0,
            recent_games: Vec::new(),
        }
    }

    pub fn level(&self) -> u64 {
        self.experience / XP_PER_LEVEL + 1
    }

    /// Adds the deltas of `patch` and records its game, if any
    pub fn merge(&mut self, patch: &ProfilePatch) {
        self.coins_available = self.coins_available.saturating_add(patch.coins_delta);
        self.coins_total = self.coins_total.saturating_add(patch.coins_delta);
        self.experience = self.experience.saturating_add(patch.experience_delta);
        self.total_games = self.total_games.saturating_add(patch.games_delta);
        if let Some(score) = patch.best_score_candidate {
            self.best_score = self.best_score.max(score);
        }
        if let Some(game) = &patch.game {
            self.recent_games.insert(0, game.clone());
            self.recent_games.truncate(RECENT_GAMES);
        }
    }
}

/// Relative update for a profile. Stores add the deltas to whatever is
/// stored at write time, so concurrent writers never overwrite each other.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProfilePatch {
    /// Credited to both the available and the lifetime coin balance
    pub coins_delta: u64,
    pub experience_delta: u64,
    pub games_delta: u64,
    /// Replaces the best score only when higher
    pub best_score_candidate: Option<u64>,
    pub game: Option<GameRecord>,
}

pub trait IdentityStore: Send + Sync {
    /// `Ok(None)` when nobody is signed in
    fn load_current(&self) -> Result<Option<Identity>, StoreError>;

    fn current_identity(&self) -> Option<Identity> {
        self.load_current().ok().flatten()
    }

    fn apply_profile_delta(&self, patch: &ProfilePatch) -> Result<Identity, StoreError>;
}

/// Process-local store, handy for tests and guest play
#[derive(Debug, Default)]
pub struct MemoryIdentityStore {
    inner: Mutex<MemoryState>,
}

#[derive(Debug, Default)]
struct MemoryState {
    identity: Option<Identity>,
    fail_next: Option<String>,
    fail_next_read: Option<String>,
    writes: usize,
}

impl MemoryIdentityStore {
    pub fn signed_in(identity: Identity) -> Self {
        Self {
            inner: Mutex::new(MemoryState {
                identity: Some(identity),
                ..MemoryState::default()
            }),
        }
    }

    pub fn signed_out() -> Self {
        Self::default()
    }

    pub fn sign_in(&self, identity: Identity) {
        self.lock().identity = Some(identity);
    }

    pub fn sign_out(&self) {
        self.lock().identity = None;
    }

    /// Makes the next update fail with `message`
    pub fn fail_next_update(&self, message: impl Into<String>) {
        self.lock().fail_next = Some(message.into());
    }

    /// Makes the next read fail with `message`
    pub fn fail_next_read(&self, message: impl Into<String>) {
        self.lock().fail_next_read = Some(message.into());
    }

    /// Successful updates applied so far
    pub fn writes(&self) -> usize {
        self.lock().writes
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, MemoryState> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl IdentityStore for MemoryIdentityStore {
    fn load_current(&self) -> Result<Option<Identity>, StoreError> {
        let mut state = self.lock();
        if let Some(message) = state.fail_next_read.take() {
            return Err(StoreError::Unavailable(message));
        }
        Ok(state.identity.clone())
    }

    fn apply_profile_delta(&self, patch: &ProfilePatch) -> Result<Identity, StoreError> {
        let mut state = self.lock();
        if let Some(message) = state.fail_next.take() {
            return Err(StoreError::Unavailable(message));
        }
        let identity = state
            .identity
            .as_mut()
            .ok_or_else(|| StoreError::MissingProfile(String::new()))?;
        identity.merge(patch);
        let updated = identity.clone();
        state.writes += 1;
        Ok(updated)
    }
}
