use crate::catalog::Track;
use crate::config::{GameSettings, SettingsOverrides};
use crate::piano::Note;
use crate::scoring::{
    compute_rewards, elapsed_between, keys_per_minute, Rewards, RECENT_WINDOW,
};
use serde::Serialize;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::SystemTime;

static NEXT_SESSION: AtomicU64 = AtomicU64::new(1);

/// Opaque per-session token, never reused within a process
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct SessionId(String);

impl SessionId {
    pub fn generate() -> Self {
        let seq = NEXT_SESSION.fetch_add(1, Ordering::Relaxed);
        let salt: u32 = rand::random();
        SessionId(format!("s{seq:06}-{salt:08x}"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, strum_macros::Display)]
pub enum SessionState {
    #[default]
    Idle,
    Loading,
    Playing,
    Paused,
    Completed,
    Error,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Score {
    pub current: u64,
    pub combo: u32,
    pub max_combo: u32,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Stats {
    pub total_keys: u64,
    pub keys_per_minute: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Keystroke {
    pub key: Note,
    pub timestamp: SystemTime,
    pub points: u32,
}

/// What the caller learns from an accepted keystroke
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeystrokeOutcome {
    pub total_score: u64,
    pub points: u32,
    pub combo: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// Not playing; nothing changed
    Ignored,
    Progress,
    /// Elapsed time reached the track duration and the session ended
    Completed,
}

/// Read model handed to the UI
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionSnapshot {
    pub session_id: Option<SessionId>,
    pub state: SessionState,
    pub track: Option<Track>,
    pub started_at: Option<SystemTime>,
    pub elapsed_seconds: f64,
    pub progress_percent: f64,
    pub duration_secs: u32,
    pub score: Score,
    pub stats: Stats,
    pub recent_keystrokes: Vec<Keystroke>,
    pub keystroke_count: usize,
    pub rewards: Rewards,
    pub settings: GameSettings,
    pub error: Option<String>,
}

/// Final numbers of a completed session
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionSummary {
    pub session_id: SessionId,
    pub track_id: String,
    pub track_title: String,
    pub score: u64,
    pub max_combo: u32,
    pub total_keys: u64,
    pub keys_per_minute: u32,
    pub elapsed_seconds: f64,
    pub rewards: Rewards,
}

/// One play attempt, from start to completion or reset.
///
/// Every mutation takes the current time explicitly; commands issued in a
/// state that does not allow them return `false`/`None` and change nothing.
#[derive(Debug, Clone, Default)]
pub struct GameSession {
    state: SessionState,
    session_id: Option<SessionId>,
    track_id: Option<String>,
    track: Option<Track>,
    started_at: Option<SystemTime>,
    elapsed_seconds: f64,
    progress_percent: f64,
    duration_secs: u32,
    score: Score,
    stats: Stats,
    keystrokes: Vec<Keystroke>,
    rewards: Rewards,
    settings: GameSettings,
    error: Option<String>,
}

impl GameSession {
    pub fn new(settings: GameSettings) -> Self {
        Self {
            settings,
            ..Self::default()
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn session_id(&self) -> Option<&SessionId> {
        self.session_id.as_ref()
    }

    /// Track requested by the current start, resolved or not
    pub fn track_id(&self) -> Option<&str> {
        self.track_id.as_deref()
    }

    pub fn track(&self) -> Option<&Track> {
        self.track.as_ref()
    }

    pub fn started_at(&self) -> Option<SystemTime> {
        self.started_at
    }

    pub fn score(&self) -> Score {
        self.score
    }

    pub fn stats(&self) -> Stats {
        self.stats
    }

    pub fn rewards(&self) -> Rewards {
        self.rewards
    }

    pub fn settings(&self) -> GameSettings {
        self.settings
    }

    pub fn set_settings(&mut self, settings: GameSettings) {
        self.settings = settings;
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn elapsed_seconds(&self) -> f64 {
        self.elapsed_seconds
    }

    pub fn progress_percent(&self) -> f64 {
        self.progress_percent
    }

    pub fn keystrokes(&self) -> &[Keystroke] {
        &self.keystrokes
    }

    pub fn recent_keystrokes(&self) -> &[Keystroke] {
        let from = self.keystrokes.len().saturating_sub(RECENT_WINDOW);
        &self.keystrokes[from..]
    }

    pub fn is_current(&self, id: &SessionId) -> bool {
        self.session_id.as_ref() == Some(id)
    }

    pub fn can_claim(&self) -> bool {
        self.state == SessionState::Completed && !self.rewards.claimed
    }

    /// Enters `Loading` for a fresh session, superseding whatever was running
    pub fn begin(&mut self, session_id: SessionId, track_id: &str, overrides: &SettingsOverrides) {
        let settings = self.settings.merged(overrides);
        *self = Self::new(settings);
        self.session_id = Some(session_id);
        self.track_id = Some(track_id.to_string());
        self.state = SessionState::Loading;
    }

    /// Commits the load for `session_id`. Returns false when that session is
    /// no longer the one loading (reset or superseded meanwhile).
    pub fn finish_loading(&mut self, session_id: &SessionId, track: Track, now: SystemTime) -> bool {
        if self.state != SessionState::Loading || !self.is_current(session_id) {
            return false;
        }
        self.duration_secs = track.duration_secs;
        self.track = Some(track);
        self.started_at = Some(now);
        self.elapsed_seconds = 0.0;
        self.progress_percent = 0.0;
        self.score = Score::default();
        self.stats = Stats::default();
        self.keystrokes.clear();
        self.rewards = Rewards::default();
        self.error = None;
        self.state = SessionState::Playing;
        true
    }

    pub fn fail_loading(&mut self, session_id: &SessionId, message: impl Into<String>) -> bool {
        if self.state != SessionState::Loading || !self.is_current(session_id) {
            return false;
        }
        self.error = Some(message.into());
        self.state = SessionState::Error;
        true
    }

    pub fn keystroke(&mut self, key: Note, points: u32, now: SystemTime) -> Option<KeystrokeOutcome> {
        if self.state != SessionState::Playing || self.session_id.is_none() {
            return None;
        }
        let started_at = self.started_at?;

        self.keystrokes.push(Keystroke {
            key,
            timestamp: now,
            points,
        });

        self.stats.total_keys += 1;
        self.stats.keys_per_minute =
            keys_per_minute(self.stats.total_keys, elapsed_between(started_at, now));

        self.score.current += points as u64;
        self.score.combo += 1;
        self.score.max_combo = self.score.max_combo.max(self.score.combo);

        Some(KeystrokeOutcome {
            total_score: self.score.current,
            points,
            combo: self.score.combo,
        })
    }

    pub fn pause(&mut self) -> bool {
        if self.state != SessionState::Playing {
            return false;
        }
        self.state = SessionState::Paused;
        true
    }

    pub fn resume(&mut self) -> bool {
        if self.state != SessionState::Paused {
            return false;
        }
        self.state = SessionState::Playing;
        true
    }

    /// Finishes a playing session and computes its rewards, once
    pub fn end(&mut self) -> bool {
        if self.state != SessionState::Playing {
            return false;
        }
        self.rewards = compute_rewards(self.score.current, self.score.max_combo);
        self.state = SessionState::Completed;
        true
    }

    /// Recomputes progress; ends the session once the track duration is reached
    pub fn tick(&mut self, now: SystemTime) -> TickOutcome {
        let Some(started_at) = self.started_at else {
            return TickOutcome::Ignored;
        };
        if self.state != SessionState::Playing {
            return TickOutcome::Ignored;
        }

        self.elapsed_seconds = elapsed_between(started_at, now).as_secs_f64();
        self.progress_percent = if self.duration_secs > 0 {
            100.0 * self.elapsed_seconds / self.duration_secs as f64
        } else {
            0.0
        };

        if self.duration_secs > 0 && self.elapsed_seconds >= self.duration_secs as f64 {
            self.end();
            TickOutcome::Completed
        } else {
            TickOutcome::Progress
        }
    }

    pub fn mark_claimed(&mut self) -> bool {
        if !self.can_claim() {
            return false;
        }
        self.rewards.claimed = true;
        true
    }

    /// Back to `Idle`; settings carry over
    pub fn reset(&mut self) {
        *self = Self::new(self.settings);
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            session_id: self.session_id.clone(),
            state: self.state,
            track: self.track.clone(),
            started_at: self.started_at,
            elapsed_seconds: self.elapsed_seconds,
            progress_percent: self.progress_percent,
            duration_secs: self.duration_secs,
            score: self.score,
            stats: self.stats,
            recent_keystrokes: self.recent_keystrokes().to_vec(),
            keystroke_count: self.keystrokes.len(),
            rewards: self.rewards,
            settings: self.settings,
            error: self.error.clone(),
        }
    }

    /// Only available once the session has completed
    pub fn summary(&self) -> Option<SessionSummary> {
        if self.state != SessionState::Completed {
            return None;
        }
        Some(SessionSummary {
            session_id: self.session_id.clone()?,
            track_id: self.track_id.clone().unwrap_or_default(),
            track_title: self
                .track
                .as_ref()
                .map(|t| t.title.clone())
                .unwrap_or_default(),
            score: self.score.current,
            max_combo: self.score.max_combo,
            total_keys: self.stats.total_keys,
            keys_per_minute: self.stats.keys_per_minute,
            elapsed_seconds: self.elapsed_seconds,
            rewards: self.rewards,
        })
    }
}
