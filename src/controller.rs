use crate::audio::{AudioEngine, NullAudio};
use crate::catalog::MusicCatalog;
use crate::clock::{Clock, SystemClock};
use crate::config::{Config, GameSettings, SettingsOverrides};
use crate::error::SessionError;
use crate::identity::{GameRecord, Identity, IdentityStore, ProfilePatch};
use crate::logger::Logger;
use crate::piano::Note;
use crate::scoring::POINTS_PER_KEY;
use crate::session::{
    GameSession, KeystrokeOutcome, SessionId, SessionSnapshot, SessionState, SessionSummary,
    TickOutcome,
};
use crate::timer::{ProgressTimer, TickControl};
use chrono::{DateTime, Utc};
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread::{self, JoinHandle};
use std::time::Duration;

const SUBSYSTEM: &str = "session";

/// Lifecycle notifications, delivered after the session lock is released
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    Started {
        session_id: SessionId,
        track_id: String,
    },
    Completed(SessionSummary),
    RewardsClaimed {
        session_id: SessionId,
        identity: Identity,
    },
    Failed {
        session_id: SessionId,
        message: String,
    },
    Reset,
}

pub trait SessionObserver: Send + Sync {
    fn on_event(&self, event: &SessionEvent);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadOutcome {
    /// The session is now playing
    Ready,
    /// A reset or a newer start took over while loading
    Superseded,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ClaimOutcome {
    Credited(Identity),
    /// Nothing to claim: not completed, or already claimed
    Ignored,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ControllerOptions {
    pub load_latency: Duration,
    pub tick_interval: Duration,
    pub settings: GameSettings,
}

impl Default for ControllerOptions {
    fn default() -> Self {
        Self::from(&Config::default())
    }
}

impl From<&Config> for ControllerOptions {
    fn from(cfg: &Config) -> Self {
        Self {
            load_latency: Duration::from_millis(cfg.load_latency_ms),
            tick_interval: Duration::from_millis(cfg.tick_interval_ms.max(1)),
            settings: cfg.settings,
        }
    }
}

/// A start that is still loading its track
#[derive(Debug)]
pub struct PendingStart {
    session_id: SessionId,
    track_id: String,
    handle: JoinHandle<Result<LoadOutcome, SessionError>>,
}

impl PendingStart {
    pub fn session_id(&self) -> &SessionId {
        &self.session_id
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    /// Blocks until the load has been committed, discarded or has failed
    pub fn wait(self) -> Result<LoadOutcome, SessionError> {
        self.handle.join().unwrap_or_else(|_| {
            Err(SessionError::LoadFailure {
                track_id: self.track_id,
                message: "loader thread panicked".to_string(),
            })
        })
    }
}

/// Everything guarded by the one session lock
struct Guarded {
    session: GameSession,
    timer: Option<ProgressTimer>,
    timer_epoch: u64,
}

struct Shared {
    guarded: Mutex<Guarded>,
    identity: Arc<dyn IdentityStore>,
    catalog: Arc<dyn MusicCatalog>,
    audio: Arc<dyn AudioEngine>,
    clock: Arc<dyn Clock>,
    logger: Logger,
    observers: Vec<Arc<dyn SessionObserver>>,
    options: ControllerOptions,
}

/// Owns one game session and serialises every command against it
#[derive(Clone)]
pub struct SessionController {
    shared: Arc<Shared>,
}

pub struct ControllerBuilder {
    identity: Arc<dyn IdentityStore>,
    catalog: Arc<dyn MusicCatalog>,
    audio: Arc<dyn AudioEngine>,
    clock: Arc<dyn Clock>,
    logger: Logger,
    observers: Vec<Arc<dyn SessionObserver>>,
    options: ControllerOptions,
}

impl ControllerBuilder {
    pub fn audio(mut self, audio: Arc<dyn AudioEngine>) -> Self {
        self.audio = audio;
        self
    }

    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn logger(mut self, logger: Logger) -> Self {
        self.logger = logger;
        self
    }

    pub fn observer(mut self, observer: Arc<dyn SessionObserver>) -> Self {
        self.observers.push(observer);
        self
    }

    pub fn options(mut self, options: ControllerOptions) -> Self {
        self.options = options;
        self
    }

    pub fn build(self) -> SessionController {
        SessionController {
            shared: Arc::new(Shared {
                guarded: Mutex::new(Guarded {
                    session: GameSession::new(self.options.settings),
                    timer: None,
                    timer_epoch: 0,
                }),
                identity: self.identity,
                catalog: self.catalog,
                audio: self.audio,
                clock: self.clock,
                logger: self.logger,
                observers: self.observers,
                options: self.options,
            }),
        }
    }
}

impl SessionController {
    pub fn builder(
        identity: Arc<dyn IdentityStore>,
        catalog: Arc<dyn MusicCatalog>,
    ) -> ControllerBuilder {
        ControllerBuilder {
            identity,
            catalog,
            audio: Arc::new(NullAudio),
            clock: Arc::new(SystemClock),
            logger: Logger::discard(),
            observers: Vec::new(),
            options: ControllerOptions::default(),
        }
    }

    /// Starts loading `track_id` for the signed-in player
    pub fn start(
        &self,
        track_id: &str,
        overrides: SettingsOverrides,
    ) -> Result<PendingStart, SessionError> {
        let shared = &self.shared;
        shared.require_identity("start")?;

        let session_id = SessionId::generate();
        {
            let mut g = shared.lock();
            shared.disarm(&mut g);
            g.session.begin(session_id.clone(), track_id, &overrides);
        }
        shared.logger.info(
            SUBSYSTEM,
            "start",
            &format!("{session_id} loading track {track_id:?}"),
        );

        let worker = Arc::clone(shared);
        let id = session_id.clone();
        let track = track_id.to_string();
        let handle = thread::spawn(move || worker.complete_load(&id, &track));

        Ok(PendingStart {
            session_id,
            track_id: track_id.to_string(),
            handle,
        })
    }

    pub fn keystroke(&self, note: Note) -> Option<KeystrokeOutcome> {
        self.keystroke_with_points(note, POINTS_PER_KEY)
    }

    pub fn keystroke_with_points(&self, note: Note, points: u32) -> Option<KeystrokeOutcome> {
        let shared = &self.shared;
        let (outcome, sound_enabled) = {
            let mut g = shared.lock();
            let now = shared.clock.now();
            (
                g.session.keystroke(note, points, now),
                g.session.settings().sound_enabled,
            )
        };

        match outcome {
            Some(outcome) => {
                if sound_enabled {
                    shared.audio.play_note(&note);
                }
                Some(outcome)
            }
            None => {
                shared
                    .logger
                    .debug(SUBSYSTEM, "keystroke", &format!("ignored {note}: not playing"));
                None
            }
        }
    }

    /// Lets the audio engine stop a note; has no bearing on the session
    pub fn release_note(&self, note: Note) {
        self.shared.audio.stop_note(&note);
    }

    pub fn pause(&self) -> bool {
        let shared = &self.shared;
        let mut g = shared.lock();
        if !g.session.pause() {
            shared.logger.debug(SUBSYSTEM, "pause", "ignored");
            return false;
        }
        shared.disarm(&mut g);
        shared.logger.info(SUBSYSTEM, "pause", "paused");
        true
    }

    pub fn resume(&self) -> bool {
        let shared = &self.shared;
        let mut g = shared.lock();
        if !g.session.resume() {
            shared.logger.debug(SUBSYSTEM, "resume", "ignored");
            return false;
        }
        shared.arm(&mut g);
        shared.logger.info(SUBSYSTEM, "resume", "playing");
        true
    }

    pub fn end(&self) -> bool {
        let shared = &self.shared;
        let summary = {
            let mut g = shared.lock();
            if !g.session.end() {
                shared.logger.debug(SUBSYSTEM, "end", "ignored");
                return false;
            }
            shared.disarm(&mut g);
            g.session.summary()
        };
        shared.dispatch(summary.map(SessionEvent::Completed).into_iter().collect());
        true
    }

    /// Credits the completed session's rewards to the signed-in player, once
    pub fn claim_rewards(&self) -> Result<ClaimOutcome, SessionError> {
        let shared = &self.shared;
        let (outcome, event) = {
            let mut g = shared.lock();
            if !g.session.can_claim() {
                shared.logger.debug(SUBSYSTEM, "claim", "ignored: nothing to claim");
                return Ok(ClaimOutcome::Ignored);
            }
            let Some(summary) = g.session.summary() else {
                return Ok(ClaimOutcome::Ignored);
            };
            shared.require_identity("claim")?;

            let patch = claim_patch(&summary, Utc::now());
            match shared.identity.apply_profile_delta(&patch) {
                Ok(updated) => {
                    g.session.mark_claimed();
                    let event = SessionEvent::RewardsClaimed {
                        session_id: summary.session_id.clone(),
                        identity: updated.clone(),
                    };
                    (ClaimOutcome::Credited(updated), event)
                }
                Err(e) => {
                    shared.logger.error(
                        SUBSYSTEM,
                        "claim",
                        &format!("{}: {e}", summary.session_id),
                    );
                    return Err(e.into());
                }
            }
        };

        shared.logger.info(SUBSYSTEM, "claim", "rewards credited");
        shared.dispatch(vec![event]);
        Ok(outcome)
    }

    pub fn reset(&self) {
        let shared = &self.shared;
        {
            let mut g = shared.lock();
            shared.disarm(&mut g);
            g.session.reset();
        }
        shared.logger.info(SUBSYSTEM, "reset", "idle");
        shared.dispatch(vec![SessionEvent::Reset]);
    }

    /// Applies preference changes to the live session and later ones
    pub fn update_settings(&self, overrides: SettingsOverrides) -> GameSettings {
        let mut g = self.shared.lock();
        let settings = g.session.settings().merged(&overrides);
        g.session.set_settings(settings);
        settings
    }

    pub fn settings(&self) -> GameSettings {
        self.shared.lock().session.settings()
    }

    pub fn state(&self) -> SessionState {
        self.shared.lock().session.state()
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        self.shared.lock().session.snapshot()
    }

    /// The signed-in player; a store failure is logged and reads as `None`
    pub fn current_identity(&self) -> Option<Identity> {
        match self.shared.identity.load_current() {
            Ok(identity) => identity,
            Err(e) => {
                self.shared
                    .logger
                    .error(SUBSYSTEM, "identity", &format!("profile read failed: {e}"));
                None
            }
        }
    }

    pub fn catalog(&self) -> &dyn MusicCatalog {
        self.shared.catalog.as_ref()
    }
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, Guarded> {
        self.guarded.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Separates "nobody signed in" from a store that could not be read
    fn require_identity(&self, action: &str) -> Result<Identity, SessionError> {
        match self.identity.load_current() {
            Ok(Some(identity)) => Ok(identity),
            Ok(None) => {
                self.logger
                    .warn(SUBSYSTEM, action, "rejected: no signed-in player");
                Err(SessionError::PermissionDenied)
            }
            Err(e) => {
                self.logger
                    .error(SUBSYSTEM, action, &format!("profile read failed: {e}"));
                Err(e.into())
            }
        }
    }

    fn complete_load(
        self: &Arc<Self>,
        session_id: &SessionId,
        track_id: &str,
    ) -> Result<LoadOutcome, SessionError> {
        if !self.options.load_latency.is_zero() {
            thread::sleep(self.options.load_latency);
        }
        let resolved = self.catalog.track_by_id(track_id);

        let (outcome, event) = {
            let mut g = self.lock();
            match resolved {
                Some(track) => {
                    let now = self.clock.now();
                    if g.session.finish_loading(session_id, track, now) {
                        self.arm(&mut g);
                        (
                            Ok(LoadOutcome::Ready),
                            Some(SessionEvent::Started {
                                session_id: session_id.clone(),
                                track_id: track_id.to_string(),
                            }),
                        )
                    } else {
                        (Ok(LoadOutcome::Superseded), None)
                    }
                }
                None => {
                    let message = format!("track {track_id:?} is not in the catalog");
                    if g.session.fail_loading(session_id, &message) {
                        (
                            Err(SessionError::LoadFailure {
                                track_id: track_id.to_string(),
                                message: message.clone(),
                            }),
                            Some(SessionEvent::Failed {
                                session_id: session_id.clone(),
                                message,
                            }),
                        )
                    } else {
                        (Ok(LoadOutcome::Superseded), None)
                    }
                }
            }
        };

        match &outcome {
            Ok(LoadOutcome::Ready) => {
                self.logger
                    .info(SUBSYSTEM, "load", &format!("{session_id} playing"))
            }
            Ok(LoadOutcome::Superseded) => self.logger.debug(
                SUBSYSTEM,
                "load",
                &format!("{session_id} discarded: no longer current"),
            ),
            Err(e) => self
                .logger
                .error(SUBSYSTEM, "load", &format!("{session_id}: {e}")),
        }
        self.dispatch(event.into_iter().collect());
        outcome
    }

    /// Starts a fresh progress timer for the current playing period
    fn arm(self: &Arc<Self>, g: &mut Guarded) {
        g.timer_epoch += 1;
        let epoch = g.timer_epoch;
        let weak = Arc::downgrade(self);
        g.timer = Some(ProgressTimer::start(self.options.tick_interval, move || {
            match weak.upgrade() {
                Some(shared) => shared.on_timer_tick(epoch),
                None => TickControl::Stop,
            }
        }));
    }

    fn disarm(&self, g: &mut Guarded) {
        g.timer_epoch += 1;
        if let Some(timer) = g.timer.take() {
            timer.cancel();
        }
    }

    fn on_timer_tick(&self, epoch: u64) -> TickControl {
        let summary = {
            let mut g = self.lock();
            if g.timer_epoch != epoch {
                return TickControl::Stop;
            }
            match g.session.tick(self.clock.now()) {
                TickOutcome::Progress => return TickControl::Continue,
                TickOutcome::Ignored => return TickControl::Stop,
                TickOutcome::Completed => {
                    self.disarm(&mut g);
                    g.session.summary()
                }
            }
        };

        self.logger
            .info(SUBSYSTEM, "tick", "track duration reached; session completed");
        self.dispatch(summary.map(SessionEvent::Completed).into_iter().collect());
        TickControl::Stop
    }

    fn dispatch(&self, events: Vec<SessionEvent>) {
        for event in &events {
            for observer in &self.observers {
                observer.on_event(event);
            }
        }
    }
}

/// Profile update crediting `summary`'s rewards on top of whatever is stored
pub fn claim_patch(summary: &SessionSummary, played_at: DateTime<Utc>) -> ProfilePatch {
    let rewards = summary.rewards;
    ProfilePatch {
        coins_delta: rewards.total_coins(),
        experience_delta: rewards.experience,
        games_delta: 1,
        best_score_candidate: Some(summary.score),
        game: Some(GameRecord {
            session_id: summary.session_id.to_string(),
            track_id: summary.track_id.clone(),
            score: summary.score,
            max_combo: summary.max_combo,
            coins_earned: rewards.total_coins(),
            experience_earned: rewards.experience,
            played_at,
        }),
    }
}
