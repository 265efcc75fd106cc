// Drives SessionController end to end with a hand-driven clock and in-memory
// collaborators, covering the session's lifecycle guarantees.

use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use assert_matches::assert_matches;
use ivory::catalog::{BuiltinCatalog, Difficulty, Track};
use ivory::clock::{Clock, ManualClock};
use ivory::config::{GameSettings, SettingsOverrides};
use ivory::controller::{ControllerOptions, SessionEvent, SessionObserver};
use ivory::history::ResultsLog;
use ivory::identity::{Identity, IdentityStore, MemoryIdentityStore};
use ivory::piano::{Note, PitchClass};
use ivory::profile_db::SqliteIdentityStore;
use ivory::{ClaimOutcome, LoadOutcome, SessionController, SessionError, SessionState};

fn catalog() -> Arc<BuiltinCatalog> {
    let track = |id: &str, duration_secs| Track {
        id: id.into(),
        title: id.to_uppercase(),
        artist: "Test Ensemble".into(),
        duration_secs,
        genre: "test".into(),
        difficulty: Difficulty::Medium,
    };
    Arc::new(BuiltinCatalog::from_tracks(vec![track("ten", 10), track("open", 0)]).unwrap())
}

fn options() -> ControllerOptions {
    ControllerOptions {
        load_latency: Duration::ZERO,
        tick_interval: Duration::from_millis(2),
        settings: GameSettings::default(),
    }
}

fn controller_with(
    identity: Arc<dyn IdentityStore>,
    clock: &ManualClock,
) -> SessionController {
    SessionController::builder(identity, catalog())
        .clock(Arc::new(clock.clone()))
        .options(options())
        .build()
}

fn start(controller: &SessionController, track_id: &str) {
    let pending = controller
        .start(track_id, SettingsOverrides::default())
        .unwrap();
    assert_eq!(pending.wait().unwrap(), LoadOutcome::Ready);
}

fn wait_for(controller: &SessionController, state: SessionState) {
    for _ in 0..500 {
        if controller.state() == state {
            return;
        }
        thread::sleep(Duration::from_millis(2));
    }
    panic!("session never reached {state}");
}

fn c4() -> Note {
    Note::new(PitchClass::C, 4)
}

#[test]
fn combo_tracks_keystrokes_and_bounds_max_combo() {
    let clock = ManualClock::default();
    let identity = Arc::new(MemoryIdentityStore::signed_in(Identity::new("ada")));
    let controller = controller_with(identity, &clock);
    start(&controller, "open");

    for n in 1..=40u32 {
        let outcome = controller.keystroke(c4()).unwrap();
        assert_eq!(outcome.combo, n);
        let snap = controller.snapshot();
        assert!(snap.score.max_combo >= snap.score.combo);
        assert_eq!(snap.score.combo as usize, snap.keystroke_count);
    }
    assert_eq!(controller.snapshot().recent_keystrokes.len(), 10);
}

#[test]
fn keystrokes_outside_playing_change_nothing() {
    let clock = ManualClock::default();
    let identity = Arc::new(MemoryIdentityStore::signed_in(Identity::new("ada")));
    let controller = controller_with(identity, &clock);

    // idle
    assert!(controller.keystroke(c4()).is_none());
    assert_eq!(controller.snapshot().keystroke_count, 0);

    start(&controller, "open");
    controller.keystroke(c4()).unwrap();
    let before = controller.snapshot();

    // paused
    controller.pause();
    assert!(controller.keystroke(c4()).is_none());
    let paused = controller.snapshot();
    assert_eq!(paused.score, before.score);
    assert_eq!(paused.stats, before.stats);
    assert_eq!(paused.keystroke_count, before.keystroke_count);

    // completed
    controller.resume();
    controller.end();
    let done = controller.snapshot();
    assert!(controller.keystroke(c4()).is_none());
    assert_eq!(controller.snapshot().score, done.score);

    // error
    let pending = controller
        .start("missing", SettingsOverrides::default())
        .unwrap();
    assert!(pending.wait().is_err());
    assert!(controller.keystroke(c4()).is_none());
    assert_eq!(controller.snapshot().keystroke_count, 0);
}

#[test]
fn second_end_keeps_rewards() {
    let clock = ManualClock::default();
    let identity = Arc::new(MemoryIdentityStore::signed_in(Identity::new("ada")));
    let controller = controller_with(identity, &clock);
    start(&controller, "open");
    for _ in 0..12 {
        controller.keystroke(c4());
    }

    assert!(controller.end());
    let first = controller.snapshot().rewards;
    assert!(!controller.end());
    assert_eq!(controller.snapshot().rewards, first);
}

#[test]
fn claiming_twice_credits_once() {
    let clock = ManualClock::default();
    let identity = Arc::new(MemoryIdentityStore::signed_in(Identity::new("ada")));
    let controller = controller_with(identity.clone(), &clock);
    start(&controller, "open");
    for _ in 0..100 {
        controller.keystroke(c4());
    }
    controller.end();

    assert_matches!(controller.claim_rewards(), Ok(ClaimOutcome::Credited(_)));
    assert_matches!(controller.claim_rewards(), Ok(ClaimOutcome::Ignored));
    assert!(controller.snapshot().rewards.claimed);

    let player = identity.current_identity().unwrap();
    // 1000 points: 10 coins + 20 combo bonus
    assert_eq!(player.coins_available, 30);
    assert_eq!(player.experience, 100);
    assert_eq!(identity.writes(), 1);
}

#[test]
fn reward_formula_for_2000_points_and_60_combo() {
    let clock = ManualClock::default();
    let identity = Arc::new(MemoryIdentityStore::signed_in(Identity::new("ada")));
    let controller = controller_with(identity, &clock);
    start(&controller, "open");

    for _ in 0..50 {
        controller.keystroke_with_points(c4(), 30);
    }
    for _ in 0..10 {
        controller.keystroke_with_points(c4(), 50);
    }
    let snap = controller.snapshot();
    assert_eq!(snap.score.current, 2000);
    assert_eq!(snap.score.max_combo, 60);

    controller.end();
    let rewards = controller.snapshot().rewards;
    assert_eq!(rewards.coins, 20);
    assert_eq!(rewards.experience, 200);
    assert_eq!(rewards.bonus_coins, 20);
    assert!(!rewards.claimed);
}

#[test]
fn keys_per_minute_after_thirty_seconds() {
    let clock = ManualClock::default();
    let identity = Arc::new(MemoryIdentityStore::signed_in(Identity::new("ada")));
    let controller = controller_with(identity, &clock);
    start(&controller, "open");
    let started = controller.snapshot().started_at.unwrap();

    for i in 0..15u64 {
        clock.set(started + Duration::from_secs(2 * (i + 1)));
        controller.keystroke(c4());
    }
    assert_eq!(clock.now(), started + Duration::from_secs(30));
    assert_eq!(controller.snapshot().stats.keys_per_minute, 30);
}

#[test]
fn session_completes_when_duration_elapses() {
    let clock = ManualClock::default();
    let identity = Arc::new(MemoryIdentityStore::signed_in(Identity::new("ada")));
    let controller = controller_with(identity, &clock);
    start(&controller, "ten");

    for _ in 0..30 {
        controller.keystroke(c4());
    }
    clock.advance(Duration::from_secs(5));
    thread::sleep(Duration::from_millis(20));
    assert_eq!(controller.state(), SessionState::Playing);
    assert!(controller.snapshot().progress_percent >= 50.0);

    clock.advance(Duration::from_secs(5));
    wait_for(&controller, SessionState::Completed);

    let snap = controller.snapshot();
    assert_eq!(snap.rewards.coins, 3);
    assert_eq!(snap.rewards.experience, 30);
    assert_eq!(snap.rewards.bonus_coins, 10);
}

#[test]
fn reset_clears_the_session_but_keeps_settings() {
    let clock = ManualClock::default();
    let identity = Arc::new(MemoryIdentityStore::signed_in(Identity::new("ada")));
    let controller = controller_with(identity, &clock);
    controller.update_settings(SettingsOverrides {
        sound_enabled: Some(false),
        ..SettingsOverrides::default()
    });

    start(&controller, "ten");
    for _ in 0..7 {
        controller.keystroke(c4());
    }
    controller.reset();

    let snap = controller.snapshot();
    assert_eq!(snap.state, SessionState::Idle);
    assert_eq!(snap.score.current, 0);
    assert_eq!(snap.keystroke_count, 0);
    assert!(snap.recent_keystrokes.is_empty());
    assert!(!snap.settings.sound_enabled);
}

#[test]
fn start_without_identity_is_rejected() {
    let clock = ManualClock::default();
    let controller = controller_with(Arc::new(MemoryIdentityStore::signed_out()), &clock);
    assert_matches!(
        controller.start("ten", SettingsOverrides::default()),
        Err(SessionError::PermissionDenied)
    );
    assert_eq!(controller.state(), SessionState::Idle);
}

#[test]
fn claims_race_from_many_threads() {
    let clock = ManualClock::default();
    let identity = Arc::new(MemoryIdentityStore::signed_in(Identity::new("ada")));
    let controller = controller_with(identity.clone(), &clock);
    start(&controller, "open");
    for _ in 0..50 {
        controller.keystroke(c4());
    }
    controller.end();

    let credited = Arc::new(Mutex::new(0));
    let handles: Vec<_> = (0..16)
        .map(|_| {
            let controller = controller.clone();
            let credited = credited.clone();
            thread::spawn(move || {
                if let Ok(ClaimOutcome::Credited(_)) = controller.claim_rewards() {
                    *credited.lock().unwrap() += 1;
                }
            })
        })
        .collect();
    for h in handles {
        h.join().unwrap();
    }

    assert_eq!(*credited.lock().unwrap(), 1);
    assert_eq!(identity.writes(), 1);
    assert_eq!(identity.current_identity().unwrap().coins_total, 25);
}

#[test]
fn claim_persists_to_sqlite_profile() {
    let clock = ManualClock::default();
    let store = Arc::new(SqliteIdentityStore::open_in_memory("ada").unwrap());
    let controller = controller_with(store.clone(), &clock);

    start(&controller, "open");
    for _ in 0..30 {
        controller.keystroke(c4());
    }
    controller.end();
    controller.claim_rewards().unwrap();

    let player = store.load().unwrap();
    assert_eq!(player.coins_available, 13);
    assert_eq!(player.experience, 30);
    assert_eq!(player.best_score, 300);
    assert_eq!(player.total_games, 1);
    assert_eq!(player.recent_games.len(), 1);
    assert_eq!(player.recent_games[0].track_id, "open");
    assert_eq!(store.game_count().unwrap(), 1);
}

#[derive(Default)]
struct Events(Mutex<Vec<String>>);

impl SessionObserver for Events {
    fn on_event(&self, event: &SessionEvent) {
        let name = match event {
            SessionEvent::Started { .. } => "started",
            SessionEvent::Completed(_) => "completed",
            SessionEvent::RewardsClaimed { .. } => "claimed",
            SessionEvent::Failed { .. } => "failed",
            SessionEvent::Reset => "reset",
        };
        self.0.lock().unwrap().push(name.to_string());
    }
}

#[test]
fn observers_see_the_whole_lifecycle_and_results_are_logged() {
    let dir = tempfile::tempdir().unwrap();
    let results = Arc::new(ResultsLog::new(dir.path().join("results.csv")));
    let events = Arc::new(Events::default());
    let clock = ManualClock::default();

    let controller = SessionController::builder(
        Arc::new(MemoryIdentityStore::signed_in(Identity::new("ada"))),
        catalog(),
    )
    .clock(Arc::new(clock.clone()))
    .options(options())
    .observer(events.clone())
    .observer(results.clone())
    .build();

    start(&controller, "ten");
    controller.keystroke(c4());
    clock.advance(Duration::from_secs(10));
    wait_for(&controller, SessionState::Completed);
    // completion is announced from the timer thread once the lock is released
    for _ in 0..500 {
        if events.0.lock().unwrap().len() == 2 {
            break;
        }
        thread::sleep(Duration::from_millis(2));
    }
    controller.claim_rewards().unwrap();
    controller.reset();

    assert_eq!(
        *events.0.lock().unwrap(),
        vec!["started", "completed", "claimed", "reset"]
    );
    let rows = results.read_all().unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].track_id, "ten");
    assert_eq!(rows[0].score, 10);
}
