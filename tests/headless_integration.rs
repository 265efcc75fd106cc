use std::sync::{mpsc, Arc};
use std::time::Duration;

use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use ivory::audio::NoteLog;
use ivory::catalog::BuiltinCatalog;
use ivory::clock::ManualClock;
use ivory::config::{GameSettings, SettingsOverrides};
use ivory::controller::ControllerOptions;
use ivory::identity::{Identity, MemoryIdentityStore};
use ivory::piano::PianoLayout;
use ivory::runtime::{AppEvent, FixedTicker, Runner, TestEventSource};
use ivory::{SessionController, SessionState};

// Headless integration using the runtime + controller without a TTY.
// Keys flow through Runner/TestEventSource exactly as the binary feeds them.

fn controller(clock: &ManualClock, audio: Arc<NoteLog>) -> SessionController {
    SessionController::builder(
        Arc::new(MemoryIdentityStore::signed_in(Identity::new("ada"))),
        Arc::new(BuiltinCatalog::load().unwrap()),
    )
    .audio(audio)
    .clock(Arc::new(clock.clone()))
    .options(ControllerOptions {
        load_latency: Duration::ZERO,
        tick_interval: Duration::from_millis(2),
        settings: GameSettings::default(),
    })
    .build()
}

fn send_keys(tx: &mpsc::Sender<AppEvent>, keys: &str) {
    for c in keys.chars() {
        tx.send(AppEvent::Key(KeyEvent::new(
            KeyCode::Char(c),
            KeyModifiers::NONE,
        )))
        .unwrap();
    }
}

#[test]
fn headless_playing_flow_scores_keys() {
    let clock = ManualClock::default();
    let audio = Arc::new(NoteLog::new());
    let controller = controller(&clock, audio.clone());
    let layout = PianoLayout::standard();

    controller
        .start("ode-to-joy", SettingsOverrides::default())
        .unwrap()
        .wait()
        .unwrap();

    let (tx, rx) = mpsc::channel();
    let runner = Runner::new(
        TestEventSource::new(rx),
        FixedTicker::new(Duration::from_millis(5)),
    );

    // "ode to joy": E E F G G F E D C C D E E D D
    send_keys(&tx, "ddfggfdsaasddss");
    // 'x' is not a piano key and must be ignored
    send_keys(&tx, "x");

    let mut ticks = 0;
    for _ in 0..100u32 {
        match runner.step() {
            AppEvent::Tick => {
                ticks += 1;
                if ticks > 2 {
                    break;
                }
            }
            AppEvent::Resize(..) => {}
            AppEvent::Key(key) => {
                if let KeyCode::Char(c) = key.code {
                    if let Some(note) = layout.note_for_key(c) {
                        controller.keystroke(note);
                    }
                }
            }
        }
    }

    let snap = controller.snapshot();
    assert_eq!(snap.state, SessionState::Playing);
    assert_eq!(snap.stats.total_keys, 15);
    assert_eq!(snap.score.current, 150);
    assert_eq!(snap.score.combo, 15);
    assert_eq!(audio.played().len(), 15);
    assert_eq!(audio.played()[0].name(), "E4");
}

#[test]
fn headless_timed_track_finishes_by_clock() {
    let clock = ManualClock::default();
    let controller = controller(&clock, Arc::new(NoteLog::new()));

    controller
        .start("warmup-30", SettingsOverrides::default())
        .unwrap()
        .wait()
        .unwrap();

    let (_tx, rx) = mpsc::channel();
    let runner = Runner::new(
        TestEventSource::new(rx),
        FixedTicker::new(Duration::from_millis(5)),
    );

    for _ in 0..200u32 {
        if let AppEvent::Tick = runner.step() {
            clock.advance(Duration::from_secs(1));
        }
        if controller.state() == SessionState::Completed {
            break;
        }
    }

    assert_eq!(
        controller.state(),
        SessionState::Completed,
        "timed track should finish once its duration has elapsed"
    );
    assert!(controller.snapshot().elapsed_seconds >= 30.0);
}

#[test]
fn headless_reset_while_loading_stays_idle() {
    let clock = ManualClock::default();
    let controller = SessionController::builder(
        Arc::new(MemoryIdentityStore::signed_in(Identity::new("ada"))),
        Arc::new(BuiltinCatalog::load().unwrap()),
    )
    .clock(Arc::new(clock.clone()))
    .options(ControllerOptions {
        load_latency: Duration::from_millis(40),
        tick_interval: Duration::from_millis(2),
        settings: GameSettings::default(),
    })
    .build();

    let pending = controller
        .start("fur-elise", SettingsOverrides::default())
        .unwrap();
    controller.reset();
    pending.wait().unwrap();

    assert_eq!(controller.state(), SessionState::Idle);
    assert!(controller.snapshot().track.is_none());
}
