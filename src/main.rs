mod ui;

use clap::{error::ErrorKind, CommandFactory, Parser};
use crossterm::{
    event::{KeyCode, KeyEvent, KeyModifiers},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
    tty::IsTty,
};
use ivory::{
    app_dirs::AppDirs,
    audio::NoteLog,
    catalog::{BuiltinCatalog, MusicCatalog, Track},
    config::{Config, ConfigStore, FileConfigStore, GameSettings, SettingsOverrides},
    controller::{ClaimOutcome, ControllerOptions, PendingStart, SessionController},
    effects::StageEffects,
    history::{ResultRow, ResultsLog},
    identity::Identity,
    logger::Logger,
    piano::PianoLayout,
    profile_db::SqliteIdentityStore,
    runtime::{AppEvent, AppEventSource, CrosstermEventSource, FixedTicker, Runner, Ticker},
    session::{SessionSnapshot, SessionState},
};
use ratatui::{
    backend::{Backend, CrosstermBackend},
    Frame, Terminal,
};
use std::{
    error::Error,
    io::{self, stdin, Write},
    sync::Arc,
    time::{Duration, Instant, SystemTime},
};
use time_humanize::HumanTime;

const TICK_RATE_MS: u64 = 100;
const NOTE_SUSTAIN: Duration = Duration::from_millis(400);
/// Rows of `results.csv` shown on the profile screen
pub const SESSION_LOG_ROWS: usize = 5;

/// play the piano in your terminal
#[derive(Parser, Debug, Clone, Default)]
#[clap(
    version,
    about,
    long_about = "Play along to tracks on your computer keyboard: keep the combo going, watch the progress bar, and claim coins and experience for your profile when the track ends."
)]
pub struct Cli {
    /// track id to start right away
    #[clap(short = 't', long)]
    track: Option<String>,

    /// profile to play as
    #[clap(short = 'u', long)]
    user: Option<String>,

    /// mute notes for this run
    #[clap(long)]
    no_sound: bool,

    /// disable combo effects for this run
    #[clap(long)]
    no_effects: bool,

    /// hide note names on the keyboard
    #[clap(long)]
    hide_notes: bool,

    /// hide the on-screen keyboard
    #[clap(long)]
    hide_keyboard: bool,

    /// track loading latency in milliseconds
    #[clap(long)]
    latency_ms: Option<u64>,

    /// print the track catalog and exit
    #[clap(long)]
    list: bool,

    /// print tracks matching QUERY and exit
    #[clap(long, value_name = "QUERY")]
    search: Option<String>,

    /// print the player profile and exit
    #[clap(long)]
    profile: bool,
}

impl Cli {
    /// Run-only settings; never written back to the config file
    fn overrides(&self) -> SettingsOverrides {
        let off = |flag: bool| flag.then_some(false);
        SettingsOverrides {
            sound_enabled: off(self.no_sound),
            visual_effects: off(self.no_effects),
            show_notes: off(self.hide_notes),
            show_keyboard: off(self.hide_keyboard),
        }
    }

    fn apply_to(&self, config: &mut Config) {
        if let Some(user) = &self.user {
            config.username = user.clone();
        }
        if let Some(ms) = self.latency_ms {
            config.load_latency_ms = ms;
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppState {
    Library,
    Session,
    Profile,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Quit,
}

/// Preferences toggled with the function keys
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum_macros::Display)]
pub enum Setting {
    #[strum(serialize = "sound")]
    Sound,
    #[strum(serialize = "effects")]
    Effects,
    #[strum(serialize = "note names")]
    Notes,
    #[strum(serialize = "keyboard")]
    Keyboard,
}

impl Setting {
    fn from_function_key(n: u8) -> Option<Self> {
        match n {
            2 => Some(Self::Sound),
            3 => Some(Self::Effects),
            4 => Some(Self::Notes),
            5 => Some(Self::Keyboard),
            _ => None,
        }
    }

    fn enabled(self, settings: &GameSettings) -> bool {
        match self {
            Self::Sound => settings.sound_enabled,
            Self::Effects => settings.visual_effects,
            Self::Notes => settings.show_notes,
            Self::Keyboard => settings.show_keyboard,
        }
    }

    fn flipped(self, current: &GameSettings) -> SettingsOverrides {
        let mut overrides = SettingsOverrides::default();
        match self {
            Self::Sound => overrides.sound_enabled = Some(!current.sound_enabled),
            Self::Effects => overrides.visual_effects = Some(!current.visual_effects),
            Self::Notes => overrides.show_notes = Some(!current.show_notes),
            Self::Keyboard => overrides.show_keyboard = Some(!current.show_keyboard),
        }
        overrides
    }
}

pub struct App {
    pub controller: SessionController,
    pub catalog: Arc<BuiltinCatalog>,
    pub audio: Arc<NoteLog>,
    pub layout: PianoLayout,
    pub config: Config,
    config_store: Option<Box<dyn ConfigStore>>,
    pub state: AppState,
    pub query: String,
    pub searching: bool,
    pub results: Vec<Track>,
    pub selected: usize,
    pub pending: Option<PendingStart>,
    pub current_track: Option<String>,
    pub snapshot: SessionSnapshot,
    pub profile: Option<Identity>,
    results_log: Option<Arc<ResultsLog>>,
    pub session_log: Vec<ResultRow>,
    pub effects: StageEffects,
    pub status: Option<String>,
}

impl App {
    pub fn new(
        controller: SessionController,
        catalog: Arc<BuiltinCatalog>,
        audio: Arc<NoteLog>,
        config: Config,
        config_store: Option<Box<dyn ConfigStore>>,
    ) -> Self {
        let snapshot = controller.snapshot();
        let profile = controller.current_identity();
        Self {
            results: catalog.tracks().to_vec(),
            controller,
            catalog,
            audio,
            layout: PianoLayout::standard(),
            config,
            config_store,
            state: AppState::Library,
            query: String::new(),
            searching: false,
            selected: 0,
            pending: None,
            current_track: None,
            snapshot,
            profile,
            results_log: None,
            session_log: Vec::new(),
            effects: StageEffects::default(),
            status: None,
        }
    }

    pub fn with_results_log(mut self, log: Arc<ResultsLog>) -> Self {
        self.results_log = Some(log);
        self
    }

    pub fn selected_track(&self) -> Option<&Track> {
        self.results.get(self.selected)
    }

    pub fn refresh_results(&mut self) {
        self.results = if self.query.trim().is_empty() {
            self.catalog.tracks().to_vec()
        } else {
            self.catalog.search_tracks(&self.query)
        };
        self.selected = self.selected.min(self.results.len().saturating_sub(1));
    }

    pub fn start_track(&mut self, track_id: &str) {
        self.effects.clear();
        self.status = None;
        match self.controller.start(track_id, SettingsOverrides::default()) {
            Ok(pending) => {
                self.pending = Some(pending);
                self.current_track = Some(track_id.to_string());
                self.state = AppState::Session;
            }
            Err(e) => self.status = Some(e.to_string()),
        }
        self.sync();
    }

    fn restart(&mut self) {
        if let Some(track_id) = self.current_track.clone() {
            self.start_track(&track_id);
        }
    }

    fn claim(&mut self) {
        let rewards = self.snapshot.rewards;
        match self.controller.claim_rewards() {
            Ok(ClaimOutcome::Credited(identity)) => {
                self.status = Some(format!(
                    "claimed {} coins and {} xp",
                    rewards.total_coins(),
                    rewards.experience
                ));
                self.profile = Some(identity);
            }
            Ok(ClaimOutcome::Ignored) => {}
            Err(e) => self.status = Some(e.to_string()),
        }
        self.sync();
    }

    fn toggle_setting(&mut self, setting: Setting) {
        let overrides = setting.flipped(&self.controller.settings());
        let updated = self.controller.update_settings(overrides);
        self.config.settings = self.config.settings.merged(&overrides);
        if !updated.visual_effects {
            self.effects.clear();
        }

        if let Some(store) = &self.config_store {
            if let Err(e) = store.save(&self.config) {
                self.status = Some(format!("could not save settings: {e}"));
                return;
            }
        }
        let state = if setting.enabled(&updated) { "on" } else { "off" };
        self.status = Some(format!("{setting} {state}"));
        self.sync();
    }

    fn sync(&mut self) {
        self.snapshot = self.controller.snapshot();
    }

    /// Polls the pending load, releases rung-out notes and steps the effects
    pub fn on_tick(&mut self, now: SystemTime, dt: f64) {
        if self.pending.as_ref().is_some_and(|p| p.is_finished()) {
            if let Some(pending) = self.pending.take() {
                if let Err(e) = pending.wait() {
                    self.status = Some(e.to_string());
                }
            }
        }
        self.audio.release_older_than(NOTE_SUSTAIN, now);
        self.effects.update(dt);
        self.sync();
    }

    pub fn on_key(&mut self, key: KeyEvent) -> Flow {
        if key.modifiers.contains(KeyModifiers::CONTROL) && key.code == KeyCode::Char('c') {
            return Flow::Quit;
        }

        let flow = match self.state {
            AppState::Library => self.on_library_key(key),
            AppState::Session => self.on_session_key(key),
            AppState::Profile => self.on_profile_key(key),
        };
        self.sync();
        flow
    }

    fn on_library_key(&mut self, key: KeyEvent) -> Flow {
        if self.searching {
            match key.code {
                KeyCode::Char(c) => {
                    self.query.push(c);
                    self.selected = 0;
                    self.refresh_results();
                }
                KeyCode::Backspace => {
                    self.query.pop();
                    self.refresh_results();
                }
                KeyCode::Enter | KeyCode::Esc => self.searching = false,
                _ => {}
            }
            return Flow::Continue;
        }

        match key.code {
            KeyCode::Esc | KeyCode::Char('q') => return Flow::Quit,
            KeyCode::Up => self.selected = self.selected.saturating_sub(1),
            KeyCode::Down => {
                if self.selected + 1 < self.results.len() {
                    self.selected += 1;
                }
            }
            KeyCode::Char('/') => {
                self.searching = true;
                self.status = None;
            }
            KeyCode::Char('p') => self.open_profile(),
            KeyCode::Enter => {
                if let Some(id) = self.selected_track().map(|t| t.id.clone()) {
                    self.start_track(&id);
                }
            }
            KeyCode::F(n) => {
                if let Some(setting) = Setting::from_function_key(n) {
                    self.toggle_setting(setting);
                }
            }
            _ => {}
        }
        Flow::Continue
    }

    fn on_session_key(&mut self, key: KeyEvent) -> Flow {
        match key.code {
            KeyCode::Esc => {
                self.controller.reset();
                self.pending = None;
                self.effects.clear();
                self.status = None;
                self.state = AppState::Library;
            }
            KeyCode::Char(' ') => {
                if !self.controller.pause() {
                    self.controller.resume();
                }
            }
            KeyCode::Enter => match self.controller.state() {
                SessionState::Playing => {
                    self.controller.end();
                }
                SessionState::Completed | SessionState::Error => self.restart(),
                _ => {}
            },
            KeyCode::F(n) => {
                if let Some(setting) = Setting::from_function_key(n) {
                    self.toggle_setting(setting);
                }
            }
            KeyCode::Char(c) => match self.layout.note_for_key(c) {
                Some(note) => {
                    if let Some(outcome) = self.controller.keystroke(note) {
                        if self.snapshot.settings.visual_effects {
                            self.effects.on_combo(outcome.combo);
                        }
                    }
                }
                None => match c {
                    'c' => self.claim(),
                    'r' => {
                        if self.controller.state() != SessionState::Playing {
                            self.restart();
                        }
                    }
                    _ => {}
                },
            },
            _ => {}
        }
        Flow::Continue
    }

    fn open_profile(&mut self) {
        self.profile = self.controller.current_identity();
        let rows = self
            .results_log
            .as_ref()
            .map(|log| log.recent(SESSION_LOG_ROWS));
        self.session_log = match rows {
            Some(Ok(rows)) => rows,
            Some(Err(e)) => {
                self.status = Some(format!("could not read results: {e}"));
                Vec::new()
            }
            None => Vec::new(),
        };
        self.state = AppState::Profile;
    }

    fn on_profile_key(&mut self, key: KeyEvent) -> Flow {
        match key.code {
            KeyCode::Esc | KeyCode::Char('b') | KeyCode::Backspace => {
                self.state = AppState::Library;
            }
            KeyCode::Char('q') => return Flow::Quit,
            _ => {}
        }
        Flow::Continue
    }
}

fn print_tracks(out: &mut impl Write, tracks: &[Track]) -> io::Result<()> {
    writeln!(
        out,
        "{:<18} {:<28} {:<22} {:>6}  {:<8} {}",
        "ID", "TITLE", "ARTIST", "LENGTH", "LEVEL", "GENRE"
    )?;
    for t in tracks {
        let length = if t.duration_secs == 0 {
            "free".to_string()
        } else {
            format!("{}:{:02}", t.duration_secs / 60, t.duration_secs % 60)
        };
        writeln!(
            out,
            "{:<18} {:<28} {:<22} {:>6}  {:<8} {}",
            t.id, t.title, t.artist, length, t.difficulty, t.genre
        )?;
    }
    Ok(())
}

fn print_profile(out: &mut impl Write, identity: &Identity) -> io::Result<()> {
    writeln!(out, "player:      {}", identity.username)?;
    writeln!(out, "level:       {}", identity.level())?;
    writeln!(out, "experience:  {}", identity.experience)?;
    writeln!(
        out,
        "coins:       {} available / {} earned",
        identity.coins_available, identity.coins_total
    )?;
    writeln!(out, "best score:  {}", identity.best_score)?;
    writeln!(out, "games:       {}", identity.total_games)?;
    for game in &identity.recent_games {
        writeln!(
            out,
            "  {:<18} {:>7} pts  x{:<4} +{} coins  {}",
            game.track_id,
            game.score,
            game.max_combo,
            game.coins_earned,
            played_ago(game.played_at)
        )?;
    }
    Ok(())
}

pub fn played_ago(played_at: chrono::DateTime<chrono::Utc>) -> String {
    let age = chrono::Utc::now()
        .signed_duration_since(played_at)
        .num_seconds()
        .max(0);
    HumanTime::from_seconds(-age).to_string()
}

fn main() -> Result<(), Box<dyn Error>> {
    let cli = Cli::parse();

    let config_store = FileConfigStore::new();
    let mut config = config_store.load();
    cli.apply_to(&mut config);

    let catalog = Arc::new(match &config.catalog_path {
        Some(path) => BuiltinCatalog::from_path(path)?,
        None => BuiltinCatalog::load()?,
    });

    if cli.list || cli.search.is_some() {
        let tracks = match &cli.search {
            Some(query) => catalog.search_tracks(query),
            None => catalog.tracks().to_vec(),
        };
        print_tracks(&mut io::stdout(), &tracks)?;
        return Ok(());
    }

    let db_path = AppDirs::profiles_db_path().ok_or("could not resolve a state directory")?;
    let identity = Arc::new(SqliteIdentityStore::open(&db_path, &config.username)?);

    if cli.profile {
        print_profile(&mut io::stdout(), &identity.load()?)?;
        return Ok(());
    }

    if !stdin().is_tty() {
        let mut cmd = Cli::command();
        cmd.error(ErrorKind::Io, "stdin must be a tty").exit();
    }

    let logger = AppDirs::log_path()
        .and_then(|p| Logger::append_to(rand::random::<u32>() as u64, p).ok())
        .unwrap_or_else(Logger::discard);
    logger.info(
        "app",
        "boot",
        &format!("player {:?}, catalog of {} tracks", config.username, catalog.len()),
    );

    let audio = Arc::new(NoteLog::new());
    let mut options = ControllerOptions::from(&config);
    options.settings = config.settings.merged(&cli.overrides());

    let mut builder = SessionController::builder(identity, catalog.clone())
        .audio(audio.clone())
        .logger(logger.clone())
        .options(options);
    let results_log = AppDirs::results_log_path()
        .map(|path| Arc::new(ResultsLog::new(path).with_logger(logger.clone())));
    if let Some(log) = &results_log {
        builder = builder.observer(log.clone());
    }
    let controller = builder.build();

    let mut app = App::new(controller, catalog, audio, config, Some(Box::new(config_store)));
    if let Some(log) = results_log {
        app = app.with_results_log(log);
    }
    if let Some(track) = &cli.track {
        app.start_track(track);
    }

    enable_raw_mode()?;

    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let runner = Runner::new(
        CrosstermEventSource::new(),
        FixedTicker::new(Duration::from_millis(TICK_RATE_MS)),
    );
    let result = start_tui(&mut terminal, &mut app, &runner);

    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    result
}

fn start_tui<B: Backend, E: AppEventSource, T: Ticker>(
    terminal: &mut Terminal<B>,
    app: &mut App,
    runner: &Runner<E, T>,
) -> Result<(), Box<dyn Error>> {
    let size = terminal.size()?;
    app.effects.resize(size.width, size.height);
    let mut last_step = Instant::now();

    loop {
        terminal.draw(|f| ui(app, f))?;

        let flow = match runner.step() {
            AppEvent::Key(key) => app.on_key(key),
            AppEvent::Resize(width, height) => {
                app.effects.resize(width, height);
                Flow::Continue
            }
            AppEvent::Tick => Flow::Continue,
        };
        if flow == Flow::Quit {
            break;
        }

        // keys can arrive faster than the tick interval; step on every event
        let now = Instant::now();
        app.on_tick(SystemTime::now(), now.duration_since(last_step).as_secs_f64());
        last_step = now;
    }

    app.controller.reset();
    Ok(())
}

fn ui(app: &App, f: &mut Frame) {
    f.render_widget(app, f.area());
}
