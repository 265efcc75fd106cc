// Library surface for the binary, headless integration tests and reuse.
// The TUI (App, screens) stays in main.rs.
pub mod app_dirs;
pub mod audio;
pub mod catalog;
pub mod clock;
pub mod config;
pub mod controller;
pub mod effects;
pub mod error;
pub mod history;
pub mod identity;
pub mod logger;
pub mod piano;
pub mod profile_db;
pub mod runtime;
pub mod scoring;
pub mod session;
pub mod timer;

pub use controller::{ClaimOutcome, LoadOutcome, SessionController, SessionEvent, SessionObserver};
pub use error::{SessionError, StoreError};
pub use session::{GameSession, SessionSnapshot, SessionState};
