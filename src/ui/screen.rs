use ivory::session::SessionState;
use ratatui::{buffer::Buffer, layout::Rect};

use crate::{
    ui::{render_library, render_profile, render_session},
    App, AppState,
};

/// A UI Screen boundary: renders its body and names the keys it answers to
pub trait Screen {
    fn render(&self, app: &App, area: Rect, buf: &mut Buffer);
    fn legend(&self, app: &App) -> String;
}

/// Track list with search
pub struct LibraryScreen;

impl Screen for LibraryScreen {
    fn render(&self, app: &App, area: Rect, buf: &mut Buffer) {
        render_library(app, area, buf);
    }

    fn legend(&self, app: &App) -> String {
        if app.searching {
            "type to search / (enter) done / (esc) done".to_string()
        } else {
            "(↑/↓) select / (enter) play / (/) search / (p)rofile / (F2-F5) settings / (esc) quit"
                .to_string()
        }
    }
}

/// The piano itself
pub struct SessionScreen;

impl Screen for SessionScreen {
    fn render(&self, app: &App, area: Rect, buf: &mut Buffer) {
        render_session(app, area, buf);
    }

    fn legend(&self, app: &App) -> String {
        match app.snapshot.state {
            SessionState::Loading | SessionState::Idle => "(esc) cancel".to_string(),
            SessionState::Playing => {
                "play with a-; and w e t y u o p / (space) pause / (enter) finish / (esc) leave"
                    .to_string()
            }
            SessionState::Paused => "(space) resume / (esc) leave".to_string(),
            SessionState::Completed => {
                if app.snapshot.rewards.claimed {
                    "(r)estart / (esc) library".to_string()
                } else {
                    "(c)laim / (r)estart / (esc) library".to_string()
                }
            }
            SessionState::Error => "(r)etry / (esc) library".to_string(),
        }
    }
}

/// Balances and recent games of the signed-in player
pub struct ProfileScreen;

impl Screen for ProfileScreen {
    fn render(&self, app: &App, area: Rect, buf: &mut Buffer) {
        render_profile(app, area, buf);
    }

    fn legend(&self, _app: &App) -> String {
        "(b)ack / (q)uit".to_string()
    }
}

/// Helper to construct the appropriate screen for the current state
pub fn current_screen(state: AppState) -> Box<dyn Screen> {
    match state {
        AppState::Library => Box::new(LibraryScreen),
        AppState::Session => Box::new(SessionScreen),
        AppState::Profile => Box::new(ProfileScreen),
    }
}
