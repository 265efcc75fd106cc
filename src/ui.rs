pub mod screen;

use ivory::{
    effects::StageEffects,
    piano::{KeyBinding, Note},
    session::SessionState,
};
use ratatui::{
    buffer::Buffer,
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Cell, Gauge, Paragraph, Row, Table, Widget, Wrap},
};
use unicode_width::UnicodeWidthStr;

use crate::{played_ago, App, SESSION_LOG_ROWS};
use screen::current_screen;

const HORIZONTAL_MARGIN: u16 = 2;
const VERTICAL_MARGIN: u16 = 1;
const WHITE_KEY_WIDTH: usize = 6;

const PARTICLE_COLORS: [Color; 6] = [
    Color::Yellow,
    Color::Magenta,
    Color::Cyan,
    Color::Green,
    Color::LightRed,
    Color::LightBlue,
];

impl Widget for &App {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .horizontal_margin(HORIZONTAL_MARGIN)
            .vertical_margin(VERTICAL_MARGIN)
            .constraints([
                Constraint::Min(1),
                Constraint::Length(1), // status
                Constraint::Length(1), // legend
            ])
            .split(area);

        let screen = current_screen(self.state);
        screen.render(self, chunks[0], buf);

        if let Some(status) = &self.status {
            Paragraph::new(Span::styled(
                status.as_str(),
                Style::default().fg(Color::Yellow),
            ))
            .alignment(Alignment::Center)
            .render(chunks[1], buf);
        }

        Paragraph::new(Span::styled(
            screen.legend(self),
            Style::default().add_modifier(Modifier::ITALIC),
        ))
        .render(chunks[2], buf);

        if self.effects.is_active() && self.snapshot.settings.visual_effects {
            render_effects(&self.effects, area, buf);
        }
    }
}

fn format_secs(secs: f64) -> String {
    let secs = secs.max(0.0) as u64;
    format!("{}:{:02}", secs / 60, secs % 60)
}

fn header_line(app: &App) -> Line<'static> {
    let bold = Style::default().add_modifier(Modifier::BOLD);
    match &app.profile {
        Some(p) => Line::from(vec![
            Span::styled("ivory", bold.fg(Color::Cyan)),
            Span::raw(format!(
                "  {}  lvl {}  {} coins  best {}",
                p.username,
                p.level(),
                p.coins_available,
                p.best_score
            )),
        ]),
        None => Line::from(vec![
            Span::styled("ivory", bold.fg(Color::Cyan)),
            Span::styled("  not signed in", Style::default().fg(Color::Red)),
        ]),
    }
}

pub fn render_library(app: &App, area: Rect, buf: &mut Buffer) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(1),
            Constraint::Length(1),
            Constraint::Min(3),
        ])
        .split(area);

    Paragraph::new(header_line(app)).render(chunks[0], buf);

    let search_style = if app.searching {
        Style::default().fg(Color::Yellow)
    } else {
        Style::default().add_modifier(Modifier::DIM)
    };
    let cursor = if app.searching { "_" } else { "" };
    Paragraph::new(Span::styled(
        format!("search: {}{cursor}", app.query),
        search_style,
    ))
    .render(chunks[1], buf);

    let visible = chunks[2].height.saturating_sub(3) as usize;
    let offset = app.selected.saturating_sub(visible.saturating_sub(1));

    let rows: Vec<Row> = app
        .results
        .iter()
        .enumerate()
        .skip(offset)
        .take(visible.max(1))
        .map(|(idx, t)| {
            let length = if t.duration_secs == 0 {
                "free".to_string()
            } else {
                format_secs(t.duration_secs as f64)
            };
            let row = Row::new(vec![
                Cell::from(t.title.clone()),
                Cell::from(t.artist.clone()),
                Cell::from(length),
                Cell::from(t.difficulty.to_string()),
                Cell::from(t.genre.clone()),
            ]);
            if idx == app.selected {
                row.style(
                    Style::default()
                        .bg(Color::DarkGray)
                        .add_modifier(Modifier::BOLD),
                )
            } else {
                row
            }
        })
        .collect();

    let header = Row::new(vec!["Title", "Artist", "Length", "Level", "Genre"]).style(
        Style::default()
            .fg(Color::Yellow)
            .add_modifier(Modifier::BOLD),
    );

    let title = if app.results.is_empty() {
        "Tracks (no matches)".to_string()
    } else {
        format!("Tracks ({})", app.results.len())
    };

    Table::new(
        rows,
        [
            Constraint::Percentage(32),
            Constraint::Percentage(26),
            Constraint::Length(7),
            Constraint::Length(7),
            Constraint::Min(8),
        ],
    )
    .header(header)
    .block(Block::default().borders(Borders::ALL).title(title))
    .render(chunks[2], buf);
}

pub fn render_session(app: &App, area: Rect, buf: &mut Buffer) {
    let snap = &app.snapshot;
    let settings = snap.settings;
    let bold = Style::default().add_modifier(Modifier::BOLD);

    let keyboard_lines: u16 = match (settings.show_keyboard, settings.show_notes) {
        (false, _) => 0,
        (true, true) => 5,
        (true, false) => 4,
    };

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(1),              // track + state
            Constraint::Length(1),              // score line
            Constraint::Length(1),              // padding
            Constraint::Length(1),              // progress
            Constraint::Length(1),              // padding
            Constraint::Length(keyboard_lines), // piano
            Constraint::Min(1),                 // recent keys / rewards
        ])
        .split(area);

    let (title, artist) = match &snap.track {
        Some(t) => (t.title.clone(), t.artist.clone()),
        None => (
            app.current_track.clone().unwrap_or_default(),
            String::new(),
        ),
    };
    let state_color = match snap.state {
        SessionState::Playing => Color::Green,
        SessionState::Paused => Color::Yellow,
        SessionState::Completed => Color::Cyan,
        SessionState::Error => Color::Red,
        SessionState::Loading | SessionState::Idle => Color::Gray,
    };
    Paragraph::new(Line::from(vec![
        Span::styled(title, bold),
        Span::raw(if artist.is_empty() {
            String::new()
        } else {
            format!("  {artist}")
        }),
        Span::raw("  "),
        Span::styled(
            format!("[{}]", snap.state.to_string().to_uppercase()),
            Style::default().fg(state_color).add_modifier(Modifier::BOLD),
        ),
    ]))
    .alignment(Alignment::Center)
    .render(chunks[0], buf);

    Paragraph::new(Span::styled(
        format!(
            "{} pts   combo {} (max {})   {} kpm   {} keys",
            snap.score.current,
            snap.score.combo,
            snap.score.max_combo,
            snap.stats.keys_per_minute,
            snap.stats.total_keys
        ),
        bold,
    ))
    .alignment(Alignment::Center)
    .render(chunks[1], buf);

    match snap.state {
        SessionState::Loading => {
            Paragraph::new(Span::styled(
                "loading track...",
                Style::default().add_modifier(Modifier::DIM | Modifier::ITALIC),
            ))
            .alignment(Alignment::Center)
            .render(chunks[3], buf);
        }
        SessionState::Error => {
            Paragraph::new(Span::styled(
                snap.error.clone().unwrap_or_else(|| "unknown error".into()),
                Style::default().fg(Color::Red),
            ))
            .alignment(Alignment::Center)
            .wrap(Wrap { trim: true })
            .render(chunks[3], buf);
        }
        _ => {
            let (ratio, label) = if snap.duration_secs == 0 {
                (0.0, format!("free play {}", format_secs(snap.elapsed_seconds)))
            } else {
                (
                    (snap.progress_percent / 100.0).clamp(0.0, 1.0),
                    format!(
                        "{} / {}",
                        format_secs(snap.elapsed_seconds),
                        format_secs(snap.duration_secs as f64)
                    ),
                )
            };
            Gauge::default()
                .gauge_style(Style::default().fg(Color::Magenta).bg(Color::Black))
                .ratio(ratio)
                .label(label)
                .render(chunks[3], buf);
        }
    }

    if settings.show_keyboard {
        let sounding = app.audio.sounding();
        let last = snap.recent_keystrokes.last().map(|k| k.key);
        let lines = keyboard_lines_for(app.layout.keys(), &sounding, last, settings.show_notes);
        Paragraph::new(lines)
            .alignment(Alignment::Center)
            .render(chunks[5], buf);
    }

    if snap.state == SessionState::Completed {
        render_rewards(app, chunks[6], buf);
    } else {
        let recent: Vec<Span> = snap
            .recent_keystrokes
            .iter()
            .rev()
            .map(|k| {
                Span::styled(
                    format!("{} +{}  ", k.key, k.points),
                    Style::default().fg(Color::Cyan),
                )
            })
            .collect();
        Paragraph::new(Line::from(recent))
            .alignment(Alignment::Center)
            .render(chunks[6], buf);
    }
}

fn render_rewards(app: &App, area: Rect, buf: &mut Buffer) {
    let rewards = app.snapshot.rewards;
    let claim = if rewards.claimed {
        Span::styled("claimed", Style::default().fg(Color::Green))
    } else {
        Span::styled(
            "press (c) to claim",
            Style::default()
                .fg(Color::Yellow)
                .add_modifier(Modifier::BOLD),
        )
    };
    let text = vec![
        Line::from(format!(
            "{} coins + {} combo bonus = {} coins",
            rewards.coins,
            rewards.bonus_coins,
            rewards.total_coins()
        )),
        Line::from(format!("{} experience", rewards.experience)),
        Line::from(claim),
    ];
    Paragraph::new(text)
        .alignment(Alignment::Center)
        .block(Block::default().borders(Borders::ALL).title("Rewards"))
        .render(area, buf);
}

/// Text-art piano: black keys sit on the boundary after their white key
fn keyboard_lines_for(
    keys: &[KeyBinding],
    sounding: &[Note],
    last: Option<Note>,
    show_notes: bool,
) -> Vec<Line<'static>> {
    let key_style = |note: Note| {
        let base = if note.is_black() {
            Style::default().fg(Color::Gray)
        } else {
            Style::default()
        };
        if sounding.contains(&note) {
            base.fg(Color::Black).bg(Color::Yellow)
        } else if last == Some(note) {
            base.fg(Color::Yellow).add_modifier(Modifier::BOLD)
        } else {
            base
        }
    };

    let mut black_top = Vec::new();
    let mut black_label = Vec::new();
    let mut white = Vec::new();
    let mut names = Vec::new();

    for (idx, binding) in keys.iter().enumerate() {
        if binding.note.is_black() {
            continue;
        }
        let sharp = keys.get(idx + 1).filter(|next| next.note.is_black());

        let pad = " ".repeat(WHITE_KEY_WIDTH - 2);
        black_top.push(Span::raw(pad.clone()));
        black_label.push(Span::raw(pad));
        match sharp {
            Some(b) => {
                black_top.push(Span::styled("██", key_style(b.note)));
                black_label.push(Span::styled(
                    format!("{:<2}", b.key.to_ascii_uppercase()),
                    key_style(b.note),
                ));
            }
            None => {
                black_top.push(Span::raw("  "));
                black_label.push(Span::raw("  "));
            }
        }

        white.push(Span::styled(
            format!("│{:^4}│", binding.key.to_ascii_uppercase()),
            key_style(binding.note),
        ));
        names.push(Span::styled(
            format!("{:^width$}", binding.note.name(), width = WHITE_KEY_WIDTH),
            Style::default().add_modifier(Modifier::DIM),
        ));
    }

    // black rows are offset by half a key so they straddle the white keys
    let shift = Span::raw(" ".repeat(WHITE_KEY_WIDTH / 2));
    let mut lines = vec![
        Line::from([vec![shift.clone()], black_top].concat()),
        Line::from([vec![shift], black_label].concat()),
        Line::from(white.clone()),
        Line::from(
            white
                .iter()
                .map(|s| Span::styled("└────┘", s.style))
                .collect::<Vec<_>>(),
        ),
    ];
    if show_notes {
        lines.push(Line::from(names));
    }
    lines
}

pub fn render_profile(app: &App, area: Rect, buf: &mut Buffer) {
    let Some(p) = &app.profile else {
        Paragraph::new("No signed-in player.")
            .alignment(Alignment::Center)
            .block(Block::default().borders(Borders::ALL).title("Profile"))
            .render(area, buf);
        return;
    };

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(7),
            Constraint::Min(3),
            Constraint::Length(SESSION_LOG_ROWS as u16 + 3),
        ])
        .split(area);

    let bold = Style::default().add_modifier(Modifier::BOLD);
    let summary = vec![
        Line::from(Span::styled(p.username.clone(), bold.fg(Color::Cyan))),
        Line::from(format!("level {}  ({} xp)", p.level(), p.experience)),
        Line::from(format!(
            "{} coins available, {} earned in total",
            p.coins_available, p.coins_total
        )),
        Line::from(format!(
            "best score {}  across {} games",
            p.best_score, p.total_games
        )),
    ];
    Paragraph::new(summary)
        .block(Block::default().borders(Borders::ALL).title("Profile"))
        .render(chunks[0], buf);

    let rows: Vec<Row> = p
        .recent_games
        .iter()
        .map(|g| {
            let title = app
                .catalog
                .tracks()
                .iter()
                .find(|t| t.id == g.track_id)
                .map(|t| t.title.clone())
                .unwrap_or_else(|| g.track_id.clone());
            Row::new(vec![
                Cell::from(title),
                Cell::from(g.score.to_string()),
                Cell::from(format!("x{}", g.max_combo)),
                Cell::from(format!("+{}", g.coins_earned)),
                Cell::from(played_ago(g.played_at)),
            ])
        })
        .collect();

    let title_width = p
        .recent_games
        .iter()
        .map(|g| g.track_id.width())
        .max()
        .unwrap_or(0)
        .clamp(12, 30) as u16;

    Table::new(
        rows,
        [
            Constraint::Min(title_width),
            Constraint::Length(8),
            Constraint::Length(6),
            Constraint::Length(7),
            Constraint::Length(16),
        ],
    )
    .header(
        Row::new(vec!["Track", "Score", "Combo", "Coins", "Played"]).style(
            Style::default()
                .fg(Color::Yellow)
                .add_modifier(Modifier::BOLD),
        ),
    )
    .block(Block::default().borders(Borders::ALL).title("Recent games"))
    .render(chunks[1], buf);

    render_session_log(app, chunks[2], buf);
}

/// Every finished session from `results.csv`, claimed or not
fn render_session_log(app: &App, area: Rect, buf: &mut Buffer) {
    let rows: Vec<Row> = app
        .session_log
        .iter()
        .map(|r| {
            Row::new(vec![
                Cell::from(r.date.format("%Y-%m-%d %H:%M").to_string()),
                Cell::from(r.track_title.clone()),
                Cell::from(r.score.to_string()),
                Cell::from(r.keys_per_minute.to_string()),
                Cell::from(format_secs(r.elapsed_secs)),
            ])
        })
        .collect();

    Table::new(
        rows,
        [
            Constraint::Length(16),
            Constraint::Min(12),
            Constraint::Length(8),
            Constraint::Length(5),
            Constraint::Length(6),
        ],
    )
    .header(
        Row::new(vec!["Date", "Track", "Score", "KPM", "Time"]).style(
            Style::default()
                .fg(Color::Yellow)
                .add_modifier(Modifier::BOLD),
        ),
    )
    .block(Block::default().borders(Borders::ALL).title("Session log"))
    .render(area, buf);
}

/// Draws combo particles and the milestone banner over whatever is on screen
fn render_effects(effects: &StageEffects, area: Rect, buf: &mut Buffer) {
    for particle in effects.particles() {
        if particle.x < 0.0 || particle.y < 0.0 {
            continue;
        }
        let (x, y) = (particle.x as u16, particle.y as u16);
        if x >= area.width || y >= area.height {
            continue;
        }

        let color = PARTICLE_COLORS[particle.color_index % PARTICLE_COLORS.len()];
        let life = 1.0 - particle.age / particle.max_age;
        let style = if life > 0.6 {
            Style::default().fg(color).add_modifier(Modifier::BOLD)
        } else if life > 0.25 {
            Style::default().fg(color)
        } else {
            Style::default().fg(color).add_modifier(Modifier::DIM)
        };

        if let Some(cell) = buf.cell_mut((area.x + x, area.y + y)) {
            cell.set_symbol(&particle.symbol.to_string());
            cell.set_style(style);
        }
    }

    if let Some(banner) = effects.banner() {
        let width = (banner.width() as u16).min(area.width);
        let x = area.x + (area.width.saturating_sub(width)) / 2;
        let y = area.y + area.height / 3;
        buf.set_string(
            x,
            y,
            banner,
            Style::default()
                .fg(Color::Yellow)
                .add_modifier(Modifier::BOLD),
        );
    }
}
