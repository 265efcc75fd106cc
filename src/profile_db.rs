use crate::error::StoreError;
use crate::identity::{GameRecord, Identity, IdentityStore, ProfilePatch, RECENT_GAMES};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS profiles (
    username TEXT PRIMARY KEY,
    coins_available INTEGER NOT NULL DEFAULT 0,
    coins_total INTEGER NOT NULL DEFAULT 0,
    experience INTEGER NOT NULL DEFAULT 0,
    best_score INTEGER NOT NULL DEFAULT 0,
    total_games INTEGER NOT NULL DEFAULT 0,
    created_at DATETIME DEFAULT CURRENT_TIMESTAMP
);
CREATE TABLE IF NOT EXISTS game_history (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    username TEXT NOT NULL,
    session_id TEXT NOT NULL,
    track_id TEXT NOT NULL,
    score INTEGER NOT NULL,
    max_combo INTEGER NOT NULL,
    coins_earned INTEGER NOT NULL,
    experience_earned INTEGER NOT NULL,
    played_at TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_game_history_username ON game_history(username);
"#;

/// SQLite-backed profiles for the signed-in player
#[derive(Debug)]
pub struct SqliteIdentityStore {
    conn: Mutex<Connection>,
    username: String,
}

impl SqliteIdentityStore {
    /// Opens (or creates) the database at `path` and signs `username` in
    pub fn open<P: AsRef<Path>>(path: P, username: &str) -> Result<Self, StoreError> {
        if let Some(parent) = path.as_ref().parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                StoreError::Unavailable(format!("failed to create directory: {e}"))
            })?;
        }
        Self::with_connection(Connection::open(path)?, username)
    }

    pub fn open_in_memory(username: &str) -> Result<Self, StoreError> {
        Self::with_connection(Connection::open_in_memory()?, username)
    }

    fn with_connection(conn: Connection, username: &str) -> Result<Self, StoreError> {
        conn.execute_batch(SCHEMA)?;
        conn.execute(
            "INSERT OR IGNORE INTO profiles (username) VALUES (?1)",
            [username],
        )?;
        Ok(Self {
            conn: Mutex::new(conn),
            username: username.to_string(),
        })
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    /// Loads the signed-in profile, surfacing database errors
    pub fn load(&self) -> Result<Identity, StoreError> {
        let conn = self.lock();
        read_identity(&conn, &self.username)?
            .ok_or_else(|| StoreError::MissingProfile(self.username.clone()))
    }

    /// Every game ever recorded for the player
    pub fn game_count(&self) -> Result<u64, StoreError> {
        let conn = self.lock();
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM game_history WHERE username = ?1",
            [&self.username],
            |row| row.get(0),
        )?;
        Ok(count as u64)
    }

    fn lock(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl IdentityStore for SqliteIdentityStore {
    fn load_current(&self) -> Result<Option<Identity>, StoreError> {
        let conn = self.lock();
        read_identity(&conn, &self.username)
    }

    fn apply_profile_delta(&self, patch: &ProfilePatch) -> Result<Identity, StoreError> {
        let mut conn = self.lock();
        let tx = conn.transaction()?;

        let updated = tx.execute(
            r#"
            UPDATE profiles SET
                coins_available = coins_available + ?1,
                coins_total = coins_total + ?1,
                experience = experience + ?2,
                total_games = total_games + ?3,
                best_score = MAX(best_score, COALESCE(?4, best_score))
            WHERE username = ?5
            "#,
            params![
                patch.coins_delta as i64,
                patch.experience_delta as i64,
                patch.games_delta as i64,
                patch.best_score_candidate.map(|v| v as i64),
                self.username,
            ],
        )?;
        if updated == 0 {
            return Err(StoreError::MissingProfile(self.username.clone()));
        }

        if let Some(game) = &patch.game {
            tx.execute(
                r#"
                INSERT INTO game_history
                (username, session_id, track_id, score, max_combo, coins_earned, experience_earned, played_at)
                VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
                "#,
                params![
                    self.username,
                    game.session_id,
                    game.track_id,
                    game.score as i64,
                    game.max_combo,
                    game.coins_earned as i64,
                    game.experience_earned as i64,
                    game.played_at.to_rfc3339(),
                ],
            )?;
        }

        let identity = read_identity(&tx, &self.username)?
            .ok_or_else(|| StoreError::MissingProfile(self.username.clone()))?;
        tx.commit()?;
        Ok(identity)
    }
}

fn read_identity(conn: &Connection, username: &str) -> Result<Option<Identity>, StoreError> {
    let profile = conn
        .query_row(
            r#"
            SELECT username, coins_available, coins_total, experience, best_score, total_games
            FROM profiles WHERE username = ?1
            "#,
            [username],
            |row| {
                Ok(Identity {
                    username: row.get(0)?,
                    coins_available: row.get::<_, i64>(1)? as u64,
                    coins_total: row.get::<_, i64>(2)? as u64,
                    experience: row.get::<_, i64>(3)? as u64,
                    best_score: row.get::<_, i64>(4)? as u64,
                    total_games: row.get::<_, i64>(5)? as u64,
                    recent_games: Vec::new(),
                })
            },
        )
        .optional()?;

    let Some(mut identity) = profile else {
        return Ok(None);
    };

    let mut stmt = conn.prepare(
        r#"
        SELECT session_id, track_id, score, max_combo, coins_earned, experience_earned, played_at
        FROM game_history
        WHERE username = ?1
        ORDER BY id DESC
        LIMIT ?2
        "#,
    )?;

    let games = stmt.query_map(params![username, RECENT_GAMES as i64], |row| {
        let played_at_str: String = row.get(6)?;
        let played_at = DateTime::parse_from_rfc3339(&played_at_str)
            .map_err(|_| {
                rusqlite::Error::InvalidColumnType(
                    6,
                    "played_at".to_string(),
                    rusqlite::types::Type::Text,
                )
            })?
            .with_timezone(&Utc);

        Ok(GameRecord {
            session_id: row.get(0)?,
            track_id: row.get(1)?,
            score: row.get::<_, i64>(2)? as u64,
            max_combo: row.get(3)?,
            coins_earned: row.get::<_, i64>(4)? as u64,
            experience_earned: row.get::<_, i64>(5)? as u64,
            played_at,
        })
    })?;

    for game in games {
        identity.recent_games.push(game?);
    }

    Ok(Some(identity))
}
