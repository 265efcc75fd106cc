use crate::controller::{SessionEvent, SessionObserver};
use crate::logger::Logger;
use crate::session::SessionSummary;
use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use std::fs::OpenOptions;
use std::path::{Path, PathBuf};

/// One line of `results.csv`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultRow {
    pub date: DateTime<Local>,
    pub session_id: String,
    pub track_id: String,
    pub track_title: String,
    pub score: u64,
    pub max_combo: u32,
    pub total_keys: u64,
    pub keys_per_minute: u32,
    pub elapsed_secs: f64,
    pub coins: u64,
    pub bonus_coins: u32,
    pub experience: u64,
}

impl ResultRow {
    pub fn from_summary(summary: &SessionSummary, date: DateTime<Local>) -> Self {
        Self {
            date,
            session_id: summary.session_id.to_string(),
            track_id: summary.track_id.clone(),
            track_title: summary.track_title.clone(),
            score: summary.score,
            max_combo: summary.max_combo,
            total_keys: summary.total_keys,
            keys_per_minute: summary.keys_per_minute,
            elapsed_secs: (summary.elapsed_seconds * 100.0).round() / 100.0,
            coins: summary.rewards.coins,
            bonus_coins: summary.rewards.bonus_coins,
            experience: summary.rewards.experience,
        }
    }
}

/// Append-only CSV of finished sessions
#[derive(Debug, Clone)]
pub struct ResultsLog {
    path: PathBuf,
    logger: Logger,
}

impl ResultsLog {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            logger: Logger::discard(),
        }
    }

    pub fn with_logger(mut self, logger: Logger) -> Self {
        self.logger = logger;
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn append(&self, row: &ResultRow) -> Result<(), csv::Error> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        // If the log doesn't exist yet, we need to emit a header
        let needs_header = std::fs::metadata(&self.path)
            .map(|m| m.len() == 0)
            .unwrap_or(true);

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;

        let mut writer = csv::WriterBuilder::new()
            .has_headers(needs_header)
            .from_writer(file);
        writer.serialize(row)?;
        writer.flush()?;
        Ok(())
    }

    /// The last `n` rows, newest first
    pub fn recent(&self, n: usize) -> Result<Vec<ResultRow>, csv::Error> {
        let mut rows = self.read_all()?;
        rows.reverse();
        rows.truncate(n);
        Ok(rows)
    }

    pub fn read_all(&self) -> Result<Vec<ResultRow>, csv::Error> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }
        let mut reader = csv::Reader::from_path(&self.path)?;
        reader.deserialize().collect()
    }
}

impl SessionObserver for ResultsLog {
    fn on_event(&self, event: &SessionEvent) {
        if let SessionEvent::Completed(summary) = event {
            let row = ResultRow::from_summary(summary, Local::now());
            if let Err(e) = self.append(&row) {
                self.logger
                    .error("history", "append", &format!("{}: {e}", self.path.display()));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scoring::Rewards;
    use crate::session::SessionId;
    use tempfile::tempdir;

    fn summary(score: u64) -> SessionSummary {
        SessionSummary {
            session_id: SessionId::generate(),
            track_id: "ode-to-joy".into(),
            track_title: "Ode to Joy".into(),
            score,
            max_combo: 30,
            total_keys: score / 10,
            keys_per_minute: 120,
            elapsed_seconds: 90.0333,
            rewards: Rewards {
                coins: score / 100,
                experience: score / 10,
                bonus_coins: 10,
                claimed: false,
            },
        }
    }

    #[test]
    fn test_append_writes_header_once() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("state").join("results.csv");
        let log = ResultsLog::new(&path);

        log.append(&ResultRow::from_summary(&summary(300), Local::now()))
            .unwrap();
        log.append(&ResultRow::from_summary(&summary(500), Local::now()))
            .unwrap();

        let contents = std::fs::read_to_string(&path).unwrap();
        assert_eq!(contents.lines().count(), 3);
        assert!(contents.starts_with("date,session_id,track_id"));

        let rows = log.read_all().unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].score, 300);
        assert_eq!(rows[1].score, 500);
        assert_eq!(rows[1].coins, 5);
        assert_eq!(rows[0].elapsed_secs, 90.03);
    }

    #[test]
    fn test_recent_is_newest_first() {
        let dir = tempdir().unwrap();
        let log = ResultsLog::new(dir.path().join("results.csv"));
        for score in [100, 200, 300, 400] {
            log.append(&ResultRow::from_summary(&summary(score), Local::now()))
                .unwrap();
        }

        let scores: Vec<u64> = log.recent(3).unwrap().iter().map(|r| r.score).collect();
        assert_eq!(scores, vec![400, 300, 200]);
        assert_eq!(log.recent(10).unwrap().len(), 4);
    }

    #[test]
    fn test_read_all_missing_file() {
        let dir = tempdir().unwrap();
        let log = ResultsLog::new(dir.path().join("nope.csv"));
        assert!(log.read_all().unwrap().is_empty());
    }

    #[test]
    fn test_observer_records_completed_only() {
        let dir = tempdir().unwrap();
        let log = ResultsLog::new(dir.path().join("results.csv"));

        log.on_event(&SessionEvent::Reset);
        assert!(log.read_all().unwrap().is_empty());

        log.on_event(&SessionEvent::Completed(summary(1200)));
        let rows = log.read_all().unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].track_title, "Ode to Joy");
        assert_eq!(rows[0].experience, 120);
    }
}
