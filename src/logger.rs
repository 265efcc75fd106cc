use chrono::Utc;
use serde_json::json;
use std::fs::OpenOptions;
use std::io::{self, Write};
use std::path::Path;
use std::sync::{Arc, Mutex};

type Sink = Arc<Mutex<Box<dyn Write + Send>>>;

/// JSON-lines logger: one object per event with a run id, the subsystem and
/// the action that produced it. The terminal is owned by the UI, so lines go
/// to a file or nowhere.
#[derive(Clone)]
pub struct Logger {
    rid: u64,
    sink: Option<Sink>,
}

impl std::fmt::Debug for Logger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Logger")
            .field("rid", &self.rid)
            .field("enabled", &self.sink.is_some())
            .finish()
    }
}

impl Logger {
    pub fn new(rid: u64, writer: Box<dyn Write + Send>) -> Self {
        Self {
            rid,
            sink: Some(Arc::new(Mutex::new(writer))),
        }
    }

    /// Appends to `path`, creating it and its directory if needed
    pub fn append_to<P: AsRef<Path>>(rid: u64, path: P) -> io::Result<Self> {
        if let Some(parent) = path.as_ref().parent() {
            std::fs::create_dir_all(parent)?;
        }
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(Self::new(rid, Box::new(file)))
    }

    pub fn discard() -> Self {
        Self { rid: 0, sink: None }
    }

    pub fn rid(&self) -> u64 {
        self.rid
    }

    pub fn debug(&self, subsystem: &str, action: &str, message: &str) {
        self.emit("debug", subsystem, action, message);
    }

    pub fn info(&self, subsystem: &str, action: &str, message: &str) {
        self.emit("info", subsystem, action, message);
    }

    pub fn warn(&self, subsystem: &str, action: &str, message: &str) {
        self.emit("warn", subsystem, action, message);
    }

    pub fn error(&self, subsystem: &str, action: &str, message: &str) {
        self.emit("error", subsystem, action, message);
    }

    fn emit(&self, level: &str, subsystem: &str, action: &str, message: &str) {
        let Some(sink) = &self.sink else {
            return;
        };
        let log_entry = json!({
            "ts": Utc::now().to_rfc3339(),
            "level": level,
            "rid": self.rid,
            "subsystem": subsystem,
            "action": action,
            "msg": message,
        });

        let mut out = sink.lock().unwrap_or_else(|e| e.into_inner());
        // write failures are dropped
        let _ = writeln!(out, "{log_entry}");
        let _ = out.flush();
    }
}

/// In-memory writer whose contents can be read back; for tests
#[derive(Clone, Default)]
pub struct SharedBuffer(Arc<Mutex<Vec<u8>>>);

impl SharedBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contents(&self) -> String {
        let bytes = self.0.lock().unwrap_or_else(|e| e.into_inner());
        String::from_utf8_lossy(&bytes).into_owned()
    }

    pub fn lines(&self) -> Vec<serde_json::Value> {
        self.contents()
            .lines()
            .filter_map(|l| serde_json::from_str(l).ok())
            .collect()
    }
}

impl Write for SharedBuffer {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}
