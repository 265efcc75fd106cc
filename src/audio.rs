use crate::piano::Note;
use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::{Duration, SystemTime};

/// Notes remembered by `NoteLog::played`
pub const PLAYED_HISTORY: usize = 256;

/// Sound output for accepted keystrokes. Calls are fire-and-forget and have
/// no effect on scoring.
pub trait AudioEngine: Send + Sync {
    fn play_note(&self, note: &Note);
    fn stop_note(&self, note: &Note);
}

#[derive(Debug, Default, Clone, Copy)]
pub struct NullAudio;

impl AudioEngine for NullAudio {
    fn play_note(&self, _note: &Note) {}
    fn stop_note(&self, _note: &Note) {}
}

/// Keeps track of which notes are sounding and of the last notes played
#[derive(Debug, Default)]
pub struct NoteLog {
    inner: Mutex<NoteLogState>,
}

#[derive(Debug, Default)]
struct NoteLogState {
    sounding: Vec<(Note, SystemTime)>,
    played: VecDeque<Note>,
}

impl NoteLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// The last `PLAYED_HISTORY` notes played, oldest first
    pub fn played(&self) -> Vec<Note> {
        self.lock().played.iter().copied().collect()
    }

    pub fn sounding(&self) -> Vec<Note> {
        self.lock().sounding.iter().map(|(n, _)| *n).collect()
    }

    /// Stops notes that have rung longer than `sustain`; returns them
    pub fn release_older_than(&self, sustain: Duration, now: SystemTime) -> Vec<Note> {
        let mut state = self.lock();
        let (expired, kept): (Vec<_>, Vec<_>) = state.sounding.drain(..).partition(|(_, at)| {
            now.duration_since(*at).unwrap_or_default() >= sustain
        });
        state.sounding = kept;
        expired.into_iter().map(|(n, _)| n).collect()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, NoteLogState> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl AudioEngine for NoteLog {
    fn play_note(&self, note: &Note) {
        let mut state = self.lock();
        state.sounding.retain(|(n, _)| n != note);
        state.sounding.push((*note, SystemTime::now()));
        if state.played.len() == PLAYED_HISTORY {
            state.played.pop_front();
        }
        state.played.push_back(*note);
    }

    fn stop_note(&self, note: &Note) {
        self.lock().sounding.retain(|(n, _)| n != note);
    }
}
