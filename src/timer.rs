use std::sync::mpsc::{self, RecvTimeoutError, Sender};
use std::thread;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickControl {
    Continue,
    Stop,
}

/// Periodic callback on a background thread.
///
/// Dropping the timer (or calling `cancel`) disconnects its channel, which
/// wakes the thread at once and ends it without running the callback again.
/// The thread is never joined, so cancelling from inside the callback is safe.
#[derive(Debug)]
pub struct ProgressTimer {
    stop: Option<Sender<()>>,
}

impl ProgressTimer {
    pub fn start<F>(interval: Duration, mut on_tick: F) -> Self
    where
        F: FnMut() -> TickControl + Send + 'static,
    {
        let (tx, rx) = mpsc::channel::<()>();

        thread::spawn(move || loop {
            match rx.recv_timeout(interval) {
                Err(RecvTimeoutError::Timeout) => {
                    if on_tick() == TickControl::Stop {
                        break;
                    }
                }
                Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
            }
        });

        Self { stop: Some(tx) }
    }

    pub fn cancel(mut self) {
        self.stop.take();
    }
}

impl Drop for ProgressTimer {
    fn drop(&mut self) {
        if let Some(tx) = self.stop.take() {
            let _ = tx.send(());
        }
    }
}
