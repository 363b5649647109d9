//! Background purge of expired sessions.

use std::sync::Arc;
use std::sync::mpsc::{self, RecvTimeoutError, Sender};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use super::SessionManager;
use crate::health::HealthReporter;

/// Periodically calls [`SessionManager::sweep`] until stopped or dropped.
pub(crate) struct SessionSweeper {
    stop: Option<Sender<()>>,
    thread: Option<JoinHandle<()>>,
}

impl SessionSweeper {
    pub(crate) fn start(
        sessions: Arc<SessionManager>,
        interval: Duration,
        reporter: Arc<dyn HealthReporter>,
    ) -> Self {
        let (stop, stopped) = mpsc::channel::<()>();
        let thread = thread::spawn(move || {
            loop {
                match stopped.recv_timeout(interval) {
                    Err(RecvTimeoutError::Timeout) => match sessions.sweep() {
                        Ok(0) => {}
                        Ok(removed) => reporter.sessions_swept(removed),
                        Err(error) => reporter.sweep_failed(&error),
                    },
                    Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
                }
            }
        });
        Self {
            stop: Some(stop),
            thread: Some(thread),
        }
    }

    /// Stops the sweeper and waits for its thread.
    pub(crate) fn stop(mut self) {
        self.halt();
    }

    fn halt(&mut self) {
        if let Some(stop) = self.stop.take() {
            let _ = stop.send(());
        }
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
    }
}

impl Drop for SessionSweeper {
    fn drop(&mut self) {
        self.halt();
    }
}
