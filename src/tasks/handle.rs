//! Owned handle for a periodic background loop.

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{info, warn};

// == Background Task ==
/// A spawned loop plus the signal that stops it.
///
/// Dropping the handle without calling [`BackgroundTask::shutdown`] also
/// stops the loop, since the loop watches for the sender going away.
#[derive(Debug)]
pub struct BackgroundTask {
    name: &'static str,
    shutdown: watch::Sender<bool>,
    handle: JoinHandle<()>,
}

impl BackgroundTask {
    pub(crate) fn new(name: &'static str, shutdown: watch::Sender<bool>, handle: JoinHandle<()>) -> Self {
        Self {
            name,
            shutdown,
            handle,
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    // == Shutdown ==
    /// Signals the loop to stop and waits for it to exit.
    pub async fn shutdown(self) {
        let _ = self.shutdown.send(true);
        match self.handle.await {
            Ok(()) => info!(task = self.name, "background task stopped"),
            Err(err) => warn!(task = self.name, error = %err, "background task ended abnormally"),
        }
    }
}

/// Resolves once the owner asks the loop to stop or drops its handle.
pub(crate) async fn stopped(rx: &mut watch::Receiver<bool>) {
    loop {
        if *rx.borrow_and_update() {
            return;
        }
        if rx.changed().await.is_err() {
            return;
        }
    }
}
