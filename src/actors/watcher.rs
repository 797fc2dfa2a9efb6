//! Change-notification sources
//!
//! A change notification carries no payload: it only says "something
//! upstream may have changed". The scheduler debounces them.
//!
//! - [`ChangeNotifier`]: push side, cheap to clone, never blocks
//! - [`FileWatcher`]: polls a file's metadata and notifies when it moves

use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, instrument, trace, warn};

const CHANNEL_CAPACITY: usize = 64;

pub fn change_channel() -> (ChangeNotifier, ChangeReceiver) {
    let (tx, rx) = mpsc::channel(CHANNEL_CAPACITY);
    (ChangeNotifier { tx }, ChangeReceiver { rx })
}

#[derive(Debug, Clone)]
pub struct ChangeNotifier {
    tx: mpsc::Sender<()>,
}

impl ChangeNotifier {
    /// Signal a change; returns `false` once the receiving side is gone
    pub fn changed(&self) -> bool {
        match self.tx.try_send(()) {
            Ok(()) => true,
            // plenty of notifications already queued, they coalesce anyway
            Err(TrySendError::Full(())) => true,
            Err(TrySendError::Closed(())) => false,
        }
    }
}

#[derive(Debug)]
pub struct ChangeReceiver {
    rx: mpsc::Receiver<()>,
}

impl ChangeReceiver {
    /// Wait for the next notification; `false` once every notifier is dropped
    pub async fn changed(&mut self) -> bool {
        self.rx.recv().await.is_some()
    }
}

/// Polls a file and notifies when its modification time or size changes
#[derive(Debug)]
pub struct FileWatcher {
    path: PathBuf,
    poll: Duration,
    notifier: ChangeNotifier,
    last_seen: Option<(SystemTime, u64)>,
}

impl FileWatcher {
    pub fn new<P: AsRef<Path>>(path: P, poll: Duration, notifier: ChangeNotifier) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            poll,
            notifier,
            last_seen: None,
        }
    }

    /// Run the watcher on its own task until `cancel` fires
    pub fn spawn(self, cancel: CancellationToken) -> JoinHandle<()> {
        tokio::spawn(self.run(cancel))
    }

    #[instrument(skip_all, fields(path = %self.path.display()))]
    async fn run(mut self, cancel: CancellationToken) {
        debug!("watching for changes every {:?}", self.poll);

        // baseline: the initial refresh already covers the current content
        self.last_seen = self.fingerprint().await;

        let mut ticker = tokio::time::interval(self.poll);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => {
                    if self.check().await && !self.notifier.changed() {
                        debug!("scheduler gone, stopping watcher");
                        break;
                    }
                }
            }
        }

        debug!("file watcher stopped");
    }

    /// Returns `true` if the file changed since the last check
    async fn check(&mut self) -> bool {
        let current = self.fingerprint().await;
        if current.is_none() {
            trace!("file not readable, skipping");
            return false;
        }

        if current == self.last_seen {
            return false;
        }

        trace!("file changed: {:?} -> {:?}", self.last_seen, current);
        self.last_seen = current;
        true
    }

    async fn fingerprint(&self) -> Option<(SystemTime, u64)> {
        match tokio::fs::metadata(&self.path).await {
            Ok(meta) => Some((meta.modified().ok()?, meta.len())),
            Err(e) => {
                warn!("cannot stat {}: {e}", self.path.display());
                None
            }
        }
    }
}
