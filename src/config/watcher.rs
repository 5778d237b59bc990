//! Configuration file watcher for hot reload.
//!
//! # Design Decisions
//! - The parent directory is watched, not the file: editors that save via
//!   write-to-temp-then-rename replace the inode and would end a file watch
//! - Bursts of events (truncate, write, rename) are coalesced; the file is
//!   loaded once after `DEBOUNCE` of quiet
//! - A config that fails to load or validate is logged and skipped

use notify::{Config, Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::sync::mpsc;

use crate::config::loader::load_config;
use crate::config::schema::RelayConfig;

const DEBOUNCE: Duration = Duration::from_millis(250);

/// Watches the relay configuration file and emits validated configs.
pub struct ConfigWatcher {
    path: PathBuf,
    update_tx: mpsc::UnboundedSender<RelayConfig>,
}

impl ConfigWatcher {
    /// Returns the watcher and a receiver for validated configuration updates.
    pub fn new(path: &Path) -> (Self, mpsc::UnboundedReceiver<RelayConfig>) {
        let (update_tx, update_rx) = mpsc::unbounded_channel();
        (
            Self {
                path: path.to_path_buf(),
                update_tx,
            },
            update_rx,
        )
    }

    /// Start watching. Must be called inside a tokio runtime; the returned
    /// handle must be kept alive for as long as reloads are wanted.
    pub fn run(self) -> Result<RecommendedWatcher, notify::Error> {
        let dir = match self.path.parent() {
            Some(dir) if !dir.as_os_str().is_empty() => dir.to_path_buf(),
            _ => PathBuf::from("."),
        };
        let file_name = self.path.file_name().map(OsString::from).unwrap_or_default();

        let (event_tx, event_rx) = mpsc::unbounded_channel::<()>();
        let mut watcher = RecommendedWatcher::new(
            move |res: notify::Result<Event>| match res {
                Ok(event) if touches_file(&event, &file_name) => {
                    let _ = event_tx.send(());
                }
                Ok(_) => {}
                Err(e) => tracing::error!(error = ?e, "Config watch error"),
            },
            Config::default().with_poll_interval(Duration::from_secs(2)),
        )?;
        watcher.watch(&dir, RecursiveMode::NonRecursive)?;

        tokio::spawn(reload_loop(self.path.clone(), event_rx, self.update_tx));

        tracing::info!(path = ?self.path, "Config watcher started");
        Ok(watcher)
    }
}

/// Whether `event` may have changed the contents of `file_name`.
fn touches_file(event: &Event, file_name: &OsString) -> bool {
    let relevant_kind = matches!(
        event.kind,
        EventKind::Create(_) | EventKind::Modify(_) | EventKind::Any
    );
    relevant_kind && event.paths.iter().any(|p| p.file_name() == Some(file_name.as_os_str()))
}

async fn reload_loop(
    path: PathBuf,
    mut events: mpsc::UnboundedReceiver<()>,
    updates: mpsc::UnboundedSender<RelayConfig>,
) {
    while events.recv().await.is_some() {
        // Quiet period: keep absorbing events until none arrive for DEBOUNCE.
        loop {
            match tokio::time::timeout(DEBOUNCE, events.recv()).await {
                Ok(Some(())) => continue,
                Ok(None) => return,
                Err(_) => break,
            }
        }

        tracing::info!(path = ?path, "Config file changed, reloading");
        match load_config(&path) {
            Ok(config) => {
                if updates.send(config).is_err() {
                    tracing::debug!("Config receiver gone, stopping watcher");
                    return;
                }
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to reload config, keeping current configuration");
            }
        }
    }
}
