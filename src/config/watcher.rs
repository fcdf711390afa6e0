//! Configuration file watcher for hot reload.
//!
//! The parent directory is watched rather than the file itself, so editors
//! that save by writing a temp file and renaming it over the original are
//! still noticed.

use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::Duration;

use notify::{Config, Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;

use crate::config::loader::load_config;
use crate::config::schema::GatewayConfig;

/// Forwards a freshly loaded [`GatewayConfig`] whenever the file changes.
///
/// Each change is re-loaded with environment overrides applied and validated
/// before it is forwarded. Invalid files are logged and ignored, as are
/// rewrites that leave the effective configuration unchanged.
pub struct ConfigWatcher {
    path: PathBuf,
    update_tx: mpsc::UnboundedSender<GatewayConfig>,
}

impl ConfigWatcher {
    /// Returns the watcher and the receiving end of its update channel.
    pub fn new(path: &Path) -> (Self, mpsc::UnboundedReceiver<GatewayConfig>) {
        let (update_tx, update_rx) = mpsc::unbounded_channel();
        let watcher = Self {
            path: path.to_path_buf(),
            update_tx,
        };
        (watcher, update_rx)
    }

    /// Start watching on notify's background thread.
    ///
    /// Updates stop once the returned handle is dropped.
    pub fn run(self, current: GatewayConfig) -> Result<RecommendedWatcher, notify::Error> {
        let dir = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        let reloader = Reloader {
            path: self.path,
            tx: self.update_tx,
            last: Mutex::new(current),
        };

        let mut watcher = RecommendedWatcher::new(
            move |res: notify::Result<Event>| match res {
                Ok(event) => reloader.on_event(&event),
                Err(e) => tracing::error!(error = %e, "Config watch error"),
            },
            Config::default().with_poll_interval(Duration::from_secs(2)),
        )?;
        watcher.watch(&dir, RecursiveMode::NonRecursive)?;

        tracing::info!(dir = %dir.display(), "Config watcher started");
        Ok(watcher)
    }
}

struct Reloader {
    path: PathBuf,
    tx: mpsc::UnboundedSender<GatewayConfig>,
    last: Mutex<GatewayConfig>,
}

impl Reloader {
    fn on_event(&self, event: &Event) {
        if !matches!(event.kind, EventKind::Modify(_) | EventKind::Create(_)) {
            return;
        }
        if !event.paths.iter().any(|p| same_file_name(p, &self.path)) {
            return;
        }
        self.reload();
    }

    fn reload(&self) {
        let next = match load_config(Some(&self.path)) {
            Ok(config) => config,
            Err(e) => {
                tracing::error!(
                    path = %self.path.display(),
                    error = %e,
                    "Failed to reload config, keeping current configuration"
                );
                return;
            }
        };

        let mut last = self.last.lock().unwrap_or_else(|p| p.into_inner());
        if *last == next {
            tracing::debug!("Config file rewritten without changes");
            return;
        }
        tracing::info!(path = %self.path.display(), "Config file changed, applying");
        *last = next.clone();
        let _ = self.tx.send(next);
    }
}

fn same_file_name(a: &Path, b: &Path) -> bool {
    a.file_name().is_some() && a.file_name() == b.file_name()
}

#[cfg(test)]
mod tests {
    use super::*;
    use notify::event::{CreateKind, ModifyKind, RemoveKind};

    fn reloader(path: &Path) -> (Reloader, mpsc::UnboundedReceiver<GatewayConfig>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let current = load_config(Some(path)).unwrap();
        let reloader = Reloader {
            path: path.to_path_buf(),
            tx,
            last: Mutex::new(current),
        };
        (reloader, rx)
    }

    fn event(kind: EventKind, path: &Path) -> Event {
        Event::new(kind).add_path(path.to_path_buf())
    }

    #[test]
    fn forwards_only_effective_changes() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("gateway.toml");
        std::fs::write(&path, "[deployment]\nregion = \"ams\"\n").unwrap();
        let (reloader, mut rx) = reloader(&path);

        reloader.on_event(&event(EventKind::Modify(ModifyKind::Any), &path));
        assert!(rx.try_recv().is_err());

        std::fs::write(&path, "[deployment]\nregion = \"lhr\"\n").unwrap();
        reloader.on_event(&event(EventKind::Create(CreateKind::File), &path));
        let update = rx.try_recv().unwrap();
        assert_eq!(update.deployment.region.as_deref(), Some("lhr"));
    }

    #[test]
    fn ignores_other_files_and_invalid_content() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("gateway.toml");
        std::fs::write(&path, "").unwrap();
        let (reloader, mut rx) = reloader(&path);

        std::fs::write(&path, "[timeouts]\nstatement_ms = 5\n").unwrap();
        let other = dir.path().join("notes.txt");
        reloader.on_event(&event(EventKind::Modify(ModifyKind::Any), &other));
        reloader.on_event(&event(EventKind::Remove(RemoveKind::File), &path));
        assert!(rx.try_recv().is_err());

        std::fs::write(&path, "[timeouts]\nstatement_ms = 0\n").unwrap();
        reloader.on_event(&event(EventKind::Modify(ModifyKind::Any), &path));
        assert!(rx.try_recv().is_err());
    }
}
