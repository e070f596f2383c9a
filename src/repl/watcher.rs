use crossbeam_channel::Sender;
use notify::{Event, RecommendedWatcher, RecursiveMode, Watcher};
use std::path::{Path, PathBuf};

/// Watches one preset file on notify's background thread and forwards its
/// events to a channel. Watching a new file stops watching the old one.
pub struct FileWatcher {
    watcher: RecommendedWatcher,
    watched: Option<PathBuf>,
}

impl FileWatcher {
    pub fn new(tx: Sender<notify::Result<Event>>) -> notify::Result<Self> {
        let watcher = notify::recommended_watcher(move |res| {
            // receiver gone means the REPL is shutting down
            let _ = tx.send(res);
        })?;

        Ok(Self {
            watcher,
            watched: None,
        })
    }

    /// Watch `path`, replacing any previously watched file
    pub fn watch<P: AsRef<Path>>(&mut self, path: P) -> notify::Result<()> {
        let path = path.as_ref();
        self.watcher.watch(path, RecursiveMode::NonRecursive)?;
        if let Some(old) = self.watched.replace(path.to_path_buf()) {
            if old != path {
                if let Err(e) = self.watcher.unwatch(&old) {
                    log::warn!("could not stop watching {}: {}", old.display(), e);
                }
            }
        }
        Ok(())
    }

    pub fn watched(&self) -> Option<&Path> {
        self.watched.as_deref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossbeam_channel::unbounded;

    #[test]
    fn test_watch_replaces_previous_file() {
        let dir = std::env::temp_dir();
        let first = dir.join(format!("pulsar-watch-a-{}.json", std::process::id()));
        let second = dir.join(format!("pulsar-watch-b-{}.json", std::process::id()));
        std::fs::write(&first, "{}").unwrap();
        std::fs::write(&second, "{}").unwrap();

        let (tx, _rx) = unbounded();
        let mut watcher = FileWatcher::new(tx).unwrap();
        watcher.watch(&first).unwrap();
        watcher.watch(&second).unwrap();
        assert_eq!(watcher.watched(), Some(second.as_path()));

        assert!(watcher.watch(dir.join("pulsar-missing-file.json")).is_err());
        assert_eq!(watcher.watched(), Some(second.as_path()));

        std::fs::remove_file(&first).ok();
        std::fs::remove_file(&second).ok();
    }
}
