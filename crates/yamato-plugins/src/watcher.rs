//! Debounced change notifications for the commands directory.

use crate::loader::is_manifest;
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use std::path::PathBuf;
use std::sync::mpsc as std_mpsc;
use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

const POLL: Duration = Duration::from_millis(100);

/// Watch `dir` for manifest changes and send `()` on `tx` once the directory
/// has been quiet for `debounce`.
///
/// The watcher runs on its own thread. It stops when the returned sender is
/// dropped or used, or when `tx` closes.
pub fn spawn_watcher(
    dir: PathBuf,
    debounce: Duration,
    tx: mpsc::Sender<()>,
) -> std_mpsc::SyncSender<()> {
    let (stop_tx, stop_rx) = std_mpsc::sync_channel::<()>(1);

    std::thread::spawn(move || {
        let (raw_tx, raw_rx) = std_mpsc::channel::<notify::Result<Event>>();
        let mut watcher = match RecommendedWatcher::new(raw_tx, notify::Config::default()) {
            Ok(w) => w,
            Err(e) => {
                error!("command watcher init failed: {e}");
                return;
            }
        };
        if let Err(e) = watcher.watch(&dir, RecursiveMode::Recursive) {
            error!("cannot watch {}: {e}", dir.display());
            return;
        }
        info!("watching {} for command changes", dir.display());

        let mut deadline: Option<Instant> = None;
        loop {
            match stop_rx.try_recv() {
                Ok(()) | Err(std_mpsc::TryRecvError::Disconnected) => break,
                Err(std_mpsc::TryRecvError::Empty) => {}
            }

            match raw_rx.recv_timeout(POLL) {
                Ok(Ok(event)) => {
                    if is_relevant(&event) {
                        debug!("command change: {:?}", event.paths);
                        deadline = Some(Instant::now() + debounce);
                    }
                }
                Ok(Err(e)) => warn!("command watch error: {e}"),
                Err(std_mpsc::RecvTimeoutError::Timeout) => {}
                Err(std_mpsc::RecvTimeoutError::Disconnected) => break,
            }

            if deadline.is_some_and(|d| Instant::now() >= d) {
                deadline = None;
                if tx.blocking_send(()).is_err() {
                    break;
                }
            }
        }
        debug!("command watcher stopped");
    });

    stop_tx
}

fn is_relevant(event: &Event) -> bool {
    !matches!(event.kind, EventKind::Access(_)) && event.paths.iter().any(|p| is_manifest(p))
}

#[cfg(test)]
mod tests {
    use super::*;
    use notify::event::{AccessKind, CreateKind};

    #[test]
    fn test_relevance_filter() {
        let toml = Event::new(EventKind::Create(CreateKind::File)).add_path("/c/joke.toml".into());
        let swap = Event::new(EventKind::Create(CreateKind::File)).add_path("/c/.joke.toml.swp".into());
        let read = Event::new(EventKind::Access(AccessKind::Any)).add_path("/c/joke.toml".into());
        assert!(is_relevant(&toml));
        assert!(!is_relevant(&swap));
        assert!(!is_relevant(&read));
    }

    #[tokio::test]
    async fn test_change_triggers_one_debounced_reload() {
        let dir = std::env::temp_dir().join(format!("__yamato_watch_{}__", std::process::id()));
        let _ = std::fs::remove_dir_all(&dir);
        std::fs::create_dir_all(&dir).unwrap();

        let (tx, mut rx) = mpsc::channel(8);
        let stop = spawn_watcher(dir.clone(), Duration::from_millis(200), tx);
        tokio::time::sleep(Duration::from_millis(300)).await;

        for i in 0..3 {
            std::fs::write(dir.join("ping.toml"), format!("# edit {i}")).unwrap();
        }

        let got = tokio::time::timeout(Duration::from_secs(5), rx.recv()).await;
        assert!(matches!(got, Ok(Some(()))));
        // The burst collapses into a single notification.
        let extra = tokio::time::timeout(Duration::from_millis(600), rx.recv()).await;
        assert!(extra.is_err());

        let _ = stop.send(());
        let _ = std::fs::remove_dir_all(&dir);
    }
}
