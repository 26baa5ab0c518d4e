//! Cancellable recursive filename search.
//!
//! Runs on the blocking pool and streams matches through the worker channel
//! the moment they are found. Cancellation is cooperative: a shared flag
//! checked per directory and per entry, so a cancelled task stops within one
//! entry's worth of work.

use std::collections::HashSet;
use std::fs;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tracing::debug;

use crate::event::{WorkerMsg, WorkerSender};
use crate::fs::policy::ScanPolicy;

/// Handle to an in-flight search.
pub struct SearchHandle {
    cancel: Arc<AtomicBool>,
}

impl SearchHandle {
    /// Request cooperative cancellation; the task reports `SearchDone`
    /// with `cancelled = true` once it observes the flag.
    pub fn cancel(&self) {
        self.cancel.store(true, Ordering::Relaxed);
    }
}

/// Spawn a search for `query` (case-insensitive substring of the base name)
/// under each of `roots`.
///
/// Matches are tagged with `generation` so the engine can drop messages from
/// a superseded search. A nonexistent root contributes nothing.
pub(crate) fn spawn_search(
    query: String,
    roots: Vec<PathBuf>,
    policy: Arc<ScanPolicy>,
    generation: u64,
    tx: WorkerSender,
) -> SearchHandle {
    let cancel = Arc::new(AtomicBool::new(false));
    let flag = cancel.clone();

    tokio::task::spawn_blocking(move || {
        let query = query.to_lowercase();
        // Canonicalized directories already walked; the symlink-cycle guard.
        let mut visited: HashSet<PathBuf> = HashSet::new();
        let mut stack: Vec<PathBuf> = roots;

        'walk: while let Some(dir) = stack.pop() {
            if flag.load(Ordering::Relaxed) {
                break;
            }
            if policy.is_blocked(&dir) {
                continue;
            }
            let real = match dir.canonicalize() {
                Ok(p) => p,
                Err(_) => continue,
            };
            if !visited.insert(real) {
                debug!(path = %dir.display(), "already visited, skipping");
                continue;
            }
            let entries = match fs::read_dir(&dir) {
                Ok(e) => e,
                Err(_) => continue,
            };
            for entry in entries.flatten() {
                if flag.load(Ordering::Relaxed) {
                    break 'walk;
                }
                let meta = match entry.metadata() {
                    Ok(m) => m,
                    Err(_) => continue,
                };
                if ScanPolicy::excluded_by_attributes(&meta) {
                    continue;
                }
                let path = entry.path();
                if policy.is_blocked(&path) {
                    continue;
                }
                let is_dir = meta.is_dir();
                let name = entry.file_name().to_string_lossy().to_lowercase();
                if name.contains(&query) {
                    let _ = tx.send(WorkerMsg::SearchFound {
                        generation,
                        path: path.clone(),
                        is_dir,
                    });
                }
                if is_dir {
                    stack.push(path);
                }
            }
        }

        let cancelled = flag.load(Ordering::Relaxed);
        let _ = tx.send(WorkerMsg::SearchDone {
            generation,
            cancelled,
        });
    });

    SearchHandle { cancel }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::worker_channel;
    use tempfile::TempDir;

    fn setup_logs() -> TempDir {
        let tmp = TempDir::new().unwrap();
        std::fs::write(tmp.path().join("app.log"), "x").unwrap();
        std::fs::write(tmp.path().join("readme.md"), "x").unwrap();
        std::fs::create_dir(tmp.path().join("sub")).unwrap();
        std::fs::write(tmp.path().join("sub").join("debug.log"), "x").unwrap();
        tmp
    }

    async fn drain(rx: &mut crate::event::WorkerReceiver) -> (Vec<PathBuf>, bool) {
        let mut found = Vec::new();
        loop {
            match rx.recv().await.expect("search task dropped channel") {
                WorkerMsg::SearchFound { path, .. } => found.push(path),
                WorkerMsg::SearchDone { cancelled, .. } => return (found, cancelled),
                other => panic!("unexpected message: {:?}", other),
            }
        }
    }

    #[tokio::test]
    async fn finds_matches_in_nested_directories() {
        let tmp = setup_logs();
        let (tx, mut rx) = worker_channel();
        spawn_search(
            "log".to_string(),
            vec![tmp.path().to_path_buf()],
            Arc::new(ScanPolicy::new(Vec::new())),
            1,
            tx,
        );
        let (found, cancelled) = drain(&mut rx).await;
        assert!(!cancelled);
        assert_eq!(found.len(), 2);
        assert!(found.iter().any(|p| p.ends_with("app.log")));
        assert!(found.iter().any(|p| p.ends_with("sub/debug.log")));
    }

    #[tokio::test]
    async fn match_is_case_insensitive_and_covers_directories() {
        let tmp = TempDir::new().unwrap();
        std::fs::create_dir(tmp.path().join("Logs")).unwrap();
        let (tx, mut rx) = worker_channel();
        spawn_search(
            "log".to_string(),
            vec![tmp.path().to_path_buf()],
            Arc::new(ScanPolicy::new(Vec::new())),
            1,
            tx,
        );
        let (found, _) = drain(&mut rx).await;
        assert_eq!(found.len(), 1);
        assert!(found[0].ends_with("Logs"));
    }

    #[tokio::test]
    async fn missing_root_ends_without_matches() {
        let tmp = TempDir::new().unwrap();
        let (tx, mut rx) = worker_channel();
        spawn_search(
            "anything".to_string(),
            vec![tmp.path().join("gone")],
            Arc::new(ScanPolicy::new(Vec::new())),
            1,
            tx,
        );
        let (found, cancelled) = drain(&mut rx).await;
        assert!(found.is_empty());
        assert!(!cancelled);
    }

    #[tokio::test]
    async fn cancelled_search_reports_cancelled() {
        let tmp = setup_logs();
        let (tx, mut rx) = worker_channel();
        let handle = spawn_search(
            "log".to_string(),
            vec![tmp.path().to_path_buf()],
            Arc::new(ScanPolicy::new(Vec::new())),
            1,
            tx,
        );
        handle.cancel();
        // The task may have emitted some matches before observing the flag,
        // but it must terminate and the terminal message carries the flag.
        loop {
            match rx.recv().await.expect("search task dropped channel") {
                WorkerMsg::SearchDone { cancelled, .. } => {
                    assert!(cancelled);
                    break;
                }
                WorkerMsg::SearchFound { .. } => continue,
                other => panic!("unexpected message: {:?}", other),
            }
        }
        assert!(rx.recv().await.is_none());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn symlink_loop_terminates() {
        let tmp = TempDir::new().unwrap();
        let sub = tmp.path().join("sub");
        std::fs::create_dir(&sub).unwrap();
        std::fs::write(sub.join("app.log"), "x").unwrap();
        std::os::unix::fs::symlink(tmp.path(), sub.join("loop")).unwrap();

        let (tx, mut rx) = worker_channel();
        spawn_search(
            "log".to_string(),
            vec![tmp.path().to_path_buf()],
            Arc::new(ScanPolicy::new(Vec::new())),
            1,
            tx,
        );
        let (found, cancelled) = drain(&mut rx).await;
        assert!(!cancelled);
        assert_eq!(found.len(), 1);
    }
}
