//! Recursive directory sizing with bounded concurrency and per-entry /
//! per-subtree liveness bounds.
//!
//! The walk runs against the live filesystem, independent of whatever is
//! materialized in the display tree. It never errors: inaccessible entries,
//! excluded entries, and timeouts all contribute zero, so the worst outcome
//! of any failure is an undercount.

use std::fs;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Semaphore;
use tokio::time::timeout;
use tracing::{debug, warn};

use crate::fs::policy::ScanPolicy;

/// Liveness bounds for one aggregation run.
#[derive(Debug, Clone, Copy)]
pub struct AggregateLimits {
    /// Bound on a single entry stat.
    pub entry_timeout: Duration,
    /// Bound on one subdirectory's full recursive total.
    pub subtree_timeout: Duration,
}

/// Total byte size of the subtree rooted at `path`.
///
/// The semaphore caps concurrent filesystem work across the whole recursive
/// computation for one top-level call; a permit is held only while listing
/// one directory level and released before descending, so a tree deeper than
/// the fan-out limit cannot deadlock the pool. Sibling subtrees are walked as
/// separate tasks and may complete in any order.
pub async fn aggregate_dir_size(
    path: PathBuf,
    policy: Arc<ScanPolicy>,
    limits: AggregateLimits,
    semaphore: Arc<Semaphore>,
) -> u64 {
    walk(path, policy, limits, semaphore).await
}

fn walk(
    path: PathBuf,
    policy: Arc<ScanPolicy>,
    limits: AggregateLimits,
    semaphore: Arc<Semaphore>,
) -> Pin<Box<dyn Future<Output = u64> + Send>> {
    Box::pin(async move {
        let mut file_total: u64 = 0;
        let mut subdirs: Vec<PathBuf> = Vec::new();

        {
            let _permit = match semaphore.clone().acquire_owned().await {
                Ok(p) => p,
                Err(_) => return 0,
            };
            let mut entries = match tokio::fs::read_dir(&path).await {
                Ok(rd) => rd,
                Err(e) => {
                    debug!(path = %path.display(), error = %e, "subtree not listable");
                    return 0;
                }
            };
            loop {
                let entry = match entries.next_entry().await {
                    Ok(Some(e)) => e,
                    Ok(None) => break,
                    Err(e) => {
                        debug!(path = %path.display(), error = %e, "listing aborted");
                        break;
                    }
                };
                let meta = match timeout(limits.entry_timeout, entry.metadata()).await {
                    Ok(Ok(m)) => m,
                    Ok(Err(_)) => continue,
                    Err(_) => {
                        debug!(entry = %entry.path().display(), "entry stat timed out");
                        continue;
                    }
                };
                if ScanPolicy::excluded_by_attributes(&meta) {
                    continue;
                }
                let entry_path = entry.path();
                if policy.is_blocked(&entry_path) {
                    continue;
                }
                if meta.is_dir() {
                    subdirs.push(entry_path);
                } else {
                    file_total += meta.len();
                }
            }
            // Permit released here, before any descent.
        }

        let mut handles = Vec::with_capacity(subdirs.len());
        for sub in subdirs {
            let policy = policy.clone();
            let semaphore = semaphore.clone();
            handles.push(tokio::spawn(async move {
                match timeout(
                    limits.subtree_timeout,
                    walk(sub.clone(), policy, limits, semaphore),
                )
                .await
                {
                    Ok(total) => total,
                    Err(_) => {
                        warn!(path = %sub.display(), "subtree sizing timed out, counting zero");
                        0
                    }
                }
            }));
        }

        let mut total = file_total;
        for handle in handles {
            total += handle.await.unwrap_or(0);
        }
        total
    })
}

/// The `top` largest files under `root`, largest first.
///
/// Synchronous recursive scan; inaccessible, excluded, and blocked entries
/// are skipped. Intended for the blocking pool.
pub fn largest_files(root: &Path, policy: &ScanPolicy, top: usize) -> Vec<(PathBuf, u64)> {
    let mut files: Vec<(PathBuf, u64)> = Vec::new();
    let mut stack = vec![root.to_path_buf()];

    while let Some(dir) = stack.pop() {
        let entries = match fs::read_dir(&dir) {
            Ok(e) => e,
            Err(_) => continue,
        };
        for entry in entries.flatten() {
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
            if meta.is_dir() {
                stack.push(path);
            } else {
                files.push((path, meta.len()));
            }
        }
    }

    files.sort_by(|a, b| b.1.cmp(&a.1));
    files.truncate(top);
    files
}
