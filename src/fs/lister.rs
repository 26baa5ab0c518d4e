//! Single-level directory enumeration.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::fs::policy::ScanPolicy;
use crate::tree::NodeKind;

/// One accepted directory entry, ready to become a tree node.
#[derive(Debug, Clone)]
pub struct ChildEntry {
    pub name: String,
    pub path: PathBuf,
    pub kind: NodeKind,
    /// Byte length for files; `None` for directories (sized in background).
    pub size: Option<u64>,
}

/// Enumerate the immediate children of `path`.
///
/// Entries excluded by attributes (symlinks, devices, system files) or by the
/// blocked-path policy are skipped. Unreadable entries are skipped; an
/// unreadable directory yields an empty list — neither is fatal to the
/// caller. Ordering is whatever the OS returns; sorting is applied by the
/// tree afterwards.
pub fn list_dir(path: &Path, policy: &ScanPolicy) -> Vec<ChildEntry> {
    let entries = match fs::read_dir(path) {
        Ok(e) => e,
        Err(e) => {
            debug!(path = %path.display(), error = %e, "directory not listable");
            return Vec::new();
        }
    };

    let mut children = Vec::new();
    for entry in entries {
        let entry = match entry {
            Ok(e) => e,
            Err(_) => continue,
        };
        let meta = match entry.metadata() {
            Ok(m) => m,
            Err(_) => continue,
        };
        if ScanPolicy::excluded_by_attributes(&meta) {
            continue;
        }
        let child_path = entry.path();
        if policy.is_blocked(&child_path) {
            debug!(path = %child_path.display(), "skipping blocked path");
            continue;
        }
        let name = entry.file_name().to_string_lossy().to_string();
        if meta.is_dir() {
            children.push(ChildEntry {
                name,
                path: child_path,
                kind: NodeKind::Directory,
                size: None,
            });
        } else {
            children.push(ChildEntry {
                name,
                path: child_path,
                kind: NodeKind::File,
                size: Some(meta.len()),
            });
        }
    }
    children
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn lists_files_with_sizes_and_dirs_unsized() {
        let tmp = TempDir::new().unwrap();
        std::fs::write(tmp.path().join("a.txt"), vec![0u8; 100]).unwrap();
        std::fs::create_dir(tmp.path().join("sub")).unwrap();

        let children = list_dir(tmp.path(), &ScanPolicy::new(Vec::new()));
        assert_eq!(children.len(), 2);

        let file = children.iter().find(|c| c.name == "a.txt").unwrap();
        assert_eq!(file.kind, NodeKind::File);
        assert_eq!(file.size, Some(100));

        let dir = children.iter().find(|c| c.name == "sub").unwrap();
        assert_eq!(dir.kind, NodeKind::Directory);
        assert_eq!(dir.size, None);
    }

    #[test]
    fn missing_directory_yields_empty() {
        let tmp = TempDir::new().unwrap();
        let gone = tmp.path().join("never_created");
        assert!(list_dir(&gone, &ScanPolicy::new(Vec::new())).is_empty());
    }

    #[test]
    fn blocked_subdirectory_is_skipped() {
        let tmp = TempDir::new().unwrap();
        let blocked = tmp.path().join("vault");
        std::fs::create_dir(&blocked).unwrap();
        std::fs::write(tmp.path().join("kept.txt"), "x").unwrap();

        let policy = ScanPolicy::new(vec![blocked.to_string_lossy().to_string()]);
        let children = list_dir(tmp.path(), &policy);
        assert_eq!(children.len(), 1);
        assert_eq!(children[0].name, "kept.txt");
    }

    #[cfg(unix)]
    #[test]
    fn symlink_entries_are_skipped() {
        let tmp = TempDir::new().unwrap();
        std::fs::write(tmp.path().join("real.txt"), "x").unwrap();
        std::os::unix::fs::symlink(tmp.path().join("real.txt"), tmp.path().join("link")).unwrap();

        let children = list_dir(tmp.path(), &ScanPolicy::new(Vec::new()));
        assert_eq!(children.len(), 1);
        assert_eq!(children[0].name, "real.txt");
    }
}
