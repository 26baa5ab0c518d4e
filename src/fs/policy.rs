//! Traversal policy: which paths and entry kinds are never listed, sized,
//! or searched.

use std::fs::Metadata;
use std::path::Path;

/// Path prefixes that are never traversed or measured on Windows.
#[cfg(windows)]
pub const DEFAULT_BLOCKED_PATHS: &[&str] =
    &["C:\\Windows\\WinSxS", "C:\\Windows\\System32\\config"];

/// Path prefixes that are never traversed or measured on POSIX systems.
#[cfg(not(windows))]
pub const DEFAULT_BLOCKED_PATHS: &[&str] = &[
    "/proc",
    "/sys",
    "/dev",
    "/run",
    "/var/run",
    "/System",
    "/Library",
    "/private",
];

/// Blocked-path and attribute exclusions applied uniformly across listing,
/// sizing, and searching.
#[derive(Debug, Clone)]
pub struct ScanPolicy {
    /// Lowercased path prefixes; matching is a case-insensitive prefix test.
    blocked: Vec<String>,
}

impl ScanPolicy {
    pub fn new(blocked_paths: Vec<String>) -> Self {
        Self {
            blocked: blocked_paths.into_iter().map(|p| p.to_lowercase()).collect(),
        }
    }

    /// Policy with the platform default blocked-path list.
    pub fn platform_defaults() -> Self {
        Self::new(DEFAULT_BLOCKED_PATHS.iter().map(|s| s.to_string()).collect())
    }

    /// Whether `path` falls under a blocked prefix.
    pub fn is_blocked(&self, path: &Path) -> bool {
        let lowered = path.to_string_lossy().to_lowercase();
        self.blocked.iter().any(|prefix| lowered.starts_with(prefix))
    }

    /// Whether an entry's attributes exclude it from traversal.
    ///
    /// Symlinks (reparse points) are always excluded — the filesystem's own
    /// cycles are broken here. Device and system-attributed entries are
    /// excluded on the platforms that expose them. `meta` must come from a
    /// `symlink_metadata` call so the link itself is inspected.
    pub fn excluded_by_attributes(meta: &Metadata) -> bool {
        if meta.file_type().is_symlink() {
            return true;
        }
        #[cfg(unix)]
        {
            use std::os::unix::fs::FileTypeExt;
            let ft = meta.file_type();
            if ft.is_block_device() || ft.is_char_device() || ft.is_fifo() || ft.is_socket() {
                return true;
            }
        }
        #[cfg(windows)]
        {
            use std::os::windows::fs::MetadataExt;
            const FILE_ATTRIBUTE_SYSTEM: u32 = 0x4;
            const FILE_ATTRIBUTE_DEVICE: u32 = 0x40;
            const FILE_ATTRIBUTE_REPARSE_POINT: u32 = 0x400;
            if meta.file_attributes()
                & (FILE_ATTRIBUTE_SYSTEM | FILE_ATTRIBUTE_DEVICE | FILE_ATTRIBUTE_REPARSE_POINT)
                != 0
            {
                return true;
            }
        }
        false
    }
}

impl Default for ScanPolicy {
    fn default() -> Self {
        Self::platform_defaults()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn prefix_match_is_case_insensitive() {
        let policy = ScanPolicy::new(vec!["/proc".to_string()]);
        assert!(policy.is_blocked(Path::new("/proc")));
        assert!(policy.is_blocked(Path::new("/proc/1/fd")));
        assert!(policy.is_blocked(Path::new("/PROC/cpuinfo")));
        assert!(!policy.is_blocked(Path::new("/home/proc")));
    }

    #[test]
    fn unrelated_paths_pass() {
        let policy = ScanPolicy::platform_defaults();
        assert!(!policy.is_blocked(Path::new("/home/user/projects")));
    }

    #[test]
    fn empty_policy_blocks_nothing() {
        let policy = ScanPolicy::new(Vec::new());
        assert!(!policy.is_blocked(&PathBuf::from("/proc")));
    }

    #[test]
    fn regular_file_not_excluded() {
        let tmp = tempfile::TempDir::new().unwrap();
        let file = tmp.path().join("plain.txt");
        std::fs::write(&file, "data").unwrap();
        let meta = std::fs::symlink_metadata(&file).unwrap();
        assert!(!ScanPolicy::excluded_by_attributes(&meta));
    }

    #[cfg(unix)]
    #[test]
    fn symlink_is_excluded() {
        let tmp = tempfile::TempDir::new().unwrap();
        let target = tmp.path().join("target.txt");
        std::fs::write(&target, "data").unwrap();
        let link = tmp.path().join("link");
        std::os::unix::fs::symlink(&target, &link).unwrap();
        let meta = std::fs::symlink_metadata(&link).unwrap();
        assert!(ScanPolicy::excluded_by_attributes(&meta));
    }
}
