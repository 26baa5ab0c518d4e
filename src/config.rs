//! Engine configuration: TOML file loading, CLI overrides, and defaults.
//!
//! Resolution order (first found wins, values merge/override):
//! 1. CLI flags (`--config`, `--sort`, `--fan-out`, etc.)
//! 2. `$DIRSCOPE_CONFIG` environment variable (path to config file)
//! 3. Project-local `.dirscope.toml` in the current working directory
//! 4. Global `~/.config/dirscope/config.toml`
//! 5. Built-in defaults

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use tracing::warn;

use crate::engine::EngineOptions;
use crate::fs::aggregator::AggregateLimits;
use crate::fs::policy::ScanPolicy;
use crate::tree::SortMode;

// ── Section configs ──────────────────────────────────────────────────────────

/// Sizing-scan settings.
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct ScanConfig {
    /// Concurrent filesystem operations per sizing run.
    pub fan_out: Option<usize>,
    /// Timeout for a single entry stat, in milliseconds.
    pub entry_timeout_ms: Option<u64>,
    /// Timeout for one subdirectory's full recursive total, in milliseconds.
    pub subtree_timeout_ms: Option<u64>,
    /// Path prefixes never traversed or measured (replaces the platform
    /// default list when set).
    pub blocked_paths: Option<Vec<String>>,
}

/// Tree presentation settings.
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct TreeConfig {
    /// Sort order: "name" or "size".
    pub sort_by: Option<String>,
}

// ── Top-level config ─────────────────────────────────────────────────────────

/// Top-level configuration.
///
/// All fields are optional so that partial configs from different sources
/// can be merged together (CLI overrides file, file overrides defaults).
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct AppConfig {
    pub scan: ScanConfig,
    pub tree: TreeConfig,
}

// ── Default constants ────────────────────────────────────────────────────────

/// Default fan-out limit for one sizing operation.
pub const DEFAULT_FAN_OUT: usize = 8;
/// Default per-entry stat timeout in milliseconds.
pub const DEFAULT_ENTRY_TIMEOUT_MS: u64 = 2_000;
/// Default per-subtree timeout in milliseconds.
pub const DEFAULT_SUBTREE_TIMEOUT_MS: u64 = 30_000;

// ── Config file locator ──────────────────────────────────────────────────────

/// Return the list of candidate config file paths in priority order.
///
/// Does NOT include the CLI `--config` path — that is handled separately.
fn candidate_paths() -> Vec<PathBuf> {
    let mut paths = Vec::new();

    // 1. $DIRSCOPE_CONFIG environment variable
    if let Ok(env_path) = std::env::var("DIRSCOPE_CONFIG") {
        paths.push(PathBuf::from(env_path));
    }

    // 2. Project-local `.dirscope.toml` in CWD
    if let Ok(cwd) = std::env::current_dir() {
        paths.push(cwd.join(".dirscope.toml"));
    }

    // 3. Global `~/.config/dirscope/config.toml`
    if let Some(config_dir) = dirs::config_dir() {
        paths.push(config_dir.join("dirscope").join("config.toml"));
    }

    paths
}

/// Try to read and parse a TOML config file. Returns `None` if the file
/// doesn't exist or can't be parsed (with a logged warning).
fn load_file(path: &Path) -> Option<AppConfig> {
    let content = match std::fs::read_to_string(path) {
        Ok(c) => c,
        Err(_) => return None,
    };
    match toml::from_str::<AppConfig>(&content) {
        Ok(cfg) => Some(cfg),
        Err(e) => {
            warn!(path = %path.display(), error = %e, "failed to parse config file");
            None
        }
    }
}

// ── Merge logic ──────────────────────────────────────────────────────────────

impl AppConfig {
    /// Merge `other` on top of `self` — `other`'s `Some` values win.
    pub fn merge(self, other: &AppConfig) -> AppConfig {
        AppConfig {
            scan: ScanConfig {
                fan_out: other.scan.fan_out.or(self.scan.fan_out),
                entry_timeout_ms: other.scan.entry_timeout_ms.or(self.scan.entry_timeout_ms),
                subtree_timeout_ms: other
                    .scan
                    .subtree_timeout_ms
                    .or(self.scan.subtree_timeout_ms),
                blocked_paths: other
                    .scan
                    .blocked_paths
                    .clone()
                    .or(self.scan.blocked_paths),
            },
            tree: TreeConfig {
                sort_by: other.tree.sort_by.clone().or(self.tree.sort_by),
            },
        }
    }

    /// Load the final merged configuration.
    ///
    /// `cli_config_path` is an explicit config file path from `--config`.
    /// `cli_overrides` are partial overrides derived from CLI flags.
    pub fn load(cli_config_path: Option<&Path>, cli_overrides: Option<&AppConfig>) -> AppConfig {
        // Start with built-in defaults (all None — the struct Default).
        let mut config = AppConfig::default();

        // Load from candidate files (lowest priority first so higher overwrites).
        let paths = candidate_paths();
        for path in paths.iter().rev() {
            if let Some(file_cfg) = load_file(path) {
                config = config.merge(&file_cfg);
            }
        }

        // Explicit --config file has higher priority than candidates.
        if let Some(cli_path) = cli_config_path {
            if let Some(file_cfg) = load_file(cli_path) {
                config = config.merge(&file_cfg);
            }
        }

        // CLI flags override everything.
        if let Some(overrides) = cli_overrides {
            config = config.merge(overrides);
        }

        config
    }

    /// Resolve the merged config into concrete engine options.
    pub fn engine_options(&self) -> EngineOptions {
        let policy = match &self.scan.blocked_paths {
            Some(paths) => ScanPolicy::new(paths.clone()),
            None => ScanPolicy::platform_defaults(),
        };
        EngineOptions {
            fan_out: self.scan.fan_out.unwrap_or(DEFAULT_FAN_OUT).max(1),
            limits: AggregateLimits {
                entry_timeout: Duration::from_millis(
                    self.scan.entry_timeout_ms.unwrap_or(DEFAULT_ENTRY_TIMEOUT_MS),
                ),
                subtree_timeout: Duration::from_millis(
                    self.scan
                        .subtree_timeout_ms
                        .unwrap_or(DEFAULT_SUBTREE_TIMEOUT_MS),
                ),
            },
            policy,
            sort_mode: self
                .tree
                .sort_by
                .as_deref()
                .map(SortMode::from_str)
                .unwrap_or(SortMode::NameAscending),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn defaults_resolve_to_engine_defaults() {
        let options = AppConfig::default().engine_options();
        assert_eq!(options.fan_out, DEFAULT_FAN_OUT);
        assert_eq!(
            options.limits.entry_timeout,
            Duration::from_millis(DEFAULT_ENTRY_TIMEOUT_MS)
        );
        assert_eq!(options.sort_mode, SortMode::NameAscending);
    }

    #[test]
    fn merge_later_source_wins() {
        let base = AppConfig {
            scan: ScanConfig {
                fan_out: Some(4),
                entry_timeout_ms: Some(100),
                ..ScanConfig::default()
            },
            tree: TreeConfig {
                sort_by: Some("name".to_string()),
            },
        };
        let over = AppConfig {
            scan: ScanConfig {
                fan_out: Some(16),
                ..ScanConfig::default()
            },
            tree: TreeConfig {
                sort_by: Some("size".to_string()),
            },
        };
        let merged = base.merge(&over);
        assert_eq!(merged.scan.fan_out, Some(16));
        // Untouched fields keep the base value.
        assert_eq!(merged.scan.entry_timeout_ms, Some(100));
        assert_eq!(merged.tree.sort_by.as_deref(), Some("size"));
    }

    #[test]
    fn parses_toml_sections() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("config.toml");
        std::fs::write(
            &path,
            r#"
[scan]
fan_out = 2
subtree_timeout_ms = 500
blocked_paths = ["/nfs/slow"]

[tree]
sort_by = "size"
"#,
        )
        .unwrap();

        let cfg = load_file(&path).unwrap();
        assert_eq!(cfg.scan.fan_out, Some(2));
        assert_eq!(cfg.scan.subtree_timeout_ms, Some(500));

        let options = cfg.engine_options();
        assert_eq!(options.fan_out, 2);
        assert_eq!(options.limits.subtree_timeout, Duration::from_millis(500));
        assert_eq!(options.sort_mode, SortMode::SizeDescending);
        assert!(options.policy.is_blocked(Path::new("/nfs/slow/share")));
    }

    #[test]
    fn unparsable_file_is_ignored() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("config.toml");
        std::fs::write(&path, "not [ valid { toml").unwrap();
        assert!(load_file(&path).is_none());
    }

    #[test]
    fn missing_file_is_ignored() {
        let tmp = TempDir::new().unwrap();
        assert!(load_file(&tmp.path().join("absent.toml")).is_none());
    }

    #[test]
    fn explicit_config_overridden_by_cli_flags() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("config.toml");
        std::fs::write(&path, "[scan]\nfan_out = 4\n").unwrap();

        let cli = AppConfig {
            scan: ScanConfig {
                fan_out: Some(32),
                ..ScanConfig::default()
            },
            tree: TreeConfig::default(),
        };
        let cfg = AppConfig::load(Some(&path), Some(&cli));
        assert_eq!(cfg.scan.fan_out, Some(32));
    }

    #[test]
    fn zero_fan_out_clamps_to_one() {
        let cfg = AppConfig {
            scan: ScanConfig {
                fan_out: Some(0),
                ..ScanConfig::default()
            },
            tree: TreeConfig::default(),
        };
        assert_eq!(cfg.engine_options().fan_out, 1);
    }
}
