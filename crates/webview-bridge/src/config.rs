//! Runtime configuration
//!
//! Everything comes from environment variables with fallbacks, so the same
//! binary works from `cargo run`, from an installed bundle and from tests.

use std::env;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{bail, Result};

pub const ENV_ROOT: &str = "WEBVIEW_BRIDGE_ROOT";
pub const ENV_DATA: &str = "WEBVIEW_BRIDGE_DATA";
pub const ENV_TITLE: &str = "WEBVIEW_BRIDGE_TITLE";
pub const ENV_WATCH: &str = "WEBVIEW_BRIDGE_WATCH";
pub const ENV_QUIT_DELAY: &str = "WEBVIEW_BRIDGE_QUIT_DELAY_MS";

pub const DEFAULT_TITLE: &str = "WebView Bridge";
pub const DEFAULT_QUIT_DELAY: Duration = Duration::from_millis(1000);

#[derive(Debug, Clone, PartialEq)]
pub struct BridgeConfig {
    /// Only directory `read_file` / `list_files` may touch
    pub root: PathBuf,
    /// JSON data file; `None` keeps the store in memory
    pub data_file: Option<PathBuf>,
    /// Initial window title
    pub title: String,
    /// Emit `files-changed` events when the root changes
    pub watch: bool,
    /// Grace period between a quit request and the host exiting
    pub quit_delay: Duration,
}

impl BridgeConfig {
    pub fn from_env() -> Result<Self> {
        let exe = env::current_exe().ok();
        let cwd = env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
        Self::from_lookup(|key| env::var(key).ok(), exe.as_deref(), &cwd)
    }

    /// Build from an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F, exe: Option<&Path>, cwd: &Path) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let root = match lookup(ENV_ROOT).filter(|v| !v.trim().is_empty()) {
            Some(explicit) => {
                let path = PathBuf::from(explicit);
                if !path.is_dir() {
                    bail!("{} points to a missing directory: {:?}", ENV_ROOT, path);
                }
                path
            }
            None => default_root(exe, cwd),
        };

        let data_file = lookup(ENV_DATA)
            .filter(|v| !v.trim().is_empty())
            .map(PathBuf::from);

        let title = lookup(ENV_TITLE)
            .filter(|v| !v.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_TITLE.to_string());

        let watch = match lookup(ENV_WATCH) {
            Some(v) => !matches!(v.trim().to_ascii_lowercase().as_str(), "0" | "false" | "no" | "off"),
            None => true,
        };

        let quit_delay = match lookup(ENV_QUIT_DELAY) {
            Some(v) => match v.trim().parse::<u64>() {
                Ok(ms) => Duration::from_millis(ms),
                Err(_) => bail!("{} must be a number of milliseconds, got {:?}", ENV_QUIT_DELAY, v),
            },
            None => DEFAULT_QUIT_DELAY,
        };

        Ok(Self {
            root,
            data_file,
            title,
            watch,
            quit_delay,
        })
    }
}

/// Sandbox root when none is configured.
///
/// A binary under `target/debug` or `target/release` is a development build;
/// its root is the workspace that owns that `target/` directory. Otherwise
/// the executable's own directory, then the working directory.
fn default_root(exe: Option<&Path>, cwd: &Path) -> PathBuf {
    if let Some(exe_dir) = exe.and_then(Path::parent) {
        let profile = exe_dir.file_name().and_then(|n| n.to_str());
        let in_target = exe_dir
            .parent()
            .and_then(Path::file_name)
            .is_some_and(|n| n == "target");

        if in_target && matches!(profile, Some("debug" | "release")) {
            if let Some(workspace) = exe_dir.parent().and_then(Path::parent) {
                if workspace.join("Cargo.toml").exists() {
                    return workspace.to_path_buf();
                }
            }
        }

        if exe_dir.is_dir() && !in_target {
            return exe_dir.to_path_buf();
        }
    }

    cwd.to_path_buf()
}
