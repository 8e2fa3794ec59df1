//! Host and runtime facts reported to the page

use std::env;

use chrono::Local;
use serde::Serialize;

pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[derive(Debug, Clone, Serialize)]
pub struct EnvironmentInfo {
    pub os: &'static str,
    pub family: &'static str,
    pub arch: &'static str,
    pub version: &'static str,
    pub current_time: String,
    pub working_directory: String,
    pub env_var_count: usize,
    pub pid: u32,
}

impl EnvironmentInfo {
    pub fn collect() -> Self {
        Self {
            os: env::consts::OS,
            family: env::consts::FAMILY,
            arch: env::consts::ARCH,
            version: VERSION,
            current_time: Local::now().format("%Y-%m-%d %H:%M:%S").to_string(),
            working_directory: working_directory(),
            env_var_count: env::vars_os().count(),
            pid: std::process::id(),
        }
    }
}

pub fn version_string() -> String {
    format!("webview-bridge {}", VERSION)
}

#[derive(Debug, Clone, Serialize)]
pub struct RuntimeInfo {
    pub version: &'static str,
    pub executable: Option<String>,
    pub args: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ApplicationInfo {
    pub current_time: String,
    pub working_directory: String,
    pub stored_entries: usize,
    pub storage: String,
    pub sandbox_root: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ChannelInfo {
    pub registered_objects: Vec<&'static str>,
    pub operations: Vec<&'static str>,
}

#[derive(Debug, Clone, Serialize)]
pub struct DebugInfo {
    pub runtime: RuntimeInfo,
    pub application: ApplicationInfo,
    pub channel: ChannelInfo,
}

impl RuntimeInfo {
    pub fn collect() -> Self {
        Self {
            version: VERSION,
            executable: env::current_exe()
                .ok()
                .map(|p| p.to_string_lossy().to_string()),
            args: env::args().take(3).collect(),
        }
    }
}

pub(crate) fn working_directory() -> String {
    env::current_dir()
        .map(|p| p.to_string_lossy().to_string())
        .unwrap_or_default()
}

pub(crate) fn now_iso() -> String {
    Local::now().to_rfc3339()
}
