//! WebView Bridge
//!
//! The operation bridge between an embedded web page and its desktop host:
//! a fixed dispatch table of named operations (echo, environment facts,
//! expression evaluation, key/value storage, sandboxed file access, window
//! control), with every failure reported as a structured JSON payload.
//!
//! The Tauri shell in `gui/src-tauri` registers a [`Bridge`] on its IPC
//! channel; the `webview-bridge` binary serves the same table over
//! line-delimited JSON-RPC on stdio.

pub mod bridge;
pub mod config;
pub mod error;
pub mod expr;
pub mod files;
pub mod host;
pub mod protocol;
pub mod stdio;
pub mod store;
pub mod system;
pub mod watch;

pub use bridge::{Bridge, Calculation, StoredValue, CHANNEL_NAME};
pub use config::BridgeConfig;
pub use error::{BridgeError, Result};
pub use files::{DirectoryListing, FileContent, FileEntry, Sandbox};
pub use host::{BridgeEvent, HeadlessHost, Host, HostChannels};
pub use store::{Entry, FileStore, KvStore, MemoryStore};
pub use system::{DebugInfo, EnvironmentInfo};
