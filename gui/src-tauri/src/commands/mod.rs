//! Tauri commands
//!
//! These commands are invoked from the page via Tauri's invoke API.

mod bridge;

pub use bridge::*;
