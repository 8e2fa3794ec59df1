//! Host side of the bridge
//!
//! Implements the bridge's `Host` trait on top of the Tauri app handle.

mod window;

pub use window::WindowHost;
