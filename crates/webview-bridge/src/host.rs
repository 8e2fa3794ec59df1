//! Host abstraction
//!
//! The bridge never touches a window directly. Title changes, message boxes,
//! quit requests and page events all go through [`Host`], implemented by the
//! Tauri shell for the desktop app and by [`HeadlessHost`] for the stdio
//! binary and tests.

use std::sync::Mutex;

use serde_json::{json, Value};
use tokio::sync::{mpsc, watch};

use crate::error::Result;

/// Event pushed from the bridge to the page.
#[derive(Debug, Clone, PartialEq)]
pub enum BridgeEvent {
    /// Free-form text for the page to display.
    Message(String),
    /// Full store snapshot after a mutation.
    DataUpdated(Value),
    System { kind: String, detail: String },
}

impl BridgeEvent {
    pub fn name(&self) -> &'static str {
        match self {
            BridgeEvent::Message(_) => "message",
            BridgeEvent::DataUpdated(_) => "data-updated",
            BridgeEvent::System { .. } => "system",
        }
    }

    pub fn payload(&self) -> Value {
        match self {
            BridgeEvent::Message(text) => json!(text),
            BridgeEvent::DataUpdated(snapshot) => snapshot.clone(),
            BridgeEvent::System { kind, detail } => json!({ "kind": kind, "detail": detail }),
        }
    }
}

pub trait Host: Send + Sync {
    fn set_title(&self, title: &str) -> Result<()>;

    /// Show `text` to the user in a message box.
    fn show_message(&self, text: &str) -> Result<()>;

    /// Ask the host to shut down. Returns immediately; the host decides when.
    fn request_quit(&self);

    fn emit(&self, event: BridgeEvent);
}

/// Receiving ends handed out by [`HeadlessHost::new`].
pub struct HostChannels {
    pub events: mpsc::UnboundedReceiver<BridgeEvent>,
    pub quit: watch::Receiver<bool>,
}

/// Host without a window: records the title, forwards events over a channel
/// and flips a watch flag on quit.
pub struct HeadlessHost {
    title: Mutex<String>,
    events: mpsc::UnboundedSender<BridgeEvent>,
    quit: watch::Sender<bool>,
}

impl HeadlessHost {
    pub fn new(title: impl Into<String>) -> (Self, HostChannels) {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let (quit_tx, quit_rx) = watch::channel(false);

        let host = Self {
            title: Mutex::new(title.into()),
            events: events_tx,
            quit: quit_tx,
        };
        let channels = HostChannels {
            events: events_rx,
            quit: quit_rx,
        };
        (host, channels)
    }

    pub fn title(&self) -> String {
        self.title
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    pub fn quit_requested(&self) -> bool {
        *self.quit.borrow()
    }
}

impl Host for HeadlessHost {
    fn set_title(&self, title: &str) -> Result<()> {
        log::info!("Window title set to {:?}", title);
        *self
            .title
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = title.to_string();
        Ok(())
    }

    /// No desktop to show a dialog on; the text goes out as a `message` event.
    fn show_message(&self, text: &str) -> Result<()> {
        log::info!("Message for the user: {:?}", text);
        self.emit(BridgeEvent::Message(text.to_string()));
        Ok(())
    }

    fn request_quit(&self) {
        log::info!("Quit requested");
        self.quit.send_replace(true);
    }

    fn emit(&self, event: BridgeEvent) {
        log::debug!("emit {}: {}", event.name(), event.payload());
        // Nobody listening is fine.
        let _ = self.events.send(event);
    }
}
