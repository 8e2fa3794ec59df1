//! Tauri window host
//!
//! Title changes go to the main window, messages open a native dialog, quit
//! requests exit the app after a grace delay, and bridge events are emitted
//! to the page as `bridge://<name>`.

use std::time::Duration;

use tauri::{AppHandle, Emitter, Manager};
use tauri_plugin_dialog::{DialogExt, MessageDialogKind};

use webview_bridge::{BridgeError, BridgeEvent, Host};

use crate::MAIN_WINDOW;

/// Prefix of every event the page can `listen` to.
pub const EVENT_PREFIX: &str = "bridge://";

const MESSAGE_TITLE: &str = "Message from the page";

pub struct WindowHost {
    app: AppHandle,
    quit_delay: Duration,
}

impl WindowHost {
    pub fn new(app: AppHandle, quit_delay: Duration) -> Self {
        Self { app, quit_delay }
    }
}

impl Host for WindowHost {
    fn set_title(&self, title: &str) -> webview_bridge::Result<()> {
        let window = self
            .app
            .get_webview_window(MAIN_WINDOW)
            .ok_or_else(|| BridgeError::Host(format!("window {:?} not found", MAIN_WINDOW)))?;

        window
            .set_title(title)
            .map_err(|e| BridgeError::Host(e.to_string()))?;

        log::info!("Window title set to {:?}", title);
        Ok(())
    }

    fn show_message(&self, text: &str) -> webview_bridge::Result<()> {
        log::info!("Showing message: {:?}", text);

        // Non-blocking; the command returns while the dialog is still open.
        let mut dialog = self
            .app
            .dialog()
            .message(text)
            .title(MESSAGE_TITLE)
            .kind(MessageDialogKind::Info);
        if let Some(window) = self.app.get_webview_window(MAIN_WINDOW) {
            dialog = dialog.parent(&window);
        }
        dialog.show(|_| {});
        Ok(())
    }

    fn request_quit(&self) {
        log::info!("Quit requested, exiting in {:?}", self.quit_delay);

        // Let the page render the reply before the window goes away.
        let app = self.app.clone();
        let delay = self.quit_delay;
        tauri::async_runtime::spawn(async move {
            tokio::time::sleep(delay).await;
            app.exit(0);
        });
    }

    fn emit(&self, event: BridgeEvent) {
        let name = format!("{}{}", EVENT_PREFIX, event.name());
        if let Err(e) = self.app.emit(&name, event.payload()) {
            log::warn!("Failed to emit {}: {}", name, e);
        }
    }
}
