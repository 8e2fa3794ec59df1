//! WebView Bridge GUI - Tauri Backend
//!
//! Desktop window hosting the demo page under `gui/ui`, with the bridge
//! registered on Tauri's IPC channel.

mod commands;
mod host;

use std::sync::{Arc, Mutex as StdMutex};

use tauri::Manager;
use tokio::sync::Mutex;

use webview_bridge::watch::{self, DirectoryWatcher};
use webview_bridge::{Bridge, BridgeConfig};

use host::WindowHost;

/// Label of the window created from `tauri.conf.json`
pub const MAIN_WINDOW: &str = "main";

/// Application state shared across all commands
pub struct AppState {
    pub bridge: Arc<Mutex<Bridge>>,
    /// Held only to keep the watcher thread alive
    _watcher: StdMutex<Option<DirectoryWatcher>>,
}

#[cfg_attr(mobile, tauri::mobile_entry_point)]
pub fn run() {
    // Initialize logging
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    log::info!("Starting WebView Bridge GUI...");

    let config = match BridgeConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            log::error!("Invalid configuration: {:#}", e);
            std::process::exit(2);
        }
    };

    log::info!("Sandbox root: {:?}", config.root);
    log::info!("Data file: {:?}", config.data_file);

    tauri::Builder::default()
        .plugin(tauri_plugin_opener::init())
        .plugin(tauri_plugin_dialog::init())
        .setup(move |app| {
            let host = Arc::new(WindowHost::new(app.handle().clone(), config.quit_delay));
            let bridge = Bridge::from_config(&config, host.clone())?;

            let watcher = if config.watch {
                let root = bridge.sandbox().root();
                match watch::watch_directory(root, config.data_file.as_slice(), host.clone()) {
                    Ok(w) => Some(w),
                    Err(e) => {
                        log::warn!("Directory watcher unavailable: {}", e);
                        None
                    }
                }
            } else {
                None
            };

            if let Some(window) = app.get_webview_window(MAIN_WINDOW) {
                window.set_title(&config.title)?;
            }

            app.manage(AppState {
                bridge: Arc::new(Mutex::new(bridge)),
                _watcher: StdMutex::new(watcher),
            });

            log::info!("Bridge registered as {:?}", webview_bridge::CHANNEL_NAME);
            Ok(())
        })
        .invoke_handler(tauri::generate_handler![
            commands::bridge_call,
            commands::echo_message,
            commands::get_system_info,
            commands::get_version,
            commands::calculate,
            commands::store_data,
            commands::get_data,
            commands::get_all_data,
            commands::delete_data,
            commands::clear_data,
            commands::read_file,
            commands::list_files,
            commands::set_window_title,
            commands::show_message,
            commands::quit_application,
            commands::log_message,
            commands::get_debug_info,
            commands::test_callback,
            commands::open_devtools,
        ])
        .run(tauri::generate_context!())
        .expect("error while running tauri application");
}
