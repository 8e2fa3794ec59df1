//! Bridge operations as Tauri commands
//!
//! One typed command per operation, plus `bridge_call`, which goes through
//! the dispatch table and answers with the stringified payload the page's
//! callback-style shim expects. Failures are returned as `Ok` payloads with
//! `success: false`; the `Err` side is only used when the shell itself breaks.

use serde::Serialize;
use serde_json::{json, Value};
use tauri::{State, WebviewWindow};

use webview_bridge::{DebugInfo, EnvironmentInfo};

use crate::AppState;

/// Success payload, or the error's structured failure payload
fn payload<T: Serialize>(result: webview_bridge::Result<T>) -> Result<Value, String> {
    match result {
        Ok(value) => serde_json::to_value(value).map_err(|e| e.to_string()),
        Err(e) => {
            log::warn!("bridge operation failed: {}", e);
            Ok(e.to_payload())
        }
    }
}

/// Invoke any operation by name
#[tauri::command]
pub async fn bridge_call(
    state: State<'_, AppState>,
    method: String,
    args: Option<Vec<Value>>,
) -> Result<String, String> {
    let mut bridge = state.bridge.lock().await;
    let args = args.unwrap_or_default();
    Ok(bridge.invoke_to_string(&method, &args))
}

/// Return the message unchanged
#[tauri::command]
pub async fn echo_message(state: State<'_, AppState>, message: String) -> Result<String, String> {
    let bridge = state.bridge.lock().await;
    Ok(bridge.echo(&message))
}

/// Get host and runtime facts
#[tauri::command]
pub async fn get_system_info(state: State<'_, AppState>) -> Result<EnvironmentInfo, String> {
    let bridge = state.bridge.lock().await;
    Ok(bridge.environment_info())
}

#[tauri::command]
pub async fn get_version(state: State<'_, AppState>) -> Result<String, String> {
    let bridge = state.bridge.lock().await;
    Ok(bridge.version())
}

/// Evaluate an arithmetic expression
#[tauri::command]
pub async fn calculate(state: State<'_, AppState>, expression: String) -> Result<Value, String> {
    let bridge = state.bridge.lock().await;
    payload(bridge.calculate(&expression))
}

/// Store a value under a key, overwriting silently
#[tauri::command]
pub async fn store_data(
    state: State<'_, AppState>,
    key: String,
    value: String,
) -> Result<Value, String> {
    let mut bridge = state.bridge.lock().await;
    payload(bridge.store_data(&key, &value).map(|_| Value::Null))
}

/// Get a stored value
#[tauri::command]
pub async fn get_data(state: State<'_, AppState>, key: String) -> Result<Value, String> {
    let bridge = state.bridge.lock().await;
    payload(bridge.get_data(&key))
}

/// Get every stored value, keyed by name
#[tauri::command]
pub async fn get_all_data(state: State<'_, AppState>) -> Result<Value, String> {
    let bridge = state.bridge.lock().await;
    Ok(bridge.get_all_data())
}

/// Delete one stored value
#[tauri::command]
pub async fn delete_data(state: State<'_, AppState>, key: String) -> Result<Value, String> {
    let mut bridge = state.bridge.lock().await;
    payload(bridge.delete_data(&key).map(|_| json!({ "success": true })))
}

/// Delete every stored value
#[tauri::command]
pub async fn clear_data(state: State<'_, AppState>) -> Result<Value, String> {
    let mut bridge = state.bridge.lock().await;
    payload(bridge.clear_data().map(|_| Value::Null))
}

/// Read a text file inside the sandbox root
#[tauri::command]
pub async fn read_file(state: State<'_, AppState>, path: String) -> Result<Value, String> {
    let bridge = state.bridge.lock().await;
    payload(bridge.read_file(&path))
}

/// List regular files in the sandbox root
#[tauri::command]
pub async fn list_files(state: State<'_, AppState>) -> Result<Value, String> {
    let bridge = state.bridge.lock().await;
    payload(bridge.list_files())
}

#[tauri::command]
pub async fn set_window_title(state: State<'_, AppState>, title: String) -> Result<Value, String> {
    let bridge = state.bridge.lock().await;
    payload(bridge.set_window_title(&title).map(|_| Value::Null))
}

/// Show a desktop message box
#[tauri::command]
pub async fn show_message(state: State<'_, AppState>, message: String) -> Result<Value, String> {
    let bridge = state.bridge.lock().await;
    payload(bridge.show_message(&message).map(|_| Value::Null))
}

/// Quit after the configured grace delay
#[tauri::command]
pub async fn quit_application(state: State<'_, AppState>) -> Result<(), String> {
    let bridge = state.bridge.lock().await;
    bridge.quit_application();
    Ok(())
}

/// Forward a page log line to the application log
#[tauri::command]
pub async fn log_message(
    state: State<'_, AppState>,
    level: String,
    message: String,
) -> Result<(), String> {
    let bridge = state.bridge.lock().await;
    bridge.log_message(&level, &message);
    Ok(())
}

#[tauri::command]
pub async fn get_debug_info(state: State<'_, AppState>) -> Result<DebugInfo, String> {
    let bridge = state.bridge.lock().await;
    Ok(bridge.debug_info())
}

/// Acknowledge `data` with a `bridge://message` event
#[tauri::command]
pub async fn test_callback(state: State<'_, AppState>, data: String) -> Result<(), String> {
    let bridge = state.bridge.lock().await;
    bridge.test_callback(&data);
    Ok(())
}

#[tauri::command]
pub fn open_devtools(window: WebviewWindow) {
    log::info!("Opening devtools for {:?}", window.label());
    window.open_devtools();
}
