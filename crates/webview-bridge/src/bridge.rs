//! The bridge object exposed to page script
//!
//! Operations are reachable two ways: as typed methods (used by the Tauri
//! commands) and by name through an explicit dispatch table (used by the
//! generic `bridge_call` command and the stdio transport). Both paths share
//! the same implementation; only the dispatch path converts to JSON.

use std::collections::HashMap;
use std::sync::Arc;

use anyhow::Context;
use chrono::{DateTime, Local};
use serde::Serialize;
use serde_json::{json, Value};

use crate::config::BridgeConfig;
use crate::error::{BridgeError, Result};
use crate::expr::{self, Number};
use crate::files::{DirectoryListing, FileContent, Sandbox};
use crate::host::{BridgeEvent, Host};
use crate::store::{FileStore, KvStore, MemoryStore};
use crate::system::{self, ApplicationInfo, ChannelInfo, DebugInfo, EnvironmentInfo, RuntimeInfo};

/// Name the bridge is registered under on the page side.
pub const CHANNEL_NAME: &str = "bridge";

pub type Handler = fn(&mut Bridge, &Args<'_>) -> Result<Value>;

/// One row of the dispatch table.
#[derive(Clone, Copy)]
pub struct Operation {
    /// Canonical name first, aliases after
    pub names: &'static [&'static str],
    pub arity: usize,
    pub handler: Handler,
}

#[rustfmt::skip]
static OPERATIONS: &[Operation] = &[
    Operation { names: &["echo", "echo_message"], arity: 1, handler: op_echo },
    Operation { names: &["get_environment_info", "get_system_info"], arity: 0, handler: op_environment_info },
    Operation { names: &["get_version"], arity: 0, handler: op_version },
    Operation { names: &["compute_expression", "calculate"], arity: 1, handler: op_calculate },
    Operation { names: &["store_data", "store"], arity: 2, handler: op_store_data },
    Operation { names: &["get_data", "get"], arity: 1, handler: op_get_data },
    Operation { names: &["get_all_data", "get_all"], arity: 0, handler: op_get_all_data },
    Operation { names: &["delete_data", "delete"], arity: 1, handler: op_delete_data },
    Operation { names: &["clear_data", "clear"], arity: 0, handler: op_clear_data },
    Operation { names: &["read_file"], arity: 1, handler: op_read_file },
    Operation { names: &["list_files", "list_directory"], arity: 0, handler: op_list_files },
    Operation { names: &["set_window_title"], arity: 1, handler: op_set_window_title },
    Operation { names: &["show_message", "show_notification"], arity: 1, handler: op_show_message },
    Operation { names: &["quit_application", "request_quit"], arity: 0, handler: op_quit_application },
    Operation { names: &["log_message"], arity: 2, handler: op_log_message },
    Operation { names: &["get_debug_info"], arity: 0, handler: op_debug_info },
    Operation { names: &["test_callback"], arity: 1, handler: op_test_callback },
];

/// Positional arguments of one call.
pub struct Args<'a> {
    operation: &'static str,
    values: &'a [Value],
}

impl<'a> Args<'a> {
    /// Argument `index` as text. Numbers and booleans are accepted and
    /// rendered the way script would stringify them.
    pub fn text(&self, index: usize) -> Result<String> {
        match self.values.get(index) {
            Some(Value::String(s)) => Ok(s.clone()),
            Some(v @ (Value::Number(_) | Value::Bool(_))) => Ok(v.to_string()),
            Some(other) => Err(BridgeError::InvalidArguments {
                operation: self.operation,
                reason: format!("argument {} must be a string, got {}", index, other),
            }),
            None => Err(BridgeError::InvalidArguments {
                operation: self.operation,
                reason: format!("missing argument {}", index),
            }),
        }
    }
}

/// `compute_expression` success payload
#[derive(Debug, Serialize)]
pub struct Calculation {
    pub success: bool,
    pub expression: String,
    pub result: Number,
    #[serde(rename = "type")]
    pub kind: &'static str,
}

/// `get_data` success payload
#[derive(Debug, Serialize)]
pub struct StoredValue {
    pub key: String,
    pub value: String,
    pub timestamp: DateTime<Local>,
}

pub struct Bridge {
    store: Box<dyn KvStore>,
    sandbox: Sandbox,
    host: Arc<dyn Host>,
    operations: HashMap<&'static str, Operation>,
}

impl Bridge {
    pub fn new(store: Box<dyn KvStore>, sandbox: Sandbox, host: Arc<dyn Host>) -> Self {
        let mut operations = HashMap::new();
        for op in OPERATIONS {
            for name in op.names {
                operations.insert(*name, *op);
            }
        }

        log::info!(
            "Bridge ready: {} operations, store={}, sandbox={:?}",
            OPERATIONS.len(),
            store.describe(),
            sandbox.root()
        );

        Self {
            store,
            sandbox,
            host,
            operations,
        }
    }

    /// Build the store and sandbox described by `config`.
    pub fn from_config(config: &BridgeConfig, host: Arc<dyn Host>) -> anyhow::Result<Self> {
        let store: Box<dyn KvStore> = match &config.data_file {
            Some(path) => Box::new(
                FileStore::open(path).with_context(|| format!("Failed to open data file {:?}", path))?,
            ),
            None => Box::new(MemoryStore::new()),
        };
        let sandbox = Sandbox::new(&config.root)
            .with_context(|| format!("Failed to open sandbox root {:?}", config.root))?;

        Ok(Self::new(store, sandbox, host))
    }

    /// Canonical operation names, in table order.
    pub fn operation_names() -> Vec<&'static str> {
        OPERATIONS.iter().map(|op| op.names[0]).collect()
    }

    pub fn sandbox(&self) -> &Sandbox {
        &self.sandbox
    }

    // ------------------------------------------------------------------
    // Dispatch

    /// Invoke an operation by name. Never fails: errors become structured
    /// `{ "success": false, ... }` payloads.
    pub fn invoke(&mut self, name: &str, args: &[Value]) -> Value {
        let Some(op) = self.operations.get(name).copied() else {
            log::warn!("invoke: unknown operation {:?}", name);
            return BridgeError::UnknownOperation(name.to_string()).to_payload();
        };

        let canonical = op.names[0];
        if args.len() != op.arity {
            let err = BridgeError::InvalidArguments {
                operation: canonical,
                reason: format!("expected {} argument(s), got {}", op.arity, args.len()),
            };
            log::warn!("invoke {}: {}", canonical, err);
            return err.to_payload();
        }

        log::debug!("invoke {} ({} args)", canonical, args.len());

        let args = Args {
            operation: canonical,
            values: args,
        };
        match (op.handler)(self, &args) {
            Ok(value) => value,
            Err(e) => {
                log::warn!("{} failed: {}", canonical, e);
                e.to_payload()
            }
        }
    }

    /// [`invoke`](Self::invoke) with the response stringified, for callers
    /// that exchange text across the page boundary.
    pub fn invoke_to_string(&mut self, name: &str, args: &[Value]) -> String {
        let response = self.invoke(name, args);
        response.to_string()
    }

    // ------------------------------------------------------------------
    // Operations

    pub fn echo(&self, text: &str) -> String {
        log::debug!("echo: {:?}", text);
        text.to_string()
    }

    pub fn environment_info(&self) -> EnvironmentInfo {
        EnvironmentInfo::collect()
    }

    pub fn version(&self) -> String {
        system::version_string()
    }

    pub fn calculate(&self, expression: &str) -> Result<Calculation> {
        let result = expr::evaluate(expression).map_err(|source| BridgeError::Expression {
            expression: expression.to_string(),
            source,
        })?;

        log::info!("calculate: {} = {}", expression, result);

        Ok(Calculation {
            success: true,
            expression: expression.to_string(),
            kind: result.type_name(),
            result,
        })
    }

    /// Insert or overwrite `key`.
    pub fn store_data(&mut self, key: &str, value: &str) -> Result<()> {
        let previous = self.store.set(key, value)?;
        log::info!(
            "store_data: {} = {:?}{}",
            key,
            value,
            if previous.is_some() { " (overwritten)" } else { "" }
        );
        self.notify_data_updated();
        Ok(())
    }

    pub fn get_data(&self, key: &str) -> Result<StoredValue> {
        let entry = self.store.get(key).ok_or_else(|| BridgeError::NotFound {
            key: key.to_string(),
        })?;
        Ok(StoredValue {
            key: key.to_string(),
            value: entry.value.clone(),
            timestamp: entry.timestamp,
        })
    }

    /// Whole store as `{ key: { value, timestamp } }`, ordered by key.
    pub fn get_all_data(&self) -> Value {
        json!(self.store.entries())
    }

    pub fn delete_data(&mut self, key: &str) -> Result<()> {
        if self.store.delete(key)?.is_none() {
            return Err(BridgeError::NotFound {
                key: key.to_string(),
            });
        }
        log::info!("delete_data: {}", key);
        self.notify_data_updated();
        Ok(())
    }

    /// Drop every entry. Confirmation is the caller's business.
    pub fn clear_data(&mut self) -> Result<()> {
        let count = self.store.len();
        self.store.clear()?;
        log::info!("clear_data: removed {} entries", count);
        self.notify_data_updated();
        Ok(())
    }

    pub fn read_file(&self, path: &str) -> Result<FileContent> {
        self.sandbox.read_file(path)
    }

    pub fn list_files(&self) -> Result<DirectoryListing> {
        self.sandbox.list_files()
    }

    pub fn set_window_title(&self, title: &str) -> Result<()> {
        self.host.set_title(title)
    }

    pub fn show_message(&self, message: &str) -> Result<()> {
        self.host.show_message(message)
    }

    pub fn quit_application(&self) {
        log::info!("Page requested application quit");
        self.host.request_quit();
    }

    /// Forward a page-side log line to the `log` facade.
    pub fn log_message(&self, level: &str, message: &str) {
        let level = match level.trim().to_ascii_lowercase().as_str() {
            "error" => log::Level::Error,
            "warn" | "warning" => log::Level::Warn,
            "debug" => log::Level::Debug,
            "trace" => log::Level::Trace,
            _ => log::Level::Info,
        };
        log::log!(target: "page", level, "{}", message);
    }

    pub fn debug_info(&self) -> DebugInfo {
        DebugInfo {
            runtime: RuntimeInfo::collect(),
            application: ApplicationInfo {
                current_time: system::now_iso(),
                working_directory: system::working_directory(),
                stored_entries: self.store.len(),
                storage: self.store.describe(),
                sandbox_root: self.sandbox.root().to_string_lossy().to_string(),
            },
            channel: ChannelInfo {
                registered_objects: vec![CHANNEL_NAME],
                operations: Self::operation_names(),
            },
        }
    }

    /// Round-trip check for the page: acknowledges `data` with a `message` event.
    pub fn test_callback(&self, data: &str) {
        log::info!("test_callback: {:?}", data);
        self.host
            .emit(BridgeEvent::Message(format!("Bridge received test data: {}", data)));
    }

    fn notify_data_updated(&self) {
        self.host.emit(BridgeEvent::DataUpdated(self.get_all_data()));
    }
}

// ----------------------------------------------------------------------
// Dispatch table handlers

fn op_echo(bridge: &mut Bridge, args: &Args<'_>) -> Result<Value> {
    Ok(json!(bridge.echo(&args.text(0)?)))
}

fn op_environment_info(bridge: &mut Bridge, _: &Args<'_>) -> Result<Value> {
    Ok(serde_json::to_value(bridge.environment_info())?)
}

fn op_version(bridge: &mut Bridge, _: &Args<'_>) -> Result<Value> {
    Ok(json!(bridge.version()))
}

fn op_calculate(bridge: &mut Bridge, args: &Args<'_>) -> Result<Value> {
    Ok(serde_json::to_value(bridge.calculate(&args.text(0)?)?)?)
}

fn op_store_data(bridge: &mut Bridge, args: &Args<'_>) -> Result<Value> {
    bridge.store_data(&args.text(0)?, &args.text(1)?)?;
    Ok(Value::Null)
}

fn op_get_data(bridge: &mut Bridge, args: &Args<'_>) -> Result<Value> {
    Ok(serde_json::to_value(bridge.get_data(&args.text(0)?)?)?)
}

fn op_get_all_data(bridge: &mut Bridge, _: &Args<'_>) -> Result<Value> {
    Ok(bridge.get_all_data())
}

fn op_delete_data(bridge: &mut Bridge, args: &Args<'_>) -> Result<Value> {
    bridge.delete_data(&args.text(0)?)?;
    Ok(json!({ "success": true }))
}

fn op_clear_data(bridge: &mut Bridge, _: &Args<'_>) -> Result<Value> {
    bridge.clear_data()?;
    Ok(Value::Null)
}

fn op_read_file(bridge: &mut Bridge, args: &Args<'_>) -> Result<Value> {
    Ok(serde_json::to_value(bridge.read_file(&args.text(0)?)?)?)
}

fn op_list_files(bridge: &mut Bridge, _: &Args<'_>) -> Result<Value> {
    Ok(serde_json::to_value(bridge.list_files()?)?)
}

fn op_set_window_title(bridge: &mut Bridge, args: &Args<'_>) -> Result<Value> {
    bridge.set_window_title(&args.text(0)?)?;
    Ok(Value::Null)
}

fn op_show_message(bridge: &mut Bridge, args: &Args<'_>) -> Result<Value> {
    bridge.show_message(&args.text(0)?)?;
    Ok(Value::Null)
}

fn op_quit_application(bridge: &mut Bridge, _: &Args<'_>) -> Result<Value> {
    bridge.quit_application();
    Ok(Value::Null)
}

fn op_log_message(bridge: &mut Bridge, args: &Args<'_>) -> Result<Value> {
    bridge.log_message(&args.text(0)?, &args.text(1)?);
    Ok(Value::Null)
}

fn op_debug_info(bridge: &mut Bridge, _: &Args<'_>) -> Result<Value> {
    Ok(serde_json::to_value(bridge.debug_info())?)
}

fn op_test_callback(bridge: &mut Bridge, args: &Args<'_>) -> Result<Value> {
    bridge.test_callback(&args.text(0)?);
    Ok(Value::Null)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::{HeadlessHost, HostChannels};
    use std::fs;

    struct Fixture {
        bridge: Bridge,
        host: Arc<HeadlessHost>,
        channels: HostChannels,
        dir: tempfile::TempDir,
    }

    fn fixture() -> Fixture {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("notes.txt"), "first line\nsecond line\n").unwrap();
        let (host, channels) = HeadlessHost::new("test");
        let host = Arc::new(host);
        let bridge = Bridge::new(
            Box::new(MemoryStore::new()),
            Sandbox::new(dir.path()).unwrap(),
            host.clone(),
        );
        Fixture {
            bridge,
            host,
            channels,
            dir,
        }
    }

    #[test]
    fn test_echo() {
        let mut f = fixture();
        assert_eq!(f.bridge.echo("hello"), "hello");
        assert_eq!(f.bridge.invoke("echo", &[json!("hello")]), json!("hello"));
        assert_eq!(f.bridge.invoke("echo_message", &[json!(42)]), json!("42"));
    }

    #[test]
    fn test_store_then_get_returns_value() {
        let mut f = fixture();
        for (k, v) in [("a", "1"), ("name", "Zoë"), ("", "empty key"), ("json", "{\"x\":1}")] {
            f.bridge.invoke("store_data", &[json!(k), json!(v)]);
            let got = f.bridge.invoke("get_data", &[json!(k)]);
            assert_eq!(got["value"], json!(v));
            assert_eq!(got["key"], json!(k));
        }
    }

    #[test]
    fn test_store_overwrites_silently() {
        let mut f = fixture();
        f.bridge.store_data("k", "old").unwrap();
        assert_eq!(f.bridge.invoke("store", &[json!("k"), json!("new")]), Value::Null);
        assert_eq!(f.bridge.get_data("k").unwrap().value, "new");
    }

    #[test]
    fn test_missing_key_is_structured_not_found() {
        let mut f = fixture();
        let response = f.bridge.invoke("get_data", &[json!("ghost")]);
        assert_eq!(
            response,
            json!({ "success": false, "error": "not found", "key": "ghost" })
        );
        assert_eq!(f.bridge.invoke("delete_data", &[json!("ghost")])["success"], json!(false));
    }

    #[test]
    fn test_clear_then_get_all_is_empty() {
        let mut f = fixture();
        f.bridge.store_data("a", "1").unwrap();
        f.bridge.store_data("b", "2").unwrap();
        assert_eq!(f.bridge.invoke("clear_data", &[]), Value::Null);
        assert_eq!(f.bridge.invoke("get_all_data", &[]), json!({}));
    }

    #[test]
    fn test_get_all_is_idempotent() {
        let mut f = fixture();
        f.bridge.store_data("x", "1").unwrap();
        f.bridge.store_data("y", "2").unwrap();
        let first = f.bridge.invoke_to_string("get_all_data", &[]);
        let second = f.bridge.invoke_to_string("get_all", &[]);
        assert_eq!(first, second);

        let parsed: Value = serde_json::from_str(&first).unwrap();
        assert_eq!(parsed["x"]["value"], json!("1"));
        assert_eq!(parsed["y"]["value"], json!("2"));
    }

    #[test]
    fn test_delete_data() {
        let mut f = fixture();
        f.bridge.store_data("x", "1").unwrap();
        assert_eq!(
            f.bridge.invoke("delete_data", &[json!("x")]),
            json!({ "success": true })
        );
        assert!(f.bridge.get_data("x").is_err());
    }

    #[test]
    fn test_store_mutations_emit_snapshots() {
        let mut f = fixture();
        f.bridge.store_data("a", "1").unwrap();
        f.bridge.clear_data().unwrap();

        match f.channels.events.try_recv().unwrap() {
            BridgeEvent::DataUpdated(snapshot) => assert_eq!(snapshot["a"]["value"], json!("1")),
            other => panic!("unexpected event {:?}", other),
        }
        assert_eq!(
            f.channels.events.try_recv().unwrap(),
            BridgeEvent::DataUpdated(json!({}))
        );
    }

    #[test]
    fn test_compute_expression() {
        let mut f = fixture();
        let ok = f.bridge.invoke("compute_expression", &[json!("2 * 3 + 4")]);
        assert_eq!(
            ok,
            json!({ "success": true, "expression": "2 * 3 + 4", "result": 10, "type": "int" })
        );

        for bad in ["1 / 0", "2 +* 3", "import os"] {
            let failed = f.bridge.invoke("calculate", &[json!(bad)]);
            assert_eq!(failed["success"], json!(false));
            assert_eq!(failed["expression"], json!(bad));
            assert!(!failed["error"].as_str().unwrap().is_empty());
        }

        let chain = format!("1{}", "+1".repeat(100_000));
        let failed = f.bridge.invoke("calculate", &[json!(chain)]);
        assert_eq!(failed["success"], json!(false));
        assert!(failed["error"].as_str().unwrap().contains("too long"));
    }

    #[test]
    fn test_read_file() {
        let mut f = fixture();
        let ok = f.bridge.invoke("read_file", &[json!("notes.txt")]);
        let on_disk = fs::read_to_string(f.dir.path().join("notes.txt")).unwrap();
        assert_eq!(ok["success"], json!(true));
        assert_eq!(ok["content"], json!(on_disk));
        assert_eq!(ok["size"], json!(on_disk.len()));

        let missing = f.bridge.invoke("read_file", &[json!("missing.txt")]);
        assert_eq!(missing["success"], json!(false));
        assert_eq!(missing["file_path"], json!("missing.txt"));

        let escaped = f.bridge.invoke("read_file", &[json!("../../../etc/passwd")]);
        assert_eq!(escaped["success"], json!(false));
    }

    #[test]
    fn test_list_files() {
        let mut f = fixture();
        let listing = f.bridge.invoke("list_directory", &[]);
        assert_eq!(listing["success"], json!(true));
        assert_eq!(listing["count"], json!(1));
        assert_eq!(listing["files"][0]["name"], json!("notes.txt"));
    }

    #[test]
    fn test_host_operations() {
        let mut f = fixture();
        assert_eq!(f.bridge.invoke("set_window_title", &[json!("Renamed")]), Value::Null);
        assert_eq!(f.host.title(), "Renamed");

        f.bridge.invoke("test_callback", &[json!("ping")]);
        assert_eq!(
            f.channels.events.try_recv().unwrap(),
            BridgeEvent::Message("Bridge received test data: ping".to_string())
        );

        assert!(!f.host.quit_requested());
        f.bridge.invoke("request_quit", &[]);
        assert!(f.host.quit_requested());
    }

    #[test]
    fn test_show_message_reaches_the_host() {
        let mut f = fixture();
        assert_eq!(f.bridge.invoke("show_message", &[json!("Hello from the page")]), Value::Null);
        assert_eq!(
            f.channels.events.try_recv().unwrap(),
            BridgeEvent::Message("Hello from the page".to_string())
        );

        f.bridge.invoke("show_notification", &[json!(7)]);
        assert_eq!(f.channels.events.try_recv().unwrap(), BridgeEvent::Message("7".to_string()));

        let missing = f.bridge.invoke("show_message", &[]);
        assert_eq!(missing["success"], json!(false));
        assert_eq!(missing["operation"], json!("show_message"));
    }

    #[test]
    fn test_unknown_operation_and_bad_arguments() {
        let mut f = fixture();
        let unknown = f.bridge.invoke("format_disk", &[]);
        assert_eq!(unknown["success"], json!(false));
        assert_eq!(unknown["operation"], json!("format_disk"));

        let arity = f.bridge.invoke("store_data", &[json!("only-key")]);
        assert_eq!(arity["success"], json!(false));
        assert_eq!(arity["operation"], json!("store_data"));

        let wrong_type = f.bridge.invoke("echo", &[json!({ "nested": true })]);
        assert_eq!(wrong_type["success"], json!(false));
    }

    #[test]
    fn test_info_operations() {
        let mut f = fixture();
        let env = f.bridge.invoke("get_system_info", &[]);
        assert_eq!(env["os"], json!(std::env::consts::OS));

        let version = f.bridge.invoke("get_version", &[]);
        assert!(version.as_str().unwrap().starts_with("webview-bridge"));

        f.bridge.store_data("k", "v").unwrap();
        let debug = f.bridge.invoke("get_debug_info", &[]);
        assert_eq!(debug["application"]["stored_entries"], json!(1));
        assert_eq!(debug["channel"]["registered_objects"], json!(["bridge"]));
        assert_eq!(
            debug["channel"]["operations"].as_array().unwrap().len(),
            OPERATIONS.len()
        );

        assert_eq!(f.bridge.invoke("log_message", &[json!("warning"), json!("hi")]), Value::Null);
    }

    #[test]
    fn test_operation_names_are_unique() {
        let mut seen = std::collections::HashSet::new();
        for op in OPERATIONS {
            for name in op.names {
                assert!(seen.insert(*name), "duplicate operation name {}", name);
            }
        }
    }

    #[test]
    fn test_from_config_with_data_file() {
        let dir = tempfile::tempdir().unwrap();
        let config = BridgeConfig {
            root: dir.path().to_path_buf(),
            data_file: Some(dir.path().join("data.json")),
            title: "t".to_string(),
            watch: false,
            quit_delay: std::time::Duration::ZERO,
        };
        let (host, _channels) = HeadlessHost::new("t");
        let host: Arc<dyn Host> = Arc::new(host);

        {
            let mut bridge = Bridge::from_config(&config, host.clone()).unwrap();
            bridge.store_data("persisted", "yes").unwrap();
        }
        let bridge = Bridge::from_config(&config, host).unwrap();
        assert_eq!(bridge.get_data("persisted").unwrap().value, "yes");
    }
}
