//! Line-delimited JSON-RPC transport
//!
//! Lets the bridge run without a window: one request per input line, one
//! response per output line, bridge events interleaved as notifications.
//! Bridge-level failures are ordinary results carrying `success: false`;
//! JSON-RPC errors are reserved for malformed envelopes.

use anyhow::{Context, Result};
use serde::Serialize;
use serde_json::Value;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};

use crate::bridge::Bridge;
use crate::host::{BridgeEvent, HostChannels};
use crate::protocol::{
    JsonRpcError, JsonRpcNotification, JsonRpcRequest, JsonRpcResponse, INVALID_REQUEST,
    JSONRPC_VERSION, PARSE_ERROR,
};

/// Prefix for event notification methods, e.g. `bridge/data-updated`.
pub const EVENT_PREFIX: &str = "bridge/";

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ServeSummary {
    pub requests: usize,
    pub quit_requested: bool,
}

/// Serve requests until EOF or until the page asks to quit.
pub async fn serve<R, W>(
    bridge: &mut Bridge,
    reader: R,
    mut writer: W,
    channels: &mut HostChannels,
) -> Result<ServeSummary>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut lines = reader.lines();
    let mut summary = ServeSummary::default();

    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line.context("Failed to read request line")? else {
                    log::info!("stdin closed after {} request(s)", summary.requests);
                    break;
                };
                if line.trim().is_empty() {
                    continue;
                }

                summary.requests += 1;
                let response = handle_line(bridge, &line);
                write_message(&mut writer, &response).await?;

                while let Ok(event) = channels.events.try_recv() {
                    write_event(&mut writer, &event).await?;
                }

                if *channels.quit.borrow() {
                    summary.quit_requested = true;
                    log::info!("Quit requested, stopping stdio server");
                    break;
                }
            }
            Some(event) = channels.events.recv() => {
                write_event(&mut writer, &event).await?;
            }
        }
    }

    writer.flush().await.context("Failed to flush output")?;
    Ok(summary)
}

fn handle_line(bridge: &mut Bridge, line: &str) -> JsonRpcResponse {
    let raw: Value = match serde_json::from_str(line) {
        Ok(v) => v,
        Err(e) => {
            log::warn!("Unparseable request: {}", e);
            return JsonRpcResponse::failure(
                None,
                JsonRpcError::new(PARSE_ERROR, format!("parse error: {}", e)),
            );
        }
    };

    let id = raw.get("id").and_then(Value::as_u64);
    let request: JsonRpcRequest = match serde_json::from_value(raw) {
        Ok(r) => r,
        Err(e) => {
            return JsonRpcResponse::failure(
                id,
                JsonRpcError::new(INVALID_REQUEST, format!("invalid request: {}", e)),
            );
        }
    };

    if request.jsonrpc != JSONRPC_VERSION {
        return JsonRpcResponse::failure(
            Some(request.id),
            JsonRpcError::new(
                INVALID_REQUEST,
                format!("unsupported jsonrpc version {:?}", request.jsonrpc),
            ),
        );
    }

    let params = match request.positional_params() {
        Ok(p) => p,
        Err(e) => return JsonRpcResponse::failure(Some(request.id), e),
    };

    log::debug!("request id={} method={}", request.id, request.method);
    let result = bridge.invoke(&request.method, &params);
    JsonRpcResponse::success(request.id, result)
}

async fn write_event<W: AsyncWrite + Unpin>(writer: &mut W, event: &BridgeEvent) -> Result<()> {
    let notification =
        JsonRpcNotification::new(format!("{}{}", EVENT_PREFIX, event.name()), event.payload());
    write_message(writer, &notification).await
}

async fn write_message<W, T>(writer: &mut W, message: &T) -> Result<()>
where
    W: AsyncWrite + Unpin,
    T: Serialize,
{
    let mut line = serde_json::to_string(message)?;
    line.push('\n');
    writer
        .write_all(line.as_bytes())
        .await
        .context("Failed to write response")?;
    writer.flush().await.context("Failed to flush output")?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::files::Sandbox;
    use crate::host::HeadlessHost;
    use crate::store::MemoryStore;
    use serde_json::json;
    use std::sync::Arc;

    async fn run(input: &str) -> (Vec<Value>, ServeSummary) {
        let dir = tempfile::tempdir().unwrap();
        let (host, mut channels) = HeadlessHost::new("stdio");
        let mut bridge = Bridge::new(
            Box::new(MemoryStore::new()),
            Sandbox::new(dir.path()).unwrap(),
            Arc::new(host),
        );

        let mut output = Vec::new();
        let summary = serve(&mut bridge, input.as_bytes(), &mut output, &mut channels)
            .await
            .unwrap();

        let messages = String::from_utf8(output)
            .unwrap()
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect();
        (messages, summary)
    }

    #[tokio::test]
    async fn test_round_trip() {
        let input = concat!(
            r#"{"jsonrpc":"2.0","id":1,"method":"echo","params":["hello"]}"#, "\n",
            "\n",
            r#"{"jsonrpc":"2.0","id":2,"method":"calculate","params":"2 * 3 + 4"}"#, "\n",
        );
        let (messages, summary) = run(input).await;

        assert_eq!(summary.requests, 2);
        assert!(!summary.quit_requested);
        assert_eq!(messages[0], json!({ "jsonrpc": "2.0", "id": 1, "result": "hello" }));
        assert_eq!(messages[1]["result"]["result"], json!(10));
    }

    #[tokio::test]
    async fn test_events_follow_their_response() {
        let input = concat!(
            r#"{"jsonrpc":"2.0","id":1,"method":"store_data","params":["k","v"]}"#, "\n",
            r#"{"jsonrpc":"2.0","id":2,"method":"get_data","params":["k"]}"#, "\n",
        );
        let (messages, _) = run(input).await;

        assert_eq!(messages.len(), 3);
        assert_eq!(messages[0]["id"], json!(1));
        assert_eq!(messages[1]["method"], json!("bridge/data-updated"));
        assert_eq!(messages[1]["params"]["k"]["value"], json!("v"));
        assert_eq!(messages[2]["result"]["value"], json!("v"));
    }

    #[tokio::test]
    async fn test_malformed_envelopes() {
        let input = concat!(
            "not json\n",
            r#"{"jsonrpc":"2.0","id":5}"#, "\n",
            r#"{"jsonrpc":"1.0","id":6,"method":"echo","params":["x"]}"#, "\n",
            r#"{"jsonrpc":"2.0","id":7,"method":"nope"}"#, "\n",
        );
        let (messages, summary) = run(input).await;

        assert_eq!(summary.requests, 4);
        assert_eq!(messages[0]["error"]["code"], json!(PARSE_ERROR));
        assert_eq!(messages[0]["id"], Value::Null);
        assert_eq!(messages[1]["error"]["code"], json!(INVALID_REQUEST));
        assert_eq!(messages[1]["id"], json!(5));
        assert_eq!(messages[2]["error"]["code"], json!(INVALID_REQUEST));
        // Unknown operations are bridge-level failures, not protocol errors.
        assert_eq!(messages[3]["result"]["success"], json!(false));
    }

    #[tokio::test]
    async fn test_quit_stops_the_server() {
        let input = concat!(
            r#"{"jsonrpc":"2.0","id":1,"method":"quit_application"}"#, "\n",
            r#"{"jsonrpc":"2.0","id":2,"method":"echo","params":["never"]}"#, "\n",
        );
        let (messages, summary) = run(input).await;

        assert!(summary.quit_requested);
        assert_eq!(summary.requests, 1);
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0]["result"], Value::Null);
    }
}
