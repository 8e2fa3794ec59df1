//! Bridge error type
//!
//! Errors never cross the page boundary as panics or exceptions. Every
//! variant renders into a `{ "success": false, "error": ... }` payload.

use std::path::PathBuf;

use serde_json::{json, Map, Value};
use thiserror::Error;

use crate::expr::ExprError;

pub type Result<T> = std::result::Result<T, BridgeError>;

#[derive(Debug, Error)]
pub enum BridgeError {
    #[error("not found")]
    NotFound { key: String },

    #[error("{source}")]
    Expression {
        expression: String,
        #[source]
        source: ExprError,
    },

    #[error("access denied: {} is outside {}", .path.display(), .root.display())]
    OutsideSandbox { path: PathBuf, root: PathBuf },

    #[error("file does not exist: {}", .0.display())]
    MissingFile(PathBuf),

    #[error("not a text file: {}", .0.display())]
    NotText(PathBuf),

    #[error("{context}: {source}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },

    #[error("unknown operation: {0}")]
    UnknownOperation(String),

    #[error("invalid arguments for {operation}: {reason}")]
    InvalidArguments {
        operation: &'static str,
        reason: String,
    },

    #[error("host error: {0}")]
    Host(String),

    #[error("storage error: {0}")]
    Storage(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl BridgeError {
    pub fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            context: context.into(),
            source,
        }
    }

    /// Structured failure payload sent back to the page.
    pub fn to_payload(&self) -> Value {
        let mut payload = Map::new();
        payload.insert("success".into(), json!(false));
        payload.insert("error".into(), json!(self.to_string()));

        match self {
            Self::NotFound { key } => {
                payload.insert("key".into(), json!(key));
            }
            Self::Expression { expression, .. } => {
                payload.insert("expression".into(), json!(expression));
            }
            Self::OutsideSandbox { path, .. } | Self::MissingFile(path) | Self::NotText(path) => {
                payload.insert("file_path".into(), json!(path.to_string_lossy()));
            }
            Self::UnknownOperation(name) => {
                payload.insert("operation".into(), json!(name));
            }
            Self::InvalidArguments { operation, .. } => {
                payload.insert("operation".into(), json!(operation));
            }
            Self::Io { .. } | Self::Host(_) | Self::Storage(_) | Self::Serialization(_) => {}
        }

        Value::Object(payload)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_payload() {
        let err = BridgeError::NotFound {
            key: "missing".to_string(),
        };
        assert_eq!(
            err.to_payload(),
            json!({ "success": false, "error": "not found", "key": "missing" })
        );
    }

    #[test]
    fn test_unknown_operation_payload() {
        let payload = BridgeError::UnknownOperation("frobnicate".to_string()).to_payload();
        assert_eq!(payload["success"], json!(false));
        assert_eq!(payload["operation"], json!("frobnicate"));
        assert_eq!(payload["error"], json!("unknown operation: frobnicate"));
    }
}
