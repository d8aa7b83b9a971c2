//! Wire vocabulary for method calls.
//!
//! Only the shape correlation requires is fixed here; everything else
//! about the connection's framing belongs to the transport collaborator.
//! Frames are JSON objects discriminated by a `msg` field:
//!
//! ```text
//! → {"msg":"method","id":7,"method":"ping","params":[...]}
//! ← {"msg":"result","id":7,"result":"pong"}
//! ← {"msg":"result","id":7,"error":{"code":"...","detail":"..."}}
//! ← {"msg":"updated","methods":[7]}
//! ```
//!
//! A `result` frame terminates the call it names; an `updated` frame
//! reports that the named calls' remote side effects have propagated.

// Rust guideline compliant 2026-02

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::call::CallId;
use crate::error::RemoteError;

/// Frames sent from this layer to the remote side.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "msg", rename_all = "snake_case")]
pub enum ClientFrame {
    /// A method invocation.
    Method {
        /// Correlation identifier; the remote echoes it in `result` and
        /// `updated` frames.
        id: CallId,
        /// Method name.
        method: String,
        /// Ordered, opaque arguments.
        params: Vec<serde_json::Value>,
    },
}

/// Frames received from the remote side.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "msg", rename_all = "snake_case")]
pub enum ServerFrame {
    /// Terminal response for one call: either `error` or `result` is
    /// populated, never both.
    Result {
        /// Correlation identifier of the originating call.
        id: CallId,
        /// Application-level error, if the call failed remotely.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        error: Option<RemoteError>,
        /// Result payload, if the call succeeded.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        result: Option<serde_json::Value>,
    },
    /// Side-effect propagation notice for one or more calls.
    Updated {
        /// Calls whose remote writes have fully propagated.
        methods: Vec<CallId>,
    },
}

/// Encode a method-call frame.
pub fn encode_method(id: CallId, method: &str, params: &[serde_json::Value]) -> String {
    let frame = ClientFrame::Method {
        id,
        method: method.to_string(),
        params: params.to_vec(),
    };
    // A struct of plain JSON-representable fields cannot fail to serialize
    serde_json::to_string(&frame).expect("method frame serialization cannot fail")
}

/// Decode an inbound frame.
pub fn decode_server_frame(text: &str) -> Result<ServerFrame> {
    serde_json::from_str(text)
        .with_context(|| format!("invalid server frame: {}", preview(text)))
}

/// Truncate a frame for log output, respecting UTF-8 char boundaries.
pub(crate) fn preview(text: &str) -> &str {
    let mut end = text.len().min(crate::constants::FRAME_LOG_MAX);
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    &text[..end]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn method_frame_carries_id_and_name() {
        let encoded = encode_method(CallId::from(7), "ping", &[serde_json::json!("x")]);
        let value: serde_json::Value = serde_json::from_str(&encoded).unwrap();
        assert_eq!(value["msg"], "method");
        assert_eq!(value["id"], 7);
        assert_eq!(value["method"], "ping");
        assert_eq!(value["params"][0], "x");
    }

    #[test]
    fn result_frame_decodes_success() {
        let frame = decode_server_frame(r#"{"msg":"result","id":3,"result":"pong"}"#).unwrap();
        match frame {
            ServerFrame::Result { id, error, result } => {
                assert_eq!(id, CallId::from(3));
                assert!(error.is_none());
                assert_eq!(result, Some(serde_json::json!("pong")));
            }
            other => panic!("expected Result, got {other:?}"),
        }
    }

    #[test]
    fn result_frame_decodes_error() {
        let frame = decode_server_frame(
            r#"{"msg":"result","id":4,"error":{"code":"not-found","detail":"missing"}}"#,
        )
        .unwrap();
        match frame {
            ServerFrame::Result { id, error, result } => {
                assert_eq!(id, CallId::from(4));
                assert_eq!(error.unwrap().code, "not-found");
                assert!(result.is_none());
            }
            other => panic!("expected Result, got {other:?}"),
        }
    }

    #[test]
    fn updated_frame_lists_call_ids() {
        let frame = decode_server_frame(r#"{"msg":"updated","methods":[1,2]}"#).unwrap();
        match frame {
            ServerFrame::Updated { methods } => {
                assert_eq!(methods, vec![CallId::from(1), CallId::from(2)]);
            }
            other => panic!("expected Updated, got {other:?}"),
        }
    }

    #[test]
    fn unknown_msg_discriminator_is_an_error() {
        assert!(decode_server_frame(r#"{"msg":"nosuch","id":1}"#).is_err());
        assert!(decode_server_frame("not json at all").is_err());
    }
}
