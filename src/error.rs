//! Caller-facing error taxonomy for method calls.
//!
//! Every error a caller can observe travels through the call's error slot
//! and is read after completion; nothing is thrown across a suspension
//! point. Registry anomalies with no addressable caller (responses for
//! unknown or already-terminal calls) are logged and counted by the
//! dispatcher instead; see [`crate::dispatcher::Dispatcher`].

use serde::{Deserialize, Serialize};

/// Application-level error returned by the remote side of a call.
///
/// Carried verbatim in the response frame: a machine-matchable `code` plus
/// a human-readable `detail`. A response carries either this or a result
/// payload, never both.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteError {
    /// Machine-matchable error kind (e.g., "not-found", "unauthorized").
    pub code: String,
    /// Human-readable description from the remote side.
    pub detail: String,
}

impl RemoteError {
    /// Build a remote error from code and detail strings.
    pub fn new(code: impl Into<String>, detail: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            detail: detail.into(),
        }
    }
}

impl std::fmt::Display for RemoteError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.code, self.detail)
    }
}

/// Terminal error state of a method call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallError {
    /// The connection never became ready before the transport-level
    /// timeout. The call was never sent.
    ConnectionTimeout,
    /// The remote side returned an explicit application-level error.
    Remote(RemoteError),
    /// The response payload could not be coerced to the requested type.
    /// Distinct from a protocol-level error: the call itself succeeded.
    ResponseTypeMismatch(String),
    /// The call was cancelled externally before a response arrived.
    Cancelled,
}

impl std::fmt::Display for CallError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ConnectionTimeout => write!(f, "connection timed out before the call was sent"),
            Self::Remote(err) => write!(f, "remote error: {err}"),
            Self::ResponseTypeMismatch(msg) => write!(f, "response type mismatch: {msg}"),
            Self::Cancelled => write!(f, "call cancelled"),
        }
    }
}

impl std::error::Error for CallError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn remote_error_display() {
        let err = RemoteError::new("not-found", "no such document");
        assert_eq!(err.to_string(), "not-found: no such document");
    }

    #[test]
    fn call_error_display_includes_remote_detail() {
        let err = CallError::Remote(RemoteError::new("forbidden", "nope"));
        assert_eq!(err.to_string(), "remote error: forbidden: nope");
    }

    #[test]
    fn remote_error_round_trips_through_json() {
        let err = RemoteError::new("conflict", "version mismatch");
        let json = serde_json::to_string(&err).unwrap();
        let back: RemoteError = serde_json::from_str(&json).unwrap();
        assert_eq!(back, err);
    }
}
