//! Adapter error taxonomy.

use thiserror::Error;

use crate::capability::Capability;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
/// Errors surfaced by adapter operations and bridges.
///
/// Most adapter operations recover locally and never return these to callers; they show up in
/// logs, strategy outcomes and the few operations whose native path is the only plan.
pub enum AdapterError {
    /// A bridge request failed or was rejected by the host.
    #[error("bridge call `{method}` failed: {message}")]
    Bridge {
        /// Bridge method name.
        method: String,
        /// Host-provided failure description.
        message: String,
    },
    /// The active host does not provide the capability.
    #[error("capability unsupported: {}", .capability.as_str())]
    Unsupported {
        /// Capability that was requested.
        capability: Capability,
    },
    /// The required startup handshake with the host could not complete.
    #[error("adapter initialization failed: {0}")]
    Init(String),
    /// A pending request did not complete in time.
    #[error("{operation} timed out after {after_ms} ms")]
    Timeout {
        /// Operation label.
        operation: &'static str,
        /// Timeout that elapsed.
        after_ms: u32,
    },
    /// A newer request replaced the pending one.
    #[error("request superseded by a new call")]
    Superseded,
    /// The user or host cancelled the request.
    #[error("request cancelled")]
    Cancelled,
    /// A payload could not be encoded or decoded.
    #[error("serialization failed: {0}")]
    Serialization(String),
    /// A required host object is missing.
    #[error("{0} is unavailable")]
    Unavailable(String),
}

impl AdapterError {
    /// Bridge failure for `method`.
    pub fn bridge(method: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Bridge {
            method: method.into(),
            message: message.into(),
        }
    }
}

impl From<serde_json::Error> for AdapterError {
    fn from(value: serde_json::Error) -> Self {
        Self::Serialization(value.to_string())
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn messages_name_the_failing_piece() {
        assert_eq!(
            AdapterError::bridge("VKWebAppInit", "no host").to_string(),
            "bridge call `VKWebAppInit` failed: no host"
        );
        assert_eq!(
            AdapterError::Unsupported {
                capability: Capability::QrScanner
            }
            .to_string(),
            "capability unsupported: qrScanner"
        );
        assert_eq!(
            AdapterError::Timeout {
                operation: "native QR request",
                after_ms: 60_000
            }
            .to_string(),
            "native QR request timed out after 60000 ms"
        );
    }
}
