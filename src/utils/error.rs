//! The `error` module defines the error types used within `relaymq`.
//!
//! - [`RouterError`] is returned synchronously by router operations.
//! - [`TransportError`] covers the WebSocket server.
//!
//! Dispatch-time conditions (no subscribers for a topic, unknown recipient, a
//! failed `send`) are not errors and never show up here.

use thiserror::Error;

/// Errors returned by [`Router`](crate::router::Router) operations.
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RouterError {
    /// Another live subscriber already holds this identity.
    #[error("identity conflict: {identity}")]
    IdentityConflict {
        /// The identity that was requested.
        identity: String,
    },

    /// The router has been shut down.
    #[error("router closed")]
    Closed,

    /// `run` was called while another dispatch loop owns the queue.
    #[error("router dispatch loop already started")]
    AlreadyRunning,
}

impl RouterError {
    /// Returns a short stable label (snake_case) for use in logs.
    ///
    /// # Example
    /// ```
    /// use relaymq::utils::error::RouterError;
    ///
    /// assert_eq!(RouterError::Closed.as_label(), "router_closed");
    /// ```
    pub fn as_label(&self) -> &'static str {
        match self {
            RouterError::IdentityConflict { .. } => "identity_conflict",
            RouterError::Closed => "router_closed",
            RouterError::AlreadyRunning => "already_running",
        }
    }
}

/// Errors raised by the WebSocket transport.
#[derive(Error, Debug)]
pub enum TransportError {
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("websocket error: {0}")]
    WebSocket(#[from] tungstenite::Error),

    #[error("malformed frame: {0}")]
    Protocol(#[from] serde_json::Error),
}
