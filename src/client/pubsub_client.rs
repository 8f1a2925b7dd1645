use std::sync::atomic::{AtomicBool, Ordering};

use tokio::sync::mpsc::UnboundedSender;
use tracing::warn;
use tungstenite::protocol::Message as WsMessage;

use crate::router::{Message, Subscriber};
use crate::transport::message::ServerMessage;

/// Represents a connected, authenticated WebSocket client.
///
/// The router talks to it through [`Subscriber`]: routed messages are encoded as
/// JSON text frames and pushed onto `sender`, which the connection's writer task
/// drains into the socket.
#[derive(Debug)]
pub struct Client {
    /// Identity the client authenticated with.
    pub id: String,

    /// Channel to send WebSocket frames to the client.
    pub sender: UnboundedSender<WsMessage>,

    closed: AtomicBool,
}

impl Client {
    pub fn new(id: impl Into<String>, sender: UnboundedSender<WsMessage>) -> Self {
        Self {
            id: id.into(),
            sender,
            closed: AtomicBool::new(false),
        }
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Queues a server frame for the client. Returns `false` once the client is
    /// closed or its writer has gone away.
    pub fn push(&self, frame: &ServerMessage) -> bool {
        if self.is_closed() {
            return false;
        }
        match serde_json::to_string(frame) {
            Ok(text) => self.sender.send(WsMessage::text(text)).is_ok(),
            Err(e) => {
                warn!(client = %self.id, "failed to serialize frame: {e}");
                false
            }
        }
    }
}

impl Subscriber for Client {
    fn identity(&self) -> &str {
        &self.id
    }

    fn send(&self, message: &Message) -> bool {
        self.push(&ServerMessage::deliver(message))
    }

    fn close(&self) {
        if !self.closed.swap(true, Ordering::AcqRel) {
            let _ = self.sender.send(WsMessage::Close(None));
        }
    }
}
