use serde::{Deserialize, Serialize};

use crate::router::{Message, MessageKind};

/// Frames sent by clients. The first frame on a connection must be `auth`.
#[derive(Debug, Deserialize, Serialize)]
#[serde(tag = "type")]
pub enum ClientMessage {
    #[serde(rename = "auth")]
    Auth {
        id: String,
        credential: String,
        #[serde(default)]
        topics: Vec<String>,
    },

    #[serde(rename = "subscribe")]
    Subscribe { topics: Vec<String> },

    #[serde(rename = "unsubscribe")]
    Unsubscribe { topics: Vec<String> },

    /// Broadcast to every subscriber of `topic`.
    #[serde(rename = "publish")]
    Publish { topic: String, payload: String },

    /// Point-to-point delivery to the client identified by `to`.
    #[serde(rename = "send")]
    Send { to: String, payload: String },
}

#[derive(Debug, Deserialize, Serialize)]
#[serde(tag = "type")]
pub enum ServerMessage {
    #[serde(rename = "authenticated")]
    Authenticated { id: String },

    #[serde(rename = "error")]
    Error { message: String },

    #[serde(rename = "message")]
    Message {
        kind: MessageKind,
        sender: String,
        destination: String,
        payload: String,
        timestamp: i64,
    },
}

impl ServerMessage {
    pub fn error(message: impl Into<String>) -> Self {
        ServerMessage::Error {
            message: message.into(),
        }
    }

    /// Wire form of a routed message. Payload bytes that are not UTF-8 are
    /// replaced lossily.
    pub fn deliver(message: &Message) -> Self {
        ServerMessage::Message {
            kind: message.kind,
            sender: message.sender.clone(),
            destination: message.destination.clone(),
            payload: String::from_utf8_lossy(&message.payload).into_owned(),
            timestamp: message.timestamp,
        }
    }
}

/// Credential presented by a connecting client.
#[derive(Debug, Clone)]
pub struct AuthRequest {
    pub id: String,
    pub credential: String,
}
