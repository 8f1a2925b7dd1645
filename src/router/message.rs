use serde::{Deserialize, Serialize};

/// How a message is resolved to its recipients.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageKind {
    /// Delivered to every subscriber registered for the destination topic.
    Broadcast,
    /// Delivered to the single subscriber whose identity is the destination.
    PointToPoint,
}

/// A routed unit of data.
///
/// For [`MessageKind::Broadcast`] the `destination` names a topic, for
/// [`MessageKind::PointToPoint`] it names a subscriber identity. The router only
/// looks at `kind` and `destination`; everything else travels untouched.
///
/// # Fields
///
/// - `kind` - Broadcast or point-to-point.
/// - `sender` - Identity of the publishing subscriber.
/// - `destination` - Topic name or subscriber identity, depending on `kind`.
/// - `payload` - Opaque message body.
/// - `timestamp` - Unix timestamp in milliseconds, stamped at construction.
///
/// # Example
///
/// ```rust
/// use relaymq::router::message::{Message, MessageKind};
///
/// let msg = Message::broadcast("aaa", "sensor_updates", b"{\"temp\":25}".to_vec());
/// assert_eq!(msg.kind, MessageKind::Broadcast);
/// assert_eq!(msg.destination, "sensor_updates");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub kind: MessageKind,
    pub sender: String,
    pub destination: String,
    pub payload: Vec<u8>,
    pub timestamp: i64,
}

impl Message {
    pub fn new(
        kind: MessageKind,
        sender: impl Into<String>,
        destination: impl Into<String>,
        payload: impl Into<Vec<u8>>,
    ) -> Self {
        Self {
            kind,
            sender: sender.into(),
            destination: destination.into(),
            payload: payload.into(),
            timestamp: chrono::Utc::now().timestamp_millis(),
        }
    }

    /// Builds a message for every subscriber of `topic`.
    pub fn broadcast(
        sender: impl Into<String>,
        topic: impl Into<String>,
        payload: impl Into<Vec<u8>>,
    ) -> Self {
        Self::new(MessageKind::Broadcast, sender, topic, payload)
    }

    /// Builds a message for the subscriber identified by `recipient`.
    pub fn point_to_point(
        sender: impl Into<String>,
        recipient: impl Into<String>,
        payload: impl Into<Vec<u8>>,
    ) -> Self {
        Self::new(MessageKind::PointToPoint, sender, recipient, payload)
    }
}
