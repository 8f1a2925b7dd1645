//! The `client` module defines the representation of a client connection.
//!
//! It provides the `Client` struct, the connection-backed [`Subscriber`](crate::router::Subscriber)
//! the transport registers with the router: an identity plus the channel
//! used to push frames to the socket.

pub mod pubsub_client;
pub use pubsub_client::Client;
