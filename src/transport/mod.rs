//! The `transport` module is responsible for handling network communication
//! with clients via WebSockets.
//!
//! It defines the JSON protocol used between clients and the server, and
//! implements the WebSocket server that authenticates connections, registers
//! them with the router and forwards their requests.

pub mod message;
pub mod websocket;

#[cfg(test)]
mod tests;
