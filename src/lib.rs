//! # relaymq
//!
//! `relaymq` is an in-memory publish/subscribe message router with a WebSocket
//! front end. Messages are either broadcast to every subscriber of a topic or
//! sent point-to-point to a single subscriber identity. Delivery is best-effort:
//! nothing is persisted, acknowledged or retried.
//!
//! ## Core Modules
//!
//! - `router`: the topic index, the dispatch loop and the shutdown protocol.
//! - `client`: the connection-backed subscriber handed to the router.
//! - `config`: loading and merging server configuration.
//! - `transport`: the WebSocket server and its JSON protocol.
//! - `utils`: error types and logging setup.

pub mod client;
pub mod config;
pub mod router;
pub mod transport;
pub mod utils;
