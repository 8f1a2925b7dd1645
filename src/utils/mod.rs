//! The `utils` module provides shared definitions used across `relaymq`:
//! error types and logging setup.

pub mod error;
pub mod logging;
