// src/core/mod.rs

//! The central module containing the relay's core logic.

pub mod errors;
pub mod metrics;
pub mod notify;
pub mod protocol;
pub mod relay;

pub use errors::RelayError;
pub use protocol::SmsEvent;
