// src/core/protocol/mod.rs

pub mod event;
pub mod frame;
pub use event::{NO_CODE, SmsEvent, extract_code};
pub use frame::{DEFAULT_NAMESPACE, HEARTBEAT_TOKEN, InboundFrame, Namespace};
