//! Squadnet Channel
//!
//! The shared radio channel: pilot-ATC style transmission parsing and
//! formatting, the immutable message model, and the bounded in-memory
//! traffic log with per-callsign context windows.

pub mod log;
pub mod message;
pub mod protocol;

pub use log::TrafficLog;
pub use message::{Message, MessageKind, TrafficMeta};
pub use protocol::{
    callsigns_match, format_transmission, is_broadcast_callsign, normalize_callsign, parse,
    ParsedTransmission, TrafficType,
};
