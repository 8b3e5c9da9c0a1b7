//! Squadnet Telemetry
//!
//! Typed events emitted by the engine (agent turns, tool calls, breaker
//! transitions, session persistence) plus a broadcast collector that
//! fans them out to subscribers and mirrors them into `tracing`.

pub mod collector;
pub mod event;

pub use collector::TelemetryCollector;
pub use event::{NetEvent, Outcome};
