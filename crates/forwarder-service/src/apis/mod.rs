//! HTTP API handlers.

pub mod forwarder;
pub mod targets;
