//! WebSocket surface and match update fan-out

pub mod handler;
pub mod hub;
pub mod protocol;
