//! Deepdig match server library
//!
//! Procedural mining worlds, an authoritative per-match simulation actor,
//! debounced snapshot persistence and JSON update fan-out.

pub mod app;
pub mod config;
pub mod game;
pub mod http;
pub mod service;
pub mod store;
pub mod util;
pub mod world;
pub mod ws;
