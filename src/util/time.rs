//! Time utilities and default continuation delays

use std::time::Instant;

/// Default delay between gas, lava and creature ticks
pub const HAZARD_TICK_MS: u64 = 500;
/// Default delay between steps of a queued path
pub const STEP_INTERVAL_MS: u64 = 500;
/// Default fuse of a timed charge
pub const CHARGE_FUSE_MS: u64 = 3000;
/// Default debounce window for saving a match
pub const SAVE_DEBOUNCE_MS: u64 = 5000;

/// Server start time for uptime tracking
static SERVER_START: std::sync::OnceLock<Instant> = std::sync::OnceLock::new();

/// Initialize server start time (call once at startup)
pub fn init_server_time() {
    SERVER_START.get_or_init(Instant::now);
}

/// Get server uptime in seconds
pub fn uptime_secs() -> u64 {
    SERVER_START
        .get()
        .map(|start| start.elapsed().as_secs())
        .unwrap_or(0)
}
