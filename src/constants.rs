//! Crate-wide constants.
//!
//! Centralizes timing and logging constants so tunables are discoverable
//! in one place rather than scattered through the call driver.

// Rust guideline compliant 2026-02

use std::time::Duration;

/// Default interval between connection-state polls while a call waits for
/// the link to become ready.
///
/// The wait is a cooperative poll loop, not a blocking wait: each
/// iteration yields to the runtime so other in-flight calls and unrelated
/// work keep advancing. 10ms keeps the loop responsive without spinning.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Maximum number of characters of a wire frame included in log output.
///
/// Frames can carry arbitrarily large payloads; logs only need enough of
/// the prefix to identify the frame.
pub const FRAME_LOG_MAX: usize = 80;
