//! Process start time.

use std::sync::LazyLock;
use std::time::{Duration, Instant};

static PROCESS_START: LazyLock<Instant> = LazyLock::new(Instant::now);

/// Pin the process start instant. Call first thing in `main`; later calls
/// are no-ops.
pub fn mark_process_start() {
    LazyLock::force(&PROCESS_START);
}

pub fn process_start() -> Instant {
    *PROCESS_START
}

/// Time since [`mark_process_start`] (or the first read of the clock).
pub fn uptime() -> Duration {
    PROCESS_START.elapsed()
}
