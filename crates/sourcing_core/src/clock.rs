//! Wall-clock helper. Every time-dependent operation also has an `_at`
//! variant taking an explicit epoch-ms timestamp for deterministic tests.

use std::time::{SystemTime, UNIX_EPOCH};

/// Current wall-clock time in epoch milliseconds (0 if the clock is before 1970).
pub fn epoch_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}
