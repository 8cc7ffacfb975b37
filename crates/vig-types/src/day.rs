//! UTC calendar-day arithmetic.
//!
//! All volume rows are keyed by a day index: the number of whole days
//! since the Unix epoch, computed in UTC. Using a plain integer keeps
//! day arithmetic exact and keeps SQLite keys comparable.

/// A UTC day index (Unix seconds / 86,400).
pub type Day = u64;

/// Seconds per day.
pub const SECONDS_PER_DAY: u64 = 86_400;

/// The day index containing the given Unix timestamp (seconds).
pub fn day_of(unix_secs: u64) -> Day {
    unix_secs / SECONDS_PER_DAY
}

/// Unix timestamp (seconds) at which the given day starts (00:00 UTC).
pub fn day_start(day: Day) -> u64 {
    day * SECONDS_PER_DAY
}

/// The inclusive start of a lookback window of `window_days` ending at
/// `reference_day`. Saturates at day 0.
pub fn window_start(reference_day: Day, window_days: u64) -> Day {
    reference_day.saturating_sub(window_days.saturating_sub(1))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_day_of_epoch() {
        assert_eq!(day_of(0), 0);
        assert_eq!(day_of(SECONDS_PER_DAY - 1), 0);
        assert_eq!(day_of(SECONDS_PER_DAY), 1);
    }

    #[test]
    fn test_day_start_roundtrip() {
        let day = day_of(1_700_000_000);
        assert!(day_start(day) <= 1_700_000_000);
        assert!(day_start(day + 1) > 1_700_000_000);
    }

    #[test]
    fn test_window_start() {
        // A 7-day window ending on day 100 starts on day 94.
        assert_eq!(window_start(100, 7), 94);
        // Near the epoch the window saturates at day 0.
        assert_eq!(window_start(3, 7), 0);
        // A 1-day window is just the reference day.
        assert_eq!(window_start(100, 1), 100);
    }
}
