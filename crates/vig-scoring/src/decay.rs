//! Time-decayed volume weighting.
//!
//! Each participant's contribution is the sum of their last seven days
//! of betting volume, weighted so that recent activity counts more:
//!
//! ```text
//! weighted = Σ (k = 0..6) volume[reference_day - k] * weight[k] / 100
//! ```
//!
//! The weight table is expressed in integer percent, so the computation
//! is exact in micro-units; there is no floating-point drift between
//! snapshots.

use std::collections::BTreeMap;

use vig_types::day::Day;

use crate::{Result, ScoringError};

/// Per-day-offset decay weights in percent: today counts full, six days
/// ago counts 10%.
pub const DECAY_WEIGHTS_PCT: [u64; 7] = [100, 85, 70, 55, 40, 25, 10];

/// Compute the decay-weighted volume for one participant's window using
/// the default weight table.
///
/// `window` maps day index to raw volume in micro-units; days missing
/// from the map count as zero. `reference_day` is offset 0 and must be
/// the same for every participant scored in one cycle.
pub fn weighted_volume(window: &BTreeMap<Day, u64>, reference_day: Day) -> Result<u64> {
    weighted_volume_with(&DECAY_WEIGHTS_PCT, window, reference_day)
}

/// Compute the decay-weighted volume with an explicit weight table.
///
/// The table's length defines the window: entry `k` weights the volume
/// at `reference_day - k`. Offsets reaching past day 0 contribute
/// nothing.
pub fn weighted_volume_with(
    weights_pct: &[u64],
    window: &BTreeMap<Day, u64>,
    reference_day: Day,
) -> Result<u64> {
    let mut sum: u128 = 0;
    for (offset, pct) in weights_pct.iter().enumerate() {
        let Some(day) = reference_day.checked_sub(offset as u64) else {
            break;
        };
        let amount = window.get(&day).copied().unwrap_or(0);
        sum += amount as u128 * *pct as u128;
    }
    u64::try_from(sum / 100).map_err(|_| ScoringError::Overflow)
}

/// Arrange a window as a fixed-length array of raw volumes, index 0 =
/// `reference_day`, for the query surface.
pub fn window_array(window: &BTreeMap<Day, u64>, reference_day: Day, window_days: u64) -> Vec<u64> {
    (0..window_days)
        .map(|offset| {
            reference_day
                .checked_sub(offset)
                .and_then(|day| window.get(&day).copied())
                .unwrap_or(0)
        })
        .collect()
}
