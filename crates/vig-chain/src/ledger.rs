//! Betting-ledger volume reader.
//!
//! The ledger indexer exposes per-address, per-day volume totals. The
//! numbers are authoritative totals, not deltas: callers must replace
//! their stored value for each returned day, never add to it, so that
//! restarts, double-polls, and missed polls all converge on the same
//! state.
//!
//! An address with no activity yields an empty sequence; only network
//! and protocol failures are errors.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::RwLock;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use vig_types::day::Day;

use crate::{ChainError, Result};

/// One day's authoritative volume total for an address, micro-units.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DayVolume {
    pub day: Day,
    pub amount: u64,
}

/// Read-only access to betting volume on the external ledger.
#[async_trait]
pub trait LedgerReader: Send + Sync {
    /// Fetch per-day totals for `address` over the inclusive day range.
    ///
    /// The range is bounded by the decay window (at most 7 days).
    async fn fetch_volume(
        &self,
        address: &str,
        since_day: Day,
        until_day: Day,
    ) -> Result<Vec<DayVolume>>;
}

/// Query body sent to the indexer endpoint.
#[derive(Debug, Serialize)]
struct VolumeQuery<'a> {
    address: &'a str,
    from_day: Day,
    to_day: Day,
}

/// HTTP implementation of [`LedgerReader`] against the ledger indexer.
pub struct HttpLedgerReader {
    client: reqwest::Client,
    base_url: String,
    timeout_secs: u64,
}

impl HttpLedgerReader {
    /// Build a reader for the given indexer base URL.
    pub fn new(base_url: &str, timeout_secs: u64) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .map_err(|e| ChainError::Transport(e.to_string()))?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            timeout_secs,
        })
    }
}

#[async_trait]
impl LedgerReader for HttpLedgerReader {
    async fn fetch_volume(
        &self,
        address: &str,
        since_day: Day,
        until_day: Day,
    ) -> Result<Vec<DayVolume>> {
        let url = format!("{}/volume", self.base_url);
        let query = VolumeQuery {
            address,
            from_day: since_day,
            to_day: until_day,
        };

        let response = self
            .client
            .post(&url)
            .json(&query)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    ChainError::Timeout {
                        secs: self.timeout_secs,
                    }
                } else {
                    ChainError::Transport(e.to_string())
                }
            })?;

        if !response.status().is_success() {
            return Err(ChainError::BadResponse(format!(
                "indexer returned {}",
                response.status()
            )));
        }

        let volumes: Vec<DayVolume> = response
            .json()
            .await
            .map_err(|e| ChainError::BadResponse(e.to_string()))?;

        // The indexer owns the range filter, but a misbehaving endpoint
        // must not leak rows outside the requested window.
        Ok(volumes
            .into_iter()
            .filter(|v| v.day >= since_day && v.day <= until_day)
            .collect())
    }
}

/// In-memory [`LedgerReader`] with a fixed volume table.
///
/// The deterministic stand-in used by unit and integration tests, the
/// same way the network runs a hardcoded stub until the real indexer is
/// reachable.
#[derive(Default)]
pub struct StaticLedger {
    volumes: RwLock<HashMap<String, BTreeMap<Day, u64>>>,
    failing: RwLock<HashSet<String>>,
}

impl StaticLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the authoritative total for one address/day.
    pub fn set_volume(&self, address: &str, day: Day, amount: u64) {
        let mut volumes = self.volumes.write().unwrap_or_else(|e| e.into_inner());
        volumes
            .entry(address.to_string())
            .or_default()
            .insert(day, amount);
    }

    /// Make fetches for an address fail with a transport error.
    pub fn set_failing(&self, address: &str, failing: bool) {
        let mut set = self.failing.write().unwrap_or_else(|e| e.into_inner());
        if failing {
            set.insert(address.to_string());
        } else {
            set.remove(address);
        }
    }
}

#[async_trait]
impl LedgerReader for StaticLedger {
    async fn fetch_volume(
        &self,
        address: &str,
        since_day: Day,
        until_day: Day,
    ) -> Result<Vec<DayVolume>> {
        {
            let failing = self.failing.read().unwrap_or_else(|e| e.into_inner());
            if failing.contains(address) {
                return Err(ChainError::Transport(format!(
                    "static ledger: {address} unreachable"
                )));
            }
        }

        let volumes = self.volumes.read().unwrap_or_else(|e| e.into_inner());
        Ok(volumes
            .get(address)
            .map(|days| {
                days.range(since_day..=until_day)
                    .map(|(day, amount)| DayVolume {
                        day: *day,
                        amount: *amount,
                    })
                    .collect()
            })
            .unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_static_ledger_range() {
        let ledger = StaticLedger::new();
        ledger.set_volume("0xaaaa", 100, 5_000_000);
        ledger.set_volume("0xaaaa", 101, 3_000_000);
        ledger.set_volume("0xaaaa", 110, 9_000_000);

        let volumes = ledger.fetch_volume("0xaaaa", 100, 106).await.expect("fetch");
        assert_eq!(
            volumes,
            vec![
                DayVolume {
                    day: 100,
                    amount: 5_000_000
                },
                DayVolume {
                    day: 101,
                    amount: 3_000_000
                },
            ]
        );
    }

    #[tokio::test]
    async fn test_static_ledger_unknown_address_is_empty() {
        let ledger = StaticLedger::new();
        let volumes = ledger.fetch_volume("0xbbbb", 100, 106).await.expect("fetch");
        assert!(volumes.is_empty(), "no activity is not an error");
    }

    #[tokio::test]
    async fn test_static_ledger_failure_injection() {
        let ledger = StaticLedger::new();
        ledger.set_volume("0xcccc", 100, 1);
        ledger.set_failing("0xcccc", true);

        let err = ledger.fetch_volume("0xcccc", 100, 106).await;
        assert!(matches!(err, Err(ChainError::Transport(_))));

        ledger.set_failing("0xcccc", false);
        assert_eq!(
            ledger
                .fetch_volume("0xcccc", 100, 106)
                .await
                .expect("fetch")
                .len(),
            1
        );
    }

    #[tokio::test]
    async fn test_static_ledger_replaces_totals() {
        let ledger = StaticLedger::new();
        ledger.set_volume("0xdddd", 100, 5_000_000);
        // The ledger's running total for the day grew.
        ledger.set_volume("0xdddd", 100, 8_000_000);

        let volumes = ledger.fetch_volume("0xdddd", 100, 100).await.expect("fetch");
        assert_eq!(volumes[0].amount, 8_000_000);
    }

    #[test]
    fn test_http_reader_builds() {
        let reader = HttpLedgerReader::new("http://localhost:9000/", 15).expect("build");
        assert_eq!(reader.base_url, "http://localhost:9000");
    }
}
