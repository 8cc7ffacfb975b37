//! The three periodic cycles: ingestion, weight emission, and pruning.
//!
//! Each cycle is an independent tokio task; they share nothing but the
//! durable stores in `DaemonState`. Ingestion and the API keep running
//! while an emission is in flight; emission holds an exclusive guard so
//! two emission runs can never overlap — a late cycle is skipped, not
//! queued.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio::time::{interval, timeout};
use tracing::{error, info, warn};

use vig_chain::ledger::DayVolume;
use vig_chain::ChainError;
use vig_db::queries::{mappings, settings, snapshots, volumes};
use vig_scoring::{decay, weights};
use vig_types::day::{window_start, SECONDS_PER_DAY};
use vig_types::{SnapshotEntry, Uid};

use crate::epoch;
use crate::DaemonState;

/// Counters from one ingestion cycle.
#[derive(Debug, Default)]
pub struct IngestStats {
    /// Registered identities the cycle tried to fetch.
    pub attempted: usize,
    /// Identities whose fetch or write failed; retried next cycle.
    pub failed: usize,
    /// Volume rows written.
    pub rows_written: usize,
}

/// What one emission cycle did.
#[derive(Debug, PartialEq, Eq)]
pub enum EmissionOutcome {
    /// A previous emission was still running.
    SkippedOverlap,
    /// No ingestion has refreshed the stores since the last emission.
    SkippedStale,
    /// A storage read or write failed; nothing was emitted.
    SkippedStorage,
    /// Snapshot persisted but the consensus layer refused the vector.
    SubmitFailed,
    /// Snapshot persisted and weights submitted.
    Emitted {
        snapshot_id: i64,
        participants: usize,
    },
}

/// Spawn the three cycle loops.
pub fn spawn_cycles(state: Arc<DaemonState>) -> Vec<tokio::task::JoinHandle<()>> {
    let mut handles = Vec::new();

    let ingest_state = state.clone();
    handles.push(tokio::spawn(async move {
        let period = ingest_state.config.ingestion.interval_secs.max(1);
        let mut timer = interval(Duration::from_secs(period));
        loop {
            timer.tick().await;
            let stats = run_ingestion_cycle(&ingest_state).await;
            info!(
                attempted = stats.attempted,
                failed = stats.failed,
                rows = stats.rows_written,
                "ingestion cycle complete"
            );
        }
    }));

    let emit_state = state.clone();
    handles.push(tokio::spawn(async move {
        let period = epoch::emission_period_secs(
            emit_state.config.emission.cadence_blocks,
            emit_state.config.emission.block_time_secs,
        );
        let mut timer = interval(Duration::from_secs(period));
        loop {
            timer.tick().await;
            run_emission_cycle(&emit_state).await;
        }
    }));

    handles.push(tokio::spawn(async move {
        let mut timer = interval(Duration::from_secs(SECONDS_PER_DAY));
        loop {
            timer.tick().await;
            run_prune_cycle(&state).await;
        }
    }));

    handles
}

/// One ingestion pass: refresh every registered identity's volume
/// window from the ledger.
///
/// Fetches run through a bounded worker pool with a per-fetch deadline.
/// A single identity's failure is logged and skipped; the cycle itself
/// is the retry mechanism, so no backoff state is kept.
pub async fn run_ingestion_cycle(state: &Arc<DaemonState>) -> IngestStats {
    let mut stats = IngestStats::default();

    let registered = {
        let db = state.db.lock().await;
        match mappings::registered(&db) {
            Ok(r) => r,
            Err(e) => {
                error!(error = %e, "ingestion: failed to read registry");
                return stats;
            }
        }
    };

    let reference_day = epoch::current_day();
    let since_day = window_start(reference_day, state.config.scoring.decay_window_days);
    let timeout_secs = state.config.ledger.request_timeout_secs;

    let pool = Arc::new(Semaphore::new(
        state.config.ledger.max_concurrent_fetches as usize,
    ));
    let mut fetches: JoinSet<(Uid, Result<Vec<DayVolume>, ChainError>)> = JoinSet::new();

    for participant in registered {
        stats.attempted += 1;
        let ledger = state.ledger.clone();
        let pool = pool.clone();
        fetches.spawn(async move {
            let _permit = pool.acquire_owned().await.ok();
            let result = match timeout(
                Duration::from_secs(timeout_secs),
                ledger.fetch_volume(&participant.ledger_address, since_day, reference_day),
            )
            .await
            {
                Ok(result) => result,
                Err(_) => Err(ChainError::Timeout { secs: timeout_secs }),
            };
            (participant.uid, result)
        });
    }

    let now = epoch::now_secs();
    let mut succeeded = 0usize;
    while let Some(joined) = fetches.join_next().await {
        let (uid, result) = match joined {
            Ok(pair) => pair,
            Err(e) => {
                warn!(error = %e, "ingestion: fetch task aborted");
                stats.failed += 1;
                continue;
            }
        };

        match result {
            Ok(day_volumes) => {
                let db = state.db.lock().await;
                let mut write_failed = false;
                for volume in &day_volumes {
                    if let Err(e) = volumes::upsert_day(&db, uid, volume.day, volume.amount, now) {
                        error!(uid, day = volume.day, error = %e, "ingestion: volume write failed");
                        write_failed = true;
                        break;
                    }
                    stats.rows_written += 1;
                }
                if write_failed {
                    stats.failed += 1;
                } else {
                    succeeded += 1;
                }
            }
            Err(e) => {
                warn!(uid, error = %e, "ingestion: fetch failed, retrying next cycle");
                stats.failed += 1;
            }
        }
    }

    // Record the refresh for the emission gate. A cycle where every
    // fetch failed did not refresh anything and must not unblock it.
    if stats.attempted == 0 || succeeded > 0 {
        let db = state.db.lock().await;
        if let Err(e) = settings::set_u64(&db, settings::LAST_INGEST_AT, now) {
            error!(error = %e, "ingestion: failed to record cycle timestamp");
        }
    }

    stats
}

/// One emission pass: score, snapshot, submit.
///
/// Skips — never partially runs — when another emission holds the
/// guard, when no ingestion has refreshed the stores since the last
/// emission, or when storage fails.
pub async fn run_emission_cycle(state: &Arc<DaemonState>) -> EmissionOutcome {
    let Ok(_guard) = state.emission_guard.try_lock() else {
        warn!("emission skipped: previous cycle still running");
        return EmissionOutcome::SkippedOverlap;
    };

    let reference_day = epoch::current_day();
    let from_day = window_start(reference_day, state.config.scoring.decay_window_days);
    let block_number = epoch::current_block(state.config.emission.block_time_secs);

    // Reads and the snapshot append happen under one db lock, so the
    // emitted vector is exactly what the snapshot recorded.
    let (snapshot_id, weight_vec) = {
        let db = state.db.lock().await;

        let last_ingest = match settings::get_u64(&db, settings::LAST_INGEST_AT) {
            Ok(v) => v,
            Err(e) => {
                error!(error = %e, "emission aborted: settings read failed");
                return EmissionOutcome::SkippedStorage;
            }
        };
        let last_emission = match settings::get_u64(&db, settings::LAST_EMISSION_AT) {
            Ok(v) => v,
            Err(e) => {
                error!(error = %e, "emission aborted: settings read failed");
                return EmissionOutcome::SkippedStorage;
            }
        };
        if last_ingest <= last_emission {
            warn!(
                last_ingest,
                last_emission, "emission skipped: no fresh ingestion since last emission"
            );
            return EmissionOutcome::SkippedStale;
        }

        let registered = match mappings::registered(&db) {
            Ok(r) => r,
            Err(e) => {
                error!(error = %e, "emission aborted: registry read failed");
                return EmissionOutcome::SkippedStorage;
            }
        };
        let windows = match volumes::all_windows(&db, from_day, reference_day) {
            Ok(w) => w,
            Err(e) => {
                error!(error = %e, "emission aborted: volume read failed");
                return EmissionOutcome::SkippedStorage;
            }
        };

        // One reference day for every identity in the snapshot.
        let mut scores: BTreeMap<Uid, u64> = BTreeMap::new();
        for participant in &registered {
            let empty = BTreeMap::new();
            let window = windows.get(&participant.uid).unwrap_or(&empty);
            let score = match decay::weighted_volume_with(
                &state.config.scoring.weights_pct,
                window,
                reference_day,
            ) {
                Ok(s) => s,
                Err(e) => {
                    error!(uid = participant.uid, error = %e, "emission aborted: scoring failed");
                    return EmissionOutcome::SkippedStorage;
                }
            };
            scores.insert(participant.uid, score);
        }

        let normalized = weights::normalize(&scores);
        let entries: Vec<SnapshotEntry> = normalized
            .iter()
            .map(|(uid, weight)| SnapshotEntry {
                uid: *uid,
                score: scores.get(uid).copied().unwrap_or(0),
                weight: *weight,
            })
            .collect();

        let snapshot_id =
            match snapshots::append(&db, block_number, epoch::now_secs(), &entries) {
                Ok(id) => id,
                Err(e) => {
                    error!(error = %e, "emission aborted: snapshot write failed");
                    return EmissionOutcome::SkippedStorage;
                }
            };

        let weight_vec: Vec<(Uid, f64)> =
            entries.iter().map(|e| (e.uid, e.weight)).collect();
        (snapshot_id, weight_vec)
    };

    match state.emitter.submit_weights(block_number, &weight_vec).await {
        Ok(()) => {
            let db = state.db.lock().await;
            if let Err(e) = settings::set_u64(&db, settings::LAST_EMISSION_AT, epoch::now_secs()) {
                error!(error = %e, "emission: failed to record cycle timestamp");
            }
            info!(
                snapshot_id,
                block_number,
                participants = weight_vec.len(),
                "weights emitted"
            );
            EmissionOutcome::Emitted {
                snapshot_id,
                participants: weight_vec.len(),
            }
        }
        Err(e) => {
            error!(error = %e, "weight submission failed; snapshot persisted, retrying next period");
            EmissionOutcome::SubmitFailed
        }
    }
}

/// One pruning pass: drop volume rows that fell out of the decay window.
pub async fn run_prune_cycle(state: &Arc<DaemonState>) -> usize {
    let reference_day = epoch::current_day();
    let cutoff = window_start(reference_day, state.config.scoring.decay_window_days);

    let db = state.db.lock().await;
    match volumes::prune_before(&db, cutoff) {
        Ok(deleted) => {
            if deleted > 0 {
                info!(deleted, cutoff, "pruned volume rows outside decay window");
            }
            deleted
        }
        Err(e) => {
            error!(error = %e, "pruning failed");
            0
        }
    }
}
