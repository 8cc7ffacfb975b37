//! Query API handlers.
//!
//! Read handlers recompute from the stores on every request — there is
//! no cached score state to go stale. The registration handler applies
//! the same verification path as the registry regardless of what the
//! client claims.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::Deserialize;
use serde_json::{json, Value};

use vig_db::queries::{mappings, snapshots, volumes};
use vig_registry::RegistrationRequest;
use vig_scoring::{decay, weights};
use vig_types::day::window_start;
use vig_types::Uid;

use crate::epoch;
use crate::http::{ApiError, HandlerResult};
use crate::DaemonState;

/// Liveness probe.
pub async fn health(_state: &Arc<DaemonState>) -> HandlerResult {
    Ok(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

/// Current decayed score per registered identity.
pub async fn scores(state: &Arc<DaemonState>) -> HandlerResult {
    let reference_day = epoch::current_day();
    let scores = compute_scores(state, reference_day).await?;

    let map: serde_json::Map<String, Value> = scores
        .iter()
        .map(|(uid, score)| (uid.to_string(), json!(score)))
        .collect();

    Ok(json!({
        "reference_day": reference_day,
        "scores": map,
    }))
}

/// One identity's score, volume breakdown, address, and score history.
pub async fn score_detail(state: &Arc<DaemonState>, uid: Uid) -> HandlerResult {
    let reference_day = epoch::current_day();
    let window_days = state.config.scoring.decay_window_days;
    let from_day = window_start(reference_day, window_days);

    let db = state.db.lock().await;

    let coldkey = mappings::participants(&db)?
        .into_iter()
        .find(|(candidate, _)| *candidate == uid)
        .map(|(_, coldkey)| coldkey)
        .ok_or_else(|| ApiError::not_found(&format!("unknown uid {uid}")))?;

    let ledger_address = mappings::resolve(&db, uid)?;
    let window = volumes::window(&db, uid, from_day, reference_day)?;
    let weighted =
        decay::weighted_volume_with(&state.config.scoring.weights_pct, &window, reference_day)
            .map_err(|e| ApiError::internal(&e.to_string()))?;
    let history = snapshots::identity_history(&db, uid, 50)?;

    Ok(json!({
        "uid": uid,
        "coldkey": coldkey,
        "ledger_address": ledger_address,
        "reference_day": reference_day,
        "daily_volumes": decay::window_array(&window, reference_day, window_days),
        "weighted_volume": weighted,
        "history": history
            .iter()
            .map(|(snapshot_id, score)| json!({"snapshot_id": snapshot_id, "score": score}))
            .collect::<Vec<_>>(),
    }))
}

/// Per-day volume arrays for every registered identity, day 0 = today.
pub async fn volumes(state: &Arc<DaemonState>) -> HandlerResult {
    let reference_day = epoch::current_day();
    let window_days = state.config.scoring.decay_window_days;
    let from_day = window_start(reference_day, window_days);

    let db = state.db.lock().await;
    let registered = mappings::registered(&db)?;
    let windows = volumes::all_windows(&db, from_day, reference_day)?;

    let empty = BTreeMap::new();
    let map: serde_json::Map<String, Value> = registered
        .iter()
        .map(|participant| {
            let window = windows.get(&participant.uid).unwrap_or(&empty);
            (
                participant.uid.to_string(),
                json!(decay::window_array(window, reference_day, window_days)),
            )
        })
        .collect();

    Ok(json!({
        "reference_day": reference_day,
        "volumes": map,
    }))
}

/// Identities ordered by current score, descending.
pub async fn leaderboard(state: &Arc<DaemonState>) -> HandlerResult {
    let reference_day = epoch::current_day();
    let scores = compute_scores(state, reference_day).await?;
    let ranked = weights::rank(&scores);

    Ok(json!(ranked
        .iter()
        .map(|(uid, score)| json!({"uid": uid, "score": score}))
        .collect::<Vec<_>>()))
}

/// Recent snapshot summaries.
pub async fn snapshots_list(state: &Arc<DaemonState>) -> HandlerResult {
    let db = state.db.lock().await;
    let summaries = snapshots::list(&db, 100)?;
    serde_json::to_value(summaries).map_err(|e| ApiError::internal(&e.to_string()))
}

/// One full snapshot record.
pub async fn snapshot_get(state: &Arc<DaemonState>, id: i64) -> HandlerResult {
    let db = state.db.lock().await;
    let record = snapshots::get(&db, id)?
        .ok_or_else(|| ApiError::not_found(&format!("no snapshot {id}")))?;
    serde_json::to_value(record).map_err(|e| ApiError::internal(&e.to_string()))
}

/// Registered wallet mappings, most recent first.
pub async fn mappings_list(state: &Arc<DaemonState>) -> HandlerResult {
    let db = state.db.lock().await;
    let rows = mappings::list(&db)?;

    Ok(json!(rows
        .iter()
        .map(|row| {
            json!({
                "coldkey": row.coldkey,
                "ledger_address": row.ledger_address,
                "timestamp": row.timestamp,
                "verified_at": row.verified_at,
            })
        })
        .collect::<Vec<_>>()))
}

/// Wallet-mapping request body.
#[derive(Debug, Deserialize)]
struct WalletMappingBody {
    #[serde(rename = "type")]
    #[allow(dead_code)]
    kind: Option<String>,
    data: WalletMappingData,
}

#[derive(Debug, Deserialize)]
struct WalletMappingData {
    #[serde(rename = "coldkeyIdentity")]
    coldkey_identity: String,
    #[serde(rename = "ledgerAddress")]
    ledger_address: String,
    signature: String,
    message: String,
    timestamp: u64,
    /// Client-side claim; informational only. The server always
    /// re-verifies — trusting this flag would let anyone register any
    /// address.
    #[serde(default)]
    #[allow(dead_code)]
    verified: bool,
}

/// Verify and store a wallet registration.
pub async fn register_mapping(state: &Arc<DaemonState>, body: &[u8]) -> HandlerResult {
    let body: WalletMappingBody = serde_json::from_slice(body)
        .map_err(|e| ApiError::bad_request("BAD_BODY", &format!("malformed body: {e}")))?;

    let request = RegistrationRequest {
        coldkey: body.data.coldkey_identity,
        ledger_address: body.data.ledger_address,
        signature: body.data.signature,
        message: body.data.message,
        timestamp: body.data.timestamp,
    };

    let db = state.db.lock().await;
    vig_registry::register(&db, state.verifier.as_ref(), &request, epoch::now_ms())?;

    Ok(json!({"success": true}))
}

/// Compute current scores for every registered identity against one
/// reference day.
async fn compute_scores(
    state: &Arc<DaemonState>,
    reference_day: vig_types::day::Day,
) -> std::result::Result<BTreeMap<Uid, u64>, ApiError> {
    let from_day = window_start(reference_day, state.config.scoring.decay_window_days);

    let db = state.db.lock().await;
    let registered = mappings::registered(&db)?;
    let windows = volumes::all_windows(&db, from_day, reference_day)?;

    let empty = BTreeMap::new();
    let mut scores = BTreeMap::new();
    for participant in &registered {
        let window = windows.get(&participant.uid).unwrap_or(&empty);
        let score = decay::weighted_volume_with(
            &state.config.scoring.weights_pct,
            window,
            reference_day,
        )
        .map_err(|e| ApiError::internal(&e.to_string()))?;
        scores.insert(participant.uid, score);
    }

    Ok(scores)
}

#[cfg(test)]
mod tests {
    use super::*;

    use hyper::StatusCode;
    use vig_chain::emitter::MemoryWeightEmitter;
    use vig_chain::ledger::StaticLedger;
    use vig_crypto::ed25519::KeyPair;
    use vig_registry::message;
    use vig_types::{SnapshotEntry, MICRO_PER_TOKEN};

    use crate::config::DaemonConfig;

    fn test_state() -> Arc<DaemonState> {
        let conn = vig_db::open_memory().expect("open db");
        Arc::new(DaemonState {
            db: Arc::new(tokio::sync::Mutex::new(conn)),
            config: DaemonConfig::default(),
            verifier: Arc::new(vig_crypto::ed25519::Ed25519Verifier),
            ledger: Arc::new(StaticLedger::new()),
            emitter: Arc::new(MemoryWeightEmitter::new()),
            emission_guard: tokio::sync::Mutex::new(()),
        })
    }

    async fn seed_registered(state: &Arc<DaemonState>, uid: Uid, coldkey: &str, address: &str) {
        let db = state.db.lock().await;
        mappings::ensure_participant(&db, uid, coldkey, 1).expect("participant");
        mappings::upsert_mapping(&db, coldkey, address, "sig", "msg", 1_000, 1)
            .expect("mapping");
    }

    #[tokio::test]
    async fn test_health() {
        let state = test_state();
        let value = health(&state).await.expect("health");
        assert_eq!(value["status"], "ok");
    }

    #[tokio::test]
    async fn test_scores_empty() {
        let state = test_state();
        let value = scores(&state).await.expect("scores");
        assert!(value["scores"].as_object().expect("object").is_empty());
    }

    #[tokio::test]
    async fn test_scores_computed_from_volumes() {
        let state = test_state();
        seed_registered(&state, 1, "aa11", "0xaaaa").await;

        let today = epoch::current_day();
        {
            let db = state.db.lock().await;
            volumes::upsert_day(&db, 1, today, 10 * MICRO_PER_TOKEN, 1).expect("upsert");
            volumes::upsert_day(&db, 1, today - 1, 8 * MICRO_PER_TOKEN, 1).expect("upsert");
            volumes::upsert_day(&db, 1, today - 2, 5 * MICRO_PER_TOKEN, 1).expect("upsert");
            volumes::upsert_day(&db, 1, today - 3, 3 * MICRO_PER_TOKEN, 1).expect("upsert");
        }

        let value = scores(&state).await.expect("scores");
        assert_eq!(value["scores"]["1"], 21_950_000_u64);
    }

    #[tokio::test]
    async fn test_score_detail_unknown_uid_is_not_found() {
        let state = test_state();
        let err = score_detail(&state, 42).await.expect_err("must fail");
        assert_eq!(err.status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_score_detail_breakdown() {
        let state = test_state();
        seed_registered(&state, 1, "aa11", "0xaaaa").await;

        let today = epoch::current_day();
        {
            let db = state.db.lock().await;
            volumes::upsert_day(&db, 1, today, 10 * MICRO_PER_TOKEN, 1).expect("upsert");
            volumes::upsert_day(&db, 1, today - 2, 5 * MICRO_PER_TOKEN, 1).expect("upsert");
            snapshots::append(
                &db,
                100,
                1,
                &[SnapshotEntry {
                    uid: 1,
                    score: 123,
                    weight: 1.0,
                }],
            )
            .expect("snapshot");
        }

        let value = score_detail(&state, 1).await.expect("detail");
        assert_eq!(value["coldkey"], "aa11");
        assert_eq!(value["ledger_address"], "0xaaaa");
        let daily = value["daily_volumes"].as_array().expect("array");
        assert_eq!(daily.len(), 7);
        assert_eq!(daily[0], 10 * MICRO_PER_TOKEN);
        assert_eq!(daily[2], 5 * MICRO_PER_TOKEN);
        assert_eq!(value["weighted_volume"], 13_500_000_u64);
        assert_eq!(value["history"][0]["score"], 123);
    }

    #[tokio::test]
    async fn test_volumes_arrays() {
        let state = test_state();
        seed_registered(&state, 3, "cc33", "0xcccc").await;

        let today = epoch::current_day();
        {
            let db = state.db.lock().await;
            volumes::upsert_day(&db, 3, today - 6, 42, 1).expect("upsert");
        }

        let value = volumes(&state).await.expect("volumes");
        let arr = value["volumes"]["3"].as_array().expect("array");
        assert_eq!(arr.len(), 7);
        assert_eq!(arr[6], 42);
    }

    #[tokio::test]
    async fn test_leaderboard_ordering() {
        let state = test_state();
        seed_registered(&state, 1, "aa11", "0xaaaa").await;
        seed_registered(&state, 2, "bb22", "0xbbbb").await;
        seed_registered(&state, 3, "cc33", "0xcccc").await;

        let today = epoch::current_day();
        {
            let db = state.db.lock().await;
            volumes::upsert_day(&db, 1, today, 10, 1).expect("upsert");
            volumes::upsert_day(&db, 2, today, 30, 1).expect("upsert");
            volumes::upsert_day(&db, 3, today, 20, 1).expect("upsert");
        }

        let value = leaderboard(&state).await.expect("leaderboard");
        let rows = value.as_array().expect("array");
        assert_eq!(rows[0]["uid"], 2);
        assert_eq!(rows[1]["uid"], 3);
        assert_eq!(rows[2]["uid"], 1);
    }

    #[tokio::test]
    async fn test_snapshot_endpoints() {
        let state = test_state();
        let id = {
            let db = state.db.lock().await;
            snapshots::append(
                &db,
                500,
                1_700_000_000,
                &[SnapshotEntry {
                    uid: 1,
                    score: 10,
                    weight: 1.0,
                }],
            )
            .expect("append")
        };

        let list = snapshots_list(&state).await.expect("list");
        assert_eq!(list.as_array().expect("array").len(), 1);
        assert_eq!(list[0]["block_number"], 500);

        let record = snapshot_get(&state, id).await.expect("get");
        assert_eq!(record["summary"]["id"], id);
        assert_eq!(record["entries"][0]["uid"], 1);

        let err = snapshot_get(&state, id + 1).await.expect_err("missing");
        assert_eq!(err.status, StatusCode::NOT_FOUND);
    }

    fn mapping_body(kp: &KeyPair, address: &str, timestamp: u64, verified: bool) -> Vec<u8> {
        let coldkey = kp.verifying_key.to_hex();
        let canonical = message::canonical_message(&coldkey, address, timestamp);
        let signature = kp
            .signing_key
            .sign(message::wrap_message(&canonical).as_bytes())
            .to_hex();
        serde_json::json!({
            "type": "wallet_mapping",
            "data": {
                "coldkeyIdentity": coldkey,
                "ledgerAddress": address,
                "signature": signature,
                "message": canonical,
                "timestamp": timestamp,
                "verified": verified,
            }
        })
        .to_string()
        .into_bytes()
    }

    #[tokio::test]
    async fn test_register_mapping_accepts_valid_request() {
        let state = test_state();
        let kp = KeyPair::generate();
        let address = "0x00a1b2c3d4e5f6a7b8c9d0e1f2a3b4c5d6e7f8a9";
        let body = mapping_body(&kp, address, epoch::now_ms() - 1_000, false);

        let value = register_mapping(&state, &body).await.expect("register");
        assert_eq!(value["success"], true);

        let db = state.db.lock().await;
        let stored = mappings::mapping_for(&db, &kp.verifying_key.to_hex())
            .expect("query")
            .expect("mapping exists");
        assert_eq!(stored.ledger_address, address);
    }

    #[tokio::test]
    async fn test_register_mapping_ignores_client_verified_flag() {
        let state = test_state();
        let kp = KeyPair::generate();
        let other = KeyPair::generate();
        let address = "0x00a1b2c3d4e5f6a7b8c9d0e1f2a3b4c5d6e7f8a9";

        // The body claims verified=true but carries a signature from the
        // wrong key; the server must reject it anyway.
        let mut body: serde_json::Value =
            serde_json::from_slice(&mapping_body(&kp, address, epoch::now_ms() - 1_000, true))
                .expect("parse");
        let wrapped = message::wrap_message(body["data"]["message"].as_str().expect("msg"));
        body["data"]["signature"] =
            serde_json::json!(other.signing_key.sign(wrapped.as_bytes()).to_hex());

        let err = register_mapping(&state, body.to_string().as_bytes())
            .await
            .expect_err("must fail");
        assert_eq!(err.status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_register_mapping_rejects_malformed_body() {
        let state = test_state();
        let err = register_mapping(&state, b"{not json")
            .await
            .expect_err("must fail");
        assert_eq!(err.status, StatusCode::BAD_REQUEST);
        assert_eq!(err.code, "BAD_BODY");
    }

    #[tokio::test]
    async fn test_mappings_list() {
        let state = test_state();
        seed_registered(&state, 1, "aa11", "0xaaaa").await;

        let value = mappings_list(&state).await.expect("list");
        let rows = value.as_array().expect("array");
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0]["coldkey"], "aa11");
        assert_eq!(rows[0]["ledger_address"], "0xaaaa");
    }
}
