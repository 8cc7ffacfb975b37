//! # vig-types
//!
//! Shared domain types used across the vig workspace.

pub mod day;

use serde::{Deserialize, Serialize};

/// Network-assigned participant identifier.
pub type Uid = u16;

/// Micro-units per token (1 token = 1,000,000 micro).
///
/// All betting volumes and weighted volumes are carried as integer
/// micro-units so that decay scoring is exact; floating point appears
/// only in the final normalized weight vector.
pub const MICRO_PER_TOKEN: u64 = 1_000_000;

/// Length of the decay window in days.
pub const DECAY_WINDOW_DAYS: u64 = 7;

/// A participant's current state as reported by the query surface.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ParticipantScore {
    pub uid: Uid,
    /// Hex-encoded Ed25519 network identity key.
    pub coldkey: String,
    /// Linked betting-ledger address, lowercase hex. None until registered.
    pub ledger_address: Option<String>,
    /// Per-day raw volume in micro-units, index 0 = today.
    pub daily_volumes: Vec<u64>,
    /// Decay-weighted volume in micro-units.
    pub weighted_volume: u64,
}

/// Summary row for a persisted snapshot (no entry vector).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SnapshotSummary {
    pub id: i64,
    pub block_number: u64,
    /// Unix seconds at which the snapshot was appended.
    pub created_at: u64,
    /// Participants with nonzero score at that instant.
    pub total_participants: u64,
    /// Sum of weighted volumes across all entries, micro-units.
    pub total_volume: u64,
}

/// One participant's line in a snapshot.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SnapshotEntry {
    pub uid: Uid,
    /// Decay-weighted volume in micro-units.
    pub score: u64,
    /// Normalized weight in [0, 1]; the vector sums to 1 within 1e-6.
    pub weight: f64,
}

/// A full snapshot record: summary plus the entry vector.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SnapshotRecord {
    pub summary: SnapshotSummary,
    pub entries: Vec<SnapshotEntry>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_snapshot_entry_serde_roundtrip() {
        let entry = SnapshotEntry {
            uid: 7,
            score: 21_950_000,
            weight: 0.3,
        };
        let json = serde_json::to_string(&entry).expect("serialize");
        let back: SnapshotEntry = serde_json::from_str(&json).expect("parse");
        assert_eq!(entry, back);
    }

    #[test]
    fn test_micro_per_token() {
        assert_eq!(MICRO_PER_TOKEN, 1_000_000);
    }
}
