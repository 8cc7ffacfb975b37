//! SQL schema definitions.

/// Complete schema for the vig v1 database.
pub const SCHEMA_V1: &str = r#"
-- ============================================================
-- Participants & wallet mappings
-- ============================================================

-- One row per network participant. Rows arrive from the membership
-- layer; the reward engine never invents uids.
CREATE TABLE IF NOT EXISTS participants (
    uid INTEGER PRIMARY KEY,
    coldkey TEXT NOT NULL UNIQUE,
    first_seen_at INTEGER NOT NULL
);

-- coldkey -> betting-ledger address. One active mapping per coldkey;
-- re-registration replaces the row, never appends.
CREATE TABLE IF NOT EXISTS wallet_mappings (
    coldkey TEXT PRIMARY KEY,
    ledger_address TEXT NOT NULL,
    signature TEXT NOT NULL,
    message TEXT NOT NULL,
    timestamp INTEGER NOT NULL,
    verified_at INTEGER NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_mappings_address ON wallet_mappings(ledger_address);

-- ============================================================
-- Daily betting volumes
-- ============================================================

-- Authoritative per-day totals mirrored from the betting ledger.
-- Ingestion replaces amounts by key; it never increments them.
CREATE TABLE IF NOT EXISTS daily_volumes (
    uid INTEGER NOT NULL,
    day INTEGER NOT NULL,
    amount INTEGER NOT NULL,
    updated_at INTEGER NOT NULL,
    PRIMARY KEY (uid, day)
);

CREATE INDEX IF NOT EXISTS idx_volumes_day ON daily_volumes(day);

-- ============================================================
-- Snapshot archive (append-only)
-- ============================================================

CREATE TABLE IF NOT EXISTS snapshots (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    block_number INTEGER NOT NULL,
    created_at INTEGER NOT NULL,
    total_participants INTEGER NOT NULL,
    total_volume INTEGER NOT NULL
);

CREATE TABLE IF NOT EXISTS snapshot_entries (
    snapshot_id INTEGER NOT NULL REFERENCES snapshots(id),
    uid INTEGER NOT NULL,
    score INTEGER NOT NULL,
    weight REAL NOT NULL,
    PRIMARY KEY (snapshot_id, uid)
);

CREATE INDEX IF NOT EXISTS idx_entries_uid ON snapshot_entries(uid);

-- ============================================================
-- Settings
-- ============================================================

CREATE TABLE IF NOT EXISTS settings (
    key TEXT PRIMARY KEY,
    value TEXT NOT NULL
);
"#;
