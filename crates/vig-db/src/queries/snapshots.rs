//! Snapshot archive query functions.
//!
//! The archive is the audit log external observers rely on: appends are
//! all-or-nothing, ids are strictly increasing, and no update or delete
//! function exists in this module.

use rusqlite::{Connection, OptionalExtension};

use vig_types::{SnapshotEntry, SnapshotRecord, SnapshotSummary, Uid};

use crate::Result;

/// Append a snapshot in a single transaction and return its id.
///
/// `entries` carries every participant with nonzero score. An empty
/// vector is still appended: a row of zeros keeps the audit history
/// continuous through inactive periods.
pub fn append(
    conn: &Connection,
    block_number: u64,
    created_at: u64,
    entries: &[SnapshotEntry],
) -> Result<i64> {
    let total_volume: u128 = entries.iter().map(|e| e.score as u128).sum();

    let tx = conn.unchecked_transaction()?;
    tx.execute(
        "INSERT INTO snapshots (block_number, created_at, total_participants, total_volume)
         VALUES (?1, ?2, ?3, ?4)",
        rusqlite::params![
            block_number as i64,
            created_at as i64,
            entries.len() as i64,
            total_volume as i64,
        ],
    )?;
    let id = tx.last_insert_rowid();

    {
        let mut stmt = tx.prepare(
            "INSERT INTO snapshot_entries (snapshot_id, uid, score, weight)
             VALUES (?1, ?2, ?3, ?4)",
        )?;
        for entry in entries {
            stmt.execute(rusqlite::params![
                id,
                entry.uid,
                entry.score as i64,
                entry.weight
            ])?;
        }
    }

    tx.commit()?;

    tracing::info!(
        snapshot_id = id,
        block_number,
        participants = entries.len(),
        "snapshot appended"
    );

    Ok(id)
}

/// The most recent snapshot, if any.
pub fn latest(conn: &Connection) -> Result<Option<SnapshotRecord>> {
    let summary = conn
        .query_row(
            "SELECT id, block_number, created_at, total_participants, total_volume
             FROM snapshots ORDER BY id DESC LIMIT 1",
            [],
            summary_from_row,
        )
        .optional()?;

    match summary {
        Some(summary) => Ok(Some(with_entries(conn, summary)?)),
        None => Ok(None),
    }
}

/// A specific snapshot by id.
pub fn get(conn: &Connection, id: i64) -> Result<Option<SnapshotRecord>> {
    let summary = conn
        .query_row(
            "SELECT id, block_number, created_at, total_participants, total_volume
             FROM snapshots WHERE id = ?1",
            [id],
            summary_from_row,
        )
        .optional()?;

    match summary {
        Some(summary) => Ok(Some(with_entries(conn, summary)?)),
        None => Ok(None),
    }
}

/// Recent snapshot summaries, newest first.
pub fn list(conn: &Connection, limit: u32) -> Result<Vec<SnapshotSummary>> {
    let mut stmt = conn.prepare(
        "SELECT id, block_number, created_at, total_participants, total_volume
         FROM snapshots ORDER BY id DESC LIMIT ?1",
    )?;
    let rows = stmt
        .query_map([limit], summary_from_row)?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}

/// Full snapshots in an inclusive id range, ascending.
pub fn range(conn: &Connection, from_id: i64, to_id: i64) -> Result<Vec<SnapshotRecord>> {
    let mut stmt = conn.prepare(
        "SELECT id, block_number, created_at, total_participants, total_volume
         FROM snapshots WHERE id >= ?1 AND id <= ?2 ORDER BY id",
    )?;
    let summaries = stmt
        .query_map([from_id, to_id], summary_from_row)?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    summaries
        .into_iter()
        .map(|summary| with_entries(conn, summary))
        .collect()
}

/// One participant's (snapshot id, score) history, newest first.
pub fn identity_history(conn: &Connection, uid: Uid, limit: u32) -> Result<Vec<(i64, u64)>> {
    let mut stmt = conn.prepare(
        "SELECT snapshot_id, score FROM snapshot_entries
         WHERE uid = ?1 ORDER BY snapshot_id DESC LIMIT ?2",
    )?;
    let rows = stmt
        .query_map(rusqlite::params![uid, limit], |row| {
            Ok((row.get::<_, i64>(0)?, row.get::<_, i64>(1)? as u64))
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}

fn summary_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<SnapshotSummary> {
    Ok(SnapshotSummary {
        id: row.get(0)?,
        block_number: row.get::<_, i64>(1)? as u64,
        created_at: row.get::<_, i64>(2)? as u64,
        total_participants: row.get::<_, i64>(3)? as u64,
        total_volume: row.get::<_, i64>(4)? as u64,
    })
}

fn with_entries(conn: &Connection, summary: SnapshotSummary) -> Result<SnapshotRecord> {
    let mut stmt = conn.prepare(
        "SELECT uid, score, weight FROM snapshot_entries
         WHERE snapshot_id = ?1 ORDER BY uid",
    )?;
    let entries = stmt
        .query_map([summary.id], |row| {
            Ok(SnapshotEntry {
                uid: row.get::<_, u16>(0)?,
                score: row.get::<_, i64>(1)? as u64,
                weight: row.get(2)?,
            })
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    Ok(SnapshotRecord { summary, entries })
}
