//! Participant and wallet-mapping query functions.
//!
//! `participants` rows come from the membership layer (uid <-> coldkey);
//! `wallet_mappings` rows come from signed registrations
//! (coldkey -> betting-ledger address). The join of the two is what the
//! ingestion and emission cycles iterate.

use rusqlite::{Connection, OptionalExtension};

use vig_types::Uid;

use crate::Result;

/// A stored wallet mapping.
#[derive(Clone, Debug)]
pub struct MappingRow {
    pub coldkey: String,
    pub ledger_address: String,
    pub signature: String,
    pub message: String,
    /// Client timestamp from the registration request, milliseconds.
    pub timestamp: u64,
    /// Server time at verification, seconds.
    pub verified_at: u64,
}

/// A participant with a registered ledger address.
#[derive(Clone, Debug)]
pub struct RegisteredParticipant {
    pub uid: Uid,
    pub coldkey: String,
    pub ledger_address: String,
}

/// Record (or re-key) a participant from the membership layer.
pub fn ensure_participant(conn: &Connection, uid: Uid, coldkey: &str, now: u64) -> Result<()> {
    conn.execute(
        "INSERT OR REPLACE INTO participants (uid, coldkey, first_seen_at)
         VALUES (?1, ?2, COALESCE(
             (SELECT first_seen_at FROM participants WHERE uid = ?1), ?3))",
        rusqlite::params![uid, coldkey, now as i64],
    )?;
    Ok(())
}

/// All known participants, ascending uid.
pub fn participants(conn: &Connection) -> Result<Vec<(Uid, String)>> {
    let mut stmt = conn.prepare("SELECT uid, coldkey FROM participants ORDER BY uid")?;
    let rows = stmt
        .query_map([], |row| Ok((row.get::<_, u16>(0)?, row.get(1)?)))?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}

/// Replace the wallet mapping for a coldkey.
///
/// The previous mapping, if any, is superseded atomically; there is
/// never more than one active row per coldkey.
pub fn upsert_mapping(
    conn: &Connection,
    coldkey: &str,
    ledger_address: &str,
    signature: &str,
    message: &str,
    timestamp_ms: u64,
    verified_at: u64,
) -> Result<()> {
    conn.execute(
        "INSERT INTO wallet_mappings
             (coldkey, ledger_address, signature, message, timestamp, verified_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)
         ON CONFLICT(coldkey) DO UPDATE SET
             ledger_address = excluded.ledger_address,
             signature = excluded.signature,
             message = excluded.message,
             timestamp = excluded.timestamp,
             verified_at = excluded.verified_at",
        rusqlite::params![
            coldkey,
            ledger_address,
            signature,
            message,
            timestamp_ms as i64,
            verified_at as i64,
        ],
    )?;
    Ok(())
}

/// The stored mapping for a coldkey, if any.
pub fn mapping_for(conn: &Connection, coldkey: &str) -> Result<Option<MappingRow>> {
    let row = conn
        .query_row(
            "SELECT coldkey, ledger_address, signature, message, timestamp, verified_at
             FROM wallet_mappings WHERE coldkey = ?1",
            [coldkey],
            |row| {
                Ok(MappingRow {
                    coldkey: row.get(0)?,
                    ledger_address: row.get(1)?,
                    signature: row.get(2)?,
                    message: row.get(3)?,
                    timestamp: row.get::<_, i64>(4)? as u64,
                    verified_at: row.get::<_, i64>(5)? as u64,
                })
            },
        )
        .optional()?;
    Ok(row)
}

/// The ledger address registered for a uid, if any.
pub fn resolve(conn: &Connection, uid: Uid) -> Result<Option<String>> {
    let address = conn
        .query_row(
            "SELECT m.ledger_address
             FROM participants p
             JOIN wallet_mappings m ON m.coldkey = p.coldkey
             WHERE p.uid = ?1",
            [uid],
            |row| row.get(0),
        )
        .optional()?;
    Ok(address)
}

/// All participants with a registered ledger address, ascending uid.
pub fn registered(conn: &Connection) -> Result<Vec<RegisteredParticipant>> {
    let mut stmt = conn.prepare(
        "SELECT p.uid, p.coldkey, m.ledger_address
         FROM participants p
         JOIN wallet_mappings m ON m.coldkey = p.coldkey
         ORDER BY p.uid",
    )?;
    let rows = stmt
        .query_map([], |row| {
            Ok(RegisteredParticipant {
                uid: row.get::<_, u16>(0)?,
                coldkey: row.get(1)?,
                ledger_address: row.get(2)?,
            })
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}

/// All stored mappings, most recently verified first.
pub fn list(conn: &Connection) -> Result<Vec<MappingRow>> {
    let mut stmt = conn.prepare(
        "SELECT coldkey, ledger_address, signature, message, timestamp, verified_at
         FROM wallet_mappings ORDER BY verified_at DESC, coldkey",
    )?;
    let rows = stmt
        .query_map([], |row| {
            Ok(MappingRow {
                coldkey: row.get(0)?,
                ledger_address: row.get(1)?,
                signature: row.get(2)?,
                message: row.get(3)?,
                timestamp: row.get::<_, i64>(4)? as u64,
                verified_at: row.get::<_, i64>(5)? as u64,
            })
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}
