//! Daily-volume query functions.
//!
//! The ledger reports authoritative per-day totals, so writes replace by
//! key: re-ingesting the same day reconciles to the ledger's number
//! instead of double-counting it.

use std::collections::BTreeMap;

use rusqlite::Connection;

use vig_types::day::Day;
use vig_types::Uid;

use crate::Result;

/// Replace a participant's volume for one day.
///
/// Idempotent: repeating the call with the same amount leaves the row
/// unchanged; a new amount replaces the old one.
pub fn upsert_day(
    conn: &Connection,
    uid: Uid,
    day: Day,
    amount: u64,
    updated_at: u64,
) -> Result<()> {
    conn.execute(
        "INSERT INTO daily_volumes (uid, day, amount, updated_at)
         VALUES (?1, ?2, ?3, ?4)
         ON CONFLICT(uid, day) DO UPDATE SET
             amount = excluded.amount,
             updated_at = excluded.updated_at",
        rusqlite::params![uid, day as i64, amount as i64, updated_at as i64],
    )?;
    Ok(())
}

/// One participant's volumes in an inclusive day range.
pub fn window(conn: &Connection, uid: Uid, from_day: Day, to_day: Day) -> Result<BTreeMap<Day, u64>> {
    let mut stmt = conn.prepare(
        "SELECT day, amount FROM daily_volumes
         WHERE uid = ?1 AND day >= ?2 AND day <= ?3",
    )?;

    let rows = stmt
        .query_map(
            rusqlite::params![uid, from_day as i64, to_day as i64],
            |row| {
                Ok((
                    row.get::<_, i64>(0)? as Day,
                    row.get::<_, i64>(1)? as u64,
                ))
            },
        )?
        .collect::<std::result::Result<BTreeMap<_, _>, _>>()?;

    Ok(rows)
}

/// Every participant's volumes in an inclusive day range.
pub fn all_windows(
    conn: &Connection,
    from_day: Day,
    to_day: Day,
) -> Result<BTreeMap<Uid, BTreeMap<Day, u64>>> {
    let mut stmt = conn.prepare(
        "SELECT uid, day, amount FROM daily_volumes
         WHERE day >= ?1 AND day <= ?2",
    )?;

    let mut windows: BTreeMap<Uid, BTreeMap<Day, u64>> = BTreeMap::new();
    let rows = stmt.query_map(rusqlite::params![from_day as i64, to_day as i64], |row| {
        Ok((
            row.get::<_, u16>(0)?,
            row.get::<_, i64>(1)? as Day,
            row.get::<_, i64>(2)? as u64,
        ))
    })?;

    for row in rows {
        let (uid, day, amount) = row?;
        windows.entry(uid).or_default().insert(day, amount);
    }

    Ok(windows)
}

/// Delete volume rows older than the given day. Returns rows deleted.
pub fn prune_before(conn: &Connection, day: Day) -> Result<usize> {
    let deleted = conn.execute(
        "DELETE FROM daily_volumes WHERE day < ?1",
        rusqlite::params![day as i64],
    )?;
    Ok(deleted)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_db() -> Connection {
        crate::open_memory().expect("open test db")
    }

    #[test]
    fn test_upsert_and_window() {
        let conn = test_db();
        upsert_day(&conn, 1, 100, 5_000_000, 10).expect("upsert");
        upsert_day(&conn, 1, 101, 3_000_000, 10).expect("upsert");
        upsert_day(&conn, 2, 100, 9_000_000, 10).expect("upsert");

        let w = window(&conn, 1, 95, 101).expect("window");
        assert_eq!(w.len(), 2);
        assert_eq!(w[&100], 5_000_000);
        assert_eq!(w[&101], 3_000_000);
    }

    #[test]
    fn test_upsert_is_idempotent() {
        let conn = test_db();
        upsert_day(&conn, 1, 100, 5_000_000, 10).expect("first");
        upsert_day(&conn, 1, 100, 5_000_000, 11).expect("second");

        let w = window(&conn, 1, 100, 100).expect("window");
        assert_eq!(w[&100], 5_000_000);

        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM daily_volumes", [], |row| row.get(0))
            .expect("count");
        assert_eq!(count, 1, "repeat upsert must not add rows");
    }

    #[test]
    fn test_upsert_replaces_never_adds() {
        let conn = test_db();
        upsert_day(&conn, 1, 100, 5_000_000, 10).expect("first");
        // The ledger's authoritative total changed; the new value replaces.
        upsert_day(&conn, 1, 100, 8_000_000, 11).expect("second");

        let w = window(&conn, 1, 100, 100).expect("window");
        assert_eq!(w[&100], 8_000_000, "amount is replaced, not accumulated");
    }

    #[test]
    fn test_window_excludes_out_of_range() {
        let conn = test_db();
        upsert_day(&conn, 1, 90, 1, 10).expect("upsert");
        upsert_day(&conn, 1, 100, 2, 10).expect("upsert");
        upsert_day(&conn, 1, 110, 3, 10).expect("upsert");

        let w = window(&conn, 1, 95, 105).expect("window");
        assert_eq!(w.len(), 1);
        assert_eq!(w[&100], 2);
    }

    #[test]
    fn test_all_windows_groups_by_uid() {
        let conn = test_db();
        upsert_day(&conn, 1, 100, 10, 10).expect("upsert");
        upsert_day(&conn, 1, 101, 20, 10).expect("upsert");
        upsert_day(&conn, 7, 100, 30, 10).expect("upsert");

        let all = all_windows(&conn, 100, 101).expect("all");
        assert_eq!(all.len(), 2);
        assert_eq!(all[&1].len(), 2);
        assert_eq!(all[&7][&100], 30);
    }

    #[test]
    fn test_prune_before() {
        let conn = test_db();
        for day in 90..100 {
            upsert_day(&conn, 1, day, 1, 10).expect("upsert");
        }

        let deleted = prune_before(&conn, 95).expect("prune");
        assert_eq!(deleted, 5);

        let w = window(&conn, 1, 0, 200).expect("window");
        assert_eq!(w.len(), 5);
        assert!(w.keys().all(|d| *d >= 95));
    }

    #[test]
    fn test_prune_empty_table() {
        let conn = test_db();
        assert_eq!(prune_before(&conn, 100).expect("prune"), 0);
    }
}
