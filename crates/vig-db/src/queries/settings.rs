//! Settings query functions.
//!
//! The settings table carries the small amount of cycle state that must
//! survive restart, most importantly the ingestion/emission timestamps
//! that gate weight emission against stale data.

use rusqlite::{Connection, OptionalExtension};

use crate::Result;

/// Unix seconds of the last ingestion cycle that wrote at least one row.
pub const LAST_INGEST_AT: &str = "last_ingest_at";

/// Unix seconds of the last completed weight emission.
pub const LAST_EMISSION_AT: &str = "last_emission_at";

/// Get a setting value.
pub fn get(conn: &Connection, key: &str) -> Result<Option<String>> {
    let value = conn
        .query_row("SELECT value FROM settings WHERE key = ?1", [key], |row| {
            row.get(0)
        })
        .optional()?;
    Ok(value)
}

/// Set a setting value.
pub fn set(conn: &Connection, key: &str, value: &str) -> Result<()> {
    conn.execute(
        "INSERT INTO settings (key, value) VALUES (?1, ?2)
         ON CONFLICT(key) DO UPDATE SET value = excluded.value",
        [key, value],
    )?;
    Ok(())
}

/// Get a numeric setting; missing or unparsable values read as 0.
pub fn get_u64(conn: &Connection, key: &str) -> Result<u64> {
    Ok(get(conn, key)?
        .and_then(|v| v.parse().ok())
        .unwrap_or(0))
}

/// Set a numeric setting.
pub fn set_u64(conn: &Connection, key: &str, value: u64) -> Result<()> {
    set(conn, key, &value.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_db() -> Connection {
        crate::open_memory().expect("open test db")
    }

    #[test]
    fn test_defaults_present() {
        let conn = test_db();
        assert_eq!(get_u64(&conn, LAST_INGEST_AT).expect("get"), 0);
        assert_eq!(get_u64(&conn, LAST_EMISSION_AT).expect("get"), 0);
    }

    #[test]
    fn test_set_get_roundtrip() {
        let conn = test_db();
        set(&conn, "endpoint", "http://localhost:9000").expect("set");
        assert_eq!(
            get(&conn, "endpoint").expect("get"),
            Some("http://localhost:9000".to_string())
        );
    }

    #[test]
    fn test_set_overwrites() {
        let conn = test_db();
        set_u64(&conn, LAST_INGEST_AT, 100).expect("set");
        set_u64(&conn, LAST_INGEST_AT, 200).expect("set");
        assert_eq!(get_u64(&conn, LAST_INGEST_AT).expect("get"), 200);
    }

    #[test]
    fn test_missing_key() {
        let conn = test_db();
        assert_eq!(get(&conn, "nope").expect("get"), None);
        assert_eq!(get_u64(&conn, "nope").expect("get"), 0);
    }
}
