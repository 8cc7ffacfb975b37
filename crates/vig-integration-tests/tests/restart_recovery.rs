//! Integration test: durable state survives a process restart.
//!
//! Opens a file-backed database, commits registry, volume, snapshot,
//! and gate state, drops the connection (the "process exit"), reopens,
//! and verifies every store reads back exactly — including the
//! emission gate timestamps, so a restarted validator neither re-emits
//! stale weights nor forgets committed history.

use std::path::PathBuf;

use vig_db::queries::{mappings, settings, snapshots, volumes};
use vig_types::SnapshotEntry;

fn temp_db_path(tag: &str) -> PathBuf {
    let mut path = std::env::temp_dir();
    path.push(format!("vig-restart-{}-{}.db", tag, std::process::id()));
    // Leftovers from a previous failed run
    let _ = std::fs::remove_file(&path);
    path
}

#[test]
fn restart_resumes_from_persisted_state() {
    let path = temp_db_path("full");

    // ---- First process lifetime ----
    {
        let conn = vig_db::open(&path).expect("open db");

        mappings::ensure_participant(&conn, 3, "cc33", 100).expect("participant");
        mappings::upsert_mapping(&conn, "cc33", "0xcccc", "sig", "msg", 1_000, 10)
            .expect("mapping");

        volumes::upsert_day(&conn, 3, 19_700, 5_000_000, 100).expect("volume");
        volumes::upsert_day(&conn, 3, 19_701, 7_000_000, 100).expect("volume");

        snapshots::append(
            &conn,
            360,
            100,
            &[SnapshotEntry {
                uid: 3,
                score: 12_000_000,
                weight: 1.0,
            }],
        )
        .expect("snapshot");

        settings::set_u64(&conn, settings::LAST_INGEST_AT, 100).expect("gate");
        settings::set_u64(&conn, settings::LAST_EMISSION_AT, 120).expect("gate");
    } // connection dropped: the "restart"

    // ---- Second process lifetime ----
    {
        let conn = vig_db::open(&path).expect("reopen db");

        assert_eq!(
            mappings::resolve(&conn, 3).expect("resolve"),
            Some("0xcccc".to_string())
        );

        let window = volumes::window(&conn, 3, 19_700, 19_706).expect("window");
        assert_eq!(window.len(), 2);
        assert_eq!(window[&19_700], 5_000_000);

        let latest = snapshots::latest(&conn).expect("query").expect("snapshot");
        assert_eq!(latest.summary.block_number, 360);
        assert_eq!(latest.entries.len(), 1);
        assert_eq!(latest.entries[0].score, 12_000_000);

        // The gate state survives: last emission is after last ingest,
        // so a restarted emission cycle would correctly skip.
        assert_eq!(settings::get_u64(&conn, settings::LAST_INGEST_AT).expect("gate"), 100);
        assert_eq!(
            settings::get_u64(&conn, settings::LAST_EMISSION_AT).expect("gate"),
            120
        );
    }

    let _ = std::fs::remove_file(&path);
}

#[test]
fn reopen_does_not_rerun_initial_migration() {
    let path = temp_db_path("migrate");

    {
        let conn = vig_db::open(&path).expect("open db");
        settings::set(&conn, "marker", "survives").expect("set");
    }

    {
        let conn = vig_db::open(&path).expect("reopen db");
        // Migration must be a no-op on a current-version database.
        assert_eq!(
            settings::get(&conn, "marker").expect("get"),
            Some("survives".to_string())
        );

        let version: u32 = conn
            .pragma_query_value(None, "user_version", |row| row.get(0))
            .expect("version");
        assert_eq!(version, vig_db::SCHEMA_VERSION);
    }

    let _ = std::fs::remove_file(&path);
}
