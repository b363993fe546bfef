use rusqlite::Connection;
use stepsync_core::db::migrations::latest_version;
use stepsync_core::{open_db, open_db_in_memory, Assembly, DbError, RegistryAdapter, SqliteRegistry};

#[test]
fn open_db_in_memory_applies_all_migrations() {
    let conn = open_db_in_memory().unwrap();

    assert_eq!(schema_version(&conn), latest_version());
    for table in [
        "messages",
        "message_filters",
        "assemblies",
        "handlers",
        "steps",
        "images",
        "service_endpoints",
    ] {
        assert_table_exists(&conn, table);
    }
}

#[test]
fn reopening_database_keeps_registrations() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("registry.db");

    let conn_first = open_db(&path).unwrap();
    let assembly = Assembly::new("Acme.Plugins", "1.0.0.0");
    RegistryAdapter::new(SqliteRegistry::new(&conn_first))
        .create_assembly(&assembly, b"payload")
        .unwrap();
    drop(conn_first);

    let conn_second = open_db(&path).unwrap();
    assert_eq!(schema_version(&conn_second), latest_version());
    let loaded = RegistryAdapter::new(SqliteRegistry::new(&conn_second))
        .load_by_name("Acme.Plugins")
        .unwrap()
        .unwrap();
    assert_eq!(loaded.version, "1.0.0.0");
}

#[test]
fn foreign_keys_reject_orphaned_handlers() {
    let conn = open_db_in_memory().unwrap();

    let result = conn.execute(
        "INSERT INTO handlers (id, assembly_id, type_name, kind, isolatable)
         VALUES ('h', 'missing', 'Acme.Plugins.APlugin', 0, 2);",
        [],
    );

    assert!(result.is_err());
}

#[test]
fn opening_database_with_newer_schema_version_returns_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("future.db");

    let conn = Connection::open(&path).unwrap();
    conn.execute_batch("PRAGMA user_version = 999;").unwrap();
    drop(conn);

    let err = open_db(&path).unwrap_err();
    match err {
        DbError::UnsupportedSchemaVersion {
            db_version,
            latest_supported,
        } => {
            assert_eq!(db_version, 999);
            assert_eq!(latest_supported, latest_version());
        }
        other => panic!("unexpected error: {other}"),
    }
}

fn schema_version(conn: &Connection) -> u32 {
    conn.query_row("PRAGMA user_version;", [], |row| row.get(0))
        .unwrap()
}

fn assert_table_exists(conn: &Connection, table_name: &str) {
    let exists: i64 = conn
        .query_row(
            "SELECT EXISTS(
                SELECT 1
                FROM sqlite_master
                WHERE type = 'table' AND name = ?1
            );",
            [table_name],
            |row| row.get(0),
        )
        .unwrap();
    assert_eq!(exists, 1, "table {table_name} does not exist");
}
