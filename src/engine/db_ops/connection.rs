//! Open the catalog database.

use log::debug;
use rusqlite::Connection;
use std::path::Path;

use crate::error::Result;

use super::{SCHEMA, WAL_PRAGMAS};

/// Enable WAL and apply schema to an open connection (idempotent).
fn apply_wal_and_schema(conn: &Connection) -> Result<()> {
    conn.query_row("PRAGMA journal_mode = WAL", [], |_| Ok(()))?;
    conn.execute_batch(WAL_PRAGMAS)?;
    conn.execute_batch(SCHEMA)?;
    Ok(())
}

/// Open or create the catalog and ensure schema + WAL.
/// If `passphrase` is Some, set SQLCipher PRAGMA key before any other operations.
pub fn open_db(path: &Path, passphrase: Option<&str>) -> Result<Connection> {
    let conn = Connection::open(path)?;

    if let Some(key) = passphrase {
        conn.pragma_update(None, "key", key)?;
    }

    apply_wal_and_schema(&conn)?;
    debug!("catalog open at {}", path.display());
    Ok(conn)
}

/// In-memory catalog with the same schema, for tests. No WAL.
pub fn open_db_in_memory() -> Result<Connection> {
    let conn = Connection::open_in_memory()?;
    conn.execute_batch(SCHEMA)?;
    Ok(conn)
}
