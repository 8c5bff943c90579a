use std::fs;
use std::path::Path;

use rusqlite::Connection;

use crate::error::{Result, StoreError};
use crate::migrations;

/// Open an existing or new database file and bring the schema up to date.
pub fn init_db(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|e| StoreError::io(parent, e))?;
    }
    let conn = open_db(path)?;
    migrations::run_migrations(&conn)?;
    Ok(())
}

/// Short-lived connection for a single operation.
pub fn open_db(path: &Path) -> Result<Connection> {
    let conn = Connection::open(path)?;
    configure_connection(&conn)?;
    Ok(conn)
}

fn configure_connection(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "PRAGMA journal_mode=WAL;
         PRAGMA busy_timeout=5000;",
    )?;
    Ok(())
}
