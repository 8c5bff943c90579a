use rusqlite::Connection;

use crate::error::Result;

pub fn run_migrations(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS tasks (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            chat_id INTEGER NOT NULL,
            title TEXT NOT NULL,
            description TEXT,
            context TEXT,
            due_at TEXT,
            added_at TEXT,
            status TEXT NOT NULL DEFAULT 'open',
            priority REAL NOT NULL DEFAULT 0,
            est_minutes INTEGER,
            source TEXT
        );

        CREATE TABLE IF NOT EXISTS kv (
            key TEXT PRIMARY KEY,
            value TEXT NOT NULL,
            updated_at TEXT NOT NULL DEFAULT (datetime('now'))
        );

        CREATE INDEX IF NOT EXISTS idx_tasks_chat_status ON tasks(chat_id, status);
        CREATE INDEX IF NOT EXISTS idx_tasks_due_at ON tasks(due_at);
        ",
    )?;
    Ok(())
}
