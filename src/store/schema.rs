use rusqlite::{Connection, Result};

/// Current schema version, tracked with `PRAGMA user_version`
pub const SCHEMA_VERSION: i32 = 1;

/// Create the state tables if they do not exist
pub fn initialize_schema(conn: &Connection) -> Result<()> {
    // Integer progress markers, e.g. ERC20_last_block. Stored as text so a
    // value written by another tool can be detected as corrupt.
    conn.execute(
        "CREATE TABLE IF NOT EXISTS checkpoints (
            key TEXT PRIMARY KEY,
            value TEXT NOT NULL,
            updated_at INTEGER DEFAULT (strftime('%s', 'now'))
        )",
        [],
    )?;

    // Members are read back in rowid order, which is insertion order
    conn.execute(
        "CREATE TABLE IF NOT EXISTS pending_transactions (
            set_key TEXT NOT NULL,
            tx_hash TEXT NOT NULL,
            added_at INTEGER DEFAULT (strftime('%s', 'now')),
            PRIMARY KEY (set_key, tx_hash)
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS dead_letter_blocks (
            dl_key TEXT NOT NULL,
            block_number INTEGER NOT NULL,
            attempts INTEGER NOT NULL,
            last_error TEXT NOT NULL,
            recorded_at INTEGER NOT NULL,
            PRIMARY KEY (dl_key, block_number)
        )",
        [],
    )?;

    Ok(())
}

/// Bring an existing database up to `SCHEMA_VERSION`
pub fn run_migrations(conn: &Connection) -> Result<()> {
    let version: i32 = conn.query_row("PRAGMA user_version", [], |row| row.get(0))?;
    if version < SCHEMA_VERSION {
        initialize_schema(conn)?;
        conn.execute_batch(&format!("PRAGMA user_version = {}", SCHEMA_VERSION))?;
    }
    Ok(())
}
