use anyhow::{Context, Result};
use rusqlite::Connection;
use std::sync::{Arc, Mutex};

/// Shared handle to the price cache. Cloning is cheap; all clones use the
/// same connection.
#[derive(Clone)]
pub struct Database {
    conn: Arc<Mutex<Connection>>,
}

impl Database {
    pub fn new(db_path: &str) -> Result<Self> {
        let db_path = db_path.strip_prefix("sqlite:").unwrap_or(db_path);
        let conn = Connection::open(db_path).context("Failed to open database")?;

        let db = Database {
            conn: Arc::new(Mutex::new(conn)),
        };
        db.create_tables()?;
        Ok(db)
    }

    pub fn in_memory() -> Result<Self> {
        Self::new(":memory:")
    }

    /// Runs `f` with exclusive access to the connection. Blocking; call from
    /// `spawn_blocking` when on the async runtime.
    pub fn with_conn<T>(&self, f: impl FnOnce(&Connection) -> Result<T>) -> Result<T> {
        let conn = self
            .conn
            .lock()
            .map_err(|_| anyhow::anyhow!("Database connection mutex poisoned"))?;
        f(&conn)
    }

    fn create_tables(&self) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "CREATE TABLE IF NOT EXISTS tokens (
                    chain_id INTEGER NOT NULL,
                    address TEXT NOT NULL,
                    symbol TEXT NOT NULL,
                    name TEXT NOT NULL,
                    decimals INTEGER NOT NULL,
                    discovered_at INTEGER NOT NULL,
                    PRIMARY KEY (chain_id, address)
                )",
                [],
            )?;

            conn.execute(
                "CREATE TABLE IF NOT EXISTS prices (
                    chain_id INTEGER NOT NULL,
                    address TEXT NOT NULL,
                    price REAL NOT NULL,
                    symbol TEXT,
                    source TEXT,
                    updated_at INTEGER NOT NULL,
                    PRIMARY KEY (chain_id, address)
                )",
                [],
            )?;

            conn.execute(
                "CREATE INDEX IF NOT EXISTS idx_prices_updated_at
                 ON prices(updated_at)",
                [],
            )?;

            Ok(())
        })
    }
}
