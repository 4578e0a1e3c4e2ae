pub mod account_store;
pub mod ledger_store;
pub mod setting_store;
pub mod ticket_store;
pub mod vip_store;

pub use account_store::AccountStore;
pub use ledger_store::{HistoryQuery, LedgerStore};
pub use setting_store::SettingStore;
pub use ticket_store::TicketStore;
pub use vip_store::VipStore;

use crate::config::EngineConfig;
use crate::error::{LottoError, Result};
use crate::types::TransactionKind;
use chrono::{DateTime, Utc};
use rusqlite::Connection;
use std::path::Path;
use std::time::Duration;
use tokio::sync::Mutex;

pub struct Storage {
    conn: Mutex<Connection>,
}

impl Storage {
    pub async fn new(db_path: &Path, busy_timeout: Duration) -> Result<Self> {
        // Create parent directory if it doesn't exist
        if let Some(parent) = db_path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| LottoError::internal(format!("Failed to create directory: {}", e)))?;
        }

        let conn = Connection::open(db_path)?;
        conn.busy_timeout(busy_timeout)?;
        let mode: String =
            conn.pragma_update_and_check(None, "journal_mode", "WAL", |row| row.get(0))?;
        tracing::debug!("Opened {} (journal_mode={})", db_path.display(), mode);

        Self::from_connection(conn).await
    }

    pub async fn open(config: &EngineConfig) -> Result<Self> {
        Self::new(&config.database_path(), config.storage.busy_timeout()).await
    }

    /// Private in-memory database, used by tests and dry runs.
    pub async fn in_memory() -> Result<Self> {
        Self::from_connection(Connection::open_in_memory()?).await
    }

    async fn from_connection(conn: Connection) -> Result<Self> {
        conn.pragma_update(None, "foreign_keys", true)?;

        let storage = Self {
            conn: Mutex::new(conn),
        };

        storage.init_schema().await?;
        storage.seed_transaction_types().await?;
        Ok(storage)
    }

    async fn init_schema(&self) -> Result<()> {
        let conn = self.conn.lock().await;

        // Accounts
        conn.execute(
            "CREATE TABLE IF NOT EXISTS user_info (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                login TEXT UNIQUE NOT NULL,
                balance_real INTEGER NOT NULL DEFAULT 0 CHECK (balance_real >= 0),
                balance_virtual INTEGER NOT NULL DEFAULT 0 CHECK (balance_virtual >= 0),
                is_vip INTEGER NOT NULL DEFAULT 0,
                vip_stop_date INTEGER,
                category_vip INTEGER,
                created_at INTEGER NOT NULL
            )",
            [],
        )?;

        // Ledger labels
        conn.execute(
            "CREATE TABLE IF NOT EXISTS type_transaction (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                naim TEXT UNIQUE NOT NULL
            )",
            [],
        )?;

        // Ledger
        conn.execute(
            "CREATE TABLE IF NOT EXISTS history_operation (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                id_user INTEGER NOT NULL,
                change INTEGER NOT NULL,
                type_transaction INTEGER NOT NULL,
                is_successful INTEGER NOT NULL,
                created_at INTEGER NOT NULL,
                FOREIGN KEY (id_user) REFERENCES user_info(id),
                FOREIGN KEY (type_transaction) REFERENCES type_transaction(id)
            )",
            [],
        )?;

        // VIP offers
        conn.execute(
            "CREATE TABLE IF NOT EXISTS vip_cost (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                naim TEXT UNIQUE NOT NULL,
                price INTEGER NOT NULL CHECK (price > 0),
                count_day INTEGER NOT NULL CHECK (count_day > 0),
                category INTEGER NOT NULL
            )",
            [],
        )?;

        // Ticket settings
        conn.execute(
            "CREATE TABLE IF NOT EXISTS setting_ticket (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                time TEXT,
                price_ticket INTEGER NOT NULL,
                percent_fond REAL,
                is_start INTEGER NOT NULL,
                count_number_row TEXT NOT NULL,
                count_fill_user INTEGER NOT NULL,
                win_rule TEXT NOT NULL,
                created_at INTEGER NOT NULL,
                updated_at INTEGER NOT NULL
            )",
            [],
        )?;

        // Draws
        conn.execute(
            "CREATE TABLE IF NOT EXISTS generated_ticket (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                id_setting_ticket INTEGER NOT NULL,
                generated_at INTEGER NOT NULL,
                arr_number TEXT NOT NULL,
                arr_true_number TEXT NOT NULL,
                FOREIGN KEY (id_setting_ticket) REFERENCES setting_ticket(id)
            )",
            [],
        )?;

        // Bets
        conn.execute(
            "CREATE TABLE IF NOT EXISTS filled_ticket (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                id_user INTEGER NOT NULL,
                id_setting_ticket INTEGER NOT NULL,
                id_generated_ticket INTEGER,
                created_at INTEGER NOT NULL,
                filled_cell TEXT NOT NULL,
                multiplier REAL NOT NULL,
                multiplier_numbers TEXT NOT NULL,
                stake INTEGER NOT NULL,
                id_history_operation INTEGER,
                is_win INTEGER,
                FOREIGN KEY (id_user) REFERENCES user_info(id),
                FOREIGN KEY (id_setting_ticket) REFERENCES setting_ticket(id),
                FOREIGN KEY (id_generated_ticket) REFERENCES generated_ticket(id),
                FOREIGN KEY (id_history_operation) REFERENCES history_operation(id)
            )",
            [],
        )?;

        conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_filled_ticket_pending
             ON filled_ticket (id_setting_ticket, is_win)",
            [],
        )?;

        Ok(())
    }

    /// Labels are created once, up front, under the unique constraint on `naim`.
    async fn seed_transaction_types(&self) -> Result<()> {
        let conn = self.conn.lock().await;

        for kind in TransactionKind::ALL {
            ledger_store::ensure_label(&conn, kind.label())?;
        }

        Ok(())
    }

    pub async fn get_connection(&self) -> tokio::sync::MutexGuard<'_, Connection> {
        self.conn.lock().await
    }
}

/// Current time truncated to the second, matching what is persisted.
pub fn now_seconds() -> DateTime<Utc> {
    to_datetime(Utc::now().timestamp())
}

pub(crate) fn to_datetime(timestamp: i64) -> DateTime<Utc> {
    DateTime::from_timestamp(timestamp, 0).unwrap_or_else(Utc::now)
}

pub(crate) fn encode_numbers(numbers: &[u32]) -> Result<String> {
    Ok(serde_json::to_string(numbers)?)
}

pub(crate) fn decode_numbers(idx: usize, column: &str, raw: &str) -> rusqlite::Result<Vec<u32>> {
    serde_json::from_str(raw).map_err(|_| {
        rusqlite::Error::InvalidColumnType(idx, column.to_string(), rusqlite::types::Type::Text)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_transaction_types_seeded_once() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("lotto.db");

        {
            let storage = Storage::new(&path, Duration::from_secs(1)).await.unwrap();
            drop(storage);
        }
        let storage = Storage::new(&path, Duration::from_secs(1)).await.unwrap();

        let conn = storage.get_connection().await;
        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM type_transaction", [], |row| row.get(0))
            .unwrap();
        assert_eq!(count, TransactionKind::ALL.len() as i64);
    }

    #[test]
    fn test_decode_numbers_rejects_garbage() {
        assert_eq!(decode_numbers(0, "arr", "[1,2,3]").unwrap(), vec![1, 2, 3]);
        assert!(decode_numbers(0, "arr", "not json").is_err());
    }
}
