use crate::error::{LottoError, Result};
use crate::storage::{now_seconds, to_datetime, Storage};
use crate::types::{HistoryOperation, TransactionKind};
use rusqlite::{params, Connection, OptionalExtension};

/// Paging and filter for a user's ledger listing.
#[derive(Debug, Clone)]
pub struct HistoryQuery {
    pub page: u32,
    pub limit: u32,
    pub kind: Option<TransactionKind>,
}

impl Default for HistoryQuery {
    fn default() -> Self {
        Self {
            page: 1,
            limit: 10,
            kind: None,
        }
    }
}

pub struct LedgerStore<'a> {
    storage: &'a Storage,
}

impl<'a> LedgerStore<'a> {
    pub fn new(storage: &'a Storage) -> Self {
        Self { storage }
    }

    /// Newest first, `page` is 1-based.
    pub async fn history(&self, user_id: i64, query: &HistoryQuery) -> Result<Vec<HistoryOperation>> {
        if query.page == 0 || query.limit == 0 {
            return Err(LottoError::invalid_parameters(
                "page and limit must be greater than 0",
            ));
        }

        let conn = self.storage.get_connection().await;
        let offset = i64::from(query.page - 1) * i64::from(query.limit);

        let mut stmt = conn.prepare(
            "SELECT h.id, h.id_user, h.change, t.naim, h.is_successful, h.created_at
             FROM history_operation h
             JOIN type_transaction t ON t.id = h.type_transaction
             WHERE h.id_user = ?1 AND (?2 IS NULL OR t.naim = ?2)
             ORDER BY h.created_at DESC, h.id DESC
             LIMIT ?3 OFFSET ?4",
        )?;

        let operations = stmt
            .query_map(
                params![
                    user_id,
                    query.kind.map(|k| k.label()),
                    i64::from(query.limit),
                    offset
                ],
                |row| {
                    Ok(HistoryOperation {
                        id: row.get(0)?,
                        id_user: row.get(1)?,
                        change: row.get(2)?,
                        type_transaction: row.get(3)?,
                        is_successful: row.get(4)?,
                        created_at: to_datetime(row.get(5)?),
                    })
                },
            )?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(operations)
    }

    pub async fn count_by_kind(&self, kind: TransactionKind) -> Result<i64> {
        let conn = self.storage.get_connection().await;

        let count = conn.query_row(
            "SELECT COUNT(*) FROM history_operation h
             JOIN type_transaction t ON t.id = h.type_transaction
             WHERE t.naim = ?1",
            params![kind.label()],
            |row| row.get(0),
        )?;
        Ok(count)
    }
}

pub fn transaction_type_id(conn: &Connection, kind: TransactionKind) -> Result<i64> {
    label_id(conn, kind.label())
}

pub fn label_id(conn: &Connection, label: &str) -> Result<i64> {
    conn.query_row(
        "SELECT id FROM type_transaction WHERE naim = ?1",
        params![label],
        |row| row.get(0),
    )
    .optional()?
    .ok_or_else(|| LottoError::TransactionTypeMissing {
        label: label.to_string(),
    })
}

/// Register a ledger label; a no-op when it already exists.
pub fn ensure_label(conn: &Connection, label: &str) -> Result<()> {
    conn.execute(
        "INSERT OR IGNORE INTO type_transaction (naim) VALUES (?1)",
        params![label],
    )?;
    Ok(())
}

/// Append one ledger row and return its id.
pub fn append(conn: &Connection, user_id: i64, change: i64, kind: TransactionKind) -> Result<i64> {
    append_labeled(conn, user_id, change, kind.label())
}

/// Append a row under a label that is not one of the seeded kinds.
pub fn append_labeled(conn: &Connection, user_id: i64, change: i64, label: &str) -> Result<i64> {
    let type_id = label_id(conn, label)?;

    conn.execute(
        "INSERT INTO history_operation (id_user, change, type_transaction, is_successful, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        params![user_id, change, type_id, true, now_seconds().timestamp()],
    )?;

    Ok(conn.last_insert_rowid())
}
