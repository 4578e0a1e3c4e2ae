use crate::error::{LottoError, Result};
use crate::storage::{decode_numbers, encode_numbers, now_seconds, to_datetime, Storage};
use crate::types::{FilledTicket, GeneratedTicket};
use rusqlite::{params, Connection, OptionalExtension, Row};

const DRAW_COLUMNS: &str = "id, id_setting_ticket, generated_at, arr_number, arr_true_number";

const BET_COLUMNS: &str = "id, id_user, id_setting_ticket, id_generated_ticket, created_at,
     filled_cell, multiplier, multiplier_numbers, stake, id_history_operation, is_win";

/// Insert payload for a bet; the stake ledger row is written first.
#[derive(Debug, Clone)]
pub struct NewFilledTicket {
    pub id_user: i64,
    pub id_setting_ticket: i64,
    pub filled_cell: Vec<u32>,
    pub multiplier: f64,
    pub multiplier_numbers: Vec<u32>,
    pub stake: i64,
    pub id_history_operation: i64,
}

pub struct TicketStore<'a> {
    storage: &'a Storage,
}

impl<'a> TicketStore<'a> {
    pub fn new(storage: &'a Storage) -> Self {
        Self { storage }
    }

    /// Draws newest first, optionally for one setting.
    pub async fn list_draws(&self, setting_id: Option<i64>, limit: u32) -> Result<Vec<GeneratedTicket>> {
        let conn = self.storage.get_connection().await;

        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM generated_ticket
             WHERE (?1 IS NULL OR id_setting_ticket = ?1)
             ORDER BY generated_at DESC, id DESC
             LIMIT ?2",
            DRAW_COLUMNS
        ))?;

        let draws = stmt
            .query_map(params![setting_id, i64::from(limit)], draw_from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(draws)
    }

    pub async fn load_draw(&self, id: i64) -> Result<Option<GeneratedTicket>> {
        let conn = self.storage.get_connection().await;
        let draw = conn
            .query_row(
                &format!("SELECT {} FROM generated_ticket WHERE id = ?1", DRAW_COLUMNS),
                params![id],
                draw_from_row,
            )
            .optional()?;
        Ok(draw)
    }

    /// Latest draw of every active setting.
    pub async fn current_draws(&self) -> Result<Vec<GeneratedTicket>> {
        let conn = self.storage.get_connection().await;

        let mut stmt = conn.prepare(
            "SELECT g.id, g.id_setting_ticket, g.generated_at, g.arr_number, g.arr_true_number
             FROM generated_ticket g
             JOIN setting_ticket s ON s.id = g.id_setting_ticket
             WHERE s.is_start = 1
               AND g.id = (SELECT MAX(id) FROM generated_ticket WHERE id_setting_ticket = s.id)
             ORDER BY s.id",
        )?;

        let draws = stmt
            .query_map([], draw_from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(draws)
    }

    pub async fn load_bet(&self, id: i64) -> Result<FilledTicket> {
        let conn = self.storage.get_connection().await;
        conn.query_row(
            &format!("SELECT {} FROM filled_ticket WHERE id = ?1", BET_COLUMNS),
            params![id],
            bet_from_row,
        )
        .optional()?
        .ok_or(LottoError::BetNotFound { id })
    }

    /// A user's bets, newest first.
    pub async fn user_tickets(&self, user_id: i64) -> Result<Vec<FilledTicket>> {
        let conn = self.storage.get_connection().await;

        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM filled_ticket WHERE id_user = ?1 ORDER BY created_at DESC, id DESC",
            BET_COLUMNS
        ))?;

        let bets = stmt
            .query_map(params![user_id], bet_from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(bets)
    }

    pub async fn pending_count(&self, setting_id: i64) -> Result<i64> {
        let conn = self.storage.get_connection().await;
        let count = conn.query_row(
            "SELECT COUNT(*) FROM filled_ticket WHERE id_setting_ticket = ?1 AND is_win IS NULL",
            params![setting_id],
            |row| row.get(0),
        )?;
        Ok(count)
    }
}

pub fn insert_draw(
    conn: &Connection,
    setting_id: i64,
    arr_number: &[u32],
    arr_true_number: &[u32],
) -> Result<GeneratedTicket> {
    let generated_at = now_seconds();

    conn.execute(
        "INSERT INTO generated_ticket (id_setting_ticket, generated_at, arr_number, arr_true_number)
         VALUES (?1, ?2, ?3, ?4)",
        params![
            setting_id,
            generated_at.timestamp(),
            encode_numbers(arr_number)?,
            encode_numbers(arr_true_number)?,
        ],
    )?;

    Ok(GeneratedTicket {
        id: conn.last_insert_rowid(),
        id_setting_ticket: setting_id,
        generated_at,
        arr_number: arr_number.to_vec(),
        arr_true_number: arr_true_number.to_vec(),
    })
}

/// All unresolved bets of a setting, in id order.
pub fn pending_bets(conn: &Connection, setting_id: i64) -> Result<Vec<FilledTicket>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {} FROM filled_ticket
         WHERE id_setting_ticket = ?1 AND is_win IS NULL
         ORDER BY id",
        BET_COLUMNS
    ))?;

    let bets = stmt
        .query_map(params![setting_id], bet_from_row)?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(bets)
}

/// Flip a pending bet to won/lost. Returns 0 if it was already resolved.
pub fn resolve_bet(conn: &Connection, bet_id: i64, draw_id: i64, is_win: bool) -> Result<usize> {
    let updated = conn.execute(
        "UPDATE filled_ticket SET is_win = ?1, id_generated_ticket = ?2
         WHERE id = ?3 AND is_win IS NULL",
        params![is_win, draw_id, bet_id],
    )?;
    Ok(updated)
}

pub fn insert_bet(conn: &Connection, bet: &NewFilledTicket) -> Result<FilledTicket> {
    let created_at = now_seconds();

    conn.execute(
        "INSERT INTO filled_ticket
         (id_user, id_setting_ticket, created_at, filled_cell, multiplier, multiplier_numbers,
          stake, id_history_operation, is_win)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, NULL)",
        params![
            bet.id_user,
            bet.id_setting_ticket,
            created_at.timestamp(),
            encode_numbers(&bet.filled_cell)?,
            bet.multiplier,
            encode_numbers(&bet.multiplier_numbers)?,
            bet.stake,
            bet.id_history_operation,
        ],
    )?;

    Ok(FilledTicket {
        id: conn.last_insert_rowid(),
        id_user: bet.id_user,
        id_setting_ticket: bet.id_setting_ticket,
        id_generated_ticket: None,
        created_at,
        filled_cell: bet.filled_cell.clone(),
        multiplier: bet.multiplier,
        multiplier_numbers: bet.multiplier_numbers.clone(),
        stake: bet.stake,
        id_history_operation: Some(bet.id_history_operation),
        is_win: None,
    })
}

fn draw_from_row(row: &Row<'_>) -> rusqlite::Result<GeneratedTicket> {
    let arr_number: String = row.get(3)?;
    let arr_true_number: String = row.get(4)?;

    Ok(GeneratedTicket {
        id: row.get(0)?,
        id_setting_ticket: row.get(1)?,
        generated_at: to_datetime(row.get(2)?),
        arr_number: decode_numbers(3, "arr_number", &arr_number)?,
        arr_true_number: decode_numbers(4, "arr_true_number", &arr_true_number)?,
    })
}

fn bet_from_row(row: &Row<'_>) -> rusqlite::Result<FilledTicket> {
    let filled_cell: String = row.get(5)?;
    let multiplier_numbers: String = row.get(7)?;

    Ok(FilledTicket {
        id: row.get(0)?,
        id_user: row.get(1)?,
        id_setting_ticket: row.get(2)?,
        id_generated_ticket: row.get(3)?,
        created_at: to_datetime(row.get(4)?),
        filled_cell: decode_numbers(5, "filled_cell", &filled_cell)?,
        multiplier: row.get(6)?,
        multiplier_numbers: decode_numbers(7, "multiplier_numbers", &multiplier_numbers)?,
        stake: row.get(8)?,
        id_history_operation: row.get(9)?,
        is_win: row.get(10)?,
    })
}
