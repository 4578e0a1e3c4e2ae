use crate::error::{LottoError, Result};
use crate::storage::{decode_numbers, encode_numbers, now_seconds, to_datetime, Storage};
use crate::types::{Cadence, NewTicketSetting, PoolShape, SettingUpdate, TicketSetting};
use rusqlite::{params, Connection, OptionalExtension, Row};

const SETTING_COLUMNS: &str = "id, time, price_ticket, percent_fond, is_start, count_number_row,
     count_fill_user, win_rule, created_at, updated_at";

pub struct SettingStore<'a> {
    storage: &'a Storage,
}

impl<'a> SettingStore<'a> {
    pub fn new(storage: &'a Storage) -> Self {
        Self { storage }
    }

    pub async fn create(&self, new_setting: &NewTicketSetting) -> Result<TicketSetting> {
        new_setting.validate()?;

        let conn = self.storage.get_connection().await;
        let now = now_seconds();

        conn.execute(
            "INSERT INTO setting_ticket
             (time, price_ticket, percent_fond, is_start, count_number_row, count_fill_user,
              win_rule, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            params![
                new_setting.time.map(|t| t.to_string()),
                new_setting.price_ticket,
                new_setting.percent_fond,
                new_setting.is_start,
                encode_numbers(new_setting.count_number_row.rows())?,
                new_setting.count_fill_user,
                new_setting.win_rule.as_str(),
                now.timestamp(),
                now.timestamp(),
            ],
        )?;

        let setting = TicketSetting {
            id: conn.last_insert_rowid(),
            time: new_setting.time,
            price_ticket: new_setting.price_ticket,
            percent_fond: new_setting.percent_fond,
            is_start: new_setting.is_start,
            count_number_row: new_setting.count_number_row.clone(),
            count_fill_user: new_setting.count_fill_user,
            win_rule: new_setting.win_rule,
            created_at: now,
            updated_at: now,
        };

        tracing::info!(
            "Created ticket setting {} (cadence {:?}, shape {})",
            setting.id,
            setting.time.map(|t| t.to_string()),
            setting.count_number_row
        );
        Ok(setting)
    }

    /// Apply a partial update; the merged row is validated before it is written.
    pub async fn update(&self, id: i64, update: &SettingUpdate) -> Result<TicketSetting> {
        let conn = self.storage.get_connection().await;
        let tx = conn.unchecked_transaction()?;

        let mut setting = load_setting(&tx, id)?.ok_or(LottoError::SettingNotFound { id })?;
        update.apply_to(&mut setting)?;
        setting.updated_at = now_seconds();

        tx.execute(
            "UPDATE setting_ticket SET time = ?1, price_ticket = ?2, percent_fond = ?3,
                 is_start = ?4, count_number_row = ?5, count_fill_user = ?6, win_rule = ?7,
                 updated_at = ?8
             WHERE id = ?9",
            params![
                setting.time.map(|t| t.to_string()),
                setting.price_ticket,
                setting.percent_fond,
                setting.is_start,
                encode_numbers(setting.count_number_row.rows())?,
                setting.count_fill_user,
                setting.win_rule.as_str(),
                setting.updated_at.timestamp(),
                id,
            ],
        )?;

        tx.commit()?;

        tracing::info!("Updated ticket setting {}", id);
        Ok(setting)
    }

    pub async fn load(&self, id: i64) -> Result<TicketSetting> {
        self.find(id).await?.ok_or(LottoError::SettingNotFound { id })
    }

    pub async fn find(&self, id: i64) -> Result<Option<TicketSetting>> {
        let conn = self.storage.get_connection().await;
        load_setting(&conn, id)
    }

    pub async fn list(&self) -> Result<Vec<TicketSetting>> {
        let conn = self.storage.get_connection().await;
        query_settings(&conn, false)
    }

    pub async fn list_active(&self) -> Result<Vec<TicketSetting>> {
        let conn = self.storage.get_connection().await;
        query_settings(&conn, true)
    }
}

pub fn load_setting(conn: &Connection, id: i64) -> Result<Option<TicketSetting>> {
    let setting = conn
        .query_row(
            &format!("SELECT {} FROM setting_ticket WHERE id = ?1", SETTING_COLUMNS),
            params![id],
            setting_from_row,
        )
        .optional()?;
    Ok(setting)
}

fn query_settings(conn: &Connection, active_only: bool) -> Result<Vec<TicketSetting>> {
    let sql = if active_only {
        format!(
            "SELECT {} FROM setting_ticket WHERE is_start = 1 ORDER BY id",
            SETTING_COLUMNS
        )
    } else {
        format!("SELECT {} FROM setting_ticket ORDER BY id", SETTING_COLUMNS)
    };

    let mut stmt = conn.prepare(&sql)?;
    let settings = stmt
        .query_map([], setting_from_row)?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(settings)
}

fn setting_from_row(row: &Row<'_>) -> rusqlite::Result<TicketSetting> {
    let time: Option<String> = row.get(1)?;
    let rows_json: String = row.get(5)?;
    let win_rule: String = row.get(7)?;

    let time = time
        .map(|t| t.parse::<Cadence>())
        .transpose()
        .map_err(|_| {
            rusqlite::Error::InvalidColumnType(1, "time".to_string(), rusqlite::types::Type::Text)
        })?;

    let count_number_row = PoolShape::new(decode_numbers(5, "count_number_row", &rows_json)?)
        .map_err(|_| {
            rusqlite::Error::InvalidColumnType(
                5,
                "count_number_row".to_string(),
                rusqlite::types::Type::Text,
            )
        })?;

    let win_rule = win_rule.parse().map_err(|_| {
        rusqlite::Error::InvalidColumnType(7, "win_rule".to_string(), rusqlite::types::Type::Text)
    })?;

    Ok(TicketSetting {
        id: row.get(0)?,
        time,
        price_ticket: row.get(2)?,
        percent_fond: row.get(3)?,
        is_start: row.get(4)?,
        count_number_row,
        count_fill_user: row.get(6)?,
        win_rule,
        created_at: to_datetime(row.get(8)?),
        updated_at: to_datetime(row.get(9)?),
    })
}
