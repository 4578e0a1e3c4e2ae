use crate::error::{LottoError, Result};
use crate::storage::{ledger_store, Storage};
use crate::types::{vip_ledger_label, NewVipOffer, VipOffer};
use rusqlite::{params, Connection, OptionalExtension, Row, TransactionBehavior};

pub struct VipStore<'a> {
    storage: &'a Storage,
}

impl<'a> VipStore<'a> {
    pub fn new(storage: &'a Storage) -> Self {
        Self { storage }
    }

    /// Create an offer together with the ledger label its purchases are booked under.
    pub async fn create_offer(&self, offer: &NewVipOffer) -> Result<VipOffer> {
        offer.validate()?;

        let mut conn = self.storage.get_connection().await;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        tx.execute(
            "INSERT INTO vip_cost (naim, price, count_day, category) VALUES (?1, ?2, ?3, ?4)",
            params![offer.naim, offer.price, offer.count_day, offer.category],
        )?;
        let id = tx.last_insert_rowid();
        ledger_store::ensure_label(&tx, &vip_ledger_label(&offer.naim))?;

        let created = load_offer(&tx, id)?.ok_or(LottoError::VipOfferNotFound { id })?;
        tx.commit()?;

        tracing::info!(
            "Created VIP offer '{}' ({} days, category {})",
            created.naim,
            created.count_day,
            created.category
        );
        Ok(created)
    }

    /// Shortest subscriptions first.
    pub async fn list_offers(&self) -> Result<Vec<VipOffer>> {
        let conn = self.storage.get_connection().await;

        let mut stmt = conn.prepare(
            "SELECT id, naim, price, count_day, category FROM vip_cost
             ORDER BY count_day ASC, id ASC",
        )?;
        let offers = stmt
            .query_map([], offer_from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(offers)
    }

    pub async fn load_offer(&self, id: i64) -> Result<VipOffer> {
        let conn = self.storage.get_connection().await;
        load_offer(&conn, id)?.ok_or(LottoError::VipOfferNotFound { id })
    }
}

pub fn load_offer(conn: &Connection, id: i64) -> Result<Option<VipOffer>> {
    let offer = conn
        .query_row(
            "SELECT id, naim, price, count_day, category FROM vip_cost WHERE id = ?1",
            params![id],
            offer_from_row,
        )
        .optional()?;
    Ok(offer)
}

fn offer_from_row(row: &Row<'_>) -> rusqlite::Result<VipOffer> {
    Ok(VipOffer {
        id: row.get(0)?,
        naim: row.get(1)?,
        price: row.get(2)?,
        count_day: row.get(3)?,
        category: row.get(4)?,
    })
}
