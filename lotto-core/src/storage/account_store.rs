use crate::error::{LottoError, Result};
use crate::storage::{ledger_store, now_seconds, to_datetime, vip_store, Storage};
use crate::types::{TransactionKind, UserInfo};
use chrono::Duration;
use rusqlite::{params, Connection, OptionalExtension, Row, TransactionBehavior};

const USER_COLUMNS: &str =
    "id, login, balance_real, balance_virtual, is_vip, vip_stop_date, category_vip, created_at";

pub struct AccountStore<'a> {
    storage: &'a Storage,
}

impl<'a> AccountStore<'a> {
    pub fn new(storage: &'a Storage) -> Self {
        Self { storage }
    }

    /// Create a user; an opening balance is booked as a deposit.
    pub async fn create_user(&self, login: &str, opening_balance: i64) -> Result<UserInfo> {
        if login.trim().is_empty() {
            return Err(LottoError::invalid_parameters("login cannot be empty"));
        }
        if opening_balance < 0 {
            return Err(LottoError::invalid_parameters(
                "opening balance cannot be negative",
            ));
        }

        let mut conn = self.storage.get_connection().await;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let now = now_seconds();

        tx.execute(
            "INSERT INTO user_info (login, balance_real, balance_virtual, created_at)
             VALUES (?1, 0, 0, ?2)",
            params![login, now.timestamp()],
        )?;
        let id = tx.last_insert_rowid();

        if opening_balance > 0 {
            credit(&tx, id, opening_balance)?;
            ledger_store::append(&tx, id, opening_balance, TransactionKind::Deposit)?;
        }

        let user = load_user(&tx, id)?.ok_or(LottoError::UserNotFound { id })?;
        tx.commit()?;

        tracing::info!("Created user '{}' with ID: {}", login, id);
        Ok(user)
    }

    pub async fn load(&self, id: i64) -> Result<UserInfo> {
        let conn = self.storage.get_connection().await;
        load_user(&conn, id)?.ok_or(LottoError::UserNotFound { id })
    }

    pub async fn find_by_login(&self, login: &str) -> Result<Option<UserInfo>> {
        let conn = self.storage.get_connection().await;
        let user = conn
            .query_row(
                &format!("SELECT {} FROM user_info WHERE login = ?1", USER_COLUMNS),
                params![login],
                user_from_row,
            )
            .optional()?;
        Ok(user)
    }

    pub async fn list(&self) -> Result<Vec<UserInfo>> {
        let conn = self.storage.get_connection().await;

        let mut stmt =
            conn.prepare(&format!("SELECT {} FROM user_info ORDER BY id", USER_COLUMNS))?;
        let users = stmt
            .query_map([], user_from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(users)
    }

    /// Credit the real balance and book the matching ledger row atomically.
    pub async fn deposit(&self, id: i64, amount: i64) -> Result<UserInfo> {
        if amount <= 0 {
            return Err(LottoError::invalid_parameters(
                "deposit amount must be greater than 0",
            ));
        }

        let mut conn = self.storage.get_connection().await;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        credit(&tx, id, amount)?;
        ledger_store::append(&tx, id, amount, TransactionKind::Deposit)?;
        let user = load_user(&tx, id)?.ok_or(LottoError::UserNotFound { id })?;

        tx.commit()?;

        tracing::info!("Deposited {} to user {}", amount, id);
        Ok(user)
    }

    /// Credit the virtual (bonus) balance with a `deposit_virtual` ledger row.
    pub async fn deposit_bonus(&self, id: i64, amount: i64) -> Result<UserInfo> {
        if amount <= 0 {
            return Err(LottoError::invalid_parameters(
                "bonus amount must be greater than 0",
            ));
        }

        let mut conn = self.storage.get_connection().await;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let updated = tx.execute(
            "UPDATE user_info SET balance_virtual = balance_virtual + ?1 WHERE id = ?2",
            params![amount, id],
        )?;
        if updated == 0 {
            return Err(LottoError::UserNotFound { id });
        }
        ledger_store::append(&tx, id, amount, TransactionKind::BonusDeposit)?;
        let user = load_user(&tx, id)?.ok_or(LottoError::UserNotFound { id })?;

        tx.commit()?;

        tracing::info!("Credited bonus {} to user {}", amount, id);
        Ok(user)
    }

    /// Buy a VIP subscription from the virtual balance.
    ///
    /// Runs as one `IMMEDIATE` transaction: the debit, the new VIP period and
    /// the ledger row under the offer's label land together or not at all.
    /// Buying a lower category than the one currently active fails with
    /// [`LottoError::VipDowngrade`] unless `confirm_downgrade` is set.
    /// The new period starts now and replaces any remaining one.
    pub async fn buy_vip(
        &self,
        user_id: i64,
        offer_id: i64,
        confirm_downgrade: bool,
    ) -> Result<UserInfo> {
        let mut conn = self.storage.get_connection().await;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let user = load_user(&tx, user_id)?.ok_or(LottoError::UserNotFound { id: user_id })?;
        let offer = vip_store::load_offer(&tx, offer_id)?
            .ok_or(LottoError::VipOfferNotFound { id: offer_id })?;

        let now = now_seconds();
        if let Some(current) = user.active_vip_category(now) {
            if offer.category < current && !confirm_downgrade {
                return Err(LottoError::VipDowngrade {
                    current,
                    requested: offer.category,
                });
            }
        }

        debit_virtual(&tx, user_id, offer.price)?;
        let stop = now + Duration::days(i64::from(offer.count_day));
        tx.execute(
            "UPDATE user_info SET is_vip = 1, vip_stop_date = ?1, category_vip = ?2
             WHERE id = ?3",
            params![stop.timestamp(), offer.category, user_id],
        )?;
        ledger_store::append_labeled(&tx, user_id, -offer.price, &offer.ledger_label())?;

        let updated = load_user(&tx, user_id)?.ok_or(LottoError::UserNotFound { id: user_id })?;
        tx.commit()?;

        tracing::info!(
            "User {} bought VIP '{}' (category {}) until {}",
            user_id,
            offer.naim,
            offer.category,
            stop
        );
        Ok(updated)
    }
}

pub fn load_user(conn: &Connection, id: i64) -> Result<Option<UserInfo>> {
    let user = conn
        .query_row(
            &format!("SELECT {} FROM user_info WHERE id = ?1", USER_COLUMNS),
            params![id],
            user_from_row,
        )
        .optional()?;
    Ok(user)
}

/// Relative update, so concurrent writers cannot lose each other's changes.
pub fn credit(conn: &Connection, id: i64, amount: i64) -> Result<()> {
    let updated = conn.execute(
        "UPDATE user_info SET balance_real = balance_real + ?1 WHERE id = ?2",
        params![amount, id],
    )?;

    if updated == 0 {
        return Err(LottoError::UserNotFound { id });
    }
    Ok(())
}

/// Debit only if the balance covers `amount`.
pub fn debit(conn: &Connection, id: i64, amount: i64) -> Result<()> {
    let updated = conn.execute(
        "UPDATE user_info SET balance_real = balance_real - ?1
         WHERE id = ?2 AND balance_real >= ?1",
        params![amount, id],
    )?;

    if updated == 0 {
        let user = load_user(conn, id)?.ok_or(LottoError::UserNotFound { id })?;
        return Err(LottoError::InsufficientFunds {
            need: amount,
            available: user.balance_real,
        });
    }
    Ok(())
}

/// Virtual-balance counterpart of [`debit`].
pub fn debit_virtual(conn: &Connection, id: i64, amount: i64) -> Result<()> {
    let updated = conn.execute(
        "UPDATE user_info SET balance_virtual = balance_virtual - ?1
         WHERE id = ?2 AND balance_virtual >= ?1",
        params![amount, id],
    )?;

    if updated == 0 {
        let user = load_user(conn, id)?.ok_or(LottoError::UserNotFound { id })?;
        return Err(LottoError::InsufficientFunds {
            need: amount,
            available: user.balance_virtual,
        });
    }
    Ok(())
}

fn user_from_row(row: &Row<'_>) -> rusqlite::Result<UserInfo> {
    let vip_stop_date: Option<i64> = row.get(5)?;

    Ok(UserInfo {
        id: row.get(0)?,
        login: row.get(1)?,
        balance_real: row.get(2)?,
        balance_virtual: row.get(3)?,
        is_vip: row.get(4)?,
        vip_stop_date: vip_stop_date.map(to_datetime),
        category_vip: row.get(6)?,
        created_at: to_datetime(row.get(7)?),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{HistoryQuery, LedgerStore, VipStore};
    use crate::types::NewVipOffer;

    #[tokio::test]
    async fn test_create_with_opening_balance() {
        let storage = Storage::in_memory().await.unwrap();
        let accounts = AccountStore::new(&storage);

        let user = accounts.create_user("alice", 5_000).await.unwrap();
        assert_eq!(user.balance_real, 5_000);

        let history = LedgerStore::new(&storage)
            .history(user.id, &HistoryQuery::default())
            .await
            .unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].change, 5_000);
        assert_eq!(history[0].type_transaction, "deposit_real");
    }

    #[tokio::test]
    async fn test_duplicate_login_rejected() {
        let storage = Storage::in_memory().await.unwrap();
        let accounts = AccountStore::new(&storage);

        accounts.create_user("bob", 0).await.unwrap();
        assert!(matches!(
            accounts.create_user("bob", 0).await,
            Err(LottoError::Storage(_))
        ));
    }

    #[tokio::test]
    async fn test_debit_guard() {
        let storage = Storage::in_memory().await.unwrap();
        let accounts = AccountStore::new(&storage);
        let user = accounts.create_user("carol", 1_000).await.unwrap();

        {
            let conn = storage.get_connection().await;
            let err = debit(&conn, user.id, 1_500).unwrap_err();
            assert!(matches!(
                err,
                LottoError::InsufficientFunds {
                    need: 1_500,
                    available: 1_000
                }
            ));
            debit(&conn, user.id, 400).unwrap();
            assert!(matches!(
                credit(&conn, 999, 1),
                Err(LottoError::UserNotFound { id: 999 })
            ));
        }

        assert_eq!(accounts.load(user.id).await.unwrap().balance_real, 600);
    }

    #[tokio::test]
    async fn test_history_paging_and_filter() {
        let storage = Storage::in_memory().await.unwrap();
        let accounts = AccountStore::new(&storage);
        let user = accounts.create_user("dave", 100).await.unwrap();
        for _ in 0..4 {
            accounts.deposit(user.id, 100).await.unwrap();
        }

        let ledger = LedgerStore::new(&storage);
        let page = HistoryQuery {
            page: 2,
            limit: 2,
            kind: Some(TransactionKind::Deposit),
        };
        assert_eq!(ledger.history(user.id, &page).await.unwrap().len(), 2);

        let stakes = HistoryQuery {
            kind: Some(TransactionKind::LotteryStake),
            ..HistoryQuery::default()
        };
        assert!(ledger.history(user.id, &stakes).await.unwrap().is_empty());
        assert_eq!(accounts.load(user.id).await.unwrap().balance_real, 500);
    }

    async fn vip_fixture(storage: &Storage) -> (i64, i64, i64) {
        let vip = VipStore::new(storage);
        let bronze = vip
            .create_offer(&NewVipOffer {
                naim: "bronze".to_string(),
                price: 1_000,
                count_day: 7,
                category: 1,
            })
            .await
            .unwrap();
        let gold = vip
            .create_offer(&NewVipOffer {
                naim: "gold".to_string(),
                price: 3_000,
                count_day: 30,
                category: 3,
            })
            .await
            .unwrap();
        let user = AccountStore::new(storage)
            .create_user("grace", 10_000)
            .await
            .unwrap();
        (user.id, bronze.id, gold.id)
    }

    #[tokio::test]
    async fn test_buy_vip_debits_virtual_balance() {
        let storage = Storage::in_memory().await.unwrap();
        let (user_id, _, gold_id) = vip_fixture(&storage).await;
        let accounts = AccountStore::new(&storage);
        accounts.deposit_bonus(user_id, 5_000).await.unwrap();

        let before = now_seconds();
        let user = accounts.buy_vip(user_id, gold_id, false).await.unwrap();
        assert_eq!(user.balance_virtual, 2_000);
        assert_eq!(user.balance_real, 10_000);
        assert!(user.is_vip);
        assert_eq!(user.category_vip, Some(3));
        assert_eq!(user.active_vip_category(before), Some(3));
        let stop = user.vip_stop_date.unwrap();
        assert!(stop >= before + Duration::days(30));

        let history = LedgerStore::new(&storage)
            .history(user_id, &HistoryQuery::default())
            .await
            .unwrap();
        assert_eq!(history[0].change, -3_000);
        assert_eq!(history[0].type_transaction, "vip_purchase_gold");
    }

    #[tokio::test]
    async fn test_buy_vip_without_funds_changes_nothing() {
        let storage = Storage::in_memory().await.unwrap();
        let (user_id, _, gold_id) = vip_fixture(&storage).await;
        let accounts = AccountStore::new(&storage);
        accounts.deposit_bonus(user_id, 2_999).await.unwrap();

        assert!(matches!(
            accounts.buy_vip(user_id, gold_id, false).await,
            Err(LottoError::InsufficientFunds {
                need: 3_000,
                available: 2_999
            })
        ));
        let user = accounts.load(user_id).await.unwrap();
        assert_eq!(user.balance_virtual, 2_999);
        assert!(!user.is_vip);
        assert_eq!(user.vip_stop_date, None);

        assert!(matches!(
            accounts.buy_vip(user_id, 99, false).await,
            Err(LottoError::VipOfferNotFound { id: 99 })
        ));
    }

    #[tokio::test]
    async fn test_downgrade_needs_confirmation() {
        let storage = Storage::in_memory().await.unwrap();
        let (user_id, bronze_id, gold_id) = vip_fixture(&storage).await;
        let accounts = AccountStore::new(&storage);
        accounts.deposit_bonus(user_id, 10_000).await.unwrap();
        accounts.buy_vip(user_id, gold_id, false).await.unwrap();

        assert!(matches!(
            accounts.buy_vip(user_id, bronze_id, false).await,
            Err(LottoError::VipDowngrade {
                current: 3,
                requested: 1
            })
        ));
        assert_eq!(accounts.load(user_id).await.unwrap().balance_virtual, 7_000);

        let user = accounts.buy_vip(user_id, bronze_id, true).await.unwrap();
        assert_eq!(user.category_vip, Some(1));
        assert_eq!(user.balance_virtual, 6_000);
    }
}
