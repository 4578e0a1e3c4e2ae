use crate::error::{DrawError, Result};
use crate::rules::{payout, rule_for};
use lotto_core::storage::{account_store, ledger_store, ticket_store, Storage};
use lotto_core::{TicketSetting, TransactionKind};
use rusqlite::{Connection, TransactionBehavior};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Numbers produced for one draw.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DrawNumbers {
    /// Full drawn set.
    pub arr_number: Vec<u32>,
    /// Winning subset, `count_fill_user` long.
    pub arr_true_number: Vec<u32>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SettlementReport {
    pub setting_id: i64,
    pub draw_id: i64,
    pub settled: usize,
    pub winners: usize,
    pub total_payout: i64,
}

/// Records a draw and resolves every pending bet of its setting as one unit.
#[derive(Clone)]
pub struct SettlementEngine {
    storage: Arc<Storage>,
}

impl SettlementEngine {
    pub fn new(storage: Arc<Storage>) -> Self {
        Self { storage }
    }

    pub async fn settle(
        &self,
        setting: &TicketSetting,
        draw: &DrawNumbers,
    ) -> Result<SettlementReport> {
        let mut conn = self.storage.get_connection().await;

        let report = settle_in_transaction(&mut conn, setting, draw).map_err(|source| {
            DrawError::SettlementFailed {
                setting_id: setting.id,
                source,
            }
        })?;

        tracing::info!(
            "Draw {} for setting {}: {} bets settled, {} winners, {} paid",
            report.draw_id,
            report.setting_id,
            report.settled,
            report.winners,
            lotto_core::format_amount(report.total_payout)
        );
        Ok(report)
    }
}

// Dropping `tx` on any early return rolls the whole unit back.
fn settle_in_transaction(
    conn: &mut Connection,
    setting: &TicketSetting,
    draw: &DrawNumbers,
) -> lotto_core::Result<SettlementReport> {
    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

    let generated =
        ticket_store::insert_draw(&tx, setting.id, &draw.arr_number, &draw.arr_true_number)?;
    let rule = rule_for(setting.win_rule);

    let mut report = SettlementReport {
        setting_id: setting.id,
        draw_id: generated.id,
        ..SettlementReport::default()
    };

    for bet in ticket_store::pending_bets(&tx, setting.id)? {
        let won = rule.is_win(&bet, &draw.arr_true_number, setting);

        if won {
            let amount = payout(setting.price_ticket, bet.multiplier);
            account_store::credit(&tx, bet.id_user, amount)?;
            ledger_store::append(&tx, bet.id_user, amount, TransactionKind::LotteryWin)?;
            report.winners += 1;
            report.total_payout += amount;
            tracing::debug!("Bet {} won {} for user {}", bet.id, amount, bet.id_user);
        }

        ticket_store::resolve_bet(&tx, bet.id, generated.id, won)?;
        report.settled += 1;
    }

    tx.commit()?;
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use lotto_core::storage::{
        AccountStore, HistoryQuery, LedgerStore, SettingStore, TicketStore,
    };
    use lotto_core::types::{NewTicketSetting, PoolShape, WinRuleKind};
    use lotto_core::LottoError;

    struct Fixture {
        storage: Arc<Storage>,
        setting: TicketSetting,
        user_id: i64,
    }

    async fn fixture() -> Fixture {
        let storage = Arc::new(Storage::in_memory().await.unwrap());
        let setting = SettingStore::new(&storage)
            .create(&NewTicketSetting {
                time: Some("00:01:00".parse().unwrap()),
                price_ticket: 10_000,
                percent_fond: None,
                is_start: true,
                count_number_row: PoolShape::new(vec![3, 3, 3]).unwrap(),
                count_fill_user: 9,
                win_rule: WinRuleKind::Diagonal,
            })
            .await
            .unwrap();
        let user = AccountStore::new(&storage)
            .create_user("player", 0)
            .await
            .unwrap();

        Fixture {
            storage,
            setting,
            user_id: user.id,
        }
    }

    async fn pending_bet(fx: &Fixture, multiplier_numbers: Vec<u32>) -> i64 {
        let conn = fx.storage.get_connection().await;
        let op = ledger_store::append(&conn, fx.user_id, -10_000, TransactionKind::LotteryStake)
            .unwrap();
        ticket_store::insert_bet(
            &conn,
            &ticket_store::NewFilledTicket {
                id_user: fx.user_id,
                id_setting_ticket: fx.setting.id,
                filled_cell: vec![1, 2, 3, 4, 5, 6, 7, 8, 9],
                multiplier: 2.0,
                multiplier_numbers,
                stake: 10_000,
                id_history_operation: op,
            },
        )
        .unwrap()
        .id
    }

    fn draw() -> DrawNumbers {
        DrawNumbers {
            arr_number: (1..=9).collect(),
            arr_true_number: vec![2, 5, 9, 1, 4, 7, 3, 6, 8],
        }
    }

    async fn win_rows(fx: &Fixture) -> i64 {
        LedgerStore::new(&fx.storage)
            .count_by_kind(TransactionKind::LotteryWin)
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_winner_paid_loser_marked() {
        let fx = fixture().await;
        let loser = pending_bet(&fx, vec![2, 4, 3]).await;
        let winner = pending_bet(&fx, vec![2, 4, 8]).await;

        let engine = SettlementEngine::new(fx.storage.clone());
        let report = engine.settle(&fx.setting, &draw()).await.unwrap();
        assert_eq!(report.settled, 2);
        assert_eq!(report.winners, 1);
        assert_eq!(report.total_payout, 10_000 * 4 * 2);

        let tickets = TicketStore::new(&fx.storage);
        let lost = tickets.load_bet(loser).await.unwrap();
        let won = tickets.load_bet(winner).await.unwrap();
        assert_eq!(lost.is_win, Some(false));
        assert_eq!(won.is_win, Some(true));
        assert_eq!(won.id_generated_ticket, Some(report.draw_id));

        let user = AccountStore::new(&fx.storage).load(fx.user_id).await.unwrap();
        assert_eq!(user.balance_real, 80_000);
        assert_eq!(win_rows(&fx).await, 1);
    }

    #[tokio::test]
    async fn test_settlement_runs_once_per_bet() {
        let fx = fixture().await;
        pending_bet(&fx, vec![2, 4, 8]).await;

        let engine = SettlementEngine::new(fx.storage.clone());
        engine.settle(&fx.setting, &draw()).await.unwrap();
        let second = engine.settle(&fx.setting, &draw()).await.unwrap();

        assert_eq!(second.settled, 0);
        assert_eq!(second.total_payout, 0);
        assert_eq!(win_rows(&fx).await, 1);
        let user = AccountStore::new(&fx.storage).load(fx.user_id).await.unwrap();
        assert_eq!(user.balance_real, 80_000);
    }

    #[tokio::test]
    async fn test_failure_mid_settlement_rolls_back() {
        let fx = fixture().await;
        let loser = pending_bet(&fx, vec![9, 9, 9]).await;
        let winner = pending_bet(&fx, vec![2, 4, 8]).await;

        // The loser is resolved first; paying the winner then fails.
        {
            let conn = fx.storage.get_connection().await;
            conn.execute(
                "DELETE FROM type_transaction WHERE naim = 'lottery_win_real'",
                [],
            )
            .unwrap();
        }

        let engine = SettlementEngine::new(fx.storage.clone());
        let err = engine.settle(&fx.setting, &draw()).await.unwrap_err();
        match err {
            DrawError::SettlementFailed { setting_id, source } => {
                assert_eq!(setting_id, fx.setting.id);
                assert!(matches!(source, LottoError::TransactionTypeMissing { .. }));
            }
            other => panic!("unexpected error: {other}"),
        }

        let tickets = TicketStore::new(&fx.storage);
        assert!(tickets.list_draws(None, 10).await.unwrap().is_empty());
        assert_eq!(tickets.load_bet(loser).await.unwrap().is_win, None);
        assert_eq!(tickets.load_bet(winner).await.unwrap().is_win, None);
        assert_eq!(tickets.pending_count(fx.setting.id).await.unwrap(), 2);

        let user = AccountStore::new(&fx.storage).load(fx.user_id).await.unwrap();
        assert_eq!(user.balance_real, 0);
        let history = LedgerStore::new(&fx.storage)
            .history(fx.user_id, &HistoryQuery::default())
            .await
            .unwrap();
        assert!(history.iter().all(|op| op.change < 0));
    }

    #[tokio::test]
    async fn test_exact_set_rule() {
        let fx = fixture().await;
        let setting = SettingStore::new(&fx.storage)
            .update(
                fx.setting.id,
                &lotto_core::SettingUpdate {
                    win_rule: Some(WinRuleKind::ExactSet),
                    count_fill_user: Some(3),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        let bet_id = {
            let conn = fx.storage.get_connection().await;
            let op =
                ledger_store::append(&conn, fx.user_id, -10_000, TransactionKind::LotteryStake)
                    .unwrap();
            ticket_store::insert_bet(
                &conn,
                &ticket_store::NewFilledTicket {
                    id_user: fx.user_id,
                    id_setting_ticket: setting.id,
                    filled_cell: vec![7, 1, 4],
                    multiplier: 1.0,
                    multiplier_numbers: vec![],
                    stake: 10_000,
                    id_history_operation: op,
                },
            )
            .unwrap()
            .id
        };

        let draw = DrawNumbers {
            arr_number: (1..=9).collect(),
            arr_true_number: vec![4, 7, 1],
        };
        let report = SettlementEngine::new(fx.storage.clone())
            .settle(&setting, &draw)
            .await
            .unwrap();

        assert_eq!(report.winners, 1);
        assert_eq!(report.total_payout, 10_000);
        let bet = TicketStore::new(&fx.storage).load_bet(bet_id).await.unwrap();
        assert_eq!(bet.is_win, Some(true));
    }
}
