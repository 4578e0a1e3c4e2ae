use crate::error::{DrawError, Result};
use lotto_core::storage::{account_store, ledger_store, setting_store, ticket_store, Storage};
use lotto_core::{FilledTicket, LottoError, TicketSetting, TransactionKind, WinRuleKind};
use rusqlite::TransactionBehavior;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::Arc;

/// A user's wager on the next draw of a setting.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BetRequest {
    pub setting_id: i64,
    /// Picked cells, exactly `count_fill_user` unique values.
    pub filled_cell: Vec<u32>,
    /// Diagonal guess; empty when the bet only plays the cells.
    #[serde(default)]
    pub multiplier_numbers: Vec<u32>,
    pub multiplier: f64,
    pub price_multiplier: f64,
}

/// Accepts bets: stake debit, stake ledger row and pending bet in one transaction.
#[derive(Clone)]
pub struct BetDesk {
    storage: Arc<Storage>,
}

impl BetDesk {
    pub fn new(storage: Arc<Storage>) -> Self {
        Self { storage }
    }

    pub async fn place_bet(&self, user_id: i64, request: &BetRequest) -> Result<FilledTicket> {
        if !(request.multiplier.is_finite() && request.multiplier > 0.0)
            || !(request.price_multiplier.is_finite() && request.price_multiplier > 0.0)
        {
            return Err(DrawError::bet_rejected(
                "multiplier and price_multiplier must be positive numbers",
            ));
        }

        let mut conn = self.storage.get_connection().await;
        let tx = conn
            .transaction_with_behavior(TransactionBehavior::Immediate)
            .map_err(LottoError::from)?;

        let setting = setting_store::load_setting(&tx, request.setting_id)?.ok_or(
            LottoError::SettingNotFound {
                id: request.setting_id,
            },
        )?;
        if !setting.is_start {
            return Err(DrawError::SettingInactive(setting.id));
        }
        validate_numbers(&setting, request)?;

        let stake = (setting.price_ticket as f64 * request.price_multiplier).round() as i64;
        if stake <= 0 {
            return Err(DrawError::bet_rejected("stake rounds to zero"));
        }

        account_store::debit(&tx, user_id, stake)?;
        let operation_id = ledger_store::append(&tx, user_id, -stake, TransactionKind::LotteryStake)?;
        let bet = ticket_store::insert_bet(
            &tx,
            &ticket_store::NewFilledTicket {
                id_user: user_id,
                id_setting_ticket: setting.id,
                filled_cell: request.filled_cell.clone(),
                multiplier: request.multiplier,
                multiplier_numbers: request.multiplier_numbers.clone(),
                stake,
                id_history_operation: operation_id,
            },
        )?;

        tx.commit().map_err(LottoError::from)?;

        tracing::info!(
            "User {} placed bet {} on setting {} (stake {})",
            user_id,
            bet.id,
            setting.id,
            lotto_core::format_amount(stake)
        );
        Ok(bet)
    }

    /// A user's bets, newest first.
    pub async fn user_tickets(&self, user_id: i64) -> Result<Vec<FilledTicket>> {
        let tickets = ticket_store::TicketStore::new(&self.storage)
            .user_tickets(user_id)
            .await?;
        Ok(tickets)
    }
}

fn validate_numbers(setting: &TicketSetting, request: &BetRequest) -> Result<()> {
    let total = setting.count_number_row.total();
    let fill = setting.count_fill_user as usize;

    if request.filled_cell.len() != fill {
        return Err(DrawError::bet_rejected(format!(
            "expected {} numbers in filled_cell, got {}",
            fill,
            request.filled_cell.len()
        )));
    }
    let unique: HashSet<u32> = request.filled_cell.iter().copied().collect();
    if unique.len() != fill {
        return Err(DrawError::bet_rejected("filled_cell numbers must be unique"));
    }
    if let Some(n) = request.filled_cell.iter().find(|n| !(1..=total).contains(*n)) {
        return Err(DrawError::bet_rejected(format!(
            "number {} in filled_cell is outside 1..={}",
            n, total
        )));
    }

    if !request.multiplier_numbers.is_empty() {
        let size = setting.count_number_row.grid_size();
        // The last diagonal cell sits at index size*size - 1 of the winning subset.
        let needed = size.saturating_mul(size);
        if setting.win_rule == WinRuleKind::Diagonal && fill < needed {
            return Err(DrawError::bet_rejected(format!(
                "setting {} draws {} winning numbers, a {}x{} diagonal needs {}",
                setting.id, fill, size, size, needed
            )));
        }
        if request.multiplier_numbers.len() != size {
            return Err(DrawError::bet_rejected(format!(
                "expected {} diagonal numbers, got {}",
                size,
                request.multiplier_numbers.len()
            )));
        }
        if let Some(n) = request
            .multiplier_numbers
            .iter()
            .find(|n| !(1..=total).contains(*n))
        {
            return Err(DrawError::bet_rejected(format!(
                "diagonal number {} is outside 1..={}",
                n, total
            )));
        }
    }

    Ok(())
}
