use lotto_core::{FilledTicket, TicketSetting, WinRuleKind};
use std::collections::BTreeSet;

/// Decides whether a bet wins against a draw's winning subset.
pub trait WinRule: Send + Sync {
    fn name(&self) -> &'static str;

    fn is_win(&self, bet: &FilledTicket, winning: &[u32], setting: &TicketSetting) -> bool;
}

/// The bet's `multiplier_numbers` must match the main diagonal of the
/// winning subset laid out as a `size x size` grid, `size = count_number_row[0]`.
#[derive(Debug, Default, Clone, Copy)]
pub struct DiagonalMatch;

impl WinRule for DiagonalMatch {
    fn name(&self) -> &'static str {
        "diagonal"
    }

    fn is_win(&self, bet: &FilledTicket, winning: &[u32], setting: &TicketSetting) -> bool {
        let size = setting.count_number_row.grid_size();
        if size == 0 || bet.multiplier_numbers.len() != size {
            return false;
        }

        bet.multiplier_numbers
            .iter()
            .enumerate()
            .all(|(i, n)| winning.get(i * size + i) == Some(n))
    }
}

/// The bet's `filled_cell` must be exactly the winning subset, order ignored.
#[derive(Debug, Default, Clone, Copy)]
pub struct ExactSet;

impl WinRule for ExactSet {
    fn name(&self) -> &'static str {
        "exact_set"
    }

    fn is_win(&self, bet: &FilledTicket, winning: &[u32], _setting: &TicketSetting) -> bool {
        let picked: BTreeSet<u32> = bet.filled_cell.iter().copied().collect();
        let drawn: BTreeSet<u32> = winning.iter().copied().collect();
        !drawn.is_empty() && picked == drawn
    }
}

pub fn rule_for(kind: WinRuleKind) -> &'static dyn WinRule {
    match kind {
        WinRuleKind::Diagonal => &DiagonalMatch,
        WinRuleKind::ExactSet => &ExactSet,
    }
}

/// Price factor for the known multipliers; anything else pays at 1.
pub fn price_factor(multiplier: f64) -> f64 {
    const FACTORS: [(f64, f64); 3] = [(1.25, 2.5), (1.5, 3.0), (2.0, 4.0)];

    FACTORS
        .iter()
        .find(|(m, _)| (multiplier - m).abs() < 1e-9)
        .map(|(_, factor)| *factor)
        .unwrap_or(1.0)
}

/// `price × factor(multiplier) × multiplier`, rounded to cents.
pub fn payout(price_ticket: i64, multiplier: f64) -> i64 {
    (price_ticket as f64 * price_factor(multiplier) * multiplier).round() as i64
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use lotto_core::PoolShape;

    fn setting(rows: Vec<u32>) -> TicketSetting {
        TicketSetting {
            id: 1,
            time: None,
            price_ticket: 10_000,
            percent_fond: None,
            is_start: true,
            count_number_row: PoolShape::new(rows).unwrap(),
            count_fill_user: 9,
            win_rule: WinRuleKind::Diagonal,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn bet(filled_cell: Vec<u32>, multiplier_numbers: Vec<u32>) -> FilledTicket {
        FilledTicket {
            id: 1,
            id_user: 1,
            id_setting_ticket: 1,
            id_generated_ticket: None,
            created_at: Utc::now(),
            filled_cell,
            multiplier: 2.0,
            multiplier_numbers,
            stake: 10_000,
            id_history_operation: None,
            is_win: None,
        }
    }

    const WINNING: [u32; 9] = [2, 5, 9, 1, 4, 7, 3, 6, 8];

    #[test]
    fn test_diagonal_match_wins() {
        let setting = setting(vec![3]);
        assert!(DiagonalMatch.is_win(&bet(vec![], vec![2, 4, 8]), &WINNING, &setting));
        assert_eq!(payout(setting.price_ticket, 2.0), 10_000 * 4 * 2);
    }

    #[test]
    fn test_diagonal_mismatch_loses() {
        let setting = setting(vec![3]);
        assert!(!DiagonalMatch.is_win(&bet(vec![], vec![2, 4, 3]), &WINNING, &setting));
        assert!(!DiagonalMatch.is_win(&bet(vec![], vec![2, 4]), &WINNING, &setting));
        assert!(!DiagonalMatch.is_win(&bet(vec![], vec![2, 4, 8]), &WINNING[..5], &setting));
    }

    #[test]
    fn test_exact_set_ignores_order() {
        let setting = setting(vec![3, 3, 3]);
        let mut cells = WINNING.to_vec();
        cells.reverse();
        assert!(ExactSet.is_win(&bet(cells, vec![]), &WINNING, &setting));
        assert!(!ExactSet.is_win(&bet(vec![1, 2, 3], vec![]), &WINNING, &setting));
    }

    #[test]
    fn test_price_factors() {
        assert_eq!(price_factor(1.25), 2.5);
        assert_eq!(price_factor(1.5), 3.0);
        assert_eq!(price_factor(2.0), 4.0);
        assert_eq!(price_factor(3.0), 1.0);

        assert_eq!(payout(333, 1.25), 1_041);
        assert_eq!(payout(500, 3.0), 1_500);
        assert_eq!(rule_for(WinRuleKind::ExactSet).name(), "exact_set");
    }
}
