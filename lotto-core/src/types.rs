use crate::error::{LottoError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

/// Recurring draw period written as `HH:mm:ss`.
///
/// The value is a fixed period, not a wall-clock target: `00:05:00` means
/// "every five minutes".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Cadence {
    hours: u32,
    minutes: u32,
    seconds: u32,
}

impl Cadence {
    pub fn new(hours: u32, minutes: u32, seconds: u32) -> Result<Self> {
        if hours > 23 || minutes > 59 || seconds > 59 {
            return Err(LottoError::invalid_parameters(format!(
                "cadence out of range: {:02}:{:02}:{:02}",
                hours, minutes, seconds
            )));
        }
        Ok(Self {
            hours,
            minutes,
            seconds,
        })
    }

    pub fn as_duration(&self) -> Duration {
        Duration::from_secs(u64::from(self.hours * 3600 + self.minutes * 60 + self.seconds))
    }

    pub fn as_millis(&self) -> u64 {
        self.as_duration().as_millis() as u64
    }

    pub fn is_positive(&self) -> bool {
        !self.as_duration().is_zero()
    }
}

impl FromStr for Cadence {
    type Err = LottoError;

    fn from_str(s: &str) -> Result<Self> {
        let invalid =
            || LottoError::invalid_parameters(format!("invalid cadence '{}', expected HH:mm:ss", s));

        let parts: Vec<&str> = s.split(':').collect();
        if parts.len() != 3 {
            return Err(invalid());
        }

        let mut values = [0u32; 3];
        for (slot, part) in values.iter_mut().zip(&parts) {
            if part.len() != 2 || !part.bytes().all(|b| b.is_ascii_digit()) {
                return Err(invalid());
            }
            *slot = part.parse().map_err(|_| invalid())?;
        }

        Self::new(values[0], values[1], values[2])
    }
}

impl fmt::Display for Cadence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}:{:02}:{:02}", self.hours, self.minutes, self.seconds)
    }
}

impl TryFrom<String> for Cadence {
    type Error = LottoError;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl From<Cadence> for String {
    fn from(value: Cadence) -> Self {
        value.to_string()
    }
}

/// Largest drawable pool a setting may declare. Every draw materialises the
/// whole pool, so this bounds the work and memory of a single tick.
pub const MAX_POOL_SIZE: u32 = 100_000;

/// `count_number_row`: sizes of the rows that make up the drawable pool.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "Vec<u32>", into = "Vec<u32>")]
pub struct PoolShape(Vec<u32>);

impl PoolShape {
    pub fn new(rows: Vec<u32>) -> Result<Self> {
        if rows.is_empty() {
            return Err(LottoError::invalid_parameters(
                "count_number_row must be a non-empty sequence",
            ));
        }
        if rows.iter().any(|&r| r == 0) {
            return Err(LottoError::invalid_parameters(
                "count_number_row entries must be positive",
            ));
        }

        let total = rows.iter().try_fold(0u32, |acc, &r| acc.checked_add(r));
        if total.map_or(true, |total| total > MAX_POOL_SIZE) {
            return Err(LottoError::invalid_parameters(format!(
                "count_number_row adds up to more than {} numbers",
                MAX_POOL_SIZE
            )));
        }

        Ok(Self(rows))
    }

    pub fn rows(&self) -> &[u32] {
        &self.0
    }

    /// Total pool size, the sum of all rows. Bounded by [`MAX_POOL_SIZE`].
    pub fn total(&self) -> u32 {
        self.0.iter().sum()
    }

    /// Side of the square grid used by the diagonal rule.
    pub fn grid_size(&self) -> usize {
        self.0.first().copied().unwrap_or(0) as usize
    }
}

impl TryFrom<Vec<u32>> for PoolShape {
    type Error = LottoError;

    fn try_from(value: Vec<u32>) -> Result<Self> {
        Self::new(value)
    }
}

impl From<PoolShape> for Vec<u32> {
    fn from(value: PoolShape) -> Self {
        value.0
    }
}

impl fmt::Display for PoolShape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let rows: Vec<String> = self.0.iter().map(|r| r.to_string()).collect();
        write!(f, "[{}]", rows.join(","))
    }
}

/// Which evaluation a setting's draws are settled with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WinRuleKind {
    #[default]
    Diagonal,
    ExactSet,
}

impl WinRuleKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            WinRuleKind::Diagonal => "diagonal",
            WinRuleKind::ExactSet => "exact_set",
        }
    }
}

impl FromStr for WinRuleKind {
    type Err = LottoError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "diagonal" => Ok(WinRuleKind::Diagonal),
            "exact_set" => Ok(WinRuleKind::ExactSet),
            other => Err(LottoError::invalid_parameters(format!(
                "unknown win rule '{}'",
                other
            ))),
        }
    }
}

/// Admin-defined lottery product (`setting_ticket`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TicketSetting {
    pub id: i64,
    pub time: Option<Cadence>,
    pub price_ticket: i64,
    pub percent_fond: Option<f64>,
    pub is_start: bool,
    pub count_number_row: PoolShape,
    pub count_fill_user: u32,
    pub win_rule: WinRuleKind,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TicketSetting {
    /// True when cadence or pool shape differ, i.e. the draw timer must be re-armed.
    pub fn schedule_differs(&self, other: &TicketSetting) -> bool {
        self.time != other.time || self.count_number_row != other.count_number_row
    }
}

/// Payload of an admin create action.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewTicketSetting {
    pub time: Option<Cadence>,
    pub price_ticket: i64,
    pub percent_fond: Option<f64>,
    pub is_start: bool,
    pub count_number_row: PoolShape,
    pub count_fill_user: u32,
    pub win_rule: WinRuleKind,
}

impl NewTicketSetting {
    pub fn validate(&self) -> Result<()> {
        validate_setting_fields(
            self.price_ticket,
            self.percent_fond,
            &self.count_number_row,
            self.count_fill_user,
        )
    }
}

/// Partial admin update; `None` keeps the stored value.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SettingUpdate {
    pub time: Option<Cadence>,
    pub price_ticket: Option<i64>,
    pub percent_fond: Option<f64>,
    pub is_start: Option<bool>,
    pub count_number_row: Option<PoolShape>,
    pub count_fill_user: Option<u32>,
    pub win_rule: Option<WinRuleKind>,
}

impl SettingUpdate {
    pub fn apply_to(&self, setting: &mut TicketSetting) -> Result<()> {
        if let Some(time) = self.time {
            setting.time = Some(time);
        }
        if let Some(price) = self.price_ticket {
            setting.price_ticket = price;
        }
        if let Some(percent) = self.percent_fond {
            setting.percent_fond = Some(percent);
        }
        if let Some(is_start) = self.is_start {
            setting.is_start = is_start;
        }
        if let Some(shape) = &self.count_number_row {
            setting.count_number_row = shape.clone();
        }
        if let Some(fill) = self.count_fill_user {
            setting.count_fill_user = fill;
        }
        if let Some(rule) = self.win_rule {
            setting.win_rule = rule;
        }

        validate_setting_fields(
            setting.price_ticket,
            setting.percent_fond,
            &setting.count_number_row,
            setting.count_fill_user,
        )
    }
}

fn validate_setting_fields(
    price_ticket: i64,
    percent_fond: Option<f64>,
    shape: &PoolShape,
    count_fill_user: u32,
) -> Result<()> {
    if price_ticket <= 0 {
        return Err(LottoError::invalid_parameters(
            "price_ticket must be greater than 0",
        ));
    }
    if let Some(percent) = percent_fond {
        if !(0.0..=100.0).contains(&percent) {
            return Err(LottoError::invalid_parameters(
                "percent_fond must be within 0..=100",
            ));
        }
    }
    if count_fill_user == 0 {
        return Err(LottoError::invalid_parameters(
            "count_fill_user must be greater than 0",
        ));
    }
    if count_fill_user > shape.total() {
        return Err(LottoError::invalid_parameters(format!(
            "count_fill_user {} exceeds pool size {}",
            count_fill_user,
            shape.total()
        )));
    }
    Ok(())
}

/// One executed draw (`generated_ticket`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeneratedTicket {
    pub id: i64,
    pub id_setting_ticket: i64,
    pub generated_at: DateTime<Utc>,
    pub arr_number: Vec<u32>,
    pub arr_true_number: Vec<u32>,
}

/// A user's wager against the next draw of a setting (`filled_ticket`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FilledTicket {
    pub id: i64,
    pub id_user: i64,
    pub id_setting_ticket: i64,
    pub id_generated_ticket: Option<i64>,
    pub created_at: DateTime<Utc>,
    pub filled_cell: Vec<u32>,
    pub multiplier: f64,
    pub multiplier_numbers: Vec<u32>,
    pub stake: i64,
    pub id_history_operation: Option<i64>,
    /// `None` while pending.
    pub is_win: Option<bool>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserInfo {
    pub id: i64,
    pub login: String,
    pub balance_real: i64,
    pub balance_virtual: i64,
    pub is_vip: bool,
    pub vip_stop_date: Option<DateTime<Utc>>,
    pub category_vip: Option<u32>,
    pub created_at: DateTime<Utc>,
}

impl UserInfo {
    /// VIP category in force at `now`, if the subscription has not lapsed.
    pub fn active_vip_category(&self, now: DateTime<Utc>) -> Option<u32> {
        match (self.is_vip, self.vip_stop_date) {
            (true, Some(stop)) if stop > now => self.category_vip,
            _ => None,
        }
    }
}

/// A purchasable VIP subscription (`vip_cost`), paid from the virtual balance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VipOffer {
    pub id: i64,
    pub naim: String,
    pub price: i64,
    pub count_day: u32,
    pub category: u32,
}

impl VipOffer {
    /// Ledger label booked for purchases of this offer.
    pub fn ledger_label(&self) -> String {
        vip_ledger_label(&self.naim)
    }
}

pub(crate) fn vip_ledger_label(naim: &str) -> String {
    format!("vip_purchase_{}", naim)
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewVipOffer {
    pub naim: String,
    pub price: i64,
    pub count_day: u32,
    pub category: u32,
}

impl NewVipOffer {
    pub fn validate(&self) -> Result<()> {
        if self.naim.trim().is_empty() {
            return Err(LottoError::invalid_parameters("offer name cannot be empty"));
        }
        if self.price <= 0 {
            return Err(LottoError::invalid_parameters(
                "offer price must be greater than 0",
            ));
        }
        if self.count_day == 0 {
            return Err(LottoError::invalid_parameters(
                "offer duration must be at least one day",
            ));
        }
        if self.category == 0 {
            return Err(LottoError::invalid_parameters(
                "offer category must be greater than 0",
            ));
        }
        Ok(())
    }
}

/// Ledger labels, pre-seeded into `type_transaction`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TransactionKind {
    LotteryWin,
    LotteryStake,
    Deposit,
    BonusDeposit,
}

impl TransactionKind {
    pub const ALL: [TransactionKind; 4] = [
        TransactionKind::LotteryWin,
        TransactionKind::LotteryStake,
        TransactionKind::Deposit,
        TransactionKind::BonusDeposit,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            TransactionKind::LotteryWin => "lottery_win_real",
            TransactionKind::LotteryStake => "lottery_stake_real",
            TransactionKind::Deposit => "deposit_real",
            TransactionKind::BonusDeposit => "deposit_virtual",
        }
    }
}

impl FromStr for TransactionKind {
    type Err = LottoError;

    fn from_str(s: &str) -> Result<Self> {
        TransactionKind::ALL
            .into_iter()
            .find(|kind| kind.label() == s || format!("{:?}", kind).eq_ignore_ascii_case(s))
            .ok_or_else(|| LottoError::invalid_parameters(format!("unknown transaction type '{}'", s)))
    }
}

/// Ledger row (`history_operation`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryOperation {
    pub id: i64,
    pub id_user: i64,
    pub change: i64, // +ve credit, -ve debit
    pub type_transaction: String,
    pub is_successful: bool,
    pub created_at: DateTime<Utc>,
}

/// Parse a decimal amount such as `12.5` or `100.00` into cents.
pub fn parse_amount(input: &str) -> Result<i64> {
    let invalid = || LottoError::invalid_parameters(format!("invalid amount '{}'", input));
    let trimmed = input.trim();
    let (negative, digits) = match trimmed.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, trimmed),
    };

    let (whole, frac) = match digits.split_once('.') {
        Some((w, f)) => (w, f),
        None => (digits, ""),
    };
    if whole.is_empty() && frac.is_empty() {
        return Err(invalid());
    }
    if frac.len() > 2
        || !whole.bytes().all(|b| b.is_ascii_digit())
        || !frac.bytes().all(|b| b.is_ascii_digit())
    {
        return Err(invalid());
    }

    let whole: i64 = if whole.is_empty() {
        0
    } else {
        whole.parse().map_err(|_| invalid())?
    };
    let frac: i64 = match frac.len() {
        0 => 0,
        1 => frac.parse::<i64>().map_err(|_| invalid())? * 10,
        _ => frac.parse().map_err(|_| invalid())?,
    };

    let cents = whole
        .checked_mul(100)
        .and_then(|w| w.checked_add(frac))
        .ok_or_else(invalid)?;
    Ok(if negative { -cents } else { cents })
}

pub fn format_amount(cents: i64) -> String {
    let sign = if cents < 0 { "-" } else { "" };
    let abs = cents.unsigned_abs();
    format!("{}{}.{:02}", sign, abs / 100, abs % 100)
}
