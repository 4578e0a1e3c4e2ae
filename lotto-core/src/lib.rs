//! Lotto core - domain types, configuration and persistence for the numbers lottery
//!
//! Settings, draws, bets, accounts and the ledger all live in one SQLite
//! database owned by [`storage::Storage`]. The draw engine builds on top of it.

pub mod config;
pub mod error;
pub mod storage;
pub mod types;

pub use config::{EngineConfig, EntropyKind};
pub use error::{LottoError, Result};
pub use storage::Storage;
pub use types::{
    format_amount, parse_amount, Cadence, FilledTicket, GeneratedTicket, HistoryOperation,
    NewTicketSetting, NewVipOffer, PoolShape, SettingUpdate, TicketSetting, TransactionKind,
    UserInfo, VipOffer, WinRuleKind, MAX_POOL_SIZE,
};
