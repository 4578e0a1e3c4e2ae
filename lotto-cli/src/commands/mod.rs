pub mod bet;
pub mod draw;
pub mod history;
pub mod serve;
pub mod setting;
pub mod user;
pub mod vip;

pub use bet::{handle_bet_command, BetCommands};
pub use draw::{handle_draw_command, DrawCommands};
pub use history::{handle_history_command, HistoryArgs};
pub use serve::{handle_serve_command, ServeArgs};
pub use setting::{handle_setting_command, SettingCommands};
pub use user::{handle_user_command, UserCommands};
pub use vip::{handle_vip_command, VipCommands};

use chrono::{DateTime, Local, Utc};
use lotto_core::{EngineConfig, Storage};
use std::sync::Arc;

/// Shared state handed to every command handler.
pub struct AppContext {
    pub config: EngineConfig,
    pub storage: Arc<Storage>,
}

pub(crate) fn format_time(at: &DateTime<Utc>) -> String {
    at.with_timezone(&Local).format("%Y-%m-%d %H:%M:%S").to_string()
}

pub(crate) fn format_numbers(numbers: &[u32]) -> String {
    numbers
        .iter()
        .map(|n| n.to_string())
        .collect::<Vec<_>>()
        .join(",")
}
