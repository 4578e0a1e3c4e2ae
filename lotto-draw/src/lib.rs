//! Numbers-lottery draw engine
//!
//! Recurring draws per ticket setting: an [`EntropySource`] feeds the
//! [`NumberGenerator`], the [`SettlementEngine`] records the draw and resolves
//! pending bets atomically, and the [`DrawScheduler`] times it all.

pub mod betting;
pub mod entropy;
pub mod error;
pub mod generator;
pub mod rules;
pub mod runner;
pub mod scheduler;
pub mod settlement;

pub use betting::{BetDesk, BetRequest};
pub use entropy::{EntropySource, OsEntropy, SeededEntropy, TelemetryEntropy};
pub use error::{DrawError, Result};
pub use generator::NumberGenerator;
pub use rules::{payout, price_factor, DiagonalMatch, ExactSet, WinRule};
pub use runner::{DrawRunner, DrawTask};
pub use scheduler::DrawScheduler;
pub use settlement::{DrawNumbers, SettlementEngine, SettlementReport};

use lotto_core::storage::Storage;
use lotto_core::EngineConfig;
use std::sync::Arc;

/// Wire a scheduler to a real [`DrawRunner`] built from `config`.
pub fn scheduler_from_config(storage: Arc<Storage>, config: &EngineConfig) -> DrawScheduler {
    let runner = DrawRunner::from_config(storage.clone(), config);
    DrawScheduler::new(storage, Arc::new(runner))
}
