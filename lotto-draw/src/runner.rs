use crate::entropy::{self, EntropySource};
use crate::error::{DrawError, Result};
use crate::generator::NumberGenerator;
use crate::settlement::{DrawNumbers, SettlementEngine, SettlementReport};
use async_trait::async_trait;
use lotto_core::storage::{SettingStore, Storage};
use lotto_core::{EngineConfig, LottoError, TicketSetting};
use std::sync::Arc;
use std::time::Duration;

/// One execution of a setting's draw. The scheduler only depends on this.
#[async_trait]
pub trait DrawTask: Send + Sync {
    async fn run(&self, setting: &TicketSetting) -> Result<SettlementReport>;
}

/// Generate numbers, pick the winning subset, settle.
pub struct DrawRunner {
    storage: Arc<Storage>,
    generator: NumberGenerator,
    settlement: SettlementEngine,
    retries: u32,
    retry_backoff: Duration,
}

impl DrawRunner {
    pub fn new(storage: Arc<Storage>, entropy: Arc<dyn EntropySource>, retries: u32) -> Self {
        Self {
            generator: NumberGenerator::new(entropy),
            settlement: SettlementEngine::new(storage.clone()),
            storage,
            retries,
            retry_backoff: Duration::from_millis(200),
        }
    }

    pub fn from_config(storage: Arc<Storage>, config: &EngineConfig) -> Self {
        Self::new(
            storage,
            entropy::from_config(config.entropy.source),
            config.scheduler.settlement_retries,
        )
    }

    /// Manual trigger: load the stored setting and run one draw for it.
    pub async fn run_setting(&self, setting_id: i64) -> Result<SettlementReport> {
        let setting = SettingStore::new(&self.storage).load(setting_id).await?;
        self.run(&setting).await
    }

    async fn draw_numbers(&self, setting: &TicketSetting) -> Result<DrawNumbers> {
        let arr_number = self
            .generator
            .generate_numbers(&setting.count_number_row)
            .await?;
        let arr_true_number = self
            .generator
            .select_winners(&arr_number, setting.count_fill_user)
            .await?;

        Ok(DrawNumbers {
            arr_number,
            arr_true_number,
        })
    }
}

#[async_trait]
impl DrawTask for DrawRunner {
    async fn run(&self, setting: &TicketSetting) -> Result<SettlementReport> {
        if !setting.is_start {
            return Err(DrawError::SettingInactive(setting.id));
        }
        if setting.count_fill_user > setting.count_number_row.total() {
            return Err(LottoError::invalid_parameters(format!(
                "setting {}: count_fill_user exceeds pool size",
                setting.id
            ))
            .into());
        }

        let numbers = self.draw_numbers(setting).await?;

        let mut attempt = 0;
        loop {
            match self.settlement.settle(setting, &numbers).await {
                Ok(report) => return Ok(report),
                Err(e) if e.is_retryable() && attempt < self.retries => {
                    attempt += 1;
                    tracing::warn!(
                        "Settlement for setting {} contended, retry {}/{}: {}",
                        setting.id,
                        attempt,
                        self.retries,
                        e
                    );
                    tokio::time::sleep(self.retry_backoff * attempt).await;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entropy::SeededEntropy;
    use lotto_core::storage::TicketStore;
    use lotto_core::types::{NewTicketSetting, PoolShape, SettingUpdate, WinRuleKind};

    async fn setup() -> (Arc<Storage>, TicketSetting) {
        let storage = Arc::new(Storage::in_memory().await.unwrap());
        let setting = SettingStore::new(&storage)
            .create(&NewTicketSetting {
                time: Some("00:00:30".parse().unwrap()),
                price_ticket: 1_000,
                percent_fond: Some(50.0),
                is_start: true,
                count_number_row: PoolShape::new(vec![3, 3, 3]).unwrap(),
                count_fill_user: 5,
                win_rule: WinRuleKind::Diagonal,
            })
            .await
            .unwrap();
        (storage, setting)
    }

    #[tokio::test]
    async fn test_run_records_draw() {
        let (storage, setting) = setup().await;
        let runner = DrawRunner::new(storage.clone(), Arc::new(SeededEntropy::new(9)), 0);

        let report = runner.run_setting(setting.id).await.unwrap();
        assert_eq!(report.settled, 0);

        let draw = TicketStore::new(&storage)
            .load_draw(report.draw_id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(draw.arr_number, (1..=9).collect::<Vec<u32>>());
        assert_eq!(draw.arr_true_number.len(), 5);
    }

    #[tokio::test]
    async fn test_inactive_setting_is_not_drawn() {
        let (storage, setting) = setup().await;
        SettingStore::new(&storage)
            .update(
                setting.id,
                &SettingUpdate {
                    is_start: Some(false),
                    ..SettingUpdate::default()
                },
            )
            .await
            .unwrap();

        let runner = DrawRunner::new(storage.clone(), Arc::new(SeededEntropy::new(9)), 0);
        assert!(matches!(
            runner.run_setting(setting.id).await,
            Err(DrawError::SettingInactive(_))
        ));
        assert!(TicketStore::new(&storage)
            .list_draws(None, 10)
            .await
            .unwrap()
            .is_empty());
    }
}
