//! Recurring draw timers and the configuration cache behind them.
//!
//! Each active setting owns one spawned task that wakes every `time` period,
//! reads the setting's *current* snapshot from the cache and runs one draw.
//! Admin changes reach the scheduler through [`DrawScheduler::reconcile_one`],
//! [`DrawScheduler::apply_setting`] or a periodic [`DrawScheduler::reconcile_all`].

use crate::error::Result;
use crate::runner::DrawTask;
use futures::future::join_all;
use futures::FutureExt;
use lotto_core::storage::{SettingStore, Storage};
use lotto_core::TicketSetting;
use parking_lot::{Mutex, RwLock};
use std::collections::{HashMap, HashSet};
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};

type SettingCache = Arc<RwLock<HashMap<i64, TicketSetting>>>;

struct ScheduledJob {
    handle: JoinHandle<()>,
    period: Duration,
}

pub struct DrawScheduler {
    storage: Arc<Storage>,
    task: Arc<dyn DrawTask>,
    cache: SettingCache,
    jobs: Mutex<HashMap<i64, ScheduledJob>>,
}

impl DrawScheduler {
    pub fn new(storage: Arc<Storage>, task: Arc<dyn DrawTask>) -> Self {
        Self {
            storage,
            task,
            cache: Arc::new(RwLock::new(HashMap::new())),
            jobs: Mutex::new(HashMap::new()),
        }
    }

    /// Reload every setting: arm new or changed ones, cancel the rest.
    pub async fn reconcile_all(&self) -> Result<()> {
        let settings = SettingStore::new(&self.storage).list().await?;
        let known: HashSet<i64> = settings.iter().map(|s| s.id).collect();

        for setting in settings {
            self.apply_setting(setting);
        }

        let stale: Vec<i64> = {
            let cache = self.cache.read();
            let jobs = self.jobs.lock();
            cache
                .keys()
                .chain(jobs.keys())
                .filter(|id| !known.contains(*id))
                .copied()
                .collect()
        };
        for id in stale {
            self.remove_setting(id);
        }

        tracing::debug!("Reconciled settings, {} draw timers armed", self.jobs.lock().len());
        Ok(())
    }

    /// Reload a single setting after an admin create or update.
    pub async fn reconcile_one(&self, id: i64) -> Result<()> {
        match SettingStore::new(&self.storage).find(id).await? {
            Some(setting) => self.apply_setting(setting),
            None => self.remove_setting(id),
        }
        Ok(())
    }

    /// Bring the timer for `setting` in line with its latest payload.
    pub fn apply_setting(&self, setting: TicketSetting) {
        let id = setting.id;

        if !setting.is_start {
            self.remove_setting(id);
            return;
        }

        let period = match setting.time {
            Some(cadence) if cadence.is_positive() => cadence.as_duration(),
            _ => {
                tracing::warn!("Setting {} has no usable cadence, not scheduling", id);
                self.remove_setting(id);
                return;
            }
        };
        if setting.count_number_row.total() == 0 {
            tracing::warn!("Setting {} has an empty pool, not scheduling", id);
            self.remove_setting(id);
            return;
        }

        let previous = self.cache.write().insert(id, setting.clone());

        let mut jobs = self.jobs.lock();
        let unchanged = match (jobs.get(&id), &previous) {
            (Some(job), Some(previous)) => {
                !job.handle.is_finished()
                    && job.period == period
                    && !previous.schedule_differs(&setting)
            }
            _ => false,
        };
        if unchanged {
            tracing::debug!("Setting {} snapshot refreshed, timer kept", id);
            return;
        }

        if let Some(old) = jobs.remove(&id) {
            old.handle.abort();
        }
        let handle = self.spawn_timer(id, period);
        jobs.insert(id, ScheduledJob { handle, period });

        tracing::info!("Scheduled draws for setting {} every {:?}", id, period);
    }

    /// Cancel the timer and forget the snapshot. Safe to call repeatedly.
    pub fn remove_setting(&self, id: i64) {
        self.cache.write().remove(&id);

        if let Some(job) = self.jobs.lock().remove(&id) {
            job.handle.abort();
            tracing::info!("Stopped draws for setting {}", id);
        }
    }

    /// Cancel all timers and wait until their tasks are gone.
    pub async fn shutdown(&self) {
        let handles: Vec<JoinHandle<()>> = {
            let mut jobs = self.jobs.lock();
            jobs.drain()
                .map(|(_, job)| {
                    job.handle.abort();
                    job.handle
                })
                .collect()
        };
        self.cache.write().clear();

        let count = handles.len();
        for result in join_all(handles).await {
            if let Err(e) = result {
                if !e.is_cancelled() {
                    tracing::error!("Draw timer ended abnormally: {}", e);
                }
            }
        }

        tracing::info!("Scheduler stopped, {} timers cancelled", count);
    }

    /// Settings with a live timer.
    pub fn scheduled_ids(&self) -> Vec<i64> {
        let mut ids: Vec<i64> = self
            .jobs
            .lock()
            .iter()
            .filter(|(_, job)| !job.handle.is_finished())
            .map(|(id, _)| *id)
            .collect();
        ids.sort_unstable();
        ids
    }

    pub fn period_of(&self, id: i64) -> Option<Duration> {
        self.jobs.lock().get(&id).map(|job| job.period)
    }

    pub fn cached(&self, id: i64) -> Option<TicketSetting> {
        self.cache.read().get(&id).cloned()
    }

    fn spawn_timer(&self, id: i64, period: Duration) -> JoinHandle<()> {
        let cache = self.cache.clone();
        let task = self.task.clone();

        tokio::spawn(async move {
            let mut ticker = interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                ticker.tick().await;

                let snapshot = cache.read().get(&id).cloned();
                let Some(setting) = snapshot else {
                    tracing::debug!("Setting {} left the cache, timer exiting", id);
                    break;
                };

                match AssertUnwindSafe(task.run(&setting)).catch_unwind().await {
                    Ok(Ok(report)) => tracing::debug!(
                        "Setting {} tick: draw {}, {} bets settled",
                        id,
                        report.draw_id,
                        report.settled
                    ),
                    Ok(Err(e)) => tracing::error!("Draw for setting {} failed: {}", id, e),
                    Err(panic) => tracing::error!(
                        "Draw for setting {} panicked: {}",
                        id,
                        panic_message(panic.as_ref())
                    ),
                }
            }
        })
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> &str {
    if let Some(msg) = payload.downcast_ref::<&str>() {
        msg
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.as_str()
    } else {
        "non-string panic payload"
    }
}

impl Drop for DrawScheduler {
    fn drop(&mut self) {
        for (_, job) in self.jobs.get_mut().drain() {
            job.handle.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::DrawError;
    use crate::settlement::SettlementReport;
    use async_trait::async_trait;
    use chrono::Utc;
    use lotto_core::types::{NewTicketSetting, PoolShape, SettingUpdate, WinRuleKind};

    #[derive(Default)]
    struct RecordingTask {
        fires: Mutex<Vec<(i64, Instant, i64)>>,
        fail: bool,
        panic_first: bool,
    }

    impl RecordingTask {
        fn fire_count(&self) -> usize {
            self.fires.lock().len()
        }
    }

    #[async_trait]
    impl DrawTask for RecordingTask {
        async fn run(&self, setting: &TicketSetting) -> crate::Result<SettlementReport> {
            let call = {
                let mut fires = self.fires.lock();
                fires.push((setting.id, Instant::now(), setting.price_ticket));
                fires.len()
            };
            if self.panic_first && call == 1 {
                panic!("draw task blew up");
            }
            if self.fail {
                return Err(DrawError::Internal("boom".to_string()));
            }
            Ok(SettlementReport {
                setting_id: setting.id,
                ..SettlementReport::default()
            })
        }
    }

    fn setting(id: i64, time: &str) -> TicketSetting {
        TicketSetting {
            id,
            time: Some(time.parse().unwrap()),
            price_ticket: 1_000,
            percent_fond: None,
            is_start: true,
            count_number_row: PoolShape::new(vec![3, 3, 3]).unwrap(),
            count_fill_user: 9,
            win_rule: WinRuleKind::Diagonal,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    async fn scheduler(task: Arc<RecordingTask>) -> DrawScheduler {
        let storage = Arc::new(Storage::in_memory().await.unwrap());
        DrawScheduler::new(storage, task)
    }

    async fn advance(secs: u64) {
        tokio::time::sleep(Duration::from_secs(secs)).await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_cadence_change_replaces_timer() {
        let task = Arc::new(RecordingTask::default());
        let scheduler = scheduler(task.clone()).await;
        let start = Instant::now();

        scheduler.apply_setting(setting(1, "00:00:30"));
        advance(31).await;
        assert_eq!(task.fire_count(), 1);

        scheduler.apply_setting(setting(1, "00:01:00"));
        assert_eq!(scheduler.period_of(1), Some(Duration::from_secs(60)));

        // The old 30s timer would have fired at 60.
        advance(54).await;
        assert_eq!(task.fire_count(), 1);

        advance(10).await;
        let fires = task.fires.lock().clone();
        assert_eq!(fires.len(), 2);
        assert!(fires[1].1 - start >= Duration::from_secs(91));

        scheduler.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_same_cadence_keeps_timer_and_refreshes_snapshot() {
        let task = Arc::new(RecordingTask::default());
        let scheduler = scheduler(task.clone()).await;

        scheduler.apply_setting(setting(1, "00:00:30"));
        advance(10).await;

        let mut repriced = setting(1, "00:00:30");
        repriced.price_ticket = 2_500;
        scheduler.apply_setting(repriced);

        advance(21).await;
        let fires = task.fires.lock().clone();
        assert_eq!(fires.len(), 1);
        assert_eq!(fires[0].2, 2_500);

        scheduler.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_deactivation_cancels_timer() {
        let task = Arc::new(RecordingTask::default());
        let scheduler = scheduler(task.clone()).await;

        scheduler.apply_setting(setting(1, "00:00:30"));
        let mut stopped = setting(1, "00:00:30");
        stopped.is_start = false;
        scheduler.apply_setting(stopped);

        advance(120).await;
        assert_eq!(task.fire_count(), 0);
        assert!(scheduler.scheduled_ids().is_empty());
        assert!(scheduler.cached(1).is_none());

        scheduler.remove_setting(1);
        scheduler.remove_setting(1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_unusable_cadence_is_skipped() {
        let task = Arc::new(RecordingTask::default());
        let scheduler = scheduler(task.clone()).await;

        scheduler.apply_setting(setting(1, "00:00:00"));
        let mut untimed = setting(2, "00:00:30");
        untimed.time = None;
        scheduler.apply_setting(untimed);

        advance(60).await;
        assert!(scheduler.scheduled_ids().is_empty());
        assert_eq!(task.fire_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_tick_keeps_timer_running() {
        let task = Arc::new(RecordingTask {
            fail: true,
            ..RecordingTask::default()
        });
        let scheduler = scheduler(task.clone()).await;

        scheduler.apply_setting(setting(1, "00:00:30"));
        advance(61).await;
        assert_eq!(task.fire_count(), 2);
        assert_eq!(scheduler.scheduled_ids(), vec![1]);

        scheduler.shutdown().await;
        assert!(scheduler.scheduled_ids().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_panicking_tick_keeps_timer_running() {
        let task = Arc::new(RecordingTask {
            panic_first: true,
            ..RecordingTask::default()
        });
        let scheduler = scheduler(task.clone()).await;

        scheduler.apply_setting(setting(1, "00:00:30"));
        advance(31).await;
        assert_eq!(task.fire_count(), 1);

        scheduler.apply_setting(setting(1, "00:00:30"));
        advance(300).await;
        assert_eq!(task.fire_count(), 11);
        assert_eq!(scheduler.scheduled_ids(), vec![1]);

        scheduler.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_finished_timer_is_rearmed() {
        let task = Arc::new(RecordingTask::default());
        let scheduler = scheduler(task.clone()).await;

        scheduler.apply_setting(setting(1, "00:00:30"));
        scheduler.cache.write().remove(&1);
        advance(31).await;
        assert_eq!(task.fire_count(), 0);
        assert!(scheduler.scheduled_ids().is_empty());

        // Cached payload is unchanged, only the task behind it is gone.
        scheduler.cache.write().insert(1, setting(1, "00:00:30"));
        scheduler.apply_setting(setting(1, "00:00:30"));
        assert_eq!(scheduler.scheduled_ids(), vec![1]);
        advance(31).await;
        assert_eq!(task.fire_count(), 1);

        scheduler.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_reconcile_from_storage() {
        let task = Arc::new(RecordingTask::default());
        let storage = Arc::new(Storage::in_memory().await.unwrap());
        let settings = SettingStore::new(&storage);

        let new_setting = |is_start: bool| NewTicketSetting {
            time: Some("00:05:00".parse().unwrap()),
            price_ticket: 1_000,
            percent_fond: None,
            is_start,
            count_number_row: PoolShape::new(vec![2, 2]).unwrap(),
            count_fill_user: 4,
            win_rule: WinRuleKind::Diagonal,
        };
        let active = settings.create(&new_setting(true)).await.unwrap();
        let idle = settings.create(&new_setting(false)).await.unwrap();

        let scheduler = DrawScheduler::new(storage.clone(), task);
        scheduler.reconcile_all().await.unwrap();
        assert_eq!(scheduler.scheduled_ids(), vec![active.id]);

        settings
            .update(
                idle.id,
                &SettingUpdate {
                    is_start: Some(true),
                    time: Some("00:00:45".parse().unwrap()),
                    ..SettingUpdate::default()
                },
            )
            .await
            .unwrap();
        scheduler.reconcile_one(idle.id).await.unwrap();
        assert_eq!(scheduler.period_of(idle.id), Some(Duration::from_secs(45)));

        settings
            .update(
                active.id,
                &SettingUpdate {
                    is_start: Some(false),
                    ..SettingUpdate::default()
                },
            )
            .await
            .unwrap();
        scheduler.reconcile_all().await.unwrap();
        assert_eq!(scheduler.scheduled_ids(), vec![idle.id]);

        scheduler.shutdown().await;
    }
}
