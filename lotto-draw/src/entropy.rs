//! Random integer sources for draws.
//!
//! [`OsEntropy`] is the default. [`TelemetryEntropy`] derives values from host
//! sensor readings and silently falls back to a pseudo-random value when the
//! readings are unavailable. [`SeededEntropy`] is deterministic.

use crate::error::{DrawError, Result};
use async_trait::async_trait;
use lotto_core::{EntropyKind, LottoError};
use parking_lot::Mutex;
use rand::rngs::{OsRng, StdRng};
use rand::{Rng, SeedableRng};
use sha2::{Digest, Sha256};
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

#[async_trait]
pub trait EntropySource: Send + Sync {
    /// Uniform integer in `[min, max]`, both inclusive.
    async fn next_int(&self, min: u32, max: u32) -> Result<u32>;
}

/// Build the configured source.
pub fn from_config(kind: EntropyKind) -> Arc<dyn EntropySource> {
    match kind {
        EntropyKind::Os => Arc::new(OsEntropy),
        EntropyKind::Telemetry => Arc::new(TelemetryEntropy::new()),
    }
}

fn check_range(min: u32, max: u32) -> Result<()> {
    if min > max {
        return Err(LottoError::invalid_parameters(format!(
            "empty entropy range [{}, {}]",
            min, max
        ))
        .into());
    }
    Ok(())
}

/// Operating-system CSPRNG.
#[derive(Debug, Default, Clone, Copy)]
pub struct OsEntropy;

#[async_trait]
impl EntropySource for OsEntropy {
    async fn next_int(&self, min: u32, max: u32) -> Result<u32> {
        check_range(min, max)?;
        Ok(OsRng.gen_range(min..=max))
    }
}

/// Deterministic source for tests and reproducible runs.
pub struct SeededEntropy {
    rng: Mutex<StdRng>,
}

impl SeededEntropy {
    pub fn new(seed: u64) -> Self {
        Self {
            rng: Mutex::new(StdRng::seed_from_u64(seed)),
        }
    }
}

#[async_trait]
impl EntropySource for SeededEntropy {
    async fn next_int(&self, min: u32, max: u32) -> Result<u32> {
        check_range(min, max)?;
        Ok(self.rng.lock().gen_range(min..=max))
    }
}

/// Host telemetry hashed into a seed.
pub struct TelemetryEntropy {
    proc_root: PathBuf,
    sys_root: PathBuf,
    counter: AtomicU64,
}

impl TelemetryEntropy {
    pub fn new() -> Self {
        Self::with_roots("/proc", "/sys")
    }

    pub fn with_roots(proc_root: impl Into<PathBuf>, sys_root: impl Into<PathBuf>) -> Self {
        Self {
            proc_root: proc_root.into(),
            sys_root: sys_root.into(),
            counter: AtomicU64::new(0),
        }
    }

    async fn collect(&self) -> Result<Vec<String>> {
        let mut readings = Vec::with_capacity(4);

        if let Ok(cpuinfo) = tokio::fs::read_to_string(self.proc_root.join("cpuinfo")).await {
            if let Some(mhz) = cpuinfo
                .lines()
                .find(|line| line.starts_with("cpu MHz"))
                .and_then(|line| line.split(':').nth(1))
            {
                readings.push(mhz.trim().to_string());
            }
        }

        let thermal = self.sys_root.join("class/thermal/thermal_zone0/temp");
        if let Ok(temp) = tokio::fs::read_to_string(thermal).await {
            readings.push(temp.trim().to_string());
        }

        if let Ok(loadavg) = tokio::fs::read_to_string(self.proc_root.join("loadavg")).await {
            if let Some(load) = loadavg.split_whitespace().next() {
                readings.push(load.to_string());
            }
        }

        if readings.is_empty() {
            return Err(DrawError::TelemetryUnavailable(
                "no cpu, thermal or load readings".to_string(),
            ));
        }

        let now = chrono::Utc::now();
        readings.push(now.timestamp_nanos_opt().unwrap_or_default().to_string());
        Ok(readings)
    }

    fn mix(&self, readings: &[String]) -> u64 {
        let mut hasher = Sha256::new();
        for reading in readings {
            hasher.update(reading.as_bytes());
            hasher.update([0u8]);
        }
        // Consecutive calls inside one timestamp tick still differ.
        hasher.update(self.counter.fetch_add(1, Ordering::Relaxed).to_le_bytes());

        let digest = hasher.finalize();
        let mut seed = [0u8; 8];
        seed.copy_from_slice(&digest[..8]);
        u64::from_le_bytes(seed)
    }
}

impl Default for TelemetryEntropy {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl EntropySource for TelemetryEntropy {
    async fn next_int(&self, min: u32, max: u32) -> Result<u32> {
        check_range(min, max)?;
        let span = u64::from(max - min) + 1;

        let seed = match self.collect().await {
            Ok(readings) => self.mix(&readings),
            Err(e) => {
                tracing::debug!("Falling back to pseudo-random value: {}", e);
                fallback_seed()
            }
        };

        Ok(min + (seed % span) as u32)
    }
}

fn fallback_seed() -> u64 {
    rand::thread_rng().gen()
}
