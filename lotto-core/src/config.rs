use crate::error::{LottoError, Result};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub data_dir: PathBuf,
    pub database_file: String,
    pub storage: StorageConfig,
    pub entropy: EntropyConfig,
    pub scheduler: SchedulerConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// How long a statement waits on a locked database before failing with SQLITE_BUSY.
    pub busy_timeout_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EntropyConfig {
    pub source: EntropyKind,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntropyKind {
    /// Operating-system CSPRNG.
    #[default]
    Os,
    /// Host telemetry mixed into a seed, with pseudo-random fallback.
    Telemetry,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    pub enabled: bool,
    /// Full reconcile period for the long-running daemon.
    pub refresh_interval_secs: u64,
    /// Extra attempts for a draw whose settlement hit lock contention.
    pub settlement_retries: u32,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("."),
            database_file: "lotto.db".to_string(),
            storage: StorageConfig::default(),
            entropy: EntropyConfig::default(),
            scheduler: SchedulerConfig::default(),
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            busy_timeout_ms: 5_000,
        }
    }
}

impl Default for EntropyConfig {
    fn default() -> Self {
        Self {
            source: EntropyKind::Os,
        }
    }
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            refresh_interval_secs: 30,
            settlement_retries: 2,
        }
    }
}

impl StorageConfig {
    pub fn busy_timeout(&self) -> Duration {
        Duration::from_millis(self.busy_timeout_ms)
    }
}

impl SchedulerConfig {
    pub fn refresh_interval(&self) -> Duration {
        Duration::from_secs(self.refresh_interval_secs)
    }
}

impl EngineConfig {
    pub fn with_data_dir(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
            ..Self::default()
        }
    }

    /// Load from an optional TOML file, then apply `LOTTO_*` overrides and validate.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };

        config.apply_env_overrides()?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            LottoError::config(format!("Failed to read {}: {}", path.display(), e))
        })?;

        toml::from_str(&content)
            .map_err(|e| LottoError::config(format!("Failed to parse TOML: {}", e)))
    }

    fn apply_env_overrides(&mut self) -> Result<()> {
        if let Ok(dir) = env::var("LOTTO_DATA_DIR") {
            self.data_dir = PathBuf::from(dir);
        }

        if let Ok(source) = env::var("LOTTO_ENTROPY") {
            self.entropy.source = match source.as_str() {
                "os" => EntropyKind::Os,
                "telemetry" => EntropyKind::Telemetry,
                other => {
                    return Err(LottoError::config(format!(
                        "LOTTO_ENTROPY must be 'os' or 'telemetry', got '{}'",
                        other
                    )))
                }
            };
        }

        if let Ok(timeout) = env::var("LOTTO_BUSY_TIMEOUT_MS") {
            self.storage.busy_timeout_ms = timeout.parse().map_err(|_| {
                LottoError::config(format!("LOTTO_BUSY_TIMEOUT_MS is not a number: {}", timeout))
            })?;
        }

        if let Ok(retries) = env::var("LOTTO_SETTLEMENT_RETRIES") {
            self.scheduler.settlement_retries = retries.parse().map_err(|_| {
                LottoError::config(format!(
                    "LOTTO_SETTLEMENT_RETRIES is not a number: {}",
                    retries
                ))
            })?;
        }

        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if self.database_file.is_empty() {
            return Err(LottoError::config("Database file name cannot be empty"));
        }

        if self.storage.busy_timeout_ms == 0 {
            return Err(LottoError::config("Busy timeout must be greater than 0"));
        }

        if self.scheduler.refresh_interval_secs == 0 {
            return Err(LottoError::config(
                "Scheduler refresh interval must be greater than 0",
            ));
        }

        Ok(())
    }

    pub fn database_path(&self) -> PathBuf {
        self.data_dir.join(&self.database_file)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_defaults_are_valid() {
        let config = EngineConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.entropy.source, EntropyKind::Os);
        assert_eq!(config.database_path(), PathBuf::from("./lotto.db"));
    }

    #[test]
    fn test_partial_toml_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("lotto.toml");
        std::fs::write(
            &path,
            r#"
data_dir = "/var/lib/lotto"

[entropy]
source = "telemetry"

[scheduler]
settlement_retries = 5
"#,
        )
        .unwrap();

        let config = EngineConfig::from_file(&path).unwrap();
        assert_eq!(config.data_dir, PathBuf::from("/var/lib/lotto"));
        assert_eq!(config.entropy.source, EntropyKind::Telemetry);
        assert_eq!(config.scheduler.settlement_retries, 5);
        assert_eq!(config.scheduler.refresh_interval_secs, 30);
        assert_eq!(config.storage.busy_timeout_ms, 5_000);
    }

    #[test]
    fn test_invalid_values_rejected() {
        let mut config = EngineConfig::default();
        config.storage.busy_timeout_ms = 0;
        assert!(config.validate().is_err());

        let dir = tempdir().unwrap();
        let path = dir.path().join("broken.toml");
        std::fs::write(&path, "data_dir = [").unwrap();
        assert!(matches!(
            EngineConfig::from_file(&path),
            Err(LottoError::Config(_))
        ));
    }
}
