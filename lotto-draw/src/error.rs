use lotto_core::LottoError;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, DrawError>;

#[derive(Error, Debug)]
pub enum DrawError {
    #[error("Lotto core error: {0}")]
    Core(#[from] LottoError),

    #[error("Settlement failed for setting {setting_id}: {source}")]
    SettlementFailed {
        setting_id: i64,
        #[source]
        source: LottoError,
    },

    #[error("Ticket setting {0} is not active")]
    SettingInactive(i64),

    #[error("Bet rejected: {0}")]
    BetRejected(String),

    #[error("Telemetry unavailable: {0}")]
    TelemetryUnavailable(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl DrawError {
    pub fn bet_rejected(msg: impl Into<String>) -> Self {
        Self::BetRejected(msg.into())
    }

    pub fn is_retryable(&self) -> bool {
        match self {
            DrawError::Core(err) => err.is_retryable(),
            DrawError::SettlementFailed { source, .. } => source.is_retryable(),
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_settlement_failure_keeps_retry_class() {
        let busy = LottoError::Storage(rusqlite::Error::SqliteFailure(
            rusqlite::ffi::Error::new(rusqlite::ffi::SQLITE_LOCKED),
            None,
        ));
        let err = DrawError::SettlementFailed {
            setting_id: 7,
            source: busy,
        };
        assert!(err.is_retryable());
        assert!(err.to_string().contains("setting 7"));

        assert!(!DrawError::SettingInactive(7).is_retryable());
    }
}
