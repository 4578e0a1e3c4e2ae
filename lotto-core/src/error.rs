use thiserror::Error;

pub type Result<T> = std::result::Result<T, LottoError>;

#[derive(Error, Debug)]
pub enum LottoError {
    #[error("Invalid parameters: {0}")]
    InvalidParameters(String),

    #[error("Storage error: {0}")]
    Storage(#[from] rusqlite::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Insufficient funds: need {need}, have {available}")]
    InsufficientFunds { need: i64, available: i64 },

    #[error("Ticket setting not found: {id}")]
    SettingNotFound { id: i64 },

    #[error("User not found: {id}")]
    UserNotFound { id: i64 },

    #[error("Bet not found: {id}")]
    BetNotFound { id: i64 },

    #[error("VIP offer not found: {id}")]
    VipOfferNotFound { id: i64 },

    #[error("VIP category {requested} is below the active category {current}")]
    VipDowngrade { current: u32, requested: u32 },

    #[error("Transaction type '{label}' not found")]
    TransactionTypeMissing { label: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl LottoError {
    pub fn invalid_parameters(msg: impl Into<String>) -> Self {
        Self::InvalidParameters(msg.into())
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// Lock contention on the database; the same unit of work may succeed later.
    pub fn is_retryable(&self) -> bool {
        match self {
            LottoError::Storage(rusqlite::Error::SqliteFailure(err, _)) => matches!(
                err.code,
                rusqlite::ErrorCode::DatabaseBusy | rusqlite::ErrorCode::DatabaseLocked
            ),
            _ => false,
        }
    }
}
