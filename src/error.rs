use rusqlite;
use thiserror::Error;
use tracing::{error, warn};

pub type AppResult<T> = Result<T, AppError>;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("database error: {message}")]
    Database { message: String },

    #[error("record not found")]
    NotFound,

    #[error("record conflict: {message}")]
    Conflict { message: String },

    #[error("validation failed: {message}")]
    Validation { message: String },

    #[error("insufficient vault balance: requested {requested}, available {available}")]
    InsufficientBalance { requested: i64, available: i64 },

    #[error("redemption limit reached: {used} of {limit} used this cycle")]
    RedemptionLimitExceeded { used: u32, limit: u32 },

    #[error("concurrent update conflict on account {worker_id}")]
    ConcurrencyConflict { worker_id: String },

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Other(String),
}

impl AppError {
    pub fn validation(message: impl Into<String>) -> Self {
        let message = message.into();
        warn!(target: "ledger::validation", %message, "validation error");
        AppError::Validation { message }
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        let message = message.into();
        warn!(target: "ledger::conflict", %message, "conflict error");
        AppError::Conflict { message }
    }

    pub fn not_found() -> Self {
        warn!(target: "ledger::database", "resource not found");
        AppError::NotFound
    }

    pub fn database(message: impl Into<String>) -> Self {
        let message = message.into();
        error!(target: "ledger::database", %message, "database error");
        AppError::Database { message }
    }

    pub fn insufficient_balance(requested: i64, available: i64) -> Self {
        warn!(target: "ledger::vault", requested, available, "insufficient balance");
        AppError::InsufficientBalance {
            requested,
            available,
        }
    }

    pub fn redemption_limit_exceeded(used: u32, limit: u32) -> Self {
        warn!(target: "ledger::vault", used, limit, "redemption limit exceeded");
        AppError::RedemptionLimitExceeded { used, limit }
    }

    pub fn concurrency_conflict(worker_id: impl Into<String>) -> Self {
        let worker_id = worker_id.into();
        warn!(target: "ledger::vault", %worker_id, "optimistic lock conflict");
        AppError::ConcurrencyConflict { worker_id }
    }

    pub fn other(message: impl Into<String>) -> Self {
        let message = message.into();
        error!(target: "ledger::other", %message, "other error");
        AppError::Other(message)
    }
}

impl From<rusqlite::Error> for AppError {
    fn from(error: rusqlite::Error) -> Self {
        use rusqlite::Error::{QueryReturnedNoRows, SqliteFailure};
        use rusqlite::ErrorCode;

        match &error {
            QueryReturnedNoRows => AppError::not_found(),
            SqliteFailure(err, _) if err.code == ErrorCode::ConstraintViolation => {
                AppError::conflict("unique or check constraint violated")
            }
            _ => {
                error!(target: "ledger::database", error = ?error, "sqlite error");
                AppError::database(error.to_string())
            }
        }
    }
}
