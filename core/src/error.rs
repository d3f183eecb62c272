use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::notifier::SendError;

#[derive(Error, Debug)]
pub enum DeskError {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Insufficient balance: cost {required} exceeds remaining balance {available}")]
    InsufficientBalance { required: f64, available: f64 },

    #[error("Insufficient deposit bonus: {required} uses requested, {available} remaining")]
    InsufficientDepositBonus { required: f64, available: f64 },

    #[error("Renewal not due{}", .next_renewal.map(|d| format!(" before {d}")).unwrap_or_else(|| String::from(": no renewal period configured")))]
    NotEligible { next_renewal: Option<DateTime<Utc>> },

    #[error("{entity} '{id}' not found")]
    NotFound { entity: &'static str, id: String },

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("'{action}' requires a permission the user does not hold")]
    Forbidden { action: &'static str },

    #[error("Notification send failed: {0}")]
    Send(#[from] SendError),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub type DeskResult<T> = Result<T, DeskError>;
