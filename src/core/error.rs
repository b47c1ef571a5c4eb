use thiserror::Error;

use crate::core::types::FactionId;

#[derive(Error, Debug)]
pub enum TribeWarError {
    #[error("Invalid faction pair: {0} vs {1}")]
    InvalidFactions(FactionId, FactionId),

    #[error("Faction {0} already has an open war")]
    FactionEngaged(FactionId),

    #[error("Timestamp overflow computing {0}")]
    TimestampOverflow(&'static str),

    #[error("Automatic war timers are disabled")]
    TimersDisabled,

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerdeError(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, TribeWarError>;
