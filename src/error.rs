//! Error types for the arcade core.

use thiserror::Error;

use crate::phase::{GamePhase, PhaseEvent};

#[derive(Debug, Error)]
pub enum ArcadeError {
    #[error("illegal phase transition: {event:?} while {from:?}")]
    IllegalTransition { from: GamePhase, event: PhaseEvent },

    #[error("invalid game config: {0}")]
    InvalidConfig(String),

    #[error("leaderboard error: {0}")]
    Leaderboard(String),

    #[error("native bridge error: {0}")]
    Bridge(String),

    #[error("telemetry delivery failed: {0}")]
    Telemetry(String),

    #[error("storage error: {0}")]
    Storage(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, ArcadeError>;
