use thiserror::Error;

pub type Result<T> = std::result::Result<T, CubeError>;

#[derive(Debug, Error)]
pub enum CubeError {
    #[error("{name} must be a probability in [0, 1], got {value}")]
    InvalidProbability { name: &'static str, value: f64 },

    #[error("hit count must be between 0 and 3, got {0}")]
    InvalidHitCount(usize),

    #[error("line index must be 0, 1 or 2, got {0}")]
    InvalidSlot(usize),

    /// A draw on line `slot` is still waiting for confirm or cancel.
    #[error("a draw on line {} is still pending; confirm or cancel it first", .slot + 1)]
    DrawPending { slot: usize },

    #[error("simulation needs at least one trial")]
    NoTrials,

    #[error("unknown preset '{0}'")]
    UnknownPreset(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error("worker failure: {0}")]
    Worker(String),
}
