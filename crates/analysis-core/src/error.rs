use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum AnalysisError {
    #[error("Insufficient data: {0}")]
    InsufficientData(String),

    #[error("Invalid bar at index {index}: {reason}")]
    InvalidBar { index: usize, reason: String },

    #[error("Series has no valid bars")]
    EmptySeries,

    #[error("Indicator rows ({rows}) do not line up with bars ({bars})")]
    RowMismatch { rows: usize, bars: usize },

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}
