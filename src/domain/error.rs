//! Domain error types.

/// Top-level error type for pairtrader.
#[derive(Debug, thiserror::Error)]
pub enum PairtraderError {
    #[error("no data for {pair} on timeframe {timeframe}")]
    NoData { pair: String, timeframe: String },

    #[error("insufficient data: have {have} bars, need {need}")]
    InsufficientData { have: usize, need: usize },

    #[error("bars out of order at timestamp {timestamp_ms}")]
    NonMonotonic { timestamp_ms: i64 },

    #[error("invalid input: {reason}")]
    InvalidInput { reason: String },

    #[error("strategy {name} is not implemented")]
    InvalidStrategy { name: String },

    #[error("provider error: {reason}")]
    Provider { reason: String },

    #[error("config parse error in {file}: {reason}")]
    ConfigParse { file: String, reason: String },

    #[error("missing config key [{section}] {key}")]
    ConfigMissing { section: String, key: String },

    #[error("invalid config value [{section}] {key}: {reason}")]
    ConfigInvalid {
        section: String,
        key: String,
        reason: String,
    },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Csv(#[from] csv::Error),
}

impl From<&PairtraderError> for std::process::ExitCode {
    fn from(err: &PairtraderError) -> Self {
        let code: u8 = match err {
            PairtraderError::Io(_) | PairtraderError::Csv(_) => 1,
            PairtraderError::ConfigParse { .. }
            | PairtraderError::ConfigMissing { .. }
            | PairtraderError::ConfigInvalid { .. } => 2,
            PairtraderError::Provider { .. } => 3,
            PairtraderError::InvalidStrategy { .. } | PairtraderError::InvalidInput { .. } => 4,
            PairtraderError::NoData { .. }
            | PairtraderError::InsufficientData { .. }
            | PairtraderError::NonMonotonic { .. } => 5,
        };
        std::process::ExitCode::from(code)
    }
}
