// Errors shared by every stage of the pipeline.
use thiserror::Error;

#[derive(Debug, Error)]
pub enum BattleError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("malformed battle record at {path}:{line}: {source}")]
    MalformedRecord {
        path: String,
        line: usize,
        source: serde_json::Error,
    },

    #[error("invalid battle record {battle_id}: {message}")]
    InvalidRecord { battle_id: String, message: String },

    #[error("battle {battle_id} produced {found} feature columns, expected {expected}")]
    ColumnMismatch {
        battle_id: String,
        expected: usize,
        found: usize,
    },

    #[error("battle {0} has no player_won label while other battles in the dataset do")]
    InconsistentLabels(String),

    #[error("missing column: {0}")]
    MissingColumn(String),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Classifier error: {0}")]
    Classifier(String),

    #[error("got {predictions} predictions for {rows} rows")]
    PredictionCount { predictions: usize, rows: usize },

    #[error("Plot error: {0}")]
    Plot(String),
}

pub type Result<T> = std::result::Result<T, BattleError>;
