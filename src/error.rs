use thiserror::Error;

#[derive(Error, Debug)]
pub enum CovtrendError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Format error: {0}")]
    Format(String),

    #[error("Snapshot decode error: {0}")]
    Decode(String),

    #[error("Publish error: {0}")]
    Publish(String),

    #[error("`{program}` exited with {status}: {stderr}")]
    Command {
        program: String,
        status: String,
        stderr: String,
    },

    #[error("{0}")]
    Other(String),
}

pub type Result<T> = std::result::Result<T, CovtrendError>;

/// Why no prior snapshot is available for comparison.
///
/// None of these are failures: every variant degrades to "no prior
/// coverage" in the rendered report.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HistoryAbsent {
    /// The run has no base commit to look back from (e.g. a first push).
    NoBaseRef,
    /// No stored snapshot carries the history marker.
    NotFound,
    /// A snapshot was found but could not be decoded.
    Undecodable(String),
    /// The store itself could not be queried.
    StoreFailed(String),
}

impl std::fmt::Display for HistoryAbsent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            HistoryAbsent::NoBaseRef => f.write_str("no base commit to compare against"),
            HistoryAbsent::NotFound => f.write_str("no prior coverage found"),
            HistoryAbsent::Undecodable(e) => write!(f, "failed to decode prior coverage: {e}"),
            HistoryAbsent::StoreFailed(e) => write!(f, "failed to query coverage history: {e}"),
        }
    }
}
