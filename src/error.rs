use chrono::NaiveDate;
use thiserror::Error;

/// Why a marker-bearing log line could not be decoded into a `Record`.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LineError {
    #[error("expected a HH:MM:SS token at position 4 before the marker, found {found} token(s)")]
    MissingTimestamp { found: usize },

    #[error("no ':' separating the message after marker {marker}")]
    MissingColon { marker: String },

    #[error(
        "expected '<message_code> <job_id> <process_path>' after marker {marker}, found {found} field(s)"
    )]
    FieldCount { marker: String, found: usize },
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("window start {start} is after window end {end}")]
    InvertedWindow { start: NaiveDate, end: NaiveDate },

    #[error("invalid marker pattern '{pattern}': {source}")]
    MarkerPattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },
}
