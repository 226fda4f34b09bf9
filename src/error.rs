//! Error types shared by every pipeline stage.
//!
//! All fallible operations in the crate return [`Result`], which carries a
//! [`PipelineError`]. Third-party errors (CSV, NumPy, TOML, JSON, ndarray
//! shape errors) convert automatically so stages can propagate with `?`.

use std::path::PathBuf;
use thiserror::Error;

/// Crate-wide result alias.
pub type Result<T> = std::result::Result<T, PipelineError>;

/// Errors produced while extracting, exporting or training.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("failed to write .npy file: {0}")]
    NpyWrite(#[from] ndarray_npy::WriteNpyError),

    #[error("failed to read .npy file: {0}")]
    NpyRead(#[from] ndarray_npy::ReadNpyError),

    #[error("array shape error: {0}")]
    Shape(#[from] ndarray::ShapeError),

    #[error("TOML parse error: {0}")]
    TomlDe(#[from] toml::de::Error),

    #[error("TOML serialization error: {0}")]
    TomlSer(#[from] toml::ser::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid date '{value}': {source}")]
    Date {
        value: String,
        #[source]
        source: chrono::ParseError,
    },

    /// A column required by the configured key list is absent.
    #[error("missing column '{0}'")]
    MissingColumn(String),

    /// A flat row cannot be split into `sequence_length` blocks of `width` values.
    #[error(
        "cannot reshape row of {row_width} values into ({sequence_length}, {width})"
    )]
    ReshapeMismatch {
        width: usize,
        sequence_length: usize,
        row_width: usize,
    },

    #[error("sequence error: {0}")]
    Sequence(#[from] crate::sequence_builder::SequenceError),

    #[error("model error: {0}")]
    Model(#[from] crate::model::ModelError),

    #[error("partition '{0}' is empty")]
    EmptyPartition(String),

    #[error("need at least {required} rows, got {available}")]
    InsufficientRows { required: usize, available: usize },

    #[error("input file not found: {0}")]
    MissingInput(PathBuf),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("validation failed: {0}")]
    Validation(String),

    #[error("{0}")]
    Generic(String),
}

impl PipelineError {
    /// Build a free-form error.
    pub fn generic(msg: impl Into<String>) -> Self {
        Self::Generic(msg.into())
    }

    /// Build a configuration error.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    pub(crate) fn date(value: &str, source: chrono::ParseError) -> Self {
        Self::Date {
            value: value.to_string(),
            source,
        }
    }
}

/// Parse a `YYYY-MM-DD` date, mapping failures to [`PipelineError::Date`].
pub fn parse_date(value: &str) -> Result<chrono::NaiveDate> {
    chrono::NaiveDate::parse_from_str(value.trim(), "%Y-%m-%d")
        .map_err(|e| PipelineError::date(value, e))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reshape_mismatch_message() {
        let err = PipelineError::ReshapeMismatch {
            width: 18,
            sequence_length: 20,
            row_width: 100,
        };
        assert_eq!(
            err.to_string(),
            "cannot reshape row of 100 values into (20, 18)"
        );
    }

    #[test]
    fn test_parse_date() {
        let date = parse_date("2015-01-01").unwrap();
        assert_eq!(date.to_string(), "2015-01-01");
        assert!(matches!(
            parse_date("2015/01/01"),
            Err(PipelineError::Date { .. })
        ));
    }

    #[test]
    fn test_io_conversion() {
        fn open_missing() -> Result<std::fs::File> {
            Ok(std::fs::File::open("/definitely/not/here.csv")?)
        }
        assert!(matches!(open_missing(), Err(PipelineError::Io(_))));
    }
}
