//! Custom error types for burn test post-processing.
//!
//! This module defines `PostError`, the single error type returned by every
//! library operation. Using the `thiserror` crate, it gives each failure mode of
//! the analysis engine its own variant so that callers (the CLI, the worker
//! pool, tests) can match on the kind of failure rather than parse messages.
//!
//! ## Error Hierarchy
//!
//! - **Input errors** - `CaptureLoad`, `MissingChannel`, `MissingMeta`,
//!   `ChannelLength`, `InvalidSampleRate`: the capture on disk is malformed or
//!   does not contain what the analysis needs. Fatal to the dataset.
//! - **Policy errors** - `OverwriteDenied`: a results directory already exists
//!   and `force` was not given. Raised before any filesystem change.
//! - **Numeric errors** - `DivisionByZero`, `DegenerateCrossing`,
//!   `InvalidFrameRate`: the data or the hardware configuration makes a
//!   computation undefined. These are never silently skipped.
//! - **Lookup errors** - `DatasetNotFound`, `AmbiguousDataset`.
//! - **Scheduling errors** - `Worker`: a parallel worker panicked or was
//!   cancelled. `DatasetsFailed`: a multi-dataset run finished with failures.
//! - **Wrapped errors** - `Io`, `Json`, `Csv`, `Image`, `Figment`, `Config`.
//!
//! None of these are transient, so nothing in the crate retries.

use std::path::PathBuf;
use thiserror::Error;

/// Convenience alias for results using the crate error type.
pub type AppResult<T> = std::result::Result<T, PostError>;

/// Primary error type for burn test post-processing.
#[derive(Error, Debug)]
pub enum PostError {
    /// A capture file could not be read or parsed.
    #[error("Failed to load capture '{}': {reason}", .path.display())]
    CaptureLoad {
        /// Capture file that failed.
        path: PathBuf,
        /// Human readable cause.
        reason: String,
    },

    /// A requested channel does not exist in the store.
    #[error("Channel '{0}' not found")]
    MissingChannel(String),

    /// A metadata key or hardware parameter is missing from a capture configuration.
    #[error("Capture configuration has no '{0}'")]
    MissingMeta(String),

    /// Channels of one store disagree on sample count.
    #[error("Channel '{channel}' has {actual} samples, expected {expected}")]
    ChannelLength {
        /// Offending channel.
        channel: String,
        /// Sample count of the first channel.
        expected: usize,
        /// Sample count of the offending channel.
        actual: usize,
    },

    /// Sample rate is not a positive finite number.
    #[error("Invalid sample rate {0} Hz")]
    InvalidSampleRate(f64),

    /// The results directory exists and overwriting was not permitted.
    #[error("Disallowed from overwriting {}. Use \"force\" to override.", .0.display())]
    OverwriteDenied(PathBuf),

    /// A ratio was requested with a zero denominator.
    #[error("Division by zero computing {quantity}: {numerator} / 0")]
    DivisionByZero {
        /// Name of the derived quantity.
        quantity: String,
        /// Numerator of the failed ratio.
        numerator: f64,
    },

    /// Interpolation at a detected crossing has no defined slope.
    #[error("Degenerate crossing at sample {index}: slope between {left} and {right} is not usable")]
    DegenerateCrossing {
        /// Index of the left-hand sample of the crossing.
        index: usize,
        /// Monitored value at `index`.
        left: f64,
        /// Monitored value at `index + 1`.
        right: f64,
    },

    /// The animation frame rate cannot be honoured at this sample rate.
    #[error("Invalid frame rate {fps} fps for sample rate {sample_rate} Hz")]
    InvalidFrameRate {
        /// Capture sample rate in Hz.
        sample_rate: f64,
        /// Requested frames per second.
        fps: f64,
    },

    /// No dataset directory ends with the given suffix.
    #[error("No dataset ends with '{0}'")]
    DatasetNotFound(String),

    /// More than one dataset directory ends with the given suffix.
    #[error("Found multiple datasets that end with '{suffix}': {}", .matches.join(", "))]
    AmbiguousDataset {
        /// Suffix given on the command line.
        suffix: String,
        /// Every matching directory name.
        matches: Vec<String>,
    },

    /// A dataset worker stopped without producing a result.
    #[error("Dataset worker aborted: {0}")]
    Worker(String),

    /// Some datasets of a parallel run did not finish.
    #[error("{failed} of {total} datasets failed")]
    DatasetsFailed {
        /// Datasets that failed.
        failed: usize,
        /// Datasets in the run.
        total: usize,
    },

    /// Configuration parsed but failed validation.
    #[error("Configuration validation error: {0}")]
    Config(String),

    /// Configuration could not be extracted.
    #[error("Configuration error: {0}")]
    Figment(#[from] Box<figment::Error>),

    /// Standard I/O failure.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON encoding or decoding failure.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// CSV encoding or decoding failure.
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// Image encoding failure.
    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),
}

impl From<figment::Error> for PostError {
    fn from(value: figment::Error) -> Self {
        PostError::Figment(Box::new(value))
    }
}

impl PostError {
    /// Build a [`PostError::CaptureLoad`] for `path`.
    pub fn capture_load(path: impl Into<PathBuf>, reason: impl std::fmt::Display) -> Self {
        PostError::CaptureLoad {
            path: path.into(),
            reason: reason.to_string(),
        }
    }

    /// Short machine-friendly label for the error kind, used in run reports.
    pub fn kind(&self) -> &'static str {
        match self {
            PostError::CaptureLoad { .. }
            | PostError::MissingChannel(_)
            | PostError::MissingMeta(_)
            | PostError::ChannelLength { .. }
            | PostError::InvalidSampleRate(_) => "capture_load",
            PostError::OverwriteDenied(_) => "overwrite_denied",
            PostError::DivisionByZero { .. } => "division_by_zero",
            PostError::DegenerateCrossing { .. } => "degenerate_crossing",
            PostError::InvalidFrameRate { .. } => "invalid_frame_rate",
            PostError::DatasetNotFound(_) | PostError::AmbiguousDataset { .. } => "dataset_lookup",
            PostError::Config(_) | PostError::Figment(_) => "config",
            PostError::Io(_) => "io",
            PostError::Worker(_) => "worker",
            PostError::DatasetsFailed { .. } => "datasets_failed",
            PostError::Json(_) | PostError::Csv(_) => "serialization",
            PostError::Image(_) => "render",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn overwrite_message_mentions_force() {
        let err = PostError::OverwriteDenied(PathBuf::from("data/run1/post1"));
        let msg = err.to_string();
        assert!(msg.contains("data/run1/post1"));
        assert!(msg.contains("force"));
        assert_eq!(err.kind(), "overwrite_denied");
    }

    #[test]
    fn ambiguous_dataset_lists_matches() {
        let err = PostError::AmbiguousDataset {
            suffix: "01".into(),
            matches: vec!["20240101".into(), "20240201".into()],
        };
        assert!(err.to_string().contains("20240101, 20240201"));
    }

    #[test]
    fn io_errors_convert_with_question_mark() {
        fn fails() -> AppResult<()> {
            Err(std::io::Error::from(std::io::ErrorKind::NotFound))?;
            Ok(())
        }
        match fails() {
            Err(PostError::Io(e)) => assert_eq!(e.kind(), std::io::ErrorKind::NotFound),
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn capture_errors_share_a_kind() {
        assert_eq!(PostError::MissingChannel("Oxygen".into()).kind(), "capture_load");
        assert_eq!(PostError::InvalidSampleRate(0.0).kind(), "capture_load");
        assert_eq!(
            PostError::capture_load("burn.dat", "bad header").kind(),
            "capture_load"
        );
    }
}
