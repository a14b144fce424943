//! Error types for rd-eval operations.

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

/// Result type alias for rd-eval operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while acquiring samples or comparing curves.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    /// A child process could not be started.
    #[error("Failed to spawn {program}: {source}")]
    Spawn {
        /// Program that failed to start.
        program: String,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// A child process exited unsuccessfully.
    #[error("{program} exited with {status}: {stderr}")]
    Subprocess {
        /// Program that failed.
        program: String,
        /// Exit status description.
        status: String,
        /// Tail of the captured standard error.
        stderr: String,
    },

    /// A child process did not finish within its time budget and was killed.
    #[error("{program} timed out after {timeout:?}")]
    Timeout {
        /// Program that timed out.
        program: String,
        /// Configured limit.
        timeout: Duration,
    },

    /// The encoder did not print a byte count on standard output.
    #[error("Unparsable byte count from {program}: {output:?}")]
    ByteCount {
        /// Encoder program.
        program: String,
        /// Trimmed standard output.
        output: String,
    },

    /// The metric tool printed something that is not a usable score array.
    #[error("Metric output error ({metric}): {reason}")]
    MetricOutput {
        /// Metric name.
        metric: String,
        /// Reason for the failure.
        reason: String,
    },

    /// Invalid quality value provided.
    #[error("Invalid quality value: {0}")]
    InvalidQuality(f64),

    /// A size that cannot enter a log-domain comparison.
    #[error("Invalid size for log-domain comparison: {0} bytes")]
    InvalidSize(u64),

    /// Two samples of one curve share the same quality value.
    #[error("Duplicate quality value {0} in rate-distortion curve")]
    DuplicateQuality(f64),

    /// Too few samples for the requested interpolant.
    #[error("Insufficient samples: need at least {required}, got {actual}")]
    InsufficientSamples {
        /// Minimum number of samples.
        required: usize,
        /// Number of samples supplied.
        actual: usize,
    },

    /// The quality ranges of the compared curves do not overlap.
    #[error("No overlapping quality range: [{min}, {max}]")]
    NoOverlap {
        /// Lower bound of the intersection.
        min: f64,
        /// Upper bound of the intersection.
        max: f64,
    },

    /// An interpolant was evaluated outside its fitted domain.
    #[error("Evaluation at {x} outside fitted domain [{min}, {max}]")]
    OutOfDomain {
        /// Requested abscissa.
        x: f64,
        /// Lower bound of the domain.
        min: f64,
        /// Upper bound of the domain.
        max: f64,
    },

    /// Grid size of zero.
    #[error("Quality grid needs at least one point")]
    EmptyGrid,

    /// A comparison failed for an identified video and configuration.
    #[error("Comparison failed for {video} [{tag}]: {source}")]
    Comparison {
        /// Video name.
        video: String,
        /// Configuration tag.
        tag: String,
        /// Underlying failure.
        #[source]
        source: Box<Error>,
    },

    /// Catalog files are missing or inconsistent.
    #[error("Catalog error: {0}")]
    Catalog(String),

    /// Catalog file could not be read or parsed.
    #[error("Catalog file {path}: {reason}")]
    CatalogFile {
        /// Offending file.
        path: PathBuf,
        /// Reason for the failure.
        reason: String,
    },

    /// Parameter search misconfiguration.
    #[error("Search error: {0}")]
    Search(String),

    /// Error writing report files.
    #[error("Report error: {0}")]
    Report(String),

    /// I/O error wrapper.
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// CSV error.
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
}

impl Error {
    /// Attach the video and configuration tag a comparison failed for.
    #[must_use]
    pub fn for_comparison(self, video: &str, tag: &str) -> Self {
        Self::Comparison {
            video: video.to_string(),
            tag: tag.to_string(),
            source: Box::new(self),
        }
    }

    /// Whether this error came from running a child process.
    #[must_use]
    pub fn is_subprocess(&self) -> bool {
        matches!(
            self,
            Self::Spawn { .. }
                | Self::Subprocess { .. }
                | Self::Timeout { .. }
                | Self::ByteCount { .. }
                | Self::MetricOutput { .. }
        )
    }
}
