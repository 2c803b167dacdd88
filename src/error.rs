#![warn(missing_docs)]
#![warn(clippy::missing_docs_in_private_items)]

use std::{fmt, path::PathBuf, time::Duration};

use thiserror::Error;

/// The four failure classes every evaluation error falls into.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// An input file does not exist.
    NotFound,
    /// An existing file could not be read or extracted.
    Io,
    /// Bad configuration or malformed input.
    Value,
    /// The generative-text service call failed.
    Service,
}

/// Identifies one of the two independent graders.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GraderLabel {
    /// The low-temperature grader.
    A,
    /// The high-temperature grader.
    B,
}

impl fmt::Display for GraderLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GraderLabel::A => write!(f, "Grader A"),
            GraderLabel::B => write!(f, "Grader B"),
        }
    }
}

/// Failure of a single call to the generative-text service.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ServiceError {
    /// The remote call itself failed (transport, quota, malformed response).
    #[error("Error during generative-text service call: {0}")]
    Request(String),
    /// The remote call did not finish in time.
    #[error("Generative-text service call timed out after {}s", .0.as_secs())]
    Timeout(Duration),
    /// The service answered without any usable text.
    #[error("Generative-text service returned no usable content")]
    EmptyResponse,
    /// The task running the call panicked or was cancelled.
    #[error("Generative-text service task aborted: {0}")]
    Aborted(String),
}

impl ServiceError {
    /// Whether retrying the same call could plausibly succeed.
    pub fn is_transient(&self) -> bool {
        !matches!(self, ServiceError::Aborted(_))
    }
}

/// Error surfaced by the evaluation pipeline.
#[derive(Error, Debug)]
pub enum EvalError {
    /// An input file does not exist.
    #[error("The file '{}' was not found.", .0.display())]
    NotFound(PathBuf),
    /// An existing file could not be read or its text extracted.
    #[error("Error reading file '{}': {detail}", .path.display())]
    Io {
        /// The file being read.
        path:   PathBuf,
        /// Underlying failure detail.
        detail: String,
    },
    /// Bad configuration or input that retrying cannot fix.
    #[error("{0}")]
    Value(String),
    /// A moderator call failed.
    #[error(transparent)]
    Service(#[from] ServiceError),
    /// One of the two concurrent grading calls failed.
    #[error("{grader} failed: {source}")]
    Grader {
        /// Which grader failed.
        grader: GraderLabel,
        /// Why it failed.
        #[source]
        source: ServiceError,
    },
}

impl EvalError {
    /// Classifies the error into one of the four failure kinds.
    pub fn kind(&self) -> ErrorKind {
        match self {
            EvalError::NotFound(_) => ErrorKind::NotFound,
            EvalError::Io { .. } => ErrorKind::Io,
            EvalError::Value(_) => ErrorKind::Value,
            EvalError::Service(_) | EvalError::Grader { .. } => ErrorKind::Service,
        }
    }

    /// Shorthand for a [`EvalError::Value`].
    pub fn value(msg: impl Into<String>) -> Self {
        EvalError::Value(msg.into())
    }

    /// Shorthand for an [`EvalError::Io`].
    pub fn io(path: impl Into<PathBuf>, detail: impl fmt::Display) -> Self {
        EvalError::Io {
            path:   path.into(),
            detail: detail.to_string(),
        }
    }
}
