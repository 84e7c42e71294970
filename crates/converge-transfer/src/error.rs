//! Transfer error types

use crate::report::TransferReport;
use std::path::PathBuf;
use thiserror::Error;

/// Run-level transfer failure
#[derive(Error, Debug)]
pub enum TransferError {
    #[error("Transfer failed: {0}")]
    Failed(ConsolidatedError),

    #[error("Transfer aborted on an unexpected error: {0}")]
    Critical(ConsolidatedError),

    /// Carries the report of the units that ended before the cancellation
    #[error("Transfer interrupted")]
    Interrupted(TransferReport),

    #[error("Cannot resolve resources '{pattern}' in {base_dir}\nreason: {message}")]
    Resolution {
        base_dir: PathBuf,
        pattern: String,
        message: String,
    },
}

impl TransferError {
    pub fn is_interrupted(&self) -> bool {
        matches!(self, TransferError::Interrupted(_))
    }

    /// Units that ended without error before the run gave up
    pub fn report(&self) -> Option<&TransferReport> {
        match self {
            TransferError::Failed(e) | TransferError::Critical(e) => Some(e.report()),
            TransferError::Interrupted(report) => Some(report),
            TransferError::Resolution { .. } => None,
        }
    }

    /// Collected causes, empty for an interrupted run
    pub fn causes(&self) -> &[Cause] {
        match self {
            TransferError::Failed(e) | TransferError::Critical(e) => e.causes(),
            _ => &[],
        }
    }
}

/// Failure of a single transfer unit
#[derive(Error, Debug)]
#[error("Cannot transfer {source_path} to {destination}: {kind}")]
pub struct UnitError {
    pub source_path: PathBuf,
    pub destination: PathBuf,
    #[source]
    pub kind: UnitErrorKind,
}

#[derive(Error, Debug)]
pub enum UnitErrorKind {
    #[error("I/O error on {path}: {message}")]
    Io { path: PathBuf, message: String },

    #[error(transparent)]
    Template(#[from] TemplatingError),

    #[error("{0} already exists")]
    AlreadyExists(PathBuf),

    #[error("{0} is a template but no templating handler is configured")]
    NoTemplatingHandler(PathBuf),
}

impl UnitErrorKind {
    pub fn io(path: impl Into<PathBuf>, err: std::io::Error) -> Self {
        UnitErrorKind::Io {
            path: path.into(),
            message: err.to_string(),
        }
    }
}

/// Raised by a templating handler
#[derive(Error, Debug)]
#[error("Template error: {file}\nreason: {message}")]
pub struct TemplatingError {
    pub file: PathBuf,
    pub message: String,
}

/// One collected cause of a failed run
#[derive(Error, Debug)]
pub enum Cause {
    #[error(transparent)]
    Unit(#[from] UnitError),

    /// A worker panicked or could not be joined
    #[error("Worker crashed: {0}")]
    Worker(String),
}

/// Every failure of a run, in completion order, next to what went well
#[derive(Debug, Default)]
pub struct ConsolidatedError {
    causes: Vec<Cause>,
    report: TransferReport,
}

impl ConsolidatedError {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, cause: impl Into<Cause>) {
        self.causes.push(cause.into());
    }

    pub fn with_report(mut self, report: TransferReport) -> Self {
        self.report = report;
        self
    }

    pub fn causes(&self) -> &[Cause] {
        &self.causes
    }

    pub fn report(&self) -> &TransferReport {
        &self.report
    }

    pub fn len(&self) -> usize {
        self.causes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.causes.is_empty()
    }
}

impl std::fmt::Display for ConsolidatedError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} error(s)", self.causes.len())?;
        for cause in &self.causes {
            write!(f, "\n  - {}", cause)?;
        }
        Ok(())
    }
}

impl std::error::Error for ConsolidatedError {}

pub type Result<T> = std::result::Result<T, TransferError>;
