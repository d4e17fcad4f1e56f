//! Error types for running test cases.
//!
//! [`RunError`] is fatal to the whole invocation. [`TestCaseError`] and
//! [`CollaboratorError`] are confined to the test case that raised
//! them: the pool logs them and moves on.

use std::path::PathBuf;
use std::process::ExitStatus;
use std::time::Duration;

use pagecompare_core::{ConfigError, ManifestError, RegistryError};

/// Errors that abort a run.
#[derive(Debug, thiserror::Error)]
pub enum RunError {
    /// The working root has no test case directories.
    #[error("no test cases found in {}", .0.display())]
    NoTestCases(PathBuf),

    /// The configuration is unusable.
    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),

    /// Reading the working root or a test case directory failed.
    #[error("I/O error at {}: {source}", .path.display())]
    Io {
        /// Path being accessed.
        path: PathBuf,
        /// Underlying error.
        source: std::io::Error,
    },

    /// Writing the registry or manifest failed.
    #[error("failed to persist {}: {source}", .path.display())]
    Persist {
        /// File being written.
        path: PathBuf,
        /// Underlying error.
        source: std::io::Error,
    },

    /// The persisted registry could not be loaded or serialized.
    #[error("{}: {source}", .path.display())]
    Registry {
        /// Registry file.
        path: PathBuf,
        /// Underlying error.
        source: RegistryError,
    },

    /// The persisted manifest could not be loaded or serialized.
    #[error("{}: {source}", .path.display())]
    Manifest {
        /// Manifest file.
        path: PathBuf,
        /// Underlying error.
        source: ManifestError,
    },

    /// A worker thread could not be started.
    #[error("failed to spawn worker thread: {0}")]
    Spawn(std::io::Error),
}

/// Failure of an external build or render invocation.
#[derive(Debug, thiserror::Error)]
pub enum CollaboratorError {
    /// The program could not be started.
    #[error("failed to start {program}: {source}")]
    Spawn {
        /// Program name.
        program: String,
        /// Underlying error.
        source: std::io::Error,
    },

    /// The program exited unsuccessfully.
    #[error("{program} exited with {status}")]
    Failed {
        /// Program name.
        program: String,
        /// Exit status.
        status: ExitStatus,
    },

    /// The program exceeded its time limit and was killed.
    #[error("{program} timed out after {}s", .after.as_secs())]
    TimedOut {
        /// Program name.
        program: String,
        /// Configured limit.
        after: Duration,
    },

    /// Waiting on the program or preparing its log failed.
    #[error("I/O error while running {program}: {source}")]
    Io {
        /// Program name.
        program: String,
        /// Underlying error.
        source: std::io::Error,
    },

    /// A collaborator implemented in-process reported failure.
    #[error("{0}")]
    Other(String),
}

/// Failure confined to one test case.
#[derive(Debug, thiserror::Error)]
pub enum TestCaseError {
    /// Removing or creating the test case's output folders failed.
    #[error("I/O error at {}: {source}", .path.display())]
    Io {
        /// Path being prepared.
        path: PathBuf,
        /// Underlying error.
        source: std::io::Error,
    },

    /// The build step failed.
    #[error("build failed: {0}")]
    Build(#[source] CollaboratorError),

    /// A render step failed.
    #[error("render of {variant} failed: {source}")]
    Render {
        /// Variant being rendered.
        variant: String,
        /// Underlying error.
        source: CollaboratorError,
    },
}
