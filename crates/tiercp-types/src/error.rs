//! Error types and handling for TierCP
//!
//! This module provides the error taxonomy shared by the device, config and engine
//! crates. Transfer failures are modelled explicitly so callers can distinguish
//! pre-flight rejections (missing source, insufficient space) from failures that
//! happen while bytes are moving.

use std::path::PathBuf;

/// Error severity level
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ErrorSeverity {
    /// Low severity - operation can continue
    Low,
    /// Medium severity - operation should be retried
    Medium,
    /// High severity - operation should be aborted
    High,
    /// Critical severity - entire process should be terminated
    Critical,
}

/// Main error type for TierCP operations
#[derive(thiserror::Error, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Error {
    /// I/O operation failed outside of a transfer
    #[error("I/O error: {message}")]
    Io {
        /// Error message from the I/O operation
        message: String,
    },

    /// The source path of an operation does not exist
    #[error("Source not found: {path}")]
    SourceNotFound {
        /// Path that was expected to exist
        path: PathBuf,
    },

    /// A destination directory could not be created
    #[error("Failed to create directory {path}: {message}")]
    DirectoryCreateFailed {
        /// Directory that could not be created
        path: PathBuf,
        /// Underlying failure
        message: String,
    },

    /// A source file could not be opened for reading
    #[error("Failed to open source {path}: {message}")]
    SourceOpenFailed {
        /// Source file
        path: PathBuf,
        /// Underlying failure
        message: String,
    },

    /// A destination file could not be opened for writing
    #[error("Failed to open destination {path}: {message}")]
    DestinationOpenFailed {
        /// Destination file
        path: PathBuf,
        /// Underlying failure
        message: String,
    },

    /// Reading or writing failed while a file was being transferred
    #[error("Transfer failed from {source_path} to {destination}: {message}")]
    Transfer {
        /// File being read
        source_path: PathBuf,
        /// File being written
        destination: PathBuf,
        /// Underlying failure
        message: String,
    },

    /// The destination volume cannot hold the planned operation
    #[error("Insufficient space on {path}: {required} bytes required, {available} available")]
    InsufficientSpace {
        /// Destination that was checked
        path: PathBuf,
        /// Bytes the operation needs
        required: u64,
        /// Bytes the volume reports free
        available: u64,
    },

    /// Source and destination are the same file, or the destination lies
    /// inside the source tree
    #[error("Destination {destination} overlaps source {source_path}")]
    OverlappingPaths {
        /// Source as given
        source_path: PathBuf,
        /// Destination as given
        destination: PathBuf,
    },

    /// Directory traversal failed before any data moved
    #[error("Planning failed: {message}")]
    PlanningFailed {
        /// Error message describing the traversal failure
        message: String,
    },

    /// Some files of a directory operation failed and were skipped
    #[error("{failed} of {total} files failed to transfer")]
    PartialFailure {
        /// Number of failed files
        failed: u64,
        /// Number of files in the plan
        total: u64,
    },

    /// Configuration error
    #[error("Configuration error: {message}")]
    Config {
        /// Error message describing the configuration issue
        message: String,
    },

    /// Device detection error
    #[error("Device detection error: {message}")]
    DeviceDetection {
        /// Error message describing the device detection issue
        message: String,
    },

    /// Operation cancelled
    #[error("Operation cancelled")]
    Cancelled,

    /// Operation timed out
    #[error("Operation timed out after {seconds} seconds")]
    Timeout {
        /// Number of seconds after which the operation timed out
        seconds: u64,
    },

    /// Generic error with custom message
    #[error("{message}")]
    Other {
        /// Custom error message
        message: String,
    },
}

/// Error kind for categorizing errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// I/O related errors
    Io,
    /// Pre-flight rejections: missing source, no space, planning failures
    Preflight,
    /// Failures while data was moving
    Transfer,
    /// Configuration errors
    Config,
    /// Device detection errors
    DeviceDetection,
    /// Cancellation
    Cancelled,
    /// Timeout
    Timeout,
    /// Other errors
    Other,
}

impl Error {
    /// Get the error kind
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Io { .. } => ErrorKind::Io,
            Self::SourceNotFound { .. }
            | Self::InsufficientSpace { .. }
            | Self::OverlappingPaths { .. }
            | Self::PlanningFailed { .. } => ErrorKind::Preflight,
            Self::DirectoryCreateFailed { .. }
            | Self::SourceOpenFailed { .. }
            | Self::DestinationOpenFailed { .. }
            | Self::Transfer { .. }
            | Self::PartialFailure { .. } => ErrorKind::Transfer,
            Self::Config { .. } => ErrorKind::Config,
            Self::DeviceDetection { .. } => ErrorKind::DeviceDetection,
            Self::Cancelled => ErrorKind::Cancelled,
            Self::Timeout { .. } => ErrorKind::Timeout,
            Self::Other { .. } => ErrorKind::Other,
        }
    }

    /// Get the error severity level
    pub fn severity(&self) -> ErrorSeverity {
        match self {
            Self::Io { .. } => ErrorSeverity::Medium,
            Self::SourceNotFound { .. } | Self::InsufficientSpace { .. } => ErrorSeverity::High,
            Self::OverlappingPaths { .. } | Self::PlanningFailed { .. } => ErrorSeverity::High,
            Self::DirectoryCreateFailed { .. }
            | Self::SourceOpenFailed { .. }
            | Self::DestinationOpenFailed { .. } => ErrorSeverity::High,
            Self::Transfer { .. } => ErrorSeverity::Medium,
            Self::PartialFailure { .. } => ErrorSeverity::Medium,
            Self::Config { .. } => ErrorSeverity::High,
            Self::DeviceDetection { .. } => ErrorSeverity::Low,
            Self::Cancelled => ErrorSeverity::Low,
            Self::Timeout { .. } => ErrorSeverity::Medium,
            Self::Other { .. } => ErrorSeverity::Medium,
        }
    }

    /// Check if this error is recoverable
    pub fn is_recoverable(&self) -> bool {
        match self {
            Self::Io { message } | Self::Transfer { message, .. } => {
                message.contains("Interrupted")
                    || message.contains("WouldBlock")
                    || message.contains("TimedOut")
            }
            Self::Timeout { .. } | Self::DeviceDetection { .. } | Self::Other { .. } => true,
            Self::Cancelled
            | Self::SourceNotFound { .. }
            | Self::InsufficientSpace { .. }
            | Self::OverlappingPaths { .. }
            | Self::PlanningFailed { .. }
            | Self::DirectoryCreateFailed { .. }
            | Self::SourceOpenFailed { .. }
            | Self::DestinationOpenFailed { .. }
            | Self::PartialFailure { .. }
            | Self::Config { .. } => false,
        }
    }

    /// Check if this error is a cancellation
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }

    /// Create a new configuration error
    pub fn config<S: Into<String>>(message: S) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Create a new device detection error
    pub fn device_detection<S: Into<String>>(message: S) -> Self {
        Self::DeviceDetection {
            message: message.into(),
        }
    }

    /// Create a new planning error
    pub fn planning<S: Into<String>>(message: S) -> Self {
        Self::PlanningFailed {
            message: message.into(),
        }
    }

    /// Create a new generic error
    pub fn other<S: Into<String>>(message: S) -> Self {
        Self::Other {
            message: message.into(),
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(error: std::io::Error) -> Self {
        Self::Io {
            message: error.to_string(),
        }
    }
}
