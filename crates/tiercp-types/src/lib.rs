//! Core type system and error handling for TierCP
//!
//! This crate provides the foundational types, error handling, and shared data structures
//! used throughout the TierCP workspace. It includes:
//!
//! - **Error handling**: A transfer-oriented error taxonomy with severity levels
//! - **Core types**: Drive letters, storage classes, progress snapshots and transfer reports
//! - **Traits**: Progress reporting shared by the engine and its callers
//! - **Configuration**: Validated buffer size and thread count newtypes
//!
//! # Features
//!
//! - `std` (default): Enable standard library features
//! - `serde`: Enable serialization support
//!
//! # Examples
//!
//! ```rust
//! use tiercp_types::{DriveLetter, StorageClass};
//!
//! let letter = DriveLetter::from_path(r"R:\scratch\file.bin").unwrap();
//! assert_eq!(letter.as_char(), 'R');
//! assert!(StorageClass::Ssd.is_ambiguous());
//! ```

#![deny(missing_docs)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery)]
#![allow(clippy::module_name_repetitions)]

pub mod config;
pub mod error;
pub mod result;
pub mod traits;
pub mod types;

// Re-export commonly used types
pub use config::{BufferSize, ThreadCount};
pub use error::{Error, ErrorKind, ErrorSeverity};
pub use result::Result;
pub use traits::*;
pub use types::*;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_progress_snapshot_percentage() {
        let snapshot = ProgressSnapshot {
            current: "a.bin".to_string(),
            total_bytes: 200,
            processed_bytes: 50,
            bytes_per_second: 0.0,
            file_index: 1,
            file_count: 4,
        };
        assert_eq!(snapshot.percentage(), 25.0);
    }

    #[test]
    fn test_error_severity() {
        let io_error = Error::from(std::io::Error::new(std::io::ErrorKind::NotFound, "test"));
        assert_eq!(io_error.severity(), ErrorSeverity::Medium);

        let config_error = Error::config("invalid config");
        assert_eq!(config_error.severity(), ErrorSeverity::High);
        assert!(!config_error.is_recoverable());
    }

    #[test]
    fn test_buffer_size_validation() {
        assert!(BufferSize::new(4096).is_ok());
        assert!(BufferSize::new(10 * 1024 * 1024).is_ok());
        assert!(BufferSize::new(1024).is_err()); // Too small
        assert!(BufferSize::new(5000).is_err()); // Not page aligned
    }
}
