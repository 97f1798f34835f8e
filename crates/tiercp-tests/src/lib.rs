//! TierCP integration testing support
//!
//! This crate holds the cross-crate integration tests and the scripted
//! fakes they run against, so detection and staging can be exercised on any
//! host without real drive letters or a RAM disk.

#![warn(missing_docs)]
#![warn(clippy::all)]

/// Scripted probes, refiners and test data generators
pub mod test_utils;
