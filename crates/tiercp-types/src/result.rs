//! Result type alias for TierCP operations

use crate::Error;

/// Result type alias for TierCP operations
pub type Result<T> = std::result::Result<T, Error>;
