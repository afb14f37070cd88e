//! Custom error types for stacksort configuration.
//!
//! Sorting itself never fails — every record always ends up in exactly one
//! output block — so these errors cover configuration only (invalid
//! tolerances, conflicting tag assignments).

use thiserror::Error;

/// Result type alias for stacksort operations
pub type Result<T> = std::result::Result<T, StacksortError>;

/// Error type for stacksort configuration
#[derive(Error, Debug)]
pub enum StacksortError {
    /// Invalid parameter value provided
    #[error("Invalid parameter '{parameter}': {reason}")]
    InvalidParameter {
        /// The parameter name
        parameter: String,
        /// Explanation of why it's invalid
        reason: String,
    },

    /// Invalid tolerance value or fraction
    #[error("Invalid tolerance {value} for '{parameter}' (must be greater than {min})")]
    InvalidTolerance {
        /// The parameter name
        parameter: String,
        /// The invalid tolerance value
        value: f64,
        /// Exclusive lower bound
        min: f64,
    },
}
