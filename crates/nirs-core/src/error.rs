//! Error handling for the NIRS pipeline
//!
//! Stage-local fatal errors abort the current file only; numerically
//! degenerate conditions are reported through the warning log instead.

use core::fmt;

/// Result type alias for NIRS pipeline operations
pub type NirsResult<T> = Result<T, NirsError>;

/// Error type for all NIRS pipeline operations
#[derive(Debug, Clone, PartialEq)]
#[non_exhaustive]
pub enum NirsError {
    /// Raw file cannot be parsed into the canonical table shape
    Format {
        /// Description of the missing or malformed element
        reason: String,
    },

    /// Event marker count or ordering invalid for baseline/segmentation
    Segmentation {
        /// Description of the marker problem
        reason: String,
    },

    /// Signal shorter than the minimum required by a filtering stage
    DataTooShort {
        /// Samples available
        samples: usize,
        /// Samples required
        required: usize,
    },

    /// Table shape violates an invariant (column lengths, channel pairing)
    InvalidTable {
        /// Description of the violated invariant
        reason: String,
    },

    /// Underlying file I/O failure
    Io {
        /// Description of the I/O failure
        reason: String,
    },

    /// Invalid pipeline configuration
    Config {
        /// Description of the configuration error
        reason: String,
    },

    /// Dual-task trial processed before its subject's single-task trial
    MissingStReference {
        /// Subject id with no prior single-task entry
        subject: String,
    },
}

impl fmt::Display for NirsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NirsError::Format { reason } => {
                write!(f, "Format error: {}", reason)
            }
            NirsError::Segmentation { reason } => {
                write!(f, "Segmentation error: {}", reason)
            }
            NirsError::DataTooShort { samples, required } => {
                write!(f, "Data too short: {} samples, need more than {}",
                       samples, required)
            }
            NirsError::InvalidTable { reason } => {
                write!(f, "Invalid table: {}", reason)
            }
            NirsError::Io { reason } => {
                write!(f, "I/O error: {}", reason)
            }
            NirsError::Config { reason } => {
                write!(f, "Invalid configuration: {}", reason)
            }
            NirsError::MissingStReference { subject } => {
                write!(f, "No single-task reference recorded for subject {}",
                       subject)
            }
        }
    }
}

impl std::error::Error for NirsError {}

impl From<std::io::Error> for NirsError {
    fn from(err: std::io::Error) -> Self {
        NirsError::Io { reason: err.to_string() }
    }
}

/// Convenience macro for creating format errors
#[macro_export]
macro_rules! format_error {
    ($($arg:tt)*) => {
        $crate::error::NirsError::Format {
            reason: format!($($arg)*),
        }
    };
}

/// Convenience macro for creating segmentation errors
#[macro_export]
macro_rules! segmentation_error {
    ($($arg:tt)*) => {
        $crate::error::NirsError::Segmentation {
            reason: format!($($arg)*),
        }
    };
}
