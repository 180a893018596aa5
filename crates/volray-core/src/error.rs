//! Error types for volray.

use std::path::PathBuf;

use thiserror::Error;

/// The main error type for volray operations.
#[derive(Error, Debug)]
pub enum VolrayError {
    /// A file could not be opened or read.
    #[error("failed to read '{}': {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A raw volume file does not hold exactly `w * h * d` samples.
    #[error("volume '{}' has {actual} bytes, expected {expected}", path.display())]
    VolumeSizeMismatch {
        path: PathBuf,
        expected: usize,
        actual: usize,
    },

    /// Bit depth outside of {8, 10, 12, 16}.
    #[error("unsupported bit depth: {0}")]
    UnsupportedBitDepth(u32),

    /// A preset file parsed as JSON but does not describe valid curves.
    #[error("malformed preset: {0}")]
    MalformedPreset(String),

    /// Volume dimensions with a zero extent.
    #[error("invalid volume dimensions {0}x{1}x{2}")]
    InvalidDimensions(u32, u32, u32),

    /// Invalid value in a configuration file.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// The GPU could not provide a usable render target or pipeline.
    #[error("GPU configuration error: {0}")]
    GpuConfig(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    /// JSON serialization error.
    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),
}

/// Broad failure category, used to decide how a caller recovers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Missing, unreadable or short files.
    Io,
    /// Unsupported bit depth or malformed preset contents.
    Format,
    /// Fatal to the current rendering session.
    GpuConfig,
    /// Rejected input values.
    Validation,
}

impl VolrayError {
    /// Returns the category of this error.
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Read { .. } | Self::VolumeSizeMismatch { .. } | Self::IoError(_) => ErrorKind::Io,
            Self::UnsupportedBitDepth(_) | Self::MalformedPreset(_) | Self::JsonError(_) => {
                ErrorKind::Format
            }
            Self::GpuConfig(_) => ErrorKind::GpuConfig,
            Self::InvalidDimensions(..) | Self::InvalidConfig(_) => ErrorKind::Validation,
        }
    }

    /// Returns true if the caller can fall back to a default state and keep running.
    #[must_use]
    pub fn is_recoverable(&self) -> bool {
        self.kind() != ErrorKind::GpuConfig
    }
}

/// A specialized Result type for volray operations.
pub type Result<T> = std::result::Result<T, VolrayError>;
