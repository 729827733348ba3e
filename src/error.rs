//! Error types for csrkit
//!
//! Every public entry point returns [`Result`]. At the C boundary an error is
//! collapsed into a [`Status`] code.

use thiserror::Error;

/// Result type alias using csrkit's error
pub type Result<T> = std::result::Result<T, SparseError>;

/// Errors reported by csrkit routines
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SparseError {
    /// The library handle is missing or unusable
    #[error("Invalid handle")]
    InvalidHandle,

    /// A required buffer, descriptor or info object is missing
    #[error("Invalid pointer: '{0}' is missing")]
    InvalidPointer(&'static str),

    /// A size argument is negative or a buffer is too short for its size
    #[error("Invalid size for '{arg}': {value}")]
    InvalidSize {
        /// The argument name
        arg: &'static str,
        /// The offending value
        value: i64,
    },

    /// An enum argument is out of range or analysis data does not match
    #[error("Invalid value: {0}")]
    InvalidValue(&'static str),

    /// The requested operation or matrix type is not supported
    #[error("Not implemented: {0}")]
    NotImplemented(&'static str),

    /// The device wavefront size is not supported by the kernel
    #[error("Architecture mismatch: wavefront size {wavefront_size} is not supported")]
    ArchMismatch {
        /// Wavefront size of the device
        wavefront_size: u32,
    },

    /// A workspace allocation failed
    #[error("Out of memory: failed to allocate {bytes} bytes")]
    Memory {
        /// Requested size in bytes
        bytes: usize,
    },

    /// Unexpected internal failure
    #[error("Internal error: {0}")]
    Internal(String),
}

impl SparseError {
    /// Shorthand for an invalid size of `arg`
    pub fn size(arg: &'static str, value: impl Into<i64>) -> Self {
        Self::InvalidSize {
            arg,
            value: value.into(),
        }
    }

    /// Shorthand for a failed allocation of `count` elements of `T`
    pub fn memory<T>(count: usize) -> Self {
        Self::Memory {
            bytes: count.saturating_mul(std::mem::size_of::<T>()),
        }
    }
}

/// Status codes returned through the C ABI
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Status {
    /// Success
    Success = 0,
    /// Handle not initialized, invalid or null
    InvalidHandle = 1,
    /// Function is not implemented
    NotImplemented = 2,
    /// Invalid pointer parameter
    InvalidPointer = 3,
    /// Invalid size parameter
    InvalidSize = 4,
    /// Failed memory allocation
    MemoryError = 5,
    /// Other internal library failure
    InternalError = 6,
    /// Invalid value parameter
    InvalidValue = 7,
    /// Device architecture mismatch
    ArchMismatch = 8,
}

impl From<&SparseError> for Status {
    fn from(err: &SparseError) -> Self {
        match err {
            SparseError::InvalidHandle => Status::InvalidHandle,
            SparseError::InvalidPointer(_) => Status::InvalidPointer,
            SparseError::InvalidSize { .. } => Status::InvalidSize,
            SparseError::InvalidValue(_) => Status::InvalidValue,
            SparseError::NotImplemented(_) => Status::NotImplemented,
            SparseError::ArchMismatch { .. } => Status::ArchMismatch,
            SparseError::Memory { .. } => Status::MemoryError,
            SparseError::Internal(_) => Status::InternalError,
        }
    }
}

impl<T> From<Result<T>> for Status {
    fn from(result: Result<T>) -> Self {
        match result {
            Ok(_) => Status::Success,
            Err(err) => Status::from(&err),
        }
    }
}
