//! Error types for the gattkit library
//!
//! This module defines the error type used throughout the library.

use crate::att::AttErrorCode;
use crate::transport::TransportError;
use thiserror::Error;

/// Errors that can occur in the library
#[derive(Debug, Error)]
pub enum Error {
    #[error("Operation invalid in current handler state")]
    InvalidState,

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Octet access out of bounds: offset {offset} + count {count} > size {size}")]
    OutOfBounds {
        offset: usize,
        count: usize,
        size: usize,
    },

    #[error("Invalid UUID size: {0} octets")]
    InvalidUuidSize(usize),

    #[error("Truncated advertising element at offset {0}")]
    TruncatedAdElement(usize),

    #[error("ATT error {code:?} on handle 0x{handle:04X}")]
    Att { code: AttErrorCode, handle: u16 },

    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("Protocol error: unexpected opcode 0x{0:02X}")]
    Protocol(u8),

    #[error("Operation cancelled")]
    Cancelled,
}

/// Result type used throughout the library
pub type Result<T> = std::result::Result<T, Error>;
