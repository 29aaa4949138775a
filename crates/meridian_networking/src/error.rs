//! # Error Types
//!
//! Decode failures are per message: the message is dropped and the
//! connection is kept. Everything else surfaces as [`NetError`].

use meridian_core::{ConfigError, StoreError};
use thiserror::Error;

/// Failure to decode one wire message.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    /// Zero-length message.
    #[error("empty message")]
    Empty,

    /// Leading byte is not a known message kind.
    #[error("unknown message kind {0}")]
    UnknownKind(u8),

    /// Component tag in an observer record is not a known kind.
    #[error("unknown component kind {0}")]
    UnknownComponent(u8),

    /// Payload ended before a field could be read.
    #[error("truncated payload: needed {needed} bytes, {remaining} remaining")]
    Truncated {
        /// Bytes the read required.
        needed: usize,
        /// Bytes left in the payload.
        remaining: usize,
    },

    /// Message kind is valid but not expected in this direction.
    #[error("unexpected message kind {0}")]
    Unexpected(u8),
}

/// Result alias for decoding.
pub type DecodeResult<T> = Result<T, DecodeError>;

/// Networking error.
#[derive(Debug, Error)]
pub enum NetError {
    /// A message could not be decoded.
    #[error(transparent)]
    Decode(#[from] DecodeError),

    /// The store refused an operation.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// Configuration could not be loaded.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// The peer side of a channel is gone.
    #[error("channel closed")]
    ChannelClosed,

    /// A bounded channel is at capacity.
    #[error("channel full")]
    ChannelFull,
}

/// Result alias for networking operations.
pub type NetResult<T> = Result<T, NetError>;
