//! # Wire Protocol
//!
//! Every message is one frame:
//!
//! ```text
//! ┌────────────┬──────────────────────────────────────────┐
//! │ kind (u8)  │ payload (little-endian, kind-specific)   │
//! └────────────┴──────────────────────────────────────────┘
//! ```
//!
//! Component payloads are struct-of-arrays batches built from the store's
//! columns. Entity membership travels separately through the observer codec.
//! Only these bytes cross between server and client.

mod messages;
mod observer;
mod registry;
mod serialization;
mod soa;

pub use messages::{decode_acknowledge, decode_connected, encode_acknowledge, encode_connected, InputMessage};
pub use observer::{ObserverCodec, ObserverSummary};
pub use registry::CodecRegistry;
pub use serialization::{Reader, Writer};
pub use soa::SoaCodec;

use crate::error::{DecodeError, DecodeResult};

/// Closed set of message kinds, tagged by the first byte of a frame.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(u8)]
pub enum MessageKind {
    /// Entity membership changes (observer codec).
    Entities = 0,
    /// Server assigns the connection's entity.
    Connected = 1,
    /// Client input.
    Input = 2,
    /// Last input sequence the server applied for the receiver's entity.
    Acknowledge = 3,
    /// Position batch.
    Position = 4,
    /// Velocity batch.
    Velocity = 5,
    /// Rotation batch.
    Rotation = 6,
    /// Stats batch.
    Stats = 7,
    /// Projectile batch.
    Projectile = 8,
    /// Health batch.
    Health = 9,
    /// Energy batch.
    Energy = 10,
    /// Movement batch.
    Movement = 11,
}

/// Number of message kinds.
pub const MESSAGE_KIND_COUNT: usize = 12;

impl MessageKind {
    /// Every kind, ordered by tag.
    pub const ALL: [Self; MESSAGE_KIND_COUNT] = [
        Self::Entities,
        Self::Connected,
        Self::Input,
        Self::Acknowledge,
        Self::Position,
        Self::Velocity,
        Self::Rotation,
        Self::Stats,
        Self::Projectile,
        Self::Health,
        Self::Energy,
        Self::Movement,
    ];

    /// Converts a raw tag to a kind.
    #[must_use]
    pub const fn from_u8(value: u8) -> Option<Self> {
        if (value as usize) < MESSAGE_KIND_COUNT {
            Some(Self::ALL[value as usize])
        } else {
            None
        }
    }

    /// Position of this kind in per-kind lookup tables.
    #[inline]
    #[must_use]
    pub const fn index(self) -> usize {
        self as usize
    }
}

/// Prefixes `payload` with its kind tag.
#[must_use]
pub fn frame(kind: MessageKind, payload: &[u8]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(payload.len() + 1);
    bytes.push(kind as u8);
    bytes.extend_from_slice(payload);
    bytes
}

/// Splits a frame into its kind and payload.
///
/// # Errors
///
/// Returns [`DecodeError::Empty`] for zero-length input and
/// [`DecodeError::UnknownKind`] for an unrecognised tag.
pub fn parse(bytes: &[u8]) -> DecodeResult<(MessageKind, &[u8])> {
    let (&tag, payload) = bytes.split_first().ok_or(DecodeError::Empty)?;
    let kind = MessageKind::from_u8(tag).ok_or(DecodeError::UnknownKind(tag))?;
    Ok((kind, payload))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_and_parse() {
        let bytes = frame(MessageKind::Velocity, &[1, 2, 3]);
        assert_eq!(bytes, vec![5, 1, 2, 3]);
        let (kind, payload) = parse(&bytes).unwrap();
        assert_eq!(kind, MessageKind::Velocity);
        assert_eq!(payload, &[1, 2, 3]);
    }

    #[test]
    fn test_parse_rejects_bad_frames() {
        assert_eq!(parse(&[]), Err(DecodeError::Empty));
        assert_eq!(parse(&[200, 0]), Err(DecodeError::UnknownKind(200)));
    }

    #[test]
    fn test_tags_are_stable() {
        for (i, kind) in MessageKind::ALL.iter().enumerate() {
            assert_eq!(kind.index(), i);
            assert_eq!(MessageKind::from_u8(i as u8), Some(*kind));
        }
    }
}
