//! Fixed-layout control messages: input, connected, acknowledge.

use meridian_core::InputState;

use super::serialization::{Reader, Writer};
use super::{frame, MessageKind};
use crate::error::DecodeResult;

/// Client input as sent on the wire.
///
/// Layout: `[kind][sequence:u32][buttons:u16][mouse_x:i16][mouse_y:i16]`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct InputMessage {
    /// Client-side sequence, wrapping at `u32::MAX`.
    pub sequence: u32,
    /// Sampled input.
    pub input: InputState,
}

impl InputMessage {
    /// Payload size in bytes, excluding the kind tag.
    pub const PAYLOAD_SIZE: usize = 4 + std::mem::size_of::<InputState>();

    /// Encodes a full framed message.
    #[must_use]
    pub fn encode(&self) -> Vec<u8> {
        let mut writer = Writer::with_capacity(Self::PAYLOAD_SIZE + 1);
        writer.write_u8(MessageKind::Input as u8);
        writer.write_u32(self.sequence);
        writer.write_pod(&self.input);
        writer.into_vec()
    }

    /// Decodes an input payload (kind tag already stripped).
    ///
    /// # Errors
    ///
    /// Returns [`DecodeError::Truncated`](crate::DecodeError::Truncated) for short payloads.
    pub fn decode(payload: &[u8]) -> DecodeResult<Self> {
        let mut reader = Reader::new(payload);
        let sequence = reader.read_u32()?;
        let input = reader.read_pod::<InputState>()?;
        Ok(Self { sequence, input })
    }
}

/// Encodes `[Connected][assigned_entity_id:u32]`.
#[must_use]
pub fn encode_connected(entity_bits: u32) -> Vec<u8> {
    frame(MessageKind::Connected, &entity_bits.to_le_bytes())
}

/// Decodes a connected payload into the assigned server entity id.
///
/// # Errors
///
/// Returns [`DecodeError::Truncated`](crate::DecodeError::Truncated) for short payloads.
pub fn decode_connected(payload: &[u8]) -> DecodeResult<u32> {
    Reader::new(payload).read_u32()
}

/// Encodes `[Acknowledge][sequence:u32]`.
#[must_use]
pub fn encode_acknowledge(sequence: u32) -> Vec<u8> {
    frame(MessageKind::Acknowledge, &sequence.to_le_bytes())
}

/// Decodes an acknowledge payload into the acknowledged sequence.
///
/// # Errors
///
/// Returns [`DecodeError::Truncated`](crate::DecodeError::Truncated) for short payloads.
pub fn decode_acknowledge(payload: &[u8]) -> DecodeResult<u32> {
    Reader::new(payload).read_u32()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::DecodeError;
    use crate::protocol::parse;
    use meridian_core::Button;

    #[test]
    fn test_input_layout() {
        let message = InputMessage {
            sequence: 0x0102_0304,
            input: InputState {
                buttons: Button::Up.mask() | Button::Escape.mask(),
                mouse_x: -1,
                mouse_y: 2,
            },
        };
        let bytes = message.encode();
        assert_eq!(bytes.len(), 11);
        assert_eq!(bytes[0], MessageKind::Input as u8);
        assert_eq!(&bytes[1..5], &[4, 3, 2, 1]);
        assert_eq!(&bytes[5..7], &0x8001u16.to_le_bytes());

        let (kind, payload) = parse(&bytes).unwrap();
        assert_eq!(kind, MessageKind::Input);
        assert_eq!(InputMessage::decode(payload).unwrap(), message);
    }

    #[test]
    fn test_truncated_input() {
        assert!(matches!(
            InputMessage::decode(&[1, 0, 0, 0, 5]),
            Err(DecodeError::Truncated { .. })
        ));
    }

    #[test]
    fn test_connected_and_acknowledge() {
        let bytes = encode_connected(0x0010_0003);
        assert_eq!(bytes, vec![1, 3, 0, 0x10, 0]);
        assert_eq!(decode_connected(&bytes[1..]).unwrap(), 0x0010_0003);

        let bytes = encode_acknowledge(42);
        assert_eq!(bytes[0], MessageKind::Acknowledge as u8);
        assert_eq!(decode_acknowledge(&bytes[1..]).unwrap(), 42);
    }
}
