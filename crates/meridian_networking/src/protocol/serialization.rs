//! # Byte Serialization
//!
//! Little-endian readers and writers shared by every codec.
//!
//! ## Design
//!
//! - Writers append to a reusable `Vec<u8>`
//! - Readers never panic on short input: every read is length-checked and
//!   fails with [`DecodeError::Truncated`]
//! - `Pod` values are copied directly

use bytemuck::{bytes_of, Pod};

use crate::error::{DecodeError, DecodeResult};

/// Appends little-endian values to a byte buffer.
#[derive(Clone, Debug, Default)]
pub struct Writer {
    buffer: Vec<u8>,
}

impl Writer {
    /// Creates an empty writer.
    #[must_use]
    pub const fn new() -> Self {
        Self { buffer: Vec::new() }
    }

    /// Creates a writer with room for `capacity` bytes.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            buffer: Vec::with_capacity(capacity),
        }
    }

    /// Clears the buffer, keeping its allocation.
    #[inline]
    pub fn reset(&mut self) {
        self.buffer.clear();
    }

    /// Bytes written.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    /// Returns `true` if nothing has been written.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    /// Written bytes.
    #[inline]
    #[must_use]
    pub fn as_slice(&self) -> &[u8] {
        &self.buffer
    }

    /// Mutable access for codecs that append column bytes directly.
    #[inline]
    pub fn buffer_mut(&mut self) -> &mut Vec<u8> {
        &mut self.buffer
    }

    /// Consumes the writer, returning its bytes.
    #[must_use]
    pub fn into_vec(self) -> Vec<u8> {
        self.buffer
    }

    /// Writes a single byte.
    #[inline]
    pub fn write_u8(&mut self, value: u8) {
        self.buffer.push(value);
    }

    /// Writes a u16 in little-endian format.
    #[inline]
    pub fn write_u16(&mut self, value: u16) {
        self.buffer.extend_from_slice(&value.to_le_bytes());
    }

    /// Writes an i16 in little-endian format.
    #[inline]
    pub fn write_i16(&mut self, value: i16) {
        self.buffer.extend_from_slice(&value.to_le_bytes());
    }

    /// Writes a u32 in little-endian format.
    #[inline]
    pub fn write_u32(&mut self, value: u32) {
        self.buffer.extend_from_slice(&value.to_le_bytes());
    }

    /// Overwrites a previously written u32 at `offset`.
    ///
    /// Used to back-patch counts once a section is complete.
    pub fn patch_u32(&mut self, offset: usize, value: u32) {
        if let Some(slot) = self.buffer.get_mut(offset..offset + 4) {
            slot.copy_from_slice(&value.to_le_bytes());
        }
    }

    /// Writes a Pod type directly.
    #[inline]
    pub fn write_pod<T: Pod>(&mut self, value: &T) {
        self.buffer.extend_from_slice(bytes_of(value));
    }
}

/// Reads little-endian values from a byte slice.
#[derive(Clone, Copy, Debug)]
pub struct Reader<'a> {
    buffer: &'a [u8],
    position: usize,
}

impl<'a> Reader<'a> {
    /// Creates a reader at the start of `buffer`.
    #[must_use]
    pub const fn new(buffer: &'a [u8]) -> Self {
        Self { buffer, position: 0 }
    }

    /// Bytes left to read.
    #[inline]
    #[must_use]
    pub const fn remaining(&self) -> usize {
        self.buffer.len().saturating_sub(self.position)
    }

    /// Returns `true` once every byte has been consumed.
    #[inline]
    #[must_use]
    pub const fn is_exhausted(&self) -> bool {
        self.remaining() == 0
    }

    /// Takes the next `len` bytes.
    ///
    /// # Errors
    ///
    /// Returns [`DecodeError::Truncated`] if fewer than `len` bytes remain.
    pub fn take(&mut self, len: usize) -> DecodeResult<&'a [u8]> {
        if len > self.remaining() {
            return Err(DecodeError::Truncated {
                needed: len,
                remaining: self.remaining(),
            });
        }
        let slice = &self.buffer[self.position..self.position + len];
        self.position += len;
        Ok(slice)
    }

    /// Advances past `len` bytes without reading them.
    ///
    /// # Errors
    ///
    /// Returns [`DecodeError::Truncated`] if fewer than `len` bytes remain.
    #[inline]
    pub fn skip(&mut self, len: usize) -> DecodeResult<()> {
        self.take(len).map(|_| ())
    }

    fn array<const N: usize>(&mut self) -> DecodeResult<[u8; N]> {
        let mut raw = [0u8; N];
        raw.copy_from_slice(self.take(N)?);
        Ok(raw)
    }

    /// Reads a single byte.
    ///
    /// # Errors
    ///
    /// Returns [`DecodeError::Truncated`] at the end of input.
    #[inline]
    pub fn read_u8(&mut self) -> DecodeResult<u8> {
        Ok(self.array::<1>()?[0])
    }

    /// Reads a u16 in little-endian format.
    ///
    /// # Errors
    ///
    /// Returns [`DecodeError::Truncated`] if fewer than 2 bytes remain.
    #[inline]
    pub fn read_u16(&mut self) -> DecodeResult<u16> {
        self.array().map(u16::from_le_bytes)
    }

    /// Reads an i16 in little-endian format.
    ///
    /// # Errors
    ///
    /// Returns [`DecodeError::Truncated`] if fewer than 2 bytes remain.
    #[inline]
    pub fn read_i16(&mut self) -> DecodeResult<i16> {
        self.array().map(i16::from_le_bytes)
    }

    /// Reads a u32 in little-endian format.
    ///
    /// # Errors
    ///
    /// Returns [`DecodeError::Truncated`] if fewer than 4 bytes remain.
    #[inline]
    pub fn read_u32(&mut self) -> DecodeResult<u32> {
        self.array().map(u32::from_le_bytes)
    }

    /// Reads a Pod type directly.
    ///
    /// # Errors
    ///
    /// Returns [`DecodeError::Truncated`] if the type does not fit.
    pub fn read_pod<T: Pod>(&mut self) -> DecodeResult<T> {
        let bytes = self.take(std::mem::size_of::<T>())?;
        Ok(bytemuck::pod_read_unaligned(bytes))
    }
}
