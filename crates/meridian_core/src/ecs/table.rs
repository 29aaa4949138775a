//! # Component Tables
//!
//! Struct-of-arrays storage for a single component kind.
//!
//! The table uses a dense column strategy:
//! - One typed column per declared field, indexed by entity slot
//! - A presence bitmap (entity has this component)
//! - A dirty bitmap (written since the last flush)
//!
//! All columns always share the same length. Length only grows.

use super::component::{ComponentKind, FieldType};
use crate::bitmap::Bitmap;

/// A single typed column.
#[derive(Clone, Debug, PartialEq)]
pub enum Column {
    /// `u8` values.
    U8(Vec<u8>),
    /// `u16` values.
    U16(Vec<u16>),
    /// `u32` values.
    U32(Vec<u32>),
    /// `u64` values.
    U64(Vec<u64>),
    /// `i8` values.
    I8(Vec<i8>),
    /// `i16` values.
    I16(Vec<i16>),
    /// `i32` values.
    I32(Vec<i32>),
    /// `i64` values.
    I64(Vec<i64>),
    /// `f32` values.
    F32(Vec<f32>),
    /// `f64` values.
    F64(Vec<f64>),
}

macro_rules! each_column {
    ($col:expr, $v:ident => $body:expr) => {
        match $col {
            Column::U8($v) => $body,
            Column::U16($v) => $body,
            Column::U32($v) => $body,
            Column::U64($v) => $body,
            Column::I8($v) => $body,
            Column::I16($v) => $body,
            Column::I32($v) => $body,
            Column::I64($v) => $body,
            Column::F32($v) => $body,
            Column::F64($v) => $body,
        }
    };
}

macro_rules! read_le {
    ($t:ty, $bytes:expr) => {{
        let mut raw = [0u8; std::mem::size_of::<$t>()];
        raw.copy_from_slice(&$bytes[..std::mem::size_of::<$t>()]);
        <$t>::from_le_bytes(raw)
    }};
}

impl Column {
    /// Creates a zero-filled column of `len` slots.
    #[must_use]
    pub fn new(ty: FieldType, len: usize) -> Self {
        match ty {
            FieldType::U8 => Self::U8(vec![0; len]),
            FieldType::U16 => Self::U16(vec![0; len]),
            FieldType::U32 => Self::U32(vec![0; len]),
            FieldType::U64 => Self::U64(vec![0; len]),
            FieldType::I8 => Self::I8(vec![0; len]),
            FieldType::I16 => Self::I16(vec![0; len]),
            FieldType::I32 => Self::I32(vec![0; len]),
            FieldType::I64 => Self::I64(vec![0; len]),
            FieldType::F32 => Self::F32(vec![0.0; len]),
            FieldType::F64 => Self::F64(vec![0.0; len]),
        }
    }

    /// Number of slots.
    #[must_use]
    pub fn len(&self) -> usize {
        each_column!(self, v => v.len())
    }

    /// Returns `true` if the column has no slots.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn resize(&mut self, len: usize) {
        each_column!(self, v => v.resize(len, Default::default()));
    }

    /// Reads slot `index` widened to `f64`.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn get(&self, index: usize) -> f64 {
        match self {
            Self::U8(v) => f64::from(v[index]),
            Self::U16(v) => f64::from(v[index]),
            Self::U32(v) => f64::from(v[index]),
            Self::U64(v) => v[index] as f64,
            Self::I8(v) => f64::from(v[index]),
            Self::I16(v) => f64::from(v[index]),
            Self::I32(v) => f64::from(v[index]),
            Self::I64(v) => v[index] as f64,
            Self::F32(v) => f64::from(v[index]),
            Self::F64(v) => v[index],
        }
    }

    /// Writes `value` into slot `index`, narrowing to the column type.
    ///
    /// Integer columns saturate.
    #[allow(
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss,
        clippy::cast_precision_loss
    )]
    pub fn set(&mut self, index: usize, value: f64) {
        match self {
            Self::U8(v) => v[index] = value as u8,
            Self::U16(v) => v[index] = value as u16,
            Self::U32(v) => v[index] = value as u32,
            Self::U64(v) => v[index] = value as u64,
            Self::I8(v) => v[index] = value as i8,
            Self::I16(v) => v[index] = value as i16,
            Self::I32(v) => v[index] = value as i32,
            Self::I64(v) => v[index] = value as i64,
            Self::F32(v) => v[index] = value as f32,
            Self::F64(v) => v[index] = value,
        }
    }

    /// Appends slot `index` to `out` in little-endian order.
    pub fn write_le(&self, index: usize, out: &mut Vec<u8>) {
        each_column!(self, v => out.extend_from_slice(&v[index].to_le_bytes()));
    }

    /// Reads slot `index` from little-endian `bytes`.
    ///
    /// `bytes` must hold at least the column type's width.
    pub fn read_le(&mut self, index: usize, bytes: &[u8]) {
        match self {
            Self::U8(v) => v[index] = read_le!(u8, bytes),
            Self::U16(v) => v[index] = read_le!(u16, bytes),
            Self::U32(v) => v[index] = read_le!(u32, bytes),
            Self::U64(v) => v[index] = read_le!(u64, bytes),
            Self::I8(v) => v[index] = read_le!(i8, bytes),
            Self::I16(v) => v[index] = read_le!(i16, bytes),
            Self::I32(v) => v[index] = read_le!(i32, bytes),
            Self::I64(v) => v[index] = read_le!(i64, bytes),
            Self::F32(v) => v[index] = read_le!(f32, bytes),
            Self::F64(v) => v[index] = read_le!(f64, bytes),
        }
    }

    fn reset(&mut self, index: usize) {
        each_column!(self, v => v[index] = Default::default());
    }
}

/// Struct-of-arrays storage for one component kind.
#[derive(Clone, Debug)]
pub struct ComponentTable {
    kind: ComponentKind,
    columns: Vec<Column>,
    presence: Bitmap,
    dirty: Bitmap,
    capacity: usize,
}

impl ComponentTable {
    /// Creates a table with `capacity` zeroed slots.
    #[must_use]
    pub fn new(kind: ComponentKind, capacity: usize) -> Self {
        Self {
            kind,
            columns: kind
                .fields()
                .iter()
                .map(|f| Column::new(f.ty, capacity))
                .collect(),
            presence: Bitmap::new(capacity),
            dirty: Bitmap::new(capacity),
            capacity,
        }
    }

    /// Kind stored in this table.
    #[inline]
    #[must_use]
    pub const fn kind(&self) -> ComponentKind {
        self.kind
    }

    /// Number of slots every column holds.
    #[inline]
    #[must_use]
    pub const fn capacity(&self) -> usize {
        self.capacity
    }

    /// Grows every column to at least `capacity` slots. Never shrinks.
    pub fn grow(&mut self, capacity: usize) {
        if capacity <= self.capacity {
            return;
        }
        for column in &mut self.columns {
            column.resize(capacity);
        }
        self.presence.grow(capacity);
        self.dirty.grow(capacity);
        self.capacity = capacity;
    }

    /// Presence bitmap.
    #[inline]
    #[must_use]
    pub const fn presence(&self) -> &Bitmap {
        &self.presence
    }

    /// Dirty bitmap.
    #[inline]
    #[must_use]
    pub const fn dirty(&self) -> &Bitmap {
        &self.dirty
    }

    /// Returns `true` if slot `index` holds this component.
    #[inline]
    #[must_use]
    pub fn contains(&self, index: usize) -> bool {
        self.presence.has(index)
    }

    /// Returns `true` if slot `index` was written since the last flush.
    #[inline]
    #[must_use]
    pub fn is_dirty(&self, index: usize) -> bool {
        self.dirty.has(index)
    }

    /// Column for field `field`.
    #[must_use]
    pub fn column(&self, field: usize) -> Option<&Column> {
        self.columns.get(field)
    }

    /// Mutable column for field `field`.
    pub fn column_mut(&mut self, field: usize) -> Option<&mut Column> {
        self.columns.get_mut(field)
    }

    /// Marks slot `index` present, zeroing it first, then writes `values`.
    pub fn insert(&mut self, index: usize, values: Option<&[f64]>) {
        self.grow(index + 1);
        for column in &mut self.columns {
            column.reset(index);
        }
        if let Some(values) = values {
            self.write(index, values);
        }
        self.presence.set(index);
        self.dirty.set(index);
    }

    /// Clears presence and dirty state for slot `index`.
    pub fn remove(&mut self, index: usize) {
        if index < self.capacity {
            for column in &mut self.columns {
                column.reset(index);
            }
        }
        self.presence.clear(index);
        self.dirty.clear(index);
    }

    /// Reads all fields of slot `index`.
    #[must_use]
    pub fn read(&self, index: usize) -> Vec<f64> {
        self.columns.iter().map(|c| c.get(index)).collect()
    }

    /// Writes the leading fields of slot `index` from `values` and marks it dirty.
    ///
    /// Extra values are ignored; missing trailing values leave fields untouched.
    pub fn write(&mut self, index: usize, values: &[f64]) {
        for (column, &value) in self.columns.iter_mut().zip(values) {
            column.set(index, value);
        }
        self.dirty.set(index);
    }

    /// Reads one field of slot `index`.
    #[must_use]
    pub fn get_field(&self, index: usize, field: usize) -> Option<f64> {
        self.columns.get(field).map(|c| c.get(index))
    }

    /// Writes one field of slot `index` and marks it dirty.
    pub fn set_field(&mut self, index: usize, field: usize, value: f64) -> bool {
        let Some(column) = self.columns.get_mut(field) else {
            return false;
        };
        column.set(index, value);
        self.dirty.set(index);
        true
    }

    /// Marks slot `index` dirty without changing values.
    pub fn mark_dirty(&mut self, index: usize) {
        self.dirty.set(index);
    }

    /// Clears every dirty flag.
    pub fn clear_dirty(&mut self) {
        self.dirty.clear_all();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insert_beyond_capacity_grows_all_columns() {
        let mut table = ComponentTable::new(ComponentKind::Projectile, 4);
        table.insert(10, Some(&[3.0, 1.5, 100.0, 20.0]));

        assert!(table.capacity() >= 11);
        for field in 0..4 {
            assert_eq!(table.column(field).unwrap().len(), table.capacity());
        }
        assert!(table.contains(10));
        assert_eq!(table.read(10), vec![3.0, 1.5, 100.0, 20.0]);
    }

    #[test]
    fn test_remove_clears_bits_and_values() {
        let mut table = ComponentTable::new(ComponentKind::Position, 8);
        table.insert(2, Some(&[1.0, 2.0]));
        table.remove(2);

        assert!(!table.contains(2));
        assert!(!table.is_dirty(2));
        assert_eq!(table.read(2), vec![0.0, 0.0]);
    }

    #[test]
    fn test_partial_write_keeps_tail() {
        let mut table = ComponentTable::new(ComponentKind::Position, 8);
        table.insert(1, Some(&[1.0, 2.0]));
        table.clear_dirty();

        table.write(1, &[5.0]);
        assert_eq!(table.read(1), vec![5.0, 2.0]);
        assert!(table.is_dirty(1));
    }

    #[test]
    fn test_integer_columns_saturate() {
        let mut column = Column::new(FieldType::U8, 1);
        column.set(0, 300.0);
        assert_eq!(column.get(0), 255.0);
        column.set(0, -4.0);
        assert_eq!(column.get(0), 0.0);
    }

    #[test]
    fn test_le_bytes_roundtrip() {
        let mut column = Column::new(FieldType::I16, 2);
        column.set(0, -1234.0);
        let mut bytes = Vec::new();
        column.write_le(0, &mut bytes);
        assert_eq!(bytes, (-1234i16).to_le_bytes());

        column.read_le(1, &bytes);
        assert_eq!(column.get(1), -1234.0);
    }
}
