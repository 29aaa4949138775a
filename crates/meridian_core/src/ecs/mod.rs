//! # Entity/Component Store
//!
//! Struct-of-arrays component tables keyed by packed entity handles.
//!
//! ## Design Philosophy
//!
//! - Component kinds form a closed set resolved by array index
//! - Each kind owns one growable table of typed columns
//! - Presence and dirty state live in per-table bitmaps
//! - Queries are bitmap AND/OR/NOT, never per-entity scans

mod component;
mod entity;
mod query;
mod store;
mod table;

pub use component::{
    Component, ComponentKind, Energy, FieldDef, FieldType, Health, Input, Movement, Position, Projectile,
    Rotation, Stats, Velocity, KIND_COUNT,
};
pub use entity::{
    Entities, EntityId, GENERATION_BITS, INDEX_BITS, INDEX_MASK, MAX_GENERATION, MAX_INDEX,
};
pub use query::Filter;
pub use store::{Snapshot, Store};
pub use table::{Column, ComponentTable};
