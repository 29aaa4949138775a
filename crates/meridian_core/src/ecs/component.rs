//! # Component Schema
//!
//! The closed set of component kinds, their field layouts, and the typed
//! views used by gameplay code.
//!
//! Every kind declares its fields once. Tables, codecs, and snapshots are
//! all driven by these declarations, so adding a field is a one-line change.

use bytemuck::{Pod, Zeroable};

/// Fixed-width numeric type of a component field.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FieldType {
    /// Unsigned 8-bit integer.
    U8,
    /// Unsigned 16-bit integer.
    U16,
    /// Unsigned 32-bit integer.
    U32,
    /// Unsigned 64-bit integer.
    U64,
    /// Signed 8-bit integer.
    I8,
    /// Signed 16-bit integer.
    I16,
    /// Signed 32-bit integer.
    I32,
    /// Signed 64-bit integer.
    I64,
    /// 32-bit float.
    F32,
    /// 64-bit float.
    F64,
}

impl FieldType {
    /// Encoded width in bytes.
    #[inline]
    #[must_use]
    pub const fn size(self) -> usize {
        match self {
            Self::U8 | Self::I8 => 1,
            Self::U16 | Self::I16 => 2,
            Self::U32 | Self::I32 | Self::F32 => 4,
            Self::U64 | Self::I64 | Self::F64 => 8,
        }
    }
}

/// A named, typed field of a component.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FieldDef {
    /// Field name.
    pub name: &'static str,
    /// Storage and wire type.
    pub ty: FieldType,
}

const fn field(name: &'static str, ty: FieldType) -> FieldDef {
    FieldDef { name, ty }
}

const XY: &[FieldDef] = &[field("x", FieldType::F32), field("y", FieldType::F32)];
const ROTATION: &[FieldDef] = &[field("value", FieldType::F32)];
const STATS: &[FieldDef] = &[
    field("health_current", FieldType::F32),
    field("health_maximum", FieldType::F32),
    field("health_regeneration", FieldType::F32),
    field("energy_current", FieldType::F32),
    field("energy_maximum", FieldType::F32),
    field("energy_regeneration", FieldType::F32),
    field("speed", FieldType::F32),
];
const PROJECTILE: &[FieldDef] = &[
    field("owner", FieldType::U32),
    field("damage", FieldType::F32),
    field("lifetime", FieldType::F32),
    field("spawned_at", FieldType::F32),
];
const INPUT: &[FieldDef] = &[field("buttons", FieldType::U16), field("sequence", FieldType::U32)];
const COLLIDER: &[FieldDef] = &[field("width", FieldType::F32), field("height", FieldType::F32)];
const HEALTH: &[FieldDef] = &[field("current", FieldType::F32), field("maximum", FieldType::F32)];
const ENERGY: &[FieldDef] = &[
    field("current", FieldType::F32),
    field("maximum", FieldType::F32),
    field("regeneration", FieldType::F32),
];
const MOVEMENT: &[FieldDef] = &[field("speed", FieldType::F32)];

/// The closed set of component kinds known at build time.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(u8)]
pub enum ComponentKind {
    /// Replication tag: the entity is synchronized to clients.
    Sync = 0,
    /// 2D position.
    Position = 1,
    /// 2D velocity.
    Velocity = 2,
    /// Facing angle.
    Rotation = 3,
    /// Health, energy, and speed block.
    Stats = 4,
    /// Transient projectile owned by another entity.
    Projectile = 5,
    /// Last processed input.
    Input = 6,
    /// Axis-aligned collision box.
    Collider = 7,
    /// Health pool.
    Health = 8,
    /// Energy pool with its regeneration rate.
    Energy = 9,
    /// Movement speed.
    Movement = 10,
    /// Deferred-removal marker.
    Despawned = 11,
}

/// Number of component kinds.
pub const KIND_COUNT: usize = 12;

impl ComponentKind {
    /// Every kind, ordered by id.
    pub const ALL: [Self; KIND_COUNT] = [
        Self::Sync,
        Self::Position,
        Self::Velocity,
        Self::Rotation,
        Self::Stats,
        Self::Projectile,
        Self::Input,
        Self::Collider,
        Self::Health,
        Self::Energy,
        Self::Movement,
        Self::Despawned,
    ];

    /// Converts a raw tag to a kind.
    #[must_use]
    pub const fn from_u8(value: u8) -> Option<Self> {
        if (value as usize) < KIND_COUNT {
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

    /// Lowercase name.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Sync => "sync",
            Self::Position => "position",
            Self::Velocity => "velocity",
            Self::Rotation => "rotation",
            Self::Stats => "stats",
            Self::Projectile => "projectile",
            Self::Input => "input",
            Self::Collider => "collider",
            Self::Health => "health",
            Self::Energy => "energy",
            Self::Movement => "movement",
            Self::Despawned => "despawned",
        }
    }

    /// Declared fields, in storage and wire order.
    #[must_use]
    pub const fn fields(self) -> &'static [FieldDef] {
        match self {
            Self::Sync | Self::Despawned => &[],
            Self::Position | Self::Velocity => XY,
            Self::Rotation => ROTATION,
            Self::Stats => STATS,
            Self::Projectile => PROJECTILE,
            Self::Input => INPUT,
            Self::Collider => COLLIDER,
            Self::Health => HEALTH,
            Self::Energy => ENERGY,
            Self::Movement => MOVEMENT,
        }
    }

    /// Index of the named field, if declared.
    #[must_use]
    pub fn field_index(self, name: &str) -> Option<usize> {
        self.fields().iter().position(|f| f.name == name)
    }

    /// Index of the `owner` field used by ownership filtering.
    #[must_use]
    pub fn owner_field(self) -> Option<usize> {
        self.field_index("owner")
    }

    /// Encoded size of one record of all fields, excluding the entity id.
    #[must_use]
    pub fn record_size(self) -> usize {
        self.fields().iter().map(|f| f.ty.size()).sum()
    }
}

impl std::fmt::Display for ComponentKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Typed view of a component kind.
///
/// Components are plain data. The store keeps them as columns; this trait
/// converts between the typed struct and the column attribute view.
///
/// # Example
///
/// ```rust,ignore
/// store.insert(entity, Position::new(10.0, 5.0))?;
/// let pos: Position = store.get_as(entity).unwrap_or_default();
/// ```
pub trait Component: Copy + Pod + Zeroable + Default + Send + Sync + 'static {
    /// The kind this type views.
    const KIND: ComponentKind;

    /// Writes field values in declared order.
    fn to_values(&self) -> Vec<f64>;

    /// Builds the struct from values in declared order.
    ///
    /// Missing trailing values fall back to zero.
    fn from_values(values: &[f64]) -> Self;
}

#[inline]
fn at(values: &[f64], i: usize) -> f64 {
    values.get(i).copied().unwrap_or(0.0)
}

#[inline]
#[allow(clippy::cast_possible_truncation)]
fn at_f32(values: &[f64], i: usize) -> f32 {
    at(values, i) as f32
}

/// Position component.
#[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable)]
#[repr(C)]
pub struct Position {
    /// X coordinate in world space.
    pub x: f32,
    /// Y coordinate in world space.
    pub y: f32,
}

impl Position {
    /// Creates a new position.
    #[inline]
    #[must_use]
    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }
}

impl Component for Position {
    const KIND: ComponentKind = ComponentKind::Position;

    fn to_values(&self) -> Vec<f64> {
        vec![f64::from(self.x), f64::from(self.y)]
    }

    fn from_values(values: &[f64]) -> Self {
        Self::new(at_f32(values, 0), at_f32(values, 1))
    }
}

/// Velocity component.
#[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable)]
#[repr(C)]
pub struct Velocity {
    /// X velocity in units per second.
    pub x: f32,
    /// Y velocity in units per second.
    pub y: f32,
}

impl Velocity {
    /// Creates a new velocity.
    #[inline]
    #[must_use]
    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    /// Zero velocity.
    pub const ZERO: Self = Self::new(0.0, 0.0);
}

impl Component for Velocity {
    const KIND: ComponentKind = ComponentKind::Velocity;

    fn to_values(&self) -> Vec<f64> {
        vec![f64::from(self.x), f64::from(self.y)]
    }

    fn from_values(values: &[f64]) -> Self {
        Self::new(at_f32(values, 0), at_f32(values, 1))
    }
}

/// Rotation component.
#[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable)]
#[repr(C)]
pub struct Rotation {
    /// Angle in radians.
    pub value: f32,
}

impl Component for Rotation {
    const KIND: ComponentKind = ComponentKind::Rotation;

    fn to_values(&self) -> Vec<f64> {
        vec![f64::from(self.value)]
    }

    fn from_values(values: &[f64]) -> Self {
        Self {
            value: at_f32(values, 0),
        }
    }
}

/// Stats component: health and energy pools plus movement speed.
#[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable)]
#[repr(C)]
pub struct Stats {
    /// Current health.
    pub health_current: f32,
    /// Health cap.
    pub health_maximum: f32,
    /// Health regenerated per second.
    pub health_regeneration: f32,
    /// Current energy.
    pub energy_current: f32,
    /// Energy cap.
    pub energy_maximum: f32,
    /// Energy regenerated per second.
    pub energy_regeneration: f32,
    /// Movement speed in units per second.
    pub speed: f32,
}

impl Component for Stats {
    const KIND: ComponentKind = ComponentKind::Stats;

    fn to_values(&self) -> Vec<f64> {
        [
            self.health_current,
            self.health_maximum,
            self.health_regeneration,
            self.energy_current,
            self.energy_maximum,
            self.energy_regeneration,
            self.speed,
        ]
        .into_iter()
        .map(f64::from)
        .collect()
    }

    fn from_values(values: &[f64]) -> Self {
        Self {
            health_current: at_f32(values, 0),
            health_maximum: at_f32(values, 1),
            health_regeneration: at_f32(values, 2),
            energy_current: at_f32(values, 3),
            energy_maximum: at_f32(values, 4),
            energy_regeneration: at_f32(values, 5),
            speed: at_f32(values, 6),
        }
    }
}

/// Projectile component.
#[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable)]
#[repr(C)]
pub struct Projectile {
    /// Packed handle of the owning entity.
    pub owner: u32,
    /// Damage on hit.
    pub damage: f32,
    /// Lifetime in milliseconds.
    pub lifetime: f32,
    /// Tick-clock time of creation in milliseconds.
    pub spawned_at: f32,
}

impl Component for Projectile {
    const KIND: ComponentKind = ComponentKind::Projectile;

    fn to_values(&self) -> Vec<f64> {
        vec![
            f64::from(self.owner),
            f64::from(self.damage),
            f64::from(self.lifetime),
            f64::from(self.spawned_at),
        ]
    }

    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    fn from_values(values: &[f64]) -> Self {
        Self {
            owner: at(values, 0) as u32,
            damage: at_f32(values, 1),
            lifetime: at_f32(values, 2),
            spawned_at: at_f32(values, 3),
        }
    }
}

/// Last processed input for an entity.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Pod, Zeroable)]
#[repr(C)]
pub struct Input {
    /// Input sequence number.
    pub sequence: u32,
    /// Packed button bitmask.
    pub buttons: u16,
    /// Padding for alignment.
    pub _padding: u16,
}

impl Component for Input {
    const KIND: ComponentKind = ComponentKind::Input;

    fn to_values(&self) -> Vec<f64> {
        vec![f64::from(self.buttons), f64::from(self.sequence)]
    }

    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    fn from_values(values: &[f64]) -> Self {
        Self {
            buttons: at(values, 0) as u16,
            sequence: at(values, 1) as u32,
            _padding: 0,
        }
    }
}

/// Health pool component.
#[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable)]
#[repr(C)]
pub struct Health {
    /// Current health.
    pub current: f32,
    /// Health cap.
    pub maximum: f32,
}

impl Component for Health {
    const KIND: ComponentKind = ComponentKind::Health;

    fn to_values(&self) -> Vec<f64> {
        vec![f64::from(self.current), f64::from(self.maximum)]
    }

    fn from_values(values: &[f64]) -> Self {
        Self {
            current: at_f32(values, 0),
            maximum: at_f32(values, 1),
        }
    }
}

/// Energy pool component.
#[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable)]
#[repr(C)]
pub struct Energy {
    /// Current energy.
    pub current: f32,
    /// Energy cap.
    pub maximum: f32,
    /// Energy regenerated per second.
    pub regeneration: f32,
}

impl Component for Energy {
    const KIND: ComponentKind = ComponentKind::Energy;

    fn to_values(&self) -> Vec<f64> {
        vec![
            f64::from(self.current),
            f64::from(self.maximum),
            f64::from(self.regeneration),
        ]
    }

    fn from_values(values: &[f64]) -> Self {
        Self {
            current: at_f32(values, 0),
            maximum: at_f32(values, 1),
            regeneration: at_f32(values, 2),
        }
    }
}

/// Movement component.
#[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable)]
#[repr(C)]
pub struct Movement {
    /// Movement speed in units per second.
    pub speed: f32,
}

impl Component for Movement {
    const KIND: ComponentKind = ComponentKind::Movement;

    fn to_values(&self) -> Vec<f64> {
        vec![f64::from(self.speed)]
    }

    fn from_values(values: &[f64]) -> Self {
        Self {
            speed: at_f32(values, 0),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_ids_are_stable() {
        for (i, kind) in ComponentKind::ALL.iter().enumerate() {
            assert_eq!(kind.index(), i);
            assert_eq!(ComponentKind::from_u8(*kind as u8), Some(*kind));
        }
        assert_eq!(ComponentKind::from_u8(KIND_COUNT as u8), None);
    }

    #[test]
    fn test_record_sizes() {
        assert_eq!(ComponentKind::Position.record_size(), 8);
        assert_eq!(ComponentKind::Input.record_size(), 6);
        assert_eq!(ComponentKind::Projectile.record_size(), 16);
        assert_eq!(ComponentKind::Sync.record_size(), 0);
        assert_eq!(ComponentKind::Health.record_size(), 8);
        assert_eq!(ComponentKind::Energy.record_size(), 12);
        assert_eq!(ComponentKind::Energy.field_index("regeneration"), Some(2));
    }

    #[test]
    fn test_owner_field_only_on_projectile() {
        let owners: Vec<_> = ComponentKind::ALL
            .iter()
            .filter(|k| k.owner_field().is_some())
            .collect();
        assert_eq!(owners, vec![&ComponentKind::Projectile]);
    }

    #[test]
    fn test_typed_views_follow_schema_order() {
        let input = Input {
            sequence: 7,
            buttons: 0b1010,
            _padding: 0,
        };
        assert_eq!(input.to_values(), vec![10.0, 7.0]);
        assert_eq!(Input::from_values(&input.to_values()), input);

        let stats = Stats {
            speed: 6.0,
            ..Stats::default()
        };
        assert_eq!(
            stats.to_values()[ComponentKind::Stats.field_index("speed").unwrap()],
            6.0
        );
    }
}
