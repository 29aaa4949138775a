//! # Query Filters
//!
//! `all` / `any` / `none` component sets resolved with bitmap AND/OR/NOT
//! over presence bitmaps.

use super::component::ComponentKind;

/// Component-set filter for [`Store::query`](super::Store::query).
///
/// - `all`: every listed kind must be present
/// - `any`: at least one listed kind must be present (ignored when empty)
/// - `none`: no listed kind may be present
///
/// Despawned entities are excluded unless [`ComponentKind::Despawned`]
/// appears in one of the lists.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Filter {
    /// Required kinds.
    pub all: Vec<ComponentKind>,
    /// Optional kinds, at least one required.
    pub any: Vec<ComponentKind>,
    /// Excluded kinds.
    pub none: Vec<ComponentKind>,
}

impl Filter {
    /// Creates an empty filter (matches every live entity).
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Filter requiring every kind in `kinds`.
    #[must_use]
    pub fn all(kinds: &[ComponentKind]) -> Self {
        Self {
            all: kinds.to_vec(),
            ..Self::default()
        }
    }

    /// Adds required kinds.
    #[must_use]
    pub fn with(mut self, kinds: &[ComponentKind]) -> Self {
        self.all.extend_from_slice(kinds);
        self
    }

    /// Adds optional kinds.
    #[must_use]
    pub fn any_of(mut self, kinds: &[ComponentKind]) -> Self {
        self.any.extend_from_slice(kinds);
        self
    }

    /// Adds excluded kinds.
    #[must_use]
    pub fn without(mut self, kinds: &[ComponentKind]) -> Self {
        self.none.extend_from_slice(kinds);
        self
    }

    /// Returns `true` if the despawned marker is named explicitly.
    #[must_use]
    pub fn mentions_despawned(&self) -> bool {
        self.all
            .iter()
            .chain(&self.any)
            .chain(&self.none)
            .any(|k| *k == ComponentKind::Despawned)
    }
}
