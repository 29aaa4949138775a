//! # Query Property Tests
//!
//! Bitmap queries must agree with a naive per-entity scan for any mix of
//! components, despawn marks, and filters.

use std::collections::BTreeSet;

use meridian_core::{ComponentKind, EntityId, Filter, Store};
use proptest::prelude::*;

const KINDS: [ComponentKind; 5] = [
    ComponentKind::Position,
    ComponentKind::Velocity,
    ComponentKind::Rotation,
    ComponentKind::Projectile,
    ComponentKind::Movement,
];

fn kind_set() -> impl Strategy<Value = Vec<ComponentKind>> {
    proptest::sample::subsequence(KINDS.to_vec(), 0..=2)
}

fn matches(store: &Store, e: EntityId, filter: &Filter) -> bool {
    let has = |k: &ComponentKind| store.has(e, *k);
    !store.is_despawning(e)
        && filter.all.iter().all(has)
        && (filter.any.is_empty() || filter.any.iter().any(has))
        && !filter.none.iter().any(has)
}

proptest! {
    #[test]
    fn query_agrees_with_naive_scan(
        layouts in proptest::collection::vec((proptest::bits::u8::masked(0b1_1111), any::<bool>()), 1..64),
        all in kind_set(),
        any_of in kind_set(),
        none in kind_set(),
    ) {
        let mut store = Store::new(4);
        let mut spawned = Vec::new();
        for (mask, despawn) in &layouts {
            let e = store.spawn().unwrap();
            for (bit, kind) in KINDS.iter().enumerate() {
                if mask & (1 << bit) != 0 {
                    store.add(e, *kind, None);
                }
            }
            if *despawn {
                store.despawn(e);
            }
            spawned.push(e);
        }

        let filter = Filter::all(&all).any_of(&any_of).without(&none);
        let expected: BTreeSet<EntityId> = spawned
            .iter()
            .copied()
            .filter(|e| matches(&store, *e, &filter))
            .collect();
        let actual: BTreeSet<EntityId> = store.query(&filter).into_iter().collect();
        prop_assert_eq!(actual, expected);
    }

    #[test]
    fn flush_removes_exactly_the_marked(marks in proptest::collection::vec(any::<bool>(), 1..64)) {
        let mut store = Store::new(2);
        let spawned: Vec<EntityId> = marks.iter().map(|_| store.spawn().unwrap()).collect();
        for (e, mark) in spawned.iter().zip(&marks) {
            if *mark {
                store.despawn(*e);
            }
        }
        let removed: BTreeSet<EntityId> = store.flush().into_iter().collect();
        for (e, mark) in spawned.iter().zip(&marks) {
            prop_assert_eq!(removed.contains(e), *mark);
            prop_assert_eq!(store.exists(*e), !*mark);
        }
    }
}
