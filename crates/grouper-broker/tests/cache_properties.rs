//! Property tests for the Group Key Cache

use std::collections::BTreeSet;

use grouper_broker::GroupKeyCache;
use grouper_core::{HostAddress, MemberSet, SimTime};
use grouper_crypto::SymmetricKey;
use proptest::prelude::*;

fn arb_members() -> impl Strategy<Value = MemberSet<HostAddress>> {
    prop::collection::btree_set((1u32..8).prop_map(HostAddress), 1..5)
}

fn arb_cache() -> impl Strategy<Value = GroupKeyCache<HostAddress>> {
    prop::collection::vec((arb_members(), any::<[u8; 32]>(), 0u64..5), 0..8).prop_map(|entries| {
        let mut cache = GroupKeyCache::new();
        for (members, key, at) in entries {
            cache.insert_or_replace(members, SymmetricKey::from_bytes(key), SimTime::from_secs(at));
        }
        cache
    })
}

proptest! {
    #[test]
    fn prop_find_hits_only_inserted_sets(
        inserted in prop::collection::vec(arb_members(), 0..6),
        probe in arb_members(),
    ) {
        let mut cache = GroupKeyCache::new();
        for members in &inserted {
            cache.insert_or_replace(members.clone(), SymmetricKey::generate(), SimTime::ZERO);
        }

        let expected = inserted.iter().any(|m| *m == probe);
        prop_assert_eq!(cache.find(&probe).is_some(), expected);
    }

    #[test]
    fn prop_find_ignores_member_order(ids in prop::collection::vec(1u32..8, 1..5)) {
        let forward: BTreeSet<_> = ids.iter().copied().map(HostAddress).collect();
        let backward: BTreeSet<_> = ids.iter().rev().copied().map(HostAddress).collect();

        let mut cache = GroupKeyCache::new();
        let key = SymmetricKey::generate();
        cache.insert_or_replace(forward, key.clone(), SimTime::ZERO);
        prop_assert_eq!(cache.find(&backward), Some(&key));
    }

    #[test]
    fn prop_union_with_self_is_identity(x in arb_cache()) {
        prop_assert_eq!(x.union(&x), x);
    }

    #[test]
    fn prop_union_is_idempotent(x in arb_cache(), y in arb_cache()) {
        let xy = x.union(&y);
        prop_assert_eq!(xy.union(&y), xy.clone());
        prop_assert_eq!(xy.union(&x), xy);
    }

    #[test]
    fn prop_union_is_order_independent(x in arb_cache(), y in arb_cache()) {
        prop_assert_eq!(x.union(&y), y.union(&x));
    }

    #[test]
    fn prop_reconcile_leaves_both_sides_equal(x in arb_cache(), y in arb_cache(), now in 0u64..10) {
        let mut a = x.clone();
        let mut b = y.clone();
        a.reconcile(&mut b, SimTime::from_secs(now), std::time::Duration::from_secs(4));

        prop_assert_eq!(&a, &b);
        for entry in a.iter() {
            prop_assert!(!entry.is_expired(SimTime::from_secs(now), std::time::Duration::from_secs(4)));
        }
    }
}
