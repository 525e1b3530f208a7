//! Property tests for batch resolution and identifier substitution.

use std::collections::HashSet;

use cachet_core::{ResolverConfig, Scalar};
use cachet_test_utils::fixtures::{test_resolver, user};
use cachet_test_utils::generators::{arb_identifier_list, arb_int_like};
use proptest::prelude::*;

const SEEDED: i64 = 5;

fn block_on<F: std::future::Future>(future: F) -> F::Output {
    tokio::runtime::Builder::new_current_thread()
        .build()
        .unwrap()
        .block_on(future)
}

fn expected(id: &Scalar) -> Option<cachet_test_utils::TestUser> {
    let pk = id.to_int().unwrap();
    (pk <= SEEDED).then(|| user(pk))
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    /// Property: batch output lines up with the input, and every distinct
    /// miss costs at most one store query.
    #[test]
    fn prop_batch_aligned_with_input(ids in arb_identifier_list(8)) {
        let resolver = test_resolver(SEEDED, ResolverConfig::default());
        let result = block_on(resolver.resolve_by_ids("user_by_id", &ids)).unwrap();

        prop_assert_eq!(result.len(), ids.len());
        for (id, found) in ids.iter().zip(&result) {
            prop_assert_eq!(found, &expected(id));
        }
        let distinct: HashSet<&Scalar> = ids.iter().collect();
        prop_assert!(resolver.store().get_one_calls() <= distinct.len());
    }

    /// Property: substitution keeps input order, drops unknown identifiers,
    /// and issues at most one store query.
    #[test]
    fn prop_substitution_order_and_single_query(ids in arb_identifier_list(8)) {
        let resolver = test_resolver(SEEDED, ResolverConfig::default());
        let result = block_on(resolver.substitute_ids(ids.clone(), "user_by_id")).unwrap();

        let want: Vec<_> = ids.iter().filter_map(expected).collect();
        prop_assert_eq!(result, want);
        prop_assert!(resolver.store().total_calls() <= 1);
    }

    /// Property: a second substitution over the same identifiers is served
    /// from the cache alone.
    #[test]
    fn prop_substitution_warms_cache(ids in arb_identifier_list(SEEDED)) {
        let resolver = test_resolver(SEEDED, ResolverConfig::default());
        let first = block_on(resolver.substitute_ids(ids.clone(), "user_by_id")).unwrap();
        resolver.store().reset();

        let second = block_on(resolver.substitute_ids(ids, "user_by_id")).unwrap();
        prop_assert_eq!(first, second);
        prop_assert_eq!(resolver.store().total_calls(), 0);
    }

    /// Property: payloads come back untouched beside their entity.
    #[test]
    fn prop_pair_payloads_preserved(
        pairs in prop::collection::vec((1..=SEEDED, any::<(u8, bool)>()), 0..12)
    ) {
        let resolver = test_resolver(SEEDED, ResolverConfig::default());
        let input: Vec<(Scalar, (u8, bool))> = pairs
            .iter()
            .map(|&(pk, payload)| (Scalar::Int(pk), payload))
            .collect();
        let result = block_on(resolver.substitute_pairs(input, "user_by_id")).unwrap();

        let want: Vec<_> = pairs.iter().map(|&(pk, payload)| (user(pk), payload)).collect();
        prop_assert_eq!(result, want);
    }

    /// Property: with integer coercion, every integer-like form of an
    /// identifier resolves through the same key.
    #[test]
    fn prop_int_only_forms_share_key(value in arb_int_like()) {
        let resolver = test_resolver(SEEDED, ResolverConfig::default().with_int_only(true));
        let canonical = Scalar::Int(value.to_int().unwrap());
        let keys = resolver.keys();
        let a = keys
            .derive_key("user_by_id", &cachet_core::LookupParams::single("pk", value), true)
            .unwrap();
        let b = keys
            .derive_key("user_by_id", &cachet_core::LookupParams::single("pk", canonical), true)
            .unwrap();
        prop_assert_eq!(a, b);
    }
}
