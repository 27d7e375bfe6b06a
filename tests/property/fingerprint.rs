//! Property tests for cache keys and fingerprints.
//!
//! Invariants tested:
//! - Canonical JSON parses back to the same value
//! - Cache keys and fingerprints do not depend on how a payload was assembled
//! - Different payloads never share a cache key

use biogate::{RequestDescriptor, canonical_json};
use proptest::prelude::*;
use serde_json::{Map, Value, json};

fn scalar() -> impl Strategy<Value = Value> {
    prop_oneof![
        Just(Value::Null),
        any::<bool>().prop_map(Value::Bool),
        any::<i64>().prop_map(|n| json!(n)),
        "[a-zA-Z0-9 :_-]{0,12}".prop_map(Value::String),
    ]
}

fn payload() -> impl Strategy<Value = Value> {
    scalar().prop_recursive(3, 32, 6, |inner| {
        prop_oneof![
            prop::collection::vec(inner.clone(), 0..4).prop_map(Value::Array),
            prop::collection::btree_map("[a-z]{1,6}", inner, 0..5)
                .prop_map(|map| Value::Object(map.into_iter().collect())),
        ]
    })
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(200))]

    #[test]
    fn canonical_json_round_trips(value in payload()) {
        let text = canonical_json(&value);
        let parsed: Value = serde_json::from_str(&text).unwrap();
        prop_assert_eq!(parsed, value);
    }

    #[test]
    fn fingerprint_ignores_insertion_order(
        entries in prop::collection::btree_map("[a-z]{1,8}", scalar(), 1..8),
    ) {
        let forward: Map<String, Value> = entries.clone().into_iter().collect();
        let reverse: Map<String, Value> = entries.into_iter().rev().collect();

        let a = RequestDescriptor::get("https://api.fda.gov/drug/label.json")
            .payload(Value::Object(forward))
            .build();
        let b = RequestDescriptor::get("https://api.fda.gov/drug/label.json")
            .payload(Value::Object(reverse))
            .build();
        prop_assert_eq!(a.cache_key(), b.cache_key());
        prop_assert_eq!(a.fingerprint(), b.fingerprint());
        prop_assert_eq!(a.fingerprint().len(), 16);
    }

    #[test]
    fn distinct_payloads_get_distinct_cache_keys(a in payload(), b in payload()) {
        prop_assume!(a != b);
        let key = |payload: Value| {
            RequestDescriptor::get("https://mygene.info/v3/query")
                .payload(payload)
                .build()
                .cache_key()
        };
        prop_assert_ne!(key(a), key(b));
    }
}
