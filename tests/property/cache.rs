//! Property tests for the response cache.
//!
//! Invariants tested:
//! - Non-empty values are served until their TTL passes
//! - Empty values are never stored

use biogate_cache::ResponseCache;
use proptest::prelude::*;
use serde_json::{Value, json};
use std::time::Duration;

proptest! {
    #![proptest_config(ProptestConfig::with_cases(50))]

    #[test]
    fn values_live_exactly_as_long_as_their_ttl(ttl_ms in 1u64..=10_000, probe_ms in 0u64..=20_000) {
        let rt = tokio::runtime::Builder::new_current_thread()
            .enable_time()
            .start_paused(true)
            .build()
            .unwrap();
        rt.block_on(async {
            let cache: ResponseCache<Value> = ResponseCache::new("property");
            let value = json!({"hits": [1]});
            prop_assert!(cache.set("k", value, Duration::from_millis(ttl_ms)));

            tokio::time::advance(Duration::from_millis(probe_ms)).await;
            prop_assert_eq!(cache.get("k").is_some(), probe_ms < ttl_ms);
            Ok(())
        })?;
    }

    #[test]
    fn empty_values_are_never_stored(
        value in prop_oneof![
            Just(Value::Null),
            Just(json!("")),
            Just(json!([])),
            Just(json!({})),
        ],
        ttl_s in 1u64..=3_600,
    ) {
        let cache: ResponseCache<Value> = ResponseCache::new("property");
        prop_assert!(!cache.set("k", value, Duration::from_secs(ttl_s)));
        prop_assert!(cache.get("k").is_none());
        prop_assert!(cache.is_empty());
    }
}
