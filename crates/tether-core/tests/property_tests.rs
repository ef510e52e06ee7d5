//! # Property-Based Tests
//!
//! Invariants of the bookkeeping format, the reservoir sampler and the
//! windowed load average, checked with proptest.

use proptest::collection::vec;
use proptest::prelude::*;
use rand::SeedableRng;
use rand::rngs::StdRng;
use std::collections::BTreeSet;
use tether_core::{ModuleConfiguration, ReservoirSampler, RunningWindowAverage, RuntimeConfig, StoredValue};

// =============================================================================
// PROPERTY TESTS
// =============================================================================

proptest! {
    /// A marker always decodes back to its timestamp.
    #[test]
    fn marker_roundtrips(since in any::<u64>()) {
        let value = StoredValue::ForceReinit { since_millis: since };
        prop_assert_eq!(StoredValue::parse(&value.encode()), value);
    }

    /// Decoding never loses the raw text of a non-marker value.
    #[test]
    fn non_marker_values_are_preserved(raw in "[A-Za-z0-9{}:\",_]{0,40}") {
        let decoded = StoredValue::parse(&raw);
        if !decoded.is_force_reinit() {
            prop_assert_eq!(decoded.encode(), raw);
        }
    }

    /// Every fingerprint is recognized as a fingerprint.
    #[test]
    fn fingerprints_decode_as_fingerprints(
        settings in proptest::collection::btree_map("[a-z]{1,8}", "[a-z0-9]{0,8}", 0..6)
    ) {
        let mut configuration = ModuleConfiguration::default();
        configuration.settings = settings;
        let fp = configuration.fingerprint().expect("fingerprint");
        prop_assert_eq!(StoredValue::parse(&fp), StoredValue::Fingerprint(fp.clone()));
    }

    /// Module ids survive the key encoding, whatever they contain.
    #[test]
    fn module_keys_roundtrip(id in "[A-Za-z0-9_.-]{1,24}") {
        let config = RuntimeConfig::default();
        let key = config.module_key(&id);
        prop_assert_eq!(config.module_id_of(&key), Some(id.as_str()));
    }

    /// The sampler keeps min(capacity, n) distinct stream items.
    #[test]
    fn sampler_keeps_subset_of_stream(
        capacity in 1usize..8,
        n in 0usize..200,
        seed in any::<u64>()
    ) {
        let mut rng = StdRng::seed_from_u64(seed);
        let mut sampler = ReservoirSampler::new(capacity);
        for i in 0..n {
            sampler.sample(i, &mut rng);
        }

        let kept: BTreeSet<usize> = sampler.samples().iter().copied().collect();
        prop_assert_eq!(kept.len(), capacity.min(n));
        prop_assert!(kept.iter().all(|i| *i < n));
        prop_assert_eq!(sampler.seen(), n as u64);
    }

    /// A constant counter reads as zero load.
    #[test]
    fn constant_counter_has_zero_load(
        times in vec(0u64..100_000, 1..50),
        value in any::<u64>()
    ) {
        let mut sorted = times;
        sorted.sort_unstable();
        let mut window = RunningWindowAverage::new(5_000, 20);
        for t in sorted {
            window.sample(t, value);
        }
        prop_assert_eq!(window.average(), 0);
        prop_assert!(window.len() <= 20);
    }

    /// Events at a fixed rate per second are measured exactly.
    #[test]
    fn steady_rate_is_measured(rate in 1u64..1_000, samples in 2u64..40) {
        let mut window = RunningWindowAverage::new(u64::MAX, 100);
        for s in 0..samples {
            window.sample(s * 1_000, s * rate);
        }
        prop_assert_eq!(window.average(), rate);
    }
}
