//! Shared proptest generators.
//!
//! This module provides reusable generators for domain types used across
//! the signing-key and token crates.

use chrono::{DateTime, Duration, TimeZone, Utc};
use key_common::{KeyRecord, SigningAlgorithm};
use proptest::prelude::*;
use std::collections::BTreeSet;

/// Generate key ids in the `prefixed:<prefix>` shape.
pub fn kid_strategy() -> impl Strategy<Value = String> {
    ("[a-z]{2,8}", "[a-f0-9]{8}").prop_map(|(prefix, suffix)| format!("{prefix}-{suffix}"))
}

/// Generate supported signing algorithms.
pub fn signing_algorithm_strategy() -> impl Strategy<Value = SigningAlgorithm> {
    prop_oneof![
        Just(SigningAlgorithm::RS256),
        Just(SigningAlgorithm::RS384),
        Just(SigningAlgorithm::RS512),
        Just(SigningAlgorithm::PS256),
        Just(SigningAlgorithm::PS384),
        Just(SigningAlgorithm::PS512),
        Just(SigningAlgorithm::ES256),
        Just(SigningAlgorithm::ES384),
    ]
}

/// Generate timestamps within one year of 2025-01-01.
pub fn timestamp_strategy() -> impl Strategy<Value = DateTime<Utc>> {
    (0i64..31_536_000).prop_map(|secs| epoch() + Duration::seconds(secs))
}

/// Generate key records with opaque public key bytes.
///
/// The key material is not a real key; use fixtures when signatures matter.
pub fn key_record_strategy() -> impl Strategy<Value = KeyRecord> {
    (
        kid_strategy(),
        prop::collection::vec(any::<u8>(), 16..64),
        signing_algorithm_strategy(),
        timestamp_strategy(),
    )
        .prop_map(|(kid, der, algorithm, created_at)| {
            KeyRecord::new(kid, &der, algorithm, created_at)
        })
}

/// Generate history capacities.
pub fn capacity_strategy() -> impl Strategy<Value = usize> {
    1usize..32
}

/// Generate token subjects.
pub fn subject_strategy() -> impl Strategy<Value = String> {
    prop_oneof![
        "user-[a-z0-9]{6,12}",
        "[a-z]{3,10}@[a-z]{3,8}\\.example\\.com",
        "svc-[a-z]{3,12}",
    ]
}

/// Generate audiences.
pub fn audience_strategy() -> impl Strategy<Value = String> {
    "[a-z]{3,12}-api"
}

/// Generate authority sets, possibly empty.
pub fn authorities_strategy() -> impl Strategy<Value = BTreeSet<String>> {
    prop::collection::btree_set("ROLE_[A-Z]{3,8}", 0..5)
}

/// Generate token validity periods in minutes.
pub fn validity_minutes_strategy() -> impl Strategy<Value = i64> {
    1i64..1440
}

fn epoch() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0)
        .single()
        .unwrap_or_default()
}
