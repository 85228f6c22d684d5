//! Property-based tests for cache key derivation.
//!
//! These tests verify the behavioral contracts of key derivation:
//! - Determinism: the same request always produces the same key
//! - Equivalence: spelling variants of one locator share a key
//! - Sensitivity: different dimensions or resources produce different keys
//! - Safety: every key is usable verbatim as a file name

// Integration tests can use unwrap/expect for cleaner assertions
#![allow(clippy::unwrap_used, clippy::expect_used)]

use proptest::prelude::*;
use resizer_cache::is_safe_key;
use resizer_core::ResizeParams;
use resizer_core::key::{canonicalize_locator, derive};

// =============================================================================
// Strategies for generating test data
// =============================================================================

/// Lowercase host names, optionally dotted
fn host_strategy() -> impl Strategy<Value = String> {
    "[a-z][a-z0-9]{0,10}(\\.[a-z]{2,5}){0,2}".prop_map(String::from)
}

/// Path segments made of URL-safe characters
fn path_strategy() -> impl Strategy<Value = String> {
    prop::collection::vec("[a-zA-Z0-9_-]{1,12}", 1..4).prop_map(|segments| segments.join("/"))
}

fn params_strategy() -> impl Strategy<Value = ResizeParams> {
    (0u32..=8192, 0u32..=8192).prop_map(|(w, h)| ResizeParams::new(w, h))
}

/// Ways a client may spell the scheme prefix, paired with a port suffix
/// that is the default for that scheme
fn prefix_strategy() -> impl Strategy<Value = (&'static str, &'static str)> {
    prop_oneof![
        Just(("", "")),
        Just(("", ":80")),
        Just(("/", "")),
        Just(("//", ":80")),
        Just(("http:/", "")),
        Just(("http://", "")),
        Just(("http://", ":80")),
        Just(("https://", "")),
        Just(("https://", ":443")),
        Just(("HTTPS://", ":443")),
        Just(("HTTP://", "")),
    ]
}

// =============================================================================
// Properties
// =============================================================================

proptest! {
    /// Contract: derivation is deterministic
    #[test]
    fn key_is_deterministic(host in host_strategy(), path in path_strategy(), params in params_strategy()) {
        let locator = format!("{host}/{path}");
        let (a, url_a) = derive(params, &locator).unwrap();
        let (b, url_b) = derive(params, &locator).unwrap();
        prop_assert_eq!(a, b);
        prop_assert_eq!(url_a, url_b);
    }

    /// Contract: scheme spelling, leading slashes, default ports and host case
    /// never change the key
    #[test]
    fn spelling_variants_share_a_key(
        host in host_strategy(),
        path in path_strategy(),
        params in params_strategy(),
        prefix in prefix_strategy(),
        upper in any::<bool>(),
    ) {
        let plain = format!("{host}/{path}");
        let spelled_host = if upper { host.to_uppercase() } else { host.clone() };
        let (prefix, port) = prefix;
        let variant = format!("{prefix}{spelled_host}{port}/{}", path.replace('/', "//"));

        let (expected, _) = derive(params, &plain).unwrap();
        let (actual, _) = derive(params, &variant).unwrap();
        prop_assert_eq!(expected, actual, "variant {}", variant);
    }

    /// Contract: different dimensions produce different keys
    #[test]
    fn dimensions_change_the_key(
        host in host_strategy(),
        path in path_strategy(),
        a in params_strategy(),
        b in params_strategy(),
    ) {
        prop_assume!(a != b);
        let locator = format!("{host}/{path}");
        let (ka, _) = derive(a, &locator).unwrap();
        let (kb, _) = derive(b, &locator).unwrap();
        prop_assert_ne!(ka, kb);
    }

    /// Contract: different resources produce different keys
    #[test]
    fn resources_change_the_key(
        host in host_strategy(),
        a in path_strategy(),
        b in path_strategy(),
        params in params_strategy(),
    ) {
        prop_assume!(a != b);
        let (ka, _) = derive(params, &format!("{host}/{a}")).unwrap();
        let (kb, _) = derive(params, &format!("{host}/{b}")).unwrap();
        prop_assert_ne!(ka, kb);
    }

    /// Contract: keys are always safe file names, whatever the locator contains
    #[test]
    fn keys_are_filesystem_safe(host in host_strategy(), tail in ".{0,40}", params in params_strategy()) {
        if let Ok((key, _)) = derive(params, &format!("{host}/{tail}")) {
            prop_assert!(is_safe_key(&key), "unsafe key {}", key);
        }
    }

    /// Contract: the canonical form is a fixed point
    #[test]
    fn canonicalization_is_idempotent(host in host_strategy(), path in path_strategy(), prefix in prefix_strategy()) {
        let (prefix, port) = prefix;
        let once = canonicalize_locator(&format!("{prefix}{host}{port}/{path}")).unwrap();
        let twice = canonicalize_locator(once.as_str()).unwrap();
        prop_assert_eq!(once, twice);
    }
}
