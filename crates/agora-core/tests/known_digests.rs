//! # Fixed Digest Vectors
//!
//! An independent verifier re-implements canonicalization and hashing from
//! the bundle documentation alone. These vectors pin the exact bytes so any
//! drift in `CanonicalBytes` or the hashers shows up here first.
//!
//! Expected values were produced with a plain `hashlib.sha256` over the
//! hand-written canonical text.

use agora_core::{sha256_canonical, CanonicalBytes, LengthPrefixedHasher, Sha256Digest};
use serde_json::json;

fn digest_hex(value: &serde_json::Value) -> String {
    sha256_canonical(&CanonicalBytes::new(value).unwrap()).to_hex()
}

#[test]
fn empty_object() {
    assert_eq!(
        digest_hex(&json!({})),
        "44136fa355b3678a1146ad16f7e8649e94fb4fc21fe77e8310c060f61caaff8a"
    );
}

#[test]
fn sorted_keys_nested_arrays() {
    let value = json!({ "nested": { "k": [1, 2, 3] }, "b": 2, "a": "x" });
    assert_eq!(
        CanonicalBytes::new(&value).unwrap().to_text(),
        r#"{"a":"x","b":2,"nested":{"k":[1,2,3]}}"#
    );
    assert_eq!(
        digest_hex(&value),
        "3e19fa13bf258bc5ebb73efd560a37a2fb428f2e0a5a6489424aa41f08ad5d59"
    );
}

#[test]
fn non_ascii_is_hashed_as_utf8() {
    assert_eq!(
        digest_hex(&json!({ "€": "ü", "title": "Café" })),
        "72fd3919dbc65da2358f4cc5f6dd33bde61dd99c456c031c4d82d0ec0ecc5ddf"
    );
}

#[test]
fn genesis_and_linked_chain_hashes() {
    let payload = Sha256Digest::from_hex(
        "3e19fa13bf258bc5ebb73efd560a37a2fb428f2e0a5a6489424aa41f08ad5d59",
    )
    .unwrap();
    let genesis = Sha256Digest::of_parts(&[payload.as_bytes()]);
    assert_eq!(
        genesis.to_hex(),
        "b579590e3afd9912ba8c6f7f1b081361281d24fbb5d40ba1c7998934a8044048"
    );
    let linked = Sha256Digest::of_parts(&[genesis.as_bytes(), payload.as_bytes()]);
    assert_eq!(
        linked.to_hex(),
        "d4ba737adfd5fb44b72d27b486c2cf996f24049c401c92cc893cf4ec8dfe7e44"
    );
}

#[test]
fn length_prefixed_fields() {
    let d = LengthPrefixedHasher::new("demo/v1").field(b"ab").field(b"c").finish();
    assert_eq!(
        d.to_hex(),
        "a3af3f3719c84268e510d8864daf9559280ea0bd5fb51ca1e70cb88abe0e7f56"
    );
}
