//! # Canonical Serialization
//!
//! `CanonicalBytes` is the sole construction path for bytes that feed an
//! audit payload hash.
//!
//! ## Security Invariant
//!
//! An exported audit bundle is re-verified by a party who only has the JSON
//! document. Two payloads that are semantically identical (same keys, same
//! values, any insertion order) must therefore hash identically on both sides.
//! The inner `Vec<u8>` is private and the only constructor applies:
//!
//! 1. **Float rejection**: non-integer numbers have several valid decimal
//!    renderings across JSON libraries, so a payload containing one could not
//!    be re-hashed reliably by an independent verifier.
//! 2. **RFC 8785 (JCS) serialization** via `serde_jcs`: object keys sorted,
//!    compact separators, no insignificant whitespace, UTF-8 passthrough.
//!
//! Timestamps inside payloads are serialized by [`Timestamp`](crate::Timestamp)
//! as `YYYY-MM-DDTHH:MM:SSZ` strings before they reach this module.

use serde::Serialize;
use serde_json::Value;

use crate::error::CanonicalizationError;

/// Bytes produced exclusively by JCS canonicalization with float rejection.
///
/// # Invariants
///
/// - The only constructor is [`CanonicalBytes::new()`].
/// - No non-integer numbers appear anywhere in the document.
/// - Object keys are sorted; separators are compact (RFC 8785).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CanonicalBytes(Vec<u8>);

impl CanonicalBytes {
    /// Canonicalize any serializable value.
    ///
    /// # Errors
    ///
    /// Returns [`CanonicalizationError::FloatRejected`] if the value contains a
    /// non-integer number, and [`CanonicalizationError::SerializationFailed`]
    /// if JSON serialization fails.
    pub fn new(obj: &impl Serialize) -> Result<Self, CanonicalizationError> {
        let value = serde_json::to_value(obj)?;
        reject_floats(&value)?;
        let s = serde_jcs::to_string(&value)?;
        Ok(Self(s.into_bytes()))
    }

    /// Access the canonical bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// The canonical document as UTF-8 text.
    ///
    /// JCS output is always valid UTF-8, so this never fails; the lossy
    /// conversion exists only to avoid a panic path.
    pub fn to_text(&self) -> String {
        String::from_utf8_lossy(&self.0).into_owned()
    }

    /// Length of the canonical byte sequence.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether the canonical byte sequence is empty.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl AsRef<[u8]> for CanonicalBytes {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

/// Walk the value tree and reject any number not representable as i64/u64.
fn reject_floats(value: &Value) -> Result<(), CanonicalizationError> {
    match value {
        Value::Null | Value::Bool(_) | Value::String(_) => Ok(()),
        Value::Number(n) => {
            if n.is_f64() {
                return Err(CanonicalizationError::FloatRejected(
                    n.as_f64().unwrap_or(f64::NAN),
                ));
            }
            Ok(())
        }
        Value::Object(map) => map.values().try_for_each(reject_floats),
        Value::Array(items) => items.iter().try_for_each(reject_floats),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn text(value: &Value) -> String {
        CanonicalBytes::new(value).expect("canonicalize").to_text()
    }

    #[test]
    fn keys_are_sorted() {
        assert_eq!(
            text(&json!({"subject": "poll", "action": "opened", "by": "u-1"})),
            r#"{"action":"opened","by":"u-1","subject":"poll"}"#
        );
    }

    #[test]
    fn insertion_order_does_not_matter() {
        let a = json!({"from": "idea_collection", "to": "shortlist_selection", "shortlisted": ["i1", "i2"]});
        let b = json!({"shortlisted": ["i1", "i2"], "to": "shortlist_selection", "from": "idea_collection"});
        assert_eq!(
            CanonicalBytes::new(&a).unwrap(),
            CanonicalBytes::new(&b).unwrap()
        );
    }

    #[test]
    fn nested_objects_sorted_arrays_preserved() {
        assert_eq!(
            text(&json!({"options": [{"text": "Park", "id": "o2"}, {"text": "Library", "id": "o1"}]})),
            r#"{"options":[{"id":"o2","text":"Park"},{"id":"o1","text":"Library"}]}"#
        );
    }

    #[test]
    fn floats_are_rejected_at_any_depth() {
        let err = CanonicalBytes::new(&json!({"a": {"b": [{"share": 33.33}]}})).unwrap_err();
        assert!(matches!(err, CanonicalizationError::FloatRejected(f) if (f - 33.33).abs() < 1e-9));
    }

    #[test]
    fn integers_null_and_bools_pass_through() {
        assert_eq!(
            text(&json!({"count": -3, "big": 9_999_999_999u64, "closed": false, "ends_at": null})),
            r#"{"big":9999999999,"closed":false,"count":-3,"ends_at":null}"#
        );
    }

    #[test]
    fn unicode_is_not_escaped() {
        let s = text(&json!({"title": "Parc du Café"}));
        assert!(s.contains("Café"));
    }

    #[test]
    fn empty_containers() {
        assert_eq!(CanonicalBytes::new(&json!({})).unwrap().as_bytes(), b"{}");
        assert_eq!(CanonicalBytes::new(&json!([])).unwrap().as_bytes(), b"[]");
        assert!(!CanonicalBytes::new(&json!({})).unwrap().is_empty());
    }
}

#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    fn json_without_floats() -> impl Strategy<Value = Value> {
        let leaf = prop_oneof![
            Just(Value::Null),
            any::<bool>().prop_map(Value::Bool),
            any::<i64>().prop_map(|n| serde_json::json!(n)),
            "[a-zA-Z0-9_ ]{0,40}".prop_map(Value::String),
        ];
        leaf.prop_recursive(4, 48, 6, |inner| {
            prop_oneof![
                prop::collection::vec(inner.clone(), 0..6).prop_map(Value::Array),
                prop::collection::btree_map("[a-z_]{1,10}", inner, 0..6)
                    .prop_map(|m| Value::Object(m.into_iter().collect())),
            ]
        })
    }

    proptest! {
        #[test]
        fn canonicalization_is_deterministic(value in json_without_floats()) {
            let a = CanonicalBytes::new(&value).unwrap();
            let b = CanonicalBytes::new(&value).unwrap();
            prop_assert_eq!(a.as_bytes(), b.as_bytes());
        }

        #[test]
        fn canonical_output_reparses_to_same_value(value in json_without_floats()) {
            let cb = CanonicalBytes::new(&value).unwrap();
            let reparsed: Value = serde_json::from_slice(cb.as_bytes()).unwrap();
            prop_assert_eq!(reparsed, value);
        }

        #[test]
        fn canonicalization_is_a_fixed_point(value in json_without_floats()) {
            let once = CanonicalBytes::new(&value).unwrap();
            let reparsed: Value = serde_json::from_slice(once.as_bytes()).unwrap();
            let twice = CanonicalBytes::new(&reparsed).unwrap();
            prop_assert_eq!(once, twice);
        }
    }
}
