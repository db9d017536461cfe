use sha2::{Digest, Sha256};
use transcript_types::{CanonicalPayload, Fingerprint};

/// Canonical content hasher for record payloads.
///
/// The canonical form is compact UTF-8 JSON with object keys in ascending
/// code point order at every level. These exact bytes are both what gets
/// fingerprinted and what the envelope encrypts, so existing fingerprints stay
/// reproducible across versions only as long as this encoding never changes.
pub struct CanonicalHasher;

impl CanonicalHasher {
    /// Canonical byte encoding of a payload: compact `serde_json` output.
    ///
    /// Objects are built from `BTreeMap`s, so keys come out sorted at every level.
    pub fn canonical_bytes(payload: &CanonicalPayload) -> Vec<u8> {
        payload.to_json_value().to_string().into_bytes()
    }

    /// SHA-256 fingerprint of the canonical encoding.
    pub fn fingerprint(payload: &CanonicalPayload) -> Fingerprint {
        Fingerprint::digest(&Self::canonical_bytes(payload))
    }

    /// Verify that a payload produces the expected fingerprint.
    pub fn verify(payload: &CanonicalPayload, expected: &Fingerprint) -> bool {
        Self::fingerprint(payload) == *expected
    }

    /// Raw SHA-256 of arbitrary bytes, lowercase hex.
    pub fn sha256_hex(data: &[u8]) -> String {
        hex::encode(Sha256::digest(data))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use transcript_types::PayloadValue;

    fn transcript_payload() -> CanonicalPayload {
        CanonicalPayload::new()
            .with("course", "CS301")
            .with("grade", "A")
    }

    #[test]
    fn canonical_form_is_sorted_and_compact() {
        let payload = CanonicalPayload::new()
            .with("grade", "A")
            .with("course", "CS301");
        let bytes = CanonicalHasher::canonical_bytes(&payload);
        assert_eq!(bytes, br#"{"course":"CS301","grade":"A"}"#);
    }

    #[test]
    fn fingerprint_matches_reference_digest() {
        let fp = CanonicalHasher::fingerprint(&transcript_payload());
        assert_eq!(
            fp.to_hex(),
            "ca05c1b83e1683ebb084298fc1e661e5d1b4ed1838675f80b767c86c061b7a33"
        );
    }

    #[test]
    fn nested_objects_are_sorted_at_every_level() {
        let payload = CanonicalPayload::from_json_str(
            r#"{"z":{"b":1,"a":[{"y":true,"x":null}]},"a":"first"}"#,
        )
        .unwrap();
        let bytes = CanonicalHasher::canonical_bytes(&payload);
        assert_eq!(
            std::str::from_utf8(&bytes).unwrap(),
            r#"{"a":"first","z":{"a":[{"x":null,"y":true}],"b":1}}"#
        );
    }

    #[test]
    fn strings_are_escaped_as_json() {
        let payload = CanonicalPayload::new()
            .with("q\"b\\s", "line1\nline2\r\t\u{8}\u{c}\u{1}\u{1f}\u{7f}\u{2028}Zoë😀")
            .with("n", 1_000_000u64)
            .with("arr", vec![PayloadValue::Null, PayloadValue::from(-3i64), PayloadValue::from(true)]);
        let bytes = CanonicalHasher::canonical_bytes(&payload);
        assert_eq!(
            std::str::from_utf8(&bytes).unwrap(),
            "{\"arr\":[null,-3,true],\"n\":1000000,\"q\\\"b\\\\s\":\"line1\\nline2\\r\\t\\b\\f\\u0001\\u001f\u{7f}\u{2028}Zoë😀\"}"
        );
    }

    #[test]
    fn non_ascii_is_emitted_as_raw_utf8() {
        let payload = CanonicalPayload::new().with("city", "Zürich");
        let bytes = CanonicalHasher::canonical_bytes(&payload);
        assert_eq!(bytes, "{\"city\":\"Zürich\"}".as_bytes());
    }

    #[test]
    fn different_content_produces_different_fingerprints() {
        let a = transcript_payload();
        let b = transcript_payload().with("grade", "B");
        assert_ne!(CanonicalHasher::fingerprint(&a), CanonicalHasher::fingerprint(&b));
    }

    #[test]
    fn verify_correct_and_incorrect() {
        let payload = transcript_payload();
        let fp = CanonicalHasher::fingerprint(&payload);
        assert!(CanonicalHasher::verify(&payload, &fp));
        assert!(!CanonicalHasher::verify(
            &payload.clone().with("semester", "2024-2"),
            &fp
        ));
    }

    #[test]
    fn sha256_hex_of_raw_bytes() {
        assert_eq!(
            CanonicalHasher::sha256_hex(b"a"),
            "ca978112ca1bbdcafac231b39a23dc4da786eff8147c4e72b9807785afee48bb"
        );
    }

    #[test]
    fn empty_payload_hashes_empty_object() {
        let bytes = CanonicalHasher::canonical_bytes(&CanonicalPayload::new());
        assert_eq!(bytes, b"{}");
    }

    proptest! {
        #[test]
        fn fingerprint_ignores_insertion_order(
            fields in proptest::collection::btree_map("[a-zA-Z0-9_]{1,12}", any::<i64>(), 0..16)
        ) {
            let forward: CanonicalPayload = fields
                .iter()
                .map(|(k, v)| (k.clone(), PayloadValue::from(*v)))
                .collect();
            let mut reversed = CanonicalPayload::new();
            for (k, v) in fields.iter().rev() {
                reversed.insert(k.clone(), *v);
            }
            prop_assert_eq!(
                CanonicalHasher::fingerprint(&forward),
                CanonicalHasher::fingerprint(&reversed)
            );
        }

        #[test]
        fn canonical_bytes_reparse_to_same_payload(
            fields in proptest::collection::btree_map("\\PC{0,10}", "\\PC{0,20}", 0..8)
        ) {
            let payload: CanonicalPayload = fields
                .into_iter()
                .map(|(k, v)| (k, PayloadValue::from(v)))
                .collect();
            let bytes = CanonicalHasher::canonical_bytes(&payload);
            let reparsed = CanonicalPayload::from_json_slice(&bytes).unwrap();
            prop_assert_eq!(reparsed, payload);
        }
    }
}
