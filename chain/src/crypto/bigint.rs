//! Serde representation for protocol big integers.
//!
//! Every `BigUint` that appears in a wire type or a config file is encoded
//! as a lowercase hex string. The encoding is deterministic, so the same
//! value always produces the same bytes whether the container is JSON (the
//! RPC surface, config files) or bincode (the canonical bytes that get
//! hashed and signed).

use num_bigint::BigUint;
use serde::{Deserialize, Deserializer, Serializer, de};

/// Use with `#[serde(with = "crate::crypto::bigint::hex_big")]`.
pub mod hex_big {
    use super::*;

    pub fn serialize<S>(value: &BigUint, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&value.to_str_radix(16))
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<BigUint, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        BigUint::parse_bytes(s.as_bytes(), 16)
            .ok_or_else(|| de::Error::custom(format!("invalid hex big integer: {s:?}")))
    }
}

#[cfg(test)]
mod tests {
    use num_bigint::BigUint;
    use serde::{Deserialize, Serialize};

    #[derive(Serialize, Deserialize, PartialEq, Debug)]
    struct Wrapper {
        #[serde(with = "super::hex_big")]
        value: BigUint,
    }

    #[test]
    fn hex_big_roundtrips_through_json() {
        let w = Wrapper {
            value: BigUint::parse_bytes(b"deadbeef0123456789", 16).unwrap(),
        };
        let json = serde_json::to_string(&w).expect("serialize");
        assert!(json.contains("deadbeef0123456789"));
        let back: Wrapper = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(w, back);
    }

    #[test]
    fn hex_big_roundtrips_through_bincode() {
        let w = Wrapper {
            value: BigUint::from(98765432109876543210_u128),
        };
        let cfg = bincode::config::standard();
        let bytes = bincode::serde::encode_to_vec(&w, cfg).expect("encode");
        let (back, _): (Wrapper, usize) =
            bincode::serde::decode_from_slice(&bytes, cfg).expect("decode");
        assert_eq!(w, back);
    }

    #[test]
    fn rejects_non_hex_input() {
        let err = serde_json::from_str::<Wrapper>(r#"{"value":"zzzz"}"#);
        assert!(err.is_err());
    }
}
