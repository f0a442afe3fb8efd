use ark_bn254::Fr;
use ark_ff::{
    BigInteger,
    PrimeField,
};

/// Convert a field element to its fixed-width 32-byte big-endian form.
pub fn fr_to_bytes32(value: &Fr) -> [u8; 32] {
    let bytes = value.into_bigint().to_bytes_be();
    let mut out = [0u8; 32];
    out[32 - bytes.len()..].copy_from_slice(&bytes);
    out
}

/// Interpret a 32-byte big-endian blob as a field element, reducing modulo
/// the field order. Ledger addresses may exceed the modulus; callers that
/// need the raw bytes must keep them alongside.
pub fn fr_from_bytes32(bytes: &[u8; 32]) -> Fr {
    Fr::from_be_bytes_mod_order(bytes)
}

/// Embed a ledger amount into the field by right-justifying its big-endian
/// bytes inside a zero-padded 32-byte buffer.
pub fn amount_to_fr(amount: u64) -> Fr {
    Fr::from(amount)
}

/// The 32-byte embedding of an amount, as it appears on the wire.
pub fn amount_to_bytes32(amount: u64) -> [u8; 32] {
    let mut out = [0u8; 32];
    out[24..].copy_from_slice(&amount.to_be_bytes());
    out
}

/// Read an amount back out of its 32-byte embedding.
pub fn amount_from_bytes32(bytes: &[u8; 32]) -> u64 {
    let mut tail = [0u8; 8];
    tail.copy_from_slice(&bytes[24..]);
    u64::from_be_bytes(tail)
}

/// Serde helper serializing field elements as hex-encoded 32-byte blobs.
pub mod fr_hex {
    use ark_bn254::Fr;
    use serde::{
        Deserialize,
        Deserializer,
        Serializer,
    };

    use super::{
        fr_from_bytes32,
        fr_to_bytes32,
    };

    pub fn serialize<S>(value: &Fr, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&hex::encode(fr_to_bytes32(value)))
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Fr, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s: String = Deserialize::deserialize(deserializer)?;
        let bytes = hex::decode(&s).map_err(serde::de::Error::custom)?;
        let arr: [u8; 32] = bytes
            .try_into()
            .map_err(|_| serde::de::Error::custom("expected 32 bytes"))?;
        Ok(fr_from_bytes32(&arr))
    }
}

/// Serde helper for vectors of field elements.
pub mod fr_hex_vec {
    use ark_bn254::Fr;
    use serde::{
        Deserialize,
        Deserializer,
        Serializer,
        ser::SerializeSeq,
    };

    use super::{
        fr_from_bytes32,
        fr_to_bytes32,
    };

    pub fn serialize<S>(values: &[Fr], serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut seq = serializer.serialize_seq(Some(values.len()))?;
        for v in values {
            seq.serialize_element(&hex::encode(fr_to_bytes32(v)))?;
        }
        seq.end()
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Vec<Fr>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let strings: Vec<String> = Deserialize::deserialize(deserializer)?;
        strings
            .into_iter()
            .map(|s| {
                let bytes = hex::decode(&s).map_err(serde::de::Error::custom)?;
                let arr: [u8; 32] = bytes
                    .try_into()
                    .map_err(|_| serde::de::Error::custom("expected 32 bytes"))?;
                Ok(fr_from_bytes32(&arr))
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fr_roundtrip() {
        let value = Fr::from(123_456_789u64);
        let bytes = fr_to_bytes32(&value);
        assert_eq!(fr_from_bytes32(&bytes), value);
    }

    #[test]
    fn test_amount_embedding_matches_field_value() {
        let amount = 10_000_000u64;
        let embedded = fr_from_bytes32(&amount_to_bytes32(amount));
        assert_eq!(embedded, amount_to_fr(amount));
    }

    #[test]
    fn test_amount_roundtrip() {
        let amount = u64::MAX - 7;
        assert_eq!(amount_from_bytes32(&amount_to_bytes32(amount)), amount);
    }
}
