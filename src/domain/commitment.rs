use ark_bn254::Fr;

use crate::crypto::field::{
    fr_from_bytes32,
    fr_to_bytes32,
};

/// The on-chain representation of a note: the double hash of its contents.
/// The inner hash is the Merkle leaf pre-image; the outer hash hides it from
/// on-chain observers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Commitment(pub Fr);

impl Commitment {
    pub fn from_bytes(bytes: &[u8; 32]) -> Self {
        Self(fr_from_bytes32(bytes))
    }

    pub fn to_bytes(&self) -> [u8; 32] {
        fr_to_bytes32(&self.0)
    }
}

impl From<Fr> for Commitment {
    fn from(value: Fr) -> Self {
        Self(value)
    }
}

impl From<Commitment> for Fr {
    fn from(value: Commitment) -> Self {
        value.0
    }
}
