use ark_bn254::Fr;

use crate::crypto::field::{
    fr_from_bytes32,
    fr_to_bytes32,
};

/// Nullifier: `H(amount, k)`. Disclosed on withdrawal; the contract keys a
/// box on it, so spending the same note twice collides on box creation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Nullifier(pub Fr);

impl Nullifier {
    pub fn from_bytes(bytes: &[u8; 32]) -> Self {
        Self(fr_from_bytes32(bytes))
    }

    pub fn to_bytes(&self) -> [u8; 32] {
        fr_to_bytes32(&self.0)
    }
}

impl From<Fr> for Nullifier {
    fn from(value: Fr) -> Self {
        Self(value)
    }
}

impl From<Nullifier> for Fr {
    fn from(value: Nullifier) -> Self {
        value.0
    }
}
