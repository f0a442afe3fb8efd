use ark_bn254::Fr;
use ark_ec::{
    CurveGroup,
    Group,
};
use ark_ed_on_bn254::{
    EdwardsAffine,
    EdwardsProjective,
    Fr as EdScalar,
};
use ark_ff::Zero;
use ark_serialize::SerializationError;
use ark_std::UniformRand;
use rand::rngs::ThreadRng;

use crate::crypto::eddsa::{
    self,
    Signature,
    point_from_bytes,
    point_to_bytes,
};

/// Spend key: the Edwards-form private scalar. Signs withdrawal commitments
/// (natively and inside the circuit) and derives note secrets via
/// Diffie-Hellman with the counterparty's public key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpendKey(EdScalar);

impl SpendKey {
    /// Generate a random spend key.
    pub fn random() -> Self {
        let mut rng: ThreadRng = rand::thread_rng();
        Self(EdScalar::rand(&mut rng))
    }

    pub fn from_scalar(scalar: EdScalar) -> Self {
        Self(scalar)
    }

    /// The public key `sk · G`.
    pub fn public(&self) -> SpendPub {
        SpendPub((EdwardsProjective::generator() * self.0).into_affine())
    }

    /// The Diffie-Hellman shared point `sk · pk`.
    pub fn shared_point(&self, other: &SpendPub) -> EdwardsAffine {
        (EdwardsProjective::from(other.0) * self.0).into_affine()
    }

    /// Sign a field-element message with the scheme the withdrawal circuit
    /// verifies.
    pub fn sign(&self, message: &Fr) -> Signature {
        eddsa::sign(&self.0, message)
    }

    pub fn as_scalar(&self) -> &EdScalar {
        &self.0
    }
}

/// Spend public key: an affine point on the companion curve. Its coordinates
/// are the `(x, y)` pair bound into note commitments.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SpendPub(pub EdwardsAffine);

impl SpendPub {
    /// The all-zero placeholder standing in for an absent key when a party
    /// is identified by a ledger address instead. Not a curve point; the
    /// circuit only ever hashes its coordinates.
    pub fn zero() -> Self {
        Self(EdwardsAffine::new_unchecked(Fr::zero(), Fr::zero()))
    }

    pub fn x(&self) -> Fr {
        self.0.x
    }

    pub fn y(&self) -> Fr {
        self.0.y
    }

    /// Compressed 32-byte encoding.
    pub fn to_bytes(&self) -> [u8; 32] {
        point_to_bytes(&self.0)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, SerializationError> {
        point_from_bytes(bytes).map(Self)
    }

    /// Verify a signature over a field-element message.
    pub fn verify(&self, message: &Fr, signature: &Signature) -> bool {
        eddsa::verify(&self.0, message, signature)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_public_key_deterministic() {
        let sk = SpendKey::random();
        assert_eq!(sk.public(), sk.public());
    }

    #[test]
    fn test_diffie_hellman_symmetry() {
        let a = SpendKey::random();
        let b = SpendKey::random();
        assert_eq!(a.shared_point(&b.public()), b.shared_point(&a.public()));
    }

    #[test]
    fn test_sign_verify_through_keys() {
        let sk = SpendKey::random();
        let message = Fr::from(7u64);
        let signature = sk.sign(&message);
        assert!(sk.public().verify(&message, &signature));
    }

    #[test]
    fn test_pub_bytes_roundtrip() {
        let pk = SpendKey::random().public();
        assert_eq!(SpendPub::from_bytes(&pk.to_bytes()).unwrap(), pk);
    }
}
