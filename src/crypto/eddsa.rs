//! Schnorr signatures over the companion twisted-Edwards curve.
//!
//! The challenge is a FieldHash over the curve's base field, which is the
//! SNARK scalar field, so the same verification equation is enforceable by
//! the withdrawal circuit's signature gadget.

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
use ark_ff::{
    BigInteger,
    PrimeField,
    Zero,
};
use ark_serialize::{
    CanonicalDeserialize,
    CanonicalSerialize,
    SerializationError,
};
use sha2::{
    Digest,
    Sha512,
};

use crate::crypto::{
    field::fr_to_bytes32,
    poseidon::field_hash,
};

/// A Schnorr signature: commitment point and response scalar.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Signature {
    pub r: EdwardsAffine,
    pub s: EdScalar,
}

impl Signature {
    /// All-zero placeholder for assignments where the signature check is
    /// waived (an address-identified spender). Keeps the conditional
    /// constraints satisfiable without a key.
    pub fn absent() -> Self {
        Self {
            r: EdwardsAffine::new_unchecked(Fr::zero(), Fr::zero()),
            s: EdScalar::zero(),
        }
    }
}

/// Reduce a base-field element into the curve's scalar field.
///
/// The reduction is sound for scalar multiplication: the curve subgroup has
/// prime order, so `(c mod order)·P == c·P` for the integer `c` the circuit
/// multiplies by bit decomposition.
pub fn scalar_from_base_field(value: &Fr) -> EdScalar {
    EdScalar::from_le_bytes_mod_order(&value.into_bigint().to_bytes_le())
}

/// Big-endian 32-byte form of a curve scalar.
pub fn scalar_to_bytes32(value: &EdScalar) -> [u8; 32] {
    let bytes = value.into_bigint().to_bytes_be();
    let mut out = [0u8; 32];
    out[32 - bytes.len()..].copy_from_slice(&bytes);
    out
}

/// Compressed 32-byte encoding of a curve point.
pub fn point_to_bytes(point: &EdwardsAffine) -> [u8; 32] {
    let mut out = [0u8; 32];
    point
        .serialize_compressed(&mut out[..])
        .expect("compressed Edwards point is exactly 32 bytes");
    out
}

/// Decode a compressed curve point, checking it lies on the curve.
pub fn point_from_bytes(bytes: &[u8]) -> Result<EdwardsAffine, SerializationError> {
    EdwardsAffine::deserialize_compressed(bytes)
}

/// The signature challenge: FieldHash over both points and the message.
fn challenge(r: &EdwardsAffine, pk: &EdwardsAffine, message: &Fr) -> EdScalar {
    let c = field_hash(&[r.x, r.y, pk.x, pk.y, *message]);
    scalar_from_base_field(&c)
}

/// Sign a field-element message. The nonce is derived deterministically from
/// the secret and the message, so signing never needs an RNG.
pub fn sign(secret: &EdScalar, message: &Fr) -> Signature {
    let mut hasher = Sha512::new();
    hasher.update(scalar_to_bytes32(secret));
    hasher.update(fr_to_bytes32(message));
    let nonce = EdScalar::from_le_bytes_mod_order(&hasher.finalize());

    let r = (EdwardsProjective::generator() * nonce).into_affine();
    let pk = (EdwardsProjective::generator() * *secret).into_affine();
    let c = challenge(&r, &pk, message);
    let s = nonce + c * secret;

    Signature { r, s }
}

/// Verify `s·G == R + c·A`, the equation the in-circuit gadget enforces.
pub fn verify(pk: &EdwardsAffine, message: &Fr, signature: &Signature) -> bool {
    let c = challenge(&signature.r, pk, message);
    let lhs = EdwardsProjective::generator() * signature.s;
    let rhs = EdwardsProjective::from(signature.r) + EdwardsProjective::from(*pk) * c;
    lhs == rhs
}
