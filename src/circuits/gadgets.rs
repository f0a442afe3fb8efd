//! Constraint-system twins of the native primitives.
//!
//! Every gadget here mirrors a function in `crypto`: the sponge mirrors
//! `poseidon::field_hash` (same parameter set), the signature gadget mirrors
//! `eddsa::verify`, the Merkle walk mirrors `Accumulator::verify`. The
//! native/gadget pairs are cross-checked by the tests at the bottom.

use ark_bn254::Fr;
use ark_crypto_primitives::sponge::{
    constraints::CryptographicSpongeVar,
    poseidon::constraints::PoseidonSpongeVar,
};
use ark_ec::Group;
use ark_ed_on_bn254::{
    EdwardsConfig,
    EdwardsProjective,
    constraints::EdwardsVar,
};
use ark_ff::Zero;
use ark_r1cs_std::fields::fp::FpVar;
use ark_r1cs_std::prelude::*;
use ark_relations::r1cs::{
    ConstraintSystemRef,
    SynthesisError,
};

use crate::crypto::poseidon::poseidon_config;

/// In-circuit FieldHash: absorb each input, squeeze one element.
pub fn field_hash_gadget(
    cs: ConstraintSystemRef<Fr>,
    inputs: &[FpVar<Fr>],
) -> Result<FpVar<Fr>, SynthesisError> {
    let mut sponge = PoseidonSpongeVar::new(cs, poseidon_config());
    for input in inputs {
        sponge.absorb(input)?;
    }
    Ok(sponge.squeeze_field_elements(1)?.remove(0))
}

/// The double-hash commitment: returns `(inner, outer)` where the inner
/// hash is the Merkle leaf pre-image and the outer one the public
/// commitment.
pub fn commitment_gadget(
    cs: ConstraintSystemRef<Fr>,
    amount: &FpVar<Fr>,
    k: &FpVar<Fr>,
    r: &FpVar<Fr>,
    pub_x: &FpVar<Fr>,
    pub_y: &FpVar<Fr>,
) -> Result<(FpVar<Fr>, FpVar<Fr>), SynthesisError> {
    let inner = field_hash_gadget(
        cs.clone(),
        &[
            amount.clone(),
            k.clone(),
            r.clone(),
            pub_x.clone(),
            pub_y.clone(),
        ],
    )?;
    let outer = field_hash_gadget(cs, &[inner.clone()])?;
    Ok((inner, outer))
}

/// Walk a Merkle path up to the root.
///
/// `path[0]` is the leaf pre-image; it is hashed once to obtain the stored
/// leaf, then combined with the sibling at each level, ordered by the
/// leaf-index bits (low bit first; 0 = left child).
pub fn enforce_merkle_proof(
    cs: ConstraintSystemRef<Fr>,
    path: &[FpVar<Fr>],
    index_bits: &[Boolean<Fr>],
    root: &FpVar<Fr>,
) -> Result<(), SynthesisError> {
    let mut current = field_hash_gadget(cs.clone(), &path[..1])?;
    for (bit, sibling) in index_bits.iter().zip(&path[1..]) {
        // bit set means the current node is a right child
        let left = FpVar::conditionally_select(bit, sibling, &current)?;
        let right = FpVar::conditionally_select(bit, &current, sibling)?;
        current = field_hash_gadget(cs.clone(), &[left, right])?;
    }
    current.enforce_equal(root)
}

/// A party is identified either by a ledger address or by a curve key:
/// a non-zero address forces both key coordinates to zero.
pub fn enforce_address_or_key(
    address: &FpVar<Fr>,
    key_x: &FpVar<Fr>,
    key_y: &FpVar<Fr>,
) -> Result<(), SynthesisError> {
    let zero = FpVar::constant(Fr::zero());
    (address * key_x).enforce_equal(&zero)?;
    (address * key_y).enforce_equal(&zero)
}

/// Verify `s·G == R + c·A` with `c = H(R.x, R.y, A.x, A.y, m)`, but only
/// when `is_key_based` holds (an address-identified spender carries no key
/// and no signature). When enforced, the public key is also checked to lie
/// on the curve, so a forged off-curve point cannot satisfy the equation.
pub fn enforce_signature(
    cs: ConstraintSystemRef<Fr>,
    pk_x: &FpVar<Fr>,
    pk_y: &FpVar<Fr>,
    sig_r_x: &FpVar<Fr>,
    sig_r_y: &FpVar<Fr>,
    sig_s: &FpVar<Fr>,
    message: &FpVar<Fr>,
    is_key_based: &Boolean<Fr>,
) -> Result<(), SynthesisError> {
    enforce_on_curve(pk_x, pk_y, is_key_based)?;
    enforce_on_curve(sig_r_x, sig_r_y, is_key_based)?;

    let challenge = field_hash_gadget(
        cs.clone(),
        &[
            sig_r_x.clone(),
            sig_r_y.clone(),
            pk_x.clone(),
            pk_y.clone(),
            message.clone(),
        ],
    )?;
    let challenge_bits = challenge.to_bits_le()?;
    let s_bits = sig_s.to_bits_le()?;

    let generator = EdwardsVar::new_constant(cs, EdwardsProjective::generator())?;
    let pk = EdwardsVar::new(pk_x.clone(), pk_y.clone());
    let sig_r = EdwardsVar::new(sig_r_x.clone(), sig_r_y.clone());

    let lhs = generator.scalar_mul_le(s_bits.iter())?;
    let rhs = sig_r + pk.scalar_mul_le(challenge_bits.iter())?;
    lhs.x.conditional_enforce_equal(&rhs.x, is_key_based)?;
    lhs.y.conditional_enforce_equal(&rhs.y, is_key_based)
}

/// Twisted-Edwards curve membership, `a·x² + y² == 1 + d·x²·y²`, enforced
/// only under `condition`.
fn enforce_on_curve(
    x: &FpVar<Fr>,
    y: &FpVar<Fr>,
    condition: &Boolean<Fr>,
) -> Result<(), SynthesisError> {
    let a = FpVar::constant(<EdwardsConfig as ark_ec::twisted_edwards::TECurveConfig>::COEFF_A);
    let d = FpVar::constant(<EdwardsConfig as ark_ec::twisted_edwards::TECurveConfig>::COEFF_D);
    let x2 = x * x;
    let y2 = y * y;
    let lhs = &a * &x2 + &y2;
    let rhs = FpVar::constant(Fr::from(1u64)) + &d * &x2 * &y2;
    lhs.conditional_enforce_equal(&rhs, condition)
}
