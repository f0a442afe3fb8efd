use std::cmp::Ordering;

use ark_bn254::Fr;
use ark_ff::Zero;
use ark_r1cs_std::fields::fp::FpVar;
use ark_r1cs_std::prelude::*;
use ark_relations::r1cs::{
    ConstraintSynthesizer,
    ConstraintSystemRef,
    SynthesisError,
};

use super::gadgets::{
    commitment_gadget,
    enforce_address_or_key,
    enforce_merkle_proof,
    enforce_signature,
    field_hash_gadget,
};
use crate::{
    crypto::{
        eddsa::scalar_to_bytes32,
        field::{
            amount_to_fr,
            fr_from_bytes32,
        },
    },
    domain::witness::WithdrawalWitness,
};

/// The withdrawal circuit.
///
/// Proves knowledge of an unspent note inside the accumulator and of a
/// signature authorizing its spend, and binds the two freshly emitted
/// sub-notes: the change commitment back to the spender key and the
/// transferred commitment to the output key. Either party may instead be a
/// public ledger address, in which case its key coordinates are zero and,
/// for the spender, the signature check is waived (an address-based spend
/// is authorized by the outer transaction's own signature).
#[derive(Debug, Clone)]
pub struct WithdrawalCircuit {
    /// Tree depth; fixes the circuit shape.
    pub depth: usize,
    // public
    pub withdrawal_address: Option<Fr>,
    pub withdrawal_amount: Option<Fr>,
    pub fee: Option<Fr>,
    pub nullifier: Option<Fr>,
    pub root: Option<Fr>,
    pub unspent_commitment: Option<Fr>,
    pub spent_commitment: Option<Fr>,
    pub spender_address: Option<Fr>,
    pub output_address: Option<Fr>,
    // private
    pub spender_x: Option<Fr>,
    pub spender_y: Option<Fr>,
    pub output_x: Option<Fr>,
    pub output_y: Option<Fr>,
    pub sig_r_x: Option<Fr>,
    pub sig_r_y: Option<Fr>,
    pub sig_s: Option<Fr>,
    pub spendable_amount: Option<Fr>,
    pub spendable_k: Option<Fr>,
    pub spendable_r: Option<Fr>,
    pub spendable_index: Option<Fr>,
    pub path: Option<Vec<Fr>>,
    pub spent_amount: Option<Fr>,
    pub spent_k: Option<Fr>,
    pub spent_r: Option<Fr>,
    pub unspent_amount: Option<Fr>,
    pub unspent_k: Option<Fr>,
    pub unspent_r: Option<Fr>,
}

impl WithdrawalCircuit {
    /// An unassigned circuit of the given depth, for setup and compilation.
    pub fn blank(depth: usize) -> Self {
        Self {
            depth,
            withdrawal_address: None,
            withdrawal_amount: None,
            fee: None,
            nullifier: None,
            root: None,
            unspent_commitment: None,
            spent_commitment: None,
            spender_address: None,
            output_address: None,
            spender_x: None,
            spender_y: None,
            output_x: None,
            output_y: None,
            sig_r_x: None,
            sig_r_y: None,
            sig_s: None,
            spendable_amount: None,
            spendable_k: None,
            spendable_r: None,
            spendable_index: None,
            path: None,
            spent_amount: None,
            spent_k: None,
            spent_r: None,
            unspent_amount: None,
            unspent_k: None,
            unspent_r: None,
        }
    }

    pub fn from_witness(witness: &WithdrawalWitness) -> Self {
        Self {
            depth: witness.path.len() - 1,
            withdrawal_address: Some(witness.withdrawal_address),
            withdrawal_amount: Some(amount_to_fr(witness.withdrawal_amount)),
            fee: Some(amount_to_fr(witness.fee)),
            nullifier: Some(witness.nullifier),
            root: Some(witness.root),
            unspent_commitment: Some(witness.unspent_commitment),
            spent_commitment: Some(witness.spent_commitment),
            spender_address: Some(witness.spender_address),
            output_address: Some(witness.output_address),
            spender_x: Some(witness.spender_pub.x()),
            spender_y: Some(witness.spender_pub.y()),
            output_x: Some(witness.output_pub.x()),
            output_y: Some(witness.output_pub.y()),
            sig_r_x: Some(witness.signature.r.x),
            sig_r_y: Some(witness.signature.r.y),
            sig_s: Some(fr_from_bytes32(&scalar_to_bytes32(&witness.signature.s))),
            spendable_amount: Some(amount_to_fr(witness.spendable_amount)),
            spendable_k: Some(witness.spendable_k),
            spendable_r: Some(witness.spendable_r),
            spendable_index: Some(Fr::from(witness.spendable_index)),
            path: Some(witness.path.clone()),
            spent_amount: Some(amount_to_fr(witness.spent_amount)),
            spent_k: Some(witness.spent_k),
            spent_r: Some(witness.spent_r),
            unspent_amount: Some(amount_to_fr(witness.unspent_amount)),
            unspent_k: Some(witness.unspent_k),
            unspent_r: Some(witness.unspent_r),
        }
    }
}

impl ConstraintSynthesizer<Fr> for WithdrawalCircuit {
    fn generate_constraints(self, cs: ConstraintSystemRef<Fr>) -> Result<(), SynthesisError> {

        // Public inputs, in the order the verifier receives them.
        let withdrawal_address =
            FpVar::new_input(cs.clone(), || self.withdrawal_address.ok_or(SynthesisError::AssignmentMissing))?;
        let withdrawal_amount =
            FpVar::new_input(cs.clone(), || self.withdrawal_amount.ok_or(SynthesisError::AssignmentMissing))?;
        let fee = FpVar::new_input(cs.clone(), || self.fee.ok_or(SynthesisError::AssignmentMissing))?;
        let nullifier = FpVar::new_input(cs.clone(), || self.nullifier.ok_or(SynthesisError::AssignmentMissing))?;
        let root = FpVar::new_input(cs.clone(), || self.root.ok_or(SynthesisError::AssignmentMissing))?;
        let unspent_commitment =
            FpVar::new_input(cs.clone(), || self.unspent_commitment.ok_or(SynthesisError::AssignmentMissing))?;
        let spent_commitment =
            FpVar::new_input(cs.clone(), || self.spent_commitment.ok_or(SynthesisError::AssignmentMissing))?;
        let spender_address =
            FpVar::new_input(cs.clone(), || self.spender_address.ok_or(SynthesisError::AssignmentMissing))?;
        let output_address =
            FpVar::new_input(cs.clone(), || self.output_address.ok_or(SynthesisError::AssignmentMissing))?;

        // The withdrawal address participates in no constraint beyond being
        // a public input: it may exceed the field modulus on the ledger side
        // and is bound by the on-chain program, not the circuit.
        let _ = withdrawal_address;

        // Private inputs.
        let spender_x = FpVar::new_witness(cs.clone(), || self.spender_x.ok_or(SynthesisError::AssignmentMissing))?;
        let spender_y = FpVar::new_witness(cs.clone(), || self.spender_y.ok_or(SynthesisError::AssignmentMissing))?;
        let output_x = FpVar::new_witness(cs.clone(), || self.output_x.ok_or(SynthesisError::AssignmentMissing))?;
        let output_y = FpVar::new_witness(cs.clone(), || self.output_y.ok_or(SynthesisError::AssignmentMissing))?;
        let sig_r_x = FpVar::new_witness(cs.clone(), || self.sig_r_x.ok_or(SynthesisError::AssignmentMissing))?;
        let sig_r_y = FpVar::new_witness(cs.clone(), || self.sig_r_y.ok_or(SynthesisError::AssignmentMissing))?;
        let sig_s = FpVar::new_witness(cs.clone(), || self.sig_s.ok_or(SynthesisError::AssignmentMissing))?;
        let spendable_amount =
            FpVar::new_witness(cs.clone(), || self.spendable_amount.ok_or(SynthesisError::AssignmentMissing))?;
        let spendable_k = FpVar::new_witness(cs.clone(), || self.spendable_k.ok_or(SynthesisError::AssignmentMissing))?;
        let spendable_r = FpVar::new_witness(cs.clone(), || self.spendable_r.ok_or(SynthesisError::AssignmentMissing))?;
        let spendable_index =
            FpVar::new_witness(cs.clone(), || self.spendable_index.ok_or(SynthesisError::AssignmentMissing))?;
        let mut path = Vec::with_capacity(self.depth + 1);
        for i in 0..=self.depth {
            let value = self.path.as_ref().and_then(|p| p.get(i).copied());
            path.push(FpVar::new_witness(cs.clone(), || value.ok_or(SynthesisError::AssignmentMissing))?);
        }
        let spent_amount = FpVar::new_witness(cs.clone(), || self.spent_amount.ok_or(SynthesisError::AssignmentMissing))?;
        let spent_k = FpVar::new_witness(cs.clone(), || self.spent_k.ok_or(SynthesisError::AssignmentMissing))?;
        let spent_r = FpVar::new_witness(cs.clone(), || self.spent_r.ok_or(SynthesisError::AssignmentMissing))?;
        let unspent_amount =
            FpVar::new_witness(cs.clone(), || self.unspent_amount.ok_or(SynthesisError::AssignmentMissing))?;
        let unspent_k = FpVar::new_witness(cs.clone(), || self.unspent_k.ok_or(SynthesisError::AssignmentMissing))?;
        let unspent_r = FpVar::new_witness(cs.clone(), || self.unspent_r.ok_or(SynthesisError::AssignmentMissing))?;

        // Each party is a ledger address xor a curve key.
        enforce_address_or_key(&spender_address, &spender_x, &spender_y)?;
        enforce_address_or_key(&output_address, &output_x, &output_y)?;

        // nullifier == H(amount, k)
        let computed_nullifier = field_hash_gadget(
            cs.clone(),
            &[spendable_amount.clone(), spendable_k.clone()],
        )?;
        computed_nullifier.enforce_equal(&nullifier)?;

        // Change returns to the spender key.
        let (_, unspent_outer) = commitment_gadget(
            cs.clone(),
            &unspent_amount,
            &unspent_k,
            &unspent_r,
            &spender_x,
            &spender_y,
        )?;
        unspent_outer.enforce_equal(&unspent_commitment)?;

        // The transferred portion goes to the output key.
        let (_, spent_outer) = commitment_gadget(
            cs.clone(),
            &spent_amount,
            &spent_k,
            &spent_r,
            &output_x,
            &output_y,
        )?;
        spent_outer.enforce_equal(&spent_commitment)?;

        // Key-based spenders must have signed the change commitment.
        let is_key_based = spender_address.is_eq(&FpVar::constant(Fr::zero()))?;
        enforce_signature(
            cs.clone(),
            &spender_x,
            &spender_y,
            &sig_r_x,
            &sig_r_y,
            &sig_s,
            &unspent_commitment,
            &is_key_based,
        )?;

        // The path opens with the spendable leaf's pre-image.
        let leaf_value = field_hash_gadget(
            cs.clone(),
            &[
                spendable_amount.clone(),
                spendable_k.clone(),
                spendable_r.clone(),
                spender_x.clone(),
                spender_y.clone(),
            ],
        )?;
        leaf_value.enforce_equal(&path[0])?;

        // ...and hashes up to a windowed root.
        let index_bits = spendable_index.to_bits_le()?;
        enforce_merkle_proof(cs, &path, &index_bits[..self.depth], &root)?;

        // consumed <= amount, fee <= amount - consumed,
        // unspent == amount - consumed - fee
        let consumed = &withdrawal_amount + &spent_amount;
        consumed.enforce_cmp(&spendable_amount, Ordering::Less, true)?;
        let remainder = &spendable_amount - &consumed;
        fee.enforce_cmp(&remainder, Ordering::Less, true)?;
        unspent_amount.enforce_equal(&(&remainder - &fee))
    }
}
