use ark_bn254::Fr;
use ark_ff::Zero;

use super::{
    keys::SpendPub,
    note::Note,
};
use crate::crypto::eddsa::Signature;

/// Assignment material for the deposit circuit. The output public key stays
/// private: publishing it would identify the stealth recipient.
#[derive(Debug, Clone)]
pub struct DepositWitness {
    // public
    pub amount: u64,
    pub commitment: Fr,
    // private
    pub k: Fr,
    pub r: Fr,
    pub output_pub: SpendPub,
}

impl DepositWitness {
    pub fn new(note: &Note) -> Self {
        Self {
            amount: note.amount,
            commitment: note.commitment.0,
            k: note.k,
            r: note.r,
            output_pub: note.output_pub,
        }
    }
}

/// Assignment material for the withdrawal circuit.
///
/// A withdrawal consumes one spendable note and emits two sub-notes: the
/// unspent (change) commitment bound to the spender key, and the spent
/// (transferred) commitment bound to the output key. Either party may be
/// identified by a public ledger address instead of a curve key, in which
/// case the corresponding key coordinates are zero.
#[derive(Debug, Clone)]
pub struct WithdrawalWitness {
    // public
    pub withdrawal_address: Fr,
    pub withdrawal_amount: u64,
    pub fee: u64,
    pub nullifier: Fr,
    pub root: Fr,
    pub unspent_commitment: Fr,
    pub spent_commitment: Fr,
    pub spender_address: Fr,
    pub output_address: Fr,
    // private
    pub spender_pub: SpendPub,
    pub output_pub: SpendPub,
    pub signature: Signature,
    pub spendable_amount: u64,
    pub spendable_k: Fr,
    pub spendable_r: Fr,
    pub spendable_index: u32,
    /// `path[0]` is the spendable leaf's pre-image, `path[1..]` the sibling
    /// hashes up to (excluding) the root.
    pub path: Vec<Fr>,
    pub spent_amount: u64,
    pub spent_k: Fr,
    pub spent_r: Fr,
    pub unspent_amount: u64,
    pub unspent_k: Fr,
    pub unspent_r: Fr,
}

impl WithdrawalWitness {
    /// Assemble the assignment for a key-based spender and output.
    ///
    /// `unspent_note` is the change note bound to the spender's own key;
    /// `spent_note` the transferred sub-note bound to the output key (zero
    /// amount for a pure withdrawal). `signature` must be the spender's
    /// signature over the unspent commitment.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        withdrawal_address: Fr,
        withdrawal_amount: u64,
        fee: u64,
        from_note: &Note,
        spendable_index: u32,
        unspent_note: &Note,
        spent_note: &Note,
        root: Fr,
        path: Vec<Fr>,
        spender_pub: SpendPub,
        signature: Signature,
    ) -> Self {
        Self {
            withdrawal_address,
            withdrawal_amount,
            fee,
            nullifier: from_note.nullifier().0,
            root,
            unspent_commitment: unspent_note.commitment.0,
            spent_commitment: spent_note.commitment.0,
            spender_address: Fr::zero(),
            output_address: Fr::zero(),
            spender_pub,
            output_pub: spent_note.output_pub,
            signature,
            spendable_amount: from_note.amount,
            spendable_k: from_note.k,
            spendable_r: from_note.r,
            spendable_index,
            path,
            spent_amount: spent_note.amount,
            spent_k: spent_note.k,
            spent_r: spent_note.r,
            unspent_amount: unspent_note.amount,
            unspent_k: unspent_note.k,
            unspent_r: unspent_note.r,
        }
    }

    /// Assemble the assignment for an address-identified spender and
    /// output.
    ///
    /// Address-based parties carry no curve keys: both key coordinate
    /// pairs are zero, the in-circuit signature check is waived, and the
    /// spend is authorized by the outer transaction layer. Every note
    /// involved must have been bound to the zero key.
    #[allow(clippy::too_many_arguments)]
    pub fn new_address_based(
        withdrawal_address: Fr,
        withdrawal_amount: u64,
        fee: u64,
        from_note: &Note,
        spendable_index: u32,
        unspent_note: &Note,
        spent_note: &Note,
        root: Fr,
        path: Vec<Fr>,
        spender_address: Fr,
        output_address: Fr,
    ) -> Self {
        Self {
            withdrawal_address,
            withdrawal_amount,
            fee,
            nullifier: from_note.nullifier().0,
            root,
            unspent_commitment: unspent_note.commitment.0,
            spent_commitment: spent_note.commitment.0,
            spender_address,
            output_address,
            spender_pub: SpendPub::zero(),
            output_pub: SpendPub::zero(),
            signature: Signature::absent(),
            spendable_amount: from_note.amount,
            spendable_k: from_note.k,
            spendable_r: from_note.r,
            spendable_index,
            path,
            spent_amount: spent_note.amount,
            spent_k: spent_note.k,
            spent_r: spent_note.r,
            unspent_amount: unspent_note.amount,
            unspent_k: unspent_note.k,
            unspent_r: unspent_note.r,
        }
    }
}
