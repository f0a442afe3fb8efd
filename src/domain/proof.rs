use ark_bn254::Fr;

use crate::crypto::field::{
    amount_to_fr,
    fr_to_bytes32,
};

/// A deposit proof with its ordered public inputs.
#[derive(Debug, Clone)]
pub struct DepositProof {
    /// Compressed Groth16 proof bytes.
    pub proof: Vec<u8>,
    pub public_inputs: DepositPublicInputs,
}

/// Public inputs of the deposit circuit, in allocation order.
#[derive(Debug, Clone)]
pub struct DepositPublicInputs {
    pub amount: u64,
    pub commitment: Fr,
}

impl DepositPublicInputs {
    /// Field-element view, ordered as the circuit allocates them.
    pub fn to_field_elements(&self) -> Vec<Fr> {
        vec![amount_to_fr(self.amount), self.commitment]
    }

    /// Wire view: one 32-byte big-endian blob per input.
    pub fn to_bytes32(&self) -> Vec<[u8; 32]> {
        self.to_field_elements()
            .iter()
            .map(fr_to_bytes32)
            .collect()
    }
}

/// A withdrawal proof with its ordered public inputs.
#[derive(Debug, Clone)]
pub struct WithdrawalProof {
    pub proof: Vec<u8>,
    pub public_inputs: WithdrawalPublicInputs,
}

/// Public inputs of the withdrawal circuit, in allocation order.
#[derive(Debug, Clone)]
pub struct WithdrawalPublicInputs {
    pub withdrawal_address: Fr,
    pub withdrawal_amount: u64,
    pub fee: u64,
    pub nullifier: Fr,
    pub root: Fr,
    pub unspent_commitment: Fr,
    pub spent_commitment: Fr,
    pub spender_address: Fr,
    pub output_address: Fr,
}

impl WithdrawalPublicInputs {
    pub fn to_field_elements(&self) -> Vec<Fr> {
        vec![
            self.withdrawal_address,
            amount_to_fr(self.withdrawal_amount),
            amount_to_fr(self.fee),
            self.nullifier,
            self.root,
            self.unspent_commitment,
            self.spent_commitment,
            self.spender_address,
            self.output_address,
        ]
    }

    pub fn to_bytes32(&self) -> Vec<[u8; 32]> {
        self.to_field_elements()
            .iter()
            .map(fr_to_bytes32)
            .collect()
    }
}
