//! Witness assembly and proof generation.
//!
//! The prover owns the two compiled circuits (expensive to load, immutable,
//! shared by reference), turns domain witnesses into circuit assignments,
//! proves, and self-verifies before anything reaches the composer. Failures
//! leave no local state behind.

use std::sync::Arc;

use thiserror::Error;

use crate::{
    circuits::{
        compiled::{
            CircuitError,
            CompiledCircuit,
        },
        deposit::DepositCircuit,
        withdrawal::WithdrawalCircuit,
    },
    domain::{
        proof::{
            DepositProof,
            DepositPublicInputs,
            WithdrawalProof,
            WithdrawalPublicInputs,
        },
        witness::{
            DepositWitness,
            WithdrawalWitness,
        },
    },
    ledger::abi::AbiArg,
};

#[derive(Debug, Error)]
pub enum ProverError {
    #[error("proof generation failed: {0}")]
    ProofGeneration(#[from] CircuitError),

    #[error("proof failed self-verification; witness does not satisfy the circuit")]
    Verification,

    #[error("invalid witness: {0}")]
    InvalidWitness(String),
}

pub struct Prover {
    deposit: Arc<CompiledCircuit>,
    withdrawal: Arc<CompiledCircuit>,
}

impl Prover {
    pub fn new(deposit: Arc<CompiledCircuit>, withdrawal: Arc<CompiledCircuit>) -> Self {
        Self {
            deposit,
            withdrawal,
        }
    }

    /// Prove the deposit circuit for a witness.
    pub fn prove_deposit(&self, witness: &DepositWitness) -> Result<DepositProof, ProverError> {
        let assignment = DepositCircuit::from_witness(witness);
        let proof = self.deposit.prove(assignment, &mut rand::thread_rng())?;

        let public_inputs = DepositPublicInputs {
            amount: witness.amount,
            commitment: witness.commitment,
        };
        if !self
            .deposit
            .verify(&public_inputs.to_field_elements(), &proof)?
        {
            return Err(ProverError::Verification);
        }

        Ok(DepositProof {
            proof,
            public_inputs,
        })
    }

    /// Prove the withdrawal circuit for a witness.
    pub fn prove_withdrawal(
        &self,
        witness: &WithdrawalWitness,
    ) -> Result<WithdrawalProof, ProverError> {
        if witness.path.is_empty() {
            return Err(ProverError::InvalidWitness("empty merkle path".into()));
        }
        let assignment = WithdrawalCircuit::from_witness(witness);
        let proof = self.withdrawal.prove(assignment, &mut rand::thread_rng())?;

        let public_inputs = WithdrawalPublicInputs {
            withdrawal_address: witness.withdrawal_address,
            withdrawal_amount: witness.withdrawal_amount,
            fee: witness.fee,
            nullifier: witness.nullifier,
            root: witness.root,
            unspent_commitment: witness.unspent_commitment,
            spent_commitment: witness.spent_commitment,
            spender_address: witness.spender_address,
            output_address: witness.output_address,
        };
        if !self
            .withdrawal
            .verify(&public_inputs.to_field_elements(), &proof)?
        {
            return Err(ProverError::Verification);
        }

        Ok(WithdrawalProof {
            proof,
            public_inputs,
        })
    }
}

/// Marshal a proof and its public inputs into the leading method arguments
/// every verifier-checked call carries: the proof bytes and the ordered
/// 32-byte public-input blobs.
pub fn proof_method_args(proof: &[u8], public_inputs: &[[u8; 32]]) -> Vec<AbiArg> {
    vec![
        AbiArg::Bytes(proof.to_vec()),
        AbiArg::Bytes32Array(public_inputs.to_vec()),
    ]
}

#[cfg(test)]
mod tests {
    use ark_bn254::Fr;
    use rand::SeedableRng;

    use super::*;
    use crate::{
        config::TreeConfig,
        crypto::poseidon::field_hash,
        domain::{
            accumulator::Accumulator,
            keys::SpendKey,
            note::Note,
        },
    };

    fn prover_with_depth(depth: usize) -> Prover {
        let mut rng = rand::rngs::StdRng::seed_from_u64(0);
        let deposit =
            CompiledCircuit::compile(DepositCircuit::default(), &mut rng).unwrap();
        let withdrawal =
            CompiledCircuit::compile(WithdrawalCircuit::blank(depth), &mut rng).unwrap();
        Prover::new(Arc::new(deposit), Arc::new(withdrawal))
    }

    #[test]
    fn test_prove_deposit_roundtrip() {
        let prover = prover_with_depth(4);
        let sender = SpendKey::random();
        let note = Note::derive(5_000_000, &sender, &sender.public());

        let proof = prover.prove_deposit(&DepositWitness::new(&note)).unwrap();
        assert_eq!(proof.public_inputs.commitment, note.commitment.0);
        assert_eq!(proof.public_inputs.to_bytes32().len(), 2);
    }

    #[test]
    fn test_prove_withdrawal_roundtrip() {
        let depth = 4;
        let prover = prover_with_depth(depth);
        let spender = SpendKey::random();

        let mut from_note = Note::derive(10_000_000, &spender, &spender.public());
        let config = TreeConfig::new(depth);
        let mut accumulator = Accumulator::with_window(&config, 3);
        let index = accumulator.append(from_note.commitment.0).unwrap();
        from_note.inserted_index = Some(index);

        let withdrawal_amount = 5_000_000u64;
        let fee = 75_300u64;
        let unspent_note = Note::derive(
            10_000_000 - withdrawal_amount - fee,
            &spender,
            &spender.public(),
        );
        let spent_note = Note::derive(0, &spender, &spender.public());
        let signature = spender.sign(&unspent_note.commitment.0);
        let path = accumulator.proof(from_note.leaf_value(), index).unwrap();

        let witness = crate::domain::witness::WithdrawalWitness::new(
            field_hash(&[Fr::from(9u64)]),
            withdrawal_amount,
            fee,
            &from_note,
            index,
            &unspent_note,
            &spent_note,
            accumulator.current_root(),
            path,
            spender.public(),
            signature,
        );

        let proof = prover.prove_withdrawal(&witness).unwrap();
        assert_eq!(proof.public_inputs.to_bytes32().len(), 9);
        assert_eq!(proof.public_inputs.nullifier, from_note.nullifier().0);
    }
}
