use std::path::Path;

use ark_bn254::{
    Bn254,
    Fr,
};
use ark_groth16::{
    Groth16,
    Proof,
    ProvingKey,
    VerifyingKey,
};
use ark_relations::r1cs::{
    ConstraintSynthesizer,
    ConstraintSystem,
    SynthesisError,
    SynthesisMode,
};
use ark_serialize::{
    CanonicalDeserialize,
    CanonicalSerialize,
    SerializationError,
};
use ark_snark::SNARK;
use ark_std::rand::{
    CryptoRng,
    RngCore,
};
use thiserror::Error;

/// File magic for serialized compiled circuits.
const MAGIC: &[u8; 4] = b"CCV1";

#[derive(Debug, Error)]
pub enum CircuitError {
    #[error("constraint synthesis failed: {0}")]
    Synthesis(#[from] SynthesisError),

    #[error("serialization failed: {0}")]
    Serialization(#[from] SerializationError),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("not a compiled circuit file")]
    InvalidFormat,
}

/// A compiled circuit: the Groth16 key pair produced by the one-time setup,
/// plus the shape metadata a verifier program is templated from. Immutable
/// after construction and shareable by reference across coordinators.
pub struct CompiledCircuit {
    pub proving_key: ProvingKey<Bn254>,
    pub verifying_key: VerifyingKey<Bn254>,
    pub num_constraints: usize,
    pub num_public_inputs: usize,
}

impl CompiledCircuit {
    /// Synthesize the circuit shape and run the circuit-specific setup.
    pub fn compile<C, R>(circuit: C, rng: &mut R) -> Result<Self, CircuitError>
    where
        C: ConstraintSynthesizer<Fr> + Clone,
        R: RngCore + CryptoRng,
    {
        let cs = ConstraintSystem::<Fr>::new_ref();
        cs.set_mode(SynthesisMode::Setup);
        circuit.clone().generate_constraints(cs.clone())?;
        let num_constraints = cs.num_constraints();
        let num_public_inputs = cs.num_instance_variables() - 1;

        let (proving_key, verifying_key) =
            Groth16::<Bn254>::circuit_specific_setup(circuit, rng)?;

        Ok(Self {
            proving_key,
            verifying_key,
            num_constraints,
            num_public_inputs,
        })
    }

    /// Prove an assigned circuit, returning the compressed proof bytes.
    pub fn prove<C, R>(&self, circuit: C, rng: &mut R) -> Result<Vec<u8>, CircuitError>
    where
        C: ConstraintSynthesizer<Fr>,
        R: RngCore + CryptoRng,
    {
        let proof = Groth16::<Bn254>::prove(&self.proving_key, circuit, rng)?;
        let mut bytes = Vec::new();
        proof.serialize_compressed(&mut bytes)?;
        Ok(bytes)
    }

    /// Verify compressed proof bytes against ordered public inputs.
    pub fn verify(&self, public_inputs: &[Fr], proof_bytes: &[u8]) -> Result<bool, CircuitError> {
        let proof = Proof::<Bn254>::deserialize_compressed(proof_bytes)?;
        Ok(Groth16::<Bn254>::verify(&self.verifying_key, public_inputs, &proof)?)
    }

    /// The compressed verifying key, as templated into verifier programs.
    pub fn verifying_key_bytes(&self) -> Result<Vec<u8>, CircuitError> {
        let mut bytes = Vec::new();
        self.verifying_key.serialize_compressed(&mut bytes)?;
        Ok(bytes)
    }

    /// Serialize to the on-disk artefact format.
    pub fn to_bytes(&self) -> Result<Vec<u8>, CircuitError> {
        let mut out = Vec::new();
        out.extend_from_slice(MAGIC);
        out.extend_from_slice(&(self.num_constraints as u32).to_be_bytes());
        out.extend_from_slice(&(self.num_public_inputs as u32).to_be_bytes());
        self.verifying_key.serialize_compressed(&mut out)?;
        self.proving_key.serialize_compressed(&mut out)?;
        Ok(out)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, CircuitError> {
        if bytes.len() < 12 || &bytes[..4] != MAGIC {
            return Err(CircuitError::InvalidFormat);
        }
        let num_constraints =
            u32::from_be_bytes(bytes[4..8].try_into().expect("4-byte slice")) as usize;
        let num_public_inputs =
            u32::from_be_bytes(bytes[8..12].try_into().expect("4-byte slice")) as usize;

        let mut cursor = &bytes[12..];
        let verifying_key = VerifyingKey::<Bn254>::deserialize_compressed(&mut cursor)?;
        let proving_key = ProvingKey::<Bn254>::deserialize_compressed(&mut cursor)?;

        Ok(Self {
            proving_key,
            verifying_key,
            num_constraints,
            num_public_inputs,
        })
    }

    pub fn to_file(&self, path: &Path) -> Result<(), CircuitError> {
        std::fs::write(path, self.to_bytes()?)?;
        Ok(())
    }

    pub fn from_file(path: &Path) -> Result<Self, CircuitError> {
        Self::from_bytes(&std::fs::read(path)?)
    }
}

#[cfg(test)]
mod tests {
    use rand::SeedableRng;

    use super::*;
    use crate::{
        circuits::deposit::DepositCircuit,
        domain::{
            keys::SpendKey,
            note::Note,
            witness::DepositWitness,
        },
    };

    fn deposit_witness() -> DepositWitness {
        let sender = SpendKey::random();
        let note = Note::derive(2_000_000, &sender, &sender.public());
        DepositWitness::new(&note)
    }

    #[test]
    fn test_compile_prove_verify_deposit() {
        let mut rng = rand::rngs::StdRng::seed_from_u64(0);
        let compiled =
            CompiledCircuit::compile(DepositCircuit::default(), &mut rng).unwrap();
        assert_eq!(compiled.num_public_inputs, 2);

        let witness = deposit_witness();
        let proof = compiled
            .prove(DepositCircuit::from_witness(&witness), &mut rng)
            .unwrap();

        let public_inputs = [Fr::from(witness.amount), witness.commitment];
        assert!(compiled.verify(&public_inputs, &proof).unwrap());

        // flipping a public input must fail verification
        let wrong_inputs = [Fr::from(witness.amount + 1), witness.commitment];
        assert!(!compiled.verify(&wrong_inputs, &proof).unwrap());
    }

    #[test]
    fn test_compiled_circuit_serialization_roundtrip() {
        let mut rng = rand::rngs::StdRng::seed_from_u64(0);
        let compiled =
            CompiledCircuit::compile(DepositCircuit::default(), &mut rng).unwrap();
        let bytes = compiled.to_bytes().unwrap();
        let restored = CompiledCircuit::from_bytes(&bytes).unwrap();

        assert_eq!(restored.num_constraints, compiled.num_constraints);
        assert_eq!(restored.num_public_inputs, compiled.num_public_inputs);
        assert_eq!(restored.verifying_key, compiled.verifying_key);
    }
}
