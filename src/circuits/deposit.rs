use ark_bn254::Fr;
use ark_r1cs_std::fields::fp::FpVar;
use ark_r1cs_std::prelude::*;
use ark_relations::r1cs::{
    ConstraintSynthesizer,
    ConstraintSystemRef,
    SynthesisError,
};

use super::gadgets::commitment_gadget;
use crate::{
    crypto::field::amount_to_fr,
    domain::witness::DepositWitness,
};

/// The deposit circuit: proves knowledge of note secrets behind a public
/// commitment.
///
/// No signature and no tree check: a deposit binds funds to a chosen output
/// key and commitment; spending authority is exercised later through the
/// withdrawal circuit. The output key stays private to preserve the
/// recipient's stealth address.
#[derive(Debug, Clone, Default)]
pub struct DepositCircuit {
    // public
    pub amount: Option<Fr>,
    pub commitment: Option<Fr>,
    // private
    pub k: Option<Fr>,
    pub r: Option<Fr>,
    pub output_x: Option<Fr>,
    pub output_y: Option<Fr>,
}

impl DepositCircuit {
    pub fn from_witness(witness: &DepositWitness) -> Self {
        Self {
            amount: Some(amount_to_fr(witness.amount)),
            commitment: Some(witness.commitment),
            k: Some(witness.k),
            r: Some(witness.r),
            output_x: Some(witness.output_pub.x()),
            output_y: Some(witness.output_pub.y()),
        }
    }
}

impl ConstraintSynthesizer<Fr> for DepositCircuit {
    fn generate_constraints(self, cs: ConstraintSystemRef<Fr>) -> Result<(), SynthesisError> {
        let amount =
            FpVar::new_input(cs.clone(), || self.amount.ok_or(SynthesisError::AssignmentMissing))?;
        let commitment = FpVar::new_input(cs.clone(), || {
            self.commitment.ok_or(SynthesisError::AssignmentMissing)
        })?;

        let k = FpVar::new_witness(cs.clone(), || self.k.ok_or(SynthesisError::AssignmentMissing))?;
        let r = FpVar::new_witness(cs.clone(), || self.r.ok_or(SynthesisError::AssignmentMissing))?;
        let output_x = FpVar::new_witness(cs.clone(), || {
            self.output_x.ok_or(SynthesisError::AssignmentMissing)
        })?;
        let output_y = FpVar::new_witness(cs.clone(), || {
            self.output_y.ok_or(SynthesisError::AssignmentMissing)
        })?;

        // commitment == H(H(amount, k, r, output.x, output.y))
        let (_, outer) = commitment_gadget(cs, &amount, &k, &r, &output_x, &output_y)?;
        outer.enforce_equal(&commitment)
    }
}

#[cfg(test)]
mod tests {
    use ark_relations::r1cs::ConstraintSystem;

    use super::*;
    use crate::domain::{
        keys::SpendKey,
        note::Note,
    };

    fn witness() -> DepositWitness {
        let sender = SpendKey::random();
        let recipient = SpendKey::random();
        let note = Note::derive(10_000_000, &sender, &recipient.public());
        DepositWitness::new(&note)
    }

    #[test]
    fn test_deposit_circuit_satisfied() {
        let cs = ConstraintSystem::<Fr>::new_ref();
        DepositCircuit::from_witness(&witness())
            .generate_constraints(cs.clone())
            .unwrap();
        assert!(cs.is_satisfied().unwrap());
    }

    #[test]
    fn test_deposit_circuit_rejects_wrong_commitment() {
        let mut circuit = DepositCircuit::from_witness(&witness());
        circuit.commitment = Some(Fr::from(1u64));

        let cs = ConstraintSystem::<Fr>::new_ref();
        circuit.generate_constraints(cs.clone()).unwrap();
        assert!(!cs.is_satisfied().unwrap());
    }

    #[test]
    fn test_deposit_circuit_rejects_wrong_secret() {
        let mut circuit = DepositCircuit::from_witness(&witness());
        circuit.k = Some(Fr::from(3u64));

        let cs = ConstraintSystem::<Fr>::new_ref();
        circuit.generate_constraints(cs.clone()).unwrap();
        assert!(!cs.is_satisfied().unwrap());
    }
}
