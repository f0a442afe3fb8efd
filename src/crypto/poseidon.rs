use std::sync::OnceLock;

use ark_bn254::Fr;
use ark_crypto_primitives::sponge::{
    CryptographicSponge,
    poseidon::{
        PoseidonConfig,
        PoseidonSponge,
        find_poseidon_ark_and_mds,
    },
};
use ark_ff::PrimeField;

/// Sponge rate. With capacity 1 this gives a width-3 permutation, the usual
/// choice for 2-to-1 Merkle hashing on this curve.
const RATE: usize = 2;
const CAPACITY: usize = 1;
const FULL_ROUNDS: usize = 8;
const PARTIAL_ROUNDS: usize = 57;
const ALPHA: u64 = 5;

static CONFIG: OnceLock<PoseidonConfig<Fr>> = OnceLock::new();

/// The Poseidon parameter set shared by the native hash and the in-circuit
/// gadget. Generated once per process; generation walks a Grain LFSR and is
/// far more expensive than hashing.
pub fn poseidon_config() -> &'static PoseidonConfig<Fr> {
    CONFIG.get_or_init(|| {
        let (ark, mds) = find_poseidon_ark_and_mds::<Fr>(
            Fr::MODULUS_BIT_SIZE as u64,
            RATE,
            FULL_ROUNDS as u64,
            PARTIAL_ROUNDS as u64,
            0,
        );
        PoseidonConfig::new(FULL_ROUNDS, PARTIAL_ROUNDS, ALPHA, mds, ark, RATE, CAPACITY)
    })
}

/// FieldHash: absorb each input as one field element, squeeze one element.
///
/// Used for commitments, nullifiers, Merkle nodes, the stealth shared-secret
/// hash and the signature challenge. The constraint-system twin lives in
/// `circuits::gadgets` and must stay input-for-input identical.
pub fn field_hash(inputs: &[Fr]) -> Fr {
    let mut sponge = PoseidonSponge::new(poseidon_config());
    for input in inputs {
        sponge.absorb(input);
    }
    sponge.squeeze_field_elements::<Fr>(1)[0]
}

#[cfg(test)]
mod tests {
    use ark_std::UniformRand;

    use super::*;

    #[test]
    fn test_hash_deterministic() {
        let a = Fr::from(1u64);
        let b = Fr::from(2u64);
        assert_eq!(field_hash(&[a, b]), field_hash(&[a, b]));
    }

    #[test]
    fn test_hash_order_matters() {
        let a = Fr::from(1u64);
        let b = Fr::from(2u64);
        assert_ne!(field_hash(&[a, b]), field_hash(&[b, a]));
    }

    #[test]
    fn test_hash_arity_matters() {
        let a = Fr::from(1u64);
        assert_ne!(field_hash(&[a]), field_hash(&[a, Fr::from(0u64)]));
    }

    #[test]
    fn test_hash_random_inputs_distinct() {
        let mut rng = ark_std::test_rng();
        let a = Fr::rand(&mut rng);
        let b = Fr::rand(&mut rng);
        assert_ne!(field_hash(&[a]), field_hash(&[b]));
    }
}
