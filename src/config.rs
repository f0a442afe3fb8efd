//! Protocol constants and the accumulator configuration.
//!
//! The numeric constants here are templated into the on-chain approval
//! program by the deploy pipeline; changing one without redeploying the
//! application desynchronizes client and contract.

use ark_bn254::Fr;
use serde::{
    Deserialize,
    Serialize,
};

use crate::crypto::{
    field::{
        fr_from_bytes32,
        fr_hex_vec,
    },
    poseidon::field_hash,
};

/// Fixed depth of the append-only commitment tree.
pub const TREE_DEPTH: usize = 32;

/// Size of the on-chain rolling window of accepted roots.
pub const ROOTS_WINDOW: usize = 50;

/// Smallest accepted deposit, in the ledger's base unit.
pub const DEPOSIT_MINIMUM_AMOUNT: u64 = 1_000_000;

/// Flat minimum fee per ledger transaction.
pub const MIN_TXN_FEE: u64 = 1_000;

/// Top-level transactions needed in a group for the verifier logic
/// signatures' opcode budget (opcode pooling).
pub const VERIFIER_TOP_LEVEL_TXNS: usize = 8;

/// Fee multiplier carried by the deposit group's payment transaction.
pub const DEPOSIT_FEE_MULTIPLIER: u64 = 42;

/// Fee multiplier carried by the withdrawal group's fee transaction.
pub const WITHDRAWAL_FEE_MULTIPLIER: u64 = 60;

/// Opcode budget the contract buys up during a deposit.
pub const DEPOSIT_OPCODE_BUDGET_OPUP: u64 = 1_100 * TREE_DEPTH as u64 + 900;

/// Opcode budget the contract buys up during a withdrawal.
pub const WITHDRAWAL_OPCODE_BUDGET_OPUP: u64 = 1_100 * TREE_DEPTH as u64 + 3_700;

/// Minimum balance requirement of a box with the given key and value sizes.
pub const fn box_mbr(key_len: usize, value_len: usize) -> u64 {
    2_500 + 400 * (key_len as u64 + value_len as u64)
}

/// MBR of one nullifier box: 32-byte key, empty value.
pub const NULLIFIER_MBR: u64 = box_mbr(32, 0);

/// Initial funding of the application escrow: account minimum plus the
/// `subtree` (frontier levels below the root) and `roots` boxes.
pub const INITIAL_MBR: u64 =
    100_000 + box_mbr(7, 32 * TREE_DEPTH) + box_mbr(5, 32 * ROOTS_WINDOW);

/// Default flat fee for a withdrawal: network fees plus the nullifier box MBR.
pub const WITHDRAWAL_DEFAULT_FEE: u64 = WITHDRAWAL_FEE_MULTIPLIER * MIN_TXN_FEE + NULLIFIER_MBR;

/// Rounds to wait for confirmation after submitting a group.
pub const WAIT_ROUNDS: u64 = 4;

/// ABI method names of the application.
pub const DEPOSIT_METHOD: &str = "deposit";
pub const WITHDRAW_METHOD: &str = "withdraw";
pub const NOOP_METHOD: &str = "noop";
pub const CREATE_METHOD: &str = "create";
pub const INIT_METHOD: &str = "init";
pub const UPDATE_METHOD: &str = "update";

/// Box names of the application.
pub const SUBTREE_BOX: &[u8] = b"subtree";
pub const ROOTS_BOX: &[u8] = b"roots";

/// Global state key holding the current root.
pub const ROOT_KEY: &[u8] = b"root";

/// Accumulator configuration: depth, the canonical empty-leaf value and the
/// ladder of empty-subtree hashes. Exported to `TreeConfig.json` so other
/// frontends can mirror the tree without recomputing the ladder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TreeConfig {
    pub depth: u32,
    #[serde(with = "serde_bytes_hex")]
    pub zero_value: Vec<u8>,
    #[serde(with = "fr_hex_vec")]
    pub zero_hashes: Vec<Fr>,
}

impl TreeConfig {
    /// Build the configuration for a given depth, deriving the zero-hash
    /// ladder: `zero_hashes[0] = H(zero)`, `zero_hashes[i] = H(z, z)`.
    pub fn new(depth: usize) -> Self {
        let zero_value = vec![0u8];
        let zero_hashes = generate_zero_hashes(depth, &zero_value);
        Self {
            depth: depth as u32,
            zero_value,
            zero_hashes,
        }
    }

    /// The root of the empty tree.
    pub fn empty_root(&self) -> Fr {
        self.zero_hashes[self.depth as usize]
    }
}

impl Default for TreeConfig {
    fn default() -> Self {
        Self::new(TREE_DEPTH)
    }
}

/// Hash ladder of empty subtrees, one entry per level up to and including
/// the root.
pub fn generate_zero_hashes(depth: usize, zero_value: &[u8]) -> Vec<Fr> {
    let mut hashes = Vec::with_capacity(depth + 1);
    let mut padded = [0u8; 32];
    padded[32 - zero_value.len()..].copy_from_slice(zero_value);
    hashes.push(field_hash(&[fr_from_bytes32(&padded)]));
    for i in 1..=depth {
        let below = hashes[i - 1];
        hashes.push(field_hash(&[below, below]));
    }
    hashes
}

mod serde_bytes_hex {
    use serde::{
        Deserialize,
        Deserializer,
        Serializer,
    };

    pub fn serialize<S>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&hex::encode(bytes))
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Vec<u8>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s: String = Deserialize::deserialize(deserializer)?;
        hex::decode(&s).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_hash_ladder_links() {
        let config = TreeConfig::new(4);
        assert_eq!(config.zero_hashes.len(), 5);
        for i in 1..=4 {
            let below = config.zero_hashes[i - 1];
            assert_eq!(config.zero_hashes[i], field_hash(&[below, below]));
        }
    }

    #[test]
    fn test_nullifier_mbr_matches_box_accounting() {
        assert_eq!(NULLIFIER_MBR, 15_300);
    }

    #[test]
    fn test_withdrawal_default_fee() {
        assert_eq!(WITHDRAWAL_DEFAULT_FEE, 75_300);
    }

    #[test]
    fn test_tree_config_json_roundtrip() {
        let config = TreeConfig::new(4);
        let json = serde_json::to_string(&config).unwrap();
        let back: TreeConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(config, back);
    }
}
