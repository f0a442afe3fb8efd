use std::collections::VecDeque;

use ark_bn254::Fr;
use thiserror::Error;

use crate::{
    config::{
        ROOTS_WINDOW,
        TreeConfig,
    },
    crypto::poseidon::field_hash,
};

/// Violations of the accumulator's invariants. These are fatal for the
/// coordinator: the local mirror can no longer be trusted.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AccumulatorError {
    #[error("tree is full ({max_leaves} leaves)")]
    TreeFull { max_leaves: u64 },

    #[error("leaf index {index} out of range (tree has {len} leaves)")]
    IndexOutOfRange { index: u32, len: usize },

    #[error("leaf value does not hash to the stored leaf at index {index}")]
    LeafMismatch { index: u32 },
}

/// Local mirror of the on-chain append-only Merkle accumulator.
///
/// Stores the frontier (the path from the most recently inserted leaf to the
/// root), the canonical empty-subtree hashes, every inserted leaf hash (to
/// build membership proofs), and a rolling window of past roots matching the
/// contract's `roots` box.
#[derive(Debug, Clone)]
pub struct Accumulator {
    depth: usize,
    /// `frontier[i]` is the hash on the latest leaf's path at level `i`;
    /// `frontier[depth]` is the current root.
    frontier: Vec<Fr>,
    zero_hashes: Vec<Fr>,
    leaf_hashes: Vec<Fr>,
    root_window: VecDeque<Fr>,
    window_size: usize,
}

impl Accumulator {
    pub fn new(config: &TreeConfig) -> Self {
        Self::with_window(config, ROOTS_WINDOW)
    }

    /// Construct with an explicit root-window size.
    pub fn with_window(config: &TreeConfig, window_size: usize) -> Self {
        let mut root_window = VecDeque::with_capacity(window_size);
        // The contract seeds its window with the empty root at init.
        root_window.push_back(config.empty_root());
        Self {
            depth: config.depth as usize,
            frontier: config.zero_hashes.clone(),
            zero_hashes: config.zero_hashes.clone(),
            leaf_hashes: Vec::new(),
            root_window,
            window_size,
        }
    }

    pub fn len(&self) -> usize {
        self.leaf_hashes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.leaf_hashes.is_empty()
    }

    pub fn current_root(&self) -> Fr {
        self.frontier[self.depth]
    }

    /// Whether a root is inside the rolling window. Withdrawals may prove
    /// membership against any windowed root.
    pub fn contains_root(&self, root: &Fr) -> bool {
        self.root_window.contains(root)
    }

    /// Append a leaf hash, updating the frontier level by level, and record
    /// the new root in the window. Returns the leaf's index.
    pub fn append(&mut self, leaf_hash: Fr) -> Result<u32, AccumulatorError> {
        let max_leaves = 1u64 << self.depth;
        if self.leaf_hashes.len() as u64 == max_leaves {
            return Err(AccumulatorError::TreeFull { max_leaves });
        }

        self.leaf_hashes.push(leaf_hash);
        let assigned = self.leaf_hashes.len() - 1;

        let mut current = leaf_hash;
        let mut index = assigned;
        for level in 0..self.depth {
            let (left, right) = if index & 1 == 0 {
                // Left child: becomes the new frontier entry, sibling is an
                // empty subtree.
                self.frontier[level] = current;
                (current, self.zero_hashes[level])
            } else {
                (self.frontier[level], current)
            };
            current = field_hash(&[left, right]);
            index >>= 1;
        }
        self.frontier[self.depth] = current;

        if self.root_window.len() == self.window_size {
            self.root_window.pop_front();
        }
        self.root_window.push_back(current);

        Ok(assigned as u32)
    }

    /// Build the membership proof for the leaf at `index`.
    ///
    /// `proof[0]` is the leaf's pre-image (whose hash is the stored leaf);
    /// `proof[i]` for `i >= 1` is the sibling hash at level `i - 1`. Sibling
    /// positions beyond the materialized tree resolve to empty-subtree
    /// hashes.
    pub fn proof(&self, leaf_value: Fr, index: u32) -> Result<Vec<Fr>, AccumulatorError> {
        let len = self.leaf_hashes.len();
        if index as usize >= len {
            return Err(AccumulatorError::IndexOutOfRange { index, len });
        }
        if self.leaf_hashes[index as usize] != field_hash(&[leaf_value]) {
            return Err(AccumulatorError::LeafMismatch { index });
        }

        let mut proof = Vec::with_capacity(self.depth + 1);
        proof.push(leaf_value);

        let mut level_hashes = self.leaf_hashes.clone();
        let mut index = index as usize;
        for level in 0..self.depth {
            if level_hashes.len() % 2 == 1 {
                level_hashes.push(self.zero_hashes[level]);
            }
            let sibling = if index & 1 == 0 { index + 1 } else { index - 1 };
            proof.push(level_hashes[sibling]);

            level_hashes = level_hashes
                .chunks(2)
                .map(|pair| field_hash(&[pair[0], pair[1]]))
                .collect();
            index >>= 1;
        }

        Ok(proof)
    }

    /// Check a proof produced by [`Accumulator::proof`] against a root.
    pub fn verify(&self, index: u32, proof: &[Fr], root: &Fr) -> bool {
        if proof.len() != self.depth + 1 {
            return false;
        }
        let mut current = field_hash(&[proof[0]]);
        let mut index = index as usize;
        for sibling in &proof[1..] {
            current = if index & 1 == 0 {
                field_hash(&[current, *sibling])
            } else {
                field_hash(&[*sibling, current])
            };
            index >>= 1;
        }
        current == *root
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn small_tree() -> (TreeConfig, Accumulator) {
        let config = TreeConfig::new(4);
        let accumulator = Accumulator::with_window(&config, 3);
        (config, accumulator)
    }

    /// Root recomputed bottom-up from the padded leaf sequence.
    fn full_root(config: &TreeConfig, leaf_hashes: &[Fr]) -> Fr {
        let mut level_hashes = leaf_hashes.to_vec();
        for level in 0..config.depth as usize {
            if level_hashes.len() % 2 == 1 {
                level_hashes.push(config.zero_hashes[level]);
            }
            level_hashes = level_hashes
                .chunks(2)
                .map(|pair| field_hash(&[pair[0], pair[1]]))
                .collect();
        }
        level_hashes[0]
    }

    #[test]
    fn test_empty_root_matches_config() {
        let (config, accumulator) = small_tree();
        assert_eq!(accumulator.current_root(), config.empty_root());
    }

    #[test]
    fn test_frontier_matches_full_recomputation() {
        let (config, mut accumulator) = small_tree();
        let mut leaves = Vec::new();
        for i in 0..7u64 {
            let leaf_value = Fr::from(100 + i);
            let leaf_hash = field_hash(&[leaf_value]);
            leaves.push(leaf_hash);
            let index = accumulator.append(leaf_hash).unwrap();
            assert_eq!(index as u64, i);
            assert_eq!(accumulator.current_root(), full_root(&config, &leaves));
        }
    }

    #[test]
    fn test_every_proof_verifies_against_current_root() {
        let (_, mut accumulator) = small_tree();
        let leaf_values: Vec<Fr> = (0..5u64).map(|i| Fr::from(1000 + i)).collect();
        for value in &leaf_values {
            accumulator.append(field_hash(&[*value])).unwrap();
        }
        let root = accumulator.current_root();
        for (i, value) in leaf_values.iter().enumerate() {
            let proof = accumulator.proof(*value, i as u32).unwrap();
            assert_eq!(proof.len(), 5);
            assert!(accumulator.verify(i as u32, &proof, &root));
        }
    }

    #[test]
    fn test_proof_rejects_wrong_preimage() {
        let (_, mut accumulator) = small_tree();
        accumulator.append(field_hash(&[Fr::from(1u64)])).unwrap();
        assert_eq!(
            accumulator.proof(Fr::from(2u64), 0).unwrap_err(),
            AccumulatorError::LeafMismatch { index: 0 }
        );
    }

    #[test]
    fn test_proof_rejects_out_of_range_index() {
        let (_, accumulator) = small_tree();
        assert!(matches!(
            accumulator.proof(Fr::from(1u64), 3),
            Err(AccumulatorError::IndexOutOfRange { .. })
        ));
    }

    #[test]
    fn test_root_window_rotation() {
        let (_, mut accumulator) = small_tree();
        let mut roots = vec![accumulator.current_root()];
        for i in 0..4u64 {
            accumulator.append(field_hash(&[Fr::from(i)])).unwrap();
            roots.push(accumulator.current_root());
        }
        // Window of 3: only the last three roots survive.
        for old_root in &roots[..2] {
            assert!(!accumulator.contains_root(old_root));
        }
        for recent_root in &roots[2..] {
            assert!(accumulator.contains_root(recent_root));
        }
    }

    #[test]
    fn test_append_rejects_full_tree() {
        let config = TreeConfig::new(2);
        let mut accumulator = Accumulator::with_window(&config, 3);
        for i in 0..4u64 {
            accumulator.append(Fr::from(i)).unwrap();
        }
        assert_eq!(
            accumulator.append(Fr::from(9u64)).unwrap_err(),
            AccumulatorError::TreeFull { max_leaves: 4 }
        );
    }
}
