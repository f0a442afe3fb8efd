use ark_bn254::Fr;

use super::{
    commitment::Commitment,
    keys::{
        SpendKey,
        SpendPub,
    },
    nullifier::Nullifier,
};
use crate::crypto::{
    field::{
        amount_to_fr,
        fr_from_bytes32,
    },
    poseidon::field_hash,
};

/// A note is a private balance bound to an Edwards public key. It lives in
/// the accumulator as its commitment and is spendable by whoever holds the
/// matching spend key and the `(k, r)` secrets.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Note {
    pub amount: u64,
    /// Per-note secrets, derived from the sender/recipient DH shared point.
    pub k: Fr,
    pub r: Fr,
    /// The public key authorized to spend this note.
    pub output_pub: SpendPub,
    pub commitment: Commitment,
    /// Leaf index once the commitment is confirmed on-chain.
    pub inserted_index: Option<u32>,
}

impl Note {
    /// Create a note from a sender's spend key to a recipient public key,
    /// deriving `(k, r)` from the DH shared point. The recipient can rerun
    /// the same derivation from its own key, which is what makes the note a
    /// stealth payment.
    pub fn derive(amount: u64, sender: &SpendKey, recipient: &SpendPub) -> Self {
        let (k, r) = derive_note_secrets(sender, recipient);
        Self::from_parts(amount, k, r, *recipient, None)
    }

    /// Rebuild a note from recovered parts, recomputing the commitment.
    pub fn from_parts(
        amount: u64,
        k: Fr,
        r: Fr,
        output_pub: SpendPub,
        inserted_index: Option<u32>,
    ) -> Self {
        let commitment = Commitment(field_hash(&[leaf_value(amount, &k, &r, &output_pub)]));
        Self {
            amount,
            k,
            r,
            output_pub,
            commitment,
            inserted_index,
        }
    }

    /// The single-hashed form used as the Merkle proof's first element.
    /// Its hash is the commitment, which is what the tree stores.
    pub fn leaf_value(&self) -> Fr {
        leaf_value(self.amount, &self.k, &self.r, &self.output_pub)
    }

    /// `H(amount, k)` — unique per note, published on withdrawal.
    pub fn nullifier(&self) -> Nullifier {
        Nullifier(field_hash(&[amount_to_fr(self.amount), self.k]))
    }
}

/// `H(amount, k, r, pub.x, pub.y)`.
fn leaf_value(amount: u64, k: &Fr, r: &Fr, output_pub: &SpendPub) -> Fr {
    field_hash(&[
        amount_to_fr(amount),
        *k,
        *r,
        output_pub.x(),
        output_pub.y(),
    ])
}

/// Derive the per-note secrets from the DH shared point between a secret
/// key and the counterparty's public key. Symmetric in the two parties:
/// `derive(sk_s, pk_r) == derive(sk_r, pk_s)`.
pub fn derive_note_secrets(secret: &SpendKey, other: &SpendPub) -> (Fr, Fr) {
    let shared_point = secret.shared_point(other);
    let shared = field_hash(&[shared_point.x, shared_point.y]);

    let mut k_domain = [0u8; 32];
    k_domain[31] = b'k';
    let mut r_domain = [0u8; 32];
    r_domain[31] = b'r';

    let k = field_hash(&[shared, fr_from_bytes32(&k_domain)]);
    let r = field_hash(&[shared, fr_from_bytes32(&r_domain)]);
    (k, r)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_secret_derivation_symmetric() {
        let sender = SpendKey::random();
        let recipient = SpendKey::random();

        let forward = derive_note_secrets(&sender, &recipient.public());
        let backward = derive_note_secrets(&recipient, &sender.public());
        assert_eq!(forward, backward);
    }

    #[test]
    fn test_secret_derivation_distinct_domains() {
        let sender = SpendKey::random();
        let (k, r) = derive_note_secrets(&sender, &SpendKey::random().public());
        assert_ne!(k, r);
    }

    #[test]
    fn test_commitment_is_hash_of_leaf_value() {
        let sender = SpendKey::random();
        let note = Note::derive(1_000_000, &sender, &sender.public());
        assert_eq!(note.commitment.0, field_hash(&[note.leaf_value()]));
    }

    #[test]
    fn test_notes_to_distinct_recipients_differ() {
        let sender = SpendKey::random();
        let a = Note::derive(5, &sender, &SpendKey::random().public());
        let b = Note::derive(5, &sender, &SpendKey::random().public());
        assert_ne!(a.commitment, b.commitment);
    }

    #[test]
    fn test_nullifier_depends_on_amount_and_k() {
        let sender = SpendKey::random();
        let recipient = SpendKey::random().public();
        let a = Note::derive(5, &sender, &recipient);
        let b = Note::derive(6, &sender, &recipient);
        assert_ne!(a.nullifier(), b.nullifier());
    }
}
