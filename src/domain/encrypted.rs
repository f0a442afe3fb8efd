use serde::{
    Deserialize,
    Serialize,
};

use super::{
    keys::SpendPub,
    note::Note,
};
use crate::crypto::{
    ecies::ecies_encrypt,
    field::{
        amount_to_bytes32,
        fr_to_bytes32,
    },
};

/// Stealth-address bundle published alongside a commitment: five independent
/// ECIES ciphertexts, all addressed to the note's output key. A recipient
/// scanning the ledger attempts decryption; an authentication failure means
/// "not mine".
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncryptedNote {
    pub encrypted_k: Vec<u8>,
    pub encrypted_r: Vec<u8>,
    /// The output (recipient) public key, compressed.
    pub encrypted_output: Vec<u8>,
    /// The sender public key, compressed. Lets the recipient re-derive the
    /// note secrets independently of `encrypted_k`/`encrypted_r`.
    pub encrypted_sender: Vec<u8>,
    /// The amount in its 32-byte embedding.
    pub encrypted_amount: Vec<u8>,
}

impl EncryptedNote {
    /// Encrypt a note's recovery material to its output key.
    pub fn seal(note: &Note, sender_pub: &SpendPub) -> Self {
        let recipient = &note.output_pub.0;
        Self {
            encrypted_k: ecies_encrypt(&fr_to_bytes32(&note.k), recipient),
            encrypted_r: ecies_encrypt(&fr_to_bytes32(&note.r), recipient),
            encrypted_output: ecies_encrypt(&note.output_pub.to_bytes(), recipient),
            encrypted_sender: ecies_encrypt(&sender_pub.to_bytes(), recipient),
            encrypted_amount: ecies_encrypt(&amount_to_bytes32(note.amount), recipient),
        }
    }

    /// Length-prefixed wire form for publication in a transaction note field.
    pub fn to_bytes(&self) -> Vec<u8> {
        let segments = [
            &self.encrypted_k,
            &self.encrypted_r,
            &self.encrypted_output,
            &self.encrypted_sender,
            &self.encrypted_amount,
        ];
        let total: usize = segments.iter().map(|s| 4 + s.len()).sum();
        let mut out = Vec::with_capacity(total);
        for segment in segments {
            out.extend_from_slice(&(segment.len() as u32).to_be_bytes());
            out.extend_from_slice(segment);
        }
        out
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, &'static str> {
        let mut cursor = 0usize;
        let mut segments = Vec::with_capacity(5);
        for _ in 0..5 {
            if bytes.len() < cursor + 4 {
                return Err("truncated encrypted note");
            }
            let len = u32::from_be_bytes(
                bytes[cursor..cursor + 4]
                    .try_into()
                    .expect("4-byte slice"),
            ) as usize;
            cursor += 4;
            if bytes.len() < cursor + len {
                return Err("truncated encrypted note segment");
            }
            segments.push(bytes[cursor..cursor + len].to_vec());
            cursor += len;
        }
        if cursor != bytes.len() {
            return Err("trailing bytes in encrypted note");
        }
        let mut it = segments.into_iter();
        Ok(Self {
            encrypted_k: it.next().expect("five segments"),
            encrypted_r: it.next().expect("five segments"),
            encrypted_output: it.next().expect("five segments"),
            encrypted_sender: it.next().expect("five segments"),
            encrypted_amount: it.next().expect("five segments"),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::keys::SpendKey;

    #[test]
    fn test_wire_roundtrip() {
        let sender = SpendKey::random();
        let recipient = SpendKey::random();
        let note = Note::derive(1_000_000, &sender, &recipient.public());
        let encrypted = EncryptedNote::seal(&note, &sender.public());

        let bytes = encrypted.to_bytes();
        assert_eq!(EncryptedNote::from_bytes(&bytes).unwrap(), encrypted);
    }

    #[test]
    fn test_from_bytes_rejects_truncation() {
        let sender = SpendKey::random();
        let note = Note::derive(1, &sender, &sender.public());
        let bytes = EncryptedNote::seal(&note, &sender.public()).to_bytes();
        assert!(EncryptedNote::from_bytes(&bytes[..bytes.len() - 1]).is_err());
    }
}
