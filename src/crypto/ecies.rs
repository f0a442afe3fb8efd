//! ECIES transport over the companion curve, plus the password-based
//! symmetric scheme used for the default account's encrypted mnemonic.
//!
//! Both run the same core: a memory-hard scrypt derivation into a 32-byte
//! key and ChaCha20-Poly1305 with a fresh random nonce. Decryption failures
//! are authentication failures and carry no plaintext information.

use ark_ec::{
    CurveGroup,
    Group,
};
use ark_ed_on_bn254::{
    EdwardsAffine,
    EdwardsProjective,
    Fr as EdScalar,
};
use ark_std::UniformRand;
use base64::Engine;
use chacha20poly1305::{
    ChaCha20Poly1305,
    Nonce,
    aead::{
        Aead,
        KeyInit,
    },
};
use rand::Rng;
use scrypt::Params;
use thiserror::Error;

use crate::crypto::{
    eddsa::{
        point_from_bytes,
        point_to_bytes,
    },
    field::fr_to_bytes32,
};

/// Fixed scrypt salt for the ECIES key derivation. Both sides must agree.
const ECIES_SALT: &[u8] = b"ecies";

/// Salt size for the password-based scheme (random, prepended).
const PASSWORD_SALT_SIZE: usize = 16;

const NONCE_SIZE: usize = 12;
const POINT_SIZE: usize = 32;

/// scrypt cost parameters: N = 2^15, r = 8, p = 1.
fn scrypt_params() -> Params {
    Params::new(15, 8, 1, 32).expect("static scrypt parameters are valid")
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum DecryptError {
    #[error("encrypted data too short")]
    TooShort,
    #[error("invalid ephemeral public key")]
    InvalidEphemeralKey,
    #[error("key derivation failed")]
    KeyDerivation,
    #[error("decryption failed (wrong key or corrupted data)")]
    Authentication,
    #[error("invalid base64 payload")]
    Encoding,
}

/// Derive a 32-byte symmetric key from secret material.
fn derive_key(secret: &[u8], salt: &[u8]) -> Result<[u8; 32], DecryptError> {
    let mut key = [0u8; 32];
    scrypt::scrypt(secret, salt, &scrypt_params(), &mut key)
        .map_err(|_| DecryptError::KeyDerivation)?;
    Ok(key)
}

/// Seal plaintext under a symmetric key: `nonce || ciphertext`.
fn seal(plaintext: &[u8], key: &[u8; 32]) -> Vec<u8> {
    let mut nonce_bytes = [0u8; NONCE_SIZE];
    rand::thread_rng().fill(&mut nonce_bytes);
    let cipher = ChaCha20Poly1305::new_from_slice(key).expect("32-byte key is valid");
    let ciphertext = cipher
        .encrypt(Nonce::from_slice(&nonce_bytes), plaintext)
        .expect("encryption cannot fail for in-memory plaintext");

    let mut out = Vec::with_capacity(NONCE_SIZE + ciphertext.len());
    out.extend_from_slice(&nonce_bytes);
    out.extend_from_slice(&ciphertext);
    out
}

/// Open `nonce || ciphertext` produced by [`seal`].
fn open(data: &[u8], key: &[u8; 32]) -> Result<Vec<u8>, DecryptError> {
    if data.len() < NONCE_SIZE {
        return Err(DecryptError::TooShort);
    }
    let cipher = ChaCha20Poly1305::new_from_slice(key).expect("32-byte key is valid");
    cipher
        .decrypt(Nonce::from_slice(&data[..NONCE_SIZE]), &data[NONCE_SIZE..])
        .map_err(|_| DecryptError::Authentication)
}

/// The shared-point key material: `T.x || T.y` in big-endian.
fn shared_point_secret(point: &EdwardsAffine) -> [u8; 64] {
    let mut secret = [0u8; 64];
    secret[..32].copy_from_slice(&fr_to_bytes32(&point.x));
    secret[32..].copy_from_slice(&fr_to_bytes32(&point.y));
    secret
}

/// Encrypt a blob to a recipient public key.
///
/// Output layout: `ephemeral_pub(32) || nonce(12) || ciphertext`.
pub fn ecies_encrypt(plaintext: &[u8], recipient: &EdwardsAffine) -> Vec<u8> {
    let ephemeral_secret = EdScalar::rand(&mut rand::thread_rng());
    let ephemeral_pub = (EdwardsProjective::generator() * ephemeral_secret).into_affine();
    let shared = (EdwardsProjective::from(*recipient) * ephemeral_secret).into_affine();

    let key = derive_key(&shared_point_secret(&shared), ECIES_SALT)
        .expect("scrypt with static parameters cannot fail");
    let sealed = seal(plaintext, &key);

    let mut out = Vec::with_capacity(POINT_SIZE + sealed.len());
    out.extend_from_slice(&point_to_bytes(&ephemeral_pub));
    out.extend_from_slice(&sealed);
    out
}

/// Decrypt an ECIES payload with the recipient secret key.
pub fn ecies_decrypt(data: &[u8], secret: &EdScalar) -> Result<Vec<u8>, DecryptError> {
    if data.len() < POINT_SIZE + NONCE_SIZE {
        return Err(DecryptError::TooShort);
    }
    let ephemeral_pub = point_from_bytes(&data[..POINT_SIZE])
        .map_err(|_| DecryptError::InvalidEphemeralKey)?;
    let shared = (EdwardsProjective::from(ephemeral_pub) * *secret).into_affine();

    let key = derive_key(&shared_point_secret(&shared), ECIES_SALT)?;
    open(&data[POINT_SIZE..], &key)
}

/// Encrypt a plaintext under a password: base64 of `salt || nonce || ct`.
pub fn encrypt_with_password(plaintext: &[u8], password: &[u8]) -> Result<String, DecryptError> {
    let mut salt = [0u8; PASSWORD_SALT_SIZE];
    rand::thread_rng().fill(&mut salt);
    let key = derive_key(password, &salt)?;

    let mut data = Vec::with_capacity(PASSWORD_SALT_SIZE);
    data.extend_from_slice(&salt);
    data.extend_from_slice(&seal(plaintext, &key));
    Ok(base64::engine::general_purpose::STANDARD.encode(data))
}

/// Decrypt a base64 `salt || nonce || ct` payload with a password.
pub fn decrypt_with_password(payload: &str, password: &[u8]) -> Result<Vec<u8>, DecryptError> {
    let data = base64::engine::general_purpose::STANDARD
        .decode(payload)
        .map_err(|_| DecryptError::Encoding)?;
    if data.len() < PASSWORD_SALT_SIZE {
        return Err(DecryptError::TooShort);
    }
    let key = derive_key(password, &data[..PASSWORD_SALT_SIZE])?;
    open(&data[PASSWORD_SALT_SIZE..], &key)
}

#[cfg(test)]
mod tests {
    use ark_std::UniformRand;

    use super::*;

    fn keypair() -> (EdScalar, EdwardsAffine) {
        let sk = EdScalar::rand(&mut rand::thread_rng());
        (sk, (EdwardsProjective::generator() * sk).into_affine())
    }

    #[test]
    fn test_ecies_roundtrip() {
        let (sk, pk) = keypair();
        let plaintext = b"note secret material";

        let encrypted = ecies_encrypt(plaintext, &pk);
        let decrypted = ecies_decrypt(&encrypted, &sk).unwrap();
        assert_eq!(decrypted, plaintext);
    }

    #[test]
    fn test_ecies_wrong_key_fails() {
        let (_, pk) = keypair();
        let (other_sk, _) = keypair();

        let encrypted = ecies_encrypt(b"secret", &pk);
        assert_eq!(
            ecies_decrypt(&encrypted, &other_sk).unwrap_err(),
            DecryptError::Authentication
        );
    }

    #[test]
    fn test_ecies_fresh_ephemeral_per_message() {
        let (sk, pk) = keypair();

        let first = ecies_encrypt(b"secret", &pk);
        let second = ecies_encrypt(b"secret", &pk);
        assert_ne!(first, second);
        assert_eq!(ecies_decrypt(&first, &sk).unwrap(), b"secret");
        assert_eq!(ecies_decrypt(&second, &sk).unwrap(), b"secret");
    }

    #[test]
    fn test_ecies_tampered_ciphertext_fails() {
        let (sk, pk) = keypair();

        let mut encrypted = ecies_encrypt(b"secret", &pk);
        let last = encrypted.len() - 1;
        encrypted[last] ^= 0xFF;
        assert!(ecies_decrypt(&encrypted, &sk).is_err());
    }

    #[test]
    fn test_password_roundtrip() {
        let payload = encrypt_with_password(b"mnemonic words", b"hunter2").unwrap();
        let decrypted = decrypt_with_password(&payload, b"hunter2").unwrap();
        assert_eq!(decrypted, b"mnemonic words");

        assert!(decrypt_with_password(&payload, b"wrong").is_err());
    }
}
