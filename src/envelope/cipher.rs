//! AES-256-CBC with PKCS#7 padding and a random IV prepended to the output.

use aes::Aes256;
use cbc::cipher::block_padding::Pkcs7;
use cbc::cipher::{BlockDecryptMut, BlockEncryptMut, KeyIvInit};
use rand::RngCore;
use zeroize::Zeroizing;

use crate::kdf::DerivedKey;
use crate::{Bb84Error, Result};

type Aes256CbcEnc = cbc::Encryptor<Aes256>;
type Aes256CbcDec = cbc::Decryptor<Aes256>;

/// IV length, equal to the AES block size.
pub const IV_LEN: usize = 16;
const BLOCK_LEN: usize = 16;

/// Encrypts `data` under `key`; output is `IV || ciphertext`.
///
/// A fresh IV is drawn for every call.
pub(crate) fn encrypt(data: &[u8], key: &DerivedKey) -> Vec<u8> {
    let mut iv = [0u8; IV_LEN];
    rand::rng().fill_bytes(&mut iv);

    let ciphertext = Aes256CbcEnc::new(key.key().into(), (&iv).into())
        .encrypt_padded_vec_mut::<Pkcs7>(data);

    let mut out = Vec::with_capacity(IV_LEN + ciphertext.len());
    out.extend_from_slice(&iv);
    out.extend_from_slice(&ciphertext);
    out
}

/// Decrypts `IV || ciphertext` and strips the padding.
///
/// # Errors
/// * `Bb84Error::Decryption` if the input is not a whole number of blocks
///   after the IV, or the padding is malformed.
pub(crate) fn decrypt(encrypted: &[u8], key: &DerivedKey) -> Result<Zeroizing<Vec<u8>>> {
    if encrypted.len() < IV_LEN + BLOCK_LEN || (encrypted.len() - IV_LEN) % BLOCK_LEN != 0 {
        return Err(Bb84Error::Decryption("ciphertext is not block aligned".to_string()));
    }
    let (iv, body) = encrypted.split_at(IV_LEN);
    let iv: &[u8; IV_LEN] = iv
        .try_into()
        .map_err(|_| Bb84Error::Decryption("missing initialisation vector".to_string()))?;

    Aes256CbcDec::new(key.key().into(), iv.into())
        .decrypt_padded_vec_mut::<Pkcs7>(body)
        .map(Zeroizing::new)
        .map_err(|_| Bb84Error::Decryption("invalid block padding".to_string()))
}
