//! Key stretching with PBKDF2-HMAC-SHA256.
//!
//! A [`DerivedKey`] is the 32-byte AES key followed by the 16-byte salt it was
//! derived with. The salt travels in the container, so the decryption side
//! always re-derives with the sender's salt rather than a fresh one.

use pbkdf2::pbkdf2_hmac;
use rand::RngCore;
use sha2::Sha256;
use subtle::ConstantTimeEq;
use zeroize::{Zeroize, Zeroizing};

use crate::bits::BitSequence;

/// Size of the symmetric key in bytes (AES-256).
pub const KEY_LEN: usize = 32;
/// Size of the salt in bytes.
pub const SALT_LEN: usize = 16;
/// Size of key plus salt.
pub const DERIVED_KEY_LEN: usize = KEY_LEN + SALT_LEN;
/// PBKDF2 iteration count used unless configured otherwise.
pub const DEFAULT_ITERATIONS: u32 = 100_000;

/// A 32-byte key bound to the salt it was stretched with.
///
/// Only [`derive_key`] constructs one. Key bytes are wiped on drop.
pub struct DerivedKey {
    key: [u8; KEY_LEN],
    salt: [u8; SALT_LEN],
}

impl DerivedKey {
    /// The symmetric key.
    pub fn key(&self) -> &[u8; KEY_LEN] {
        &self.key
    }

    /// The salt the key was derived with.
    pub fn salt(&self) -> &[u8; SALT_LEN] {
        &self.salt
    }

    /// Key followed by salt, 48 bytes.
    pub fn to_bytes(&self) -> Zeroizing<[u8; DERIVED_KEY_LEN]> {
        let mut out = Zeroizing::new([0u8; DERIVED_KEY_LEN]);
        out[..KEY_LEN].copy_from_slice(&self.key);
        out[KEY_LEN..].copy_from_slice(&self.salt);
        out
    }
}

impl Drop for DerivedKey {
    fn drop(&mut self) {
        self.key.zeroize();
    }
}

impl std::fmt::Debug for DerivedKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DerivedKey")
         .field("key", &"<redacted>")
         .field("salt", &hex::encode(self.salt))
         .finish()
    }
}

/// Stretches `bits` into a [`DerivedKey`].
///
/// The bits are packed MSB-first before hashing. With `salt == None` a fresh
/// random salt is drawn (encryption path); otherwise exactly the given salt
/// is used (verification path). Always runs the full iteration count.
///
/// # Arguments
/// * `bits`: Key material, usually a sifted BB84 key.
/// * `salt`: Salt to reuse, or `None` for a fresh one.
/// * `iterations`: PBKDF2 round count.
pub fn derive_key(
    bits: &BitSequence,
    salt: Option<&[u8; SALT_LEN]>,
    iterations: u32,
) -> DerivedKey {
    let salt = match salt {
        Some(salt) => *salt,
        None => {
            let mut fresh = [0u8; SALT_LEN];
            rand::rng().fill_bytes(&mut fresh);
            fresh
        }
    };
    DerivedKey { key: stretch(bits, &salt, iterations), salt }
}

/// Checks that `candidate` (key || salt) is the key `bits` stretch to under
/// the embedded salt.
///
/// Comparison time does not depend on where the bytes first differ.
/// Any malformed candidate, including a wrong length, yields `false`.
///
/// Bits are compared in packed form: sequences that differ only by trailing
/// zeros inside the final byte stretch to the same key.
pub fn verify_key_integrity(candidate: &[u8], bits: &BitSequence, iterations: u32) -> bool {
    if candidate.len() != DERIVED_KEY_LEN {
        return false;
    }
    let (candidate_key, salt) = candidate.split_at(KEY_LEN);
    let Ok(salt) = <&[u8; SALT_LEN]>::try_from(salt) else {
        return false;
    };
    let mut expected = stretch(bits, salt, iterations);
    let matches: bool = expected[..].ct_eq(candidate_key).into();
    expected.zeroize();
    matches
}

fn stretch(bits: &BitSequence, salt: &[u8; SALT_LEN], iterations: u32) -> [u8; KEY_LEN] {
    let material = Zeroizing::new(bits.to_bytes());
    let mut key = [0u8; KEY_LEN];
    pbkdf2_hmac::<Sha256>(&material, salt, iterations, &mut key);
    key
}
