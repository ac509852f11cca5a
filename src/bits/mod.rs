//! Bit sequences and their byte and text encodings.
//!
//! Two byte forms exist and they are not interchangeable:
//!
//! - [`BitSequence::to_bytes`] packs MSB-first and zero-pads the last byte.
//!   The bit count is lost, so the caller tracks it separately. This is the
//!   form fed to key derivation and embedded in the encrypted payload.
//! - [`encode_key`] prefixes a sentinel `1` bit before packing, so
//!   [`decode_key`] recovers the exact sequence including leading zeros.

use std::fmt;
use std::str::FromStr;

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE;
use sha2::{Digest, Sha512};
use zeroize::Zeroize;

use crate::{Bb84Error, Result};

/// Upper bound on the normalised imbalance accepted by [`check_key_entropy`].
const MAX_BALANCE_RATIO: f64 = 0.4;

/// An ordered sequence of 0/1 values whose length is significant.
///
/// Bits are stored one per byte (`0` or `1`). Contents are wiped on drop and
/// `Debug` only ever shows the length.
#[derive(Clone, Default, PartialEq, Eq, Hash)]
pub struct BitSequence {
    bits: Vec<u8>,
}

impl fmt::Debug for BitSequence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BitSequence")
         .field("len", &self.bits.len())
         .finish()
    }
}

impl Drop for BitSequence {
    fn drop(&mut self) {
        self.bits.zeroize();
    }
}

impl BitSequence {
    /// Creates an empty sequence.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an empty sequence with room for `capacity` bits.
    pub fn with_capacity(capacity: usize) -> Self {
        Self { bits: Vec::with_capacity(capacity) }
    }

    /// Builds a sequence from raw 0/1 values.
    ///
    /// # Errors
    /// * `Bb84Error::InvalidInput` if any value is neither 0 nor 1.
    pub fn from_bits(bits: Vec<u8>) -> Result<Self> {
        if let Some(position) = bits.iter().position(|&b| b > 1) {
            return Err(Bb84Error::InvalidInput(format!(
                "bit value at position {position} is not 0 or 1"
            )));
        }
        Ok(Self { bits })
    }

    /// Unpacks every bit of `data`, MSB-first. The result is always
    /// `8 * data.len()` bits long.
    pub fn from_bytes(data: &[u8]) -> Self {
        let mut bits = Vec::with_capacity(data.len() * 8);
        for byte in data {
            for shift in (0..8).rev() {
                bits.push((byte >> shift) & 1);
            }
        }
        Self { bits }
    }

    /// Packs the bits MSB-first, zero-padding the final byte.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut packed = vec![0u8; self.bits.len().div_ceil(8)];
        for (i, &bit) in self.bits.iter().enumerate() {
            if bit == 1 {
                packed[i / 8] |= 1 << (7 - (i % 8));
            }
        }
        packed
    }

    /// Appends one bit.
    pub fn push(&mut self, bit: bool) {
        self.bits.push(u8::from(bit));
    }

    /// Number of bits.
    pub fn len(&self) -> usize {
        self.bits.len()
    }

    /// `true` if the sequence holds no bits.
    pub fn is_empty(&self) -> bool {
        self.bits.is_empty()
    }

    /// Bit at `index`, if in range.
    pub fn get(&self, index: usize) -> Option<bool> {
        self.bits.get(index).map(|&b| b == 1)
    }

    /// Iterates over the bits in order.
    pub fn iter(&self) -> impl Iterator<Item = bool> + '_ {
        self.bits.iter().map(|&b| b == 1)
    }

    /// Raw 0/1 values.
    pub fn as_slice(&self) -> &[u8] {
        &self.bits
    }

    /// Number of set bits.
    pub fn count_ones(&self) -> usize {
        self.bits.iter().filter(|&&b| b == 1).count()
    }

    /// Short hexadecimal fingerprint for out-of-band comparison.
    ///
    /// Two parties holding the same sifted key compute the same 8-character
    /// fingerprint; comparing it over an independent channel confirms
    /// agreement without revealing the key. The bit count is hashed too, so
    /// sequences that pack to the same bytes still differ.
    pub fn fingerprint(&self) -> String {
        let mut hasher = Sha512::new();
        hasher.update(b"BB84_KEY_FINGERPRINT_V1"); // Domain separation
        hasher.update((self.bits.len() as u64).to_le_bytes());
        hasher.update(self.to_bytes());
        let digest: [u8; 64] = hasher.finalize().into();
        hex::encode(&digest[..4])
    }
}

impl FromIterator<bool> for BitSequence {
    fn from_iter<I: IntoIterator<Item = bool>>(iter: I) -> Self {
        Self { bits: iter.into_iter().map(u8::from).collect() }
    }
}

impl From<&[bool]> for BitSequence {
    fn from(bits: &[bool]) -> Self {
        bits.iter().copied().collect()
    }
}

/// Renders as a string of `0` and `1` characters.
impl fmt::Display for BitSequence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for &bit in &self.bits {
            f.write_str(if bit == 1 { "1" } else { "0" })?;
        }
        Ok(())
    }
}

/// Parses a string of `0` and `1` characters; surrounding whitespace is ignored.
impl FromStr for BitSequence {
    type Err = Bb84Error;

    fn from_str(s: &str) -> Result<Self> {
        let trimmed = s.trim();
        let mut bits = Vec::with_capacity(trimmed.len());
        for (position, c) in trimmed.chars().enumerate() {
            match c {
                '0' => bits.push(0),
                '1' => bits.push(1),
                _ => {
                    bits.zeroize();
                    return Err(Bb84Error::InvalidInput(format!(
                        "key string has a non-binary character at position {position}"
                    )));
                }
            }
        }
        Ok(Self { bits })
    }
}

/// Encodes `bits` as length-preserving URL-safe base64.
///
/// A sentinel `1` is placed in front of the bits and the result is written
/// in its minimal big-endian byte form, so leading zeros survive.
/// The empty sequence encodes to the empty string.
pub fn encode_key(bits: &BitSequence) -> String {
    if bits.is_empty() {
        return String::new();
    }
    // Sentinel plus payload, right-aligned in whole bytes.
    let total = bits.len() + 1;
    let leading = total.div_ceil(8) * 8 - total;
    let mut framed = BitSequence::with_capacity(leading + total);
    for _ in 0..leading {
        framed.push(false);
    }
    framed.push(true);
    framed.bits.extend_from_slice(&bits.bits);
    URL_SAFE.encode(framed.to_bytes())
}

/// Inverse of [`encode_key`].
///
/// # Errors
/// * `Bb84Error::InvalidInput` if the text is not valid URL-safe base64 or
///   carries no sentinel bit.
pub fn decode_key(encoded: &str) -> Result<BitSequence> {
    if encoded.is_empty() {
        return Ok(BitSequence::new());
    }
    let data = URL_SAFE
        .decode(encoded)
        .map_err(|e| Bb84Error::InvalidInput(format!("encoded key is not base64: {e}")))?;
    let unpacked = BitSequence::from_bytes(&data);
    let sentinel = unpacked
        .bits
        .iter()
        .position(|&b| b == 1)
        .ok_or_else(|| Bb84Error::InvalidInput("encoded key has no sentinel bit".to_string()))?;
    Ok(BitSequence { bits: unpacked.bits[sentinel + 1..].to_vec() })
}

/// Coarse balance check on key material.
///
/// Returns `false` for an empty sequence, otherwise `true` when the share of
/// ones deviates from one half by less than 40%.
pub fn check_key_entropy(bits: &BitSequence) -> bool {
    let n = bits.len();
    if n == 0 {
        return false;
    }
    let ones = bits.count_ones() as f64;
    let balance_ratio = (2.0 * ones - n as f64).abs() / (2.0 * n as f64);
    balance_ratio < MAX_BALANCE_RATIO
}
