//! Post-quantum signing capability.
//!
//! Whether signing is possible is decided once, when the configuration is
//! resolved, and carried around as a [`SigningCapability`]. Callers never
//! probe for it at run time.

use std::fmt;
use std::sync::Arc;

use pqcrypto::sign::mldsa87;
use pqcrypto_traits::sign::{DetachedSignature as _, PublicKey as _, SecretKey as _};
use zeroize::Zeroizing;

use crate::{Bb84Error, Result};

/// An ephemeral signing keypair.
pub struct SigningKeypair {
    /// Verification key, safe to publish.
    pub public_key: Vec<u8>,
    /// Signing key, wiped on drop.
    pub secret_key: Zeroizing<Vec<u8>>,
}

/// A detached-signature scheme used for the basis announcement and the container.
pub trait SignatureScheme: Send + Sync {
    /// Human readable algorithm name.
    fn name(&self) -> &'static str;

    /// Generates a fresh keypair from the system CSPRNG.
    fn generate_keypair(&self) -> SigningKeypair;

    /// Signs `message` with `secret_key`, returning the detached signature.
    fn sign(&self, message: &[u8], secret_key: &[u8]) -> Result<Vec<u8>>;

    /// `true` only if `signature` over `message` verifies under `public_key`.
    /// Malformed keys or signatures verify as `false`.
    fn verify(&self, message: &[u8], signature: &[u8], public_key: &[u8]) -> bool;
}

/// ML-DSA-87 (FIPS 204, the standardised Dilithium at its highest level).
#[derive(Debug, Clone, Copy, Default)]
pub struct MlDsa87;

impl SignatureScheme for MlDsa87 {
    fn name(&self) -> &'static str {
        "ML-DSA-87"
    }

    fn generate_keypair(&self) -> SigningKeypair {
        let (public_key, secret_key) = mldsa87::keypair();
        SigningKeypair {
            public_key: public_key.as_bytes().to_vec(),
            secret_key: Zeroizing::new(secret_key.as_bytes().to_vec()),
        }
    }

    fn sign(&self, message: &[u8], secret_key: &[u8]) -> Result<Vec<u8>> {
        let secret_key = mldsa87::SecretKey::from_bytes(secret_key).map_err(|_| {
            Bb84Error::Configuration("signing key has the wrong length for ML-DSA-87".to_string())
        })?;
        let signature = mldsa87::detached_sign(message, &secret_key);
        Ok(signature.as_bytes().to_vec())
    }

    fn verify(&self, message: &[u8], signature: &[u8], public_key: &[u8]) -> bool {
        let Ok(public_key) = mldsa87::PublicKey::from_bytes(public_key) else {
            return false;
        };
        let Ok(signature) = mldsa87::DetachedSignature::from_bytes(signature) else {
            return false;
        };
        mldsa87::verify_detached_signature(&signature, message, &public_key).is_ok()
    }
}

/// Whether a signature scheme is available to this process.
#[derive(Clone)]
pub enum SigningCapability {
    /// Signing and verification are possible with the given scheme.
    Available(Arc<dyn SignatureScheme>),
    /// No scheme is available; anything requiring a signature fails closed.
    Unavailable,
}

impl SigningCapability {
    /// The default post-quantum capability.
    pub fn post_quantum() -> Self {
        SigningCapability::Available(Arc::new(MlDsa87))
    }

    /// The scheme, if available.
    pub fn scheme(&self) -> Option<&dyn SignatureScheme> {
        match self {
            SigningCapability::Available(scheme) => Some(scheme.as_ref()),
            SigningCapability::Unavailable => None,
        }
    }

    /// `true` if a scheme is available.
    pub fn is_available(&self) -> bool {
        matches!(self, SigningCapability::Available(_))
    }
}

impl fmt::Debug for SigningCapability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SigningCapability::Available(scheme) => {
                f.debug_tuple("Available").field(&scheme.name()).finish()
            }
            SigningCapability::Unavailable => f.write_str("Unavailable"),
        }
    }
}
