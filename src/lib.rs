//! Simulated BB84 key exchange feeding a post-quantum signed, encrypted file
//! container.
//!
//! The pipeline runs leaf-first through the modules of this crate:
//!
//! ```text
//! ChannelSimulator ──► (key A, key B)
//!        │
//!        ▼
//! derive_key(key A) ──► Packager::build_package ──► container bytes
//!                                                        │
//! Verifier::open_package(container, key B) ◄─────────────┘
//!        │
//!        ▼
//! plaintext + metadata, or exactly one tagged Bb84Error
//! ```
//!
//! Only the statistical outcome of BB84 measurement is reproduced, no quantum
//! state is modelled. All randomness comes from a cryptographically secure
//! generator, and every operation is synchronous with no shared global state:
//! metrics are owned by the caller and passed in explicitly.

use thiserror::Error;

pub mod bits;
pub mod channel;
pub mod config;
pub mod envelope;
pub mod kdf;
pub mod metrics;
pub mod session;
pub mod signing;

pub use bits::{BitSequence, check_key_entropy, decode_key, encode_key};
pub use channel::{Basis, ChannelSimulator, QubitRecord, SiftStatus, SiftedKeyPair, Simulation};
pub use config::{Config, SigningMode};
pub use envelope::{Container, OpenedPackage, PackageMetadata, Packager, Verifier};
pub use kdf::{DEFAULT_ITERATIONS, DerivedKey, derive_key, verify_key_integrity};
pub use metrics::{KeyMetrics, Metrics, Phase};
pub use session::{EncryptOutcome, decrypt_file, encrypt_file};
pub use signing::{MlDsa87, SignatureScheme, SigningCapability, SigningKeypair};

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Bb84Error>;

/// Generic message shown for every failure on the unpackaging path.
const OPEN_FAILURE_MESSAGE: &str = "The package could not be opened with the supplied key.";

/// Error taxonomy for simulation, packaging and unpackaging.
///
/// Payload strings describe *which* check failed, never the key bits,
/// derived keys or plaintext involved.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Bb84Error {
    /// The basis announcement signature failed during simulation.
    #[error("basis announcement could not be authenticated")]
    ChannelAuthentication,

    /// A required capability (signing) is absent.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// The container is structurally malformed or misses mandatory fields.
    #[error("malformed container: {0}")]
    Parse(String),

    /// Signature fields are missing or the signature does not verify.
    #[error("container authenticity check failed: {0}")]
    Authenticity(String),

    /// Cipher or block padding failure.
    #[error("decryption failed: {0}")]
    Decryption(String),

    /// Decryption succeeded but the recipient key is not the sender's counterpart.
    #[error("recipient key does not match the sender key")]
    KeyMismatch,

    /// Caller supplied a value that cannot be interpreted.
    #[error("invalid input: {0}")]
    InvalidInput(String),
}

impl Bb84Error {
    /// Whether this error can only arise while opening a container.
    pub fn is_open_failure(&self) -> bool {
        matches!(
            self,
            Bb84Error::Parse(_)
                | Bb84Error::Authenticity(_)
                | Bb84Error::Decryption(_)
                | Bb84Error::KeyMismatch
        )
    }

    /// User-facing message.
    ///
    /// Every unpackaging failure maps to the same sentence so a presentation
    /// layer cannot become a padding or key oracle. Callers that need the
    /// precise stage match on the variant instead.
    pub fn public_message(&self) -> String {
        if self.is_open_failure() {
            OPEN_FAILURE_MESSAGE.to_string()
        } else {
            self.to_string()
        }
    }
}
