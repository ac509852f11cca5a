//! BB84 channel simulation and key sifting.
//!
//! Measurement is modelled statistically: when sender and receiver bases
//! agree the receiver reads the sender's bit, otherwise the result is a fair
//! coin flip. The channel is noiseless, so sifted keys agree bit for bit.

use std::fmt;

use rand::{CryptoRng, Rng};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::bits::BitSequence;
use crate::signing::SigningCapability;
use crate::{Bb84Error, Result};

/// Number of leading positions recorded in the qubit log.
pub const QUBIT_LOG_LIMIT: usize = 50;

/// Preparation / measurement basis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Basis {
    /// Computational basis.
    #[serde(rename = "Z")]
    Rectilinear,
    /// Hadamard basis.
    #[serde(rename = "X")]
    Diagonal,
}

impl Basis {
    /// Single-letter label, also the byte signed in the basis announcement.
    pub fn symbol(self) -> char {
        match self {
            Basis::Rectilinear => 'Z',
            Basis::Diagonal => 'X',
        }
    }

    fn random<R: CryptoRng + ?Sized>(rng: &mut R) -> Self {
        if rng.random::<bool>() { Basis::Diagonal } else { Basis::Rectilinear }
    }
}

impl fmt::Display for Basis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.symbol())
    }
}

/// Whether a position survived sifting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SiftStatus {
    /// Bases agreed; the position is part of the key.
    Match,
    /// Bases differed; the position is dropped.
    Discard,
}

/// One row of the observability log. Never consulted for security decisions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QubitRecord {
    pub index: usize,
    pub alice_bit: u8,
    pub alice_basis: Basis,
    pub bob_basis: Basis,
    pub bob_result: u8,
    pub status: SiftStatus,
}

/// Sender and receiver sifted keys, always of equal length.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SiftedKeyPair {
    /// Sender's bits at the matching-basis positions.
    pub key_a: BitSequence,
    /// Receiver's measurements at the same positions.
    pub key_b: BitSequence,
}

impl SiftedKeyPair {
    /// Sifted key length.
    pub fn len(&self) -> usize {
        self.key_a.len()
    }

    /// `true` if no position survived sifting.
    pub fn is_empty(&self) -> bool {
        self.key_a.is_empty()
    }

    /// Positions where the two keys agree.
    pub fn matching_bits(&self) -> usize {
        self.key_a
            .iter()
            .zip(self.key_b.iter())
            .filter(|(a, b)| a == b)
            .count()
    }
}

/// Result of one simulation run.
#[derive(Debug, Clone)]
pub struct Simulation {
    /// Number of positions simulated (N).
    pub qubits: usize,
    pub keys: SiftedKeyPair,
    /// Up to [`QUBIT_LOG_LIMIT`] leading positions.
    pub qubit_log: Vec<QubitRecord>,
}

impl Simulation {
    /// Splits into `(key_a, key_b, qubit_log)`.
    pub fn into_parts(self) -> (BitSequence, BitSequence, Vec<QubitRecord>) {
        let Simulation { keys, qubit_log, .. } = self;
        let SiftedKeyPair { key_a, key_b } = keys;
        (key_a, key_b, qubit_log)
    }
}

/// Runs BB84 exchanges.
#[derive(Debug, Clone)]
pub struct ChannelSimulator {
    signing: SigningCapability,
}

impl ChannelSimulator {
    /// Creates a simulator; `signing` is only used when a run asks for
    /// basis authentication.
    pub fn new(signing: SigningCapability) -> Self {
        Self { signing }
    }

    /// Simulates `length` positions using the thread-local CSPRNG.
    ///
    /// # Errors
    /// See [`ChannelSimulator::simulate_with_rng`].
    pub fn simulate(&self, length: usize, authenticate: bool) -> Result<Simulation> {
        self.simulate_with_rng(&mut rand::rng(), length, authenticate)
    }

    /// Simulates `length` positions drawing all randomness from `rng`.
    ///
    /// # Arguments
    /// * `rng`: Cryptographically secure generator for bits, bases and
    ///   mismatched-basis measurement outcomes.
    /// * `length`: Number of positions N, at least 1.
    /// * `authenticate`: Sign and verify the sender's basis announcement with
    ///   an ephemeral keypair.
    ///
    /// # Returns
    /// * `Ok(Simulation)` with keys of equal length L ≤ N.
    /// * `Err(Bb84Error::InvalidInput)` if `length` is zero.
    /// * `Err(Bb84Error::Configuration)` if authentication is requested but
    ///   no signing scheme is available.
    /// * `Err(Bb84Error::ChannelAuthentication)` if the announcement
    ///   signature does not verify.
    pub fn simulate_with_rng<R: CryptoRng + ?Sized>(
        &self,
        rng: &mut R,
        length: usize,
        authenticate: bool,
    ) -> Result<Simulation> {
        if length == 0 {
            return Err(Bb84Error::InvalidInput("simulation length must be at least 1".to_string()));
        }

        // Prepare: sender bits and both parties' bases
        let alice_bits: Vec<bool> = (0..length).map(|_| rng.random()).collect();
        let alice_bases: Vec<Basis> = (0..length).map(|_| Basis::random(rng)).collect();
        let bob_bases: Vec<Basis> = (0..length).map(|_| Basis::random(rng)).collect();

        // Measure
        let bob_results: Vec<bool> = alice_bits
            .iter()
            .zip(alice_bases.iter().zip(&bob_bases))
            .map(|(&bit, (alice_basis, bob_basis))| {
                if alice_basis == bob_basis { bit } else { rng.random() }
            })
            .collect();

        // Sift
        let mut keys = SiftedKeyPair {
            key_a: BitSequence::with_capacity(length / 2),
            key_b: BitSequence::with_capacity(length / 2),
        };
        for i in 0..length {
            if alice_bases[i] == bob_bases[i] {
                keys.key_a.push(alice_bits[i]);
                keys.key_b.push(bob_results[i]);
            }
        }

        let qubit_log = (0..length.min(QUBIT_LOG_LIMIT))
            .map(|i| QubitRecord {
                index: i,
                alice_bit: u8::from(alice_bits[i]),
                alice_basis: alice_bases[i],
                bob_basis: bob_bases[i],
                bob_result: u8::from(bob_results[i]),
                status: if alice_bases[i] == bob_bases[i] {
                    SiftStatus::Match
                } else {
                    SiftStatus::Discard
                },
            })
            .collect();

        if authenticate {
            self.authenticate_bases(&alice_bases)?;
        }

        info!(
            qubits = length,
            sifted = keys.len(),
            authenticated = authenticate,
            "bb84 exchange complete"
        );
        Ok(Simulation { qubits: length, keys, qubit_log })
    }

    /// Signs the concatenated basis symbols with an ephemeral keypair and
    /// verifies the signature straight away.
    fn authenticate_bases(&self, bases: &[Basis]) -> Result<()> {
        let scheme = self.signing.scheme().ok_or_else(|| {
            Bb84Error::Configuration(
                "basis authentication requested but no signature scheme is available".to_string(),
            )
        })?;

        let announcement: Vec<u8> = bases.iter().map(|b| b.symbol() as u8).collect();
        let keypair = scheme.generate_keypair();
        let signature = scheme.sign(&announcement, &keypair.secret_key)?;
        if !scheme.verify(&announcement, &signature, &keypair.public_key) {
            warn!(scheme = scheme.name(), "basis announcement signature rejected");
            return Err(Bb84Error::ChannelAuthentication);
        }
        debug!(scheme = scheme.name(), "basis announcement authenticated");
        Ok(())
    }
}
