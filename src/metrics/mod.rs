//! Per-run measurements for the encrypt and decrypt workflows.
//!
//! A [`Metrics`] value is created by the caller and handed to the session
//! functions by `&mut`; nothing here is global. Serializing it (for example
//! with [`Metrics::to_json`]) and deciding where to write it is left to the
//! caller.
//!
//! Only lengths, counts, timings and hashes of *public* artefacts are
//! recorded. Key bits themselves never appear.

use std::fmt;
use std::time::Instant;

use chrono::{DateTime, Utc};
use serde::Serialize;
use sha2::{Digest, Sha256};

use crate::bits::BitSequence;

/// Which timer a measurement belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Encryption,
    Decryption,
}

/// Outcome of a boolean check, serialized the way reports display it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum CheckStatus {
    Passed,
    Failed,
}

impl From<bool> for CheckStatus {
    fn from(ok: bool) -> Self {
        if ok { CheckStatus::Passed } else { CheckStatus::Failed }
    }
}

/// Whether a post-quantum signature protected the run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SignatureStatus {
    Enabled,
    Disabled,
}

/// Statistics over a sifted key pair.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct KeyMetrics {
    #[serde(rename = "Key A Length")]
    pub key_a_length: usize,
    #[serde(rename = "Key B Length")]
    pub key_b_length: usize,
    #[serde(rename = "Key B - Count of 1s")]
    pub key_b_ones: usize,
    #[serde(rename = "Key B - Count of 0s")]
    pub key_b_zeros: usize,
    /// Share of positions where A and B agree, in percent, two decimals.
    /// Zero for an empty key B.
    #[serde(rename = "A/B Bit Match Percentage")]
    pub match_percentage: f64,
    /// Binary Shannon entropy of key A in bits per bit, four decimals.
    /// Absent for an empty key A.
    #[serde(rename = "Estimated Shannon Entropy", skip_serializing_if = "Option::is_none")]
    pub shannon_entropy: Option<f64>,
}

impl KeyMetrics {
    /// Computes the statistics for a key pair. Positions past the shorter
    /// key are not compared.
    pub fn from_keys(key_a: &BitSequence, key_b: &BitSequence) -> Self {
        let key_b_ones = key_b.count_ones();
        let matches = key_a.iter().zip(key_b.iter()).filter(|(a, b)| a == b).count();
        let match_percentage = if key_b.is_empty() {
            0.0
        } else {
            round_to(100.0 * matches as f64 / key_b.len() as f64, 2)
        };

        Self {
            key_a_length: key_a.len(),
            key_b_length: key_b.len(),
            key_b_ones,
            key_b_zeros: key_b.len() - key_b_ones,
            match_percentage,
            shannon_entropy: binary_entropy(key_a).map(|h| round_to(h, 4)),
        }
    }
}

/// Binary Shannon entropy of the bit distribution, `None` when empty.
fn binary_entropy(bits: &BitSequence) -> Option<f64> {
    if bits.is_empty() {
        return None;
    }
    let p1 = bits.count_ones() as f64 / bits.len() as f64;
    let p0 = 1.0 - p1;
    let term = |p: f64| if p > 0.0 { -p * p.log2() } else { 0.0 };
    Some(term(p1) + term(p0))
}

fn round_to(value: f64, decimals: i32) -> f64 {
    let scale = 10f64.powi(decimals);
    (value * scale).round() / scale
}

fn sha256_hex(data: &[u8]) -> String {
    hex::encode(Sha256::digest(data))
}

/// Measurements for a single encrypt or decrypt run.
///
/// Every field is optional; only what was recorded is serialized.
#[derive(Debug, Clone, Default, Serialize)]
pub struct Metrics {
    #[serde(rename = "Timestamp", skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<DateTime<Utc>>,

    #[serde(rename = "Original File Size (bytes)", skip_serializing_if = "Option::is_none")]
    pub original_file_size: Option<usize>,

    #[serde(rename = "Encryption Time (s)", skip_serializing_if = "Option::is_none")]
    pub encryption_time_secs: Option<f64>,

    #[serde(rename = "Decryption Time (s)", skip_serializing_if = "Option::is_none")]
    pub decryption_time_secs: Option<f64>,

    #[serde(flatten)]
    pub keys: Option<KeyMetrics>,

    #[serde(rename = "Encrypted File Size (bytes)", skip_serializing_if = "Option::is_none")]
    pub encrypted_file_size: Option<usize>,

    #[serde(rename = "SHA-256 Hash of Encrypted File", skip_serializing_if = "Option::is_none")]
    pub encrypted_sha256: Option<String>,

    #[serde(rename = "Decrypted File Size (bytes)", skip_serializing_if = "Option::is_none")]
    pub decrypted_file_size: Option<usize>,

    #[serde(rename = "SHA-256 Hash of Decrypted File", skip_serializing_if = "Option::is_none")]
    pub decrypted_sha256: Option<String>,

    #[serde(rename = "Integrity Check", skip_serializing_if = "Option::is_none")]
    pub integrity_check: Option<CheckStatus>,

    #[serde(rename = "Post-Quantum Signature", skip_serializing_if = "Option::is_none")]
    pub signature: Option<SignatureStatus>,

    #[serde(skip)]
    started: Option<Instant>,
}

impl Metrics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts (or restarts) the run timer.
    pub fn start_timer(&mut self) {
        self.started = Some(Instant::now());
    }

    /// Records the time since [`start_timer`](Self::start_timer) for `phase`,
    /// rounded to four decimals. Does nothing if the timer never started.
    pub fn stop_timer(&mut self, phase: Phase) {
        let Some(started) = self.started else {
            return;
        };
        let elapsed = round_to(started.elapsed().as_secs_f64(), 4);
        match phase {
            Phase::Encryption => self.encryption_time_secs = Some(elapsed),
            Phase::Decryption => self.decryption_time_secs = Some(elapsed),
        }
    }

    pub fn add_timestamp(&mut self) {
        self.timestamp = Some(Utc::now());
    }

    pub fn add_key_metrics(&mut self, key_a: &BitSequence, key_b: &BitSequence) {
        self.keys = Some(KeyMetrics::from_keys(key_a, key_b));
    }

    pub fn add_original(&mut self, plaintext: &[u8]) {
        self.original_file_size = Some(plaintext.len());
    }

    /// Size and SHA-256 of the container bytes.
    pub fn add_encrypted(&mut self, container: &[u8]) {
        self.encrypted_file_size = Some(container.len());
        self.encrypted_sha256 = Some(sha256_hex(container));
    }

    /// Size and SHA-256 of the recovered plaintext.
    pub fn add_decrypted(&mut self, plaintext: &[u8]) {
        self.decrypted_file_size = Some(plaintext.len());
        self.decrypted_sha256 = Some(sha256_hex(plaintext));
    }

    pub fn add_integrity_check(&mut self, passed: bool) {
        self.integrity_check = Some(passed.into());
    }

    pub fn add_signature_status(&mut self, enabled: bool) {
        self.signature = Some(if enabled {
            SignatureStatus::Enabled
        } else {
            SignatureStatus::Disabled
        });
    }

    /// Pretty-printed JSON report.
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

impl fmt::Display for Metrics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "BB84 run metrics")?;
        if let Some(ts) = &self.timestamp {
            writeln!(f, "  timestamp:        {}", ts.to_rfc3339())?;
        }
        if let Some(secs) = self.encryption_time_secs {
            writeln!(f, "  encryption time:  {secs:.4} s")?;
        }
        if let Some(secs) = self.decryption_time_secs {
            writeln!(f, "  decryption time:  {secs:.4} s")?;
        }
        if let Some(keys) = &self.keys {
            writeln!(f, "  key lengths:      A={} B={}", keys.key_a_length, keys.key_b_length)?;
            writeln!(f, "  A/B match:        {:.2}%", keys.match_percentage)?;
            if let Some(h) = keys.shannon_entropy {
                writeln!(f, "  entropy (key A):  {h:.4}")?;
            }
        }
        if let Some(size) = self.encrypted_file_size {
            writeln!(f, "  container size:   {size} bytes")?;
        }
        if let Some(size) = self.decrypted_file_size {
            writeln!(f, "  plaintext size:   {size} bytes")?;
        }
        if let Some(status) = self.integrity_check {
            writeln!(f, "  integrity:        {status:?}")?;
        }
        if let Some(status) = self.signature {
            writeln!(f, "  PQ signature:     {status:?}")?;
        }
        Ok(())
    }
}
