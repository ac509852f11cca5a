//! Run configuration.
//!
//! Every field has a default, so a JSON document only needs the values it
//! changes:
//!
//! ```json
//! { "qubits": 512, "kdf_iterations": 200000 }
//! ```
//!
//! The signing capability is resolved here, once, through
//! [`Config::signing_capability`].

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::kdf::DEFAULT_ITERATIONS;
use crate::signing::SigningCapability;
use crate::{Bb84Error, Result};

/// Default number of simulated positions per session.
pub const DEFAULT_QUBITS: usize = 256;

/// Which signing capability a run should have.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SigningMode {
    /// ML-DSA-87.
    #[default]
    PostQuantum,
    /// No signature scheme. Packaging and authenticated simulation fail
    /// closed under this mode.
    Disabled,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// Simulated positions N per session.
    pub qubits: usize,
    /// Sign the basis announcement during simulation.
    pub authenticate_bases: bool,
    /// PBKDF2 rounds. Both sides of an exchange must agree.
    pub kdf_iterations: u32,
    pub signing: SigningMode,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            qubits: DEFAULT_QUBITS,
            authenticate_bases: true,
            kdf_iterations: DEFAULT_ITERATIONS,
            signing: SigningMode::PostQuantum,
        }
    }
}

impl Config {
    /// Parses a (possibly partial) JSON document over the defaults and
    /// validates the result.
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Config = serde_json::from_str(json)
            .map_err(|e| Bb84Error::InvalidInput(format!("failed to parse config: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    /// Reads and parses a JSON configuration file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| {
            Bb84Error::InvalidInput(format!("failed to read config {}: {e}", path.display()))
        })?;
        Self::from_json(&text)
    }

    /// Rejects values no run can use.
    pub fn validate(&self) -> Result<()> {
        if self.qubits == 0 {
            return Err(Bb84Error::InvalidInput("qubits must be at least 1".to_string()));
        }
        if self.kdf_iterations == 0 {
            return Err(Bb84Error::InvalidInput("kdf_iterations must be at least 1".to_string()));
        }
        Ok(())
    }

    /// The capability this configuration grants.
    pub fn signing_capability(&self) -> SigningCapability {
        match self.signing {
            SigningMode::PostQuantum => SigningCapability::post_quantum(),
            SigningMode::Disabled => SigningCapability::Unavailable,
        }
    }
}
