//! End-to-end encrypt and decrypt runs.
//!
//! These tie the channel simulation, packaging and metrics together the way a
//! front end uses them: the sender gets a base64 container to ship and the
//! receiver's key as a `0`/`1` string to hand over out of band; the receiver
//! later supplies both back to [`decrypt_file`].

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use tracing::{debug, info, warn};

use crate::bits::BitSequence;
use crate::channel::{ChannelSimulator, QubitRecord};
use crate::config::Config;
use crate::envelope::{OpenedPackage, Packager, Verifier};
use crate::metrics::{Metrics, Phase};
use crate::{Bb84Error, Result};

/// What the sender walks away with.
#[derive(Debug, Clone)]
pub struct EncryptOutcome {
    /// Container bytes, base64 encoded for transport.
    pub package_b64: String,
    /// Receiver key as a bit string such as `"0110…"`.
    pub key_b: String,
    /// The first positions of the simulation, for display.
    pub qubit_log: Vec<QubitRecord>,
}

/// Runs a fresh key exchange and packages `data` under it.
///
/// # Arguments
/// * `data`: File contents.
/// * `filename`: Original filename, restored on decryption.
/// * `config`: Simulation size, KDF rounds and signing mode.
/// * `metrics`: Filled with timing, key statistics and container hash.
///
/// # Errors
/// * `Bb84Error::InvalidInput` if `config` does not validate.
/// * `Bb84Error::Configuration` if signing is disabled. Containers are
///   never produced unsigned.
/// * `Bb84Error::ChannelAuthentication` if the basis announcement fails to
///   verify.
pub fn encrypt_file(
    data: &[u8],
    filename: &str,
    config: &Config,
    metrics: &mut Metrics,
) -> Result<EncryptOutcome> {
    config.validate()?;
    metrics.start_timer();
    metrics.add_timestamp();
    metrics.add_original(data);

    let signing = config.signing_capability();
    let simulation = ChannelSimulator::new(signing.clone())
        .simulate(config.qubits, config.authenticate_bases)?;
    let (key_a, key_b, qubit_log) = simulation.into_parts();

    let container = Packager::new(signing, config.kdf_iterations)
        .build_package(data, &key_a, &key_b, filename)?;

    metrics.stop_timer(Phase::Encryption);
    metrics.add_key_metrics(&key_a, &key_b);
    metrics.add_encrypted(&container);
    metrics.add_signature_status(true);

    info!(filename, sifted_len = key_b.len(), "file encrypted");

    Ok(EncryptOutcome {
        package_b64: STANDARD.encode(&container),
        key_b: key_b.to_string(),
        qubit_log,
    })
}

/// Opens a base64 container with the receiver's bit-string key.
///
/// Once `config` validates, `metrics` records the integrity result whether
/// or not opening succeeds, including for a malformed key or package.
///
/// # Errors
/// * `Bb84Error::InvalidInput` if `key_b` holds characters other than
///   `0`/`1`, or `config` does not validate.
/// * `Bb84Error::Parse` if `package_b64` is not base64.
/// * Any error of [`Verifier::open_package`].
pub fn decrypt_file(
    package_b64: &str,
    key_b: &str,
    config: &Config,
    metrics: &mut Metrics,
) -> Result<OpenedPackage> {
    config.validate()?;
    metrics.start_timer();
    metrics.add_timestamp();

    let opened = key_b.parse::<BitSequence>().and_then(|key_b| {
        let container = STANDARD
            .decode(package_b64.trim())
            .map_err(|_| Bb84Error::Parse("package is not base64".to_string()))?;
        metrics.add_encrypted(&container);
        Verifier::new(config.signing_capability(), config.kdf_iterations)
            .open_package(&container, &key_b)
    });

    metrics.stop_timer(Phase::Decryption);
    metrics.add_integrity_check(opened.is_ok());

    match &opened {
        Ok(package) => {
            metrics.add_decrypted(&package.plaintext);
            info!(filename = %package.metadata.original_filename, "file decrypted");
        }
        Err(e) => {
            debug!(error = %e, "open failed");
            warn!("file could not be decrypted");
        }
    }
    opened
}
