//! Signed, encrypted file containers.
//!
//! Wire format (compact JSON, fields in this order):
//!
//! ```text
//! { "ciphertext":    base64(IV || AES-256-CBC ciphertext),
//!   "salt":          base64(16-byte PBKDF2 salt),
//!   "pq_signature":  base64(signature over {"ciphertext","salt"}),
//!   "pq_public_key": base64(ephemeral verification key) }
//! ```
//!
//! The encrypted payload is itself compact JSON:
//! `{"file_bytes_b64", "key_a_encoded", "original_filename"}`, where
//! `key_a_encoded` is the sender key packed MSB-first.
//!
//! The signed bytes are the compact serialization of the first two fields
//! only. Both sides produce them through [`UnsignedContainer`], so signer and
//! verifier always operate on byte-identical input.

mod cipher;

use std::path::Path;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use zeroize::Zeroizing;

use crate::bits::BitSequence;
use crate::config::Config;
use crate::kdf::{SALT_LEN, derive_key, verify_key_integrity};
use crate::signing::SigningCapability;
use crate::{Bb84Error, Result};

pub use cipher::IV_LEN;

/// Filename reported when the payload carries none.
const FALLBACK_FILENAME: &str = "decrypted_file";
/// Extension reported when the filename has none.
const FALLBACK_EXTENSION: &str = "bin";

/// The portion of a container covered by the signature.
#[derive(Serialize)]
struct UnsignedContainer<'a> {
    ciphertext: &'a str,
    salt: &'a str,
}

impl UnsignedContainer<'_> {
    fn canonical_bytes(&self) -> Result<Vec<u8>> {
        serde_json::to_vec(self)
            .map_err(|e| Bb84Error::Parse(format!("container could not be serialized: {e}")))
    }
}

/// Outer wire object. Produced only by [`Packager`], read by [`Verifier`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Container {
    ciphertext: String,
    salt: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pq_signature: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pq_public_key: Option<String>,
}

impl Container {
    /// Parses container bytes.
    ///
    /// # Errors
    /// * `Bb84Error::Parse` on malformed JSON, unknown fields, or a missing
    ///   `ciphertext` / `salt`.
    pub fn from_slice(bytes: &[u8]) -> Result<Self> {
        serde_json::from_slice(bytes).map_err(|e| Bb84Error::Parse(e.to_string()))
    }

    /// Canonical serialization.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        serde_json::to_vec(self)
            .map_err(|e| Bb84Error::Parse(format!("container could not be serialized: {e}")))
    }

    /// Base64 ciphertext field.
    pub fn ciphertext(&self) -> &str {
        &self.ciphertext
    }

    /// Base64 salt field.
    pub fn salt(&self) -> &str {
        &self.salt
    }

    /// `true` if both signature fields are present.
    pub fn is_signed(&self) -> bool {
        self.pq_signature.is_some() && self.pq_public_key.is_some()
    }

    fn unsigned(&self) -> UnsignedContainer<'_> {
        UnsignedContainer { ciphertext: &self.ciphertext, salt: &self.salt }
    }
}

/// Encrypted inner payload. Never leaves the ciphertext in clear.
#[derive(Serialize, Deserialize)]
struct InternalPayload {
    file_bytes_b64: String,
    key_a_encoded: String,
    #[serde(default = "fallback_filename")]
    original_filename: String,
}

fn fallback_filename() -> String {
    FALLBACK_FILENAME.to_string()
}

/// Information recovered alongside the plaintext.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackageMetadata {
    pub original_filename: String,
    /// Extension of `original_filename`, `"bin"` if it has none.
    pub extension: String,
}

impl PackageMetadata {
    fn from_filename(original_filename: String) -> Self {
        let extension = Path::new(&original_filename)
            .extension()
            .and_then(|ext| ext.to_str())
            .filter(|ext| !ext.is_empty())
            .unwrap_or(FALLBACK_EXTENSION)
            .to_string();
        Self { original_filename, extension }
    }
}

/// A successfully verified and decrypted container.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OpenedPackage {
    pub plaintext: Vec<u8>,
    pub metadata: PackageMetadata,
}

/// Builds signed containers.
#[derive(Debug, Clone)]
pub struct Packager {
    signing: SigningCapability,
    iterations: u32,
}

impl Packager {
    /// # Arguments
    /// * `signing`: Must be `Available`, otherwise every build fails closed.
    /// * `iterations`: PBKDF2 rounds; the verifier must use the same value.
    pub fn new(signing: SigningCapability, iterations: u32) -> Self {
        Self { signing, iterations }
    }

    /// Packager using the configured capability and iteration count.
    pub fn from_config(config: &Config) -> Self {
        Self::new(config.signing_capability(), config.kdf_iterations)
    }

    /// Encrypts and signs `plaintext` into container bytes.
    ///
    /// # Arguments
    /// * `plaintext`: File contents.
    /// * `key_a`: Sender's sifted key; a fresh salt is drawn for it.
    /// * `_key_b`: Receiver's sifted key, not used on this side.
    /// * `filename`: Original filename, stored inside the ciphertext.
    ///
    /// # Returns
    /// * `Ok(Vec<u8>)` with the canonical signed container.
    /// * `Err(Bb84Error::Configuration)` if no signature scheme is available.
    ///   There is no unsigned fallback.
    pub fn build_package(
        &self,
        plaintext: &[u8],
        key_a: &BitSequence,
        _key_b: &BitSequence,
        filename: &str,
    ) -> Result<Vec<u8>> {
        let Some(scheme) = self.signing.scheme() else {
            warn!("refusing to build a package without a signature scheme");
            return Err(Bb84Error::Configuration(
                "no signature scheme is available; unsigned packages are never produced"
                    .to_string(),
            ));
        };

        // 1. Fresh key and salt
        let derived = derive_key(key_a, None, self.iterations);

        // 2. Inner payload
        let payload = InternalPayload {
            file_bytes_b64: STANDARD.encode(plaintext),
            key_a_encoded: STANDARD.encode(key_a.to_bytes()),
            original_filename: filename.to_string(),
        };
        let payload_bytes = Zeroizing::new(serde_json::to_vec(&payload).map_err(|e| {
            Bb84Error::InvalidInput(format!("payload could not be serialized: {e}"))
        })?);
        // Wipe the encoded copies of plaintext and key.
        drop(Zeroizing::new(payload.file_bytes_b64));
        drop(Zeroizing::new(payload.key_a_encoded));

        // 3. Encrypt
        let encrypted = cipher::encrypt(&payload_bytes, &derived);

        // 4. Outer object
        let ciphertext = STANDARD.encode(&encrypted);
        let salt = STANDARD.encode(derived.salt());
        let unsigned = UnsignedContainer { ciphertext: &ciphertext, salt: &salt };
        let signed_bytes = unsigned.canonical_bytes()?;

        // 5. Sign with an ephemeral keypair
        let keypair = scheme.generate_keypair();
        let signature = scheme.sign(&signed_bytes, &keypair.secret_key)?;

        let container = Container {
            pq_signature: Some(STANDARD.encode(&signature)),
            pq_public_key: Some(STANDARD.encode(&keypair.public_key)),
            ciphertext,
            salt,
        };
        let bytes = container.to_bytes()?;
        info!(
            plaintext_len = plaintext.len(),
            container_len = bytes.len(),
            scheme = scheme.name(),
            "package built"
        );
        Ok(bytes)
    }
}

/// Verifies and opens containers.
#[derive(Debug, Clone)]
pub struct Verifier {
    signing: SigningCapability,
    iterations: u32,
}

impl Verifier {
    /// # Arguments
    /// * `signing`: Needed to verify; `Unavailable` rejects every container.
    /// * `iterations`: PBKDF2 rounds the packager used.
    pub fn new(signing: SigningCapability, iterations: u32) -> Self {
        Self { signing, iterations }
    }

    /// Verifier using the configured capability and iteration count.
    pub fn from_config(config: &Config) -> Self {
        Self::new(config.signing_capability(), config.kdf_iterations)
    }

    /// Verifies, decrypts and key-checks a container.
    ///
    /// Checks run in a fixed order and stop at the first failure. Nothing is
    /// decrypted before the signature verifies.
    ///
    /// # Returns
    /// * `Ok(OpenedPackage)` only if every check passed.
    /// * `Err(Bb84Error::Parse)` for malformed structure or field encodings.
    /// * `Err(Bb84Error::Authenticity)` if signature fields are missing, no
    ///   scheme is available locally, or the signature does not verify.
    /// * `Err(Bb84Error::Decryption)` on cipher or padding failure.
    /// * `Err(Bb84Error::KeyMismatch)` if `key_b` is not the counterpart of
    ///   the sender key embedded in the payload.
    pub fn open_package(
        &self,
        container_bytes: &[u8],
        key_b: &BitSequence,
    ) -> Result<OpenedPackage> {
        // 1. Parse
        let container = Container::from_slice(container_bytes).inspect_err(|e| {
            debug!(error = %e, "container rejected at parse stage");
        })?;

        // 2 + 3. Authenticity before anything else
        self.verify_signature(&container)?;

        // 4. Candidate key from the embedded salt, then decrypt
        let salt = decode_field("salt", container.salt())?;
        let salt: [u8; SALT_LEN] = salt
            .try_into()
            .map_err(|_| Bb84Error::Parse(format!("salt must be {SALT_LEN} bytes")))?;
        let encrypted = decode_field("ciphertext", container.ciphertext())?;

        let candidate = derive_key(key_b, Some(&salt), self.iterations);
        let payload_bytes = cipher::decrypt(&encrypted, &candidate).inspect_err(|_| {
            debug!("container rejected at decryption stage");
        })?;

        // 5. Inner payload and key integrity. The ciphertext is authentic at
        // this point, so an unreadable payload means the key was wrong.
        let payload: InternalPayload = serde_json::from_slice(&payload_bytes).map_err(|_| {
            debug!("decrypted payload unreadable");
            Bb84Error::KeyMismatch
        })?;
        let key_a_bytes = Zeroizing::new(
            STANDARD
                .decode(&payload.key_a_encoded)
                .map_err(|_| Bb84Error::KeyMismatch)?,
        );
        let embedded_key_a = BitSequence::from_bytes(&key_a_bytes);

        if !verify_key_integrity(&*candidate.to_bytes(), &embedded_key_a, self.iterations) {
            debug!("container rejected at key integrity stage");
            return Err(Bb84Error::KeyMismatch);
        }

        let plaintext = STANDARD
            .decode(&payload.file_bytes_b64)
            .map_err(|_| Bb84Error::Decryption("payload file bytes are not base64".to_string()))?;
        let metadata = PackageMetadata::from_filename(payload.original_filename);

        info!(plaintext_len = plaintext.len(), "package opened");
        Ok(OpenedPackage { plaintext, metadata })
    }

    fn verify_signature(&self, container: &Container) -> Result<()> {
        let (Some(signature), Some(public_key)) =
            (&container.pq_signature, &container.pq_public_key)
        else {
            debug!("container rejected: unsigned");
            return Err(Bb84Error::Authenticity("container is not signed".to_string()));
        };
        let Some(scheme) = self.signing.scheme() else {
            debug!("container rejected: no local signature scheme");
            return Err(Bb84Error::Authenticity(
                "no signature scheme is available to verify the container".to_string(),
            ));
        };

        let signature = STANDARD
            .decode(signature)
            .map_err(|_| Bb84Error::Authenticity("signature is not base64".to_string()))?;
        let public_key = STANDARD
            .decode(public_key)
            .map_err(|_| Bb84Error::Authenticity("public key is not base64".to_string()))?;

        let signed_bytes = container.unsigned().canonical_bytes()?;
        if !scheme.verify(&signed_bytes, &signature, &public_key) {
            debug!(scheme = scheme.name(), "container rejected: signature invalid");
            return Err(Bb84Error::Authenticity("signature does not verify".to_string()));
        }
        Ok(())
    }
}

fn decode_field(name: &str, value: &str) -> Result<Vec<u8>> {
    STANDARD
        .decode(value)
        .map_err(|_| Bb84Error::Parse(format!("field `{name}` is not base64")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::ChannelSimulator;
    use crate::signing::{MlDsa87, SignatureScheme};
    use rand::SeedableRng;
    use rand::rngs::StdRng;
    use serde_json::Value;
    use std::sync::Arc;

    const FAST: u32 = 1_000;

    fn pq() -> SigningCapability {
        SigningCapability::Available(Arc::new(MlDsa87))
    }

    fn packager() -> Packager {
        Packager::new(pq(), FAST)
    }

    fn verifier() -> Verifier {
        Verifier::new(pq(), FAST)
    }

    fn keys(seed: u64) -> (BitSequence, BitSequence) {
        let sim = ChannelSimulator::new(pq())
            .simulate_with_rng(&mut StdRng::seed_from_u64(seed), 128, false)
            .unwrap();
        let (a, b, _) = sim.into_parts();
        (a, b)
    }

    fn fields(container: &[u8]) -> serde_json::Map<String, Value> {
        match serde_json::from_slice::<Value>(container).unwrap() {
            Value::Object(map) => map,
            other => panic!("container is not an object: {other}"),
        }
    }

    fn with_field(container: &[u8], name: &str, value: Option<Value>) -> Vec<u8> {
        let mut map = fields(container);
        match value {
            Some(v) => {
                map.insert(name.to_string(), v);
            }
            None => {
                map.remove(name);
            }
        }
        serde_json::to_vec(&Value::Object(map)).unwrap()
    }

    fn flip_base64_byte(encoded: &str, index: usize) -> String {
        let mut raw = STANDARD.decode(encoded).unwrap();
        raw[index] ^= 0x01;
        STANDARD.encode(raw)
    }

    /// Signs an arbitrary outer object with a fresh keypair, as a malicious or
    /// buggy sender could.
    fn resign(ciphertext: &str, salt: &str) -> Vec<u8> {
        let scheme = MlDsa87;
        let keypair = scheme.generate_keypair();
        let unsigned = UnsignedContainer { ciphertext, salt };
        let signature = scheme
            .sign(&unsigned.canonical_bytes().unwrap(), &keypair.secret_key)
            .unwrap();
        Container {
            ciphertext: ciphertext.to_string(),
            salt: salt.to_string(),
            pq_signature: Some(STANDARD.encode(signature)),
            pq_public_key: Some(STANDARD.encode(&keypair.public_key)),
        }
        .to_bytes()
        .unwrap()
    }

    #[test]
    fn round_trip_recovers_plaintext_and_metadata() {
        let (key_a, key_b) = keys(1);
        let plaintext = b"quantum-safe contents \x00\xff";
        let container = packager().build_package(plaintext, &key_a, &key_b, "report.pdf").unwrap();
        let opened = verifier().open_package(&container, &key_b).unwrap();
        assert_eq!(opened.plaintext, plaintext);
        assert_eq!(
            opened.metadata,
            PackageMetadata { original_filename: "report.pdf".into(), extension: "pdf".into() }
        );
    }

    #[test]
    fn empty_plaintext_round_trips() {
        let (key_a, key_b) = keys(2);
        let container = packager().build_package(b"", &key_a, &key_b, "empty").unwrap();
        let opened = verifier().open_package(&container, &key_b).unwrap();
        assert!(opened.plaintext.is_empty());
        assert_eq!(opened.metadata.extension, "bin");
    }

    #[test]
    fn wire_format_is_canonical() {
        let (key_a, key_b) = keys(3);
        let container = packager().build_package(b"x", &key_a, &key_b, "x.txt").unwrap();
        let text = std::str::from_utf8(&container).unwrap();
        assert!(text.starts_with(r#"{"ciphertext":""#));
        assert!(!text.contains(' '));
        assert!(!text.contains('\n'));

        let map = fields(&container);
        assert_eq!(map.len(), 4);
        let positions: Vec<usize> =
            ["\"ciphertext\"", "\"salt\"", "\"pq_signature\"", "\"pq_public_key\""]
            .iter()
            .map(|k| text.find(k).unwrap())
            .collect();
        assert!(positions.windows(2).all(|w| w[0] < w[1]));

        let salt = STANDARD.decode(map["salt"].as_str().unwrap()).unwrap();
        assert_eq!(salt.len(), SALT_LEN);
        let ciphertext = STANDARD.decode(map["ciphertext"].as_str().unwrap()).unwrap();
        assert_eq!((ciphertext.len() - IV_LEN) % 16, 0);
    }

    #[test]
    fn containers_never_repeat_salt_or_iv() {
        let (key_a, key_b) = keys(4);
        let first = fields(&packager().build_package(b"same", &key_a, &key_b, "f").unwrap());
        let second = fields(&packager().build_package(b"same", &key_a, &key_b, "f").unwrap());
        assert_ne!(first["salt"], second["salt"]);
        let iv = |m: &serde_json::Map<String, Value>| {
            STANDARD.decode(m["ciphertext"].as_str().unwrap()).unwrap()[..IV_LEN].to_vec()
        };
        assert_ne!(iv(&first), iv(&second));
    }

    #[test]
    fn build_fails_closed_without_signing() {
        let (key_a, key_b) = keys(5);
        let err = Packager::new(SigningCapability::Unavailable, FAST)
            .build_package(b"data", &key_a, &key_b, "a.txt")
            .unwrap_err();
        assert!(matches!(err, Bb84Error::Configuration(_)));
    }

    #[test]
    fn open_requires_local_signing_capability() {
        let (key_a, key_b) = keys(6);
        let container = packager().build_package(b"data", &key_a, &key_b, "a.txt").unwrap();
        let err = Verifier::new(SigningCapability::Unavailable, FAST)
            .open_package(&container, &key_b)
            .unwrap_err();
        assert!(matches!(err, Bb84Error::Authenticity(_)));
    }

    #[test]
    fn malformed_containers_are_parse_errors() {
        let (_, key_b) = keys(7);
        let v = verifier();
        let cases: [&[u8]; 5] =
            [b"not json", b"[]", b"{}", br#"{"ciphertext":"AAAA"}"#, br#"{"salt":"AAAA"}"#];
        for bad in cases {
            assert!(matches!(v.open_package(bad, &key_b), Err(Bb84Error::Parse(_))), "{bad:?}");
        }
    }

    #[test]
    fn unknown_fields_are_rejected() {
        let (key_a, key_b) = keys(8);
        let container = packager().build_package(b"data", &key_a, &key_b, "a").unwrap();
        let extended = with_field(&container, "extension", Some(Value::from("exe")));
        assert!(matches!(verifier().open_package(&extended, &key_b), Err(Bb84Error::Parse(_))));
    }

    #[test]
    fn missing_signature_fields_are_authenticity_errors() {
        let (key_a, key_b) = keys(9);
        let container = packager().build_package(b"data", &key_a, &key_b, "a").unwrap();
        for field in ["pq_signature", "pq_public_key"] {
            let stripped = with_field(&container, field, None);
            assert!(matches!(
                verifier().open_package(&stripped, &key_b),
                Err(Bb84Error::Authenticity(_))
            ));
        }
        let nulled = with_field(&container, "pq_signature", Some(Value::Null));
        assert!(matches!(
            verifier().open_package(&nulled, &key_b),
            Err(Bb84Error::Authenticity(_))
        ));
    }

    #[test]
    fn tampering_is_detected_before_decryption() {
        let (key_a, key_b) = keys(10);
        let container = packager().build_package(b"tamper me", &key_a, &key_b, "t.txt").unwrap();
        let map = fields(&container);

        let flips = [
            ("ciphertext", 0),
            ("ciphertext", 20),
            ("salt", 15),
            ("pq_signature", 100),
            ("pq_public_key", 5),
        ];
        for (field, index) in flips {
            let original = map[field].as_str().unwrap();
            let flipped = Value::from(flip_base64_byte(original, index));
            let tampered = with_field(&container, field, Some(flipped));
            let err = verifier().open_package(&tampered, &key_b).unwrap_err();
            assert!(matches!(err, Bb84Error::Authenticity(_)), "{field}[{index}]: {err:?}");
        }

        let garbage = with_field(&container, "pq_signature", Some(Value::from("%%%")));
        assert!(matches!(
            verifier().open_package(&garbage, &key_b),
            Err(Bb84Error::Authenticity(_))
        ));
    }

    #[test]
    fn resigned_bad_padding_is_a_decryption_error() {
        let (key_a, key_b) = keys(11);
        let container = packager().build_package(b"pad", &key_a, &key_b, "p").unwrap();
        let map = fields(&container);
        // Corrupt the ciphertext and re-sign so the signature check passes.
        let mut raw = STANDARD.decode(map["ciphertext"].as_str().unwrap()).unwrap();
        let last_prev = raw.len() - 17;
        raw[last_prev] ^= 0x80;
        let resigned = resign(&STANDARD.encode(raw), map["salt"].as_str().unwrap());
        assert!(matches!(
            verifier().open_package(&resigned, &key_b),
            Err(Bb84Error::Decryption(_))
        ));
    }

    #[test]
    fn resigned_bad_salt_is_a_parse_error() {
        let (key_a, key_b) = keys(12);
        let container = packager().build_package(b"salt", &key_a, &key_b, "s").unwrap();
        let map = fields(&container);
        let resigned = resign(map["ciphertext"].as_str().unwrap(), &STANDARD.encode([0u8; 8]));
        assert!(matches!(verifier().open_package(&resigned, &key_b), Err(Bb84Error::Parse(_))));
    }

    #[test]
    fn embedded_key_mismatch_is_reported_even_when_decryption_succeeds() {
        // Sender encrypts under `key_b` but embeds a different sender key;
        // signature and padding both check out for the recipient.
        let (key_a, key_b) = keys(13);
        let (other_a, _) = keys(14);
        assert_ne!(key_a.to_bytes(), other_a.to_bytes());

        let derived = derive_key(&key_b, None, FAST);
        let payload = InternalPayload {
            file_bytes_b64: STANDARD.encode(b"forged"),
            key_a_encoded: STANDARD.encode(other_a.to_bytes()),
            original_filename: "forged.txt".into(),
        };
        let encrypted = cipher::encrypt(&serde_json::to_vec(&payload).unwrap(), &derived);
        let forged = resign(&STANDARD.encode(encrypted), &STANDARD.encode(derived.salt()));

        assert_eq!(verifier().open_package(&forged, &key_b).unwrap_err(), Bb84Error::KeyMismatch);
    }

    /// Encrypts `inner` under `key_b` exactly as a sender would and signs
    /// the result, so only the payload stage can reject it.
    fn sealed_for(key_b: &BitSequence, inner: &[u8]) -> Vec<u8> {
        let derived = derive_key(key_b, None, FAST);
        let encrypted = cipher::encrypt(inner, &derived);
        resign(&STANDARD.encode(encrypted), &STANDARD.encode(derived.salt()))
    }

    #[test]
    fn unreadable_payload_after_valid_padding_is_a_key_mismatch() {
        let (_, key_b) = keys(19);
        let sealed = sealed_for(&key_b, b"\x93 definitely not a json payload");
        assert_eq!(verifier().open_package(&sealed, &key_b).unwrap_err(), Bb84Error::KeyMismatch);
    }

    #[test]
    fn non_base64_embedded_key_is_a_key_mismatch() {
        let (_, key_b) = keys(20);
        let payload = serde_json::json!({
            "file_bytes_b64": STANDARD.encode(b"data"),
            "key_a_encoded": "%%%",
            "original_filename": "k.txt",
        });
        let sealed = sealed_for(&key_b, &serde_json::to_vec(&payload).unwrap());
        assert_eq!(verifier().open_package(&sealed, &key_b).unwrap_err(), Bb84Error::KeyMismatch);
    }

    #[test]
    fn trailing_zeros_within_the_last_byte_open_the_same_package() {
        // Keys are compared in packed form, so "1010" and "10100" both pack to 0xA0.
        let key: BitSequence = "1010".parse().unwrap();
        let container = packager().build_package(b"padded", &key, &key, "p.txt").unwrap();

        let padded: BitSequence = "10100".parse().unwrap();
        assert_eq!(verifier().open_package(&container, &padded).unwrap().plaintext, b"padded");

        let next_byte: BitSequence = "101000000".parse().unwrap();
        let err = verifier().open_package(&container, &next_byte).unwrap_err();
        assert!(matches!(err, Bb84Error::Decryption(_) | Bb84Error::KeyMismatch), "{err:?}");
    }

    #[test]
    fn wrong_recipient_key_never_yields_plaintext() {
        let (key_a, key_b) = keys(15);
        let container = packager().build_package(b"secret", &key_a, &key_b, "s.txt").unwrap();
        for seed in 100..110 {
            let (_, wrong_b) = keys(seed);
            let err = verifier().open_package(&container, &wrong_b).unwrap_err();
            assert!(matches!(err, Bb84Error::Decryption(_) | Bb84Error::KeyMismatch), "{err:?}");
        }
    }

    #[test]
    fn iteration_mismatch_is_rejected() {
        let (key_a, key_b) = keys(16);
        let container = packager().build_package(b"iters", &key_a, &key_b, "i").unwrap();
        let err = Verifier::new(pq(), FAST + 1).open_package(&container, &key_b).unwrap_err();
        assert!(matches!(err, Bb84Error::Decryption(_) | Bb84Error::KeyMismatch));
    }

    #[test]
    fn payload_without_filename_uses_fallback() {
        let (_, key_b) = keys(17);
        let derived = derive_key(&key_b, None, FAST);
        let payload = serde_json::json!({
            "file_bytes_b64": STANDARD.encode(b"legacy"),
            "key_a_encoded": STANDARD.encode(key_b.to_bytes()),
        });
        let encrypted = cipher::encrypt(&serde_json::to_vec(&payload).unwrap(), &derived);
        let container = resign(&STANDARD.encode(encrypted), &STANDARD.encode(derived.salt()));

        let opened = verifier().open_package(&container, &key_b).unwrap();
        assert_eq!(opened.plaintext, b"legacy");
        assert_eq!(opened.metadata.original_filename, FALLBACK_FILENAME);
        assert_eq!(opened.metadata.extension, "bin");
    }

    #[test]
    fn metadata_extension_derivation() {
        let cases = [
            ("greeting.txt", "txt"),
            ("archive.tar.gz", "gz"),
            ("Makefile", "bin"),
            (".bashrc", "bin"),
            ("trailing.", "bin"),
        ];
        for (name, ext) in cases {
            assert_eq!(PackageMetadata::from_filename(name.to_string()).extension, ext, "{name}");
        }
    }

    #[test]
    fn container_accessors() {
        let (key_a, key_b) = keys(18);
        let bytes = packager().build_package(b"a", &key_a, &key_b, "a").unwrap();
        let container = Container::from_slice(&bytes).unwrap();
        assert!(container.is_signed());
        assert_eq!(container.to_bytes().unwrap(), bytes);
        assert!(!container.ciphertext().is_empty());
        assert!(!container.salt().is_empty());
    }
}
