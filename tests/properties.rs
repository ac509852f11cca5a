//! Property-based tests for the key exchange and container pipeline
//!
//! 1. **Sifting**: sifted keys have equal length L <= N and agree bit for bit
//! 2. **Derivation**: fixed bits and salt always stretch to the same 48 bytes
//! 3. **Integrity**: a derived key verifies only against the bits it came from
//! 4. **Round-trip**: a package opens with the receiver key from the same run
//! 5. **Tamper evidence**: any flipped byte is rejected, never silently opened
//! 6. **Key text**: bit strings survive both text encodings with leading zeros

use std::sync::Arc;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use bb84_vault::channel::{QUBIT_LOG_LIMIT, SiftStatus};
use bb84_vault::kdf::SALT_LEN;
use bb84_vault::{
    BitSequence, Bb84Error, ChannelSimulator, MlDsa87, Packager, SigningCapability, Verifier,
    decode_key, derive_key, encode_key, verify_key_integrity,
};
use proptest::prelude::*;
use rand::SeedableRng;
use rand::rngs::StdRng;
use serde_json::Value;

const ITERATIONS: u32 = 1_000;

fn pq() -> SigningCapability {
    SigningCapability::Available(Arc::new(MlDsa87))
}

fn sifted(seed: u64, length: usize) -> (BitSequence, BitSequence) {
    let (a, b, _) = ChannelSimulator::new(pq())
        .simulate_with_rng(&mut StdRng::seed_from_u64(seed), length, false)
        .unwrap()
        .into_parts();
    (a, b)
}

fn bit_sequence(max_len: usize) -> impl Strategy<Value = BitSequence> {
    prop::collection::vec(any::<bool>(), 0..max_len).prop_map(|bits| bits.into_iter().collect())
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn prop_sifted_keys_agree(seed in any::<u64>(), length in 1usize..400) {
        let sim = ChannelSimulator::new(pq())
            .simulate_with_rng(&mut StdRng::seed_from_u64(seed), length, false)
            .unwrap();

        prop_assert_eq!(sim.qubits, length);
        prop_assert!(sim.keys.len() <= length);
        prop_assert_eq!(sim.keys.key_a.len(), sim.keys.key_b.len());
        prop_assert_eq!(&sim.keys.key_a, &sim.keys.key_b);
        prop_assert_eq!(sim.qubit_log.len(), length.min(QUBIT_LOG_LIMIT));

        for record in &sim.qubit_log {
            let matched = record.alice_basis == record.bob_basis;
            prop_assert_eq!(record.status == SiftStatus::Match, matched);
            if matched {
                prop_assert_eq!(record.alice_bit, record.bob_result);
            }
        }
        // Every logged match is a key position, in order.
        let logged: Vec<bool> = sim.qubit_log
            .iter()
            .filter(|r| r.status == SiftStatus::Match)
            .map(|r| r.alice_bit == 1)
            .collect();
        let prefix: Vec<bool> = sim.keys.key_a.iter().take(logged.len()).collect();
        prop_assert_eq!(logged, prefix);
    }

    #[test]
    fn prop_bit_string_and_key_text(bits in bit_sequence(300)) {
        let text = bits.to_string();
        prop_assert_eq!(text.len(), bits.len());
        prop_assert_eq!(&text.parse::<BitSequence>().unwrap(), &bits);
        prop_assert_eq!(&decode_key(&encode_key(&bits)).unwrap(), &bits);

        let packed = bits.to_bytes();
        prop_assert_eq!(packed.len(), bits.len().div_ceil(8));
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(16))]

    #[test]
    fn prop_derivation_is_deterministic(
        bits in bit_sequence(256),
        salt in any::<[u8; SALT_LEN]>(),
    ) {
        let first = derive_key(&bits, Some(&salt), ITERATIONS);
        let second = derive_key(&bits, Some(&salt), ITERATIONS);
        prop_assert_eq!(*first.to_bytes(), *second.to_bytes());
        prop_assert_eq!(first.salt(), &salt);
    }

    #[test]
    fn prop_integrity_binds_key_to_bits(
        bits in bit_sequence(256),
        flip in any::<prop::sample::Index>(),
    ) {
        let derived = derive_key(&bits, None, ITERATIONS);
        prop_assert!(verify_key_integrity(&*derived.to_bytes(), &bits, ITERATIONS));

        prop_assume!(!bits.is_empty());
        let i = flip.index(bits.len());
        let other: BitSequence = bits
            .iter()
            .enumerate()
            .map(|(j, b)| if j == i { !b } else { b })
            .collect();
        prop_assert!(!verify_key_integrity(&*derived.to_bytes(), &other, ITERATIONS));
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(8))]

    #[test]
    fn prop_package_round_trip(
        seed in any::<u64>(),
        plaintext in prop::collection::vec(any::<u8>(), 0..2048),
        stem in "[a-z]{1,12}",
        ext in "[a-z0-9]{1,4}",
    ) {
        let (key_a, key_b) = sifted(seed, 128);
        let filename = format!("{stem}.{ext}");
        let container = Packager::new(pq(), ITERATIONS)
            .build_package(&plaintext, &key_a, &key_b, &filename)
            .unwrap();
        let opened = Verifier::new(pq(), ITERATIONS).open_package(&container, &key_b).unwrap();

        prop_assert_eq!(opened.plaintext, plaintext);
        prop_assert_eq!(opened.metadata.original_filename, filename);
        prop_assert_eq!(opened.metadata.extension, ext);
    }

    #[test]
    fn prop_flipped_byte_is_rejected(
        seed in any::<u64>(),
        field in prop::sample::select(vec!["ciphertext", "salt", "pq_signature"]),
        position in any::<prop::sample::Index>(),
        mask in 1u8..=255,
    ) {
        let (key_a, key_b) = sifted(seed, 128);
        let container = Packager::new(pq(), ITERATIONS)
            .build_package(b"tamper evident", &key_a, &key_b, "t.txt")
            .unwrap();

        let mut object: serde_json::Map<String, Value> =
            serde_json::from_slice(&container).unwrap();
        let mut raw = STANDARD.decode(object[field].as_str().unwrap()).unwrap();
        let i = position.index(raw.len());
        raw[i] ^= mask;
        object.insert(field.to_string(), Value::from(STANDARD.encode(raw)));
        let tampered = serde_json::to_vec(&object).unwrap();

        let result = Verifier::new(pq(), ITERATIONS).open_package(&tampered, &key_b);
        prop_assert!(
            matches!(result, Err(Bb84Error::Authenticity(_)) | Err(Bb84Error::Decryption(_))),
            "unexpected result: {:?}",
            result.map(|p| p.plaintext.len())
        );
    }
}
