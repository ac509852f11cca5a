// bb84-vault/demos/session.rs
//
// Walks through one sender/receiver exchange and a wrong-key attempt.
// Set RUST_LOG=debug to see which verification stage rejects a container.

use bb84_vault::{
    BitSequence, Config, Metrics, check_key_entropy, decrypt_file, encode_key, encrypt_file,
};
use std::error::Error;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

fn main() -> Result<(), Box<dyn Error>> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry().with(fmt::layer()).with(filter).init();

    println!("--- BB84 vault session ---");
    let config = Config::default();
    println!("    qubits: {}, PBKDF2 rounds: {}", config.qubits, config.kdf_iterations);

    // 1. Sender side
    let original = b"Hello from the quantum channel!";
    println!("\n[1] Encrypting {} bytes as 'greeting.txt'...", original.len());
    let mut enc_metrics = Metrics::new();
    let outcome = encrypt_file(original, "greeting.txt", &config, &mut enc_metrics)?;

    let key_b: BitSequence = outcome.key_b.parse()?;
    println!("    Sifted key length: {}", key_b.len());
    println!("    Key fingerprint:   {}", key_b.fingerprint());
    println!("    Key text:          {}", encode_key(&key_b));
    println!("    Balanced key:      {}", check_key_entropy(&key_b));
    println!("    Container (b64):   {} chars", outcome.package_b64.len());

    println!("\n    First positions of the exchange:");
    println!("    {:>4}  {:>3} {:>3} {:>3} {:>3}  status", "idx", "a", "Ba", "Bb", "b");
    for record in outcome.qubit_log.iter().take(8) {
        println!(
            "    {:>4}  {:>3} {:>3} {:>3} {:>3}  {:?}",
            record.index,
            record.alice_bit,
            record.alice_basis.symbol(),
            record.bob_basis.symbol(),
            record.bob_result,
            record.status
        );
    }
    print!("\n{enc_metrics}");

    // 2. Receiver side with the right key
    println!("\n[2] Decrypting with key B...");
    let mut dec_metrics = Metrics::new();
    let opened = decrypt_file(&outcome.package_b64, &outcome.key_b, &config, &mut dec_metrics)?;
    println!(
        "    Recovered '{}' ({}): {}",
        opened.metadata.original_filename,
        opened.metadata.extension,
        String::from_utf8_lossy(&opened.plaintext)
    );
    assert_eq!(opened.plaintext, original);
    print!("\n{dec_metrics}");

    // 3. Receiver side with a corrupted key
    println!("\n[3] Decrypting with a corrupted key...");
    let mut wrong = outcome.key_b.clone();
    if let Some(last) = wrong.pop() {
        wrong.push(if last == '0' { '1' } else { '0' });
    }
    match decrypt_file(&outcome.package_b64, &wrong, &config, &mut Metrics::new()) {
        Ok(_) => println!("    Unexpectedly opened the package!"),
        Err(e) => println!("    Rejected: {}", e.public_message()),
    }

    println!("\n--- Done ---");
    Ok(())
}
