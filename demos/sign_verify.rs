//! ECDSA signature creation and verification
//!
//! Run with: cargo run --example sign_verify

use num_bigint::{BigInt, Sign};
use tx_script_core::hash::hash256;
use tx_script_core::{PrivateKey, Signature, verify};

fn message_hash(message: &[u8]) -> BigInt {
    BigInt::from_bytes_be(Sign::Plus, &hash256(message))
}

fn verdict(valid: bool) -> &'static str {
    if valid { "VALID" } else { "INVALID" }
}

fn main() -> tx_script_core::Result<()> {
    println!("=== ECDSA Sign & Verify ===\n");

    let alice = PrivateKey::generate();
    let bob = PrivateKey::generate();

    let message = b"Alice sends 1 BTC to Bob";
    println!("Message: {:?}\n", String::from_utf8_lossy(message));
    let z = message_hash(message);

    let signature = alice.sign(&z);
    let der = signature.der();
    println!("Signature: {signature}");
    println!("Signature (DER):");
    println!("  {}\n", hex::encode(&der));

    // what a verifier receives on the wire
    let parsed = Signature::parse(&der)?;

    println!(
        "Verify with Alice's key: {}",
        verdict(verify(alice.point(), &z, &parsed))
    );

    let bob_sig = bob.sign(&z);
    println!(
        "Verify Bob's sig with Alice's key: {}",
        verdict(verify(alice.point(), &z, &bob_sig))
    );

    let tampered = message_hash(b"Alice sends 100 BTC to Bob");
    println!(
        "Verify tampered message: {}",
        verdict(verify(alice.point(), &tampered, &parsed))
    );

    Ok(())
}
