//! Demonstrate Bitcoin hash functions and Base58Check
//!
//! Run with: cargo run --example hash_demo

use tx_script_core::hash::{hash160, hash256, ripemd160, sha256};
use tx_script_core::keys::{decode_base58_checksum, encode_base58_checksum};
use tx_script_core::{Network, h160_to_p2pkh_address};

fn main() -> tx_script_core::Result<()> {
    println!("=== Bitcoin Hash Functions ===\n");

    let data = b"Hello, Bitcoin!";
    println!("Input: {:?}\n", String::from_utf8_lossy(data));

    println!("SHA-256:");
    println!("  {}\n", hex::encode(sha256(data)));

    // txids and checksums
    println!("HASH256 (double SHA-256):");
    println!("  {}\n", hex::encode(hash256(data)));

    println!("RIPEMD-160:");
    println!("  {}\n", hex::encode(ripemd160(data)));

    // pubkey and script hashes
    println!("HASH160 (RIPEMD160(SHA256(x))):");
    println!("  {}\n", hex::encode(hash160(data)));

    println!("=== Address Generation Flow ===\n");

    let pubkey_hex = "0357a4f368868a8a6d572991e484e664810ff14c05c0fa023275251151fe0e53d1";
    let pubkey = hex::decode(pubkey_hex)?;
    println!("1. Compressed Public Key:");
    println!("   {pubkey_hex}\n");

    let h160 = hash160(&pubkey);
    println!("2. HASH160:");
    println!("   {}\n", hex::encode(h160));

    let mut payload = vec![Network::Main.p2pkh_version()];
    payload.extend_from_slice(&h160);
    let address = encode_base58_checksum(&payload);
    println!("3. Base58Check(0x00 || hash160):");
    println!("   {address}\n");
    assert_eq!(address, h160_to_p2pkh_address(&h160, Network::Main));

    let decoded = decode_base58_checksum(&address)?;
    println!("4. Decoded payload:");
    println!("   {}", hex::encode(decoded));

    Ok(())
}
