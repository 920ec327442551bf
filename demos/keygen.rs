//! Generate Bitcoin keys, addresses and WIF strings
//!
//! Run with: cargo run --example keygen

use num_bigint::BigInt;
use tx_script_core::{Network, PrivateKey};

fn main() -> tx_script_core::Result<()> {
    println!("=== Bitcoin Key Generation ===\n");

    let key = PrivateKey::generate();
    let point = key.point();

    println!("Secret Key (hex):");
    println!("  {}\n", key.hex());

    println!("Public Key (compressed):");
    println!("  {}\n", hex::encode(point.sec(true)));

    println!("Public Key (uncompressed):");
    println!("  {}\n", hex::encode(point.sec(false)));

    println!("Bitcoin Addresses:");
    println!("  Mainnet: {}", point.address(true, Network::Main));
    println!("  Testnet: {}", point.address(true, Network::Test));

    let wif = key.wif(true, Network::Test);
    println!("\nWIF (testnet, compressed): {wif}");
    let (restored, compressed, network) = PrivateKey::from_wif(&wif)?;
    println!(
        "  round trip: {} ({}, compressed={compressed})",
        restored.secret() == key.secret(),
        network.name()
    );

    // Mastering Bitcoin example
    println!("\n=== Known Key Derivation ===\n");
    let known_sk = "3aba4162c7251c891207b747840551a71939b0de081f85c4e44cf7c13e41daa6";
    let secret = BigInt::parse_bytes(known_sk.as_bytes(), 16)
        .ok_or_else(|| tx_script_core::Error::InvalidFormat(known_sk.into()))?;
    let known = PrivateKey::new(secret);

    println!("Secret Key: {known_sk}");
    println!("Address:    {}", known.point().address(true, Network::Main));
    println!("Expected:   14cxpo3MBCYYWCgF74SWTdcmxipnGUsPw3");

    Ok(())
}
