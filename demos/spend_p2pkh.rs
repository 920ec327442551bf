//! Build, sign and verify a testnet P2PKH spend
//!
//! Run with: cargo run --example spend_p2pkh

use num_bigint::BigInt;
use tx_script_core::{
    MemoryResolver, Network, PrivateKey, SIGHASH_ALL, Tx, TxIn, TxOut, address_to_h160,
    p2pkh_script,
};

fn main() -> tx_script_core::Result<()> {
    println!("=== Spend a P2PKH Output ===\n");

    let key = PrivateKey::new(BigInt::from(8675309));
    println!("Spending key address: {}", key.point().address(true, Network::Test));

    let mut prev_tx = [0u8; 32];
    hex::decode_to_slice(
        "0d6fe5213c0b3291f208cba8bfb59b7476dffacc4e5cb66f6eb20a080843a299",
        &mut prev_tx,
    )?;
    let prev_index = 13;

    let mut resolver = MemoryResolver::new();
    resolver.add_output(
        prev_tx,
        prev_index,
        TxOut::new(44_000_000, p2pkh_script(&key.point().hash160(true))),
    );

    let change = address_to_h160("mzx5YhAH9kNHtcN481u6WkjeHjYtVeKVh2")?;
    let target = address_to_h160("mnrVtF8DWjMu839VW3rBfgYaAfKk8983Xf")?;
    let mut tx = Tx::new(
        1,
        vec![TxIn::new(prev_tx, prev_index)],
        vec![
            TxOut::new(33_000_000, p2pkh_script(&change)),
            TxOut::new(10_000_000, p2pkh_script(&target)),
        ],
        0,
        Network::Test,
    );

    println!("Unsigned: {}", hex::encode(tx.serialize()?));
    println!("Sighash:  {:x}\n", tx.sig_hash(0, SIGHASH_ALL, None, &resolver)?);

    let signed = tx.sign_input(0, &key, SIGHASH_ALL, &resolver)?;
    println!("Input signed and verified: {signed}");
    println!("Fee: {} satoshis", tx.fee(&resolver)?);
    println!("Signed:   {}\n", hex::encode(tx.serialize()?));
    println!("{tx}");

    Ok(())
}
