//! Bitcoin transaction core - Rust implementation
//!
//! Finite fields and secp256k1, ECDSA, key and address encodings, a Script
//! interpreter with P2SH and multisig, and legacy transaction signing.

pub mod bitcoin;
pub mod curves;
pub mod ecdsa;
pub mod error;
pub mod field;
pub mod hash;
pub mod keys;
pub mod op;
pub mod script;
pub mod transaction;

pub use error::{Error, Result};

pub use bitcoin::{BITCOIN, S256Point};
pub use curves::{Curve, Generator, Point};
pub use ecdsa::{Signature, sign, verify};
pub use field::FieldElement;
pub use keys::{
    Network, PrivateKey, address_to_h160, b58decode, b58encode, decode_base58_checksum,
    encode_base58_checksum, h160_to_p2pkh_address, h160_to_p2sh_address,
};
pub use op::TxContext;
pub use script::{Instruction, Script, p2pkh_script, p2sh_script};
pub use transaction::{MemoryResolver, OutputResolver, SIGHASH_ALL, Tx, TxIn, TxOut};
