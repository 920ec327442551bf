//! Hash function wrappers
//! SHA-256 / SHA-1 from the sha2 / sha1 crates, RIPEMD-160 from the ripemd crate.

use ripemd::Ripemd160;
use sha1::Sha1;
use sha2::{Digest, Sha256};

/// Compute SHA-256 hash
pub fn sha256(data: &[u8]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hasher.finalize().into()
}

/// Double SHA-256 (used in Bitcoin)
pub fn hash256(data: &[u8]) -> [u8; 32] {
    sha256(&sha256(data))
}

/// Compute RIPEMD-160 hash
pub fn ripemd160(data: &[u8]) -> [u8; 20] {
    Ripemd160::digest(data).into()
}

/// HASH160 = RIPEMD160(SHA256(x))
pub fn hash160(data: &[u8]) -> [u8; 20] {
    ripemd160(&sha256(data))
}

/// Compute SHA-1 hash (only reachable through OP_SHA1)
pub fn sha1(data: &[u8]) -> [u8; 20] {
    Sha1::digest(data).into()
}
