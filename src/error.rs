//! Unified error types for the library

use thiserror::Error;

/// Main error type for the library.
///
/// Script evaluation failures are deliberately absent: a script that does not
/// validate is an ordinary `Ok(false)`, not an error.
#[derive(Debug, Error)]
pub enum Error {
    #[error("{num} is not in field range 0 to {prime}")]
    FieldRange { num: String, prime: String },

    #[error("Cannot combine elements of different fields")]
    FieldMismatch,

    #[error("Points are not on the same curve")]
    Curve,

    #[error("({x}, {y}) is not on the curve")]
    NotOnCurve { x: String, y: String },

    #[error("Script parse error: {0}")]
    ScriptParse(String),

    #[error("Script encode error: {0}")]
    ScriptEncode(String),

    #[error("Signature parse error: {0}")]
    SignatureParse(String),

    #[error("SEC parse error: {0}")]
    SecParse(String),

    #[error("Base58 error: {0}")]
    Base58(String),

    #[error("Bad checksum")]
    BadChecksum,

    #[error("Transaction parse error: {0}")]
    TxParse(String),

    #[error("Unresolved input {txid}:{index}")]
    UnresolvedInput { txid: String, index: u32 },

    #[error("Input index {0} out of range")]
    InputIndex(usize),

    #[error("Unsupported sighash type {0}")]
    UnsupportedSighash(u32),

    #[error("Invalid format: {0}")]
    InvalidFormat(String),

    #[error("Hex error: {0}")]
    Hex(#[from] hex::FromHexError),
}

impl Error {
    pub(crate) fn unresolved(txid: &[u8; 32], index: u32) -> Self {
        Error::UnresolvedInput {
            txid: hex::encode(txid),
            index,
        }
    }
}

/// Result type alias for convenience
pub type Result<T> = std::result::Result<T, Error>;
