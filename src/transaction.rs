//! The Transaction object in Bitcoin
//! Reference: https://en.bitcoin.it/wiki/Transaction

use std::collections::HashMap;
use std::fmt;
use std::io::{self, Cursor, Read};

use log::{debug, trace, warn};
use num_bigint::{BigInt, Sign};
use rand::RngCore;

use crate::error::{Error, Result};
use crate::hash::hash256;
use crate::keys::{Network, PrivateKey};
use crate::op::TxContext;
use crate::script::{
    Instruction, Script, decode_int, decode_varint, encode_int, encode_varint,
};

/// The only sighash type supported for signing and verification
pub const SIGHASH_ALL: u32 = 1;

/// Sequence of a new input; disables locktime for it
pub const DEFAULT_SEQUENCE: u32 = 0xffff_ffff;

/// Looks up outputs of earlier transactions. Spending an input needs the
/// amount and script pubkey of the output it refers to.
pub trait OutputResolver {
    /// `txid` is in display (big-endian) order, as shown by [`Tx::id`]
    fn get_output(&self, txid: &[u8; 32], index: u32) -> Result<TxOut>;
}

/// Resolver over outputs held in memory
#[derive(Debug, Clone, Default)]
pub struct MemoryResolver {
    outputs: HashMap<([u8; 32], u32), TxOut>,
}

impl MemoryResolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers every output of `tx` under its txid
    pub fn add_tx(&mut self, tx: &Tx) -> Result<()> {
        let txid = tx.hash()?;
        for (index, tx_out) in tx.tx_outs.iter().enumerate() {
            let index = u32::try_from(index)
                .map_err(|_| Error::InvalidFormat("too many outputs".into()))?;
            self.outputs.insert((txid, index), tx_out.clone());
        }
        Ok(())
    }

    pub fn add_output(&mut self, txid: [u8; 32], index: u32, tx_out: TxOut) {
        self.outputs.insert((txid, index), tx_out);
    }

    pub fn len(&self) -> usize {
        self.outputs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.outputs.is_empty()
    }
}

impl OutputResolver for MemoryResolver {
    fn get_output(&self, txid: &[u8; 32], index: u32) -> Result<TxOut> {
        self.outputs
            .get(&(*txid, index))
            .cloned()
            .ok_or_else(|| Error::unresolved(txid, index))
    }
}

fn tx_err(what: &'static str) -> impl Fn(io::Error) -> Error {
    move |e| Error::TxParse(format!("failed to read {what}: {e}"))
}

/// Bitcoin Transaction (legacy serialization)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tx {
    pub version: u32,
    pub tx_ins: Vec<TxIn>,
    pub tx_outs: Vec<TxOut>,
    pub locktime: u32,
    pub network: Network,
}

impl Tx {
    pub fn new(
        version: u32,
        tx_ins: Vec<TxIn>,
        tx_outs: Vec<TxOut>,
        locktime: u32,
        network: Network,
    ) -> Self {
        Tx {
            version,
            tx_ins,
            tx_outs,
            locktime,
            network,
        }
    }

    /// Parse a transaction from a stream
    pub fn parse(cursor: &mut Cursor<&[u8]>, network: Network) -> Result<Self> {
        let version = decode_int(cursor, 4).map_err(tx_err("version"))? as u32;

        let num_inputs = decode_varint(cursor).map_err(tx_err("input count"))?;
        if num_inputs == 0 {
            // a zero count is the segwit marker
            return Err(Error::TxParse(
                "segwit serialization is not supported".into(),
            ));
        }

        let mut tx_ins = Vec::new();
        for _ in 0..num_inputs {
            tx_ins.push(TxIn::parse(cursor)?);
        }

        let num_outputs = decode_varint(cursor).map_err(tx_err("output count"))?;
        let mut tx_outs = Vec::new();
        for _ in 0..num_outputs {
            tx_outs.push(TxOut::parse(cursor)?);
        }

        let locktime = decode_int(cursor, 4).map_err(tx_err("locktime"))? as u32;

        Ok(Tx {
            version,
            tx_ins,
            tx_outs,
            locktime,
            network,
        })
    }

    /// Parse a complete serialized transaction, rejecting trailing bytes
    pub fn parse_bytes(raw: &[u8], network: Network) -> Result<Self> {
        let mut cursor = Cursor::new(raw);
        let tx = Self::parse(&mut cursor, network)?;
        let consumed = cursor.position() as usize;
        if consumed != raw.len() {
            return Err(Error::TxParse(format!(
                "{} trailing bytes",
                raw.len() - consumed
            )));
        }
        Ok(tx)
    }

    /// Encode transaction to bytes
    pub fn serialize(&self) -> Result<Vec<u8>> {
        let mut out = encode_int(self.version as u64, 4);

        out.extend(encode_varint(self.tx_ins.len() as u64));
        for tx_in in &self.tx_ins {
            out.extend(tx_in.serialize()?);
        }

        out.extend(encode_varint(self.tx_outs.len() as u64));
        for tx_out in &self.tx_outs {
            out.extend(tx_out.serialize()?);
        }

        out.extend(encode_int(self.locktime as u64, 4));
        Ok(out)
    }

    /// hash256 of the serialization, reversed into display order
    pub fn hash(&self) -> Result<[u8; 32]> {
        let mut hash = hash256(&self.serialize()?);
        hash.reverse();
        Ok(hash)
    }

    /// Get transaction ID as hex
    pub fn id(&self) -> Result<String> {
        Ok(hex::encode(self.hash()?))
    }

    /// Sum of spent amounts minus sum of output amounts. May be negative.
    pub fn fee(&self, resolver: &dyn OutputResolver) -> Result<i128> {
        let mut input_total = 0i128;
        for tx_in in &self.tx_ins {
            input_total += i128::from(tx_in.value(resolver)?);
        }
        let output_total: i128 = self.tx_outs.iter().map(|o| i128::from(o.amount)).sum();
        Ok(input_total - output_total)
    }

    /// The integer a signature for input `input_index` commits to.
    ///
    /// Every other input's script sig is blanked; the signed input carries
    /// `redeem_script` when given, otherwise the script pubkey it spends.
    pub fn sig_hash(
        &self,
        input_index: usize,
        sighash_type: u32,
        redeem_script: Option<&Script>,
        resolver: &dyn OutputResolver,
    ) -> Result<BigInt> {
        if sighash_type != SIGHASH_ALL {
            return Err(Error::UnsupportedSighash(sighash_type));
        }
        if input_index >= self.tx_ins.len() {
            return Err(Error::InputIndex(input_index));
        }

        let mut modified = self.clone();
        for (i, tx_in) in modified.tx_ins.iter_mut().enumerate() {
            tx_in.script_sig = if i != input_index {
                Script::empty()
            } else if let Some(redeem) = redeem_script {
                redeem.clone()
            } else {
                tx_in.script_pubkey(resolver)?
            };
        }

        let mut s = modified.serialize()?;
        s.extend(encode_int(sighash_type as u64, 4));
        Ok(BigInt::from_bytes_be(Sign::Plus, &hash256(&s)))
    }

    /// Verify one input: run its script sig followed by the script pubkey it spends
    pub fn verify_input(&self, input_index: usize, resolver: &dyn OutputResolver) -> Result<bool> {
        let tx_in = self
            .tx_ins
            .get(input_index)
            .ok_or(Error::InputIndex(input_index))?;
        let script_pubkey = tx_in.script_pubkey(resolver)?;

        let redeem_script = if script_pubkey.is_p2sh_script_pubkey() {
            // the redeem script is the last element of the script sig
            match tx_in.script_sig.instructions.last().and_then(Instruction::push_data) {
                Some(raw) => Some(Script::parse_raw(raw)?),
                None => {
                    debug!("input {input_index}: p2sh spend without a redeem script");
                    return Ok(false);
                }
            }
        } else {
            None
        };

        let z = self.sig_hash(input_index, SIGHASH_ALL, redeem_script.as_ref(), resolver)?;
        let ctx = TxContext {
            version: self.version,
            locktime: self.locktime,
            sequence: tx_in.sequence,
        };
        let combined = &tx_in.script_sig + &script_pubkey;
        let valid = combined.evaluate_in(&z, Some(&ctx))?;
        if !valid {
            debug!("input {input_index} failed to verify");
        }
        Ok(valid)
    }

    /// Verify the whole transaction: no negative fee and every input valid
    pub fn verify(&self, resolver: &dyn OutputResolver) -> Result<bool> {
        let fee = self.fee(resolver)?;
        if fee < 0 {
            warn!("transaction spends {} more than its inputs", -fee);
            return Ok(false);
        }
        for i in 0..self.tx_ins.len() {
            if !self.verify_input(i, resolver)? {
                return Ok(false);
            }
        }
        Ok(true)
    }

    /// Sign a P2PKH input, drawing the nonce from the thread-local RNG
    pub fn sign_input(
        &mut self,
        input_index: usize,
        private_key: &PrivateKey,
        sighash_type: u32,
        resolver: &dyn OutputResolver,
    ) -> Result<bool> {
        self.sign_input_with_rng(
            input_index,
            private_key,
            sighash_type,
            resolver,
            &mut rand::rng(),
        )
    }

    /// Sign a P2PKH input with `<der || type> <compressed sec>`, then verify it
    pub fn sign_input_with_rng<R: RngCore + ?Sized>(
        &mut self,
        input_index: usize,
        private_key: &PrivateKey,
        sighash_type: u32,
        resolver: &dyn OutputResolver,
        rng: &mut R,
    ) -> Result<bool> {
        let z = self.sig_hash(input_index, sighash_type, None, resolver)?;
        trace!("signing input {input_index} over sighash {z:x}");

        let mut sig = private_key.sign_with_rng(&z, rng).der();
        sig.push(sighash_type as u8);
        let sec = private_key.point().sec(true);

        self.tx_ins[input_index].script_sig =
            Script::new(vec![Instruction::Data(sig), Instruction::Data(sec)]);
        self.verify_input(input_index, resolver)
    }

    /// Check if this is a coinbase transaction
    pub fn is_coinbase(&self) -> bool {
        self.tx_ins.len() == 1
            && self.tx_ins[0].prev_tx == [0u8; 32]
            && self.tx_ins[0].prev_index == 0xffffffff
    }

    /// Get coinbase height (BIP34)
    pub fn coinbase_height(&self) -> Option<u32> {
        if !self.is_coinbase() {
            return None;
        }
        let data = self.tx_ins[0]
            .script_sig
            .instructions
            .first()
            .and_then(Instruction::push_data)?;
        let mut bytes = [0u8; 4];
        let len = data.len().min(4);
        bytes[..len].copy_from_slice(&data[..len]);
        Some(u32::from_le_bytes(bytes))
    }
}

impl fmt::Display for Tx {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let id = self.id().unwrap_or_else(|_| "<unserializable>".into());
        writeln!(f, "tx: {id}")?;
        writeln!(f, "version: {}", self.version)?;
        writeln!(f, "tx_ins:")?;
        for tx_in in &self.tx_ins {
            writeln!(f, "{tx_in}")?;
        }
        writeln!(f, "tx_outs:")?;
        for tx_out in &self.tx_outs {
            writeln!(f, "{tx_out}")?;
        }
        write!(f, "locktime: {}", self.locktime)
    }
}

/// Transaction Input
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TxIn {
    /// Previous txid in display order; reversed on the wire
    pub prev_tx: [u8; 32],
    pub prev_index: u32,
    pub script_sig: Script,
    pub sequence: u32,
}

impl TxIn {
    /// An unsigned input with the default sequence
    pub fn new(prev_tx: [u8; 32], prev_index: u32) -> Self {
        TxIn {
            prev_tx,
            prev_index,
            script_sig: Script::empty(),
            sequence: DEFAULT_SEQUENCE,
        }
    }

    pub fn parse(cursor: &mut Cursor<&[u8]>) -> Result<Self> {
        let mut prev_tx = [0u8; 32];
        cursor
            .read_exact(&mut prev_tx)
            .map_err(tx_err("previous txid"))?;
        prev_tx.reverse();

        let prev_index = decode_int(cursor, 4).map_err(tx_err("previous index"))? as u32;
        let script_sig = Script::parse(cursor)?;
        let sequence = decode_int(cursor, 4).map_err(tx_err("sequence"))? as u32;

        Ok(TxIn {
            prev_tx,
            prev_index,
            script_sig,
            sequence,
        })
    }

    pub fn serialize(&self) -> Result<Vec<u8>> {
        let mut out = Vec::new();
        let mut prev_tx = self.prev_tx;
        prev_tx.reverse();
        out.extend_from_slice(&prev_tx);
        out.extend(encode_int(self.prev_index as u64, 4));
        out.extend(self.script_sig.serialize()?);
        out.extend(encode_int(self.sequence as u64, 4));
        Ok(out)
    }

    /// Amount of the output this input spends
    pub fn value(&self, resolver: &dyn OutputResolver) -> Result<u64> {
        Ok(resolver.get_output(&self.prev_tx, self.prev_index)?.amount)
    }

    /// Script pubkey of the output this input spends
    pub fn script_pubkey(&self, resolver: &dyn OutputResolver) -> Result<Script> {
        Ok(resolver
            .get_output(&self.prev_tx, self.prev_index)?
            .script_pubkey)
    }
}

impl fmt::Display for TxIn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", hex::encode(self.prev_tx), self.prev_index)
    }
}

/// Transaction Output
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TxOut {
    pub amount: u64,
    pub script_pubkey: Script,
}

impl TxOut {
    pub fn new(amount: u64, script_pubkey: Script) -> Self {
        TxOut {
            amount,
            script_pubkey,
        }
    }

    pub fn parse(cursor: &mut Cursor<&[u8]>) -> Result<Self> {
        let amount = decode_int(cursor, 8).map_err(tx_err("amount"))?;
        let script_pubkey = Script::parse(cursor)?;
        Ok(TxOut {
            amount,
            script_pubkey,
        })
    }

    pub fn serialize(&self) -> Result<Vec<u8>> {
        let mut out = encode_int(self.amount, 8);
        out.extend(self.script_pubkey.serialize()?);
        Ok(out)
    }
}

impl fmt::Display for TxOut {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.amount, self.script_pubkey)
    }
}
