//! Bitcoin Script implementation
//! Reference: https://en.bitcoin.it/wiki/Script

use std::collections::VecDeque;
use std::fmt;
use std::io::{self, Cursor, Read};

use log::{debug, info};
use num_bigint::BigInt;

use crate::error::{Error, Result};
use crate::hash::hash160;
use crate::keys::{Network, h160_to_p2pkh_address, h160_to_p2sh_address};
use crate::op::{
    OP_0, OP_CHECKSIG, OP_DUP, OP_EQUAL, OP_EQUALVERIFY, OP_HASH160, OP_PUSHDATA1, OP_PUSHDATA2,
    Operation, Stack, TxContext, op_code_name, operation,
};

/// Largest data element a script may carry
pub const MAX_SCRIPT_ELEMENT_SIZE: usize = 520;

/// Script instruction - either an opcode or data bytes
///
/// An empty `Data` push is the same instruction as `Opcode(OP_0)`: both
/// serialize to `0x00`, compare equal, and evaluate the same way.
#[derive(Debug, Clone)]
pub enum Instruction {
    Opcode(u8),
    Data(Vec<u8>),
}

impl Instruction {
    /// The bytes this instruction pushes, if it is a push
    pub fn push_data(&self) -> Option<&[u8]> {
        match self {
            Instruction::Data(data) => Some(data),
            Instruction::Opcode(OP_0) => Some(&[]),
            Instruction::Opcode(_) => None,
        }
    }
}

impl PartialEq for Instruction {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Instruction::Opcode(a), Instruction::Opcode(b)) => a == b,
            _ => self.push_data() == other.push_data(),
        }
    }
}

impl Eq for Instruction {}

/// Bitcoin Script
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Script {
    pub instructions: Vec<Instruction>,
}

impl Script {
    pub fn new(instructions: Vec<Instruction>) -> Self {
        Script { instructions }
    }

    pub fn empty() -> Self {
        Script::default()
    }

    /// Parse a varint-prefixed script
    pub fn parse(cursor: &mut Cursor<&[u8]>) -> Result<Self> {
        let length = decode_varint(cursor)
            .map_err(|e| Error::ScriptParse(format!("failed to read length: {e}")))?;
        let length = usize::try_from(length)
            .map_err(|_| Error::ScriptParse(format!("length {length} too large")))?;
        Self::parse_body(cursor, length)
    }

    /// Parse a script body with no length prefix, e.g. a redeem script
    pub fn parse_raw(raw: &[u8]) -> Result<Self> {
        let mut cursor = Cursor::new(raw);
        Self::parse_body(&mut cursor, raw.len())
    }

    fn parse_body(cursor: &mut Cursor<&[u8]>, length: usize) -> Result<Self> {
        let mut instructions = Vec::new();
        let mut count = 0usize;

        while count < length {
            let current = read_byte(cursor, "opcode")?;
            count += 1;

            let data_len = match current {
                // Data push of 1-75 bytes
                1..=75 => current as usize,
                OP_PUSHDATA1 => {
                    count += 1;
                    read_byte(cursor, "OP_PUSHDATA1 length")? as usize
                }
                OP_PUSHDATA2 => {
                    let mut len_bytes = [0u8; 2];
                    cursor.read_exact(&mut len_bytes).map_err(|_| {
                        Error::ScriptParse("failed to read OP_PUSHDATA2 length".into())
                    })?;
                    count += 2;
                    u16::from_le_bytes(len_bytes) as usize
                }
                opcode => {
                    instructions.push(Instruction::Opcode(opcode));
                    continue;
                }
            };
            if data_len > MAX_SCRIPT_ELEMENT_SIZE {
                return Err(Error::ScriptParse(format!(
                    "data element of {data_len} bytes exceeds {MAX_SCRIPT_ELEMENT_SIZE}"
                )));
            }

            let mut buf = vec![0u8; data_len];
            cursor.read_exact(&mut buf).map_err(|_| {
                Error::ScriptParse(format!("failed to read {data_len} bytes of data"))
            })?;
            count += data_len;
            instructions.push(Instruction::Data(buf));
        }

        if count != length {
            return Err(Error::ScriptParse(format!(
                "length mismatch: declared {length}, consumed {count}"
            )));
        }

        Ok(Script { instructions })
    }

    /// Serialize without the length prefix
    pub fn raw_serialize(&self) -> Result<Vec<u8>> {
        let mut out = Vec::new();

        for instruction in &self.instructions {
            match instruction {
                Instruction::Opcode(opcode) => out.push(*opcode),
                Instruction::Data(data) => {
                    let length = data.len();
                    if length <= 75 {
                        out.push(length as u8);
                    } else if length <= 0xff {
                        out.push(OP_PUSHDATA1);
                        out.push(length as u8);
                    } else if length <= MAX_SCRIPT_ELEMENT_SIZE {
                        out.push(OP_PUSHDATA2);
                        out.extend_from_slice(&(length as u16).to_le_bytes());
                    } else {
                        return Err(Error::ScriptEncode(format!(
                            "data element of {length} bytes exceeds {MAX_SCRIPT_ELEMENT_SIZE}"
                        )));
                    }
                    out.extend_from_slice(data);
                }
            }
        }

        Ok(out)
    }

    /// Serialize with the varint length prefix
    pub fn serialize(&self) -> Result<Vec<u8>> {
        let raw = self.raw_serialize()?;
        let mut result = encode_varint(raw.len() as u64);
        result.extend(raw);
        Ok(result)
    }

    /// Concatenate two scripts
    pub fn concat(&self, other: &Script) -> Script {
        let mut instructions = self.instructions.clone();
        instructions.extend(other.instructions.iter().cloned());
        Script { instructions }
    }

    /// Evaluate against the sighash `z` with no transaction context, so the
    /// locktime opcodes always fail.
    pub fn evaluate(&self, z: &BigInt) -> Result<bool> {
        self.evaluate_in(z, None)
    }

    /// Run the script. A failing opcode or a false final stack is `Ok(false)`;
    /// only a P2SH redeem script that does not parse is an error.
    pub fn evaluate_in(&self, z: &BigInt, ctx: Option<&TxContext>) -> Result<bool> {
        let mut instructions: VecDeque<Instruction> = self.instructions.iter().cloned().collect();
        let mut stack = Stack::new();
        let mut altstack = Stack::new();

        while let Some(instruction) = instructions.pop_front() {
            let data = match instruction {
                Instruction::Data(data) => data,
                Instruction::Opcode(OP_0) => Vec::new(),
                Instruction::Opcode(opcode) => {
                    if !execute(opcode, &mut stack, &mut altstack, &mut instructions, z, ctx) {
                        debug!("bad op: {}", op_code_name(opcode));
                        return Ok(false);
                    }
                    continue;
                }
            };

            let Some(h160) = take_p2sh_tail(&mut instructions) else {
                stack.push(data);
                continue;
            };
            // OP_HASH160 <h160> OP_EQUAL OP_VERIFY on the redeem script
            if hash160(&data)[..] != h160[..] {
                info!("bad p2sh h160");
                return Ok(false);
            }
            let redeem = Script::parse_raw(&data)?;
            instructions.extend(redeem.instructions);
        }

        Ok(matches!(stack.pop(), Some(top) if !top.is_empty()))
    }

    /// OP_DUP OP_HASH160 <20 bytes> OP_EQUALVERIFY OP_CHECKSIG
    pub fn is_p2pkh_script_pubkey(&self) -> bool {
        matches!(
            self.instructions.as_slice(),
            [
                Instruction::Opcode(OP_DUP),
                Instruction::Opcode(OP_HASH160),
                Instruction::Data(h160),
                Instruction::Opcode(OP_EQUALVERIFY),
                Instruction::Opcode(OP_CHECKSIG),
            ] if h160.len() == 20
        )
    }

    /// OP_HASH160 <20 bytes> OP_EQUAL
    pub fn is_p2sh_script_pubkey(&self) -> bool {
        matches!(
            self.instructions.as_slice(),
            [
                Instruction::Opcode(OP_HASH160),
                Instruction::Data(h160),
                Instruction::Opcode(OP_EQUAL),
            ] if h160.len() == 20
        )
    }

    /// Base58Check address of a P2PKH or P2SH script pubkey
    pub fn address(&self, network: Network) -> Result<String> {
        if self.is_p2pkh_script_pubkey() {
            if let Instruction::Data(h160) = &self.instructions[2] {
                return Ok(h160_to_p2pkh_address(&to_h160(h160)?, network));
            }
        } else if self.is_p2sh_script_pubkey() {
            if let Instruction::Data(h160) = &self.instructions[1] {
                return Ok(h160_to_p2sh_address(&to_h160(h160)?, network));
            }
        }
        Err(Error::InvalidFormat(format!(
            "no address for script pubkey: {self}"
        )))
    }
}

/// Pay-to-pubkey-hash script pubkey
pub fn p2pkh_script(h160: &[u8; 20]) -> Script {
    Script::new(vec![
        Instruction::Opcode(OP_DUP),
        Instruction::Opcode(OP_HASH160),
        Instruction::Data(h160.to_vec()),
        Instruction::Opcode(OP_EQUALVERIFY),
        Instruction::Opcode(OP_CHECKSIG),
    ])
}

/// Pay-to-script-hash script pubkey
pub fn p2sh_script(h160: &[u8; 20]) -> Script {
    Script::new(vec![
        Instruction::Opcode(OP_HASH160),
        Instruction::Data(h160.to_vec()),
        Instruction::Opcode(OP_EQUAL),
    ])
}

fn to_h160(bytes: &[u8]) -> Result<[u8; 20]> {
    <[u8; 20]>::try_from(bytes)
        .map_err(|_| Error::InvalidFormat(format!("expected 20 bytes, got {}", bytes.len())))
}

fn execute(
    opcode: u8,
    stack: &mut Stack,
    altstack: &mut Stack,
    instructions: &mut VecDeque<Instruction>,
    z: &BigInt,
    ctx: Option<&TxContext>,
) -> bool {
    let Some(operation) = operation(opcode) else {
        return false;
    };
    match operation {
        Operation::Stack(f) => f(stack),
        Operation::Branch(f) => f(stack, instructions),
        Operation::AltStack(f) => f(stack, altstack),
        Operation::Signature(f) => f(stack, z),
        Operation::Context(f) => ctx.is_some_and(|ctx| f(stack, ctx)),
    }
}

/// If the rest of the program is exactly `OP_HASH160 <20 bytes> OP_EQUAL`,
/// consumes it and returns the hash
fn take_p2sh_tail(instructions: &mut VecDeque<Instruction>) -> Option<Vec<u8>> {
    if instructions.len() != 3 {
        return None;
    }
    let h160 = match (&instructions[0], &instructions[1], &instructions[2]) {
        (
            Instruction::Opcode(OP_HASH160),
            Instruction::Data(h160),
            Instruction::Opcode(OP_EQUAL),
        ) if h160.len() == 20 => h160.clone(),
        _ => return None,
    };
    instructions.clear();
    Some(h160)
}

impl fmt::Display for Script {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self
            .instructions
            .iter()
            .map(|instruction| match instruction {
                Instruction::Opcode(op) => op_code_name(*op),
                Instruction::Data(data) if data.is_empty() => op_code_name(OP_0),
                Instruction::Data(data) => hex::encode(data),
            })
            .collect();
        write!(f, "{}", parts.join(" "))
    }
}

impl std::ops::Add for Script {
    type Output = Script;

    fn add(self, other: Script) -> Script {
        self.concat(&other)
    }
}

impl std::ops::Add for &Script {
    type Output = Script;

    fn add(self, other: &Script) -> Script {
        self.concat(other)
    }
}

fn read_byte(cursor: &mut Cursor<&[u8]>, what: &str) -> Result<u8> {
    let mut buf = [0u8; 1];
    cursor
        .read_exact(&mut buf)
        .map_err(|_| Error::ScriptParse(format!("failed to read {what}")))?;
    Ok(buf[0])
}

/// Decode a variable-length integer
pub fn decode_varint(cursor: &mut Cursor<&[u8]>) -> io::Result<u64> {
    let mut buf = [0u8; 1];
    cursor.read_exact(&mut buf)?;

    match buf[0] {
        0xfd => decode_int(cursor, 2),
        0xfe => decode_int(cursor, 4),
        0xff => decode_int(cursor, 8),
        n => Ok(n as u64),
    }
}

/// Encode a variable-length integer
pub fn encode_varint(n: u64) -> Vec<u8> {
    if n < 0xfd {
        vec![n as u8]
    } else if n < 0x10000 {
        let mut result = vec![0xfd];
        result.extend_from_slice(&(n as u16).to_le_bytes());
        result
    } else if n < 0x100000000 {
        let mut result = vec![0xfe];
        result.extend_from_slice(&(n as u32).to_le_bytes());
        result
    } else {
        let mut result = vec![0xff];
        result.extend_from_slice(&n.to_le_bytes());
        result
    }
}

/// Decode a little-endian integer of `nbytes` (at most 8) bytes
pub fn decode_int(cursor: &mut Cursor<&[u8]>, nbytes: usize) -> io::Result<u64> {
    let mut buf = [0u8; 8];
    cursor.read_exact(&mut buf[..nbytes.min(8)])?;
    Ok(u64::from_le_bytes(buf))
}

/// Encode a little-endian integer
pub fn encode_int(n: u64, nbytes: usize) -> Vec<u8> {
    n.to_le_bytes()[..nbytes.min(8)].to_vec()
}
