//! Elliptic Curve Digital Signature Algorithm (ECDSA)
//! Functions that sign/verify digital signatures and related utilities

use std::fmt;
use std::io::{Cursor, Read};

use num_bigint::{BigInt, Sign};
use num_integer::Integer;
use num_traits::{One, Signed, Zero};
use rand::RngCore;

use crate::bitcoin::{BITCOIN, S256Point};
use crate::error::{Error, Result};
use crate::keys::gen_secret_key_with;

/// ECDSA Signature (r, s)
///
/// Both components are kept in `[0, N)`, which bounds each DER integer to
/// 33 bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Signature {
    r: BigInt,
    s: BigInt,
}

impl Signature {
    pub fn new(r: BigInt, s: BigInt) -> Result<Self> {
        let n = &BITCOIN.generator.n;
        for (name, value) in [("r", &r), ("s", &s)] {
            if value.is_negative() || value >= n {
                return Err(Error::SignatureParse(format!("{name} out of range")));
            }
        }
        Ok(Signature { r, s })
    }

    #[inline]
    pub fn r(&self) -> &BigInt {
        &self.r
    }

    #[inline]
    pub fn s(&self) -> &BigInt {
        &self.s
    }

    /// Decode from DER format
    /// Format: 0x30 [total-length] 0x02 [R-length] [R] 0x02 [S-length] [S]
    pub fn parse(der: &[u8]) -> Result<Self> {
        let mut cursor = Cursor::new(der);

        if read_byte(&mut cursor, "marker")? != 0x30 {
            return Err(Error::SignatureParse("invalid DER marker".into()));
        }

        let total_len = read_byte(&mut cursor, "length")? as usize;
        if total_len + 2 != der.len() {
            return Err(Error::SignatureParse("invalid DER length".into()));
        }

        let r = read_der_int(&mut cursor, "R")?;
        let s = read_der_int(&mut cursor, "S")?;

        if cursor.position() as usize != der.len() {
            return Err(Error::SignatureParse("DER length mismatch".into()));
        }

        Signature::new(r, s)
    }

    /// Encode to DER format
    #[must_use]
    pub fn der(&self) -> Vec<u8> {
        let r_bytes = encode_int(&self.r);
        let s_bytes = encode_int(&self.s);

        let mut content = Vec::with_capacity(4 + r_bytes.len() + s_bytes.len());
        content.push(0x02);
        content.push(r_bytes.len() as u8);
        content.extend(&r_bytes);
        content.push(0x02);
        content.push(s_bytes.len() as u8);
        content.extend(&s_bytes);

        let mut result = Vec::with_capacity(2 + content.len());
        result.push(0x30);
        result.push(content.len() as u8);
        result.extend(content);

        result
    }
}

impl fmt::Display for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Signature({:x},{:x})", self.r, self.s)
    }
}

fn read_byte(cursor: &mut Cursor<&[u8]>, what: &str) -> Result<u8> {
    let mut buf = [0u8; 1];
    cursor
        .read_exact(&mut buf)
        .map_err(|_| Error::SignatureParse(format!("failed to read {what}")))?;
    Ok(buf[0])
}

/// Reads one `0x02 len bytes` integer
fn read_der_int(cursor: &mut Cursor<&[u8]>, name: &str) -> Result<BigInt> {
    if read_byte(cursor, name)? != 0x02 {
        return Err(Error::SignatureParse(format!("invalid {name} marker")));
    }
    let len = read_byte(cursor, name)? as usize;
    let mut bytes = vec![0u8; len];
    cursor
        .read_exact(&mut bytes)
        .map_err(|_| Error::SignatureParse(format!("failed to read {name}")))?;
    Ok(BigInt::from_bytes_be(Sign::Plus, &bytes))
}

/// Minimal big-endian bytes, with a 0x00 prefix when the high bit is set
fn encode_int(n: &BigInt) -> Vec<u8> {
    // to_bytes_be is already minimal; zero comes back as [0]
    let (_, mut bytes) = n.to_bytes_be();

    // Prepend 0x00 if first byte >= 0x80 (to indicate positive number)
    if bytes[0] >= 0x80 {
        bytes.insert(0, 0x00);
    }

    bytes
}

/// Sign the message hash `z` with a secret key, drawing the nonce from the
/// thread-local RNG.
#[must_use]
pub fn sign(secret: &BigInt, z: &BigInt) -> Signature {
    sign_with_rng(secret, z, &mut rand::rng())
}

/// Sign the message hash `z` with a secret key, drawing the nonce from `rng`.
///
/// The result is normalised to low S.
pub fn sign_with_rng<R: RngCore + ?Sized>(secret: &BigInt, z: &BigInt, rng: &mut R) -> Signature {
    let n = &BITCOIN.generator.n;
    let g = S256Point::generator();
    let half_n = n / BigInt::from(2);

    loop {
        let k = gen_secret_key_with(n, rng);
        let Some(x) = g.mul(&k).x().cloned() else {
            continue;
        };
        let r = x.mod_floor(n);
        if r.is_zero() {
            continue;
        }

        // 1/k = k^(N-2) mod N
        let k_inv = k.modpow(&(n - BigInt::from(2)), n);
        let mut s = ((z + &r * secret) * k_inv).mod_floor(n);
        if s.is_zero() {
            continue;
        }
        if s > half_n {
            s = n - &s;
        }
        return Signature { r, s };
    }
}

/// Verify a signature
///
/// Returns `true` if the signature is valid for the given public key and message hash.
#[must_use]
pub fn verify(point: &S256Point, z: &BigInt, sig: &Signature) -> bool {
    let n = &BITCOIN.generator.n;

    // Basic validation
    if sig.r < BigInt::one() || &sig.r >= n || sig.s < BigInt::one() || &sig.s >= n {
        return false;
    }
    if point.is_infinity() {
        return false;
    }

    // 1/s = s^(N-2) mod N
    let s_inv = sig.s.modpow(&(n - BigInt::from(2)), n);
    let u = (z * &s_inv).mod_floor(n);
    let v = (&sig.r * &s_inv).mod_floor(n);

    // u*G + v*P should have as the x coordinate, r
    let total = &S256Point::generator().mul(&u) + &point.mul(&v);
    match total.x() {
        Some(x) => x.mod_floor(n) == sig.r,
        None => false,
    }
}
