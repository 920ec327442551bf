//! Bitcoin-specific functions, classes, utilities and parameters:
//! the secp256k1 curve and the point type specialised to it.

use std::fmt;
use std::ops::{Add, Mul};
use std::sync::LazyLock;

use num_bigint::{BigInt, Sign};
use num_integer::Integer;
use num_traits::{One, Zero};

use crate::curves::{Curve, Generator, Point};
use crate::ecdsa::{self, Signature};
use crate::error::{Error, Result};
use crate::field::FieldElement;
use crate::hash::hash160;
use crate::keys::{Network, h160_to_p2pkh_address};

const GX: [u8; 32] = [
    0x79, 0xbe, 0x66, 0x7e, 0xf9, 0xdc, 0xbb, 0xac, 0x55, 0xa0, 0x62, 0x95, 0xce, 0x87, 0x0b, 0x07,
    0x02, 0x9b, 0xfc, 0xdb, 0x2d, 0xce, 0x28, 0xd9, 0x59, 0xf2, 0x81, 0x5b, 0x16, 0xf8, 0x17, 0x98,
];

const GY: [u8; 32] = [
    0x48, 0x3a, 0xda, 0x77, 0x26, 0xa3, 0xc4, 0x65, 0x5d, 0xa4, 0xfb, 0xfc, 0x0e, 0x11, 0x08, 0xa8,
    0xfd, 0x17, 0xb4, 0x48, 0xa6, 0x85, 0x54, 0x19, 0x9c, 0x47, 0xd0, 0x8f, 0xfb, 0x10, 0xd4, 0xb8,
];

const ORDER: [u8; 32] = [
    0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xfe,
    0xba, 0xae, 0xdc, 0xe6, 0xaf, 0x48, 0xa0, 0x3b, 0xbf, 0xd2, 0x5e, 0x8c, 0xd0, 0x36, 0x41, 0x41,
];

/// Coin wrapper containing the curve parameters and a generator
#[derive(Debug, Clone)]
pub struct Coin {
    pub p: BigInt,
    pub curve: Curve,
    pub generator: Generator,
}

/// Create the Bitcoin generator (secp256k1)
fn bitcoin_gen() -> Coin {
    // Bitcoin uses secp256k1: http://www.oid-info.com/get/1.3.132.0.10
    // p = 2^256 - 2^32 - 977
    let p = (BigInt::one() << 256) - (BigInt::one() << 32) - BigInt::from(977);
    let a = FieldElement::reduce(&BigInt::zero(), &p);
    let b = FieldElement::reduce(&BigInt::from(7), &p);
    let gx = FieldElement::reduce(&BigInt::from_bytes_be(Sign::Plus, &GX), &p);
    let gy = FieldElement::reduce(&BigInt::from_bytes_be(Sign::Plus, &GY), &p);
    let n = BigInt::from_bytes_be(Sign::Plus, &ORDER);

    let curve = Curve { a, b };
    let g = Point::from_valid(gx, gy, curve.clone());
    Coin {
        p,
        curve,
        generator: Generator::new(g, n),
    }
}

/// Global Bitcoin configuration (secp256k1)
pub static BITCOIN: LazyLock<Coin> = LazyLock::new(bitcoin_gen);

/// A point on secp256k1. Scalars are reduced mod N before multiplying.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct S256Point(Point);

impl S256Point {
    /// Creates a point from raw coordinates, checking range and curve equation
    pub fn new(x: BigInt, y: BigInt) -> Result<Self> {
        let p = &BITCOIN.p;
        let x = FieldElement::new(x, p.clone())?;
        let y = FieldElement::new(y, p.clone())?;
        Ok(S256Point(Point::new(x, y, BITCOIN.curve.clone())?))
    }

    #[must_use]
    pub fn infinity() -> Self {
        S256Point(Point::infinity(BITCOIN.curve.clone()))
    }

    /// The generator G
    #[must_use]
    pub fn generator() -> Self {
        S256Point(BITCOIN.generator.g.clone())
    }

    /// Wraps a generic point, failing unless it lies on secp256k1
    pub fn from_point(point: Point) -> Result<Self> {
        if point.curve() != &BITCOIN.curve {
            return Err(Error::Curve);
        }
        Ok(S256Point(point))
    }

    #[inline]
    pub fn point(&self) -> &Point {
        &self.0
    }

    #[inline]
    pub fn is_infinity(&self) -> bool {
        self.0.is_infinity()
    }

    pub fn x(&self) -> Option<&BigInt> {
        self.0.x().map(FieldElement::num)
    }

    pub fn y(&self) -> Option<&BigInt> {
        self.0.y().map(FieldElement::num)
    }

    /// k * self, with k reduced mod N
    #[must_use]
    pub fn mul(&self, k: &BigInt) -> S256Point {
        let coef = k.mod_floor(&BITCOIN.generator.n);
        S256Point(self.0.scalar_mul(&coef))
    }

    /// Encode to SEC format. The point at infinity encodes as the single byte 0x00.
    #[must_use]
    pub fn sec(&self, compressed: bool) -> Vec<u8> {
        let (Some(x), Some(y)) = (self.x(), self.y()) else {
            return vec![0x00];
        };
        let x_bytes = bigint_to_32_bytes(x);

        if compressed {
            let prefix = if y.is_even() { 0x02 } else { 0x03 };
            let mut result = vec![prefix];
            result.extend_from_slice(&x_bytes);
            result
        } else {
            let mut result = vec![0x04];
            result.extend_from_slice(&x_bytes);
            result.extend_from_slice(&bigint_to_32_bytes(y));
            result
        }
    }

    /// Decode from SEC binary format (compressed or uncompressed)
    pub fn parse(sec: &[u8]) -> Result<Self> {
        let Some(&prefix) = sec.first() else {
            return Err(Error::SecParse("empty public key".into()));
        };

        match prefix {
            0x04 => {
                if sec.len() != 65 {
                    return Err(Error::SecParse(format!(
                        "uncompressed key must be 65 bytes, got {}",
                        sec.len()
                    )));
                }
                let x = BigInt::from_bytes_be(Sign::Plus, &sec[1..33]);
                let y = BigInt::from_bytes_be(Sign::Plus, &sec[33..65]);
                S256Point::new(x, y)
            }
            0x02 | 0x03 => {
                if sec.len() != 33 {
                    return Err(Error::SecParse(format!(
                        "compressed key must be 33 bytes, got {}",
                        sec.len()
                    )));
                }
                let want_even = prefix == 0x02;
                let x = FieldElement::new(
                    BigInt::from_bytes_be(Sign::Plus, &sec[1..33]),
                    BITCOIN.p.clone(),
                )?;

                // right side of the equation y^2 = x^3 + 7
                let alpha = BITCOIN.curve.rhs(&x);
                // p % 4 == 3, so alpha^((p+1)/4) is a root when one exists
                let beta = alpha.sqrt();
                if beta.mul_raw(&beta) != alpha {
                    return Err(Error::NotOnCurve {
                        x: x.num().to_string(),
                        y: "?".into(),
                    });
                }

                let y = if beta.num().is_even() == want_even {
                    beta
                } else {
                    FieldElement::reduce(&(&BITCOIN.p - beta.num()), &BITCOIN.p)
                };
                Ok(S256Point(Point::from_valid(x, y, BITCOIN.curve.clone())))
            }
            other => Err(Error::SecParse(format!("unknown prefix 0x{other:02x}"))),
        }
    }

    /// HASH160 of the SEC encoding
    #[must_use]
    pub fn hash160(&self, compressed: bool) -> [u8; 20] {
        hash160(&self.sec(compressed))
    }

    /// P2PKH address for a specific network
    #[must_use]
    pub fn address(&self, compressed: bool, network: Network) -> String {
        h160_to_p2pkh_address(&self.hash160(compressed), network)
    }

    /// Verify a signature over the message hash `z`
    #[must_use]
    pub fn verify(&self, z: &BigInt, sig: &Signature) -> bool {
        ecdsa::verify(self, z, sig)
    }
}

impl fmt::Display for S256Point {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.x(), self.y()) {
            (Some(x), Some(y)) => write!(f, "S256Point({x:064x},{y:064x})"),
            _ => write!(f, "S256Point(infinity)"),
        }
    }
}

impl Add<&S256Point> for &S256Point {
    type Output = S256Point;

    #[inline]
    fn add(self, other: &S256Point) -> S256Point {
        S256Point(self.0.add_raw(&other.0))
    }
}

/// Scalar multiplication: k * S256Point
impl Mul<&S256Point> for &BigInt {
    type Output = S256Point;

    fn mul(self, point: &S256Point) -> S256Point {
        point.mul(self)
    }
}

impl Mul<&S256Point> for BigInt {
    type Output = S256Point;

    fn mul(self, point: &S256Point) -> S256Point {
        point.mul(&self)
    }
}

/// Convert a non-negative BigInt below 2^256 to a 32-byte big-endian array
pub(crate) fn bigint_to_32_bytes(n: &BigInt) -> [u8; 32] {
    let (_, bytes) = n.to_bytes_be();
    let mut result = [0u8; 32];
    let len = bytes.len().min(32);
    result[32 - len..].copy_from_slice(&bytes[bytes.len() - len..]);
    result
}
