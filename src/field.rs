//! Arithmetic over a finite field of prime order.
//!
//! Every element carries its prime, so combining elements of different fields
//! is caught at run time and reported as [`Error::FieldMismatch`].

use std::fmt;
use std::ops::{Add, Div, Mul, Sub};

use num_bigint::BigInt;
use num_integer::Integer;
use num_traits::{One, Signed, Zero};

use crate::error::{Error, Result};

/// An element `num` of the field of integers modulo `prime`
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FieldElement {
    num: BigInt,
    prime: BigInt,
}

impl FieldElement {
    /// Creates an element, failing unless `0 <= num < prime` and `prime >= 2`
    pub fn new(num: impl Into<BigInt>, prime: impl Into<BigInt>) -> Result<Self> {
        let num = num.into();
        let prime = prime.into();
        if prime < BigInt::from(2) || num.is_negative() || num >= prime {
            return Err(Error::FieldRange {
                num: num.to_string(),
                prime: prime.to_string(),
            });
        }
        Ok(FieldElement { num, prime })
    }

    /// Reduces an arbitrary integer into the field. `prime` must be at least 2.
    pub(crate) fn reduce(num: &BigInt, prime: &BigInt) -> Self {
        FieldElement {
            num: num.mod_floor(prime),
            prime: prime.clone(),
        }
    }

    #[inline]
    pub fn num(&self) -> &BigInt {
        &self.num
    }

    #[inline]
    pub fn prime(&self) -> &BigInt {
        &self.prime
    }

    #[inline]
    pub fn is_zero(&self) -> bool {
        self.num.is_zero()
    }

    #[inline]
    pub fn same_field(&self, other: &FieldElement) -> bool {
        self.prime == other.prime
    }

    fn check_field(&self, other: &FieldElement) -> Result<()> {
        if self.same_field(other) {
            Ok(())
        } else {
            Err(Error::FieldMismatch)
        }
    }

    pub fn try_add(&self, other: &FieldElement) -> Result<Self> {
        self.check_field(other)?;
        Ok(self.add_raw(other))
    }

    pub fn try_sub(&self, other: &FieldElement) -> Result<Self> {
        self.check_field(other)?;
        Ok(self.sub_raw(other))
    }

    pub fn try_mul(&self, other: &FieldElement) -> Result<Self> {
        self.check_field(other)?;
        Ok(self.mul_raw(other))
    }

    /// `self * other^(p-2)`, the inverse coming from Fermat's little theorem
    pub fn try_div(&self, other: &FieldElement) -> Result<Self> {
        self.check_field(other)?;
        Ok(self.div_raw(other))
    }

    // The `*_raw` variants assume both operands share a prime. Callers that
    // have already checked this (points validate it at construction) use them
    // to keep their formulas infallible.

    pub(crate) fn add_raw(&self, other: &FieldElement) -> Self {
        Self::reduce(&(&self.num + &other.num), &self.prime)
    }

    pub(crate) fn sub_raw(&self, other: &FieldElement) -> Self {
        Self::reduce(&(&self.num - &other.num), &self.prime)
    }

    pub(crate) fn mul_raw(&self, other: &FieldElement) -> Self {
        Self::reduce(&(&self.num * &other.num), &self.prime)
    }

    pub(crate) fn div_raw(&self, other: &FieldElement) -> Self {
        let exp = &self.prime - BigInt::from(2);
        self.mul_raw(&other.pow(&exp))
    }

    /// Multiplies by a small integer (the `k * a` of the curve formulas)
    pub fn scale(&self, k: u32) -> Self {
        Self::reduce(&(&self.num * BigInt::from(k)), &self.prime)
    }

    /// `num^exp mod prime`. The exponent may be negative; it is first reduced
    /// into `[0, prime - 1)`.
    pub fn pow(&self, exp: &BigInt) -> Self {
        let order = &self.prime - BigInt::one();
        let n = exp.mod_floor(&order);
        FieldElement {
            num: self.num.modpow(&n, &self.prime),
            prime: self.prime.clone(),
        }
    }

    /// Square root for primes with `p % 4 == 3`, computed as `self^((p+1)/4)`.
    /// For other primes, or for non-residues, the result is not a root.
    pub fn sqrt(&self) -> Self {
        let exp = (&self.prime + BigInt::one()) / BigInt::from(4);
        self.pow(&exp)
    }
}

impl fmt::Display for FieldElement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "FieldElement_{}({})", self.prime, self.num)
    }
}

impl Add<&FieldElement> for &FieldElement {
    type Output = Result<FieldElement>;

    #[inline]
    fn add(self, other: &FieldElement) -> Result<FieldElement> {
        self.try_add(other)
    }
}

impl Sub<&FieldElement> for &FieldElement {
    type Output = Result<FieldElement>;

    #[inline]
    fn sub(self, other: &FieldElement) -> Result<FieldElement> {
        self.try_sub(other)
    }
}

impl Mul<&FieldElement> for &FieldElement {
    type Output = Result<FieldElement>;

    #[inline]
    fn mul(self, other: &FieldElement) -> Result<FieldElement> {
        self.try_mul(other)
    }
}

impl Div<&FieldElement> for &FieldElement {
    type Output = Result<FieldElement>;

    #[inline]
    fn div(self, other: &FieldElement) -> Result<FieldElement> {
        self.try_div(other)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn fe(num: i64, prime: i64) -> FieldElement {
        FieldElement::new(num, prime).unwrap()
    }

    #[test]
    fn test_equality() {
        assert_eq!(fe(7, 13), fe(7, 13));
        assert_ne!(fe(7, 13), fe(6, 13));
    }

    #[test]
    fn test_range() {
        assert!(matches!(
            FieldElement::new(13, 13),
            Err(Error::FieldRange { .. })
        ));
        assert!(matches!(
            FieldElement::new(-1, 13),
            Err(Error::FieldRange { .. })
        ));
        assert!(FieldElement::new(0, 1).is_err());
        assert!(FieldElement::new(12, 13).is_ok());
    }

    #[test]
    fn test_add() {
        assert_eq!((&fe(2, 31) + &fe(15, 31)).unwrap(), fe(17, 31));
        assert_eq!((&fe(17, 31) + &fe(21, 31)).unwrap(), fe(7, 31));
    }

    #[test]
    fn test_sub() {
        assert_eq!((&fe(29, 31) - &fe(4, 31)).unwrap(), fe(25, 31));
        assert_eq!((&fe(15, 31) - &fe(30, 31)).unwrap(), fe(16, 31));
    }

    #[test]
    fn test_mul() {
        assert_eq!((&fe(24, 31) * &fe(19, 31)).unwrap(), fe(22, 31));
        let a = fe(24, 31);
        assert_eq!(a.scale(2), (&a + &a).unwrap());
    }

    #[test]
    fn test_pow() {
        assert_eq!(fe(17, 31).pow(&BigInt::from(3)), fe(15, 31));
        let a = fe(5, 31).pow(&BigInt::from(5));
        assert_eq!(a.try_mul(&fe(18, 31)).unwrap(), fe(16, 31));
    }

    #[test]
    fn test_div() {
        assert_eq!((&fe(3, 31) / &fe(24, 31)).unwrap(), fe(4, 31));
        assert_eq!(fe(17, 31).pow(&BigInt::from(-3)), fe(29, 31));
        let a = fe(4, 31).pow(&BigInt::from(-4));
        assert_eq!(a.try_mul(&fe(11, 31)).unwrap(), fe(13, 31));
    }

    #[test]
    fn test_mismatch() {
        assert!(matches!(
            &fe(1, 31) + &fe(1, 13),
            Err(Error::FieldMismatch)
        ));
        assert!(fe(1, 31).try_div(&fe(1, 13)).is_err());
    }

    #[test]
    fn test_sqrt() {
        // 223 % 4 == 3
        let y = fe(105, 223);
        let y2 = y.try_mul(&y).unwrap();
        let root = y2.sqrt();
        assert!(root == y || root == fe(223 - 105, 223));
    }

    proptest! {
        #[test]
        fn prop_self_division_is_one(num in 1i64..223) {
            let a = fe(num, 223);
            prop_assert_eq!(a.try_div(&a).unwrap(), fe(1, 223));
        }

        #[test]
        fn prop_add_then_sub(a in 0i64..223, b in 0i64..223) {
            let (a, b) = (fe(a, 223), fe(b, 223));
            let sum = a.try_add(&b).unwrap();
            prop_assert_eq!(sum.try_sub(&b).unwrap(), a);
        }
    }
}
