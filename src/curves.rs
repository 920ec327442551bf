//! Core functions for math over Elliptic Curves over Finite Fields,
//! especially the ability to define Points on Curves and perform
//! addition and scalar multiplication.

use std::fmt;
use std::ops::{Add, Mul};

use num_bigint::BigInt;
use num_traits::{One, Signed, Zero};

use crate::error::{Error, Result};
use crate::field::FieldElement;

/// Elliptic Curve y^2 = x^3 + a*x + b over the field shared by `a` and `b`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Curve {
    pub a: FieldElement,
    pub b: FieldElement,
}

impl Curve {
    pub fn new(a: FieldElement, b: FieldElement) -> Result<Self> {
        if !a.same_field(&b) {
            return Err(Error::FieldMismatch);
        }
        Ok(Curve { a, b })
    }

    #[inline]
    pub fn prime(&self) -> &BigInt {
        self.a.prime()
    }

    /// Right-hand side of the curve equation, x^3 + a*x + b
    pub(crate) fn rhs(&self, x: &FieldElement) -> FieldElement {
        let x3 = x.pow(&BigInt::from(3));
        x3.add_raw(&self.a.mul_raw(x)).add_raw(&self.b)
    }

    /// Whether (x, y) satisfies the curve equation. Both coordinates must
    /// belong to the curve's field.
    pub fn contains(&self, x: &FieldElement, y: &FieldElement) -> bool {
        x.same_field(&self.a) && y.same_field(&self.a) && y.mul_raw(y) == self.rhs(x)
    }
}

/// Position of a point: the identity element or an affine coordinate pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Coords {
    Infinity,
    Affine(FieldElement, FieldElement),
}

/// A point (x,y) on a Curve, or the point at infinity
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Point {
    curve: Curve,
    coords: Coords,
}

impl Point {
    /// Creates an affine point, checking the curve equation.
    pub fn new(x: FieldElement, y: FieldElement, curve: Curve) -> Result<Self> {
        if !x.same_field(&curve.a) || !y.same_field(&curve.a) {
            return Err(Error::FieldMismatch);
        }
        if !curve.contains(&x, &y) {
            return Err(Error::NotOnCurve {
                x: x.num().to_string(),
                y: y.num().to_string(),
            });
        }
        Ok(Point {
            curve,
            coords: Coords::Affine(x, y),
        })
    }

    /// Builds an affine point whose coordinates the caller has already
    /// validated against `curve`.
    pub(crate) const fn from_valid(x: FieldElement, y: FieldElement, curve: Curve) -> Self {
        Point {
            curve,
            coords: Coords::Affine(x, y),
        }
    }

    /// Point at infinity
    #[must_use]
    pub const fn infinity(curve: Curve) -> Self {
        Point {
            curve,
            coords: Coords::Infinity,
        }
    }

    #[must_use]
    #[inline]
    pub const fn is_infinity(&self) -> bool {
        matches!(self.coords, Coords::Infinity)
    }

    #[inline]
    pub fn curve(&self) -> &Curve {
        &self.curve
    }

    #[inline]
    pub fn coords(&self) -> &Coords {
        &self.coords
    }

    pub fn x(&self) -> Option<&FieldElement> {
        match &self.coords {
            Coords::Affine(x, _) => Some(x),
            Coords::Infinity => None,
        }
    }

    pub fn y(&self) -> Option<&FieldElement> {
        match &self.coords {
            Coords::Affine(_, y) => Some(y),
            Coords::Infinity => None,
        }
    }

    /// Additive inverse, (x, -y)
    #[must_use]
    pub fn neg(&self) -> Point {
        match &self.coords {
            Coords::Infinity => self.clone(),
            Coords::Affine(x, y) => {
                let zero = FieldElement::reduce(&BigInt::zero(), self.curve.prime());
                Point {
                    curve: self.curve.clone(),
                    coords: Coords::Affine(x.clone(), zero.sub_raw(y)),
                }
            }
        }
    }

    /// Adds two points, failing if they lie on different curves.
    pub fn try_add(&self, other: &Point) -> Result<Point> {
        if self.curve != other.curve {
            return Err(Error::Curve);
        }
        Ok(self.add_raw(other))
    }

    /// Core point addition logic. Both points must be on the same curve.
    pub(crate) fn add_raw(&self, other: &Point) -> Point {
        let (x1, y1) = match &self.coords {
            Coords::Infinity => return other.clone(),
            Coords::Affine(x, y) => (x, y),
        };
        let (x2, y2) = match &other.coords {
            Coords::Infinity => return self.clone(),
            Coords::Affine(x, y) => (x, y),
        };

        // additive inverses: vertical line
        if x1 == x2 && y1 != y2 {
            return Point::infinity(self.curve.clone());
        }

        let slope = if x1 != x2 {
            y2.sub_raw(y1).div_raw(&x2.sub_raw(x1))
        } else {
            // doubling; a vertical tangent meets the curve at infinity
            if y1.is_zero() {
                return Point::infinity(self.curve.clone());
            }
            let numerator = x1.mul_raw(x1).scale(3).add_raw(&self.curve.a);
            numerator.div_raw(&y1.scale(2))
        };

        let x3 = slope.mul_raw(&slope).sub_raw(x1).sub_raw(x2);
        let y3 = slope.mul_raw(&x1.sub_raw(&x3)).sub_raw(y1);

        Point {
            curve: self.curve.clone(),
            coords: Coords::Affine(x3, y3),
        }
    }

    /// Double-and-add scalar multiplication. Negative scalars multiply the
    /// inverse point.
    #[must_use]
    pub fn scalar_mul(&self, k: &BigInt) -> Point {
        if k.is_negative() {
            return self.neg().scalar_mul(&-k);
        }
        let mut result = Point::infinity(self.curve.clone());
        let mut addend = self.clone();
        let mut k = k.clone();

        while !k.is_zero() {
            if (&k & BigInt::one()).is_one() {
                result = result.add_raw(&addend);
            }
            addend = addend.add_raw(&addend);
            k >>= 1;
        }
        result
    }
}

impl fmt::Display for Point {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.coords {
            Coords::Infinity => write!(f, "Point(infinity)"),
            Coords::Affine(x, y) => write!(
                f,
                "Point({},{})_{}_{} FieldElement({})",
                x.num(),
                y.num(),
                self.curve.a.num(),
                self.curve.b.num(),
                self.curve.prime()
            ),
        }
    }
}

impl Add<&Point> for &Point {
    type Output = Result<Point>;

    #[inline]
    fn add(self, other: &Point) -> Result<Point> {
        self.try_add(other)
    }
}

/// Scalar multiplication: k * Point
impl Mul<&Point> for &BigInt {
    type Output = Point;

    fn mul(self, point: &Point) -> Point {
        point.scalar_mul(self)
    }
}

impl Mul<&Point> for BigInt {
    type Output = Point;

    fn mul(self, point: &Point) -> Point {
        point.scalar_mul(&self)
    }
}

/// A generator over a curve: an initial point and the (pre-computed) order
#[derive(Debug, Clone)]
pub struct Generator {
    pub g: Point,  // A generator point on the curve
    pub n: BigInt, // The order of the generating point, so 0*G = n*G = INF
}

impl Generator {
    #[must_use]
    pub const fn new(g: Point, n: BigInt) -> Self {
        Generator { g, n }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PRIME: i64 = 223;

    fn toy_curve() -> Curve {
        Curve::new(
            FieldElement::new(0, PRIME).unwrap(),
            FieldElement::new(7, PRIME).unwrap(),
        )
        .unwrap()
    }

    fn pt(x: i64, y: i64) -> Point {
        Point::new(
            FieldElement::new(x, PRIME).unwrap(),
            FieldElement::new(y, PRIME).unwrap(),
            toy_curve(),
        )
        .unwrap()
    }

    #[test]
    fn test_on_curve() {
        for (x, y) in [(192, 105), (17, 56), (1, 193)] {
            pt(x, y);
        }
        for (x, y) in [(200, 119), (42, 99)] {
            let res = Point::new(
                FieldElement::new(x, PRIME).unwrap(),
                FieldElement::new(y, PRIME).unwrap(),
                toy_curve(),
            );
            assert!(matches!(res, Err(Error::NotOnCurve { .. })));
        }
    }

    #[test]
    fn test_add() {
        let additions = [
            (192, 105, 17, 56, 170, 142),
            (47, 71, 117, 141, 60, 139),
            (143, 98, 76, 66, 47, 71),
        ];
        for (x1, y1, x2, y2, x3, y3) in additions {
            assert_eq!((&pt(x1, y1) + &pt(x2, y2)).unwrap(), pt(x3, y3));
        }
    }

    #[test]
    fn test_add_identity_and_inverse() {
        let inf = Point::infinity(toy_curve());
        let p = pt(47, 71);
        assert_eq!((&inf + &p).unwrap(), p);
        assert_eq!((&p + &inf).unwrap(), p);
        assert!((&p + &p.neg()).unwrap().is_infinity());
    }

    #[test]
    fn test_vertical_tangent() {
        // 6^3 + 7 == 223, so (6, 0) is on the curve
        let p = pt(6, 0);
        assert!((&p + &p).unwrap().is_infinity());
    }

    #[test]
    fn test_curve_mismatch() {
        let other = Curve::new(
            FieldElement::new(5, PRIME).unwrap(),
            FieldElement::new(7, PRIME).unwrap(),
        )
        .unwrap();
        let inf = Point::infinity(other);
        assert!(matches!(&pt(47, 71) + &inf, Err(Error::Curve)));
    }

    #[test]
    fn test_scalar_mul() {
        let multiplications = [
            (2, 192, 105, Some((49, 71))),
            (2, 143, 98, Some((64, 168))),
            (2, 47, 71, Some((36, 111))),
            (4, 47, 71, Some((194, 51))),
            (8, 47, 71, Some((116, 55))),
            (21, 47, 71, None),
        ];
        for (k, x1, y1, expected) in multiplications {
            let product = BigInt::from(k) * &pt(x1, y1);
            match expected {
                Some((x2, y2)) => assert_eq!(product, pt(x2, y2)),
                None => assert!(product.is_infinity()),
            }
        }
    }

    #[test]
    fn test_scalar_mul_matches_repeated_addition() {
        let p = pt(47, 71);
        let mut naive = Point::infinity(toy_curve());
        for k in 0..=25 {
            assert_eq!(p.scalar_mul(&BigInt::from(k)), naive, "k = {k}");
            naive = (&naive + &p).unwrap();
        }
    }

    #[test]
    fn test_negative_scalar() {
        let p = pt(47, 71);
        assert_eq!(p.scalar_mul(&BigInt::from(-3)), p.scalar_mul(&BigInt::from(3)).neg());
    }
}
