//! Extended numeric kinds: big integer, big decimal, ratio, and the IEEE-754
//! special values the reader/codegen round-trip (`##Inf`, `##-Inf`, `##NaN`).
//!
//! Grounded on `num-bigint`/`num-rational`, the arbitrary-precision stack
//! this project borrows from the other example repo in the retrieval pack
//! that targets exact-precision numeric towers (a Python-semantics
//! interpreter), since the teacher crate has no bignum support at all.

use num_bigint::BigInt;
use num_rational::BigRational;
use num_traits::{Signed, ToPrimitive, Zero};
use std::fmt;

/// Arbitrary-precision integer, used once an `integer` literal or arithmetic
/// result overflows `i64`.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct BigInteger(pub BigInt);

impl BigInteger {
    pub fn from_i64(v: i64) -> Self {
        BigInteger(BigInt::from(v))
    }

    pub fn to_i64(&self) -> Option<i64> {
        self.0.to_i64()
    }

    pub fn parse(s: &str, radix: u32) -> Option<Self> {
        BigInt::parse_bytes(s.as_bytes(), radix).map(BigInteger)
    }
}

impl fmt::Display for BigInteger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}N", self.0)
    }
}

/// Arbitrary-precision decimal: stored as an unscaled `BigInt` plus a
/// base-10 scale (the same representation `java.math.BigDecimal`/most
/// Lisp bigdecimal ports use), avoiding a binary-floating-point
/// dependency just for exact decimal literals like `1.10M`.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct BigDecimalValue {
    pub unscaled: BigInt,
    pub scale: u32,
}

impl BigDecimalValue {
    pub fn parse(s: &str) -> Option<Self> {
        let body = s.strip_suffix('M').unwrap_or(s);
        let (int_part, frac_part) = match body.split_once('.') {
            Some((i, f)) => (i, f),
            None => (body, ""),
        };
        let scale = frac_part.len() as u32;
        let digits = format!("{int_part}{frac_part}");
        let unscaled = digits.parse::<BigInt>().ok()?;
        Some(BigDecimalValue { unscaled, scale })
    }
}

impl fmt::Display for BigDecimalValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.scale == 0 {
            return write!(f, "{}M", self.unscaled);
        }
        let s = self.unscaled.abs().to_string();
        let s = if (s.len() as u32) <= self.scale {
            "0".repeat(self.scale as usize - s.len() + 1) + &s
        } else {
            s
        };
        let (int_part, frac_part) = s.split_at(s.len() - self.scale as usize);
        let sign = if self.unscaled.is_negative() { "-" } else { "" };
        write!(f, "{sign}{int_part}.{frac_part}M")
    }
}

/// Exact rational, reduced to lowest terms by `num_rational`.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RatioValue(pub BigRational);

impl RatioValue {
    pub fn new(numer: BigInt, denom: BigInt) -> Option<Self> {
        if denom.is_zero() {
            return None;
        }
        Some(RatioValue(BigRational::new(numer, denom)))
    }

    pub fn to_f64(&self) -> f64 {
        self.0.numer().to_f64().unwrap_or(f64::NAN) / self.0.denom().to_f64().unwrap_or(1.0)
    }
}

impl fmt::Display for RatioValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.0.numer(), self.0.denom())
    }
}

/// The three special doubles the reader recognizes as `##Inf`, `##-Inf`,
/// `##NaN` and codegen must re-emit as `numeric_limits<double>::infinity()`
/// / `quiet_NaN()` rather than textual `inf`/`nan` (§4.4).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SpecialDouble {
    PosInfinity,
    NegInfinity,
    NaN,
}

impl SpecialDouble {
    pub fn classify(d: f64) -> Option<Self> {
        if d.is_nan() {
            Some(SpecialDouble::NaN)
        } else if d == f64::INFINITY {
            Some(SpecialDouble::PosInfinity)
        } else if d == f64::NEG_INFINITY {
            Some(SpecialDouble::NegInfinity)
        } else {
            None
        }
    }

    pub fn to_f64(self) -> f64 {
        match self {
            SpecialDouble::PosInfinity => f64::INFINITY,
            SpecialDouble::NegInfinity => f64::NEG_INFINITY,
            SpecialDouble::NaN => f64::NAN,
        }
    }

    pub fn reader_token(self) -> &'static str {
        match self {
            SpecialDouble::PosInfinity => "##Inf",
            SpecialDouble::NegInfinity => "##-Inf",
            SpecialDouble::NaN => "##NaN",
        }
    }

    /// The C++ expression codegen must emit (§4.4).
    pub fn cpp_expr(self) -> &'static str {
        match self {
            SpecialDouble::PosInfinity => "std::numeric_limits<double>::infinity()",
            SpecialDouble::NegInfinity => "-std::numeric_limits<double>::infinity()",
            SpecialDouble::NaN => "std::numeric_limits<double>::quiet_NaN()",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bigint_round_trips_through_decimal_string() {
        let b = BigInteger::parse("123456789012345678901234567890", 10).unwrap();
        assert_eq!(b.to_string(), "123456789012345678901234567890N");
    }

    #[test]
    fn bigdecimal_parses_and_displays() {
        let d = BigDecimalValue::parse("1.10").unwrap();
        assert_eq!(d.to_string(), "1.10M");
    }

    #[test]
    fn ratio_reduces_to_lowest_terms() {
        let r = RatioValue::new(BigInt::from(4), BigInt::from(8)).unwrap();
        assert_eq!(r.to_string(), "1/2");
    }

    #[test]
    fn ratio_rejects_zero_denominator() {
        assert!(RatioValue::new(BigInt::from(1), BigInt::from(0)).is_none());
    }

    #[test]
    fn special_doubles_round_trip() {
        for v in [SpecialDouble::PosInfinity, SpecialDouble::NegInfinity, SpecialDouble::NaN] {
            let classified = SpecialDouble::classify(v.to_f64()).unwrap();
            assert_eq!(classified, v);
        }
        assert!(SpecialDouble::classify(3.0).is_none());
    }
}
