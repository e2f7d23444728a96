//! Portions: exact rationals in [0, 1], or the `remaining` sentinel.

use crate::error::PortionError;
use num_bigint::BigInt;
use num_rational::BigRational;
use num_traits::{One, Zero};
use std::str::FromStr;

/// A share of a monetary amount.
///
/// Either a specific rational between 0 and 1 inclusive, or `remaining`,
/// which stands for whatever the other portions of an allotment leave over.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Portion {
    Specific(BigRational),
    Remaining,
}

impl Portion {
    /// Build a specific portion from a numerator and denominator.
    pub fn specific(numer: u64, denom: u64) -> Result<Portion, PortionError> {
        if denom == 0 {
            return Err(PortionError::ZeroDenominator);
        }
        Self::from_ratio(BigRational::new(BigInt::from(numer), BigInt::from(denom)))
    }

    /// Wrap a rational, checking the [0, 1] range.
    pub fn from_ratio(ratio: BigRational) -> Result<Portion, PortionError> {
        if ratio < BigRational::zero() || ratio > BigRational::one() {
            return Err(PortionError::OutOfRange);
        }
        Ok(Portion::Specific(ratio))
    }

    pub fn is_remaining(&self) -> bool {
        matches!(self, Portion::Remaining)
    }
}

/// Parses `p/q` fractions and `D%` / `D.D%` percentages as exact rationals.
///
/// `12.5%` reduces to `1/8`. The keyword `remaining` is not part of this
/// syntax; it is a token of the script language.
impl FromStr for Portion {
    type Err = PortionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if let Some(pct) = s.strip_suffix('%') {
            let (whole, frac) = match pct.split_once('.') {
                Some((w, f)) => (w, f),
                None => (pct, ""),
            };
            if whole.is_empty() && frac.is_empty() {
                return Err(PortionError::InvalidSyntax(s.to_string()));
            }
            if !all_digits(whole) || !all_digits(frac) {
                return Err(PortionError::InvalidSyntax(s.to_string()));
            }
            let mut digits = String::with_capacity(whole.len() + frac.len());
            digits.push_str(whole);
            digits.push_str(frac);
            let numer = BigInt::parse_bytes(digits.as_bytes(), 10)
                .ok_or_else(|| PortionError::InvalidSyntax(s.to_string()))?;
            let denom = (0..frac.len()).fold(BigInt::from(100u32), |acc, _| acc * 10);
            Portion::from_ratio(BigRational::new(numer, denom))
        } else if let Some((n, d)) = s.split_once('/') {
            if n.is_empty() || d.is_empty() || !all_digits(n) || !all_digits(d) {
                return Err(PortionError::InvalidSyntax(s.to_string()));
            }
            let numer = BigInt::parse_bytes(n.as_bytes(), 10)
                .ok_or_else(|| PortionError::InvalidSyntax(s.to_string()))?;
            let denom = BigInt::parse_bytes(d.as_bytes(), 10)
                .ok_or_else(|| PortionError::InvalidSyntax(s.to_string()))?;
            if denom.is_zero() {
                return Err(PortionError::ZeroDenominator);
            }
            Portion::from_ratio(BigRational::new(numer, denom))
        } else {
            Err(PortionError::InvalidSyntax(s.to_string()))
        }
    }
}

fn all_digits(s: &str) -> bool {
    s.bytes().all(|b| b.is_ascii_digit())
}

impl std::fmt::Display for Portion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Portion::Specific(r) => write!(f, "{}/{}", r.numer(), r.denom()),
            Portion::Remaining => f.write_str("remaining"),
        }
    }
}
