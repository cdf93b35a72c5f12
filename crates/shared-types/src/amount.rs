//! # Decimal Amounts
//!
//! Token quantities travel as decimal strings on the ledger (`Numeric 10`).
//! `Amount` keeps them as an arbitrary-precision integer count of
//! 10^-10 units so that sums never drift. Binary floating point is never used.

use num_bigint::BigInt;
use num_traits::{Signed, Zero};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::iter::Sum;
use std::ops::{Add, AddAssign, Neg, Sub, SubAssign};
use std::str::FromStr;
use thiserror::Error;

/// Number of fractional digits carried by ledger numerics.
pub const NUMERIC_SCALE: u32 = 10;

/// Errors produced while parsing a decimal string.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AmountError {
    /// Input was empty or whitespace.
    #[error("empty decimal string")]
    Empty,

    /// Input contained something other than an optional sign, digits and one dot.
    #[error("invalid decimal string: {0:?}")]
    Invalid(String),

    /// More significant fractional digits than the ledger scale allows.
    #[error("decimal {value:?} exceeds {max} fractional digits")]
    TooPrecise {
        /// Offending input.
        value: String,
        /// Maximum scale.
        max: u32,
    },
}

/// Exact decimal quantity.
#[derive(Clone, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Amount(BigInt);

fn scale_factor() -> BigInt {
    BigInt::from(10u32).pow(NUMERIC_SCALE)
}

impl Amount {
    /// The zero amount.
    pub fn zero() -> Self {
        Self(BigInt::zero())
    }

    /// Parse a decimal string such as `"100"`, `"0.25"` or `"-3.5000000000"`.
    pub fn parse(input: &str) -> Result<Self, AmountError> {
        let trimmed = input.trim();
        if trimmed.is_empty() {
            return Err(AmountError::Empty);
        }

        let (negative, unsigned) = match trimmed.as_bytes()[0] {
            b'-' => (true, &trimmed[1..]),
            b'+' => (false, &trimmed[1..]),
            _ => (false, trimmed),
        };

        let (int_part, frac_part) = match unsigned.split_once('.') {
            Some((i, f)) => (i, f),
            None => (unsigned, ""),
        };

        let all_digits = |s: &str| s.bytes().all(|b| b.is_ascii_digit());
        if (int_part.is_empty() && frac_part.is_empty())
            || !all_digits(int_part)
            || !all_digits(frac_part)
        {
            return Err(AmountError::Invalid(input.to_string()));
        }

        let frac_significant = frac_part.trim_end_matches('0');
        if frac_significant.len() > NUMERIC_SCALE as usize {
            return Err(AmountError::TooPrecise {
                value: input.to_string(),
                max: NUMERIC_SCALE,
            });
        }

        let mut digits = String::with_capacity(int_part.len() + NUMERIC_SCALE as usize);
        digits.push_str(if int_part.is_empty() { "0" } else { int_part });
        digits.push_str(frac_significant);
        for _ in frac_significant.len()..NUMERIC_SCALE as usize {
            digits.push('0');
        }

        let units: BigInt = digits
            .parse()
            .map_err(|_| AmountError::Invalid(input.to_string()))?;

        Ok(Self(if negative { -units } else { units }))
    }

    /// Build from a whole number of tokens.
    pub fn from_whole(value: i64) -> Self {
        Self(BigInt::from(value) * scale_factor())
    }

    /// True when exactly zero.
    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }

    /// True when strictly below zero.
    pub fn is_negative(&self) -> bool {
        self.0.is_negative()
    }

    /// True when strictly above zero.
    pub fn is_positive(&self) -> bool {
        self.0.is_positive()
    }

    /// `self - other`, floored at zero.
    pub fn saturating_sub(&self, other: &Amount) -> Amount {
        let diff = &self.0 - &other.0;
        if diff.is_negative() {
            Amount::zero()
        } else {
            Amount(diff)
        }
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let scale = scale_factor();
        let magnitude = self.0.abs();
        let whole = &magnitude / &scale;
        let frac = &magnitude % &scale;

        if self.0.is_negative() {
            f.write_str("-")?;
        }
        write!(f, "{}", whole)?;

        if !frac.is_zero() {
            let padded = format!("{:0>width$}", frac.to_string(), width = NUMERIC_SCALE as usize);
            write!(f, ".{}", padded.trim_end_matches('0'))?;
        }
        Ok(())
    }
}

impl FromStr for Amount {
    type Err = AmountError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Amount::parse(s)
    }
}

impl Add for Amount {
    type Output = Amount;

    fn add(self, rhs: Amount) -> Amount {
        Amount(self.0 + rhs.0)
    }
}

impl<'a> Add<&'a Amount> for &'a Amount {
    type Output = Amount;

    fn add(self, rhs: &'a Amount) -> Amount {
        Amount(&self.0 + &rhs.0)
    }
}

impl AddAssign<&Amount> for Amount {
    fn add_assign(&mut self, rhs: &Amount) {
        self.0 += &rhs.0;
    }
}

impl Sub for Amount {
    type Output = Amount;

    fn sub(self, rhs: Amount) -> Amount {
        Amount(self.0 - rhs.0)
    }
}

impl<'a> Sub<&'a Amount> for &'a Amount {
    type Output = Amount;

    fn sub(self, rhs: &'a Amount) -> Amount {
        Amount(&self.0 - &rhs.0)
    }
}

impl SubAssign<&Amount> for Amount {
    fn sub_assign(&mut self, rhs: &Amount) {
        self.0 -= &rhs.0;
    }
}

impl Neg for Amount {
    type Output = Amount;

    fn neg(self) -> Amount {
        Amount(-self.0)
    }
}

impl Sum for Amount {
    fn sum<I: Iterator<Item = Amount>>(iter: I) -> Amount {
        iter.fold(Amount::zero(), |acc, a| acc + a)
    }
}

impl<'a> Sum<&'a Amount> for Amount {
    fn sum<I: Iterator<Item = &'a Amount>>(iter: I) -> Amount {
        iter.fold(Amount::zero(), |mut acc, a| {
            acc += a;
            acc
        })
    }
}

impl Serialize for Amount {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for Amount {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Amount::parse(&raw).map_err(serde::de::Error::custom)
    }
}

/// Sum decimal strings, skipping (and returning) the ones that fail to parse.
pub fn sum_decimal_strings<'a, I>(values: I) -> (Amount, Vec<&'a str>)
where
    I: IntoIterator<Item = &'a str>,
{
    let mut total = Amount::zero();
    let mut rejected = Vec::new();
    for raw in values {
        match Amount::parse(raw) {
            Ok(a) => total += &a,
            Err(_) => rejected.push(raw),
        }
    }
    (total, rejected)
}
