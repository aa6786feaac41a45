use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

///
/// Money
///
/// Fixed-point amount with 2 fractional digits.
/// Stores the value in cents (e.g. 12.50 → 1250) so repair costs add up
/// exactly.
///
/// Constructors:
/// - `from_cents(raw)`: raw scaled integer (no scaling)
/// - `try_from_decimal_exact(d)`: fails if more than 2 fractional digits
///
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Money(i64);

impl Money {
    const DECIMALS: u32 = 2;

    /// Construct from raw cents. No scaling applied.
    #[must_use]
    pub const fn from_cents(cents: i64) -> Self {
        Self(cents)
    }

    #[must_use]
    pub const fn cents(self) -> i64 {
        self.0
    }

    /// Exact decimal → cents, fails on sub-cent precision or overflow.
    /// Trailing zeros do not count as precision ("1.500" is fine).
    #[must_use]
    pub fn try_from_decimal_exact(d: Decimal) -> Option<Self> {
        let mut d = d.normalize();
        if d.scale() > Self::DECIMALS {
            return None;
        }
        d.rescale(Self::DECIMALS);
        if d.scale() != Self::DECIMALS {
            return None;
        }
        i64::try_from(d.mantissa()).ok().map(Self)
    }

    #[must_use]
    pub fn to_decimal(self) -> Decimal {
        Decimal::new(self.0, Self::DECIMALS)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseMoneyError(String);

impl fmt::Display for ParseMoneyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid amount: {}", self.0)
    }
}

impl std::error::Error for ParseMoneyError {}

impl FromStr for Money {
    type Err = ParseMoneyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Decimal::from_str_exact(s.trim())
            .ok()
            .and_then(Self::try_from_decimal_exact)
            .ok_or_else(|| ParseMoneyError(s.to_string()))
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // scale is fixed at 2, so "12.50" keeps its trailing zero
        write!(f, "{}", self.to_decimal())
    }
}

// Serialized as a decimal string so JSON clients never see a float.
impl Serialize for Money {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Money {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}
