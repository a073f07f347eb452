use std::{
    fmt::Display,
    iter::Sum,
    ops::{Add, AddAssign, Mul, Neg, Sub, SubAssign},
    str::FromStr,
};

use serde::{Deserialize, Serialize};
use sqlx::Type;
use thiserror::Error;

use crate::op;

pub const DEFAULT_CURRENCY_CODE: &str = "GHS";
pub const DEFAULT_CURRENCY_CODE_LOWER: &str = "ghs";

//--------------------------------------     MinorUnits       --------------------------------------------------------

/// A money amount expressed in a currency's minor unit (pesewas, kobo, cents).
///
/// Every amount in this codebase is carried in minor units. Major-unit figures exist only at the
/// edges, and cross over via [`Currency::minor_units`] and [`MinorUnits::in_major`], so a value of
/// this type is never ambiguous about its scale.
#[derive(Debug, Clone, Copy, Default, Type, Ord, PartialOrd, Serialize, Deserialize)]
#[sqlx(transparent)]
pub struct MinorUnits(i64);

op!(binary MinorUnits, Add, add);
op!(binary MinorUnits, Sub, sub);
op!(inplace MinorUnits, AddAssign, add_assign);
op!(inplace MinorUnits, SubAssign, sub_assign);
op!(unary MinorUnits, Neg, neg);

impl Mul<i64> for MinorUnits {
    type Output = Self;

    fn mul(self, rhs: i64) -> Self::Output {
        Self::from(self.value() * rhs)
    }
}

impl Sum for MinorUnits {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Self::default(), Add::add)
    }
}

impl From<i64> for MinorUnits {
    fn from(value: i64) -> Self {
        Self(value)
    }
}

impl PartialEq for MinorUnits {
    fn eq(&self, other: &Self) -> bool {
        self.0 == other.0
    }
}

impl Eq for MinorUnits {}

impl TryFrom<u64> for MinorUnits {
    type Error = AmountConversionError;

    fn try_from(value: u64) -> Result<Self, Self::Error> {
        if value > i64::MAX as u64 {
            Err(AmountConversionError(format!("Value {value} is too large to represent in minor units")))
        } else {
            #[allow(clippy::cast_possible_wrap)]
            Ok(Self(value as i64))
        }
    }
}

impl Display for MinorUnits {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl MinorUnits {
    pub fn value(&self) -> i64 {
        self.0
    }

    /// The amount in major units, for display and message rendering only. Arithmetic and
    /// comparisons stay in minor units.
    pub fn in_major(&self, currency: Currency) -> f64 {
        self.0 as f64 / currency.subunit_factor() as f64
    }

    /// Absolute difference between two amounts.
    pub fn abs_diff(&self, other: Self) -> Self {
        Self((self.0 - other.0).abs())
    }
}

#[derive(Debug, Clone, Error)]
#[error("Amount cannot be represented in minor units: {0}")]
pub struct AmountConversionError(String);

//--------------------------------------      Currency        --------------------------------------------------------

/// ISO 4217 codes for the currencies the supported gateways settle in. All of them keep a factor
/// of 100 between the major unit and its subunit.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, Type)]
#[serde(rename_all = "UPPERCASE")]
#[sqlx(rename_all = "UPPERCASE")]
pub enum Currency {
    #[default]
    Ghs,
    Ngn,
    Kes,
    Zar,
    Usd,
}

impl Currency {
    pub fn code(&self) -> &'static str {
        match self {
            Currency::Ghs => "GHS",
            Currency::Ngn => "NGN",
            Currency::Kes => "KES",
            Currency::Zar => "ZAR",
            Currency::Usd => "USD",
        }
    }

    /// Number of minor units in one major unit of this currency.
    pub fn subunit_factor(&self) -> i64 {
        100
    }

    /// Converts a major-unit amount into minor units, rounding half away from zero.
    ///
    /// Fails on negative or non-finite input rather than guessing at the caller's intent.
    pub fn minor_units(&self, major: f64) -> Result<MinorUnits, AmountConversionError> {
        if !major.is_finite() {
            return Err(AmountConversionError(format!("{major} is not a finite amount")));
        }
        if major < 0.0 {
            return Err(AmountConversionError(format!("{major} is negative")));
        }
        let scaled = (major * self.subunit_factor() as f64).round();
        if scaled > i64::MAX as f64 {
            return Err(AmountConversionError(format!("{major} {self} overflows the minor unit range")));
        }
        #[allow(clippy::cast_possible_truncation)]
        Ok(MinorUnits(scaled as i64))
    }
}

impl Display for Currency {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.code())
    }
}

#[derive(Debug, Clone, Error)]
#[error("Unsupported currency code: {0}")]
pub struct UnsupportedCurrencyError(String);

impl FromStr for Currency {
    type Err = UnsupportedCurrencyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "GHS" => Ok(Currency::Ghs),
            "NGN" => Ok(Currency::Ngn),
            "KES" => Ok(Currency::Kes),
            "ZAR" => Ok(Currency::Zar),
            "USD" => Ok(Currency::Usd),
            code => Err(UnsupportedCurrencyError(code.to_string())),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn minor_unit_arithmetic() {
        let subtotal: MinorUnits = [MinorUnits::from(1000), MinorUnits::from(250) * 2, MinorUnits::from(4000)]
            .into_iter()
            .sum();
        assert_eq!(subtotal, MinorUnits::from(5500));
        assert_eq!(subtotal - MinorUnits::from(500), MinorUnits::from(5000));
        assert_eq!(subtotal.abs_diff(MinorUnits::from(5600)), MinorUnits::from(100));
    }

    #[test]
    fn major_to_minor_round_trip() {
        let cases = [(55.0, 5500), (0.01, 1), (0.1, 10), (100.0, 10_000), (1_234.56, 123_456)];
        for (major, minor) in cases {
            let amount = Currency::Ghs.minor_units(major).unwrap();
            assert_eq!(amount, MinorUnits::from(minor));
            assert!((amount.in_major(Currency::Ghs) - major).abs() < 1e-9);
        }
    }

    #[test]
    fn small_prices_are_not_reinterpreted() {
        // A 99 pesewa sticker price and a 99 cedi price are different values, full stop.
        let sticker = Currency::Ghs.minor_units(0.99).unwrap();
        let cedis = Currency::Ghs.minor_units(99.0).unwrap();
        assert_eq!(sticker, MinorUnits::from(99));
        assert_eq!(cedis, MinorUnits::from(9900));
        assert_ne!(sticker, cedis);
    }

    #[test]
    fn half_subunits_round_away_from_zero() {
        // 0.125 is exactly representable, so the scaled value is exactly 12.5.
        assert_eq!(Currency::Ghs.minor_units(0.125).unwrap(), MinorUnits::from(13));
    }

    #[test]
    fn invalid_amounts_are_rejected() {
        assert!(Currency::Ghs.minor_units(-1.0).is_err());
        assert!(Currency::Ghs.minor_units(f64::NAN).is_err());
        assert!(Currency::Ghs.minor_units(f64::INFINITY).is_err());
    }

    #[test]
    fn currency_codes_parse_case_insensitively() {
        assert_eq!("ghs".parse::<Currency>().unwrap(), Currency::Ghs);
        assert_eq!("NGN".parse::<Currency>().unwrap(), Currency::Ngn);
        assert_eq!(" usd ".parse::<Currency>().unwrap(), Currency::Usd);
        assert!("XTR".parse::<Currency>().is_err());
        assert_eq!(Currency::Kes.to_string(), "KES");
    }
}
