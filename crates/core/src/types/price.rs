//! Type-safe price representation using decimal arithmetic.
//!
//! Amounts are kept in the currency's standard unit (`19.99`, not `1999`).
//! The payment gateway speaks minor units, so conversions live here next to the
//! currency's exponent.

use core::fmt;
use core::str::FromStr;

use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use serde::{Deserialize, Serialize};

/// A price with currency information.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Price {
    /// Amount in the currency's standard unit (e.g., dollars, not cents).
    pub amount: Decimal,
    /// ISO 4217 currency code.
    pub currency_code: CurrencyCode,
}

impl Price {
    /// Create a new price.
    #[must_use]
    pub const fn new(amount: Decimal, currency_code: CurrencyCode) -> Self {
        Self {
            amount,
            currency_code,
        }
    }

    /// A zero amount in the given currency.
    #[must_use]
    pub const fn zero(currency_code: CurrencyCode) -> Self {
        Self::new(Decimal::ZERO, currency_code)
    }

    /// Price of `quantity` units at this unit price.
    #[must_use]
    pub fn times(self, quantity: u32) -> Self {
        Self::new(self.amount * Decimal::from(quantity), self.currency_code)
    }

    /// Add two prices of the same currency. Returns `None` on currency mismatch.
    #[must_use]
    pub fn checked_add(self, other: Self) -> Option<Self> {
        (self.currency_code == other.currency_code)
            .then(|| Self::new(self.amount + other.amount, self.currency_code))
    }

    /// Amount in minor units (cents) as expected by the payment gateway.
    ///
    /// Returns `None` if the amount has more precision than the currency allows
    /// or does not fit in an `i64`.
    #[must_use]
    pub fn to_minor_units(self) -> Option<i64> {
        let scaled = self.amount * Decimal::from(10_i64.pow(self.currency_code.exponent()));
        if scaled.fract() != Decimal::ZERO {
            return None;
        }
        scaled.to_i64()
    }

    /// Build a price from a minor-unit amount reported by the payment gateway.
    #[must_use]
    pub fn from_minor_units(minor: i64, currency_code: CurrencyCode) -> Self {
        Self::new(Decimal::new(minor, currency_code.exponent()), currency_code)
    }
}

impl fmt::Display for Price {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let dp = self.currency_code.exponent();
        write!(f, "{} {:.*}", self.currency_code, dp as usize, self.amount)
    }
}

/// Error returned when a currency code is not supported by the shop.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unsupported currency code: {0}")]
pub struct CurrencyCodeError(pub String);

/// ISO 4217 currency codes the shop can settle in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "UPPERCASE")]
pub enum CurrencyCode {
    #[default]
    USD,
    EUR,
    GBP,
    CAD,
    AUD,
    AED,
    MYR,
    SAR,
}

impl CurrencyCode {
    /// Uppercase ISO code (`"USD"`).
    #[must_use]
    pub const fn code(self) -> &'static str {
        match self {
            Self::USD => "USD",
            Self::EUR => "EUR",
            Self::GBP => "GBP",
            Self::CAD => "CAD",
            Self::AUD => "AUD",
            Self::AED => "AED",
            Self::MYR => "MYR",
            Self::SAR => "SAR",
        }
    }

    /// Number of decimal places in the minor unit.
    #[must_use]
    pub const fn exponent(self) -> u32 {
        2
    }
}

impl fmt::Display for CurrencyCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl FromStr for CurrencyCode {
    type Err = CurrencyCodeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "USD" => Ok(Self::USD),
            "EUR" => Ok(Self::EUR),
            "GBP" => Ok(Self::GBP),
            "CAD" => Ok(Self::CAD),
            "AUD" => Ok(Self::AUD),
            "AED" => Ok(Self::AED),
            "MYR" => Ok(Self::MYR),
            "SAR" => Ok(Self::SAR),
            other => Err(CurrencyCodeError(other.to_owned())),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_times_and_add() {
        let unit = Price::new(Decimal::new(1999, 2), CurrencyCode::USD);
        let total = unit.times(3).checked_add(Price::zero(CurrencyCode::USD)).unwrap();
        assert_eq!(total.amount, Decimal::new(5997, 2));
    }

    #[test]
    fn test_add_rejects_currency_mismatch() {
        let usd = Price::zero(CurrencyCode::USD);
        let eur = Price::zero(CurrencyCode::EUR);
        assert!(usd.checked_add(eur).is_none());
    }

    #[test]
    fn test_minor_units() {
        let price = Price::new(Decimal::new(4250, 2), CurrencyCode::GBP);
        assert_eq!(price.to_minor_units(), Some(4250));
        assert_eq!(Price::from_minor_units(4250, CurrencyCode::GBP), price);

        let too_precise = Price::new(Decimal::new(10_001, 3), CurrencyCode::GBP);
        assert_eq!(too_precise.to_minor_units(), None);
    }

    #[test]
    fn test_currency_parse_is_case_insensitive() {
        assert_eq!("usd".parse::<CurrencyCode>().unwrap(), CurrencyCode::USD);
        assert_eq!("MYR".parse::<CurrencyCode>().unwrap(), CurrencyCode::MYR);
        assert!("XYZ".parse::<CurrencyCode>().is_err());
    }

    #[test]
    fn test_display() {
        let price = Price::new(Decimal::new(200, 0), CurrencyCode::USD);
        assert_eq!(price.to_string(), "USD 200.00");
    }
}
