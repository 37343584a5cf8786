//! Type-safe price representation using decimal arithmetic.
//!
//! Prices are whole-rupee amounts in practice but are stored as
//! [`Decimal`] so that paise never go through floating point. On the wire a
//! price is a plain JSON number (`500`, `1299.5`) because that is what the
//! catalog files and the checkout form exchange; strings such as `"500"` are
//! accepted on input as well.

use core::fmt;
use core::iter::Sum;
use core::ops::{Add, Sub};

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// A price in Indian rupees.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Price(#[serde(serialize_with = "rust_decimal::serde::float::serialize")] Decimal);

impl Price {
    /// Zero rupees.
    pub const ZERO: Self = Self(Decimal::ZERO);

    /// Create a price from a decimal amount.
    #[must_use]
    pub const fn new(amount: Decimal) -> Self {
        Self(amount)
    }

    /// Create a price from a whole number of rupees.
    #[must_use]
    pub fn from_rupees(rupees: i64) -> Self {
        Self(Decimal::from(rupees))
    }

    /// The underlying decimal amount.
    #[must_use]
    pub const fn amount(&self) -> Decimal {
        self.0
    }

    /// Price of `quantity` units.
    #[must_use]
    pub fn times(&self, quantity: u32) -> Self {
        Self(self.0 * Decimal::from(quantity))
    }

    /// Absolute difference between two prices.
    #[must_use]
    pub fn abs_diff(&self, other: Self) -> Self {
        Self((self.0 - other.0).abs())
    }

    /// Whether the amount is strictly negative.
    #[must_use]
    pub fn is_negative(&self) -> bool {
        self.0.is_sign_negative() && !self.0.is_zero()
    }

    /// Format with the rupee sign and Indian digit grouping, e.g. `₹1,50,000`.
    ///
    /// Fractional amounts keep two decimal places (`₹1,299.50`).
    #[must_use]
    pub fn display_inr(&self) -> String {
        let rounded = self.0.round_dp(2).normalize();
        let negative = rounded.is_sign_negative() && !rounded.is_zero();
        let text = rounded.abs().to_string();
        let (whole, fraction) = text.split_once('.').unwrap_or((text.as_str(), ""));

        let mut out = String::from(if negative { "-₹" } else { "₹" });
        out.push_str(&group_indian(whole));
        if !fraction.is_empty() {
            out.push('.');
            out.push_str(fraction);
            if fraction.len() == 1 {
                out.push('0');
            }
        }
        out
    }
}

/// Insert Indian-style separators: last three digits, then groups of two.
fn group_indian(digits: &str) -> String {
    if digits.len() <= 3 {
        return digits.to_string();
    }
    let (head, tail) = digits.split_at(digits.len() - 3);
    let mut groups: Vec<&str> = Vec::new();
    let mut rest = head;
    while rest.len() > 2 {
        let (left, right) = rest.split_at(rest.len() - 2);
        groups.push(right);
        rest = left;
    }
    if !rest.is_empty() {
        groups.push(rest);
    }
    groups.reverse();
    format!("{},{tail}", groups.join(","))
}

impl fmt::Display for Price {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.normalize())
    }
}

impl core::str::FromStr for Price {
    type Err = rust_decimal::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim().parse::<Decimal>().map(Self)
    }
}

impl From<Decimal> for Price {
    fn from(amount: Decimal) -> Self {
        Self(amount)
    }
}

impl From<Price> for Decimal {
    fn from(price: Price) -> Self {
        price.0
    }
}

impl Add for Price {
    type Output = Self;

    fn add(self, rhs: Self) -> Self {
        Self(self.0 + rhs.0)
    }
}

impl Sub for Price {
    type Output = Self;

    fn sub(self, rhs: Self) -> Self {
        Self(self.0 - rhs.0)
    }
}

impl Sum for Price {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Self::ZERO, Add::add)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_deserialize_number_and_string() {
        let a: Price = serde_json::from_str("500").unwrap();
        let b: Price = serde_json::from_str("\"500\"").unwrap();
        let c: Price = serde_json::from_str("1299.5").unwrap();
        assert_eq!(a, Price::from_rupees(500));
        assert_eq!(a, b);
        assert_eq!(c.amount(), Decimal::new(12995, 1));
    }

    #[test]
    fn test_serializes_as_number() {
        let json = serde_json::to_value(Price::from_rupees(500)).unwrap();
        assert!(json.is_number());
        assert!((json.as_f64().unwrap() - 500.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_times_and_sum() {
        let total: Price = [Price::from_rupees(500).times(2), Price::from_rupees(60)]
            .into_iter()
            .sum();
        assert_eq!(total, Price::from_rupees(1060));
    }

    #[test]
    fn test_display_inr_grouping() {
        assert_eq!(Price::from_rupees(0).display_inr(), "₹0");
        assert_eq!(Price::from_rupees(999).display_inr(), "₹999");
        assert_eq!(Price::from_rupees(1500).display_inr(), "₹1,500");
        assert_eq!(Price::from_rupees(150_000).display_inr(), "₹1,50,000");
        assert_eq!(Price::from_rupees(12_345_678).display_inr(), "₹1,23,45,678");
        assert_eq!(Price::new(Decimal::new(12995, 1)).display_inr(), "₹1,299.50");
    }

    #[test]
    fn test_from_str() {
        assert_eq!(" 60 ".parse::<Price>().unwrap(), Price::from_rupees(60));
        assert!("sixty".parse::<Price>().is_err());
    }

    #[test]
    fn test_abs_diff() {
        let a = Price::from_rupees(1000);
        let b = Price::from_rupees(1001);
        assert_eq!(a.abs_diff(b), Price::from_rupees(1));
        assert_eq!(b.abs_diff(a), Price::from_rupees(1));
    }
}
