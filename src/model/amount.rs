//! Amount type for handling monetary values typed by people.
//!
//! Amounts in the sheet are whatever somebody typed into a cell: `S/ 1.234,56`, `$1,234.56`,
//! `-50`, or nothing at all. This module provides `parse_amount`, which never fails, and the
//! `Amount` type which wraps `Decimal` and remembers how the value should be displayed.

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::convert::Infallible;
use std::fmt;
use std::str::FromStr;

/// The currency marker used when displaying amounts.
pub const CURRENCY: &str = "S/";

/// Parses a money string into a signed `Decimal`.
///
/// - Empty input is zero.
/// - Input that is already a plain number is returned as-is.
/// - Otherwise currency markers and whitespace are removed and the decimal separator is
///   detected: whichever of `.` and `,` occurs last is the decimal separator, earlier occurrences
///   of that symbol are thousands separators, and the other symbol is dropped.
/// - A number in exponent form that is too large for `Decimal` is zero.
/// - Anything that still does not parse is zero.
///
/// # Examples
/// ```
/// # use sheet_budget::model::parse_amount;
/// # use rust_decimal::Decimal;
/// assert_eq!(parse_amount("1,234.56"), Decimal::new(123456, 2));
/// assert_eq!(parse_amount("S/ 1.234,56"), Decimal::new(123456, 2));
/// assert_eq!(parse_amount("abc"), Decimal::ZERO);
/// ```
pub fn parse_amount(raw: impl AsRef<str>) -> Decimal {
    let trimmed = raw.as_ref().trim();
    if trimmed.is_empty() {
        return Decimal::ZERO;
    }

    if let Some(value) = parse_plain(trimmed) {
        return value;
    }
    if is_scientific(trimmed) {
        // Out of range. Stripping the exponent marker would leave a different number.
        return Decimal::ZERO;
    }

    // Keep only what can be part of a number.
    let cleaned: String = trimmed
        .chars()
        .filter(|c| c.is_ascii_digit() || matches!(c, '.' | ',' | '-' | '+'))
        .collect();

    let normalized = match (cleaned.rfind('.'), cleaned.rfind(',')) {
        (Some(dot), Some(comma)) if comma > dot => keep_last_separator(&cleaned, ',', '.'),
        (Some(_), Some(_)) => keep_last_separator(&cleaned, '.', ','),
        (None, Some(_)) => keep_last_separator(&cleaned, ',', '.'),
        (Some(_), None) => keep_last_separator(&cleaned, '.', ','),
        (None, None) => cleaned,
    };

    parse_plain(&normalized).unwrap_or(Decimal::ZERO)
}

/// Parses `s` if it is a plain number such as `-1234.5` or `1e3`.
fn parse_plain(s: &str) -> Option<Decimal> {
    let s = s.strip_prefix('+').unwrap_or(s);
    if let Ok(value) = Decimal::from_str(s) {
        return Some(value);
    }
    if s.contains(['e', 'E']) {
        return Decimal::from_scientific(s).ok();
    }
    None
}

/// True for inputs like `1e30` or `-2.5E+40`: only digits, signs, dots and one exponent marker.
fn is_scientific(s: &str) -> bool {
    s.chars().filter(|c| matches!(c, 'e' | 'E')).count() == 1
        && s.chars()
            .all(|c| c.is_ascii_digit() || matches!(c, '.' | '-' | '+' | 'e' | 'E'))
}

/// Drops every `other` and every `decimal` except the last one, which becomes a `.`.
fn keep_last_separator(s: &str, decimal: char, other: char) -> String {
    let last = s.rfind(decimal);
    s.char_indices()
        .filter_map(|(ix, c)| {
            if c == other {
                None
            } else if c == decimal {
                (Some(ix) == last).then_some('.')
            } else {
                Some(c)
            }
        })
        .collect()
}

/// Represents how amounts should be written back out.
///
/// # Examples
///  - `AmountFormat{ currency: true, grouping: true }` -> `-S/ 60,000.00`
///  - `AmountFormat{ currency: false, grouping: true }` -> `-60,000.00`
///  - `AmountFormat{ currency: false, grouping: false }` -> `-60000`
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct AmountFormat {
    currency: bool,
    grouping: bool,
}

impl AmountFormat {
    /// The format used in reports: currency marker, grouping and two decimals.
    pub const DISPLAY: AmountFormat = AmountFormat {
        currency: true,
        grouping: true,
    };

    /// The format used for writing cells: a plain number that `parse_amount` reads back exactly.
    pub const PLAIN: AmountFormat = AmountFormat {
        currency: false,
        grouping: false,
    };
}

impl Default for AmountFormat {
    fn default() -> Self {
        AmountFormat::PLAIN
    }
}

/// Represents a money amount. Negative values are expenses, positive values are income.
///
/// Formatting is not significant for equality: two amounts are equal when their values are.
///
/// ```
/// # use sheet_budget::model::Amount;
/// let a: Amount = "-S/ 5.000,00".parse().unwrap();
/// let b: Amount = "-5000".parse().unwrap();
/// assert_eq!(a, b);
/// assert_eq!(b.to_string(), "-5000");
/// assert_eq!(b.display().to_string(), "-S/ 5,000.00");
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct Amount {
    value: Decimal,
    format: AmountFormat,
}

impl Amount {
    pub const ZERO: Amount = Amount::new(Decimal::ZERO);

    /// Creates a new `Amount` that is written as a plain number.
    pub const fn new(value: Decimal) -> Self {
        Self {
            value,
            format: AmountFormat::PLAIN,
        }
    }

    /// Parses leniently, see `parse_amount`.
    pub fn parse(raw: impl AsRef<str>) -> Self {
        Self::new(parse_amount(raw))
    }

    pub fn value(&self) -> Decimal {
        self.value
    }

    /// Returns the same value formatted for people, e.g. `S/ 1,234.50`.
    pub fn display(&self) -> Self {
        Self {
            value: self.value,
            format: AmountFormat::DISPLAY,
        }
    }

    pub fn abs(&self) -> Self {
        Self {
            value: self.value.abs(),
            format: self.format,
        }
    }

    /// Returns an amount with the same magnitude and the given sign.
    pub fn with_sign(&self, negative: bool) -> Self {
        let magnitude = self.value.abs();
        Self {
            value: if negative { -magnitude } else { magnitude },
            format: self.format,
        }
    }

    pub fn is_zero(&self) -> bool {
        self.value.is_zero()
    }

    /// Returns true if the amount is greater than zero.
    pub fn is_positive(&self) -> bool {
        !self.is_zero() && self.value.is_sign_positive()
    }

    /// Returns true if the amount is less than zero.
    pub fn is_negative(&self) -> bool {
        !self.is_zero() && self.value.is_sign_negative()
    }
}

impl PartialEq for Amount {
    fn eq(&self, other: &Self) -> bool {
        self.value == other.value
    }
}

impl Eq for Amount {}

impl PartialOrd for Amount {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Amount {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.value.cmp(&other.value)
    }
}

impl FromStr for Amount {
    type Err = Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Amount::parse(s))
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.is_negative() { "-" } else { "" };
        let magnitude = self.value.abs();
        let currency = if self.format.currency {
            format!("{CURRENCY} ")
        } else {
            String::new()
        };

        if self.format.grouping {
            write!(
                f,
                "{sign}{currency}{}",
                format_num::format_num!(",.2", magnitude.to_f64().unwrap_or_default())
            )
        } else {
            write!(f, "{sign}{currency}{}", magnitude.normalize())
        }
    }
}

impl Serialize for Amount {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&Amount::new(self.value).to_string())
    }
}

impl<'de> Deserialize<'de> for Amount {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Ok(Amount::parse(s))
    }
}

impl From<Decimal> for Amount {
    fn from(value: Decimal) -> Self {
        Amount::new(value)
    }
}

impl From<Amount> for Decimal {
    fn from(amount: Amount) -> Self {
        amount.value()
    }
}

impl std::ops::Add for Amount {
    type Output = Amount;

    fn add(self, rhs: Self) -> Self::Output {
        Amount::new(self.value.saturating_add(rhs.value))
    }
}

/// Saturates at `Decimal::MAX` and `Decimal::MIN`, like `Add` and `Sub`.
impl std::ops::AddAssign for Amount {
    fn add_assign(&mut self, rhs: Self) {
        self.value = self.value.saturating_add(rhs.value);
    }
}

impl std::ops::Sub for Amount {
    type Output = Amount;

    fn sub(self, rhs: Self) -> Self::Output {
        Amount::new(self.value.saturating_sub(rhs.value))
    }
}

impl std::iter::Sum for Amount {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Amount::ZERO, |acc, a| acc + a)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    /// Inputs used for the separator and idempotence checks.
    const FIXTURES: &[&str] = &[
        "",
        "0",
        "1234",
        "1234.5",
        "-87.43",
        "1,234.56",
        "1.234,56",
        "-1,234.56",
        "S/ 1.234,56",
        "S/ -50",
        "$1,234,567.89",
        "1.234.567,89",
        "12,5",
        "1.234.567",
        "abc",
        "S/ ",
        "  42  ",
        "+15",
        "1e3",
    ];

    #[test]
    fn test_parse_empty() {
        assert_eq!(parse_amount(""), Decimal::ZERO);
        assert_eq!(parse_amount("   "), Decimal::ZERO);
    }

    #[test]
    fn test_parse_missing_value() {
        let missing: Option<&str> = None;
        assert_eq!(parse_amount(missing.unwrap_or_default()), Decimal::ZERO);
    }

    #[test]
    fn test_parse_garbage_is_zero() {
        assert_eq!(parse_amount("abc"), Decimal::ZERO);
        assert_eq!(parse_amount("S/ "), Decimal::ZERO);
        assert_eq!(parse_amount("--5"), Decimal::ZERO);
        assert_eq!(parse_amount("."), Decimal::ZERO);
    }

    #[test]
    fn test_parse_plain_fast_path() {
        assert_eq!(parse_amount("1234"), dec("1234"));
        assert_eq!(parse_amount("-50.25"), dec("-50.25"));
        assert_eq!(parse_amount(" 42 "), dec("42"));
        assert_eq!(parse_amount("+15"), dec("15"));
        assert_eq!(parse_amount("1e3"), dec("1000"));
    }

    #[test]
    fn test_parse_exponent_out_of_range_is_zero() {
        assert_eq!(parse_amount("1e30"), Decimal::ZERO);
        assert_eq!(parse_amount("-2.5E+40"), Decimal::ZERO);
        assert_eq!(parse_amount("2.5E-3"), dec("0.0025"));
    }

    #[test]
    fn test_separator_styles_agree() {
        let expected = dec("1234.56");
        assert_eq!(parse_amount("1,234.56"), expected);
        assert_eq!(parse_amount("1.234,56"), expected);
        assert_eq!(parse_amount("S/ 1.234,56"), expected);
        assert_eq!(parse_amount("$1,234.56"), expected);
    }

    #[test]
    fn test_parse_many_thousands_separators() {
        assert_eq!(parse_amount("$1,234,567.89"), dec("1234567.89"));
        assert_eq!(parse_amount("1.234.567,89"), dec("1234567.89"));
    }

    #[test]
    fn test_parse_single_separator_is_decimal() {
        assert_eq!(parse_amount("12,5"), dec("12.5"));
        assert_eq!(parse_amount("1.234.567"), dec("1234.567"));
    }

    #[test]
    fn test_parse_negative_with_currency() {
        assert_eq!(parse_amount("S/ -50"), dec("-50"));
        assert_eq!(parse_amount("-S/ 1.234,50"), dec("-1234.50"));
    }

    #[test]
    fn test_idempotent() {
        for fixture in FIXTURES {
            let once = parse_amount(fixture);
            let twice = parse_amount(once.to_string());
            assert_eq!(once, twice, "not idempotent for {fixture:?}");
        }
    }

    #[test]
    fn test_amount_display_plain() {
        assert_eq!(Amount::parse("-1.234,50").to_string(), "-1234.5");
        assert_eq!(Amount::parse("0").to_string(), "0");
    }

    #[test]
    fn test_amount_display_currency() {
        assert_eq!(
            Amount::parse("-1234.5").display().to_string(),
            "-S/ 1,234.50"
        );
        assert_eq!(Amount::ZERO.display().to_string(), "S/ 0.00");
    }

    #[test]
    fn test_plain_display_round_trips() {
        for fixture in FIXTURES {
            let a = Amount::parse(fixture);
            assert_eq!(Amount::parse(a.to_string()), a);
        }
    }

    #[test]
    fn test_sign_helpers() {
        let a = Amount::parse("25");
        assert!(a.is_positive());
        assert!(a.with_sign(true).is_negative());
        assert_eq!(a.with_sign(true).abs(), a);
        assert!(!Amount::ZERO.is_positive());
        assert!(!Amount::ZERO.is_negative());
    }

    #[test]
    fn test_equality_ignores_format() {
        let a = Amount::parse("S/ 50.00");
        assert_eq!(a, a.display());
    }

    #[test]
    fn test_serde() {
        let a = Amount::parse("-S/ 1,000.50");
        let json = serde_json::to_string(&a).unwrap();
        assert_eq!(json, "\"-1000.5\"");
        let back: Amount = serde_json::from_str(&json).unwrap();
        assert_eq!(back, a);
    }

    #[test]
    fn test_arithmetic_saturates() {
        let max = Amount::new(Decimal::MAX);
        let min = Amount::new(Decimal::MIN);
        assert_eq!(max + Amount::parse("1"), max);
        assert_eq!(min - Amount::parse("1"), min);

        let mut total = Amount::parse("50000000000000000000000000000");
        total += Amount::parse("50000000000000000000000000000");
        assert_eq!(total, max);

        let total: Amount = [max, max, Amount::parse("-1")].into_iter().sum();
        assert_eq!(total, max - Amount::parse("1"));
    }

    #[test]
    fn test_sum() {
        let total: Amount = ["10", "-2.5", "1,5"].iter().map(Amount::parse).sum();
        assert_eq!(total.value(), dec("9"));
    }
}
