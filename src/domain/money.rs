use std::fmt;
use std::str::FromStr;

use rust_decimal::Decimal;

/// Amounts are exact decimals in the marketplace's native unit (e.g. "0.5" ETH).
/// Floating point is never used for principal or rates.
pub type Amount = Decimal;

/// Interest rate expressed as a percentage, e.g. `5` means 5%.
pub type Rate = Decimal;

/// Parse a decimal string into an amount.
/// Example: "2.0" -> 2.0, " 0.5 " -> 0.5, "-1" -> -1
pub fn parse_amount(input: &str) -> Result<Amount, ParseAmountError> {
    let input = input.trim();
    if input.is_empty() {
        return Err(ParseAmountError::Empty);
    }
    Decimal::from_str(input).map_err(|_| ParseAmountError::InvalidFormat(input.to_string()))
}

/// Format an amount without trailing zeros, keeping at least one decimal place.
/// Example: 2 -> "2.0", 1.50 -> "1.5", 0.125 -> "0.125"
pub fn format_amount(amount: Amount) -> String {
    let normalized = amount.normalize();
    if normalized.scale() == 0 {
        format!("{}.0", normalized)
    } else {
        normalized.to_string()
    }
}

/// Format an optional rate the way market panels show it: two decimals, or "N/A".
pub fn format_rate(rate: Option<Rate>) -> String {
    match rate {
        Some(rate) => format!("{:.2}%", rate.round_dp(2)),
        None => "N/A".to_string(),
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParseAmountError {
    Empty,
    InvalidFormat(String),
}

impl fmt::Display for ParseAmountError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParseAmountError::Empty => write!(f, "amount is empty"),
            ParseAmountError::InvalidFormat(input) => write!(f, "invalid amount format: '{}'", input),
        }
    }
}

impl std::error::Error for ParseAmountError {}

#[cfg(test)]
mod tests {
    use rust_decimal_macros::dec;

    use super::*;

    #[test]
    fn test_parse_amount() {
        assert_eq!(parse_amount("2.0"), Ok(dec!(2.0)));
        assert_eq!(parse_amount(" 0.5 "), Ok(dec!(0.5)));
        assert_eq!(parse_amount("100"), Ok(dec!(100)));
        assert_eq!(parse_amount("-1.25"), Ok(dec!(-1.25)));
    }

    #[test]
    fn test_parse_amount_invalid() {
        assert_eq!(parse_amount(""), Err(ParseAmountError::Empty));
        assert!(parse_amount("abc").is_err());
        assert!(parse_amount("1.2.3").is_err());
    }

    #[test]
    fn test_format_amount() {
        assert_eq!(format_amount(dec!(2)), "2.0");
        assert_eq!(format_amount(dec!(2.00)), "2.0");
        assert_eq!(format_amount(dec!(1.50)), "1.5");
        assert_eq!(format_amount(dec!(0.125)), "0.125");
    }

    #[test]
    fn test_format_rate() {
        assert_eq!(format_rate(Some(dec!(6))), "6.00%");
        assert_eq!(format_rate(Some(dec!(5.556))), "5.56%");
        assert_eq!(format_rate(None), "N/A");
    }
}
