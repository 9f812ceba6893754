use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use std::str::FromStr;

/// Converts a tote pool dollar value (as returned by upstream, e.g. "1234.50")
/// into integer cents. All downstream money math operates on cents (§4.B).
pub fn dollars_to_cents(value: &str) -> Result<i64, ConversionError> {
    let decimal = Decimal::from_str(value.trim())
        .map_err(|e| ConversionError::InvalidDecimal(e.to_string()))?;
    decimal_to_cents(decimal)
}

pub fn decimal_to_cents(value: Decimal) -> Result<i64, ConversionError> {
    let cents = (value * Decimal::from(100)).round();
    cents.to_i64().ok_or(ConversionError::Overflow)
}

pub fn cents_to_decimal(cents: i64) -> Decimal {
    Decimal::from(cents) / Decimal::from(100)
}

pub fn parse_odds(value: &str) -> Result<Decimal, ConversionError> {
    Decimal::from_str(value.trim()).map_err(|e| ConversionError::InvalidDecimal(e.to_string()))
}

#[derive(Debug, thiserror::Error)]
pub enum ConversionError {
    #[error("invalid decimal: {0}")]
    InvalidDecimal(String),
    #[error("overflow in conversion")]
    Overflow,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dollars_to_cents_rounds_to_nearest_cent() {
        assert_eq!(dollars_to_cents("500.00").unwrap(), 50_000);
        assert_eq!(dollars_to_cents("12.345").unwrap(), 1_235);
    }

    #[test]
    fn cents_to_decimal_round_trips() {
        assert_eq!(cents_to_decimal(50_000), Decimal::from_str("500").unwrap());
    }

    #[test]
    fn invalid_decimal_is_rejected() {
        assert!(dollars_to_cents("not-a-number").is_err());
    }
}
