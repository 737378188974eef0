//! Amount parsing
//!
//! Backend amounts arrive as JSON numbers or numeric strings. Anything else
//! is an [`InvalidAmount`]; callers decide what to do with it (the
//! aggregator counts it and contributes zero).

use std::str::FromStr;

use rust_decimal::Decimal;
use serde_json::Value;

/// Why an amount could not be used
#[derive(Debug, Clone, PartialEq)]
pub enum InvalidAmount {
    /// Field absent or null
    Missing,
    /// Not a number (bool, object, garbage string, ...)
    NotNumeric(String),
    /// Numeric but outside what a decimal can hold
    OutOfRange(String),
    /// Amounts are magnitudes, a sign is never valid
    Negative(Decimal),
}

impl std::fmt::Display for InvalidAmount {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            InvalidAmount::Missing => write!(f, "missing amount"),
            InvalidAmount::NotNumeric(raw) => write!(f, "non-numeric amount {}", raw),
            InvalidAmount::OutOfRange(raw) => write!(f, "amount out of range {}", raw),
            InvalidAmount::Negative(value) => write!(f, "negative amount {}", value),
        }
    }
}

/// Parse a raw JSON amount into a non-negative decimal
pub fn parse_amount(raw: &Value) -> Result<Decimal, InvalidAmount> {
    let value = match raw {
        Value::Null => return Err(InvalidAmount::Missing),
        Value::Number(n) => {
            let text = n.to_string();
            parse_decimal(&text).ok_or(InvalidAmount::OutOfRange(text))?
        }
        Value::String(s) => {
            let text = s.trim();
            if text.is_empty() {
                return Err(InvalidAmount::Missing);
            }
            parse_decimal(text).ok_or_else(|| InvalidAmount::NotNumeric(s.clone()))?
        }
        other => return Err(InvalidAmount::NotNumeric(other.to_string())),
    };

    if value.is_sign_negative() && !value.is_zero() {
        return Err(InvalidAmount::Negative(value));
    }

    Ok(value)
}

/// Parse user input (e.g. a CLI argument) with the same rules
pub fn parse_amount_str(input: &str) -> Result<Decimal, InvalidAmount> {
    parse_amount(&Value::String(input.to_string()))
}

fn parse_decimal(text: &str) -> Option<Decimal> {
    Decimal::from_str(text)
        .or_else(|_| Decimal::from_scientific(text))
        .ok()
}
