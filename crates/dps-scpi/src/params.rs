//! Program message parameters.

use std::collections::VecDeque;

use crate::error::ScpiError;

/// The parameters of one program message, consumed front to back.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Parameters {
    tokens: VecDeque<String>,
}

impl Parameters {
    /// Splits the text after a program header into parameters.
    ///
    /// Parameters are comma separated; commas inside double-quoted
    /// strings do not split.
    pub fn parse(text: &str) -> Result<Self, ScpiError> {
        let text = text.trim();
        if text.is_empty() {
            return Ok(Self::default());
        }

        let pieces = split_unquoted(text, ',').ok_or(ScpiError::SyntaxError)?;
        let tokens = pieces
            .into_iter()
            .map(|piece| piece.trim().to_string())
            .collect();
        Ok(Self { tokens })
    }

    /// Returns true if parameters remain unconsumed.
    pub fn has_remaining(&self) -> bool {
        !self.tokens.is_empty()
    }

    /// Consumes the next parameter as `T`.
    ///
    /// Returns `Ok(None)` when no parameter is left and `required` is false.
    pub fn next<T: FromParam>(&mut self, required: bool) -> Result<Option<T>, ScpiError> {
        match self.tokens.pop_front() {
            Some(token) if !token.is_empty() => T::from_param(&token).map(Some),
            _ if required => Err(ScpiError::MissingParameter),
            _ => Ok(None),
        }
    }
}

/// Splits `text` on `separator` outside of double-quoted strings.
///
/// Returns `None` when a quote is left open.
pub(crate) fn split_unquoted(text: &str, separator: char) -> Option<Vec<&str>> {
    let mut pieces = Vec::new();
    let mut in_quotes = false;
    let mut start = 0;

    for (index, c) in text.char_indices() {
        if c == '"' {
            in_quotes = !in_quotes;
        } else if c == separator && !in_quotes {
            pieces.push(text.get(start..index)?);
            start = index + c.len_utf8();
        }
    }

    if in_quotes {
        return None;
    }
    pieces.push(text.get(start..)?);
    Some(pieces)
}

/// Conversion from a single parameter token.
pub trait FromParam: Sized {
    fn from_param(token: &str) -> Result<Self, ScpiError>;
}

impl FromParam for i32 {
    fn from_param(token: &str) -> Result<Self, ScpiError> {
        if let Some(value) = parse_non_decimal(token) {
            return i32::try_from(value?).map_err(|_| ScpiError::DataOutOfRange);
        }
        if let Ok(value) = token.parse::<i32>() {
            return Ok(value);
        }

        // Decimal numeric data with an integral value (`50.0`, `5E1`).
        let value = parse_decimal(token)?;
        if value.fract() != 0.0 {
            return Err(ScpiError::DataTypeError);
        }
        if value < f64::from(i32::MIN) || value > f64::from(i32::MAX) {
            return Err(ScpiError::DataOutOfRange);
        }
        Ok(value as i32)
    }
}

impl FromParam for f64 {
    fn from_param(token: &str) -> Result<Self, ScpiError> {
        if let Some(value) = parse_non_decimal(token) {
            // Non-decimal data is at most 32 bits wide, the conversion is exact.
            return value.map(|v| v as f64);
        }
        parse_decimal(token)
    }
}

impl FromParam for bool {
    fn from_param(token: &str) -> Result<Self, ScpiError> {
        if token.eq_ignore_ascii_case("ON") {
            return Ok(true);
        }
        if token.eq_ignore_ascii_case("OFF") {
            return Ok(false);
        }
        f64::from_param(token).map(|value| value.round() != 0.0)
    }
}

fn parse_decimal(token: &str) -> Result<f64, ScpiError> {
    let starts_numeric = token
        .chars()
        .next()
        .is_some_and(|c| c.is_ascii_digit() || matches!(c, '+' | '-' | '.'));
    if !starts_numeric {
        return Err(ScpiError::DataTypeError);
    }
    let value = token.parse::<f64>().map_err(|_| ScpiError::DataTypeError)?;
    // `str::parse` also takes NaN, infinities and overflowing exponents.
    if !value.is_finite() {
        return Err(ScpiError::DataTypeError);
    }
    Ok(value)
}

/// Parses `#H`, `#Q` and `#B` non-decimal numeric data.
///
/// Returns `None` if the token is not non-decimal data at all.
fn parse_non_decimal(token: &str) -> Option<Result<i64, ScpiError>> {
    let rest = token.strip_prefix('#')?;
    let mut chars = rest.chars();
    let radix = match chars.next().map(|c| c.to_ascii_uppercase()) {
        Some('H') => 16,
        Some('Q') => 8,
        Some('B') => 2,
        _ => return Some(Err(ScpiError::DataTypeError)),
    };
    let digits = chars.as_str();
    Some(
        u32::from_str_radix(digits, radix)
            .map(i64::from)
            .map_err(|_| ScpiError::DataTypeError),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_splits_on_commas() {
        let mut params = Parameters::parse(" 1, 2.5 ,ON").unwrap();
        assert_eq!(params.next::<i32>(true), Ok(Some(1)));
        assert_eq!(params.next::<f64>(true), Ok(Some(2.5)));
        assert_eq!(params.next::<bool>(true), Ok(Some(true)));
        assert!(!params.has_remaining());
    }

    #[test]
    fn test_quoted_commas_do_not_split() {
        let params = Parameters::parse("\"a,b\",3").unwrap();
        assert_eq!(params.tokens.len(), 2);
        assert_eq!(Parameters::parse("\"open"), Err(ScpiError::SyntaxError));
    }

    #[test]
    fn test_missing_parameter() {
        let mut params = Parameters::parse("").unwrap();
        assert_eq!(params.next::<f64>(true), Err(ScpiError::MissingParameter));
        assert_eq!(params.next::<f64>(false), Ok(None));
    }

    #[test]
    fn test_empty_slot_is_missing() {
        let mut params = Parameters::parse(",5").unwrap();
        assert_eq!(params.next::<i32>(true), Err(ScpiError::MissingParameter));
        assert_eq!(params.next::<i32>(true), Ok(Some(5)));
    }

    #[test]
    fn test_int_forms() {
        assert_eq!(i32::from_param("-42"), Ok(-42));
        assert_eq!(i32::from_param("50.0"), Ok(50));
        assert_eq!(i32::from_param("5E1"), Ok(50));
        assert_eq!(i32::from_param("#H1F"), Ok(31));
        assert_eq!(i32::from_param("#B101"), Ok(5));
        assert_eq!(i32::from_param("#Q17"), Ok(15));
        assert_eq!(i32::from_param("2.5"), Err(ScpiError::DataTypeError));
        assert_eq!(i32::from_param("abc"), Err(ScpiError::DataTypeError));
        assert_eq!(i32::from_param("1E10"), Err(ScpiError::DataOutOfRange));
    }

    #[test]
    fn test_double_forms() {
        assert_eq!(f64::from_param("0.5"), Ok(0.5));
        assert_eq!(f64::from_param("+.5"), Ok(0.5));
        assert_eq!(f64::from_param("1.2E-3"), Ok(0.0012));
        assert_eq!(f64::from_param("#H10"), Ok(16.0));
        assert_eq!(f64::from_param("volts"), Err(ScpiError::DataTypeError));
        assert_eq!(f64::from_param("inf"), Err(ScpiError::DataTypeError));
        assert_eq!(f64::from_param("1.0V"), Err(ScpiError::DataTypeError));
    }

    #[test]
    fn test_bool_forms() {
        assert_eq!(bool::from_param("on"), Ok(true));
        assert_eq!(bool::from_param("OFF"), Ok(false));
        assert_eq!(bool::from_param("1"), Ok(true));
        assert_eq!(bool::from_param("0"), Ok(false));
        assert_eq!(bool::from_param("2"), Ok(true));
        assert_eq!(bool::from_param("maybe"), Err(ScpiError::DataTypeError));
    }

    #[test]
    fn test_non_finite_numbers_rejected() {
        for token in ["+NaN", "-inf", "+infinity", "1e999", "-1E400"] {
            assert_eq!(f64::from_param(token), Err(ScpiError::DataTypeError), "{token}");
            assert_eq!(bool::from_param(token), Err(ScpiError::DataTypeError), "{token}");
            assert_eq!(i32::from_param(token), Err(ScpiError::DataTypeError), "{token}");
        }
    }
}
