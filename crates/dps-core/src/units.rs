//! Conversion between protocol base units and device milli-units.
//!
//! The SCPI side speaks volts and amps as floating point; the device speaks
//! integer millivolts and milliamps. Converting in rounds half away from
//! zero, converting out is an exact division by 1000.

use thiserror::Error;

const MILLI_PER_UNIT: f64 = 1000.0;

/// Errors converting a base-unit value to milli-units.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum UnitError {
    #[error("Value is not a finite number")]
    NotFinite,

    #[error("Value {0} does not fit in milli-units")]
    OutOfRange(f64),
}

/// Converts a base-unit value (volts, amps) to device milli-units.
pub fn to_milli(value: f64) -> Result<i32, UnitError> {
    if !value.is_finite() {
        return Err(UnitError::NotFinite);
    }

    let scaled = (value * MILLI_PER_UNIT).round();
    if scaled < f64::from(i32::MIN) || scaled > f64::from(i32::MAX) {
        return Err(UnitError::OutOfRange(value));
    }

    // Range checked above, the cast cannot truncate.
    Ok(scaled as i32)
}

/// Converts device milli-units to a base-unit value.
pub fn from_milli(milli: i32) -> f64 {
    f64::from(milli) / MILLI_PER_UNIT
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exact_values() {
        assert_eq!(to_milli(0.5), Ok(500));
        assert_eq!(to_milli(3.3), Ok(3300));
        assert_eq!(to_milli(0.0), Ok(0));
        assert_eq!(to_milli(-1.25), Ok(-1250));
    }

    #[test]
    fn test_half_milli_rounds_away_from_zero() {
        assert_eq!(to_milli(1.0005), Ok(1001));
        assert_eq!(to_milli(1.2345), Ok(1235));
        assert_eq!(to_milli(0.0005), Ok(1));
        assert_eq!(to_milli(0.0025), Ok(3));
        assert_eq!(to_milli(4.9995), Ok(5000));
        assert_eq!(to_milli(-0.0005), Ok(-1));
    }

    #[test]
    fn test_below_half_milli_rounds_down() {
        assert_eq!(to_milli(1.0004), Ok(1000));
        assert_eq!(to_milli(0.0004), Ok(0));
    }

    #[test]
    fn test_rejects_non_finite() {
        assert_eq!(to_milli(f64::NAN), Err(UnitError::NotFinite));
        assert_eq!(to_milli(f64::INFINITY), Err(UnitError::NotFinite));
    }

    #[test]
    fn test_rejects_out_of_range() {
        assert!(matches!(to_milli(3.0e6), Err(UnitError::OutOfRange(_))));
        assert!(matches!(to_milli(-3.0e6), Err(UnitError::OutOfRange(_))));
    }

    #[test]
    fn test_from_milli() {
        assert_eq!(from_milli(500), 0.5);
        assert_eq!(from_milli(1234), 1.234);
        assert_eq!(from_milli(0), 0.0);
    }

    #[test]
    fn test_round_trip_within_one_milli() {
        let mut millivolts = 0;
        while millivolts <= 50_000 {
            let volts = f64::from(millivolts) / 1000.0 + 0.0003;
            let back = from_milli(to_milli(volts).unwrap());
            assert!((back - volts).abs() <= 0.001, "{volts} -> {back}");
            millivolts += 997;
        }
    }
}
