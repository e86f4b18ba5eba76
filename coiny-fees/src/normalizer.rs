use serde_json::Value;
use std::collections::BTreeMap;

use crate::{
    error::{FeeError, Result},
    fee_table::FeeTable,
};

/// Converted values this close to a whole number snap to it before rounding up.
const SNAP_EPSILON: f64 = 1e-9;

/// How a provider's native fee unit maps onto sat/vB.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum UnitConversion {
    /// Provider already reports sat/vB.
    Identity,
    /// Divide by the factor, e.g. 1000 for sat/kB.
    DivideBy(f64),
    /// Multiply by the factor, e.g. 100_000 for BTC/kvB.
    MultiplyBy(f64),
}

impl UnitConversion {
    fn apply(self, value: f64) -> f64 {
        match self {
            UnitConversion::Identity => value,
            UnitConversion::DivideBy(factor) => value / factor,
            UnitConversion::MultiplyBy(factor) => value * factor,
        }
    }

    fn validate(self) -> Result<()> {
        match self {
            UnitConversion::Identity => Ok(()),
            UnitConversion::DivideBy(factor) | UnitConversion::MultiplyBy(factor) => {
                if factor.is_finite() && factor > 0.0 {
                    Ok(())
                } else {
                    Err(FeeError::invalid_input(format!(
                        "unit conversion factor must be positive, got {factor}"
                    )))
                }
            }
        }
    }
}

/// Converts a provider's raw table into canonical sat/vB units.
///
/// Keys are the confirmation targets exactly as they appear in the provider's
/// JSON. Values may be JSON numbers or numeric strings. Every converted value
/// is rounded up, never down: an underestimated fee risks a stuck transaction.
///
/// # Example
/// ```
/// use coiny_fees::{normalize, UnitConversion};
/// use serde_json::json;
/// use std::collections::BTreeMap;
///
/// let raw: BTreeMap<String, serde_json::Value> =
///     serde_json::from_value(json!({"2": 10500, "6": "4000"})).unwrap();
/// let table = normalize(&raw, UnitConversion::DivideBy(1000.0)).unwrap();
/// assert_eq!(table.get(2), Some(11.0));
/// assert_eq!(table.get(6), Some(4.0));
/// ```
pub fn normalize(raw: &BTreeMap<String, Value>, conversion: UnitConversion) -> Result<FeeTable> {
    conversion.validate()?;

    let mut table = FeeTable::new();
    for (key, value) in raw {
        let target = parse_target(key)?;
        let native = parse_fee(key, value)?;
        table.insert(target, round_up(conversion.apply(native)));
    }
    Ok(table)
}

fn parse_target(key: &str) -> Result<u32> {
    match key.trim().parse::<u32>() {
        Ok(target) if target > 0 => Ok(target),
        _ => Err(FeeError::invalid_input(format!(
            "confirmation target must be a positive integer, got {key:?}"
        ))),
    }
}

fn parse_fee(key: &str, value: &Value) -> Result<f64> {
    let fee = match value {
        Value::Number(number) => number.as_f64(),
        Value::String(text) => text.trim().parse::<f64>().ok(),
        _ => None,
    }
    .ok_or_else(|| {
        FeeError::invalid_input(format!("fee for target {key} is not numeric: {value}"))
    })?;

    if !fee.is_finite() || fee < 0.0 {
        return Err(FeeError::invalid_input(format!(
            "fee for target {key} must be a non-negative number, got {fee}"
        )));
    }
    Ok(fee)
}

fn round_up(value: f64) -> f64 {
    let nearest = value.round();
    if (value - nearest).abs() < SNAP_EPSILON {
        nearest
    } else {
        value.ceil()
    }
}
