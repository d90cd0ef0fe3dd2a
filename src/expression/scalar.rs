//! Value-level SQL operations used by the interpreter: arithmetic,
//! comparison and casts. NULL handling is the caller's job; every function
//! here expects non-NULL operands.

use std::cmp::Ordering;

use crate::expression::error::{ExpressionError, ExpressionResult};
use crate::expression::operator::ArithmeticOperator;
use crate::types::data_type::MAX_SHORT_TIMESTAMP_PRECISION;
use crate::types::datetime::{
    format_date, format_timestamp, parse_date, parse_timestamp, rescale_factor, round_micros,
    MICROS_PER_DAY, PICOS_PER_MICRO,
};
use crate::types::data_type::MAX_TIMESTAMP_PRECISION;
use crate::types::{DataType, Value};

fn overflow(ty: &DataType) -> ExpressionError {
    ExpressionError::NumericOverflow {
        data_type: ty.to_string(),
    }
}

fn invalid_cast(value: &Value, target: &DataType) -> ExpressionError {
    ExpressionError::InvalidCast {
        value: format!("{:?}", value),
        target: target.to_string(),
    }
}

fn unsupported(what: &str, value: &Value, ty: &DataType) -> ExpressionError {
    ExpressionError::invalid(format!("{} not supported for {:?} of type {}", what, value, ty))
}

/// `10^exponent`, or `None` past the i128 range (exponent above 38)
fn pow10(exponent: u8) -> Option<i128> {
    10_i128.checked_pow(exponent as u32)
}

/// Integer division rounding half away from zero
fn round_div(numerator: i128, denominator: i128) -> Option<i128> {
    let quotient = numerator.checked_div(denominator)?;
    let remainder = numerator.checked_rem(denominator)?;
    if remainder.unsigned_abs() * 2 >= denominator.unsigned_abs() {
        quotient.checked_add(numerator.signum() * denominator.signum())
    } else {
        Some(quotient)
    }
}

fn rescale(unscaled: i128, from_scale: u8, to_scale: u8) -> Option<i128> {
    match to_scale.cmp(&from_scale) {
        Ordering::Equal => Some(unscaled),
        Ordering::Greater => unscaled.checked_mul(pow10(to_scale - from_scale)?),
        // Dividing by more than 10^38 rounds every i128 to zero.
        Ordering::Less => match pow10(from_scale - to_scale) {
            Some(factor) => round_div(unscaled, factor),
            None => Some(0),
        },
    }
}

fn check_precision(unscaled: i128, ty: &DataType) -> ExpressionResult<Value> {
    let precision = match ty {
        DataType::Decimal { precision, .. } => *precision,
        _ => return Err(overflow(ty)),
    };
    match pow10(precision) {
        Some(limit) if unscaled.unsigned_abs() >= limit.unsigned_abs() => Err(overflow(ty)),
        _ => Ok(Value::Decimal(unscaled)),
    }
}

fn check_integral(value: i64, ty: &DataType) -> ExpressionResult<Value> {
    match ty.integral_bounds() {
        Some((min, max)) if value >= min && value <= max => Ok(Value::Long(value)),
        _ => Err(overflow(ty)),
    }
}

fn to_real(value: f64) -> f64 {
    value as f32 as f64
}

/// Numeric value widened to a double
fn as_double(value: &Value, ty: &DataType) -> ExpressionResult<f64> {
    match (value, ty) {
        (Value::Long(v), _) => Ok(*v as f64),
        (Value::Double(v), _) => Ok(*v),
        (Value::Decimal(v), DataType::Decimal { scale, .. }) => Ok(*v as f64 / 10_f64.powi(*scale as i32)),
        _ => Err(unsupported("numeric conversion", value, ty)),
    }
}

/// Exact numeric value as an unscaled decimal with its scale
fn as_unscaled(value: &Value, ty: &DataType) -> ExpressionResult<(i128, u8)> {
    match (value, ty) {
        (Value::Long(v), ty) if ty.is_integral() => Ok((*v as i128, 0)),
        (Value::Decimal(v), DataType::Decimal { scale, .. }) => Ok((*v, *scale)),
        _ => Err(unsupported("decimal conversion", value, ty)),
    }
}

/// Apply an arithmetic operator to non-NULL operands
pub fn arithmetic(
    op: ArithmeticOperator,
    left: &Value,
    left_type: &DataType,
    right: &Value,
    right_type: &DataType,
    result_type: &DataType,
) -> ExpressionResult<Value> {
    match result_type {
        ty if ty.is_integral() || ty.is_interval() => {
            let (Value::Long(a), Value::Long(b)) = (left, right) else {
                return Err(unsupported(op.as_str(), left, left_type));
            };
            let result = match op {
                ArithmeticOperator::Add => a.checked_add(*b),
                ArithmeticOperator::Subtract => a.checked_sub(*b),
                ArithmeticOperator::Multiply => a.checked_mul(*b),
                ArithmeticOperator::Divide => {
                    if *b == 0 {
                        return Err(ExpressionError::DivisionByZero);
                    }
                    a.checked_div(*b)
                }
                ArithmeticOperator::Modulus => {
                    if *b == 0 {
                        return Err(ExpressionError::DivisionByZero);
                    }
                    a.checked_rem(*b)
                }
            };
            let result = result.ok_or_else(|| overflow(ty))?;
            if ty.is_interval() {
                Ok(Value::Long(result))
            } else {
                check_integral(result, ty)
            }
        }
        DataType::Double | DataType::Real => {
            let a = as_double(left, left_type)?;
            let b = as_double(right, right_type)?;
            let result = match op {
                ArithmeticOperator::Add => a + b,
                ArithmeticOperator::Subtract => a - b,
                ArithmeticOperator::Multiply => a * b,
                ArithmeticOperator::Divide => a / b,
                ArithmeticOperator::Modulus => a % b,
            };
            Ok(Value::Double(if *result_type == DataType::Real {
                to_real(result)
            } else {
                result
            }))
        }
        DataType::Decimal { scale, .. } => {
            let (a, a_scale) = as_unscaled(left, left_type)?;
            let (b, b_scale) = as_unscaled(right, right_type)?;
            let scale = *scale;
            let result = match op {
                ArithmeticOperator::Add | ArithmeticOperator::Subtract => {
                    let a = rescale(a, a_scale, scale).ok_or_else(|| overflow(result_type))?;
                    let b = rescale(b, b_scale, scale).ok_or_else(|| overflow(result_type))?;
                    if op == ArithmeticOperator::Add {
                        a.checked_add(b)
                    } else {
                        a.checked_sub(b)
                    }
                }
                // The raw product carries scale a_scale + b_scale, which may
                // exceed the result scale once that is capped.
                ArithmeticOperator::Multiply => a
                    .checked_mul(b)
                    .and_then(|product| rescale(product, a_scale + b_scale, scale)),
                ArithmeticOperator::Divide => {
                    if b == 0 {
                        return Err(ExpressionError::DivisionByZero);
                    }
                    let shift = (scale + b_scale).checked_sub(a_scale).ok_or_else(|| overflow(result_type))?;
                    let factor = pow10(shift).ok_or_else(|| overflow(result_type))?;
                    a.checked_mul(factor).and_then(|numerator| round_div(numerator, b))
                }
                ArithmeticOperator::Modulus => {
                    if b == 0 {
                        return Err(ExpressionError::DivisionByZero);
                    }
                    let a = rescale(a, a_scale, scale).ok_or_else(|| overflow(result_type))?;
                    let b = rescale(b, b_scale, scale).ok_or_else(|| overflow(result_type))?;
                    a.checked_rem(b)
                }
            };
            check_precision(result.ok_or_else(|| overflow(result_type))?, result_type)
        }
        other => Err(unsupported(op.as_str(), left, other)),
    }
}

/// Arithmetic negation of a non-NULL value
pub fn negate(value: &Value, ty: &DataType) -> ExpressionResult<Value> {
    match value {
        Value::Long(v) => {
            let negated = v.checked_neg().ok_or_else(|| overflow(ty))?;
            if ty.is_interval() {
                Ok(Value::Long(negated))
            } else {
                check_integral(negated, ty)
            }
        }
        Value::Double(v) => Ok(Value::Double(-v)),
        Value::Decimal(v) => v.checked_neg().map(Value::Decimal).ok_or_else(|| overflow(ty)),
        _ => Err(unsupported("negation", value, ty)),
    }
}

/// Timestamp as (epoch micros, picos of micro) regardless of encoding
fn timestamp_parts(value: &Value) -> Option<(i64, u32)> {
    match value {
        Value::Long(micros) => Some((*micros, 0)),
        Value::LongTimestamp {
            epoch_micros,
            picos_of_micro,
        } => Some((*epoch_micros, *picos_of_micro)),
        _ => None,
    }
}

/// Order two non-NULL values. `None` means the values are unordered
/// (a NaN operand, or a NULL nested inside a row or array).
pub fn compare(
    left: &Value,
    left_type: &DataType,
    right: &Value,
    right_type: &DataType,
) -> ExpressionResult<Option<Ordering>> {
    if left.is_null() || right.is_null() {
        return Ok(None);
    }
    match (left_type, right_type) {
        (a, b) if a.is_numeric() && b.is_numeric() => {
            if a.is_floating() || b.is_floating() {
                Ok(as_double(left, a)?.partial_cmp(&as_double(right, b)?))
            } else {
                let (x, x_scale) = as_unscaled(left, a)?;
                let (y, y_scale) = as_unscaled(right, b)?;
                let scale = x_scale.max(y_scale);
                match (rescale(x, x_scale, scale), rescale(y, y_scale, scale)) {
                    (Some(x), Some(y)) => Ok(Some(x.cmp(&y))),
                    _ => Ok(as_double(left, a)?.partial_cmp(&as_double(right, b)?)),
                }
            }
        }
        (DataType::Timestamp { .. }, DataType::Timestamp { .. }) => {
            match (timestamp_parts(left), timestamp_parts(right)) {
                (Some(x), Some(y)) => Ok(Some(x.cmp(&y))),
                _ => Err(unsupported("comparison", left, left_type)),
            }
        }
        (DataType::Array(a), DataType::Array(b)) => match (left, right) {
            (Value::Array(xs), Value::Array(ys)) => {
                for (x, y) in xs.iter().zip(ys) {
                    match compare(x, a, y, b)? {
                        Some(Ordering::Equal) => continue,
                        other => return Ok(other),
                    }
                }
                Ok(Some(xs.len().cmp(&ys.len())))
            }
            _ => Err(unsupported("comparison", left, left_type)),
        },
        (DataType::Row(a), DataType::Row(b)) => match (left, right) {
            (Value::Row(xs), Value::Row(ys)) => {
                for ((x, y), (fx, fy)) in xs.iter().zip(ys).zip(a.iter().zip(b)) {
                    match compare(x, &fx.ty, y, &fy.ty)? {
                        Some(Ordering::Equal) => continue,
                        other => return Ok(other),
                    }
                }
                Ok(Some(Ordering::Equal))
            }
            _ => Err(unsupported("comparison", left, left_type)),
        },
        _ => match (left, right) {
            (Value::Boolean(x), Value::Boolean(y)) => Ok(Some(x.cmp(y))),
            (Value::Long(x), Value::Long(y)) => Ok(Some(x.cmp(y))),
            (Value::String(x), Value::String(y)) => Ok(Some(x.cmp(y))),
            (Value::Binary(x), Value::Binary(y)) => Ok(Some(x.cmp(y))),
            _ => Err(unsupported("comparison", left, left_type)),
        },
    }
}

fn render(value: &Value, ty: &DataType) -> ExpressionResult<String> {
    Ok(match (value, ty) {
        (Value::Boolean(b), _) => b.to_string(),
        (Value::Long(days), DataType::Date) => format_date(*days),
        (Value::Long(micros), DataType::Timestamp { precision }) => {
            format_timestamp(*micros, 0, *precision)
        }
        (
            Value::LongTimestamp {
                epoch_micros,
                picos_of_micro,
            },
            DataType::Timestamp { precision },
        ) => format_timestamp(*epoch_micros, *picos_of_micro, *precision),
        (Value::Long(v), _) => v.to_string(),
        (Value::Double(v), _) => v.to_string(),
        (Value::Decimal(v), DataType::Decimal { scale, .. }) => {
            let magnitude = v.unsigned_abs();
            let divisor = 10_u128.checked_pow(*scale as u32).ok_or_else(|| overflow(ty))?;
            let sign = if *v < 0 { "-" } else { "" };
            if *scale == 0 {
                format!("{}{}", sign, magnitude)
            } else {
                format!(
                    "{}{}.{:0width$}",
                    sign,
                    magnitude / divisor,
                    magnitude % divisor,
                    width = *scale as usize
                )
            }
        }
        (Value::String(s), _) => s.clone(),
        _ => return Err(unsupported("cast to varchar", value, ty)),
    })
}

/// Parse a decimal literal text into an unscaled value at `scale`
fn parse_decimal(text: &str, scale: u8) -> Option<i128> {
    let text = text.trim();
    let (negative, digits) = match text.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, text.strip_prefix('+').unwrap_or(text)),
    };
    let (integer, fraction) = digits.split_once('.').unwrap_or((digits, ""));
    if integer.is_empty() && fraction.is_empty() {
        return None;
    }
    if !integer.chars().chain(fraction.chars()).all(|c| c.is_ascii_digit()) {
        return None;
    }
    let all_digits = format!("{}{}", integer, fraction);
    let unscaled: i128 = if all_digits.is_empty() {
        0
    } else {
        all_digits.parse().ok()?
    };
    let value = rescale(unscaled, u8::try_from(fraction.len()).ok()?, scale)?;
    Some(if negative { -value } else { value })
}

fn timestamp_value(micros: i64, picos: u32, precision: u8) -> Option<Value> {
    if precision <= MAX_SHORT_TIMESTAMP_PRECISION {
        // Round the sub-micro part first, then to the target precision.
        let micros = if picos >= PICOS_PER_MICRO / 2 {
            micros.checked_add(1)?
        } else {
            micros
        };
        Some(Value::Long(round_micros(micros, precision)?))
    } else {
        let factor = rescale_factor(precision, MAX_TIMESTAMP_PRECISION) as u64;
        let rounded = (picos as u64 + factor / 2) / factor * factor;
        if rounded >= PICOS_PER_MICRO as u64 {
            Some(Value::LongTimestamp {
                epoch_micros: micros.checked_add(1)?,
                picos_of_micro: 0,
            })
        } else {
            Some(Value::LongTimestamp {
                epoch_micros: micros,
                picos_of_micro: rounded as u32,
            })
        }
    }
}

/// Cast a non-NULL value from `from` to `to`
pub fn cast(value: &Value, from: &DataType, to: &DataType) -> ExpressionResult<Value> {
    if value.is_null() || from == to {
        return Ok(value.clone());
    }
    let fail = || invalid_cast(value, to);
    match (from, to) {
        (DataType::Unknown, _) => Ok(Value::Null),

        (_, DataType::Varchar(bound)) => {
            let text = render(value, from)?;
            match bound {
                Some(limit) if text.chars().count() > *limit as usize => {
                    if from.is_string() {
                        Ok(Value::String(text.chars().take(*limit as usize).collect()))
                    } else {
                        Err(fail())
                    }
                }
                _ => Ok(Value::String(text)),
            }
        }

        (f, t) if f.is_integral() && t.is_integral() => {
            check_integral(value.as_long().ok_or_else(fail)?, t)
        }
        (f, DataType::Double) if f.is_numeric() => Ok(Value::Double(as_double(value, f)?)),
        (f, DataType::Real) if f.is_numeric() => Ok(Value::Double(to_real(as_double(value, f)?))),
        (f, t) if f.is_floating() && t.is_integral() => {
            let v = as_double(value, f)?;
            if v.is_nan() || v.round() < i64::MIN as f64 || v.round() >= i64::MAX as f64 {
                return Err(fail());
            }
            check_integral(v.round() as i64, t)
        }
        (f, DataType::Decimal { scale, .. }) if f.is_floating() => {
            let v = as_double(value, f)?;
            let scaled = (v * 10_f64.powi(*scale as i32)).round();
            if !scaled.is_finite() || scaled.abs() >= i128::MAX as f64 {
                return Err(fail());
            }
            check_precision(scaled as i128, to)
        }
        (f, t) if t.is_integral() && matches!(f, DataType::Decimal { .. }) => {
            let (unscaled, scale) = as_unscaled(value, f)?;
            let rounded = rescale(unscaled, scale, 0).ok_or_else(|| overflow(t))?;
            check_integral(i64::try_from(rounded).map_err(|_| overflow(t))?, t)
        }
        (f, DataType::Decimal { scale, .. }) if f.as_decimal().is_some() => {
            let (unscaled, from_scale) = as_unscaled(value, f)?;
            let rescaled = rescale(unscaled, from_scale, *scale).ok_or_else(|| overflow(to))?;
            check_precision(rescaled, to)
        }

        (DataType::Boolean, t) if t.is_integral() => {
            Ok(Value::Long(i64::from(value.as_bool().ok_or_else(fail)?)))
        }
        (f, DataType::Boolean) if f.is_integral() => Ok(Value::Boolean(value.as_long().ok_or_else(fail)? != 0)),
        (f, DataType::Boolean) if f.is_floating() => Ok(Value::Boolean(as_double(value, f)? != 0.0)),

        (DataType::Varchar(_), t) => {
            let text = value.as_str().ok_or_else(fail)?;
            match t {
                DataType::Boolean => match text.trim().to_ascii_lowercase().as_str() {
                    "true" => Ok(Value::Boolean(true)),
                    "false" => Ok(Value::Boolean(false)),
                    _ => Err(fail()),
                },
                t if t.is_integral() => {
                    check_integral(text.trim().parse::<i64>().map_err(|_| fail())?, t)
                }
                DataType::Double => Ok(Value::Double(text.trim().parse::<f64>().map_err(|_| fail())?)),
                DataType::Real => Ok(Value::Double(to_real(
                    text.trim().parse::<f64>().map_err(|_| fail())?,
                ))),
                DataType::Decimal { scale, .. } => {
                    check_precision(parse_decimal(text, *scale).ok_or_else(fail)?, t)
                }
                DataType::Date => parse_date(text).map(Value::Long).ok_or_else(fail),
                DataType::Timestamp { precision } => {
                    let (micros, picos) = parse_timestamp(text).ok_or_else(fail)?;
                    timestamp_value(micros, picos, *precision).ok_or_else(fail)
                }
                DataType::Varbinary => Ok(Value::Binary(text.as_bytes().to_vec())),
                _ => Err(fail()),
            }
        }

        (DataType::Date, DataType::Timestamp { precision }) => {
            let days = value.as_long().ok_or_else(fail)?;
            let micros = days.checked_mul(MICROS_PER_DAY).ok_or_else(|| overflow(to))?;
            timestamp_value(micros, 0, *precision).ok_or_else(|| overflow(to))
        }
        (DataType::Timestamp { .. }, DataType::Date) => {
            let (micros, _) = timestamp_parts(value).ok_or_else(fail)?;
            Ok(Value::Long(micros.div_euclid(MICROS_PER_DAY)))
        }
        (DataType::Timestamp { .. }, DataType::Timestamp { precision }) => {
            let (micros, picos) = timestamp_parts(value).ok_or_else(fail)?;
            timestamp_value(micros, picos, *precision).ok_or_else(|| overflow(to))
        }

        (DataType::Array(from_element), DataType::Array(to_element)) => match value {
            Value::Array(items) => items
                .iter()
                .map(|item| cast(item, from_element, to_element))
                .collect::<ExpressionResult<Vec<_>>>()
                .map(Value::Array),
            _ => Err(fail()),
        },
        (DataType::Row(from_fields), DataType::Row(to_fields)) => match value {
            Value::Row(items) if from_fields.len() == to_fields.len() && items.len() == to_fields.len() => items
                .iter()
                .zip(from_fields.iter().zip(to_fields))
                .map(|(item, (from_field, to_field))| cast(item, &from_field.ty, &to_field.ty))
                .collect::<ExpressionResult<Vec<_>>>()
                .map(Value::Row),
            _ => Err(fail()),
        },

        _ => Err(fail()),
    }
}
