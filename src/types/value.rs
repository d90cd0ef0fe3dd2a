//! Constant values.

use serde::{Deserialize, Serialize};
use std::hash::{Hash, Hasher};

use crate::types::DataType;

/// Values carried by literals and produced by constant folding.
///
/// The encoding of a value depends on the static type it is paired with:
/// - integral types, DATE (epoch days), short TIMESTAMP (epoch micros) and
///   intervals (millis or months) use `Long`
/// - REAL and DOUBLE use `Double`
/// - DECIMAL uses `Decimal` holding the unscaled value
/// - TIMESTAMP with precision above 6 uses `LongTimestamp`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Value {
    Null,
    Boolean(bool),
    Long(i64),
    Double(f64),
    Decimal(i128),
    String(String),
    Binary(Vec<u8>),
    LongTimestamp {
        epoch_micros: i64,
        picos_of_micro: u32,
    },
    Array(Vec<Value>),
    Row(Vec<Value>),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Boolean(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_long(&self) -> Option<i64> {
        match self {
            Value::Long(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    /// Check if this value can be paired with the given type
    pub fn is_compatible_with(&self, data_type: &DataType) -> bool {
        match (self, data_type) {
            (Value::Null, _) => true,
            (Value::Boolean(_), DataType::Boolean) => true,
            (Value::Long(_), ty) => {
                ty.is_integral()
                    || ty.is_interval()
                    || ty.is_short_timestamp()
                    || matches!(ty, DataType::Date | DataType::TimestampWithTimeZone { .. })
            }
            (Value::Double(_), ty) => ty.is_floating(),
            (Value::Decimal(_), DataType::Decimal { .. }) => true,
            (Value::String(_), DataType::Varchar(_)) => true,
            (Value::Binary(_), DataType::Varbinary) => true,
            (Value::LongTimestamp { .. }, DataType::Timestamp { .. }) => {
                !data_type.is_short_timestamp()
            }
            (Value::Array(items), DataType::Array(element)) => {
                items.iter().all(|item| item.is_compatible_with(element))
            }
            (Value::Row(items), DataType::Row(fields)) => {
                items.len() == fields.len()
                    && items
                        .iter()
                        .zip(fields)
                        .all(|(item, field)| item.is_compatible_with(&field.ty))
            }
            _ => false,
        }
    }
}

// Doubles compare by bit pattern so that structurally identical literals
// (including NaN) are interned to the same shape.
impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Boolean(a), Value::Boolean(b)) => a == b,
            (Value::Long(a), Value::Long(b)) => a == b,
            (Value::Double(a), Value::Double(b)) => a.to_bits() == b.to_bits(),
            (Value::Decimal(a), Value::Decimal(b)) => a == b,
            (Value::String(a), Value::String(b)) => a == b,
            (Value::Binary(a), Value::Binary(b)) => a == b,
            (
                Value::LongTimestamp {
                    epoch_micros: a,
                    picos_of_micro: pa,
                },
                Value::LongTimestamp {
                    epoch_micros: b,
                    picos_of_micro: pb,
                },
            ) => a == b && pa == pb,
            (Value::Array(a), Value::Array(b)) => a == b,
            (Value::Row(a), Value::Row(b)) => a == b,
            _ => false,
        }
    }
}

impl Eq for Value {}

impl Hash for Value {
    fn hash<H: Hasher>(&self, state: &mut H) {
        std::mem::discriminant(self).hash(state);
        match self {
            Value::Null => {}
            Value::Boolean(b) => b.hash(state),
            Value::Long(v) => v.hash(state),
            Value::Double(v) => v.to_bits().hash(state),
            Value::Decimal(v) => v.hash(state),
            Value::String(s) => s.hash(state),
            Value::Binary(b) => b.hash(state),
            Value::LongTimestamp {
                epoch_micros,
                picos_of_micro,
            } => {
                epoch_micros.hash(state);
                picos_of_micro.hash(state);
            }
            Value::Array(items) | Value::Row(items) => items.hash(state),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_value_compatibility() {
        assert!(Value::Null.is_compatible_with(&DataType::Integer));
        assert!(Value::Long(42).is_compatible_with(&DataType::BigInt));
        assert!(Value::Long(18_000).is_compatible_with(&DataType::Date));
        assert!(Value::Long(1).is_compatible_with(&DataType::timestamp(3)));
        assert!(!Value::Long(1).is_compatible_with(&DataType::timestamp(9)));
        assert!(Value::LongTimestamp {
            epoch_micros: 0,
            picos_of_micro: 999_000
        }
        .is_compatible_with(&DataType::timestamp(9)));
        assert!(!Value::Boolean(true).is_compatible_with(&DataType::Integer));
        assert!(Value::Row(vec![Value::Long(1), Value::Null])
            .is_compatible_with(&DataType::anonymous_row([DataType::Integer, DataType::Date])));
    }

    #[test]
    fn test_double_identity() {
        let nan = Value::Double(f64::NAN);
        assert_eq!(nan, nan.clone());
        assert_ne!(Value::Double(0.0), Value::Double(-0.0));

        let mut set = HashSet::new();
        set.insert(Value::Double(1.5));
        assert!(set.contains(&Value::Double(1.5)));
        assert!(!set.contains(&Value::Long(1)));
    }
}
