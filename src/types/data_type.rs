//! Static SQL types.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::expression::error::{ExpressionError, ExpressionResult};

/// Largest timestamp precision that still fits in a single epoch-micros word.
pub const MAX_SHORT_TIMESTAMP_PRECISION: u8 = 6;

/// Largest supported timestamp precision (picoseconds).
pub const MAX_TIMESTAMP_PRECISION: u8 = 12;

/// Largest supported decimal precision.
pub const MAX_DECIMAL_PRECISION: u8 = 38;

/// A named or anonymous field of a ROW type
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RowField {
    pub name: Option<String>,
    pub ty: DataType,
}

impl RowField {
    pub fn new(name: impl Into<String>, ty: DataType) -> Self {
        Self {
            name: Some(name.into()),
            ty,
        }
    }

    pub fn anonymous(ty: DataType) -> Self {
        Self { name: None, ty }
    }
}

/// Data types assigned to expression nodes by the type analyzer
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DataType {
    /// Type of an untyped NULL literal
    Unknown,
    Boolean,
    TinyInt,
    SmallInt,
    Integer,
    BigInt,
    Real,
    Double,
    Decimal {
        precision: u8,
        scale: u8,
    },
    /// VARCHAR with an optional length bound
    Varchar(Option<u32>),
    Varbinary,
    Date,
    Timestamp {
        precision: u8,
    },
    TimestampWithTimeZone {
        precision: u8,
    },
    IntervalDayTime,
    IntervalYearMonth,
    Array(Box<DataType>),
    Map(Box<DataType>, Box<DataType>),
    Row(Vec<RowField>),
    /// Type of a lambda expression
    Function {
        arguments: Vec<DataType>,
        return_type: Box<DataType>,
    },
}

impl DataType {
    pub fn varchar() -> Self {
        DataType::Varchar(None)
    }

    pub fn decimal(precision: u8, scale: u8) -> Self {
        DataType::Decimal { precision, scale }
    }

    pub fn timestamp(precision: u8) -> Self {
        DataType::Timestamp { precision }
    }

    pub fn timestamp_with_time_zone(precision: u8) -> Self {
        DataType::TimestampWithTimeZone { precision }
    }

    pub fn array(element: DataType) -> Self {
        DataType::Array(Box::new(element))
    }

    pub fn map(key: DataType, value: DataType) -> Self {
        DataType::Map(Box::new(key), Box::new(value))
    }

    /// Row type with named fields
    pub fn row<N: Into<String>>(fields: impl IntoIterator<Item = (N, DataType)>) -> Self {
        DataType::Row(
            fields
                .into_iter()
                .map(|(name, ty)| RowField::new(name, ty))
                .collect(),
        )
    }

    /// Row type whose fields carry no names
    pub fn anonymous_row(fields: impl IntoIterator<Item = DataType>) -> Self {
        DataType::Row(fields.into_iter().map(RowField::anonymous).collect())
    }

    pub fn function(arguments: Vec<DataType>, return_type: DataType) -> Self {
        DataType::Function {
            arguments,
            return_type: Box::new(return_type),
        }
    }

    pub fn is_unknown(&self) -> bool {
        matches!(self, DataType::Unknown)
    }

    pub fn is_integral(&self) -> bool {
        matches!(
            self,
            DataType::TinyInt | DataType::SmallInt | DataType::Integer | DataType::BigInt
        )
    }

    pub fn is_floating(&self) -> bool {
        matches!(self, DataType::Real | DataType::Double)
    }

    pub fn is_numeric(&self) -> bool {
        self.is_integral() || self.is_floating() || matches!(self, DataType::Decimal { .. })
    }

    pub fn is_interval(&self) -> bool {
        matches!(self, DataType::IntervalDayTime | DataType::IntervalYearMonth)
    }

    pub fn is_string(&self) -> bool {
        matches!(self, DataType::Varchar(_))
    }

    /// Timestamps whose values are encoded as a single epoch-micros word
    pub fn is_short_timestamp(&self) -> bool {
        matches!(self, DataType::Timestamp { precision } if *precision <= MAX_SHORT_TIMESTAMP_PRECISION)
    }

    /// Inclusive value range of an integral type
    pub fn integral_bounds(&self) -> Option<(i64, i64)> {
        match self {
            DataType::TinyInt => Some((i8::MIN as i64, i8::MAX as i64)),
            DataType::SmallInt => Some((i16::MIN as i64, i16::MAX as i64)),
            DataType::Integer => Some((i32::MIN as i64, i32::MAX as i64)),
            DataType::BigInt => Some((i64::MIN, i64::MAX)),
            _ => None,
        }
    }

    /// Decimal precision needed to hold every value of an integral type
    pub fn integral_decimal_precision(&self) -> Option<u8> {
        match self {
            DataType::TinyInt => Some(3),
            DataType::SmallInt => Some(5),
            DataType::Integer => Some(10),
            DataType::BigInt => Some(19),
            _ => None,
        }
    }

    /// Decimal view of an exact numeric type
    pub fn as_decimal(&self) -> Option<(u8, u8)> {
        match self {
            DataType::Decimal { precision, scale } => Some((*precision, *scale)),
            other => other.integral_decimal_precision().map(|p| (p, 0)),
        }
    }

    /// Whether values of the two types can be compared with `=` and `<`.
    /// An `Unknown` side (a bare NULL) compares with anything.
    pub fn is_comparable_with(&self, other: &DataType) -> bool {
        if self.is_unknown() || other.is_unknown() {
            return true;
        }
        match (self, other) {
            (a, b) if a.is_numeric() && b.is_numeric() => true,
            (DataType::Varchar(_), DataType::Varchar(_)) => true,
            (DataType::Timestamp { .. }, DataType::Timestamp { .. })
            | (DataType::TimestampWithTimeZone { .. }, DataType::TimestampWithTimeZone { .. }) => {
                true
            }
            (DataType::Array(a), DataType::Array(b)) => a.is_comparable_with(b),
            (DataType::Row(a), DataType::Row(b)) => {
                a.len() == b.len()
                    && a.iter().zip(b).all(|(x, y)| x.ty.is_comparable_with(&y.ty))
            }
            (DataType::Function { .. }, _) | (_, DataType::Function { .. }) => false,
            (a, b) => a == b,
        }
    }

    /// Merge two branch types where a NULL branch adopts the other's type
    pub fn unify(&self, other: &DataType) -> Option<DataType> {
        match (self, other) {
            (a, b) if a == b => Some(a.clone()),
            (DataType::Unknown, b) => Some(b.clone()),
            (a, DataType::Unknown) => Some(a.clone()),
            (DataType::Varchar(_), DataType::Varchar(_)) => Some(DataType::varchar()),
            _ => None,
        }
    }

    /// Field type of a ROW at a 0-based position
    pub fn row_field(&self, index: usize) -> Option<&DataType> {
        match self {
            DataType::Row(fields) => fields.get(index).map(|field| &field.ty),
            _ => None,
        }
    }

    /// Resolve a field name (case-insensitively) to its 0-based position
    pub fn field_index(&self, name: &str) -> ExpressionResult<usize> {
        let DataType::Row(fields) = self else {
            return Err(ExpressionError::TypeMismatch {
                expected: "row".to_string(),
                actual: self.to_string(),
                context: format!("dereference of field '{}'", name),
            });
        };
        let mut matches = fields.iter().enumerate().filter(|(_, field)| {
            field
                .name
                .as_deref()
                .is_some_and(|field_name| field_name.eq_ignore_ascii_case(name))
        });
        match (matches.next(), matches.next()) {
            (Some((index, _)), None) => Ok(index),
            (Some(_), Some(_)) => Err(ExpressionError::AmbiguousField {
                field: name.to_string(),
            }),
            (None, _) => Err(ExpressionError::MissingField {
                field: name.to_string(),
                row_type: self.to_string(),
            }),
        }
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DataType::Unknown => write!(f, "unknown"),
            DataType::Boolean => write!(f, "boolean"),
            DataType::TinyInt => write!(f, "tinyint"),
            DataType::SmallInt => write!(f, "smallint"),
            DataType::Integer => write!(f, "integer"),
            DataType::BigInt => write!(f, "bigint"),
            DataType::Real => write!(f, "real"),
            DataType::Double => write!(f, "double"),
            DataType::Decimal { precision, scale } => write!(f, "decimal({},{})", precision, scale),
            DataType::Varchar(None) => write!(f, "varchar"),
            DataType::Varchar(Some(length)) => write!(f, "varchar({})", length),
            DataType::Varbinary => write!(f, "varbinary"),
            DataType::Date => write!(f, "date"),
            DataType::Timestamp { precision } => write!(f, "timestamp({})", precision),
            DataType::TimestampWithTimeZone { precision } => {
                write!(f, "timestamp({}) with time zone", precision)
            }
            DataType::IntervalDayTime => write!(f, "interval day to second"),
            DataType::IntervalYearMonth => write!(f, "interval year to month"),
            DataType::Array(element) => write!(f, "array({})", element),
            DataType::Map(key, value) => write!(f, "map({}, {})", key, value),
            DataType::Row(fields) => {
                write!(f, "row(")?;
                for (i, field) in fields.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    match &field.name {
                        Some(name) => write!(f, "{} {}", name, field.ty)?,
                        None => write!(f, "{}", field.ty)?,
                    }
                }
                write!(f, ")")
            }
            DataType::Function {
                arguments,
                return_type,
            } => {
                write!(f, "function(")?;
                for argument in arguments {
                    write!(f, "{},", argument)?;
                }
                write!(f, "{})", return_type)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display() {
        assert_eq!(DataType::decimal(5, 2).to_string(), "decimal(5,2)");
        assert_eq!(
            DataType::timestamp_with_time_zone(3).to_string(),
            "timestamp(3) with time zone"
        );
        assert_eq!(
            DataType::row([("a", DataType::BigInt), ("b", DataType::varchar())]).to_string(),
            "row(a bigint, b varchar)"
        );
        assert_eq!(
            DataType::function(vec![DataType::Integer], DataType::Boolean).to_string(),
            "function(integer,boolean)"
        );
    }

    #[test]
    fn test_comparability() {
        assert!(DataType::Integer.is_comparable_with(&DataType::Double));
        assert!(DataType::Unknown.is_comparable_with(&DataType::Date));
        assert!(DataType::Date.is_comparable_with(&DataType::Date));
        assert!(!DataType::Date.is_comparable_with(&DataType::BigInt));
        assert!(!DataType::Boolean.is_comparable_with(&DataType::varchar()));
    }

    #[test]
    fn test_unify() {
        assert_eq!(
            DataType::Unknown.unify(&DataType::BigInt),
            Some(DataType::BigInt)
        );
        assert_eq!(DataType::Integer.unify(&DataType::BigInt), None);
    }

    #[test]
    fn test_field_index() {
        let row = DataType::row([("a", DataType::BigInt), ("B", DataType::BigInt)]);
        assert_eq!(row.field_index("A").unwrap(), 0);
        assert_eq!(row.field_index("b").unwrap(), 1);
        assert!(matches!(
            row.field_index("c"),
            Err(ExpressionError::MissingField { .. })
        ));

        let ambiguous = DataType::row([("x", DataType::BigInt), ("X", DataType::Integer)]);
        assert!(matches!(
            ambiguous.field_index("x"),
            Err(ExpressionError::AmbiguousField { .. })
        ));
    }

    #[test]
    fn test_short_timestamp() {
        assert!(DataType::timestamp(6).is_short_timestamp());
        assert!(!DataType::timestamp(9).is_short_timestamp());
        assert!(!DataType::Date.is_short_timestamp());
    }
}
