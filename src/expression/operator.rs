//! Operator definitions for expressions.

use serde::{Deserialize, Serialize};

use crate::types::data_type::MAX_DECIMAL_PRECISION;
use crate::types::DataType;

/// Binary arithmetic operators
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ArithmeticOperator {
    Add,
    Subtract,
    Multiply,
    Divide,
    Modulus,
}

impl ArithmeticOperator {
    /// Get the output type of this operator given input types
    pub fn output_type(&self, left: &DataType, right: &DataType) -> Option<DataType> {
        match (left, right) {
            (DataType::Unknown, DataType::Unknown) => Some(DataType::Unknown),
            (DataType::Unknown, other) | (other, DataType::Unknown) => {
                (other.is_numeric() || other.is_interval()).then(|| other.clone())
            }
            (a, b) if a.is_interval() || b.is_interval() => {
                let additive = matches!(self, ArithmeticOperator::Add | ArithmeticOperator::Subtract);
                (additive && a == b).then(|| a.clone())
            }
            (a, b) if a.is_integral() && b.is_integral() => Some(wider_integral(a, b)),
            (DataType::Double, b) | (b, DataType::Double) if b.is_numeric() => Some(DataType::Double),
            (DataType::Real, b) | (b, DataType::Real) if b.is_numeric() => Some(DataType::Real),
            (a, b) => {
                let (p1, s1) = a.as_decimal()?;
                let (p2, s2) = b.as_decimal()?;
                Some(self.decimal_output_type(p1, s1, p2, s2))
            }
        }
    }

    fn decimal_output_type(&self, p1: u8, s1: u8, p2: u8, s2: u8) -> DataType {
        let scale = s1.max(s2);
        let precision = match self {
            ArithmeticOperator::Add | ArithmeticOperator::Subtract => {
                1 + scale as u32 + p1.saturating_sub(s1).max(p2.saturating_sub(s2)) as u32
            }
            ArithmeticOperator::Multiply => {
                return DataType::decimal(
                    (p1 as u32 + p2 as u32).min(MAX_DECIMAL_PRECISION as u32) as u8,
                    (s1 + s2).min(MAX_DECIMAL_PRECISION),
                );
            }
            ArithmeticOperator::Divide => p1 as u32 + s2 as u32 + s2.saturating_sub(s1) as u32,
            ArithmeticOperator::Modulus => {
                p1.saturating_sub(s1).min(p2.saturating_sub(s2)) as u32 + scale as u32
            }
        };
        DataType::decimal(precision.min(MAX_DECIMAL_PRECISION as u32) as u8, scale)
    }

    /// Operators whose operands may be swapped without changing the result
    pub fn is_commutative(&self) -> bool {
        matches!(self, ArithmeticOperator::Add | ArithmeticOperator::Multiply)
    }

    /// Get the display string for this operator
    pub fn as_str(&self) -> &'static str {
        match self {
            ArithmeticOperator::Add => "+",
            ArithmeticOperator::Subtract => "-",
            ArithmeticOperator::Multiply => "*",
            ArithmeticOperator::Divide => "/",
            ArithmeticOperator::Modulus => "%",
        }
    }
}

fn wider_integral(a: &DataType, b: &DataType) -> DataType {
    let rank = |ty: &DataType| match ty {
        DataType::TinyInt => 0,
        DataType::SmallInt => 1,
        DataType::Integer => 2,
        _ => 3,
    };
    if rank(a) >= rank(b) {
        a.clone()
    } else {
        b.clone()
    }
}

/// Comparison operators, including the null-safe IS DISTINCT FROM
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ComparisonOperator {
    Equal,
    NotEqual,
    LessThan,
    LessThanOrEqual,
    GreaterThan,
    GreaterThanOrEqual,
    IsDistinctFrom,
}

impl ComparisonOperator {
    /// Operator to use when the operands are swapped
    pub fn flip(&self) -> Self {
        match self {
            ComparisonOperator::LessThan => ComparisonOperator::GreaterThan,
            ComparisonOperator::LessThanOrEqual => ComparisonOperator::GreaterThanOrEqual,
            ComparisonOperator::GreaterThan => ComparisonOperator::LessThan,
            ComparisonOperator::GreaterThanOrEqual => ComparisonOperator::LessThanOrEqual,
            other => *other,
        }
    }

    /// Logical complement, if one exists as a single operator
    pub fn negate(&self) -> Option<Self> {
        match self {
            ComparisonOperator::Equal => Some(ComparisonOperator::NotEqual),
            ComparisonOperator::NotEqual => Some(ComparisonOperator::Equal),
            ComparisonOperator::LessThan => Some(ComparisonOperator::GreaterThanOrEqual),
            ComparisonOperator::LessThanOrEqual => Some(ComparisonOperator::GreaterThan),
            ComparisonOperator::GreaterThan => Some(ComparisonOperator::LessThanOrEqual),
            ComparisonOperator::GreaterThanOrEqual => Some(ComparisonOperator::LessThan),
            ComparisonOperator::IsDistinctFrom => None,
        }
    }

    /// Whether the comparison requires the operand types to be orderable
    pub fn is_ordering(&self) -> bool {
        matches!(
            self,
            ComparisonOperator::LessThan
                | ComparisonOperator::LessThanOrEqual
                | ComparisonOperator::GreaterThan
                | ComparisonOperator::GreaterThanOrEqual
        )
    }

    /// Get the display string for this operator
    pub fn as_str(&self) -> &'static str {
        match self {
            ComparisonOperator::Equal => "=",
            ComparisonOperator::NotEqual => "<>",
            ComparisonOperator::LessThan => "<",
            ComparisonOperator::LessThanOrEqual => "<=",
            ComparisonOperator::GreaterThan => ">",
            ComparisonOperator::GreaterThanOrEqual => ">=",
            ComparisonOperator::IsDistinctFrom => "IS DISTINCT FROM",
        }
    }
}

/// N-ary boolean connectives
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LogicalOperator {
    And,
    Or,
}

impl LogicalOperator {
    pub fn flip(&self) -> Self {
        match self {
            LogicalOperator::And => LogicalOperator::Or,
            LogicalOperator::Or => LogicalOperator::And,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            LogicalOperator::And => "AND",
            LogicalOperator::Or => "OR",
        }
    }
}
