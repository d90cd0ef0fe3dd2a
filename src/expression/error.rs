//! Error types for expression analysis, folding and rewriting.

use thiserror::Error;

/// Errors that can occur while typing, evaluating or rewriting expressions
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ExpressionError {
    /// Operand or branch types disagree
    #[error("Type mismatch in {context}: expected {expected}, got {actual}")]
    TypeMismatch {
        expected: String,
        actual: String,
        context: String,
    },

    /// No operator is defined for the operand types
    #[error("Invalid operand types for operator {operator}: left={left}, right={right}")]
    InvalidOperandTypes {
        operator: String,
        left: String,
        right: String,
    },

    /// Symbol is neither a lambda argument nor present in the type environment
    #[error("Unbound symbol: {name}")]
    UnboundSymbol { name: String },

    #[error("Unknown function: {name}({arguments})")]
    UnknownFunction { name: String, arguments: String },

    #[error("Function {function} expects {expected} arguments, got {actual}")]
    FunctionArgumentCount {
        function: String,
        expected: usize,
        actual: usize,
    },

    #[error("Ambiguous row field reference: {field}")]
    AmbiguousField { field: String },

    #[error("Field '{field}' not found in {row_type}")]
    MissingField { field: String, row_type: String },

    #[error("Division by zero")]
    DivisionByZero,

    #[error("Numeric value out of range for {data_type}")]
    NumericOverflow { data_type: String },

    #[error("Cannot cast {value} to {target}")]
    InvalidCast { value: String, target: String },

    #[error("Subscript index {index} out of bounds for size {size}")]
    SubscriptOutOfBounds { index: i64, size: usize },

    /// Structurally malformed IR
    #[error("Invalid expression: {message}")]
    InvalidExpression { message: String },
}

impl ExpressionError {
    pub fn invalid(message: impl Into<String>) -> Self {
        ExpressionError::InvalidExpression {
            message: message.into(),
        }
    }

    /// Runtime arithmetic failures that constant folding must not surface
    pub fn is_arithmetic(&self) -> bool {
        matches!(
            self,
            ExpressionError::DivisionByZero
                | ExpressionError::NumericOverflow { .. }
                | ExpressionError::InvalidCast { .. }
                | ExpressionError::SubscriptOutOfBounds { .. }
        )
    }
}

/// Result type for expression operations
pub type ExpressionResult<T> = Result<T, ExpressionError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = ExpressionError::TypeMismatch {
            expected: "boolean".to_string(),
            actual: "bigint".to_string(),
            context: "IF condition".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Type mismatch in IF condition: expected boolean, got bigint"
        );

        let err = ExpressionError::InvalidOperandTypes {
            operator: "+".to_string(),
            left: "integer".to_string(),
            right: "varchar".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Invalid operand types for operator +: left=integer, right=varchar"
        );

        assert_eq!(ExpressionError::DivisionByZero.to_string(), "Division by zero");
        assert_eq!(
            ExpressionError::UnboundSymbol {
                name: "x".to_string()
            }
            .to_string(),
            "Unbound symbol: x"
        );
    }

    #[test]
    fn test_arithmetic_classification() {
        assert!(ExpressionError::DivisionByZero.is_arithmetic());
        assert!(ExpressionError::NumericOverflow {
            data_type: "integer".to_string()
        }
        .is_arithmetic());
        assert!(!ExpressionError::invalid("bad").is_arithmetic());
        assert!(!ExpressionError::AmbiguousField {
            field: "a".to_string()
        }
        .is_arithmetic());
    }
}
