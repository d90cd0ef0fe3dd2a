//! SQL-like rendering of expression trees.
//!
//! The rendering is deterministic and is used as the final tie-breaker when
//! equality inference orders equivalent expressions.

use std::fmt;

use crate::expression::expr::{Expr, ExprArena, ExprId, WhenClause};
use crate::types::datetime::{format_date, format_timestamp};
use crate::types::{DataType, Value};

/// Display adapter for a node within its arena
pub struct ExprDisplay<'a> {
    arena: &'a ExprArena,
    id: ExprId,
}

impl ExprArena {
    pub fn display(&self, id: ExprId) -> ExprDisplay<'_> {
        ExprDisplay { arena: self, id }
    }
}

impl ExprDisplay<'_> {
    fn child(&self, id: ExprId) -> Self {
        ExprDisplay {
            arena: self.arena,
            id,
        }
    }

    fn list(&self, f: &mut fmt::Formatter<'_>, items: &[ExprId]) -> fmt::Result {
        for (i, item) in items.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}", self.child(*item))?;
        }
        Ok(())
    }

    fn clauses(&self, f: &mut fmt::Formatter<'_>, clauses: &[WhenClause]) -> fmt::Result {
        for clause in clauses {
            write!(
                f,
                " WHEN {} THEN {}",
                self.child(clause.operand),
                self.child(clause.result)
            )?;
        }
        Ok(())
    }
}

fn write_literal(f: &mut fmt::Formatter<'_>, value: &Value, ty: &DataType) -> fmt::Result {
    match (value, ty) {
        (Value::Null, _) => write!(f, "null"),
        (Value::Boolean(b), _) => write!(f, "{}", b),
        (Value::Long(v), DataType::Integer) => write!(f, "{}", v),
        (Value::Long(v), DataType::Date) => write!(f, "DATE '{}'", format_date(*v)),
        (Value::Long(v), DataType::Timestamp { precision }) => {
            write!(f, "TIMESTAMP '{}'", format_timestamp(*v, 0, *precision))
        }
        (
            Value::LongTimestamp {
                epoch_micros,
                picos_of_micro,
            },
            DataType::Timestamp { precision },
        ) => write!(
            f,
            "TIMESTAMP '{}'",
            format_timestamp(*epoch_micros, *picos_of_micro, *precision)
        ),
        (Value::Long(v), ty) => write!(f, "{} '{}'", ty.to_string().to_uppercase(), v),
        (Value::Double(v), ty) => write!(f, "{} '{}'", ty.to_string().to_uppercase(), v),
        (Value::Decimal(v), DataType::Decimal { scale, .. }) => {
            let sign = if *v < 0 { "-" } else { "" };
            let magnitude = v.unsigned_abs();
            match 10_u128.checked_pow(*scale as u32) {
                Some(divisor) if *scale > 0 => write!(
                    f,
                    "DECIMAL '{}{}.{:0width$}'",
                    sign,
                    magnitude / divisor,
                    magnitude % divisor,
                    width = *scale as usize
                ),
                _ => write!(f, "DECIMAL '{}{}'", sign, magnitude),
            }
        }
        (Value::Decimal(v), _) => write!(f, "DECIMAL '{}'", v),
        (Value::String(s), _) => write!(f, "'{}'", s.replace('\'', "''")),
        (Value::Binary(bytes), _) => {
            write!(f, "X'")?;
            for byte in bytes {
                write!(f, "{:02X}", byte)?;
            }
            write!(f, "'")
        }
        (
            Value::LongTimestamp {
                epoch_micros,
                picos_of_micro,
            },
            _,
        ) => write!(f, "TIMESTAMP '{}'", format_timestamp(*epoch_micros, *picos_of_micro, 12)),
        (Value::Array(items), _) | (Value::Row(items), _) => {
            write!(f, "{} [", ty)?;
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    write!(f, ", ")?;
                }
                write!(f, "{:?}", item)?;
            }
            write!(f, "]")
        }
    }
}

impl fmt::Display for ExprDisplay<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.arena.get(self.id) {
            Expr::Literal { value, ty } => write_literal(f, value, ty),
            Expr::Symbol(name) => write!(f, "{}", name),
            Expr::Arithmetic { op, left, right } => write!(
                f,
                "({} {} {})",
                self.child(*left),
                op.as_str(),
                self.child(*right)
            ),
            Expr::Negate(operand) => write!(f, "-({})", self.child(*operand)),
            Expr::Comparison { op, left, right } => write!(
                f,
                "({} {} {})",
                self.child(*left),
                op.as_str(),
                self.child(*right)
            ),
            Expr::Logical { op, terms } => {
                write!(f, "(")?;
                for (i, term) in terms.iter().enumerate() {
                    if i > 0 {
                        write!(f, " {} ", op.as_str())?;
                    }
                    write!(f, "{}", self.child(*term))?;
                }
                write!(f, ")")
            }
            Expr::Not(operand) => write!(f, "(NOT {})", self.child(*operand)),
            Expr::IsNull(operand) => write!(f, "({} IS NULL)", self.child(*operand)),
            Expr::IsNotNull(operand) => write!(f, "({} IS NOT NULL)", self.child(*operand)),
            Expr::Between { value, min, max } => write!(
                f,
                "({} BETWEEN {} AND {})",
                self.child(*value),
                self.child(*min),
                self.child(*max)
            ),
            Expr::In { value, list } => {
                write!(f, "({} IN (", self.child(*value))?;
                self.list(f, list)?;
                write!(f, "))")
            }
            Expr::If {
                condition,
                true_value,
                false_value,
            } => {
                write!(f, "IF({}, {}", self.child(*condition), self.child(*true_value))?;
                if let Some(false_value) = false_value {
                    write!(f, ", {}", self.child(*false_value))?;
                }
                write!(f, ")")
            }
            Expr::SearchedCase {
                when_clauses,
                default,
            } => {
                write!(f, "CASE")?;
                self.clauses(f, when_clauses)?;
                if let Some(default) = default {
                    write!(f, " ELSE {}", self.child(*default))?;
                }
                write!(f, " END")
            }
            Expr::SimpleCase {
                operand,
                when_clauses,
                default,
            } => {
                write!(f, "CASE {}", self.child(*operand))?;
                self.clauses(f, when_clauses)?;
                if let Some(default) = default {
                    write!(f, " ELSE {}", self.child(*default))?;
                }
                write!(f, " END")
            }
            Expr::Coalesce(operands) => {
                write!(f, "COALESCE(")?;
                self.list(f, operands)?;
                write!(f, ")")
            }
            Expr::NullIf { first, second } => write!(
                f,
                "NULLIF({}, {})",
                self.child(*first),
                self.child(*second)
            ),
            Expr::Cast { expr, ty, safe } => write!(
                f,
                "{}({} AS {})",
                if *safe { "TRY_CAST" } else { "CAST" },
                self.child(*expr),
                ty
            ),
            Expr::Call {
                function,
                arguments,
            } => {
                write!(f, "{}(", function.name)?;
                self.list(f, arguments)?;
                write!(f, ")")
            }
            Expr::Lambda { parameters, body } => {
                write!(f, "({}) -> {}", parameters.join(", "), self.child(*body))
            }
            Expr::Bind { values, function } => {
                write!(f, "BIND(")?;
                self.list(f, values)?;
                write!(f, ", {})", self.child(*function))
            }
            Expr::Row(items) => {
                write!(f, "ROW (")?;
                self.list(f, items)?;
                write!(f, ")")
            }
            Expr::Array(items) => {
                write!(f, "ARRAY[")?;
                self.list(f, items)?;
                write!(f, "]")
            }
            Expr::Subscript { base, index } => {
                write!(f, "{}[{}]", self.child(*base), self.child(*index))
            }
        }
    }
}
