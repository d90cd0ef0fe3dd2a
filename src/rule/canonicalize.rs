//! Canonical forms that let later rules match a single shape.
//!
//! - constants move to the right of comparisons and of commutative arithmetic
//! - `x IS NOT NULL` becomes `NOT (x IS NULL)`
//! - `IF` becomes a searched `CASE`
//! - `date(x)` becomes `CAST(x AS date)`
//! - `NOT (NOT x)` becomes `x`

use crate::expression::error::ExpressionResult;
use crate::expression::expr::{Expr, ExprArena, ExprId, WhenClause};
use crate::expression::operator::ComparisonOperator;
use crate::expression::rewriter::Rewrite;
use crate::rule::{rewrite_bottom_up, ExpressionRule, RuleContext};
use crate::types::DataType;

pub struct Canonicalize;

impl ExpressionRule for Canonicalize {
    fn name(&self) -> &'static str {
        "canonicalize"
    }

    fn apply(
        &self,
        arena: &mut ExprArena,
        expr: ExprId,
        _context: &RuleContext<'_>,
    ) -> ExpressionResult<Rewrite> {
        rewrite_bottom_up(arena, expr, |arena, id, _| Ok(canonicalize_node(arena, id)))
    }
}

fn canonicalize_node(arena: &mut ExprArena, id: ExprId) -> Option<ExprId> {
    match arena.get(id).clone() {
        // IS DISTINCT FROM keeps the order it was written in
        Expr::Comparison { op, left, right }
            if op != ComparisonOperator::IsDistinctFrom
                && arena.is_constant(left)
                && !arena.is_constant(right) =>
        {
            Some(arena.comparison(op.flip(), right, left))
        }

        Expr::Arithmetic { op, left, right }
            if op.is_commutative() && arena.is_constant(left) && !arena.is_constant(right) =>
        {
            Some(arena.arithmetic(op, right, left))
        }

        Expr::IsNotNull(operand) => {
            let is_null = arena.is_null(operand);
            Some(arena.not(is_null))
        }

        Expr::If {
            condition,
            true_value,
            false_value,
        } => Some(arena.searched_case(vec![WhenClause::new(condition, true_value)], false_value)),

        Expr::Call {
            function,
            arguments,
        } if function.name.eq_ignore_ascii_case("date")
            && matches!(
                function.argument_types.as_slice(),
                [DataType::Timestamp { .. }]
                    | [DataType::TimestampWithTimeZone { .. }]
                    | [DataType::Varchar(_)]
            ) =>
        {
            Some(arena.cast(arguments[0], DataType::Date))
        }

        Expr::Not(operand) => match arena.get(operand) {
            Expr::Not(inner) => Some(*inner),
            _ => None,
        },

        _ => None,
    }
}
