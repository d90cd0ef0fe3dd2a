//! Simplify predicates over NULL literals.

use crate::expression::error::ExpressionResult;
use crate::expression::expr::{Expr, ExprArena, ExprId};
use crate::expression::operator::ComparisonOperator;
use crate::expression::rewriter::Rewrite;
use crate::rule::{rewrite_bottom_up, ExpressionRule, RuleContext};
use crate::types::DataType;

pub struct SimplifyNullPredicates;

impl ExpressionRule for SimplifyNullPredicates {
    fn name(&self) -> &'static str {
        "simplify_null_predicates"
    }

    fn apply(
        &self,
        arena: &mut ExprArena,
        expr: ExprId,
        _context: &RuleContext<'_>,
    ) -> ExpressionResult<Rewrite> {
        rewrite_bottom_up(arena, expr, |arena, id, _| Ok(simplify_node(arena, id)))
    }
}

fn simplify_node(arena: &mut ExprArena, id: ExprId) -> Option<ExprId> {
    match arena.get(id).clone() {
        Expr::Comparison {
            op: ComparisonOperator::IsDistinctFrom,
            left,
            right,
        } => match (arena.is_null_literal(left), arena.is_null_literal(right)) {
            (true, true) => Some(arena.boolean(false)),
            (true, false) => Some(arena.is_not_null(right)),
            (false, true) => Some(arena.is_not_null(left)),
            (false, false) => None,
        },
        Expr::Comparison { left, right, .. }
            if arena.is_null_literal(left) || arena.is_null_literal(right) =>
        {
            Some(arena.typed_null(DataType::Boolean))
        }
        Expr::In { value, .. } | Expr::Between { value, .. } if arena.is_null_literal(value) => {
            Some(arena.typed_null(DataType::Boolean))
        }
        // Only bare literals: a cast of a non-NULL literal may fail at runtime
        Expr::IsNull(operand) => literal_nullness(arena, operand).map(|null| arena.boolean(null)),
        Expr::IsNotNull(operand) => {
            literal_nullness(arena, operand).map(|null| arena.boolean(!null))
        }
        _ => None,
    }
}

fn literal_nullness(arena: &ExprArena, id: ExprId) -> Option<bool> {
    if arena.is_null_literal(id) {
        Some(true)
    } else if arena.get(id).is_literal() {
        Some(false)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expression::type_analyzer::SymbolTypes;
    use crate::function::BuiltinFunctions;

    fn simplify(arena: &mut ExprArena, id: ExprId) -> String {
        let functions = BuiltinFunctions::new();
        let symbols = SymbolTypes::new();
        let context = RuleContext::new(&functions, &symbols);
        let result = SimplifyNullPredicates
            .apply(arena, id, &context)
            .unwrap()
            .unwrap_or(id);
        arena.display(result).to_string()
    }

    #[test]
    fn test_comparison_with_null() {
        let mut arena = ExprArena::new();
        let x = arena.symbol("x");
        let null = arena.null();
        let eq = arena.equal(x, null);
        assert_eq!(simplify(&mut arena, eq), "CAST(null AS boolean)");

        let typed = arena.typed_null(DataType::BigInt);
        let lt = arena.comparison(ComparisonOperator::LessThan, typed, x);
        assert_eq!(simplify(&mut arena, lt), "CAST(null AS boolean)");
    }

    #[test]
    fn test_distinct_from_null() {
        let mut arena = ExprArena::new();
        let x = arena.symbol("x");
        let null = arena.null();
        let distinct = arena.comparison(ComparisonOperator::IsDistinctFrom, x, null);
        assert_eq!(simplify(&mut arena, distinct), "(x IS NOT NULL)");

        let both = arena.comparison(ComparisonOperator::IsDistinctFrom, null, null);
        assert_eq!(simplify(&mut arena, both), "false");
    }

    #[test]
    fn test_null_tests_over_literals() {
        let mut arena = ExprArena::new();
        let null = arena.typed_null(DataType::Integer);
        let is_null = arena.is_null(null);
        assert_eq!(simplify(&mut arena, is_null), "true");

        let one = arena.integer(1);
        let is_not_null = arena.is_not_null(one);
        assert_eq!(simplify(&mut arena, is_not_null), "true");

        let text = arena.varchar("x");
        let cast = arena.cast(text, DataType::BigInt);
        let is_null = arena.is_null(cast);
        assert_eq!(simplify(&mut arena, is_null), "(CAST('x' AS bigint) IS NULL)");
    }

    #[test]
    fn test_in_with_null_value() {
        let mut arena = ExprArena::new();
        let null = arena.null();
        let one = arena.integer(1);
        let in_list = arena.in_list(null, vec![one]);
        assert_eq!(simplify(&mut arena, in_list), "CAST(null AS boolean)");
    }
}
