//! Flatten and prune AND / OR terms.
//!
//! Nested connectives of the same kind are flattened, TRUE terms of an AND
//! (FALSE terms of an OR) are dropped, a FALSE term of an AND (TRUE term of an
//! OR) absorbs the whole expression, and repeated deterministic terms are kept
//! once.

use std::collections::HashSet;

use crate::expression::analysis::is_deterministic;
use crate::expression::error::ExpressionResult;
use crate::expression::expr::{Expr, ExprArena, ExprId};
use crate::expression::operator::LogicalOperator;
use crate::expression::rewriter::Rewrite;
use crate::rule::{rewrite_bottom_up, ExpressionRule, RuleContext};

pub struct SimplifyRedundantPredicates;

impl ExpressionRule for SimplifyRedundantPredicates {
    fn name(&self) -> &'static str {
        "simplify_redundant_predicates"
    }

    fn apply(
        &self,
        arena: &mut ExprArena,
        expr: ExprId,
        context: &RuleContext<'_>,
    ) -> ExpressionResult<Rewrite> {
        rewrite_bottom_up(arena, expr, |arena, id, _| simplify_node(arena, id, context))
    }
}

fn simplify_node(
    arena: &mut ExprArena,
    id: ExprId,
    context: &RuleContext<'_>,
) -> ExpressionResult<Option<ExprId>> {
    let (op, original) = match arena.get(id) {
        Expr::Logical { op, terms } => (*op, terms.clone()),
        _ => return Ok(None),
    };
    let identity = op == LogicalOperator::And;

    let mut seen = HashSet::new();
    let mut terms = Vec::new();
    for term in arena.extract_predicates(op, id) {
        if arena.is_boolean_literal(term, !identity) {
            return Ok(Some(arena.boolean(!identity)));
        }
        if arena.is_boolean_literal(term, identity) {
            continue;
        }
        if is_deterministic(arena, context.functions, term)? && !seen.insert(arena.shape(term)) {
            continue;
        }
        terms.push(term);
    }
    if terms.len() > 1 && terms == original {
        return Ok(None);
    }

    let simplified = match op {
        LogicalOperator::And => arena.combine_conjuncts(terms),
        LogicalOperator::Or => arena.combine_disjuncts(terms),
    };
    Ok(Some(simplified))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expression::operator::ComparisonOperator;
    use crate::expression::type_analyzer::SymbolTypes;
    use crate::function::BuiltinFunctions;

    fn simplify(arena: &mut ExprArena, id: ExprId) -> String {
        let functions = BuiltinFunctions::new();
        let symbols = SymbolTypes::new();
        let context = RuleContext::new(&functions, &symbols);
        let result = SimplifyRedundantPredicates
            .apply(arena, id, &context)
            .unwrap()
            .unwrap_or(id);
        arena.display(result).to_string()
    }

    #[test]
    fn test_flatten_and_dedupe() {
        let mut arena = ExprArena::new();
        let a = arena.symbol("a");
        let b = arena.symbol("b");
        let a2 = arena.symbol("a");
        let inner = arena.and(vec![b, a2]);
        let t = arena.boolean(true);
        let root = arena.and(vec![a, inner, t]);
        assert_eq!(simplify(&mut arena, root), "(a AND b)");
    }

    #[test]
    fn test_absorbing_terms() {
        let mut arena = ExprArena::new();
        let a = arena.symbol("a");
        let f = arena.boolean(false);
        let t = arena.boolean(true);
        let and = arena.and(vec![a, f]);
        assert_eq!(simplify(&mut arena, and), "false");

        let or = arena.or(vec![a, t]);
        assert_eq!(simplify(&mut arena, or), "true");

        let or = arena.or(vec![f, a]);
        assert_eq!(simplify(&mut arena, or), "a");

        let empty = arena.and(vec![t, t]);
        assert_eq!(simplify(&mut arena, empty), "true");
    }

    #[test]
    fn test_non_deterministic_terms_are_kept() {
        let mut arena = ExprArena::new();
        let rand = arena.call("rand", vec![], vec![]);
        let half = arena.double(0.5);
        let lt = arena.comparison(ComparisonOperator::LessThan, rand, half);
        let rand2 = arena.call("rand", vec![], vec![]);
        let lt2 = arena.comparison(ComparisonOperator::LessThan, rand2, half);
        let root = arena.and(vec![lt, lt2]);
        assert_eq!(simplify(&mut arena, root), "((rand() < DOUBLE '0.5') AND (rand() < DOUBLE '0.5'))");
    }

    #[test]
    fn test_already_simple_is_unchanged() {
        let functions = BuiltinFunctions::new();
        let symbols = SymbolTypes::new();
        let context = RuleContext::new(&functions, &symbols);
        let mut arena = ExprArena::new();
        let a = arena.symbol("a");
        let b = arena.symbol("b");
        let root = arena.or(vec![a, b]);
        assert_eq!(
            SimplifyRedundantPredicates.apply(&mut arena, root, &context).unwrap(),
            Rewrite::Unchanged
        );
    }
}
