//! Constant folding as a rewrite rule.
//!
//! The largest subtrees that reference no free symbol and call only
//! deterministic functions are evaluated and replaced by literals. A subtree
//! whose evaluation fails with an arithmetic error is kept as written so the
//! error surfaces at execution time, if that row is ever evaluated.

use log::trace;

use crate::expression::analysis::{extract_all, is_deterministic};
use crate::expression::error::ExpressionResult;
use crate::expression::expr::{Expr, ExprArena, ExprId};
use crate::expression::interpreter::ExpressionInterpreter;
use crate::expression::literal::to_expression;
use crate::expression::rewriter::{rewrite_with, ExpressionRewriter, LambdaScope, Rewrite};
use crate::expression::type_analyzer::{types_of, SymbolTypes};
use crate::rule::{ExpressionRule, RuleContext};

pub struct SimplifyExpressions;

impl ExpressionRule for SimplifyExpressions {
    fn name(&self) -> &'static str {
        "simplify_expressions"
    }

    fn apply(
        &self,
        arena: &mut ExprArena,
        expr: ExprId,
        context: &RuleContext<'_>,
    ) -> ExpressionResult<Rewrite> {
        rewrite_with(&mut ConstantFolder { context }, arena, expr)
    }
}

struct ConstantFolder<'c, 'a> {
    context: &'c RuleContext<'a>,
}

impl ConstantFolder<'_, '_> {
    fn is_candidate(&self, arena: &ExprArena, id: ExprId) -> ExpressionResult<bool> {
        if matches!(
            arena.get(id),
            Expr::Literal { .. } | Expr::Symbol(_) | Expr::Lambda { .. } | Expr::Bind { .. }
        ) {
            return Ok(false);
        }
        if !extract_all(arena, id).is_empty() {
            return Ok(false);
        }
        is_deterministic(arena, self.context.functions, id)
    }
}

impl ExpressionRewriter for ConstantFolder<'_, '_> {
    fn rewrite_pre(
        &mut self,
        arena: &mut ExprArena,
        id: ExprId,
        _scope: &LambdaScope,
    ) -> ExpressionResult<Option<ExprId>> {
        if !self.is_candidate(arena, id)? {
            return Ok(None);
        }
        // No free symbols, so no environment is needed
        let types = types_of(arena, self.context.functions, &SymbolTypes::new(), id)?;
        let interpreter = ExpressionInterpreter::new(arena, &types, self.context.functions);
        let Some(value) = interpreter.fold(id)?.into_value() else {
            return Ok(None);
        };
        let ty = types.type_of(id)?.clone();
        let folded = to_expression(arena, value, &ty)?;
        if arena.same_structure(folded, id) {
            return Ok(None);
        }
        trace!("folded {} to {}", arena.display(id), arena.display(folded));
        Ok(Some(folded))
    }
}
