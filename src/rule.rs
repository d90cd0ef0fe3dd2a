//! Expression rewrite rules.
//!
//! Each rule is a pure transformation of one expression tree. A rule that
//! does not match leaves the tree alone and reports `Rewrite::Unchanged`;
//! errors are reserved for malformed input and abort the optimization pass.

pub mod canonicalize;
pub mod grouping;
pub mod null_predicate;
pub mod redundant_cast;
pub mod redundant_predicate;
pub mod row_subscript;
pub mod rule_set;
pub mod simplify;
pub mod unwrap_year;

use crate::expression::error::ExpressionResult;
use crate::expression::expr::{ExprArena, ExprId};
use crate::expression::rewriter::{rewrite_with, ExpressionRewriter, LambdaScope, Rewrite};
use crate::expression::type_analyzer::SymbolTypes;
use crate::function::FunctionResolver;

pub use canonicalize::Canonicalize;
pub use grouping::rewrite_grouping_operation;
pub use null_predicate::SimplifyNullPredicates;
pub use redundant_cast::RemoveRedundantCasts;
pub use redundant_predicate::SimplifyRedundantPredicates;
pub use row_subscript::UnwrapRowSubscript;
pub use rule_set::RuleSet;
pub use simplify::SimplifyExpressions;
pub use unwrap_year::UnwrapYearInComparison;

/// What a rule may consult besides the tree itself
#[derive(Clone, Copy)]
pub struct RuleContext<'a> {
    pub functions: &'a dyn FunctionResolver,
    /// Types of the free symbols of the expression being rewritten
    pub symbols: &'a SymbolTypes,
}

impl<'a> RuleContext<'a> {
    pub fn new(functions: &'a dyn FunctionResolver, symbols: &'a SymbolTypes) -> Self {
        Self { functions, symbols }
    }
}

/// A semantics-preserving expression rewrite
pub trait ExpressionRule {
    fn name(&self) -> &'static str;

    fn apply(
        &self,
        arena: &mut ExprArena,
        expr: ExprId,
        context: &RuleContext<'_>,
    ) -> ExpressionResult<Rewrite>;
}

/// Adapts a node-local rewrite to a post-order traversal
struct BottomUp<F>(F);

impl<F> ExpressionRewriter for BottomUp<F>
where
    F: FnMut(&mut ExprArena, ExprId, &LambdaScope) -> ExpressionResult<Option<ExprId>>,
{
    fn rewrite_post(
        &mut self,
        arena: &mut ExprArena,
        id: ExprId,
        scope: &LambdaScope,
    ) -> ExpressionResult<Option<ExprId>> {
        (self.0)(arena, id, scope)
    }
}

/// Apply `rewrite` to every node of `root`, children first
fn rewrite_bottom_up<F>(arena: &mut ExprArena, root: ExprId, rewrite: F) -> ExpressionResult<Rewrite>
where
    F: FnMut(&mut ExprArena, ExprId, &LambdaScope) -> ExpressionResult<Option<ExprId>>,
{
    rewrite_with(&mut BottomUp(rewrite), arena, root)
}
