//! Ordered application of expression rules.

use anyhow::{Context, Result};
use log::debug;

use crate::config::{ExpressionRuleKind, OptimizerConfig};
use crate::expression::expr::{ExprArena, ExprId};
use crate::expression::rewriter::Rewrite;
use crate::rule::{
    Canonicalize, ExpressionRule, RemoveRedundantCasts, RuleContext, SimplifyExpressions,
    SimplifyNullPredicates, SimplifyRedundantPredicates, UnwrapRowSubscript,
    UnwrapYearInComparison,
};

/// Rule driver.
///
/// Rules run in order, each on the output of the previous one. With
/// `iterate_to_fixpoint` the whole list is repeated until a pass changes
/// nothing or the iteration cap is reached. A rule error aborts the run.
pub struct RuleSet {
    rules: Vec<Box<dyn ExpressionRule>>,
    iterate_to_fixpoint: bool,
    max_iterations: usize,
}

impl RuleSet {
    /// Single pass over `rules`
    pub fn new(rules: Vec<Box<dyn ExpressionRule>>) -> Self {
        Self {
            rules,
            iterate_to_fixpoint: false,
            max_iterations: 1,
        }
    }

    pub fn from_config(config: &OptimizerConfig) -> Self {
        Self {
            rules: config.rules.iter().map(|kind| rule_for(*kind)).collect(),
            iterate_to_fixpoint: config.iterate_to_fixpoint,
            max_iterations: config.max_iterations.max(1),
        }
    }

    pub fn rule_names(&self) -> Vec<&'static str> {
        self.rules.iter().map(|rule| rule.name()).collect()
    }

    /// Apply the rules to `expr`
    pub fn apply(
        &self,
        arena: &mut ExprArena,
        expr: ExprId,
        context: &RuleContext<'_>,
    ) -> Result<Rewrite> {
        let passes = if self.iterate_to_fixpoint {
            self.max_iterations
        } else {
            1
        };
        let mut current = expr;
        for pass in 1..=passes {
            let mut changed = false;
            for rule in &self.rules {
                let result = rule.apply(arena, current, context).with_context(|| {
                    format!("rule {} failed on {}", rule.name(), arena.display(current))
                })?;
                if let Rewrite::Rewritten(rewritten) = result {
                    debug!(
                        "{}: {} => {}",
                        rule.name(),
                        arena.display(current),
                        arena.display(rewritten)
                    );
                    current = rewritten;
                    changed = true;
                }
            }
            if !changed {
                break;
            }
            if pass == passes && self.iterate_to_fixpoint {
                debug!("rule set stopped after {} passes without reaching a fixpoint", passes);
            }
        }
        Ok(Rewrite::between(arena, expr, current))
    }
}

fn rule_for(kind: ExpressionRuleKind) -> Box<dyn ExpressionRule> {
    match kind {
        ExpressionRuleKind::Canonicalize => Box::new(Canonicalize),
        ExpressionRuleKind::UnwrapRowSubscript => Box::new(UnwrapRowSubscript),
        ExpressionRuleKind::RemoveRedundantCasts => Box::new(RemoveRedundantCasts),
        ExpressionRuleKind::SimplifyNullPredicates => Box::new(SimplifyNullPredicates),
        ExpressionRuleKind::UnwrapYearInComparison => Box::new(UnwrapYearInComparison),
        ExpressionRuleKind::SimplifyRedundantPredicates => Box::new(SimplifyRedundantPredicates),
        ExpressionRuleKind::SimplifyExpressions => Box::new(SimplifyExpressions),
    }
}
