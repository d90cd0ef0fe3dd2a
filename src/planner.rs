//! Plan-level optimization.
//!
//! The planner applies plan rules to a tree of plan nodes:
//! 1. Inputs are optimized first, bottom-up
//! 2. Each rule then gets one chance at the rebuilt node, in order
//!
//! Equality inference lives here as well since it reasons about which
//! predicates can move across a plan node boundary.

pub mod equality_inference;
pub mod expression_rewrite;
pub mod plan;

use anyhow::{Context, Result};
use log::debug;

use crate::expression::expr::ExprArena;

pub use equality_inference::{EqualityInference, EqualityPartition};
pub use expression_rewrite::{ExpressionRewrite, ExpressionRewriteRuleSet, PlanRule};
pub use plan::{AggregationCall, Assignment, JoinType, PlanNode};

/// Applies plan rules over a whole plan
pub struct PlanOptimizer {
    rules: Vec<Box<dyn PlanRule>>,
}

impl PlanOptimizer {
    pub fn new(rules: Vec<Box<dyn PlanRule>>) -> Self {
        Self { rules }
    }

    /// Optimize `plan`, rebuilding only the nodes some rule changed
    pub fn optimize(&self, arena: &mut ExprArena, plan: &PlanNode) -> Result<PlanNode> {
        let inputs = plan
            .inputs()
            .into_iter()
            .map(|input| self.optimize(arena, input))
            .collect::<Result<Vec<_>>>()?;
        let mut node = plan.with_inputs(inputs)?;

        for rule in &self.rules {
            if let Some(rewritten) = rule
                .apply(&node, arena)
                .with_context(|| format!("plan rule {} failed", rule.name()))?
            {
                debug!("{} fired", rule.name());
                node = rewritten;
            }
        }
        Ok(node)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::OptimizerConfig;
    use crate::expression::operator::ComparisonOperator;
    use crate::expression::type_analyzer::SymbolTypes;
    use crate::function::BuiltinFunctions;
    use crate::rule::RuleSet;
    use crate::types::DataType;
    use std::rc::Rc;

    fn optimizer(symbols: SymbolTypes) -> PlanOptimizer {
        let rules = ExpressionRewriteRuleSet::from_rule_set(
            RuleSet::from_config(&OptimizerConfig::default()),
            Rc::new(BuiltinFunctions::new()),
            symbols,
        );
        PlanOptimizer::new(rules.rules())
    }

    #[test]
    fn test_optimize_nested_plan() -> Result<()> {
        let symbols = SymbolTypes::new()
            .with("d", DataType::Date)
            .with("x", DataType::BigInt);
        let mut arena = ExprArena::new();

        // SELECT x + (1 + 2) FROM t WHERE year(d) = 2020
        let d = arena.symbol("d");
        let year = arena.call("year", vec![DataType::Date], vec![d]);
        let target = arena.bigint(2020);
        let predicate = arena.equal(year, target);
        let scan = PlanNode::TableScan {
            table: "t".to_string(),
            outputs: vec!["d".to_string(), "x".to_string()],
        };
        let filter = PlanNode::filter(&arena, scan, predicate)?;
        let x = arena.symbol("x");
        let one = arena.bigint(1);
        let two = arena.bigint(2);
        let three = arena.add(one, two);
        let sum = arena.add(x, three);
        let plan = PlanNode::Project {
            input: Box::new(filter),
            assignments: vec![Assignment::new("y", sum)],
        };

        let optimized = optimizer(symbols).optimize(&mut arena, &plan)?;
        let PlanNode::Project { input, assignments } = &optimized else {
            panic!("expected a projection");
        };
        assert_eq!(arena.display(assignments[0].expression).to_string(), "(x + BIGINT '3')");
        let PlanNode::Filter { predicate, .. } = input.as_ref() else {
            panic!("expected a filter");
        };
        assert_eq!(
            arena.display(*predicate).to_string(),
            "(d BETWEEN DATE '2020-01-01' AND DATE '2020-12-31')"
        );
        Ok(())
    }

    #[test]
    fn test_optimize_is_stable() -> Result<()> {
        let symbols = SymbolTypes::new().with("a", DataType::BigInt);
        let mut arena = ExprArena::new();
        let a = arena.symbol("a");
        let five = arena.bigint(5);
        let predicate = arena.comparison(ComparisonOperator::LessThan, five, a);
        let scan = PlanNode::TableScan {
            table: "t".to_string(),
            outputs: vec!["a".to_string()],
        };
        let plan = PlanNode::filter(&arena, scan, predicate)?;

        let optimizer = optimizer(symbols);
        let once = optimizer.optimize(&mut arena, &plan)?;
        let twice = optimizer.optimize(&mut arena, &once)?;
        assert_eq!(once, twice);
        let PlanNode::Filter { predicate, .. } = once else {
            panic!("expected a filter");
        };
        assert_eq!(arena.display(predicate).to_string(), "(a > BIGINT '5')");
        Ok(())
    }
}
