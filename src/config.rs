//! Optimizer configuration.
//!
//! Selects which expression rules run, in which order, and whether the
//! driver repeats them until nothing changes.

use serde::{Deserialize, Serialize};

/// Default cap on fixpoint iterations.
const DEFAULT_MAX_ITERATIONS: usize = 16;

/// Expression rules that can be enabled by name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExpressionRuleKind {
    Canonicalize,
    UnwrapRowSubscript,
    RemoveRedundantCasts,
    SimplifyNullPredicates,
    UnwrapYearInComparison,
    SimplifyRedundantPredicates,
    SimplifyExpressions,
}

impl ExpressionRuleKind {
    /// Every rule, in the default application order.
    pub const ALL: [ExpressionRuleKind; 7] = [
        ExpressionRuleKind::Canonicalize,
        ExpressionRuleKind::UnwrapRowSubscript,
        ExpressionRuleKind::RemoveRedundantCasts,
        ExpressionRuleKind::SimplifyExpressions,
        ExpressionRuleKind::SimplifyNullPredicates,
        ExpressionRuleKind::UnwrapYearInComparison,
        ExpressionRuleKind::SimplifyRedundantPredicates,
    ];
}

/// Optimizer configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OptimizerConfig {
    /// Rules to apply, in order.
    pub rules: Vec<ExpressionRuleKind>,
    /// Whether to repeat the rule list until no rule fires.
    pub iterate_to_fixpoint: bool,
    /// Upper bound on passes over the rule list when iterating.
    pub max_iterations: usize,
}

impl Default for OptimizerConfig {
    fn default() -> Self {
        OptimizerConfig {
            rules: ExpressionRuleKind::ALL.to_vec(),
            iterate_to_fixpoint: true,
            max_iterations: DEFAULT_MAX_ITERATIONS,
        }
    }
}
