//! Minimal relational plan.
//!
//! Plan nodes only carry what the expression rules need: the expressions each
//! node owns, as ids into the planning pass's `ExprArena`, and the names of
//! the symbols it produces.

use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};

use crate::expression::expr::{Expr, ExprArena, ExprId};
use crate::function::FunctionHandle;

/// `symbol := expression`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Assignment {
    pub symbol: String,
    pub expression: ExprId,
}

impl Assignment {
    pub fn new(symbol: impl Into<String>, expression: ExprId) -> Self {
        Self {
            symbol: symbol.into(),
            expression,
        }
    }
}

/// One aggregate computed by an aggregation node
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AggregationCall {
    pub output: String,
    pub function: FunctionHandle,
    pub arguments: Vec<ExprId>,
    pub distinct: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum JoinType {
    Inner,
    Left,
    Right,
    Full,
}

/// Plan node for query trees
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum PlanNode {
    /// Scan a table
    TableScan { table: String, outputs: Vec<String> },

    /// Inline rows; each row is a ROW constructor (or an expression producing one)
    Values {
        outputs: Vec<String>,
        rows: Vec<ExprId>,
    },

    /// Filter rows based on predicate
    Filter {
        input: Box<PlanNode>,
        predicate: ExprId,
    },

    /// Compute new symbols
    Project {
        input: Box<PlanNode>,
        assignments: Vec<Assignment>,
    },

    /// Group by with aggregation
    Aggregation {
        input: Box<PlanNode>,
        group_by: Vec<String>,
        aggregations: Vec<AggregationCall>,
    },

    /// MATCH_RECOGNIZE: measures and pattern variable definitions
    PatternRecognition {
        input: Box<PlanNode>,
        measures: Vec<Assignment>,
        variable_definitions: Vec<Assignment>,
    },

    /// Join two relations
    Join {
        left: Box<PlanNode>,
        right: Box<PlanNode>,
        join_type: JoinType,
        filter: Option<ExprId>,
    },
}

impl PlanNode {
    /// Build a filter; a bare NULL literal is not a valid predicate
    pub fn filter(arena: &ExprArena, input: PlanNode, predicate: ExprId) -> Result<PlanNode> {
        if let Expr::Literal { value, .. } = arena.get(predicate) {
            if value.is_null() {
                bail!("filter predicate must not be a bare NULL literal");
            }
        }
        Ok(PlanNode::Filter {
            input: Box::new(input),
            predicate,
        })
    }

    /// Symbols produced by this node
    pub fn outputs(&self) -> Vec<String> {
        match self {
            PlanNode::TableScan { outputs, .. } | PlanNode::Values { outputs, .. } => outputs.clone(),
            PlanNode::Filter { input, .. } => input.outputs(),
            PlanNode::Project { assignments, .. } => assignments
                .iter()
                .map(|assignment| assignment.symbol.clone())
                .collect(),
            PlanNode::Aggregation {
                group_by,
                aggregations,
                ..
            } => group_by
                .iter()
                .cloned()
                .chain(aggregations.iter().map(|aggregation| aggregation.output.clone()))
                .collect(),
            PlanNode::PatternRecognition {
                input, measures, ..
            } => input
                .outputs()
                .into_iter()
                .chain(measures.iter().map(|measure| measure.symbol.clone()))
                .collect(),
            PlanNode::Join { left, right, .. } => {
                let mut outputs = left.outputs();
                outputs.extend(right.outputs());
                outputs
            }
        }
    }

    /// Direct inputs of this node
    pub fn inputs(&self) -> Vec<&PlanNode> {
        match self {
            PlanNode::TableScan { .. } | PlanNode::Values { .. } => Vec::new(),
            PlanNode::Filter { input, .. }
            | PlanNode::Project { input, .. }
            | PlanNode::Aggregation { input, .. }
            | PlanNode::PatternRecognition { input, .. } => vec![input],
            PlanNode::Join { left, right, .. } => vec![left, right],
        }
    }

    /// This node with its inputs replaced, in `inputs` order
    pub fn with_inputs(&self, mut inputs: Vec<PlanNode>) -> Result<PlanNode> {
        let expected = self.inputs().len();
        if inputs.len() != expected {
            bail!("expected {} inputs, got {}", expected, inputs.len());
        }
        let mut node = self.clone();
        match &mut node {
            PlanNode::TableScan { .. } | PlanNode::Values { .. } => {}
            PlanNode::Filter { input, .. }
            | PlanNode::Project { input, .. }
            | PlanNode::Aggregation { input, .. }
            | PlanNode::PatternRecognition { input, .. } => {
                **input = inputs.remove(0);
            }
            PlanNode::Join { left, right, .. } => {
                **right = inputs.remove(1);
                **left = inputs.remove(0);
            }
        }
        Ok(node)
    }
}
