//! Plan rules that rewrite the expressions a plan node owns.
//!
//! One expression rewrite is lifted into a rule per node kind. A rule only
//! fires when at least one expression of the node changes structurally;
//! otherwise it returns `None` so a driver can tell nothing happened.

use std::rc::Rc;

use anyhow::{Context, Result};

use crate::expression::expr::{ExprArena, ExprId};
use crate::expression::type_analyzer::SymbolTypes;
use crate::function::FunctionResolver;
use crate::planner::plan::{AggregationCall, Assignment, PlanNode};
use crate::rule::{RuleContext, RuleSet};

/// Rewrite applied to each expression of a node
pub type ExpressionRewrite = Rc<dyn Fn(&mut ExprArena, ExprId) -> Result<ExprId>>;

/// A transformation of a single plan node
pub trait PlanRule {
    fn name(&self) -> &'static str;

    /// The rewritten node, or `None` when the rule does not apply
    fn apply(&self, node: &PlanNode, arena: &mut ExprArena) -> Result<Option<PlanNode>>;
}

#[derive(Clone)]
pub struct ExpressionRewriteRuleSet {
    rewrite: ExpressionRewrite,
}

impl ExpressionRewriteRuleSet {
    pub fn new(rewrite: ExpressionRewrite) -> Self {
        Self { rewrite }
    }

    /// Lift an expression rule set; `symbols` types every plan symbol
    pub fn from_rule_set(
        rule_set: RuleSet,
        functions: Rc<dyn FunctionResolver>,
        symbols: SymbolTypes,
    ) -> Self {
        Self::new(Rc::new(move |arena: &mut ExprArena, expression: ExprId| -> Result<ExprId> {
            let context = RuleContext::new(functions.as_ref(), &symbols);
            Ok(rule_set.apply(arena, expression, &context)?.unwrap_or(expression))
        }))
    }

    /// Rules for every node kind that owns expressions
    pub fn rules(&self) -> Vec<Box<dyn PlanRule>> {
        vec![
            Box::new(self.project_expression_rewrite()),
            Box::new(self.aggregation_expression_rewrite()),
            Box::new(self.filter_expression_rewrite()),
            Box::new(self.join_expression_rewrite()),
            Box::new(self.values_expression_rewrite()),
            Box::new(self.pattern_recognition_expression_rewrite()),
        ]
    }

    pub fn project_expression_rewrite(&self) -> NodeExpressionRewrite {
        self.rule(NodeKind::Project)
    }

    pub fn aggregation_expression_rewrite(&self) -> NodeExpressionRewrite {
        self.rule(NodeKind::Aggregation)
    }

    pub fn filter_expression_rewrite(&self) -> NodeExpressionRewrite {
        self.rule(NodeKind::Filter)
    }

    pub fn join_expression_rewrite(&self) -> NodeExpressionRewrite {
        self.rule(NodeKind::Join)
    }

    pub fn values_expression_rewrite(&self) -> NodeExpressionRewrite {
        self.rule(NodeKind::Values)
    }

    pub fn pattern_recognition_expression_rewrite(&self) -> NodeExpressionRewrite {
        self.rule(NodeKind::PatternRecognition)
    }

    fn rule(&self, kind: NodeKind) -> NodeExpressionRewrite {
        NodeExpressionRewrite {
            kind,
            rewrite: Rc::clone(&self.rewrite),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum NodeKind {
    Project,
    Aggregation,
    Filter,
    Join,
    Values,
    PatternRecognition,
}

/// Expression rewrite over the expressions of one node kind
pub struct NodeExpressionRewrite {
    kind: NodeKind,
    rewrite: ExpressionRewrite,
}

impl NodeExpressionRewrite {
    /// Rewrite every expression, noting whether any changed
    fn rewrite_all(
        &self,
        arena: &mut ExprArena,
        expressions: &[ExprId],
        changed: &mut bool,
    ) -> Result<Vec<ExprId>> {
        expressions
            .iter()
            .map(|&expression| self.rewrite_one(arena, expression, changed))
            .collect()
    }

    fn rewrite_one(&self, arena: &mut ExprArena, expression: ExprId, changed: &mut bool) -> Result<ExprId> {
        let rewritten = (self.rewrite)(arena, expression)
            .with_context(|| format!("{} failed on {}", self.name(), arena.display(expression)))?;
        if !arena.same_structure(expression, rewritten) {
            *changed = true;
        }
        Ok(rewritten)
    }

    fn rewrite_assignments(
        &self,
        arena: &mut ExprArena,
        assignments: &[Assignment],
        changed: &mut bool,
    ) -> Result<Vec<Assignment>> {
        assignments
            .iter()
            .map(|assignment| {
                let expression = self.rewrite_one(arena, assignment.expression, changed)?;
                Ok(Assignment::new(assignment.symbol.clone(), expression))
            })
            .collect()
    }
}

impl PlanRule for NodeExpressionRewrite {
    fn name(&self) -> &'static str {
        match self.kind {
            NodeKind::Project => "project_expression_rewrite",
            NodeKind::Aggregation => "aggregation_expression_rewrite",
            NodeKind::Filter => "filter_expression_rewrite",
            NodeKind::Join => "join_expression_rewrite",
            NodeKind::Values => "values_expression_rewrite",
            NodeKind::PatternRecognition => "pattern_recognition_expression_rewrite",
        }
    }

    fn apply(&self, node: &PlanNode, arena: &mut ExprArena) -> Result<Option<PlanNode>> {
        let mut changed = false;
        let rewritten = match (self.kind, node) {
            (NodeKind::Project, PlanNode::Project { input, assignments }) => PlanNode::Project {
                input: input.clone(),
                assignments: self.rewrite_assignments(arena, assignments, &mut changed)?,
            },
            (
                NodeKind::Aggregation,
                PlanNode::Aggregation {
                    input,
                    group_by,
                    aggregations,
                },
            ) => {
                let mut rewritten = Vec::with_capacity(aggregations.len());
                for aggregation in aggregations {
                    rewritten.push(AggregationCall {
                        arguments: self.rewrite_all(arena, &aggregation.arguments, &mut changed)?,
                        ..aggregation.clone()
                    });
                }
                PlanNode::Aggregation {
                    input: input.clone(),
                    group_by: group_by.clone(),
                    aggregations: rewritten,
                }
            }
            (NodeKind::Filter, PlanNode::Filter { input, predicate }) => {
                let predicate = self.rewrite_one(arena, *predicate, &mut changed)?;
                if !changed {
                    return Ok(None);
                }
                return PlanNode::filter(arena, input.as_ref().clone(), predicate).map(Some);
            }
            (
                NodeKind::Join,
                PlanNode::Join {
                    left,
                    right,
                    join_type,
                    filter: Some(filter),
                },
            ) => PlanNode::Join {
                left: left.clone(),
                right: right.clone(),
                join_type: *join_type,
                filter: Some(self.rewrite_one(arena, *filter, &mut changed)?),
            },
            (NodeKind::Values, PlanNode::Values { outputs, rows }) => PlanNode::Values {
                outputs: outputs.clone(),
                rows: self.rewrite_all(arena, rows, &mut changed)?,
            },
            (
                NodeKind::PatternRecognition,
                PlanNode::PatternRecognition {
                    input,
                    measures,
                    variable_definitions,
                },
            ) => PlanNode::PatternRecognition {
                input: input.clone(),
                measures: self.rewrite_assignments(arena, measures, &mut changed)?,
                variable_definitions: self.rewrite_assignments(arena, variable_definitions, &mut changed)?,
            },
            _ => return Ok(None),
        };
        Ok(changed.then_some(rewritten))
    }
}
