pub mod config;
pub mod expression;
pub mod function;
pub mod planner;
pub mod rule;
pub mod types;

pub use config::{ExpressionRuleKind, OptimizerConfig};
pub use expression::{Expr, ExprArena, ExprId, ExpressionError, ExpressionResult, Rewrite};
pub use function::{BuiltinFunctions, FunctionResolver};
pub use rule::{ExpressionRule, RuleContext, RuleSet};
pub use types::{DataType, Value};
