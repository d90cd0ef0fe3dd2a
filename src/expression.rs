//! Scalar expression IR and the machinery that works on it.
//!
//! This module provides:
//! - The arena-backed expression tree and its SQL rendering
//! - Type analysis keyed by node identity
//! - Constant folding and evaluation with SQL NULL semantics
//! - Generic tree rewriting with lambda scope tracking
//! - Static analysis (free symbols, determinism)

pub mod analysis;
pub mod display;
pub mod error;
pub mod expr;
pub mod interpreter;
pub mod literal;
pub mod operator;
pub mod rewriter;
pub mod scalar;
pub mod type_analyzer;

pub use analysis::{extract_all, extract_unique, is_deterministic, may_return_null_on_non_null_input};
pub use error::{ExpressionError, ExpressionResult};
pub use expr::{Expr, ExprArena, ExprId, ShapeId, WhenClause};
pub use interpreter::{
    fold_constant, ConstantResult, ExpressionInterpreter, NoOpSymbolResolver, SymbolResolver,
};
pub use literal::to_expression;
pub use operator::{ArithmeticOperator, ComparisonOperator, LogicalOperator};
pub use rewriter::{replace_expression, rewrite_with, ExpressionRewriter, LambdaScope, Rewrite};
pub use type_analyzer::{type_of, types_of, ExpressionTypes, SymbolTypes, TypeAnalyzer};
