//! Generic tree rewriting.
//!
//! `rewrite_with` visits every node of a tree. A rewriter may replace a node
//! before its children are visited (`rewrite_pre`, which stops the descent)
//! or after they have been rebuilt (`rewrite_post`). Nodes without a
//! replacement are rebuilt over their rewritten children, and the original
//! node is reused when no child changed.
//!
//! Lambda parameters are tracked in a `LambdaScope`, so a rewriter can tell a
//! lambda argument from a same-named outer symbol.

use std::collections::HashMap;

use crate::expression::error::ExpressionResult;
use crate::expression::expr::{Expr, ExprArena, ExprId, ShapeId};
use crate::expression::type_analyzer::SymbolTypes;
use crate::types::DataType;

/// Outcome of a rewrite
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rewrite {
    Unchanged,
    Rewritten(ExprId),
}

impl Rewrite {
    /// Compare a rewrite result with its input structurally
    pub fn between(arena: &ExprArena, original: ExprId, result: ExprId) -> Self {
        if arena.same_structure(original, result) {
            Rewrite::Unchanged
        } else {
            Rewrite::Rewritten(result)
        }
    }

    pub fn is_rewritten(&self) -> bool {
        matches!(self, Rewrite::Rewritten(_))
    }

    pub fn unwrap_or(self, original: ExprId) -> ExprId {
        match self {
            Rewrite::Unchanged => original,
            Rewrite::Rewritten(id) => id,
        }
    }
}

/// Lambda parameters in effect at a node, innermost frame last.
/// A parameter's type is known when the lambda is a direct argument of a
/// call whose signature declares it.
#[derive(Debug, Clone, Default)]
pub struct LambdaScope {
    frames: Vec<Vec<(String, Option<DataType>)>>,
}

impl LambdaScope {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    pub fn is_bound(&self, name: &str) -> bool {
        self.frames
            .iter()
            .any(|frame| frame.iter().any(|(parameter, _)| parameter == name))
    }

    /// `outer` extended with the lambda parameters in scope, or `None` when
    /// some parameter has no known type
    pub fn symbol_types(&self, outer: &SymbolTypes) -> Option<SymbolTypes> {
        let mut types = outer.clone();
        for frame in &self.frames {
            for (name, ty) in frame {
                types.insert(name.clone(), ty.clone()?);
            }
        }
        Some(types)
    }

    fn push(&mut self, parameters: &[String], types: Option<Vec<Option<DataType>>>) {
        let types = types.unwrap_or_default();
        self.frames.push(
            parameters
                .iter()
                .enumerate()
                .map(|(i, name)| (name.clone(), types.get(i).cloned().flatten()))
                .collect(),
        );
    }

    fn pop(&mut self) {
        self.frames.pop();
    }
}

/// Per-node hooks for `rewrite_with`
pub trait ExpressionRewriter {
    /// Replacement for `id` before its children are visited
    fn rewrite_pre(
        &mut self,
        _arena: &mut ExprArena,
        _id: ExprId,
        _scope: &LambdaScope,
    ) -> ExpressionResult<Option<ExprId>> {
        Ok(None)
    }

    /// Replacement for `id` after its children have been rewritten
    fn rewrite_post(
        &mut self,
        _arena: &mut ExprArena,
        _id: ExprId,
        _scope: &LambdaScope,
    ) -> ExpressionResult<Option<ExprId>> {
        Ok(None)
    }
}

/// Rewrite the tree under `root` with `rewriter`
pub fn rewrite_with<R: ExpressionRewriter + ?Sized>(
    rewriter: &mut R,
    arena: &mut ExprArena,
    root: ExprId,
) -> ExpressionResult<Rewrite> {
    let mut scope = LambdaScope::new();
    let result = rewrite_node(rewriter, arena, root, &mut scope, None)?;
    Ok(Rewrite::between(arena, root, result))
}

/// Lambda argument types for each child of `node`, in child order
fn child_lambda_arguments(arena: &ExprArena, node: &Expr) -> Vec<Option<Vec<Option<DataType>>>> {
    let formal = |ty: &DataType| match ty {
        DataType::Function { arguments, .. } => {
            Some(arguments.iter().cloned().map(Some).collect::<Vec<_>>())
        }
        _ => None,
    };
    match node {
        Expr::Call {
            function,
            arguments,
        } => arguments
            .iter()
            .enumerate()
            .map(|(i, argument)| match arena.get(*argument) {
                Expr::Lambda { .. } | Expr::Bind { .. } => {
                    function.argument_types.get(i).and_then(formal)
                }
                _ => None,
            })
            .collect(),
        _ => node.children().iter().map(|_| None).collect(),
    }
}

fn rewrite_node<R: ExpressionRewriter + ?Sized>(
    rewriter: &mut R,
    arena: &mut ExprArena,
    id: ExprId,
    scope: &mut LambdaScope,
    lambda_arguments: Option<Vec<Option<DataType>>>,
) -> ExpressionResult<ExprId> {
    if let Some(replacement) = rewriter.rewrite_pre(arena, id, scope)? {
        return Ok(replacement);
    }

    let node = arena.get(id).clone();
    let rebuilt = match &node {
        Expr::Lambda { parameters, body } => {
            scope.push(parameters, lambda_arguments);
            let body = rewrite_node(rewriter, arena, *body, scope, None);
            scope.pop();
            Expr::Lambda {
                parameters: parameters.clone(),
                body: body?,
            }
        }
        Expr::Bind { values, function } => {
            let mut rewritten = Vec::with_capacity(values.len());
            for value in values {
                rewritten.push(rewrite_node(rewriter, arena, *value, scope, None)?);
            }
            // Captured values fill the leading parameters of the inner lambda
            let inner_arguments = lambda_arguments.map(|remaining| {
                std::iter::repeat(None)
                    .take(values.len())
                    .chain(remaining)
                    .collect()
            });
            let function = rewrite_node(rewriter, arena, *function, scope, inner_arguments)?;
            Expr::Bind {
                values: rewritten,
                function,
            }
        }
        _ => {
            let mut child_arguments = child_lambda_arguments(arena, &node).into_iter();
            node.try_map_children(|child| {
                let arguments = child_arguments.next().flatten();
                rewrite_node(rewriter, arena, child, scope, arguments)
            })?
        }
    };
    let rebuilt = arena.with_children(id, rebuilt);

    match rewriter.rewrite_post(arena, rebuilt, scope)? {
        Some(replacement) => Ok(replacement),
        None => Ok(rebuilt),
    }
}

/// Replace, top-down, every subtree whose shape is a key of `mapping`
pub fn replace_expression(
    arena: &mut ExprArena,
    id: ExprId,
    mapping: &HashMap<ShapeId, ExprId>,
) -> ExprId {
    if let Some(replacement) = mapping.get(&arena.shape(id)) {
        return *replacement;
    }
    let node = arena.get(id).clone();
    let rebuilt = node.map_children(|child| replace_expression(arena, child, mapping));
    arena.with_children(id, rebuilt)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expression::expr::Expr;
    use crate::expression::operator::ComparisonOperator;

    /// Renames free symbols `x` to `y`
    struct RenameX;

    impl ExpressionRewriter for RenameX {
        fn rewrite_post(
            &mut self,
            arena: &mut ExprArena,
            id: ExprId,
            scope: &LambdaScope,
        ) -> ExpressionResult<Option<ExprId>> {
            match arena.get(id) {
                Expr::Symbol(name) if name == "x" && !scope.is_bound(name) => {
                    Ok(Some(arena.symbol("y")))
                }
                _ => Ok(None),
            }
        }
    }

    #[test]
    fn test_rewrite_skips_lambda_bound_symbols() {
        let mut arena = ExprArena::new();
        let x = arena.symbol("x");
        let one = arena.integer(1);
        let body = arena.comparison(ComparisonOperator::GreaterThan, x, one);
        let lambda = arena.lambda(vec!["x".to_string()], body);
        let array = arena.symbol("a");
        let filter = arena.call(
            "filter",
            vec![
                DataType::array(DataType::Integer),
                DataType::function(vec![DataType::Integer], DataType::Boolean),
            ],
            vec![array, lambda],
        );
        let outer_x = arena.symbol("x");
        let root = arena.and(vec![filter, outer_x]);

        let result = rewrite_with(&mut RenameX, &mut arena, root).unwrap();
        let Rewrite::Rewritten(result) = result else {
            panic!("expected a rewrite");
        };
        assert_eq!(
            arena.display(result).to_string(),
            "(filter(a, (x) -> (x > 1)) AND y)"
        );
    }

    #[test]
    fn test_unchanged_tree_is_reused() {
        let mut arena = ExprArena::new();
        let a = arena.symbol("a");
        let b = arena.symbol("b");
        let root = arena.add(a, b);
        let before = arena.len();
        assert_eq!(rewrite_with(&mut RenameX, &mut arena, root).unwrap(), Rewrite::Unchanged);
        assert_eq!(arena.len(), before);
    }

    /// Records the typed environment seen inside lambda bodies
    struct ScopeRecorder {
        seen: Vec<Option<SymbolTypes>>,
    }

    impl ExpressionRewriter for ScopeRecorder {
        fn rewrite_post(
            &mut self,
            arena: &mut ExprArena,
            id: ExprId,
            scope: &LambdaScope,
        ) -> ExpressionResult<Option<ExprId>> {
            if matches!(arena.get(id), Expr::Symbol(name) if name == "v") {
                self.seen.push(scope.symbol_types(&SymbolTypes::new()));
            }
            Ok(None)
        }
    }

    #[test]
    fn test_scope_types_come_from_call_signature() {
        let mut arena = ExprArena::new();
        let v = arena.symbol("v");
        let lambda = arena.lambda(vec!["v".to_string()], v);
        let array = arena.symbol("a");
        let transform = arena.call(
            "transform",
            vec![
                DataType::array(DataType::BigInt),
                DataType::function(vec![DataType::BigInt], DataType::BigInt),
            ],
            vec![array, lambda],
        );

        let mut recorder = ScopeRecorder { seen: Vec::new() };
        rewrite_with(&mut recorder, &mut arena, transform).unwrap();
        assert_eq!(recorder.seen.len(), 1);
        assert_eq!(
            recorder.seen[0].as_ref().and_then(|types| types.get("v").cloned()),
            Some(DataType::BigInt)
        );

        // A lambda outside a call has untyped parameters
        let mut recorder = ScopeRecorder { seen: Vec::new() };
        rewrite_with(&mut recorder, &mut arena, lambda).unwrap();
        assert_eq!(recorder.seen, vec![None]);
    }

    #[test]
    fn test_replace_expression() {
        let mut arena = ExprArena::new();
        let a = arena.symbol("a");
        let b = arena.symbol("b");
        let sum = arena.add(a, b);
        let one = arena.integer(1);
        let root = arena.equal(sum, one);

        let another_sum = {
            let a = arena.symbol("a");
            let b = arena.symbol("b");
            arena.add(a, b)
        };
        let c = arena.symbol("c");
        let mut mapping = HashMap::new();
        mapping.insert(arena.shape(another_sum), c);

        let replaced = replace_expression(&mut arena, root, &mapping);
        assert_eq!(arena.display(replaced).to_string(), "(c = 1)");
    }
}
