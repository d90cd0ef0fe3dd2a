//! Static properties of expression trees: free symbols, determinism and
//! whether a node may turn non-NULL input into NULL.

use std::collections::BTreeSet;

use crate::expression::error::ExpressionResult;
use crate::expression::expr::{Expr, ExprArena, ExprId};
use crate::function::FunctionResolver;

/// Distinct free symbols of `id`, excluding lambda-bound names
pub fn extract_unique(arena: &ExprArena, id: ExprId) -> BTreeSet<String> {
    extract_all(arena, id).into_iter().collect()
}

/// Every free symbol occurrence of `id` in pre-order, duplicates included
pub fn extract_all(arena: &ExprArena, id: ExprId) -> Vec<String> {
    let mut symbols = Vec::new();
    let mut bound = Vec::new();
    collect_symbols(arena, id, &mut bound, &mut symbols);
    symbols
}

fn collect_symbols(
    arena: &ExprArena,
    id: ExprId,
    bound: &mut Vec<String>,
    symbols: &mut Vec<String>,
) {
    match arena.get(id) {
        Expr::Symbol(name) => {
            if !bound.contains(name) {
                symbols.push(name.clone());
            }
        }
        Expr::Lambda { parameters, body } => {
            let depth = bound.len();
            bound.extend(parameters.iter().cloned());
            collect_symbols(arena, *body, bound, symbols);
            bound.truncate(depth);
        }
        node => {
            for child in node.children() {
                collect_symbols(arena, child, bound, symbols);
            }
        }
    }
}

/// Whether evaluating `id` twice on the same input always yields the same
/// result. Calls are checked against the catalog, including calls nested in
/// lambda bodies and bind captures.
pub fn is_deterministic(
    arena: &ExprArena,
    functions: &dyn FunctionResolver,
    id: ExprId,
) -> ExpressionResult<bool> {
    for node in arena.sub_expressions(id) {
        if let Expr::Call { function, .. } = arena.get(node) {
            if !functions.resolve_handle(function)?.deterministic {
                return Ok(false);
            }
        }
    }
    Ok(true)
}

/// Whether `id` may produce NULL even when all of its inputs are non-NULL
pub fn may_return_null_on_non_null_input(arena: &ExprArena, id: ExprId) -> bool {
    arena.sub_expressions(id).into_iter().any(|node| match arena.get(node) {
        Expr::Cast { safe, .. } => *safe,
        Expr::Call { function, .. } => function.name.eq_ignore_ascii_case("try"),
        Expr::NullIf { .. }
        | Expr::If { .. }
        | Expr::In { .. }
        | Expr::SearchedCase { .. }
        | Expr::SimpleCase { .. }
        | Expr::Subscript { .. } => true,
        _ => false,
    })
}
