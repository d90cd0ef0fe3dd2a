//! Collapse subscripts of row constructors.
//!
//! `ROW(a, b)[2]` becomes `b`. When the row sits under casts, the selected
//! field is cast to the matching field type of each cast, innermost first,
//! keeping the `TRY_CAST` flag: `CAST(ROW(1, 2) AS row(x bigint, y bigint))[1]`
//! becomes `CAST(1 AS bigint)`.

use crate::expression::error::ExpressionResult;
use crate::expression::expr::{Expr, ExprArena, ExprId};
use crate::expression::rewriter::Rewrite;
use crate::rule::{rewrite_bottom_up, ExpressionRule, RuleContext};
use crate::types::{DataType, Value};

pub struct UnwrapRowSubscript;

impl ExpressionRule for UnwrapRowSubscript {
    fn name(&self) -> &'static str {
        "unwrap_row_subscript"
    }

    fn apply(
        &self,
        arena: &mut ExprArena,
        expr: ExprId,
        _context: &RuleContext<'_>,
    ) -> ExpressionResult<Rewrite> {
        rewrite_bottom_up(arena, expr, |arena, id, _| Ok(unwrap_subscript(arena, id)))
    }
}

fn unwrap_subscript(arena: &mut ExprArena, id: ExprId) -> Option<ExprId> {
    let Expr::Subscript { base, index } = arena.get(id) else {
        return None;
    };
    let position = match arena.literal_value(*index) {
        Some((Value::Long(position), _)) => usize::try_from(position.checked_sub(1)?).ok()?,
        _ => return None,
    };

    // Casts from the outermost inwards
    let mut casts: Vec<(DataType, bool)> = Vec::new();
    let mut current = *base;
    loop {
        match arena.get(current) {
            Expr::Cast { expr, ty, safe } => {
                casts.push((ty.row_field(position)?.clone(), *safe));
                current = *expr;
            }
            Expr::Row(items) => {
                let mut result = *items.get(position)?;
                for (ty, safe) in casts.into_iter().rev() {
                    result = if safe {
                        arena.try_cast(result, ty)
                    } else {
                        arena.cast(result, ty)
                    };
                }
                return Some(result);
            }
            _ => return None,
        }
    }
}
