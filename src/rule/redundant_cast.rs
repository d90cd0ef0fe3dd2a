//! Drop casts to the type the operand already has.

use crate::expression::error::ExpressionResult;
use crate::expression::expr::{Expr, ExprArena, ExprId};
use crate::expression::rewriter::Rewrite;
use crate::expression::type_analyzer::type_of;
use crate::rule::{rewrite_bottom_up, ExpressionRule, RuleContext};

pub struct RemoveRedundantCasts;

impl ExpressionRule for RemoveRedundantCasts {
    fn name(&self) -> &'static str {
        "remove_redundant_casts"
    }

    fn apply(
        &self,
        arena: &mut ExprArena,
        expr: ExprId,
        context: &RuleContext<'_>,
    ) -> ExpressionResult<Rewrite> {
        rewrite_bottom_up(arena, expr, |arena, id, scope| {
            let Expr::Cast { expr: operand, ty, .. } = arena.get(id) else {
                return Ok(None);
            };
            // Lambda parameters without a declared type cannot be typed
            let Some(symbols) = scope.symbol_types(context.symbols) else {
                return Ok(None);
            };
            let operand_type = type_of(arena, context.functions, &symbols, *operand)?;
            Ok((operand_type == *ty).then_some(*operand))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expression::type_analyzer::SymbolTypes;
    use crate::function::BuiltinFunctions;
    use crate::types::DataType;

    #[test]
    fn test_remove_identity_casts() {
        let functions = BuiltinFunctions::new();
        let symbols = SymbolTypes::new()
            .with("x", DataType::BigInt)
            .with("s", DataType::Varchar(Some(3)));
        let context = RuleContext::new(&functions, &symbols);
        let mut arena = ExprArena::new();

        let x = arena.symbol("x");
        let cast = arena.cast(x, DataType::BigInt);
        let one = arena.bigint(1);
        let eq = arena.equal(cast, one);
        let result = RemoveRedundantCasts.apply(&mut arena, eq, &context).unwrap().unwrap_or(eq);
        assert_eq!(arena.display(result).to_string(), "(x = BIGINT '1')");

        let widening = arena.cast(x, DataType::Double);
        assert_eq!(
            RemoveRedundantCasts.apply(&mut arena, widening, &context).unwrap(),
            Rewrite::Unchanged
        );

        let s = arena.symbol("s");
        let unbounded = arena.cast(s, DataType::varchar());
        assert_eq!(
            RemoveRedundantCasts.apply(&mut arena, unbounded, &context).unwrap(),
            Rewrite::Unchanged
        );

        let null = arena.typed_null(DataType::Boolean);
        assert_eq!(
            RemoveRedundantCasts.apply(&mut arena, null, &context).unwrap(),
            Rewrite::Unchanged
        );
    }
}
