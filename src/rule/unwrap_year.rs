//! Replace `year(x) <op> constant` by a range predicate on `x`.
//!
//! `year(d) = 2020` over a DATE becomes
//! `d BETWEEN DATE '2020-01-01' AND DATE '2020-12-31'`, which a connector can
//! use for pruning. The upper bound is the last value representable at the
//! argument's precision before the next year starts.
//!
//! A constant that folds to NULL decides the comparison for any argument
//! type. Otherwise the rewrite is skipped when the constant cannot be
//! folded, when the argument carries a time zone (the year then depends on
//! the session zone), and for argument types other than DATE and TIMESTAMP.

use log::trace;

use crate::expression::error::ExpressionResult;
use crate::expression::expr::{Expr, ExprArena, ExprId};
use crate::expression::interpreter::{fold_constant, ConstantResult};
use crate::expression::operator::ComparisonOperator;
use crate::expression::rewriter::{LambdaScope, Rewrite};
use crate::function::FunctionHandle;
use crate::rule::{rewrite_bottom_up, ExpressionRule, RuleContext};
use crate::types::data_type::{MAX_SHORT_TIMESTAMP_PRECISION, MAX_TIMESTAMP_PRECISION};
use crate::types::datetime::{
    rescale_factor, year_start_epoch_days, year_start_epoch_micros, PICOS_PER_MICRO,
};
use crate::types::{DataType, Value};

pub struct UnwrapYearInComparison;

impl ExpressionRule for UnwrapYearInComparison {
    fn name(&self) -> &'static str {
        "unwrap_year_in_comparison"
    }

    fn apply(
        &self,
        arena: &mut ExprArena,
        expr: ExprId,
        context: &RuleContext<'_>,
    ) -> ExpressionResult<Rewrite> {
        rewrite_bottom_up(arena, expr, |arena, id, scope| {
            unwrap_node(arena, id, scope, context)
        })
    }
}

fn unwrap_node(
    arena: &mut ExprArena,
    id: ExprId,
    scope: &LambdaScope,
    context: &RuleContext<'_>,
) -> ExpressionResult<Option<ExprId>> {
    match arena.get(id).clone() {
        Expr::Comparison { op, left, right } => {
            let (op, call, value) = if year_argument(arena, left).is_some() {
                (op, left, right)
            } else if year_argument(arena, right).is_some() {
                (op.flip(), right, left)
            } else {
                return Ok(None);
            };
            unwrap_comparison(arena, op, call, value, scope, context)
        }
        Expr::In { value, list } if year_argument(arena, value).is_some() => {
            let mut disjuncts = Vec::with_capacity(list.len());
            for item in list {
                match unwrap_comparison(arena, ComparisonOperator::Equal, value, item, scope, context)? {
                    Some(rewritten) => disjuncts.push(rewritten),
                    // All items or none
                    None => return Ok(None),
                }
            }
            Ok(Some(arena.combine_disjuncts(disjuncts)))
        }
        _ => Ok(None),
    }
}

/// Argument and its declared type when `id` is a one-argument `year` call
fn year_argument(arena: &ExprArena, id: ExprId) -> Option<(ExprId, DataType)> {
    match arena.get(id) {
        Expr::Call {
            function: FunctionHandle {
                name,
                argument_types,
            },
            arguments,
        } if name.eq_ignore_ascii_case("year") && arguments.len() == 1 => {
            argument_types.first().map(|ty| (arguments[0], ty.clone()))
        }
        _ => None,
    }
}

fn unwrap_comparison(
    arena: &mut ExprArena,
    op: ComparisonOperator,
    call: ExprId,
    value: ExprId,
    scope: &LambdaScope,
    context: &RuleContext<'_>,
) -> ExpressionResult<Option<ExprId>> {
    let Some((argument, argument_type)) = year_argument(arena, call) else {
        return Ok(None);
    };
    let Some(symbols) = scope.symbol_types(context.symbols) else {
        return Ok(None);
    };
    // A NULL year decides the result whatever the argument type
    let year = match fold_constant(arena, context.functions, &symbols, value)? {
        ConstantResult::NotConstant => return Ok(None),
        ConstantResult::Null => {
            return Ok(Some(match op {
                ComparisonOperator::IsDistinctFrom => arena.is_not_null(argument),
                _ => arena.typed_null(DataType::Boolean),
            }))
        }
        ConstantResult::Value(Value::Long(year)) => year,
        ConstantResult::Value(_) => return Ok(None),
    };
    if !matches!(argument_type, DataType::Date | DataType::Timestamp { .. }) {
        return Ok(None);
    }
    let Some((start, end)) = year_bounds(arena, &argument_type, year) else {
        trace!("year {} has no representable range for {}", year, argument_type);
        return Ok(None);
    };

    let rewritten = match op {
        ComparisonOperator::Equal => arena.between(argument, start, end),
        ComparisonOperator::NotEqual => {
            let between = arena.between(argument, start, end);
            arena.not(between)
        }
        ComparisonOperator::IsDistinctFrom => {
            let is_null = arena.is_null(argument);
            let between = arena.between(argument, start, end);
            let not_between = arena.not(between);
            arena.or(vec![is_null, not_between])
        }
        ComparisonOperator::LessThan => arena.comparison(op, argument, start),
        ComparisonOperator::LessThanOrEqual => arena.comparison(op, argument, end),
        ComparisonOperator::GreaterThan => arena.comparison(op, argument, end),
        ComparisonOperator::GreaterThanOrEqual => arena.comparison(op, argument, start),
    };
    Ok(Some(rewritten))
}

/// Literals for the first and the last value of `year` in `ty`
fn year_bounds(arena: &mut ExprArena, ty: &DataType, year: i64) -> Option<(ExprId, ExprId)> {
    let year = i32::try_from(year).ok()?;
    let next_year = year.checked_add(1)?;
    match ty {
        DataType::Date => {
            let start = year_start_epoch_days(year)?;
            let end = year_start_epoch_days(next_year)? - 1;
            Some((arena.date(start), arena.date(end)))
        }
        DataType::Timestamp { precision } if *precision <= MAX_SHORT_TIMESTAMP_PRECISION => {
            let start = year_start_epoch_micros(year)?;
            let end = year_start_epoch_micros(next_year)?
                .checked_sub(rescale_factor(*precision, MAX_SHORT_TIMESTAMP_PRECISION))?;
            Some((arena.timestamp(start, *precision), arena.timestamp(end, *precision)))
        }
        DataType::Timestamp { precision } => {
            let start = Value::LongTimestamp {
                epoch_micros: year_start_epoch_micros(year)?,
                picos_of_micro: 0,
            };
            let end = Value::LongTimestamp {
                epoch_micros: year_start_epoch_micros(next_year)?.checked_sub(1)?,
                picos_of_micro: PICOS_PER_MICRO
                    - rescale_factor(*precision, MAX_TIMESTAMP_PRECISION) as u32,
            };
            Some((
                arena.literal(start, ty.clone()),
                arena.literal(end, ty.clone()),
            ))
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expression::type_analyzer::SymbolTypes;
    use crate::function::BuiltinFunctions;

    fn unwrap(arena: &mut ExprArena, symbols: &SymbolTypes, id: ExprId) -> Rewrite {
        let functions = BuiltinFunctions::new();
        let context = RuleContext::new(&functions, symbols);
        UnwrapYearInComparison.apply(arena, id, &context).unwrap()
    }

    fn year_comparison(
        arena: &mut ExprArena,
        ty: DataType,
        op: ComparisonOperator,
        value: ExprId,
    ) -> ExprId {
        let d = arena.symbol("d");
        let year = arena.call("year", vec![ty], vec![d]);
        arena.comparison(op, year, value)
    }

    fn rendered(arena: &mut ExprArena, symbols: &SymbolTypes, id: ExprId) -> String {
        let result = unwrap(arena, symbols, id).unwrap_or(id);
        arena.display(result).to_string()
    }

    #[test]
    fn test_unwrap_date() {
        let mut arena = ExprArena::new();
        let symbols = SymbolTypes::new().with("d", DataType::Date);
        let year = arena.bigint(2020);

        let eq = year_comparison(&mut arena, DataType::Date, ComparisonOperator::Equal, year);
        assert_eq!(
            rendered(&mut arena, &symbols, eq),
            "(d BETWEEN DATE '2020-01-01' AND DATE '2020-12-31')"
        );

        let ne = year_comparison(&mut arena, DataType::Date, ComparisonOperator::NotEqual, year);
        assert_eq!(
            rendered(&mut arena, &symbols, ne),
            "(NOT (d BETWEEN DATE '2020-01-01' AND DATE '2020-12-31'))"
        );

        let cases = [
            (ComparisonOperator::LessThan, "(d < DATE '2020-01-01')"),
            (ComparisonOperator::LessThanOrEqual, "(d <= DATE '2020-12-31')"),
            (ComparisonOperator::GreaterThan, "(d > DATE '2020-12-31')"),
            (ComparisonOperator::GreaterThanOrEqual, "(d >= DATE '2020-01-01')"),
        ];
        for (op, expected) in cases {
            let id = year_comparison(&mut arena, DataType::Date, op, year);
            assert_eq!(rendered(&mut arena, &symbols, id), expected);
        }

        let distinct =
            year_comparison(&mut arena, DataType::Date, ComparisonOperator::IsDistinctFrom, year);
        assert_eq!(
            rendered(&mut arena, &symbols, distinct),
            "((d IS NULL) OR (NOT (d BETWEEN DATE '2020-01-01' AND DATE '2020-12-31')))"
        );
    }

    #[test]
    fn test_unwrap_timestamp_precision() {
        let mut arena = ExprArena::new();
        let year = arena.bigint(2020);

        let symbols = SymbolTypes::new().with("d", DataType::timestamp(3));
        let eq = year_comparison(&mut arena, DataType::timestamp(3), ComparisonOperator::Equal, year);
        assert_eq!(
            rendered(&mut arena, &symbols, eq),
            "(d BETWEEN TIMESTAMP '2020-01-01 00:00:00.000' AND TIMESTAMP '2020-12-31 23:59:59.999')"
        );

        let symbols = SymbolTypes::new().with("d", DataType::timestamp(0));
        let eq = year_comparison(&mut arena, DataType::timestamp(0), ComparisonOperator::Equal, year);
        assert_eq!(
            rendered(&mut arena, &symbols, eq),
            "(d BETWEEN TIMESTAMP '2020-01-01 00:00:00' AND TIMESTAMP '2020-12-31 23:59:59')"
        );

        let symbols = SymbolTypes::new().with("d", DataType::timestamp(9));
        let eq = year_comparison(&mut arena, DataType::timestamp(9), ComparisonOperator::Equal, year);
        assert_eq!(
            rendered(&mut arena, &symbols, eq),
            "(d BETWEEN TIMESTAMP '2020-01-01 00:00:00.000000000' AND TIMESTAMP '2020-12-31 23:59:59.999999999')"
        );
    }

    #[test]
    fn test_null_constant() {
        let mut arena = ExprArena::new();
        let symbols = SymbolTypes::new().with("d", DataType::Date);
        let null = arena.typed_null(DataType::BigInt);

        let eq = year_comparison(&mut arena, DataType::Date, ComparisonOperator::Equal, null);
        assert_eq!(rendered(&mut arena, &symbols, eq), "CAST(null AS boolean)");

        let lt = year_comparison(&mut arena, DataType::Date, ComparisonOperator::LessThan, null);
        assert_eq!(rendered(&mut arena, &symbols, lt), "CAST(null AS boolean)");

        let distinct =
            year_comparison(&mut arena, DataType::Date, ComparisonOperator::IsDistinctFrom, null);
        assert_eq!(rendered(&mut arena, &symbols, distinct), "(d IS NOT NULL)");
    }

    #[test]
    fn test_null_constant_with_zoned_argument() {
        let mut arena = ExprArena::new();
        let zoned = DataType::timestamp_with_time_zone(3);
        let symbols = SymbolTypes::new().with("d", zoned.clone());
        let null = arena.typed_null(DataType::BigInt);

        let eq = year_comparison(&mut arena, zoned.clone(), ComparisonOperator::Equal, null);
        assert_eq!(rendered(&mut arena, &symbols, eq), "CAST(null AS boolean)");

        let distinct =
            year_comparison(&mut arena, zoned.clone(), ComparisonOperator::IsDistinctFrom, null);
        assert_eq!(rendered(&mut arena, &symbols, distinct), "(d IS NOT NULL)");

        // A non-NULL year still leaves zoned arguments alone
        let year = arena.bigint(2020);
        let ge = year_comparison(&mut arena, zoned, ComparisonOperator::GreaterThanOrEqual, year);
        assert_eq!(unwrap(&mut arena, &symbols, ge), Rewrite::Unchanged);
    }

    #[test]
    fn test_not_unwrapped() {
        let mut arena = ExprArena::new();

        // Non-constant right-hand side
        let symbols = SymbolTypes::new()
            .with("d", DataType::Date)
            .with("y", DataType::BigInt);
        let y = arena.symbol("y");
        let eq = year_comparison(&mut arena, DataType::Date, ComparisonOperator::Equal, y);
        assert_eq!(unwrap(&mut arena, &symbols, eq), Rewrite::Unchanged);

        // Zoned timestamps depend on the session zone
        let zoned = DataType::timestamp_with_time_zone(3);
        let symbols = SymbolTypes::new().with("d", zoned.clone());
        let year = arena.bigint(2020);
        let eq = year_comparison(&mut arena, zoned, ComparisonOperator::Equal, year);
        assert_eq!(unwrap(&mut arena, &symbols, eq), Rewrite::Unchanged);

        // Folding failures are not rewritten
        let symbols = SymbolTypes::new().with("d", DataType::Date);
        let one = arena.bigint(1);
        let zero = arena.bigint(0);
        let division = arena.arithmetic(crate::expression::ArithmeticOperator::Divide, one, zero);
        let eq = year_comparison(&mut arena, DataType::Date, ComparisonOperator::Equal, division);
        assert_eq!(unwrap(&mut arena, &symbols, eq), Rewrite::Unchanged);
    }

    #[test]
    fn test_in_list_all_or_nothing() {
        let mut arena = ExprArena::new();
        let symbols = SymbolTypes::new()
            .with("d", DataType::Date)
            .with("y", DataType::BigInt);
        let d = arena.symbol("d");
        let year = arena.call("year", vec![DataType::Date], vec![d]);
        let y2020 = arena.bigint(2020);
        let y2022 = arena.bigint(2022);

        let in_list = arena.in_list(year, vec![y2020, y2022]);
        assert_eq!(
            rendered(&mut arena, &symbols, in_list),
            "((d BETWEEN DATE '2020-01-01' AND DATE '2020-12-31') OR (d BETWEEN DATE '2022-01-01' AND DATE '2022-12-31'))"
        );

        let y = arena.symbol("y");
        let partial = arena.in_list(year, vec![y2020, y]);
        assert_eq!(unwrap(&mut arena, &symbols, partial), Rewrite::Unchanged);
    }

    #[test]
    fn test_constant_on_left() {
        let mut arena = ExprArena::new();
        let symbols = SymbolTypes::new().with("d", DataType::Date);
        let d = arena.symbol("d");
        let year = arena.call("year", vec![DataType::Date], vec![d]);
        let y2020 = arena.bigint(2020);
        let lt = arena.comparison(ComparisonOperator::LessThan, y2020, year);
        assert_eq!(rendered(&mut arena, &symbols, lt), "(d > DATE '2020-12-31')");
    }
}
