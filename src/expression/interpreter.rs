//! Constant folding and evaluation of expression trees.
//!
//! The interpreter walks a typed tree and produces a value, SQL NULL, or a
//! "not constant" marker when some input is unknown at planning time. NULL
//! handling follows SQL three-valued logic.

use std::cmp::Ordering;
use std::collections::HashMap;

use log::debug;

use crate::expression::error::{ExpressionError, ExpressionResult};
use crate::expression::expr::{Expr, ExprArena, ExprId, WhenClause};
use crate::expression::operator::{ComparisonOperator, LogicalOperator};
use crate::expression::scalar;
use crate::expression::type_analyzer::{types_of, ExpressionTypes, SymbolTypes};
use crate::function::FunctionResolver;
use crate::types::{DataType, Value};

/// Outcome of folding an expression at planning time
#[derive(Debug, Clone, PartialEq)]
pub enum ConstantResult {
    Value(Value),
    Null,
    NotConstant,
}

impl ConstantResult {
    pub fn is_constant(&self) -> bool {
        !matches!(self, ConstantResult::NotConstant)
    }

    /// The folded value, with NULL as `Value::Null`
    pub fn into_value(self) -> Option<Value> {
        match self {
            ConstantResult::Value(value) => Some(value),
            ConstantResult::Null => Some(Value::Null),
            ConstantResult::NotConstant => None,
        }
    }

    fn from_option(value: Option<Value>) -> Self {
        match value {
            Some(Value::Null) => ConstantResult::Null,
            Some(value) => ConstantResult::Value(value),
            None => ConstantResult::NotConstant,
        }
    }
}

/// Supplies values for free symbols during evaluation
pub trait SymbolResolver {
    /// Value bound to `name`, or `None` when it is not known
    fn get_value(&self, name: &str) -> Option<Value>;
}

/// Resolver that knows no symbols; every symbol is non-constant
pub struct NoOpSymbolResolver;

impl SymbolResolver for NoOpSymbolResolver {
    fn get_value(&self, _: &str) -> Option<Value> {
        None
    }
}

impl SymbolResolver for HashMap<String, Value> {
    fn get_value(&self, name: &str) -> Option<Value> {
        self.get(name).cloned()
    }
}

/// Fold `id` after typing it under `symbols`
pub fn fold_constant(
    arena: &ExprArena,
    functions: &dyn FunctionResolver,
    symbols: &SymbolTypes,
    id: ExprId,
) -> ExpressionResult<ConstantResult> {
    let types = types_of(arena, functions, symbols, id)?;
    ExpressionInterpreter::new(arena, &types, functions).fold(id)
}

/// Evaluator over an arena with precomputed node types
pub struct ExpressionInterpreter<'a> {
    arena: &'a ExprArena,
    types: &'a ExpressionTypes,
    functions: &'a dyn FunctionResolver,
}

impl<'a> ExpressionInterpreter<'a> {
    pub fn new(
        arena: &'a ExprArena,
        types: &'a ExpressionTypes,
        functions: &'a dyn FunctionResolver,
    ) -> Self {
        Self {
            arena,
            types,
            functions,
        }
    }

    /// Fold `id` without any symbol values.
    ///
    /// Arithmetic failures (division by zero, overflow, bad casts) make the
    /// expression non-constant instead of failing, so that the failure is
    /// left for execution time. Any other error is an invariant violation and
    /// is returned.
    pub fn fold(&self, id: ExprId) -> ExpressionResult<ConstantResult> {
        match self.eval(id, &NoOpSymbolResolver) {
            Ok(value) => Ok(ConstantResult::from_option(value)),
            Err(error) if error.is_arithmetic() => {
                debug!("not folding {}: {}", self.arena.display(id), error);
                Ok(ConstantResult::NotConstant)
            }
            Err(error) => Err(error),
        }
    }

    /// Evaluate `id` with symbol values from `symbols`. Returns `None` when
    /// the result depends on an unknown input. Arithmetic errors are returned.
    pub fn evaluate(
        &self,
        id: ExprId,
        symbols: &dyn SymbolResolver,
    ) -> ExpressionResult<Option<Value>> {
        self.eval(id, symbols)
    }

    fn type_of(&self, id: ExprId) -> ExpressionResult<&DataType> {
        self.types.type_of(id)
    }

    fn eval(&self, id: ExprId, symbols: &dyn SymbolResolver) -> ExpressionResult<Option<Value>> {
        match self.arena.get(id) {
            Expr::Literal { value, .. } => Ok(Some(value.clone())),

            Expr::Symbol(name) => Ok(symbols.get_value(name)),

            Expr::Arithmetic { op, left, right } => {
                let left_value = self.eval(*left, symbols)?;
                let right_value = self.eval(*right, symbols)?;
                match (left_value, right_value) {
                    (Some(Value::Null), _) | (_, Some(Value::Null)) => Ok(Some(Value::Null)),
                    (Some(l), Some(r)) => scalar::arithmetic(
                        *op,
                        &l,
                        self.type_of(*left)?,
                        &r,
                        self.type_of(*right)?,
                        self.type_of(id)?,
                    )
                    .map(Some),
                    _ => Ok(None),
                }
            }

            Expr::Negate(operand) => match self.eval(*operand, symbols)? {
                Some(Value::Null) => Ok(Some(Value::Null)),
                Some(value) => scalar::negate(&value, self.type_of(*operand)?).map(Some),
                None => Ok(None),
            },

            Expr::Comparison { op, left, right } => self.eval_comparison(*op, *left, *right, symbols),

            Expr::Logical { op, terms } => self.eval_logical(*op, terms, symbols),

            Expr::Not(operand) => match self.eval(*operand, symbols)? {
                Some(Value::Boolean(b)) => Ok(Some(Value::Boolean(!b))),
                Some(Value::Null) => Ok(Some(Value::Null)),
                Some(other) => Err(unexpected(&other, "NOT")),
                None => Ok(None),
            },

            Expr::IsNull(operand) => Ok(self
                .eval(*operand, symbols)?
                .map(|value| Value::Boolean(value.is_null()))),

            Expr::IsNotNull(operand) => Ok(self
                .eval(*operand, symbols)?
                .map(|value| Value::Boolean(!value.is_null()))),

            Expr::Between { value, min, max } => {
                let lower =
                    self.eval_comparison(ComparisonOperator::GreaterThanOrEqual, *value, *min, symbols)?;
                let upper =
                    self.eval_comparison(ComparisonOperator::LessThanOrEqual, *value, *max, symbols)?;
                Ok(kleene_and([lower, upper]))
            }

            Expr::In { value, list } => self.eval_in(*value, list, symbols),

            Expr::If {
                condition,
                true_value,
                false_value,
            } => match self.eval(*condition, symbols)? {
                None => Ok(None),
                Some(Value::Boolean(true)) => self.eval(*true_value, symbols),
                Some(Value::Boolean(false)) | Some(Value::Null) => match false_value {
                    Some(false_value) => self.eval(*false_value, symbols),
                    None => Ok(Some(Value::Null)),
                },
                Some(other) => Err(unexpected(&other, "IF condition")),
            },

            Expr::SearchedCase {
                when_clauses,
                default,
            } => {
                for WhenClause { operand, result } in when_clauses {
                    match self.eval(*operand, symbols)? {
                        None => return Ok(None),
                        Some(Value::Boolean(true)) => return self.eval(*result, symbols),
                        Some(Value::Boolean(false)) | Some(Value::Null) => {}
                        Some(other) => return Err(unexpected(&other, "CASE condition")),
                    }
                }
                self.eval_default(*default, symbols)
            }

            Expr::SimpleCase {
                operand,
                when_clauses,
                default,
            } => {
                for WhenClause {
                    operand: candidate,
                    result,
                } in when_clauses
                {
                    match self.eval_comparison(ComparisonOperator::Equal, *operand, *candidate, symbols)? {
                        None => return Ok(None),
                        Some(Value::Boolean(true)) => return self.eval(*result, symbols),
                        _ => {}
                    }
                }
                self.eval_default(*default, symbols)
            }

            Expr::Coalesce(operands) => {
                for operand in operands {
                    match self.eval(*operand, symbols)? {
                        None => return Ok(None),
                        Some(Value::Null) => {}
                        Some(value) => return Ok(Some(value)),
                    }
                }
                Ok(Some(Value::Null))
            }

            Expr::NullIf { first, second } => {
                let Some(first_value) = self.eval(*first, symbols)? else {
                    return Ok(None);
                };
                if first_value.is_null() {
                    return Ok(Some(Value::Null));
                }
                match self.eval_comparison(ComparisonOperator::Equal, *first, *second, symbols)? {
                    None => Ok(None),
                    Some(Value::Boolean(true)) => Ok(Some(Value::Null)),
                    _ => Ok(Some(first_value)),
                }
            }

            Expr::Cast { expr, ty, safe } => {
                let Some(value) = self.eval(*expr, symbols)? else {
                    return Ok(None);
                };
                match scalar::cast(&value, self.type_of(*expr)?, ty) {
                    Ok(value) => Ok(Some(value)),
                    Err(error) if *safe && error.is_arithmetic() => Ok(Some(Value::Null)),
                    Err(error) => Err(error),
                }
            }

            Expr::Call {
                function,
                arguments,
            } => {
                let resolved = self.functions.resolve_handle(function)?;
                let Some(implementation) = resolved.implementation.filter(|_| resolved.deterministic)
                else {
                    return Ok(None);
                };
                let mut values = Vec::with_capacity(arguments.len());
                let mut constant = true;
                for argument in arguments {
                    match self.eval(*argument, symbols)? {
                        Some(Value::Null) if resolved.null_on_null_input => {
                            return Ok(Some(Value::Null))
                        }
                        Some(value) => values.push(value),
                        None => constant = false,
                    }
                }
                if !constant {
                    return Ok(None);
                }
                implementation(&values, &function.argument_types, &resolved.return_type).map(Some)
            }

            // Functions are values only inside calls
            Expr::Lambda { .. } | Expr::Bind { .. } => Ok(None),

            Expr::Row(items) => Ok(self.eval_all(items, symbols)?.map(Value::Row)),

            Expr::Array(items) => Ok(self.eval_all(items, symbols)?.map(Value::Array)),

            Expr::Subscript { base, index } => self.eval_subscript(*base, *index, symbols),
        }
    }

    fn eval_default(
        &self,
        default: Option<ExprId>,
        symbols: &dyn SymbolResolver,
    ) -> ExpressionResult<Option<Value>> {
        match default {
            Some(default) => self.eval(default, symbols),
            None => Ok(Some(Value::Null)),
        }
    }

    fn eval_all(
        &self,
        items: &[ExprId],
        symbols: &dyn SymbolResolver,
    ) -> ExpressionResult<Option<Vec<Value>>> {
        let mut values = Vec::with_capacity(items.len());
        for item in items {
            match self.eval(*item, symbols)? {
                Some(value) => values.push(value),
                None => return Ok(None),
            }
        }
        Ok(Some(values))
    }

    fn eval_comparison(
        &self,
        op: ComparisonOperator,
        left: ExprId,
        right: ExprId,
        symbols: &dyn SymbolResolver,
    ) -> ExpressionResult<Option<Value>> {
        let left_value = self.eval(left, symbols)?;
        let right_value = self.eval(right, symbols)?;
        let (left_value, right_value) = match (left_value, right_value) {
            (Some(l), Some(r)) => (l, r),
            // A NULL side decides the result for all but IS DISTINCT FROM
            (Some(Value::Null), None) | (None, Some(Value::Null))
                if op != ComparisonOperator::IsDistinctFrom =>
            {
                return Ok(Some(Value::Null))
            }
            _ => return Ok(None),
        };
        let left_type = self.type_of(left)?;
        let right_type = self.type_of(right)?;
        compare_values(op, &left_value, left_type, &right_value, right_type).map(Some)
    }

    fn eval_logical(
        &self,
        op: LogicalOperator,
        terms: &[ExprId],
        symbols: &dyn SymbolResolver,
    ) -> ExpressionResult<Option<Value>> {
        // AND stops at the first FALSE, OR at the first TRUE
        let absorbing = op == LogicalOperator::Or;
        let mut results = Vec::with_capacity(terms.len());
        for term in terms {
            let result = self.eval(*term, symbols)?;
            if let Some(Value::Boolean(b)) = result {
                if b == absorbing {
                    return Ok(Some(Value::Boolean(absorbing)));
                }
            }
            results.push(result);
        }
        Ok(match op {
            LogicalOperator::And => kleene_and(results),
            LogicalOperator::Or => kleene_or(results),
        })
    }

    fn eval_in(
        &self,
        value: ExprId,
        list: &[ExprId],
        symbols: &dyn SymbolResolver,
    ) -> ExpressionResult<Option<Value>> {
        let target = self.eval(value, symbols)?;
        if matches!(target, Some(Value::Null)) {
            return Ok(Some(Value::Null));
        }
        let mut saw_null = false;
        let mut constant = target.is_some();
        for item in list {
            match self.eval_comparison(ComparisonOperator::Equal, value, *item, symbols)? {
                Some(Value::Boolean(true)) => return Ok(Some(Value::Boolean(true))),
                Some(Value::Boolean(false)) => {}
                Some(Value::Null) => saw_null = true,
                Some(other) => return Err(unexpected(&other, "IN")),
                None => constant = false,
            }
        }
        Ok(match (constant, saw_null) {
            (false, _) => None,
            (true, true) => Some(Value::Null),
            (true, false) => Some(Value::Boolean(false)),
        })
    }

    fn eval_subscript(
        &self,
        base: ExprId,
        index: ExprId,
        symbols: &dyn SymbolResolver,
    ) -> ExpressionResult<Option<Value>> {
        let base_type = self.type_of(base)?;
        if let DataType::Map(..) = base_type {
            return Ok(None);
        }
        let (Some(base_value), Some(index_value)) =
            (self.eval(base, symbols)?, self.eval(index, symbols)?)
        else {
            return Ok(None);
        };
        let items = match (&base_value, base_type) {
            (Value::Null, _) => return Ok(Some(Value::Null)),
            (Value::Row(items), DataType::Row(_)) | (Value::Array(items), DataType::Array(_)) => items,
            (other, _) => return Err(unexpected(other, "subscript base")),
        };
        let position = match index_value {
            Value::Null => return Ok(Some(Value::Null)),
            Value::Long(position) => position,
            other => return Err(unexpected(&other, "subscript index")),
        };
        position
            .checked_sub(1)
            .and_then(|position| usize::try_from(position).ok())
            .and_then(|position| items.get(position))
            .cloned()
            .map(Some)
            .ok_or(ExpressionError::SubscriptOutOfBounds {
                index: position,
                size: items.len(),
            })
    }
}

fn unexpected(value: &Value, context: &str) -> ExpressionError {
    ExpressionError::invalid(format!("unexpected value {:?} in {}", value, context))
}

/// Outcome of ordering two possibly nested values
enum NestedOrdering {
    Ordered(Ordering),
    /// A NaN decided the comparison
    Unordered,
    /// A NULL was reached before any field decided the comparison
    Indeterminate,
}

/// Pairs of (value, type) for the fields of two rows or arrays, or `None`
/// when the values are not containers
fn nested_fields<'v>(
    left: &'v Value,
    left_type: &'v DataType,
    right: &'v Value,
    right_type: &'v DataType,
) -> Option<Vec<((&'v Value, &'v DataType), (&'v Value, &'v DataType))>> {
    match (left, left_type, right, right_type) {
        (Value::Row(xs), DataType::Row(a), Value::Row(ys), DataType::Row(b)) => Some(
            xs.iter()
                .zip(a)
                .map(|(x, field)| (x, &field.ty))
                .zip(ys.iter().zip(b).map(|(y, field)| (y, &field.ty)))
                .collect(),
        ),
        (Value::Array(xs), DataType::Array(a), Value::Array(ys), DataType::Array(b)) => Some(
            xs.iter()
                .map(|x| (x, a.as_ref()))
                .zip(ys.iter().map(|y| (y, b.as_ref())))
                .collect(),
        ),
        _ => None,
    }
}

/// Lexicographic ordering; the first undecided NULL makes it indeterminate
fn compare_nested(
    left: &Value,
    left_type: &DataType,
    right: &Value,
    right_type: &DataType,
) -> ExpressionResult<NestedOrdering> {
    if left.is_null() || right.is_null() {
        return Ok(NestedOrdering::Indeterminate);
    }
    let Some(fields) = nested_fields(left, left_type, right, right_type) else {
        return Ok(match scalar::compare(left, left_type, right, right_type)? {
            Some(ordering) => NestedOrdering::Ordered(ordering),
            None => NestedOrdering::Unordered,
        });
    };
    for ((x, x_type), (y, y_type)) in fields {
        match compare_nested(x, x_type, y, y_type)? {
            NestedOrdering::Ordered(Ordering::Equal) => continue,
            other => return Ok(other),
        }
    }
    Ok(NestedOrdering::Ordered(match (left, right) {
        (Value::Array(xs), Value::Array(ys)) => xs.len().cmp(&ys.len()),
        _ => Ordering::Equal,
    }))
}

/// SQL equality: any field known to differ makes the result false even
/// when other fields are NULL
fn equal_nested(
    left: &Value,
    left_type: &DataType,
    right: &Value,
    right_type: &DataType,
) -> ExpressionResult<Option<bool>> {
    if left.is_null() || right.is_null() {
        return Ok(None);
    }
    let Some(fields) = nested_fields(left, left_type, right, right_type) else {
        return Ok(Some(
            scalar::compare(left, left_type, right, right_type)? == Some(Ordering::Equal),
        ));
    };
    if let (Value::Array(xs), Value::Array(ys)) = (left, right) {
        if xs.len() != ys.len() {
            return Ok(Some(false));
        }
    }
    let mut saw_null = false;
    for ((x, x_type), (y, y_type)) in fields {
        match equal_nested(x, x_type, y, y_type)? {
            Some(false) => return Ok(Some(false)),
            Some(true) => {}
            None => saw_null = true,
        }
    }
    Ok(if saw_null { None } else { Some(true) })
}

/// Compare two constant values under SQL semantics. Either side may be NULL.
pub fn compare_values(
    op: ComparisonOperator,
    left: &Value,
    left_type: &DataType,
    right: &Value,
    right_type: &DataType,
) -> ExpressionResult<Value> {
    let result = match op {
        ComparisonOperator::IsDistinctFrom => {
            let distinct = match (left.is_null(), right.is_null()) {
                (true, true) => false,
                (true, false) | (false, true) => true,
                (false, false) => match scalar::compare(left, left_type, right, right_type)? {
                    Some(ordering) => ordering != Ordering::Equal,
                    // NaN is not distinct from NaN
                    None => left != right,
                },
            };
            return Ok(Value::Boolean(distinct));
        }
        ComparisonOperator::Equal => equal_nested(left, left_type, right, right_type)?,
        ComparisonOperator::NotEqual => {
            equal_nested(left, left_type, right, right_type)?.map(|equal| !equal)
        }
        _ => match compare_nested(left, left_type, right, right_type)? {
            NestedOrdering::Indeterminate => None,
            NestedOrdering::Unordered => Some(false),
            NestedOrdering::Ordered(o) => Some(match op {
                ComparisonOperator::LessThan => o == Ordering::Less,
                ComparisonOperator::LessThanOrEqual => o != Ordering::Greater,
                ComparisonOperator::GreaterThan => o == Ordering::Greater,
                _ => o != Ordering::Less,
            }),
        },
    };
    Ok(result.map_or(Value::Null, Value::Boolean))
}

fn kleene_and(results: impl IntoIterator<Item = Option<Value>>) -> Option<Value> {
    let mut saw_null = false;
    let mut constant = true;
    for result in results {
        match result {
            Some(Value::Boolean(false)) => return Some(Value::Boolean(false)),
            Some(Value::Null) => saw_null = true,
            Some(_) => {}
            None => constant = false,
        }
    }
    match (constant, saw_null) {
        (false, _) => None,
        (true, true) => Some(Value::Null),
        (true, false) => Some(Value::Boolean(true)),
    }
}

fn kleene_or(results: impl IntoIterator<Item = Option<Value>>) -> Option<Value> {
    let mut saw_null = false;
    let mut constant = true;
    for result in results {
        match result {
            Some(Value::Boolean(true)) => return Some(Value::Boolean(true)),
            Some(Value::Null) => saw_null = true,
            Some(_) => {}
            None => constant = false,
        }
    }
    match (constant, saw_null) {
        (false, _) => None,
        (true, true) => Some(Value::Null),
        (true, false) => Some(Value::Boolean(false)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expression::operator::ArithmeticOperator;
    use crate::function::BuiltinFunctions;

    fn fold(arena: &ExprArena, symbols: &SymbolTypes, id: ExprId) -> ConstantResult {
        fold_constant(arena, &BuiltinFunctions::new(), symbols, id).unwrap()
    }

    #[test]
    fn test_division_by_zero_is_not_constant() {
        let mut arena = ExprArena::new();
        let one = arena.integer(1);
        let zero = arena.integer(0);
        let division = arena.arithmetic(ArithmeticOperator::Divide, one, zero);
        assert_eq!(fold(&arena, &SymbolTypes::new(), division), ConstantResult::NotConstant);

        let modulus = arena.arithmetic(ArithmeticOperator::Modulus, one, zero);
        assert_eq!(fold(&arena, &SymbolTypes::new(), modulus), ConstantResult::NotConstant);

        // Explicit evaluation reports the failure
        let catalog = BuiltinFunctions::new();
        let types = types_of(&arena, &catalog, &SymbolTypes::new(), division).unwrap();
        let interpreter = ExpressionInterpreter::new(&arena, &types, &catalog);
        assert_eq!(
            interpreter.evaluate(division, &NoOpSymbolResolver),
            Err(ExpressionError::DivisionByZero)
        );
    }

    #[test]
    fn test_null_propagation_through_arithmetic() {
        let mut arena = ExprArena::new();
        let x = arena.symbol("x");
        let null = arena.typed_null(DataType::BigInt);
        let sum = arena.add(x, null);
        let symbols = SymbolTypes::new().with("x", DataType::BigInt);
        assert_eq!(fold(&arena, &symbols, sum), ConstantResult::Null);

        let one = arena.bigint(1);
        let sum = arena.add(x, one);
        assert_eq!(fold(&arena, &symbols, sum), ConstantResult::NotConstant);
    }

    #[test]
    fn test_kleene_logic() {
        let mut arena = ExprArena::new();
        let symbols = SymbolTypes::new().with("x", DataType::Boolean);
        let t = arena.boolean(true);
        let f = arena.boolean(false);
        let null = arena.typed_null(DataType::Boolean);
        let x = arena.symbol("x");

        let cases = [
            (arena.and(vec![t, null]), ConstantResult::Null),
            (arena.and(vec![f, null]), ConstantResult::Value(Value::Boolean(false))),
            (arena.and(vec![x, f]), ConstantResult::Value(Value::Boolean(false))),
            (arena.and(vec![x, t]), ConstantResult::NotConstant),
            (arena.or(vec![t, null]), ConstantResult::Value(Value::Boolean(true))),
            (arena.or(vec![f, null]), ConstantResult::Null),
            (arena.or(vec![null, x, t]), ConstantResult::Value(Value::Boolean(true))),
            (arena.not(null), ConstantResult::Null),
        ];
        for (id, expected) in cases {
            assert_eq!(fold(&arena, &symbols, id), expected, "{}", arena.display(id));
        }
    }

    #[test]
    fn test_in_list_with_null() {
        let mut arena = ExprArena::new();
        let symbols = SymbolTypes::new();
        let one = arena.integer(1);
        let two = arena.integer(2);
        let null = arena.typed_null(DataType::Integer);

        let hit = arena.in_list(one, vec![null, one]);
        assert_eq!(fold(&arena, &symbols, hit), ConstantResult::Value(Value::Boolean(true)));

        let miss_with_null = arena.in_list(one, vec![two, null]);
        assert_eq!(fold(&arena, &symbols, miss_with_null), ConstantResult::Null);

        let miss = arena.in_list(one, vec![two]);
        assert_eq!(fold(&arena, &symbols, miss), ConstantResult::Value(Value::Boolean(false)));

        let null_value = arena.in_list(null, vec![one]);
        assert_eq!(fold(&arena, &symbols, null_value), ConstantResult::Null);
    }

    #[test]
    fn test_decimal_arithmetic() {
        let mut arena = ExprArena::new();
        let a = arena.decimal(125, 5, 2);
        let b = arena.decimal(5, 2, 1);
        let sum = arena.add(a, b);
        assert_eq!(
            fold(&arena, &SymbolTypes::new(), sum),
            ConstantResult::Value(Value::Decimal(175))
        );
    }

    #[test]
    fn test_decimal_overflow_is_not_constant() {
        let mut arena = ExprArena::new();
        let symbols = SymbolTypes::new();
        // DECIMAL '1' / CAST(DECIMAL '0.5' AS decimal(38, 38))
        let one = arena.decimal(1, 1, 0);
        let half = arena.decimal(5, 1, 1);
        let widened = arena.cast(half, DataType::decimal(38, 38));
        let quotient = arena.arithmetic(ArithmeticOperator::Divide, one, widened);
        assert_eq!(fold(&arena, &symbols, quotient), ConstantResult::NotConstant);

        let max = arena.decimal(10_i128.pow(38) - 1, 38, 0);
        let sum = arena.add(max, one);
        assert_eq!(fold(&arena, &symbols, sum), ConstantResult::NotConstant);

        let catalog = BuiltinFunctions::new();
        let types = types_of(&arena, &catalog, &symbols, quotient).unwrap();
        let interpreter = ExpressionInterpreter::new(&arena, &types, &catalog);
        assert!(matches!(
            interpreter.evaluate(quotient, &NoOpSymbolResolver),
            Err(ExpressionError::NumericOverflow { .. })
        ));
    }

    #[test]
    fn test_row_comparison_with_null_fields() {
        let mut arena = ExprArena::new();
        let symbols = SymbolTypes::new();
        let one = arena.integer(1);
        let two = arena.integer(2);
        let null = arena.typed_null(DataType::Integer);
        let one_null = arena.row(vec![one, null]);
        let two_null = arena.row(vec![two, null]);
        let one_two = arena.row(vec![one, two]);

        let cases = [
            (arena.equal(one_null, two_null), ConstantResult::Value(Value::Boolean(false))),
            (
                arena.comparison(ComparisonOperator::NotEqual, one_null, two_null),
                ConstantResult::Value(Value::Boolean(true)),
            ),
            (arena.equal(one_null, one_two), ConstantResult::Null),
            (
                arena.comparison(ComparisonOperator::LessThan, one_null, two_null),
                ConstantResult::Value(Value::Boolean(true)),
            ),
            (arena.comparison(ComparisonOperator::LessThan, one_null, one_two), ConstantResult::Null),
            (
                arena.comparison(ComparisonOperator::IsDistinctFrom, one_null, one_null),
                ConstantResult::Value(Value::Boolean(false)),
            ),
        ];
        for (id, expected) in cases {
            assert_eq!(fold(&arena, &symbols, id), expected, "{}", arena.display(id));
        }

        let short = arena.array(vec![one]);
        let long = arena.array(vec![null, two]);
        let unequal_lengths = arena.equal(short, long);
        assert_eq!(
            fold(&arena, &symbols, unequal_lengths),
            ConstantResult::Value(Value::Boolean(false))
        );
    }

    #[test]
    fn test_nan_comparison() {
        let mut arena = ExprArena::new();
        let nan = arena.double(f64::NAN);
        let one = arena.double(1.0);
        let equal = arena.equal(nan, nan);
        let not_equal = arena.comparison(ComparisonOperator::NotEqual, nan, one);
        let distinct = arena.comparison(ComparisonOperator::IsDistinctFrom, nan, nan);
        let symbols = SymbolTypes::new();
        assert_eq!(fold(&arena, &symbols, equal), ConstantResult::Value(Value::Boolean(false)));
        assert_eq!(fold(&arena, &symbols, not_equal), ConstantResult::Value(Value::Boolean(true)));
        assert_eq!(fold(&arena, &symbols, distinct), ConstantResult::Value(Value::Boolean(false)));
    }

    #[test]
    fn test_cast_to_timestamp() {
        let mut arena = ExprArena::new();
        let text = arena.varchar("2020-12-31 23:59:59.9995");
        let cast = arena.cast(text, DataType::timestamp(3));
        let expected = crate::types::datetime::parse_timestamp("2021-01-01 00:00:00")
            .unwrap()
            .0;
        assert_eq!(
            fold(&arena, &SymbolTypes::new(), cast),
            ConstantResult::Value(Value::Long(expected))
        );

        let bad = arena.varchar("not a timestamp");
        let cast = arena.cast(bad, DataType::timestamp(3));
        assert_eq!(fold(&arena, &SymbolTypes::new(), cast), ConstantResult::NotConstant);
        let try_cast = arena.try_cast(bad, DataType::timestamp(3));
        assert_eq!(fold(&arena, &SymbolTypes::new(), try_cast), ConstantResult::Null);
    }

    #[test]
    fn test_function_calls() {
        let mut arena = ExprArena::new();
        let date = arena.date(18_262);
        let year = arena.call("year", vec![DataType::Date], vec![date]);
        assert_eq!(
            fold(&arena, &SymbolTypes::new(), year),
            ConstantResult::Value(Value::Long(2020))
        );

        let rand = arena.call("rand", vec![], vec![]);
        assert_eq!(fold(&arena, &SymbolTypes::new(), rand), ConstantResult::NotConstant);

        let null = arena.typed_null(DataType::Date);
        let year_of_null = arena.call("year", vec![DataType::Date], vec![null]);
        assert_eq!(fold(&arena, &SymbolTypes::new(), year_of_null), ConstantResult::Null);
    }

    #[test]
    fn test_case_evaluates_chosen_branch_only() {
        let mut arena = ExprArena::new();
        let t = arena.boolean(true);
        let one = arena.integer(1);
        let zero = arena.integer(0);
        let division = arena.arithmetic(ArithmeticOperator::Divide, one, zero);
        let if_expr = arena.if_expr(t, one, Some(division));
        assert_eq!(
            fold(&arena, &SymbolTypes::new(), if_expr),
            ConstantResult::Value(Value::Long(1))
        );

        let f = arena.boolean(false);
        let case = arena.searched_case(vec![WhenClause::new(f, division)], None);
        assert_eq!(fold(&arena, &SymbolTypes::new(), case), ConstantResult::Null);
    }

    #[test]
    fn test_coalesce_and_null_if() {
        let mut arena = ExprArena::new();
        let symbols = SymbolTypes::new().with("x", DataType::Integer);
        let null = arena.typed_null(DataType::Integer);
        let one = arena.integer(1);
        let x = arena.symbol("x");

        let coalesce = arena.coalesce(vec![null, one, x]);
        assert_eq!(fold(&arena, &symbols, coalesce), ConstantResult::Value(Value::Long(1)));

        let blocked = arena.coalesce(vec![x, one]);
        assert_eq!(fold(&arena, &symbols, blocked), ConstantResult::NotConstant);

        let null_if = arena.null_if(one, one);
        assert_eq!(fold(&arena, &symbols, null_if), ConstantResult::Null);
    }

    #[test]
    fn test_subscripts() {
        let mut arena = ExprArena::new();
        let one = arena.integer(1);
        let two = arena.integer(2);
        let array = arena.array(vec![one, two]);
        let index = arena.bigint(2);
        let element = arena.subscript(array, index);
        assert_eq!(
            fold(&arena, &SymbolTypes::new(), element),
            ConstantResult::Value(Value::Long(2))
        );

        let out_of_range = arena.bigint(3);
        let element = arena.subscript(array, out_of_range);
        assert_eq!(fold(&arena, &SymbolTypes::new(), element), ConstantResult::NotConstant);
    }

    #[test]
    fn test_evaluate_with_symbol_values() {
        let mut arena = ExprArena::new();
        let x = arena.symbol("x");
        let ten = arena.bigint(10);
        let predicate = arena.comparison(ComparisonOperator::LessThan, x, ten);
        let catalog = BuiltinFunctions::new();
        let symbols = SymbolTypes::new().with("x", DataType::BigInt);
        let types = types_of(&arena, &catalog, &symbols, predicate).unwrap();
        let interpreter = ExpressionInterpreter::new(&arena, &types, &catalog);

        let mut values = HashMap::new();
        values.insert("x".to_string(), Value::Long(3));
        assert_eq!(
            interpreter.evaluate(predicate, &values).unwrap(),
            Some(Value::Boolean(true))
        );
        values.insert("x".to_string(), Value::Null);
        assert_eq!(interpreter.evaluate(predicate, &values).unwrap(), Some(Value::Null));
        assert_eq!(interpreter.evaluate(predicate, &NoOpSymbolResolver).unwrap(), None);
    }
}
