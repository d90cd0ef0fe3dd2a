//! Type analysis for expressions.
//!
//! Types are computed bottom-up from a symbol environment and recorded per
//! node identity. Lambda bodies are typed in an environment extended with the
//! parameter types taken from the enclosing call's formal signature; those
//! bindings are discarded when the lambda has been typed.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::expression::error::{ExpressionError, ExpressionResult};
use crate::expression::expr::{Expr, ExprArena, ExprId, WhenClause};
use crate::function::FunctionResolver;
use crate::types::{DataType, Value};

/// Types of the free symbols an expression may reference
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SymbolTypes {
    types: HashMap<String, DataType>,
}

impl SymbolTypes {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, name: impl Into<String>, ty: DataType) -> Self {
        self.insert(name, ty);
        self
    }

    pub fn insert(&mut self, name: impl Into<String>, ty: DataType) {
        self.types.insert(name.into(), ty);
    }

    pub fn get(&self, name: &str) -> Option<&DataType> {
        self.types.get(name)
    }
}

impl<S: Into<String>> FromIterator<(S, DataType)> for SymbolTypes {
    fn from_iter<I: IntoIterator<Item = (S, DataType)>>(iter: I) -> Self {
        let mut types = SymbolTypes::new();
        for (name, ty) in iter {
            types.insert(name, ty);
        }
        types
    }
}

/// Types assigned to nodes, keyed by node identity
#[derive(Debug, Clone, Default)]
pub struct ExpressionTypes {
    types: HashMap<ExprId, DataType>,
}

impl ExpressionTypes {
    pub fn get(&self, id: ExprId) -> Option<&DataType> {
        self.types.get(&id)
    }

    /// Type of a node that must have been analyzed
    pub fn type_of(&self, id: ExprId) -> ExpressionResult<&DataType> {
        self.types
            .get(&id)
            .ok_or_else(|| ExpressionError::invalid(format!("no type recorded for node {:?}", id)))
    }

    pub fn len(&self) -> usize {
        self.types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }
}

/// Compute the type of every node reachable from `root`
pub fn types_of(
    arena: &ExprArena,
    functions: &dyn FunctionResolver,
    symbols: &SymbolTypes,
    root: ExprId,
) -> ExpressionResult<ExpressionTypes> {
    let mut analyzer = TypeAnalyzer::new(arena, functions, symbols);
    analyzer.analyze(root)?;
    Ok(analyzer.finish())
}

/// Type of `root` alone
pub fn type_of(
    arena: &ExprArena,
    functions: &dyn FunctionResolver,
    symbols: &SymbolTypes,
    root: ExprId,
) -> ExpressionResult<DataType> {
    TypeAnalyzer::new(arena, functions, symbols).analyze(root)
}

/// Bottom-up type analyzer with per-node memoization
pub struct TypeAnalyzer<'a> {
    arena: &'a ExprArena,
    functions: &'a dyn FunctionResolver,
    symbols: &'a SymbolTypes,
    types: HashMap<ExprId, DataType>,
    /// Lambda parameter bindings, innermost last
    scopes: Vec<HashMap<String, DataType>>,
}

impl<'a> TypeAnalyzer<'a> {
    pub fn new(
        arena: &'a ExprArena,
        functions: &'a dyn FunctionResolver,
        symbols: &'a SymbolTypes,
    ) -> Self {
        Self {
            arena,
            functions,
            symbols,
            types: HashMap::new(),
            scopes: Vec::new(),
        }
    }

    /// Type `root` and every node below it; may be called for several roots
    pub fn analyze(&mut self, root: ExprId) -> ExpressionResult<DataType> {
        self.process(root, None)
    }

    pub fn finish(self) -> ExpressionTypes {
        ExpressionTypes { types: self.types }
    }

    fn process(&mut self, id: ExprId, lambda_arguments: Option<&[DataType]>) -> ExpressionResult<DataType> {
        // Nodes under a lambda depend on the bindings in effect, so only
        // top-level results are reused.
        if self.scopes.is_empty() {
            if let Some(ty) = self.types.get(&id) {
                return Ok(ty.clone());
            }
        }
        let ty = self.compute(id, lambda_arguments)?;
        self.types.insert(id, ty.clone());
        Ok(ty)
    }

    fn compute(&mut self, id: ExprId, lambda_arguments: Option<&[DataType]>) -> ExpressionResult<DataType> {
        let arena = self.arena;
        match arena.get(id) {
            Expr::Literal { ty, .. } => Ok(ty.clone()),

            Expr::Symbol(name) => self.resolve_symbol(name),

            Expr::Arithmetic { op, left, right } => {
                let left_type = self.process(*left, None)?;
                let right_type = self.process(*right, None)?;
                op.output_type(&left_type, &right_type)
                    .ok_or_else(|| ExpressionError::InvalidOperandTypes {
                        operator: op.as_str().to_string(),
                        left: left_type.to_string(),
                        right: right_type.to_string(),
                    })
            }

            Expr::Negate(operand) => {
                let ty = self.process(*operand, None)?;
                if ty.is_numeric() || ty.is_interval() || ty.is_unknown() {
                    Ok(ty)
                } else {
                    Err(ExpressionError::InvalidOperandTypes {
                        operator: "-".to_string(),
                        left: ty.to_string(),
                        right: String::new(),
                    })
                }
            }

            Expr::Comparison { op, left, right } => {
                let left_type = self.process(*left, None)?;
                let right_type = self.process(*right, None)?;
                self.require_comparable(&left_type, &right_type, op.as_str())?;
                Ok(DataType::Boolean)
            }

            Expr::Logical { op, terms } => {
                for term in terms {
                    let ty = self.process(*term, None)?;
                    self.require_boolean(&ty, op.as_str())?;
                }
                Ok(DataType::Boolean)
            }

            Expr::Not(operand) => {
                let ty = self.process(*operand, None)?;
                self.require_boolean(&ty, "NOT")?;
                Ok(DataType::Boolean)
            }

            Expr::IsNull(operand) | Expr::IsNotNull(operand) => {
                self.process(*operand, None)?;
                Ok(DataType::Boolean)
            }

            Expr::Between { value, min, max } => {
                let value_type = self.process(*value, None)?;
                let min_type = self.process(*min, None)?;
                let max_type = self.process(*max, None)?;
                self.require_comparable(&value_type, &min_type, "BETWEEN")?;
                self.require_comparable(&value_type, &max_type, "BETWEEN")?;
                Ok(DataType::Boolean)
            }

            Expr::In { value, list } => {
                let value_type = self.process(*value, None)?;
                for item in list {
                    let item_type = self.process(*item, None)?;
                    self.require_comparable(&value_type, &item_type, "IN")?;
                }
                Ok(DataType::Boolean)
            }

            Expr::If {
                condition,
                true_value,
                false_value,
            } => {
                let condition_type = self.process(*condition, None)?;
                self.require_boolean(&condition_type, "IF condition")?;
                let mut result = self.process(*true_value, None)?;
                if let Some(false_value) = false_value {
                    let false_type = self.process(*false_value, None)?;
                    result = unify(&result, &false_type, "IF branches")?;
                }
                Ok(result)
            }

            Expr::SearchedCase {
                when_clauses,
                default,
            } => {
                for clause in when_clauses {
                    let ty = self.process(clause.operand, None)?;
                    self.require_boolean(&ty, "CASE WHEN condition")?;
                }
                self.case_result_type(when_clauses, *default)
            }

            Expr::SimpleCase {
                operand,
                when_clauses,
                default,
            } => {
                let operand_type = self.process(*operand, None)?;
                for clause in when_clauses {
                    let ty = self.process(clause.operand, None)?;
                    self.require_comparable(&operand_type, &ty, "CASE WHEN operand")?;
                }
                self.case_result_type(when_clauses, *default)
            }

            Expr::Coalesce(operands) => {
                let mut result = DataType::Unknown;
                for operand in operands {
                    let ty = self.process(*operand, None)?;
                    result = unify(&result, &ty, "COALESCE operands")?;
                }
                Ok(result)
            }

            Expr::NullIf { first, second } => {
                let first_type = self.process(*first, None)?;
                let second_type = self.process(*second, None)?;
                self.require_comparable(&first_type, &second_type, "NULLIF")?;
                Ok(first_type)
            }

            Expr::Cast { expr, ty, .. } => {
                self.process(*expr, None)?;
                Ok(ty.clone())
            }

            Expr::Call {
                function,
                arguments,
            } => {
                let resolved = self.functions.resolve_handle(function)?;
                if arguments.len() != function.argument_types.len() {
                    return Err(ExpressionError::FunctionArgumentCount {
                        function: function.name.clone(),
                        expected: function.argument_types.len(),
                        actual: arguments.len(),
                    });
                }
                for (argument, formal) in arguments.iter().zip(&function.argument_types) {
                    let functional = matches!(arena.get(*argument), Expr::Lambda { .. } | Expr::Bind { .. });
                    match formal {
                        DataType::Function {
                            arguments: formal_arguments,
                            ..
                        } if functional => {
                            self.process(*argument, Some(formal_arguments.as_slice()))?;
                        }
                        _ => {
                            let actual = self.process(*argument, None)?;
                            unify(formal, &actual, &format!("argument of {}", function.name))?;
                        }
                    }
                }
                Ok(resolved.return_type)
            }

            Expr::Lambda { parameters, body } => {
                let argument_types = lambda_arguments.ok_or_else(|| {
                    ExpressionError::invalid("lambda expression outside of a function argument")
                })?;
                if parameters.len() != argument_types.len() {
                    return Err(ExpressionError::invalid(format!(
                        "lambda expects {} arguments but is bound to {}",
                        parameters.len(),
                        argument_types.len()
                    )));
                }
                self.scopes.push(
                    parameters
                        .iter()
                        .cloned()
                        .zip(argument_types.iter().cloned())
                        .collect(),
                );
                let body_type = self.process(*body, None);
                self.scopes.pop();
                Ok(DataType::function(argument_types.to_vec(), body_type?))
            }

            Expr::Bind { values, function } => {
                let remaining = lambda_arguments.ok_or_else(|| {
                    ExpressionError::invalid("bind expression outside of a function argument")
                })?;
                let mut argument_types = Vec::with_capacity(values.len() + remaining.len());
                for value in values {
                    argument_types.push(self.process(*value, None)?);
                }
                argument_types.extend(remaining.iter().cloned());
                match self.process(*function, Some(argument_types.as_slice()))? {
                    DataType::Function { return_type, .. } => {
                        Ok(DataType::function(remaining.to_vec(), *return_type))
                    }
                    other => Err(ExpressionError::TypeMismatch {
                        expected: "function".to_string(),
                        actual: other.to_string(),
                        context: "bind target".to_string(),
                    }),
                }
            }

            Expr::Row(items) => {
                let mut fields = Vec::with_capacity(items.len());
                for item in items {
                    fields.push(self.process(*item, None)?);
                }
                Ok(DataType::anonymous_row(fields))
            }

            Expr::Array(items) => {
                let mut element = DataType::Unknown;
                for item in items {
                    let ty = self.process(*item, None)?;
                    element = unify(&element, &ty, "ARRAY elements")?;
                }
                Ok(DataType::array(element))
            }

            Expr::Subscript { base, index } => {
                let base_type = self.process(*base, None)?;
                self.process(*index, None)?;
                match &base_type {
                    DataType::Row(fields) => {
                        let position = match arena.literal_value(*index) {
                            Some((Value::Long(position), _)) => *position,
                            _ => {
                                return Err(ExpressionError::invalid(
                                    "ROW subscript index must be an integer literal",
                                ))
                            }
                        };
                        position
                            .checked_sub(1)
                            .and_then(|position| usize::try_from(position).ok())
                            .and_then(|position| fields.get(position))
                            .map(|field| field.ty.clone())
                            .ok_or(ExpressionError::SubscriptOutOfBounds {
                                index: position,
                                size: fields.len(),
                            })
                    }
                    DataType::Array(element) => Ok(element.as_ref().clone()),
                    DataType::Map(_, value) => Ok(value.as_ref().clone()),
                    DataType::Unknown => Ok(DataType::Unknown),
                    other => Err(ExpressionError::TypeMismatch {
                        expected: "row, array or map".to_string(),
                        actual: other.to_string(),
                        context: "subscript base".to_string(),
                    }),
                }
            }
        }
    }

    fn resolve_symbol(&self, name: &str) -> ExpressionResult<DataType> {
        self.scopes
            .iter()
            .rev()
            .find_map(|scope| scope.get(name))
            .or_else(|| self.symbols.get(name))
            .cloned()
            .ok_or_else(|| ExpressionError::UnboundSymbol {
                name: name.to_string(),
            })
    }

    fn case_result_type(
        &mut self,
        when_clauses: &[WhenClause],
        default: Option<ExprId>,
    ) -> ExpressionResult<DataType> {
        let mut result = DataType::Unknown;
        for clause in when_clauses {
            let ty = self.process(clause.result, None)?;
            result = unify(&result, &ty, "CASE results")?;
        }
        if let Some(default) = default {
            let ty = self.process(default, None)?;
            result = unify(&result, &ty, "CASE default")?;
        }
        Ok(result)
    }

    fn require_boolean(&self, ty: &DataType, context: &str) -> ExpressionResult<()> {
        match ty {
            DataType::Boolean | DataType::Unknown => Ok(()),
            other => Err(ExpressionError::TypeMismatch {
                expected: DataType::Boolean.to_string(),
                actual: other.to_string(),
                context: context.to_string(),
            }),
        }
    }

    fn require_comparable(&self, left: &DataType, right: &DataType, context: &str) -> ExpressionResult<()> {
        if left.is_comparable_with(right) {
            Ok(())
        } else {
            Err(ExpressionError::TypeMismatch {
                expected: left.to_string(),
                actual: right.to_string(),
                context: context.to_string(),
            })
        }
    }
}

fn unify(expected: &DataType, actual: &DataType, context: &str) -> ExpressionResult<DataType> {
    expected
        .unify(actual)
        .ok_or_else(|| ExpressionError::TypeMismatch {
            expected: expected.to_string(),
            actual: actual.to_string(),
            context: context.to_string(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expression::operator::ComparisonOperator;
    use crate::function::BuiltinFunctions;

    fn analyze(arena: &ExprArena, symbols: &SymbolTypes, root: ExprId) -> ExpressionResult<DataType> {
        type_of(arena, &BuiltinFunctions::new(), symbols, root)
    }

    #[test]
    fn test_symbols_and_arithmetic() {
        let mut arena = ExprArena::new();
        let symbols = SymbolTypes::new()
            .with("a", DataType::Integer)
            .with("b", DataType::BigInt);
        let a = arena.symbol("a");
        let b = arena.symbol("b");
        let sum = arena.add(a, b);
        assert_eq!(analyze(&arena, &symbols, sum).unwrap(), DataType::BigInt);

        let c = arena.symbol("c");
        assert!(matches!(
            analyze(&arena, &symbols, c),
            Err(ExpressionError::UnboundSymbol { .. })
        ));
    }

    #[test]
    fn test_memoized_types() {
        let mut arena = ExprArena::new();
        let symbols = SymbolTypes::new().with("d", DataType::Date);
        let d = arena.symbol("d");
        let year = arena.call("year", vec![DataType::Date], vec![d]);
        let k = arena.bigint(2020);
        let eq = arena.equal(year, k);
        let types = types_of(&arena, &BuiltinFunctions::new(), &symbols, eq).unwrap();
        assert_eq!(types.get(eq), Some(&DataType::Boolean));
        assert_eq!(types.get(year), Some(&DataType::BigInt));
        assert_eq!(types.get(d), Some(&DataType::Date));
        assert_eq!(types.len(), 4);
    }

    #[test]
    fn test_if_condition_must_be_boolean() {
        let mut arena = ExprArena::new();
        let one = arena.bigint(1);
        let two = arena.bigint(2);
        let bad = arena.if_expr(one, one, Some(two));
        assert!(matches!(
            analyze(&arena, &SymbolTypes::new(), bad),
            Err(ExpressionError::TypeMismatch { .. })
        ));
    }

    #[test]
    fn test_case_branches_must_agree() {
        let mut arena = ExprArena::new();
        let t = arena.boolean(true);
        let one = arena.bigint(1);
        let text = arena.varchar("x");
        let case = arena.searched_case(vec![WhenClause::new(t, one)], Some(text));
        assert!(analyze(&arena, &SymbolTypes::new(), case).is_err());

        let null = arena.null();
        let case = arena.searched_case(vec![WhenClause::new(t, one)], Some(null));
        assert_eq!(
            analyze(&arena, &SymbolTypes::new(), case).unwrap(),
            DataType::BigInt
        );
    }

    #[test]
    fn test_between_requires_comparable_operands() {
        let mut arena = ExprArena::new();
        let symbols = SymbolTypes::new().with("d", DataType::Date);
        let d = arena.symbol("d");
        let lo = arena.bigint(1);
        let hi = arena.bigint(2);
        let between = arena.between(d, lo, hi);
        assert!(analyze(&arena, &symbols, between).is_err());
    }

    #[test]
    fn test_row_subscript() {
        let mut arena = ExprArena::new();
        let one = arena.integer(1);
        let text = arena.varchar("x");
        let row = arena.row(vec![one, text]);
        let index = arena.bigint(2);
        let subscript = arena.subscript(row, index);
        assert_eq!(
            analyze(&arena, &SymbolTypes::new(), subscript).unwrap(),
            DataType::varchar()
        );

        let out_of_range = arena.bigint(3);
        let subscript = arena.subscript(row, out_of_range);
        assert!(analyze(&arena, &SymbolTypes::new(), subscript).is_err());
    }

    #[test]
    fn test_array_and_map_subscript() {
        let mut arena = ExprArena::new();
        let symbols = SymbolTypes::new()
            .with("m", DataType::map(DataType::varchar(), DataType::Double));
        let empty = arena.array(vec![]);
        assert_eq!(
            analyze(&arena, &symbols, empty).unwrap(),
            DataType::array(DataType::Unknown)
        );

        let m = arena.symbol("m");
        let key = arena.varchar("k");
        let lookup = arena.subscript(m, key);
        assert_eq!(analyze(&arena, &symbols, lookup).unwrap(), DataType::Double);
    }

    #[test]
    fn test_lambda_argument_shadows_outer_symbol() {
        let mut arena = ExprArena::new();
        let symbols = SymbolTypes::new()
            .with("xs", DataType::array(DataType::Integer))
            .with("x", DataType::Date);
        let xs = arena.symbol("xs");
        let x = arena.symbol("x");
        let zero = arena.integer(0);
        let body = arena.comparison(ComparisonOperator::GreaterThan, x, zero);
        let lambda = arena.lambda(vec!["x".to_string()], body);
        let filter = arena.call(
            "filter",
            vec![
                DataType::array(DataType::Integer),
                DataType::function(vec![DataType::Integer], DataType::Boolean),
            ],
            vec![xs, lambda],
        );
        let types = types_of(&arena, &BuiltinFunctions::new(), &symbols, filter).unwrap();
        assert_eq!(types.get(filter), Some(&DataType::array(DataType::Integer)));
        assert_eq!(types.get(x), Some(&DataType::Integer));
        assert_eq!(
            types.get(lambda),
            Some(&DataType::function(vec![DataType::Integer], DataType::Boolean))
        );
    }

    #[test]
    fn test_bind_prepends_captured_values() {
        let mut arena = ExprArena::new();
        let symbols = SymbolTypes::new()
            .with("xs", DataType::array(DataType::Integer))
            .with("limit", DataType::BigInt);
        let xs = arena.symbol("xs");
        let captured = arena.symbol("limit");
        let bound = arena.symbol("bound");
        let element = arena.symbol("e");
        let body = arena.comparison(ComparisonOperator::LessThan, element, bound);
        let lambda = arena.lambda(vec!["bound".to_string(), "e".to_string()], body);
        let bind = arena.bind(vec![captured], lambda);
        let filter = arena.call(
            "filter",
            vec![
                DataType::array(DataType::Integer),
                DataType::function(vec![DataType::Integer], DataType::Boolean),
            ],
            vec![xs, bind],
        );
        let types = types_of(&arena, &BuiltinFunctions::new(), &symbols, filter).unwrap();
        assert_eq!(types.get(bound), Some(&DataType::BigInt));
        assert_eq!(types.get(element), Some(&DataType::Integer));
        assert_eq!(
            types.get(bind),
            Some(&DataType::function(vec![DataType::Integer], DataType::Boolean))
        );
    }

    #[test]
    fn test_call_argument_count() {
        let mut arena = ExprArena::new();
        let symbols = SymbolTypes::new().with("d", DataType::Date);
        let d = arena.symbol("d");
        let bad = arena.call("year", vec![DataType::Date], vec![d, d]);
        assert!(matches!(
            analyze(&arena, &symbols, bad),
            Err(ExpressionError::FunctionArgumentCount { .. })
        ));
    }
}
