//! Expression IR: node definitions and the arena that owns them.
//!
//! Nodes are immutable once pushed. A node refers to its children by
//! `ExprId`, so a rewritten tree shares every untouched subtree with the
//! original. Each node is additionally interned by *shape*: two nodes have
//! the same `ShapeId` exactly when they are structurally equal, which makes
//! structural comparison O(1) while `ExprId` keeps node identity distinct.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::convert::Infallible;
use std::ops::Index;

use crate::expression::error::{ExpressionError, ExpressionResult};
use crate::expression::operator::{ArithmeticOperator, ComparisonOperator, LogicalOperator};
use crate::function::FunctionHandle;
use crate::types::{DataType, Value};

/// Identity of a node within an `ExprArena`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ExprId(u32);

impl ExprId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// Structural equivalence class of a node within an `ExprArena`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ShapeId(u32);

/// A `WHEN operand THEN result` arm of a CASE expression
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct WhenClause<C = ExprId> {
    pub operand: C,
    pub result: C,
}

impl<C> WhenClause<C> {
    pub fn new(operand: C, result: C) -> Self {
        Self { operand, result }
    }
}

/// Expression node. `C` is the child reference: `ExprId` for stored nodes,
/// `ShapeId` for the interning key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Expr<C = ExprId> {
    /// Typed constant; a bare NULL has type `Unknown`
    Literal { value: Value, ty: DataType },

    /// Reference to a named input or lambda argument
    Symbol(String),

    Arithmetic {
        op: ArithmeticOperator,
        left: C,
        right: C,
    },

    Negate(C),

    Comparison {
        op: ComparisonOperator,
        left: C,
        right: C,
    },

    /// N-ary AND / OR
    Logical { op: LogicalOperator, terms: Vec<C> },

    Not(C),

    IsNull(C),

    IsNotNull(C),

    Between { value: C, min: C, max: C },

    In { value: C, list: Vec<C> },

    /// `IF(condition, true_value[, false_value])`; a missing false value is NULL
    If {
        condition: C,
        true_value: C,
        false_value: Option<C>,
    },

    SearchedCase {
        when_clauses: Vec<WhenClause<C>>,
        default: Option<C>,
    },

    SimpleCase {
        operand: C,
        when_clauses: Vec<WhenClause<C>>,
        default: Option<C>,
    },

    Coalesce(Vec<C>),

    NullIf { first: C, second: C },

    /// `CAST(expr AS ty)`, or `TRY_CAST` when `safe` is set
    Cast { expr: C, ty: DataType, safe: bool },

    /// Call of a resolved function
    Call {
        function: FunctionHandle,
        arguments: Vec<C>,
    },

    Lambda { parameters: Vec<String>, body: C },

    /// Partial application: `values` are bound to the leading lambda arguments
    Bind { values: Vec<C>, function: C },

    Row(Vec<C>),

    Array(Vec<C>),

    /// 1-based subscript into a ROW (constant index), ARRAY or MAP
    Subscript { base: C, index: C },
}

fn map_all<C: Copy, D, E>(
    items: &[C],
    f: &mut impl FnMut(C) -> Result<D, E>,
) -> Result<Vec<D>, E> {
    items.iter().map(|&item| f(item)).collect()
}

fn map_clauses<C: Copy, D, E>(
    clauses: &[WhenClause<C>],
    f: &mut impl FnMut(C) -> Result<D, E>,
) -> Result<Vec<WhenClause<D>>, E> {
    let mut mapped = Vec::with_capacity(clauses.len());
    for clause in clauses {
        mapped.push(WhenClause::new(f(clause.operand)?, f(clause.result)?));
    }
    Ok(mapped)
}

impl<C: Copy> Expr<C> {
    /// Rebuild this node with every child reference passed through `f`.
    /// Children are visited in the order returned by `children`.
    pub fn try_map_children<D, E>(
        &self,
        mut f: impl FnMut(C) -> Result<D, E>,
    ) -> Result<Expr<D>, E> {
        Ok(match self {
            Expr::Literal { value, ty } => Expr::Literal {
                value: value.clone(),
                ty: ty.clone(),
            },
            Expr::Symbol(name) => Expr::Symbol(name.clone()),
            Expr::Arithmetic { op, left, right } => Expr::Arithmetic {
                op: *op,
                left: f(*left)?,
                right: f(*right)?,
            },
            Expr::Negate(operand) => Expr::Negate(f(*operand)?),
            Expr::Comparison { op, left, right } => Expr::Comparison {
                op: *op,
                left: f(*left)?,
                right: f(*right)?,
            },
            Expr::Logical { op, terms } => Expr::Logical {
                op: *op,
                terms: map_all(terms, &mut f)?,
            },
            Expr::Not(operand) => Expr::Not(f(*operand)?),
            Expr::IsNull(operand) => Expr::IsNull(f(*operand)?),
            Expr::IsNotNull(operand) => Expr::IsNotNull(f(*operand)?),
            Expr::Between { value, min, max } => Expr::Between {
                value: f(*value)?,
                min: f(*min)?,
                max: f(*max)?,
            },
            Expr::In { value, list } => Expr::In {
                value: f(*value)?,
                list: map_all(list, &mut f)?,
            },
            Expr::If {
                condition,
                true_value,
                false_value,
            } => Expr::If {
                condition: f(*condition)?,
                true_value: f(*true_value)?,
                false_value: false_value.map(&mut f).transpose()?,
            },
            Expr::SearchedCase {
                when_clauses,
                default,
            } => Expr::SearchedCase {
                when_clauses: map_clauses(when_clauses, &mut f)?,
                default: default.map(&mut f).transpose()?,
            },
            Expr::SimpleCase {
                operand,
                when_clauses,
                default,
            } => Expr::SimpleCase {
                operand: f(*operand)?,
                when_clauses: map_clauses(when_clauses, &mut f)?,
                default: default.map(&mut f).transpose()?,
            },
            Expr::Coalesce(operands) => Expr::Coalesce(map_all(operands, &mut f)?),
            Expr::NullIf { first, second } => Expr::NullIf {
                first: f(*first)?,
                second: f(*second)?,
            },
            Expr::Cast { expr, ty, safe } => Expr::Cast {
                expr: f(*expr)?,
                ty: ty.clone(),
                safe: *safe,
            },
            Expr::Call {
                function,
                arguments,
            } => Expr::Call {
                function: function.clone(),
                arguments: map_all(arguments, &mut f)?,
            },
            Expr::Lambda { parameters, body } => Expr::Lambda {
                parameters: parameters.clone(),
                body: f(*body)?,
            },
            Expr::Bind { values, function } => Expr::Bind {
                values: map_all(values, &mut f)?,
                function: f(*function)?,
            },
            Expr::Row(items) => Expr::Row(map_all(items, &mut f)?),
            Expr::Array(items) => Expr::Array(map_all(items, &mut f)?),
            Expr::Subscript { base, index } => Expr::Subscript {
                base: f(*base)?,
                index: f(*index)?,
            },
        })
    }

    pub fn map_children<D>(&self, mut f: impl FnMut(C) -> D) -> Expr<D> {
        match self.try_map_children(|child| Ok::<D, Infallible>(f(child))) {
            Ok(mapped) => mapped,
            Err(never) => match never {},
        }
    }

    /// Child references in evaluation order
    pub fn children(&self) -> Vec<C> {
        let mut children = Vec::new();
        self.map_children(|child| children.push(child));
        children
    }

    pub fn is_literal(&self) -> bool {
        matches!(self, Expr::Literal { .. })
    }
}

/// Owner of all expression nodes produced during a planning pass
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(try_from = "ArenaNodes", into = "ArenaNodes")]
pub struct ExprArena {
    nodes: Vec<Expr>,
    shapes: Vec<ShapeId>,
    shape_index: HashMap<Expr<ShapeId>, ShapeId>,
}

impl ExprArena {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Store a node whose children already live in this arena
    pub fn push(&mut self, node: Expr) -> ExprId {
        let key = node.map_children(|child| self.shapes[child.index()]);
        let next_shape = ShapeId(self.shape_index.len() as u32);
        let shape = *self.shape_index.entry(key).or_insert(next_shape);
        let id = ExprId(self.nodes.len() as u32);
        self.nodes.push(node);
        self.shapes.push(shape);
        id
    }

    pub fn get(&self, id: ExprId) -> &Expr {
        &self.nodes[id.index()]
    }

    pub fn shape(&self, id: ExprId) -> ShapeId {
        self.shapes[id.index()]
    }

    /// Structural equality, independent of node identity
    pub fn same_structure(&self, left: ExprId, right: ExprId) -> bool {
        self.shape(left) == self.shape(right)
    }

    /// Rebuild `id` with new children, reusing `id` when nothing changed
    pub fn with_children(&mut self, id: ExprId, node: Expr) -> ExprId {
        if *self.get(id) == node {
            id
        } else {
            self.push(node)
        }
    }

    pub fn literal(&mut self, value: Value, ty: DataType) -> ExprId {
        self.push(Expr::Literal { value, ty })
    }

    /// Untyped NULL literal
    pub fn null(&mut self) -> ExprId {
        self.literal(Value::Null, DataType::Unknown)
    }

    /// NULL of a specific type, encoded as `CAST(NULL AS ty)`
    pub fn typed_null(&mut self, ty: DataType) -> ExprId {
        let null = self.null();
        self.cast(null, ty)
    }

    pub fn boolean(&mut self, value: bool) -> ExprId {
        self.literal(Value::Boolean(value), DataType::Boolean)
    }

    pub fn bigint(&mut self, value: i64) -> ExprId {
        self.literal(Value::Long(value), DataType::BigInt)
    }

    pub fn integer(&mut self, value: i32) -> ExprId {
        self.literal(Value::Long(value as i64), DataType::Integer)
    }

    pub fn double(&mut self, value: f64) -> ExprId {
        self.literal(Value::Double(value), DataType::Double)
    }

    pub fn decimal(&mut self, unscaled: i128, precision: u8, scale: u8) -> ExprId {
        self.literal(Value::Decimal(unscaled), DataType::decimal(precision, scale))
    }

    pub fn varchar(&mut self, value: impl Into<String>) -> ExprId {
        self.literal(Value::String(value.into()), DataType::varchar())
    }

    /// DATE literal from days since the epoch
    pub fn date(&mut self, epoch_days: i64) -> ExprId {
        self.literal(Value::Long(epoch_days), DataType::Date)
    }

    /// Short TIMESTAMP literal from epoch micros
    pub fn timestamp(&mut self, epoch_micros: i64, precision: u8) -> ExprId {
        self.literal(Value::Long(epoch_micros), DataType::timestamp(precision))
    }

    pub fn symbol(&mut self, name: impl Into<String>) -> ExprId {
        self.push(Expr::Symbol(name.into()))
    }

    pub fn arithmetic(&mut self, op: ArithmeticOperator, left: ExprId, right: ExprId) -> ExprId {
        self.push(Expr::Arithmetic { op, left, right })
    }

    pub fn add(&mut self, left: ExprId, right: ExprId) -> ExprId {
        self.arithmetic(ArithmeticOperator::Add, left, right)
    }

    pub fn negate(&mut self, operand: ExprId) -> ExprId {
        self.push(Expr::Negate(operand))
    }

    pub fn comparison(&mut self, op: ComparisonOperator, left: ExprId, right: ExprId) -> ExprId {
        self.push(Expr::Comparison { op, left, right })
    }

    pub fn equal(&mut self, left: ExprId, right: ExprId) -> ExprId {
        self.comparison(ComparisonOperator::Equal, left, right)
    }

    pub fn logical(&mut self, op: LogicalOperator, terms: Vec<ExprId>) -> ExprId {
        self.push(Expr::Logical { op, terms })
    }

    pub fn and(&mut self, terms: Vec<ExprId>) -> ExprId {
        self.logical(LogicalOperator::And, terms)
    }

    pub fn or(&mut self, terms: Vec<ExprId>) -> ExprId {
        self.logical(LogicalOperator::Or, terms)
    }

    pub fn not(&mut self, operand: ExprId) -> ExprId {
        self.push(Expr::Not(operand))
    }

    pub fn is_null(&mut self, operand: ExprId) -> ExprId {
        self.push(Expr::IsNull(operand))
    }

    pub fn is_not_null(&mut self, operand: ExprId) -> ExprId {
        self.push(Expr::IsNotNull(operand))
    }

    pub fn between(&mut self, value: ExprId, min: ExprId, max: ExprId) -> ExprId {
        self.push(Expr::Between { value, min, max })
    }

    pub fn in_list(&mut self, value: ExprId, list: Vec<ExprId>) -> ExprId {
        self.push(Expr::In { value, list })
    }

    pub fn if_expr(
        &mut self,
        condition: ExprId,
        true_value: ExprId,
        false_value: Option<ExprId>,
    ) -> ExprId {
        self.push(Expr::If {
            condition,
            true_value,
            false_value,
        })
    }

    pub fn searched_case(&mut self, when_clauses: Vec<WhenClause>, default: Option<ExprId>) -> ExprId {
        self.push(Expr::SearchedCase {
            when_clauses,
            default,
        })
    }

    pub fn simple_case(
        &mut self,
        operand: ExprId,
        when_clauses: Vec<WhenClause>,
        default: Option<ExprId>,
    ) -> ExprId {
        self.push(Expr::SimpleCase {
            operand,
            when_clauses,
            default,
        })
    }

    pub fn coalesce(&mut self, operands: Vec<ExprId>) -> ExprId {
        self.push(Expr::Coalesce(operands))
    }

    pub fn null_if(&mut self, first: ExprId, second: ExprId) -> ExprId {
        self.push(Expr::NullIf { first, second })
    }

    pub fn cast(&mut self, expr: ExprId, ty: DataType) -> ExprId {
        self.push(Expr::Cast {
            expr,
            ty,
            safe: false,
        })
    }

    pub fn try_cast(&mut self, expr: ExprId, ty: DataType) -> ExprId {
        self.push(Expr::Cast {
            expr,
            ty,
            safe: true,
        })
    }

    pub fn call(
        &mut self,
        name: impl Into<String>,
        argument_types: Vec<DataType>,
        arguments: Vec<ExprId>,
    ) -> ExprId {
        self.push(Expr::Call {
            function: FunctionHandle::new(name, argument_types),
            arguments,
        })
    }

    pub fn lambda(&mut self, parameters: Vec<String>, body: ExprId) -> ExprId {
        self.push(Expr::Lambda { parameters, body })
    }

    pub fn bind(&mut self, values: Vec<ExprId>, function: ExprId) -> ExprId {
        self.push(Expr::Bind { values, function })
    }

    pub fn row(&mut self, items: Vec<ExprId>) -> ExprId {
        self.push(Expr::Row(items))
    }

    pub fn array(&mut self, items: Vec<ExprId>) -> ExprId {
        self.push(Expr::Array(items))
    }

    pub fn subscript(&mut self, base: ExprId, index: ExprId) -> ExprId {
        self.push(Expr::Subscript { base, index })
    }

    /// Lower `base.field` to a 1-based subscript on a ROW-typed base
    pub fn dereference(
        &mut self,
        base: ExprId,
        base_type: &DataType,
        field: &str,
    ) -> ExpressionResult<ExprId> {
        let position = base_type.field_index(field)?;
        let index = self.bigint(position as i64 + 1);
        Ok(self.subscript(base, index))
    }

    /// AND of `terms`: TRUE when empty, the term itself when single
    pub fn combine_conjuncts(&mut self, terms: Vec<ExprId>) -> ExprId {
        match terms.as_slice() {
            [] => self.boolean(true),
            [single] => *single,
            _ => self.and(terms),
        }
    }

    /// OR of `terms`: FALSE when empty, the term itself when single
    pub fn combine_disjuncts(&mut self, terms: Vec<ExprId>) -> ExprId {
        match terms.as_slice() {
            [] => self.boolean(false),
            [single] => *single,
            _ => self.or(terms),
        }
    }

    /// Flatten nested ANDs into their leaf terms
    pub fn extract_conjuncts(&self, id: ExprId) -> Vec<ExprId> {
        self.extract_predicates(LogicalOperator::And, id)
    }

    /// Flatten nested ORs into their leaf terms
    pub fn extract_disjuncts(&self, id: ExprId) -> Vec<ExprId> {
        self.extract_predicates(LogicalOperator::Or, id)
    }

    pub fn extract_predicates(&self, operator: LogicalOperator, id: ExprId) -> Vec<ExprId> {
        match self.get(id) {
            Expr::Logical { op, terms } if *op == operator => terms
                .iter()
                .flat_map(|&term| self.extract_predicates(operator, term))
                .collect(),
            _ => vec![id],
        }
    }

    pub fn literal_value(&self, id: ExprId) -> Option<(&Value, &DataType)> {
        match self.get(id) {
            Expr::Literal { value, ty } => Some((value, ty)),
            _ => None,
        }
    }

    pub fn is_boolean_literal(&self, id: ExprId, expected: bool) -> bool {
        matches!(self.get(id), Expr::Literal { value: Value::Boolean(b), .. } if *b == expected)
    }

    /// NULL literal, possibly wrapped in casts
    pub fn is_null_literal(&self, id: ExprId) -> bool {
        match self.get(id) {
            Expr::Literal { value, .. } => value.is_null(),
            Expr::Cast { expr, .. } => self.is_null_literal(*expr),
            _ => false,
        }
    }

    /// Literal, possibly wrapped in casts
    pub fn is_constant(&self, id: ExprId) -> bool {
        match self.get(id) {
            Expr::Literal { .. } => true,
            Expr::Cast { expr, .. } => self.is_constant(*expr),
            _ => false,
        }
    }

    /// All nodes reachable from `id` in pre-order, `id` first
    pub fn sub_expressions(&self, id: ExprId) -> Vec<ExprId> {
        let mut result = Vec::new();
        let mut stack = vec![id];
        while let Some(next) = stack.pop() {
            result.push(next);
            let children = self.get(next).children();
            stack.extend(children.into_iter().rev());
        }
        result
    }
}

impl Index<ExprId> for ExprArena {
    type Output = Expr;

    fn index(&self, id: ExprId) -> &Expr {
        self.get(id)
    }
}

/// Serialized form of an arena; shapes are rebuilt on load
#[derive(Serialize, Deserialize)]
struct ArenaNodes {
    nodes: Vec<Expr>,
}

impl From<ExprArena> for ArenaNodes {
    fn from(arena: ExprArena) -> Self {
        ArenaNodes { nodes: arena.nodes }
    }
}

impl TryFrom<ArenaNodes> for ExprArena {
    type Error = ExpressionError;

    fn try_from(serialized: ArenaNodes) -> ExpressionResult<Self> {
        let mut arena = ExprArena::new();
        for node in serialized.nodes {
            let position = arena.len();
            if node.children().iter().any(|child| child.index() >= position) {
                return Err(ExpressionError::invalid(format!(
                    "node {} refers to a later node",
                    position
                )));
            }
            arena.push(node);
        }
        Ok(arena)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_structural_sharing() {
        let mut arena = ExprArena::new();
        let a = arena.symbol("a");
        let one = arena.bigint(1);
        let sum = arena.add(a, one);

        let a2 = arena.symbol("a");
        let one2 = arena.bigint(1);
        let sum2 = arena.add(a2, one2);

        assert_ne!(sum, sum2);
        assert!(arena.same_structure(sum, sum2));
        assert!(arena.same_structure(a, a2));
        assert!(!arena.same_structure(a, one));
    }

    #[test]
    fn test_literal_type_is_part_of_shape() {
        let mut arena = ExprArena::new();
        let big = arena.bigint(1);
        let int = arena.integer(1);
        assert!(!arena.same_structure(big, int));
    }

    #[test]
    fn test_with_children_reuses_identity() {
        let mut arena = ExprArena::new();
        let a = arena.symbol("a");
        let not_a = arena.not(a);
        let same = arena.with_children(not_a, Expr::Not(a));
        assert_eq!(same, not_a);

        let b = arena.symbol("b");
        let changed = arena.with_children(not_a, Expr::Not(b));
        assert_ne!(changed, not_a);
    }

    #[test]
    fn test_children_order() {
        let mut arena = ExprArena::new();
        let c = arena.symbol("c");
        let t = arena.bigint(1);
        let f = arena.bigint(2);
        let case = arena.searched_case(vec![WhenClause::new(c, t)], Some(f));
        assert_eq!(arena[case].children(), vec![c, t, f]);
    }

    #[test]
    fn test_extract_conjuncts() {
        let mut arena = ExprArena::new();
        let a = arena.symbol("a");
        let b = arena.symbol("b");
        let c = arena.symbol("c");
        let inner = arena.and(vec![a, b]);
        let outer = arena.and(vec![inner, c]);
        assert_eq!(arena.extract_conjuncts(outer), vec![a, b, c]);
        assert_eq!(arena.extract_disjuncts(outer), vec![outer]);
    }

    #[test]
    fn test_combine_conjuncts() {
        let mut arena = ExprArena::new();
        let empty = arena.combine_conjuncts(vec![]);
        assert!(arena.is_boolean_literal(empty, true));
        let a = arena.symbol("a");
        assert_eq!(arena.combine_conjuncts(vec![a]), a);
    }

    #[test]
    fn test_null_and_constant_detection() {
        let mut arena = ExprArena::new();
        let typed_null = arena.typed_null(DataType::BigInt);
        assert!(arena.is_null_literal(typed_null));
        assert!(arena.is_constant(typed_null));

        let one = arena.integer(1);
        let cast = arena.cast(one, DataType::BigInt);
        assert!(arena.is_constant(cast));
        assert!(!arena.is_null_literal(cast));

        let a = arena.symbol("a");
        assert!(!arena.is_constant(a));
    }

    #[test]
    fn test_dereference() {
        let mut arena = ExprArena::new();
        let base = arena.symbol("r");
        let row_type = DataType::row([("x", DataType::BigInt), ("y", DataType::Date)]);
        let field = arena.dereference(base, &row_type, "Y").unwrap();
        match &arena[field] {
            Expr::Subscript { base: b, index } => {
                assert_eq!(*b, base);
                assert_eq!(
                    arena.literal_value(*index),
                    Some((&Value::Long(2), &DataType::BigInt))
                );
            }
            other => panic!("unexpected node {:?}", other),
        }

        let ambiguous = DataType::row([("x", DataType::BigInt), ("X", DataType::BigInt)]);
        assert!(matches!(
            arena.dereference(base, &ambiguous, "x"),
            Err(ExpressionError::AmbiguousField { .. })
        ));
    }

    #[test]
    fn test_sub_expressions_pre_order() {
        let mut arena = ExprArena::new();
        let a = arena.symbol("a");
        let b = arena.symbol("b");
        let sum = arena.add(a, b);
        let one = arena.bigint(1);
        let cmp = arena.equal(sum, one);
        assert_eq!(arena.sub_expressions(cmp), vec![cmp, sum, a, b, one]);
    }
}
