//! Equality inference over conjunctive predicates.
//!
//! Equalities `x = y` found among the conjuncts of the input predicates are
//! merged into equivalence classes. Each class has a canonical member, chosen
//! by a fixed ordering so the same class always yields the same
//! representative: constants first, then fewer symbol references, then
//! smaller trees, then the rendered text.
//!
//! Members are compared structurally (by `ShapeId`), so `a = b` in one
//! predicate and `b = a` in another refer to the same expressions.

use std::collections::{BTreeSet, HashMap, HashSet};

use log::trace;

use crate::expression::analysis::{extract_all, extract_unique, is_deterministic, may_return_null_on_non_null_input};
use crate::expression::error::ExpressionResult;
use crate::expression::expr::{Expr, ExprArena, ExprId, ShapeId};
use crate::expression::operator::ComparisonOperator;
use crate::expression::rewriter::replace_expression;
use crate::function::FunctionResolver;

/// Equalities split by whether they reference only scope symbols, only
/// non-scope symbols, or both
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EqualityPartition {
    pub scope_equalities: Vec<ExprId>,
    pub scope_complement_equalities: Vec<ExprId>,
    pub scope_straddling_equalities: Vec<ExprId>,
}

pub struct EqualityInference {
    /// Equivalence classes, each sorted so the canonical member comes first
    classes: Vec<Vec<ExprId>>,
    class_of: HashMap<ShapeId, usize>,
    /// Members introduced by substituting equal subexpressions
    derived: HashSet<ShapeId>,
}

impl EqualityInference {
    pub fn new(
        arena: &mut ExprArena,
        functions: &dyn FunctionResolver,
        predicates: &[ExprId],
    ) -> ExpressionResult<Self> {
        let mut equalities = DisjointSet::default();
        let mut members: HashMap<ShapeId, ExprId> = HashMap::new();

        for &predicate in predicates {
            for conjunct in arena.extract_conjuncts(predicate) {
                if !is_inference_candidate(arena, functions, conjunct)? {
                    continue;
                }
                if let Expr::Comparison { left, right, .. } = arena.get(conjunct) {
                    let (left, right) = (*left, *right);
                    let left_shape = arena.shape(left);
                    let right_shape = arena.shape(right);
                    members.entry(left_shape).or_insert(left);
                    members.entry(right_shape).or_insert(right);
                    equalities.union(left_shape, right_shape);
                }
            }
        }

        // b + c = a1 lets b * (b + c) be known as b * a1
        let mut equivalents: HashMap<ShapeId, Vec<ShapeId>> = HashMap::new();
        for class in equalities.classes() {
            for &shape in &class {
                equivalents.insert(shape, class.clone());
            }
        }
        let mut derived = HashSet::new();
        for shape in equalities.elements() {
            if derived.contains(&shape) {
                continue;
            }
            let expression = members[&shape];
            for sub_expression in arena.sub_expressions(expression).into_iter().skip(1) {
                let sub_shape = arena.shape(sub_expression);
                let Some(class) = equivalents.get(&sub_shape) else {
                    continue;
                };
                for &equivalent in class {
                    if equivalent == sub_shape {
                        continue;
                    }
                    let mapping = HashMap::from([(sub_shape, members[&equivalent])]);
                    let rewritten = replace_expression(arena, expression, &mapping);
                    let rewritten_shape = arena.shape(rewritten);
                    if !members.contains_key(&rewritten_shape) {
                        members.insert(rewritten_shape, rewritten);
                        derived.insert(rewritten_shape);
                    }
                    equalities.union(shape, rewritten_shape);
                }
            }
        }

        let mut classes = Vec::new();
        let mut class_of = HashMap::new();
        for class in equalities.classes() {
            let mut class: Vec<ExprId> = class.iter().map(|shape| members[shape]).collect();
            class.sort_by_cached_key(|&member| CanonicalKey::of(arena, member));
            for &member in &class {
                class_of.insert(arena.shape(member), classes.len());
            }
            classes.push(class);
        }
        trace!(
            "equality inference: {} classes, {} derived members",
            classes.len(),
            derived.len()
        );

        Ok(Self {
            classes,
            class_of,
            derived,
        })
    }

    /// Canonical member of `expression`'s class that only uses symbols
    /// accepted by `scope`
    pub fn scoped_canonical(
        &self,
        arena: &ExprArena,
        expression: ExprId,
        scope: impl Fn(&str) -> bool,
    ) -> Option<ExprId> {
        self.scoped_canonical_in(arena, expression, &scope)
    }

    fn scoped_canonical_in(
        &self,
        arena: &ExprArena,
        expression: ExprId,
        scope: &dyn Fn(&str) -> bool,
    ) -> Option<ExprId> {
        let class = self.class_of.get(&arena.shape(expression))?;
        self.classes[*class]
            .iter()
            .copied()
            .find(|&member| in_scope(arena, member, scope))
    }

    /// Rewrite `expression` to only use `scope` symbols, replacing known
    /// class members by their scoped canonical form. Larger subtrees are
    /// replaced in preference to their parts. `None` when some symbol
    /// outside the scope remains.
    pub fn rewrite(
        &self,
        arena: &mut ExprArena,
        expression: ExprId,
        scope: &BTreeSet<String>,
    ) -> Option<ExprId> {
        self.rewrite_in(arena, expression, &|symbol| scope.contains(symbol), true)
    }

    fn rewrite_in(
        &self,
        arena: &mut ExprArena,
        expression: ExprId,
        scope: &dyn Fn(&str) -> bool,
        allow_full_replacement: bool,
    ) -> Option<ExprId> {
        let skip = usize::from(!allow_full_replacement);
        let mut mapping = HashMap::new();
        for sub_expression in arena.sub_expressions(expression).into_iter().skip(skip) {
            if let Some(canonical) = self.scoped_canonical_in(arena, sub_expression, scope) {
                mapping.entry(arena.shape(sub_expression)).or_insert(canonical);
            }
        }
        let rewritten = replace_expression(arena, expression, &mapping);
        in_scope(arena, rewritten, scope).then_some(rewritten)
    }

    /// Equalities implied by the inferred classes, partitioned by `scope`.
    ///
    /// Straddling equalities only connect the scope side, the complement side
    /// and members that fit neither. Sides already joined through another
    /// class (`a2 = a1 + 2` with `a1 = b1`) are not connected again.
    pub fn generate_equalities_partitioned_by(
        &self,
        arena: &mut ExprArena,
        scope: &BTreeSet<String>,
    ) -> EqualityPartition {
        let inside = |symbol: &str| scope.contains(symbol);
        let outside = |symbol: &str| !scope.contains(symbol);
        let mut partition = EqualityPartition::default();

        for class in &self.classes {
            let mut scope_expressions = Vec::new();
            let mut complement_expressions = Vec::new();
            let mut straddling_expressions = Vec::new();
            // Some member fits both sides, so the two sides are already
            // connected through equalities of other classes
            let mut bridged = false;

            for &candidate in class {
                if self.derived.contains(&arena.shape(candidate)) {
                    continue;
                }
                let scoped = self.rewrite_in(arena, candidate, &inside, false);
                let complement = self.rewrite_in(arena, candidate, &outside, false);
                if let Some(scoped) = scoped {
                    push_unique(arena, &mut scope_expressions, scoped);
                }
                if let Some(complement) = complement {
                    push_unique(arena, &mut complement_expressions, complement);
                }
                match (scoped, complement) {
                    (Some(_), Some(_)) => bridged = true,
                    (None, None) => push_unique(arena, &mut straddling_expressions, candidate),
                    _ => {}
                }
            }

            let scope_canonical = canonical(arena, &scope_expressions);
            if scope_expressions.len() >= 2 {
                if let Some(canonical) = scope_canonical {
                    emit_equalities(arena, canonical, &scope_expressions, &mut partition.scope_equalities);
                }
            }
            let complement_canonical = canonical(arena, &complement_expressions);
            if complement_expressions.len() >= 2 {
                if let Some(canonical) = complement_canonical {
                    emit_equalities(
                        arena,
                        canonical,
                        &complement_expressions,
                        &mut partition.scope_complement_equalities,
                    );
                }
            }

            let sides = match (scope_canonical, complement_canonical) {
                (Some(scoped), Some(_)) if bridged => vec![scoped],
                (scoped, complement) => scoped.into_iter().chain(complement).collect(),
            };
            let connecting: Vec<ExprId> = sides.into_iter().chain(straddling_expressions).collect();
            if let Some(canonical) = canonical(arena, &connecting) {
                emit_equalities(arena, canonical, &connecting, &mut partition.scope_straddling_equalities);
            }
        }
        partition
    }
}

/// An equality `x = y` whose sides differ, that is deterministic and cannot
/// turn non-NULL input into NULL
pub fn is_inference_candidate(
    arena: &ExprArena,
    functions: &dyn FunctionResolver,
    expression: ExprId,
) -> ExpressionResult<bool> {
    match arena.get(expression) {
        Expr::Comparison {
            op: ComparisonOperator::Equal,
            left,
            right,
        } => {
            if arena.same_structure(*left, *right) || may_return_null_on_non_null_input(arena, expression) {
                return Ok(false);
            }
            is_deterministic(arena, functions, expression)
        }
        _ => Ok(false),
    }
}

/// Conjuncts of `expression` that do not take part in equality inference
pub fn non_inferrable_conjuncts(
    arena: &ExprArena,
    functions: &dyn FunctionResolver,
    expression: ExprId,
) -> ExpressionResult<Vec<ExprId>> {
    let mut conjuncts = Vec::new();
    for conjunct in arena.extract_conjuncts(expression) {
        if !is_inference_candidate(arena, functions, conjunct)? {
            conjuncts.push(conjunct);
        }
    }
    Ok(conjuncts)
}

#[derive(Debug, PartialEq, Eq, PartialOrd, Ord)]
struct CanonicalKey {
    non_constant: bool,
    symbol_references: usize,
    size: usize,
    text: String,
}

impl CanonicalKey {
    fn of(arena: &ExprArena, id: ExprId) -> Self {
        Self {
            non_constant: !arena.is_constant(id),
            symbol_references: extract_all(arena, id).len(),
            size: arena.sub_expressions(id).len(),
            text: arena.display(id).to_string(),
        }
    }
}

fn canonical(arena: &ExprArena, candidates: &[ExprId]) -> Option<ExprId> {
    candidates
        .iter()
        .copied()
        .min_by_key(|&candidate| CanonicalKey::of(arena, candidate))
}

fn in_scope(arena: &ExprArena, id: ExprId, scope: &dyn Fn(&str) -> bool) -> bool {
    extract_unique(arena, id).iter().all(|symbol| scope(symbol))
}

fn push_unique(arena: &ExprArena, expressions: &mut Vec<ExprId>, id: ExprId) {
    if !expressions.iter().any(|&existing| arena.same_structure(existing, id)) {
        expressions.push(id);
    }
}

fn emit_equalities(arena: &mut ExprArena, canonical: ExprId, members: &[ExprId], output: &mut Vec<ExprId>) {
    for &member in members {
        if arena.same_structure(member, canonical) {
            continue;
        }
        let equality = arena.equal(canonical, member);
        push_unique(arena, output, equality);
    }
}

/// Union-find over shapes; classes and elements keep insertion order
#[derive(Default)]
struct DisjointSet {
    parent: HashMap<ShapeId, ShapeId>,
    order: Vec<ShapeId>,
}

impl DisjointSet {
    fn find(&mut self, shape: ShapeId) -> ShapeId {
        if !self.parent.contains_key(&shape) {
            self.parent.insert(shape, shape);
            self.order.push(shape);
            return shape;
        }
        let mut root = shape;
        while self.parent[&root] != root {
            root = self.parent[&root];
        }
        let mut current = shape;
        while current != root {
            let next = self.parent[&current];
            self.parent.insert(current, root);
            current = next;
        }
        root
    }

    fn union(&mut self, left: ShapeId, right: ShapeId) {
        let left = self.find(left);
        let right = self.find(right);
        if left != right {
            self.parent.insert(right, left);
        }
    }

    fn elements(&self) -> Vec<ShapeId> {
        self.order.clone()
    }

    fn classes(&mut self) -> Vec<Vec<ShapeId>> {
        let mut index: HashMap<ShapeId, usize> = HashMap::new();
        let mut classes: Vec<Vec<ShapeId>> = Vec::new();
        for shape in self.order.clone() {
            let root = self.find(shape);
            let position = *index.entry(root).or_insert_with(|| {
                classes.push(Vec::new());
                classes.len() - 1
            });
            classes[position].push(shape);
        }
        classes
    }
}
