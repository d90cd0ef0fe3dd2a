//! Lowering of `GROUPING(c1, ..., cn)`.
//!
//! For a grouping set, bit `n - 1 - i` of the result is set when argument
//! `ci` is not part of the set (it was aggregated over), so the first
//! argument maps to the highest bit. With several grouping sets the call
//! becomes a lookup into the array of per-set masks, indexed by the group id
//! the aggregation produces.

use std::collections::BTreeSet;

use crate::expression::error::{ExpressionError, ExpressionResult};
use crate::expression::expr::{ExprArena, ExprId};
use crate::types::DataType;

/// Bit mask of `GROUPING(columns)` for one grouping set
pub fn grouping_mask(grouping_set: &BTreeSet<usize>, columns: &[usize]) -> i64 {
    let width = columns.len();
    let mut mask = (1_i64 << width) - 1;
    for (i, column) in columns.iter().enumerate() {
        if grouping_set.contains(column) {
            mask &= !(1 << (width - 1 - i));
        }
    }
    mask
}

/// Replace a `GROUPING` call.
///
/// `columns` holds the grouping-set column index of each argument. The
/// result type must be BIGINT or INTEGER. `group_id_symbol` names the BIGINT
/// group id and is required when there is more than one grouping set.
pub fn rewrite_grouping_operation(
    arena: &mut ExprArena,
    result_type: &DataType,
    grouping_sets: &[BTreeSet<usize>],
    columns: &[usize],
    group_id_symbol: Option<&str>,
) -> ExpressionResult<ExprId> {
    if columns.len() >= 63 {
        return Err(ExpressionError::invalid(format!(
            "GROUPING supports at most 62 arguments, got {}",
            columns.len()
        )));
    }
    let literal = |arena: &mut ExprArena, value: i64| match result_type {
        DataType::BigInt => Ok(arena.bigint(value)),
        DataType::Integer => i32::try_from(value)
            .map(|value| arena.integer(value))
            .map_err(|_| ExpressionError::NumericOverflow {
                data_type: result_type.to_string(),
            }),
        other => Err(ExpressionError::TypeMismatch {
            expected: "bigint or integer".to_string(),
            actual: other.to_string(),
            context: "GROUPING result".to_string(),
        }),
    };

    if grouping_sets.len() <= 1 {
        return literal(arena, 0);
    }

    let group_id = group_id_symbol.ok_or_else(|| {
        ExpressionError::invalid("GROUPING over several grouping sets requires a group id symbol")
    })?;
    let mut masks = Vec::with_capacity(grouping_sets.len());
    for grouping_set in grouping_sets {
        masks.push(literal(arena, grouping_mask(grouping_set, columns))?);
    }
    let array = arena.array(masks);
    let group_id = arena.symbol(group_id);
    let one = arena.bigint(1);
    let index = arena.add(group_id, one);
    Ok(arena.subscript(array, index))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn set(columns: &[usize]) -> BTreeSet<usize> {
        columns.iter().copied().collect()
    }

    #[test]
    fn test_masks() {
        // GROUPING(a, b) with a = 0, b = 1
        assert_eq!(grouping_mask(&set(&[0, 1]), &[0, 1]), 0);
        assert_eq!(grouping_mask(&set(&[0]), &[0, 1]), 1);
        assert_eq!(grouping_mask(&set(&[1]), &[0, 1]), 2);
        assert_eq!(grouping_mask(&set(&[]), &[0, 1]), 3);
    }

    #[test]
    fn test_single_grouping_set() {
        let mut arena = ExprArena::new();
        let id = rewrite_grouping_operation(&mut arena, &DataType::BigInt, &[set(&[0, 1])], &[0, 1], None)
            .unwrap();
        assert_eq!(arena.display(id).to_string(), "BIGINT '0'");

        let id = rewrite_grouping_operation(&mut arena, &DataType::Integer, &[set(&[0])], &[0], None)
            .unwrap();
        assert_eq!(arena.display(id).to_string(), "0");

        assert!(rewrite_grouping_operation(&mut arena, &DataType::Double, &[set(&[0])], &[0], None)
            .is_err());
    }

    #[test]
    fn test_multiple_grouping_sets() {
        let mut arena = ExprArena::new();
        let sets = [set(&[0, 1]), set(&[0])];
        let id = rewrite_grouping_operation(&mut arena, &DataType::BigInt, &sets, &[0, 1], Some("groupid"))
            .unwrap();
        assert_eq!(
            arena.display(id).to_string(),
            "ARRAY[BIGINT '0', BIGINT '1'][(groupid + BIGINT '1')]"
        );

        assert!(rewrite_grouping_operation(&mut arena, &DataType::BigInt, &sets, &[0, 1], None).is_err());
    }
}
