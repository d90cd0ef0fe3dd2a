//! Encoding of constant values back into IR.

use crate::expression::error::{ExpressionError, ExpressionResult};
use crate::expression::expr::{ExprArena, ExprId};
use crate::types::{DataType, Value};

/// Build an expression that evaluates to `value` with type `ty`.
///
/// Typed NULLs become `CAST(NULL AS ty)`. Arrays and rows become constructor
/// nodes over encoded elements, cast back to `ty` when the constructor alone
/// would not carry the full type.
pub fn to_expression(arena: &mut ExprArena, value: Value, ty: &DataType) -> ExpressionResult<ExprId> {
    if !value.is_compatible_with(ty) {
        return Err(ExpressionError::TypeMismatch {
            expected: ty.to_string(),
            actual: format!("{:?}", value),
            context: "literal encoding".to_string(),
        });
    }
    match (value, ty) {
        (Value::Null, DataType::Unknown) => Ok(arena.null()),
        (Value::Null, ty) => Ok(arena.typed_null(ty.clone())),
        (Value::Array(items), DataType::Array(element)) => {
            let empty = items.is_empty();
            let items = items
                .into_iter()
                .map(|item| to_expression(arena, item, element))
                .collect::<ExpressionResult<Vec<_>>>()?;
            let array = arena.array(items);
            Ok(if empty { arena.cast(array, ty.clone()) } else { array })
        }
        (Value::Row(items), DataType::Row(fields)) => {
            let named = fields.iter().any(|field| field.name.is_some());
            let items = items
                .into_iter()
                .zip(fields)
                .map(|(item, field)| to_expression(arena, item, &field.ty))
                .collect::<ExpressionResult<Vec<_>>>()?;
            let row = arena.row(items);
            Ok(if named { arena.cast(row, ty.clone()) } else { row })
        }
        (_, DataType::Map(..)) | (_, DataType::Function { .. }) => Err(ExpressionError::invalid(
            format!("cannot encode a constant of type {}", ty),
        )),
        (value, ty) => Ok(arena.literal(value, ty.clone())),
    }
}
