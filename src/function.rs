//! Function resolution.
//!
//! Calls in the IR carry a `FunctionHandle` (name plus argument types). The
//! type analyzer, the determinism checks and the interpreter look the handle
//! up through a `FunctionResolver` to learn the return type, whether the
//! function is deterministic and, for foldable functions, its implementation.

pub mod builtin;

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::expression::error::ExpressionResult;
use crate::types::{DataType, Value};

pub use builtin::{BuiltinFunctions, FunctionDefinition};

/// Identity of a resolved function as stored in a call node
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FunctionHandle {
    pub name: String,
    pub argument_types: Vec<DataType>,
}

impl FunctionHandle {
    pub fn new(name: impl Into<String>, argument_types: Vec<DataType>) -> Self {
        Self {
            name: name.into(),
            argument_types,
        }
    }
}

impl fmt::Display for FunctionHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}(", self.name)?;
        for (i, ty) in self.argument_types.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}", ty)?;
        }
        write!(f, ")")
    }
}

/// Scalar implementation: argument values, argument types, return type
pub type ScalarImplementation = fn(&[Value], &[DataType], &DataType) -> ExpressionResult<Value>;

/// Result of resolving a function name against argument types
#[derive(Debug, Clone)]
pub struct ResolvedFunction {
    pub handle: FunctionHandle,
    pub return_type: DataType,
    pub deterministic: bool,
    /// The function returns NULL whenever any argument is NULL
    pub null_on_null_input: bool,
    /// Absent for functions that cannot be evaluated at planning time
    pub implementation: Option<ScalarImplementation>,
}

/// Function-resolution oracle
pub trait FunctionResolver {
    fn resolve(&self, name: &str, argument_types: &[DataType]) -> ExpressionResult<ResolvedFunction>;

    fn resolve_handle(&self, handle: &FunctionHandle) -> ExpressionResult<ResolvedFunction> {
        self.resolve(&handle.name, &handle.argument_types)
    }
}
