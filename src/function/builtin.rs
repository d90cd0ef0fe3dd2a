//! Built-in scalar function catalog.

use std::collections::HashMap;

use crate::expression::error::{ExpressionError, ExpressionResult};
use crate::function::{FunctionHandle, FunctionResolver, ResolvedFunction, ScalarImplementation};
use crate::types::datetime::{
    parse_date, year_of_epoch_days, year_of_epoch_micros, MICROS_PER_DAY,
};
use crate::types::{DataType, Value};

/// Computes the return type for the given argument types, or `None` when the
/// overload does not accept them
pub type ReturnTypeBinder = fn(&[DataType]) -> Option<DataType>;

/// One overload of a named function
#[derive(Debug, Clone)]
pub struct FunctionDefinition {
    pub name: String,
    pub deterministic: bool,
    pub null_on_null_input: bool,
    pub bind: ReturnTypeBinder,
    pub implementation: Option<ScalarImplementation>,
}

impl FunctionDefinition {
    pub fn scalar(name: &str, bind: ReturnTypeBinder, implementation: ScalarImplementation) -> Self {
        Self {
            name: name.to_string(),
            deterministic: true,
            null_on_null_input: true,
            bind,
            implementation: Some(implementation),
        }
    }

    /// Deterministic function that is never evaluated at planning time
    pub fn opaque(name: &str, bind: ReturnTypeBinder) -> Self {
        Self {
            name: name.to_string(),
            deterministic: true,
            null_on_null_input: false,
            bind,
            implementation: None,
        }
    }

    pub fn non_deterministic(name: &str, bind: ReturnTypeBinder) -> Self {
        Self {
            name: name.to_string(),
            deterministic: false,
            null_on_null_input: false,
            bind,
            implementation: None,
        }
    }
}

/// In-memory function catalog
#[derive(Debug, Clone, Default)]
pub struct BuiltinFunctions {
    functions: HashMap<String, Vec<FunctionDefinition>>,
}

impl BuiltinFunctions {
    /// Catalog with the standard built-in functions registered
    pub fn new() -> Self {
        let mut catalog = Self::default();
        for definition in standard_functions() {
            catalog.register(definition);
        }
        catalog
    }

    /// Add an overload; earlier overloads win when several accept the arguments
    pub fn register(&mut self, definition: FunctionDefinition) {
        self.functions
            .entry(definition.name.to_ascii_lowercase())
            .or_default()
            .push(definition);
    }
}

impl FunctionResolver for BuiltinFunctions {
    fn resolve(&self, name: &str, argument_types: &[DataType]) -> ExpressionResult<ResolvedFunction> {
        let overloads = self
            .functions
            .get(&name.to_ascii_lowercase())
            .map(Vec::as_slice)
            .unwrap_or_default();
        overloads
            .iter()
            .find_map(|definition| {
                (definition.bind)(argument_types).map(|return_type| ResolvedFunction {
                    handle: FunctionHandle::new(name, argument_types.to_vec()),
                    return_type,
                    deterministic: definition.deterministic,
                    null_on_null_input: definition.null_on_null_input,
                    implementation: definition.implementation,
                })
            })
            .ok_or_else(|| ExpressionError::UnknownFunction {
                name: name.to_string(),
                arguments: argument_types
                    .iter()
                    .map(DataType::to_string)
                    .collect::<Vec<_>>()
                    .join(", "),
            })
    }
}

fn standard_functions() -> Vec<FunctionDefinition> {
    vec![
        FunctionDefinition::scalar("year", bind_year, year),
        FunctionDefinition::opaque("year", bind_zoned_year),
        FunctionDefinition::scalar("date", bind_date, date),
        FunctionDefinition::opaque("date", bind_zoned_date),
        FunctionDefinition::scalar("abs", bind_abs, abs),
        FunctionDefinition::scalar("length", bind_length, length),
        FunctionDefinition::scalar("lower", bind_same_varchar, lower),
        FunctionDefinition::scalar("upper", bind_same_varchar, upper),
        FunctionDefinition::scalar("concat", bind_concat, concat),
        FunctionDefinition::non_deterministic("rand", bind_rand),
        FunctionDefinition::non_deterministic("random", bind_rand),
        FunctionDefinition::non_deterministic("uuid", bind_uuid),
        FunctionDefinition::non_deterministic("shuffle", bind_shuffle),
        FunctionDefinition::opaque("filter", bind_filter),
        FunctionDefinition::opaque("transform", bind_transform),
        FunctionDefinition::opaque("try", bind_try),
    ]
}

fn bind_year(arguments: &[DataType]) -> Option<DataType> {
    match arguments {
        [DataType::Date] | [DataType::Timestamp { .. }] => Some(DataType::BigInt),
        _ => None,
    }
}

fn bind_zoned_year(arguments: &[DataType]) -> Option<DataType> {
    match arguments {
        [DataType::TimestampWithTimeZone { .. }] => Some(DataType::BigInt),
        _ => None,
    }
}

fn bind_date(arguments: &[DataType]) -> Option<DataType> {
    match arguments {
        [DataType::Timestamp { .. }] | [DataType::Varchar(_)] => Some(DataType::Date),
        _ => None,
    }
}

fn bind_zoned_date(arguments: &[DataType]) -> Option<DataType> {
    match arguments {
        [DataType::TimestampWithTimeZone { .. }] => Some(DataType::Date),
        _ => None,
    }
}

fn bind_abs(arguments: &[DataType]) -> Option<DataType> {
    match arguments {
        [ty] if ty.is_numeric() => Some(ty.clone()),
        _ => None,
    }
}

fn bind_length(arguments: &[DataType]) -> Option<DataType> {
    match arguments {
        [DataType::Varchar(_)] => Some(DataType::BigInt),
        _ => None,
    }
}

fn bind_same_varchar(arguments: &[DataType]) -> Option<DataType> {
    match arguments {
        [ty @ DataType::Varchar(_)] => Some(ty.clone()),
        _ => None,
    }
}

fn bind_concat(arguments: &[DataType]) -> Option<DataType> {
    (arguments.len() >= 2 && arguments.iter().all(DataType::is_string)).then(DataType::varchar)
}

fn bind_rand(arguments: &[DataType]) -> Option<DataType> {
    match arguments {
        [] => Some(DataType::Double),
        [ty] if ty.is_integral() => Some(ty.clone()),
        _ => None,
    }
}

fn bind_uuid(arguments: &[DataType]) -> Option<DataType> {
    arguments.is_empty().then(DataType::varchar)
}

fn bind_shuffle(arguments: &[DataType]) -> Option<DataType> {
    match arguments {
        [ty @ DataType::Array(_)] => Some(ty.clone()),
        _ => None,
    }
}

fn bind_filter(arguments: &[DataType]) -> Option<DataType> {
    match arguments {
        [array @ DataType::Array(element), DataType::Function {
            arguments: lambda_arguments,
            return_type,
        }] if accepts_element(lambda_arguments, element) && **return_type == DataType::Boolean =>
        {
            Some(array.clone())
        }
        _ => None,
    }
}

fn bind_transform(arguments: &[DataType]) -> Option<DataType> {
    match arguments {
        [DataType::Array(element), DataType::Function {
            arguments: lambda_arguments,
            return_type,
        }] if accepts_element(lambda_arguments, element) => {
            Some(DataType::array(return_type.as_ref().clone()))
        }
        _ => None,
    }
}

fn accepts_element(lambda_arguments: &[DataType], element: &DataType) -> bool {
    matches!(lambda_arguments, [argument] if argument == element)
}

fn bind_try(arguments: &[DataType]) -> Option<DataType> {
    match arguments {
        [DataType::Function {
            arguments: lambda_arguments,
            return_type,
        }] if lambda_arguments.is_empty() => Some(return_type.as_ref().clone()),
        _ => None,
    }
}

fn invalid_arguments(name: &str, arguments: &[Value]) -> ExpressionError {
    ExpressionError::invalid(format!("{} cannot be applied to {:?}", name, arguments))
}

fn year(arguments: &[Value], types: &[DataType], _: &DataType) -> ExpressionResult<Value> {
    let year = match (arguments, types) {
        ([Value::Long(days)], [DataType::Date]) => year_of_epoch_days(*days),
        ([Value::Long(micros)], [DataType::Timestamp { .. }]) => year_of_epoch_micros(*micros),
        ([Value::LongTimestamp { epoch_micros, .. }], [DataType::Timestamp { .. }]) => {
            year_of_epoch_micros(*epoch_micros)
        }
        _ => return Err(invalid_arguments("year", arguments)),
    };
    year.map(|year| Value::Long(year as i64))
        .ok_or_else(|| ExpressionError::NumericOverflow {
            data_type: types[0].to_string(),
        })
}

fn date(arguments: &[Value], types: &[DataType], _: &DataType) -> ExpressionResult<Value> {
    match (arguments, types) {
        ([Value::Long(micros)], [DataType::Timestamp { .. }]) => {
            Ok(Value::Long(micros.div_euclid(MICROS_PER_DAY)))
        }
        ([Value::LongTimestamp { epoch_micros, .. }], [DataType::Timestamp { .. }]) => {
            Ok(Value::Long(epoch_micros.div_euclid(MICROS_PER_DAY)))
        }
        ([Value::String(text)], [DataType::Varchar(_)]) => parse_date(text)
            .map(Value::Long)
            .ok_or_else(|| ExpressionError::InvalidCast {
                value: format!("'{}'", text),
                target: DataType::Date.to_string(),
            }),
        _ => Err(invalid_arguments("date", arguments)),
    }
}

fn abs(arguments: &[Value], types: &[DataType], _: &DataType) -> ExpressionResult<Value> {
    match arguments {
        [Value::Long(v)] => {
            let result = v.checked_abs().ok_or_else(|| ExpressionError::NumericOverflow {
                data_type: types[0].to_string(),
            })?;
            match types[0].integral_bounds() {
                Some((_, max)) if result > max => Err(ExpressionError::NumericOverflow {
                    data_type: types[0].to_string(),
                }),
                _ => Ok(Value::Long(result)),
            }
        }
        [Value::Double(v)] => Ok(Value::Double(v.abs())),
        [Value::Decimal(v)] => Ok(Value::Decimal(v.abs())),
        _ => Err(invalid_arguments("abs", arguments)),
    }
}

fn length(arguments: &[Value], _: &[DataType], _: &DataType) -> ExpressionResult<Value> {
    match arguments {
        [Value::String(s)] => Ok(Value::Long(s.chars().count() as i64)),
        _ => Err(invalid_arguments("length", arguments)),
    }
}

fn lower(arguments: &[Value], _: &[DataType], _: &DataType) -> ExpressionResult<Value> {
    match arguments {
        [Value::String(s)] => Ok(Value::String(s.to_lowercase())),
        _ => Err(invalid_arguments("lower", arguments)),
    }
}

fn upper(arguments: &[Value], _: &[DataType], _: &DataType) -> ExpressionResult<Value> {
    match arguments {
        [Value::String(s)] => Ok(Value::String(s.to_uppercase())),
        _ => Err(invalid_arguments("upper", arguments)),
    }
}

fn concat(arguments: &[Value], _: &[DataType], _: &DataType) -> ExpressionResult<Value> {
    let mut result = String::new();
    for argument in arguments {
        match argument {
            Value::String(s) => result.push_str(s),
            _ => return Err(invalid_arguments("concat", arguments)),
        }
    }
    Ok(Value::String(result))
}
