//! SQL types and constant values understood by the rewrite engine.
//!
//! This module provides:
//! - `DataType`: the statically inferred type of an expression node
//! - `Value`: a concrete constant produced by literals and constant folding
//! - Calendar helpers for DATE / TIMESTAMP encodings

pub mod data_type;
pub mod datetime;
pub mod value;

pub use data_type::{DataType, RowField};
pub use value::Value;
