//! # cellgrid-formula
//!
//! Excel-compatible formula parser and evaluator for cellgrid.
//!
//! This crate provides:
//! - Formula parsing (text → AST) with Excel's operators, references,
//!   array literals and error literals
//! - Formula evaluation over a pluggable [`DataSource`], synchronous or
//!   asynchronous
//! - Built-in functions plus custom function registration
//! - Dependency extraction for calculation chains
//!
//! ## Example
//!
//! ```
//! use cellgrid_formula::FormulaEngine;
//! use cellgrid_core::Value;
//!
//! let mut engine = FormulaEngine::default();
//! let result = engine.parse("=SUM(1,2,3)*2", None, false)?;
//! assert_eq!(result, Value::Number(12.0));
//! # Ok::<(), cellgrid_formula::FormulaError>(())
//! ```

pub mod algebra;
pub mod ast;
pub mod dependency;
pub mod engine;
pub mod error;
pub mod evaluator;
pub mod functions;
pub mod lexer;
pub mod parser;

pub use algebra::{Operand, Resolver};
pub use dependency::DepParser;
pub use engine::{DataSource, FormulaEngine, NullSource};
pub use error::{ErrorLocation, FormulaError, FormulaResult};
pub use evaluator::{evaluate, EvalContext, RawArg};
pub use functions::{Argument, FunctionContext, FunctionDef, FunctionRegistry};
pub use parser::parse_formula;

pub use cellgrid_core::{
    CellRef, Collection, Coord, ExcelError, Position, RangeRef, Reference, Value,
};
