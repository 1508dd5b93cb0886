//! # cellgrid-core
//!
//! Core data model for the cellgrid formula engine:
//!
//! - [`Value`]: scalar and 2D array values
//! - [`ExcelError`]: the closed set of spreadsheet error codes
//! - [`CellRef`], [`RangeRef`], [`Reference`]: 1-based cell addressing
//! - [`Position`]: the coordinate a formula is evaluated at
//!
//! This crate has no opinion about parsing or evaluation; it only defines
//! the data the formula engine operates on.

pub mod error;
pub mod reference;
pub mod value;

pub use error::ExcelError;
pub use reference::{
    column_name_to_number, column_number_to_name, parse_cell_address, CellRef, Coord, Position,
    RangeRef, Reference, MAX_COLUMN, MAX_ROW,
};
pub use value::{Collection, Value};
