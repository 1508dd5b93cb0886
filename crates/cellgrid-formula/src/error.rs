//! Formula failure types
//!
//! Two kinds of failure exist and they travel differently:
//!
//! - *Value-level* errors ([`cellgrid_core::ExcelError`]) are ordinary
//!   evaluation results: `=10/0` returns `#DIV/0!` to the caller the same way
//!   a spreadsheet cell displays it. Operators and functions thread them
//!   through without unwinding.
//! - *Thrown* failures ([`FormulaError`]) abort the parse call: malformed
//!   syntax, empty input, unimplemented functions. These correspond to the
//!   generic `#ERROR!` code and carry a message and source location.
//!
//! A function callable may return `Err(FormulaError::Excel(e))` (for example
//! via `?`); the invocation boundary converts that back into a value-level
//! error, so callables are free to signal failure either way.

use cellgrid_core::ExcelError;
use thiserror::Error;

/// Result type for formula operations
pub type FormulaResult<T> = std::result::Result<T, FormulaError>;

/// 1-based source location of a failure, relative to the formula text after
/// the optional leading `=` has been stripped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ErrorLocation {
    pub line: u32,
    pub column: u32,
}

/// Failures that abort a parse call.
#[derive(Debug, Error)]
pub enum FormulaError {
    /// The caller handed over an empty string; this is a usage error, not a
    /// formula error.
    #[error("input must not be empty")]
    EmptyInput,

    /// Lex or parse failure (`#ERROR!`). The message embeds the offending
    /// source line and a caret marker.
    #[error("#ERROR!{message}")]
    Parse {
        message: String,
        location: ErrorLocation,
    },

    /// Semantic failure raised from inside an evaluation action (`#ERROR!`),
    /// e.g. intersecting a whole column.
    #[error("#ERROR! {0}")]
    Eval(String),

    /// A function was looked up that the registry does not carry.
    #[error("function {0} is not implemented")]
    NotImplemented(String),

    /// A value-level error signalled by throwing; converted back into a
    /// returned error value at the function-invocation boundary.
    #[error(transparent)]
    Excel(#[from] ExcelError),
}

impl FormulaError {
    /// The source location, when the failure carries one.
    pub fn location(&self) -> Option<ErrorLocation> {
        match self {
            FormulaError::Parse { location, .. } => Some(*location),
            _ => None,
        }
    }
}
