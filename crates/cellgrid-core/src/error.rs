//! Excel-compatible error codes

use thiserror::Error;

/// The closed set of named spreadsheet error codes.
///
/// These are the errors a formula can *evaluate to* (as opposed to failures
/// of the parse itself). Each variant displays as the literal Excel code
/// string, e.g. `#DIV/0!`. The enum is `Copy` and fieldless, so every
/// occurrence of a code is the same interned value and equality is equality
/// of codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Error)]
pub enum ExcelError {
    /// Division by zero (`#DIV/0!`)
    #[error("#DIV/0!")]
    Div0,

    /// Value not available (`#N/A`)
    #[error("#N/A")]
    Na,

    /// Unrecognized name (`#NAME?`)
    #[error("#NAME?")]
    Name,

    /// Empty intersection (`#NULL!`)
    #[error("#NULL!")]
    Null,

    /// Invalid numeric value (`#NUM!`)
    #[error("#NUM!")]
    Num,

    /// Invalid reference (`#REF!`)
    #[error("#REF!")]
    Ref,

    /// Wrong value type (`#VALUE!`)
    #[error("#VALUE!")]
    Value,
}

impl ExcelError {
    /// The literal error code string, e.g. `"#VALUE!"`.
    pub fn code(&self) -> &'static str {
        match self {
            ExcelError::Div0 => "#DIV/0!",
            ExcelError::Na => "#N/A",
            ExcelError::Name => "#NAME?",
            ExcelError::Null => "#NULL!",
            ExcelError::Num => "#NUM!",
            ExcelError::Ref => "#REF!",
            ExcelError::Value => "#VALUE!",
        }
    }

    /// Parse an error code string (case-insensitive), e.g. `"#div/0!"`.
    pub fn from_code(s: &str) -> Option<Self> {
        match s.to_uppercase().as_str() {
            "#DIV/0!" => Some(ExcelError::Div0),
            "#N/A" => Some(ExcelError::Na),
            "#NAME?" => Some(ExcelError::Name),
            "#NULL!" => Some(ExcelError::Null),
            "#NUM!" => Some(ExcelError::Num),
            "#REF!" => Some(ExcelError::Ref),
            "#VALUE!" => Some(ExcelError::Value),
            _ => None,
        }
    }
}
