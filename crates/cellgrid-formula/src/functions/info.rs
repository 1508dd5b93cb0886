//! Information functions
//!
//! The only family whose arguments keep their source reference, so ISREF
//! can answer from the argument's provenance instead of its value.

use super::Argument;
use crate::error::FormulaResult;
use cellgrid_core::{ExcelError, Value};

pub(super) fn fn_isblank(args: &[Argument]) -> FormulaResult<Value> {
    Ok(Value::Bool(matches!(scalar(&args[0]), Value::Blank)))
}

pub(super) fn fn_iserror(args: &[Argument]) -> FormulaResult<Value> {
    Ok(Value::Bool(scalar(&args[0]).is_error()))
}

pub(super) fn fn_isna(args: &[Argument]) -> FormulaResult<Value> {
    Ok(Value::Bool(
        scalar(&args[0]).as_error() == Some(ExcelError::Na),
    ))
}

pub(super) fn fn_isnumber(args: &[Argument]) -> FormulaResult<Value> {
    Ok(Value::Bool(matches!(scalar(&args[0]), Value::Number(_))))
}

pub(super) fn fn_istext(args: &[Argument]) -> FormulaResult<Value> {
    Ok(Value::Bool(matches!(scalar(&args[0]), Value::Text(_))))
}

pub(super) fn fn_islogical(args: &[Argument]) -> FormulaResult<Value> {
    Ok(Value::Bool(matches!(scalar(&args[0]), Value::Bool(_))))
}

pub(super) fn fn_isref(args: &[Argument]) -> FormulaResult<Value> {
    Ok(Value::Bool(args[0].reference.is_some()))
}

fn scalar(arg: &Argument) -> Value {
    arg.value
        .first_element()
        .cloned()
        .unwrap_or(Value::Blank)
}

#[cfg(test)]
mod tests {
    use super::super::test_util::arg;
    use super::*;
    use cellgrid_core::{CellRef, Reference};
    use pretty_assertions::assert_eq;

    #[test]
    fn test_type_predicates() {
        assert_eq!(fn_isblank(&[arg(Value::Blank)]).unwrap(), Value::Bool(true));
        assert_eq!(fn_isblank(&[arg(Value::text(""))]).unwrap(), Value::Bool(false));
        assert_eq!(
            fn_isnumber(&[arg(Value::Number(1.0))]).unwrap(),
            Value::Bool(true)
        );
        assert_eq!(fn_istext(&[arg(Value::text("x"))]).unwrap(), Value::Bool(true));
        assert_eq!(
            fn_islogical(&[arg(Value::Bool(false))]).unwrap(),
            Value::Bool(true)
        );
    }

    #[test]
    fn test_error_predicates() {
        assert_eq!(
            fn_iserror(&[arg(Value::Error(ExcelError::Div0))]).unwrap(),
            Value::Bool(true)
        );
        assert_eq!(
            fn_isna(&[arg(Value::Error(ExcelError::Div0))]).unwrap(),
            Value::Bool(false)
        );
        assert_eq!(
            fn_isna(&[arg(Value::Error(ExcelError::Na))]).unwrap(),
            Value::Bool(true)
        );
    }

    #[test]
    fn test_isref_uses_provenance() {
        let mut a = arg(Value::Number(5.0));
        assert_eq!(fn_isref(&[a.clone()]).unwrap(), Value::Bool(false));
        a.reference = Some(Reference::Cell(CellRef::new(1, 1)));
        assert_eq!(fn_isref(&[a]).unwrap(), Value::Bool(true));
    }
}
