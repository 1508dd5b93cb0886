//! Logical functions

use super::{Argument, FunctionContext};
use crate::algebra::Operand;
use crate::error::FormulaResult;
use crate::evaluator::RawArg;
use cellgrid_core::{ExcelError, Value};

/// `IF(condition, [value_if_true], [value_if_false])`.
///
/// The chosen branch's operand is returned as-is, so `IF(TRUE, A1:B2)`
/// still carries the reference. A blank condition is false; an error
/// condition is the result.
pub(super) fn fn_if(ctx: &mut dyn FunctionContext, args: &[RawArg]) -> FormulaResult<Operand> {
    let condition = match &args[0] {
        RawArg::Omitted => false,
        RawArg::Operand(op) => {
            let extracted = ctx.retrieve(op.clone())?;
            let scalar = extracted
                .value
                .first_element()
                .cloned()
                .unwrap_or(Value::Blank);
            match scalar {
                Value::Error(e) => return Ok(Operand::Value(Value::Error(e))),
                Value::Blank => false,
                Value::Number(n) => n != 0.0,
                Value::Bool(b) => b,
                Value::Text(s) => match s.to_uppercase().as_str() {
                    "TRUE" => true,
                    "FALSE" => false,
                    _ => return Err(ExcelError::Value.into()),
                },
                Value::Array(_) => return Err(ExcelError::Value.into()),
            }
        }
    };

    let branch = if condition { args.get(1) } else { args.get(2) };
    Ok(match branch {
        Some(RawArg::Operand(op)) => op.clone(),
        // an explicitly omitted branch is 0, a missing else-branch is FALSE
        Some(RawArg::Omitted) => Operand::Value(Value::Number(0.0)),
        None => {
            if condition {
                Operand::Value(Value::Number(0.0))
            } else {
                Operand::Value(Value::Bool(false))
            }
        }
    })
}

pub(super) fn fn_and(args: &[Argument]) -> FormulaResult<Value> {
    combine(args, true, |acc, b| acc && b)
}

pub(super) fn fn_or(args: &[Argument]) -> FormulaResult<Value> {
    combine(args, false, |acc, b| acc || b)
}

/// Shared AND/OR walk: blanks are skipped, text inside ranges is skipped,
/// direct text must spell a boolean or a number.
fn combine(args: &[Argument], init: bool, fold: fn(bool, bool) -> bool) -> FormulaResult<Value> {
    let mut acc = init;
    let mut any = false;
    for arg in args {
        for value in arg.flat_values() {
            let b = match value {
                Value::Blank => continue,
                Value::Bool(b) => *b,
                Value::Number(n) => *n != 0.0,
                Value::Text(s) => {
                    if arg.is_reference() {
                        continue;
                    }
                    match s.to_uppercase().as_str() {
                        "TRUE" => true,
                        "FALSE" => false,
                        other => match other.parse::<f64>() {
                            Ok(n) => n != 0.0,
                            Err(_) => return Err(ExcelError::Value.into()),
                        },
                    }
                }
                Value::Error(e) => return Err((*e).into()),
                Value::Array(_) => continue,
            };
            acc = fold(acc, b);
            any = true;
        }
    }
    if !any {
        return Err(ExcelError::Value.into());
    }
    Ok(Value::Bool(acc))
}

pub(super) fn fn_not(args: &[Argument]) -> FormulaResult<Value> {
    Ok(Value::Bool(!args[0].boolean()?))
}

pub(super) fn fn_true(_args: &[Argument]) -> FormulaResult<Value> {
    Ok(Value::Bool(true))
}

pub(super) fn fn_false(_args: &[Argument]) -> FormulaResult<Value> {
    Ok(Value::Bool(false))
}

pub(super) fn fn_iferror(args: &[Argument]) -> FormulaResult<Value> {
    let fallback = matches!(
        args[0].value.first_element(),
        Some(Value::Error(_)) | None
    );
    if fallback {
        Ok(args[1].value.clone())
    } else {
        Ok(args[0].value.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_util::{arg, range_arg};
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_and_or() {
        let args = [arg(Value::Bool(true)), arg(Value::Number(1.0))];
        assert_eq!(fn_and(&args).unwrap(), Value::Bool(true));
        let args = [arg(Value::Bool(true)), arg(Value::Number(0.0))];
        assert_eq!(fn_and(&args).unwrap(), Value::Bool(false));
        assert_eq!(fn_or(&args).unwrap(), Value::Bool(true));
    }

    #[test]
    fn test_and_skips_text_in_ranges() {
        let range = range_arg(vec![vec![Value::text("x"), Value::Bool(true)]]);
        assert_eq!(fn_and(&[range]).unwrap(), Value::Bool(true));
        // no usable value at all is #VALUE!
        let range = range_arg(vec![vec![Value::text("x")]]);
        assert!(fn_and(&[range]).is_err());
    }

    #[test]
    fn test_not() {
        assert_eq!(fn_not(&[arg(Value::Bool(false))]).unwrap(), Value::Bool(true));
        assert_eq!(fn_not(&[arg(Value::Number(2.0))]).unwrap(), Value::Bool(false));
    }

    #[test]
    fn test_iferror() {
        let args = [arg(Value::Error(ExcelError::Div0)), arg(Value::Number(1.0))];
        assert_eq!(fn_iferror(&args).unwrap(), Value::Number(1.0));
        let args = [arg(Value::Number(5.0)), arg(Value::Number(1.0))];
        assert_eq!(fn_iferror(&args).unwrap(), Value::Number(5.0));
    }
}
