//! Text functions
//!
//! All positions and lengths are in characters, not bytes.

use super::Argument;
use crate::error::FormulaResult;
use cellgrid_core::{ExcelError, Value};

pub(super) fn fn_concatenate(args: &[Argument]) -> FormulaResult<Value> {
    let mut out = String::new();
    for arg in args {
        out.push_str(&arg.text()?);
    }
    Ok(Value::Text(out))
}

pub(super) fn fn_len(args: &[Argument]) -> FormulaResult<Value> {
    Ok(Value::Number(args[0].text()?.chars().count() as f64))
}

pub(super) fn fn_upper(args: &[Argument]) -> FormulaResult<Value> {
    Ok(Value::Text(args[0].text()?.to_uppercase()))
}

pub(super) fn fn_lower(args: &[Argument]) -> FormulaResult<Value> {
    Ok(Value::Text(args[0].text()?.to_lowercase()))
}

/// Strips leading/trailing spaces and collapses internal runs to one.
pub(super) fn fn_trim(args: &[Argument]) -> FormulaResult<Value> {
    let text = args[0].text()?;
    Ok(Value::Text(
        text.split_whitespace().collect::<Vec<_>>().join(" "),
    ))
}

pub(super) fn fn_left(args: &[Argument]) -> FormulaResult<Value> {
    let text = args[0].text()?;
    let count = optional_count(args.get(1))?;
    Ok(Value::Text(text.chars().take(count).collect()))
}

pub(super) fn fn_right(args: &[Argument]) -> FormulaResult<Value> {
    let text = args[0].text()?;
    let count = optional_count(args.get(1))?;
    let total = text.chars().count();
    Ok(Value::Text(
        text.chars().skip(total.saturating_sub(count)).collect(),
    ))
}

pub(super) fn fn_mid(args: &[Argument]) -> FormulaResult<Value> {
    let text = args[0].text()?;
    let start = args[1].integer()?;
    let len = args[2].integer()?;
    if start < 1 || len < 0 {
        return Err(ExcelError::Value.into());
    }
    Ok(Value::Text(
        text.chars()
            .skip(start as usize - 1)
            .take(len as usize)
            .collect(),
    ))
}

fn optional_count(arg: Option<&Argument>) -> Result<usize, ExcelError> {
    match arg {
        None => Ok(1),
        Some(a) if a.omitted => Ok(1),
        Some(a) => {
            let n = a.integer()?;
            if n < 0 {
                return Err(ExcelError::Value);
            }
            Ok(n as usize)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_util::arg;
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_concatenate_formats_values() {
        let args = [
            arg(Value::text("x=")),
            arg(Value::Number(3.0)),
            arg(Value::Bool(true)),
        ];
        assert_eq!(fn_concatenate(&args).unwrap(), Value::text("x=3TRUE"));
    }

    #[test]
    fn test_len_counts_chars() {
        assert_eq!(fn_len(&[arg(Value::text("héllo"))]).unwrap(), Value::Number(5.0));
    }

    #[test]
    fn test_trim_collapses_runs() {
        let r = fn_trim(&[arg(Value::text("  a   b  "))]).unwrap();
        assert_eq!(r, Value::text("a b"));
    }

    #[test]
    fn test_left_right_mid() {
        let hello = || arg(Value::text("hello"));
        assert_eq!(fn_left(&[hello()]).unwrap(), Value::text("h"));
        assert_eq!(
            fn_left(&[hello(), arg(Value::Number(3.0))]).unwrap(),
            Value::text("hel")
        );
        assert_eq!(
            fn_right(&[hello(), arg(Value::Number(3.0))]).unwrap(),
            Value::text("llo")
        );
        assert_eq!(
            fn_mid(&[hello(), arg(Value::Number(2.0)), arg(Value::Number(3.0))]).unwrap(),
            Value::text("ell")
        );
        assert!(fn_mid(&[hello(), arg(Value::Number(0.0)), arg(Value::Number(1.0))]).is_err());
    }
}
