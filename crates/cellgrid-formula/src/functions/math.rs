//! Math functions

use super::Argument;
use crate::error::FormulaResult;
use cellgrid_core::{ExcelError, Value};

pub(super) fn fn_sum(args: &[Argument]) -> FormulaResult<Value> {
    let mut total = 0.0;
    for arg in args {
        for n in arg.numeric_values()? {
            total += n;
        }
    }
    Ok(Value::Number(total))
}

pub(super) fn fn_product(args: &[Argument]) -> FormulaResult<Value> {
    let mut product = 1.0;
    let mut any = false;
    for arg in args {
        for n in arg.numeric_values()? {
            product *= n;
            any = true;
        }
    }
    Ok(Value::Number(if any { product } else { 0.0 }))
}

pub(super) fn fn_abs(args: &[Argument]) -> FormulaResult<Value> {
    Ok(Value::Number(args[0].number()?.abs()))
}

pub(super) fn fn_int(args: &[Argument]) -> FormulaResult<Value> {
    Ok(Value::Number(args[0].number()?.floor()))
}

pub(super) fn fn_mod(args: &[Argument]) -> FormulaResult<Value> {
    let n = args[0].number()?;
    let d = args[1].number()?;
    if d == 0.0 {
        return Err(ExcelError::Div0.into());
    }
    // result takes the divisor's sign
    Ok(Value::Number(n - d * (n / d).floor()))
}

pub(super) fn fn_round(args: &[Argument]) -> FormulaResult<Value> {
    let n = args[0].number()?;
    let digits = args[1].integer()?;
    let factor = 10f64.powi(digits as i32);
    // round half away from zero
    Ok(Value::Number((n * factor).round() / factor))
}

pub(super) fn fn_sign(args: &[Argument]) -> FormulaResult<Value> {
    let n = args[0].number()?;
    let sign = if n > 0.0 {
        1.0
    } else if n < 0.0 {
        -1.0
    } else {
        0.0
    };
    Ok(Value::Number(sign))
}

pub(super) fn fn_sqrt(args: &[Argument]) -> FormulaResult<Value> {
    let n = args[0].number()?;
    if n < 0.0 {
        return Err(ExcelError::Num.into());
    }
    Ok(Value::Number(n.sqrt()))
}

pub(super) fn fn_power(args: &[Argument]) -> FormulaResult<Value> {
    let base = args[0].number()?;
    let exponent = args[1].number()?;
    if base == 0.0 && exponent == 0.0 {
        return Err(ExcelError::Num.into());
    }
    if base == 0.0 && exponent < 0.0 {
        return Err(ExcelError::Div0.into());
    }
    let result = base.powf(exponent);
    if result.is_nan() {
        return Err(ExcelError::Num.into());
    }
    Ok(Value::Number(result))
}
