//! Statistical functions

use super::criteria::CriteriaMatcher;
use super::{Argument, FunctionContext};
use crate::algebra::Operand;
use crate::error::{FormulaError, FormulaResult};
use crate::evaluator::RawArg;
use cellgrid_core::{Coord, ExcelError, RangeRef, Reference, Value};

pub(super) fn fn_average(args: &[Argument]) -> FormulaResult<Value> {
    let mut total = 0.0;
    let mut count = 0usize;
    for arg in args {
        for n in arg.numeric_values()? {
            total += n;
            count += 1;
        }
    }
    if count == 0 {
        return Err(ExcelError::Div0.into());
    }
    Ok(Value::Number(total / count as f64))
}

pub(super) fn fn_count(args: &[Argument]) -> FormulaResult<Value> {
    let mut count = 0usize;
    for arg in args {
        match &arg.value {
            Value::Array(rows) => {
                count += rows
                    .iter()
                    .flatten()
                    .filter(|v| matches!(v, Value::Number(_)))
                    .count();
            }
            Value::Blank => {}
            // a direct scalar counts when it is numeric; errors don't abort
            scalar => {
                if arg.omitted {
                    continue;
                }
                if crate::algebra::coerce_number(scalar, false).is_ok() {
                    count += 1;
                }
            }
        }
    }
    Ok(Value::Number(count as f64))
}

pub(super) fn fn_counta(args: &[Argument]) -> FormulaResult<Value> {
    let mut count = 0usize;
    for arg in args {
        if arg.omitted {
            continue;
        }
        match &arg.value {
            Value::Array(rows) => {
                count += rows.iter().flatten().filter(|v| !v.is_blank()).count();
            }
            Value::Blank => {}
            _ => count += 1,
        }
    }
    Ok(Value::Number(count as f64))
}

pub(super) fn fn_max(args: &[Argument]) -> FormulaResult<Value> {
    fold_numeric(args, f64::max)
}

pub(super) fn fn_min(args: &[Argument]) -> FormulaResult<Value> {
    fold_numeric(args, f64::min)
}

fn fold_numeric(args: &[Argument], pick: fn(f64, f64) -> f64) -> FormulaResult<Value> {
    let mut best: Option<f64> = None;
    for arg in args {
        for n in arg.numeric_values()? {
            best = Some(match best {
                Some(b) => pick(b, n),
                None => n,
            });
        }
    }
    Ok(Value::Number(best.unwrap_or(0.0)))
}

/// `SUMIF(range, criteria, [sum_range])`. Works on the references directly:
/// when a separate sum range is given, only its top-left corner matters and
/// the criteria range's shape is projected onto it.
pub(super) fn fn_sumif(
    ctx: &mut dyn FunctionContext,
    args: &[RawArg],
) -> FormulaResult<Operand> {
    let criteria_grid = grid_of(ctx, &args[0])?;
    let criteria_value = match args.get(1) {
        Some(RawArg::Operand(op)) => {
            let extracted = ctx.retrieve(op.clone())?;
            extracted
                .value
                .first_element()
                .cloned()
                .unwrap_or(Value::Blank)
        }
        _ => Value::Number(0.0),
    };
    let matcher = CriteriaMatcher::new(&criteria_value);

    let sum_grid = match args.get(2) {
        None | Some(RawArg::Omitted) => None,
        Some(RawArg::Operand(op)) => Some(projected_grid(ctx, op, &criteria_grid)?),
    };

    let mut total = 0.0;
    for (r, row) in criteria_grid.iter().enumerate() {
        for (c, value) in row.iter().enumerate() {
            if !matcher.matches(value) {
                continue;
            }
            let contribution = match &sum_grid {
                None => value,
                Some(grid) => grid.get(r).and_then(|row| row.get(c)).unwrap_or(&Value::Blank),
            };
            match contribution {
                Value::Number(n) => total += n,
                Value::Error(e) => return Err(FormulaError::Excel(*e)),
                _ => {}
            }
        }
    }
    Ok(Operand::Value(Value::Number(total)))
}

/// Resolve a raw argument to a 2D grid of values.
fn grid_of(ctx: &mut dyn FunctionContext, arg: &RawArg) -> FormulaResult<Vec<Vec<Value>>> {
    match arg {
        RawArg::Omitted => Err(FormulaError::Excel(ExcelError::Value)),
        RawArg::Operand(op) => {
            let extracted = ctx.retrieve(op.clone())?;
            Ok(match extracted.value {
                Value::Array(rows) => rows,
                scalar => vec![vec![scalar]],
            })
        }
    }
}

/// Re-dimension a sum range to the criteria range's shape, anchored at the
/// sum range's top-left corner.
fn projected_grid(
    ctx: &mut dyn FunctionContext,
    operand: &Operand,
    shape: &[Vec<Value>],
) -> FormulaResult<Vec<Vec<Value>>> {
    let height = shape.len() as u32;
    let width = shape.first().map_or(0, |row| row.len()) as u32;
    match operand {
        Operand::Reference(reference) => {
            let (sheet, row, col) = match reference {
                Reference::Cell(c) => (c.sheet.clone(), c.row, c.col),
                Reference::Range(r) => {
                    let (r1, c1, _, _) = r.bounds();
                    (r.sheet.clone(), r1, c1)
                }
                _ => return Err(FormulaError::Excel(ExcelError::Value)),
            };
            let projected = Reference::Range(RangeRef {
                sheet,
                from: Coord::new(row, col),
                to: Coord::new(row + height - 1, col + width - 1),
            });
            grid_of(ctx, &RawArg::Operand(Operand::Reference(projected)))
        }
        other => grid_of(ctx, &RawArg::Operand(other.clone())),
    }
}
