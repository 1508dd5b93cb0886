//! Reference and lookup functions
//!
//! These work on raw operands so the reference itself survives: `ROW(A3)`
//! never reads cell data, `OFFSET` and `INDEX` return references that an
//! enclosing expression can keep narrowing.

use super::{Argument, FunctionContext};
use crate::algebra::{coerce_number, Operand};
use crate::error::{FormulaError, FormulaResult};
use crate::evaluator::RawArg;
use cellgrid_core::{
    column_name_to_number, parse_cell_address, CellRef, Coord, ExcelError, RangeRef, Reference,
    Value, MAX_COLUMN, MAX_ROW,
};

pub(super) fn fn_row(ctx: &mut dyn FunctionContext, args: &[RawArg]) -> FormulaResult<Operand> {
    axis_of(ctx, args, Axis::Row)
}

pub(super) fn fn_column(ctx: &mut dyn FunctionContext, args: &[RawArg]) -> FormulaResult<Operand> {
    axis_of(ctx, args, Axis::Col)
}

enum Axis {
    Row,
    Col,
}

fn axis_of(ctx: &mut dyn FunctionContext, args: &[RawArg], axis: Axis) -> FormulaResult<Operand> {
    let n = match args.first() {
        None | Some(RawArg::Omitted) => {
            let position = ctx.position().ok_or_else(|| {
                FormulaError::Eval("ROW/COLUMN without an argument needs a position".into())
            })?;
            match axis {
                Axis::Row => position.row,
                Axis::Col => position.col,
            }
        }
        Some(RawArg::Operand(Operand::Reference(reference))) => match (reference, &axis) {
            (Reference::Cell(c), Axis::Row) => c.row,
            (Reference::Cell(c), Axis::Col) => c.col,
            (Reference::Range(r), Axis::Row) => r.bounds().0,
            (Reference::Range(r), Axis::Col) => r.bounds().1,
            (Reference::WholeRow { row, .. }, Axis::Row) => *row,
            (Reference::WholeCol { col, .. }, Axis::Col) => *col,
            _ => return Err(ExcelError::Value.into()),
        },
        Some(RawArg::Operand(_)) => return Err(ExcelError::Value.into()),
    };
    Ok(Operand::Value(Value::Number(n as f64)))
}

pub(super) fn fn_rows(_ctx: &mut dyn FunctionContext, args: &[RawArg]) -> FormulaResult<Operand> {
    extent_of(args, Axis::Row)
}

pub(super) fn fn_columns(
    _ctx: &mut dyn FunctionContext,
    args: &[RawArg],
) -> FormulaResult<Operand> {
    extent_of(args, Axis::Col)
}

fn extent_of(args: &[RawArg], axis: Axis) -> FormulaResult<Operand> {
    let n: u32 = match &args[0] {
        RawArg::Operand(Operand::Reference(reference)) => match (reference, &axis) {
            (Reference::Cell(_), _) => 1,
            (Reference::Range(r), Axis::Row) => r.height(),
            (Reference::Range(r), Axis::Col) => r.width(),
            (Reference::WholeRow { .. }, Axis::Row) => 1,
            (Reference::WholeRow { .. }, Axis::Col) => MAX_COLUMN,
            (Reference::WholeCol { .. }, Axis::Row) => MAX_ROW,
            (Reference::WholeCol { .. }, Axis::Col) => 1,
        },
        RawArg::Operand(Operand::Value(Value::Array(rows))) => match axis {
            Axis::Row => rows.len() as u32,
            Axis::Col => rows.first().map_or(0, |row| row.len()) as u32,
        },
        _ => return Err(ExcelError::Value.into()),
    };
    Ok(Operand::Value(Value::Number(n as f64)))
}

/// `INDEX(reference, row, [col])`. On a range the result is a reference to
/// the picked cell (or a row/column slice when the index is 0); on an array
/// it is the element value.
pub(super) fn fn_index(ctx: &mut dyn FunctionContext, args: &[RawArg]) -> FormulaResult<Operand> {
    let mut row_num = raw_integer(ctx, args.get(1), 0)?;
    let mut col_num = raw_integer(ctx, args.get(2), 0)?;

    match &args[0] {
        RawArg::Operand(Operand::Reference(reference)) => {
            let (sheet, r1, c1, r2, c2) = match reference {
                Reference::Cell(c) => (c.sheet.clone(), c.row, c.col, c.row, c.col),
                Reference::Range(r) => {
                    let (r1, c1, r2, c2) = r.bounds();
                    (r.sheet.clone(), r1, c1, r2, c2)
                }
                _ => return Err(ExcelError::Ref.into()),
            };
            // a single-vector range indexed with one number walks the vector
            if args.len() == 2 {
                if r1 == r2 && c1 != c2 {
                    col_num = row_num;
                    row_num = 1;
                } else {
                    col_num = 1;
                }
            }
            let (row_from, row_to) = slice_axis(r1, r2, row_num)?;
            let (col_from, col_to) = slice_axis(c1, c2, col_num)?;
            Ok(make_reference(sheet, row_from, col_from, row_to, col_to))
        }
        RawArg::Operand(Operand::Value(Value::Array(rows))) => {
            let r = if row_num == 0 { 1 } else { row_num };
            let c = if col_num == 0 { 1 } else { col_num };
            if r < 1 || c < 1 {
                return Err(ExcelError::Value.into());
            }
            rows.get(r as usize - 1)
                .and_then(|row| row.get(c as usize - 1))
                .cloned()
                .map(Operand::Value)
                .ok_or_else(|| ExcelError::Ref.into())
        }
        RawArg::Operand(Operand::Value(value)) => {
            if row_num <= 1 && col_num <= 1 {
                Ok(Operand::Value(value.clone()))
            } else {
                Err(ExcelError::Ref.into())
            }
        }
        _ => Err(ExcelError::Value.into()),
    }
}

/// One axis of INDEX: 0 keeps the whole span, otherwise pick one slot.
fn slice_axis(from: u32, to: u32, index: i64) -> FormulaResult<(u32, u32)> {
    if index == 0 {
        return Ok((from, to));
    }
    if index < 0 || from as i64 + index - 1 > to as i64 {
        return Err(ExcelError::Ref.into());
    }
    let picked = from + index as u32 - 1;
    Ok((picked, picked))
}

/// `OFFSET(reference, rows, cols, [height], [width])`.
pub(super) fn fn_offset(ctx: &mut dyn FunctionContext, args: &[RawArg]) -> FormulaResult<Operand> {
    let (sheet, r1, c1, r2, c2) = match &args[0] {
        RawArg::Operand(Operand::Reference(Reference::Cell(c))) => {
            (c.sheet.clone(), c.row, c.col, c.row, c.col)
        }
        RawArg::Operand(Operand::Reference(Reference::Range(r))) => {
            let (r1, c1, r2, c2) = r.bounds();
            (r.sheet.clone(), r1, c1, r2, c2)
        }
        _ => return Err(ExcelError::Value.into()),
    };

    let row_shift = raw_integer(ctx, args.get(1), 0)?;
    let col_shift = raw_integer(ctx, args.get(2), 0)?;
    let height = raw_integer(ctx, args.get(3), (r2 - r1 + 1) as i64)?;
    let width = raw_integer(ctx, args.get(4), (c2 - c1 + 1) as i64)?;
    if height < 1 || width < 1 {
        return Err(ExcelError::Ref.into());
    }

    let top = r1 as i64 + row_shift;
    let left = c1 as i64 + col_shift;
    let bottom = top + height - 1;
    let right = left + width - 1;
    if top < 1 || left < 1 || bottom > MAX_ROW as i64 || right > MAX_COLUMN as i64 {
        return Err(ExcelError::Ref.into());
    }
    Ok(make_reference(
        sheet,
        top as u32,
        left as u32,
        bottom as u32,
        right as u32,
    ))
}

/// `CHOOSE(index, value1, ...)`.
pub(super) fn fn_choose(
    _ctx: &mut dyn FunctionContext,
    args: &[Argument],
) -> FormulaResult<Operand> {
    let index = args[0].integer()?;
    if index < 1 || index as usize >= args.len() {
        return Err(ExcelError::Value.into());
    }
    Ok(Operand::Value(args[index as usize].value.clone()))
}

/// `INDIRECT(ref_text)`: builds a reference from text such as `"B3"`,
/// `"A1:C4"`, `"Sheet2!A1"`, or whole rows/columns like `"3:3"` and `"A:C"`.
pub(super) fn fn_indirect(
    _ctx: &mut dyn FunctionContext,
    args: &[Argument],
) -> FormulaResult<Operand> {
    let text = args[0].text()?;
    parse_reference_text(&text)
        .map(Operand::Reference)
        .ok_or_else(|| ExcelError::Ref.into())
}

fn parse_reference_text(text: &str) -> Option<Reference> {
    let (sheet, address) = match text.rsplit_once('!') {
        Some((sheet, rest)) => {
            let sheet = sheet.trim_matches('\'');
            if sheet.is_empty() {
                return None;
            }
            (Some(sheet.to_string()), rest)
        }
        None => (None, text),
    };
    match address.split_once(':') {
        Some((from, to)) => {
            let (from, to) = (from.trim(), to.trim());
            if let Some(reference) = row_span(&sheet, from, to) {
                return Some(reference);
            }
            if let Some(reference) = column_span(&sheet, from, to) {
                return Some(reference);
            }
            let from = parse_cell_address(from)?;
            let to = parse_cell_address(to)?;
            Some(Reference::Range(RangeRef {
                sheet,
                from: Coord::new(from.row, from.col),
                to: Coord::new(to.row, to.col),
            }))
        }
        None => {
            let mut cell = parse_cell_address(address.trim())?;
            cell.sheet = sheet;
            Some(Reference::Cell(cell))
        }
    }
}

/// `"3:3"` is one whole row; `"2:5"` is the full-width box over rows 2-5.
fn row_span(sheet: &Option<String>, from: &str, to: &str) -> Option<Reference> {
    if !is_digits(from) || !is_digits(to) {
        return None;
    }
    let r1: u32 = from.parse().ok()?;
    let r2: u32 = to.parse().ok()?;
    if r1 < 1 || r2 < 1 || r1 > MAX_ROW || r2 > MAX_ROW {
        return None;
    }
    if r1 == r2 {
        Some(Reference::WholeRow {
            sheet: sheet.clone(),
            row: r1,
        })
    } else {
        Some(Reference::Range(RangeRef {
            sheet: sheet.clone(),
            from: Coord::new(r1.min(r2), 1),
            to: Coord::new(r1.max(r2), MAX_COLUMN),
        }))
    }
}

/// `"A:A"` is one whole column; `"B:D"` is the full-height box over B-D.
fn column_span(sheet: &Option<String>, from: &str, to: &str) -> Option<Reference> {
    let c1 = column_name_to_number(from)?;
    let c2 = column_name_to_number(to)?;
    if c1 > MAX_COLUMN || c2 > MAX_COLUMN {
        return None;
    }
    if c1 == c2 {
        Some(Reference::WholeCol {
            sheet: sheet.clone(),
            col: c1,
        })
    } else {
        Some(Reference::Range(RangeRef {
            sheet: sheet.clone(),
            from: Coord::new(1, c1.min(c2)),
            to: Coord::new(MAX_ROW, c1.max(c2)),
        }))
    }
}

fn is_digits(s: &str) -> bool {
    !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit())
}

fn raw_integer(
    ctx: &mut dyn FunctionContext,
    arg: Option<&RawArg>,
    default: i64,
) -> FormulaResult<i64> {
    match arg {
        None | Some(RawArg::Omitted) => Ok(default),
        Some(RawArg::Operand(op)) => {
            let extracted = ctx.retrieve(op.clone())?;
            let n = coerce_number(&extracted.value, extracted.from_literal_array)?;
            Ok(n.trunc() as i64)
        }
    }
}

fn make_reference(sheet: Option<String>, r1: u32, c1: u32, r2: u32, c2: u32) -> Operand {
    if r1 == r2 && c1 == c2 {
        Operand::Reference(Reference::Cell(CellRef {
            sheet,
            row: r1,
            col: c1,
        }))
    } else {
        Operand::Reference(Reference::Range(RangeRef {
            sheet,
            from: Coord::new(r1, c1),
            to: Coord::new(r2, c2),
        }))
    }
}
