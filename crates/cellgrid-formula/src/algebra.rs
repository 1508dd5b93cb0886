//! Reference algebra and operator semantics
//!
//! Operators work on [`Operand`]s: a plain value, an unresolved reference,
//! or a union collection. References stay unresolved as long as possible so
//! that `A1:B2 C2:D3` can intersect spatially; value operators resolve them
//! at the last moment through a [`Resolver`].
//!
//! Error values thread through operators without unwinding: `#REF! + 1` is
//! `#REF!`, and when both sides are errors the left one wins.

use crate::ast::{InfixOp, Sign};
use crate::error::{FormulaError, FormulaResult};
use cellgrid_core::{
    CellRef, Collection, Coord, ExcelError, RangeRef, Reference, Value, MAX_COLUMN, MAX_ROW,
};

/// An intermediate evaluation result.
#[derive(Debug, Clone, PartialEq)]
pub enum Operand {
    Value(Value),
    Reference(Reference),
    Collection(Collection),
}

impl Operand {
    /// The error code if this operand is an error value.
    pub fn as_error(&self) -> Option<ExcelError> {
        match self {
            Operand::Value(v) => v.as_error(),
            _ => None,
        }
    }

    pub fn reference(&self) -> Option<&Reference> {
        match self {
            Operand::Reference(r) => Some(r),
            _ => None,
        }
    }
}

impl From<Value> for Operand {
    fn from(v: Value) -> Self {
        Operand::Value(v)
    }
}

/// Resolves references to the values behind them. Implemented by the
/// evaluation contexts; the compute context reads the data source, the
/// dependency context records the reference and fabricates a zero.
pub trait Resolver {
    fn retrieve_reference(&mut self, reference: &Reference) -> FormulaResult<Value>;
}

/// A resolved operand, remembering whether the raw operand was an array
/// *literal*. Literal arrays collapse to their top-left element inside
/// scalar operators; a 2D value that came out of a range reference instead
/// only collapses when it is a single column wide.
#[derive(Debug, Clone, PartialEq)]
pub struct Extracted {
    pub value: Value,
    pub from_literal_array: bool,
}

/// Throw away the reference and retrieve the value behind the operand.
pub fn extract_ref_value(
    resolver: &mut dyn Resolver,
    operand: Operand,
) -> FormulaResult<Extracted> {
    match operand {
        Operand::Value(value) => {
            let from_literal_array = matches!(value, Value::Array(_));
            Ok(Extracted {
                value,
                from_literal_array,
            })
        }
        Operand::Reference(reference) => Ok(Extracted {
            value: resolver.retrieve_reference(&reference)?,
            from_literal_array: false,
        }),
        // Union collections have no scalar meaning; hand the member values
        // over as a single row so aggregates can still consume them.
        Operand::Collection(collection) => Ok(Extracted {
            value: Value::Array(vec![collection.values().cloned().collect()]),
            from_literal_array: false,
        }),
    }
}

/// Coerce a value to a number the way operators do: blank is 0, booleans
/// are 1/0, text is parsed, errors pass through as `Err`.
pub fn coerce_number(value: &Value, from_literal_array: bool) -> Result<f64, ExcelError> {
    match value {
        Value::Blank => Ok(0.0),
        Value::Number(n) => Ok(*n),
        Value::Bool(b) => Ok(if *b { 1.0 } else { 0.0 }),
        Value::Text(s) => {
            let trimmed = s.trim();
            if trimmed.is_empty() {
                Ok(0.0)
            } else {
                trimmed.parse().map_err(|_| ExcelError::Value)
            }
        }
        Value::Array(rows) => {
            // Literal arrays always give up their top-left element; range
            // values only when a single column wide.
            let single_column = rows.first().is_some_and(|row| row.len() == 1);
            if from_literal_array || single_column {
                match value.first_element() {
                    Some(first) => coerce_number(first, from_literal_array),
                    None => Err(ExcelError::Value),
                }
            } else {
                Err(ExcelError::Value)
            }
        }
        Value::Error(e) => Err(*e),
    }
}

/// Apply a stack of unary signs: `--1`, `-A1`.
pub fn apply_prefix(
    resolver: &mut dyn Resolver,
    signs: &[Sign],
    operand: Operand,
) -> FormulaResult<Value> {
    let extracted = extract_ref_value(resolver, operand)?;
    let mut value = extracted.value;
    if value.is_error() {
        return Ok(value);
    }
    if value.is_blank() {
        value = Value::Number(0.0);
    }
    let negative = signs.iter().filter(|s| **s == Sign::Minus).count() % 2 == 1;
    if !negative {
        // a positive sign leaves the value untouched, text included
        return Ok(value);
    }
    match coerce_number(&value, extracted.from_literal_array) {
        Ok(n) => Ok(Value::Number(-n)),
        Err(_) => {
            // a multi-column array falls back to its top-left element
            if let Value::Array(_) = value {
                match value.first_element() {
                    Some(Value::Number(n)) => Ok(Value::Number(-n)),
                    _ => Ok(Value::Error(ExcelError::Value)),
                }
            } else {
                Ok(Value::Error(ExcelError::Value))
            }
        }
    }
}

/// Apply the `%` postfix: divide by 100.
pub fn apply_percent(resolver: &mut dyn Resolver, operand: Operand) -> FormulaResult<Value> {
    let extracted = extract_ref_value(resolver, operand)?;
    if extracted.value.is_error() {
        return Ok(extracted.value);
    }
    match coerce_number(&extracted.value, extracted.from_literal_array) {
        Ok(n) => Ok(Value::Number(n / 100.0)),
        Err(e) => Ok(Value::Error(e)),
    }
}

/// Apply one binary operator to two operands. Error values short-circuit,
/// left side first.
pub fn apply_infix(
    resolver: &mut dyn Resolver,
    left: Operand,
    op: InfixOp,
    right: Operand,
) -> FormulaResult<Value> {
    let left = extract_ref_value(resolver, left)?;
    let right = extract_ref_value(resolver, right)?;
    if let Some(e) = left.value.as_error() {
        return Ok(Value::Error(e));
    }
    if let Some(e) = right.value.as_error() {
        return Ok(Value::Error(e));
    }
    match op {
        InfixOp::Pow | InfixOp::Mul | InfixOp::Div | InfixOp::Add | InfixOp::Sub => {
            let a = match coerce_number(&left.value, left.from_literal_array) {
                Ok(n) => n,
                Err(e) => return Ok(Value::Error(e)),
            };
            let b = match coerce_number(&right.value, right.from_literal_array) {
                Ok(n) => n,
                Err(e) => return Ok(Value::Error(e)),
            };
            let result = match op {
                InfixOp::Add => a + b,
                InfixOp::Sub => a - b,
                InfixOp::Mul => a * b,
                InfixOp::Div => {
                    if b == 0.0 {
                        return Ok(Value::Error(ExcelError::Div0));
                    }
                    a / b
                }
                InfixOp::Pow => a.powf(b),
                _ => unreachable!(),
            };
            Ok(Value::Number(result))
        }
        InfixOp::Concat => {
            let a = concat_text(collapse_array(left.value));
            let b = concat_text(collapse_array(right.value));
            Ok(Value::Text(a + &b))
        }
        InfixOp::Eq | InfixOp::Ne | InfixOp::Lt | InfixOp::Le | InfixOp::Gt | InfixOp::Ge => {
            let a = compare_operand(collapse_array(left.value));
            let b = compare_operand(collapse_array(right.value));
            Ok(Value::Bool(compare(&a, op, &b)))
        }
    }
}

fn collapse_array(value: Value) -> Value {
    match value {
        Value::Array(_) => value.first_element().cloned().unwrap_or(Value::Blank),
        other => other,
    }
}

/// Concatenation treats blank as the empty string.
fn concat_text(value: Value) -> String {
    match value {
        Value::Blank => String::new(),
        other => other.to_string(),
    }
}

/// Comparison treats blank as the number zero.
fn compare_operand(value: Value) -> Value {
    match value {
        Value::Blank => Value::Number(0.0),
        other => other,
    }
}

/// A boolean outranks any string, a string outranks any number.
fn type_rank(value: &Value) -> u8 {
    match value {
        Value::Bool(_) => 3,
        Value::Text(_) => 2,
        _ => 1,
    }
}

fn compare(a: &Value, op: InfixOp, b: &Value) -> bool {
    use std::cmp::Ordering;
    let ordering: Option<Ordering> = match (a, b) {
        (Value::Number(x), Value::Number(y)) => x.partial_cmp(y),
        (Value::Text(x), Value::Text(y)) => Some(x.cmp(y)),
        (Value::Bool(x), Value::Bool(y)) => Some(x.cmp(y)),
        // mixed types compare by rank, never equal
        _ => {
            let (ra, rb) = (type_rank(a), type_rank(b));
            return match op {
                InfixOp::Eq => false,
                InfixOp::Ne => true,
                InfixOp::Gt => ra > rb,
                InfixOp::Lt => ra < rb,
                InfixOp::Ge => ra >= rb,
                InfixOp::Le => ra <= rb,
                _ => false,
            };
        }
    };
    match op {
        InfixOp::Eq => ordering == Some(Ordering::Equal),
        InfixOp::Ne => ordering != Some(Ordering::Equal),
        InfixOp::Gt => ordering == Some(Ordering::Greater),
        InfixOp::Lt => ordering == Some(Ordering::Less),
        InfixOp::Ge => matches!(ordering, Some(Ordering::Greater | Ordering::Equal)),
        InfixOp::Le => matches!(ordering, Some(Ordering::Less | Ordering::Equal)),
        _ => false,
    }
}

/// Fold a flat operator chain one precedence tier at a time. Operands are
/// already evaluated left-to-right; this only decides grouping.
pub fn fold_infix_chain(
    resolver: &mut dyn Resolver,
    mut operands: Vec<Operand>,
    mut ops: Vec<InfixOp>,
) -> FormulaResult<Operand> {
    debug_assert_eq!(operands.len(), ops.len() + 1);
    for tier in 1..=InfixOp::TIERS {
        let mut i = 0;
        while i < ops.len() {
            if ops[i].tier() == tier {
                let right = operands.remove(i + 1);
                let left = std::mem::replace(&mut operands[i], Operand::Value(Value::Blank));
                let value = apply_infix(resolver, left, ops[i], right)?;
                operands[i] = Operand::Value(value);
                ops.remove(i);
            } else {
                i += 1;
            }
        }
    }
    match operands.pop() {
        Some(operand) => Ok(operand),
        None => Err(FormulaError::Eval("empty operator chain".into())),
    }
}

/// Merge `:`-joined operands into their bounding range.
///
/// Bare numbers are whole rows (`1:3`), bare columns whole columns (`A:C`);
/// either side expands the box to the full sheet extent on that axis. Error
/// operands are skipped; if nothing but errors remains, the first error is
/// the result. The merged reference carries no sheet, a surrounding sheet
/// prefix reattaches one.
pub fn apply_range(operands: Vec<Operand>) -> FormulaResult<Operand> {
    let mut min_row = u32::MAX;
    let mut max_row = 0u32;
    let mut min_col = u32::MAX;
    let mut max_col = 0u32;
    let mut first_error: Option<ExcelError> = None;
    let mut saw_reference = false;

    let mut cover_row = |row: u32| {
        min_row = min_row.min(row);
        max_row = max_row.max(row);
    };
    let mut cover_col = |col: u32| {
        min_col = min_col.min(col);
        max_col = max_col.max(col);
    };

    for operand in operands {
        match operand {
            Operand::Value(Value::Error(e)) => {
                first_error.get_or_insert(e);
            }
            Operand::Value(Value::Number(n)) => {
                if n.fract() != 0.0 || n < 1.0 {
                    return Err(FormulaError::Eval("row number must be an integer".into()));
                }
                saw_reference = true;
                cover_row(n as u32);
                cover_col(1);
                cover_col(MAX_COLUMN);
            }
            Operand::Reference(Reference::Cell(cell)) => {
                saw_reference = true;
                cover_row(cell.row);
                cover_col(cell.col);
            }
            Operand::Reference(Reference::Range(range)) => {
                saw_reference = true;
                let (r1, c1, r2, c2) = range.bounds();
                cover_row(r1);
                cover_row(r2);
                cover_col(c1);
                cover_col(c2);
            }
            Operand::Reference(Reference::WholeRow { row, .. }) => {
                saw_reference = true;
                cover_row(row);
                cover_col(1);
                cover_col(MAX_COLUMN);
            }
            Operand::Reference(Reference::WholeCol { col, .. }) => {
                saw_reference = true;
                cover_col(col);
                cover_row(1);
                cover_row(MAX_ROW);
            }
            _ => {
                return Err(FormulaError::Eval(
                    "expecting a reference in a range expression".into(),
                ))
            }
        }
    }

    if !saw_reference {
        if let Some(e) = first_error {
            return Ok(Operand::Value(Value::Error(e)));
        }
        return Err(FormulaError::Eval(
            "expecting a reference in a range expression".into(),
        ));
    }

    Ok(reduce_box(None, min_row, min_col, max_row, max_col))
}

/// Intersect references spatially: `A1:B3 B2:C4` is `B2:B3`.
///
/// The first operand picks the sheet; a mismatched sheet or an empty
/// overlap yields `#NULL!`. Whole rows and columns cannot be intersected.
/// An error operand is returned as the result, the first one seen.
pub fn apply_intersect(operands: Vec<Operand>) -> FormulaResult<Operand> {
    let mut iter = operands.into_iter();
    let first = match iter.next() {
        Some(operand) => operand,
        None => return Err(FormulaError::Eval("intersection needs operands".into())),
    };

    if let Some(e) = first.as_error() {
        return Ok(Operand::Value(Value::Error(e)));
    }
    let (sheet, mut min_row, mut min_col, mut max_row, mut max_col) = intersect_box(&first)?;

    for operand in iter {
        if let Some(e) = operand.as_error() {
            return Ok(Operand::Value(Value::Error(e)));
        }
        let (other_sheet, r1, c1, r2, c2) = intersect_box(&operand)?;
        if sheet != other_sheet || r1 > max_row || r2 < min_row || c1 > max_col || c2 < min_col {
            return Ok(Operand::Value(Value::Error(ExcelError::Null)));
        }
        min_row = min_row.max(r1);
        max_row = max_row.min(r2);
        min_col = min_col.max(c1);
        max_col = max_col.min(c2);
    }

    Ok(reduce_box(sheet, min_row, min_col, max_row, max_col))
}

/// The normalized bounding box of a cell or range operand; whole rows and
/// columns are rejected.
fn intersect_box(operand: &Operand) -> FormulaResult<(Option<String>, u32, u32, u32, u32)> {
    match operand {
        Operand::Reference(Reference::Cell(cell)) => Ok((
            cell.sheet.clone(),
            cell.row,
            cell.col,
            cell.row,
            cell.col,
        )),
        Operand::Reference(Reference::Range(range)) => {
            let (r1, c1, r2, c2) = range.bounds();
            Ok((range.sheet.clone(), r1, c1, r2, c2))
        }
        Operand::Reference(_) => Err(FormulaError::Eval(
            "cannot intersect the whole row or column".into(),
        )),
        _ => Err(FormulaError::Eval(
            "expecting a reference in an intersection".into(),
        )),
    }
}

fn reduce_box(sheet: Option<String>, min_row: u32, min_col: u32, max_row: u32, max_col: u32) -> Operand {
    if min_row == max_row && min_col == max_col {
        Operand::Reference(Reference::Cell(CellRef {
            sheet,
            row: min_row,
            col: min_col,
        }))
    } else {
        Operand::Reference(Reference::Range(RangeRef {
            sheet,
            from: Coord::new(min_row, min_col),
            to: Coord::new(max_row, max_col),
        }))
    }
}

/// Build a union collection from a parenthesized comma list. References are
/// resolved eagerly; each member keeps its source reference. An error
/// operand becomes the whole result.
pub fn apply_union(resolver: &mut dyn Resolver, operands: Vec<Operand>) -> FormulaResult<Operand> {
    let mut collection = Collection::new();
    for operand in operands {
        if let Some(e) = operand.as_error() {
            return Ok(Operand::Value(Value::Error(e)));
        }
        let source = operand.reference().cloned();
        let extracted = extract_ref_value(resolver, operand)?;
        collection.add(extracted.value, source);
    }
    Ok(Operand::Collection(collection))
}
