//! End-to-end formula evaluation against a small in-memory data source

use cellgrid_formula::{
    CellRef, DataSource, DepParser, ErrorLocation, ExcelError, FormulaEngine, FormulaError,
    Position, RangeRef, Reference, Value,
};

/// A fixed sheet: A1=1, A2=2, A3=3, B1="x", everything else blank.
struct Sheet;

impl Sheet {
    fn value_at(&self, row: u32, col: u32) -> Value {
        match (row, col) {
            (1, 1) => Value::Number(1.0),
            (2, 1) => Value::Number(2.0),
            (3, 1) => Value::Number(3.0),
            (1, 2) => Value::text("x"),
            _ => Value::Blank,
        }
    }
}

impl DataSource for Sheet {
    fn cell(&self, reference: &CellRef) -> Value {
        self.value_at(reference.row, reference.col)
    }

    fn range(&self, reference: &RangeRef) -> Vec<Vec<Value>> {
        let (r1, c1, r2, c2) = reference.bounds();
        (r1..=r2)
            .map(|r| (c1..=c2).map(|c| self.value_at(r, c)).collect())
            .collect()
    }
}

fn engine() -> FormulaEngine {
    FormulaEngine::new(Box::new(Sheet))
}

/// Operator precedence: multiplication binds tighter than addition.
#[test]
fn test_arithmetic_precedence() {
    let mut e = engine();
    assert_eq!(e.parse("=1+2*3", None, false).unwrap(), Value::Number(7.0));
    assert_eq!(e.parse("=(1+2)*3", None, false).unwrap(), Value::Number(9.0));
}

/// SUM over a range pulls the range's values from the data source.
#[test]
fn test_sum_over_range() {
    let mut e = engine();
    assert_eq!(
        e.parse("=SUM(A1:A3)", None, false).unwrap(),
        Value::Number(6.0)
    );
}

/// Percent literals divide by 100; division by zero is a value-level error.
#[test]
fn test_percent_and_div0() {
    let mut e = engine();
    assert_eq!(e.parse("=50%", None, false).unwrap(), Value::Number(0.5));
    assert_eq!(
        e.parse("=10/0", None, false).unwrap(),
        Value::Error(ExcelError::Div0)
    );
}

/// Blank cells coerce to 0 in arithmetic but to "" in concatenation.
#[test]
fn test_blank_coercion_depends_on_operator() {
    let mut e = engine();
    assert_eq!(e.parse("=Z9+5", None, false).unwrap(), Value::Number(5.0));
    assert_eq!(
        e.parse("=Z9&\"x\"", None, false).unwrap(),
        Value::text("x")
    );
}

/// Mixed-type comparison ranks every text above every number.
#[test]
fn test_mixed_type_comparison() {
    let mut e = engine();
    assert_eq!(
        e.parse("=100<\"1\"", None, false).unwrap(),
        Value::Bool(true)
    );
    assert_eq!(
        e.parse("=100=\"100\"", None, false).unwrap(),
        Value::Bool(false)
    );
    assert_eq!(
        e.parse("=100<>\"100\"", None, false).unwrap(),
        Value::Bool(true)
    );
}

/// IF picks branches; a blank condition is falsy.
#[test]
fn test_if_branches() {
    let mut e = engine();
    assert_eq!(
        e.parse("=IF(TRUE,1,0)", None, false).unwrap(),
        Value::Number(1.0)
    );
    assert_eq!(
        e.parse("=IF(Z9,\"yes\",\"no\")", None, false).unwrap(),
        Value::text("no")
    );
}

/// An omitted argument slot reads as 0 for numeric families, "" for text,
/// and a falsy condition for IF.
#[test]
fn test_omitted_argument_substitution() {
    let mut e = engine();
    assert_eq!(
        e.parse("=ROUND(2.567,)", None, false).unwrap(),
        Value::Number(3.0)
    );
    assert_eq!(
        e.parse("=CONCATENATE(\"a\",)", None, false).unwrap(),
        Value::text("a")
    );
    assert_eq!(
        e.parse("=IF(,1,2)", None, false).unwrap(),
        Value::Number(2.0)
    );
}

/// INDIRECT builds whole-row and whole-column references from text; they
/// answer shape questions but cannot be materialized as data.
#[test]
fn test_indirect_whole_row_and_column() {
    let mut e = engine();
    assert_eq!(
        e.parse("=ISREF(INDIRECT(\"3:3\"))", None, false).unwrap(),
        Value::Bool(true)
    );
    assert_eq!(
        e.parse("=ROWS(INDIRECT(\"B:B\"))", None, false).unwrap(),
        Value::Number(1_048_576.0)
    );
    assert_eq!(
        e.parse("=SUM(INDIRECT(\"3:3\"))", None, false).unwrap(),
        Value::Error(ExcelError::Ref)
    );
}

/// Concatenation formats numbers and booleans the way Excel displays them.
#[test]
fn test_concatenation_display() {
    let mut e = engine();
    assert_eq!(
        e.parse("=\"n=\"&3&\", \"&TRUE", None, false).unwrap(),
        Value::text("n=3, TRUE")
    );
}

/// A trailing unmatched token reports its exact 1-based position.
#[test]
fn test_parse_error_location() {
    let mut e = engine();
    let err = e.parse("=SUM(1))", None, false).unwrap_err();
    match err {
        FormulaError::Parse { location, .. } => {
            assert_eq!(location, ErrorLocation { line: 1, column: 7 });
        }
        other => panic!("expected parse error, got {other:?}"),
    }
}

/// The range operator folds chained references into one bounding range.
#[test]
fn test_range_operator_folds() {
    let mut e = engine();
    // A1:A3:A2 still covers A1 through A3
    assert_eq!(
        e.parse("=SUM(A1:A3:A2)", None, false).unwrap(),
        Value::Number(6.0)
    );
}

/// Dependency extraction finds every reference; it takes no data source.
#[test]
fn test_dependency_extraction() {
    let mut p = DepParser::new();
    let deps = p.parse("=SUM(A1:A3)+B1*2", None, false).unwrap();
    assert_eq!(
        deps,
        vec![
            Reference::Range(RangeRef::new(
                cellgrid_formula::Coord::new(1, 1),
                cellgrid_formula::Coord::new(3, 1),
            )),
            Reference::Cell(CellRef::new(1, 2)),
        ]
    );
}

/// A range-of-ranges dependency collapses to a single bounding range.
#[test]
fn test_dependency_range_chain_collapses() {
    let mut p = DepParser::new();
    let deps = p.parse("=A1:B1:A1", None, false).unwrap();
    assert_eq!(
        deps,
        vec![Reference::Range(RangeRef::new(
            cellgrid_formula::Coord::new(1, 1),
            cellgrid_formula::Coord::new(1, 2),
        ))]
    );
}

/// Formula position feeds positional functions and sheet defaults.
#[test]
fn test_position_flows_through() {
    let mut e = engine();
    let pos = Position::with_sheet("Sheet1", 4, 2);
    assert_eq!(
        e.parse("=ROW()+COLUMN()", Some(pos), false).unwrap(),
        Value::Number(6.0)
    );
}

/// Custom synchronous function registered on the engine.
#[test]
fn test_custom_function() {
    let mut e = engine();
    e.set_function("DOUBLE", |args| {
        Ok(Value::Number(args[0].number()? * 2.0))
    });
    assert_eq!(
        e.parse("=DOUBLE(A2)", None, false).unwrap(),
        Value::Number(4.0)
    );
}

/// Custom asynchronous function awaited through parse_async.
#[tokio::test]
async fn test_custom_async_function() {
    let mut e = engine();
    e.set_async_function("FETCH", |args| {
        Box::pin(async move {
            let base = args[0].number()?;
            Ok(Value::Number(base + 100.0))
        })
    });
    assert_eq!(
        e.parse_async("=FETCH(A1)+1", None, false).await.unwrap(),
        Value::Number(102.0)
    );
    // the synchronous path refuses async functions outright
    assert!(e.parse("=FETCH(A1)", None, false).is_err());
}

/// Async evaluation matches the synchronous result for ordinary formulas.
#[tokio::test]
async fn test_async_matches_sync() {
    let mut e = engine();
    let sync = e.parse("=SUM(A1:A3)*2+LEN(B1)", None, false).unwrap();
    let with_await = e
        .parse_async("=SUM(A1:A3)*2+LEN(B1)", None, false)
        .await
        .unwrap();
    assert_eq!(sync, with_await);
    assert_eq!(sync, Value::Number(13.0));
}
