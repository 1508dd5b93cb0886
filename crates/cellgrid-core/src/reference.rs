//! Cell and range references
//!
//! All coordinates are 1-based, matching Excel conventions. A reference may
//! be a single cell, a rectangular range, or a whole row/column (the latter
//! two expand to the sheet bounds when merged into a range).

use std::fmt;

/// Maximum row number (Excel sheet height).
pub const MAX_ROW: u32 = 1_048_576;

/// Maximum column number (Excel sheet width, column XFD).
pub const MAX_COLUMN: u32 = 16_384;

/// The coordinate a formula is evaluated at.
///
/// Supplied by the caller per parse call and held immutable for the duration
/// of that call; position-dependent functions such as `ROW()` read it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Position {
    pub sheet: Option<String>,
    pub row: u32,
    pub col: u32,
}

impl Position {
    pub fn new(row: u32, col: u32) -> Self {
        Self {
            sheet: None,
            row,
            col,
        }
    }

    pub fn with_sheet<S: Into<String>>(sheet: S, row: u32, col: u32) -> Self {
        Self {
            sheet: Some(sheet.into()),
            row,
            col,
        }
    }
}

/// A single cell reference, optionally sheet-qualified.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CellRef {
    pub sheet: Option<String>,
    pub row: u32,
    pub col: u32,
}

impl CellRef {
    pub fn new(row: u32, col: u32) -> Self {
        Self {
            sheet: None,
            row,
            col,
        }
    }
}

impl fmt::Display for CellRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(sheet) = &self.sheet {
            write!(f, "{}!", sheet)?;
        }
        write!(f, "{}{}", column_number_to_name(self.col), self.row)
    }
}

/// A corner of a range.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Coord {
    pub row: u32,
    pub col: u32,
}

impl Coord {
    pub fn new(row: u32, col: u32) -> Self {
        Self { row, col }
    }
}

/// A rectangular range reference, optionally sheet-qualified.
///
/// The corners are not required to be normalized; consumers take min/max.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RangeRef {
    pub sheet: Option<String>,
    pub from: Coord,
    pub to: Coord,
}

impl RangeRef {
    pub fn new(from: Coord, to: Coord) -> Self {
        Self {
            sheet: None,
            from,
            to,
        }
    }

    /// Normalized bounds as (min_row, min_col, max_row, max_col).
    pub fn bounds(&self) -> (u32, u32, u32, u32) {
        (
            self.from.row.min(self.to.row),
            self.from.col.min(self.to.col),
            self.from.row.max(self.to.row),
            self.from.col.max(self.to.col),
        )
    }

    /// Number of rows spanned.
    pub fn height(&self) -> u32 {
        let (r1, _, r2, _) = self.bounds();
        r2 - r1 + 1
    }

    /// Number of columns spanned.
    pub fn width(&self) -> u32 {
        let (_, c1, _, c2) = self.bounds();
        c2 - c1 + 1
    }
}

impl fmt::Display for RangeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(sheet) = &self.sheet {
            write!(f, "{}!", sheet)?;
        }
        let (r1, c1, r2, c2) = self.bounds();
        write!(
            f,
            "{}{}:{}{}",
            column_number_to_name(c1),
            r1,
            column_number_to_name(c2),
            r2
        )
    }
}

/// Any reference a formula expression can produce.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reference {
    Cell(CellRef),
    Range(RangeRef),
    /// A whole-row reference, e.g. the `3` side of `3:5`.
    WholeRow { sheet: Option<String>, row: u32 },
    /// A whole-column reference, e.g. the `A` side of `A:C`.
    WholeCol { sheet: Option<String>, col: u32 },
}

impl Reference {
    /// The sheet qualifier, if any.
    pub fn sheet(&self) -> Option<&str> {
        match self {
            Reference::Cell(c) => c.sheet.as_deref(),
            Reference::Range(r) => r.sheet.as_deref(),
            Reference::WholeRow { sheet, .. } | Reference::WholeCol { sheet, .. } => {
                sheet.as_deref()
            }
        }
    }

    /// Set (overwrite) the sheet qualifier.
    pub fn set_sheet(&mut self, name: String) {
        match self {
            Reference::Cell(c) => c.sheet = Some(name),
            Reference::Range(r) => r.sheet = Some(name),
            Reference::WholeRow { sheet, .. } | Reference::WholeCol { sheet, .. } => {
                *sheet = Some(name)
            }
        }
    }
}

/// Convert a column name to its 1-based number (`A` → 1, `XFD` → 16384).
pub fn column_name_to_number(name: &str) -> Option<u32> {
    if name.is_empty() {
        return None;
    }
    let mut col: u32 = 0;
    for c in name.chars() {
        if !c.is_ascii_alphabetic() {
            return None;
        }
        let digit = (c.to_ascii_uppercase() as u32) - ('A' as u32) + 1;
        col = col.checked_mul(26)?.checked_add(digit)?;
    }
    Some(col)
}

/// Convert a 1-based column number to its name (1 → `A`, 16384 → `XFD`).
pub fn column_number_to_name(mut col: u32) -> String {
    let mut name = String::new();
    while col > 0 {
        let rem = (col - 1) % 26;
        name.insert(0, (b'A' + rem as u8) as char);
        col = (col - 1) / 26;
    }
    name
}

/// Parse an A1-style cell address such as `A1`, `$B$2` or `xfd1048576`.
///
/// `$` anchors are accepted and discarded; anchoring does not affect
/// evaluation.
pub fn parse_cell_address(address: &str) -> Option<CellRef> {
    let rest = address.strip_prefix('$').unwrap_or(address);

    let letters_end = rest
        .find(|c: char| !c.is_ascii_alphabetic())
        .unwrap_or(rest.len());
    if letters_end == 0 || letters_end > 3 {
        return None;
    }
    let (letters, rest) = rest.split_at(letters_end);

    let digits = rest.strip_prefix('$').unwrap_or(rest);
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    if digits.starts_with('0') {
        return None;
    }

    let col = column_name_to_number(letters)?;
    let row: u32 = digits.parse().ok()?;
    Some(CellRef::new(row, col))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_column_name_round_trip() {
        assert_eq!(column_name_to_number("A"), Some(1));
        assert_eq!(column_name_to_number("Z"), Some(26));
        assert_eq!(column_name_to_number("AA"), Some(27));
        assert_eq!(column_name_to_number("XFD"), Some(MAX_COLUMN));
        assert_eq!(column_number_to_name(1), "A");
        assert_eq!(column_number_to_name(26), "Z");
        assert_eq!(column_number_to_name(27), "AA");
        assert_eq!(column_number_to_name(MAX_COLUMN), "XFD");
    }

    #[test]
    fn test_parse_cell_address() {
        assert_eq!(parse_cell_address("A1"), Some(CellRef::new(1, 1)));
        assert_eq!(parse_cell_address("$B$2"), Some(CellRef::new(2, 2)));
        assert_eq!(parse_cell_address("b10"), Some(CellRef::new(10, 2)));
        assert_eq!(
            parse_cell_address("XFD1048576"),
            Some(CellRef::new(MAX_ROW, MAX_COLUMN))
        );
        assert_eq!(parse_cell_address("A0"), None);
        assert_eq!(parse_cell_address("1A"), None);
        assert_eq!(parse_cell_address(""), None);
    }

    #[test]
    fn test_range_bounds_normalize() {
        let r = RangeRef::new(Coord::new(5, 3), Coord::new(2, 7));
        assert_eq!(r.bounds(), (2, 3, 5, 7));
        assert_eq!(r.height(), 4);
        assert_eq!(r.width(), 5);
    }

    #[test]
    fn test_set_sheet_overwrites() {
        let mut r = Reference::Cell(CellRef::new(1, 1));
        r.set_sheet("Sheet1".into());
        assert_eq!(r.sheet(), Some("Sheet1"));
        r.set_sheet("Sheet2".into());
        assert_eq!(r.sheet(), Some("Sheet2"));
    }
}
