//! Formula tokenizer
//!
//! Produces the token stream the parser consumes. Each token carries its
//! byte span in the source text; the spans are what make the
//! whitespace-sensitive intersection rule (`A1 B2`) and caret-annotated
//! error messages possible.

use crate::error::{ErrorLocation, FormulaError, FormulaResult};
use cellgrid_core::{column_name_to_number, parse_cell_address, CellRef, ExcelError};

/// A lexed token: type tag, plus start (inclusive) / end (exclusive) byte
/// offsets into the source.
#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub start: usize,
    pub end: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind {
    // Literals
    Number(f64),
    Str(String),
    Bool(bool),
    /// An error literal such as `#REF!` or `#DIV/0!`
    ErrLit(ExcelError),

    // References and identifiers
    /// A1-style cell address (`$` anchors already discarded)
    Cell(CellRef),
    /// Bare column letter(s) immediately followed by `:`, e.g. the `A` of `A:C`
    Column(u32),
    /// Defined name
    Name(String),
    /// Sheet-name prefix, `!` stripped and quote escapes resolved
    Sheet(String),
    /// Function name with its opening paren consumed, e.g. `SUM(`
    Function(String),

    // Operators
    Plus,
    Minus,
    Star,
    Slash,
    Caret,
    Percent,
    Ampersand,
    Equal,
    NotEqual,
    LessThan,
    LessEqual,
    GreaterThan,
    GreaterEqual,

    // Punctuation
    Colon,
    Comma,
    Semicolon,
    OpenParen,
    CloseParen,
    OpenBrace,
    CloseBrace,
}

/// Build a thrown `#ERROR!` failure pointing at `offset` in `input`, with
/// the offending line and a caret marker rendered into the message.
pub(crate) fn failure_at(input: &str, offset: usize, detail: &str) -> FormulaError {
    failure_with(input, location_of(input, offset), detail)
}

/// As [`failure_at`], but with the location already computed.
pub(crate) fn failure_with(input: &str, location: ErrorLocation, detail: &str) -> FormulaError {
    let source_line = input
        .split('\n')
        .nth(location.line as usize - 1)
        .unwrap_or("");
    let caret_pad = " ".repeat(location.column as usize - 1);
    let message = format!(
        "\n{}\n{}^\nError at position {}:{}\n{}",
        source_line, caret_pad, location.line, location.column, detail
    );
    FormulaError::Parse { message, location }
}

/// 1-based line/column of a byte offset.
pub(crate) fn location_of(input: &str, offset: usize) -> ErrorLocation {
    let offset = offset.min(input.len());
    let before = &input[..offset];
    let line = before.matches('\n').count() as u32 + 1;
    let line_start = before.rfind('\n').map(|i| i + 1).unwrap_or(0);
    let column = before[line_start..].chars().count() as u32 + 1;
    ErrorLocation { line, column }
}

/// Tokenize a formula (without its leading `=`).
pub fn tokenize(input: &str) -> FormulaResult<Vec<Token>> {
    Lexer::new(input).run()
}

struct Lexer<'a> {
    input: &'a str,
    pos: usize,
    tokens: Vec<Token>,
}

impl<'a> Lexer<'a> {
    fn new(input: &'a str) -> Self {
        Self {
            input,
            pos: 0,
            tokens: Vec::new(),
        }
    }

    fn run(mut self) -> FormulaResult<Vec<Token>> {
        loop {
            self.skip_whitespace();
            if self.is_at_end() {
                return Ok(self.tokens);
            }
            self.scan_token()?;
        }
    }

    fn scan_token(&mut self) -> FormulaResult<()> {
        let start = self.pos;
        let c = self.peek_char().unwrap();

        let simple = match c {
            '+' => Some(TokenKind::Plus),
            '-' => Some(TokenKind::Minus),
            '*' => Some(TokenKind::Star),
            '/' => Some(TokenKind::Slash),
            '^' => Some(TokenKind::Caret),
            '%' => Some(TokenKind::Percent),
            '&' => Some(TokenKind::Ampersand),
            '=' => Some(TokenKind::Equal),
            ':' => Some(TokenKind::Colon),
            ',' => Some(TokenKind::Comma),
            ';' => Some(TokenKind::Semicolon),
            '(' => Some(TokenKind::OpenParen),
            ')' => Some(TokenKind::CloseParen),
            '{' => Some(TokenKind::OpenBrace),
            '}' => Some(TokenKind::CloseBrace),
            _ => None,
        };
        if let Some(kind) = simple {
            self.advance();
            self.push(kind, start);
            return Ok(());
        }

        match c {
            '<' => {
                self.advance();
                let kind = if self.peek_char() == Some('=') {
                    self.advance();
                    TokenKind::LessEqual
                } else if self.peek_char() == Some('>') {
                    self.advance();
                    TokenKind::NotEqual
                } else {
                    TokenKind::LessThan
                };
                self.push(kind, start);
                Ok(())
            }
            '>' => {
                self.advance();
                let kind = if self.peek_char() == Some('=') {
                    self.advance();
                    TokenKind::GreaterEqual
                } else {
                    TokenKind::GreaterThan
                };
                self.push(kind, start);
                Ok(())
            }
            '"' => self.scan_string(),
            '\'' => self.scan_quoted_sheet(),
            '#' => self.scan_error_literal(),
            c if c.is_ascii_digit()
                || (c == '.' && self.peek_char_at(1).is_some_and(|c| c.is_ascii_digit())) =>
            {
                self.scan_number();
                Ok(())
            }
            c if c.is_ascii_alphabetic() || c == '_' || c == '$' => self.scan_word(),
            other => Err(failure_at(
                self.input,
                start,
                &format!("unexpected character '{}'", other),
            )),
        }
    }

    fn scan_string(&mut self) -> FormulaResult<()> {
        let start = self.pos;
        self.advance(); // opening quote

        let mut s = String::new();
        loop {
            match self.peek_char() {
                None => {
                    return Err(failure_at(self.input, start, "unterminated string literal"))
                }
                Some('"') => {
                    if self.peek_char_at(1) == Some('"') {
                        s.push('"');
                        self.advance();
                        self.advance();
                    } else {
                        self.advance();
                        break;
                    }
                }
                Some(c) => {
                    s.push(c);
                    self.advance();
                }
            }
        }
        self.push(TokenKind::Str(s), start);
        Ok(())
    }

    fn scan_quoted_sheet(&mut self) -> FormulaResult<()> {
        let start = self.pos;
        self.advance(); // opening quote

        let mut name = String::new();
        loop {
            match self.peek_char() {
                None => {
                    return Err(failure_at(self.input, start, "unterminated sheet name"));
                }
                Some('\'') => {
                    if self.peek_char_at(1) == Some('\'') {
                        name.push('\'');
                        self.advance();
                        self.advance();
                    } else {
                        self.advance();
                        break;
                    }
                }
                Some(c) => {
                    name.push(c);
                    self.advance();
                }
            }
        }
        if self.peek_char() != Some('!') {
            return Err(failure_at(
                self.input,
                self.pos,
                "expected '!' after quoted sheet name",
            ));
        }
        self.advance();
        self.push(TokenKind::Sheet(name), start);
        Ok(())
    }

    fn scan_error_literal(&mut self) -> FormulaResult<()> {
        let start = self.pos;
        self.advance(); // '#'
        while self.peek_char().is_some_and(|c| {
            c.is_ascii_alphanumeric() || c == '/' || c == '!' || c == '?'
        }) {
            self.advance();
        }
        let image = &self.input[start..self.pos];
        match ExcelError::from_code(image) {
            Some(err) => {
                self.push(TokenKind::ErrLit(err), start);
                Ok(())
            }
            None => Err(failure_at(
                self.input,
                start,
                &format!("unknown error literal '{}'", image),
            )),
        }
    }

    fn scan_number(&mut self) {
        let start = self.pos;
        while self.peek_char().is_some_and(|c| c.is_ascii_digit()) {
            self.advance();
        }
        if self.peek_char() == Some('.') {
            self.advance();
            while self.peek_char().is_some_and(|c| c.is_ascii_digit()) {
                self.advance();
            }
        }
        // Exponent only counts when digits follow; `1E` is a number then a name
        if self.peek_char().is_some_and(|c| c == 'e' || c == 'E') {
            let mark = self.pos;
            self.advance();
            if self.peek_char().is_some_and(|c| c == '+' || c == '-') {
                self.advance();
            }
            if self.peek_char().is_some_and(|c| c.is_ascii_digit()) {
                while self.peek_char().is_some_and(|c| c.is_ascii_digit()) {
                    self.advance();
                }
            } else {
                self.pos = mark;
            }
        }
        let image = &self.input[start..self.pos];
        let n: f64 = image.parse().unwrap_or(0.0);
        self.push(TokenKind::Number(n), start);
    }

    /// Scan an identifier-shaped run, then classify it as a sheet prefix,
    /// function name, boolean, cell address, bare column, or defined name.
    fn scan_word(&mut self) -> FormulaResult<()> {
        let start = self.pos;
        while self.peek_char().is_some_and(|c| {
            c.is_ascii_alphanumeric() || c == '_' || c == '$' || c == '.'
        }) {
            self.advance();
        }
        let image = &self.input[start..self.pos];

        if self.peek_char() == Some('!') {
            self.advance();
            self.push(TokenKind::Sheet(image.to_string()), start);
            return Ok(());
        }

        if self.peek_char() == Some('(') {
            self.advance();
            self.push(TokenKind::Function(image.to_string()), start);
            return Ok(());
        }

        let upper = image.to_uppercase();
        if upper == "TRUE" || upper == "FALSE" {
            self.push(TokenKind::Bool(upper == "TRUE"), start);
            return Ok(());
        }

        if let Some(cell) = parse_cell_address(image) {
            self.push(TokenKind::Cell(cell), start);
            return Ok(());
        }

        // A short letter run directly followed by `:` is a whole-column
        // reference; this is the only lookahead the classifier needs.
        if self.peek_char() == Some(':') {
            if let Some(col) = column_image_to_number(image) {
                self.push(TokenKind::Column(col), start);
                return Ok(());
            }
        }

        self.push(TokenKind::Name(image.to_string()), start);
        Ok(())
    }

    fn push(&mut self, kind: TokenKind, start: usize) {
        self.tokens.push(Token {
            kind,
            start,
            end: self.pos,
        });
    }

    fn peek_char(&self) -> Option<char> {
        self.input[self.pos..].chars().next()
    }

    fn peek_char_at(&self, offset: usize) -> Option<char> {
        self.input[self.pos..].chars().nth(offset)
    }

    fn advance(&mut self) {
        if let Some(c) = self.peek_char() {
            self.pos += c.len_utf8();
        }
    }

    fn skip_whitespace(&mut self) {
        while self.peek_char().is_some_and(|c| c.is_whitespace()) {
            self.advance();
        }
    }

    fn is_at_end(&self) -> bool {
        self.pos >= self.input.len()
    }
}

fn column_image_to_number(image: &str) -> Option<u32> {
    let letters = image.strip_prefix('$').unwrap_or(image);
    if letters.is_empty() || letters.len() > 3 {
        return None;
    }
    if !letters.bytes().all(|b| b.is_ascii_alphabetic()) {
        return None;
    }
    column_name_to_number(letters)
}
