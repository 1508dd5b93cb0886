//! Criteria matching for SUMIF and friends
//!
//! A criteria value can be a number (exact match), a comparison string such
//! as `">=10"` or `"<>0"`, or text with `*`/`?` wildcards matched
//! case-insensitively. An empty criteria matches blank cells.

use cellgrid_core::Value;

#[derive(Debug)]
pub struct CriteriaMatcher {
    kind: CriteriaKind,
}

#[derive(Debug)]
enum CriteriaKind {
    Number(f64),
    Comparison(ComparisonOp, f64),
    Text(String),
    Empty,
}

#[derive(Debug, Clone, Copy)]
enum ComparisonOp {
    Equal,
    NotEqual,
    LessThan,
    LessEqual,
    GreaterThan,
    GreaterEqual,
}

impl CriteriaMatcher {
    pub fn new(criteria: &Value) -> Self {
        let kind = match criteria {
            Value::Number(n) => CriteriaKind::Number(*n),
            Value::Bool(b) => CriteriaKind::Number(if *b { 1.0 } else { 0.0 }),
            Value::Text(s) => Self::parse_text_criteria(s),
            // blanks, errors and arrays match nothing except blank-for-blank
            _ => CriteriaKind::Empty,
        };
        Self { kind }
    }

    fn parse_text_criteria(s: &str) -> CriteriaKind {
        let s = s.trim();
        if s.is_empty() {
            return CriteriaKind::Empty;
        }
        if let Some(kind) = Self::try_parse_comparison(s) {
            return kind;
        }
        if let Ok(n) = s.parse::<f64>() {
            return CriteriaKind::Number(n);
        }
        CriteriaKind::Text(s.to_lowercase())
    }

    fn try_parse_comparison(s: &str) -> Option<CriteriaKind> {
        // longer operators first
        let (op, rest) = if let Some(rest) = s.strip_prefix(">=") {
            (ComparisonOp::GreaterEqual, rest)
        } else if let Some(rest) = s.strip_prefix("<=") {
            (ComparisonOp::LessEqual, rest)
        } else if let Some(rest) = s.strip_prefix("<>") {
            (ComparisonOp::NotEqual, rest)
        } else if let Some(rest) = s.strip_prefix('>') {
            (ComparisonOp::GreaterThan, rest)
        } else if let Some(rest) = s.strip_prefix('<') {
            (ComparisonOp::LessThan, rest)
        } else if let Some(rest) = s.strip_prefix('=') {
            (ComparisonOp::Equal, rest)
        } else {
            return None;
        };

        match rest.trim().parse::<f64>() {
            Ok(n) => Some(CriteriaKind::Comparison(op, n)),
            // something like ">A"; fall through to a text match
            Err(_) => None,
        }
    }

    pub fn matches(&self, value: &Value) -> bool {
        match &self.kind {
            // numeric criteria match numeric cells only, not text that
            // happens to parse
            CriteriaKind::Number(criteria) => match value {
                Value::Number(n) => (n - criteria).abs() < 1e-10,
                Value::Bool(b) => {
                    let n = if *b { 1.0 } else { 0.0 };
                    (n - criteria).abs() < 1e-10
                }
                _ => false,
            },
            CriteriaKind::Comparison(op, criteria) => {
                let n = match value {
                    Value::Number(n) => *n,
                    Value::Bool(b) => {
                        if *b {
                            1.0
                        } else {
                            0.0
                        }
                    }
                    _ => return false,
                };
                match op {
                    ComparisonOp::Equal => (n - criteria).abs() < 1e-10,
                    ComparisonOp::NotEqual => (n - criteria).abs() >= 1e-10,
                    ComparisonOp::LessThan => n < *criteria,
                    ComparisonOp::LessEqual => n <= *criteria,
                    ComparisonOp::GreaterThan => n > *criteria,
                    ComparisonOp::GreaterEqual => n >= *criteria,
                }
            }
            CriteriaKind::Text(pattern) => {
                let text = value.to_string().to_lowercase();
                wildcard_match(pattern, &text)
            }
            CriteriaKind::Empty => {
                matches!(value, Value::Blank) || matches!(value, Value::Text(s) if s.is_empty())
            }
        }
    }
}

/// `*` matches any run of characters, `?` exactly one.
fn wildcard_match(pattern: &str, text: &str) -> bool {
    if !pattern.contains('*') && !pattern.contains('?') {
        return pattern == text;
    }
    let pattern: Vec<char> = pattern.chars().collect();
    let text: Vec<char> = text.chars().collect();

    let mut pi = 0;
    let mut ti = 0;
    let mut star_pi = None;
    let mut star_ti = 0;

    while ti < text.len() {
        if pi < pattern.len() && (pattern[pi] == '?' || pattern[pi] == text[ti]) {
            pi += 1;
            ti += 1;
        } else if pi < pattern.len() && pattern[pi] == '*' {
            star_pi = Some(pi);
            star_ti = ti;
            pi += 1;
        } else if let Some(sp) = star_pi {
            // backtrack: let the last * swallow one more character
            pi = sp + 1;
            star_ti += 1;
            ti = star_ti;
        } else {
            return false;
        }
    }
    while pi < pattern.len() && pattern[pi] == '*' {
        pi += 1;
    }
    pi == pattern.len()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_number_criteria_ignores_numeric_text() {
        let m = CriteriaMatcher::new(&Value::Number(5.0));
        assert!(m.matches(&Value::Number(5.0)));
        assert!(!m.matches(&Value::text("5")));
    }

    #[test]
    fn test_comparison_criteria() {
        let m = CriteriaMatcher::new(&Value::text(">=10"));
        assert!(m.matches(&Value::Number(10.0)));
        assert!(m.matches(&Value::Number(11.0)));
        assert!(!m.matches(&Value::Number(9.0)));
        assert!(!m.matches(&Value::text("12")));

        let m = CriteriaMatcher::new(&Value::text("<>0"));
        assert!(m.matches(&Value::Number(1.0)));
        assert!(!m.matches(&Value::Number(0.0)));
    }

    #[test]
    fn test_text_criteria_with_wildcards() {
        let m = CriteriaMatcher::new(&Value::text("ap*e"));
        assert!(m.matches(&Value::text("Apple")));
        assert!(m.matches(&Value::text("ape")));
        assert!(!m.matches(&Value::text("grape")));

        let m = CriteriaMatcher::new(&Value::text("a?c"));
        assert!(m.matches(&Value::text("abc")));
        assert!(!m.matches(&Value::text("ac")));
    }

    #[test]
    fn test_empty_criteria_matches_blank() {
        let m = CriteriaMatcher::new(&Value::text(""));
        assert!(m.matches(&Value::Blank));
        assert!(m.matches(&Value::text("")));
        assert!(!m.matches(&Value::Number(0.0)));
    }
}
