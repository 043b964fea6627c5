//! Evaluated cell values

use std::fmt;

/// What a cell shows once its content is interpreted
#[derive(Debug, Clone, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(tag = "type", content = "value"))]
pub enum CellValue {
    #[default]
    Empty,
    Number(f64),
    Text(String),
    Boolean(bool),
    Error(CellError),
}

impl CellValue {
    pub fn text<S: Into<String>>(s: S) -> Self {
        CellValue::Text(s.into())
    }

    /// Interpret literal (non-formula) content the way a user would type it
    ///
    /// Numbers and booleans are recognized, `#REF!` style strings become errors,
    /// everything else is text. Empty content is an empty value.
    pub fn from_literal(content: &str) -> Self {
        if content.is_empty() {
            return CellValue::Empty;
        }
        let trimmed = content.trim();
        match trimmed.parse::<f64>() {
            Ok(n) if n.is_finite() => return CellValue::Number(n),
            _ => {}
        }
        if trimmed.eq_ignore_ascii_case("TRUE") {
            CellValue::Boolean(true)
        } else if trimmed.eq_ignore_ascii_case("FALSE") {
            CellValue::Boolean(false)
        } else if let Some(err) = CellError::parse(trimmed) {
            CellValue::Error(err)
        } else {
            CellValue::Text(content.to_string())
        }
    }

    /// Content that reproduces this value when written back into a cell
    pub fn to_literal(&self) -> String {
        match self {
            CellValue::Empty => String::new(),
            CellValue::Number(n) if n.fract() == 0.0 && n.abs() < 1e15 => format!("{}", *n as i64),
            CellValue::Number(n) => n.to_string(),
            CellValue::Text(s) => s.clone(),
            CellValue::Boolean(true) => "TRUE".to_string(),
            CellValue::Boolean(false) => "FALSE".to_string(),
            CellValue::Error(e) => e.as_str().to_string(),
        }
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, CellValue::Empty)
    }

    pub fn is_error(&self) -> bool {
        matches!(self, CellValue::Error(_))
    }

    /// Numeric reading used by comparisons; booleans count as 0 and 1
    pub fn as_number(&self) -> Option<f64> {
        match self {
            CellValue::Number(n) => Some(*n),
            CellValue::Boolean(b) => Some(if *b { 1.0 } else { 0.0 }),
            _ => None,
        }
    }
}

impl fmt::Display for CellValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_literal())
    }
}

impl From<f64> for CellValue {
    fn from(n: f64) -> Self {
        CellValue::Number(n)
    }
}

impl From<bool> for CellValue {
    fn from(b: bool) -> Self {
        CellValue::Boolean(b)
    }
}

impl From<CellError> for CellValue {
    fn from(e: CellError) -> Self {
        CellValue::Error(e)
    }
}

/// Error markers a cell can display
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum CellError {
    Null,
    Div0,
    Value,
    /// Reference to a cell or sheet that no longer exists
    Ref,
    /// Formula the evaluator cannot read
    Name,
    Num,
    Na,
}

const ERROR_MARKERS: [(CellError, &str); 7] = [
    (CellError::Null, "#NULL!"),
    (CellError::Div0, "#DIV/0!"),
    (CellError::Value, "#VALUE!"),
    (CellError::Ref, "#REF!"),
    (CellError::Name, "#NAME?"),
    (CellError::Num, "#NUM!"),
    (CellError::Na, "#N/A"),
];

impl CellError {
    pub fn as_str(&self) -> &'static str {
        ERROR_MARKERS
            .iter()
            .find(|(error, _)| error == self)
            .map_or("#ERROR", |(_, marker)| marker)
    }

    /// Recognize a marker, ignoring case
    pub fn parse(s: &str) -> Option<Self> {
        ERROR_MARKERS
            .iter()
            .find(|(_, marker)| marker.eq_ignore_ascii_case(s))
            .map(|(error, _)| *error)
    }
}

impl fmt::Display for CellError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
