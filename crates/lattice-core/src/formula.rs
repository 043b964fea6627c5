//! Reference-level formula rewriting
//!
//! Formulas are kept as text. This module only understands the references inside
//! them: it can shift relative references (copy/paste), follow structural changes,
//! and track sheet renames. Everything that is not a reference is copied verbatim.

use crate::adjust::{adjust_zone, StructuralChange};
use crate::range::{quote_sheet_name, SheetId};
use crate::zone::{CellAddress, HeaderPart, Zone};
use crate::{MAX_COLS, MAX_ROWS};

/// Text written in place of a reference that no longer points anywhere
pub const REF_ERROR: &str = "#REF!";

/// Whether a cell content is a formula
pub fn is_formula(content: &str) -> bool {
    content.starts_with('=')
}

/// A reference found in a formula
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormulaReference {
    /// Sheet name as written, unquoted (`None` for the formula's own sheet)
    pub sheet: Option<String>,
    pub zone: Zone,
}

/// List the references of a formula
pub fn formula_references(formula: &str) -> Vec<FormulaReference> {
    tokenize(formula)
        .into_iter()
        .filter_map(|piece| match piece {
            Piece::Reference(reference) => Some(FormulaReference {
                zone: reference.zone(),
                sheet: reference.sheet,
            }),
            Piece::Text(_) => None,
        })
        .collect()
}

/// Shift every relative reference by `(d_col, d_row)`
///
/// Absolute parts (`$`) stay put. A reference pushed outside the grid becomes `#REF!`.
pub fn rebase_formula(formula: &str, d_col: i64, d_row: i64) -> String {
    rewrite(formula, |reference| reference.shifted(d_col, d_row))
}

/// Follow a structural change of `edited_sheet` in a formula living on `formula_sheet`
///
/// `resolve` maps sheet names written in the formula to sheet ids. References whose
/// rows or columns were all removed become `#REF!`.
pub fn adjust_formula<F>(
    formula: &str,
    formula_sheet: &SheetId,
    edited_sheet: &SheetId,
    change: &StructuralChange,
    resolve: F,
) -> String
where
    F: Fn(&str) -> Option<SheetId>,
{
    rewrite(formula, |reference| {
        let target = match &reference.sheet {
            Some(name) => resolve(name),
            None => Some(formula_sheet.clone()),
        };
        if target.as_ref() != Some(edited_sheet) {
            return Some(reference.clone());
        }
        let zone = reference.zone();
        adjust_zone(&zone, change)
            .apply_to(zone)
            .map(|adjusted| reference.with_zone(&adjusted))
    })
}

/// Rewrite sheet prefixes naming `old_name` (case-insensitive) to `new_name`
pub fn rename_sheet_in_formula(formula: &str, old_name: &str, new_name: &str) -> String {
    rewrite(formula, |reference| {
        let mut reference = reference.clone();
        if reference
            .sheet
            .as_deref()
            .is_some_and(|name| name.eq_ignore_ascii_case(old_name))
        {
            reference.sheet = Some(new_name.to_string());
            reference.sheet_text = Some(format!("{}!", quote_sheet_name(new_name)));
        }
        Some(reference)
    })
}

/// Replace every reference to the sheet `name` with `#REF!`
pub fn invalidate_sheet_in_formula(formula: &str, name: &str) -> String {
    rewrite(formula, |reference| {
        if reference
            .sheet
            .as_deref()
            .is_some_and(|sheet| sheet.eq_ignore_ascii_case(name))
        {
            None
        } else {
            Some(reference.clone())
        }
    })
}

fn rewrite<F>(formula: &str, mut f: F) -> String
where
    F: FnMut(&ReferenceToken) -> Option<ReferenceToken>,
{
    if !is_formula(formula) {
        return formula.to_string();
    }
    let mut out = String::with_capacity(formula.len());
    for piece in tokenize(formula) {
        match piece {
            Piece::Text(text) => out.push_str(text),
            Piece::Reference(reference) => match f(&reference) {
                Some(updated) => out.push_str(&updated.render()),
                None => out.push_str(REF_ERROR),
            },
        }
    }
    out
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct ReferenceToken {
    sheet: Option<String>,
    /// Prefix exactly as written, including the `!`
    sheet_text: Option<String>,
    start: HeaderPart,
    end: Option<HeaderPart>,
}

impl ReferenceToken {
    fn zone(&self) -> Zone {
        let end = self.end.unwrap_or(self.start);
        let (left, right) = match (self.start.col, end.col) {
            (Some((l, _)), Some((r, _))) => (l, Some(r)),
            (Some((l, _)), None) => (l, None),
            (None, _) => (0, None),
        };
        let (top, bottom) = match (self.start.row, end.row) {
            (Some((t, _)), Some((b, _))) => (t, Some(b)),
            (Some((t, _)), None) => (t, None),
            (None, _) => (0, None),
        };
        Zone {
            top,
            left,
            bottom,
            right,
        }
        .normalized()
    }

    fn with_zone(&self, zone: &Zone) -> ReferenceToken {
        let mut updated = self.clone();
        set_part(&mut updated.start, Some(zone.left), Some(zone.top));
        if let Some(end) = updated.end.as_mut() {
            set_part(end, zone.right, zone.bottom);
        }
        updated
    }

    fn shifted(&self, d_col: i64, d_row: i64) -> Option<ReferenceToken> {
        let mut updated = self.clone();
        shift_part(&mut updated.start, d_col, d_row)?;
        if let Some(end) = updated.end.as_mut() {
            shift_part(end, d_col, d_row)?;
        }
        Some(updated)
    }

    fn render(&self) -> String {
        let mut out = self.sheet_text.clone().unwrap_or_default();
        render_part(&mut out, &self.start);
        if let Some(end) = &self.end {
            out.push(':');
            render_part(&mut out, end);
        }
        out
    }
}

fn set_part(part: &mut HeaderPart, col: Option<u32>, row: Option<u32>) {
    if let (Some((c, _)), Some(new_col)) = (part.col.as_mut(), col) {
        *c = new_col;
    }
    if let (Some((r, _)), Some(new_row)) = (part.row.as_mut(), row) {
        *r = new_row;
    }
}

fn shift_part(part: &mut HeaderPart, d_col: i64, d_row: i64) -> Option<()> {
    if let Some((col, absolute)) = part.col.as_mut() {
        if !*absolute {
            *col = shift_index(*col, d_col, MAX_COLS)?;
        }
    }
    if let Some((row, absolute)) = part.row.as_mut() {
        if !*absolute {
            *row = shift_index(*row, d_row, MAX_ROWS)?;
        }
    }
    Some(())
}

fn shift_index(index: u32, delta: i64, limit: u32) -> Option<u32> {
    let moved = index as i64 + delta;
    (moved >= 0 && moved < limit as i64).then_some(moved as u32)
}

fn render_part(out: &mut String, part: &HeaderPart) {
    if let Some((col, absolute)) = part.col {
        if absolute {
            out.push('$');
        }
        out.push_str(&CellAddress::column_to_letters(col));
    }
    if let Some((row, absolute)) = part.row {
        if absolute {
            out.push('$');
        }
        out.push_str(&(row + 1).to_string());
    }
}

#[derive(Debug)]
enum Piece<'a> {
    Text(&'a str),
    Reference(ReferenceToken),
}

fn tokenize(formula: &str) -> Vec<Piece<'_>> {
    let mut lexer = ReferenceLexer {
        input: formula,
        pos: 0,
    };
    let mut pieces = Vec::new();
    let mut text_start = 0;
    while !lexer.is_at_end() {
        let token_start = lexer.pos;
        if let Some(reference) = lexer.scan_piece() {
            if token_start > text_start {
                pieces.push(Piece::Text(&formula[text_start..token_start]));
            }
            pieces.push(Piece::Reference(reference));
            text_start = lexer.pos;
        }
    }
    if text_start < formula.len() {
        pieces.push(Piece::Text(&formula[text_start..]));
    }
    pieces
}

struct ReferenceLexer<'a> {
    input: &'a str,
    pos: usize,
}

impl<'a> ReferenceLexer<'a> {
    /// Consume one lexical unit, returning it when it is a reference
    fn scan_piece(&mut self) -> Option<ReferenceToken> {
        let c = self.peek_char()?;
        match c {
            '"' => {
                self.scan_string();
                None
            }
            '#' => {
                // error literals such as #REF! or #DIV/0!
                self.advance();
                while self.peek_char().is_some_and(|c| {
                    c.is_ascii_alphanumeric() || c == '!' || c == '/' || c == '?'
                }) {
                    self.advance();
                }
                None
            }
            '\'' => self.scan_quoted_sheet(),
            c if is_word_char(c) => self.scan_identifier_or_ref(),
            _ => {
                self.advance();
                None
            }
        }
    }

    fn scan_string(&mut self) {
        self.advance();
        while let Some(c) = self.peek_char() {
            self.advance();
            if c == '"' {
                if self.peek_char() == Some('"') {
                    self.advance();
                } else {
                    break;
                }
            }
        }
    }

    fn scan_quoted_sheet(&mut self) -> Option<ReferenceToken> {
        let start = self.pos;
        self.advance();
        let mut name = String::new();
        while let Some(c) = self.peek_char() {
            self.advance();
            if c == '\'' {
                if self.peek_char() == Some('\'') {
                    self.advance();
                    name.push('\'');
                } else {
                    break;
                }
            } else {
                name.push(c);
            }
        }
        if self.peek_char() != Some('!') {
            return None;
        }
        self.advance();
        let sheet_text = self.input[start..self.pos].to_string();
        let (first, second) = self.scan_reference_body()?;
        Some(ReferenceToken {
            sheet: Some(name),
            sheet_text: Some(sheet_text),
            start: first,
            end: second,
        })
    }

    fn scan_identifier_or_ref(&mut self) -> Option<ReferenceToken> {
        let start = self.pos;
        let word = self.scan_word();

        if self.peek_char() == Some('!') {
            self.advance();
            let sheet_text = self.input[start..self.pos].to_string();
            let (first, second) = self.scan_reference_body()?;
            return Some(ReferenceToken {
                sheet: Some(word.to_string()),
                sheet_text: Some(sheet_text),
                start: first,
                end: second,
            });
        }

        // function call
        if self.peek_char() == Some('(') {
            return None;
        }

        self.pos = start;
        match self.scan_reference_body() {
            Some((first, second)) => Some(ReferenceToken {
                sheet: None,
                sheet_text: None,
                start: first,
                end: second,
            }),
            None => {
                self.pos = start;
                self.scan_word();
                None
            }
        }
    }

    /// `A1`, `A1:B2`, `A:B`, `1:2` and the half-open mixes at the current position
    fn scan_reference_body(&mut self) -> Option<(HeaderPart, Option<HeaderPart>)> {
        let first = HeaderPart::parse(self.scan_word()).ok()?;
        let before_colon = self.pos;
        if self.peek_char() == Some(':') {
            self.advance();
            let second_text = self.scan_word();
            if let Ok(second) = HeaderPart::parse(second_text) {
                if self.peek_char() != Some('(') && is_valid_pair(&first, &second) {
                    return Some((first, Some(second)));
                }
            }
            self.pos = before_colon;
        }
        let is_cell = first.col.is_some() && first.row.is_some();
        (is_cell && self.peek_char() != Some('(')).then_some((first, None))
    }

    fn scan_word(&mut self) -> &'a str {
        let start = self.pos;
        while self.peek_char().is_some_and(is_word_char) {
            self.advance();
        }
        &self.input[start..self.pos]
    }

    fn peek_char(&self) -> Option<char> {
        self.input[self.pos..].chars().next()
    }

    fn advance(&mut self) {
        if let Some(c) = self.peek_char() {
            self.pos += c.len_utf8();
        }
    }

    fn is_at_end(&self) -> bool {
        self.pos >= self.input.len()
    }
}

fn is_word_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_' || c == '$' || c == '.'
}

fn is_valid_pair(first: &HeaderPart, second: &HeaderPart) -> bool {
    let cell = |p: &HeaderPart| p.col.is_some() && p.row.is_some();
    let col_only = |p: &HeaderPart| p.col.is_some() && p.row.is_none();
    let row_only = |p: &HeaderPart| p.col.is_none() && p.row.is_some();
    (cell(first) && (cell(second) || col_only(second) || row_only(second)))
        || (col_only(first) && col_only(second))
        || (row_only(first) && row_only(second))
}
