//! Formula evaluation collaborator
//!
//! The engine stores formulas as text and never interprets the formula language
//! itself. Values of formula cells come from an injected [`Evaluator`].

use lattice_core::range::split_sheet_prefix;
use lattice_core::{CellAddress, CellError, CellPosition, CellValue, SheetId};

/// Read access to evaluated cell values, handed to an [`Evaluator`]
pub trait ValueLookup {
    /// Evaluated value of a cell, `Empty` for blank cells
    fn value(&self, sheet_id: &SheetId, position: CellPosition) -> CellValue;

    /// Resolve a sheet name (case-insensitive)
    fn sheet_id(&self, name: &str) -> Option<SheetId>;
}

/// Computes the value of a formula
///
/// Implementations must be deterministic: collaborating clients replay the same
/// commands and must observe the same values.
pub trait Evaluator {
    /// `formula` includes the leading `=`
    fn evaluate(&self, formula: &str, sheet_id: &SheetId, lookup: &dyn ValueLookup) -> CellValue;
}

/// Evaluator understanding only literals and single-cell references
///
/// - `="text"` yields the text
/// - `=12`, `=TRUE`, `=#N/A` yield the literal
/// - `=B2`, `=$B$2`, `=Sheet2!B2` yield the referenced value (a blank cell is 0)
///
/// Anything else evaluates to `#NAME?`.
#[derive(Debug, Default, Clone, Copy)]
pub struct LiteralEvaluator;

impl Evaluator for LiteralEvaluator {
    fn evaluate(&self, formula: &str, sheet_id: &SheetId, lookup: &dyn ValueLookup) -> CellValue {
        let body = formula.strip_prefix('=').unwrap_or(formula).trim();
        if body.is_empty() {
            return CellValue::Error(CellError::Name);
        }
        if let Some(text) = string_literal(body) {
            return CellValue::Text(text);
        }
        match CellValue::from_literal(body) {
            CellValue::Text(_) | CellValue::Empty => {}
            literal => return literal,
        }
        let Ok((sheet_name, address)) = split_sheet_prefix(body) else {
            return CellValue::Error(CellError::Name);
        };
        let Ok(address) = CellAddress::parse(address) else {
            return CellValue::Error(CellError::Name);
        };
        let target = match sheet_name {
            Some(name) => match lookup.sheet_id(&name) {
                Some(id) => id,
                None => return CellValue::Error(CellError::Ref),
            },
            None => sheet_id.clone(),
        };
        match lookup.value(&target, address.position()) {
            CellValue::Empty => CellValue::Number(0.0),
            value => value,
        }
    }
}

fn string_literal(body: &str) -> Option<String> {
    let inner = body.strip_prefix('"')?.strip_suffix('"')?;
    let unescaped = inner.replace("\"\"", "\"");
    if unescaped.matches('"').count() * 2 != inner.matches('"').count() {
        return None;
    }
    Some(unescaped)
}
