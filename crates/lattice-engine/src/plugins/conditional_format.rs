//! Conditional formatting
//!
//! Rules are kept per sheet in priority order: for a given cell the first rule
//! whose ranges contain it and whose condition holds provides the style.

use crate::command::{Command, CommandError};
use crate::data::{ConditionalFormatData, WorkbookData};
use crate::error::Result;
use crate::history::{Direction, StatePatch};
use crate::plugin::{CorePlugin, ExecContext, Getters, RangeAdaptation};
use crate::plugins::{
    adapt_ranges, export_ranges, import_ranges, parse_ranges, replace_sheet_list, retarget_ranges,
    sheet_names,
};
use ahash::AHashMap;
use lattice_core::{CellPosition, CellValue, Range, SheetId, Style};
use serde::{Deserialize, Serialize};
use std::any::Any;

/// Comparison of a `CellIs` rule
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CfOperator {
    Equal,
    NotEqual,
    GreaterThan,
    GreaterThanOrEqual,
    LessThan,
    LessThanOrEqual,
    Between,
    NotBetween,
}

impl CfOperator {
    /// Number of operand values the operator needs
    pub fn arity(&self) -> usize {
        match self {
            CfOperator::Between | CfOperator::NotBetween => 2,
            _ => 1,
        }
    }
}

/// Condition of a rule
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum CfRule {
    /// Operands are cell contents: literals or formulas
    CellIs {
        operator: CfOperator,
        values: Vec<String>,
    },
    ContainsText {
        text: String,
    },
    NotContainsText {
        text: String,
    },
    BeginsWith {
        text: String,
    },
    EndsWith {
        text: String,
    },
    IsEmpty,
    IsNotEmpty,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConditionalFormat {
    pub id: String,
    pub rule: CfRule,
    pub style: Style,
}

impl ConditionalFormat {
    pub fn new(id: impl Into<String>, rule: CfRule, style: Style) -> Self {
        Self {
            id: id.into(),
            rule,
            style,
        }
    }

    fn missing_value(&self) -> bool {
        match &self.rule {
            CfRule::CellIs { operator, values } => {
                values.len() < operator.arity()
                    || values[..operator.arity()].iter().any(|v| v.trim().is_empty())
            }
            CfRule::ContainsText { text }
            | CfRule::NotContainsText { text }
            | CfRule::BeginsWith { text }
            | CfRule::EndsWith { text } => text.is_empty(),
            CfRule::IsEmpty | CfRule::IsNotEmpty => false,
        }
    }
}

/// A rule and the ranges it applies to
#[derive(Debug, Clone, PartialEq)]
pub struct ConditionalFormatEntry {
    pub cf: ConditionalFormat,
    pub ranges: Vec<Range>,
}

impl ConditionalFormatEntry {
    pub fn contains(&self, position: CellPosition) -> bool {
        self.ranges
            .iter()
            .any(|range| range.is_valid() && range.zone.contains_position(position))
    }
}

fn matches(rule: &CfRule, sheet_id: &SheetId, value: &CellValue, getters: &Getters<'_>) -> bool {
    let text = || value.to_literal().to_lowercase();
    match rule {
        CfRule::CellIs { operator, values } => {
            let operands: Vec<CellValue> = values
                .iter()
                .take(operator.arity())
                .map(|v| getters.evaluate(sheet_id, v))
                .collect();
            compare(*operator, value, &operands)
        }
        CfRule::ContainsText { text: needle } => text().contains(&needle.to_lowercase()),
        CfRule::NotContainsText { text: needle } => !text().contains(&needle.to_lowercase()),
        CfRule::BeginsWith { text: needle } => text().starts_with(&needle.to_lowercase()),
        CfRule::EndsWith { text: needle } => text().ends_with(&needle.to_lowercase()),
        CfRule::IsEmpty => value.to_literal().trim().is_empty(),
        CfRule::IsNotEmpty => !value.to_literal().trim().is_empty(),
    }
}

fn compare(operator: CfOperator, value: &CellValue, operands: &[CellValue]) -> bool {
    if value.is_empty() || value.is_error() || operands.len() < operator.arity() {
        return false;
    }
    let numbers = |a: &CellValue| a.as_number();
    let equal = |a: &CellValue, b: &CellValue| match (numbers(a), numbers(b)) {
        (Some(x), Some(y)) => x == y,
        _ => a.to_literal().eq_ignore_ascii_case(&b.to_literal()),
    };
    match operator {
        CfOperator::Equal => equal(value, &operands[0]),
        CfOperator::NotEqual => !equal(value, &operands[0]),
        _ => {
            let Some(x) = numbers(value) else {
                return false;
            };
            let bounds: Option<Vec<f64>> = operands.iter().map(numbers).collect();
            let Some(bounds) = bounds else {
                return false;
            };
            match operator {
                CfOperator::GreaterThan => x > bounds[0],
                CfOperator::GreaterThanOrEqual => x >= bounds[0],
                CfOperator::LessThan => x < bounds[0],
                CfOperator::LessThanOrEqual => x <= bounds[0],
                CfOperator::Between => x >= bounds[0].min(bounds[1]) && x <= bounds[0].max(bounds[1]),
                CfOperator::NotBetween => x < bounds[0].min(bounds[1]) || x > bounds[0].max(bounds[1]),
                CfOperator::Equal | CfOperator::NotEqual => false,
            }
        }
    }
}

#[derive(Debug, Default)]
pub struct ConditionalFormatPlugin {
    formats: AHashMap<SheetId, Vec<ConditionalFormatEntry>>,
}

impl ConditionalFormatPlugin {
    /// Rules of a sheet, highest priority first
    pub fn conditional_formats(&self, sheet_id: &SheetId) -> &[ConditionalFormatEntry] {
        self.formats.get(sheet_id).map_or(&[], Vec::as_slice)
    }

    pub fn conditional_format(&self, sheet_id: &SheetId, id: &str) -> Option<&ConditionalFormatEntry> {
        self.conditional_formats(sheet_id)
            .iter()
            .find(|entry| entry.cf.id == id)
    }

    /// Rules whose ranges contain a cell, in priority order
    pub fn rules_at(&self, sheet_id: &SheetId, position: CellPosition) -> Vec<&ConditionalFormatEntry> {
        self.conditional_formats(sheet_id)
            .iter()
            .filter(|entry| entry.contains(position))
            .collect()
    }

    /// Style of the first rule that holds for a cell
    pub fn matching_style(&self, sheet_id: &SheetId, position: CellPosition, getters: &Getters<'_>) -> Option<Style> {
        let rules = self.rules_at(sheet_id, position);
        if rules.is_empty() {
            return None;
        }
        let value = getters.evaluated_value(sheet_id, position);
        rules
            .into_iter()
            .find(|entry| matches(&entry.cf.rule, sheet_id, &value, getters))
            .map(|entry| entry.cf.style.clone())
    }

    fn set_formats(&mut self, sheet_id: &SheetId, formats: Vec<ConditionalFormatEntry>, ctx: &mut ExecContext<'_>) {
        if let Some(change) = replace_sheet_list(&mut self.formats, sheet_id, formats) {
            ctx.record(StatePatch::ConditionalFormats(change));
        }
    }
}

impl CorePlugin for ConditionalFormatPlugin {
    fn name(&self) -> &'static str {
        "conditional_format"
    }

    fn allow_dispatch(&self, command: &Command, getters: &Getters<'_>) -> Vec<CommandError> {
        match command {
            Command::AddConditionalFormat {
                sheet_id,
                cf,
                ranges,
            } => {
                let mut reasons = Vec::new();
                match parse_ranges(getters, ranges, sheet_id) {
                    Ok(parsed) if parsed.iter().any(|r| &r.sheet_id != sheet_id) => {
                        reasons.push(CommandError::InvalidRange)
                    }
                    Ok(_) => {}
                    Err(reason) => reasons.push(reason),
                }
                if cf.missing_value() {
                    reasons.push(CommandError::MissingCriterionValue);
                }
                reasons
            }
            Command::RemoveConditionalFormat { sheet_id, id }
            | Command::ChangeConditionalFormatPriority { sheet_id, id, .. } => {
                if self.conditional_format(sheet_id, id).is_none() {
                    vec![CommandError::EntityDoesNotExist]
                } else {
                    Vec::new()
                }
            }
            _ => Vec::new(),
        }
    }

    fn adapt_ranges(&mut self, adaptation: &RangeAdaptation, ctx: &mut ExecContext<'_>) {
        let RangeAdaptation::Structural { sheet_id, .. } = adaptation else {
            return;
        };
        let adapted = self
            .conditional_formats(sheet_id)
            .iter()
            .filter_map(|entry| {
                let ranges = adapt_ranges(&entry.ranges, adaptation);
                (!ranges.is_empty()).then(|| ConditionalFormatEntry {
                    cf: entry.cf.clone(),
                    ranges,
                })
            })
            .collect();
        self.set_formats(sheet_id, adapted, ctx);
    }

    fn handle(&mut self, command: &Command, ctx: &mut ExecContext<'_>) {
        match command {
            Command::AddConditionalFormat {
                sheet_id,
                cf,
                ranges,
            } => {
                let Ok(ranges) = parse_ranges(&ctx.getters, ranges, sheet_id) else {
                    return;
                };
                let entry = ConditionalFormatEntry {
                    cf: cf.clone(),
                    ranges,
                };
                let mut formats = self.conditional_formats(sheet_id).to_vec();
                match formats.iter_mut().find(|existing| existing.cf.id == cf.id) {
                    Some(existing) => *existing = entry,
                    None => formats.push(entry),
                }
                self.set_formats(sheet_id, formats, ctx);
            }
            Command::RemoveConditionalFormat { sheet_id, id } => {
                let formats = self
                    .conditional_formats(sheet_id)
                    .iter()
                    .filter(|entry| &entry.cf.id != id)
                    .cloned()
                    .collect();
                self.set_formats(sheet_id, formats, ctx);
            }
            Command::ChangeConditionalFormatPriority { sheet_id, id, delta } => {
                let mut formats = self.conditional_formats(sheet_id).to_vec();
                let Some(index) = formats.iter().position(|entry| &entry.cf.id == id) else {
                    return;
                };
                let entry = formats.remove(index);
                let target = (index as i64 + *delta as i64).clamp(0, formats.len() as i64) as usize;
                formats.insert(target, entry);
                self.set_formats(sheet_id, formats, ctx);
            }
            Command::DeleteSheet { sheet_id } => self.set_formats(sheet_id, Vec::new(), ctx),
            Command::DuplicateSheet {
                sheet_id,
                new_sheet_id,
                ..
            } => {
                let copy = self
                    .conditional_formats(sheet_id)
                    .iter()
                    .map(|entry| ConditionalFormatEntry {
                        cf: entry.cf.clone(),
                        ranges: retarget_ranges(&entry.ranges, sheet_id, new_sheet_id),
                    })
                    .collect();
                self.set_formats(new_sheet_id, copy, ctx);
            }
            _ => {}
        }
    }

    fn apply_patch(&mut self, patch: &StatePatch, direction: Direction) {
        if let StatePatch::ConditionalFormats(change) = patch {
            change.apply_to(&mut self.formats, direction);
        }
    }

    fn export(&self, data: &mut WorkbookData) {
        let names = sheet_names(data);
        for sheet in &mut data.sheets {
            sheet.conditional_formats = self
                .conditional_formats(&sheet.id)
                .iter()
                .map(|entry| ConditionalFormatData {
                    cf: entry.cf.clone(),
                    ranges: export_ranges(&entry.ranges, &sheet.id, &names),
                })
                .collect();
        }
    }

    fn import(&mut self, data: &WorkbookData) -> Result<()> {
        self.formats.clear();
        for sheet in &data.sheets {
            let mut entries = Vec::new();
            for cf in &sheet.conditional_formats {
                let what = format!("conditional format '{}'", cf.cf.id);
                entries.push(ConditionalFormatEntry {
                    cf: cf.cf.clone(),
                    ranges: import_ranges(&cf.ranges, &sheet.id, data, &what)?,
                });
            }
            if !entries.is_empty() {
                self.formats.insert(sheet.id.clone(), entries);
            }
        }
        Ok(())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_util::*;
    use crate::Engine;
    use lattice_core::{Color, Dimension, InsertPosition};

    fn equal_two() -> ConditionalFormat {
        ConditionalFormat::new(
            "cf1",
            CfRule::CellIs {
                operator: CfOperator::Equal,
                values: vec!["2".into()],
            },
            Style::new().fill_color(Color::RED),
        )
    }

    fn add(engine: &mut Engine, cf: ConditionalFormat, ranges: &[&str]) -> crate::DispatchResult {
        let sheet_id = engine.active_sheet_id();
        engine.dispatch(Command::AddConditionalFormat {
            sheet_id,
            cf,
            ranges: ranges.iter().map(|r| r.to_string()).collect(),
        })
    }

    fn fill(engine: &Engine, xc: &str) -> Option<Color> {
        let sheet_id = engine.active_sheet_id();
        engine.getters().computed_style(&sheet_id, pos(xc)).fill_color
    }

    #[test]
    fn test_rule_applies_to_matching_cells() {
        let mut engine = Engine::new();
        assert!(add(&mut engine, equal_two(), &["A1:A4"]).is_success());
        set(&mut engine, "A1", "2");
        set(&mut engine, "A2", "3");
        set(&mut engine, "B1", "2");
        assert_eq!(fill(&engine, "A1"), Some(Color::RED));
        assert_eq!(fill(&engine, "A2"), None);
        assert_eq!(fill(&engine, "B1"), None);
    }

    #[test]
    fn test_empty_range_list_is_rejected() {
        let mut engine = Engine::new();
        let result = add(&mut engine, equal_two(), &[]);
        assert!(result.is_rejected_by(CommandError::EmptyRange));
        let sheet_id = engine.active_sheet_id();
        assert!(engine
            .getters()
            .conditional_formats()
            .conditional_formats(&sheet_id)
            .is_empty());
    }

    #[test]
    fn test_missing_operand_is_rejected() {
        let mut engine = Engine::new();
        let cf = ConditionalFormat::new(
            "cf2",
            CfRule::CellIs {
                operator: CfOperator::Between,
                values: vec!["1".into()],
            },
            Style::new(),
        );
        assert!(add(&mut engine, cf, &["A1"]).is_rejected_by(CommandError::MissingCriterionValue));
    }

    #[test]
    fn test_first_match_wins() {
        let mut engine = Engine::new();
        add(&mut engine, equal_two(), &["A1"]);
        let blue = ConditionalFormat::new("cf2", CfRule::IsNotEmpty, Style::new().fill_color(Color::BLUE));
        add(&mut engine, blue, &["A1"]);
        set(&mut engine, "A1", "2");
        assert_eq!(fill(&engine, "A1"), Some(Color::RED));
        let sheet_id = engine.active_sheet_id();
        engine.dispatch(Command::ChangeConditionalFormatPriority {
            sheet_id,
            id: "cf2".into(),
            delta: -5,
        });
        assert_eq!(fill(&engine, "A1"), Some(Color::BLUE));
    }

    #[test]
    fn test_ranges_follow_structure() {
        let mut engine = Engine::new();
        add(&mut engine, equal_two(), &["B1:B3", "D1"]);
        let sheet_id = engine.active_sheet_id();
        engine.dispatch(Command::RemoveColumnsRows {
            sheet_id: sheet_id.clone(),
            dimension: Dimension::Col,
            elements: vec![1],
        });
        engine.dispatch(Command::AddColumnsRows {
            sheet_id: sheet_id.clone(),
            dimension: Dimension::Row,
            base: 0,
            position: InsertPosition::Before,
            quantity: 1,
        });
        let getters = engine.getters();
        let entry = getters.conditional_formats().conditional_format(&sheet_id, "cf1").unwrap();
        let ranges: Vec<String> = entry
            .ranges
            .iter()
            .map(|r| getters.range_to_xc(r, &sheet_id))
            .collect();
        assert_eq!(ranges, vec!["C2"]);
    }

    #[test]
    fn test_text_rules() {
        let value = CellValue::text("Hello World");
        let engine = Engine::new();
        let getters = engine.getters();
        let sheet_id = engine.active_sheet_id();
        let rule = |text: &str| CfRule::ContainsText { text: text.into() };
        assert!(matches(&rule("world"), &sheet_id, &value, &getters));
        assert!(!matches(&rule("moon"), &sheet_id, &value, &getters));
        assert!(matches(
            &CfRule::BeginsWith { text: "hell".into() },
            &sheet_id,
            &value,
            &getters
        ));
        assert!(matches(&CfRule::IsEmpty, &sheet_id, &CellValue::Empty, &getters));
    }
}
