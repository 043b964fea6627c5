//! Data validation rules
//!
//! A cell is governed by at most one rule: adding a rule carves its zones out
//! of every older rule of the sheet.

use crate::command::{Command, CommandError};
use crate::data::{DataValidationData, WorkbookData};
use crate::error::Result;
use crate::history::{Direction, StatePatch};
use crate::plugin::{CorePlugin, ExecContext, Getters, RangeAdaptation};
use crate::plugins::{
    adapt_ranges, export_ranges, import_ranges, parse_ranges, replace_sheet_list, retarget_ranges,
    sheet_names,
};
use ahash::AHashMap;
use lattice_core::{CellPosition, CellValue, Range, SheetId};
use serde::{Deserialize, Serialize};
use std::any::Any;

/// What a valid value looks like; operands are cell contents (literals or formulas)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum DataValidationCriterion {
    IsValueInList { values: Vec<String> },
    NumberBetween { min: String, max: String },
    NumberGreaterThan { value: String },
    NumberLessThan { value: String },
    TextContains { text: String },
    IsBoolean,
}

impl DataValidationCriterion {
    fn missing_value(&self) -> bool {
        let blank = |s: &String| s.trim().is_empty();
        match self {
            Self::IsValueInList { values } => values.is_empty() || values.iter().any(blank),
            Self::NumberBetween { min, max } => blank(min) || blank(max),
            Self::NumberGreaterThan { value } | Self::NumberLessThan { value } => blank(value),
            Self::TextContains { text } => text.is_empty(),
            Self::IsBoolean => false,
        }
    }

    /// Whether `value` satisfies the criterion; empty values always do
    pub fn is_valid(&self, value: &CellValue, sheet_id: &SheetId, getters: &Getters<'_>) -> bool {
        if value.is_empty() {
            return true;
        }
        let number = |operand: &str| getters.evaluate(sheet_id, operand).as_number();
        match self {
            Self::IsValueInList { values } => values.iter().any(|candidate| {
                getters
                    .evaluate(sheet_id, candidate)
                    .to_literal()
                    .eq_ignore_ascii_case(&value.to_literal())
            }),
            Self::NumberBetween { min, max } => match (value.as_number(), number(min), number(max)) {
                (Some(x), Some(a), Some(b)) => x >= a.min(b) && x <= a.max(b),
                _ => false,
            },
            Self::NumberGreaterThan { value: bound } => {
                matches!((value.as_number(), number(bound)), (Some(x), Some(b)) if x > b)
            }
            Self::NumberLessThan { value: bound } => {
                matches!((value.as_number(), number(bound)), (Some(x), Some(b)) if x < b)
            }
            Self::TextContains { text } => value
                .to_literal()
                .to_lowercase()
                .contains(&text.to_lowercase()),
            Self::IsBoolean => matches!(value, CellValue::Boolean(_)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataValidationRule {
    pub id: String,
    pub criterion: DataValidationCriterion,
    /// Blocking rules reject invalid input instead of only flagging it
    #[serde(default)]
    pub is_blocking: bool,
}

impl DataValidationRule {
    pub fn new(id: impl Into<String>, criterion: DataValidationCriterion) -> Self {
        Self {
            id: id.into(),
            criterion,
            is_blocking: false,
        }
    }

    pub fn blocking(mut self) -> Self {
        self.is_blocking = true;
        self
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct DataValidationEntry {
    pub rule: DataValidationRule,
    pub ranges: Vec<Range>,
}

#[derive(Debug, Default)]
pub struct DataValidationPlugin {
    rules: AHashMap<SheetId, Vec<DataValidationEntry>>,
}

impl DataValidationPlugin {
    pub fn rules(&self, sheet_id: &SheetId) -> &[DataValidationEntry] {
        self.rules.get(sheet_id).map_or(&[], Vec::as_slice)
    }

    pub fn rule(&self, sheet_id: &SheetId, id: &str) -> Option<&DataValidationEntry> {
        self.rules(sheet_id).iter().find(|entry| entry.rule.id == id)
    }

    pub fn rule_at(&self, sheet_id: &SheetId, position: CellPosition) -> Option<&DataValidationEntry> {
        self.rules(sheet_id).iter().find(|entry| {
            entry
                .ranges
                .iter()
                .any(|range| range.is_valid() && range.zone.contains_position(position))
        })
    }

    /// Whether the current value of a cell satisfies its rule
    pub fn is_cell_valid(&self, sheet_id: &SheetId, position: CellPosition, getters: &Getters<'_>) -> bool {
        self.rule_at(sheet_id, position).map_or(true, |entry| {
            let value = getters.evaluated_value(sheet_id, position);
            entry.rule.criterion.is_valid(&value, sheet_id, getters)
        })
    }

    fn set_rules(&mut self, sheet_id: &SheetId, rules: Vec<DataValidationEntry>, ctx: &mut ExecContext<'_>) {
        if let Some(change) = replace_sheet_list(&mut self.rules, sheet_id, rules) {
            ctx.record(StatePatch::DataValidation(change));
        }
    }

    fn check_input(&self, command: &Command, getters: &Getters<'_>) -> Option<CommandError> {
        let Command::UpdateCell {
            sheet_id,
            content: Some(content),
            ..
        } = command
        else {
            return None;
        };
        let entry = self.rule_at(sheet_id, command.cell()?)?;
        if !entry.rule.is_blocking {
            return None;
        }
        let value = getters.evaluate(sheet_id, content);
        (!entry.rule.criterion.is_valid(&value, sheet_id, getters))
            .then_some(CommandError::BlockingValidationRule)
    }
}

impl CorePlugin for DataValidationPlugin {
    fn name(&self) -> &'static str {
        "data_validation"
    }

    fn allow_dispatch(&self, command: &Command, getters: &Getters<'_>) -> Vec<CommandError> {
        match command {
            Command::AddDataValidationRule {
                sheet_id,
                rule,
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
                if rule.criterion.missing_value() {
                    reasons.push(CommandError::MissingCriterionValue);
                }
                reasons
            }
            Command::RemoveDataValidationRule { sheet_id, id } => {
                if self.rule(sheet_id, id).is_none() {
                    vec![CommandError::EntityDoesNotExist]
                } else {
                    Vec::new()
                }
            }
            _ => self.check_input(command, getters).into_iter().collect(),
        }
    }

    fn adapt_ranges(&mut self, adaptation: &RangeAdaptation, ctx: &mut ExecContext<'_>) {
        let RangeAdaptation::Structural { sheet_id, .. } = adaptation else {
            return;
        };
        let adapted = self
            .rules(sheet_id)
            .iter()
            .filter_map(|entry| {
                let ranges = adapt_ranges(&entry.ranges, adaptation);
                (!ranges.is_empty()).then(|| DataValidationEntry {
                    rule: entry.rule.clone(),
                    ranges,
                })
            })
            .collect();
        self.set_rules(sheet_id, adapted, ctx);
    }

    fn handle(&mut self, command: &Command, ctx: &mut ExecContext<'_>) {
        match command {
            Command::AddDataValidationRule {
                sheet_id,
                rule,
                ranges,
            } => {
                let Ok(ranges) = parse_ranges(&ctx.getters, ranges, sheet_id) else {
                    return;
                };
                let mut rules: Vec<DataValidationEntry> = Vec::new();
                for entry in self.rules(sheet_id).iter().filter(|e| e.rule.id != rule.id) {
                    let remaining: Vec<Range> = entry
                        .ranges
                        .iter()
                        .flat_map(|old| {
                            ranges.iter().fold(vec![old.zone], |parts, new| {
                                parts
                                    .iter()
                                    .flat_map(|part| part.difference(&new.zone))
                                    .collect()
                            })
                            .into_iter()
                            .map(|zone| Range {
                                zone,
                                ..old.clone()
                            })
                        })
                        .collect();
                    if !remaining.is_empty() {
                        rules.push(DataValidationEntry {
                            rule: entry.rule.clone(),
                            ranges: remaining,
                        });
                    }
                }
                let entry = DataValidationEntry {
                    rule: rule.clone(),
                    ranges,
                };
                match self.rules(sheet_id).iter().position(|e| e.rule.id == rule.id) {
                    Some(index) => rules.insert(index.min(rules.len()), entry),
                    None => rules.push(entry),
                }
                self.set_rules(sheet_id, rules, ctx);
            }
            Command::RemoveDataValidationRule { sheet_id, id } => {
                let rules = self
                    .rules(sheet_id)
                    .iter()
                    .filter(|entry| &entry.rule.id != id)
                    .cloned()
                    .collect();
                self.set_rules(sheet_id, rules, ctx);
            }
            Command::DeleteSheet { sheet_id } => self.set_rules(sheet_id, Vec::new(), ctx),
            Command::DuplicateSheet {
                sheet_id,
                new_sheet_id,
                ..
            } => {
                let copy = self
                    .rules(sheet_id)
                    .iter()
                    .map(|entry| DataValidationEntry {
                        rule: entry.rule.clone(),
                        ranges: retarget_ranges(&entry.ranges, sheet_id, new_sheet_id),
                    })
                    .collect();
                self.set_rules(new_sheet_id, copy, ctx);
            }
            _ => {}
        }
    }

    fn apply_patch(&mut self, patch: &StatePatch, direction: Direction) {
        if let StatePatch::DataValidation(change) = patch {
            change.apply_to(&mut self.rules, direction);
        }
    }

    fn export(&self, data: &mut WorkbookData) {
        let names = sheet_names(data);
        for sheet in &mut data.sheets {
            sheet.data_validation_rules = self
                .rules(&sheet.id)
                .iter()
                .map(|entry| DataValidationData {
                    rule: entry.rule.clone(),
                    ranges: export_ranges(&entry.ranges, &sheet.id, &names),
                })
                .collect();
        }
    }

    fn import(&mut self, data: &WorkbookData) -> Result<()> {
        self.rules.clear();
        for sheet in &data.sheets {
            let mut entries = Vec::new();
            for dv in &sheet.data_validation_rules {
                let what = format!("data validation rule '{}'", dv.rule.id);
                entries.push(DataValidationEntry {
                    rule: dv.rule.clone(),
                    ranges: import_ranges(&dv.ranges, &sheet.id, data, &what)?,
                });
            }
            if !entries.is_empty() {
                self.rules.insert(sheet.id.clone(), entries);
            }
        }
        Ok(())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}
