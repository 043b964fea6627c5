//! Protected ranges
//!
//! Any command writing into a protected range is rejected.

use crate::command::{Command, CommandError};
use crate::data::{ProtectionData, WorkbookData};
use crate::error::Result;
use crate::history::{Direction, StatePatch};
use crate::plugin::{CorePlugin, ExecContext, Getters, RangeAdaptation};
use crate::plugins::{
    adapt_ranges, export_ranges, import_ranges, parse_ranges, replace_sheet_list, retarget_ranges,
    sheet_names,
};
use ahash::AHashMap;
use lattice_core::{Range, SheetId, Zone};
use std::any::Any;

#[derive(Debug, Clone, PartialEq)]
pub struct ProtectionRule {
    pub id: String,
    pub ranges: Vec<Range>,
}

impl ProtectionRule {
    pub fn covers(&self, zone: &Zone) -> bool {
        self.ranges
            .iter()
            .any(|range| range.is_valid() && range.zone.intersects(zone))
    }
}

#[derive(Debug, Default)]
pub struct ProtectionPlugin {
    rules: AHashMap<SheetId, Vec<ProtectionRule>>,
}

impl ProtectionPlugin {
    pub fn rules(&self, sheet_id: &SheetId) -> &[ProtectionRule] {
        self.rules.get(sheet_id).map_or(&[], Vec::as_slice)
    }

    pub fn rule(&self, sheet_id: &SheetId, id: &str) -> Option<&ProtectionRule> {
        self.rules(sheet_id).iter().find(|rule| rule.id == id)
    }

    pub fn is_protected(&self, sheet_id: &SheetId, zone: &Zone) -> bool {
        self.rules(sheet_id).iter().any(|rule| rule.covers(zone))
    }

    fn set_rules(&mut self, sheet_id: &SheetId, rules: Vec<ProtectionRule>, ctx: &mut ExecContext<'_>) {
        if let Some(change) = replace_sheet_list(&mut self.rules, sheet_id, rules) {
            ctx.record(StatePatch::Protection(change));
        }
    }
}

impl CorePlugin for ProtectionPlugin {
    fn name(&self) -> &'static str {
        "protection"
    }

    fn allow_dispatch(&self, command: &Command, getters: &Getters<'_>) -> Vec<CommandError> {
        match command {
            Command::AddProtectionRule {
                sheet_id,
                id,
                ranges,
            } => {
                let mut reasons = Vec::new();
                if self.rule(sheet_id, id).is_some() {
                    reasons.push(CommandError::DuplicatedIdentifier);
                }
                if let Err(reason) = parse_ranges(getters, ranges, sheet_id) {
                    reasons.push(reason);
                }
                reasons
            }
            Command::RemoveProtectionRule { sheet_id, id } => {
                if self.rule(sheet_id, id).is_none() {
                    vec![CommandError::EntityDoesNotExist]
                } else {
                    Vec::new()
                }
            }
            _ => {
                let Some(sheet_id) = command.sheet_id() else {
                    return Vec::new();
                };
                let protected = command
                    .written_zones()
                    .iter()
                    .any(|zone| self.is_protected(sheet_id, zone));
                if protected {
                    vec![CommandError::ProtectedCell]
                } else {
                    Vec::new()
                }
            }
        }
    }

    fn adapt_ranges(&mut self, adaptation: &RangeAdaptation, ctx: &mut ExecContext<'_>) {
        let RangeAdaptation::Structural { sheet_id, .. } = adaptation else {
            return;
        };
        let adapted = self
            .rules(sheet_id)
            .iter()
            .filter_map(|rule| {
                let ranges = adapt_ranges(&rule.ranges, adaptation);
                (!ranges.is_empty()).then(|| ProtectionRule {
                    id: rule.id.clone(),
                    ranges,
                })
            })
            .collect();
        self.set_rules(sheet_id, adapted, ctx);
    }

    fn handle(&mut self, command: &Command, ctx: &mut ExecContext<'_>) {
        match command {
            Command::AddProtectionRule {
                sheet_id,
                id,
                ranges,
            } => {
                let Ok(ranges) = parse_ranges(&ctx.getters, ranges, sheet_id) else {
                    return;
                };
                let mut rules = self.rules(sheet_id).to_vec();
                rules.push(ProtectionRule {
                    id: id.clone(),
                    ranges,
                });
                self.set_rules(sheet_id, rules, ctx);
            }
            Command::RemoveProtectionRule { sheet_id, id } => {
                let rules = self
                    .rules(sheet_id)
                    .iter()
                    .filter(|rule| &rule.id != id)
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
                    .map(|rule| ProtectionRule {
                        id: rule.id.clone(),
                        ranges: retarget_ranges(&rule.ranges, sheet_id, new_sheet_id),
                    })
                    .collect();
                self.set_rules(new_sheet_id, copy, ctx);
            }
            _ => {}
        }
    }

    fn apply_patch(&mut self, patch: &StatePatch, direction: Direction) {
        if let StatePatch::Protection(change) = patch {
            change.apply_to(&mut self.rules, direction);
        }
    }

    fn export(&self, data: &mut WorkbookData) {
        let names = sheet_names(data);
        for sheet in &mut data.sheets {
            sheet.protection_rules = self
                .rules(&sheet.id)
                .iter()
                .map(|rule| ProtectionData {
                    id: rule.id.clone(),
                    ranges: export_ranges(&rule.ranges, &sheet.id, &names),
                })
                .collect();
        }
    }

    fn import(&mut self, data: &WorkbookData) -> Result<()> {
        self.rules.clear();
        for sheet in &data.sheets {
            let mut rules = Vec::new();
            for rule in &sheet.protection_rules {
                let what = format!("protection rule '{}'", rule.id);
                rules.push(ProtectionRule {
                    id: rule.id.clone(),
                    ranges: import_ranges(&rule.ranges, &sheet.id, data, &what)?,
                });
            }
            if !rules.is_empty() {
                self.rules.insert(sheet.id.clone(), rules);
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

    fn protect(engine: &mut Engine, id: &str, xc: &str) -> crate::DispatchResult {
        let sheet_id = engine.active_sheet_id();
        engine.dispatch(Command::AddProtectionRule {
            sheet_id,
            id: id.into(),
            ranges: vec![xc.into()],
        })
    }

    #[test]
    fn test_protected_cells_reject_writes() {
        let mut engine = Engine::new();
        set(&mut engine, "B2", "locked");
        assert!(protect(&mut engine, "p1", "A1:B2").is_success());
        let sheet_id = engine.active_sheet_id();
        let result = engine.dispatch(Command::DeleteContent {
            sheet_id: sheet_id.clone(),
            target: vec![zone("B2:C3")],
        });
        assert!(result.is_rejected_by(CommandError::ProtectedCell));
        assert_eq!(content(&engine, "B2"), "locked");
        set(&mut engine, "C3", "free");
        assert_eq!(content(&engine, "C3"), "free");
    }

    #[test]
    fn test_duplicate_and_missing_ids() {
        let mut engine = Engine::new();
        protect(&mut engine, "p1", "A1");
        assert!(protect(&mut engine, "p1", "B1").is_rejected_by(CommandError::DuplicatedIdentifier));
        let sheet_id = engine.active_sheet_id();
        let result = engine.dispatch(Command::RemoveProtectionRule {
            sheet_id: sheet_id.clone(),
            id: "p2".into(),
        });
        assert!(result.is_rejected_by(CommandError::EntityDoesNotExist));
        assert!(engine
            .dispatch(Command::RemoveProtectionRule {
                sheet_id,
                id: "p1".into(),
            })
            .is_success());
        set(&mut engine, "A1", "now writable");
        assert_eq!(content(&engine, "A1"), "now writable");
    }
}
