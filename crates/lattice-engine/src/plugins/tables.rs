//! Tables

use crate::command::{Command, CommandError};
use crate::data::{TableData, WorkbookData};
use crate::error::{Error, Result};
use crate::history::{Direction, StatePatch};
use crate::plugin::{CorePlugin, ExecContext, Getters, RangeAdaptation};
use crate::plugins::replace_sheet_list;
use ahash::AHashMap;
use lattice_core::{adjust_zone, SheetId, Zone};
use serde::{Deserialize, Serialize};
use std::any::Any;

pub const DEFAULT_TABLE_STYLE: &str = "TableStyleMedium2";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TableConfig {
    pub has_filters: bool,
    pub banded_rows: bool,
    pub first_column: bool,
    pub style_id: String,
}

impl Default for TableConfig {
    fn default() -> Self {
        Self {
            has_filters: true,
            banded_rows: true,
            first_column: false,
            style_id: DEFAULT_TABLE_STYLE.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Table {
    pub id: String,
    pub zone: Zone,
    pub config: TableConfig,
}

#[derive(Debug, Default)]
pub struct TablesPlugin {
    tables: AHashMap<SheetId, Vec<Table>>,
}

impl TablesPlugin {
    pub fn tables(&self, sheet_id: &SheetId) -> &[Table] {
        self.tables.get(sheet_id).map_or(&[], Vec::as_slice)
    }

    pub fn table(&self, sheet_id: &SheetId, id: &str) -> Option<&Table> {
        self.tables(sheet_id).iter().find(|table| table.id == id)
    }

    pub fn tables_intersecting(&self, sheet_id: &SheetId, zone: &Zone) -> Vec<&Table> {
        self.tables(sheet_id)
            .iter()
            .filter(|table| table.zone.intersects(zone))
            .collect()
    }

    fn set_tables(&mut self, sheet_id: &SheetId, tables: Vec<Table>, ctx: &mut ExecContext<'_>) {
        if let Some(change) = replace_sheet_list(&mut self.tables, sheet_id, tables) {
            ctx.record(StatePatch::Tables(change));
        }
    }

    /// Parse a table range, bounded to the sheet
    fn table_zone(getters: &Getters<'_>, sheet_id: &SheetId, xc: &str) -> std::result::Result<Zone, CommandError> {
        let range = getters
            .parse_range(xc, sheet_id)
            .map_err(|_| CommandError::InvalidRange)?;
        if &range.sheet_id != sheet_id {
            return Err(CommandError::InvalidRange);
        }
        let sheet = getters.sheet(sheet_id).ok_or(CommandError::InvalidSheetId)?;
        if !sheet.contains_zone(&range.zone) {
            return Err(CommandError::TargetOutOfSheet);
        }
        Ok(range.zone.bounded(sheet.rows, sheet.cols))
    }

    fn check_zone(&self, sheet_id: &SheetId, zone: &Zone, ignore: Option<&str>, getters: &Getters<'_>) -> Vec<CommandError> {
        let mut reasons = Vec::new();
        if self
            .tables_intersecting(sheet_id, zone)
            .iter()
            .any(|table| Some(table.id.as_str()) != ignore)
        {
            reasons.push(CommandError::TableOverlap);
        }
        if !getters.merges().merges_intersecting(sheet_id, zone).is_empty() {
            reasons.push(CommandError::MergeInTable);
        }
        reasons
    }
}

impl CorePlugin for TablesPlugin {
    fn name(&self) -> &'static str {
        "tables"
    }

    fn allow_dispatch(&self, command: &Command, getters: &Getters<'_>) -> Vec<CommandError> {
        match command {
            Command::CreateTable {
                sheet_id, id, range, ..
            } => {
                let mut reasons = Vec::new();
                if self.table(sheet_id, id).is_some() {
                    reasons.push(CommandError::DuplicatedIdentifier);
                }
                match Self::table_zone(getters, sheet_id, range) {
                    Ok(zone) => reasons.extend(self.check_zone(sheet_id, &zone, None, getters)),
                    Err(reason) => reasons.push(reason),
                }
                reasons
            }
            Command::UpdateTable {
                sheet_id, id, range, ..
            } => {
                if self.table(sheet_id, id).is_none() {
                    return vec![CommandError::EntityDoesNotExist];
                }
                match range.as_deref().map(|xc| Self::table_zone(getters, sheet_id, xc)) {
                    Some(Ok(zone)) => self.check_zone(sheet_id, &zone, Some(id.as_str()), getters),
                    Some(Err(reason)) => vec![reason],
                    None => Vec::new(),
                }
            }
            Command::RemoveTable { sheet_id, target } => {
                if target
                    .iter()
                    .all(|zone| self.tables_intersecting(sheet_id, zone).is_empty())
                {
                    vec![CommandError::EntityDoesNotExist]
                } else {
                    Vec::new()
                }
            }
            Command::AddMerge {
                sheet_id, target, ..
            } => {
                if target
                    .iter()
                    .any(|zone| !self.tables_intersecting(sheet_id, zone).is_empty())
                {
                    vec![CommandError::MergeInTable]
                } else {
                    Vec::new()
                }
            }
            _ => Vec::new(),
        }
    }

    fn adapt_ranges(&mut self, adaptation: &RangeAdaptation, ctx: &mut ExecContext<'_>) {
        let RangeAdaptation::Structural { sheet_id, change } = adaptation else {
            return;
        };
        let adapted = self
            .tables(sheet_id)
            .iter()
            .filter_map(|table| {
                let zone = adjust_zone(&table.zone, change).apply_to(table.zone)?;
                Some(Table {
                    zone,
                    ..table.clone()
                })
            })
            .collect();
        self.set_tables(sheet_id, adapted, ctx);
    }

    fn handle(&mut self, command: &Command, ctx: &mut ExecContext<'_>) {
        match command {
            Command::CreateTable {
                sheet_id,
                id,
                range,
                config,
            } => {
                let Ok(zone) = Self::table_zone(&ctx.getters, sheet_id, range) else {
                    return;
                };
                let mut tables = self.tables(sheet_id).to_vec();
                tables.push(Table {
                    id: id.clone(),
                    zone,
                    config: config.clone(),
                });
                self.set_tables(sheet_id, tables, ctx);
            }
            Command::UpdateTable {
                sheet_id,
                id,
                range,
                config,
            } => {
                let zone = match range.as_deref() {
                    Some(xc) => match Self::table_zone(&ctx.getters, sheet_id, xc) {
                        Ok(zone) => Some(zone),
                        Err(_) => return,
                    },
                    None => None,
                };
                let tables = self
                    .tables(sheet_id)
                    .iter()
                    .map(|table| {
                        if &table.id != id {
                            return table.clone();
                        }
                        Table {
                            id: table.id.clone(),
                            zone: zone.unwrap_or(table.zone),
                            config: config.clone().unwrap_or_else(|| table.config.clone()),
                        }
                    })
                    .collect();
                self.set_tables(sheet_id, tables, ctx);
            }
            Command::RemoveTable { sheet_id, target } => {
                let tables = self
                    .tables(sheet_id)
                    .iter()
                    .filter(|table| !target.iter().any(|zone| table.zone.intersects(zone)))
                    .cloned()
                    .collect();
                self.set_tables(sheet_id, tables, ctx);
            }
            Command::DeleteSheet { sheet_id } => self.set_tables(sheet_id, Vec::new(), ctx),
            Command::DuplicateSheet {
                sheet_id,
                new_sheet_id,
                ..
            } => {
                let copy = self.tables(sheet_id).to_vec();
                self.set_tables(new_sheet_id, copy, ctx);
            }
            _ => {}
        }
    }

    fn apply_patch(&mut self, patch: &StatePatch, direction: Direction) {
        if let StatePatch::Tables(change) = patch {
            change.apply_to(&mut self.tables, direction);
        }
    }

    fn export(&self, data: &mut WorkbookData) {
        for sheet in &mut data.sheets {
            sheet.tables = self
                .tables(&sheet.id)
                .iter()
                .map(|table| TableData {
                    id: table.id.clone(),
                    range: table.zone.to_a1_string(),
                    config: table.config.clone(),
                })
                .collect();
        }
    }

    fn import(&mut self, data: &WorkbookData) -> Result<()> {
        self.tables.clear();
        for sheet in &data.sheets {
            let mut tables: Vec<Table> = Vec::new();
            for table in &sheet.tables {
                let zone = Zone::parse(&table.range)?.bounded(sheet.rows, sheet.cols);
                if tables.iter().any(|other| other.zone.intersects(&zone)) {
                    return Err(Error::invalid_document(format!(
                        "table '{}' overlaps another table in sheet '{}'",
                        table.id, sheet.name
                    )));
                }
                tables.push(Table {
                    id: table.id.clone(),
                    zone,
                    config: table.config.clone(),
                });
            }
            if !tables.is_empty() {
                self.tables.insert(sheet.id.clone(), tables);
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
    use lattice_core::Dimension;
    use pretty_assertions::assert_eq;

    fn create(engine: &mut Engine, id: &str, range: &str) -> crate::DispatchResult {
        let sheet_id = engine.active_sheet_id();
        engine.dispatch(Command::CreateTable {
            sheet_id,
            id: id.into(),
            range: range.into(),
            config: TableConfig::default(),
        })
    }

    fn table_zones(engine: &Engine) -> Vec<String> {
        let sheet_id = engine.active_sheet_id();
        engine
            .getters()
            .tables()
            .tables(&sheet_id)
            .iter()
            .map(|table| table.zone.to_a1_string())
            .collect()
    }

    #[test]
    fn test_default_config() {
        let config = TableConfig::default();
        assert!(config.has_filters);
        assert!(config.banded_rows);
        assert!(!config.first_column);
        assert_eq!(config.style_id, "TableStyleMedium2");
    }

    #[test]
    fn test_overlapping_tables_are_rejected() {
        let mut engine = Engine::new();
        assert!(create(&mut engine, "t1", "A1:C3").is_success());
        assert!(create(&mut engine, "t2", "C3:D4").is_rejected_by(CommandError::TableOverlap));
        assert!(create(&mut engine, "t1", "E1:E2").is_rejected_by(CommandError::DuplicatedIdentifier));
        assert_eq!(table_zones(&engine), vec!["A1:C3"]);
    }

    #[test]
    fn test_merges_and_tables_exclude_each_other() {
        let mut engine = Engine::new();
        let sheet_id = engine.active_sheet_id();
        create(&mut engine, "t1", "A1:C3");
        let result = engine.dispatch(Command::AddMerge {
            sheet_id: sheet_id.clone(),
            target: vec![zone("B2:B4")],
            force: false,
        });
        assert!(result.is_rejected_by(CommandError::MergeInTable));
        engine.dispatch(Command::AddMerge {
            sheet_id,
            target: vec![zone("E1:F1")],
            force: false,
        });
        assert!(create(&mut engine, "t2", "E1:E5").is_rejected_by(CommandError::MergeInTable));
    }

    #[test]
    fn test_table_follows_structure_and_collapses() {
        let mut engine = Engine::new();
        create(&mut engine, "t1", "B2:C4");
        let sheet_id = engine.active_sheet_id();
        engine.dispatch(Command::RemoveColumnsRows {
            sheet_id: sheet_id.clone(),
            dimension: Dimension::Row,
            elements: vec![0, 2],
        });
        assert_eq!(table_zones(&engine), vec!["B1:C2"]);
        engine.dispatch(Command::RemoveColumnsRows {
            sheet_id,
            dimension: Dimension::Col,
            elements: vec![1, 2],
        });
        assert!(table_zones(&engine).is_empty());
    }

    #[test]
    fn test_remove_table_by_target() {
        let mut engine = Engine::new();
        create(&mut engine, "t1", "A1:B2");
        let sheet_id = engine.active_sheet_id();
        let missing = engine.dispatch(Command::RemoveTable {
            sheet_id: sheet_id.clone(),
            target: vec![zone("D4")],
        });
        assert!(missing.is_rejected_by(CommandError::EntityDoesNotExist));
        assert!(engine
            .dispatch(Command::RemoveTable {
                sheet_id,
                target: vec![zone("B2")],
            })
            .is_success());
        assert!(table_zones(&engine).is_empty());
    }
}
