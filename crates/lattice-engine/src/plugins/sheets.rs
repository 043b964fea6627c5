//! Sheet list
//!
//! Owns sheet identity, names, order and grid size. It also performs the checks
//! every sheet-level command shares (the sheet exists, targets lie inside it).

use crate::command::{Command, CommandError};
use crate::data::{SheetData, WorkbookData};
use crate::error::{Error, Result};
use crate::history::{Change, Direction, StatePatch};
use crate::plugin::{CorePlugin, ExecContext, Getters};
use ahash::AHashMap;
use lattice_core::{Dimension, SheetId, Zone, MAX_COLS, MAX_ROWS, MAX_SHEET_NAME_LEN};
use std::any::Any;

/// Characters a sheet name may not contain
const FORBIDDEN_NAME_CHARS: &[char] = &['[', ']', ':', '*', '?', '/', '\\'];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sheet {
    pub id: SheetId,
    pub name: String,
    pub rows: u32,
    pub cols: u32,
}

impl Sheet {
    pub fn size(&self, dimension: Dimension) -> u32 {
        match dimension {
            Dimension::Col => self.cols,
            Dimension::Row => self.rows,
        }
    }

    /// Whether `zone` starts inside the sheet and, when bounded, ends inside it
    pub fn contains_zone(&self, zone: &Zone) -> bool {
        zone.top < self.rows
            && zone.left < self.cols
            && zone.bottom.map_or(true, |b| b < self.rows)
            && zone.right.map_or(true, |r| r < self.cols)
    }

    /// The whole grid as a bounded zone
    pub fn zone(&self) -> Zone {
        Zone::new(0, 0, self.rows.saturating_sub(1), self.cols.saturating_sub(1))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum SheetsPatch {
    Sheet(Change<SheetId, Sheet>),
    Order(Change<(), Vec<SheetId>>),
}

/// Reason a sheet name cannot be used, ignoring duplicates
pub fn validate_sheet_name(name: &str) -> Option<CommandError> {
    let trimmed = name.trim();
    if trimmed.is_empty()
        || name.chars().count() > MAX_SHEET_NAME_LEN
        || name.contains(FORBIDDEN_NAME_CHARS)
        || name.starts_with('\'')
        || name.ends_with('\'')
    {
        Some(CommandError::InvalidSheetName)
    } else {
        None
    }
}

#[derive(Debug)]
pub struct SheetsPlugin {
    sheets: AHashMap<SheetId, Sheet>,
    order: Vec<SheetId>,
    /// Size of sheets created without one, as (rows, cols)
    default_size: (u32, u32),
}

impl Default for SheetsPlugin {
    fn default() -> Self {
        Self::with_default_size(100, 26)
    }
}

impl SheetsPlugin {
    pub fn with_default_size(rows: u32, cols: u32) -> Self {
        Self {
            sheets: AHashMap::new(),
            order: Vec::new(),
            default_size: (rows, cols),
        }
    }

    pub fn sheet(&self, sheet_id: &SheetId) -> Option<&Sheet> {
        self.sheets.get(sheet_id)
    }

    /// Sheet ids in display order
    pub fn sheet_ids(&self) -> &[SheetId] {
        &self.order
    }

    /// Sheets in display order
    pub fn sheets(&self) -> impl Iterator<Item = &Sheet> {
        self.order.iter().filter_map(|id| self.sheets.get(id))
    }

    pub fn sheet_count(&self) -> usize {
        self.order.len()
    }

    pub fn sheet_id_by_name(&self, name: &str) -> Option<SheetId> {
        self.sheets()
            .find(|sheet| sheet.name.eq_ignore_ascii_case(name))
            .map(|sheet| sheet.id.clone())
    }

    fn name_taken(&self, name: &str, except: Option<&SheetId>) -> bool {
        self.sheets()
            .any(|sheet| Some(&sheet.id) != except && sheet.name.eq_ignore_ascii_case(name))
    }

    fn check_new_name(&self, name: &str, except: Option<&SheetId>) -> Option<CommandError> {
        validate_sheet_name(name).or_else(|| {
            self.name_taken(name, except)
                .then_some(CommandError::DuplicatedSheetName)
        })
    }

    fn check_targets(sheet: &Sheet, command: &Command) -> Vec<CommandError> {
        let mut reasons = Vec::new();
        if let Some(target) = command.target() {
            if target.is_empty() {
                reasons.push(CommandError::EmptyRange);
            }
            if target.iter().any(|zone| !sheet.contains_zone(zone)) {
                reasons.push(CommandError::TargetOutOfSheet);
            }
        }
        if let Some(position) = command.cell() {
            if position.row >= sheet.rows || position.col >= sheet.cols {
                reasons.push(CommandError::TargetOutOfSheet);
            }
        }
        reasons
    }

    fn check_structure(sheet: &Sheet, command: &Command) -> Vec<CommandError> {
        match command {
            Command::AddColumnsRows {
                dimension,
                base,
                quantity,
                ..
            } => {
                let mut reasons = Vec::new();
                if *quantity == 0 {
                    reasons.push(CommandError::InvalidQuantity);
                }
                if *base >= sheet.size(*dimension) {
                    reasons.push(CommandError::TargetOutOfSheet);
                }
                let limit = match dimension {
                    Dimension::Col => MAX_COLS,
                    Dimension::Row => MAX_ROWS,
                };
                if sheet.size(*dimension).saturating_add(*quantity) > limit {
                    reasons.push(CommandError::TargetOutOfSheet);
                }
                reasons
            }
            Command::RemoveColumnsRows {
                dimension,
                elements,
                ..
            } => {
                let size = sheet.size(*dimension);
                if elements.is_empty() {
                    return vec![CommandError::EmptyRange];
                }
                if elements.iter().any(|&e| e >= size) {
                    return vec![CommandError::TargetOutOfSheet];
                }
                let mut unique = elements.clone();
                unique.sort_unstable();
                unique.dedup();
                if unique.len() as u32 >= size {
                    return vec![CommandError::NotEnoughElements];
                }
                Vec::new()
            }
            Command::MoveColumnsRows {
                dimension,
                base,
                elements,
                ..
            } => {
                let size = sheet.size(*dimension);
                let mut sorted = elements.clone();
                sorted.sort_unstable();
                sorted.dedup();
                let (Some(&first), Some(&last)) = (sorted.first(), sorted.last()) else {
                    return vec![CommandError::EmptyRange];
                };
                if last >= size || *base >= size {
                    return vec![CommandError::TargetOutOfSheet];
                }
                let contiguous = last - first + 1 == sorted.len() as u32;
                if !contiguous || (first..=last).contains(base) {
                    return vec![CommandError::InvalidRange];
                }
                Vec::new()
            }
            _ => Vec::new(),
        }
    }

    fn set_sheet(&mut self, sheet_id: &SheetId, sheet: Option<Sheet>, ctx: &mut ExecContext<'_>) {
        let before = match &sheet {
            Some(sheet) => self.sheets.insert(sheet_id.clone(), sheet.clone()),
            None => self.sheets.remove(sheet_id),
        };
        if before != sheet {
            ctx.record(StatePatch::Sheets(SheetsPatch::Sheet(Change::new(
                sheet_id.clone(),
                before,
                sheet,
            ))));
        }
    }

    fn set_order(&mut self, order: Vec<SheetId>, ctx: &mut ExecContext<'_>) {
        if order == self.order {
            return;
        }
        let before = std::mem::replace(&mut self.order, order.clone());
        ctx.record(StatePatch::Sheets(SheetsPatch::Order(Change::new(
            (),
            Some(before),
            Some(order),
        ))));
    }

    fn resize(&mut self, sheet_id: &SheetId, dimension: Dimension, delta: i64, ctx: &mut ExecContext<'_>) {
        let Some(mut sheet) = self.sheets.get(sheet_id).cloned() else {
            return;
        };
        let apply = |size: u32| (size as i64 + delta).max(1) as u32;
        match dimension {
            Dimension::Col => sheet.cols = apply(sheet.cols),
            Dimension::Row => sheet.rows = apply(sheet.rows),
        }
        self.set_sheet(sheet_id, Some(sheet), ctx);
    }
}

impl CorePlugin for SheetsPlugin {
    fn name(&self) -> &'static str {
        "sheets"
    }

    fn allow_dispatch(&self, command: &Command, _getters: &Getters<'_>) -> Vec<CommandError> {
        if let Command::CreateSheet {
            sheet_id,
            name,
            rows,
            cols,
            ..
        } = command
        {
            let mut reasons = Vec::new();
            if self.sheets.contains_key(sheet_id) {
                reasons.push(CommandError::DuplicatedSheetId);
            }
            reasons.extend(self.check_new_name(name, None));
            if *rows == Some(0) || *cols == Some(0) {
                reasons.push(CommandError::InvalidQuantity);
            }
            if rows.is_some_and(|r| r > MAX_ROWS) || cols.is_some_and(|c| c > MAX_COLS) {
                reasons.push(CommandError::TargetOutOfSheet);
            }
            return reasons;
        }
        let Some(sheet_id) = command.sheet_id() else {
            return Vec::new();
        };
        let Some(sheet) = self.sheets.get(sheet_id) else {
            return vec![CommandError::InvalidSheetId];
        };
        let mut reasons = Self::check_targets(sheet, command);
        reasons.extend(Self::check_structure(sheet, command));
        match command {
            Command::DeleteSheet { .. } if self.order.len() <= 1 => {
                reasons.push(CommandError::NotEnoughSheets);
            }
            Command::DuplicateSheet {
                new_sheet_id, name, ..
            } => {
                if self.sheets.contains_key(new_sheet_id) {
                    reasons.push(CommandError::DuplicatedSheetId);
                }
                reasons.extend(self.check_new_name(name, None));
            }
            Command::RenameSheet { sheet_id, name } => {
                reasons.extend(self.check_new_name(name, Some(sheet_id)));
            }
            Command::MoveSheet { sheet_id, delta } => {
                let index = self.order.iter().position(|id| id == sheet_id).unwrap_or(0) as i64;
                let target = index + *delta as i64;
                if *delta == 0 || target < 0 || target >= self.order.len() as i64 {
                    reasons.push(CommandError::WrongSheetMove);
                }
            }
            _ => {}
        }
        reasons
    }

    fn handle(&mut self, command: &Command, ctx: &mut ExecContext<'_>) {
        match command {
            Command::CreateSheet {
                sheet_id,
                name,
                position,
                rows,
                cols,
            } => {
                let sheet = Sheet {
                    id: sheet_id.clone(),
                    name: name.trim().to_string(),
                    rows: rows.unwrap_or(self.default_size.0),
                    cols: cols.unwrap_or(self.default_size.1),
                };
                self.set_sheet(sheet_id, Some(sheet), ctx);
                let mut order = self.order.clone();
                let index = position.unwrap_or(order.len()).min(order.len());
                order.insert(index, sheet_id.clone());
                self.set_order(order, ctx);
            }
            Command::DeleteSheet { sheet_id } => {
                self.set_sheet(sheet_id, None, ctx);
                let order = self.order.iter().filter(|id| *id != sheet_id).cloned().collect();
                self.set_order(order, ctx);
            }
            Command::DuplicateSheet {
                sheet_id,
                new_sheet_id,
                name,
            } => {
                let Some(source) = self.sheets.get(sheet_id).cloned() else {
                    return;
                };
                let copy = Sheet {
                    id: new_sheet_id.clone(),
                    name: name.trim().to_string(),
                    ..source
                };
                self.set_sheet(new_sheet_id, Some(copy), ctx);
                let mut order = self.order.clone();
                let index = order.iter().position(|id| id == sheet_id).map_or(order.len(), |i| i + 1);
                order.insert(index, new_sheet_id.clone());
                self.set_order(order, ctx);
            }
            Command::RenameSheet { sheet_id, name } => {
                if let Some(mut sheet) = self.sheets.get(sheet_id).cloned() {
                    sheet.name = name.trim().to_string();
                    self.set_sheet(sheet_id, Some(sheet), ctx);
                }
            }
            Command::MoveSheet { sheet_id, delta } => {
                let mut order = self.order.clone();
                if let Some(index) = order.iter().position(|id| id == sheet_id) {
                    let id = order.remove(index);
                    let target = (index as i64 + *delta as i64).clamp(0, order.len() as i64) as usize;
                    order.insert(target, id);
                    self.set_order(order, ctx);
                }
            }
            Command::AddColumnsRows {
                sheet_id,
                dimension,
                quantity,
                ..
            } => self.resize(sheet_id, *dimension, *quantity as i64, ctx),
            Command::RemoveColumnsRows {
                sheet_id,
                dimension,
                elements,
            } => {
                let mut unique = elements.clone();
                unique.sort_unstable();
                unique.dedup();
                self.resize(sheet_id, *dimension, -(unique.len() as i64), ctx);
            }
            _ => {}
        }
    }

    fn apply_patch(&mut self, patch: &StatePatch, direction: Direction) {
        match patch {
            StatePatch::Sheets(SheetsPatch::Sheet(change)) => change.apply_to(&mut self.sheets, direction),
            StatePatch::Sheets(SheetsPatch::Order(change)) => {
                self.order = change.value(direction).cloned().unwrap_or_default();
            }
            _ => {}
        }
    }

    fn export(&self, data: &mut WorkbookData) {
        data.sheets = self
            .sheets()
            .map(|sheet| SheetData::new(sheet.id.clone(), sheet.name.clone(), sheet.rows, sheet.cols))
            .collect();
    }

    fn import(&mut self, data: &WorkbookData) -> Result<()> {
        self.sheets.clear();
        self.order.clear();
        for sheet in &data.sheets {
            if validate_sheet_name(&sheet.name).is_some() {
                return Err(Error::invalid_document(format!(
                    "invalid sheet name '{}'",
                    sheet.name
                )));
            }
            self.sheets.insert(
                sheet.id.clone(),
                Sheet {
                    id: sheet.id.clone(),
                    name: sheet.name.clone(),
                    rows: sheet.rows,
                    cols: sheet.cols,
                },
            );
            self.order.push(sheet.id.clone());
        }
        Ok(())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}
