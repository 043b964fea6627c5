//! Cell content, style and number format
//!
//! Formulas are stored as text. When the grid changes structurally, or a sheet is
//! renamed or deleted, every formula in the document is rewritten so that its
//! references keep pointing at the same cells.

use crate::command::Command;
use crate::data::{CellData, WorkbookData};
use crate::error::{Error, Result};
use crate::history::{Change, Direction, StatePatch};
use crate::plugin::{CorePlugin, ExecContext, RangeAdaptation};
use ahash::AHashMap;
use lattice_core::formula::{
    adjust_formula, invalidate_sheet_in_formula, is_formula, rename_sheet_in_formula,
};
use lattice_core::{CellPosition, Dimension, SheetId, StructuralChange, Style, Zone};
use std::any::Any;
use std::collections::BTreeMap;

/// A non-empty cell
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Cell {
    /// Literal text or a formula starting with `=`
    pub content: String,
    pub style: Option<Style>,
    pub format: Option<String>,
}

impl Cell {
    pub fn is_empty(&self) -> bool {
        self.content.is_empty() && self.style.is_none() && self.format.is_none()
    }

    pub fn is_formula(&self) -> bool {
        is_formula(&self.content)
    }
}

type SheetCells = BTreeMap<CellPosition, Cell>;

#[derive(Debug, Clone, PartialEq)]
pub enum CellsPatch {
    Cell {
        sheet_id: SheetId,
        change: Change<CellPosition, Cell>,
    },
    Sheet(Change<SheetId, SheetCells>),
}

#[derive(Debug, Default)]
pub struct CellsPlugin {
    cells: AHashMap<SheetId, SheetCells>,
}

impl CellsPlugin {
    pub fn cell(&self, sheet_id: &SheetId, position: CellPosition) -> Option<&Cell> {
        self.cells.get(sheet_id)?.get(&position)
    }

    /// Raw content, empty for blank cells
    pub fn content(&self, sheet_id: &SheetId, position: CellPosition) -> &str {
        self.cell(sheet_id, position)
            .map_or("", |cell| cell.content.as_str())
    }

    /// Non-empty cells of a sheet
    pub fn sheet_cells(&self, sheet_id: &SheetId) -> impl Iterator<Item = (CellPosition, &Cell)> {
        self.cells
            .get(sheet_id)
            .into_iter()
            .flat_map(|cells| cells.iter().map(|(p, c)| (*p, c)))
    }

    /// Non-empty cells of a sheet lying inside `zone`
    pub fn cells_in_zone(&self, sheet_id: &SheetId, zone: &Zone) -> Vec<(CellPosition, &Cell)> {
        self.sheet_cells(sheet_id)
            .filter(|(position, _)| zone.contains_position(*position))
            .collect()
    }

    /// Every style set on a cell, for color collection
    fn set_cell(
        &mut self,
        sheet_id: &SheetId,
        position: CellPosition,
        cell: Cell,
        ctx: &mut ExecContext<'_>,
    ) {
        let after = (!cell.is_empty()).then_some(cell);
        let sheet = self.cells.entry(sheet_id.clone()).or_default();
        let before = match &after {
            Some(cell) => sheet.insert(position, cell.clone()),
            None => sheet.remove(&position),
        };
        if sheet.is_empty() {
            self.cells.remove(sheet_id);
        }
        if before != after {
            ctx.record(StatePatch::Cells(CellsPatch::Cell {
                sheet_id: sheet_id.clone(),
                change: Change::new(position, before, after),
            }));
        }
    }

    fn set_sheet(&mut self, sheet_id: &SheetId, cells: SheetCells, ctx: &mut ExecContext<'_>) {
        let after = (!cells.is_empty()).then_some(cells);
        let before = match &after {
            Some(cells) => self.cells.insert(sheet_id.clone(), cells.clone()),
            None => self.cells.remove(sheet_id),
        };
        if before != after {
            ctx.record(StatePatch::Cells(CellsPatch::Sheet(Change::new(
                sheet_id.clone(),
                before,
                after,
            ))));
        }
    }

    fn update_cells<F>(&mut self, sheet_id: &SheetId, zones: &[Zone], ctx: &mut ExecContext<'_>, f: F)
    where
        F: Fn(&mut Cell),
    {
        let Some(sheet) = ctx.getters.sheet(sheet_id) else {
            return;
        };
        let (rows, cols) = (sheet.rows, sheet.cols);
        for zone in zones {
            for position in zone.bounded(rows, cols).cells() {
                let mut cell = self.cell(sheet_id, position).cloned().unwrap_or_default();
                f(&mut cell);
                self.set_cell(sheet_id, position, cell, ctx);
            }
        }
    }

    /// Apply `f` to existing cells inside `zones`
    fn update_existing<F>(&mut self, sheet_id: &SheetId, zones: &[Zone], ctx: &mut ExecContext<'_>, f: F)
    where
        F: Fn(&mut Cell),
    {
        let positions: Vec<CellPosition> = self
            .sheet_cells(sheet_id)
            .map(|(position, _)| position)
            .filter(|position| zones.iter().any(|zone| zone.contains_position(*position)))
            .collect();
        for position in positions {
            if let Some(mut cell) = self.cell(sheet_id, position).cloned() {
                f(&mut cell);
                self.set_cell(sheet_id, position, cell, ctx);
            }
        }
    }

    /// Rewrite every formula with `f`, recording one change per touched cell
    fn rewrite_formulas<F>(&mut self, ctx: &mut ExecContext<'_>, f: F)
    where
        F: Fn(&SheetId, &str) -> String,
    {
        let mut updates = Vec::new();
        for (sheet_id, cells) in &self.cells {
            for (position, cell) in cells {
                if !cell.is_formula() {
                    continue;
                }
                let content = f(sheet_id, &cell.content);
                if content != cell.content {
                    updates.push((sheet_id.clone(), *position, content));
                }
            }
        }
        for (sheet_id, position, content) in updates {
            if let Some(mut cell) = self.cell(&sheet_id, position).cloned() {
                cell.content = content;
                self.set_cell(&sheet_id, position, cell, ctx);
            }
        }
    }

    fn move_cells(&mut self, sheet_id: &SheetId, change: &StructuralChange, ctx: &mut ExecContext<'_>) {
        let Some(cells) = self.cells.get(sheet_id) else {
            return;
        };
        let dimension = change.dimension();
        let moved: SheetCells = cells
            .iter()
            .filter_map(|(position, cell)| {
                let position = match dimension {
                    Dimension::Col => CellPosition::new(change.map_index(position.col)?, position.row),
                    Dimension::Row => CellPosition::new(position.col, change.map_index(position.row)?),
                };
                Some((position, cell.clone()))
            })
            .collect();
        self.set_sheet(sheet_id, moved, ctx);
    }
}

impl CorePlugin for CellsPlugin {
    fn name(&self) -> &'static str {
        "cells"
    }

    fn adapt_ranges(&mut self, adaptation: &RangeAdaptation, ctx: &mut ExecContext<'_>) {
        let getters = ctx.getters;
        match adaptation {
            RangeAdaptation::Structural { sheet_id, change } => {
                // references first, while positions still match the formulas' own sheet layout
                self.rewrite_formulas(ctx, |formula_sheet, formula| {
                    adjust_formula(formula, formula_sheet, sheet_id, change, |name| {
                        getters.sheet_id_by_name(name)
                    })
                });
                self.move_cells(sheet_id, change, ctx);
            }
            RangeAdaptation::SheetRenamed {
                old_name, new_name, ..
            } => {
                self.rewrite_formulas(ctx, |_, formula| {
                    rename_sheet_in_formula(formula, old_name, new_name)
                });
            }
            RangeAdaptation::SheetDeleted { sheet_id, name } => {
                self.rewrite_formulas(ctx, |formula_sheet, formula| {
                    if formula_sheet == sheet_id {
                        formula.to_string()
                    } else {
                        invalidate_sheet_in_formula(formula, name)
                    }
                });
            }
        }
    }

    fn handle(&mut self, command: &Command, ctx: &mut ExecContext<'_>) {
        match command {
            Command::UpdateCell {
                sheet_id,
                col,
                row,
                content,
                style,
                format,
            } => {
                let position = CellPosition::new(*col, *row);
                let mut cell = self.cell(sheet_id, position).cloned().unwrap_or_default();
                if let Some(content) = content {
                    cell.content = content.clone();
                }
                if let Some(style) = style {
                    cell.style = (!style.is_empty()).then(|| style.clone());
                }
                if let Some(format) = format {
                    cell.format = (!format.is_empty()).then(|| format.clone());
                }
                self.set_cell(sheet_id, position, cell, ctx);
            }
            Command::ClearCell { sheet_id, col, row } => {
                self.set_cell(sheet_id, CellPosition::new(*col, *row), Cell::default(), ctx);
            }
            Command::DeleteContent { sheet_id, target } => {
                self.update_existing(sheet_id, target, ctx, |cell| cell.content.clear());
            }
            Command::SetFormatting {
                sheet_id,
                target,
                style,
                format,
            } => {
                self.update_cells(sheet_id, target, ctx, |cell| {
                    if let Some(style) = style {
                        let merged = cell.style.clone().unwrap_or_default().merged(style);
                        cell.style = (!merged.is_empty()).then_some(merged);
                    }
                    if let Some(format) = format {
                        cell.format = (!format.is_empty()).then(|| format.clone());
                    }
                });
            }
            Command::ClearFormatting { sheet_id, target } => {
                self.update_existing(sheet_id, target, ctx, |cell| {
                    cell.style = None;
                    cell.format = None;
                });
            }
            Command::DeleteSheet { sheet_id } => {
                self.set_sheet(sheet_id, SheetCells::new(), ctx);
            }
            Command::DuplicateSheet {
                sheet_id,
                new_sheet_id,
                ..
            } => {
                let copy = self.cells.get(sheet_id).cloned().unwrap_or_default();
                self.set_sheet(new_sheet_id, copy, ctx);
            }
            _ => {}
        }
    }

    fn apply_patch(&mut self, patch: &StatePatch, direction: Direction) {
        match patch {
            StatePatch::Cells(CellsPatch::Cell { sheet_id, change }) => {
                let sheet = self.cells.entry(sheet_id.clone()).or_default();
                change.apply_to_tree(sheet, direction);
                if sheet.is_empty() {
                    self.cells.remove(sheet_id);
                }
            }
            StatePatch::Cells(CellsPatch::Sheet(change)) => change.apply_to(&mut self.cells, direction),
            _ => {}
        }
    }

    fn export(&self, data: &mut WorkbookData) {
        for sheet in &mut data.sheets {
            let Some(cells) = self.cells.get(&sheet.id) else {
                continue;
            };
            sheet.cells = cells
                .iter()
                .map(|(position, cell)| {
                    (
                        position.to_a1_string(),
                        CellData {
                            content: cell.content.clone(),
                            style: cell.style.clone(),
                            format: cell.format.clone(),
                        },
                    )
                })
                .collect();
        }
    }

    fn import(&mut self, data: &WorkbookData) -> Result<()> {
        self.cells.clear();
        for sheet in &data.sheets {
            let mut cells = SheetCells::new();
            for (xc, cell) in &sheet.cells {
                let position = CellPosition::parse(xc)?;
                if position.row >= sheet.rows || position.col >= sheet.cols {
                    return Err(Error::invalid_document(format!(
                        "cell {} is outside sheet '{}'",
                        xc, sheet.name
                    )));
                }
                let cell = Cell {
                    content: cell.content.clone(),
                    style: cell.style.clone().filter(|style| !style.is_empty()),
                    format: cell.format.clone().filter(|format| !format.is_empty()),
                };
                if !cell.is_empty() {
                    cells.insert(position, cell);
                }
            }
            if !cells.is_empty() {
                self.cells.insert(sheet.id.clone(), cells);
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
    use lattice_core::InsertPosition;

    #[test]
    fn test_update_and_clear() {
        let mut engine = Engine::new();
        set(&mut engine, "B2", "hello");
        assert_eq!(content(&engine, "B2"), "hello");
        let sheet_id = engine.active_sheet_id();
        engine.dispatch(Command::ClearCell {
            sheet_id,
            col: 1,
            row: 1,
        });
        assert_eq!(content(&engine, "B2"), "");
    }

    #[test]
    fn test_delete_content_keeps_style() {
        let mut engine = Engine::new();
        let sheet_id = engine.active_sheet_id();
        engine.dispatch(Command::UpdateCell {
            sheet_id: sheet_id.clone(),
            col: 0,
            row: 0,
            content: Some("x".into()),
            style: Some(Style::new().bold(true)),
            format: None,
        });
        engine.dispatch(Command::DeleteContent {
            sheet_id: sheet_id.clone(),
            target: vec![zone("A:A")],
        });
        let cell = engine.getters().cells().cell(&sheet_id, pos("A1")).cloned().unwrap();
        assert_eq!(cell.content, "");
        assert_eq!(cell.style, Some(Style::new().bold(true)));
    }

    #[test]
    fn test_set_formatting_layers_style() {
        let mut engine = Engine::new();
        let sheet_id = engine.active_sheet_id();
        engine.dispatch(Command::SetFormatting {
            sheet_id: sheet_id.clone(),
            target: vec![zone("A1:B1")],
            style: Some(Style::new().bold(true)),
            format: Some("0.00".into()),
        });
        engine.dispatch(Command::SetFormatting {
            sheet_id: sheet_id.clone(),
            target: vec![zone("B1")],
            style: Some(Style::new().italic(true)),
            format: None,
        });
        let cell = engine.getters().cells().cell(&sheet_id, pos("B1")).cloned().unwrap();
        assert_eq!(cell.style, Some(Style::new().bold(true).italic(true)));
        assert_eq!(cell.format.as_deref(), Some("0.00"));
    }

    #[test]
    fn test_insert_row_moves_cells_and_formulas() {
        let mut engine = Engine::new();
        set(&mut engine, "A2", "2");
        set(&mut engine, "B5", "=A2*$A$2");
        let sheet_id = engine.active_sheet_id();
        engine.dispatch(Command::AddColumnsRows {
            sheet_id,
            dimension: Dimension::Row,
            base: 0,
            position: InsertPosition::Before,
            quantity: 2,
        });
        assert_eq!(content(&engine, "A4"), "2");
        assert_eq!(content(&engine, "B7"), "=A4*$A$4");
        assert_eq!(content(&engine, "A2"), "");
    }

    #[test]
    fn test_removed_reference_becomes_ref_error() {
        let mut engine = Engine::new();
        set(&mut engine, "C1", "=A1");
        let sheet_id = engine.active_sheet_id();
        engine.dispatch(Command::RemoveColumnsRows {
            sheet_id,
            dimension: Dimension::Col,
            elements: vec![0],
        });
        assert_eq!(content(&engine, "B1"), "=#REF!");
    }

    #[test]
    fn test_sheet_rename_and_delete_rewrite_formulas() {
        let mut engine = Engine::new();
        add_sheet(&mut engine, "s2", "Data");
        set(&mut engine, "A1", "=Data!B2");
        engine.dispatch(Command::RenameSheet {
            sheet_id: SheetId::from("s2"),
            name: "Numbers".into(),
        });
        assert_eq!(content(&engine, "A1"), "=Numbers!B2");
        engine.dispatch(Command::DeleteSheet {
            sheet_id: SheetId::from("s2"),
        });
        assert_eq!(content(&engine, "A1"), "=#REF!");
        engine.undo();
        assert_eq!(content(&engine, "A1"), "=Numbers!B2");
    }

    #[test]
    fn test_evaluated_value_follows_references() {
        let mut engine = Engine::new();
        set(&mut engine, "A1", "=B1");
        set(&mut engine, "B1", "42");
        let sheet_id = engine.active_sheet_id();
        assert_eq!(
            engine.getters().evaluated_value(&sheet_id, pos("A1")),
            lattice_core::CellValue::Number(42.0)
        );
    }

    #[test]
    fn test_circular_reference_terminates() {
        let mut engine = Engine::new();
        set(&mut engine, "A1", "=B1");
        set(&mut engine, "B1", "=A1");
        let sheet_id = engine.active_sheet_id();
        assert!(engine.getters().evaluated_value(&sheet_id, pos("A1")).is_error());
    }
}
