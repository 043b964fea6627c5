//! Cell borders
//!
//! Borders are stored per cell. Inserting rows or columns inside a bordered
//! area extends the vertical (resp. horizontal) edges that run across the
//! insertion point, so a box drawn around a zone stays closed.

use crate::command::Command;
use crate::data::WorkbookData;
use crate::error::{Error, Result};
use crate::history::{Change, Direction, StatePatch};
use crate::plugin::{CorePlugin, ExecContext, RangeAdaptation};
use ahash::AHashMap;
use lattice_core::{
    Border, BorderEdge, CellPosition, Color, Dimension, InsertionNeighbours, SheetId,
    StructuralChange, Zone,
};
use serde::{Deserialize, Serialize};
use std::any::Any;
use std::collections::BTreeMap;

type SheetBorders = BTreeMap<CellPosition, Border>;

/// Which edges of a zone `SetZoneBorders` draws
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BorderPosition {
    /// Every edge of every cell
    All,
    /// Outline of the zone
    External,
    /// Inner horizontal and vertical lines
    Hv,
    /// Inner horizontal lines
    H,
    /// Inner vertical lines
    V,
    Left,
    Top,
    Right,
    Bottom,
    /// Remove every border in the zone
    Clear,
}

#[derive(Debug, Clone, PartialEq)]
pub enum BordersPatch {
    Cell {
        sheet_id: SheetId,
        change: Change<CellPosition, Border>,
    },
    Sheet(Change<SheetId, SheetBorders>),
}

#[derive(Debug, Default)]
pub struct BordersPlugin {
    borders: AHashMap<SheetId, SheetBorders>,
}

impl BordersPlugin {
    pub fn border(&self, sheet_id: &SheetId, position: CellPosition) -> Option<&Border> {
        self.borders.get(sheet_id)?.get(&position)
    }

    pub fn borders_in_zone(&self, sheet_id: &SheetId, zone: &Zone) -> Vec<(CellPosition, &Border)> {
        self.borders
            .get(sheet_id)
            .into_iter()
            .flat_map(|borders| borders.iter())
            .filter(|(position, _)| zone.contains_position(**position))
            .map(|(position, border)| (*position, border))
            .collect()
    }

    /// Colors used by the borders of a sheet, in cell order
    pub fn colors(&self, sheet_id: &SheetId) -> impl Iterator<Item = Color> + '_ {
        self.borders
            .get(sheet_id)
            .into_iter()
            .flat_map(|borders| borders.values())
            .flat_map(|border| border.colors())
    }

    fn set_border(
        &mut self,
        sheet_id: &SheetId,
        position: CellPosition,
        border: Option<Border>,
        ctx: &mut ExecContext<'_>,
    ) {
        let after = border.filter(|border| !border.is_empty());
        let sheet = self.borders.entry(sheet_id.clone()).or_default();
        let before = match &after {
            Some(border) => sheet.insert(position, border.clone()),
            None => sheet.remove(&position),
        };
        if sheet.is_empty() {
            self.borders.remove(sheet_id);
        }
        if before != after {
            ctx.record(StatePatch::Borders(BordersPatch::Cell {
                sheet_id: sheet_id.clone(),
                change: Change::new(position, before, after),
            }));
        }
    }

    fn set_sheet(&mut self, sheet_id: &SheetId, borders: SheetBorders, ctx: &mut ExecContext<'_>) {
        let after = (!borders.is_empty()).then_some(borders);
        let before = match &after {
            Some(borders) => self.borders.insert(sheet_id.clone(), borders.clone()),
            None => self.borders.remove(sheet_id),
        };
        if before != after {
            ctx.record(StatePatch::Borders(BordersPatch::Sheet(Change::new(
                sheet_id.clone(),
                before,
                after,
            ))));
        }
    }

    fn set_zone_borders(
        &mut self,
        sheet_id: &SheetId,
        zone: &Zone,
        position: BorderPosition,
        edge: Option<BorderEdge>,
        ctx: &mut ExecContext<'_>,
    ) {
        let (top, left) = (zone.top, zone.left);
        let (bottom, right) = (zone.bottom_or_max(), zone.right_or_max());
        for cell in zone.cells() {
            let mut border = match position {
                BorderPosition::Clear => Border::new(),
                _ => self.border(sheet_id, cell).cloned().unwrap_or_default(),
            };
            let (first_row, last_row) = (cell.row == top, cell.row == bottom);
            let (first_col, last_col) = (cell.col == left, cell.col == right);
            match position {
                BorderPosition::All => {
                    border.top = edge;
                    border.bottom = edge;
                    border.left = edge;
                    border.right = edge;
                }
                BorderPosition::External => {
                    if first_row {
                        border.top = edge;
                    }
                    if last_row {
                        border.bottom = edge;
                    }
                    if first_col {
                        border.left = edge;
                    }
                    if last_col {
                        border.right = edge;
                    }
                }
                BorderPosition::Hv | BorderPosition::H | BorderPosition::V => {
                    if position != BorderPosition::V {
                        if !first_row {
                            border.top = edge;
                        }
                        if !last_row {
                            border.bottom = edge;
                        }
                    }
                    if position != BorderPosition::H {
                        if !first_col {
                            border.left = edge;
                        }
                        if !last_col {
                            border.right = edge;
                        }
                    }
                }
                BorderPosition::Left if first_col => border.left = edge,
                BorderPosition::Top if first_row => border.top = edge,
                BorderPosition::Right if last_col => border.right = edge,
                BorderPosition::Bottom if last_row => border.bottom = edge,
                _ => {}
            }
            self.set_border(sheet_id, cell, Some(border), ctx);
        }
    }

    /// Borders remapped through a structural change, extended across inserted headers
    fn adapted_borders(borders: &SheetBorders, change: &StructuralChange) -> SheetBorders {
        let dimension = change.dimension();
        let mut moved: SheetBorders = borders
            .iter()
            .filter_map(|(position, border)| {
                let position = match dimension {
                    Dimension::Col => CellPosition::new(change.map_index(position.col)?, position.row),
                    Dimension::Row => CellPosition::new(position.col, change.map_index(position.row)?),
                };
                Some((position, border.clone()))
            })
            .collect();
        if let Some(neighbours) = change.insertion_neighbours() {
            let inherited = continuity_borders(&moved, &neighbours);
            moved.extend(inherited);
        }
        moved
    }
}

/// Edges that run across an insertion and must be drawn on the new cells
fn continuity_borders(borders: &SheetBorders, neighbours: &InsertionNeighbours) -> Vec<(CellPosition, Border)> {
    let Some(before) = neighbours.before else {
        return Vec::new();
    };
    let along = |position: &CellPosition| match neighbours.dimension {
        Dimension::Row => position.row,
        Dimension::Col => position.col,
    };
    let at = |index: u32, other: u32| match neighbours.dimension {
        Dimension::Row => CellPosition::new(other, index),
        Dimension::Col => CellPosition::new(index, other),
    };
    let mut inherited = Vec::new();
    for (position, border) in borders.iter().filter(|(p, _)| along(*p) == before) {
        let other = match neighbours.dimension {
            Dimension::Row => position.col,
            Dimension::Col => position.row,
        };
        let Some(next) = borders.get(&at(neighbours.after, other)) else {
            continue;
        };
        let mut new_border = Border::new();
        match neighbours.dimension {
            Dimension::Row => {
                new_border.left = border.left.filter(|_| border.left == next.left);
                new_border.right = border.right.filter(|_| border.right == next.right);
            }
            Dimension::Col => {
                new_border.top = border.top.filter(|_| border.top == next.top);
                new_border.bottom = border.bottom.filter(|_| border.bottom == next.bottom);
            }
        }
        if new_border.is_empty() {
            continue;
        }
        for index in neighbours.start..neighbours.start + neighbours.quantity {
            inherited.push((at(index, other), new_border.clone()));
        }
    }
    inherited
}

impl CorePlugin for BordersPlugin {
    fn name(&self) -> &'static str {
        "borders"
    }

    fn adapt_ranges(&mut self, adaptation: &RangeAdaptation, ctx: &mut ExecContext<'_>) {
        let RangeAdaptation::Structural { sheet_id, change } = adaptation else {
            return;
        };
        let Some(borders) = self.borders.get(sheet_id) else {
            return;
        };
        let adapted = Self::adapted_borders(borders, change);
        self.set_sheet(sheet_id, adapted, ctx);
    }

    fn handle(&mut self, command: &Command, ctx: &mut ExecContext<'_>) {
        match command {
            Command::SetBorder {
                sheet_id,
                col,
                row,
                border,
            } => self.set_border(sheet_id, CellPosition::new(*col, *row), border.clone(), ctx),
            Command::SetZoneBorders {
                sheet_id,
                target,
                position,
                edge,
            } => {
                let Some(sheet) = ctx.getters.sheet(sheet_id) else {
                    return;
                };
                let (rows, cols) = (sheet.rows, sheet.cols);
                for zone in target {
                    self.set_zone_borders(sheet_id, &zone.bounded(rows, cols), *position, *edge, ctx);
                }
            }
            Command::ClearFormatting { sheet_id, target } => {
                let positions: Vec<CellPosition> = target
                    .iter()
                    .flat_map(|zone| self.borders_in_zone(sheet_id, zone))
                    .map(|(position, _)| position)
                    .collect();
                for position in positions {
                    self.set_border(sheet_id, position, None, ctx);
                }
            }
            Command::DeleteSheet { sheet_id } => self.set_sheet(sheet_id, SheetBorders::new(), ctx),
            Command::DuplicateSheet {
                sheet_id,
                new_sheet_id,
                ..
            } => {
                let copy = self.borders.get(sheet_id).cloned().unwrap_or_default();
                self.set_sheet(new_sheet_id, copy, ctx);
            }
            _ => {}
        }
    }

    fn apply_patch(&mut self, patch: &StatePatch, direction: Direction) {
        match patch {
            StatePatch::Borders(BordersPatch::Cell { sheet_id, change }) => {
                let sheet = self.borders.entry(sheet_id.clone()).or_default();
                change.apply_to_tree(sheet, direction);
                if sheet.is_empty() {
                    self.borders.remove(sheet_id);
                }
            }
            StatePatch::Borders(BordersPatch::Sheet(change)) => change.apply_to(&mut self.borders, direction),
            _ => {}
        }
    }

    fn export(&self, data: &mut WorkbookData) {
        for sheet in &mut data.sheets {
            if let Some(borders) = self.borders.get(&sheet.id) {
                sheet.borders = borders
                    .iter()
                    .map(|(position, border)| (position.to_a1_string(), border.clone()))
                    .collect();
            }
        }
    }

    fn import(&mut self, data: &WorkbookData) -> Result<()> {
        self.borders.clear();
        for sheet in &data.sheets {
            let mut borders = SheetBorders::new();
            for (xc, border) in &sheet.borders {
                let position = CellPosition::parse(xc)?;
                if position.row >= sheet.rows || position.col >= sheet.cols {
                    return Err(Error::invalid_document(format!(
                        "border {} is outside sheet '{}'",
                        xc, sheet.name
                    )));
                }
                if !border.is_empty() {
                    borders.insert(position, border.clone());
                }
            }
            if !borders.is_empty() {
                self.borders.insert(sheet.id.clone(), borders);
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

    fn draw(engine: &mut Engine, xc: &str, position: BorderPosition) {
        let sheet_id = engine.active_sheet_id();
        let result = engine.dispatch(Command::SetZoneBorders {
            sheet_id,
            target: vec![zone(xc)],
            position,
            edge: Some(BorderEdge::thin()),
        });
        assert!(result.is_success());
    }

    fn border_at(engine: &Engine, xc: &str) -> Border {
        let sheet_id = engine.active_sheet_id();
        engine
            .getters()
            .borders()
            .border(&sheet_id, pos(xc))
            .cloned()
            .unwrap_or_default()
    }

    #[test]
    fn test_external_outline() {
        let mut engine = Engine::new();
        draw(&mut engine, "B2:C3", BorderPosition::External);
        let thin = Some(BorderEdge::thin());
        assert_eq!(border_at(&engine, "B2"), Border { top: thin, left: thin, ..Border::new() });
        assert_eq!(border_at(&engine, "C3"), Border { bottom: thin, right: thin, ..Border::new() });
        assert!(border_at(&engine, "D4").is_empty());
    }

    #[test]
    fn test_inner_lines() {
        let mut engine = Engine::new();
        draw(&mut engine, "A1:B2", BorderPosition::H);
        let b1 = border_at(&engine, "B1");
        assert!(b1.bottom.is_some());
        assert!(b1.top.is_none());
        assert!(b1.left.is_none());
    }

    #[test]
    fn test_clear_removes_borders() {
        let mut engine = Engine::new();
        draw(&mut engine, "A1:B2", BorderPosition::All);
        let sheet_id = engine.active_sheet_id();
        engine.dispatch(Command::SetZoneBorders {
            sheet_id,
            target: vec![zone("A1:A2")],
            position: BorderPosition::Clear,
            edge: None,
        });
        assert!(border_at(&engine, "A1").is_empty());
        assert!(!border_at(&engine, "B1").is_empty());
    }

    #[test]
    fn test_insertion_keeps_outline_closed() {
        let mut engine = Engine::new();
        draw(&mut engine, "B2:C3", BorderPosition::External);
        let sheet_id = engine.active_sheet_id();
        engine.dispatch(Command::AddColumnsRows {
            sheet_id,
            dimension: Dimension::Row,
            base: 1,
            position: InsertPosition::After,
            quantity: 1,
        });
        // rows 2..4 now; the new row 3 carries the side edges only
        let inserted = border_at(&engine, "B3");
        assert!(inserted.left.is_some());
        assert!(inserted.top.is_none());
        assert!(border_at(&engine, "C3").right.is_some());
        assert!(border_at(&engine, "B4").bottom.is_some());
    }

    #[test]
    fn test_insertion_outside_does_not_extend() {
        let mut engine = Engine::new();
        draw(&mut engine, "B2:C3", BorderPosition::External);
        let sheet_id = engine.active_sheet_id();
        engine.dispatch(Command::AddColumnsRows {
            sheet_id,
            dimension: Dimension::Row,
            base: 2,
            position: InsertPosition::After,
            quantity: 1,
        });
        assert!(border_at(&engine, "B4").is_empty());
    }
}
