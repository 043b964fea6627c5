//! Floating figures
//!
//! A figure is attached to an anchor cell and placed at a pixel offset inside
//! it. Structural changes move the anchor; the offset only changes through
//! `UpdateFigure`. A figure whose anchor row or column is removed is deleted.

use crate::command::{Command, CommandError};
use crate::data::{FigureData, WorkbookData};
use crate::error::{Error, Result};
use crate::history::{Direction, StatePatch};
use crate::plugin::{CorePlugin, ExecContext, Getters, RangeAdaptation};
use crate::plugins::replace_sheet_list;
use ahash::AHashMap;
use lattice_core::{CellPosition, Dimension, SheetId, StructuralChange};
use serde::{Deserialize, Serialize};
use std::any::Any;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PixelOffset {
    pub x: u32,
    pub y: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Figure {
    pub id: String,
    pub anchor: CellPosition,
    #[serde(default)]
    pub offset: PixelOffset,
    pub width: u32,
    pub height: u32,
    /// Kind of content, e.g. "chart"
    #[serde(default)]
    pub tag: String,
}

impl Figure {
    pub fn new(id: impl Into<String>, anchor: CellPosition, width: u32, height: u32) -> Self {
        Self {
            id: id.into(),
            anchor,
            offset: PixelOffset::default(),
            width,
            height,
            tag: String::new(),
        }
    }
}

/// Anchor after a structural change, `None` when its row or column was removed
fn moved_anchor(anchor: CellPosition, change: &StructuralChange) -> Option<CellPosition> {
    match change.dimension() {
        Dimension::Col => change
            .map_index(anchor.col)
            .map(|col| CellPosition::new(col, anchor.row)),
        Dimension::Row => change
            .map_index(anchor.row)
            .map(|row| CellPosition::new(anchor.col, row)),
    }
}

#[derive(Debug, Default)]
pub struct FiguresPlugin {
    figures: AHashMap<SheetId, Vec<Figure>>,
}

impl FiguresPlugin {
    pub fn figures(&self, sheet_id: &SheetId) -> &[Figure] {
        self.figures.get(sheet_id).map_or(&[], Vec::as_slice)
    }

    pub fn figure(&self, sheet_id: &SheetId, id: &str) -> Option<&Figure> {
        self.figures(sheet_id).iter().find(|figure| figure.id == id)
    }

    fn set_figures(&mut self, sheet_id: &SheetId, figures: Vec<Figure>, ctx: &mut ExecContext<'_>) {
        if let Some(change) = replace_sheet_list(&mut self.figures, sheet_id, figures) {
            ctx.record(StatePatch::Figures(change));
        }
    }

    fn anchor_in_sheet(getters: &Getters<'_>, sheet_id: &SheetId, anchor: CellPosition) -> bool {
        getters
            .sheet(sheet_id)
            .is_some_and(|sheet| anchor.col < sheet.cols && anchor.row < sheet.rows)
    }
}

impl CorePlugin for FiguresPlugin {
    fn name(&self) -> &'static str {
        "figures"
    }

    fn allow_dispatch(&self, command: &Command, getters: &Getters<'_>) -> Vec<CommandError> {
        let mut reasons = Vec::new();
        match command {
            Command::CreateFigure { sheet_id, figure } => {
                if self.figure(sheet_id, &figure.id).is_some() {
                    reasons.push(CommandError::DuplicatedIdentifier);
                }
                if !Self::anchor_in_sheet(getters, sheet_id, figure.anchor) {
                    reasons.push(CommandError::TargetOutOfSheet);
                }
            }
            Command::UpdateFigure {
                sheet_id,
                id,
                anchor,
                ..
            } => {
                if self.figure(sheet_id, id).is_none() {
                    reasons.push(CommandError::EntityDoesNotExist);
                }
                if anchor.is_some_and(|anchor| !Self::anchor_in_sheet(getters, sheet_id, anchor)) {
                    reasons.push(CommandError::TargetOutOfSheet);
                }
            }
            Command::DeleteFigure { sheet_id, id } => {
                if self.figure(sheet_id, id).is_none() {
                    reasons.push(CommandError::EntityDoesNotExist);
                }
            }
            Command::CreateChart {
                sheet_id,
                figure_id,
                anchor,
                ..
            } => {
                if self.figure(sheet_id, figure_id).is_some() {
                    reasons.push(CommandError::DuplicatedIdentifier);
                }
                if !Self::anchor_in_sheet(getters, sheet_id, *anchor) {
                    reasons.push(CommandError::TargetOutOfSheet);
                }
            }
            _ => {}
        }
        reasons
    }

    fn adapt_ranges(&mut self, adaptation: &RangeAdaptation, ctx: &mut ExecContext<'_>) {
        let RangeAdaptation::Structural { sheet_id, change } = adaptation else {
            return;
        };
        let mut figures = Vec::new();
        for figure in self.figures(sheet_id) {
            match moved_anchor(figure.anchor, change) {
                Some(anchor) => figures.push(Figure {
                    anchor,
                    ..figure.clone()
                }),
                None => {
                    // stays in place until the queued deletion runs
                    figures.push(figure.clone());
                    ctx.dispatch(Command::DeleteFigure {
                        sheet_id: sheet_id.clone(),
                        id: figure.id.clone(),
                    });
                }
            }
        }
        self.set_figures(sheet_id, figures, ctx);
    }

    fn handle(&mut self, command: &Command, ctx: &mut ExecContext<'_>) {
        match command {
            Command::CreateFigure { sheet_id, figure } => {
                let mut figures = self.figures(sheet_id).to_vec();
                figures.push(figure.clone());
                self.set_figures(sheet_id, figures, ctx);
            }
            Command::UpdateFigure {
                sheet_id,
                id,
                anchor,
                offset,
                width,
                height,
            } => {
                let figures = self
                    .figures(sheet_id)
                    .iter()
                    .map(|figure| {
                        if &figure.id != id {
                            return figure.clone();
                        }
                        Figure {
                            id: figure.id.clone(),
                            anchor: anchor.unwrap_or(figure.anchor),
                            offset: offset.unwrap_or(figure.offset),
                            width: width.unwrap_or(figure.width),
                            height: height.unwrap_or(figure.height),
                            tag: figure.tag.clone(),
                        }
                    })
                    .collect();
                self.set_figures(sheet_id, figures, ctx);
            }
            Command::DeleteFigure { sheet_id, id } => {
                let figures = self
                    .figures(sheet_id)
                    .iter()
                    .filter(|figure| &figure.id != id)
                    .cloned()
                    .collect();
                self.set_figures(sheet_id, figures, ctx);
            }
            Command::DeleteSheet { sheet_id } => self.set_figures(sheet_id, Vec::new(), ctx),
            Command::DuplicateSheet {
                sheet_id,
                new_sheet_id,
                ..
            } => {
                let copy = self.figures(sheet_id).to_vec();
                self.set_figures(new_sheet_id, copy, ctx);
            }
            _ => {}
        }
    }

    fn apply_patch(&mut self, patch: &StatePatch, direction: Direction) {
        if let StatePatch::Figures(change) = patch {
            change.apply_to(&mut self.figures, direction);
        }
    }

    fn export(&self, data: &mut WorkbookData) {
        for sheet in &mut data.sheets {
            sheet.figures = self
                .figures(&sheet.id)
                .iter()
                .map(|figure| FigureData {
                    figure: figure.clone(),
                    chart: None,
                })
                .collect();
        }
    }

    fn import(&mut self, data: &WorkbookData) -> Result<()> {
        self.figures.clear();
        for sheet in &data.sheets {
            let mut figures: Vec<Figure> = Vec::new();
            for FigureData { figure, .. } in &sheet.figures {
                if figures.iter().any(|other| other.id == figure.id) {
                    return Err(Error::invalid_document(format!(
                        "duplicated figure id '{}' in sheet '{}'",
                        figure.id, sheet.name
                    )));
                }
                figures.push(figure.clone());
            }
            if !figures.is_empty() {
                self.figures.insert(sheet.id.clone(), figures);
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
    use pretty_assertions::assert_eq;

    fn create(engine: &mut Engine, id: &str, anchor: &str) -> crate::DispatchResult {
        let sheet_id = engine.active_sheet_id();
        let mut figure = Figure::new(id, pos(anchor), 200, 100);
        figure.offset = PixelOffset { x: 5, y: 7 };
        engine.dispatch(Command::CreateFigure { sheet_id, figure })
    }

    fn figure(engine: &Engine, id: &str) -> Option<Figure> {
        let sheet_id = engine.active_sheet_id();
        engine.getters().figures().figure(&sheet_id, id).cloned()
    }

    #[test]
    fn test_anchor_follows_insertions_and_keeps_offset() {
        let mut engine = Engine::new();
        assert!(create(&mut engine, "f1", "B2").is_success());
        let sheet_id = engine.active_sheet_id();
        engine.dispatch(Command::AddColumnsRows {
            sheet_id,
            dimension: Dimension::Row,
            base: 0,
            position: InsertPosition::Before,
            quantity: 2,
        });
        let moved = figure(&engine, "f1").unwrap();
        assert_eq!(moved.anchor, pos("B4"));
        assert_eq!(moved.offset, PixelOffset { x: 5, y: 7 });
    }

    #[test]
    fn test_removing_anchor_deletes_figure() {
        let mut engine = Engine::new();
        create(&mut engine, "f1", "B2");
        create(&mut engine, "f2", "D2");
        let sheet_id = engine.active_sheet_id();
        assert!(engine
            .dispatch(Command::RemoveColumnsRows {
                sheet_id,
                dimension: Dimension::Col,
                elements: vec![1],
            })
            .is_success());
        assert!(figure(&engine, "f1").is_none());
        assert_eq!(figure(&engine, "f2").unwrap().anchor, pos("C2"));
        engine.undo();
        assert_eq!(figure(&engine, "f1").unwrap().anchor, pos("B2"));
    }

    #[test]
    fn test_invalid_figure_commands() {
        let mut engine = Engine::new();
        create(&mut engine, "f1", "A1");
        assert!(create(&mut engine, "f1", "B1").is_rejected_by(CommandError::DuplicatedIdentifier));
        assert!(create(&mut engine, "f2", "ZZ1").is_rejected_by(CommandError::TargetOutOfSheet));
        let sheet_id = engine.active_sheet_id();
        let result = engine.dispatch(Command::DeleteFigure {
            sheet_id,
            id: "nope".into(),
        });
        assert!(result.is_rejected_by(CommandError::EntityDoesNotExist));
    }

    #[test]
    fn test_update_figure_keeps_unset_fields() {
        let mut engine = Engine::new();
        create(&mut engine, "f1", "A1");
        let sheet_id = engine.active_sheet_id();
        engine.dispatch(Command::UpdateFigure {
            sheet_id,
            id: "f1".into(),
            anchor: None,
            offset: None,
            width: Some(300),
            height: None,
        });
        let updated = figure(&engine, "f1").unwrap();
        assert_eq!((updated.width, updated.height), (300, 100));
        assert_eq!(updated.offset, PixelOffset { x: 5, y: 7 });
    }
}
