//! Active sheet and selection

use crate::command::{Command, CommandError};
use crate::plugin::{Getters, UiContext, UiPlugin, UiView};
use lattice_core::{CellPosition, SheetId, Zone};
use serde::{Deserialize, Serialize};
use std::any::Any;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MoveDirection {
    Left,
    Right,
    Up,
    Down,
}

/// Selected zones of the active sheet
///
/// `anchor` is the cell the cursor sits on; it always lies in one of `zones`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Selection {
    pub sheet_id: SheetId,
    pub anchor: CellPosition,
    pub zones: Vec<Zone>,
}

impl Selection {
    fn at(sheet_id: SheetId, anchor: CellPosition, zone: Zone) -> Self {
        Self {
            sheet_id,
            anchor,
            zones: vec![zone],
        }
    }
}

#[derive(Debug)]
pub struct SelectionPlugin {
    selection: Selection,
}

impl Default for SelectionPlugin {
    fn default() -> Self {
        Self {
            selection: Selection::at(SheetId::new(""), CellPosition::new(0, 0), Zone::single(0, 0)),
        }
    }
}

/// The cell's merge, or the cell alone
fn cell_zone(getters: &Getters<'_>, sheet_id: &SheetId, position: CellPosition) -> Zone {
    getters
        .merges()
        .merge_at(sheet_id, position)
        .unwrap_or_else(|| Zone::single(position.col, position.row))
}

fn in_sheet(getters: &Getters<'_>, sheet_id: &SheetId, position: CellPosition) -> bool {
    getters
        .sheet(sheet_id)
        .is_some_and(|sheet| position.col < sheet.cols && position.row < sheet.rows)
}

impl SelectionPlugin {
    pub fn selection(&self) -> &Selection {
        &self.selection
    }

    pub fn active_sheet_id(&self) -> &SheetId {
        &self.selection.sheet_id
    }

    fn select(&mut self, getters: &Getters<'_>, position: CellPosition) {
        let sheet_id = self.selection.sheet_id.clone();
        let zone = cell_zone(getters, &sheet_id, position);
        self.selection = Selection::at(sheet_id, position, zone);
    }

    fn moved_anchor(&self, getters: &Getters<'_>, direction: MoveDirection, step: i32) -> CellPosition {
        let anchor = self.selection.anchor;
        let Some(sheet) = getters.sheet(&self.selection.sheet_id) else {
            return anchor;
        };
        // leave the current merge before stepping
        let current = cell_zone(getters, &sheet.id, anchor);
        let clamp = |value: i64, size: u32| value.clamp(0, size as i64 - 1) as u32;
        let step = step as i64;
        match direction {
            MoveDirection::Left => CellPosition::new(clamp(current.left as i64 - step, sheet.cols), anchor.row),
            MoveDirection::Right => CellPosition::new(
                clamp(current.right_or_max() as i64 + step, sheet.cols),
                anchor.row,
            ),
            MoveDirection::Up => CellPosition::new(anchor.col, clamp(current.top as i64 - step, sheet.rows)),
            MoveDirection::Down => CellPosition::new(
                anchor.col,
                clamp(current.bottom_or_max() as i64 + step, sheet.rows),
            ),
        }
    }
}

impl UiPlugin for SelectionPlugin {
    fn name(&self) -> &'static str {
        "selection"
    }

    fn allow_dispatch(&self, command: &Command, view: &UiView<'_>) -> Vec<CommandError> {
        let getters = &view.getters;
        let sheet_id = &self.selection.sheet_id;
        match command {
            Command::SelectCell { col, row } => {
                if in_sheet(getters, sheet_id, CellPosition::new(*col, *row)) {
                    Vec::new()
                } else {
                    vec![CommandError::SelectionOutOfBound]
                }
            }
            Command::SetSelection { anchor, zones } => {
                if zones.is_empty() {
                    return vec![CommandError::EmptyRange];
                }
                let Some(sheet) = getters.sheet(sheet_id) else {
                    return vec![CommandError::SelectionOutOfBound];
                };
                let inside = zones.iter().all(|zone| sheet.contains_zone(zone))
                    && zones.iter().any(|zone| zone.contains_position(*anchor));
                if inside {
                    Vec::new()
                } else {
                    vec![CommandError::SelectionOutOfBound]
                }
            }
            Command::MoveCursor { step: 0, .. } => vec![CommandError::InvalidSelectionStep],
            Command::SelectAll if getters.sheet(sheet_id).is_none() => {
                vec![CommandError::SelectionOutOfBound]
            }
            _ => Vec::new(),
        }
    }

    fn handle(&mut self, command: &Command, ctx: &mut UiContext<'_>) {
        let getters = ctx.view.getters;
        match command {
            Command::ActivateSheet { sheet_id } => {
                self.selection.sheet_id = sheet_id.clone();
                self.select(&getters, CellPosition::new(0, 0));
            }
            Command::SelectCell { col, row } => self.select(&getters, CellPosition::new(*col, *row)),
            Command::SetSelection { anchor, zones } => {
                self.selection.anchor = *anchor;
                self.selection.zones = zones.clone();
            }
            Command::MoveCursor { direction, step } => {
                let anchor = self.moved_anchor(&getters, *direction, *step);
                self.select(&getters, anchor);
            }
            Command::SelectAll => {
                if let Some(sheet) = getters.sheet(&self.selection.sheet_id) {
                    self.selection.anchor = CellPosition::new(0, 0);
                    self.selection.zones = vec![sheet.zone()];
                }
            }
            _ => {}
        }
    }

    fn finalize(&mut self, view: &UiView<'_>) {
        let getters = view.getters;
        let sheet = match getters.sheet(&self.selection.sheet_id) {
            Some(sheet) => sheet,
            None => {
                let Some(first) = getters
                    .sheets()
                    .sheet_ids()
                    .first()
                    .and_then(|id| getters.sheet(id))
                else {
                    return;
                };
                log::debug!("active sheet is gone, activating {}", first.id);
                self.selection.sheet_id = first.id.clone();
                self.select(&getters, CellPosition::new(0, 0));
                return;
            }
        };
        let grid = sheet.zone();
        let mut zones: Vec<Zone> = self
            .selection
            .zones
            .iter()
            .filter_map(|zone| zone.bounded(sheet.rows, sheet.cols).intersection(&grid))
            .collect();
        let anchor = CellPosition::new(
            self.selection.anchor.col.min(sheet.cols - 1),
            self.selection.anchor.row.min(sheet.rows - 1),
        );
        if !zones.iter().any(|zone| zone.contains_position(anchor)) {
            zones = vec![cell_zone(&getters, &sheet.id, anchor)];
        }
        self.selection.anchor = anchor;
        self.selection.zones = zones;
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

    fn selected(engine: &Engine) -> (String, Vec<String>) {
        let selection = engine.selection();
        (
            selection.anchor.to_a1_string(),
            selection.zones.iter().map(Zone::to_a1_string).collect(),
        )
    }

    #[test]
    fn test_initial_selection_is_a1() {
        let engine = Engine::new();
        assert_eq!(selected(&engine), ("A1".to_string(), vec!["A1".to_string()]));
    }

    #[test]
    fn test_select_cell_expands_to_merge() {
        let mut engine = Engine::new();
        let sheet_id = engine.active_sheet_id();
        engine.dispatch(Command::AddMerge {
            sheet_id,
            target: vec![zone("B2:C3")],
            force: false,
        });
        assert!(engine.dispatch(Command::SelectCell { col: 1, row: 1 }).is_success());
        assert_eq!(selected(&engine).1, vec!["B2:C3"]);
        engine.dispatch(Command::MoveCursor {
            direction: MoveDirection::Right,
            step: 1,
        });
        assert_eq!(selected(&engine).0, "D2");
    }

    #[test]
    fn test_out_of_bound_and_invalid_step() {
        let mut engine = Engine::new();
        let result = engine.dispatch(Command::SelectCell { col: 26, row: 0 });
        assert!(result.is_rejected_by(CommandError::SelectionOutOfBound));
        let result = engine.dispatch(Command::MoveCursor {
            direction: MoveDirection::Down,
            step: 0,
        });
        assert!(result.is_rejected_by(CommandError::InvalidSelectionStep));
        let result = engine.dispatch(Command::SetSelection {
            anchor: pos("A1"),
            zones: Vec::new(),
        });
        assert!(result.is_rejected_by(CommandError::EmptyRange));
    }

    #[test]
    fn test_cursor_stops_at_sheet_edge() {
        let mut engine = Engine::new();
        engine.dispatch(Command::MoveCursor {
            direction: MoveDirection::Up,
            step: 3,
        });
        assert_eq!(selected(&engine).0, "A1");
        engine.dispatch(Command::MoveCursor {
            direction: MoveDirection::Right,
            step: 100,
        });
        assert_eq!(selected(&engine).0, "Z1");
    }

    #[test]
    fn test_selection_is_clamped_after_removal() {
        let mut engine = Engine::new();
        engine.dispatch(Command::SelectCell { col: 25, row: 0 });
        let sheet_id = engine.active_sheet_id();
        engine.dispatch(Command::RemoveColumnsRows {
            sheet_id,
            dimension: Dimension::Col,
            elements: vec![24, 25],
        });
        assert_eq!(selected(&engine), ("X1".to_string(), vec!["X1".to_string()]));
    }

    #[test]
    fn test_deleting_active_sheet_activates_first() {
        let mut engine = Engine::new();
        add_sheet(&mut engine, "s2", "Other");
        engine.dispatch(Command::ActivateSheet {
            sheet_id: SheetId::from("s2"),
        });
        assert_eq!(engine.active_sheet_id(), SheetId::from("s2"));
        engine.dispatch(Command::DeleteSheet {
            sheet_id: SheetId::from("s2"),
        });
        assert_eq!(engine.active_sheet_id(), SheetId::from("Sheet1"));
    }
}
