//! Copy, cut and paste
//!
//! `Copy` and `Cut` capture a [`ClipboardSnapshot`] of the selection. `Paste`
//! plans the commands that write the snapshot at the target and dispatches them
//! as derived commands of the paste, so a paste is one undoable step.
//!
//! A copied formula is rebased by the distance between source and destination.
//! A cut moves content: formulas are written unchanged and the source is
//! cleared, then the clipboard empties itself.

mod paste;
mod snapshot;

pub use paste::paste_placements;
pub use snapshot::{aligned_layout, ClipboardCell, ClipboardOperation, ClipboardSnapshot, CopiedRule, CopiedZone, Placement};

use crate::command::{Command, CommandError};
use crate::plugin::{UiContext, UiPlugin, UiView};
use serde::{Deserialize, Serialize};
use std::any::Any;

/// What a paste writes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum PasteMode {
    /// Content, format, borders, merges and rules
    #[default]
    All,
    /// Style, number format, borders and conditional formats
    OnlyFormat,
    /// Evaluated values only
    OnlyValue,
}

#[derive(Debug, Default)]
pub struct ClipboardPlugin {
    snapshot: Option<ClipboardSnapshot>,
    in_paste: bool,
}

impl ClipboardPlugin {
    pub fn snapshot(&self) -> Option<&ClipboardSnapshot> {
        self.snapshot.as_ref()
    }

    pub fn is_empty(&self) -> bool {
        self.snapshot.is_none()
    }
}

impl UiPlugin for ClipboardPlugin {
    fn name(&self) -> &'static str {
        "clipboard"
    }

    fn allow_dispatch(&self, command: &Command, view: &UiView<'_>) -> Vec<CommandError> {
        let Some(selection) = view.selection() else {
            return Vec::new();
        };
        let getters = &view.getters;
        let Some(sheet) = getters.sheet(&selection.sheet_id) else {
            return Vec::new();
        };
        match command {
            Command::Copy { target } | Command::Cut { target } => {
                if target.is_empty() {
                    return vec![CommandError::EmptyRange];
                }
                let mut reasons = Vec::new();
                if target.iter().any(|zone| !sheet.contains_zone(zone)) {
                    reasons.push(CommandError::TargetOutOfSheet);
                }
                if matches!(command, Command::Cut { .. }) && target.len() > 1 {
                    reasons.push(CommandError::WrongCutSelection);
                }
                let bounded: Vec<_> = target
                    .iter()
                    .map(|zone| zone.bounded(sheet.rows, sheet.cols))
                    .collect();
                if aligned_layout(&bounded).is_none() {
                    reasons.push(CommandError::WrongCopySelection);
                }
                reasons
            }
            Command::Paste {
                target,
                mode,
                force,
            } => match &self.snapshot {
                None => vec![CommandError::EmptyClipboard],
                Some(snapshot) => paste::check_paste(snapshot, sheet, target, *mode, *force, getters),
            },
            _ => Vec::new(),
        }
    }

    fn handle(&mut self, command: &Command, ctx: &mut UiContext<'_>) {
        let getters = ctx.view.getters;
        let Some(sheet_id) = ctx.view.selection().map(|selection| selection.sheet_id.clone()) else {
            return;
        };
        match command {
            Command::Copy { target } | Command::Cut { target } => {
                let operation = match command {
                    Command::Cut { .. } => ClipboardOperation::Cut,
                    _ => ClipboardOperation::Copy,
                };
                self.snapshot = ClipboardSnapshot::capture(operation, &sheet_id, target, &getters);
                log::debug!("{:?} of {} zone(s) on {}", operation, target.len(), sheet_id);
            }
            Command::Paste { target, mode, .. } => {
                let (Some(snapshot), Some(sheet)) = (&self.snapshot, getters.sheet(&sheet_id)) else {
                    return;
                };
                self.in_paste = true;
                for derived in paste::plan_paste(snapshot, sheet, target, *mode, &getters) {
                    ctx.dispatch(derived);
                }
            }
            Command::ClearClipboard => self.snapshot = None,
            Command::DeleteSheet { sheet_id: deleted } => {
                if self.snapshot.as_ref().is_some_and(|s| s.is_cut() && &s.sheet_id == deleted) {
                    self.snapshot = None;
                }
            }
            _ => {
                let Some((changed, _)) = command.structural_change() else {
                    return;
                };
                let cut_source = self
                    .snapshot
                    .as_ref()
                    .is_some_and(|s| s.is_cut() && &s.sheet_id == changed);
                if cut_source && !self.in_paste {
                    log::debug!("structure of the cut source changed, clipboard cleared");
                    self.snapshot = None;
                }
            }
        }
    }

    fn finalize(&mut self, _view: &UiView<'_>) {
        self.in_paste = false;
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plugins::conditional_format::{CfRule, ConditionalFormat};
    use crate::test_util::*;
    use crate::Engine;
    use lattice_core::{Color, Dimension, InsertPosition, Style, Zone};
    use pretty_assertions::assert_eq;

    fn copy(engine: &mut Engine, xcs: &[&str]) -> crate::DispatchResult {
        engine.dispatch(Command::Copy {
            target: xcs.iter().map(|xc| zone(xc)).collect(),
        })
    }

    fn cut(engine: &mut Engine, xc: &str) -> crate::DispatchResult {
        engine.dispatch(Command::Cut {
            target: vec![zone(xc)],
        })
    }

    fn paste(engine: &mut Engine, xc: &str, mode: PasteMode) -> crate::DispatchResult {
        engine.dispatch(Command::Paste {
            target: vec![zone(xc)],
            mode,
            force: false,
        })
    }

    #[test]
    fn test_copy_paste_rebases_formulas() {
        let mut engine = Engine::new();
        set(&mut engine, "A1", "1");
        set(&mut engine, "B1", "=A1");
        copy(&mut engine, &["B1"]);
        assert!(paste(&mut engine, "C3", PasteMode::All).is_success());
        assert_eq!(content(&engine, "C3"), "=B3");
        assert_eq!(content(&engine, "B1"), "=A1");
    }

    #[test]
    fn test_cut_paste_moves_without_rebasing() {
        let mut engine = Engine::new();
        set(&mut engine, "B1", "=A1");
        cut(&mut engine, "B1");
        assert!(paste(&mut engine, "D4", PasteMode::All).is_success());
        assert_eq!(content(&engine, "D4"), "=A1");
        assert_eq!(content(&engine, "B1"), "");
        assert!(engine.clipboard().is_empty());
        let again = paste(&mut engine, "E5", PasteMode::All);
        assert!(again.is_rejected_by(CommandError::EmptyClipboard));
    }

    #[test]
    fn test_paste_is_one_undo_step() {
        let mut engine = Engine::new();
        set(&mut engine, "A1", "x");
        cut(&mut engine, "A1");
        paste(&mut engine, "B2", PasteMode::All);
        engine.undo();
        assert_eq!(content(&engine, "A1"), "x");
        assert_eq!(content(&engine, "B2"), "");
    }

    #[test]
    fn test_paste_tiles_multiples_of_the_block() {
        let mut engine = Engine::new();
        set(&mut engine, "A1", "a");
        set(&mut engine, "A2", "b");
        copy(&mut engine, &["A1:A2"]);
        paste(&mut engine, "C1:D4", PasteMode::All);
        for xc in ["C1", "D1", "C3", "D3"] {
            assert_eq!(content(&engine, xc), "a");
        }
        assert_eq!(content(&engine, "D4"), "b");
        let selection = engine.selection();
        assert_eq!(selection.zones, vec![zone("C1:D4")]);
    }

    #[test]
    fn test_paste_at_top_left_when_not_a_multiple() {
        let mut engine = Engine::new();
        set(&mut engine, "A1", "a");
        set(&mut engine, "A2", "b");
        copy(&mut engine, &["A1:A2"]);
        paste(&mut engine, "C1:C3", PasteMode::All);
        assert_eq!(content(&engine, "C2"), "b");
        assert_eq!(content(&engine, "C3"), "");
    }

    #[test]
    fn test_only_value_and_only_format() {
        let mut engine = Engine::new();
        set(&mut engine, "A1", "3");
        set(&mut engine, "B1", "=A1");
        let sheet_id = engine.active_sheet_id();
        engine.dispatch(Command::SetFormatting {
            sheet_id: sheet_id.clone(),
            target: vec![zone("B1")],
            style: Some(Style::new().bold(true)),
            format: None,
        });
        copy(&mut engine, &["B1"]);
        paste(&mut engine, "C1", PasteMode::OnlyValue);
        assert_eq!(content(&engine, "C1"), "3");
        assert!(engine.getters().cells().cell(&sheet_id, pos("C1")).unwrap().style.is_none());
        set(&mut engine, "D1", "keep");
        paste(&mut engine, "D1", PasteMode::OnlyFormat);
        let cell = engine.getters().cells().cell(&sheet_id, pos("D1")).cloned().unwrap();
        assert_eq!(cell.content, "keep");
        assert_eq!(cell.style, Some(Style::new().bold(true)));
    }

    #[test]
    fn test_cut_rejects_other_modes() {
        let mut engine = Engine::new();
        set(&mut engine, "A1", "x");
        cut(&mut engine, "A1");
        assert!(paste(&mut engine, "B1", PasteMode::OnlyValue).is_rejected_by(CommandError::WrongPasteOption));
    }

    #[test]
    fn test_selection_shapes() {
        let mut engine = Engine::new();
        assert!(copy(&mut engine, &["A1:B2", "C3:D4"]).is_rejected_by(CommandError::WrongCopySelection));
        assert!(copy(&mut engine, &["A1:B2", "A4:B4"]).is_success());
        let result = engine.dispatch(Command::Cut {
            target: vec![zone("A1"), zone("A2")],
        });
        assert!(result.is_rejected_by(CommandError::WrongCutSelection));
    }

    fn paste_zones(engine: &mut Engine, xcs: &[&str], mode: PasteMode) -> crate::DispatchResult {
        engine.dispatch(Command::Paste {
            target: xcs.iter().map(|xc| zone(xc)).collect(),
            mode,
            force: false,
        })
    }

    /// Several copied zones go to one cell or to as many target zones
    #[test]
    fn test_multi_zone_paste_shapes() {
        let mut engine = Engine::new();
        set(&mut engine, "A1", "1");
        set(&mut engine, "A3", "3");
        copy(&mut engine, &["A1", "A3"]);
        for shape in [&["C1:C4"][..], &["C1", "E1", "G1"][..]] {
            let result = paste_zones(&mut engine, shape, PasteMode::All);
            assert_eq!(result.reasons(), &[CommandError::WrongPasteShape]);
        }
        assert_eq!(content(&engine, "C1"), "");

        assert!(paste_zones(&mut engine, &["E1", "C1"], PasteMode::All).is_success());
        assert_eq!(content(&engine, "C1"), "1");
        assert_eq!(content(&engine, "E1"), "3");
        assert_eq!(content(&engine, "C2"), "");
        assert_eq!(content(&engine, "E2"), "");
    }

    /// Each copied zone brings only its own merges
    #[test]
    fn test_zone_by_zone_paste_keeps_merges_apart() {
        let mut engine = Engine::new();
        let sheet_id = engine.active_sheet_id();
        engine.dispatch(Command::AddMerge {
            sheet_id: sheet_id.clone(),
            target: vec![zone("A3:B3")],
            force: false,
        });
        set(&mut engine, "A3", "wide");
        copy(&mut engine, &["A1:B1", "A3:B3"]);
        assert!(paste_zones(&mut engine, &["D1:E1", "D5:E5"], PasteMode::All).is_success());
        assert_eq!(content(&engine, "D5"), "wide");
        assert_eq!(content(&engine, "D2"), "");
        let merges: Vec<String> = engine.getters().merges().merges(&sheet_id).iter().map(Zone::to_a1_string).collect();
        assert_eq!(merges, vec!["A3:B3", "D5:E5"]);
    }

    /// Independent problems are reported together
    #[test]
    fn test_selection_reasons_combine() {
        let mut engine = Engine::new();
        let result = engine.dispatch(Command::Cut {
            target: vec![zone("A1"), zone("A500")],
        });
        assert_eq!(
            result.reasons(),
            &[CommandError::TargetOutOfSheet, CommandError::WrongCutSelection]
        );

        set(&mut engine, "A1", "x");
        cut(&mut engine, "A1");
        let result = paste_zones(&mut engine, &["C1", "E1"], PasteMode::OnlyValue);
        assert_eq!(
            result.reasons(),
            &[CommandError::WrongPasteOption, CommandError::WrongPasteShape]
        );
    }

    #[test]
    fn test_stacked_copy_pastes_contiguously() {
        let mut engine = Engine::new();
        set(&mut engine, "A1", "1");
        set(&mut engine, "A3", "3");
        copy(&mut engine, &["A1", "A3"]);
        paste(&mut engine, "C1", PasteMode::All);
        assert_eq!(content(&engine, "C1"), "1");
        assert_eq!(content(&engine, "C2"), "3");
    }

    #[test]
    fn test_paste_over_merge_needs_confirmation() {
        let mut engine = Engine::new();
        let sheet_id = engine.active_sheet_id();
        set(&mut engine, "A1", "x");
        engine.dispatch(Command::AddMerge {
            sheet_id: sheet_id.clone(),
            target: vec![zone("C1:D2")],
            force: false,
        });
        copy(&mut engine, &["A1"]);
        assert!(paste(&mut engine, "D2", PasteMode::All).is_rejected_by(CommandError::WillRemoveExistingMerge));
        let forced = engine.dispatch(Command::Paste {
            target: vec![zone("D2")],
            mode: PasteMode::All,
            force: true,
        });
        assert!(forced.is_success());
        assert!(engine.getters().merges().merges(&sheet_id).is_empty());
        assert_eq!(content(&engine, "D2"), "x");
    }

    #[test]
    fn test_merges_and_rules_travel_with_copy() {
        let mut engine = Engine::new();
        let sheet_id = engine.active_sheet_id();
        engine.dispatch(Command::AddMerge {
            sheet_id: sheet_id.clone(),
            target: vec![zone("A1:B1")],
            force: false,
        });
        engine.dispatch(Command::AddConditionalFormat {
            sheet_id: sheet_id.clone(),
            cf: ConditionalFormat::new("cf1", CfRule::IsNotEmpty, Style::new().fill_color(Color::RED)),
            ranges: vec!["A1:B2".into()],
        });
        copy(&mut engine, &["A1:B1"]);
        assert!(paste(&mut engine, "A5", PasteMode::All).is_success());
        let getters = engine.getters();
        let merges: Vec<String> = getters.merges().merges(&sheet_id).iter().map(Zone::to_a1_string).collect();
        assert_eq!(merges, vec!["A1:B1", "A5:B5"]);
        let cf = getters.conditional_formats().conditional_format(&sheet_id, "cf1").unwrap();
        let ranges: Vec<String> = cf.ranges.iter().map(|r| getters.range_to_xc(r, &sheet_id)).collect();
        assert_eq!(ranges, vec!["A1:B2", "A5:B5"]);
    }

    #[test]
    fn test_paste_grows_the_sheet() {
        let mut engine = Engine::new();
        set(&mut engine, "A1", "a");
        set(&mut engine, "A2", "b");
        copy(&mut engine, &["A1:A2"]);
        assert!(paste(&mut engine, "A100", PasteMode::All).is_success());
        let sheet_id = engine.active_sheet_id();
        assert_eq!(engine.getters().sheet(&sheet_id).unwrap().rows, 101);
        assert_eq!(content(&engine, "A101"), "b");
    }

    #[test]
    fn test_structural_change_on_cut_source_clears_clipboard() {
        let mut engine = Engine::new();
        set(&mut engine, "A1", "x");
        cut(&mut engine, "A1");
        let sheet_id = engine.active_sheet_id();
        engine.dispatch(Command::AddColumnsRows {
            sheet_id,
            dimension: Dimension::Row,
            base: 0,
            position: InsertPosition::Before,
            quantity: 1,
        });
        assert!(engine.clipboard().is_empty());
    }
}
