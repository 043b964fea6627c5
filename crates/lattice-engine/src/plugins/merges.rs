//! Merged cells

use crate::command::{Command, CommandError};
use crate::data::WorkbookData;
use crate::error::{Error, Result};
use crate::history::{Direction, StatePatch};
use crate::plugin::{CorePlugin, ExecContext, Getters, RangeAdaptation};
use crate::plugins::replace_sheet_list;
use ahash::AHashMap;
use lattice_core::{adjust_zone, CellPosition, SheetId, Zone};
use std::any::Any;

#[derive(Debug, Default)]
pub struct MergesPlugin {
    merges: AHashMap<SheetId, Vec<Zone>>,
}

impl MergesPlugin {
    pub fn merges(&self, sheet_id: &SheetId) -> &[Zone] {
        self.merges.get(sheet_id).map_or(&[], Vec::as_slice)
    }

    /// The merge covering a cell
    pub fn merge_at(&self, sheet_id: &SheetId, position: CellPosition) -> Option<Zone> {
        self.merges(sheet_id)
            .iter()
            .find(|zone| zone.contains_position(position))
            .copied()
    }

    pub fn merges_intersecting(&self, sheet_id: &SheetId, zone: &Zone) -> Vec<Zone> {
        self.merges(sheet_id)
            .iter()
            .filter(|merge| merge.intersects(zone))
            .copied()
            .collect()
    }

    /// Whether a cell is hidden under a merge (covered but not its top-left cell)
    pub fn is_hidden(&self, sheet_id: &SheetId, position: CellPosition) -> bool {
        self.merge_at(sheet_id, position)
            .is_some_and(|zone| zone.top_left() != position)
    }

    fn set_merges(&mut self, sheet_id: &SheetId, merges: Vec<Zone>, ctx: &mut ExecContext<'_>) {
        if let Some(change) = replace_sheet_list(&mut self.merges, sheet_id, merges) {
            ctx.record(StatePatch::Merges(change));
        }
    }

    fn check_add(&self, sheet_id: &SheetId, target: &[Zone], force: bool, getters: &Getters<'_>) -> Vec<CommandError> {
        let mut reasons = Vec::new();
        for (i, zone) in target.iter().enumerate() {
            if target[..i].iter().any(|other| other.intersects(zone)) {
                reasons.push(CommandError::MergeOverlap);
            }
            if self
                .merges_intersecting(sheet_id, zone)
                .iter()
                .any(|merge| !merge.is_inside(zone))
            {
                reasons.push(CommandError::MergeOverlap);
            }
            if !force {
                let top_left = zone.top_left();
                let destructive = getters
                    .cells()
                    .cells_in_zone(sheet_id, zone)
                    .iter()
                    .any(|(position, cell)| *position != top_left && !cell.content.is_empty());
                if destructive {
                    reasons.push(CommandError::MergeIsDestructive);
                }
            }
        }
        reasons
    }
}

impl CorePlugin for MergesPlugin {
    fn name(&self) -> &'static str {
        "merges"
    }

    fn allow_dispatch(&self, command: &Command, getters: &Getters<'_>) -> Vec<CommandError> {
        match command {
            Command::AddMerge {
                sheet_id,
                target,
                force,
            } => self.check_add(sheet_id, target, *force, getters),
            Command::RemoveMerge { sheet_id, target } => {
                let found = target
                    .iter()
                    .any(|zone| !self.merges_intersecting(sheet_id, zone).is_empty());
                if found {
                    Vec::new()
                } else {
                    vec![CommandError::EntityDoesNotExist]
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
            .merges(sheet_id)
            .iter()
            .filter_map(|zone| adjust_zone(zone, change).apply_to(*zone))
            .filter(|zone| !zone.is_single_cell())
            .collect();
        self.set_merges(sheet_id, adapted, ctx);
    }

    fn handle(&mut self, command: &Command, ctx: &mut ExecContext<'_>) {
        match command {
            Command::AddMerge {
                sheet_id, target, ..
            } => {
                let mut merges: Vec<Zone> = self
                    .merges(sheet_id)
                    .iter()
                    .filter(|merge| !target.iter().any(|zone| merge.intersects(zone)))
                    .copied()
                    .collect();
                for zone in target.iter().filter(|zone| !zone.is_single_cell()) {
                    merges.push(*zone);
                    let top_left = zone.top_left();
                    let has_hidden_content = ctx
                        .getters
                        .cells()
                        .cells_in_zone(sheet_id, zone)
                        .iter()
                        .any(|(position, cell)| *position != top_left && !cell.content.is_empty());
                    if has_hidden_content {
                        ctx.dispatch(Command::DeleteContent {
                            sheet_id: sheet_id.clone(),
                            target: zone.difference(&Zone::single(top_left.col, top_left.row)),
                        });
                    }
                }
                self.set_merges(sheet_id, merges, ctx);
            }
            Command::RemoveMerge { sheet_id, target } => {
                let merges = self
                    .merges(sheet_id)
                    .iter()
                    .filter(|merge| !target.iter().any(|zone| merge.intersects(zone)))
                    .copied()
                    .collect();
                self.set_merges(sheet_id, merges, ctx);
            }
            Command::DeleteSheet { sheet_id } => self.set_merges(sheet_id, Vec::new(), ctx),
            Command::DuplicateSheet {
                sheet_id,
                new_sheet_id,
                ..
            } => {
                let copy = self.merges(sheet_id).to_vec();
                self.set_merges(new_sheet_id, copy, ctx);
            }
            _ => {}
        }
    }

    fn apply_patch(&mut self, patch: &StatePatch, direction: Direction) {
        if let StatePatch::Merges(change) = patch {
            change.apply_to(&mut self.merges, direction);
        }
    }

    fn export(&self, data: &mut WorkbookData) {
        for sheet in &mut data.sheets {
            sheet.merges = self
                .merges(&sheet.id)
                .iter()
                .map(Zone::to_a1_string)
                .collect();
        }
    }

    fn import(&mut self, data: &WorkbookData) -> Result<()> {
        self.merges.clear();
        for sheet in &data.sheets {
            let mut merges: Vec<Zone> = Vec::new();
            for xc in &sheet.merges {
                let zone = Zone::parse(xc)?;
                if merges.iter().any(|other| other.intersects(&zone)) {
                    return Err(Error::invalid_document(format!(
                        "overlapping merge {} in sheet '{}'",
                        xc, sheet.name
                    )));
                }
                if !zone.is_single_cell() {
                    merges.push(zone);
                }
            }
            if !merges.is_empty() {
                self.merges.insert(sheet.id.clone(), merges);
            }
        }
        Ok(())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}
