//! Turning a clipboard snapshot into commands
//!
//! A paste is planned once, against the state at paste time, as a list of
//! derived commands. The dispatcher then runs them inside the paste transaction.

use super::snapshot::{ClipboardCell, ClipboardSnapshot, Placement};
use super::PasteMode;
use crate::command::{Command, CommandError};
use crate::plugin::Getters;
use crate::plugins::conditional_format::ConditionalFormat;
use crate::plugins::data_validation::DataValidationRule;
use crate::plugins::sheets::Sheet;
use lattice_core::formula::{is_formula, rebase_formula};
use lattice_core::{CellPosition, Dimension, InsertPosition, Range, SheetId, Style, Zone};

/// Parts of the block to write and where
///
/// A clipboard of several zones goes either as one block at a single target
/// cell, or zone by zone when the target has as many zones: copied zones and
/// target zones are paired in sheet order, each copied zone landing at the
/// top-left of its target. A clipboard of one zone is tiled over each target
/// zone whose size is a multiple of the block, and written once at the
/// top-left of any other. A cut is written once, at a single target.
pub fn paste_placements(
    snapshot: &ClipboardSnapshot,
    target: &[Zone],
    sheet: &Sheet,
) -> Result<Vec<Placement>, Vec<CommandError>> {
    if target.is_empty() {
        return Err(vec![CommandError::EmptyRange]);
    }
    let mut reasons = Vec::new();
    if target.iter().any(|zone| !sheet.contains_zone(zone)) {
        reasons.push(CommandError::TargetOutOfSheet);
    }
    let placements = place(snapshot, target, sheet);
    if placements.is_none() {
        reasons.push(CommandError::WrongPasteShape);
    }
    match placements {
        Some(placements) if reasons.is_empty() => Ok(placements),
        _ => Err(reasons),
    }
}

fn place(snapshot: &ClipboardSnapshot, target: &[Zone], sheet: &Sheet) -> Option<Vec<Placement>> {
    let single_cell = target.len() == 1 && target[0].is_single_cell();
    if snapshot.zones.len() > 1 && !single_cell {
        if target.len() != snapshot.zones.len() {
            return None;
        }
        let mut targets = target.to_vec();
        if snapshot.is_stacked() {
            targets.sort_by_key(|zone| (zone.top, zone.left));
        } else {
            targets.sort_by_key(|zone| (zone.left, zone.top));
        }
        return Some(
            snapshot
                .zones
                .iter()
                .zip(targets)
                .map(|(copied, zone)| snapshot.zone_at(copied, zone.top_left()))
                .collect(),
        );
    }
    if snapshot.is_cut() || snapshot.zones.len() > 1 {
        return (target.len() == 1).then(|| vec![snapshot.whole_at(target[0].top_left())]);
    }
    let mut placements = Vec::new();
    for zone in target {
        let zone = zone.bounded(sheet.rows, sheet.cols);
        let (width, height) = (zone.width().unwrap_or(1), zone.height().unwrap_or(1));
        if width % snapshot.width != 0 || height % snapshot.height != 0 {
            placements.push(snapshot.whole_at(zone.top_left()));
            continue;
        }
        for row in (zone.top..zone.top + height).step_by(snapshot.height as usize) {
            for col in (zone.left..zone.left + width).step_by(snapshot.width as usize) {
                placements.push(snapshot.whole_at(CellPosition::new(col, row)));
            }
        }
    }
    Some(placements)
}

/// Merges of the destination that the paste would break
fn broken_merges(
    snapshot: &ClipboardSnapshot,
    sheet_id: &SheetId,
    areas: &[Zone],
    getters: &Getters<'_>,
) -> Vec<Zone> {
    let moved_away = |merge: &Zone| {
        snapshot.is_cut()
            && &snapshot.sheet_id == sheet_id
            && snapshot.zones.iter().any(|copied| merge.is_inside(&copied.zone))
    };
    getters
        .merges()
        .merges(sheet_id)
        .iter()
        .filter(|merge| areas.iter().any(|area| merge.intersects(area)))
        .filter(|merge| !moved_away(merge))
        .copied()
        .collect()
}

pub fn check_paste(
    snapshot: &ClipboardSnapshot,
    sheet: &Sheet,
    target: &[Zone],
    mode: PasteMode,
    force: bool,
    getters: &Getters<'_>,
) -> Vec<CommandError> {
    let mut reasons = Vec::new();
    if snapshot.is_cut() && mode != PasteMode::All {
        reasons.push(CommandError::WrongPasteOption);
    }
    match paste_placements(snapshot, target, sheet) {
        Ok(placements) => {
            let areas: Vec<Zone> = placements.iter().map(Placement::area).collect();
            if !force && !broken_merges(snapshot, &sheet.id, &areas, getters).is_empty() {
                reasons.push(CommandError::WillRemoveExistingMerge);
            }
        }
        Err(shape) => reasons.extend(shape),
    }
    reasons
}

/// Ranges of one rule being edited by the paste, keyed by sheet and rule id
struct RuleEdit<R> {
    sheet_id: SheetId,
    rule: R,
    zones: Vec<Zone>,
}

fn edit_for<'e, R: Clone>(
    edits: &'e mut Vec<RuleEdit<R>>,
    sheet_id: &SheetId,
    id: &str,
    rule_id: impl Fn(&R) -> &str,
    current: impl FnOnce() -> Option<(R, Vec<Zone>)>,
    fallback: &R,
) -> &'e mut RuleEdit<R> {
    let index = match edits
        .iter()
        .position(|edit| &edit.sheet_id == sheet_id && rule_id(&edit.rule) == id)
    {
        Some(index) => index,
        None => {
            let (rule, zones) = current().unwrap_or_else(|| (fallback.clone(), Vec::new()));
            edits.push(RuleEdit {
                sheet_id: sheet_id.clone(),
                rule,
                zones,
            });
            edits.len() - 1
        }
    };
    &mut edits[index]
}

fn own_zones(ranges: &[Range], sheet_id: &SheetId) -> Vec<Zone> {
    ranges
        .iter()
        .filter(|range| range.is_valid() && &range.sheet_id == sheet_id)
        .map(|range| range.zone)
        .collect()
}

fn subtract(zones: &[Zone], hole: &Zone) -> Vec<Zone> {
    zones.iter().flat_map(|zone| zone.difference(hole)).collect()
}

fn cell_command(
    sheet_id: &SheetId,
    position: CellPosition,
    cell: &ClipboardCell,
    content: Option<String>,
    mode: PasteMode,
) -> Command {
    let (style, format) = match mode {
        PasteMode::OnlyValue => (None, None),
        PasteMode::All | PasteMode::OnlyFormat => (
            Some(cell.style.clone().unwrap_or_else(Style::new)),
            Some(cell.format.clone().unwrap_or_default()),
        ),
    };
    Command::UpdateCell {
        sheet_id: sheet_id.clone(),
        col: position.col,
        row: position.row,
        content,
        style,
        format,
    }
}

/// Commands performing the paste, in execution order
pub fn plan_paste(
    snapshot: &ClipboardSnapshot,
    sheet: &Sheet,
    target: &[Zone],
    mode: PasteMode,
    getters: &Getters<'_>,
) -> Vec<Command> {
    let Ok(placements) = paste_placements(snapshot, target, sheet) else {
        return Vec::new();
    };
    let sheet_id = &sheet.id;
    let areas: Vec<Zone> = placements.iter().map(Placement::area).collect();
    let mut commands = Vec::new();

    // grow the sheet
    let bottom = areas.iter().filter_map(|area| area.bottom).max().unwrap_or(0);
    let right = areas.iter().filter_map(|area| area.right).max().unwrap_or(0);
    if bottom >= sheet.rows {
        commands.push(Command::AddColumnsRows {
            sheet_id: sheet_id.clone(),
            dimension: Dimension::Row,
            base: sheet.rows - 1,
            position: InsertPosition::After,
            quantity: bottom - sheet.rows + 1,
        });
    }
    if right >= sheet.cols {
        commands.push(Command::AddColumnsRows {
            sheet_id: sheet_id.clone(),
            dimension: Dimension::Col,
            base: sheet.cols - 1,
            position: InsertPosition::After,
            quantity: right - sheet.cols + 1,
        });
    }

    let broken = broken_merges(snapshot, sheet_id, &areas, getters);
    if !broken.is_empty() {
        commands.push(Command::RemoveMerge {
            sheet_id: sheet_id.clone(),
            target: broken.clone(),
        });
    }

    // clear the cut source
    let cut_sources: Vec<Zone> = if snapshot.is_cut() {
        snapshot.zones.iter().map(|copied| copied.zone).collect()
    } else {
        Vec::new()
    };
    if !cut_sources.is_empty() && getters.sheet(&snapshot.sheet_id).is_some() {
        let source = &snapshot.sheet_id;
        commands.push(Command::DeleteContent {
            sheet_id: source.clone(),
            target: cut_sources.clone(),
        });
        commands.push(Command::ClearFormatting {
            sheet_id: source.clone(),
            target: cut_sources.clone(),
        });
        let source_merges: Vec<Zone> = cut_sources
            .iter()
            .flat_map(|zone| getters.merges().merges_intersecting(source, zone))
            .filter(|merge| !(source == sheet_id && broken.contains(merge)))
            .collect();
        if !source_merges.is_empty() {
            commands.push(Command::RemoveMerge {
                sheet_id: source.clone(),
                target: source_merges,
            });
        }
        let source_tables: Vec<Zone> = snapshot
            .tables
            .iter()
            .filter(|table| getters.tables().table(source, &table.id) == Some(*table))
            .map(|table| table.zone)
            .collect();
        if !source_tables.is_empty() {
            commands.push(Command::RemoveTable {
                sheet_id: source.clone(),
                target: source_tables,
            });
        }
    }

    // cell content, format and borders
    for placement in &placements {
        for (col, row) in placement.offsets() {
            let (Some(cell), Some(source)) = (snapshot.cell(col, row), snapshot.source_position(col, row)) else {
                continue;
            };
            let position = placement.position(col, row);
            let content = match mode {
                PasteMode::OnlyFormat => None,
                PasteMode::OnlyValue => Some(cell.value.to_literal()),
                PasteMode::All if is_formula(&cell.content) && !snapshot.is_cut() => Some(rebase_formula(
                    &cell.content,
                    position.col as i64 - source.col as i64,
                    position.row as i64 - source.row as i64,
                )),
                PasteMode::All => Some(cell.content.clone()),
            };
            let existing = getters.cells().cell(sheet_id, position);
            if existing.is_some() || !cell.is_empty() || (mode == PasteMode::OnlyValue && !cell.value.is_empty()) {
                commands.push(cell_command(sheet_id, position, cell, content, mode));
            }
            let has_border = getters.borders().border(sheet_id, position).is_some();
            if mode != PasteMode::OnlyValue && (has_border || cell.border.is_some()) {
                commands.push(Command::SetBorder {
                    sheet_id: sheet_id.clone(),
                    col: position.col,
                    row: position.row,
                    border: cell.border.clone(),
                });
            }
        }
    }

    if mode == PasteMode::All {
        let merges: Vec<Zone> = placements
            .iter()
            .flat_map(|placement| {
                snapshot
                    .merges
                    .iter()
                    .filter_map(move |merge| snapshot.translate(merge, placement))
            })
            .collect();
        if !merges.is_empty() {
            commands.push(Command::AddMerge {
                sheet_id: sheet_id.clone(),
                target: merges,
                force: true,
            });
        }
    }

    commands.extend(plan_conditional_formats(snapshot, sheet_id, &placements, &cut_sources, mode, getters));
    commands.extend(plan_data_validation(snapshot, sheet_id, &placements, &cut_sources, mode, getters));

    if mode == PasteMode::All {
        commands.extend(plan_tables(snapshot, sheet_id, &placements, getters));
    }

    if let Some(first) = placements.first() {
        let zones = if target.len() > 1 {
            target.to_vec()
        } else {
            vec![areas.iter().skip(1).fold(areas[0], |acc, area| acc.bounding_box(area))]
        };
        commands.push(Command::SetSelection {
            anchor: first.origin,
            zones,
        });
    }
    if snapshot.is_cut() {
        commands.push(Command::ClearClipboard);
    }
    commands
}

fn plan_conditional_formats(
    snapshot: &ClipboardSnapshot,
    sheet_id: &SheetId,
    placements: &[Placement],
    cut_sources: &[Zone],
    mode: PasteMode,
    getters: &Getters<'_>,
) -> Vec<Command> {
    let plugin = getters.conditional_formats();
    let current = |sheet: &SheetId, id: &str| {
        plugin
            .conditional_format(sheet, id)
            .map(|entry| (entry.cf.clone(), own_zones(&entry.ranges, sheet)))
    };
    let mut edits: Vec<RuleEdit<ConditionalFormat>> = Vec::new();
    for entry in plugin.conditional_formats(&snapshot.sheet_id) {
        let zones = own_zones(&entry.ranges, &snapshot.sheet_id);
        if cut_sources.iter().any(|hole| zones.iter().any(|zone| zone.intersects(hole))) {
            let edit = edit_for(&mut edits, &snapshot.sheet_id, &entry.cf.id, |cf| cf.id.as_str(), || current(&snapshot.sheet_id, &entry.cf.id), &entry.cf);
            for hole in cut_sources {
                edit.zones = subtract(&edit.zones, hole);
            }
        }
    }
    if mode != PasteMode::OnlyValue {
        for copied in &snapshot.conditional_formats {
            let edit = edit_for(&mut edits, sheet_id, &copied.rule.id, |cf| cf.id.as_str(), || current(sheet_id, &copied.rule.id), &copied.rule);
            for placement in placements {
                edit.zones.extend(copied.zones.iter().filter_map(|zone| snapshot.translate(zone, placement)));
            }
        }
    }
    edits
        .into_iter()
        .filter_map(|edit| {
            if edit.zones.is_empty() {
                current(&edit.sheet_id, &edit.rule.id).map(|_| Command::RemoveConditionalFormat {
                    sheet_id: edit.sheet_id,
                    id: edit.rule.id,
                })
            } else {
                Some(Command::AddConditionalFormat {
                    sheet_id: edit.sheet_id,
                    ranges: edit.zones.iter().map(Zone::to_a1_string).collect(),
                    cf: edit.rule,
                })
            }
        })
        .collect()
}

fn plan_data_validation(
    snapshot: &ClipboardSnapshot,
    sheet_id: &SheetId,
    placements: &[Placement],
    cut_sources: &[Zone],
    mode: PasteMode,
    getters: &Getters<'_>,
) -> Vec<Command> {
    let plugin = getters.data_validation();
    let current = |sheet: &SheetId, id: &str| {
        plugin
            .rule(sheet, id)
            .map(|entry| (entry.rule.clone(), own_zones(&entry.ranges, sheet)))
    };
    let mut edits: Vec<RuleEdit<DataValidationRule>> = Vec::new();
    for entry in plugin.rules(&snapshot.sheet_id) {
        let zones = own_zones(&entry.ranges, &snapshot.sheet_id);
        if cut_sources.iter().any(|hole| zones.iter().any(|zone| zone.intersects(hole))) {
            let edit = edit_for(&mut edits, &snapshot.sheet_id, &entry.rule.id, |rule| rule.id.as_str(), || current(&snapshot.sheet_id, &entry.rule.id), &entry.rule);
            for hole in cut_sources {
                edit.zones = subtract(&edit.zones, hole);
            }
        }
    }
    if mode == PasteMode::All {
        for copied in &snapshot.data_validations {
            let edit = edit_for(&mut edits, sheet_id, &copied.rule.id, |rule| rule.id.as_str(), || current(sheet_id, &copied.rule.id), &copied.rule);
            for placement in placements {
                edit.zones.extend(copied.zones.iter().filter_map(|zone| snapshot.translate(zone, placement)));
            }
        }
    }
    edits
        .into_iter()
        .filter_map(|edit| {
            if edit.zones.is_empty() {
                current(&edit.sheet_id, &edit.rule.id).map(|_| Command::RemoveDataValidationRule {
                    sheet_id: edit.sheet_id,
                    id: edit.rule.id,
                })
            } else {
                Some(Command::AddDataValidationRule {
                    sheet_id: edit.sheet_id,
                    ranges: edit.zones.iter().map(Zone::to_a1_string).collect(),
                    rule: edit.rule,
                })
            }
        })
        .collect()
}

/// Tables of the block, skipped where they would overlap an existing table
fn plan_tables(
    snapshot: &ClipboardSnapshot,
    sheet_id: &SheetId,
    placements: &[Placement],
    getters: &Getters<'_>,
) -> Vec<Command> {
    let tables = getters.tables();
    // tables cut from this sheet are removed earlier in the same paste
    let moved_away = |id: &str| {
        snapshot.is_cut() && &snapshot.sheet_id == sheet_id && snapshot.tables.iter().any(|t| t.id == id)
    };
    let mut taken: Vec<String> = tables
        .tables(sheet_id)
        .iter()
        .filter(|t| !moved_away(&t.id))
        .map(|t| t.id.clone())
        .collect();
    let mut placed: Vec<Zone> = Vec::new();
    let mut commands = Vec::new();
    for placement in placements {
        for table in &snapshot.tables {
            let Some(zone) = snapshot.translate(&table.zone, placement) else {
                continue;
            };
            let overlaps = tables
                .tables_intersecting(sheet_id, &zone)
                .iter()
                .any(|other| !moved_away(&other.id))
                || placed.iter().any(|other| other.intersects(&zone));
            if overlaps {
                log::debug!("pasted table {} would overlap an existing table, skipped", table.id);
                continue;
            }
            let id = if snapshot.is_cut() && !taken.contains(&table.id) {
                table.id.clone()
            } else {
                let mut n = 1;
                while taken.contains(&format!("{}-{}", table.id, n)) {
                    n += 1;
                }
                format!("{}-{}", table.id, n)
            };
            taken.push(id.clone());
            placed.push(zone);
            commands.push(Command::CreateTable {
                sheet_id: sheet_id.clone(),
                id,
                range: zone.to_a1_string(),
                config: table.config.clone(),
            });
        }
    }
    commands
}
