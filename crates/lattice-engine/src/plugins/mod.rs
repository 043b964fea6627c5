//! Core plugins, in registration order
//!
//! | plugin | owns |
//! |--------|------|
//! | [`sheets`] | sheet list, names, sizes |
//! | [`cells`] | content, style and number format per cell |
//! | [`merges`] | merged zones |
//! | [`borders`] | borders per cell |
//! | [`conditional_format`] | conditional formatting rules |
//! | [`data_validation`] | data validation rules |
//! | [`protection`] | protected ranges |
//! | [`tables`] | tables |
//! | [`figures`] | floating figures |
//! | [`charts`] | chart definitions attached to figures |
//! | [`custom_colors`] | user colors |

pub mod borders;
pub mod cells;
pub mod charts;
pub mod conditional_format;
pub mod custom_colors;
pub mod data_validation;
pub mod figures;
pub mod merges;
pub mod protection;
pub mod sheets;
pub mod tables;

use crate::command::CommandError;
use crate::config::EngineConfig;
use crate::data::WorkbookData;
use crate::error::{Error, Result};
use crate::history::Change;
use crate::plugin::{CorePlugin, Getters, RangeAdaptation};
use ahash::AHashMap;
use lattice_core::{Range, SheetId};

/// Every core plugin, in the order they see commands
pub fn core_plugins(config: &EngineConfig) -> Vec<Box<dyn CorePlugin>> {
    let (rows, cols) = config.default_sheet_size;
    vec![
        Box::new(sheets::SheetsPlugin::with_default_size(rows, cols)),
        Box::new(cells::CellsPlugin::default()),
        Box::new(merges::MergesPlugin::default()),
        Box::new(borders::BordersPlugin::default()),
        Box::new(conditional_format::ConditionalFormatPlugin::default()),
        Box::new(data_validation::DataValidationPlugin::default()),
        Box::new(protection::ProtectionPlugin::default()),
        Box::new(tables::TablesPlugin::default()),
        Box::new(figures::FiguresPlugin::default()),
        Box::new(charts::ChartsPlugin::default()),
        Box::new(custom_colors::CustomColorsPlugin::default()),
    ]
}

/// Replace the list stored for `sheet_id`, returning the change when something differs
///
/// Empty lists are not stored.
pub(crate) fn replace_sheet_list<T: Clone + PartialEq>(
    map: &mut AHashMap<SheetId, Vec<T>>,
    sheet_id: &SheetId,
    list: Vec<T>,
) -> Option<Change<SheetId, Vec<T>>> {
    let after = (!list.is_empty()).then_some(list);
    let before = match &after {
        Some(list) => map.insert(sheet_id.clone(), list.clone()),
        None => map.remove(sheet_id),
    };
    (before != after).then(|| Change::new(sheet_id.clone(), before, after))
}

/// Parse textual ranges of a rule living on `sheet_id`
pub(crate) fn parse_ranges(
    getters: &Getters<'_>,
    ranges: &[String],
    sheet_id: &SheetId,
) -> std::result::Result<Vec<Range>, CommandError> {
    if ranges.is_empty() {
        return Err(CommandError::EmptyRange);
    }
    ranges
        .iter()
        .map(|xc| match getters.parse_range(xc, sheet_id) {
            Ok(range) if range.is_valid() => Ok(range),
            _ => Err(CommandError::InvalidRange),
        })
        .collect()
}

/// Ranges after `adaptation`, collapsed ones dropped
pub(crate) fn adapt_ranges(ranges: &[Range], adaptation: &RangeAdaptation) -> Vec<Range> {
    match adaptation {
        RangeAdaptation::Structural { sheet_id, change } => ranges
            .iter()
            .filter_map(|range| range.adjusted(sheet_id, change))
            .collect(),
        RangeAdaptation::SheetDeleted { sheet_id, name } => ranges
            .iter()
            .map(|range| {
                if &range.sheet_id == sheet_id && range.is_valid() {
                    range.invalidated(name)
                } else {
                    range.clone()
                }
            })
            .collect(),
        RangeAdaptation::SheetRenamed { .. } => ranges.to_vec(),
    }
}

/// Ranges copied to a duplicated sheet: those on the source sheet follow the copy
pub(crate) fn retarget_ranges(ranges: &[Range], from: &SheetId, to: &SheetId) -> Vec<Range> {
    ranges
        .iter()
        .map(|range| {
            if &range.sheet_id == from && !range.explicit_sheet {
                Range {
                    sheet_id: to.clone(),
                    ..range.clone()
                }
            } else {
                range.clone()
            }
        })
        .collect()
}

/// Sheet names by id, captured before plugins start filling an export
pub(crate) fn sheet_names(data: &WorkbookData) -> AHashMap<SheetId, String> {
    data.sheets
        .iter()
        .map(|sheet| (sheet.id.clone(), sheet.name.clone()))
        .collect()
}

/// Textual ranges of a rule living on `sheet_id`
pub(crate) fn export_ranges(
    ranges: &[Range],
    sheet_id: &SheetId,
    names: &AHashMap<SheetId, String>,
) -> Vec<String> {
    ranges
        .iter()
        .map(|range| range.to_xc(sheet_id, |id| names.get(id).cloned()))
        .collect()
}

/// Parse the textual ranges of an imported rule; `what` names the rule in errors
pub(crate) fn import_ranges(
    xcs: &[String],
    sheet_id: &SheetId,
    data: &WorkbookData,
    what: &str,
) -> Result<Vec<Range>> {
    if xcs.is_empty() {
        return Err(Error::invalid_document(format!("{} has no range", what)));
    }
    xcs.iter()
        .map(|xc| Ok(Range::parse(xc, sheet_id, |name| data.sheet_id_by_name(name))?))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use lattice_core::{Dimension, StructuralChange, Zone};

    #[test]
    fn test_replace_sheet_list_reports_changes_only() {
        let mut map: AHashMap<SheetId, Vec<u32>> = AHashMap::new();
        let id = SheetId::from("s1");
        let change = replace_sheet_list(&mut map, &id, vec![1]).unwrap();
        assert_eq!(change.before, None);
        assert!(replace_sheet_list(&mut map, &id, vec![1]).is_none());
        let change = replace_sheet_list(&mut map, &id, Vec::new()).unwrap();
        assert_eq!(change.after, None);
        assert!(map.is_empty());
    }

    #[test]
    fn test_adapt_ranges_drops_collapsed() {
        let id = SheetId::from("s1");
        let ranges = vec![
            Range::new(id.clone(), Zone::parse("B1:B3").unwrap()),
            Range::new(id.clone(), Zone::parse("C1:D1").unwrap()),
        ];
        let adaptation = RangeAdaptation::Structural {
            sheet_id: id,
            change: StructuralChange::remove(Dimension::Col, vec![1]),
        };
        let adapted = adapt_ranges(&ranges, &adaptation);
        assert_eq!(adapted.len(), 1);
        assert_eq!(adapted[0].zone.to_string(), "B1:C1");
    }

    #[test]
    fn test_deleted_sheet_invalidates() {
        let ranges = vec![Range::new(SheetId::from("s2"), Zone::single(0, 0))];
        let adaptation = RangeAdaptation::SheetDeleted {
            sheet_id: SheetId::from("s2"),
            name: "Data".into(),
        };
        let adapted = adapt_ranges(&ranges, &adaptation);
        assert_eq!(adapted[0].invalid_sheet_name.as_deref(), Some("Data"));
    }
}
