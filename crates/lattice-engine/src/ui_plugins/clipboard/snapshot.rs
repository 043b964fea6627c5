//! What a copy or a cut captured

use crate::plugin::Getters;
use crate::plugins::conditional_format::ConditionalFormat;
use crate::plugins::data_validation::DataValidationRule;
use crate::plugins::tables::Table;
use lattice_core::{Border, CellPosition, CellValue, SheetId, Style, Zone};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClipboardOperation {
    Copy,
    Cut,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct ClipboardCell {
    pub content: String,
    pub style: Option<Style>,
    pub format: Option<String>,
    pub border: Option<Border>,
    /// Evaluated value at copy time, pasted by `OnlyValue`
    pub value: CellValue,
}

impl ClipboardCell {
    pub fn is_empty(&self) -> bool {
        self.content.is_empty() && self.style.is_none() && self.format.is_none() && self.border.is_none()
    }
}

/// A copied zone and the offset of its top-left cell inside the pasted block
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CopiedZone {
    pub zone: Zone,
    pub block_col: u32,
    pub block_row: u32,
}

/// A rule and the copied parts of its ranges
#[derive(Debug, Clone, PartialEq)]
pub struct CopiedRule<R> {
    pub rule: R,
    pub zones: Vec<Zone>,
}

/// Lay out copied zones as one block
///
/// Zones sharing the same columns stack top to bottom; zones sharing the same
/// rows sit side by side. Anything else cannot be pasted as a block.
pub fn aligned_layout(zones: &[Zone]) -> Option<Vec<CopiedZone>> {
    let mut sorted = zones.to_vec();
    let (first, rest) = sorted.split_first()?;
    let same_cols = rest
        .iter()
        .all(|zone| zone.left == first.left && zone.right == first.right);
    let same_rows = rest
        .iter()
        .all(|zone| zone.top == first.top && zone.bottom == first.bottom);
    let stacked = if rest.is_empty() || same_cols {
        sorted.sort_by_key(|zone| zone.top);
        true
    } else if same_rows {
        sorted.sort_by_key(|zone| zone.left);
        false
    } else {
        return None;
    };
    if sorted.windows(2).any(|pair| pair[0].intersects(&pair[1])) {
        return None;
    }
    let mut offset = 0;
    let mut layout = Vec::with_capacity(sorted.len());
    for zone in sorted {
        let (block_col, block_row) = if stacked { (0, offset) } else { (offset, 0) };
        offset += if stacked { zone.height()? } else { zone.width()? };
        layout.push(CopiedZone {
            zone,
            block_col,
            block_row,
        });
    }
    Some(layout)
}

#[derive(Debug, Clone, PartialEq)]
pub struct ClipboardSnapshot {
    pub operation: ClipboardOperation,
    pub sheet_id: SheetId,
    pub zones: Vec<CopiedZone>,
    pub width: u32,
    pub height: u32,
    /// Block cells, row by row
    cells: Vec<Vec<ClipboardCell>>,
    /// Merges fully inside a copied zone
    pub merges: Vec<Zone>,
    pub conditional_formats: Vec<CopiedRule<ConditionalFormat>>,
    pub data_validations: Vec<CopiedRule<DataValidationRule>>,
    /// Tables fully inside a copied zone
    pub tables: Vec<Table>,
}

impl ClipboardSnapshot {
    /// Capture `zones` of `sheet_id`; `None` when the zones are not aligned
    pub fn capture(
        operation: ClipboardOperation,
        sheet_id: &SheetId,
        zones: &[Zone],
        getters: &Getters<'_>,
    ) -> Option<Self> {
        let sheet = getters.sheet(sheet_id)?;
        let bounded: Vec<Zone> = zones
            .iter()
            .map(|zone| zone.bounded(sheet.rows, sheet.cols))
            .collect();
        let layout = aligned_layout(&bounded)?;
        let last = layout.last()?;
        let (width, height) = match layout.len() {
            1 => (last.zone.width()?, last.zone.height()?),
            _ if last.block_row > 0 => (last.zone.width()?, last.block_row + last.zone.height()?),
            _ => (last.block_col + last.zone.width()?, last.zone.height()?),
        };

        let mut cells = vec![vec![ClipboardCell::default(); width as usize]; height as usize];
        for copied in &layout {
            for position in copied.zone.cells() {
                let cell = getters.cells().cell(sheet_id, position);
                let row = copied.block_row + position.row - copied.zone.top;
                let col = copied.block_col + position.col - copied.zone.left;
                cells[row as usize][col as usize] = ClipboardCell {
                    content: cell.map(|c| c.content.clone()).unwrap_or_default(),
                    style: cell.and_then(|c| c.style.clone()),
                    format: cell.and_then(|c| c.format.clone()),
                    border: getters.borders().border(sheet_id, position).cloned(),
                    value: getters.evaluated_value(sheet_id, position),
                };
            }
        }

        let inside = |zone: &Zone| layout.iter().any(|copied| zone.is_inside(&copied.zone));
        let merges = getters
            .merges()
            .merges(sheet_id)
            .iter()
            .filter(|zone| inside(zone))
            .copied()
            .collect();
        let clip = |ranges: &[lattice_core::Range]| -> Vec<Zone> {
            ranges
                .iter()
                .filter(|range| range.is_valid() && &range.sheet_id == sheet_id)
                .flat_map(|range| layout.iter().filter_map(move |c| range.zone.intersection(&c.zone)))
                .collect()
        };
        let conditional_formats = getters
            .conditional_formats()
            .conditional_formats(sheet_id)
            .iter()
            .map(|entry| CopiedRule {
                rule: entry.cf.clone(),
                zones: clip(&entry.ranges),
            })
            .filter(|copied| !copied.zones.is_empty())
            .collect();
        let data_validations = getters
            .data_validation()
            .rules(sheet_id)
            .iter()
            .map(|entry| CopiedRule {
                rule: entry.rule.clone(),
                zones: clip(&entry.ranges),
            })
            .filter(|copied| !copied.zones.is_empty())
            .collect();
        let tables = getters
            .tables()
            .tables(sheet_id)
            .iter()
            .filter(|table| inside(&table.zone))
            .cloned()
            .collect();

        Some(Self {
            operation,
            sheet_id: sheet_id.clone(),
            zones: layout,
            width,
            height,
            cells,
            merges,
            conditional_formats,
            data_validations,
            tables,
        })
    }

    pub fn is_cut(&self) -> bool {
        self.operation == ClipboardOperation::Cut
    }

    /// Cell at a block offset
    pub fn cell(&self, col: u32, row: u32) -> Option<&ClipboardCell> {
        self.cells.get(row as usize)?.get(col as usize)
    }

    /// Source position of a block offset
    pub fn source_position(&self, col: u32, row: u32) -> Option<CellPosition> {
        self.zones.iter().find_map(|copied| {
            let position = CellPosition::new(
                copied.zone.left + col.checked_sub(copied.block_col)?,
                copied.zone.top + row.checked_sub(copied.block_row)?,
            );
            copied.zone.contains_position(position).then_some(position)
        })
    }

    /// The whole block written at `origin`
    pub fn whole_at(&self, origin: CellPosition) -> Placement {
        Placement {
            block_col: 0,
            block_row: 0,
            width: self.width,
            height: self.height,
            origin,
        }
    }

    /// Only the part of the block holding `copied`, written at `origin`
    pub fn zone_at(&self, copied: &CopiedZone, origin: CellPosition) -> Placement {
        Placement {
            block_col: copied.block_col,
            block_row: copied.block_row,
            width: copied.zone.width().unwrap_or(1),
            height: copied.zone.height().unwrap_or(1),
            origin,
        }
    }

    /// Whether the copied zones were stacked top to bottom
    pub fn is_stacked(&self) -> bool {
        self.zones.iter().any(|copied| copied.block_row > 0)
    }

    /// Where a source zone lands with `placement`
    ///
    /// The zone must lie inside one copied zone, and that zone must be part of
    /// what the placement writes.
    pub fn translate(&self, zone: &Zone, placement: &Placement) -> Option<Zone> {
        let copied = self.zones.iter().find(|copied| zone.is_inside(&copied.zone))?;
        if !placement.covers(copied) {
            return None;
        }
        let origin = placement.origin;
        let d_col = origin.col as i64 + copied.block_col as i64 - placement.block_col as i64 - copied.zone.left as i64;
        let d_row = origin.row as i64 + copied.block_row as i64 - placement.block_row as i64 - copied.zone.top as i64;
        zone.offset(d_col, d_row)
    }
}

/// A rectangle of the block, in block offsets, pasted with its top-left at `origin`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Placement {
    pub block_col: u32,
    pub block_row: u32,
    pub width: u32,
    pub height: u32,
    pub origin: CellPosition,
}

impl Placement {
    /// Destination cells
    pub fn area(&self) -> Zone {
        Zone::new(
            self.origin.row,
            self.origin.col,
            self.origin.row + self.height - 1,
            self.origin.col + self.width - 1,
        )
    }

    /// Block offsets written, as `(col, row)`, row by row
    pub fn offsets(&self) -> impl Iterator<Item = (u32, u32)> {
        let (left, width) = (self.block_col, self.width);
        (self.block_row..self.block_row + self.height)
            .flat_map(move |row| (left..left + width).map(move |col| (col, row)))
    }

    /// Destination of a block offset
    pub fn position(&self, col: u32, row: u32) -> CellPosition {
        CellPosition::new(
            self.origin.col + col - self.block_col,
            self.origin.row + row - self.block_row,
        )
    }

    fn covers(&self, copied: &CopiedZone) -> bool {
        let width = copied.zone.width().unwrap_or(1);
        let height = copied.zone.height().unwrap_or(1);
        copied.block_col >= self.block_col
            && copied.block_row >= self.block_row
            && copied.block_col + width <= self.block_col + self.width
            && copied.block_row + height <= self.block_row + self.height
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn zones(xcs: &[&str]) -> Vec<Zone> {
        xcs.iter().map(|xc| Zone::parse(xc).unwrap()).collect()
    }

    #[test]
    fn test_stacked_zones() {
        let layout = aligned_layout(&zones(&["A4:B4", "A1:B2"])).unwrap();
        assert_eq!(layout[0].zone, Zone::parse("A1:B2").unwrap());
        assert_eq!((layout[1].block_col, layout[1].block_row), (0, 2));
    }

    #[test]
    fn test_side_by_side_zones() {
        let layout = aligned_layout(&zones(&["C1:C3", "A1:A3"])).unwrap();
        assert_eq!((layout[1].block_col, layout[1].block_row), (1, 0));
    }

    /// A zone-sized placement only carries what lies inside that zone
    #[test]
    fn test_zone_placement() {
        let layout = aligned_layout(&zones(&["A1", "A3:A4"])).unwrap();
        let placement = Placement {
            block_col: layout[1].block_col,
            block_row: layout[1].block_row,
            width: 1,
            height: 2,
            origin: CellPosition::new(4, 0),
        };
        assert_eq!(placement.area(), Zone::parse("E1:E2").unwrap());
        assert_eq!(placement.offsets().collect::<Vec<_>>(), vec![(0, 1), (0, 2)]);
        assert_eq!(placement.position(0, 2), CellPosition::new(4, 1));
        assert!(placement.covers(&layout[1]));
        assert!(!placement.covers(&layout[0]));
    }

    #[test]
    fn test_unaligned_zones() {
        assert!(aligned_layout(&zones(&["A1:B2", "C3:D5"])).is_none());
        assert!(aligned_layout(&zones(&["A1:A3", "A2:A4"])).is_none());
        assert!(aligned_layout(&[]).is_none());
    }
}
