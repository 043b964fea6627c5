//! Structural change algebra
//!
//! Maps indices and zones through row/column insertion, removal and moves. Every
//! plugin that stores positions goes through these functions so that a single
//! structural command keeps the whole document consistent.

use crate::zone::Zone;

/// Rows or columns
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "UPPERCASE"))]
pub enum Dimension {
    Col,
    Row,
}

/// Where inserted headers go relative to the base header
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum InsertPosition {
    Before,
    After,
}

/// A structural edit of one sheet along one dimension
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StructuralChange {
    /// `quantity` headers inserted before or after `base`
    Insert {
        dimension: Dimension,
        base: u32,
        position: InsertPosition,
        quantity: u32,
    },
    /// Headers removed (sorted, deduplicated)
    Remove {
        dimension: Dimension,
        elements: Vec<u32>,
    },
    /// A contiguous block of headers moved before or after `base`
    Move {
        dimension: Dimension,
        elements: Vec<u32>,
        base: u32,
        position: InsertPosition,
    },
}

/// Outcome of mapping a zone through a structural change
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ZoneAdjustment {
    /// The zone is not affected
    Unchanged,
    /// Same size, new location
    Moved(Zone),
    /// Size changed (the zone may also have moved)
    Resized(Zone),
    /// Every row or column of the zone was removed
    Collapsed,
}

impl ZoneAdjustment {
    /// The zone after the change, `None` when collapsed
    pub fn apply_to(self, original: Zone) -> Option<Zone> {
        match self {
            ZoneAdjustment::Unchanged => Some(original),
            ZoneAdjustment::Moved(zone) | ZoneAdjustment::Resized(zone) => Some(zone),
            ZoneAdjustment::Collapsed => None,
        }
    }
}

/// The headers surrounding a freshly inserted block, in post-change indices
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InsertionNeighbours {
    pub dimension: Dimension,
    /// First inserted index
    pub start: u32,
    pub quantity: u32,
    /// Header just before the block, if any
    pub before: Option<u32>,
    /// Header just after the block
    pub after: u32,
}

impl StructuralChange {
    /// Insertion builder
    pub fn insert(dimension: Dimension, base: u32, position: InsertPosition, quantity: u32) -> Self {
        StructuralChange::Insert {
            dimension,
            base,
            position,
            quantity,
        }
    }

    /// Removal builder; sorts and deduplicates the elements
    pub fn remove(dimension: Dimension, mut elements: Vec<u32>) -> Self {
        elements.sort_unstable();
        elements.dedup();
        StructuralChange::Remove {
            dimension,
            elements,
        }
    }

    /// Move builder; sorts and deduplicates the elements
    pub fn moved(
        dimension: Dimension,
        mut elements: Vec<u32>,
        base: u32,
        position: InsertPosition,
    ) -> Self {
        elements.sort_unstable();
        elements.dedup();
        StructuralChange::Move {
            dimension,
            elements,
            base,
            position,
        }
    }

    pub fn dimension(&self) -> Dimension {
        match self {
            StructuralChange::Insert { dimension, .. }
            | StructuralChange::Remove { dimension, .. }
            | StructuralChange::Move { dimension, .. } => *dimension,
        }
    }

    /// Map a header index through the change, `None` when the header was removed
    pub fn map_index(&self, index: u32) -> Option<u32> {
        match self {
            StructuralChange::Insert {
                base,
                position,
                quantity,
                ..
            } => {
                let at = insertion_index(*base, *position);
                Some(if index >= at { index + quantity } else { index })
            }
            StructuralChange::Remove { elements, .. } => {
                if elements.binary_search(&index).is_ok() {
                    None
                } else {
                    Some(index - count_below(elements, index))
                }
            }
            StructuralChange::Move {
                elements,
                base,
                position,
                ..
            } => {
                if elements.is_empty() {
                    return Some(index);
                }
                let len = elements.len() as u32;
                let target = move_target(elements, *base, *position);
                if elements.binary_search(&index).is_ok() {
                    let offset = count_below(elements, index);
                    Some(target + offset)
                } else {
                    let removed = index - count_below(elements, index);
                    Some(if removed >= target { removed + len } else { removed })
                }
            }
        }
    }

    /// Neighbouring headers of the block an insertion creates
    pub fn insertion_neighbours(&self) -> Option<InsertionNeighbours> {
        let StructuralChange::Insert {
            dimension,
            base,
            position,
            quantity,
        } = self
        else {
            return None;
        };
        let start = insertion_index(*base, *position);
        Some(InsertionNeighbours {
            dimension: *dimension,
            start,
            quantity: *quantity,
            before: start.checked_sub(1),
            after: start + quantity,
        })
    }
}

/// Index the first inserted header lands on
pub fn insertion_index(base: u32, position: InsertPosition) -> u32 {
    match position {
        InsertPosition::Before => base,
        InsertPosition::After => base + 1,
    }
}

fn count_below(sorted: &[u32], index: u32) -> u32 {
    sorted.partition_point(|&e| e < index) as u32
}

fn count_up_to(sorted: &[u32], index: u32) -> u32 {
    sorted.partition_point(|&e| e <= index) as u32
}

/// Insertion index of a moved block once the block itself has been taken out
fn move_target(elements: &[u32], base: u32, position: InsertPosition) -> u32 {
    let at = insertion_index(base, position);
    at - count_below(elements, at)
}

/// A span of headers `start..=end` along one dimension, `end == None` when open
type Span = (u32, Option<u32>);

enum SpanAdjustment {
    Unchanged,
    Changed(Span),
    Collapsed,
}

fn adjust_span((start, end): Span, change: &StructuralChange) -> SpanAdjustment {
    match change {
        StructuralChange::Insert {
            base,
            position,
            quantity,
            ..
        } => insert_into_span((start, end), insertion_index(*base, *position), *quantity),
        StructuralChange::Remove { elements, .. } => remove_from_span((start, end), elements),
        StructuralChange::Move {
            elements,
            base,
            position,
            ..
        } => {
            let (Some(&first), Some(&last)) = (elements.first(), elements.last()) else {
                return SpanAdjustment::Unchanged;
            };
            let target = move_target(elements, *base, *position);
            if start >= first && end.is_some_and(|e| e <= last) {
                // The zone travels with the block
                let new_start = target + (start - first);
                let new_end = end.map(|e| target + (e - first));
                return if new_start == start {
                    SpanAdjustment::Unchanged
                } else {
                    SpanAdjustment::Changed((new_start, new_end))
                };
            }
            let removed = match remove_from_span((start, end), elements) {
                SpanAdjustment::Unchanged => (start, end),
                SpanAdjustment::Changed(span) => span,
                SpanAdjustment::Collapsed => return SpanAdjustment::Collapsed,
            };
            let inserted = match insert_into_span(removed, target, elements.len() as u32) {
                SpanAdjustment::Unchanged => removed,
                SpanAdjustment::Changed(span) => span,
                SpanAdjustment::Collapsed => return SpanAdjustment::Collapsed,
            };
            if inserted == (start, end) {
                SpanAdjustment::Unchanged
            } else {
                SpanAdjustment::Changed(inserted)
            }
        }
    }
}

fn insert_into_span((start, end): Span, at: u32, quantity: u32) -> SpanAdjustment {
    if quantity == 0 || (start == 0 && end.is_none()) {
        return SpanAdjustment::Unchanged;
    }
    if at <= start {
        SpanAdjustment::Changed((start + quantity, end.map(|e| e + quantity)))
    } else {
        match end {
            Some(e) if at <= e => SpanAdjustment::Changed((start, Some(e + quantity))),
            // open edges never move
            _ => SpanAdjustment::Unchanged,
        }
    }
}

fn remove_from_span((start, end): Span, elements: &[u32]) -> SpanAdjustment {
    let before_start = count_below(elements, start);
    match end {
        Some(e) => {
            let up_to_end = count_up_to(elements, e);
            if up_to_end - before_start == e - start + 1 {
                return SpanAdjustment::Collapsed;
            }
            if up_to_end == 0 {
                return SpanAdjustment::Unchanged;
            }
            SpanAdjustment::Changed((start - before_start, Some(e - up_to_end)))
        }
        None => {
            if before_start == 0 {
                SpanAdjustment::Unchanged
            } else {
                SpanAdjustment::Changed((start - before_start, None))
            }
        }
    }
}

/// Map a zone through a structural change
pub fn adjust_zone(zone: &Zone, change: &StructuralChange) -> ZoneAdjustment {
    let span = match change.dimension() {
        Dimension::Row => (zone.top, zone.bottom),
        Dimension::Col => (zone.left, zone.right),
    };
    let (start, end) = match adjust_span(span, change) {
        SpanAdjustment::Unchanged => return ZoneAdjustment::Unchanged,
        SpanAdjustment::Collapsed => return ZoneAdjustment::Collapsed,
        SpanAdjustment::Changed(new_span) => new_span,
    };
    let adjusted = match change.dimension() {
        Dimension::Row => Zone {
            top: start,
            bottom: end,
            ..*zone
        },
        Dimension::Col => Zone {
            left: start,
            right: end,
            ..*zone
        },
    };
    let same_size = match (span.1, end) {
        (Some(old_end), Some(new_end)) => old_end - span.0 == new_end - start,
        (None, None) => true,
        _ => false,
    };
    if adjusted == *zone {
        ZoneAdjustment::Unchanged
    } else if same_size {
        ZoneAdjustment::Moved(adjusted)
    } else {
        ZoneAdjustment::Resized(adjusted)
    }
}

/// Zone after inserting (`quantity > 0`) or deleting (`quantity < 0`) headers at `base`
///
/// Deletion removes `|quantity|` headers starting at `base`; insertion places them before `base`.
pub fn adjust_on_structural_change(
    zone: &Zone,
    dimension: Dimension,
    base: u32,
    quantity: i32,
) -> Option<Zone> {
    let change = if quantity >= 0 {
        StructuralChange::insert(dimension, base, InsertPosition::Before, quantity as u32)
    } else {
        let count = quantity.unsigned_abs();
        StructuralChange::remove(dimension, (base..base + count).collect())
    };
    adjust_zone(zone, &change).apply_to(*zone)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;

    fn zone(xc: &str) -> Zone {
        Zone::parse(xc).unwrap()
    }

    fn adjusted(xc: &str, change: &StructuralChange) -> Option<String> {
        let z = zone(xc);
        adjust_zone(&z, change).apply_to(z).map(|z| z.to_string())
    }

    #[test]
    fn test_insert_before_zone_shifts() {
        let change = StructuralChange::insert(Dimension::Row, 0, InsertPosition::Before, 2);
        assert_eq!(adjusted("A2:B3", &change).as_deref(), Some("A4:B5"));
        assert!(matches!(
            adjust_zone(&zone("A2:B3"), &change),
            ZoneAdjustment::Moved(_)
        ));
    }

    #[test]
    fn test_insert_inside_zone_grows() {
        let change = StructuralChange::insert(Dimension::Col, 1, InsertPosition::After, 1);
        assert_eq!(adjusted("B1:D1", &change).as_deref(), Some("B1:E1"));
        assert!(matches!(
            adjust_zone(&zone("B1:D1"), &change),
            ZoneAdjustment::Resized(_)
        ));
    }

    #[test]
    fn test_insert_after_zone_unchanged() {
        let change = StructuralChange::insert(Dimension::Row, 4, InsertPosition::After, 3);
        assert_eq!(adjust_zone(&zone("A1:A5"), &change), ZoneAdjustment::Unchanged);
    }

    #[test]
    fn test_insert_never_moves_open_edge() {
        let change = StructuralChange::insert(Dimension::Row, 0, InsertPosition::Before, 1);
        assert_eq!(adjust_zone(&zone("A:B"), &change), ZoneAdjustment::Unchanged);
        assert_eq!(adjusted("A3:B", &change).as_deref(), Some("A4:B"));
    }

    #[test]
    fn test_remove_rows_inside_zone_shrinks() {
        let change = StructuralChange::remove(Dimension::Row, vec![1, 2]);
        assert_eq!(adjusted("A1:A5", &change).as_deref(), Some("A1:A3"));
    }

    #[test]
    fn test_remove_all_rows_collapses() {
        let change = StructuralChange::remove(Dimension::Row, vec![2, 1, 3]);
        assert_eq!(adjust_zone(&zone("B2:C4"), &change), ZoneAdjustment::Collapsed);
    }

    #[test]
    fn test_remove_first_row_of_zone() {
        let change = StructuralChange::remove(Dimension::Row, vec![1]);
        assert_eq!(adjusted("A2:A4", &change).as_deref(), Some("A2:A3"));
    }

    #[test]
    fn test_remove_columns_before_zone() {
        let change = StructuralChange::remove(Dimension::Col, vec![0]);
        assert_eq!(adjusted("C1:D2", &change).as_deref(), Some("B1:C2"));
    }

    #[test]
    fn test_move_zone_inside_block_translates() {
        // move rows 2..3 (indices 1,2) after row 6 (index 5)
        let change = StructuralChange::moved(Dimension::Row, vec![1, 2], 5, InsertPosition::After);
        assert_eq!(adjusted("A2:B3", &change).as_deref(), Some("A5:B6"));
        assert_eq!(change.map_index(0), Some(0));
        assert_eq!(change.map_index(3), Some(1));
        assert_eq!(change.map_index(5), Some(3));
        assert_eq!(change.map_index(1), Some(4));
        assert_eq!(change.map_index(6), Some(6));
    }

    #[test]
    fn test_move_block_before_zone() {
        let change = StructuralChange::moved(Dimension::Col, vec![5], 0, InsertPosition::Before);
        assert_eq!(adjusted("B1:C1", &change).as_deref(), Some("C1:D1"));
    }

    #[test]
    fn test_map_index_insert_and_remove() {
        let insert = StructuralChange::insert(Dimension::Row, 3, InsertPosition::Before, 2);
        assert_eq!(insert.map_index(2), Some(2));
        assert_eq!(insert.map_index(3), Some(5));

        let remove = StructuralChange::remove(Dimension::Row, vec![1, 4]);
        assert_eq!(remove.map_index(0), Some(0));
        assert_eq!(remove.map_index(1), None);
        assert_eq!(remove.map_index(5), Some(3));
    }

    #[test]
    fn test_insertion_neighbours() {
        let change = StructuralChange::insert(Dimension::Row, 2, InsertPosition::After, 2);
        let n = change.insertion_neighbours().unwrap();
        assert_eq!(n.start, 3);
        assert_eq!(n.before, Some(2));
        assert_eq!(n.after, 5);
    }

    #[test]
    fn test_adjust_on_structural_change() {
        let z = zone("B2:B4");
        assert_eq!(
            adjust_on_structural_change(&z, Dimension::Row, 0, 1).map(|z| z.to_string()),
            Some("B3:B5".to_string())
        );
        assert_eq!(
            adjust_on_structural_change(&z, Dimension::Row, 1, -3),
            None
        );
    }

    proptest! {
        #[test]
        fn prop_insert_then_remove_restores_zone(
            top in 0u32..50, height in 0u32..10, base in 0u32..60, quantity in 1u32..5
        ) {
            let z = Zone::new(top, 0, top + height, 3);
            let insert = StructuralChange::insert(Dimension::Row, base, InsertPosition::Before, quantity);
            let grown = adjust_zone(&z, &insert).apply_to(z).unwrap();
            let remove = StructuralChange::remove(Dimension::Row, (base..base + quantity).collect());
            let restored = adjust_zone(&grown, &remove).apply_to(grown).unwrap();
            prop_assert_eq!(restored, z);
        }

        #[test]
        fn prop_zone_corners_follow_map_index(
            top in 0u32..40, height in 0u32..8, removed in proptest::collection::vec(0u32..50, 1..6)
        ) {
            let z = Zone::new(top, 0, top + height, 0);
            let change = StructuralChange::remove(Dimension::Row, removed);
            let survivors: Vec<u32> = (top..=top + height).filter_map(|r| change.map_index(r)).collect();
            match adjust_zone(&z, &change).apply_to(z) {
                None => prop_assert!(survivors.is_empty()),
                Some(adjusted) => {
                    prop_assert_eq!(Some(adjusted.top), survivors.first().copied());
                    prop_assert_eq!(adjusted.bottom, survivors.last().copied());
                }
            }
        }

        #[test]
        fn prop_move_preserves_row_count(
            first in 0u32..20, len in 1u32..4, base in 0u32..30, before in any::<bool>()
        ) {
            let elements: Vec<u32> = (first..first + len).collect();
            let position = if before { InsertPosition::Before } else { InsertPosition::After };
            let change = StructuralChange::moved(Dimension::Row, elements, base, position);
            let mut mapped: Vec<u32> = (0..60).filter_map(|r| change.map_index(r)).collect();
            mapped.sort_unstable();
            mapped.dedup();
            prop_assert_eq!(mapped.len(), 60);
        }
    }
}
