//! Cell positions, A1 addresses and zones
//!
//! A [`Zone`] is a rectangle of cells addressed by 0-based row/column indices. Either
//! the bottom or the right edge may be open-ended, which is how whole columns
//! (`"A:B"`) and whole rows (`"2:3"`) are represented.

use crate::error::{Error, Result};
use crate::{MAX_COLS, MAX_ROWS};
use std::fmt;
use std::str::FromStr;

/// A cell position in a sheet (0-based)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct CellPosition {
    /// Column index (A=0)
    pub col: u32,
    /// Row index (row "1" = 0)
    pub row: u32,
}

impl CellPosition {
    /// Create a new position
    pub const fn new(col: u32, row: u32) -> Self {
        Self { col, row }
    }

    /// Parse a position from A1 notation (`$` markers are accepted and dropped)
    pub fn parse(s: &str) -> Result<Self> {
        CellAddress::parse(s).map(|addr| addr.position())
    }

    /// Format as A1 notation
    pub fn to_a1_string(&self) -> String {
        CellAddress::new(self.row, self.col).to_a1_string()
    }

    /// Shift by a signed offset, `None` when the result leaves the grid
    pub fn offset(&self, d_col: i64, d_row: i64) -> Option<Self> {
        let col = self.col as i64 + d_col;
        let row = self.row as i64 + d_row;
        if col < 0 || row < 0 || col >= MAX_COLS as i64 || row >= MAX_ROWS as i64 {
            return None;
        }
        Some(Self::new(col as u32, row as u32))
    }
}

impl fmt::Display for CellPosition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_a1_string())
    }
}

/// A cell address (e.g., "A1", "$B$2")
///
/// The optional `$` prefix makes a reference absolute (doesn't change when copied).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CellAddress {
    /// Row index (0-based internally, 1-based in display)
    pub row: u32,
    /// Column index (0-based, A=0, B=1, ..., XFD=16383)
    pub col: u32,
    /// Whether the row reference is absolute ($)
    pub row_absolute: bool,
    /// Whether the column reference is absolute ($)
    pub col_absolute: bool,
}

impl CellAddress {
    /// Create a new cell address with relative references
    pub fn new(row: u32, col: u32) -> Self {
        Self {
            row,
            col,
            row_absolute: false,
            col_absolute: false,
        }
    }

    /// Create an absolute cell address ($A$1 style)
    pub fn absolute(row: u32, col: u32) -> Self {
        Self {
            row,
            col,
            row_absolute: true,
            col_absolute: true,
        }
    }

    /// The position this address points at
    pub fn position(&self) -> CellPosition {
        CellPosition::new(self.col, self.row)
    }

    /// Parse a cell address from A1-style notation
    ///
    /// # Examples
    /// ```
    /// use lattice_core::CellAddress;
    ///
    /// let addr = CellAddress::parse("$B$2").unwrap();
    /// assert_eq!(addr.row, 1);
    /// assert_eq!(addr.col, 1);
    /// assert!(addr.row_absolute);
    /// assert!(addr.col_absolute);
    /// ```
    pub fn parse(s: &str) -> Result<Self> {
        let s = s.trim();
        if s.is_empty() {
            return Err(Error::InvalidAddress("empty address".into()));
        }
        let part = HeaderPart::parse(s)?;
        match (part.col, part.row) {
            (Some((col, col_absolute)), Some((row, row_absolute))) => Ok(Self {
                row,
                col,
                row_absolute,
                col_absolute,
            }),
            (None, _) => Err(Error::InvalidAddress(format!(
                "no column letters in '{}'",
                s
            ))),
            (_, None) => Err(Error::InvalidAddress(format!("no row number in '{}'", s))),
        }
    }

    /// Convert column index to letters (0 = A, 25 = Z, 26 = AA, etc.)
    pub fn column_to_letters(col: u32) -> String {
        let mut result = String::new();
        let mut n = col + 1;

        while n > 0 {
            n -= 1;
            let c = ((n % 26) as u8 + b'A') as char;
            result.insert(0, c);
            n /= 26;
        }

        result
    }

    /// Convert column letters to index (A = 0, Z = 25, AA = 26, etc.)
    pub fn letters_to_column(letters: &str) -> Result<u32> {
        if letters.is_empty() {
            return Err(Error::InvalidAddress("empty column letters".into()));
        }

        let mut col: u64 = 0;
        for c in letters.chars() {
            if !c.is_ascii_alphabetic() {
                return Err(Error::InvalidAddress(format!(
                    "invalid column letter '{}'",
                    c
                )));
            }
            col = col * 26 + (c.to_ascii_uppercase() as u64 - 'A' as u64 + 1);
            if col > MAX_COLS as u64 {
                return Err(Error::ColumnOutOfBounds(col as u32 - 1, MAX_COLS - 1));
            }
        }

        Ok(col as u32 - 1)
    }

    /// Format as A1-style string
    pub fn to_a1_string(&self) -> String {
        let mut result = String::new();

        if self.col_absolute {
            result.push('$');
        }
        result.push_str(&Self::column_to_letters(self.col));

        if self.row_absolute {
            result.push('$');
        }
        result.push_str(&(self.row + 1).to_string());

        result
    }
}

impl fmt::Display for CellAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_a1_string())
    }
}

impl FromStr for CellAddress {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

/// One side of an A1 reference: a column, a row, or both, each with its `$` flag
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct HeaderPart {
    pub col: Option<(u32, bool)>,
    pub row: Option<(u32, bool)>,
}

impl HeaderPart {
    /// Parse `A1`, `$A$1`, `A`, `$A`, `1` or `$1`
    pub(crate) fn parse(s: &str) -> Result<Self> {
        let bytes = s.as_bytes();
        let mut pos = 0;

        let col_absolute = bytes.get(pos) == Some(&b'$');
        if col_absolute {
            pos += 1;
        }
        let col_start = pos;
        while pos < bytes.len() && bytes[pos].is_ascii_alphabetic() {
            pos += 1;
        }
        let col = if pos > col_start {
            Some((CellAddress::letters_to_column(&s[col_start..pos])?, col_absolute))
        } else {
            None
        };

        // A lone leading `$` belongs to the row when there are no letters
        let row_absolute = if bytes.get(pos) == Some(&b'$') {
            pos += 1;
            true
        } else {
            col.is_none() && col_absolute
        };

        let row_str = &s[pos..];
        let row = if row_str.is_empty() {
            None
        } else {
            if !row_str.bytes().all(|b| b.is_ascii_digit()) {
                return Err(Error::InvalidAddress(format!("invalid row number in '{}'", s)));
            }
            let row: u32 = row_str
                .parse()
                .map_err(|_| Error::InvalidAddress(format!("invalid row number in '{}'", s)))?;
            if row == 0 {
                return Err(Error::InvalidAddress(format!(
                    "row number must be >= 1 in '{}'",
                    s
                )));
            }
            if row > MAX_ROWS {
                return Err(Error::RowOutOfBounds(row - 1, MAX_ROWS - 1));
            }
            Some((row - 1, row_absolute))
        };

        if col.is_none() && row.is_none() {
            return Err(Error::InvalidAddress(format!("empty reference in '{}'", s)));
        }
        Ok(Self { col, row })
    }
}

/// A rectangular region of cells
///
/// `bottom == None` means the zone extends to the last row (whole columns),
/// `right == None` means it extends to the last column (whole rows).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(try_from = "String", into = "String"))]
pub struct Zone {
    pub top: u32,
    pub left: u32,
    pub bottom: Option<u32>,
    pub right: Option<u32>,
}

impl Zone {
    /// Create a bounded zone, normalizing so that top <= bottom and left <= right
    pub fn new(top: u32, left: u32, bottom: u32, right: u32) -> Self {
        Self {
            top: top.min(bottom),
            left: left.min(right),
            bottom: Some(top.max(bottom)),
            right: Some(left.max(right)),
        }
    }

    /// A single-cell zone
    pub fn single(col: u32, row: u32) -> Self {
        Self::new(row, col, row, col)
    }

    /// Whole columns `left..=right`
    pub fn full_columns(left: u32, right: u32) -> Self {
        Self {
            top: 0,
            left: left.min(right),
            bottom: None,
            right: Some(left.max(right)),
        }
    }

    /// Whole rows `top..=bottom`
    pub fn full_rows(top: u32, bottom: u32) -> Self {
        Self {
            top: top.min(bottom),
            left: 0,
            bottom: Some(top.max(bottom)),
            right: None,
        }
    }

    /// Re-establish the ordering invariant on a zone built field by field
    pub fn normalized(self) -> Self {
        let (top, bottom) = match self.bottom {
            Some(bottom) => (self.top.min(bottom), Some(self.top.max(bottom))),
            None => (self.top, None),
        };
        let (left, right) = match self.right {
            Some(right) => (self.left.min(right), Some(self.left.max(right))),
            None => (self.left, None),
        };
        Self {
            top,
            left,
            bottom,
            right,
        }
    }

    /// Parse `A1`, `A1:B2`, `A:B`, `2:3`, `A2:B` (open bottom) or `A2:3` (open right)
    pub fn parse(s: &str) -> Result<Self> {
        let s = s.trim();
        let invalid = || Error::InvalidRange(s.to_string());
        let (first, second) = match s.split_once(':') {
            Some((a, b)) => (a, Some(b)),
            None => (s, None),
        };
        let start = HeaderPart::parse(first).map_err(|_| invalid())?;
        let Some(second) = second else {
            return match (start.col, start.row) {
                (Some((col, _)), Some((row, _))) => Ok(Self::single(col, row)),
                _ => Err(invalid()),
            };
        };
        let end = HeaderPart::parse(second).map_err(|_| invalid())?;
        let zone = match (start.col, start.row, end.col, end.row) {
            (Some((l, _)), Some((t, _)), Some((r, _)), Some((b, _))) => Self::new(t, l, b, r),
            (Some((l, _)), None, Some((r, _)), None) => Self::full_columns(l, r),
            (None, Some((t, _)), None, Some((b, _))) => Self::full_rows(t, b),
            (Some((l, _)), Some((t, _)), Some((r, _)), None) => Self {
                top: t,
                left: l,
                bottom: None,
                right: Some(r),
            }
            .normalized(),
            (Some((l, _)), Some((t, _)), None, Some((b, _))) => Self {
                top: t,
                left: l,
                bottom: Some(b),
                right: None,
            }
            .normalized(),
            _ => return Err(invalid()),
        };
        Ok(zone)
    }

    /// Format using the shortest A1 notation for the zone's shape
    ///
    /// A zone open on both edges has no A1 form and is written with the grid limits.
    pub fn to_a1_string(&self) -> String {
        let col = CellAddress::column_to_letters;
        match (self.bottom, self.right) {
            (Some(bottom), Some(right)) => {
                let start = CellAddress::new(self.top, self.left).to_a1_string();
                if self.top == bottom && self.left == right {
                    start
                } else {
                    format!("{}:{}", start, CellAddress::new(bottom, right).to_a1_string())
                }
            }
            (None, Some(right)) if self.top == 0 => format!("{}:{}", col(self.left), col(right)),
            (None, Some(right)) => format!("{}{}:{}", col(self.left), self.top + 1, col(right)),
            (Some(bottom), None) if self.left == 0 => format!("{}:{}", self.top + 1, bottom + 1),
            (Some(bottom), None) => format!("{}{}:{}", col(self.left), self.top + 1, bottom + 1),
            (None, None) => format!(
                "{}:{}",
                CellAddress::new(self.top, self.left).to_a1_string(),
                CellAddress::new(MAX_ROWS - 1, MAX_COLS - 1).to_a1_string()
            ),
        }
    }

    /// Bottom edge, treating an open edge as the end of the grid
    pub fn bottom_or_max(&self) -> u32 {
        self.bottom.unwrap_or(u32::MAX)
    }

    /// Right edge, treating an open edge as the end of the grid
    pub fn right_or_max(&self) -> u32 {
        self.right.unwrap_or(u32::MAX)
    }

    pub fn is_single_cell(&self) -> bool {
        self.bottom == Some(self.top) && self.right == Some(self.left)
    }

    pub fn top_left(&self) -> CellPosition {
        CellPosition::new(self.left, self.top)
    }

    /// Number of rows, `None` when open-ended
    pub fn height(&self) -> Option<u32> {
        self.bottom.map(|bottom| bottom - self.top + 1)
    }

    /// Number of columns, `None` when open-ended
    pub fn width(&self) -> Option<u32> {
        self.right.map(|right| right - self.left + 1)
    }

    /// Clip the zone to a sheet of `rows` x `cols`, closing any open edge
    pub fn bounded(&self, rows: u32, cols: u32) -> Self {
        let last_row = rows.saturating_sub(1);
        let last_col = cols.saturating_sub(1);
        Self {
            top: self.top,
            left: self.left,
            bottom: Some(self.bottom.map_or(last_row, |b| b.min(last_row.max(self.top)))),
            right: Some(self.right.map_or(last_col, |r| r.min(last_col.max(self.left)))),
        }
    }

    /// Check if a cell is within this zone
    pub fn contains(&self, col: u32, row: u32) -> bool {
        row >= self.top && row <= self.bottom_or_max() && col >= self.left && col <= self.right_or_max()
    }

    pub fn contains_position(&self, position: CellPosition) -> bool {
        self.contains(position.col, position.row)
    }

    /// Check if this zone overlaps with another
    pub fn intersects(&self, other: &Zone) -> bool {
        self.top <= other.bottom_or_max()
            && self.bottom_or_max() >= other.top
            && self.left <= other.right_or_max()
            && self.right_or_max() >= other.left
    }

    /// The overlapping part of two zones, if any
    pub fn intersection(&self, other: &Zone) -> Option<Zone> {
        if !self.intersects(other) {
            return None;
        }
        Some(Zone {
            top: self.top.max(other.top),
            left: self.left.max(other.left),
            bottom: min_edge(self.bottom, other.bottom),
            right: min_edge(self.right, other.right),
        })
    }

    /// Smallest zone containing both zones
    pub fn bounding_box(&self, other: &Zone) -> Zone {
        Zone {
            top: self.top.min(other.top),
            left: self.left.min(other.left),
            bottom: max_edge(self.bottom, other.bottom),
            right: max_edge(self.right, other.right),
        }
    }

    /// Check if this zone lies entirely inside `other`
    pub fn is_inside(&self, other: &Zone) -> bool {
        self.top >= other.top
            && self.left >= other.left
            && self.bottom_or_max() <= other.bottom_or_max()
            && self.right_or_max() <= other.right_or_max()
    }

    /// Shift the zone by a signed offset, `None` when it would leave the grid
    pub fn offset(&self, d_col: i64, d_row: i64) -> Option<Zone> {
        let shift = |v: u32, d: i64| -> Option<u32> {
            let moved = v as i64 + d;
            (moved >= 0 && moved <= u32::MAX as i64).then_some(moved as u32)
        };
        Some(Zone {
            top: shift(self.top, d_row)?,
            left: shift(self.left, d_col)?,
            bottom: match self.bottom {
                Some(b) => Some(shift(b, d_row)?),
                None => None,
            },
            right: match self.right {
                Some(r) => Some(shift(r, d_col)?),
                None => None,
            },
        })
    }

    /// The parts of `self` not covered by `other`, as disjoint rectangles
    pub fn difference(&self, other: &Zone) -> Vec<Zone> {
        let Some(hole) = self.intersection(other) else {
            return vec![*self];
        };
        let mut parts = Vec::new();
        // band above the hole
        if hole.top > self.top {
            parts.push(Zone {
                bottom: Some(hole.top - 1),
                ..*self
            });
        }
        // band below the hole
        if let Some(hole_bottom) = hole.bottom {
            if hole_bottom < self.bottom_or_max() {
                parts.push(Zone {
                    top: hole_bottom + 1,
                    ..*self
                });
            }
        }
        // left and right of the hole, within the hole's rows
        if hole.left > self.left {
            parts.push(Zone {
                top: hole.top,
                bottom: hole.bottom,
                left: self.left,
                right: Some(hole.left - 1),
            });
        }
        if let Some(hole_right) = hole.right {
            if hole_right < self.right_or_max() {
                parts.push(Zone {
                    top: hole.top,
                    bottom: hole.bottom,
                    left: hole_right + 1,
                    right: self.right,
                });
            }
        }
        parts
    }

    /// Iterate over all cell positions of a bounded zone (row by row)
    ///
    /// Open edges are clipped to the grid limits; callers should clip with
    /// [`Zone::bounded`] against the sheet size first.
    pub fn cells(&self) -> ZoneCells {
        let bounded = self.bounded(MAX_ROWS, MAX_COLS);
        ZoneCells {
            zone: bounded,
            current_row: bounded.top,
            current_col: bounded.left,
        }
    }
}

fn min_edge(a: Option<u32>, b: Option<u32>) -> Option<u32> {
    match (a, b) {
        (Some(a), Some(b)) => Some(a.min(b)),
        (Some(a), None) | (None, Some(a)) => Some(a),
        (None, None) => None,
    }
}

fn max_edge(a: Option<u32>, b: Option<u32>) -> Option<u32> {
    match (a, b) {
        (Some(a), Some(b)) => Some(a.max(b)),
        _ => None,
    }
}

impl fmt::Display for Zone {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_a1_string())
    }
}

impl FromStr for Zone {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl TryFrom<String> for Zone {
    type Error = Error;

    fn try_from(xc: String) -> Result<Self> {
        Self::parse(&xc)
    }
}

impl From<Zone> for String {
    fn from(zone: Zone) -> Self {
        zone.to_a1_string()
    }
}

/// Smallest zone containing every zone of the slice
pub fn union_zones(zones: &[Zone]) -> Option<Zone> {
    let (first, rest) = zones.split_first()?;
    Some(rest.iter().fold(*first, |acc, z| acc.bounding_box(z)))
}

/// Iterator over cells in a zone
pub struct ZoneCells {
    zone: Zone,
    current_row: u32,
    current_col: u32,
}

impl Iterator for ZoneCells {
    type Item = CellPosition;

    fn next(&mut self) -> Option<Self::Item> {
        let bottom = self.zone.bottom_or_max();
        let right = self.zone.right_or_max();
        if self.current_row > bottom {
            return None;
        }

        let position = CellPosition::new(self.current_col, self.current_row);

        if self.current_col >= right {
            self.current_col = self.zone.left;
            self.current_row += 1;
        } else {
            self.current_col += 1;
        }

        Some(position)
    }
}
