//! # lattice-core
//!
//! Core data structures for the lattice document engine.
//!
//! This crate provides the pure, engine-independent building blocks:
//! - [`Zone`] and [`Range`] - Rectangular cell regions, optionally open-ended, and their sheet-qualified form
//! - [`adjust`] - How zones and indices follow row/column insertion, removal and moves
//! - [`formula`] - Reference-level formula rewriting (copy offsets, structural changes, sheet renames)
//! - [`CellValue`] - Evaluated cell values
//! - [`Style`], [`Border`], [`Color`] - Cell formatting
//!
//! ## Example
//!
//! ```rust
//! use lattice_core::{adjust_zone, Dimension, InsertPosition, StructuralChange, Zone};
//!
//! let zone = Zone::parse("B2:C3").unwrap();
//! let change = StructuralChange::insert(Dimension::Col, 0, InsertPosition::Before, 1);
//! let moved = adjust_zone(&zone, &change).apply_to(zone).unwrap();
//! assert_eq!(moved.to_string(), "C2:D3");
//! ```

pub mod adjust;
pub mod error;
pub mod formula;
pub mod range;
pub mod style;
pub mod value;
pub mod zone;

// Re-exports for convenience
pub use adjust::{
    adjust_on_structural_change, adjust_zone, Dimension, InsertPosition, InsertionNeighbours,
    StructuralChange, ZoneAdjustment,
};
pub use error::{Error, Result};
pub use range::{Range, SheetId};
pub use style::{Border, BorderEdge, BorderLineStyle, Color, HorizontalAlignment, Style};
pub use value::{CellError, CellValue};
pub use zone::{union_zones, CellAddress, CellPosition, Zone};

/// Maximum number of rows in a sheet
pub const MAX_ROWS: u32 = 1_048_576;

/// Maximum number of columns in a sheet
pub const MAX_COLS: u32 = 16_384;

/// Maximum length of a sheet name
pub const MAX_SHEET_NAME_LEN: usize = 31;
