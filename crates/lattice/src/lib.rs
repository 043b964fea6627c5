//! # lattice
//!
//! A reactive, in-memory spreadsheet document engine.
//!
//! Documents change only through commands. Each command is validated by every
//! plugin before any state moves, applied atomically, recorded for undo/redo
//! and replayable on collaborating clients.
//!
//! ## Features
//!
//! - Sheets, cells, merges, borders and styles
//! - Conditional formats, data validation, protection, tables, figures and charts
//!   whose ranges follow row/column insertion, removal and moves
//! - Undo/redo with batching and selective undo under concurrent edits
//! - Copy, cut and paste with tiling, formula rebasing and paste modes
//! - A versioned JSON document format
//!
//! ## Example
//!
//! ```rust
//! use lattice::prelude::*;
//!
//! let mut engine = Engine::new();
//! let sheet = engine.active_sheet_id();
//!
//! engine.dispatch(Command::UpdateCell {
//!     sheet_id: sheet.clone(),
//!     col: 1,
//!     row: 1,
//!     content: Some("=A1".into()),
//!     style: None,
//!     format: None,
//! });
//!
//! // insert a column before B: the formula cell moves to C2
//! engine.dispatch(Command::AddColumnsRows {
//!     sheet_id: sheet.clone(),
//!     dimension: Dimension::Col,
//!     base: 1,
//!     position: InsertPosition::Before,
//!     quantity: 1,
//! });
//! let c2 = CellPosition::parse("C2").unwrap();
//! assert_eq!(engine.getters().cells().content(&sheet, c2), "=A1");
//!
//! engine.undo();
//! assert_eq!(engine.getters().cells().content(&sheet, c2), "");
//! ```

pub mod prelude;

// Re-export core types
pub use lattice_core::{
    adjust_on_structural_change, adjust_zone, formula, union_zones, Border, BorderEdge,
    BorderLineStyle, CellAddress, CellError, CellPosition, CellValue, Color, Dimension,
    HorizontalAlignment, InsertPosition, Range, SheetId, StructuralChange, Style, Zone,
    ZoneAdjustment, MAX_COLS, MAX_ROWS, MAX_SHEET_NAME_LEN,
};

// Re-export the engine
pub use lattice_engine::{
    data, history, plugins, ui_plugins, AcceptingUi, Command, CommandError, CorePlugin,
    DispatchResult, Engine, EngineConfig, Evaluator, Getters, HeadlessUi, LiteralEvaluator,
    LocalTransport, MoveDirection, Notification, NotificationKind, Origin, PasteMode, Revision,
    RevisionId, RevisionKind, Selection, Session, Transport, UiBridge, UiPlugin, ValueLookup,
    WorkbookData,
};

/// Errors of the core data structures
pub use lattice_core::Error as CoreError;
/// Errors of the engine (documents, JSON)
pub use lattice_engine::{Error, Result};
