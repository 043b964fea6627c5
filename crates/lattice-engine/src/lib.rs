//! # lattice-engine
//!
//! Command-driven document engine for the lattice spreadsheet model.
//!
//! All state lives in plugins and changes only through [`Command`]s handed to
//! [`Engine::dispatch`]. A command is validated by every plugin before any of
//! them applies it, so it either applies everywhere or nowhere. Every applied
//! change is recorded for undo/redo and can be replayed by collaborating
//! clients through a [`Session`].
//!
//! ## Example
//!
//! ```rust
//! use lattice_engine::{Command, Engine};
//!
//! let mut engine = Engine::new();
//! let sheet_id = engine.active_sheet_id();
//! let result = engine.dispatch(Command::UpdateCell {
//!     sheet_id: sheet_id.clone(),
//!     col: 0,
//!     row: 0,
//!     content: Some("hello".into()),
//!     style: None,
//!     format: None,
//! });
//! assert!(result.is_success());
//! engine.undo();
//! let a1 = lattice_core::CellPosition::new(0, 0);
//! assert!(engine.getters().cells().cell(&sheet_id, a1).is_none());
//! ```

pub mod command;
pub mod config;
pub mod data;
pub mod engine;
pub mod error;
pub mod evaluator;
pub mod history;
pub mod plugin;
pub mod plugins;
pub mod session;
pub mod ui;
pub mod ui_plugins;

pub use command::{Command, CommandError, DispatchResult};
pub use config::EngineConfig;
pub use data::{WorkbookData, CURRENT_VERSION};
pub use engine::Engine;
pub use error::{Error, Result};
pub use evaluator::{Evaluator, LiteralEvaluator, ValueLookup};
pub use history::{History, HistoryEntry, Origin, RevisionId};
pub use plugin::{CorePlugin, Getters, RangeAdaptation, UiPlugin};
pub use session::{LocalTransport, Revision, RevisionKind, Session, Transport};
pub use ui::{AcceptingUi, HeadlessUi, Notification, NotificationKind, UiBridge};
pub use ui_plugins::clipboard::PasteMode;
pub use ui_plugins::selection::{MoveDirection, Selection};

#[cfg(test)]
pub(crate) mod test_util {
    use crate::{Command, DispatchResult, Engine};
    use lattice_core::{CellPosition, SheetId, Zone};

    pub fn zone(xc: &str) -> Zone {
        Zone::parse(xc).unwrap()
    }

    pub fn pos(xc: &str) -> CellPosition {
        CellPosition::parse(xc).unwrap()
    }

    /// Write `content` in a cell of the active sheet
    pub fn set(engine: &mut Engine, xc: &str, content: &str) -> DispatchResult {
        let position = pos(xc);
        engine.dispatch(Command::UpdateCell {
            sheet_id: engine.active_sheet_id(),
            col: position.col,
            row: position.row,
            content: Some(content.to_string()),
            style: None,
            format: None,
        })
    }

    /// Raw content of a cell of the active sheet
    pub fn content(engine: &Engine, xc: &str) -> String {
        engine
            .getters()
            .cells()
            .content(&engine.active_sheet_id(), pos(xc))
            .to_string()
    }

    /// Create a sheet without activating it
    pub fn add_sheet(engine: &mut Engine, id: &str, name: &str) -> DispatchResult {
        engine.dispatch(Command::CreateSheet {
            sheet_id: SheetId::from(id),
            name: name.to_string(),
            position: None,
            rows: None,
            cols: None,
        })
    }
}
