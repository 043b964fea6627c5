//! Prelude module - common imports for lattice users
//!
//! ```rust
//! use lattice::prelude::*;
//! ```

pub use crate::{
    // Cells and zones
    CellPosition,
    CellValue,
    // Formatting
    Border,
    BorderEdge,
    BorderLineStyle,
    Color,
    Style,
    // Structure
    Dimension,
    InsertPosition,
    Range,
    SheetId,
    StructuralChange,
    Zone,
    // Engine
    Command,
    CommandError,
    DispatchResult,
    Engine,
    EngineConfig,
    PasteMode,
    WorkbookData,
    // Collaborators
    AcceptingUi,
    HeadlessUi,
    UiBridge,
    // Collaboration
    Revision,
    Session,
    Transport,
    // Errors
    Error,
    Result,
};
