//! Commands and dispatch results
//!
//! [`Command`] is the closed set of requests the engine understands. It serializes
//! as an internally tagged JSON object (`{"type": "UPDATE_CELL", ...}`), which is
//! also the wire format of collaborative revisions and CLI scripts.

use crate::plugins::borders::BorderPosition;
use crate::plugins::charts::ChartDefinitionData;
use crate::plugins::conditional_format::ConditionalFormat;
use crate::plugins::data_validation::DataValidationRule;
use crate::plugins::figures::{Figure, PixelOffset};
use crate::plugins::tables::TableConfig;
use crate::ui_plugins::clipboard::PasteMode;
use crate::ui_plugins::selection::MoveDirection;
use lattice_core::{
    Border, BorderEdge, CellPosition, Dimension, InsertPosition, SheetId, StructuralChange, Style,
    Zone,
};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A request to change the document or the UI state
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Command {
    // === Sheets ===
    CreateSheet {
        sheet_id: SheetId,
        name: String,
        /// Index in the sheet list, appended when absent
        #[serde(default)]
        position: Option<usize>,
        #[serde(default)]
        rows: Option<u32>,
        #[serde(default)]
        cols: Option<u32>,
    },
    DeleteSheet {
        sheet_id: SheetId,
    },
    DuplicateSheet {
        sheet_id: SheetId,
        new_sheet_id: SheetId,
        name: String,
    },
    RenameSheet {
        sheet_id: SheetId,
        name: String,
    },
    MoveSheet {
        sheet_id: SheetId,
        delta: i32,
    },
    ActivateSheet {
        sheet_id: SheetId,
    },

    // === Grid structure ===
    AddColumnsRows {
        sheet_id: SheetId,
        dimension: Dimension,
        base: u32,
        position: InsertPosition,
        quantity: u32,
    },
    RemoveColumnsRows {
        sheet_id: SheetId,
        dimension: Dimension,
        elements: Vec<u32>,
    },
    MoveColumnsRows {
        sheet_id: SheetId,
        dimension: Dimension,
        base: u32,
        elements: Vec<u32>,
        position: InsertPosition,
    },

    // === Cells ===
    UpdateCell {
        sheet_id: SheetId,
        col: u32,
        row: u32,
        #[serde(default)]
        content: Option<String>,
        /// Replaces the cell style when present
        #[serde(default)]
        style: Option<Style>,
        /// Replaces the number format when present (empty string clears it)
        #[serde(default)]
        format: Option<String>,
    },
    ClearCell {
        sheet_id: SheetId,
        col: u32,
        row: u32,
    },
    DeleteContent {
        sheet_id: SheetId,
        target: Vec<Zone>,
    },
    SetFormatting {
        sheet_id: SheetId,
        target: Vec<Zone>,
        /// Layered on top of the existing style
        #[serde(default)]
        style: Option<Style>,
        #[serde(default)]
        format: Option<String>,
    },
    ClearFormatting {
        sheet_id: SheetId,
        target: Vec<Zone>,
    },

    // === Merges ===
    AddMerge {
        sheet_id: SheetId,
        target: Vec<Zone>,
        #[serde(default)]
        force: bool,
    },
    RemoveMerge {
        sheet_id: SheetId,
        target: Vec<Zone>,
    },

    // === Borders ===
    SetBorder {
        sheet_id: SheetId,
        col: u32,
        row: u32,
        #[serde(default)]
        border: Option<Border>,
    },
    SetZoneBorders {
        sheet_id: SheetId,
        target: Vec<Zone>,
        position: BorderPosition,
        #[serde(default)]
        edge: Option<BorderEdge>,
    },

    // === Conditional formats ===
    AddConditionalFormat {
        sheet_id: SheetId,
        cf: ConditionalFormat,
        ranges: Vec<String>,
    },
    RemoveConditionalFormat {
        sheet_id: SheetId,
        id: String,
    },
    ChangeConditionalFormatPriority {
        sheet_id: SheetId,
        id: String,
        delta: i32,
    },

    // === Data validation ===
    AddDataValidationRule {
        sheet_id: SheetId,
        rule: DataValidationRule,
        ranges: Vec<String>,
    },
    RemoveDataValidationRule {
        sheet_id: SheetId,
        id: String,
    },

    // === Protection ===
    AddProtectionRule {
        sheet_id: SheetId,
        id: String,
        ranges: Vec<String>,
    },
    RemoveProtectionRule {
        sheet_id: SheetId,
        id: String,
    },

    // === Tables ===
    CreateTable {
        sheet_id: SheetId,
        id: String,
        range: String,
        #[serde(default)]
        config: TableConfig,
    },
    UpdateTable {
        sheet_id: SheetId,
        id: String,
        #[serde(default)]
        range: Option<String>,
        #[serde(default)]
        config: Option<TableConfig>,
    },
    RemoveTable {
        sheet_id: SheetId,
        target: Vec<Zone>,
    },

    // === Figures ===
    CreateFigure {
        sheet_id: SheetId,
        figure: Figure,
    },
    UpdateFigure {
        sheet_id: SheetId,
        id: String,
        #[serde(default)]
        anchor: Option<CellPosition>,
        #[serde(default)]
        offset: Option<PixelOffset>,
        #[serde(default)]
        width: Option<u32>,
        #[serde(default)]
        height: Option<u32>,
    },
    DeleteFigure {
        sheet_id: SheetId,
        id: String,
    },

    // === Charts ===
    CreateChart {
        sheet_id: SheetId,
        figure_id: String,
        anchor: CellPosition,
        #[serde(default)]
        offset: PixelOffset,
        width: u32,
        height: u32,
        definition: ChartDefinitionData,
    },
    UpdateChart {
        sheet_id: SheetId,
        figure_id: String,
        definition: ChartDefinitionData,
    },

    // === Custom colors ===
    AddCustomColor {
        color: String,
    },

    // === Selection (UI) ===
    SelectCell {
        col: u32,
        row: u32,
    },
    SetSelection {
        anchor: CellPosition,
        zones: Vec<Zone>,
    },
    MoveCursor {
        direction: MoveDirection,
        step: i32,
    },
    SelectAll,

    // === Clipboard (UI) ===
    Copy {
        target: Vec<Zone>,
    },
    Cut {
        target: Vec<Zone>,
    },
    Paste {
        target: Vec<Zone>,
        #[serde(default)]
        mode: PasteMode,
        #[serde(default)]
        force: bool,
    },
    ClearClipboard,

    // === History ===
    Undo,
    Redo,
}

impl Command {
    /// The existing sheet a command operates on
    ///
    /// `CreateSheet` names a sheet that does not exist yet and returns `None`.
    pub fn sheet_id(&self) -> Option<&SheetId> {
        use Command::*;
        match self {
            DeleteSheet { sheet_id }
            | DuplicateSheet { sheet_id, .. }
            | RenameSheet { sheet_id, .. }
            | MoveSheet { sheet_id, .. }
            | ActivateSheet { sheet_id }
            | AddColumnsRows { sheet_id, .. }
            | RemoveColumnsRows { sheet_id, .. }
            | MoveColumnsRows { sheet_id, .. }
            | UpdateCell { sheet_id, .. }
            | ClearCell { sheet_id, .. }
            | DeleteContent { sheet_id, .. }
            | SetFormatting { sheet_id, .. }
            | ClearFormatting { sheet_id, .. }
            | AddMerge { sheet_id, .. }
            | RemoveMerge { sheet_id, .. }
            | SetBorder { sheet_id, .. }
            | SetZoneBorders { sheet_id, .. }
            | AddConditionalFormat { sheet_id, .. }
            | RemoveConditionalFormat { sheet_id, .. }
            | ChangeConditionalFormatPriority { sheet_id, .. }
            | AddDataValidationRule { sheet_id, .. }
            | RemoveDataValidationRule { sheet_id, .. }
            | AddProtectionRule { sheet_id, .. }
            | RemoveProtectionRule { sheet_id, .. }
            | CreateTable { sheet_id, .. }
            | UpdateTable { sheet_id, .. }
            | RemoveTable { sheet_id, .. }
            | CreateFigure { sheet_id, .. }
            | UpdateFigure { sheet_id, .. }
            | DeleteFigure { sheet_id, .. }
            | CreateChart { sheet_id, .. }
            | UpdateChart { sheet_id, .. } => Some(sheet_id),
            CreateSheet { .. } | AddCustomColor { .. } | SelectCell { .. }
            | SetSelection { .. } | MoveCursor { .. } | SelectAll | Copy { .. } | Cut { .. }
            | Paste { .. } | ClearClipboard | Undo | Redo => None,
        }
    }

    /// Zones of a sheet-level command that targets cells of `sheet_id()`
    pub fn target(&self) -> Option<&[Zone]> {
        use Command::*;
        match self {
            DeleteContent { target, .. }
            | SetFormatting { target, .. }
            | ClearFormatting { target, .. }
            | AddMerge { target, .. }
            | RemoveMerge { target, .. }
            | SetZoneBorders { target, .. }
            | RemoveTable { target, .. } => Some(target),
            _ => None,
        }
    }

    /// The single cell a cell-level command targets
    pub fn cell(&self) -> Option<CellPosition> {
        match self {
            Command::UpdateCell { col, row, .. }
            | Command::ClearCell { col, row, .. }
            | Command::SetBorder { col, row, .. } => Some(CellPosition::new(*col, *row)),
            _ => None,
        }
    }

    /// Zones whose cells the command writes (content, format, borders or merges)
    pub fn written_zones(&self) -> Vec<Zone> {
        use Command::*;
        match self {
            UpdateCell { .. } | ClearCell { .. } | SetBorder { .. } => self
                .cell()
                .map(|p| vec![Zone::single(p.col, p.row)])
                .unwrap_or_default(),
            DeleteContent { target, .. }
            | SetFormatting { target, .. }
            | ClearFormatting { target, .. }
            | AddMerge { target, .. }
            | RemoveMerge { target, .. }
            | SetZoneBorders { target, .. } => target.clone(),
            _ => Vec::new(),
        }
    }

    /// The structural change a command applies to its sheet
    pub fn structural_change(&self) -> Option<(&SheetId, StructuralChange)> {
        match self {
            Command::AddColumnsRows {
                sheet_id,
                dimension,
                base,
                position,
                quantity,
            } => Some((
                sheet_id,
                StructuralChange::insert(*dimension, *base, *position, *quantity),
            )),
            Command::RemoveColumnsRows {
                sheet_id,
                dimension,
                elements,
            } => Some((sheet_id, StructuralChange::remove(*dimension, elements.clone()))),
            Command::MoveColumnsRows {
                sheet_id,
                dimension,
                base,
                elements,
                position,
            } => Some((
                sheet_id,
                StructuralChange::moved(*dimension, elements.clone(), *base, *position),
            )),
            _ => None,
        }
    }

    /// Commands that only touch transient UI state and are never recorded in history
    pub fn is_ui_only(&self) -> bool {
        use Command::*;
        matches!(
            self,
            ActivateSheet { .. }
                | SelectCell { .. }
                | SetSelection { .. }
                | MoveCursor { .. }
                | SelectAll
                | Copy { .. }
                | Cut { .. }
                | ClearClipboard
        )
    }

    /// The same command with its confirmation bypassed
    pub fn with_force(self) -> Command {
        match self {
            Command::Paste { target, mode, .. } => Command::Paste {
                target,
                mode,
                force: true,
            },
            Command::AddMerge {
                sheet_id, target, ..
            } => Command::AddMerge {
                sheet_id,
                target,
                force: true,
            },
            other => other,
        }
    }
}

/// Named reason a command was not applied
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, thiserror::Error)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CommandError {
    #[error("the range is empty")]
    EmptyRange,
    #[error("the range is invalid")]
    InvalidRange,
    #[error("the sheet does not exist")]
    InvalidSheetId,
    #[error("a sheet with this id already exists")]
    DuplicatedSheetId,
    #[error("a sheet with this name already exists")]
    DuplicatedSheetName,
    #[error("the sheet name is invalid")]
    InvalidSheetName,
    #[error("a document needs at least one sheet")]
    NotEnoughSheets,
    #[error("the sheet cannot move that far")]
    WrongSheetMove,
    #[error("an entity with this id already exists")]
    DuplicatedIdentifier,
    #[error("the entity does not exist")]
    EntityDoesNotExist,
    #[error("the target is outside the sheet")]
    TargetOutOfSheet,
    #[error("at least one row and one column must remain")]
    NotEnoughElements,
    #[error("the quantity must be positive")]
    InvalidQuantity,
    #[error("the clipboard shape does not fit the target")]
    WrongPasteShape,
    #[error("this paste mode is not available for cut content")]
    WrongPasteOption,
    #[error("these zones cannot be copied together")]
    WrongCopySelection,
    #[error("only one zone can be cut")]
    WrongCutSelection,
    #[error("the clipboard is empty")]
    EmptyClipboard,
    #[error("this would remove an existing merge")]
    WillRemoveExistingMerge,
    #[error("merging would delete cell content")]
    MergeIsDestructive,
    #[error("merges cannot overlap")]
    MergeOverlap,
    #[error("merges are not allowed inside a table")]
    MergeInTable,
    #[error("tables cannot overlap")]
    TableOverlap,
    #[error("the selection is outside the sheet")]
    SelectionOutOfBound,
    #[error("the selection step must not be zero")]
    InvalidSelectionStep,
    #[error("the cell is protected")]
    ProtectedCell,
    #[error("the value is rejected by a data validation rule")]
    BlockingValidationRule,
    #[error("the criterion is missing a value")]
    MissingCriterionValue,
    #[error("the color is invalid")]
    InvalidColor,
    #[error("nothing to undo")]
    EmptyUndoStack,
    #[error("nothing to redo")]
    EmptyRedoStack,
    #[error("cancelled by the user")]
    CancelledByUser,
}

impl CommandError {
    /// Rejections the user may override by confirming the command
    pub fn is_confirmable(&self) -> bool {
        matches!(
            self,
            CommandError::WillRemoveExistingMerge | CommandError::MergeIsDestructive
        )
    }
}

/// Outcome of a dispatch
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DispatchResult {
    Success,
    Rejected(Vec<CommandError>),
}

impl DispatchResult {
    /// Build a result from accumulated reasons, deduplicated in first-seen order
    pub fn from_reasons(reasons: Vec<CommandError>) -> Self {
        if reasons.is_empty() {
            return DispatchResult::Success;
        }
        let mut unique = Vec::with_capacity(reasons.len());
        for reason in reasons {
            if !unique.contains(&reason) {
                unique.push(reason);
            }
        }
        DispatchResult::Rejected(unique)
    }

    pub fn is_success(&self) -> bool {
        matches!(self, DispatchResult::Success)
    }

    /// Rejection reasons, empty on success
    pub fn reasons(&self) -> &[CommandError] {
        match self {
            DispatchResult::Success => &[],
            DispatchResult::Rejected(reasons) => reasons,
        }
    }

    pub fn is_rejected_by(&self, reason: CommandError) -> bool {
        self.reasons().contains(&reason)
    }
}

impl fmt::Display for DispatchResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DispatchResult::Success => write!(f, "ok"),
            DispatchResult::Rejected(reasons) => {
                let codes: Vec<String> = reasons
                    .iter()
                    .map(|r| {
                        serde_json::to_value(r)
                            .ok()
                            .and_then(|v| v.as_str().map(str::to_string))
                            .unwrap_or_else(|| format!("{:?}", r))
                    })
                    .collect();
                write!(f, "rejected: {}", codes.join(", "))
            }
        }
    }
}
