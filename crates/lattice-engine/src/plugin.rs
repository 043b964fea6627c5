//! Plugin contract
//!
//! State is partitioned across plugins. Core plugins own persistent, undoable
//! document state; UI plugins own transient state (selection, clipboard) that is
//! never persisted nor undone. Plugins read each other through [`Getters`] and
//! affect each other only by dispatching further commands.

use crate::command::{Command, CommandError};
use crate::data::WorkbookData;
use crate::error::Result;
use crate::evaluator::{Evaluator, ValueLookup};
use crate::history::{Direction, StatePatch};
use crate::plugins::borders::BordersPlugin;
use crate::plugins::cells::CellsPlugin;
use crate::plugins::charts::ChartsPlugin;
use crate::plugins::conditional_format::ConditionalFormatPlugin;
use crate::plugins::custom_colors::CustomColorsPlugin;
use crate::plugins::data_validation::DataValidationPlugin;
use crate::plugins::figures::FiguresPlugin;
use crate::plugins::merges::MergesPlugin;
use crate::plugins::protection::ProtectionPlugin;
use crate::plugins::sheets::{Sheet, SheetsPlugin};
use crate::plugins::tables::TablesPlugin;
use crate::ui::UiBridge;
use crate::ui_plugins::clipboard::ClipboardPlugin;
use crate::ui_plugins::selection::{Selection, SelectionPlugin};
use lattice_core::formula::is_formula;
use lattice_core::{CellPosition, CellValue, Color, Range, SheetId, StructuralChange, Style};
use std::any::Any;

/// Depth at which chained formula references stop being followed
const MAX_EVALUATION_DEPTH: usize = 64;

/// How stored ranges must follow a command
///
/// Computed by the dispatcher from the state *before* the command runs, so that
/// plugins see the old sheet name of a renamed or deleted sheet.
#[derive(Debug, Clone, PartialEq)]
pub enum RangeAdaptation {
    Structural {
        sheet_id: SheetId,
        change: StructuralChange,
    },
    SheetDeleted {
        sheet_id: SheetId,
        name: String,
    },
    SheetRenamed {
        sheet_id: SheetId,
        old_name: String,
        new_name: String,
    },
}

/// A plugin owning persistent document state
pub trait CorePlugin: Any {
    fn name(&self) -> &'static str;

    /// Reasons to reject `command`; sees every core plugin
    fn allow_dispatch(&self, _command: &Command, _getters: &Getters<'_>) -> Vec<CommandError> {
        Vec::new()
    }

    /// Keep stored ranges valid; runs before `handle` for every command that moves ranges
    fn adapt_ranges(&mut self, _adaptation: &RangeAdaptation, _ctx: &mut ExecContext<'_>) {}

    /// Apply `command`; sees only the plugins registered before this one
    fn handle(&mut self, _command: &Command, _ctx: &mut ExecContext<'_>) {}

    /// Re-apply a recorded mutation; patches owned by other plugins are ignored
    fn apply_patch(&mut self, patch: &StatePatch, direction: Direction);

    fn export(&self, data: &mut WorkbookData);

    fn import(&mut self, data: &WorkbookData) -> Result<()>;

    fn as_any(&self) -> &dyn Any;
}

/// A plugin owning transient UI state
pub trait UiPlugin: Any {
    fn name(&self) -> &'static str;

    fn allow_dispatch(&self, _command: &Command, _view: &UiView<'_>) -> Vec<CommandError> {
        Vec::new()
    }

    fn handle(&mut self, _command: &Command, _ctx: &mut UiContext<'_>) {}

    /// Re-clamp transient state after every dispatch, undo and redo
    fn finalize(&mut self, _view: &UiView<'_>) {}

    fn as_any(&self) -> &dyn Any;
}

/// Read access to core plugins
#[derive(Clone, Copy)]
pub struct Getters<'a> {
    core: &'a [Box<dyn CorePlugin>],
    evaluator: &'a dyn Evaluator,
}

impl<'a> Getters<'a> {
    pub fn new(core: &'a [Box<dyn CorePlugin>], evaluator: &'a dyn Evaluator) -> Self {
        Self { core, evaluator }
    }

    /// A registered plugin by type
    pub fn plugin<P: CorePlugin>(&self) -> Option<&'a P> {
        self.core
            .iter()
            .find_map(|plugin| plugin.as_any().downcast_ref::<P>())
    }

    // The typed accessors below panic when the plugin is not visible from the caller,
    // which only happens when a plugin reads one registered after itself.

    pub fn sheets(&self) -> &'a SheetsPlugin {
        self.require()
    }

    pub fn cells(&self) -> &'a CellsPlugin {
        self.require()
    }

    pub fn merges(&self) -> &'a MergesPlugin {
        self.require()
    }

    pub fn borders(&self) -> &'a BordersPlugin {
        self.require()
    }

    pub fn conditional_formats(&self) -> &'a ConditionalFormatPlugin {
        self.require()
    }

    pub fn data_validation(&self) -> &'a DataValidationPlugin {
        self.require()
    }

    pub fn protection(&self) -> &'a ProtectionPlugin {
        self.require()
    }

    pub fn tables(&self) -> &'a TablesPlugin {
        self.require()
    }

    pub fn figures(&self) -> &'a FiguresPlugin {
        self.require()
    }

    pub fn charts(&self) -> &'a ChartsPlugin {
        self.require()
    }

    pub fn custom_colors_plugin(&self) -> &'a CustomColorsPlugin {
        self.require()
    }

    fn require<P: CorePlugin>(&self) -> &'a P {
        match self.plugin::<P>() {
            Some(plugin) => plugin,
            None => panic!(
                "plugin {} read before it is registered",
                std::any::type_name::<P>()
            ),
        }
    }

    pub fn sheet(&self, sheet_id: &SheetId) -> Option<&'a Sheet> {
        self.sheets().sheet(sheet_id)
    }

    pub fn sheet_name(&self, sheet_id: &SheetId) -> Option<String> {
        self.sheet(sheet_id).map(|sheet| sheet.name.clone())
    }

    pub fn sheet_id_by_name(&self, name: &str) -> Option<SheetId> {
        self.sheets().sheet_id_by_name(name)
    }

    /// Parse a textual range relative to `sheet_id`
    pub fn parse_range(&self, xc: &str, sheet_id: &SheetId) -> lattice_core::Result<Range> {
        Range::parse(xc, sheet_id, |name| self.sheet_id_by_name(name))
    }

    /// Textual form of `range` as seen from `sheet_id`
    pub fn range_to_xc(&self, range: &Range, sheet_id: &SheetId) -> String {
        range.to_xc(sheet_id, |id| self.sheet_name(id))
    }

    /// Evaluated value of a cell
    pub fn evaluated_value(&self, sheet_id: &SheetId, position: CellPosition) -> CellValue {
        EvaluationScope {
            getters: *self,
            depth: 0,
        }
        .value(sheet_id, position)
    }

    /// Evaluate cell content as if it were written in a cell of `sheet_id`
    pub fn evaluate(&self, sheet_id: &SheetId, content: &str) -> CellValue {
        if is_formula(content) {
            let scope = EvaluationScope {
                getters: *self,
                depth: 0,
            };
            self.evaluator.evaluate(content, sheet_id, &scope)
        } else {
            CellValue::from_literal(content)
        }
    }

    /// Cell style with the first matching conditional format layered on top
    pub fn computed_style(&self, sheet_id: &SheetId, position: CellPosition) -> Style {
        let base = self
            .plugin::<CellsPlugin>()
            .and_then(|cells| cells.cell(sheet_id, position))
            .and_then(|cell| cell.style.clone())
            .unwrap_or_default();
        match self
            .plugin::<ConditionalFormatPlugin>()
            .and_then(|cf| cf.matching_style(sheet_id, position, self))
        {
            Some(style) => base.merged(&style),
            None => base,
        }
    }

    /// Every color used in the document
    pub fn custom_colors(&self) -> Vec<Color> {
        self.custom_colors_plugin().colors(self)
    }
}

struct EvaluationScope<'a> {
    getters: Getters<'a>,
    depth: usize,
}

impl ValueLookup for EvaluationScope<'_> {
    fn value(&self, sheet_id: &SheetId, position: CellPosition) -> CellValue {
        let Some(cell) = self
            .getters
            .plugin::<CellsPlugin>()
            .and_then(|cells| cells.cell(sheet_id, position))
        else {
            return CellValue::Empty;
        };
        if !is_formula(&cell.content) {
            return CellValue::from_literal(&cell.content);
        }
        if self.depth >= MAX_EVALUATION_DEPTH {
            return CellValue::Error(lattice_core::CellError::Ref);
        }
        let nested = EvaluationScope {
            getters: self.getters,
            depth: self.depth + 1,
        };
        self.getters
            .evaluator
            .evaluate(&cell.content, sheet_id, &nested)
    }

    fn sheet_id(&self, name: &str) -> Option<SheetId> {
        self.getters.sheet_id_by_name(name)
    }
}

/// What a core plugin can do while executing a command
pub struct ExecContext<'a> {
    pub getters: Getters<'a>,
    patches: &'a mut Vec<StatePatch>,
    queue: &'a mut Vec<Command>,
}

impl<'a> ExecContext<'a> {
    pub fn new(
        getters: Getters<'a>,
        patches: &'a mut Vec<StatePatch>,
        queue: &'a mut Vec<Command>,
    ) -> Self {
        Self {
            getters,
            patches,
            queue,
        }
    }

    /// Record a mutation so the transaction can be rolled back and undone
    pub fn record(&mut self, patch: StatePatch) {
        self.patches.push(patch);
    }

    /// Queue a derived command; it runs right after the current one, before later ones
    pub fn dispatch(&mut self, command: Command) {
        log::trace!("queue derived command {:?}", command);
        self.queue.push(command);
    }
}

/// Read access for UI plugins: every core plugin plus the UI plugins before the caller
#[derive(Clone, Copy)]
pub struct UiView<'a> {
    pub getters: Getters<'a>,
    ui_plugins: &'a [Box<dyn UiPlugin>],
}

impl<'a> UiView<'a> {
    pub fn new(getters: Getters<'a>, ui_plugins: &'a [Box<dyn UiPlugin>]) -> Self {
        Self {
            getters,
            ui_plugins,
        }
    }

    pub fn plugin<P: UiPlugin>(&self) -> Option<&'a P> {
        self.ui_plugins
            .iter()
            .find_map(|plugin| plugin.as_any().downcast_ref::<P>())
    }

    /// Current selection; `None` only if the selection plugin is not visible
    pub fn selection(&self) -> Option<&'a Selection> {
        self.plugin::<SelectionPlugin>()
            .map(SelectionPlugin::selection)
    }

    pub fn clipboard(&self) -> Option<&'a ClipboardPlugin> {
        self.plugin::<ClipboardPlugin>()
    }
}

/// What a UI plugin can do while executing a command
pub struct UiContext<'a> {
    pub view: UiView<'a>,
    pub ui: &'a dyn UiBridge,
    queue: &'a mut Vec<Command>,
}

impl<'a> UiContext<'a> {
    pub fn new(view: UiView<'a>, ui: &'a dyn UiBridge, queue: &'a mut Vec<Command>) -> Self {
        Self { view, ui, queue }
    }

    pub fn dispatch(&mut self, command: Command) {
        log::trace!("queue derived command {:?}", command);
        self.queue.push(command);
    }
}
