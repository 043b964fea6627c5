//! The command dispatcher
//!
//! [`Engine`] owns every plugin, the history and the injected collaborators.
//! A dispatch runs as a transaction:
//!
//! 1. the command is validated by every core plugin, then every UI plugin;
//! 2. each core plugin adapts its stored ranges (structural commands) and handles it,
//!    in registration order, then each UI plugin handles it;
//! 3. derived commands the plugins queued run next, each validated then executed
//!    the same way, before any command queued earlier.
//!
//! A rejection anywhere rolls back every patch recorded so far, so a rejected
//! command is never observable.

use crate::command::{Command, CommandError, DispatchResult};
use crate::config::EngineConfig;
use crate::data::WorkbookData;
use crate::error::Result;
use crate::evaluator::{Evaluator, LiteralEvaluator};
use crate::history::{Direction, History, HistoryEntry, Origin, RevisionId, StatePatch};
use crate::plugin::{CorePlugin, ExecContext, Getters, RangeAdaptation, UiContext, UiPlugin, UiView};
use crate::plugins::core_plugins;
use crate::ui::{HeadlessUi, UiBridge};
use crate::ui_plugins::clipboard::ClipboardPlugin;
use crate::ui_plugins::selection::{Selection, SelectionPlugin};
use crate::ui_plugins::ui_plugins;
use lattice_core::SheetId;
use std::collections::VecDeque;

/// Outcome of a successful transaction
struct Transaction {
    changes: Vec<StatePatch>,
    /// Commands that reproduce the transaction on another engine
    recorded: Vec<Command>,
}

/// Commands handled by UI plugins; the core commands they derive are what gets recorded
fn is_ui_command(command: &Command) -> bool {
    command.is_ui_only() || matches!(command, Command::Paste { .. })
}

pub struct Engine {
    config: EngineConfig,
    core: Vec<Box<dyn CorePlugin>>,
    ui_plugins: Vec<Box<dyn UiPlugin>>,
    history: History,
    ui: Box<dyn UiBridge>,
    evaluator: Box<dyn Evaluator>,
    next_seq: u64,
}

impl Default for Engine {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine")
            .field("config", &self.config)
            .field("plugins", &self.core.iter().map(|p| p.name()).collect::<Vec<_>>())
            .field("history", &self.history)
            .finish()
    }
}

impl Engine {
    /// A new document with one empty sheet
    pub fn new() -> Self {
        Self::with_config(EngineConfig::default())
    }

    pub fn with_config(config: EngineConfig) -> Self {
        let mut engine = Self {
            core: core_plugins(&config),
            ui_plugins: ui_plugins(),
            history: History::new(config.history_limit),
            ui: Box::new(HeadlessUi::new()),
            evaluator: Box::new(LiteralEvaluator),
            next_seq: 0,
            config,
        };
        let name = engine.config.default_sheet_name.clone();
        let create = Command::CreateSheet {
            sheet_id: SheetId::from(name.as_str()),
            name,
            position: None,
            rows: None,
            cols: None,
        };
        if let Err(reasons) = engine.transact(vec![create]) {
            log::error!("cannot create the default sheet: {:?}", reasons);
        }
        engine.finalize_ui();
        engine
    }

    /// Build an engine holding an imported document
    pub fn from_data(data: &WorkbookData, config: EngineConfig) -> Result<Self> {
        let mut engine = Self::with_config(config);
        engine.import(data)?;
        Ok(engine)
    }

    /// Replace the user-interaction collaborator
    pub fn with_ui(mut self, ui: impl UiBridge + 'static) -> Self {
        self.ui = Box::new(ui);
        self
    }

    /// Replace the formula evaluator
    pub fn with_evaluator(mut self, evaluator: impl Evaluator + 'static) -> Self {
        self.evaluator = Box::new(evaluator);
        self
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn ui(&self) -> &dyn UiBridge {
        &*self.ui
    }

    /// Read access to every core plugin
    pub fn getters(&self) -> Getters<'_> {
        Getters::new(&self.core, &*self.evaluator)
    }

    fn ui_view(&self) -> UiView<'_> {
        UiView::new(self.getters(), &self.ui_plugins)
    }

    // UI plugins are registered once in `with_config`; a missing one is a registration bug.
    fn ui_plugin<P: UiPlugin>(&self) -> &P {
        match self.ui_view().plugin::<P>() {
            Some(plugin) => plugin,
            None => panic!("UI plugin {} is not registered", std::any::type_name::<P>()),
        }
    }

    pub fn selection(&self) -> &Selection {
        self.ui_plugin::<SelectionPlugin>().selection()
    }

    pub fn active_sheet_id(&self) -> SheetId {
        self.selection().sheet_id.clone()
    }

    pub fn clipboard(&self) -> &ClipboardPlugin {
        self.ui_plugin::<ClipboardPlugin>()
    }

    pub fn history(&self) -> &History {
        &self.history
    }

    pub fn can_undo(&self) -> bool {
        self.history.can_undo()
    }

    pub fn can_redo(&self) -> bool {
        self.history.can_redo()
    }

    // === Dispatch ===

    /// Validate then apply a command
    pub fn dispatch(&mut self, command: Command) -> DispatchResult {
        match command {
            Command::Undo => self.undo(),
            Command::Redo => self.redo(),
            command => {
                let revision_id = self.allocate_revision_id();
                match self.apply_revision(revision_id, vec![command], Origin::Local) {
                    Ok(_) => DispatchResult::Success,
                    Err(reasons) => DispatchResult::from_reasons(reasons),
                }
            }
        }
    }

    /// Dispatch, asking the user to confirm rejections that can be overridden
    ///
    /// When every rejection reason is confirmable and the user accepts, the
    /// command is dispatched again with its `force` flag set. Declining keeps
    /// the rejection and adds `CancelledByUser`.
    pub fn dispatch_interactive(&mut self, command: Command) -> DispatchResult {
        let result = self.dispatch(command.clone());
        let reasons = result.reasons();
        if reasons.is_empty() || !reasons.iter().all(CommandError::is_confirmable) {
            return result;
        }
        let message = format!("{}. Continue anyway?", reasons[0]);
        if self.ui.ask_confirmation(&message) {
            self.dispatch(command.with_force())
        } else {
            let mut reasons = reasons.to_vec();
            reasons.push(CommandError::CancelledByUser);
            DispatchResult::from_reasons(reasons)
        }
    }

    /// Rename a sheet to a name asked from the user, offering the current one
    pub fn rename_sheet_interactive(&mut self, sheet_id: &SheetId) -> DispatchResult {
        let current = self.getters().sheet_name(sheet_id);
        match self.ui.prompt_for_text("Rename sheet", current.as_deref()) {
            Some(name) => self.dispatch(Command::RenameSheet {
                sheet_id: sheet_id.clone(),
                name,
            }),
            None => DispatchResult::from_reasons(vec![CommandError::CancelledByUser]),
        }
    }

    /// Apply commands as one revision and record it in history
    ///
    /// Returns the recorded commands, empty when only transient state changed.
    pub fn apply_revision(
        &mut self,
        revision_id: RevisionId,
        commands: Vec<Command>,
        origin: Origin,
    ) -> std::result::Result<Vec<Command>, Vec<CommandError>> {
        let result = self.transact(commands);
        if let Ok(transaction) = &result {
            log::debug!(
                "revision {} applied ({} change(s))",
                revision_id,
                transaction.changes.len()
            );
            self.history.push(HistoryEntry {
                revision_id,
                commands: transaction.recorded.clone(),
                changes: transaction.changes.clone(),
                origin,
            });
        }
        self.finalize_ui();
        result.map(|transaction| transaction.recorded)
    }

    /// Identifier for the next revision produced by this engine
    pub fn allocate_revision_id(&mut self) -> RevisionId {
        self.next_seq += 1;
        RevisionId::new(self.config.client_id.clone(), self.next_seq)
    }

    fn transact(&mut self, commands: Vec<Command>) -> std::result::Result<Transaction, Vec<CommandError>> {
        let mut changes = Vec::new();
        let mut recorded = Vec::new();
        // (command, whether it is recorded or derived from a recorded UI command)
        let mut queue: VecDeque<(Command, bool)> = commands.into_iter().map(|c| (c, true)).collect();
        while let Some((command, root)) = queue.pop_front() {
            let reasons = self.check(&command);
            if !reasons.is_empty() {
                if !changes.is_empty() {
                    log::warn!(
                        "rolling back {} change(s): {:?} rejected by {:?}",
                        changes.len(),
                        command,
                        reasons
                    );
                }
                self.apply_patches(&changes, Direction::Undo);
                return Err(reasons);
            }
            if !root {
                log::trace!("derived {:?}", command);
            }
            let produced = self.execute(&command, &mut changes);
            let ui_command = is_ui_command(&command);
            if root && !ui_command {
                recorded.push(command);
            }
            let derived_root = root && ui_command;
            for derived in produced.into_iter().rev() {
                queue.push_front((derived, derived_root));
            }
        }
        Ok(Transaction { changes, recorded })
    }

    fn check(&self, command: &Command) -> Vec<CommandError> {
        let getters = self.getters();
        let mut reasons: Vec<CommandError> = self
            .core
            .iter()
            .flat_map(|plugin| plugin.allow_dispatch(command, &getters))
            .collect();
        let view = self.ui_view();
        reasons.extend(
            self.ui_plugins
                .iter()
                .flat_map(|plugin| plugin.allow_dispatch(command, &view)),
        );
        reasons
    }

    /// How stored ranges follow `command`, read from the state before it runs
    fn range_adaptation(&self, command: &Command) -> Option<RangeAdaptation> {
        if let Some((sheet_id, change)) = command.structural_change() {
            return Some(RangeAdaptation::Structural {
                sheet_id: sheet_id.clone(),
                change,
            });
        }
        let getters = self.getters();
        match command {
            Command::DeleteSheet { sheet_id } => Some(RangeAdaptation::SheetDeleted {
                sheet_id: sheet_id.clone(),
                name: getters.sheet_name(sheet_id)?,
            }),
            Command::RenameSheet { sheet_id, name } => Some(RangeAdaptation::SheetRenamed {
                sheet_id: sheet_id.clone(),
                old_name: getters.sheet_name(sheet_id)?,
                new_name: name.clone(),
            }),
            _ => None,
        }
    }

    fn execute(&mut self, command: &Command, changes: &mut Vec<StatePatch>) -> Vec<Command> {
        let adaptation = self.range_adaptation(command);
        let mut produced = Vec::new();
        for i in 0..self.core.len() {
            let (before, rest) = self.core.split_at_mut(i);
            let getters = Getters::new(before, &*self.evaluator);
            let mut ctx = ExecContext::new(getters, changes, &mut produced);
            let plugin = &mut rest[0];
            if let Some(adaptation) = &adaptation {
                plugin.adapt_ranges(adaptation, &mut ctx);
            }
            plugin.handle(command, &mut ctx);
        }
        let getters = Getters::new(&self.core, &*self.evaluator);
        for i in 0..self.ui_plugins.len() {
            let (before, rest) = self.ui_plugins.split_at_mut(i);
            let mut ctx = UiContext::new(UiView::new(getters, before), &*self.ui, &mut produced);
            rest[0].handle(command, &mut ctx);
        }
        produced
    }

    fn apply_patches(&mut self, patches: &[StatePatch], direction: Direction) {
        let mut apply = |patch: &StatePatch| {
            for plugin in &mut self.core {
                plugin.apply_patch(patch, direction);
            }
        };
        match direction {
            Direction::Undo => patches.iter().rev().for_each(&mut apply),
            Direction::Redo => patches.iter().for_each(&mut apply),
        }
    }

    fn finalize_ui(&mut self) {
        let getters = Getters::new(&self.core, &*self.evaluator);
        for i in 0..self.ui_plugins.len() {
            let (before, rest) = self.ui_plugins.split_at_mut(i);
            rest[0].finalize(&UiView::new(getters, before));
        }
    }

    // === History ===

    /// Fold every dispatch until the matching [`end_batch`](Self::end_batch) into one undo step
    pub fn begin_batch(&mut self) {
        self.history.begin_batch();
    }

    pub fn end_batch(&mut self) {
        self.history.end_batch();
    }

    /// Undo the most recent local step
    ///
    /// Later remote steps are kept: they are reverted, the step is undone, then
    /// they are re-applied on top.
    pub fn undo(&mut self) -> DispatchResult {
        self.history.flush_batch();
        let Some(index) = self.history.last_local_undo() else {
            return DispatchResult::Rejected(vec![CommandError::EmptyUndoStack]);
        };
        self.undo_at(index);
        self.finalize_ui();
        DispatchResult::Success
    }

    /// Redo the most recently undone local step
    pub fn redo(&mut self) -> DispatchResult {
        let Some(index) = self.history.last_local_redo() else {
            return DispatchResult::Rejected(vec![CommandError::EmptyRedoStack]);
        };
        self.redo_at(index);
        self.finalize_ui();
        DispatchResult::Success
    }

    /// Revision a local undo would target
    pub fn undo_target(&self) -> Option<RevisionId> {
        let index = self.history.last_local_undo()?;
        Some(self.history.entries()[index].revision_id.clone())
    }

    /// Revision a local redo would target
    pub fn redo_target(&self) -> Option<RevisionId> {
        let index = self.history.last_local_redo()?;
        self.history.redo_entry(index).map(|entry| entry.revision_id.clone())
    }

    /// Undo a specific revision; `false` when it is not on the undo stack
    pub fn undo_revision(&mut self, id: &RevisionId) -> bool {
        self.history.flush_batch();
        let Some(index) = self.history.undo_position(id) else {
            return false;
        };
        self.undo_at(index);
        self.finalize_ui();
        true
    }

    /// Redo a specific revision; `false` when it is not on the redo stack or cannot be re-applied
    pub fn redo_revision(&mut self, id: &RevisionId) -> bool {
        let Some(index) = self.history.redo_position(id) else {
            return false;
        };
        let done = self.redo_at(index);
        self.finalize_ui();
        done
    }

    /// Remove a revision as if it never happened; nothing is pushed to the redo stack
    pub fn revert_revision(&mut self, id: &RevisionId) -> bool {
        self.history.flush_batch();
        let Some(index) = self.history.undo_position(id) else {
            return false;
        };
        self.remove_at(index);
        self.finalize_ui();
        true
    }

    fn undo_at(&mut self, index: usize) {
        let target = self.remove_at(index);
        log::debug!("undo {}", target.revision_id);
        self.history.push_redo(target);
    }

    /// Take the entry at `index` out of the state, keeping later entries applied
    fn remove_at(&mut self, index: usize) -> HistoryEntry {
        let (target, later) = self.history.split_undo_at(index);
        for entry in later.iter().rev() {
            self.apply_patches(&entry.changes, Direction::Undo);
        }
        self.apply_patches(&target.changes, Direction::Undo);
        let replayed = self.replay(later);
        self.history.restore_undo(replayed);
        target
    }

    /// Re-dispatch entries on the current state; entries that no longer apply are dropped
    fn replay(&mut self, entries: Vec<HistoryEntry>) -> Vec<HistoryEntry> {
        let mut replayed = Vec::with_capacity(entries.len());
        for entry in entries {
            match self.transact(entry.commands.clone()) {
                Ok(transaction) => replayed.push(HistoryEntry {
                    changes: transaction.changes,
                    ..entry
                }),
                Err(reasons) => {
                    log::warn!("revision {} dropped on replay: {:?}", entry.revision_id, reasons);
                }
            }
        }
        replayed
    }

    fn redo_at(&mut self, index: usize) -> bool {
        let redo = self.history.take_redo(index);
        let entry = redo.entry;
        log::debug!("redo {}", entry.revision_id);
        if redo.undo_depth == self.history.undo_len() {
            self.apply_patches(&entry.changes, Direction::Redo);
            self.history.restore_undo([entry]);
            return true;
        }
        match self.transact(entry.commands.clone()) {
            Ok(transaction) => {
                self.history.restore_undo([HistoryEntry {
                    changes: transaction.changes,
                    ..entry
                }]);
                true
            }
            Err(reasons) => {
                log::warn!("revision {} cannot be redone: {:?}", entry.revision_id, reasons);
                false
            }
        }
    }

    // === Import / export ===

    /// The whole document
    pub fn export(&self) -> WorkbookData {
        let mut data = WorkbookData::new();
        for plugin in &self.core {
            plugin.export(&mut data);
        }
        data.active_sheet = Some(self.active_sheet_id());
        data
    }

    /// Replace the document
    ///
    /// Nothing is adopted unless every plugin accepts the document. History
    /// and transient state start over.
    pub fn import(&mut self, data: &WorkbookData) -> Result<()> {
        let core = match self.load(data) {
            Ok(core) => core,
            Err(err) => {
                log::warn!("document refused: {}", err);
                self.ui.raise_error(&err.to_string());
                return Err(err);
            }
        };
        self.core = core;
        self.ui_plugins = ui_plugins();
        self.history.clear();
        if let Some(sheet_id) = &data.active_sheet {
            let activate = Command::ActivateSheet {
                sheet_id: sheet_id.clone(),
            };
            if let Err(reasons) = self.transact(vec![activate]) {
                log::warn!("cannot activate {}: {:?}", sheet_id, reasons);
            }
        }
        self.finalize_ui();
        Ok(())
    }

    fn load(&self, data: &WorkbookData) -> Result<Vec<Box<dyn CorePlugin>>> {
        data.validate()?;
        let mut core = core_plugins(&self.config);
        for plugin in &mut core {
            plugin.import(data)?;
        }
        Ok(core)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_util::*;
    use crate::ui::AcceptingUi;
    use lattice_core::{Dimension, InsertPosition, Style, Zone};
    use pretty_assertions::assert_eq;
    use std::rc::Rc;

    #[test]
    fn test_new_engine_has_default_sheet() {
        let engine = Engine::new();
        assert_eq!(engine.active_sheet_id(), SheetId::from("Sheet1"));
        assert_eq!(engine.getters().sheets().sheet_count(), 1);
        assert!(!engine.can_undo());
    }

    #[test]
    fn test_undo_redo_restores_content() {
        let mut engine = Engine::new();
        set(&mut engine, "A1", "1");
        set(&mut engine, "A1", "2");
        assert!(engine.undo().is_success());
        assert_eq!(content(&engine, "A1"), "1");
        assert!(engine.dispatch(Command::Redo).is_success());
        assert_eq!(content(&engine, "A1"), "2");
        assert!(engine.redo().is_rejected_by(CommandError::EmptyRedoStack));
    }

    #[test]
    fn test_empty_undo_stack() {
        let mut engine = Engine::new();
        assert!(engine.undo().is_rejected_by(CommandError::EmptyUndoStack));
        engine.dispatch(Command::SelectCell { col: 2, row: 2 });
        assert!(engine.undo().is_rejected_by(CommandError::EmptyUndoStack));
    }

    #[test]
    fn test_new_command_clears_redo() {
        let mut engine = Engine::new();
        set(&mut engine, "A1", "1");
        engine.undo();
        set(&mut engine, "B1", "2");
        assert!(!engine.can_redo());
    }

    #[test]
    fn test_rejected_derived_command_rolls_back() {
        let mut engine = Engine::new();
        let sheet_id = engine.active_sheet_id();
        set(&mut engine, "A99", "a");
        set(&mut engine, "A100", "b");
        engine.dispatch(Command::AddProtectionRule {
            sheet_id: sheet_id.clone(),
            id: "p1".into(),
            ranges: vec!["A99:A100".into()],
        });
        engine.dispatch(Command::Cut {
            target: vec![zone("A99:A100")],
        });
        // growing the sheet succeeds, clearing the protected source does not
        let result = engine.dispatch(Command::Paste {
            target: vec![zone("B100")],
            mode: Default::default(),
            force: false,
        });
        assert!(result.is_rejected_by(CommandError::ProtectedCell));
        assert_eq!(engine.getters().sheet(&sheet_id).unwrap().rows, 100);
        assert_eq!(content(&engine, "B100"), "");
        assert_eq!(content(&engine, "A99"), "a");
        assert!(!engine.clipboard().is_empty());
    }

    #[test]
    fn test_paste_records_derived_commands() {
        let mut engine = Engine::new();
        set(&mut engine, "A1", "x");
        engine.dispatch(Command::Copy {
            target: vec![zone("A1")],
        });
        engine.dispatch(Command::Paste {
            target: vec![zone("B1")],
            mode: Default::default(),
            force: false,
        });
        let entry = engine.history().last().unwrap();
        assert!(entry
            .commands
            .iter()
            .all(|command| !matches!(command, Command::Paste { .. } | Command::SetSelection { .. })));
        assert!(matches!(entry.commands[0], Command::UpdateCell { .. }));
    }

    #[test]
    fn test_batch_is_one_undo_step() {
        let mut engine = Engine::new();
        engine.begin_batch();
        set(&mut engine, "A1", "1");
        set(&mut engine, "A2", "2");
        engine.end_batch();
        engine.undo();
        assert_eq!(content(&engine, "A1"), "");
        assert_eq!(content(&engine, "A2"), "");
        assert!(!engine.can_undo());
    }

    #[test]
    fn test_selective_undo_keeps_remote_changes() {
        let mut engine = Engine::new();
        let sheet_id = engine.active_sheet_id();
        set(&mut engine, "A1", "mine");
        let remote = RevisionId::new("other", 1);
        let commands = vec![Command::UpdateCell {
            sheet_id,
            col: 1,
            row: 0,
            content: Some("theirs".into()),
            style: None,
            format: None,
        }];
        assert!(engine.apply_revision(remote, commands, Origin::Remote).is_ok());
        assert!(engine.undo().is_success());
        assert_eq!(content(&engine, "A1"), "");
        assert_eq!(content(&engine, "B1"), "theirs");
        assert!(engine.redo().is_success());
        assert_eq!(content(&engine, "A1"), "mine");
        assert_eq!(content(&engine, "B1"), "theirs");
    }

    #[test]
    fn test_undo_restores_structure_and_ranges() {
        let mut engine = Engine::new();
        let sheet_id = engine.active_sheet_id();
        set(&mut engine, "B2", "x");
        engine.dispatch(Command::AddColumnsRows {
            sheet_id: sheet_id.clone(),
            dimension: Dimension::Col,
            base: 0,
            position: InsertPosition::Before,
            quantity: 2,
        });
        assert_eq!(content(&engine, "D2"), "x");
        assert_eq!(engine.getters().sheet(&sheet_id).unwrap().cols, 28);
        engine.undo();
        assert_eq!(content(&engine, "B2"), "x");
        assert_eq!(engine.getters().sheet(&sheet_id).unwrap().cols, 26);
    }

    #[test]
    fn test_interactive_merge_declined_then_accepted() {
        let mut engine = Engine::new();
        let sheet_id = engine.active_sheet_id();
        set(&mut engine, "B1", "hidden");
        let merge = Command::AddMerge {
            sheet_id: sheet_id.clone(),
            target: vec![zone("A1:B1")],
            force: false,
        };
        let result = engine.dispatch_interactive(merge.clone());
        assert_eq!(
            result.reasons(),
            &[CommandError::MergeIsDestructive, CommandError::CancelledByUser]
        );
        assert!(engine.getters().merges().merges(&sheet_id).is_empty());

        let mut engine = Engine::new().with_ui(AcceptingUi);
        set(&mut engine, "B1", "hidden");
        assert!(engine.dispatch_interactive(merge).is_success());
        assert_eq!(engine.getters().merges().merges(&sheet_id), &[zone("A1:B1")]);
        assert_eq!(content(&engine, "B1"), "");
    }

    struct NamingUi(&'static str);

    impl UiBridge for NamingUi {
        fn notify_user(&self, _notification: crate::ui::Notification) {}

        fn raise_error(&self, _message: &str) {}

        fn ask_confirmation(&self, _message: &str) -> bool {
            false
        }

        fn prompt_for_text(&self, _title: &str, _default: Option<&str>) -> Option<String> {
            Some(self.0.to_string())
        }
    }

    /// The prompted name is applied; no answer renames nothing
    #[test]
    fn test_interactive_rename() {
        let mut engine = Engine::new().with_ui(NamingUi("Budget"));
        let sheet_id = engine.active_sheet_id();
        assert!(engine.rename_sheet_interactive(&sheet_id).is_success());
        assert_eq!(engine.getters().sheet_name(&sheet_id).as_deref(), Some("Budget"));
        assert!(engine.can_undo());

        let mut engine = Engine::new();
        let result = engine.rename_sheet_interactive(&sheet_id);
        assert_eq!(result.reasons(), &[CommandError::CancelledByUser]);
        assert_eq!(engine.getters().sheet_name(&sheet_id).as_deref(), Some("Sheet1"));
    }

    #[test]
    fn test_export_import_round_trip() {
        let mut engine = Engine::new();
        let sheet_id = engine.active_sheet_id();
        set(&mut engine, "A1", "=B1");
        engine.dispatch(Command::SetFormatting {
            sheet_id,
            target: vec![zone("A1:B2")],
            style: Some(Style::new().bold(true)),
            format: Some("0.00".into()),
        });
        add_sheet(&mut engine, "s2", "Data");
        let data = engine.export();
        let copy = Engine::from_data(&data, EngineConfig::default()).unwrap();
        assert_eq!(copy.export(), data);
        assert!(!copy.can_undo());
    }

    #[test]
    fn test_refused_import_keeps_state() {
        let ui = Rc::new(HeadlessUi::new());
        let mut engine = Engine::new().with_ui(ui.clone());
        set(&mut engine, "A1", "kept");
        let mut data = engine.export();
        data.sheets[0].merges.push("not a range".into());
        assert!(engine.import(&data).is_err());
        assert_eq!(content(&engine, "A1"), "kept");
        assert_eq!(ui.errors().len(), 1);
        assert!(engine.can_undo());
    }

    #[test]
    fn test_history_limit() {
        let mut engine = Engine::with_config(EngineConfig::default().with_history_limit(2));
        for xc in ["A1", "A2", "A3"] {
            set(&mut engine, xc, "x");
        }
        assert!(engine.undo().is_success());
        assert!(engine.undo().is_success());
        assert!(engine.undo().is_rejected_by(CommandError::EmptyUndoStack));
        assert_eq!(content(&engine, "A1"), "x");
    }

    #[test]
    fn test_rejected_command_changes_nothing() {
        let mut engine = Engine::new();
        set(&mut engine, "A1", "1");
        let before = engine.export();
        let result = engine.dispatch(Command::DeleteContent {
            sheet_id: engine.active_sheet_id(),
            target: vec![Zone::parse("A1:A500").unwrap()],
        });
        assert!(!result.is_success());
        assert_eq!(engine.export(), before);
    }
}
