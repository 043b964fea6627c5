//! Undo/redo history
//!
//! Every mutation a plugin performs is recorded as a [`StatePatch`] holding the
//! before and after value of what it touched. A history entry is the list of
//! patches of one transaction; undoing it applies the patches backwards.

use crate::command::Command;
use crate::plugins::borders::BordersPatch;
use crate::plugins::cells::CellsPatch;
use crate::plugins::charts::Chart;
use crate::plugins::conditional_format::ConditionalFormatEntry;
use crate::plugins::data_validation::DataValidationEntry;
use crate::plugins::figures::Figure;
use crate::plugins::protection::ProtectionRule;
use crate::plugins::sheets::SheetsPatch;
use crate::plugins::tables::Table;
use ahash::AHashMap;
use lattice_core::{Color, SheetId, Zone};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::hash::Hash;

/// Default number of undo steps kept
pub const DEFAULT_HISTORY_LIMIT: usize = 100;

/// Which way a patch is applied
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Restore the `before` values
    Undo,
    /// Restore the `after` values
    Redo,
}

/// Before/after value of one keyed slot; `None` means absent
#[derive(Debug, Clone, PartialEq)]
pub struct Change<K, V> {
    pub key: K,
    pub before: Option<V>,
    pub after: Option<V>,
}

impl<K, V> Change<K, V> {
    pub fn new(key: K, before: Option<V>, after: Option<V>) -> Self {
        Self { key, before, after }
    }

    /// The value the slot holds once the change is applied in `direction`
    pub fn value(&self, direction: Direction) -> Option<&V> {
        match direction {
            Direction::Undo => self.before.as_ref(),
            Direction::Redo => self.after.as_ref(),
        }
    }
}

impl<K: Clone + Eq + Hash, V: Clone> Change<K, V> {
    pub fn apply_to(&self, map: &mut AHashMap<K, V>, direction: Direction) {
        match self.value(direction) {
            Some(value) => {
                map.insert(self.key.clone(), value.clone());
            }
            None => {
                map.remove(&self.key);
            }
        }
    }
}

impl<K: Clone + Ord, V: Clone> Change<K, V> {
    pub fn apply_to_tree(&self, map: &mut BTreeMap<K, V>, direction: Direction) {
        match self.value(direction) {
            Some(value) => {
                map.insert(self.key.clone(), value.clone());
            }
            None => {
                map.remove(&self.key);
            }
        }
    }
}

/// A reversible mutation of one plugin's state
///
/// Every plugin receives every patch and ignores the variants it does not own.
#[derive(Debug, Clone, PartialEq)]
pub enum StatePatch {
    Sheets(SheetsPatch),
    Cells(CellsPatch),
    Merges(Change<SheetId, Vec<Zone>>),
    Borders(BordersPatch),
    ConditionalFormats(Change<SheetId, Vec<ConditionalFormatEntry>>),
    DataValidation(Change<SheetId, Vec<DataValidationEntry>>),
    Protection(Change<SheetId, Vec<ProtectionRule>>),
    Tables(Change<SheetId, Vec<Table>>),
    Figures(Change<SheetId, Vec<Figure>>),
    Charts(Change<SheetId, Vec<Chart>>),
    CustomColors(Change<(), Vec<Color>>),
}

/// Identifier of a revision, unique across collaborating clients
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RevisionId {
    pub client_id: String,
    pub seq: u64,
}

impl RevisionId {
    pub fn new(client_id: impl Into<String>, seq: u64) -> Self {
        Self {
            client_id: client_id.into(),
            seq,
        }
    }
}

impl fmt::Display for RevisionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.client_id, self.seq)
    }
}

/// Where a history entry came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Origin {
    Local,
    Remote,
}

/// One undoable step
#[derive(Debug, Clone)]
pub struct HistoryEntry {
    pub revision_id: RevisionId,
    pub commands: Vec<Command>,
    pub changes: Vec<StatePatch>,
    pub origin: Origin,
}

#[derive(Debug, Clone)]
pub(crate) struct RedoEntry {
    pub entry: HistoryEntry,
    /// Undo stack depth when the entry was undone; patches replay verbatim only at this depth
    pub undo_depth: usize,
}

/// Undo and redo stacks with batching
#[derive(Debug)]
pub struct History {
    undo_stack: Vec<HistoryEntry>,
    redo_stack: Vec<RedoEntry>,
    limit: usize,
    batch_depth: usize,
    pending_batch: Option<HistoryEntry>,
}

impl Default for History {
    fn default() -> Self {
        Self::new(DEFAULT_HISTORY_LIMIT)
    }
}

impl History {
    pub fn new(limit: usize) -> Self {
        Self {
            undo_stack: Vec::new(),
            redo_stack: Vec::new(),
            limit: limit.max(1),
            batch_depth: 0,
            pending_batch: None,
        }
    }

    pub fn limit(&self) -> usize {
        self.limit
    }

    /// Whether a local entry can be undone
    pub fn can_undo(&self) -> bool {
        self.pending_batch
            .as_ref()
            .is_some_and(|e| e.origin == Origin::Local)
            || self.undo_stack.iter().any(|e| e.origin == Origin::Local)
    }

    /// Whether a local entry can be redone
    pub fn can_redo(&self) -> bool {
        self.redo_stack
            .iter()
            .any(|r| r.entry.origin == Origin::Local)
    }

    pub fn undo_len(&self) -> usize {
        self.undo_stack.len()
    }

    pub fn redo_len(&self) -> usize {
        self.redo_stack.len()
    }

    /// Drop every entry and any open batch
    pub fn clear(&mut self) {
        self.undo_stack.clear();
        self.redo_stack.clear();
        self.batch_depth = 0;
        self.pending_batch = None;
    }

    /// Start folding entries into one step; batches nest
    pub fn begin_batch(&mut self) {
        self.batch_depth += 1;
    }

    /// Close the innermost batch, committing the folded entry when it was the outermost
    pub fn end_batch(&mut self) {
        if self.batch_depth == 0 {
            return;
        }
        self.batch_depth -= 1;
        if self.batch_depth == 0 {
            self.flush_batch();
        }
    }

    /// Commit the pending batch without closing it
    pub(crate) fn flush_batch(&mut self) {
        if let Some(entry) = self.pending_batch.take() {
            self.commit(entry);
        }
    }

    /// Record a successful transaction
    pub(crate) fn push(&mut self, entry: HistoryEntry) {
        if entry.changes.is_empty() {
            return;
        }
        if self.batch_depth > 0 {
            match &mut self.pending_batch {
                Some(pending) if pending.origin == entry.origin => {
                    pending.commands.extend(entry.commands);
                    pending.changes.extend(entry.changes);
                }
                Some(_) => {
                    self.flush_batch();
                    self.pending_batch = Some(entry);
                }
                None => self.pending_batch = Some(entry),
            }
            return;
        }
        self.commit(entry);
    }

    fn commit(&mut self, entry: HistoryEntry) {
        log::trace!(
            "history: push {} ({} patches)",
            entry.revision_id,
            entry.changes.len()
        );
        if entry.origin == Origin::Local {
            self.redo_stack.retain(|r| r.entry.origin != Origin::Local);
        }
        self.undo_stack.push(entry);
        if self.undo_stack.len() > self.limit {
            let excess = self.undo_stack.len() - self.limit;
            self.undo_stack.drain(..excess);
            for redo in &mut self.redo_stack {
                redo.undo_depth = redo.undo_depth.saturating_sub(excess);
            }
        }
    }

    /// Index in the undo stack of the most recent local entry
    pub(crate) fn last_local_undo(&self) -> Option<usize> {
        self.undo_stack
            .iter()
            .rposition(|e| e.origin == Origin::Local)
    }

    /// Index in the redo stack of the most recently undone local entry
    pub(crate) fn last_local_redo(&self) -> Option<usize> {
        self.redo_stack
            .iter()
            .rposition(|r| r.entry.origin == Origin::Local)
    }

    pub(crate) fn undo_position(&self, id: &RevisionId) -> Option<usize> {
        self.undo_stack.iter().rposition(|e| &e.revision_id == id)
    }

    pub(crate) fn redo_position(&self, id: &RevisionId) -> Option<usize> {
        self.redo_stack
            .iter()
            .rposition(|r| &r.entry.revision_id == id)
    }

    /// Remove the entry at `index` and every later one, returning the later ones in order
    pub(crate) fn split_undo_at(&mut self, index: usize) -> (HistoryEntry, Vec<HistoryEntry>) {
        let later = self.undo_stack.split_off(index + 1);
        let target = self.undo_stack.remove(index);
        (target, later)
    }

    /// Push entries back without touching the redo stack
    pub(crate) fn restore_undo(&mut self, entries: impl IntoIterator<Item = HistoryEntry>) {
        self.undo_stack.extend(entries);
    }

    pub(crate) fn push_redo(&mut self, entry: HistoryEntry) {
        let undo_depth = self.undo_stack.len();
        self.redo_stack.push(RedoEntry { entry, undo_depth });
    }

    pub(crate) fn redo_entry(&self, index: usize) -> Option<&HistoryEntry> {
        self.redo_stack.get(index).map(|redo| &redo.entry)
    }

    pub(crate) fn take_redo(&mut self, index: usize) -> RedoEntry {
        self.redo_stack.remove(index)
    }

    /// Latest committed entry
    pub fn last(&self) -> Option<&HistoryEntry> {
        self.undo_stack.last()
    }

    pub fn entries(&self) -> &[HistoryEntry] {
        &self.undo_stack
    }
}
