//! Collaborative session
//!
//! Local commands apply immediately and leave as revisions through a
//! [`Transport`]. The server echoes every revision back in its authoritative
//! order. Until its echo arrives, a local revision is *pending*.
//!
//! When a foreign revision arrives, pending revisions are unwound, the foreign
//! one is applied, then the pending ones are replayed on top. Server order is
//! the order of application, so concurrent writes to one cell end with the
//! value of the revision the server sequenced last.

use crate::command::{Command, CommandError, DispatchResult};
use crate::engine::Engine;
use crate::history::{Origin, RevisionId};
use crate::ui::Notification;
use serde::{Deserialize, Serialize};

/// What a revision does
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "snake_case")]
pub enum RevisionKind {
    Commands(Vec<Command>),
    Undo(RevisionId),
    Redo(RevisionId),
}

/// A unit exchanged between collaborating clients
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Revision {
    pub id: RevisionId,
    pub client_id: String,
    pub kind: RevisionKind,
}

/// Delivery of local revisions to the other clients
///
/// Ordering and durability are up to the implementor; revisions come back
/// through [`Session::on_remote`] in server order.
pub trait Transport {
    fn send(&mut self, revision: Revision);
}

/// A transport that keeps what it was given
#[derive(Debug, Default)]
pub struct LocalTransport {
    pub sent: Vec<Revision>,
}

impl Transport for LocalTransport {
    fn send(&mut self, revision: Revision) {
        self.sent.push(revision);
    }
}

pub struct Session<T: Transport> {
    engine: Engine,
    transport: T,
    pending: Vec<Revision>,
}

impl<T: Transport> Session<T> {
    pub fn new(engine: Engine, transport: T) -> Self {
        Self {
            engine,
            transport,
            pending: Vec::new(),
        }
    }

    pub fn engine(&self) -> &Engine {
        &self.engine
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    /// Revisions sent but not yet acknowledged
    pub fn pending(&self) -> &[Revision] {
        &self.pending
    }

    pub fn client_id(&self) -> &str {
        &self.engine.config().client_id
    }

    /// Leave the session, keeping the document
    pub fn leave(self) -> Engine {
        if !self.pending.is_empty() {
            log::warn!("leaving with {} unacknowledged revision(s)", self.pending.len());
        }
        self.engine
    }

    /// Apply a command locally and broadcast it
    pub fn dispatch(&mut self, command: Command) -> DispatchResult {
        match command {
            Command::Undo => return self.undo(),
            Command::Redo => return self.redo(),
            _ => {}
        }
        let id = self.engine.allocate_revision_id();
        match self.engine.apply_revision(id.clone(), vec![command], Origin::Local) {
            Ok(recorded) => {
                if !recorded.is_empty() {
                    self.send(id, RevisionKind::Commands(recorded));
                }
                DispatchResult::Success
            }
            Err(reasons) => DispatchResult::from_reasons(reasons),
        }
    }

    pub fn undo(&mut self) -> DispatchResult {
        let Some(target) = self.engine.undo_target() else {
            return DispatchResult::Rejected(vec![CommandError::EmptyUndoStack]);
        };
        self.engine.undo_revision(&target);
        let id = self.engine.allocate_revision_id();
        self.send(id, RevisionKind::Undo(target));
        DispatchResult::Success
    }

    pub fn redo(&mut self) -> DispatchResult {
        let Some(target) = self.engine.redo_target() else {
            return DispatchResult::Rejected(vec![CommandError::EmptyRedoStack]);
        };
        if !self.engine.redo_revision(&target) {
            return DispatchResult::Rejected(vec![CommandError::EmptyRedoStack]);
        }
        let id = self.engine.allocate_revision_id();
        self.send(id, RevisionKind::Redo(target));
        DispatchResult::Success
    }

    fn send(&mut self, id: RevisionId, kind: RevisionKind) {
        let revision = Revision {
            id,
            client_id: self.client_id().to_string(),
            kind,
        };
        log::trace!("send revision {}", revision.id);
        self.pending.push(revision.clone());
        self.transport.send(revision);
    }

    /// Handle a revision delivered by the server
    pub fn on_remote(&mut self, revision: Revision) {
        if self.pending.first().is_some_and(|pending| pending.id == revision.id) {
            log::trace!("revision {} acknowledged", revision.id);
            self.pending.remove(0);
            return;
        }
        if self.pending.iter().any(|pending| pending.id == revision.id) {
            log::warn!("revision {} acknowledged out of order", revision.id);
            self.pending.retain(|pending| pending.id != revision.id);
            return;
        }
        let pending = std::mem::take(&mut self.pending);
        for local in pending.iter().rev() {
            self.unwind(local);
        }
        if !self.apply(&revision, Origin::Remote) {
            log::warn!("remote revision {} could not be applied", revision.id);
        }
        for local in pending {
            if self.apply(&local, Origin::Local) {
                self.pending.push(local);
            } else {
                log::warn!("local revision {} dropped after rebase", local.id);
                self.engine.ui().notify_user(Notification::warning(
                    "A change conflicting with a collaborator's edit was dropped",
                ));
            }
        }
    }

    fn unwind(&mut self, revision: &Revision) {
        match &revision.kind {
            RevisionKind::Commands(_) => {
                self.engine.revert_revision(&revision.id);
            }
            RevisionKind::Undo(target) => {
                self.engine.redo_revision(target);
            }
            RevisionKind::Redo(target) => {
                self.engine.undo_revision(target);
            }
        }
    }

    fn apply(&mut self, revision: &Revision, origin: Origin) -> bool {
        match &revision.kind {
            RevisionKind::Commands(commands) => self
                .engine
                .apply_revision(revision.id.clone(), commands.clone(), origin)
                .is_ok(),
            RevisionKind::Undo(target) => self.engine.undo_revision(target),
            RevisionKind::Redo(target) => self.engine.redo_revision(target),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EngineConfig;
    use crate::test_util::*;
    use lattice_core::SheetId;
    use pretty_assertions::assert_eq;

    fn session(client_id: &str) -> Session<LocalTransport> {
        let engine = Engine::with_config(EngineConfig::default().with_client_id(client_id));
        Session::new(engine, LocalTransport::default())
    }

    fn write(session: &mut Session<LocalTransport>, xc: &str, text: &str) -> DispatchResult {
        let position = pos(xc);
        session.dispatch(Command::UpdateCell {
            sheet_id: SheetId::from("Sheet1"),
            col: position.col,
            row: position.row,
            content: Some(text.into()),
            style: None,
            format: None,
        })
    }

    /// Deliver every revision `from` sent, in order, to both sessions
    fn sync(server: &mut Vec<Revision>, sessions: &mut [&mut Session<LocalTransport>]) {
        for session in sessions.iter_mut() {
            server.append(&mut session.transport_mut().sent);
        }
        for revision in server.drain(..) {
            for session in sessions.iter_mut() {
                session.on_remote(revision.clone());
            }
        }
    }

    #[test]
    fn test_local_dispatch_is_sent_and_acknowledged() {
        let mut alice = session("alice");
        assert!(write(&mut alice, "A1", "hi").is_success());
        assert_eq!(alice.pending().len(), 1);
        let sent = alice.transport().sent[0].clone();
        assert_eq!(sent.client_id, "alice");
        alice.on_remote(sent);
        assert!(alice.pending().is_empty());
        assert_eq!(content(alice.engine(), "A1"), "hi");
    }

    #[test]
    fn test_ui_only_commands_are_not_sent() {
        let mut alice = session("alice");
        alice.dispatch(Command::SelectCell { col: 1, row: 1 });
        assert!(alice.transport().sent.is_empty());
    }

    #[test]
    fn test_concurrent_edits_converge() {
        let mut alice = session("alice");
        let mut bob = session("bob");
        write(&mut alice, "A1", "alice");
        write(&mut bob, "A1", "bob");
        write(&mut bob, "B1", "only bob");
        let mut server = Vec::new();
        sync(&mut server, &mut [&mut alice, &mut bob]);
        assert_eq!(content(alice.engine(), "A1"), "bob");
        assert_eq!(content(bob.engine(), "A1"), "bob");
        assert_eq!(content(alice.engine(), "B1"), "only bob");
        assert!(alice.pending().is_empty() && bob.pending().is_empty());
    }

    #[test]
    fn test_foreign_revision_rebases_pending() {
        let mut alice = session("alice");
        let mut bob = session("bob");
        write(&mut bob, "A1", "from bob");
        let from_bob = bob.transport_mut().sent.remove(0);
        write(&mut alice, "A2", "pending");
        alice.on_remote(from_bob);
        assert_eq!(content(alice.engine(), "A1"), "from bob");
        assert_eq!(content(alice.engine(), "A2"), "pending");
        assert_eq!(alice.pending().len(), 1);
    }

    #[test]
    fn test_undo_is_broadcast_and_selective() {
        let mut alice = session("alice");
        let mut bob = session("bob");
        let mut server = Vec::new();
        write(&mut alice, "A1", "alice");
        sync(&mut server, &mut [&mut alice, &mut bob]);
        write(&mut bob, "B1", "bob");
        sync(&mut server, &mut [&mut alice, &mut bob]);
        assert!(alice.undo().is_success());
        sync(&mut server, &mut [&mut alice, &mut bob]);
        for engine in [alice.engine(), bob.engine()] {
            assert_eq!(content(engine, "A1"), "");
            assert_eq!(content(engine, "B1"), "bob");
        }
        assert!(bob.undo().is_success());
        assert!(bob.undo().is_rejected_by(CommandError::EmptyUndoStack));
    }

    #[test]
    fn test_revision_json() {
        let revision = Revision {
            id: RevisionId::new("alice", 3),
            client_id: "alice".into(),
            kind: RevisionKind::Undo(RevisionId::new("alice", 2)),
        };
        let json = serde_json::to_value(&revision).unwrap();
        assert_eq!(json["kind"]["type"], "undo");
        assert_eq!(json["kind"]["payload"]["seq"], 2);
        let back: Revision = serde_json::from_value(json).unwrap();
        assert_eq!(back, revision);
    }
}
