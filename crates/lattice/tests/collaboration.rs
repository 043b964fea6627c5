//! Several clients editing one document through a shared server order

use lattice::{LocalTransport, RevisionKind};
use lattice::prelude::*;
use pretty_assertions::assert_eq;

type Client = Session<LocalTransport>;

fn client(id: &str) -> Client {
    let engine = Engine::with_config(EngineConfig::default().with_client_id(id));
    Session::new(engine, LocalTransport::default())
}

fn write(client: &mut Client, xc: &str, content: &str) -> DispatchResult {
    let position = CellPosition::parse(xc).unwrap();
    client.dispatch(Command::UpdateCell {
        sheet_id: SheetId::from("Sheet1"),
        col: position.col,
        row: position.row,
        content: Some(content.into()),
        style: None,
        format: None,
    })
}

fn content(client: &Client, xc: &str) -> String {
    let position = CellPosition::parse(xc).unwrap();
    client
        .engine()
        .getters()
        .cells()
        .content(&SheetId::from("Sheet1"), position)
        .to_string()
}

/// Collect what every client sent, then deliver it to all of them in that order
fn sync(clients: &mut [&mut Client]) {
    let mut server = Vec::new();
    for client in clients.iter_mut() {
        server.append(&mut client.transport_mut().sent);
    }
    for revision in server {
        for client in clients.iter_mut() {
            client.on_remote(revision.clone());
        }
    }
}

/// Pastes travel as the cell edits they produced
#[test]
fn test_paste_is_replicated() {
    let mut alice = client("alice");
    let mut bob = client("bob");
    write(&mut alice, "A1", "=1+1");
    alice.dispatch(Command::Copy {
        target: vec![Zone::parse("A1").unwrap()],
    });
    let pasted = alice.dispatch(Command::Paste {
        target: vec![Zone::parse("B2:B3").unwrap()],
        mode: PasteMode::All,
        force: false,
    });
    assert!(pasted.is_success());

    let sent = &alice.transport().sent;
    assert_eq!(sent.len(), 2);
    let RevisionKind::Commands(commands) = &sent[1].kind else {
        panic!("expected commands, got {:?}", sent[1].kind);
    };
    assert!(commands.iter().all(|command| !command.is_ui_only()));

    sync(&mut [&mut alice, &mut bob]);
    assert_eq!(content(&bob, "B2"), "=1+1");
    assert_eq!(content(&bob, "B3"), "=1+1");
    assert_eq!(bob.engine().export(), alice.engine().export());
}

/// Structural edits and cell edits made concurrently end in the same document
#[test]
fn test_structure_and_cells_converge() {
    let mut alice = client("alice");
    let mut bob = client("bob");
    let mut carol = client("carol");
    write(&mut alice, "A1", "shared");
    sync(&mut [&mut alice, &mut bob, &mut carol]);

    alice.dispatch(Command::AddColumnsRows {
        sheet_id: SheetId::from("Sheet1"),
        dimension: Dimension::Row,
        base: 0,
        position: InsertPosition::Before,
        quantity: 1,
    });
    write(&mut bob, "A1", "bob");
    write(&mut carol, "C3", "carol");
    sync(&mut [&mut alice, &mut bob, &mut carol]);

    let expected = alice.engine().export();
    assert_eq!(bob.engine().export(), expected);
    assert_eq!(carol.engine().export(), expected);
    assert_eq!(content(&alice, "A2"), "shared");
    assert_eq!(content(&alice, "A1"), "bob");
    for session in [&alice, &bob, &carol] {
        assert!(session.pending().is_empty());
    }
}

/// Undoing a revision another client built on keeps their later edit
#[test]
fn test_remote_undo_keeps_later_edits() {
    let mut alice = client("alice");
    let mut bob = client("bob");
    write(&mut alice, "A1", "first");
    sync(&mut [&mut alice, &mut bob]);
    write(&mut bob, "A2", "second");
    sync(&mut [&mut alice, &mut bob]);

    assert!(alice.undo().is_success());
    sync(&mut [&mut alice, &mut bob]);
    for session in [&alice, &bob] {
        assert_eq!(content(session, "A1"), "");
        assert_eq!(content(session, "A2"), "second");
    }

    assert!(alice.redo().is_success());
    sync(&mut [&mut alice, &mut bob]);
    assert_eq!(content(&bob, "A1"), "first");
    assert_eq!(bob.engine().export(), alice.engine().export());
}

/// Leaving hands back the document
#[test]
fn test_leave_keeps_document() {
    let mut alice = client("alice");
    write(&mut alice, "B2", "mine");
    let engine = alice.leave();
    let b2 = CellPosition::parse("B2").unwrap();
    assert_eq!(engine.getters().cells().content(&SheetId::from("Sheet1"), b2), "mine");
}
