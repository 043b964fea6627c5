//! End-to-end editing scenarios

use lattice::plugins::borders::BorderPosition;
use lattice::plugins::conditional_format::{CfOperator, CfRule, ConditionalFormat};
use lattice::plugins::figures::Figure;
use lattice::prelude::*;
use pretty_assertions::assert_eq;

fn pos(xc: &str) -> CellPosition {
    CellPosition::parse(xc).unwrap()
}

fn zone(xc: &str) -> Zone {
    Zone::parse(xc).unwrap()
}

fn write(engine: &mut Engine, xc: &str, content: &str, style: Option<Style>) -> DispatchResult {
    let position = pos(xc);
    engine.dispatch(Command::UpdateCell {
        sheet_id: engine.active_sheet_id(),
        col: position.col,
        row: position.row,
        content: Some(content.to_string()),
        style,
        format: None,
    })
}

fn paste(engine: &mut Engine, xc: &str, mode: PasteMode) -> DispatchResult {
    engine.dispatch(Command::Paste {
        target: vec![zone(xc)],
        mode,
        force: false,
    })
}

fn content(engine: &Engine, xc: &str) -> String {
    engine
        .getters()
        .cells()
        .content(&engine.active_sheet_id(), pos(xc))
        .to_string()
}

fn border(engine: &Engine, xc: &str) -> Option<Border> {
    engine
        .getters()
        .borders()
        .border(&engine.active_sheet_id(), pos(xc))
        .cloned()
}

/// Copying a bold cell carries its content and style
#[test]
fn test_copy_paste_keeps_style() {
    let mut engine = Engine::new();
    let sheet = engine.active_sheet_id();
    write(&mut engine, "B2", "b2", Some(Style::new().bold(true)));

    assert!(engine.dispatch(Command::Copy { target: vec![zone("B2")] }).is_success());
    assert!(paste(&mut engine, "C2", PasteMode::All).is_success());

    assert_eq!(content(&engine, "C2"), "b2");
    assert_eq!(engine.getters().computed_style(&sheet, pos("C2")).bold, Some(true));
    assert_eq!(content(&engine, "B2"), "b2");
    assert_eq!(engine.getters().computed_style(&sheet, pos("B2")).bold, Some(true));
}

/// Cutting a bordered block moves the exact border layout
#[test]
fn test_cut_paste_moves_borders() {
    let mut engine = Engine::new();
    let sheet = engine.active_sheet_id();
    let edge = BorderEdge::new(BorderLineStyle::Thick, Color::RED);
    engine.dispatch(Command::SetZoneBorders {
        sheet_id: sheet.clone(),
        target: vec![zone("B2:C3")],
        position: BorderPosition::External,
        edge: Some(edge),
    });
    let before: Vec<Option<Border>> = ["B2", "C2", "B3", "C3"].iter().map(|xc| border(&engine, xc)).collect();

    assert!(engine.dispatch(Command::Cut { target: vec![zone("B2:C3")] }).is_success());
    assert!(paste(&mut engine, "C4", PasteMode::All).is_success());

    let after: Vec<Option<Border>> = ["C4", "D4", "C5", "D5"].iter().map(|xc| border(&engine, xc)).collect();
    assert_eq!(after, before);
    for xc in ["B2", "C2", "B3", "C3"] {
        assert_eq!(border(&engine, xc), None, "{xc} should have no border");
    }
}

/// Conditional format styles follow the rule through removal and undo
#[test]
fn test_conditional_format_undo() {
    let mut engine = Engine::new();
    let sheet = engine.active_sheet_id();
    let rule = ConditionalFormat::new(
        "equal-two",
        CfRule::CellIs {
            operator: CfOperator::Equal,
            values: vec!["2".into()],
        },
        Style::new().fill_color(Color::RED),
    );
    let added = engine.dispatch(Command::AddConditionalFormat {
        sheet_id: sheet.clone(),
        cf: rule,
        ranges: vec!["A1:A4".into()],
    });
    assert!(added.is_success());
    write(&mut engine, "A1", "2", None);
    let fill = |engine: &Engine| engine.getters().computed_style(&sheet, pos("A1")).fill_color;
    assert_eq!(fill(&engine), Some(Color::RED));

    engine.dispatch(Command::RemoveConditionalFormat {
        sheet_id: sheet.clone(),
        id: "equal-two".into(),
    });
    assert_eq!(fill(&engine), None);

    engine.undo();
    assert_eq!(fill(&engine), Some(Color::RED));
}

/// Inserting a column shifts anchors right of it and leaves others alone
#[test]
fn test_column_insertion_moves_figures() {
    let mut engine = Engine::new();
    let sheet = engine.active_sheet_id();
    for (id, xc) in [("moved", "B2"), ("still", "A1")] {
        engine.dispatch(Command::CreateFigure {
            sheet_id: sheet.clone(),
            figure: Figure::new(id, pos(xc), 100, 80),
        });
    }

    let inserted = engine.dispatch(Command::AddColumnsRows {
        sheet_id: sheet.clone(),
        dimension: Dimension::Col,
        base: 1,
        position: InsertPosition::Before,
        quantity: 1,
    });
    assert!(inserted.is_success());

    let figures = engine.getters().figures();
    assert_eq!(figures.figure(&sheet, "moved").unwrap().anchor, pos("C2"));
    assert_eq!(figures.figure(&sheet, "still").unwrap().anchor, pos("A1"));
}

/// A rule without ranges is refused and leaves no trace
#[test]
fn test_conditional_format_requires_ranges() {
    let mut engine = Engine::new();
    let sheet = engine.active_sheet_id();
    let result = engine.dispatch(Command::AddConditionalFormat {
        sheet_id: sheet.clone(),
        cf: ConditionalFormat::new("empty", CfRule::IsEmpty, Style::new().bold(true)),
        ranges: Vec::new(),
    });
    assert!(result.is_rejected_by(CommandError::EmptyRange));
    assert!(engine.getters().conditional_formats().conditional_formats(&sheet).is_empty());
    assert!(!engine.can_undo());
}

/// Pasting values writes computed results and keeps the destination's format
#[test]
fn test_paste_only_value() {
    let mut engine = Engine::new();
    let sheet = engine.active_sheet_id();
    write(&mut engine, "A1", "3", None);
    write(&mut engine, "B1", "=A1", None);
    write(&mut engine, "D1", "old", Some(Style::new().bold(true)));
    engine.dispatch(Command::SetZoneBorders {
        sheet_id: sheet.clone(),
        target: vec![zone("D1")],
        position: BorderPosition::All,
        edge: Some(BorderEdge::new(BorderLineStyle::Thin, Color::RED)),
    });
    let border_before = border(&engine, "D1");
    assert!(border_before.is_some());

    engine.dispatch(Command::Copy { target: vec![zone("B1")] });
    assert!(paste(&mut engine, "D1", PasteMode::OnlyValue).is_success());

    assert_eq!(content(&engine, "D1"), "3");
    assert_eq!(engine.getters().computed_style(&sheet, pos("D1")).bold, Some(true));
    assert_eq!(border(&engine, "D1"), border_before);
}

/// A copied block pasted over a multiple of its size repeats with shifted references
#[test]
fn test_paste_tiles_with_relative_references() {
    let mut engine = Engine::new();
    write(&mut engine, "A1", "1", None);
    write(&mut engine, "B1", "=A1", None);
    engine.dispatch(Command::Copy { target: vec![zone("B1")] });
    assert!(paste(&mut engine, "C1:D2", PasteMode::All).is_success());

    assert_eq!(content(&engine, "C1"), "=B1");
    assert_eq!(content(&engine, "D1"), "=C1");
    assert_eq!(content(&engine, "C2"), "=B2");
    assert_eq!(content(&engine, "D2"), "=C2");
}
