//! Custom colors
//!
//! Explicitly added colors, plus a getter collecting every color the document uses.

use crate::command::{Command, CommandError};
use crate::data::WorkbookData;
use crate::error::Result;
use crate::history::{Change, Direction, StatePatch};
use crate::plugin::{CorePlugin, ExecContext, Getters};
use lattice_core::Color;
use std::any::Any;

#[derive(Debug, Default)]
pub struct CustomColorsPlugin {
    colors: Vec<Color>,
}

impl CustomColorsPlugin {
    /// Colors added with `AddCustomColor`
    pub fn explicit_colors(&self) -> &[Color] {
        &self.colors
    }

    /// Explicit colors, then colors of cell styles, borders and conditional formats
    ///
    /// Sheets are walked in order and duplicates keep their first position.
    pub fn colors(&self, getters: &Getters<'_>) -> Vec<Color> {
        let mut colors: Vec<Color> = Vec::new();
        let mut push = |color: Color| {
            if !colors.contains(&color) {
                colors.push(color);
            }
        };
        self.colors.iter().copied().for_each(&mut push);
        for sheet_id in getters.sheets().sheet_ids() {
            getters
                .cells()
                .sheet_cells(sheet_id)
                .filter_map(|(_, cell)| cell.style.as_ref())
                .flat_map(|style| style.colors())
                .for_each(&mut push);
            getters.borders().colors(sheet_id).for_each(&mut push);
            getters
                .conditional_formats()
                .conditional_formats(sheet_id)
                .iter()
                .flat_map(|entry| entry.cf.style.colors())
                .for_each(&mut push);
        }
        colors
    }
}

impl CorePlugin for CustomColorsPlugin {
    fn name(&self) -> &'static str {
        "custom_colors"
    }

    fn allow_dispatch(&self, command: &Command, _getters: &Getters<'_>) -> Vec<CommandError> {
        match command {
            Command::AddCustomColor { color } if Color::parse(color).is_err() => {
                vec![CommandError::InvalidColor]
            }
            _ => Vec::new(),
        }
    }

    fn handle(&mut self, command: &Command, ctx: &mut ExecContext<'_>) {
        let Command::AddCustomColor { color } = command else {
            return;
        };
        let Ok(color) = Color::parse(color) else {
            return;
        };
        if self.colors.contains(&color) {
            return;
        }
        let before = self.colors.clone();
        self.colors.push(color);
        ctx.record(StatePatch::CustomColors(Change::new(
            (),
            Some(before),
            Some(self.colors.clone()),
        )));
    }

    fn apply_patch(&mut self, patch: &StatePatch, direction: Direction) {
        if let StatePatch::CustomColors(change) = patch {
            self.colors = change.value(direction).cloned().unwrap_or_default();
        }
    }

    fn export(&self, data: &mut WorkbookData) {
        data.custom_colors = self.colors.iter().map(Color::to_hex).collect();
    }

    fn import(&mut self, data: &WorkbookData) -> Result<()> {
        self.colors = data
            .custom_colors
            .iter()
            .map(|hex| Color::parse(hex))
            .collect::<lattice_core::Result<Vec<_>>>()?;
        Ok(())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plugins::borders::BorderPosition;
    use crate::test_util::*;
    use crate::Engine;
    use lattice_core::{BorderEdge, BorderLineStyle, Style};
    use pretty_assertions::assert_eq;

    #[test]
    fn test_invalid_color_is_rejected() {
        let mut engine = Engine::new();
        let result = engine.dispatch(Command::AddCustomColor {
            color: "#12345".into(),
        });
        assert!(result.is_rejected_by(CommandError::InvalidColor));
    }

    #[test]
    fn test_colors_collects_every_source_in_order() {
        let mut engine = Engine::new();
        let sheet_id = engine.active_sheet_id();
        engine.dispatch(Command::AddCustomColor {
            color: "#00FF00".into(),
        });
        engine.dispatch(Command::SetFormatting {
            sheet_id: sheet_id.clone(),
            target: vec![zone("A1")],
            style: Some(Style::new().fill_color(Color::RED).text_color(Color::GREEN)),
            format: None,
        });
        engine.dispatch(Command::SetZoneBorders {
            sheet_id,
            target: vec![zone("B2")],
            position: BorderPosition::All,
            edge: Some(BorderEdge::new(BorderLineStyle::Thin, Color::BLUE)),
        });
        assert_eq!(
            engine.getters().custom_colors(),
            vec![Color::GREEN, Color::RED, Color::BLUE]
        );
    }

    #[test]
    fn test_adding_twice_records_once() {
        let mut engine = Engine::new();
        engine.dispatch(Command::AddCustomColor {
            color: "#ABCDEF".into(),
        });
        engine.dispatch(Command::AddCustomColor {
            color: "#abcdef".into(),
        });
        assert_eq!(engine.getters().custom_colors_plugin().explicit_colors().len(), 1);
        engine.undo();
        assert!(engine.getters().custom_colors_plugin().explicit_colors().is_empty());
    }
}
