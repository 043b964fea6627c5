//! Chart definitions
//!
//! A chart lives in a figure tagged "chart" with the same id. Its data set and
//! label ranges may point to any sheet.

use crate::command::{Command, CommandError};
use crate::data::WorkbookData;
use crate::error::{Error, Result};
use crate::history::{Direction, StatePatch};
use crate::plugin::{CorePlugin, ExecContext, Getters, RangeAdaptation};
use crate::plugins::figures::Figure;
use crate::plugins::{adapt_ranges, replace_sheet_list, retarget_ranges, sheet_names};
use ahash::AHashMap;
use lattice_core::{Range, SheetId};
use serde::{Deserialize, Serialize};
use std::any::Any;

pub const CHART_TAG: &str = "chart";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChartType {
    Bar,
    Line,
    Pie,
    Scatter,
}

/// Serialized chart definition, ranges in textual form
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChartDefinitionData {
    #[serde(rename = "type")]
    pub chart_type: ChartType,
    #[serde(default)]
    pub title: String,
    pub data_sets: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub labels: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Chart {
    pub figure_id: String,
    pub chart_type: ChartType,
    pub title: String,
    pub data_sets: Vec<Range>,
    pub labels: Option<Range>,
}

impl Chart {
    fn from_definition(
        figure_id: &str,
        definition: &ChartDefinitionData,
        mut parse: impl FnMut(&str) -> Option<Range>,
    ) -> Option<Chart> {
        let data_sets = definition
            .data_sets
            .iter()
            .map(|xc| parse(xc))
            .collect::<Option<Vec<_>>>()?;
        let labels = match &definition.labels {
            Some(xc) => Some(parse(xc)?),
            None => None,
        };
        Some(Chart {
            figure_id: figure_id.to_string(),
            chart_type: definition.chart_type,
            title: definition.title.clone(),
            data_sets,
            labels,
        })
    }

    fn parse(getters: &Getters<'_>, sheet_id: &SheetId, figure_id: &str, definition: &ChartDefinitionData) -> Option<Chart> {
        Self::from_definition(figure_id, definition, |xc| {
            getters
                .parse_range(xc, sheet_id)
                .ok()
                .filter(Range::is_valid)
        })
    }

    fn adapted(&self, adaptation: &RangeAdaptation) -> Chart {
        let labels = self
            .labels
            .as_ref()
            .and_then(|labels| adapt_ranges(std::slice::from_ref(labels), adaptation).pop());
        Chart {
            data_sets: adapt_ranges(&self.data_sets, adaptation),
            labels,
            ..self.clone()
        }
    }

    /// Definition with ranges written as seen from `sheet_id`
    pub fn definition(&self, sheet_id: &SheetId, sheet_name: impl Fn(&SheetId) -> Option<String>) -> ChartDefinitionData {
        ChartDefinitionData {
            chart_type: self.chart_type,
            title: self.title.clone(),
            data_sets: self
                .data_sets
                .iter()
                .map(|range| range.to_xc(sheet_id, &sheet_name))
                .collect(),
            labels: self
                .labels
                .as_ref()
                .map(|range| range.to_xc(sheet_id, &sheet_name)),
        }
    }
}

fn check_definition(getters: &Getters<'_>, sheet_id: &SheetId, definition: &ChartDefinitionData) -> Vec<CommandError> {
    if definition.data_sets.is_empty() {
        return vec![CommandError::EmptyRange];
    }
    if Chart::parse(getters, sheet_id, "", definition).is_none() {
        return vec![CommandError::InvalidRange];
    }
    Vec::new()
}

#[derive(Debug, Default)]
pub struct ChartsPlugin {
    charts: AHashMap<SheetId, Vec<Chart>>,
}

impl ChartsPlugin {
    pub fn charts(&self, sheet_id: &SheetId) -> &[Chart] {
        self.charts.get(sheet_id).map_or(&[], Vec::as_slice)
    }

    pub fn chart(&self, sheet_id: &SheetId, figure_id: &str) -> Option<&Chart> {
        self.charts(sheet_id)
            .iter()
            .find(|chart| chart.figure_id == figure_id)
    }

    fn set_charts(&mut self, sheet_id: &SheetId, charts: Vec<Chart>, ctx: &mut ExecContext<'_>) {
        if let Some(change) = replace_sheet_list(&mut self.charts, sheet_id, charts) {
            ctx.record(StatePatch::Charts(change));
        }
    }

    fn upsert(&mut self, sheet_id: &SheetId, chart: Chart, ctx: &mut ExecContext<'_>) {
        let mut charts = self.charts(sheet_id).to_vec();
        match charts.iter_mut().find(|c| c.figure_id == chart.figure_id) {
            Some(existing) => *existing = chart,
            None => charts.push(chart),
        }
        self.set_charts(sheet_id, charts, ctx);
    }
}

impl CorePlugin for ChartsPlugin {
    fn name(&self) -> &'static str {
        "charts"
    }

    fn allow_dispatch(&self, command: &Command, getters: &Getters<'_>) -> Vec<CommandError> {
        match command {
            Command::CreateChart {
                sheet_id,
                definition,
                ..
            } => check_definition(getters, sheet_id, definition),
            Command::UpdateChart {
                sheet_id,
                figure_id,
                definition,
            } => {
                if self.chart(sheet_id, figure_id).is_none() {
                    return vec![CommandError::EntityDoesNotExist];
                }
                check_definition(getters, sheet_id, definition)
            }
            _ => Vec::new(),
        }
    }

    fn adapt_ranges(&mut self, adaptation: &RangeAdaptation, ctx: &mut ExecContext<'_>) {
        if matches!(adaptation, RangeAdaptation::SheetRenamed { .. }) {
            return;
        }
        let mut sheet_ids: Vec<SheetId> = self.charts.keys().cloned().collect();
        sheet_ids.sort();
        for sheet_id in sheet_ids {
            let adapted = self
                .charts(&sheet_id)
                .iter()
                .map(|chart| chart.adapted(adaptation))
                .collect();
            self.set_charts(&sheet_id, adapted, ctx);
        }
    }

    fn handle(&mut self, command: &Command, ctx: &mut ExecContext<'_>) {
        match command {
            Command::CreateChart {
                sheet_id,
                figure_id,
                anchor,
                offset,
                width,
                height,
                definition,
            } => {
                let Some(chart) = Chart::parse(&ctx.getters, sheet_id, figure_id, definition) else {
                    return;
                };
                let mut figure = Figure::new(figure_id.clone(), *anchor, *width, *height);
                figure.offset = *offset;
                figure.tag = CHART_TAG.to_string();
                ctx.dispatch(Command::CreateFigure {
                    sheet_id: sheet_id.clone(),
                    figure,
                });
                self.upsert(sheet_id, chart, ctx);
            }
            Command::UpdateChart {
                sheet_id,
                figure_id,
                definition,
            } => {
                if let Some(chart) = Chart::parse(&ctx.getters, sheet_id, figure_id, definition) {
                    self.upsert(sheet_id, chart, ctx);
                }
            }
            Command::DeleteFigure { sheet_id, id } => {
                let charts = self
                    .charts(sheet_id)
                    .iter()
                    .filter(|chart| &chart.figure_id != id)
                    .cloned()
                    .collect();
                self.set_charts(sheet_id, charts, ctx);
            }
            Command::DeleteSheet { sheet_id } => self.set_charts(sheet_id, Vec::new(), ctx),
            Command::DuplicateSheet {
                sheet_id,
                new_sheet_id,
                ..
            } => {
                let copy = self
                    .charts(sheet_id)
                    .iter()
                    .map(|chart| Chart {
                        data_sets: retarget_ranges(&chart.data_sets, sheet_id, new_sheet_id),
                        labels: chart.labels.as_ref().and_then(|labels| {
                            retarget_ranges(std::slice::from_ref(labels), sheet_id, new_sheet_id).pop()
                        }),
                        ..chart.clone()
                    })
                    .collect();
                self.set_charts(new_sheet_id, copy, ctx);
            }
            _ => {}
        }
    }

    fn apply_patch(&mut self, patch: &StatePatch, direction: Direction) {
        if let StatePatch::Charts(change) = patch {
            change.apply_to(&mut self.charts, direction);
        }
    }

    fn export(&self, data: &mut WorkbookData) {
        let names = sheet_names(data);
        for sheet in &mut data.sheets {
            for figure in &mut sheet.figures {
                figure.chart = self
                    .chart(&sheet.id, &figure.figure.id)
                    .map(|chart| chart.definition(&sheet.id, |id| names.get(id).cloned()));
            }
        }
    }

    fn import(&mut self, data: &WorkbookData) -> Result<()> {
        self.charts.clear();
        for sheet in &data.sheets {
            let mut charts = Vec::new();
            for figure in &sheet.figures {
                let Some(definition) = &figure.chart else {
                    continue;
                };
                let chart = Chart::from_definition(&figure.figure.id, definition, |xc| {
                    Range::parse(xc, &sheet.id, |name| data.sheet_id_by_name(name)).ok()
                })
                .ok_or_else(|| {
                    Error::invalid_document(format!("chart '{}' has an invalid range", figure.figure.id))
                })?;
                charts.push(chart);
            }
            if !charts.is_empty() {
                self.charts.insert(sheet.id.clone(), charts);
            }
        }
        Ok(())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_util::*;
    use crate::Engine;
    use crate::plugins::figures::PixelOffset;
    use lattice_core::{Dimension, InsertPosition};
    use pretty_assertions::assert_eq;

    fn definition(data_sets: &[&str], labels: Option<&str>) -> ChartDefinitionData {
        ChartDefinitionData {
            chart_type: ChartType::Bar,
            title: "Sales".into(),
            data_sets: data_sets.iter().map(|s| s.to_string()).collect(),
            labels: labels.map(str::to_string),
        }
    }

    fn create_chart(engine: &mut Engine, id: &str, definition: ChartDefinitionData) -> crate::DispatchResult {
        let sheet_id = engine.active_sheet_id();
        engine.dispatch(Command::CreateChart {
            sheet_id,
            figure_id: id.into(),
            anchor: pos("E2"),
            offset: PixelOffset::default(),
            width: 400,
            height: 300,
            definition,
        })
    }

    fn chart_definition(engine: &Engine, id: &str) -> Option<ChartDefinitionData> {
        let sheet_id = engine.active_sheet_id();
        let getters = engine.getters();
        getters
            .charts()
            .chart(&sheet_id, id)
            .map(|chart| chart.definition(&sheet_id, |id| getters.sheet_name(id)))
    }

    #[test]
    fn test_create_chart_creates_its_figure() {
        let mut engine = Engine::new();
        assert!(create_chart(&mut engine, "c1", definition(&["B1:B5"], Some("A1:A5"))).is_success());
        let sheet_id = engine.active_sheet_id();
        let figure = engine.getters().figures().figure(&sheet_id, "c1").cloned().unwrap();
        assert_eq!(figure.tag, CHART_TAG);
        assert_eq!(figure.anchor, pos("E2"));
        engine.undo();
        assert!(engine.getters().figures().figure(&sheet_id, "c1").is_none());
        assert!(chart_definition(&engine, "c1").is_none());
    }

    #[test]
    fn test_chart_ranges_follow_structure() {
        let mut engine = Engine::new();
        create_chart(&mut engine, "c1", definition(&["B1:B5", "C1:C5"], Some("A1:A5")));
        let sheet_id = engine.active_sheet_id();
        engine.dispatch(Command::AddColumnsRows {
            sheet_id: sheet_id.clone(),
            dimension: Dimension::Row,
            base: 0,
            position: InsertPosition::Before,
            quantity: 1,
        });
        engine.dispatch(Command::RemoveColumnsRows {
            sheet_id,
            dimension: Dimension::Col,
            elements: vec![0, 2],
        });
        assert_eq!(chart_definition(&engine, "c1"), Some(definition(&["A2:A6"], None)));
    }

    #[test]
    fn test_deleting_data_sheet_invalidates_ranges() {
        let mut engine = Engine::new();
        add_sheet(&mut engine, "s2", "Data");
        create_chart(&mut engine, "c1", definition(&["Data!A1:A3"], None));
        engine.dispatch(Command::DeleteSheet {
            sheet_id: SheetId::from("s2"),
        });
        let sheet_id = engine.active_sheet_id();
        let chart = engine.getters().charts().chart(&sheet_id, "c1").cloned().unwrap();
        assert!(!chart.data_sets[0].is_valid());
        assert_eq!(chart.data_sets[0].invalid_sheet_name.as_deref(), Some("Data"));
    }

    #[test]
    fn test_deleting_figure_removes_chart() {
        let mut engine = Engine::new();
        create_chart(&mut engine, "c1", definition(&["B1:B5"], None));
        let sheet_id = engine.active_sheet_id();
        engine.dispatch(Command::DeleteFigure {
            sheet_id: sheet_id.clone(),
            id: "c1".into(),
        });
        assert!(chart_definition(&engine, "c1").is_none());
        let result = engine.dispatch(Command::UpdateChart {
            sheet_id,
            figure_id: "c1".into(),
            definition: definition(&["B1"], None),
        });
        assert!(result.is_rejected_by(CommandError::EntityDoesNotExist));
    }
}
