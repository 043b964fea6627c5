//! Cell borders

use super::Color;

/// Borders of one cell
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Border {
    #[cfg_attr(feature = "serde", serde(default, skip_serializing_if = "Option::is_none"))]
    pub top: Option<BorderEdge>,
    #[cfg_attr(feature = "serde", serde(default, skip_serializing_if = "Option::is_none"))]
    pub bottom: Option<BorderEdge>,
    #[cfg_attr(feature = "serde", serde(default, skip_serializing_if = "Option::is_none"))]
    pub left: Option<BorderEdge>,
    #[cfg_attr(feature = "serde", serde(default, skip_serializing_if = "Option::is_none"))]
    pub right: Option<BorderEdge>,
}

impl Border {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_top(mut self, edge: BorderEdge) -> Self {
        self.top = Some(edge);
        self
    }

    pub fn with_left(mut self, edge: BorderEdge) -> Self {
        self.left = Some(edge);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.left.is_none() && self.right.is_none() && self.top.is_none() && self.bottom.is_none()
    }

    /// Every edge color, in top, bottom, left, right order
    pub fn colors(&self) -> impl Iterator<Item = Color> + '_ {
        [self.top, self.bottom, self.left, self.right]
            .into_iter()
            .flatten()
            .map(|edge| edge.color)
    }
}

/// One side of a cell's border
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct BorderEdge {
    pub style: BorderLineStyle,
    pub color: Color,
}

impl BorderEdge {
    pub fn new(style: BorderLineStyle, color: Color) -> Self {
        Self { style, color }
    }

    /// Thin black line
    pub fn thin() -> Self {
        Self::new(BorderLineStyle::Thin, Color::BLACK)
    }
}

/// How an edge is drawn
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum BorderLineStyle {
    #[default]
    Thin,
    Medium,
    Thick,
    Dashed,
    Dotted,
    Double,
}
