//! Cell styling types
//!
//! - [`Style`] - Font, fill and alignment of a cell
//! - [`Border`] - Cell borders
//! - [`Color`] - Color representation

mod border;
mod color;

pub use border::{Border, BorderEdge, BorderLineStyle};
pub use color::Color;

/// Horizontal text alignment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum HorizontalAlignment {
    Left,
    Center,
    Right,
}

/// Cell style
///
/// Every attribute is optional: `None` means "not set" so that partial styles
/// can be layered with [`Style::merged`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct Style {
    #[cfg_attr(feature = "serde", serde(skip_serializing_if = "Option::is_none"))]
    pub bold: Option<bool>,
    #[cfg_attr(feature = "serde", serde(skip_serializing_if = "Option::is_none"))]
    pub italic: Option<bool>,
    #[cfg_attr(feature = "serde", serde(skip_serializing_if = "Option::is_none"))]
    pub strikethrough: Option<bool>,
    #[cfg_attr(feature = "serde", serde(skip_serializing_if = "Option::is_none"))]
    pub underline: Option<bool>,
    /// Font size in points
    #[cfg_attr(feature = "serde", serde(skip_serializing_if = "Option::is_none"))]
    pub font_size: Option<u16>,
    #[cfg_attr(feature = "serde", serde(skip_serializing_if = "Option::is_none"))]
    pub text_color: Option<Color>,
    #[cfg_attr(feature = "serde", serde(skip_serializing_if = "Option::is_none"))]
    pub fill_color: Option<Color>,
    #[cfg_attr(feature = "serde", serde(skip_serializing_if = "Option::is_none"))]
    pub align: Option<HorizontalAlignment>,
}

impl Style {
    /// Create a new empty style
    pub fn new() -> Self {
        Self::default()
    }

    /// Set font to bold
    pub fn bold(mut self, bold: bool) -> Self {
        self.bold = Some(bold);
        self
    }

    /// Set font to italic
    pub fn italic(mut self, italic: bool) -> Self {
        self.italic = Some(italic);
        self
    }

    pub fn strikethrough(mut self, strikethrough: bool) -> Self {
        self.strikethrough = Some(strikethrough);
        self
    }

    pub fn underline(mut self, underline: bool) -> Self {
        self.underline = Some(underline);
        self
    }

    /// Set font size in points
    pub fn font_size(mut self, size: u16) -> Self {
        self.font_size = Some(size);
        self
    }

    /// Set font color
    pub fn text_color(mut self, color: Color) -> Self {
        self.text_color = Some(color);
        self
    }

    /// Set fill color
    pub fn fill_color(mut self, color: Color) -> Self {
        self.fill_color = Some(color);
        self
    }

    /// Set horizontal alignment
    pub fn align(mut self, align: HorizontalAlignment) -> Self {
        self.align = Some(align);
        self
    }

    /// Check if no attribute is set
    pub fn is_empty(&self) -> bool {
        *self == Style::default()
    }

    /// Layer `other` on top of `self`: attributes set in `other` win
    pub fn merged(&self, other: &Style) -> Style {
        Style {
            bold: other.bold.or(self.bold),
            italic: other.italic.or(self.italic),
            strikethrough: other.strikethrough.or(self.strikethrough),
            underline: other.underline.or(self.underline),
            font_size: other.font_size.or(self.font_size),
            text_color: other.text_color.or(self.text_color),
            fill_color: other.fill_color.or(self.fill_color),
            align: other.align.or(self.align),
        }
    }

    /// Colors used by this style
    pub fn colors(&self) -> impl Iterator<Item = Color> {
        [self.text_color, self.fill_color].into_iter().flatten()
    }
}
