//! FILENAME: engine/src/style.rs
//! PURPOSE: Defines the cell style vocabulary shared by templates, reports and documents.
//! CONTEXT: A template cell carries a font, a fill colour, four border line
//! descriptors, an alignment and a number format. Every part is optional so a
//! style-library entry can be overlaid on a cell's own style, replacing only
//! the parts it defines. The `StyleRegistry` deduplicates styles when a report
//! is written back to a document.

use serde::{Deserialize, Serialize};

/// Horizontal alignment options for cell content.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum TextAlign {
    #[default]
    General, // Auto: numbers right, text left
    Left,
    Center,
    Right,
    Justify,
}

impl TextAlign {
    pub fn from_name(name: &str) -> Self {
        match name.to_ascii_lowercase().as_str() {
            "left" => TextAlign::Left,
            "center" | "centre" => TextAlign::Center,
            "right" => TextAlign::Right,
            "justify" => TextAlign::Justify,
            _ => TextAlign::General,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            TextAlign::General => "Automatic",
            TextAlign::Left => "Left",
            TextAlign::Center => "Center",
            TextAlign::Right => "Right",
            TextAlign::Justify => "Justify",
        }
    }
}

/// Vertical alignment options for cell content.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum VerticalAlign {
    Top,
    Center,
    #[default]
    Bottom,
}

impl VerticalAlign {
    pub fn from_name(name: &str) -> Self {
        match name.to_ascii_lowercase().as_str() {
            "top" => VerticalAlign::Top,
            "center" | "centre" => VerticalAlign::Center,
            _ => VerticalAlign::Bottom,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            VerticalAlign::Top => "Top",
            VerticalAlign::Center => "Center",
            VerticalAlign::Bottom => "Bottom",
        }
    }
}

/// RGB color representation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Color {
    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Color { r, g, b }
    }

    pub const fn black() -> Self {
        Color::new(0, 0, 0)
    }

    pub const fn white() -> Self {
        Color::new(255, 255, 255)
    }

    /// Hex form used by spreadsheet XML ("#RRGGBB").
    pub fn to_hex(&self) -> String {
        format!("#{:02X}{:02X}{:02X}", self.r, self.g, self.b)
    }

    /// Parse from hex string (e.g., "#FF0000" or "FF0000").
    pub fn from_hex(hex: &str) -> Option<Self> {
        let hex = hex.trim().trim_start_matches('#');
        if hex.len() != 6 {
            return None;
        }
        let r = u8::from_str_radix(&hex[0..2], 16).ok()?;
        let g = u8::from_str_radix(&hex[2..4], 16).ok()?;
        let b = u8::from_str_radix(&hex[4..6], 16).ok()?;
        Some(Color::new(r, g, b))
    }
}

impl Default for Color {
    fn default() -> Self {
        Color::black()
    }
}

/// Line style for borders.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum BorderLineStyle {
    #[default]
    None,
    Continuous,
    Dash,
    Dot,
    DashDot,
    Double,
}

impl BorderLineStyle {
    pub fn from_name(name: &str) -> Self {
        match name {
            "Continuous" => BorderLineStyle::Continuous,
            "Dash" => BorderLineStyle::Dash,
            "Dot" => BorderLineStyle::Dot,
            "DashDot" | "DashDotDot" | "SlantDashDot" => BorderLineStyle::DashDot,
            "Double" => BorderLineStyle::Double,
            _ => BorderLineStyle::None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            BorderLineStyle::None => "None",
            BorderLineStyle::Continuous => "Continuous",
            BorderLineStyle::Dash => "Dash",
            BorderLineStyle::Dot => "Dot",
            BorderLineStyle::DashDot => "DashDot",
            BorderLineStyle::Double => "Double",
        }
    }
}

/// Border line descriptor for a single edge.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub struct BorderStyle {
    pub line: BorderLineStyle,
    pub weight: u8, // 0 = hairline, 1 = thin, 2 = medium, 3 = thick
    pub color: Option<Color>,
}

impl BorderStyle {
    pub fn solid(weight: u8) -> Self {
        BorderStyle {
            line: BorderLineStyle::Continuous,
            weight,
            color: None,
        }
    }
}

/// Borders of a cell, in left/top/bottom/right order.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub struct Borders {
    pub left: Option<BorderStyle>,
    pub top: Option<BorderStyle>,
    pub bottom: Option<BorderStyle>,
    pub right: Option<BorderStyle>,
}

impl Borders {
    pub fn is_empty(&self) -> bool {
        self.left.is_none() && self.top.is_none() && self.bottom.is_none() && self.right.is_none()
    }
}

/// Font style configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct FontStyle {
    pub name: Option<String>,
    pub family: Option<String>,
    pub size: Option<f64>, // Font size in points
    pub bold: bool,
    pub italic: bool,
    pub underline: bool,
    pub color: Option<Color>,
}

/// Interior (background) fill.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub struct Fill {
    pub color: Option<Color>,
    pub pattern: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub struct Alignment {
    pub horizontal: TextAlign,
    pub vertical: VerticalAlign,
    pub wrap_text: bool,
}

/// Complete cell style definition.
/// `None` parts are inherited when this style is overlaid on another.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct CellStyle {
    pub font: Option<FontStyle>,
    pub fill: Option<Fill>,
    pub borders: Option<Borders>,
    pub alignment: Option<Alignment>,
    pub number_format: Option<String>,
}

impl CellStyle {
    /// Create a new, empty style.
    pub fn new() -> Self {
        CellStyle::default()
    }

    pub fn is_empty(&self) -> bool {
        *self == CellStyle::default()
    }

    /// Returns this style with every part defined by `other` replaced.
    pub fn overlay(&self, other: &CellStyle) -> CellStyle {
        CellStyle {
            font: other.font.clone().or_else(|| self.font.clone()),
            fill: other.fill.clone().or_else(|| self.fill.clone()),
            borders: other.borders.clone().or_else(|| self.borders.clone()),
            alignment: other.alignment.or(self.alignment),
            number_format: other
                .number_format
                .clone()
                .or_else(|| self.number_format.clone()),
        }
    }

    /// Create a style with bold text.
    pub fn with_bold(mut self, bold: bool) -> Self {
        self.font.get_or_insert_with(FontStyle::default).bold = bold;
        self
    }

    /// Create a style with italic text.
    pub fn with_italic(mut self, italic: bool) -> Self {
        self.font.get_or_insert_with(FontStyle::default).italic = italic;
        self
    }

    /// Create a style with a specific background color.
    pub fn with_background(mut self, color: Color) -> Self {
        self.fill = Some(Fill {
            color: Some(color),
            pattern: Some("Solid".to_string()),
        });
        self
    }

    /// Create a style with a specific horizontal alignment.
    pub fn with_text_align(mut self, align: TextAlign) -> Self {
        self.alignment.get_or_insert_with(Alignment::default).horizontal = align;
        self
    }

    pub fn with_borders(mut self, borders: Borders) -> Self {
        self.borders = Some(borders);
        self
    }

    pub fn with_number_format(mut self, format: &str) -> Self {
        self.number_format = Some(format.to_string());
        self
    }
}

/// Deduplicates styles into a numbered table. Index 0 is always the empty default style.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StyleRegistry {
    styles: Vec<CellStyle>,
}

impl StyleRegistry {
    pub fn new() -> Self {
        StyleRegistry {
            styles: vec![CellStyle::new()],
        }
    }

    /// Get or create a style index for the given style.
    pub fn get_or_create(&mut self, style: CellStyle) -> usize {
        if let Some(index) = self.styles.iter().position(|s| *s == style) {
            return index;
        }
        self.styles.push(style);
        self.styles.len() - 1
    }

    /// Get a style by its index.
    /// Returns the default style (index 0) if index is out of bounds.
    pub fn get(&self, index: usize) -> &CellStyle {
        self.styles.get(index).unwrap_or(&self.styles[0])
    }

    /// Get the total number of unique styles.
    pub fn len(&self) -> usize {
        self.styles.len()
    }

    /// Check if the registry only contains the default style.
    pub fn is_empty(&self) -> bool {
        self.styles.len() <= 1
    }

    pub fn all_styles(&self) -> &[CellStyle] {
        &self.styles
    }
}

impl Default for StyleRegistry {
    fn default() -> Self {
        StyleRegistry::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_color_hex_round_trip() {
        let color = Color::from_hex("#FF8000").unwrap();
        assert_eq!(color, Color::new(255, 128, 0));
        assert_eq!(color.to_hex(), "#FF8000");
        assert!(Color::from_hex("FFF").is_none());
    }

    #[test]
    fn test_overlay_replaces_defined_parts_only() {
        let base = CellStyle::new()
            .with_bold(true)
            .with_borders(Borders {
                bottom: Some(BorderStyle::solid(1)),
                ..Borders::default()
            });
        let over = CellStyle::new().with_background(Color::new(255, 255, 0));

        let merged = base.overlay(&over);
        assert!(merged.font.as_ref().unwrap().bold);
        assert!(merged.borders.is_some());
        assert_eq!(merged.fill.unwrap().color, Some(Color::new(255, 255, 0)));
    }

    #[test]
    fn test_style_registry_deduplication() {
        let mut registry = StyleRegistry::new();

        let index1 = registry.get_or_create(CellStyle::new().with_bold(true));
        let index2 = registry.get_or_create(CellStyle::new().with_bold(true));
        let index3 = registry.get_or_create(CellStyle::new().with_italic(true));

        assert_eq!(index1, index2);
        assert_ne!(index1, index3);
        assert_eq!(registry.len(), 3); // default + bold + italic
        assert_eq!(registry.get_or_create(CellStyle::new()), 0);
    }

    #[test]
    fn test_alignment_names() {
        assert_eq!(TextAlign::from_name("Center"), TextAlign::Center);
        assert_eq!(VerticalAlign::from_name("Top").name(), "Top");
        assert_eq!(BorderLineStyle::from_name("Continuous").name(), "Continuous");
    }
}
