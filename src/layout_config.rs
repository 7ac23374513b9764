//! Layout config – the intermediate representation between layout computation
//! and PDF rendering. This is the "frozen" structure that encodes exactly what
//! goes on each page; it serialises to JSON for inspection and snapshot tests.

use serde::{Deserialize, Serialize};

use crate::error::Result;

/// A complete document layout ready for rendering.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LayoutConfig {
    /// Document title embedded in the PDF metadata.
    #[serde(default = "LayoutConfig::default_title")]
    pub title: String,
    /// Width of each page in PDF points (1 pt = 1/72 inch).
    pub page_width_pt: f32,
    /// Height of each page in PDF points.
    pub page_height_pt: f32,
    /// Ordered list of pages.
    pub pages: Vec<PageLayout>,
}

/// One page of content.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageLayout {
    pub page_index: usize,
    pub boxes: Vec<LayoutBox>,
}

/// A positioned rectangle with optional content.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LayoutBox {
    /// Position relative to page top-left, in points.
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,

    pub background_color: Option<[f32; 4]>,
    #[serde(default, skip_serializing_if = "BoxBorders::is_empty")]
    pub borders: BoxBorders,

    /// Content (mutually exclusive in practice)
    pub text: Option<TextContent>,
    pub image: Option<ImageContent>,

    /// Children (nested boxes)
    pub children: Vec<LayoutBox>,
}

/// Border edges drawn around a box; absent sides are not stroked.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BoxBorders {
    pub top: Option<BorderStyle>,
    pub right: Option<BorderStyle>,
    pub bottom: Option<BorderStyle>,
    pub left: Option<BorderStyle>,
}

impl BoxBorders {
    pub fn is_empty(&self) -> bool {
        self.top.is_none() && self.right.is_none() && self.bottom.is_none() && self.left.is_none()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BorderStyle {
    pub width: f32,
    pub color: [f32; 4],
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextContent {
    /// Pre-wrapped lines of text.
    pub lines: Vec<TextLine>,
    pub font_size: f32,
    pub bold: bool,
    pub italic: bool,
    pub color: [f32; 4],
    pub line_height: f32,
    /// Distance from the top of each line to its baseline.
    pub baseline: f32,
    pub underline: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextLine {
    pub text: String,
    /// X offset within the layout box (for alignment)
    pub x_offset: f32,
    /// Y offset from the top of the text content area
    pub y_offset: f32,
    pub width: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageContent {
    pub src: String,
    pub width: f32,
    pub height: f32,
}

impl LayoutConfig {
    /// An empty layout with the given page size in millimetres.
    pub fn with_page_mm(title: &str, width_mm: f32, height_mm: f32) -> Self {
        Self {
            title: title.to_string(),
            page_width_pt: mm_to_pt(width_mm),
            page_height_pt: mm_to_pt(height_mm),
            pages: Vec::new(),
        }
    }

    /// Create an A4 layout config.
    pub fn a4() -> Self {
        Self::with_page_mm(&Self::default_title(), 210.0, 297.0)
    }

    fn default_title() -> String {
        "invoice".to_string()
    }

    pub fn page_width_mm(&self) -> f32 {
        pt_to_mm(self.page_width_pt)
    }

    pub fn page_height_mm(&self) -> f32 {
        pt_to_mm(self.page_height_pt)
    }

    /// Serialise to JSON.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Deserialise from JSON.
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Total number of boxes carrying text, across all pages.
    pub fn text_box_count(&self) -> usize {
        fn count(b: &LayoutBox) -> usize {
            usize::from(b.text.is_some()) + b.children.iter().map(count).sum::<usize>()
        }
        self.pages
            .iter()
            .flat_map(|p| p.boxes.iter())
            .map(count)
            .sum()
    }
}

impl LayoutBox {
    pub fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self {
            x,
            y,
            width,
            height,
            background_color: None,
            borders: BoxBorders::default(),
            text: None,
            image: None,
            children: Vec::new(),
        }
    }

    /// Depth-first walk over this box and its descendants.
    pub fn walk<'a>(&'a self, f: &mut impl FnMut(&'a LayoutBox)) {
        f(self);
        for child in &self.children {
            child.walk(f);
        }
    }
}

pub fn mm_to_pt(mm: f32) -> f32 {
    mm * 72.0 / 25.4
}

pub fn pt_to_mm(pt: f32) -> f32 {
    pt * 25.4 / 72.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn a4_dimensions() {
        let config = LayoutConfig::a4();
        assert!((config.page_width_pt - 595.28).abs() < 0.01);
        assert!((config.page_height_pt - 841.89).abs() < 0.01);
    }

    #[test]
    fn json_round_trip_keeps_borders() {
        let mut config = LayoutConfig::with_page_mm("t", 400.0, 407.0);
        let mut b = LayoutBox::new(1.0, 2.0, 3.0, 4.0);
        b.borders.bottom = Some(BorderStyle {
            width: 0.75,
            color: [0.0, 0.0, 0.0, 1.0],
        });
        config.pages.push(PageLayout {
            page_index: 0,
            boxes: vec![b],
        });
        let json = config.to_json().unwrap();
        assert!(json.contains("\"bottom\""));
        assert_eq!(LayoutConfig::from_json(&json).unwrap(), config);
    }

    #[test]
    fn invalid_json_is_an_error() {
        assert!(LayoutConfig::from_json("{").is_err());
    }
}
