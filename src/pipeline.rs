//! Pipeline – ties together parsing, styling, layout, pagination, and
//! rendering into a single function call.
//!
//! The page box comes from, in increasing priority: [`PipelineConfig::page`],
//! the document's own `@page` rules, then any `@page` rules in
//! [`PipelineConfig::stylesheets`].

use crate::dom::{body_children, collect_stylesheets, find_first, parse_html, DomNode, Tag};
use crate::error::Result;
use crate::fonts::FontManager;
use crate::layout::compute_layout;
use crate::layout_config::{mm_to_pt, pt_to_mm, LayoutConfig};
use crate::pagination::{paginate, PAGE_MARGIN_PT};
use crate::render::render_pdf;
use crate::style::{PageRule, StyleResolver, Stylesheet};

/// Page size and margin in millimetres.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PageBox {
    pub width_mm: f32,
    pub height_mm: f32,
    pub margin_mm: f32,
}

impl PageBox {
    /// A4 portrait with the default 40pt margin.
    pub fn a4() -> Self {
        Self {
            width_mm: 210.0,
            height_mm: 297.0,
            margin_mm: pt_to_mm(PAGE_MARGIN_PT),
        }
    }

    /// Apply the fields an `@page` rule sets.
    fn merge(&mut self, rule: &PageRule) {
        if let (Some(w), Some(h)) = (rule.width_mm, rule.height_mm) {
            self.width_mm = w;
            self.height_mm = h;
        }
        if let Some(m) = rule.margin_mm {
            self.margin_mm = m;
        }
    }
}

impl Default for PageBox {
    fn default() -> Self {
        Self::a4()
    }
}

/// Configuration for the PDF generation pipeline.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Document title embedded in the PDF metadata.
    pub title: String,
    /// Fallback page box when the document declares no `@page` rule.
    pub page: PageBox,
    /// Extra CSS applied after the document's own `<style>` blocks.
    pub stylesheets: Vec<String>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            title: "invoice".to_string(),
            page: PageBox::a4(),
            stylesheets: Vec::new(),
        }
    }
}

impl PipelineConfig {
    pub fn with_stylesheet(mut self, css: impl Into<String>) -> Self {
        self.stylesheets.push(css.into());
        self
    }
}

/// Full pipeline: HTML string → PDF bytes plus the frozen layout.
pub fn generate_pdf(html: &str, config: &PipelineConfig) -> Result<(Vec<u8>, LayoutConfig)> {
    let layout_config = compute_layout_config(html, config)?;
    let pdf_bytes = render_pdf(&layout_config)?;
    Ok((pdf_bytes, layout_config))
}

/// Convenience: generate PDF with the default config.
pub fn generate_pdf_from_html(html: &str) -> Result<Vec<u8>> {
    let (bytes, _) = generate_pdf(html, &PipelineConfig::default())?;
    Ok(bytes)
}

/// Generate only the layout config (no PDF rendering) – useful for testing.
pub fn compute_layout_config(html: &str, config: &PipelineConfig) -> Result<LayoutConfig> {
    // 1. Parse HTML
    let dom = parse_html(html);

    // 2. Cascade: document sheets, then overrides
    let mut sheet = Stylesheet::parse(&collect_stylesheets(&dom));
    for css in &config.stylesheets {
        sheet.append(css);
    }
    let mut page = config.page;
    if let Some(rule) = sheet.page() {
        page.merge(rule);
    }
    log::debug!(
        "Page box {:.1}x{:.1}mm, margin {:.1}mm, {} CSS rules",
        page.width_mm,
        page.height_mm,
        page.margin_mm,
        sheet.rule_count()
    );

    // 3. Styled tree, with html/body styles inherited by the content
    let styled = {
        let mut resolver = StyleResolver::new(&sheet);
        let html_el = find_first(&dom, &Tag::Html);
        let html_style = html_el.map(|el| {
            let s = resolver.resolve(el, None);
            resolver.enter(el);
            s
        });
        match find_first(&dom, &Tag::Body) {
            Some(body) => {
                let body_style = resolver.resolve(body, html_style.as_ref());
                resolver.enter(body);
                resolver.style_nodes(&body.children, Some(&body_style))
            }
            None => {
                let nodes: Vec<DomNode> = body_children(&dom);
                resolver.style_nodes(&nodes, html_style.as_ref())
            }
        }
    };

    // 4. Layout and pagination
    let fonts = FontManager::default();
    let width = mm_to_pt(page.width_mm);
    let height = mm_to_pt(page.height_mm);
    let margin = mm_to_pt(page.margin_mm);
    let boxes = compute_layout(&styled, width, margin, &fonts)?;
    let mut layout_config = paginate(&boxes, width, height, margin, &fonts);
    layout_config.title = config.title.clone();
    Ok(layout_config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pipeline_basic() {
        let html = "<h1>Hello</h1><p>World</p>";
        let (bytes, config) = generate_pdf(html, &PipelineConfig::default()).unwrap();
        assert!(!bytes.is_empty());
        assert!(!config.pages.is_empty());
        assert_eq!(&bytes[0..5], b"%PDF-");
    }

    #[test]
    fn document_page_rule_sets_the_page_box() {
        let html = "<html><head><style>@page { size: A5 landscape; margin: 5mm }</style></head>\
                    <body><p>x</p></body></html>";
        let config = compute_layout_config(html, &PipelineConfig::default()).unwrap();
        assert!((config.page_width_mm() - 210.0).abs() < 0.01);
        assert!((config.page_height_mm() - 148.0).abs() < 0.01);
    }

    #[test]
    fn override_stylesheet_wins_over_document() {
        let html = "<style>@page { size: 370mm 290mm; margin: 10mm }</style><p>x</p>";
        let config = PipelineConfig::default()
            .with_stylesheet("@page { size: 400mm 467mm; margin: 12mm; }");
        let layout = compute_layout_config(html, &config).unwrap();
        assert!((layout.page_width_mm() - 400.0).abs() < 0.01);
        assert!((layout.page_height_mm() - 467.0).abs() < 0.01);
        let first = &layout.pages[0].boxes[0];
        assert!((first.x - mm_to_pt(12.0)).abs() < 0.01);
    }

    #[test]
    fn body_styles_are_inherited() {
        let html = "<html><head><style>body { font-size: 8pt; }</style></head>\
                    <body><p>small</p></body></html>";
        let layout = compute_layout_config(html, &PipelineConfig::default()).unwrap();
        let mut sizes = Vec::new();
        for b in &layout.pages[0].boxes {
            b.walk(&mut |lb| {
                if let Some(t) = &lb.text {
                    sizes.push(t.font_size);
                }
            });
        }
        assert_eq!(sizes, vec![8.0]);
    }

    #[test]
    fn default_page_is_a4() {
        let layout = compute_layout_config("<p>x</p>", &PipelineConfig::default()).unwrap();
        assert!((layout.page_width_pt - 595.28).abs() < 0.01);
        assert_eq!(layout.title, "invoice");
    }
}
