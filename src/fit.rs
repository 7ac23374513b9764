//! Page-fitting renderer.
//!
//! Invoices are printed on a single tall page whose height grows with the
//! number of line items, so the items table never breaks across pages. The
//! height is derived from the markup (or from the count tracked by the
//! compositor) and injected as an `@page` rule that overrides whatever the
//! document declares.

use std::error::Error as _;
use std::fs;
use std::path::{Path, PathBuf};

use crate::compose::{RenderedDocument, ITEM_COUNT_ATTR};
use crate::dom::{find_first, parse_html, DomNode, ElementNode, Tag};
use crate::error::{InvoiceError, Result};
use crate::pipeline::{generate_pdf, PageBox, PipelineConfig};

/// Fixed page width in millimetres.
pub const PAGE_WIDTH_MM: f32 = 400.0;
/// Fixed page margin in millimetres.
pub const PAGE_MARGIN_MM: f32 = 12.0;

/// How page height grows with the number of line items.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HeightPolicy {
    /// Height reserved for everything except the item rows.
    pub base_height_mm: f32,
    /// Height added per line item.
    pub item_height_mm: f32,
}

impl Default for HeightPolicy {
    fn default() -> Self {
        Self {
            base_height_mm: 377.0,
            item_height_mm: 30.0,
        }
    }
}

/// The page box computed for one document.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PageGeometry {
    pub item_count: usize,
    pub base_height_mm: f32,
    pub item_height_mm: f32,
    pub page_height_mm: f32,
    pub page_width_mm: f32,
    pub margin_mm: f32,
}

impl PageGeometry {
    /// Geometry for `item_count` rows; a count of zero is treated as one.
    pub fn new(item_count: usize, policy: HeightPolicy) -> Self {
        let item_count = item_count.max(1);
        Self {
            item_count,
            base_height_mm: policy.base_height_mm,
            item_height_mm: policy.item_height_mm,
            page_height_mm: policy.base_height_mm + item_count as f32 * policy.item_height_mm,
            page_width_mm: PAGE_WIDTH_MM,
            margin_mm: PAGE_MARGIN_MM,
        }
    }

    /// The `@page` directive forcing this geometry.
    pub fn to_page_rule(&self) -> String {
        format!(
            "@page {{ size: {}mm {}mm; margin: {}mm; }}",
            self.page_width_mm, self.page_height_mm, self.margin_mm
        )
    }

    fn page_box(&self) -> PageBox {
        PageBox {
            width_mm: self.page_width_mm,
            height_mm: self.page_height_mm,
            margin_mm: self.margin_mm,
        }
    }
}

/// Result of a successful render.
#[derive(Debug, Clone)]
pub struct RenderOutput {
    pub bytes: Vec<u8>,
    pub geometry: PageGeometry,
    /// Size of `bytes`.
    pub size: usize,
    /// Pages emitted; more than one only when content overflowed.
    pub pages: usize,
}

impl RenderOutput {
    pub fn size_kb(&self) -> f64 {
        self.size as f64 / 1024.0
    }
}

/// Number of line items in `markup`.
///
/// Looks at the first `<tbody>`: its `data-item-count` attribute if present,
/// otherwise its `<tr>` count minus one (at least one). Without a `<tbody>`
/// the count is one.
pub fn scan_item_count(markup: &str) -> usize {
    item_count_in(&parse_html(markup))
}

fn item_count_in(dom: &[DomNode]) -> usize {
    let Some(tbody) = find_first(dom, &Tag::Tbody) else {
        return 1;
    };
    if let Some(n) = tbody
        .attr(ITEM_COUNT_ATTR)
        .and_then(|v| v.trim().parse::<usize>().ok())
    {
        return n.max(1);
    }
    tbody.count_descendants(&Tag::Tr).saturating_sub(1).max(1)
}

fn document_title(dom: &[DomNode]) -> Option<String> {
    let title: &ElementNode = find_first(dom, &Tag::Title)?;
    let text: String = title
        .children
        .iter()
        .filter_map(|c| match c {
            DomNode::Text(t) => Some(t.as_str()),
            DomNode::Element(_) => None,
        })
        .collect();
    let text = text.trim();
    (!text.is_empty()).then(|| text.to_string())
}

/// Render `markup` onto a page sized for its item count.
pub fn render(markup: &str, policy: HeightPolicy) -> Result<RenderOutput> {
    let dom = parse_html(markup);
    let title = document_title(&dom).unwrap_or_else(|| "invoice".to_string());
    render_counted(markup, item_count_in(&dom), policy, &title)
}

/// Like [`render`], with an explicit PDF title.
pub fn render_with_title(markup: &str, policy: HeightPolicy, title: &str) -> Result<RenderOutput> {
    render_counted(markup, scan_item_count(markup), policy, title)
}

/// Render a composed document using the item count tracked during
/// composition instead of scanning the markup.
pub fn render_document(doc: &RenderedDocument, policy: HeightPolicy) -> Result<RenderOutput> {
    let title = format!("Tax Invoice {}", doc.invoice_number());
    render_counted(doc.markup(), doc.item_count(), policy, &title)
}

fn render_counted(
    markup: &str,
    item_count: usize,
    policy: HeightPolicy,
    title: &str,
) -> Result<RenderOutput> {
    let geometry = PageGeometry::new(item_count, policy);
    log::info!(
        "Rendering {} items on a {}x{}mm page",
        geometry.item_count,
        geometry.page_width_mm,
        geometry.page_height_mm
    );

    let config = PipelineConfig {
        title: title.to_string(),
        page: geometry.page_box(),
        ..PipelineConfig::default()
    }
    .with_stylesheet(geometry.to_page_rule());

    let (bytes, layout) = generate_pdf(markup, &config).inspect_err(log_failure)?;
    let output = RenderOutput {
        size: bytes.len(),
        pages: layout.pages.len(),
        bytes,
        geometry,
    };
    log::info!(
        "Rendered PDF: {:.1} KB, {} page(s)",
        output.size_kb(),
        output.pages
    );
    Ok(output)
}

fn log_failure(e: &InvoiceError) {
    let mut chain = e.to_string();
    let mut source = e.source();
    while let Some(cause) = source {
        chain.push_str(": ");
        chain.push_str(&cause.to_string());
        source = cause.source();
    }
    log::error!("PDF rendering failed: {chain}");
}

/// Default output path: the input path with a `.pdf` extension.
pub fn default_output_path(html_path: &Path) -> PathBuf {
    html_path.with_extension("pdf")
}

/// Render the HTML file at `html_path` and write the PDF next to it, or to
/// `pdf_path` when given. Returns the path written and the render output.
pub fn convert_file(
    html_path: &Path,
    pdf_path: Option<&Path>,
    policy: HeightPolicy,
    title: Option<&str>,
) -> Result<(PathBuf, RenderOutput)> {
    if !html_path.exists() {
        let err = InvoiceError::NotFound(html_path.to_path_buf());
        log_failure(&err);
        return Err(err);
    }
    let markup = fs::read_to_string(html_path).map_err(|e| InvoiceError::io(html_path, e))?;

    let output = match title {
        Some(t) => render_with_title(&markup, policy, t)?,
        None => render(&markup, policy)?,
    };

    let out_path = pdf_path
        .map(Path::to_path_buf)
        .unwrap_or_else(|| default_output_path(html_path));
    if let Some(parent) = out_path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent).map_err(|e| InvoiceError::io(parent, e))?;
        }
    }
    fs::write(&out_path, &output.bytes).map_err(|e| InvoiceError::io(&out_path, e))?;
    log::info!("Wrote '{}'", out_path.display());
    Ok((out_path, output))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table(rows: usize, attr: Option<usize>) -> String {
        let attr = attr
            .map(|n| format!(" {ITEM_COUNT_ATTR}=\"{n}\""))
            .unwrap_or_default();
        let rows: String = (0..rows).map(|i| format!("<tr><td>{i}</td></tr>")).collect();
        format!("<table><thead><tr><th>#</th></tr></thead><tbody{attr}>{rows}</tbody></table>")
    }

    #[test]
    fn row_heuristic_subtracts_one() {
        assert_eq!(scan_item_count(&table(4, None)), 3);
        assert_eq!(scan_item_count(&table(1, None)), 1);
        assert_eq!(scan_item_count(&table(0, None)), 1);
    }

    #[test]
    fn missing_tbody_counts_one() {
        assert_eq!(scan_item_count("<p>No table here</p>"), 1);
        assert_eq!(scan_item_count(""), 1);
    }

    #[test]
    fn tracked_count_wins_over_heuristic() {
        assert_eq!(scan_item_count(&table(2, Some(2))), 2);
        assert_eq!(scan_item_count(&table(2, Some(0))), 1);
    }

    #[test]
    fn only_first_tbody_is_scanned() {
        let markup = format!("{}{}", table(3, None), table(10, None));
        assert_eq!(scan_item_count(&markup), 2);
    }

    #[test]
    fn three_items_give_467mm() {
        let g = PageGeometry::new(3, HeightPolicy::default());
        assert_eq!(g.page_height_mm, 467.0);
        assert_eq!(g.page_width_mm, 400.0);
        assert_eq!(g.margin_mm, 12.0);
        assert_eq!(g.to_page_rule(), "@page { size: 400mm 467mm; margin: 12mm; }");
    }

    #[test]
    fn custom_policy() {
        let policy = HeightPolicy {
            base_height_mm: 100.0,
            item_height_mm: 10.0,
        };
        assert_eq!(PageGeometry::new(0, policy).page_height_mm, 110.0);
    }

    #[test]
    fn render_overrides_document_page_rule() {
        let markup = format!(
            "<html><head><title>T</title><style>@page {{ size: A4; margin: 1mm }}</style></head>\
             <body>{}</body></html>",
            table(3, None)
        );
        let out = render(&markup, HeightPolicy::default()).unwrap();
        assert_eq!(&out.bytes[0..5], b"%PDF-");
        assert_eq!(out.size, out.bytes.len());
        assert_eq!(out.geometry.item_count, 2);
        assert_eq!(out.geometry.page_height_mm, 437.0);
        assert_eq!(out.pages, 1);
    }

    #[test]
    fn missing_source_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("nope.html");
        match convert_file(&missing, None, HeightPolicy::default(), None) {
            Err(InvoiceError::NotFound(p)) => assert_eq!(p, missing),
            other => panic!("expected NotFound, got {other:?}"),
        }
    }

    #[test]
    fn convert_writes_next_to_source() {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("invoice.html");
        fs::write(&src, table(2, None)).unwrap();
        let (written, out) = convert_file(&src, None, HeightPolicy::default(), None).unwrap();
        assert_eq!(written, dir.path().join("invoice.pdf"));
        assert_eq!(fs::read(&written).unwrap(), out.bytes);
    }
}
