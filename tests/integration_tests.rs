//! Integration tests for the invoice pipeline.
//!
//! These tests validate:
//! - Composed documents carry the computed amounts in the fixed layout
//! - The page-fitting renderer sizes the page from the item count
//! - PDF output exists, has a valid header and is deterministic
//! - File entry points report missing sources

use sha2::{Digest, Sha256};

use invoice_forge::dom::{find_first, parse_html, DomNode, Tag};
use invoice_forge::error::InvoiceError;
use invoice_forge::fit::{self, scan_item_count, HeightPolicy, PageGeometry};
use invoice_forge::layout_config::{LayoutBox, LayoutConfig};
use invoice_forge::pipeline::{compute_layout_config, generate_pdf, PipelineConfig};
use invoice_forge::render::render_pdf;
use invoice_forge::{compose, InvoiceRecord, OrganizationProfile, RenderedDocument};

// =====================================================================
// Helper
// =====================================================================

fn sample_record() -> InvoiceRecord {
    InvoiceRecord::from_json(include_str!("../samples/invoice_data.json")).unwrap()
}

fn sample_profile() -> OrganizationProfile {
    OrganizationProfile::from_json(include_str!("../samples/organization.json")).unwrap()
}

fn sample_document() -> RenderedDocument {
    compose(&sample_record(), &sample_profile()).unwrap()
}

fn assert_valid_pdf(bytes: &[u8]) {
    assert!(bytes.len() > 100, "PDF too small: {} bytes", bytes.len());
    assert_eq!(&bytes[0..5], b"%PDF-", "Missing PDF header");
}

fn cell_texts(markup: &str) -> Vec<Vec<String>> {
    fn text_of(nodes: &[DomNode], out: &mut String) {
        for n in nodes {
            match n {
                DomNode::Text(t) => out.push_str(t.trim()),
                DomNode::Element(e) => text_of(&e.children, out),
            }
        }
    }
    let dom = parse_html(markup);
    let tbody = find_first(&dom, &Tag::Tbody).expect("items table");
    tbody
        .element_children()
        .filter(|tr| tr.tag == Tag::Tr)
        .map(|tr| {
            tr.element_children()
                .map(|td| {
                    let mut s = String::new();
                    text_of(&td.children, &mut s);
                    s
                })
                .collect()
        })
        .collect()
}

fn all_text(config: &LayoutConfig) -> Vec<String> {
    let mut out = Vec::new();
    for page in &config.pages {
        for b in &page.boxes {
            b.walk(&mut |lb: &LayoutBox| {
                if let Some(t) = &lb.text {
                    out.extend(t.lines.iter().map(|l| l.text.clone()));
                }
            });
        }
    }
    out
}

// =====================================================================
// Compositor
// =====================================================================

#[test]
fn two_item_scenario_amounts() {
    let doc = sample_document();
    let rows = cell_texts(doc.markup());
    assert_eq!(rows.len(), 2);

    let first = &rows[0];
    assert_eq!(first.len(), 12);
    assert_eq!(first[0], "1");
    assert_eq!(first[2], "2.000");
    assert_eq!(first[4], "5,000.00");
    assert_eq!(first[5], "10.00");
    assert_eq!(first[6], "9,000.00");
    assert_eq!(first[7], "5");
    assert_eq!(first[8], "450.00");
    assert_eq!(first[9], "9,450.00");
    assert_eq!(first[10], "3.672500");
    assert_eq!(first[11], "2,573.18");

    let second = &rows[1];
    assert_eq!(second[6], "3,000.00");
    assert_eq!(second[8], "150.00");
    assert_eq!(second[9], "3,150.00");
    assert_eq!(second[11], "857.73");
}

#[test]
fn totals_section_lists_five_totals() {
    let doc = sample_document();
    let html = doc.markup();
    for (label, value) in [
        ("Total Discount, AED:", "900.00"),
        ("Sub Total, AED:", "12,000.00"),
        ("Total VAT, AED:", "600.00"),
        ("Total, AED:", "12,600.00"),
        ("Total, USD:", "3,430.91"),
    ] {
        let needle = format!("<td>{label}</td><td>{value}</td>");
        assert!(html.contains(&needle), "missing {needle}");
    }
    assert!((doc.totals().total_aed - 12_600.0).abs() < 1e-6);
}

#[test]
fn compose_twice_is_byte_identical() {
    let a = Sha256::digest(sample_document().markup().as_bytes());
    let b = Sha256::digest(sample_document().markup().as_bytes());
    assert_eq!(a, b);
}

#[test]
fn invalid_record_produces_no_document() {
    let json = include_str!("../samples/invoice_data.json").replace("\"uom\": \"Pcs\",", "");
    match InvoiceRecord::from_json(&json) {
        Err(InvoiceError::Validation(e)) => assert_eq!(e.field, "items[0].uom"),
        other => panic!("expected validation error, got {other:?}"),
    }
}

// =====================================================================
// Page fitting
// =====================================================================

#[test]
fn composed_markup_reports_its_item_count() {
    let doc = sample_document();
    assert_eq!(scan_item_count(doc.markup()), 2);
}

#[test]
fn heuristic_counts_rows_minus_one() {
    let rows: String = (0..4).map(|_| "<tr><td>x</td></tr>").collect();
    assert_eq!(scan_item_count(&format!("<table><tbody>{rows}</tbody></table>")), 3);
    assert_eq!(scan_item_count("<div>no table</div>"), 1);
}

#[test]
fn three_items_make_a_467mm_page() {
    assert_eq!(
        PageGeometry::new(3, HeightPolicy::default()).page_height_mm,
        467.0
    );
}

#[test]
fn render_document_fits_one_page() {
    let doc = sample_document();
    let out = fit::render_document(&doc, HeightPolicy::default()).unwrap();
    assert_valid_pdf(&out.bytes);
    assert_eq!(out.geometry.item_count, 2);
    assert_eq!(out.geometry.page_height_mm, 437.0);
    assert_eq!(out.geometry.page_width_mm, 400.0);
    assert_eq!(out.pages, 1);
    assert_eq!(out.size, out.bytes.len());
}

#[test]
fn fitted_layout_contains_invoice_text() {
    let doc = sample_document();
    let geometry = PageGeometry::new(doc.item_count(), HeightPolicy::default());
    let config = PipelineConfig::default().with_stylesheet(geometry.to_page_rule());
    let layout = compute_layout_config(doc.markup(), &config).unwrap();

    assert!((layout.page_height_mm() - 437.0).abs() < 0.01);
    assert!((layout.page_width_mm() - 400.0).abs() < 0.01);

    let text = all_text(&layout);
    for expected in ["TAX INVOICE", "Issued By:", "Bank Details:", "12,600.00", "Received By"] {
        assert!(
            text.iter().any(|t| t.contains(expected)),
            "'{expected}' not laid out"
        );
    }
    // The address break becomes two lines.
    assert!(text.iter().any(|t| t == "123 Test Street"));
    assert!(text.iter().any(|t| t == "Test City, TC 12345"));
}

#[test]
fn render_output_is_deterministic() {
    let doc = sample_document();
    let a = fit::render_document(&doc, HeightPolicy::default()).unwrap();
    let b = fit::render_document(&doc, HeightPolicy::default()).unwrap();
    assert_eq!(a.size, b.size);
    assert_eq!(a.geometry, b.geometry);
}

#[test]
fn custom_height_policy_changes_the_page() {
    let doc = sample_document();
    let policy = HeightPolicy {
        base_height_mm: 300.0,
        item_height_mm: 50.0,
    };
    let out = fit::render_document(&doc, policy).unwrap();
    assert_eq!(out.geometry.page_height_mm, 400.0);
}

// =====================================================================
// Engine
// =====================================================================

#[test]
fn layout_config_json_roundtrip() {
    let (_, layout) = generate_pdf("<h1>Invoice</h1><p>Body</p>", &PipelineConfig::default()).unwrap();
    let json = layout.to_json().unwrap();
    let back = LayoutConfig::from_json(&json).unwrap();
    assert_eq!(back, layout);
    assert_valid_pdf(&render_pdf(&back).unwrap());
}

#[test]
fn layout_boxes_stay_within_page_width() {
    let doc = sample_document();
    let geometry = PageGeometry::new(doc.item_count(), HeightPolicy::default());
    let config = PipelineConfig::default().with_stylesheet(geometry.to_page_rule());
    let layout = compute_layout_config(doc.markup(), &config).unwrap();
    for page in &layout.pages {
        for b in &page.boxes {
            b.walk(&mut |lb| {
                assert!(lb.width >= 0.0 && lb.height >= 0.0);
                assert!(
                    lb.x + lb.width <= layout.page_width_pt + 0.5,
                    "box overflows page: x={} w={}",
                    lb.x,
                    lb.width
                );
            });
        }
    }
}

// =====================================================================
// File entry points
// =====================================================================

#[test]
fn convert_file_writes_pdf_with_same_stem() {
    let dir = tempfile::tempdir().unwrap();
    let html = dir.path().join("00TI25-0001.html");
    std::fs::write(&html, sample_document().markup()).unwrap();

    let (written, out) = fit::convert_file(&html, None, HeightPolicy::default(), None).unwrap();
    assert_eq!(written, dir.path().join("00TI25-0001.pdf"));
    assert_valid_pdf(&std::fs::read(&written).unwrap());
    assert_eq!(out.geometry.item_count, 2);
}

#[test]
fn convert_file_missing_source_is_not_found() {
    let dir = tempfile::tempdir().unwrap();
    let err = fit::convert_file(&dir.path().join("missing.html"), None, HeightPolicy::default(), None)
        .unwrap_err();
    assert!(matches!(err, InvoiceError::NotFound(_)));
}
