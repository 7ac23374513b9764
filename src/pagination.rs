//! Pagination – places positioned boxes onto pages and freezes them into a
//! [`LayoutConfig`].
//!
//! Documents are normally sized so their whole content fits one page. When
//! it does not, content that crosses the bottom margin moves to a further
//! page of the same size and a warning is logged; oversized containers are
//! opened up so their rows can move individually.

use crate::fonts::FontManager;
use crate::layout::{BoxContent, PositionedBox};
use crate::layout_config::*;
use crate::style::{self, Border, Color};

/// Default page margins in points.
pub const PAGE_MARGIN_PT: f32 = 40.0;

/// Recursively expand any pure-container box whose height exceeds a single
/// page so its children can be split across pages individually.
fn flatten_for_pagination(boxes: &[PositionedBox], content_height: f32) -> Vec<&PositionedBox> {
    let mut result = Vec::new();
    for pbox in boxes {
        if pbox.height > content_height
            && matches!(pbox.content, BoxContent::None)
            && !pbox.children.is_empty()
        {
            result.extend(flatten_for_pagination(&pbox.children, content_height));
        } else {
            result.push(pbox);
        }
    }
    result
}

/// Convert positioned boxes into a paginated LayoutConfig.
pub fn paginate(
    boxes: &[PositionedBox],
    page_width: f32,
    page_height: f32,
    page_margin: f32,
    fonts: &FontManager,
) -> LayoutConfig {
    let mut config = LayoutConfig {
        title: String::new(),
        page_width_pt: page_width,
        page_height_pt: page_height,
        pages: Vec::new(),
    };

    let content_height = (page_height - 2.0 * page_margin).max(1.0);
    let fits = boxes
        .iter()
        .map(|b| b.y + b.height)
        .fold(0.0f32, f32::max)
        <= content_height;

    // Expand oversized wrapper divs so their children can paginate individually.
    let flat: Vec<&PositionedBox> = if fits {
        boxes.iter().collect()
    } else {
        flatten_for_pagination(boxes, content_height)
    };

    let mut current_page = PageLayout {
        page_index: 0,
        boxes: Vec::new(),
    };

    // Document-space y at which the current page begins.
    let mut page_start_doc_y = 0.0f32;

    for pbox in flat {
        let y_on_page = (pbox.y - page_start_doc_y).max(0.0);
        if y_on_page + pbox.height > content_height && !current_page.boxes.is_empty() {
            config.pages.push(std::mem::replace(
                &mut current_page,
                PageLayout {
                    page_index: config.pages.len() + 1,
                    boxes: Vec::new(),
                },
            ));
            page_start_doc_y = pbox.y;
            log::warn!(
                "Content exceeds the {:.1}pt page height; continuing on page {}",
                page_height,
                current_page.page_index + 1
            );
        }

        let y_on_page = (pbox.y - page_start_doc_y).max(0.0);
        current_page
            .boxes
            .push(build_layout_box(pbox, pbox.x, page_margin + y_on_page, fonts));
    }

    if !current_page.boxes.is_empty() || config.pages.is_empty() {
        config.pages.push(current_page);
    }
    config
}

fn rgba(c: Color) -> [f32; 4] {
    [c.r, c.g, c.b, c.a]
}

fn border_style(b: &Border) -> Option<BorderStyle> {
    b.is_visible().then(|| BorderStyle {
        width: b.width,
        color: rgba(b.color),
    })
}

/// Recursively build a LayoutBox tree where every box carries *page-absolute*
/// x/y coordinates (origin = top-left of the physical page).
///
/// A child's absolute y is `parent_abs_y + (child.y − parent.y)`, since
/// PositionedBox.y values are document-space absolutes.
fn build_layout_box(pbox: &PositionedBox, abs_x: f32, abs_y: f32, fonts: &FontManager) -> LayoutBox {
    let mut lb = LayoutBox::new(abs_x, abs_y, pbox.width, pbox.height);
    let s = &pbox.style;

    if !s.background_color.is_transparent() {
        lb.background_color = Some(rgba(s.background_color));
    }

    lb.borders = BoxBorders {
        top: border_style(&s.border.top),
        right: border_style(&s.border.right),
        bottom: border_style(&s.border.bottom),
        left: border_style(&s.border.left),
    };

    match &pbox.content {
        BoxContent::Text { lines } => {
            let bold = s.is_bold();
            let line_height = fonts.line_height_px(s.font_size, s.line_height);
            let text_lines = lines
                .iter()
                .enumerate()
                .map(|(i, line)| {
                    let width = fonts.measure_text_width(line, s.font_size, bold);
                    let slack = (pbox.width - width).max(0.0);
                    TextLine {
                        text: line.clone(),
                        x_offset: match s.text_align {
                            style::TextAlign::Left => 0.0,
                            style::TextAlign::Center => slack / 2.0,
                            style::TextAlign::Right => slack,
                        },
                        y_offset: i as f32 * line_height,
                        width,
                    }
                })
                .collect();

            lb.text = Some(TextContent {
                lines: text_lines,
                font_size: s.font_size,
                bold,
                italic: s.font_style == style::FontStyle::Italic,
                color: rgba(s.color),
                line_height,
                baseline: fonts.baseline_offset(s.font_size, s.line_height, bold),
                underline: s.text_decoration == style::TextDecoration::Underline,
            });
        }
        BoxContent::Image { src } => {
            lb.image = Some(ImageContent {
                src: src.clone(),
                width: pbox.width,
                height: pbox.height,
            });
        }
        BoxContent::None => {}
    }

    for child in &pbox.children {
        let child_abs_y = abs_y + (child.y - pbox.y);
        lb.children
            .push(build_layout_box(child, child.x, child_abs_y, fonts));
    }

    lb
}
