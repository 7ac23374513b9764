//! Layout engine – uses Taffy to compute flexbox / grid layout from a styled
//! DOM tree, then converts the result into a tree of positioned boxes.
//!
//! HTML flow is mapped onto Taffy as follows:
//! - block elements become flex columns;
//! - a run of inline content becomes one wrapped text leaf, or a row of
//!   leaves when differently styled spans sit side by side;
//! - tables become flex columns of flex rows, with column widths taken from
//!   the first row's cells;
//! - `display: grid` maps to Taffy grid with the declared column tracks.

use std::collections::HashMap;

use taffy::prelude::*;

use crate::error::Result;
use crate::fonts::{wrap_text, FontManager};
use crate::style::{self, ComputedStyle, StyledNode, PT_PER_PX};

// ---------------------------------------------------------------------------
// Intermediate layout tree (pre-pagination)
// ---------------------------------------------------------------------------

/// A positioned box in document coordinates (before page splitting).
#[derive(Debug, Clone)]
pub struct PositionedBox {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
    pub style: ComputedStyle,
    pub content: BoxContent,
    pub children: Vec<PositionedBox>,
}

#[derive(Debug, Clone)]
pub enum BoxContent {
    None,
    Text { lines: Vec<String> },
    Image { src: String },
}

/// Column sizing for the table currently being built.
#[derive(Debug, Clone)]
struct TableColumns {
    dims: Vec<style::Dimension>,
    widths: Vec<f32>,
}

/// One run of uniformly styled inline text.
#[derive(Debug)]
struct Segment {
    text: String,
    style: ComputedStyle,
    fixed_width: Option<f32>,
    space_before: bool,
}

// ---------------------------------------------------------------------------
// Build Taffy tree from styled nodes
// ---------------------------------------------------------------------------

struct LayoutBuilder<'a> {
    taffy: TaffyTree<()>,
    fonts: &'a FontManager,
    node_styles: HashMap<NodeId, ComputedStyle>,
    node_content: HashMap<NodeId, BoxContent>,
    tables: Vec<TableColumns>,
    pending_column: Option<usize>,
}

impl<'a> LayoutBuilder<'a> {
    fn new(fonts: &'a FontManager) -> Self {
        // Positions are fractional points.
        let mut taffy = TaffyTree::new();
        taffy.disable_rounding();
        Self {
            taffy,
            fonts,
            node_styles: HashMap::new(),
            node_content: HashMap::new(),
            tables: Vec::new(),
            pending_column: None,
        }
    }

    fn is_inline(node: &StyledNode) -> bool {
        match node {
            StyledNode::Text { .. } => true,
            StyledNode::Element {
                tag,
                style,
                children,
                ..
            } => {
                *tag != crate::dom::Tag::Img
                    && style.position != style::Position::Absolute
                    && matches!(
                        style.display,
                        style::Display::Inline | style::Display::InlineBlock
                    )
                    && children.iter().all(Self::is_inline)
            }
        }
    }

    /// Text of an inline subtree with `<br>` turned into `'\n'` and source
    /// line breaks into spaces.
    fn collect_inline_text(node: &StyledNode, out: &mut String) {
        match node {
            StyledNode::Text { text, .. } => {
                out.extend(text.chars().map(|c| if c.is_whitespace() { ' ' } else { c }))
            }
            StyledNode::Element { tag, children, .. } => {
                if *tag == crate::dom::Tag::Br {
                    out.push('\n');
                }
                for child in children {
                    Self::collect_inline_text(child, out);
                }
            }
        }
    }

    fn build_node(&mut self, styled: &StyledNode, parent_width: f32) -> Result<NodeId> {
        match styled {
            StyledNode::Text { style, .. } => {
                let mut raw = String::new();
                Self::collect_inline_text(styled, &mut raw);
                self.build_text_leaf(&collapse_whitespace(&raw), style, parent_width, None)
            }
            StyledNode::Element {
                tag,
                style,
                children,
                attrs,
            } => self.build_element_node(tag, style, children, attrs, parent_width),
        }
    }

    fn build_text_leaf(
        &mut self,
        text: &str,
        style: &ComputedStyle,
        max_width: f32,
        fixed_width: Option<f32>,
    ) -> Result<NodeId> {
        let bold = style.is_bold();
        let font_size = style.font_size;
        let line_height = self.fonts.line_height_px(font_size, style.line_height);

        let wrap_width = if style.nowrap {
            f32::INFINITY
        } else {
            max_width
        };
        let lines = wrap_text(text, font_size, bold, wrap_width, self.fonts);

        let text_width = lines
            .iter()
            .map(|l| self.fonts.measure_text_width(l, font_size, bold))
            .fold(0.0f32, f32::max);
        let width = fixed_width.map_or(text_width, |w| w.max(text_width));
        let text_height = lines.len() as f32 * line_height;

        let taffy_style = Style {
            size: Size {
                width: Dimension::Length(width),
                height: Dimension::Length(text_height),
            },
            flex_shrink: 0.0,
            ..Default::default()
        };

        let node = self.taffy.new_leaf(taffy_style)?;
        // Text carries inherited properties only; the enclosing element owns
        // borders, background and spacing.
        self.node_styles
            .insert(node, ComputedStyle::inherit(style));
        self.node_content.insert(node, BoxContent::Text { lines });
        Ok(node)
    }

    /// Split inline children into uniformly styled segments.
    fn inline_segments(children: &[StyledNode], block_style: &ComputedStyle) -> Vec<Segment> {
        let mut raw_segments: Vec<(String, ComputedStyle, Option<f32>)> = Vec::new();
        let mut run = String::new();

        for child in children {
            match child {
                StyledNode::Element {
                    tag, style, children: inner, ..
                } if *tag != crate::dom::Tag::Br => {
                    if !run.is_empty() {
                        raw_segments.push((std::mem::take(&mut run), block_style.clone(), None));
                    }
                    let mut text = String::new();
                    for c in inner {
                        Self::collect_inline_text(c, &mut text);
                    }
                    let fixed = match style.width {
                        style::Dimension::Pt(w) => Some(w),
                        _ => None,
                    };
                    raw_segments.push((text, style.clone(), fixed));
                }
                other => Self::collect_inline_text(other, &mut run),
            }
        }
        if !run.is_empty() {
            raw_segments.push((run, block_style.clone(), None));
        }

        let mut segments: Vec<Segment> = Vec::new();
        let mut trailing_space = false;
        for (raw, style, fixed_width) in raw_segments {
            let text = collapse_whitespace(&raw);
            let leading = raw.starts_with(' ');
            let has_content = !text.trim().is_empty() || fixed_width.is_some();
            if has_content {
                segments.push(Segment {
                    text,
                    style,
                    fixed_width,
                    space_before: !segments.is_empty() && (leading || trailing_space),
                });
            }
            trailing_space = raw.ends_with(' ') || (!has_content && leading);
        }
        segments
    }

    /// Lay out an inline run as a single leaf or a row of leaves.
    fn build_inline_content(
        &mut self,
        children: &[StyledNode],
        block_style: &ComputedStyle,
        width: f32,
    ) -> Result<Option<NodeId>> {
        let segments = Self::inline_segments(children, block_style);
        match segments.len() {
            0 => Ok(None),
            1 => {
                let seg = &segments[0];
                self.build_text_leaf(&seg.text, &seg.style, width, seg.fixed_width)
                    .map(Some)
            }
            n => {
                let mut leaves = Vec::with_capacity(n);
                let mut remaining = width;
                for (i, seg) in segments.iter().enumerate() {
                    let space = if seg.space_before {
                        self.fonts
                            .measure_text_width(" ", seg.style.font_size, seg.style.is_bold())
                    } else {
                        0.0
                    };
                    let wrap_at = if i + 1 == n {
                        (remaining - space).max(width * 0.25)
                    } else {
                        f32::INFINITY
                    };
                    let leaf = self.build_text_leaf(&seg.text, &seg.style, wrap_at, seg.fixed_width)?;
                    if space > 0.0 {
                        let mut s = self.taffy.style(leaf)?.clone();
                        s.margin.left = LengthPercentageAuto::Length(space);
                        self.taffy.set_style(leaf, s)?;
                    }
                    let leaf_width = match self.taffy.style(leaf)?.size.width {
                        Dimension::Length(w) => w,
                        _ => 0.0,
                    };
                    remaining -= leaf_width + space;
                    leaves.push(leaf);
                }
                let row = self.taffy.new_with_children(
                    Style {
                        display: taffy::Display::Flex,
                        flex_direction: taffy::FlexDirection::Row,
                        align_items: Some(taffy::AlignItems::Start),
                        flex_shrink: 0.0,
                        ..Default::default()
                    },
                    &leaves,
                )?;
                Ok(Some(row))
            }
        }
    }

    fn build_element_node(
        &mut self,
        tag: &crate::dom::Tag,
        style: &ComputedStyle,
        children: &[StyledNode],
        attrs: &HashMap<String, String>,
        parent_width: f32,
    ) -> Result<NodeId> {
        use crate::dom::Tag;

        let column = self.pending_column.take();

        if *tag == Tag::Img {
            return self.build_image(style, attrs, parent_width);
        }

        // Compute the width available for children
        let margin_x = style.margin.left.resolve(parent_width).unwrap_or(0.0)
            + style.margin.right.resolve(parent_width).unwrap_or(0.0);
        let my_width = match (tag, column) {
            (Tag::Td | Tag::Th, Some(i)) => self
                .tables
                .last()
                .and_then(|t| t.widths.get(i).copied())
                .unwrap_or(parent_width),
            _ => style
                .width
                .resolve(parent_width)
                .unwrap_or(parent_width - margin_x),
        };
        let inner_width = (my_width
            - style.padding.left
            - style.padding.right
            - style.border.left.width
            - style.border.right.width)
            .max(1.0);

        let all_inline = !children.is_empty() && children.iter().all(Self::is_inline);

        if *tag == Tag::Table {
            let columns = self.table_columns(children, inner_width);
            self.tables.push(columns);
        }

        let mut child_nodes = Vec::new();
        if all_inline {
            if let Some(node) = self.build_inline_content(children, style, inner_width)? {
                child_nodes.push(node);
            }
        } else {
            let child_widths = self.child_widths(tag, style, children, inner_width);
            let mut run: Vec<StyledNode> = Vec::new();
            let mut cell_index = 0usize;
            for (i, child) in children.iter().enumerate() {
                if Self::is_inline(child) {
                    run.push(child.clone());
                    continue;
                }
                if !run.is_empty() {
                    if let Some(node) =
                        self.build_inline_content(&std::mem::take(&mut run), style, inner_width)?
                    {
                        child_nodes.push(node);
                    }
                }
                if *tag == Tag::Tr {
                    self.pending_column = Some(cell_index);
                    cell_index += 1;
                }
                let width = child_widths.get(i).copied().unwrap_or(inner_width);
                child_nodes.push(self.build_node(child, width)?);
            }
            if !run.is_empty() {
                if let Some(node) = self.build_inline_content(&run, style, inner_width)? {
                    child_nodes.push(node);
                }
            }
        }

        let column_dim = match (tag, column) {
            (Tag::Td | Tag::Th, Some(i)) => self.tables.last().and_then(|t| t.dims.get(i).copied()),
            _ => None,
        };
        if *tag == Tag::Table {
            self.tables.pop();
        }

        let mut taffy_style = self.computed_to_taffy(style, tag, column_dim);
        if all_inline {
            taffy_style.align_items = Some(match style.text_align {
                style::TextAlign::Left => taffy::AlignItems::Start,
                style::TextAlign::Center => taffy::AlignItems::Center,
                style::TextAlign::Right => taffy::AlignItems::End,
            });
        }
        let node = self.taffy.new_with_children(taffy_style, &child_nodes)?;
        self.node_styles.insert(node, style.clone());
        Ok(node)
    }

    /// Build-time width estimate for each child, used to wrap text before
    /// Taffy runs.
    fn child_widths(
        &self,
        tag: &crate::dom::Tag,
        style: &ComputedStyle,
        children: &[StyledNode],
        inner_width: f32,
    ) -> Vec<f32> {
        let in_flow: Vec<usize> = children
            .iter()
            .enumerate()
            .filter(|(_, c)| {
                matches!(c, StyledNode::Element { .. })
                    && c.style().position != style::Position::Absolute
            })
            .map(|(i, _)| i)
            .collect();
        let mut widths = vec![inner_width; children.len()];

        if *tag == crate::dom::Tag::Tr {
            if let Some(table) = self.tables.last() {
                for (cell, &i) in in_flow.iter().enumerate() {
                    if let Some(w) = table.widths.get(cell) {
                        widths[i] = *w;
                    }
                }
            }
        } else if style.display == style::Display::Grid {
            let tracks = grid_track_widths(&style.grid_template_columns, inner_width, style.gap);
            for (cell, &i) in in_flow.iter().enumerate() {
                widths[i] = tracks[cell % tracks.len()];
            }
        } else if style.display == style::Display::Flex
            && style.flex_direction == style::FlexDirection::Row
        {
            let count = in_flow.len().max(1);
            let gap_total = style.gap * count.saturating_sub(1) as f32;
            let each = ((inner_width - gap_total) / count as f32).max(1.0);
            for &i in &in_flow {
                widths[i] = each;
            }
        }
        widths
    }

    /// Column dimensions from the cells of the first row.
    fn table_columns(&self, children: &[StyledNode], inner_width: f32) -> TableColumns {
        fn first_row(nodes: &[StyledNode]) -> Option<&[StyledNode]> {
            for node in nodes {
                if let StyledNode::Element { tag, children, .. } = node {
                    match tag {
                        crate::dom::Tag::Tr => return Some(children),
                        crate::dom::Tag::Thead | crate::dom::Tag::Tbody => {
                            if let Some(row) = first_row(children) {
                                return Some(row);
                            }
                        }
                        _ => {}
                    }
                }
            }
            None
        }

        let dims: Vec<style::Dimension> = first_row(children)
            .unwrap_or(&[])
            .iter()
            .filter(|c| matches!(c, StyledNode::Element { .. }))
            .map(|c| c.style().width)
            .collect();

        let fixed: f32 = dims.iter().filter_map(|d| d.resolve(inner_width)).sum();
        let auto_count = dims
            .iter()
            .filter(|d| matches!(d, style::Dimension::Auto))
            .count();
        let auto_width = if auto_count > 0 {
            ((inner_width - fixed) / auto_count as f32).max(1.0)
        } else {
            0.0
        };
        let widths = dims
            .iter()
            .map(|d| d.resolve(inner_width).unwrap_or(auto_width))
            .collect();
        TableColumns { dims, widths }
    }

    fn build_image(
        &mut self,
        style: &ComputedStyle,
        attrs: &HashMap<String, String>,
        parent_width: f32,
    ) -> Result<NodeId> {
        let src = attrs.get("src").map(String::as_str).unwrap_or("");
        match image_size(src, style, parent_width) {
            Some((w, h)) => {
                let mut taffy_style = self.computed_to_taffy(style, &crate::dom::Tag::Img, None);
                taffy_style.size = Size {
                    width: Dimension::Length(w),
                    height: Dimension::Length(h),
                };
                taffy_style.flex_shrink = 0.0;
                let node = self.taffy.new_leaf(taffy_style)?;
                self.node_styles.insert(node, style.clone());
                self.node_content.insert(
                    node,
                    BoxContent::Image {
                        src: src.to_string(),
                    },
                );
                Ok(node)
            }
            None => {
                // Formats that cannot be embedded (SVG, remote URLs) show
                // their alt text instead.
                let alt = attrs.get("alt").map(String::as_str).unwrap_or("").trim();
                log::debug!("Image not embeddable, using alt text {alt:?}");
                if alt.is_empty() {
                    Ok(self.taffy.new_leaf(Style::default())?)
                } else {
                    let mut text_style = ComputedStyle::inherit(style);
                    text_style.font_weight = style::FontWeight::Bold;
                    text_style.color = style.color;
                    self.build_text_leaf(alt, &text_style, parent_width, None)
                }
            }
        }
    }

    fn computed_to_taffy(
        &self,
        s: &ComputedStyle,
        tag: &crate::dom::Tag,
        column: Option<style::Dimension>,
    ) -> Style {
        use crate::dom::Tag;

        let mut ts = Style {
            margin: Rect {
                top: lpa(s.margin.top),
                right: lpa(s.margin.right),
                bottom: lpa(s.margin.bottom),
                left: lpa(s.margin.left),
            },
            padding: Rect {
                top: LengthPercentage::Length(s.padding.top),
                right: LengthPercentage::Length(s.padding.right),
                bottom: LengthPercentage::Length(s.padding.bottom),
                left: LengthPercentage::Length(s.padding.left),
            },
            border: Rect {
                top: LengthPercentage::Length(s.border.top.width),
                right: LengthPercentage::Length(s.border.right.width),
                bottom: LengthPercentage::Length(s.border.bottom.width),
                left: LengthPercentage::Length(s.border.left.width),
            },
            size: Size {
                width: self.dim_to_taffy(s.width),
                height: self.dim_to_taffy(s.height),
            },
            min_size: Size {
                width: if s.flex_shrink > 0.0 || s.flex_grow > 0.0 {
                    Dimension::Length(0.0)
                } else {
                    self.dim_to_taffy(s.min_width)
                },
                height: self.dim_to_taffy(s.min_height),
            },
            max_size: Size {
                width: self.dim_to_taffy(s.max_width),
                height: Dimension::Auto,
            },
            flex_grow: s.flex_grow,
            flex_shrink: s.flex_shrink,
            gap: Size {
                width: LengthPercentage::Length(s.gap),
                height: LengthPercentage::Length(s.gap),
            },
            ..Default::default()
        };

        if s.position == style::Position::Absolute {
            ts.position = taffy::Position::Absolute;
            ts.inset = Rect {
                top: lpa(s.inset.top),
                right: lpa(s.inset.right),
                bottom: lpa(s.inset.bottom),
                left: lpa(s.inset.left),
            };
        }

        // -----------------------------------------------------------------
        // HTML table model: always use flex regardless of computed display.
        // -----------------------------------------------------------------
        match tag {
            Tag::Table | Tag::Thead | Tag::Tbody => {
                ts.display = taffy::Display::Flex;
                ts.flex_direction = taffy::FlexDirection::Column;
                ts.min_size.width = Dimension::Length(0.0);
                return ts;
            }
            Tag::Tr => {
                ts.display = taffy::Display::Flex;
                ts.flex_direction = taffy::FlexDirection::Row;
                ts.align_items = Some(taffy::AlignItems::Stretch);
                ts.size.width = Dimension::Percent(1.0);
                ts.min_size.width = Dimension::Length(0.0);
                return ts;
            }
            Tag::Td | Tag::Th => {
                ts.display = taffy::Display::Flex;
                ts.flex_direction = taffy::FlexDirection::Column;
                ts.size.width = Dimension::Auto;
                ts.min_size.width = Dimension::Length(0.0);
                match column.unwrap_or(style::Dimension::Auto) {
                    style::Dimension::Pt(w) => {
                        ts.flex_basis = Dimension::Length(w);
                        ts.flex_grow = 0.0;
                        ts.flex_shrink = 0.0;
                    }
                    style::Dimension::Percent(p) => {
                        ts.flex_basis = Dimension::Percent(p / 100.0);
                        ts.flex_grow = 0.0;
                        ts.flex_shrink = 0.0;
                    }
                    style::Dimension::Auto => {
                        ts.flex_basis = Dimension::Length(0.0); // share the rest equally
                        ts.flex_grow = 1.0;
                        ts.flex_shrink = 1.0;
                    }
                }
                return ts;
            }
            _ => {}
        }

        // Display / layout mode
        match s.display {
            style::Display::Flex => {
                ts.display = taffy::Display::Flex;
                ts.flex_direction = match s.flex_direction {
                    style::FlexDirection::Row => taffy::FlexDirection::Row,
                    style::FlexDirection::Column => taffy::FlexDirection::Column,
                };
                ts.flex_wrap = match s.flex_wrap {
                    style::FlexWrap::NoWrap => taffy::FlexWrap::NoWrap,
                    style::FlexWrap::Wrap => taffy::FlexWrap::Wrap,
                };
                ts.justify_content = Some(match s.justify_content {
                    style::JustifyContent::Start => taffy::JustifyContent::Start,
                    style::JustifyContent::End => taffy::JustifyContent::End,
                    style::JustifyContent::Center => taffy::JustifyContent::Center,
                    style::JustifyContent::SpaceBetween => taffy::JustifyContent::SpaceBetween,
                    style::JustifyContent::SpaceAround => taffy::JustifyContent::SpaceAround,
                    style::JustifyContent::SpaceEvenly => taffy::JustifyContent::SpaceEvenly,
                });
                ts.align_items = Some(align_items(s.align_items));
            }
            style::Display::Grid => {
                ts.display = taffy::Display::Grid;
                let tracks = if s.grid_template_columns.is_empty() {
                    vec![style::GridTrack::Fr(1.0)]
                } else {
                    s.grid_template_columns.clone()
                };
                ts.grid_template_columns = tracks
                    .iter()
                    .map(|t| match *t {
                        style::GridTrack::Pt(v) => TrackSizingFunction::from_length(v),
                        style::GridTrack::Percent(p) => TrackSizingFunction::from_percent(p / 100.0),
                        style::GridTrack::Fr(f) => TrackSizingFunction::from_flex(f),
                        style::GridTrack::Auto => TrackSizingFunction::AUTO,
                    })
                    .collect();
                if s.align_items != style::AlignItems::Stretch {
                    ts.align_items = Some(align_items(s.align_items));
                }
            }
            style::Display::Block | style::Display::InlineBlock | style::Display::Inline => {
                // Use flex column for block-level elements (vertical stacking)
                ts.display = taffy::Display::Flex;
                ts.flex_direction = taffy::FlexDirection::Column;
            }
            style::Display::None => {
                ts.display = taffy::Display::None;
            }
        }

        ts
    }

    fn dim_to_taffy(&self, d: style::Dimension) -> Dimension {
        match d {
            style::Dimension::Auto => Dimension::Auto,
            style::Dimension::Pt(v) => Dimension::Length(v),
            style::Dimension::Percent(v) => Dimension::Percent(v / 100.0),
        }
    }

    /// Extract positioned boxes after layout computation.
    fn extract(&self, node: NodeId, offset_x: f32, offset_y: f32) -> Result<PositionedBox> {
        let layout = self.taffy.layout(node)?;
        let style = self.node_styles.get(&node).cloned().unwrap_or_default();
        let content = self
            .node_content
            .get(&node)
            .cloned()
            .unwrap_or(BoxContent::None);

        let x = offset_x + layout.location.x;
        let y = offset_y + layout.location.y;

        let children = self
            .taffy
            .children(node)?
            .iter()
            .map(|&child| self.extract(child, x, y))
            .collect::<Result<Vec<_>>>()?;

        Ok(PositionedBox {
            x,
            y,
            width: layout.size.width,
            height: layout.size.height,
            style,
            content,
            children,
        })
    }
}

fn lpa(d: style::Dimension) -> LengthPercentageAuto {
    match d {
        style::Dimension::Auto => LengthPercentageAuto::Auto,
        style::Dimension::Pt(v) => LengthPercentageAuto::Length(v),
        style::Dimension::Percent(p) => LengthPercentageAuto::Percent(p / 100.0),
    }
}

fn align_items(a: style::AlignItems) -> taffy::AlignItems {
    match a {
        style::AlignItems::Start => taffy::AlignItems::Start,
        style::AlignItems::End => taffy::AlignItems::End,
        style::AlignItems::Center => taffy::AlignItems::Center,
        style::AlignItems::Stretch => taffy::AlignItems::Stretch,
    }
}

fn collapse_whitespace(raw: &str) -> String {
    raw.split('\n')
        .map(|line| line.split_whitespace().collect::<Vec<_>>().join(" "))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Width estimate per grid track. `auto` tracks are unconstrained at build
/// time and take no share of the flexible space.
fn grid_track_widths(tracks: &[style::GridTrack], inner_width: f32, gap: f32) -> Vec<f32> {
    if tracks.is_empty() {
        return vec![inner_width];
    }
    let available = inner_width - gap * (tracks.len() - 1) as f32;
    let fixed: f32 = tracks
        .iter()
        .map(|t| match *t {
            style::GridTrack::Pt(v) => v,
            style::GridTrack::Percent(p) => inner_width * p / 100.0,
            _ => 0.0,
        })
        .sum();
    let fr_total: f32 = tracks
        .iter()
        .map(|t| match *t {
            style::GridTrack::Fr(f) => f,
            _ => 0.0,
        })
        .sum();
    let flexible = (available - fixed).max(0.0);
    tracks
        .iter()
        .map(|t| match *t {
            style::GridTrack::Pt(v) => v,
            style::GridTrack::Percent(p) => inner_width * p / 100.0,
            style::GridTrack::Fr(f) if fr_total > 0.0 => (flexible * f / fr_total).max(1.0),
            _ => inner_width,
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Image intrinsic-size helper
// ---------------------------------------------------------------------------

/// Decode a raster data URI (PNG/JPEG, base64)
pub(crate) fn decode_data_uri(src: &str) -> Option<Vec<u8>> {
    use base64::{engine::general_purpose::STANDARD as BASE64_STD, Engine as _};

    let rest = src.strip_prefix("data:")?;
    let (header, data) = rest.split_once(',')?;
    if !header.contains(";base64") {
        return None;
    }
    BASE64_STD.decode(data.trim()).ok()
}

/// Rendered size of an `<img>` in points, or `None` if `src` is not an
/// embeddable raster image. Missing dimensions follow the intrinsic aspect
/// ratio; with neither given, one image pixel is one CSS pixel.
fn image_size(src: &str, style: &ComputedStyle, parent_width: f32) -> Option<(f32, f32)> {
    let bytes = decode_data_uri(src)?;
    let img = ::image::load_from_memory(&bytes).ok()?;
    let (px_w, px_h) = (img.width() as f32, img.height() as f32);
    if px_w == 0.0 || px_h == 0.0 {
        return None;
    }
    let aspect = px_w / px_h;

    let known_w = style.width.resolve(parent_width);
    let known_h = match style.height {
        style::Dimension::Pt(v) => Some(v),
        _ => None,
    };

    Some(match (known_w, known_h) {
        (Some(w), Some(h)) => (w, h),
        (Some(w), None) => (w, (w / aspect).max(1.0)),
        (None, Some(h)) => ((h * aspect).max(1.0), h),
        (None, None) => (px_w * PT_PER_PX, px_h * PT_PER_PX),
    })
}

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

/// Compute layout for a styled tree, returning the top-level positioned
/// boxes in document coordinates. `x` already includes `page_margin`; `y`
/// starts at zero at the top of the content area.
pub fn compute_layout(
    styled_nodes: &[StyledNode],
    page_width: f32,
    page_margin: f32,
    fonts: &FontManager,
) -> Result<Vec<PositionedBox>> {
    let content_width = (page_width - 2.0 * page_margin).max(1.0);
    let mut builder = LayoutBuilder::new(fonts);

    // Wrap all nodes in a root flex-column container
    let mut child_ids = Vec::new();
    for node in styled_nodes {
        child_ids.push(builder.build_node(node, content_width)?);
    }

    let root_style = Style {
        display: taffy::Display::Flex,
        flex_direction: taffy::FlexDirection::Column,
        size: Size {
            width: Dimension::Length(content_width),
            height: Dimension::Auto,
        },
        ..Default::default()
    };

    let root = builder.taffy.new_with_children(root_style, &child_ids)?;

    builder.taffy.compute_layout(
        root,
        Size {
            width: AvailableSpace::Definite(content_width),
            height: AvailableSpace::MaxContent,
        },
    )?;

    let root_box = builder.extract(root, page_margin, 0.0)?;
    Ok(root_box.children)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::parse_html;
    use crate::style::{build_styled_tree, Stylesheet};

    fn layout(html: &str, css: &str) -> Vec<PositionedBox> {
        let dom = parse_html(html);
        let styled = build_styled_tree(&dom, None, &Stylesheet::parse(css));
        compute_layout(&styled, 595.0, 40.0, &FontManager::default()).unwrap()
    }

    fn text_boxes<'b>(b: &'b PositionedBox, out: &mut Vec<&'b PositionedBox>) {
        if matches!(b.content, BoxContent::Text { .. }) {
            out.push(b);
        }
        for c in &b.children {
            text_boxes(c, out);
        }
    }

    fn lines(b: &PositionedBox) -> Vec<String> {
        match &b.content {
            BoxContent::Text { lines } => lines.clone(),
            _ => Vec::new(),
        }
    }

    #[test]
    fn layout_simple_paragraph() {
        let boxes = layout("<p>Hello world</p>", "");
        assert!(!boxes.is_empty(), "Should produce at least one box");
        let first = &boxes[0];
        assert!(first.width > 0.0, "Box should have width");
        assert!(first.height > 0.0, "Box should have height");
        assert_eq!(first.x, 40.0);
    }

    #[test]
    fn line_breaks_become_lines() {
        let boxes = layout("<div>Price<br/>(Excl. VAT),<br/>AED</div>", "");
        let mut texts = Vec::new();
        text_boxes(&boxes[0], &mut texts);
        assert_eq!(texts.len(), 1);
        assert_eq!(lines(texts[0]), vec!["Price", "(Excl. VAT),", "AED"]);
    }

    #[test]
    fn label_and_value_sit_side_by_side() {
        let boxes = layout(
            r#"<div><span class="label">TRN:</span> 100200300</div>"#,
            ".label { width: 82px; display: inline-block; font-weight: 700; }",
        );
        let mut texts = Vec::new();
        text_boxes(&boxes[0], &mut texts);
        assert_eq!(texts.len(), 2);
        let (label, value) = (texts[0], texts[1]);
        assert!(label.style.is_bold());
        assert!((label.width - 61.5).abs() < 0.01);
        assert!(value.x > label.x + label.width);
        assert!((value.y - label.y).abs() < 0.01);
    }

    #[test]
    fn grid_columns_split_width() {
        let boxes = layout(
            r#"<div class="g"><div>A</div><div>B</div></div>"#,
            ".g { display: grid; grid-template-columns: 1fr 1fr; gap: 10pt; }",
        );
        let grid = &boxes[0];
        assert_eq!(grid.children.len(), 2);
        let (a, b) = (&grid.children[0], &grid.children[1]);
        assert!((a.width - 252.5).abs() < 0.5, "got {}", a.width);
        assert!((b.x - (a.x + a.width + 10.0)).abs() < 0.5);
        assert!((a.y - b.y).abs() < 0.01);
    }

    #[test]
    fn table_first_row_fixes_column_width() {
        let boxes = layout(
            r#"<table><tr><th class="w">#</th><th>Description</th><th>Qty</th></tr>
               <tr><td>1</td><td>Gold ring</td><td>2.000</td></tr></table>"#,
            ".w { width: 20mm; }",
        );
        let table = &boxes[0];
        let second_row = &table.children[1];
        let first_cell = &second_row.children[0];
        assert!((first_cell.width - 56.69).abs() < 0.1, "got {}", first_cell.width);
        let rest = &second_row.children[1];
        assert!((rest.width - (515.0 - 56.69) / 2.0).abs() < 0.5);
    }

    #[test]
    fn right_aligned_cell_pushes_text_right() {
        let boxes = layout(
            r#"<table><tr><td class="r">12,600.00</td></tr></table>"#,
            ".r { text-align: right; }",
        );
        let cell = &boxes[0].children[0].children[0];
        let mut texts = Vec::new();
        text_boxes(cell, &mut texts);
        let text = texts[0];
        assert!(((text.x + text.width) - (cell.x + cell.width - cell.style.padding.right)).abs() < 0.5);
    }

    #[test]
    fn absolute_children_do_not_take_space() {
        let boxes = layout(
            r#"<div class="blk"><div class="t">Released By</div></div>"#,
            ".blk { min-height: 80pt; position: relative; } .t { position: absolute; top: -20pt; }",
        );
        let blk = &boxes[0];
        assert!((blk.height - 80.0).abs() < 0.01);
        let t = &blk.children[0];
        assert!((t.y - (blk.y - 20.0)).abs() < 0.01);
    }

    #[test]
    fn svg_logo_falls_back_to_alt_text() {
        let boxes = layout(
            r#"<div><img src="data:image/svg+xml;utf8,<svg></svg>" alt="ACME" /></div>"#,
            "",
        );
        let mut texts = Vec::new();
        text_boxes(&boxes[0], &mut texts);
        assert_eq!(lines(texts[0]), vec!["ACME"]);
    }
}
