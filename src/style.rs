//! Style resolver – applies `<style>` sheets and inline `style` attributes to
//! the DOM and produces a tree of [`StyledNode`]s carrying a flat
//! [`ComputedStyle`] each. All lengths are resolved to PDF points here.
//!
//! The cascade is deliberately small: type, class and id selectors, the
//! universal selector, descendant and child combinators, `:first-child` and
//! `:last-child`. Rules are applied in specificity order, then source order,
//! with the inline `style` attribute last. `@page` rules are collected for the
//! pipeline; `@media print` blocks apply, other media blocks are skipped.

use std::collections::HashMap;

use crate::dom::{DomNode, ElementNode, Tag};

/// Points per millimetre.
pub const PT_PER_MM: f32 = 72.0 / 25.4;
/// Points per CSS pixel.
pub const PT_PER_PX: f32 = 0.75;

/// Fully resolved style for a single element.
#[derive(Debug, Clone)]
pub struct ComputedStyle {
    // Display / layout
    pub display: Display,
    pub flex_direction: FlexDirection,
    pub flex_wrap: FlexWrap,
    pub flex_grow: f32,
    pub flex_shrink: f32,
    pub justify_content: JustifyContent,
    pub align_items: AlignItems,
    pub gap: f32,
    pub grid_template_columns: Vec<GridTrack>,
    pub position: Position,
    pub inset: Edges<Dimension>,

    // Sizing
    pub width: Dimension,
    pub height: Dimension,
    pub min_width: Dimension,
    pub min_height: Dimension,
    pub max_width: Dimension,

    // Box model (pt)
    pub margin: Edges<Dimension>,
    pub padding: Edges<f32>,
    pub border: Edges<Border>,

    // Typography
    pub font_size: f32,
    pub font_weight: FontWeight,
    pub font_style: FontStyle,
    pub color: Color,
    pub text_align: TextAlign,
    pub line_height: f32,
    pub text_decoration: TextDecoration,
    pub nowrap: bool,

    // Paint
    pub background_color: Color,
    pub opacity: f32,
}

impl Default for ComputedStyle {
    fn default() -> Self {
        Self {
            display: Display::Block,
            flex_direction: FlexDirection::Row,
            flex_wrap: FlexWrap::NoWrap,
            flex_grow: 0.0,
            flex_shrink: 1.0,
            justify_content: JustifyContent::Start,
            align_items: AlignItems::Stretch,
            gap: 0.0,
            grid_template_columns: Vec::new(),
            position: Position::Static,
            inset: Edges::all(Dimension::Auto),
            width: Dimension::Auto,
            height: Dimension::Auto,
            min_width: Dimension::Auto,
            min_height: Dimension::Auto,
            max_width: Dimension::Auto,
            margin: Edges::all(Dimension::Pt(0.0)),
            padding: Edges::all(0.0),
            border: Edges::all(Border::NONE),
            font_size: 12.0,
            font_weight: FontWeight::Normal,
            font_style: FontStyle::Normal,
            color: Color::BLACK,
            text_align: TextAlign::Left,
            line_height: 1.2,
            text_decoration: TextDecoration::None,
            nowrap: false,
            background_color: Color::TRANSPARENT,
            opacity: 1.0,
        }
    }
}

impl ComputedStyle {
    /// A fresh style carrying only the inherited (text) properties of `parent`.
    pub fn inherit(parent: &ComputedStyle) -> Self {
        Self {
            font_size: parent.font_size,
            font_weight: parent.font_weight,
            font_style: parent.font_style,
            color: parent.color,
            text_align: parent.text_align,
            line_height: parent.line_height,
            nowrap: parent.nowrap,
            ..Self::default()
        }
    }

    pub fn is_bold(&self) -> bool {
        self.font_weight == FontWeight::Bold
    }

    pub fn has_border(&self) -> bool {
        self.border.iter().any(|b| b.is_visible())
    }
}

// ---------------------------------------------------------------------------
// Supporting types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Display {
    Block,
    Flex,
    Grid,
    Inline,
    InlineBlock,
    None,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlexDirection {
    Row,
    Column,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlexWrap {
    NoWrap,
    Wrap,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JustifyContent {
    Start,
    End,
    Center,
    SpaceBetween,
    SpaceAround,
    SpaceEvenly,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlignItems {
    Start,
    End,
    Center,
    Stretch,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Position {
    Static,
    Relative,
    Absolute,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FontWeight {
    Normal,
    Bold,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextAlign {
    Left,
    Center,
    Right,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextDecoration {
    None,
    Underline,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FontStyle {
    Normal,
    Italic,
}

/// A length in points, a percentage of the containing block, or `auto`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Dimension {
    Auto,
    Pt(f32),
    Percent(f32),
}

impl Dimension {
    /// Resolve against `basis` (pt); `None` for `auto`.
    pub fn resolve(self, basis: f32) -> Option<f32> {
        match self {
            Dimension::Auto => None,
            Dimension::Pt(v) => Some(v),
            Dimension::Percent(p) => Some(basis * p / 100.0),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum GridTrack {
    Pt(f32),
    Percent(f32),
    Fr(f32),
    Auto,
}

/// Per-side values in CSS order.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Edges<T> {
    pub top: T,
    pub right: T,
    pub bottom: T,
    pub left: T,
}

impl<T: Copy> Edges<T> {
    pub fn all(v: T) -> Self {
        Self {
            top: v,
            right: v,
            bottom: v,
            left: v,
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &T> {
        [&self.top, &self.right, &self.bottom, &self.left].into_iter()
    }

    /// Expand a 1–4 value CSS shorthand.
    fn from_shorthand(values: &[T]) -> Option<Self> {
        let (top, right, bottom, left) = match *values {
            [a] => (a, a, a, a),
            [a, b] => (a, b, a, b),
            [a, b, c] => (a, b, c, b),
            [a, b, c, d] => (a, b, c, d),
            _ => return None,
        };
        Some(Self {
            top,
            right,
            bottom,
            left,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Border {
    pub width: f32,
    pub color: Color,
}

impl Border {
    pub const NONE: Self = Self {
        width: 0.0,
        color: Color::BLACK,
    };

    pub fn is_visible(&self) -> bool {
        self.width > 0.0 && !self.color.is_transparent()
    }
}

/// RGBA colour (0.0 – 1.0).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Color {
    pub r: f32,
    pub g: f32,
    pub b: f32,
    pub a: f32,
}

impl Color {
    pub const BLACK: Self = Self::rgb(0.0, 0.0, 0.0);
    pub const WHITE: Self = Self::rgb(1.0, 1.0, 1.0);
    pub const TRANSPARENT: Self = Self {
        r: 0.0,
        g: 0.0,
        b: 0.0,
        a: 0.0,
    };

    pub const fn rgb(r: f32, g: f32, b: f32) -> Self {
        Self { r, g, b, a: 1.0 }
    }

    pub fn is_transparent(&self) -> bool {
        self.a < 0.001
    }

    pub fn from_hex(hex: &str) -> Option<Self> {
        let hex = hex.trim_start_matches('#');
        let channel = |s: &str| u8::from_str_radix(s, 16).ok().map(|v| v as f32 / 255.0);
        match hex.len() {
            6 => Some(Self::rgb(
                channel(&hex[0..2])?,
                channel(&hex[2..4])?,
                channel(&hex[4..6])?,
            )),
            3 => Some(Self::rgb(
                channel(&hex[0..1].repeat(2))?,
                channel(&hex[1..2].repeat(2))?,
                channel(&hex[2..3].repeat(2))?,
            )),
            _ => None,
        }
    }

    /// Parse `#rgb`, `#rrggbb`, `rgb()`, `rgba()` and a few keywords.
    pub fn parse(value: &str) -> Option<Self> {
        let value = value.trim();
        if value.starts_with('#') {
            return Self::from_hex(value);
        }
        let lower = value.to_ascii_lowercase();
        if let Some(args) = lower
            .strip_prefix("rgba(")
            .or_else(|| lower.strip_prefix("rgb("))
        {
            let parts: Vec<f32> = args
                .trim_end_matches(')')
                .split(',')
                .filter_map(|p| p.trim().parse().ok())
                .collect();
            return match parts.as_slice() {
                [r, g, b] => Some(Self::rgb(r / 255.0, g / 255.0, b / 255.0)),
                [r, g, b, a] => Some(Self {
                    r: r / 255.0,
                    g: g / 255.0,
                    b: b / 255.0,
                    a: a.clamp(0.0, 1.0),
                }),
                _ => None,
            };
        }
        match lower.as_str() {
            "black" => Some(Self::BLACK),
            "white" => Some(Self::WHITE),
            "transparent" => Some(Self::TRANSPARENT),
            "red" => Some(Self::rgb(1.0, 0.0, 0.0)),
            "gray" | "grey" => Some(Self::rgb(0.5, 0.5, 0.5)),
            _ => None,
        }
    }

    /// Composite over a white page at the given opacity.
    pub fn over_white(self, opacity: f32) -> Self {
        let a = (opacity * self.a).clamp(0.0, 1.0);
        let mix = |c: f32| 1.0 - a * (1.0 - c);
        if self.is_transparent() {
            return self;
        }
        Self::rgb(mix(self.r), mix(self.g), mix(self.b))
    }
}

// ---------------------------------------------------------------------------
// Stylesheets
// ---------------------------------------------------------------------------

/// Page box requested by an `@page` rule, in millimetres.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct PageRule {
    pub width_mm: Option<f32>,
    pub height_mm: Option<f32>,
    pub margin_mm: Option<f32>,
}

#[derive(Debug, Clone)]
struct Rule {
    selector: Selector,
    order: usize,
    declarations: Vec<(String, String)>,
}

/// A parsed CSS stylesheet.
#[derive(Debug, Clone, Default)]
pub struct Stylesheet {
    rules: Vec<Rule>,
    page: Option<PageRule>,
}

impl Stylesheet {
    pub fn parse(css: &str) -> Self {
        let mut sheet = Self::default();
        sheet.append(css);
        sheet
    }

    /// Parse `css` and add its rules after the existing ones.
    pub fn append(&mut self, css: &str) {
        let css = strip_comments(css);
        self.parse_block(&css);
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty() && self.page.is_none()
    }

    pub fn rule_count(&self) -> usize {
        self.rules.len()
    }

    /// The merged `@page` rule, later declarations winning.
    pub fn page(&self) -> Option<&PageRule> {
        self.page.as_ref()
    }

    fn parse_block(&mut self, css: &str) {
        let mut rest = css;
        loop {
            rest = rest.trim_start();
            if rest.is_empty() {
                break;
            }
            if let Some(at) = rest.strip_prefix('@') {
                let name_end = at
                    .find(|c: char| !(c.is_alphanumeric() || c == '-'))
                    .unwrap_or(at.len());
                let name = at[..name_end].to_ascii_lowercase();
                let brace = at.find('{');
                let semi = at.find(';');
                // Statement at-rules such as @import or @charset.
                if let (Some(s), Some(b)) = (semi, brace) {
                    if s < b {
                        rest = &at[s + 1..];
                        continue;
                    }
                }
                let Some(open) = brace else { break };
                let prelude = at[name_end..open].trim();
                let (body, after) = balanced_block(&at[open + 1..]);
                match name.as_str() {
                    "page" => self.apply_page_rule(body),
                    "media" if media_applies(prelude) => self.parse_block(body),
                    _ => {}
                }
                rest = after;
                continue;
            }

            let Some(open) = rest.find('{') else { break };
            let selectors = rest[..open].trim();
            let (body, after) = balanced_block(&rest[open + 1..]);
            let declarations = parse_declarations(body);
            for sel in selectors.split(',') {
                match Selector::parse(sel) {
                    Some(selector) => self.rules.push(Rule {
                        selector,
                        order: self.rules.len(),
                        declarations: declarations.clone(),
                    }),
                    None => log::trace!("Ignoring unsupported selector '{}'", sel.trim()),
                }
            }
            rest = after;
        }
    }

    fn apply_page_rule(&mut self, body: &str) {
        let page = self.page.get_or_insert_with(PageRule::default);
        for (prop, val) in parse_declarations(body) {
            match prop.as_str() {
                "size" => {
                    if let Some((w, h)) = parse_page_size(&val) {
                        page.width_mm = Some(w);
                        page.height_mm = Some(h);
                    }
                }
                "margin" => {
                    if let Some(pt) = val.split_whitespace().next().and_then(|v| parse_length(v, 12.0)) {
                        page.margin_mm = Some(pt / PT_PER_MM);
                    }
                }
                _ => {}
            }
        }
    }

    /// Declarations of every rule matching the element, in cascade order.
    fn matching_declarations(
        &self,
        element: &ElementContext,
        ancestors: &[ElementContext],
    ) -> Vec<&(String, String)> {
        let mut matched: Vec<&Rule> = self
            .rules
            .iter()
            .filter(|r| r.selector.matches(element, ancestors))
            .collect();
        matched.sort_by_key(|r| (r.selector.specificity, r.order));
        matched
            .into_iter()
            .flat_map(|r| r.declarations.iter())
            .collect()
    }
}

fn media_applies(query: &str) -> bool {
    let q = query.to_ascii_lowercase();
    q.is_empty() || q.contains("print") || q.contains("all")
}

fn strip_comments(css: &str) -> String {
    let mut out = String::with_capacity(css.len());
    let mut rest = css;
    while let Some(start) = rest.find("/*") {
        out.push_str(&rest[..start]);
        rest = match rest[start + 2..].find("*/") {
            Some(end) => &rest[start + 2 + end + 2..],
            None => "",
        };
    }
    out.push_str(rest);
    out
}

/// Split at the `}` closing an already-opened block.
fn balanced_block(s: &str) -> (&str, &str) {
    let mut depth = 1usize;
    for (i, c) in s.char_indices() {
        match c {
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return (&s[..i], &s[i + 1..]);
                }
            }
            _ => {}
        }
    }
    (s, "")
}

fn parse_declarations(body: &str) -> Vec<(String, String)> {
    body.split(';')
        .filter_map(|decl| {
            let (prop, val) = decl.split_once(':')?;
            let prop = prop.trim().to_ascii_lowercase();
            let val = val.trim().trim_end_matches("!important").trim();
            if prop.is_empty() || val.is_empty() {
                None
            } else {
                Some((prop, val.to_string()))
            }
        })
        .collect()
}

fn parse_page_size(val: &str) -> Option<(f32, f32)> {
    let tokens: Vec<String> = val
        .split_whitespace()
        .map(|t| t.to_ascii_lowercase())
        .collect();
    let landscape = tokens.iter().any(|t| t == "landscape");
    let named = tokens.iter().find_map(|t| match t.as_str() {
        "a3" => Some((297.0, 420.0)),
        "a4" => Some((210.0, 297.0)),
        "a5" => Some((148.0, 210.0)),
        "letter" => Some((215.9, 279.4)),
        "legal" => Some((215.9, 355.6)),
        _ => None,
    });
    let (w, h) = match named {
        Some(size) => size,
        None => {
            let lengths: Vec<f32> = tokens
                .iter()
                .filter_map(|t| parse_length(t, 12.0))
                .map(|pt| pt / PT_PER_MM)
                .collect();
            match lengths.as_slice() {
                [side] => (*side, *side),
                [w, h, ..] => (*w, *h),
                [] => return None,
            }
        }
    };
    Some(if landscape { (h.max(w), h.min(w)) } else { (w, h) })
}

// ---------------------------------------------------------------------------
// Selectors
// ---------------------------------------------------------------------------

/// What a selector needs to know about an element.
#[derive(Debug, Clone)]
pub struct ElementContext {
    pub tag: String,
    pub id: Option<String>,
    pub classes: Vec<String>,
    pub first_child: bool,
    pub last_child: bool,
}

impl ElementContext {
    pub fn of(element: &ElementNode, first_child: bool, last_child: bool) -> Self {
        Self {
            tag: element.tag.name().to_string(),
            id: element.attr("id").map(str::to_string),
            classes: element.classes().into_iter().map(str::to_string).collect(),
            first_child,
            last_child,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Combinator {
    Descendant,
    Child,
}

#[derive(Debug, Clone, Default)]
struct Compound {
    tag: Option<String>,
    id: Option<String>,
    classes: Vec<String>,
    first_child: bool,
    last_child: bool,
}

impl Compound {
    fn parse(s: &str) -> Option<Self> {
        let mut c = Compound::default();
        let mut rest = s;
        let ident_end = |r: &str| {
            r.find(|ch: char| !(ch.is_alphanumeric() || ch == '-' || ch == '_'))
                .unwrap_or(r.len())
        };

        if let Some(r) = rest.strip_prefix('*') {
            rest = r;
        } else {
            let end = ident_end(rest);
            if end > 0 {
                c.tag = Some(rest[..end].to_ascii_lowercase());
                rest = &rest[end..];
            }
        }
        while !rest.is_empty() {
            if let Some(r) = rest.strip_prefix('.') {
                let end = ident_end(r);
                c.classes.push(r[..end].to_string());
                rest = &r[end..];
            } else if let Some(r) = rest.strip_prefix('#') {
                let end = ident_end(r);
                c.id = Some(r[..end].to_string());
                rest = &r[end..];
            } else if let Some(r) = rest.strip_prefix(":first-child") {
                c.first_child = true;
                rest = r;
            } else if let Some(r) = rest.strip_prefix(":last-child") {
                c.last_child = true;
                rest = r;
            } else {
                // Attribute selectors, other pseudo-classes and elements.
                return None;
            }
        }
        Some(c)
    }

    fn matches(&self, el: &ElementContext) -> bool {
        self.tag.as_ref().map_or(true, |t| *t == el.tag)
            && self.id.as_ref().map_or(true, |id| el.id.as_ref() == Some(id))
            && self.classes.iter().all(|c| el.classes.contains(c))
            && (!self.first_child || el.first_child)
            && (!self.last_child || el.last_child)
    }

    fn specificity(&self) -> (u32, u32, u32) {
        let pseudo = u32::from(self.first_child) + u32::from(self.last_child);
        (
            u32::from(self.id.is_some()),
            self.classes.len() as u32 + pseudo,
            u32::from(self.tag.is_some()),
        )
    }
}

#[derive(Debug, Clone)]
struct Selector {
    compounds: Vec<Compound>,
    /// `combinators[i]` joins `compounds[i]` and `compounds[i + 1]`.
    combinators: Vec<Combinator>,
    specificity: (u32, u32, u32),
}

impl Selector {
    fn parse(text: &str) -> Option<Self> {
        let spaced = text.replace('>', " > ");
        let mut compounds = Vec::new();
        let mut combinators = Vec::new();
        let mut pending = Combinator::Descendant;
        for token in spaced.split_whitespace() {
            if token == ">" {
                pending = Combinator::Child;
                continue;
            }
            if !compounds.is_empty() {
                combinators.push(pending);
            }
            compounds.push(Compound::parse(token)?);
            pending = Combinator::Descendant;
        }
        if compounds.is_empty() {
            return None;
        }
        let specificity = compounds.iter().fold((0, 0, 0), |acc, c| {
            let s = c.specificity();
            (acc.0 + s.0, acc.1 + s.1, acc.2 + s.2)
        });
        Some(Self {
            compounds,
            combinators,
            specificity,
        })
    }

    fn matches(&self, element: &ElementContext, ancestors: &[ElementContext]) -> bool {
        let n = self.compounds.len();
        self.compounds[n - 1].matches(element) && self.match_ancestors(n - 1, ancestors)
    }

    /// Match `compounds[..upto]` against `ancestors` (nearest last).
    fn match_ancestors(&self, upto: usize, ancestors: &[ElementContext]) -> bool {
        if upto == 0 {
            return true;
        }
        let compound = &self.compounds[upto - 1];
        match self.combinators[upto - 1] {
            Combinator::Child => match ancestors.split_last() {
                Some((parent, rest)) => {
                    compound.matches(parent) && self.match_ancestors(upto - 1, rest)
                }
                None => false,
            },
            Combinator::Descendant => (0..ancestors.len()).rev().any(|i| {
                compound.matches(&ancestors[i]) && self.match_ancestors(upto - 1, &ancestors[..i])
            }),
        }
    }
}

// ---------------------------------------------------------------------------
// Style resolution
// ---------------------------------------------------------------------------

/// Resolve the style for an element, inheriting text properties from its parent.
pub fn resolve_style(
    element: &ElementNode,
    parent: Option<&ComputedStyle>,
    sheet: &Stylesheet,
    context: &ElementContext,
    ancestors: &[ElementContext],
) -> ComputedStyle {
    let mut style = parent.map(ComputedStyle::inherit).unwrap_or_default();
    apply_tag_defaults(&mut style, &element.tag);

    for (prop, val) in sheet.matching_declarations(context, ancestors) {
        apply_css_property(&mut style, prop, val);
    }
    if let Some(inline) = element.inline_style() {
        for (prop, val) in parse_declarations(inline) {
            apply_css_property(&mut style, &prop, &val);
        }
    }

    if style.opacity < 1.0 {
        let o = style.opacity;
        style.background_color = style.background_color.over_white(o);
        style.color = style.color.over_white(o);
        for side in [
            &mut style.border.top,
            &mut style.border.right,
            &mut style.border.bottom,
            &mut style.border.left,
        ] {
            side.color = side.color.over_white(o);
        }
    }
    style
}

/// User-agent defaults, applied before any author rule.
fn apply_tag_defaults(s: &mut ComputedStyle, tag: &Tag) {
    match tag {
        Tag::H1 | Tag::H2 | Tag::H3 => {
            s.font_weight = FontWeight::Bold;
            let (size, margin) = match tag {
                Tag::H1 => (24.0, 16.0),
                Tag::H2 => (18.0, 14.0),
                _ => (14.0, 12.0),
            };
            s.font_size = size;
            s.margin.top = Dimension::Pt(margin);
            s.margin.bottom = Dimension::Pt(margin);
        }
        Tag::P => {
            s.margin.top = Dimension::Pt(s.font_size);
            s.margin.bottom = Dimension::Pt(s.font_size);
        }
        Tag::Th => {
            s.font_weight = FontWeight::Bold;
            s.text_align = TextAlign::Center;
            s.padding = Edges::all(PT_PER_PX);
        }
        Tag::Td => s.padding = Edges::all(PT_PER_PX),
        Tag::Strong | Tag::B => {
            s.font_weight = FontWeight::Bold;
            s.display = Display::Inline;
        }
        Tag::Em | Tag::I => {
            s.font_style = FontStyle::Italic;
            s.display = Display::Inline;
        }
        Tag::Span | Tag::Br => s.display = Display::Inline,
        Tag::Img => s.display = Display::InlineBlock,
        Tag::Head | Tag::Title | Tag::Meta | Tag::Link | Tag::Style | Tag::Script => {
            s.display = Display::None
        }
        _ => {}
    }
}

fn apply_css_property(s: &mut ComputedStyle, prop: &str, val: &str) {
    let em = s.font_size;
    let length = |v: &str| parse_length(v, em);
    match prop {
        "display" => {
            s.display = match val {
                "flex" | "inline-flex" => Display::Flex,
                "grid" | "inline-grid" => Display::Grid,
                "block" | "table" | "table-row" | "table-cell" | "list-item" => Display::Block,
                "inline" => Display::Inline,
                "inline-block" => Display::InlineBlock,
                "none" => Display::None,
                _ => s.display,
            }
        }
        "flex-direction" => {
            s.flex_direction = match val {
                "row" | "row-reverse" => FlexDirection::Row,
                "column" | "column-reverse" => FlexDirection::Column,
                _ => s.flex_direction,
            }
        }
        "flex-wrap" => {
            s.flex_wrap = match val {
                "wrap" => FlexWrap::Wrap,
                _ => FlexWrap::NoWrap,
            }
        }
        "flex-grow" => s.flex_grow = val.parse().unwrap_or(s.flex_grow),
        "flex-shrink" => s.flex_shrink = val.parse().unwrap_or(s.flex_shrink),
        "flex" => {
            if let Some(grow) = val.split_whitespace().next().and_then(|v| v.parse().ok()) {
                s.flex_grow = grow;
            }
        }
        "justify-content" => {
            s.justify_content = match val {
                "flex-end" | "end" | "right" => JustifyContent::End,
                "center" => JustifyContent::Center,
                "space-between" => JustifyContent::SpaceBetween,
                "space-around" => JustifyContent::SpaceAround,
                "space-evenly" => JustifyContent::SpaceEvenly,
                _ => JustifyContent::Start,
            }
        }
        "align-items" => {
            s.align_items = match val {
                "start" | "flex-start" | "baseline" => AlignItems::Start,
                "end" | "flex-end" => AlignItems::End,
                "center" => AlignItems::Center,
                _ => AlignItems::Stretch,
            }
        }
        "gap" | "grid-gap" | "column-gap" => {
            if let Some(pt) = val.split_whitespace().next().and_then(length) {
                s.gap = pt;
            }
        }
        "grid-template-columns" => s.grid_template_columns = parse_grid_tracks(val, em),
        "position" => {
            s.position = match val {
                "absolute" | "fixed" => Position::Absolute,
                "relative" => Position::Relative,
                _ => Position::Static,
            }
        }
        "top" => s.inset.top = parse_dimension(val, em),
        "right" => s.inset.right = parse_dimension(val, em),
        "bottom" => s.inset.bottom = parse_dimension(val, em),
        "left" => s.inset.left = parse_dimension(val, em),
        "width" => s.width = parse_dimension(val, em),
        "height" => s.height = parse_dimension(val, em),
        "min-width" => s.min_width = parse_dimension(val, em),
        "min-height" => s.min_height = parse_dimension(val, em),
        "max-width" => s.max_width = parse_dimension(val, em),
        "margin" => {
            let values: Vec<Dimension> = val
                .split_whitespace()
                .map(|v| parse_dimension(v, em))
                .collect();
            if let Some(edges) = Edges::from_shorthand(&values) {
                s.margin = edges;
            }
        }
        "margin-top" => s.margin.top = parse_dimension(val, em),
        "margin-right" => s.margin.right = parse_dimension(val, em),
        "margin-bottom" => s.margin.bottom = parse_dimension(val, em),
        "margin-left" => s.margin.left = parse_dimension(val, em),
        "padding" => {
            let values: Vec<f32> = val.split_whitespace().filter_map(length).collect();
            if let Some(edges) = Edges::from_shorthand(&values) {
                s.padding = edges;
            }
        }
        "padding-top" => s.padding.top = length(val).unwrap_or(s.padding.top),
        "padding-right" => s.padding.right = length(val).unwrap_or(s.padding.right),
        "padding-bottom" => s.padding.bottom = length(val).unwrap_or(s.padding.bottom),
        "padding-left" => s.padding.left = length(val).unwrap_or(s.padding.left),
        "border" => s.border = Edges::all(parse_border(val, em)),
        "border-top" => s.border.top = parse_border(val, em),
        "border-right" => s.border.right = parse_border(val, em),
        "border-bottom" => s.border.bottom = parse_border(val, em),
        "border-left" => s.border.left = parse_border(val, em),
        "border-width" => {
            let values: Vec<f32> = val.split_whitespace().filter_map(length).collect();
            if let Some(w) = Edges::from_shorthand(&values) {
                s.border.top.width = w.top;
                s.border.right.width = w.right;
                s.border.bottom.width = w.bottom;
                s.border.left.width = w.left;
            }
        }
        "border-color" => {
            if let Some(c) = Color::parse(val) {
                for side in [
                    &mut s.border.top,
                    &mut s.border.right,
                    &mut s.border.bottom,
                    &mut s.border.left,
                ] {
                    side.color = c;
                }
            }
        }
        "font-size" => {
            if let Some(pt) = length(val) {
                s.font_size = pt;
            }
        }
        "font-weight" => {
            s.font_weight = match val {
                "bold" | "bolder" | "600" | "700" | "800" | "900" => FontWeight::Bold,
                _ => FontWeight::Normal,
            }
        }
        "font-style" => {
            s.font_style = match val {
                "italic" | "oblique" => FontStyle::Italic,
                _ => FontStyle::Normal,
            }
        }
        "color" => {
            if let Some(c) = Color::parse(val) {
                s.color = c;
            }
        }
        "background-color" => {
            if let Some(c) = Color::parse(val) {
                s.background_color = c;
            }
        }
        "background" => {
            if let Some(c) = val.split_whitespace().find_map(Color::parse) {
                s.background_color = c;
            }
        }
        "text-align" => {
            s.text_align = match val {
                "center" => TextAlign::Center,
                "right" | "end" => TextAlign::Right,
                _ => TextAlign::Left,
            }
        }
        "line-height" => {
            if let Ok(factor) = val.parse::<f32>() {
                s.line_height = factor;
            } else if let Some(pct) = val.strip_suffix('%').and_then(|p| p.parse::<f32>().ok()) {
                s.line_height = pct / 100.0;
            } else if let Some(pt) = length(val) {
                s.line_height = pt / s.font_size;
            }
        }
        "text-decoration" | "text-decoration-line" => {
            s.text_decoration = if val.contains("underline") {
                TextDecoration::Underline
            } else {
                TextDecoration::None
            }
        }
        "white-space" => s.nowrap = matches!(val, "nowrap" | "pre"),
        "opacity" => {
            if let Ok(o) = val.parse::<f32>() {
                s.opacity = o.clamp(0.0, 1.0);
            }
        }
        _ => {}
    }
}

/// Parse a CSS length to points. `em` is the font size the length is
/// relative to. Bare numbers are accepted only for zero.
pub fn parse_length(value: &str, em: f32) -> Option<f32> {
    let v = value.trim();
    let split = v
        .find(|c: char| !(c.is_ascii_digit() || c == '.' || c == '-' || c == '+'))
        .unwrap_or(v.len());
    let (num, unit) = v.split_at(split);
    let n: f32 = num.parse().ok()?;
    match unit {
        "pt" => Some(n),
        "px" => Some(n * PT_PER_PX),
        "mm" => Some(n * PT_PER_MM),
        "cm" => Some(n * PT_PER_MM * 10.0),
        "in" => Some(n * 72.0),
        "em" | "rem" => Some(n * em),
        "" if n == 0.0 => Some(0.0),
        _ => None,
    }
}

fn parse_dimension(value: &str, em: f32) -> Dimension {
    let v = value.trim();
    if v == "auto" {
        return Dimension::Auto;
    }
    if let Some(p) = v.strip_suffix('%') {
        return p.parse().map(Dimension::Percent).unwrap_or(Dimension::Auto);
    }
    parse_length(v, em).map(Dimension::Pt).unwrap_or(Dimension::Auto)
}

/// `border: <width> <style> <color>` in any order; `0` and `none` clear it.
fn parse_border(value: &str, em: f32) -> Border {
    let mut border = Border {
        width: 3.0 * PT_PER_PX,
        color: Color::BLACK,
    };
    for token in value.split_whitespace() {
        if token == "none" || token == "hidden" {
            return Border::NONE;
        } else if let Some(w) = parse_length(token, em) {
            border.width = w;
        } else if let Some(c) = Color::parse(token) {
            border.color = c;
        } else {
            match token {
                "thin" => border.width = PT_PER_PX,
                "medium" => border.width = 3.0 * PT_PER_PX,
                "thick" => border.width = 5.0 * PT_PER_PX,
                _ => {} // style keyword
            }
        }
    }
    border
}

fn parse_grid_tracks(value: &str, em: f32) -> Vec<GridTrack> {
    let mut tracks = Vec::new();
    let mut rest = value.trim();
    while !rest.is_empty() {
        if let Some(inner) = rest.strip_prefix("repeat(") {
            let close = inner.find(')').unwrap_or(inner.len());
            if let Some((count, track)) = inner[..close].split_once(',') {
                if let Ok(n) = count.trim().parse::<usize>() {
                    let expanded = parse_grid_tracks(track, em);
                    for _ in 0..n {
                        tracks.extend(expanded.iter().copied());
                    }
                }
            }
            rest = inner.get(close + 1..).unwrap_or("").trim_start();
            continue;
        }
        let end = rest.find(char::is_whitespace).unwrap_or(rest.len());
        let token = &rest[..end];
        rest = rest[end..].trim_start();
        let track = if token == "auto" || token == "min-content" || token == "max-content" {
            GridTrack::Auto
        } else if let Some(fr) = token.strip_suffix("fr") {
            match fr.parse() {
                Ok(f) => GridTrack::Fr(f),
                Err(_) => continue,
            }
        } else if let Some(p) = token.strip_suffix('%') {
            match p.parse() {
                Ok(p) => GridTrack::Percent(p),
                Err(_) => continue,
            }
        } else {
            match parse_length(token, em) {
                Some(pt) => GridTrack::Pt(pt),
                None => continue,
            }
        };
        tracks.push(track);
    }
    tracks
}

// ---------------------------------------------------------------------------
// Styled DOM tree
// ---------------------------------------------------------------------------

/// A DOM node annotated with its computed style.
#[derive(Debug, Clone)]
pub enum StyledNode {
    Element {
        tag: Tag,
        style: ComputedStyle,
        children: Vec<StyledNode>,
        /// Original attributes (for images src, etc.)
        attrs: HashMap<String, String>,
    },
    Text {
        text: String,
        style: ComputedStyle,
    },
}

impl StyledNode {
    pub fn style(&self) -> &ComputedStyle {
        match self {
            StyledNode::Element { style, .. } | StyledNode::Text { style, .. } => style,
        }
    }
}

/// Walks a DOM tree resolving styles against one stylesheet.
pub struct StyleResolver<'a> {
    sheet: &'a Stylesheet,
    ancestors: Vec<ElementContext>,
}

impl<'a> StyleResolver<'a> {
    pub fn new(sheet: &'a Stylesheet) -> Self {
        Self {
            sheet,
            ancestors: Vec::new(),
        }
    }

    /// Resolve a single element whose ancestors have already been entered.
    pub fn resolve(&self, element: &ElementNode, parent: Option<&ComputedStyle>) -> ComputedStyle {
        let ctx = ElementContext::of(element, true, true);
        resolve_style(element, parent, self.sheet, &ctx, &self.ancestors)
    }

    /// Push an element as an ancestor for subsequent resolutions.
    pub fn enter(&mut self, element: &ElementNode) {
        self.ancestors.push(ElementContext::of(element, true, true));
    }

    /// Style `nodes`, which share a parent whose style is `parent_style`.
    pub fn style_nodes(
        &mut self,
        nodes: &[DomNode],
        parent_style: Option<&ComputedStyle>,
    ) -> Vec<StyledNode> {
        let element_positions: Vec<usize> = nodes
            .iter()
            .enumerate()
            .filter(|(_, n)| matches!(n, DomNode::Element(_)))
            .map(|(i, _)| i)
            .collect();
        let first = element_positions.first().copied();
        let last = element_positions.last().copied();

        let mut result = Vec::new();
        for (i, node) in nodes.iter().enumerate() {
            match node {
                DomNode::Element(e) => {
                    let ctx = ElementContext::of(e, Some(i) == first, Some(i) == last);
                    let style = resolve_style(e, parent_style, self.sheet, &ctx, &self.ancestors);
                    if style.display == Display::None {
                        continue;
                    }
                    self.ancestors.push(ctx);
                    let children = self.style_nodes(&e.children, Some(&style));
                    self.ancestors.pop();
                    result.push(StyledNode::Element {
                        tag: e.tag.clone(),
                        style,
                        children,
                        attrs: e.attributes.clone(),
                    });
                }
                DomNode::Text(text) => {
                    if !text.trim().is_empty() {
                        // Text runs inline: only inherited properties apply.
                        let mut style = parent_style
                            .map(ComputedStyle::inherit)
                            .unwrap_or_default();
                        style.display = Display::Inline;
                        result.push(StyledNode::Text {
                            text: text.clone(),
                            style,
                        });
                    }
                }
            }
        }
        result
    }
}

/// Build a styled tree from a DOM tree, resolving styles top-down.
pub fn build_styled_tree(
    nodes: &[DomNode],
    parent_style: Option<&ComputedStyle>,
    sheet: &Stylesheet,
) -> Vec<StyledNode> {
    StyleResolver::new(sheet).style_nodes(nodes, parent_style)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::parse_html;

    fn first_element(nodes: &[StyledNode]) -> &StyledNode {
        nodes
            .iter()
            .find(|n| matches!(n, StyledNode::Element { .. }))
            .unwrap()
    }

    fn children(node: &StyledNode) -> &[StyledNode] {
        match node {
            StyledNode::Element { children, .. } => children,
            StyledNode::Text { .. } => &[],
        }
    }

    #[test]
    fn units_resolve_to_points() {
        assert_eq!(parse_length("10pt", 12.0), Some(10.0));
        assert_eq!(parse_length("4px", 12.0), Some(3.0));
        assert!((parse_length("25.4mm", 12.0).unwrap() - 72.0).abs() < 1e-3);
        assert_eq!(parse_length("2em", 10.0), Some(20.0));
        assert_eq!(parse_length("0", 12.0), Some(0.0));
        assert_eq!(parse_length("12", 12.0), None);
    }

    #[test]
    fn inline_style_font_size() {
        let mut s = ComputedStyle::default();
        for (p, v) in parse_declarations("font-size: 24pt; color: #ff0000") {
            apply_css_property(&mut s, &p, &v);
        }
        assert_eq!(s.font_size, 24.0);
        assert!((s.color.r - 1.0).abs() < 0.01);
    }

    #[test]
    fn color_from_hex_and_rgba() {
        let c = Color::from_hex("#ff8800").unwrap();
        assert!((c.r - 1.0).abs() < 0.01);
        assert!((c.g - 0.533).abs() < 0.01);
        let c = Color::parse("rgba(0,0,0,.15)").unwrap();
        assert!((c.a - 0.15).abs() < 1e-6);
        assert_eq!(Color::parse("#fff"), Some(Color::WHITE));
    }

    #[test]
    fn border_shorthands_are_per_side() {
        let mut s = ComputedStyle::default();
        apply_css_property(&mut s, "border", "1px solid #9ea3a8");
        apply_css_property(&mut s, "border-top", "0");
        assert_eq!(s.border.top.width, 0.0);
        assert_eq!(s.border.bottom.width, 0.75);
        assert!((s.border.left.color.r - 0x9e as f32 / 255.0).abs() < 1e-6);
    }

    #[test]
    fn grid_tracks() {
        let tracks = parse_grid_tracks("1.4fr 1fr auto 20mm", 12.0);
        assert_eq!(tracks[0], GridTrack::Fr(1.4));
        assert_eq!(tracks[1], GridTrack::Fr(1.0));
        assert_eq!(tracks[2], GridTrack::Auto);
        assert!(matches!(tracks[3], GridTrack::Pt(_)));
        assert_eq!(parse_grid_tracks("repeat(3, 1fr)", 12.0).len(), 3);
    }

    #[test]
    fn page_rule_and_media_blocks() {
        let sheet = Stylesheet::parse(
            "/* x */ @page { size: 400mm 700mm; margin: 12mm; }
             @media screen { .a { color: red; } }
             @media print { .a { color: #00f; } }
             .b { font-size: 9pt; }",
        );
        let page = sheet.page().unwrap();
        assert!((page.width_mm.unwrap() - 400.0).abs() < 1e-3);
        assert!((page.height_mm.unwrap() - 700.0).abs() < 1e-3);
        assert!((page.margin_mm.unwrap() - 12.0).abs() < 1e-3);
        assert_eq!(sheet.rule_count(), 2);
    }

    #[test]
    fn later_page_rule_wins() {
        let mut sheet = Stylesheet::parse("@page { size: A4; margin: 10mm; }");
        sheet.append("@page { size: 400mm 500mm; }");
        let page = sheet.page().unwrap();
        assert!((page.height_mm.unwrap() - 500.0).abs() < 1e-3);
        assert!((page.margin_mm.unwrap() - 10.0).abs() < 1e-3);
    }

    #[test]
    fn cascade_orders_by_specificity_then_source() {
        let sheet = Stylesheet::parse(
            ".items td { text-align: left; }
             .items .right { text-align: right; }
             td { text-align: center; }",
        );
        let dom = parse_html(
            r#"<table class="items"><tr><td class="right">1</td><td>2</td></tr></table>"#,
        );
        let styled = build_styled_tree(&dom, None, &sheet);
        let table = first_element(&styled);
        let tr = first_element(children(table));
        let cells = children(tr);
        assert_eq!(cells[0].style().text_align, TextAlign::Right);
        assert_eq!(cells[1].style().text_align, TextAlign::Left);
    }

    #[test]
    fn last_child_selector() {
        let sheet = Stylesheet::parse(
            ".t td { border-right: 1px solid #000; } .t td:last-child { border-right: 0; }",
        );
        let dom = parse_html(r#"<div class="t"><td>a</td><td>b</td></div>"#);
        let styled = build_styled_tree(&dom, None, &sheet);
        let cells = children(first_element(&styled));
        assert!(cells[0].style().border.right.is_visible());
        assert!(!cells[1].style().border.right.is_visible());
    }

    #[test]
    fn child_combinator_requires_direct_parent() {
        let sheet = Stylesheet::parse(".a > p { font-size: 20pt; }");
        let dom = parse_html(r#"<div class="a"><div><p>x</p></div><p>y</p></div>"#);
        let styled = build_styled_tree(&dom, None, &sheet);
        let a = children(first_element(&styled));
        let nested_p = first_element(children(&a[0]));
        assert_eq!(nested_p.style().font_size, 12.0);
        assert_eq!(a[1].style().font_size, 20.0);
    }

    #[test]
    fn text_inherits_only_text_properties() {
        let sheet = Stylesheet::parse(".box { border: 1px solid #000; padding: 8px; font-weight: 700; }");
        let dom = parse_html(r#"<div class="box">Hello</div>"#);
        let styled = build_styled_tree(&dom, None, &sheet);
        let text = &children(first_element(&styled))[0];
        assert!(matches!(text, StyledNode::Text { .. }));
        assert!(text.style().is_bold());
        assert!(!text.style().has_border());
        assert_eq!(text.style().padding.left, 0.0);
    }

    #[test]
    fn opacity_blends_toward_white() {
        let sheet = Stylesheet::parse(".s { border: 2px solid #000; opacity: .25; }");
        let dom = parse_html(r#"<div class="s"></div>"#);
        let styled = build_styled_tree(&dom, None, &sheet);
        let c = first_element(&styled).style().border.top.color;
        assert!((c.r - 0.75).abs() < 1e-6);
    }

    #[test]
    fn head_content_is_not_rendered() {
        let dom = parse_html("<title>T</title><style>p{}</style><p>x</p>");
        let styled = build_styled_tree(&dom, None, &Stylesheet::default());
        assert_eq!(styled.len(), 1);
    }
}
