//! HTML parser – converts an HTML string into a simple DOM tree.
//!
//! The parser is tolerant rather than conforming: it understands the markup
//! the compositor writes (and hand-edited variants of it):
//! - Structural: div, p, h1-h3, table, thead, tbody, tr, td, th, img, br
//! - Inline: span, strong, b, em, i
//! - Head content: title, meta, style (raw text), link, script (skipped)
//! - Styling via `class` and `style` attributes plus `<style>` sheets

use std::collections::HashMap;

// ---------------------------------------------------------------------------
// DOM types
// ---------------------------------------------------------------------------

/// The tag name of an element.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Tag {
    Div,
    P,
    H1,
    H2,
    H3,
    Table,
    Thead,
    Tbody,
    Tr,
    Td,
    Th,
    Span,
    Strong,
    B,
    Em,
    I,
    Br,
    Img,
    Body,
    Html,
    Head,
    Title,
    Meta,
    Link,
    Style,
    Script,
    /// Catch-all for unknown tags – kept so selectors can still match them.
    Unknown(String),
}

impl Tag {
    pub fn from_name(s: &str) -> Self {
        match s.to_ascii_lowercase().as_str() {
            "div" => Tag::Div,
            "p" => Tag::P,
            "h1" => Tag::H1,
            "h2" => Tag::H2,
            "h3" => Tag::H3,
            "table" => Tag::Table,
            "thead" => Tag::Thead,
            "tbody" => Tag::Tbody,
            "tr" => Tag::Tr,
            "td" => Tag::Td,
            "th" => Tag::Th,
            "span" => Tag::Span,
            "strong" => Tag::Strong,
            "b" => Tag::B,
            "em" => Tag::Em,
            "i" => Tag::I,
            "br" => Tag::Br,
            "img" => Tag::Img,
            "body" => Tag::Body,
            "html" => Tag::Html,
            "head" => Tag::Head,
            "title" => Tag::Title,
            "meta" => Tag::Meta,
            "link" => Tag::Link,
            "style" => Tag::Style,
            "script" => Tag::Script,
            other => Tag::Unknown(other.to_string()),
        }
    }

    /// Lower-case name as used by CSS type selectors.
    pub fn name(&self) -> &str {
        match self {
            Tag::Div => "div",
            Tag::P => "p",
            Tag::H1 => "h1",
            Tag::H2 => "h2",
            Tag::H3 => "h3",
            Tag::Table => "table",
            Tag::Thead => "thead",
            Tag::Tbody => "tbody",
            Tag::Tr => "tr",
            Tag::Td => "td",
            Tag::Th => "th",
            Tag::Span => "span",
            Tag::Strong => "strong",
            Tag::B => "b",
            Tag::Em => "em",
            Tag::I => "i",
            Tag::Br => "br",
            Tag::Img => "img",
            Tag::Body => "body",
            Tag::Html => "html",
            Tag::Head => "head",
            Tag::Title => "title",
            Tag::Meta => "meta",
            Tag::Link => "link",
            Tag::Style => "style",
            Tag::Script => "script",
            Tag::Unknown(name) => name,
        }
    }

    /// Elements that never have children or a closing tag.
    pub fn is_void(&self) -> bool {
        matches!(self, Tag::Br | Tag::Img | Tag::Meta | Tag::Link)
            || matches!(self, Tag::Unknown(n) if n == "hr" || n == "input")
    }

    /// Elements whose content is raw text up to the matching end tag.
    fn is_raw_text(&self) -> bool {
        matches!(self, Tag::Style | Tag::Script)
    }

    pub fn is_inline(&self) -> bool {
        matches!(
            self,
            Tag::Span | Tag::Strong | Tag::B | Tag::Em | Tag::I | Tag::Br
        )
    }

    pub fn is_table_part(&self) -> bool {
        matches!(
            self,
            Tag::Table | Tag::Thead | Tag::Tbody | Tag::Tr | Tag::Td | Tag::Th
        )
    }
}

/// A node in our DOM tree.
#[derive(Debug, Clone)]
pub enum DomNode {
    Element(ElementNode),
    Text(String),
}

/// An element node carrying tag, attributes, and children.
#[derive(Debug, Clone)]
pub struct ElementNode {
    pub tag: Tag,
    pub attributes: HashMap<String, String>,
    pub children: Vec<DomNode>,
}

impl ElementNode {
    pub fn new(tag: Tag) -> Self {
        Self {
            tag,
            attributes: HashMap::new(),
            children: Vec::new(),
        }
    }

    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attributes.get(name).map(|s| s.as_str())
    }

    pub fn classes(&self) -> Vec<&str> {
        self.attr("class")
            .map(|c| c.split_whitespace().collect())
            .unwrap_or_default()
    }

    pub fn inline_style(&self) -> Option<&str> {
        self.attr("style")
    }

    pub fn src(&self) -> Option<&str> {
        self.attr("src")
    }

    /// Child elements, skipping text nodes.
    pub fn element_children(&self) -> impl Iterator<Item = &ElementNode> {
        self.children.iter().filter_map(|c| match c {
            DomNode::Element(e) => Some(e),
            DomNode::Text(_) => None,
        })
    }

    /// Count descendants (not including `self`) with the given tag.
    pub fn count_descendants(&self, tag: &Tag) -> usize {
        self.element_children()
            .map(|e| usize::from(e.tag == *tag) + e.count_descendants(tag))
            .sum()
    }
}

// ---------------------------------------------------------------------------
// Parser – simple recursive descent over HTML
// ---------------------------------------------------------------------------

/// Parse an HTML string into a list of DOM nodes.
pub fn parse_html(html: &str) -> Vec<DomNode> {
    let mut parser = Parser::new(html);
    parser.parse_nodes()
}

struct Parser<'a> {
    input: &'a str,
    pos: usize,
}

impl<'a> Parser<'a> {
    fn new(input: &'a str) -> Self {
        Self { input, pos: 0 }
    }

    fn parse_nodes(&mut self) -> Vec<DomNode> {
        let mut nodes = Vec::new();
        loop {
            self.skip_whitespace_preserve();
            if self.eof() || self.starts_with("</") {
                break;
            }
            if let Some(node) = self.parse_node() {
                nodes.push(node);
            }
        }
        nodes
    }

    fn parse_node(&mut self) -> Option<DomNode> {
        if self.starts_with("<!--") {
            self.skip_past("-->");
            return None;
        }
        if self.starts_with("<!") || self.starts_with("<?") {
            // doctype / processing instruction
            self.skip_past(">");
            return None;
        }
        if self.starts_with("<") {
            Some(self.parse_element())
        } else {
            Some(self.parse_text())
        }
    }

    fn parse_text(&mut self) -> DomNode {
        let start = self.pos;
        match self.input[self.pos..].find('<') {
            Some(off) => self.pos += off,
            None => self.pos = self.input.len(),
        }
        DomNode::Text(decode_entities(&self.input[start..self.pos]))
    }

    fn parse_element(&mut self) -> DomNode {
        self.pos += 1; // '<'
        let tag_name = self.parse_name();
        let tag = Tag::from_name(&tag_name);
        let mut elem = ElementNode::new(tag.clone());

        loop {
            self.skip_whitespace();
            if self.eof() || self.starts_with(">") || self.starts_with("/>") {
                break;
            }
            let before = self.pos;
            let (key, value) = self.parse_attribute();
            if self.pos == before {
                // Stray character such as a lone '/': step over it.
                self.advance_char();
                continue;
            }
            elem.attributes.insert(key.to_ascii_lowercase(), value);
        }

        if self.starts_with("/>") {
            self.pos += 2;
            return DomNode::Element(elem);
        }
        if self.starts_with(">") {
            self.pos += 1;
        }
        if tag.is_void() {
            return DomNode::Element(elem);
        }

        if tag.is_raw_text() {
            let close = format!("</{}", tag_name);
            let rest = &self.input[self.pos..];
            let end = find_ascii_case_insensitive(rest, &close).unwrap_or(rest.len());
            let raw = &rest[..end];
            if !raw.trim().is_empty() {
                elem.children.push(DomNode::Text(raw.to_string()));
            }
            self.pos += end;
        } else {
            elem.children = self.parse_nodes();
        }

        // Consume closing tag
        if self.starts_with("</") {
            self.pos += 2;
            self.parse_name();
            self.skip_whitespace();
            if self.starts_with(">") {
                self.pos += 1;
            }
        }

        DomNode::Element(elem)
    }

    fn parse_name(&mut self) -> String {
        let start = self.pos;
        while let Some(c) = self.current_char() {
            if c.is_alphanumeric() || c == '-' || c == '_' || c == ':' {
                self.pos += c.len_utf8();
            } else {
                break;
            }
        }
        self.input[start..self.pos].to_string()
    }

    fn parse_attribute(&mut self) -> (String, String) {
        let key = self.parse_name();
        self.skip_whitespace();
        if !self.starts_with("=") {
            return (key, String::new());
        }
        self.pos += 1;
        self.skip_whitespace();
        let value = self.parse_attr_value();
        (key, value)
    }

    fn parse_attr_value(&mut self) -> String {
        for quote in ['"', '\''] {
            if self.current_char() == Some(quote) {
                self.pos += 1;
                let rest = &self.input[self.pos..];
                let end = rest.find(quote).unwrap_or(rest.len());
                let val = decode_entities(&rest[..end]);
                self.pos = (self.pos + end + 1).min(self.input.len());
                return val;
            }
        }
        let start = self.pos;
        while let Some(c) = self.current_char() {
            if c.is_whitespace() || c == '>' {
                break;
            }
            if c == '/' && self.input[self.pos..].starts_with("/>") {
                break;
            }
            self.pos += c.len_utf8();
        }
        self.input[start..self.pos].to_string()
    }

    fn skip_whitespace(&mut self) {
        while let Some(c) = self.current_char() {
            if !c.is_whitespace() {
                break;
            }
            self.pos += c.len_utf8();
        }
    }

    fn skip_whitespace_preserve(&mut self) {
        // Skip runs of pure whitespace between elements.
        let saved = self.pos;
        self.skip_whitespace();
        // If we reached a tag or EOF, keep the skip. Otherwise revert.
        if !self.eof() && !self.starts_with("<") {
            self.pos = saved;
        }
    }

    fn skip_past(&mut self, marker: &str) {
        match self.input[self.pos..].find(marker) {
            Some(off) => self.pos += off + marker.len(),
            None => self.pos = self.input.len(),
        }
    }

    fn starts_with(&self, s: &str) -> bool {
        self.input[self.pos..].starts_with(s)
    }

    fn eof(&self) -> bool {
        self.pos >= self.input.len()
    }

    fn current_char(&self) -> Option<char> {
        self.input[self.pos..].chars().next()
    }

    fn advance_char(&mut self) {
        if let Some(c) = self.current_char() {
            self.pos += c.len_utf8();
        }
    }
}

fn find_ascii_case_insensitive(haystack: &str, needle: &str) -> Option<usize> {
    let needle = needle.as_bytes();
    haystack
        .as_bytes()
        .windows(needle.len())
        .position(|w| w.eq_ignore_ascii_case(needle))
}

fn decode_entities(s: &str) -> String {
    if !s.contains('&') {
        return s.to_string();
    }
    s.replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&apos;", "'")
        .replace("&nbsp;", "\u{00A0}")
        .replace("&amp;", "&")
}

// ---------------------------------------------------------------------------
// Convenience helpers
// ---------------------------------------------------------------------------

/// Find the `<body>` element anywhere in the tree.
pub fn find_body(nodes: &[DomNode]) -> Option<&ElementNode> {
    find_first(nodes, &Tag::Body)
}

/// Children of `<body>`, or all nodes if no `<body>` is present.
pub fn body_children(nodes: &[DomNode]) -> Vec<DomNode> {
    match find_body(nodes) {
        Some(body) => body.children.clone(),
        None => nodes.to_vec(),
    }
}

/// Depth-first search for the first element with `tag`.
pub fn find_first<'a>(nodes: &'a [DomNode], tag: &Tag) -> Option<&'a ElementNode> {
    for node in nodes {
        if let DomNode::Element(e) = node {
            if e.tag == *tag {
                return Some(e);
            }
            if let Some(found) = find_first(&e.children, tag) {
                return Some(found);
            }
        }
    }
    None
}

/// Concatenated contents of every `<style>` element, in document order.
pub fn collect_stylesheets(nodes: &[DomNode]) -> String {
    let mut css = String::new();
    for node in nodes {
        if let DomNode::Element(e) = node {
            if e.tag == Tag::Style {
                for child in &e.children {
                    if let DomNode::Text(t) = child {
                        css.push_str(t);
                        css.push('\n');
                    }
                }
            } else {
                css.push_str(&collect_stylesheets(&e.children));
            }
        }
    }
    css
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_simple_div() {
        let html = r#"<div class="box box-title"><p>Hello</p></div>"#;
        let nodes = parse_html(html);
        assert_eq!(nodes.len(), 1);
        if let DomNode::Element(e) = &nodes[0] {
            assert_eq!(e.tag, Tag::Div);
            assert_eq!(e.classes(), vec!["box", "box-title"]);
            assert_eq!(e.children.len(), 1);
        } else {
            panic!("Expected element");
        }
    }

    #[test]
    fn parse_void_elements() {
        let html = r#"<meta charset="utf-8"><div>Street<br/>City<br>Country</div>"#;
        let nodes = parse_html(html);
        assert_eq!(nodes.len(), 2);
        if let DomNode::Element(div) = &nodes[1] {
            assert_eq!(div.tag, Tag::Div);
            assert_eq!(div.children.len(), 5);
        } else {
            panic!("Expected div");
        }
    }

    #[test]
    fn parse_img_with_markup_in_src() {
        let html = r#"<img class="logo" src="data:image/svg+xml;utf8,<svg xmlns='x'><text>ACME</text></svg>" alt="ACME" />"#;
        let nodes = parse_html(html);
        assert_eq!(nodes.len(), 1);
        if let DomNode::Element(e) = &nodes[0] {
            assert_eq!(e.tag, Tag::Img);
            assert!(e.src().unwrap().ends_with("</svg>"));
            assert_eq!(e.attr("alt"), Some("ACME"));
        } else {
            panic!("Expected img element");
        }
    }

    #[test]
    fn style_contents_are_raw_text() {
        let html = "<html><head><style>.a > .b { color: #000; }</style></head><body><p>x</p></body></html>";
        let nodes = parse_html(html);
        let css = collect_stylesheets(&nodes);
        assert!(css.contains(".a > .b"));
        let body = body_children(&nodes);
        assert_eq!(body.len(), 1);
    }

    #[test]
    fn doctype_and_comments_are_skipped() {
        let html = "<!DOCTYPE html>\n<!-- header --><div>A</div>";
        let nodes = parse_html(html);
        assert_eq!(nodes.len(), 1);
    }

    #[test]
    fn count_rows_in_tbody() {
        let html = r#"<table><thead><tr><th>#</th></tr></thead><tbody data-item-count="2"><tr><td>1</td></tr><tr><td>2</td></tr></tbody></table>"#;
        let nodes = parse_html(html);
        let tbody = find_first(&nodes, &Tag::Tbody).unwrap();
        assert_eq!(tbody.count_descendants(&Tag::Tr), 2);
        assert_eq!(tbody.attr("data-item-count"), Some("2"));
    }

    #[test]
    fn entities_are_decoded_once() {
        let nodes = parse_html("<p>A &amp;lt; B &amp; C</p>");
        if let DomNode::Element(p) = &nodes[0] {
            match &p.children[0] {
                DomNode::Text(t) => assert_eq!(t, "A &lt; B & C"),
                _ => panic!("Expected text"),
            }
        }
    }
}
