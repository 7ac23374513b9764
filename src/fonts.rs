//! Text measurement for the PDF base-14 Helvetica faces.
//!
//! Documents are rendered with the built-in Helvetica and Helvetica-Bold
//! fonts, so advance widths come from their published AFM metrics (units of
//! 1/1000 em) instead of a parsed font file. Oblique faces share the upright
//! widths. Characters outside printable ASCII are measured at the width of a
//! digit.

/// Advance widths for U+0020..=U+007E, Helvetica.
const HELVETICA: [u16; 95] = [
    278, 278, 355, 556, 556, 889, 667, 191, 333, 333, 389, 584, 278, 333, 278, 278, // ' '../
    556, 556, 556, 556, 556, 556, 556, 556, 556, 556, 278, 278, 584, 584, 584, 556, // 0..?
    1015, 667, 667, 722, 722, 667, 611, 778, 722, 278, 500, 667, 556, 833, 722, 778, // @..O
    667, 778, 722, 667, 611, 722, 667, 944, 667, 667, 611, 278, 278, 278, 469, 556, // P.._
    333, 556, 556, 500, 556, 556, 278, 556, 556, 222, 222, 500, 222, 833, 556, 556, // `..o
    556, 556, 333, 500, 278, 556, 500, 722, 500, 500, 500, 334, 260, 334, 584, // p..~
];

/// Advance widths for U+0020..=U+007E, Helvetica-Bold.
const HELVETICA_BOLD: [u16; 95] = [
    278, 333, 474, 556, 556, 889, 722, 238, 333, 333, 389, 584, 278, 333, 278, 278, // ' '../
    556, 556, 556, 556, 556, 556, 556, 556, 556, 556, 333, 333, 584, 584, 584, 611, // 0..?
    975, 722, 722, 722, 722, 667, 611, 778, 722, 278, 556, 722, 611, 833, 722, 778, // @..O
    667, 778, 722, 667, 611, 722, 667, 944, 667, 667, 611, 333, 278, 333, 584, 556, // P.._
    333, 556, 611, 556, 611, 556, 333, 611, 611, 278, 278, 556, 278, 889, 611, 611, // `..o
    611, 611, 389, 556, 333, 611, 556, 778, 556, 556, 500, 389, 280, 389, 584, // p..~
];

const FALLBACK_WIDTH: u16 = 556;

/// Vertical metrics and width table for one face.
#[derive(Debug, Clone, Copy)]
pub struct FaceMetrics {
    widths: &'static [u16; 95],
    /// Ascender in 1/1000 em.
    pub ascender: f32,
    /// Descender in 1/1000 em (negative).
    pub descender: f32,
}

impl FaceMetrics {
    fn advance(&self, ch: char) -> u16 {
        match ch {
            ' '..='~' => self.widths[ch as usize - 0x20],
            '\u{00A0}' => self.widths[0],
            _ => FALLBACK_WIDTH,
        }
    }
}

/// Measures text set in the built-in fonts.
#[derive(Debug, Clone)]
pub struct FontManager {
    regular: FaceMetrics,
    bold: FaceMetrics,
}

impl FontManager {
    pub fn new() -> Self {
        Self {
            regular: FaceMetrics {
                widths: &HELVETICA,
                ascender: 718.0,
                descender: -207.0,
            },
            bold: FaceMetrics {
                widths: &HELVETICA_BOLD,
                ascender: 718.0,
                descender: -207.0,
            },
        }
    }

    pub fn face(&self, bold: bool) -> &FaceMetrics {
        if bold {
            &self.bold
        } else {
            &self.regular
        }
    }

    /// Width of `text` in points at `font_size`.
    pub fn measure_text_width(&self, text: &str, font_size: f32, bold: bool) -> f32 {
        let face = self.face(bold);
        let units: u32 = text.chars().map(|c| u32::from(face.advance(c))).sum();
        units as f32 * font_size / 1000.0
    }

    /// Line box height in points.
    pub fn line_height_px(&self, font_size: f32, line_height_factor: f32) -> f32 {
        font_size * line_height_factor
    }

    /// Distance from the top of a line box to the baseline, with the extra
    /// leading split evenly above and below the glyphs.
    pub fn baseline_offset(&self, font_size: f32, line_height_factor: f32, bold: bool) -> f32 {
        let face = self.face(bold);
        let content = (face.ascender - face.descender) / 1000.0 * font_size;
        let leading = self.line_height_px(font_size, line_height_factor) - content;
        leading / 2.0 + face.ascender / 1000.0 * font_size
    }
}

impl Default for FontManager {
    fn default() -> Self {
        Self::new()
    }
}

/// Word-wrap text to fit within `max_width` points. Returns a vec of lines.
///
/// Explicit `'\n'` breaks are kept. A single word wider than `max_width`
/// occupies its own line rather than being split.
pub fn wrap_text(
    text: &str,
    font_size: f32,
    bold: bool,
    max_width: f32,
    fonts: &FontManager,
) -> Vec<String> {
    let mut lines: Vec<String> = Vec::new();
    for paragraph in text.split('\n') {
        let words: Vec<&str> = paragraph.split_whitespace().collect();
        if words.is_empty() {
            lines.push(String::new());
            continue;
        }
        if !max_width.is_finite() || max_width <= 0.0 {
            lines.push(words.join(" "));
            continue;
        }

        let mut current_line = String::new();
        for word in &words {
            let candidate = if current_line.is_empty() {
                word.to_string()
            } else {
                format!("{current_line} {word}")
            };
            let w = fonts.measure_text_width(&candidate, font_size, bold);
            if w > max_width && !current_line.is_empty() {
                lines.push(std::mem::replace(&mut current_line, word.to_string()));
            } else {
                current_line = candidate;
            }
        }
        lines.push(current_line);
    }

    if lines.is_empty() {
        lines.push(String::new());
    }
    lines
}

/// Fold text to the printable ASCII range the built-in fonts are written
/// with. Common typographic punctuation and Latin-1 letters map to their
/// closest ASCII form; anything else becomes `?`.
pub fn fold_to_ascii(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            ' '..='~' => out.push(c),
            '\t' | '\u{00A0}' | '\u{2002}'..='\u{200A}' => out.push(' '),
            '\u{2018}' | '\u{2019}' | '\u{201A}' | '\u{2032}' => out.push('\''),
            '\u{201C}' | '\u{201D}' | '\u{201E}' | '\u{00AB}' | '\u{00BB}' => out.push('"'),
            '\u{2010}'..='\u{2015}' | '\u{2212}' => out.push('-'),
            '\u{2026}' => out.push_str("..."),
            '\u{2022}' | '\u{00B7}' => out.push('*'),
            '\u{00D7}' => out.push('x'),
            '\u{20AC}' => out.push_str("EUR"),
            '\u{00C0}'..='\u{00C5}' => out.push('A'),
            '\u{00C7}' => out.push('C'),
            '\u{00C8}'..='\u{00CB}' => out.push('E'),
            '\u{00CC}'..='\u{00CF}' => out.push('I'),
            '\u{00D1}' => out.push('N'),
            '\u{00D2}'..='\u{00D6}' | '\u{00D8}' => out.push('O'),
            '\u{00D9}'..='\u{00DC}' => out.push('U'),
            '\u{00DD}' => out.push('Y'),
            '\u{00DF}' => out.push_str("ss"),
            '\u{00E0}'..='\u{00E5}' => out.push('a'),
            '\u{00E7}' => out.push('c'),
            '\u{00E8}'..='\u{00EB}' => out.push('e'),
            '\u{00EC}'..='\u{00EF}' => out.push('i'),
            '\u{00F1}' => out.push('n'),
            '\u{00F2}'..='\u{00F6}' | '\u{00F8}' => out.push('o'),
            '\u{00F9}'..='\u{00FC}' => out.push('u'),
            '\u{00FD}' | '\u{00FF}' => out.push('y'),
            '\n' | '\r' => {}
            _ => out.push('?'),
        }
    }
    out
}
