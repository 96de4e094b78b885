//! Built-in converter: extracts the document text and lays it out as plain
//! Helvetica lines in an uncompressed PDF 1.4 file.
//!
//! Styling is ignored. Headings get a larger font, table rows become one
//! line with cells separated by spaces, long lines wrap on word boundaries.

use async_trait::async_trait;
use scraper::{ElementRef, Html, Selector};
use tracing::{debug, instrument};

use super::PdfConverter;
use crate::error::RenderError;

const PAGE_WIDTH: f32 = 595.0;
const PAGE_HEIGHT: f32 = 842.0;
const MARGIN: f32 = 50.0;
const BODY_SIZE: f32 = 11.0;
const LEADING: f32 = 1.45;
// Rough Helvetica average glyph width as a fraction of the font size.
const GLYPH_WIDTH: f32 = 0.5;

#[derive(Debug, Clone, PartialEq)]
struct Line {
    text: String,
    size: f32,
}

/// Dependency-free HTML-to-PDF converter.
#[derive(Debug, Clone, Default)]
pub struct TextPdfConverter;

#[async_trait]
impl PdfConverter for TextPdfConverter {
    fn name(&self) -> &str {
        "builtin"
    }

    #[instrument(skip(self, html), fields(html_len = html.len()), err)]
    async fn convert(&self, html: &str) -> Result<Vec<u8>, RenderError> {
        let lines = extract_lines(html)?;
        if lines.is_empty() {
            return Err(RenderError::Markup(
                "document has no renderable text".to_string(),
            ));
        }

        let pages = paginate(wrap(lines));
        debug!(pages = pages.len(), "laid out pdf");
        Ok(write_pdf(&pages))
    }
}

fn selector(css: &str) -> Result<Selector, RenderError> {
    Selector::parse(css).map_err(|e| RenderError::Markup(format!("bad selector '{css}': {e}")))
}

fn extract_lines(html: &str) -> Result<Vec<Line>, RenderError> {
    let document = Html::parse_document(html);
    let blocks = selector("h1, h2, h3, p, tr")?;
    let cells = selector("th, td")?;

    let mut lines = Vec::new();
    for element in document.select(&blocks) {
        let (text, size) = match element.value().name() {
            "h1" => (element_text(&element), 18.0),
            "h2" | "h3" => (element_text(&element), 14.0),
            "tr" => {
                let row: Vec<String> = element
                    .select(&cells)
                    .map(|cell| element_text(&cell))
                    .filter(|t| !t.is_empty())
                    .collect();
                (row.join("    "), BODY_SIZE)
            }
            _ => (element_text(&element), BODY_SIZE),
        };
        if !text.is_empty() {
            lines.push(Line { text, size });
        }
    }
    Ok(lines)
}

/// Text content with runs of whitespace collapsed to single spaces.
fn element_text(element: &ElementRef<'_>) -> String {
    element
        .text()
        .flat_map(str::split_whitespace)
        .collect::<Vec<_>>()
        .join(" ")
}

fn wrap(lines: Vec<Line>) -> Vec<Line> {
    let mut out = Vec::with_capacity(lines.len());
    for line in lines {
        let max_chars = ((PAGE_WIDTH - 2.0 * MARGIN) / (line.size * GLYPH_WIDTH)) as usize;
        let mut current = String::new();

        for word in line.text.split(' ') {
            let mut word = word.to_string();
            while word.chars().count() > max_chars {
                if !current.is_empty() {
                    out.push(Line {
                        text: std::mem::take(&mut current),
                        size: line.size,
                    });
                }
                let head: String = word.chars().take(max_chars).collect();
                word = word.chars().skip(max_chars).collect();
                out.push(Line {
                    text: head,
                    size: line.size,
                });
            }

            let needed = current.chars().count() + usize::from(!current.is_empty()) + word.chars().count();
            if needed > max_chars && !current.is_empty() {
                out.push(Line {
                    text: std::mem::take(&mut current),
                    size: line.size,
                });
            }
            if !current.is_empty() {
                current.push(' ');
            }
            current.push_str(&word);
        }

        if !current.is_empty() {
            out.push(Line {
                text: current,
                size: line.size,
            });
        }
    }
    out
}

/// Each page is a list of `(line, baseline y)`.
fn paginate(lines: Vec<Line>) -> Vec<Vec<(Line, f32)>> {
    let mut pages = vec![Vec::new()];
    let mut y = PAGE_HEIGHT - MARGIN;

    for line in lines {
        let step = line.size * LEADING;
        if y - step < MARGIN {
            pages.push(Vec::new());
            y = PAGE_HEIGHT - MARGIN;
        }
        y -= step;
        if let Some(page) = pages.last_mut() {
            page.push((line, y));
        }
    }
    pages
}

/// WinAnsiEncoding code for a character outside printable ASCII.
fn win_ansi_byte(c: char) -> Option<u8> {
    let byte = match c {
        '\u{a0}'..='\u{ff}' => c as u8,
        '€' => 0x80,
        '‚' => 0x82,
        'ƒ' => 0x83,
        '„' => 0x84,
        '…' => 0x85,
        '†' => 0x86,
        '‡' => 0x87,
        'ˆ' => 0x88,
        '‰' => 0x89,
        'Š' => 0x8A,
        '‹' => 0x8B,
        'Œ' => 0x8C,
        'Ž' => 0x8E,
        '‘' => 0x91,
        '’' => 0x92,
        '“' => 0x93,
        '”' => 0x94,
        '•' => 0x95,
        '–' => 0x96,
        '—' => 0x97,
        '˜' => 0x98,
        '™' => 0x99,
        'š' => 0x9A,
        '›' => 0x9B,
        'œ' => 0x9C,
        'ž' => 0x9E,
        'Ÿ' => 0x9F,
        _ => return None,
    };
    Some(byte)
}

/// Escape for a PDF literal string.
///
/// Characters in WinAnsiEncoding are written as octal escapes, anything
/// else becomes `?`.
fn escape_pdf_text(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '\\' | '(' | ')' => {
                out.push('\\');
                out.push(c);
            }
            ' '..='~' => out.push(c),
            _ => match win_ansi_byte(c) {
                Some(byte) => out.push_str(&format!("\\{byte:03o}")),
                None => out.push('?'),
            },
        }
    }
    out
}

fn content_stream(page: &[(Line, f32)]) -> String {
    let mut stream = String::new();
    for (line, y) in page {
        stream.push_str(&format!(
            "BT\n/F1 {} Tf\n1 0 0 1 {} {:.2} Tm\n({}) Tj\nET\n",
            line.size,
            MARGIN,
            y,
            escape_pdf_text(&line.text)
        ));
    }
    stream
}

/// Object layout: 1 catalog, 2 page tree, 3 font, then a page object and its
/// content stream for every page.
fn write_pdf(pages: &[Vec<(Line, f32)>]) -> Vec<u8> {
    let page_obj = |idx: usize| 4 + 2 * idx;
    let kids = (0..pages.len())
        .map(|idx| format!("{} 0 R", page_obj(idx)))
        .collect::<Vec<_>>()
        .join(" ");

    let mut objects = vec![
        "<< /Type /Catalog /Pages 2 0 R >>".to_string(),
        format!("<< /Type /Pages /Kids [{kids}] /Count {} >>", pages.len()),
        "<< /Type /Font /Subtype /Type1 /BaseFont /Helvetica /Encoding /WinAnsiEncoding >>"
            .to_string(),
    ];
    for (idx, page) in pages.iter().enumerate() {
        objects.push(format!(
            "<< /Type /Page /Parent 2 0 R /MediaBox [0 0 {PAGE_WIDTH} {PAGE_HEIGHT}] \
             /Resources << /Font << /F1 3 0 R >> >> /Contents {} 0 R >>",
            page_obj(idx) + 1
        ));
        let stream = content_stream(page);
        objects.push(format!(
            "<< /Length {} >>\nstream\n{}endstream",
            stream.len(),
            stream
        ));
    }

    let mut pdf: Vec<u8> = Vec::new();
    pdf.extend_from_slice(b"%PDF-1.4\n%\xE2\xE3\xCF\xD3\n");

    let mut offsets = Vec::with_capacity(objects.len());
    for (idx, body) in objects.iter().enumerate() {
        offsets.push(pdf.len());
        pdf.extend_from_slice(format!("{} 0 obj\n{}\nendobj\n", idx + 1, body).as_bytes());
    }

    let xref_offset = pdf.len();
    let mut xref = format!("xref\n0 {}\n0000000000 65535 f \n", objects.len() + 1);
    for offset in &offsets {
        xref.push_str(&format!("{offset:010} 00000 n \n"));
    }
    pdf.extend_from_slice(xref.as_bytes());
    pdf.extend_from_slice(
        format!(
            "trailer\n<< /Size {} /Root 1 0 R >>\nstartxref\n{}\n%%EOF\n",
            objects.len() + 1,
            xref_offset
        )
        .as_bytes(),
    );
    pdf
}
