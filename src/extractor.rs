//! Positioned text extraction from PDF using lopdf
//!
//! This module is the boundary to the PDF decoder. It turns each page into a
//! list of [`PositionedToken`]s in top-down page coordinates, which is all the
//! layout inference in the rest of the crate needs.

use crate::LedgerError;
use lopdf::{Dictionary, Document, Object, ObjectId};
use std::collections::BTreeMap;
use std::path::Path;

/// US Letter, used when a page carries no usable MediaBox.
const DEFAULT_MEDIA_BOX: [f32; 4] = [0.0, 0.0, 612.0, 792.0];

/// A text fragment with its bounding box on the page
///
/// `top` grows downward from the top edge of the page, so smaller values are
/// closer to the letterhead.
#[derive(Debug, Clone, PartialEq)]
pub struct PositionedToken {
    /// The text content
    pub text: String,
    /// Left edge (x0)
    pub left: f32,
    /// Right edge (x1)
    pub right: f32,
    /// Distance of the baseline from the top of the page
    pub top: f32,
    /// Advance width of the fragment
    pub width: f32,
    /// Rendered font size
    pub height: f32,
}

impl PositionedToken {
    pub fn new(text: impl Into<String>, left: f32, top: f32, width: f32, height: f32) -> Self {
        Self {
            text: text.into(),
            left,
            right: left + width,
            top,
            width,
            height,
        }
    }

    /// Horizontal center, used for column containment
    pub fn center_x(&self) -> f32 {
        (self.left + self.right) / 2.0
    }
}

/// One decoded page
#[derive(Debug, Clone)]
pub struct DecodedPage {
    /// Page number (1-indexed)
    pub number: u32,
    pub width: f32,
    pub height: f32,
    pub tokens: Vec<PositionedToken>,
}

impl DecodedPage {
    /// All token texts joined by a single space, in stream order
    pub fn text(&self) -> String {
        self.tokens
            .iter()
            .map(|t| t.text.as_str())
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// Options for a single decode attempt
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DecodeOptions {
    /// Load from an in-memory copy with junk before `%PDF-` and after the
    /// last `%%EOF` removed
    pub repair: bool,
}

impl DecodeOptions {
    /// Options for the single retry after a failed first attempt
    pub fn retry() -> Self {
        Self { repair: true }
    }
}

/// Trait for PDF decoding backends.
pub trait PdfDecoder {
    /// Decode every page of the document at `path` into positioned tokens.
    fn decode(&self, path: &Path, options: &DecodeOptions) -> Result<Vec<DecodedPage>, LedgerError>;

    /// Name of this backend (for diagnostics).
    fn backend_name(&self) -> &str;
}

/// Decoder backed by lopdf's content stream parser
#[derive(Debug, Clone, Copy, Default)]
pub struct LopdfDecoder;

impl PdfDecoder for LopdfDecoder {
    fn decode(
        &self,
        path: &Path,
        options: &DecodeOptions,
    ) -> Result<Vec<DecodedPage>, LedgerError> {
        if options.repair {
            let bytes = std::fs::read(path)?;
            return decode_mem(repair_pdf_bytes(&bytes));
        }
        decode_document(&Document::load(path)?)
    }

    fn backend_name(&self) -> &str {
        "lopdf"
    }
}

/// Decode pages from a PDF memory buffer
///
/// The repairing retry goes through here after trimming the buffer; callers
/// holding bytes from elsewhere can use it directly.
pub fn decode_mem(buffer: &[u8]) -> Result<Vec<DecodedPage>, LedgerError> {
    let doc = Document::load_mem(buffer)?;
    decode_document(&doc)
}

/// Strip bytes outside the `%PDF-` ... last `%%EOF` envelope.
///
/// Some generators prepend HTTP headers or BOMs and append padding, which
/// the strict loader rejects.
pub fn repair_pdf_bytes(bytes: &[u8]) -> &[u8] {
    let start = find_subslice(bytes, b"%PDF-").unwrap_or(0);
    let body = &bytes[start..];
    match rfind_subslice(body, b"%%EOF") {
        Some(pos) => &body[..pos + b"%%EOF".len()],
        None => body,
    }
}

fn find_subslice(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack.windows(needle.len()).position(|w| w == needle)
}

fn rfind_subslice(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack.windows(needle.len()).rposition(|w| w == needle)
}

fn decode_document(doc: &Document) -> Result<Vec<DecodedPage>, LedgerError> {
    let pages = doc.get_pages();
    let mut decoded = Vec::with_capacity(pages.len());

    for (page_num, &page_id) in pages.iter() {
        let media_box = page_media_box(doc, page_id);
        let tokens = extract_page_tokens(doc, page_id, media_box[3])?;
        decoded.push(DecodedPage {
            number: *page_num,
            width: media_box[2] - media_box[0],
            height: media_box[3] - media_box[1],
            tokens,
        });
    }

    Ok(decoded)
}

/// Resolve the page MediaBox, following `Parent` links for inherited boxes
fn page_media_box(doc: &Document, page_id: ObjectId) -> [f32; 4] {
    let mut current = Some(page_id);
    // Page trees are shallow; the bound only guards against cycles.
    for _ in 0..32 {
        let Some(id) = current else { break };
        let Ok(dict) = doc.get_dictionary(id) else {
            break;
        };
        if let Some(media_box) = dict
            .get(b"MediaBox")
            .ok()
            .and_then(|obj| resolve(doc, obj).as_array().ok())
            .and_then(|arr| number_array::<4>(doc, arr))
        {
            return media_box;
        }
        current = dict.get(b"Parent").and_then(Object::as_reference).ok();
    }
    DEFAULT_MEDIA_BOX
}

fn number_array<const N: usize>(doc: &Document, arr: &[Object]) -> Option<[f32; N]> {
    if arr.len() < N {
        return None;
    }
    let mut out = [0.0f32; N];
    for (slot, obj) in out.iter_mut().zip(arr) {
        *slot = get_number(resolve(doc, obj))?;
    }
    Some(out)
}

fn resolve<'a>(doc: &'a Document, obj: &'a Object) -> &'a Object {
    match obj {
        Object::Reference(id) => doc.get_object(*id).unwrap_or(obj),
        _ => obj,
    }
}

/// Multiply two 2D transformation matrices
/// Matrix format: [a, b, c, d, e, f] representing:
/// | a  b  0 |
/// | c  d  0 |
/// | e  f  1 |
fn multiply_matrices(m1: &[f32; 6], m2: &[f32; 6]) -> [f32; 6] {
    [
        m1[0] * m2[0] + m1[1] * m2[2],
        m1[0] * m2[1] + m1[1] * m2[3],
        m1[2] * m2[0] + m1[3] * m2[2],
        m1[2] * m2[1] + m1[3] * m2[3],
        m1[4] * m2[0] + m1[5] * m2[2] + m2[4],
        m1[4] * m2[1] + m1[5] * m2[3] + m2[5],
    ]
}

/// Glyph advance widths for a simple font, in 1/1000 text space units
#[derive(Debug, Default)]
struct FontMetrics {
    first_char: i64,
    widths: Vec<f32>,
    /// Type0 fonts use multi-byte codes; widths are estimated per character
    composite: bool,
}

impl FontMetrics {
    fn from_dict(doc: &Document, font: &Dictionary) -> Self {
        let composite = font
            .get(b"Subtype")
            .and_then(Object::as_name)
            .map(|n| n == b"Type0")
            .unwrap_or(false);
        let first_char = font
            .get(b"FirstChar")
            .ok()
            .and_then(|o| resolve(doc, o).as_i64().ok())
            .unwrap_or(0);
        let widths = font
            .get(b"Widths")
            .ok()
            .and_then(|o| resolve(doc, o).as_array().ok())
            .map(|arr| {
                arr.iter()
                    .map(|w| get_number(resolve(doc, w)).unwrap_or(0.0))
                    .collect()
            })
            .unwrap_or_default();
        Self {
            first_char,
            widths,
            composite,
        }
    }

    /// Width of the raw string bytes, in text space units at size 1
    fn string_width(&self, bytes: &[u8], decoded: &str) -> f32 {
        if self.composite || self.widths.is_empty() {
            return decoded.chars().count() as f32 * 0.5;
        }
        bytes
            .iter()
            .map(|&b| {
                let idx = i64::from(b) - self.first_char;
                usize::try_from(idx)
                    .ok()
                    .and_then(|i| self.widths.get(i))
                    .copied()
                    .filter(|w| *w > 0.0)
                    .unwrap_or(500.0)
                    / 1000.0
            })
            .sum()
    }
}

/// Text state carried between operators inside a content stream
struct TextState {
    ctm: [f32; 6],
    text_matrix: [f32; 6],
    line_matrix: [f32; 6],
    font: String,
    font_size: f32,
    char_spacing: f32,
    word_spacing: f32,
    leading: Option<f32>,
}

impl TextState {
    fn new() -> Self {
        Self {
            ctm: [1.0, 0.0, 0.0, 1.0, 0.0, 0.0],
            text_matrix: [1.0, 0.0, 0.0, 1.0, 0.0, 0.0],
            line_matrix: [1.0, 0.0, 0.0, 1.0, 0.0, 0.0],
            font: String::new(),
            font_size: 12.0,
            char_spacing: 0.0,
            word_spacing: 0.0,
            leading: None,
        }
    }

    fn next_line(&mut self) {
        let leading = self.leading.unwrap_or(self.font_size * 1.2);
        self.translate_line(0.0, -leading);
    }

    fn translate_line(&mut self, tx: f32, ty: f32) {
        self.line_matrix = multiply_matrices(&[1.0, 0.0, 0.0, 1.0, tx, ty], &self.line_matrix);
        self.text_matrix = self.line_matrix;
    }

    /// Advance the text matrix by `tx` text space units
    fn advance(&mut self, tx: f32) {
        self.text_matrix = multiply_matrices(&[1.0, 0.0, 0.0, 1.0, tx, 0.0], &self.text_matrix);
    }
}

/// Extract positioned tokens from a single page
fn extract_page_tokens(
    doc: &Document,
    page_id: ObjectId,
    page_top: f32,
) -> Result<Vec<PositionedToken>, LedgerError> {
    use lopdf::content::Content;

    let mut tokens = Vec::new();

    let fonts = doc.get_page_fonts(page_id).unwrap_or_default();
    let mut metrics: BTreeMap<Vec<u8>, FontMetrics> = BTreeMap::new();

    let content_data = doc
        .get_page_content(page_id)
        .map_err(|e| LedgerError::Parse(e.to_string()))?;

    let content = Content::decode(&content_data).map_err(|e| LedgerError::Parse(e.to_string()))?;

    let mut state = TextState::new();
    let mut ctm_stack: Vec<[f32; 6]> = Vec::new();
    let mut in_text_block = false;

    for op in &content.operations {
        let operands = &op.operands;
        match op.operator.as_str() {
            "q" => ctm_stack.push(state.ctm),
            "Q" => {
                if let Some(saved) = ctm_stack.pop() {
                    state.ctm = saved;
                }
            }
            "cm" => {
                if let Some(m) = number_array::<6>(doc, operands) {
                    state.ctm = multiply_matrices(&m, &state.ctm);
                }
            }
            "BT" => {
                in_text_block = true;
                state.text_matrix = [1.0, 0.0, 0.0, 1.0, 0.0, 0.0];
                state.line_matrix = state.text_matrix;
            }
            "ET" => in_text_block = false,
            "Tf" => {
                if operands.len() >= 2 {
                    if let Ok(name) = operands[0].as_name() {
                        state.font = String::from_utf8_lossy(name).to_string();
                        if !metrics.contains_key(name) {
                            let m = fonts
                                .get(name)
                                .map(|dict| FontMetrics::from_dict(doc, dict))
                                .unwrap_or_default();
                            metrics.insert(name.to_vec(), m);
                        }
                    }
                    if let Some(size) = get_number(&operands[1]) {
                        state.font_size = size;
                    }
                }
            }
            "Tc" => {
                if let Some(v) = operands.first().and_then(get_number) {
                    state.char_spacing = v;
                }
            }
            "Tw" => {
                if let Some(v) = operands.first().and_then(get_number) {
                    state.word_spacing = v;
                }
            }
            "TL" => state.leading = operands.first().and_then(get_number),
            "Td" | "TD" => {
                if operands.len() >= 2 {
                    let tx = get_number(&operands[0]).unwrap_or(0.0);
                    let ty = get_number(&operands[1]).unwrap_or(0.0);
                    if op.operator == "TD" {
                        state.leading = Some(-ty);
                    }
                    state.translate_line(tx, ty);
                }
            }
            "Tm" => {
                if let Some(m) = number_array::<6>(doc, operands) {
                    state.text_matrix = m;
                    state.line_matrix = m;
                }
            }
            "T*" => state.next_line(),
            "Tj" | "'" | "\"" => {
                let string_operand = match op.operator.as_str() {
                    "Tj" => operands.first(),
                    "'" => {
                        state.next_line();
                        operands.first()
                    }
                    _ => {
                        if operands.len() >= 3 {
                            state.word_spacing = get_number(&operands[0]).unwrap_or(0.0);
                            state.char_spacing = get_number(&operands[1]).unwrap_or(0.0);
                        }
                        state.next_line();
                        operands.get(2)
                    }
                };
                if !in_text_block {
                    continue;
                }
                if let Some(obj) = string_operand {
                    let font_metrics = metrics.get(state.font.as_bytes());
                    let run = show_strings(doc, &fonts, font_metrics, &mut state, &[obj]);
                    push_token(&mut tokens, run, page_top);
                }
            }
            "TJ" => {
                if !in_text_block {
                    continue;
                }
                if let Some(Ok(array)) = operands.first().map(Object::as_array) {
                    let font_metrics = metrics.get(state.font.as_bytes());
                    let parts: Vec<&Object> = array.iter().collect();
                    let run = show_strings(doc, &fonts, font_metrics, &mut state, &parts);
                    push_token(&mut tokens, run, page_top);
                }
            }
            _ => {}
        }
    }

    Ok(tokens)
}

/// A shown text run in device space, before conversion to page-top coordinates
struct TextRun {
    text: String,
    x: f32,
    y: f32,
    width: f32,
    font_size: f32,
}

fn push_token(tokens: &mut Vec<PositionedToken>, run: Option<TextRun>, page_top: f32) {
    if let Some(run) = run {
        if !run.text.trim().is_empty() {
            tokens.push(PositionedToken::new(
                run.text,
                run.x,
                page_top - run.y,
                run.width,
                run.font_size,
            ));
        }
    }
}

/// Show a sequence of strings (and `TJ` kerning numbers), advancing the text
/// matrix, and return the combined run
fn show_strings(
    doc: &Document,
    fonts: &BTreeMap<Vec<u8>, &Dictionary>,
    metrics: Option<&FontMetrics>,
    state: &mut TextState,
    parts: &[&Object],
) -> Option<TextRun> {
    let start = multiply_matrices(&state.text_matrix, &state.ctm);
    let mut text = String::new();

    for part in parts {
        match part {
            Object::String(bytes, _) => {
                let Some(decoded) = extract_text_from_operand(part, doc, fonts, &state.font) else {
                    continue;
                };
                let glyphs = metrics
                    .map(|m| m.string_width(bytes, &decoded))
                    .unwrap_or(decoded.chars().count() as f32 * 0.5);
                let spaces = bytes.iter().filter(|&&b| b == b' ').count() as f32;
                let count = decoded.chars().count() as f32;
                let tx = glyphs * state.font_size
                    + count * state.char_spacing
                    + spaces * state.word_spacing;
                state.advance(tx);
                text.push_str(&decoded);
            }
            other => {
                // Kerning adjustment in thousandths of an em
                if let Some(adj) = get_number(other) {
                    state.advance(-adj / 1000.0 * state.font_size);
                }
            }
        }
    }

    if text.is_empty() {
        return None;
    }

    let end = multiply_matrices(&state.text_matrix, &state.ctm);
    let width = ((end[4] - start[4]).powi(2) + (end[5] - start[5]).powi(2)).sqrt();
    Some(TextRun {
        text,
        x: start[4],
        y: start[5],
        width,
        font_size: effective_font_size(state.font_size, &start),
    })
}

/// Helper to get f32 from Object
fn get_number(obj: &Object) -> Option<f32> {
    match obj {
        Object::Integer(i) => Some(*i as f32),
        Object::Real(r) => Some(*r),
        _ => None,
    }
}

/// Compute effective font size from base size and a text rendering matrix
fn effective_font_size(base_size: f32, matrix: &[f32; 6]) -> f32 {
    let scale_x = (matrix[0].powi(2) + matrix[1].powi(2)).sqrt();
    let scale_y = (matrix[2].powi(2) + matrix[3].powi(2)).sqrt();
    base_size * scale_x.max(scale_y)
}

/// Extract text from a text operand, handling encoding
fn extract_text_from_operand(
    obj: &Object,
    doc: &Document,
    fonts: &BTreeMap<Vec<u8>, &Dictionary>,
    current_font: &str,
) -> Option<String> {
    if let Object::String(bytes, _) = obj {
        if let Some(font_dict) = fonts.get(current_font.as_bytes()) {
            if let Ok(encoding) = font_dict.get_font_encoding(doc) {
                if let Ok(text) = Document::decode_text(&encoding, bytes) {
                    return Some(text);
                }
            }
        }

        // Fallback: try UTF-16BE then Latin-1
        if bytes.len() >= 2 && bytes[0] == 0xFE && bytes[1] == 0xFF {
            let utf16: Vec<u16> = bytes[2..]
                .chunks_exact(2)
                .map(|chunk| u16::from_be_bytes([chunk[0], chunk[1]]))
                .collect();
            return Some(String::from_utf16_lossy(&utf16));
        }

        Some(bytes.iter().map(|&b| b as char).collect())
    } else {
        None
    }
}
