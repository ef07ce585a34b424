//! Page and document orchestration
//!
//! Drives header location, line grouping, column assignment and
//! classification for every page of every input document, accumulating
//! [`ExtractedRow`]s in input order.

use crate::amount::parse_amount;
use crate::classify::{classify_line, PageState, SectionTitle};
use crate::client::{detect_client, find_date, LetterheadBand};
use crate::columns::{description_text, place_into_columns};
use crate::extractor::{DecodeOptions, DecodedPage, LopdfDecoder, PdfDecoder};
use crate::headers::{find_header_bounds, CanonicalHeader};
use crate::lines::group_lines;
use crate::LedgerError;
use log::{debug, info, warn};
use std::path::Path;

/// Client name used when a page has no recognisable letterhead
pub const DEFAULT_CLIENT: &str = "SIN_NOMBRE";

/// Tunables for layout inference
#[derive(Debug, Clone)]
pub struct ExtractionConfig {
    /// Added to the topmost header's `top` to get the data threshold
    pub header_margin: f32,
    /// Maximum vertical distance from a line's baseline to join it
    pub line_tolerance: f32,
    /// Minimum number of distinct canonical headers for a page to be read
    pub min_headers: usize,
    /// Region searched for the client name
    pub letterhead: LetterheadBand,
    /// Tokens must end this far left of the CANT band to be description
    pub description_gap: f32,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            header_margin: 6.0,
            line_tolerance: 3.5,
            min_headers: 5,
            letterhead: LetterheadBand::default(),
            description_gap: 1.0,
        }
    }
}

/// One output record, either a section title or a data line
#[derive(Debug, Clone, PartialEq)]
pub struct ExtractedRow {
    pub client: String,
    pub source_file: String,
    pub date: String,
    pub description: String,
    pub cant: String,
    pub pvp: String,
    pub alic: String,
    pub pu_c_iva: String,
    pub esc: String,
    pub iva: String,
    pub totals: String,
    pub positive_total: Option<f64>,
    pub negative_total: Option<f64>,
}

impl ExtractedRow {
    /// A section marker row; only the client and description are filled
    pub fn title(client: &str, title: SectionTitle) -> Self {
        Self {
            client: client.to_string(),
            source_file: String::new(),
            date: String::new(),
            description: title.as_str().to_string(),
            cant: String::new(),
            pvp: String::new(),
            alic: String::new(),
            pu_c_iva: String::new(),
            esc: String::new(),
            iva: String::new(),
            totals: String::new(),
            positive_total: None,
            negative_total: None,
        }
    }

    pub fn is_title(&self) -> bool {
        self.source_file.is_empty() && self.cant.is_empty() && self.totals.is_empty()
    }
}

/// Extract all rows from one decoded page.
///
/// Pages without a recognisable header row yield nothing.
pub fn extract_page(
    page: &DecodedPage,
    source_file: &str,
    config: &ExtractionConfig,
) -> Vec<ExtractedRow> {
    let mut rows = Vec::new();

    let Some(layout) = find_header_bounds(&page.tokens, config.min_headers, config.header_margin)
    else {
        debug!("page {}: header row not found, skipping", page.number);
        return rows;
    };

    let date = find_date(&page.text());
    let client = match detect_client(page, config.letterhead) {
        c if c.is_empty() => DEFAULT_CLIENT.to_string(),
        c => c,
    };

    let description_edge = layout
        .bound(CanonicalHeader::Cant)
        .or_else(|| layout.bounds.first())
        .map(|b| b.left - config.description_gap);

    let mut state = PageState::new();
    let mut discarded = 0usize;

    for line in group_lines(&page.tokens, layout.header_y, None, config.line_tolerance) {
        let description = description_edge
            .map(|edge| description_text(&line, edge))
            .unwrap_or_default();
        let cells = place_into_columns(&line, &layout.bounds);

        let class = classify_line(&description, &cells, &mut state);
        if let Some(title) = class.title {
            rows.push(ExtractedRow::title(&client, title));
        }
        if class.item.is_none() {
            if class.title.is_none() {
                discarded += 1;
            }
            continue;
        }

        let totals = cells.get(CanonicalHeader::Totales).to_string();
        let total = parse_amount(&totals);
        rows.push(ExtractedRow {
            client: client.clone(),
            source_file: source_file.to_string(),
            date: date.clone(),
            description,
            cant: cells.get(CanonicalHeader::Cant).to_string(),
            pvp: cells.get(CanonicalHeader::Pvp).to_string(),
            alic: cells.get(CanonicalHeader::Alic).to_string(),
            pu_c_iva: cells.get(CanonicalHeader::PuCIva).to_string(),
            esc: cells.get(CanonicalHeader::Esc).to_string(),
            iva: cells.get(CanonicalHeader::Iva).to_string(),
            totals,
            positive_total: total.filter(|v| *v > 0.0),
            negative_total: total.filter(|v| *v < 0.0),
        });
    }

    debug!(
        "page {}: {} rows, {} lines discarded",
        page.number,
        rows.len(),
        discarded
    );
    rows
}

/// Extract rows from every page of an already decoded document
pub fn extract_pages(
    pages: &[DecodedPage],
    source_file: &str,
    config: &ExtractionConfig,
) -> Vec<ExtractedRow> {
    pages
        .iter()
        .flat_map(|page| extract_page(page, source_file, config))
        .collect()
}

/// Decode with one retry using the repairing loader
fn decode_with_retry(
    decoder: &dyn PdfDecoder,
    path: &Path,
) -> Result<Vec<DecodedPage>, LedgerError> {
    match decoder.decode(path, &DecodeOptions::default()) {
        Ok(pages) => Ok(pages),
        Err(first) => {
            warn!(
                "{}: {} decode failed ({}), retrying with repair",
                path.display(),
                decoder.backend_name(),
                first
            );
            decoder.decode(path, &DecodeOptions::retry())
        }
    }
}

fn file_label(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

/// Process one PDF into rows
pub fn process_pdf_with<P: AsRef<Path>>(
    path: P,
    decoder: &dyn PdfDecoder,
    config: &ExtractionConfig,
) -> Result<Vec<ExtractedRow>, LedgerError> {
    let path = path.as_ref();
    let file = file_label(path);

    let pages = decode_with_retry(decoder, path).map_err(|e| LedgerError::Document {
        file: file.clone(),
        source: Box::new(e),
    })?;

    let rows = extract_pages(&pages, &file, config);
    info!("{}: {} pages, {} rows", file, pages.len(), rows.len());
    Ok(rows)
}

/// Process several PDFs in order; the first failure aborts the batch
pub fn process_pdf_files_with<P: AsRef<Path>>(
    paths: &[P],
    decoder: &dyn PdfDecoder,
    config: &ExtractionConfig,
) -> Result<Vec<ExtractedRow>, LedgerError> {
    let mut all_rows = Vec::new();
    for path in paths {
        all_rows.extend(process_pdf_with(path, decoder, config)?);
    }
    Ok(all_rows)
}

/// Process several PDFs with the lopdf decoder and default configuration
pub fn process_pdf_files<P: AsRef<Path>>(paths: &[P]) -> Result<Vec<ExtractedRow>, LedgerError> {
    process_pdf_files_with(paths, &LopdfDecoder, &ExtractionConfig::default())
}
