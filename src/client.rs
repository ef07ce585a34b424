//! Letterhead inspection: client name and report date

use crate::columns::normalize_ws;
use crate::extractor::DecodedPage;
use once_cell::sync::Lazy;
use regex::Regex;

static CLIENT_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b\d+\s*-\s*([A-ZÁÉÍÓÚÜÑ0-9][A-ZÁÉÍÓÚÜÑ0-9.\-&/ ]+)").unwrap()
});

static DATE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)FECHA\s*:\s*(\d{2}/\d{2}/\d{4})").unwrap());

/// Size of the top-left region searched for the client name
#[derive(Debug, Clone, Copy)]
pub struct LetterheadBand {
    /// How far below the topmost token the band extends
    pub depth: f32,
    /// Maximum left edge of a token in the band
    pub width: f32,
}

impl Default for LetterheadBand {
    fn default() -> Self {
        Self {
            depth: 160.0,
            width: 300.0,
        }
    }
}

/// Infer the client from a `<account> - <NAME>` entry in the letterhead band.
///
/// Returns an empty string when nothing matches.
pub fn detect_client(page: &DecodedPage, band: LetterheadBand) -> String {
    let Some(top_min) = page
        .tokens
        .iter()
        .map(|t| t.top)
        .min_by(|a, b| a.total_cmp(b))
    else {
        return String::new();
    };

    let text = page
        .tokens
        .iter()
        .filter(|t| t.top <= top_min + band.depth && t.left <= band.width)
        .map(|t| t.text.as_str())
        .collect::<Vec<_>>()
        .join(" ");

    CLIENT_RE
        .captures(&normalize_ws(&text))
        .and_then(|caps| caps.get(1))
        .map(|m| normalize_ws(m.as_str()))
        .unwrap_or_default()
}

/// Find the `FECHA: dd/mm/yyyy` stamp in a page's text
pub fn find_date(text: &str) -> String {
    DATE_RE
        .captures(text)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
        .unwrap_or_default()
}
