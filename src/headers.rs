//! Column header detection
//!
//! Locates the canonical ledger headers among a page's tokens and derives
//! contiguous horizontal column bands from their centers.

use crate::extractor::PositionedToken;
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashMap;

/// The column labels the ledger layout is built around
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum CanonicalHeader {
    Cant,
    Pvp,
    Alic,
    PuCIva,
    Esc,
    Iva,
    Totales,
}

impl CanonicalHeader {
    /// All headers in canonical column order
    pub const ALL: [CanonicalHeader; 7] = [
        CanonicalHeader::Cant,
        CanonicalHeader::Pvp,
        CanonicalHeader::Alic,
        CanonicalHeader::PuCIva,
        CanonicalHeader::Esc,
        CanonicalHeader::Iva,
        CanonicalHeader::Totales,
    ];

    /// The canonical label as printed on the report
    pub fn as_str(self) -> &'static str {
        match self {
            CanonicalHeader::Cant => "CANT",
            CanonicalHeader::Pvp => "P.V.P",
            CanonicalHeader::Alic => "ALIC.",
            CanonicalHeader::PuCIva => "PU C/IVA",
            CanonicalHeader::Esc => "Esc",
            CanonicalHeader::Iva => "I V A",
            CanonicalHeader::Totales => "TOTALES $",
        }
    }

    pub(crate) fn index(self) -> usize {
        self as usize
    }
}

impl std::fmt::Display for CanonicalHeader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Tolerant header patterns, evaluated in order against compacted text
static HEADER_PATTERNS: Lazy<Vec<(Regex, CanonicalHeader)>> = Lazy::new(|| {
    [
        (r"(?i)^CANT\.?$", CanonicalHeader::Cant),
        (r"(?i)^P\s*\.?\s*V\s*\.?\s*P\.?$", CanonicalHeader::Pvp),
        (r"(?i)^ALIC\.?$", CanonicalHeader::Alic),
        (r"(?i)^PU\s*C/?IVA$", CanonicalHeader::PuCIva),
        (r"(?i)^ESC$", CanonicalHeader::Esc),
        (r"(?i)^I\s*V\s*A$", CanonicalHeader::Iva),
        (r"(?i)^TOTALES?\s*\$?$", CanonicalHeader::Totales),
    ]
    .into_iter()
    .map(|(pat, header)| (Regex::new(pat).unwrap(), header))
    .collect()
});

/// Horizontal band owned by one column
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ColumnBound {
    pub name: CanonicalHeader,
    pub left: f32,
    pub right: f32,
}

impl ColumnBound {
    /// Half-open containment: `left <= x < right`
    pub fn contains(&self, x: f32) -> bool {
        self.left <= x && x < self.right
    }
}

/// Column layout recovered from a page's header row
#[derive(Debug, Clone, PartialEq)]
pub struct HeaderLayout {
    /// Bands ordered by increasing center
    pub bounds: Vec<ColumnBound>,
    /// Tokens must lie strictly below this `top` to count as data
    pub header_y: f32,
}

impl HeaderLayout {
    pub fn bound(&self, name: CanonicalHeader) -> Option<&ColumnBound> {
        self.bounds.iter().find(|b| b.name == name)
    }
}

/// Remove all whitespace and uppercase
fn compact(s: &str) -> String {
    s.chars()
        .filter(|c| !c.is_whitespace())
        .collect::<String>()
        .to_uppercase()
}

/// Match a token's text against the header table
pub fn match_header_name(text: &str) -> Option<CanonicalHeader> {
    let compacted = compact(text);
    HEADER_PATTERNS
        .iter()
        .find(|(re, _)| re.is_match(&compacted))
        .map(|(_, header)| *header)
}

/// Find the header row and derive column bounds.
///
/// Returns `None` when fewer than `min_headers` distinct headers are present.
pub fn find_header_bounds(
    tokens: &[PositionedToken],
    min_headers: usize,
    header_margin: f32,
) -> Option<HeaderLayout> {
    let mut hits: HashMap<CanonicalHeader, &PositionedToken> = HashMap::new();

    for token in tokens {
        if let Some(header) = match_header_name(&token.text) {
            let keep = hits.get(&header).map_or(true, |prev| token.top < prev.top);
            if keep {
                hits.insert(header, token);
            }
        }
    }

    if hits.len() < min_headers.max(2) {
        return None;
    }

    let mut centers: Vec<(CanonicalHeader, f32)> =
        hits.iter().map(|(h, t)| (*h, t.center_x())).collect();
    centers.sort_by(|a, b| a.1.total_cmp(&b.1).then(a.0.cmp(&b.0)));

    let last = centers.len() - 1;
    let bounds = centers
        .iter()
        .enumerate()
        .map(|(i, &(name, c))| {
            let left = if i == 0 {
                c - (centers[1].1 - c) / 2.0
            } else {
                (centers[i - 1].1 + c) / 2.0
            };
            let right = if i == last {
                c + (c - centers[i - 1].1) / 2.0
            } else {
                (centers[i + 1].1 + c) / 2.0
            };
            ColumnBound { name, left, right }
        })
        .collect();

    let header_top = hits.values().map(|t| t.top).fold(f32::INFINITY, f32::min);

    Some(HeaderLayout {
        bounds,
        header_y: header_top + header_margin,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn header(text: &str, left: f32, top: f32) -> PositionedToken {
        PositionedToken::new(text, left, top, 20.0, 8.0)
    }

    fn full_header_row(top: f32) -> Vec<PositionedToken> {
        vec![
            header("CANT.", 200.0, top),
            header("P.V.P", 250.0, top),
            header("ALIC.", 300.0, top),
            header("PU C/IVA", 350.0, top),
            header("Esc", 400.0, top),
            header("I V A", 450.0, top),
            header("TOTALES $", 500.0, top),
        ]
    }

    #[test]
    fn test_header_variants() {
        assert_eq!(match_header_name("CANT"), Some(CanonicalHeader::Cant));
        assert_eq!(match_header_name("cant."), Some(CanonicalHeader::Cant));
        assert_eq!(match_header_name("P V P"), Some(CanonicalHeader::Pvp));
        assert_eq!(match_header_name("P.V.P."), Some(CanonicalHeader::Pvp));
        assert_eq!(match_header_name("PU CIVA"), Some(CanonicalHeader::PuCIva));
        assert_eq!(match_header_name("IVA"), Some(CanonicalHeader::Iva));
        assert_eq!(
            match_header_name("TOTALES $"),
            Some(CanonicalHeader::Totales)
        );
        assert_eq!(match_header_name("TOTALES"), Some(CanonicalHeader::Totales));
        assert_eq!(match_header_name("CANTIDAD"), None);
        assert_eq!(match_header_name("ESCALA"), None);
    }

    #[test]
    fn test_bounds_contiguous_and_ordered() {
        let layout = find_header_bounds(&full_header_row(100.0), 5, 6.0).unwrap();
        assert_eq!(layout.bounds.len(), 7);
        for pair in layout.bounds.windows(2) {
            assert!(pair[0].left < pair[1].left);
            // Bands must touch
            assert!((pair[0].right - pair[1].left).abs() < 1e-4);
        }
        // Centers at 210, 260, ... so the first band mirrors the next gap
        assert!((layout.bounds[0].left - 185.0).abs() < 1e-4);
        assert!((layout.bounds[6].right - 535.0).abs() < 1e-4);
        assert!((layout.header_y - 106.0).abs() < 1e-4);
    }

    #[test]
    fn test_topmost_occurrence_wins() {
        let mut tokens = full_header_row(100.0);
        // A later "IVA" in the body must not move the header row
        tokens.push(header("IVA", 120.0, 300.0));
        tokens.push(header("CANT", 20.0, 40.0));
        let layout = find_header_bounds(&tokens, 5, 6.0).unwrap();
        assert!((layout.header_y - 46.0).abs() < 1e-4);
        let iva = layout.bound(CanonicalHeader::Iva).unwrap();
        assert!(iva.contains(460.0));
    }

    #[test]
    fn test_too_few_headers() {
        let tokens: Vec<_> = full_header_row(100.0).into_iter().take(4).collect();
        assert!(find_header_bounds(&tokens, 5, 6.0).is_none());
    }

    #[test]
    fn test_exactly_five_headers() {
        let tokens: Vec<_> = full_header_row(100.0).into_iter().take(5).collect();
        let layout = find_header_bounds(&tokens, 5, 6.0).unwrap();
        assert_eq!(layout.bounds.len(), 5);
        assert!(layout.bound(CanonicalHeader::Totales).is_none());
    }
}
