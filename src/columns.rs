//! Column assignment for a single line

use crate::extractor::PositionedToken;
use crate::headers::{CanonicalHeader, ColumnBound};
use crate::lines::LogicalLine;

/// Collapse runs of whitespace to one space and trim
pub fn normalize_ws(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Normalized text per canonical column; every column is always present
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Cells {
    values: [String; 7],
}

impl Cells {
    pub fn get(&self, header: CanonicalHeader) -> &str {
        &self.values[header.index()]
    }

    pub fn set(&mut self, header: CanonicalHeader, value: impl Into<String>) {
        self.values[header.index()] = value.into();
    }

    fn append(&mut self, header: CanonicalHeader, text: &str) {
        let cell = &mut self.values[header.index()];
        if !cell.is_empty() {
            cell.push(' ');
        }
        cell.push_str(text);
    }

    pub fn has_digit(&self, header: CanonicalHeader) -> bool {
        self.get(header).chars().any(|c| c.is_ascii_digit())
    }
}

/// Place every token of a line into the column whose band holds its center.
///
/// Tokens outside all bands are ignored here; see [`description_text`].
pub fn place_into_columns(line: &LogicalLine, bounds: &[ColumnBound]) -> Cells {
    let mut cells = Cells::default();

    for token in &line.tokens {
        let xc = token.center_x();
        if let Some(bound) = bounds.iter().find(|b| b.contains(xc)) {
            cells.append(bound.name, &token.text);
        }
    }

    for value in cells.values.iter_mut() {
        *value = normalize_ws(value);
    }

    cells
}

/// Text of the tokens whose center lies left of `edge`, in reading order.
///
/// This is the item label printed before the first numeric column.
pub fn description_text(line: &LogicalLine, edge: f32) -> String {
    let mut left: Vec<&PositionedToken> = line
        .tokens
        .iter()
        .filter(|t| t.center_x() < edge)
        .collect();
    left.sort_by(|a, b| a.left.total_cmp(&b.left));
    let text = left
        .iter()
        .map(|t| t.text.as_str())
        .collect::<Vec<_>>()
        .join(" ");
    normalize_ws(&text)
}
