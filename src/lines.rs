//! Visual line reconstruction
//!
//! Clusters scattered tokens into printed lines by vertical proximity.

use crate::extractor::PositionedToken;

/// A line of tokens sharing a vertical band, sorted left to right
#[derive(Debug, Clone, PartialEq)]
pub struct LogicalLine {
    pub tokens: Vec<PositionedToken>,
    /// Baseline `top` of the first token that opened the line
    pub top: f32,
}

impl LogicalLine {
    pub fn text(&self) -> String {
        self.tokens
            .iter()
            .map(|t| t.text.as_str())
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// Group tokens lying strictly between `y_start` and `y_end` into lines.
///
/// Tokens are ordered by `top` rounded to one decimal, then by left edge. A
/// token joins the open line while it stays within `tolerance` of the line's
/// baseline; otherwise the line is closed and a new one starts at the token.
pub fn group_lines(
    tokens: &[PositionedToken],
    y_start: f32,
    y_end: Option<f32>,
    tolerance: f32,
) -> Vec<LogicalLine> {
    let mut recs: Vec<&PositionedToken> = tokens
        .iter()
        .filter(|t| t.top > y_start && y_end.map_or(true, |end| t.top < end))
        .collect();

    recs.sort_by(|a, b| {
        let ka = (a.top * 10.0).round() as i64;
        let kb = (b.top * 10.0).round() as i64;
        ka.cmp(&kb).then(a.left.total_cmp(&b.left))
    });

    let mut lines = Vec::new();
    let mut current: Vec<PositionedToken> = Vec::new();
    let mut base: Option<f32> = None;

    for token in recs {
        match base {
            Some(b) if (token.top - b).abs() <= tolerance => current.push(token.clone()),
            Some(b) => {
                lines.push(close_line(std::mem::take(&mut current), b));
                current.push(token.clone());
                base = Some(token.top);
            }
            None => {
                current.push(token.clone());
                base = Some(token.top);
            }
        }
    }

    if let Some(b) = base {
        if !current.is_empty() {
            lines.push(close_line(current, b));
        }
    }

    lines
}

fn close_line(mut tokens: Vec<PositionedToken>, top: f32) -> LogicalLine {
    tokens.sort_by(|a, b| a.left.total_cmp(&b.left));
    LogicalLine { tokens, top }
}
