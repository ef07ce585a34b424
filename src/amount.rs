//! Locale-tolerant monetary parsing
//!
//! Amounts on the reports use `.` for thousands and `,` for decimals, with
//! negatives printed either in parentheses or with a leading minus.

use once_cell::sync::Lazy;
use regex::Regex;

static DECIMAL_COMMA_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r",\d{1,2}$").unwrap());

/// Optional sign and digits at the start of the cleaned text
static LEADING_NUMBER_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^-?(?:\d+(?:\.\d*)?|\.\d+)").unwrap());

/// Parse an amount such as `"1.234,56"` or `"(50,00)"`.
///
/// Returns `None` for empty or unparseable input. Trailing garbage after the
/// leading number is ignored, so `"10-20"` parses as `10.0`. A doubled minus
/// still reads as negative: `"--5"` is `-5.0`.
pub fn parse_amount(s: &str) -> Option<f64> {
    let mut txt = s.trim();
    if txt.is_empty() {
        return None;
    }

    let mut negative = false;
    if txt.len() >= 2 && txt.starts_with('(') && txt.ends_with(')') {
        negative = true;
        txt = txt[1..txt.len() - 1].trim();
    }

    let mut cleaned: String = txt
        .chars()
        .filter(|c| c.is_ascii_digit() || matches!(c, ',' | '.' | '-'))
        .collect();

    if let Some(rest) = cleaned.strip_prefix('-') {
        negative = true;
        cleaned = rest.to_string();
    }

    let has_comma = cleaned.contains(',');
    let has_period = cleaned.contains('.');
    if has_comma && has_period {
        cleaned = cleaned.replace('.', "").replacen(',', ".", 1);
    } else if has_comma {
        cleaned = if DECIMAL_COMMA_RE.is_match(&cleaned) {
            cleaned.replacen(',', ".", 1)
        } else {
            cleaned.replacen(',', "", 1)
        };
    }

    let number = LEADING_NUMBER_RE.find(&cleaned)?;
    let value: f64 = number.as_str().parse().ok()?;
    if !value.is_finite() {
        return None;
    }

    Some(if negative { -value.abs() } else { value })
}
