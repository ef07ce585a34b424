//! Row classification
//!
//! Decides, line by line, whether a grouped line opens a section, implies a
//! section through a forcing code, carries a line item or a prior balance,
//! or is noise. Section tracking is per page and lives in [`PageState`].

use crate::columns::Cells;
use crate::headers::CanonicalHeader;
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashSet;

/// Section titles recognised on the reports
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SectionTitle {
    CargasDelDia,
    CargasExtras,
    DevolucionesDelDia,
    DevolucionesExtras,
}

impl SectionTitle {
    pub fn as_str(self) -> &'static str {
        match self {
            SectionTitle::CargasDelDia => "CARGAS DEL DIA",
            SectionTitle::CargasExtras => "CARGAS EXTRAS",
            SectionTitle::DevolucionesDelDia => "DEVOLUCIONES DEL DIA",
            SectionTitle::DevolucionesExtras => "DEVOLUCIONES EXTRAS",
        }
    }

    pub fn is_devolution(self) -> bool {
        matches!(
            self,
            SectionTitle::DevolucionesDelDia | SectionTitle::DevolucionesExtras
        )
    }

    /// Canonicalize an uppercased description that starts with a title
    fn from_description(upper: &str) -> Option<Self> {
        if upper.starts_with("CARGAS DEL DIA") {
            Some(SectionTitle::CargasDelDia)
        } else if upper.starts_with("CARGAS EXTRA") {
            Some(SectionTitle::CargasExtras)
        } else if upper.starts_with("DEVOLUCIONES DEL DIA") {
            Some(SectionTitle::DevolucionesDelDia)
        } else if upper.starts_with("DEVOLUCIONES EXTRA") {
            Some(SectionTitle::DevolucionesExtras)
        } else {
            None
        }
    }
}

impl std::fmt::Display for SectionTitle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

static TITLE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"^(CARGAS DEL DIA|CARGAS EXTRA|CARGAS EXTRAS|DEVOLUCIONES DEL DIA|DEVOLUCIONES EXTRA|DEVOLUCIONES EXTRAS)",
    )
    .unwrap()
});

static FORCING_PREFIX_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^(CD|AJ|DD)\b").unwrap());

/// Phrases that mark a carried-forward balance
const BALANCE_PREFIXES: [&str; 3] = ["SALDO ANTERIOR", "SALDO ANTERIOR *", "SALDO ANTERIOR C"];

/// Columns any one of which must hold a digit for a quantity line to count
const PRICE_COLUMNS: [CanonicalHeader; 6] = [
    CanonicalHeader::Pvp,
    CanonicalHeader::PuCIva,
    CanonicalHeader::Totales,
    CanonicalHeader::Alic,
    CanonicalHeader::Iva,
    CanonicalHeader::Esc,
];

/// Section tracking for one page, reset at every page
#[derive(Debug, Clone, Default)]
pub struct PageState {
    emitted: HashSet<SectionTitle>,
    last_devolution: Option<SectionTitle>,
}

impl PageState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a title, returning `true` the first time it is seen
    fn emit(&mut self, title: SectionTitle) -> bool {
        self.emitted.insert(title)
    }
}

/// What kind of data a line carries
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ItemKind {
    /// Quantity plus at least one price column
    LineItem,
    /// Prior balance identified by its label
    BalanceCarry,
}

/// Result of classifying one line
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LineClass {
    /// Title row to emit before any item, if this line opened a new section
    pub title: Option<SectionTitle>,
    pub item: Option<ItemKind>,
}

impl LineClass {
    pub fn is_discarded(&self) -> bool {
        self.title.is_none() && self.item.is_none()
    }
}

/// Classify a line from its description and cells.
///
/// A real title line never yields an item. A forcing code (`CD`, `AJ`, `DD`)
/// may emit its implied section and the line is then still evaluated as data.
pub fn classify_line(description: &str, cells: &Cells, state: &mut PageState) -> LineClass {
    let upper = description.to_uppercase();

    if TITLE_RE.is_match(&upper) {
        let title = SectionTitle::from_description(&upper);
        if let Some(t) = title.filter(|t| t.is_devolution()) {
            state.last_devolution = Some(t);
        }
        return LineClass {
            title: title.filter(|t| state.emit(*t)),
            item: None,
        };
    }

    let forced = FORCING_PREFIX_RE
        .captures(&upper)
        .and_then(|caps| caps.get(1))
        .and_then(|m| match m.as_str() {
            "CD" => Some(SectionTitle::CargasDelDia),
            "AJ" => Some(SectionTitle::CargasExtras),
            "DD" => state.last_devolution,
            _ => None,
        })
        .filter(|t| state.emit(*t));

    LineClass {
        title: forced,
        item: item_kind(description, cells),
    }
}

/// Decide whether the cells describe a line item or a balance carry
pub fn item_kind(description: &str, cells: &Cells) -> Option<ItemKind> {
    let has_qty = cells.has_digit(CanonicalHeader::Cant);
    let has_price = PRICE_COLUMNS.iter().any(|h| cells.has_digit(*h));
    if has_qty && has_price {
        return Some(ItemKind::LineItem);
    }

    let upper = description.to_uppercase();
    let is_balance = BALANCE_PREFIXES.iter().any(|p| upper.starts_with(p));
    if is_balance && cells.has_digit(CanonicalHeader::Totales) {
        return Some(ItemKind::BalanceCarry);
    }

    None
}
