//! Spreadsheet output: one worksheet per client
//!
//! Rows are grouped by client in first-seen order. Writing goes through the
//! [`WorkbookWriter`] trait so extraction never depends on a spreadsheet API.

use crate::pipeline::{ExtractedRow, DEFAULT_CLIENT};
use crate::LedgerError;
use rust_xlsxwriter::{Format, Workbook, Worksheet};
use std::collections::{HashMap, HashSet};
use std::path::Path;

/// Output columns, in order
pub const COLUMNS: [&str; 12] = [
    "archivo",
    "fecha",
    "publicacion",
    "cant",
    "pvp",
    "alic",
    "pu_c_iva",
    "esc",
    "iva",
    "totales",
    "total_positivo",
    "total_negativo",
];

const COLUMN_WIDTH: f64 = 15.0;

/// Excel refuses longer sheet names
const MAX_SHEET_NAME: usize = 31;

/// All rows belonging to one client, ready to become a worksheet
#[derive(Debug, Clone, PartialEq)]
pub struct ClientSheet {
    /// Sanitized, unique worksheet name
    pub name: String,
    pub client: String,
    pub rows: Vec<ExtractedRow>,
}

/// Replace characters Excel forbids in sheet names and truncate
pub fn sanitize_sheet_name(name: &str) -> String {
    let cleaned: String = name
        .chars()
        .map(|c| match c {
            ':' | '\\' | '/' | '?' | '*' | '[' | ']' => '_',
            c => c,
        })
        .take(MAX_SHEET_NAME)
        .collect();
    // Excel also rejects names that start or end with an apostrophe
    let cleaned = cleaned.trim_matches('\'');
    if cleaned.is_empty() {
        DEFAULT_CLIENT.to_string()
    } else {
        cleaned.to_string()
    }
}

/// Make `name` unique (case-insensitively) against `taken` with a `~N` suffix
fn unique_sheet_name(name: String, taken: &mut HashSet<String>) -> String {
    if taken.insert(name.to_lowercase()) {
        return name;
    }
    let found = (2..)
        .map(|n| {
            let suffix = format!("~{n}");
            let keep = MAX_SHEET_NAME.saturating_sub(suffix.len());
            let mut candidate: String = name.chars().take(keep).collect();
            candidate.push_str(&suffix);
            candidate
        })
        .find(|candidate| taken.insert(candidate.to_lowercase()));
    found.unwrap_or(name)
}

/// Group rows by client, preserving first appearance order.
///
/// With no rows at all a single empty sheet for the placeholder client is
/// returned, so the workbook always has its header row.
pub fn group_by_client(rows: Vec<ExtractedRow>) -> Vec<ClientSheet> {
    if rows.is_empty() {
        return vec![ClientSheet {
            name: DEFAULT_CLIENT.to_string(),
            client: DEFAULT_CLIENT.to_string(),
            rows: Vec::new(),
        }];
    }

    let mut index: HashMap<String, usize> = HashMap::new();
    let mut groups: Vec<(String, Vec<ExtractedRow>)> = Vec::new();

    for row in rows {
        let client = if row.client.is_empty() {
            DEFAULT_CLIENT.to_string()
        } else {
            row.client.clone()
        };
        match index.get(&client) {
            Some(&i) => groups[i].1.push(row),
            None => {
                index.insert(client.clone(), groups.len());
                groups.push((client, vec![row]));
            }
        }
    }

    let mut taken = HashSet::new();
    groups
        .into_iter()
        .map(|(client, rows)| ClientSheet {
            name: unique_sheet_name(sanitize_sheet_name(&client), &mut taken),
            client,
            rows,
        })
        .collect()
}

/// Spreadsheet serialization backend
pub trait WorkbookWriter {
    /// Write all sheets to a workbook file at `path`.
    fn write(&self, sheets: &[ClientSheet], path: &Path) -> Result<(), LedgerError>;
}

/// `.xlsx` writer backed by rust_xlsxwriter
#[derive(Debug, Clone, Copy, Default)]
pub struct XlsxWorkbookWriter;

impl XlsxWorkbookWriter {
    fn build(&self, sheets: &[ClientSheet]) -> Result<Workbook, LedgerError> {
        let mut workbook = Workbook::new();
        let header_format = Format::new().set_bold();

        for sheet in sheets {
            let worksheet = workbook.add_worksheet();
            worksheet.set_name(&sheet.name)?;
            write_sheet(worksheet, sheet, &header_format)?;
        }

        Ok(workbook)
    }

    /// Serialize the workbook into memory
    pub fn to_buffer(&self, sheets: &[ClientSheet]) -> Result<Vec<u8>, LedgerError> {
        let mut workbook = self.build(sheets)?;
        Ok(workbook.save_to_buffer()?)
    }
}

impl WorkbookWriter for XlsxWorkbookWriter {
    fn write(&self, sheets: &[ClientSheet], path: &Path) -> Result<(), LedgerError> {
        let mut workbook = self.build(sheets)?;
        workbook.save(path)?;
        Ok(())
    }
}

fn write_sheet(
    worksheet: &mut Worksheet,
    sheet: &ClientSheet,
    header: &Format,
) -> Result<(), LedgerError> {
    for (col, name) in COLUMNS.iter().enumerate() {
        let col = col as u16;
        worksheet.set_column_width(col, COLUMN_WIDTH)?;
        worksheet.write_string_with_format(0, col, *name, header)?;
    }

    for (i, row) in sheet.rows.iter().enumerate() {
        let r = i as u32 + 1;
        let texts = [
            &row.source_file,
            &row.date,
            &row.description,
            &row.cant,
            &row.pvp,
            &row.alic,
            &row.pu_c_iva,
            &row.esc,
            &row.iva,
            &row.totals,
        ];
        for (col, text) in texts.iter().enumerate() {
            if !text.is_empty() {
                worksheet.write_string(r, col as u16, text.as_str())?;
            }
        }
        if let Some(v) = row.positive_total {
            worksheet.write_number(r, 10, v)?;
        }
        if let Some(v) = row.negative_total {
            worksheet.write_number(r, 11, v)?;
        }
    }

    Ok(())
}

/// Group rows by client and write them with the xlsx writer
pub fn write_workbook<P: AsRef<Path>>(rows: Vec<ExtractedRow>, path: P) -> Result<(), LedgerError> {
    XlsxWorkbookWriter.write(&group_by_client(rows), path.as_ref())
}
