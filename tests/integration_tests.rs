//! Integration tests for pdf-ledger

use calamine::{Data, Reader, Xlsx};
use pdf_ledger::extractor::{DecodeOptions, PdfDecoder};
use pdf_ledger::workbook::COLUMNS;
use pdf_ledger::{
    extract_page, group_by_client, group_lines, parse_amount, process_pdf_files,
    process_pdf_files_with, write_workbook, DecodedPage, ExtractedRow, ExtractionConfig,
    LedgerError, PositionedToken, WorkbookWriter, XlsxWorkbookWriter, DEFAULT_CLIENT,
};
use std::io::Cursor;
use std::path::Path;

// Helper to create test tokens; width scales with text length like real glyph runs
fn make_token(text: &str, left: f32, top: f32) -> PositionedToken {
    PositionedToken::new(text, left, top, text.len() as f32 * 4.0, 8.0)
}

fn header_row(top: f32) -> Vec<PositionedToken> {
    vec![
        make_token("CANT.", 190.0, top),
        make_token("P.V.P", 240.0, top),
        make_token("ALIC.", 290.0, top),
        make_token("PU C/IVA", 330.0, top),
        make_token("Esc", 400.0, top),
        make_token("I V A", 440.0, top),
        make_token("TOTALES $", 480.0, top),
    ]
}

fn make_page(client: Option<&str>, body: Vec<PositionedToken>) -> DecodedPage {
    let mut tokens = Vec::new();
    if let Some(c) = client {
        tokens.push(make_token(c, 30.0, 40.0));
    }
    tokens.push(make_token("FECHA: 14/06/2024", 420.0, 40.0));
    tokens.extend(header_row(220.0));
    tokens.extend(body);
    DecodedPage {
        number: 1,
        width: 612.0,
        height: 792.0,
        tokens,
    }
}

fn item_line(desc: &str, cant: &str, pvp: &str, total: &str, top: f32) -> Vec<PositionedToken> {
    vec![
        make_token(desc, 30.0, top),
        make_token(cant, 196.0, top + 0.2),
        make_token(pvp, 242.0, top - 0.1),
        make_token(total, 486.0, top),
    ]
}

/// Decoder serving canned pages keyed by file name
struct CannedDecoder {
    pages: Vec<(&'static str, Vec<DecodedPage>)>,
}

impl PdfDecoder for CannedDecoder {
    fn decode(
        &self,
        path: &Path,
        _options: &DecodeOptions,
    ) -> Result<Vec<DecodedPage>, LedgerError> {
        let name = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or_default();
        self.pages
            .iter()
            .find(|(n, _)| *n == name)
            .map(|(_, pages)| pages.clone())
            .ok_or_else(|| LedgerError::Parse(format!("no such document: {name}")))
    }

    fn backend_name(&self) -> &str {
        "canned"
    }
}

fn cell_text(cell: Option<&Data>) -> String {
    match cell {
        Some(Data::String(s)) => s.clone(),
        Some(Data::Float(f)) => f.to_string(),
        _ => String::new(),
    }
}

// ============================================================================
// End-to-end extraction
// ============================================================================

#[test]
fn test_single_page_end_to_end() {
    let page = make_page(
        Some("123 - ACME CORP"),
        item_line("REVISTA GENTE", "3", "50,00", "150,00", 240.0),
    );
    let rows = extract_page(&page, "reporte.pdf", &ExtractionConfig::default());

    assert_eq!(rows.len(), 1);
    let row = &rows[0];
    assert_eq!(row.client, "ACME CORP");
    assert_eq!(row.source_file, "reporte.pdf");
    assert_eq!(row.date, "14/06/2024");
    assert_eq!(row.description, "REVISTA GENTE");
    assert_eq!(row.cant, "3");
    assert_eq!(row.pvp, "50,00");
    assert_eq!(row.totals, "150,00");
    assert_eq!(row.alic, "");
    assert_eq!(row.positive_total, Some(150.0));
    assert_eq!(row.negative_total, None);
}

#[test]
fn test_sections_balance_and_noise() {
    let mut body = Vec::new();
    body.push(make_token("SALDO ANTERIOR", 30.0, 235.0));
    body.push(make_token("1.500,00", 486.0, 235.0));
    body.push(make_token("CARGAS DEL DIA", 30.0, 250.0));
    body.extend(item_line("DIARIO", "10", "120,00", "1.200,00", 262.0));
    body.push(make_token("Subtotal de hoja", 30.0, 275.0));
    body.push(make_token("DEVOLUCIONES DEL DIA", 30.0, 290.0));
    body.extend(item_line("DD 0001 DIARIO", "2", "120,00", "(240,00)", 302.0));
    body.extend(item_line("AJ 0002 AJUSTE", "1", "5,00", "-5,00", 314.0));

    let page = make_page(Some("77 - KIOSCO SUR"), body);
    let rows = extract_page(&page, "a.pdf", &ExtractionConfig::default());
    let descs: Vec<&str> = rows.iter().map(|r| r.description.as_str()).collect();
    assert_eq!(
        descs,
        [
            "SALDO ANTERIOR",
            "CARGAS DEL DIA",
            "DIARIO",
            "DEVOLUCIONES DEL DIA",
            "DD 0001 DIARIO",
            "CARGAS EXTRAS",
            "AJ 0002 AJUSTE",
        ]
    );
    assert_eq!(rows[0].positive_total, Some(1500.0));
    assert_eq!(rows[0].cant, "");
    assert!(rows[1].is_title());
    assert_eq!(rows[4].negative_total, Some(-240.0));
    assert!(rows[5].is_title());
    assert_eq!(rows[6].negative_total, Some(-5.0));
}

#[test]
fn test_titles_reset_per_page() {
    let config = ExtractionConfig::default();
    let body = || {
        let mut b = vec![make_token("CARGAS DEL DIA", 30.0, 235.0)];
        b.extend(item_line("DIARIO", "1", "1,00", "1,00", 250.0));
        b
    };
    let mut second = make_page(Some("1 - A"), body());
    second.number = 2;
    let decoder = CannedDecoder {
        pages: vec![("two.pdf", vec![make_page(Some("1 - A"), body()), second])],
    };
    let rows = process_pdf_files_with(&["two.pdf"], &decoder, &config).unwrap();
    let titles = rows.iter().filter(|r| r.is_title()).count();
    assert_eq!(titles, 2, "each page emits its own section title");
}

#[test]
fn test_page_without_headers_contributes_nothing() {
    let mut page = make_page(Some("1 - A"), item_line("X", "1", "2,00", "2,00", 240.0));
    // Keep only four headers
    for dropped in ["Esc", "I V A", "ALIC."] {
        page.tokens.retain(|t| t.text != dropped);
    }
    assert!(extract_page(&page, "a.pdf", &ExtractionConfig::default()).is_empty());
}

#[test]
fn test_documents_processed_in_order() {
    let b = make_page(Some("2 - BETA"), item_line("B", "1", "1,00", "1,00", 240.0));
    let a = make_page(Some("1 - ALFA"), item_line("A", "1", "1,00", "1,00", 240.0));
    let decoder = CannedDecoder {
        pages: vec![("b.pdf", vec![b]), ("a.pdf", vec![a])],
    };
    let config = ExtractionConfig::default();
    let rows = process_pdf_files_with(&["in/b.pdf", "in/a.pdf"], &decoder, &config).unwrap();
    let files: Vec<&str> = rows.iter().map(|r| r.source_file.as_str()).collect();
    assert_eq!(files, ["b.pdf", "a.pdf"]);
}

#[test]
fn test_failed_document_aborts_batch() {
    let decoder = CannedDecoder {
        pages: vec![("good.pdf", vec![make_page(Some("1 - A"), Vec::new())])],
    };
    let paths = ["good.pdf", "missing.pdf"];
    let config = ExtractionConfig::default();
    let err = process_pdf_files_with(&paths, &decoder, &config).unwrap_err();
    assert_eq!(
        err.to_string(),
        "failed to process missing.pdf: PDF parsing error: no such document: missing.pdf"
    );
}

#[test]
fn test_lopdf_missing_file_names_file() {
    let err = process_pdf_files(&["/nonexistent/path/report.pdf"]).unwrap_err();
    assert!(err.to_string().contains("report.pdf"));
}

// ============================================================================
// Components through the public API
// ============================================================================

#[test]
fn test_line_grouping_tolerance() {
    let tokens = vec![
        make_token("a", 10.0, 10.0),
        make_token("b", 20.0, 10.2),
        make_token("c", 30.0, 10.3),
        make_token("d", 10.0, 17.0),
    ];
    let lines = group_lines(&tokens, 0.0, None, 3.5);
    assert_eq!(lines.len(), 2);
    assert_eq!(lines[0].tokens.len(), 3);
    assert_eq!(lines[1].text(), "d");
}

#[test]
fn test_amount_examples() {
    assert_eq!(parse_amount("1.234,56"), Some(1234.56));
    assert_eq!(parse_amount("(1.234,56)"), Some(-1234.56));
    assert_eq!(parse_amount("1,234"), Some(1234.0));
    assert_eq!(parse_amount("1,23"), Some(1.23));
    assert_eq!(parse_amount("-50"), Some(-50.0));
    assert_eq!(parse_amount("abc"), None);
}

// ============================================================================
// Workbook output
// ============================================================================

#[test]
fn test_workbook_round_trip_sheets_and_cells() {
    let page_a = make_page(
        Some("123 - ACME CORP"),
        item_line("REVISTA", "3", "50,00", "150,00", 240.0),
    );
    let page_b = make_page(
        Some("9 - OTRO/CLIENTE"),
        item_line("DIARIO", "1", "10,00", "(10,00)", 240.0),
    );
    let mut rows: Vec<ExtractedRow> = extract_page(&page_a, "a.pdf", &ExtractionConfig::default());
    rows.extend(extract_page(&page_b, "b.pdf", &ExtractionConfig::default()));

    let sheets = group_by_client(rows);
    let bytes = XlsxWorkbookWriter.to_buffer(&sheets).unwrap();
    let mut workbook: Xlsx<_> = calamine::open_workbook_from_rs(Cursor::new(bytes)).unwrap();
    assert_eq!(workbook.sheet_names(), ["ACME CORP", "OTRO_CLIENTE"]);

    let sheet = workbook.worksheet_range("ACME CORP").unwrap();
    let header: Vec<String> = (0..12)
        .map(|c| cell_text(sheet.get_value((0, c))))
        .collect();
    assert_eq!(header, COLUMNS);
    assert_eq!(cell_text(sheet.get_value((1, 0))), "a.pdf");
    assert_eq!(cell_text(sheet.get_value((1, 2))), "REVISTA");
    assert_eq!(sheet.get_value((1, 10)), Some(&Data::Float(150.0)));

    let sheet = workbook.worksheet_range("OTRO_CLIENTE").unwrap();
    assert_eq!(sheet.get_value((1, 11)), Some(&Data::Float(-10.0)));
}

#[test]
fn test_empty_batch_writes_placeholder_sheet() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("out.xlsx");
    write_workbook(Vec::new(), &path).unwrap();

    let mut workbook: Xlsx<_> = calamine::open_workbook(&path).unwrap();
    assert_eq!(workbook.sheet_names(), [DEFAULT_CLIENT]);
    let sheet = workbook.worksheet_range(DEFAULT_CLIENT).unwrap();
    assert_eq!(sheet.height(), 1);
    assert_eq!(cell_text(sheet.get_value((0, 0))), "archivo");
}

#[test]
fn test_writer_trait_object() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("trait.xlsx");
    let writer: &dyn WorkbookWriter = &XlsxWorkbookWriter;
    writer.write(&group_by_client(Vec::new()), &path).unwrap();
    assert!(path.exists());
}
