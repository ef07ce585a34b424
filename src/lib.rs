//! Ledger extraction from semi-structured PDF reports
//!
//! This crate provides:
//! - Positioned text decoding of PDF pages using lopdf
//! - Column schema inference from a known header vocabulary
//! - Line reconstruction and row classification (titles, items, balances)
//! - Per-client workbook output

pub mod amount;
pub mod classify;
pub mod client;
pub mod columns;
pub mod extractor;
pub mod headers;
pub mod lines;
pub mod pipeline;
pub mod workbook;

pub use amount::parse_amount;
pub use classify::{classify_line, ItemKind, LineClass, PageState, SectionTitle};
pub use extractor::{DecodeOptions, DecodedPage, LopdfDecoder, PdfDecoder, PositionedToken};
pub use headers::{find_header_bounds, CanonicalHeader, ColumnBound, HeaderLayout};
pub use lines::{group_lines, LogicalLine};
pub use pipeline::{
    extract_page, process_pdf_files, process_pdf_files_with, ExtractedRow, ExtractionConfig,
    DEFAULT_CLIENT,
};
pub use workbook::{
    group_by_client, write_workbook, ClientSheet, WorkbookWriter, XlsxWorkbookWriter,
};

#[derive(Debug, thiserror::Error)]
pub enum LedgerError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("PDF parsing error: {0}")]
    Parse(String),
    #[error("failed to process {file}: {source}")]
    Document {
        file: String,
        #[source]
        source: Box<LedgerError>,
    },
    #[error("workbook error: {0}")]
    Workbook(String),
}

impl From<lopdf::Error> for LedgerError {
    fn from(e: lopdf::Error) -> Self {
        LedgerError::Parse(e.to_string())
    }
}

impl From<rust_xlsxwriter::XlsxError> for LedgerError {
    fn from(e: rust_xlsxwriter::XlsxError) -> Self {
        LedgerError::Workbook(e.to_string())
    }
}
