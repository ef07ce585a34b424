//! CLI tool: extract ledger rows from PDFs into a per-client workbook

use clap::Parser;
use pdf_ledger::pipeline::process_pdf_files_with;
use pdf_ledger::{write_workbook, ExtractionConfig, LopdfDecoder};
use std::path::PathBuf;
use std::process;
use std::time::{Instant, SystemTime, UNIX_EPOCH};

#[derive(Parser)]
#[command(
    name = "ledger2xlsx",
    version,
    about = "Extract ledger rows from PDF reports into one worksheet per client"
)]
struct Cli {
    /// PDF reports to process, in order
    #[arg(required = true)]
    inputs: Vec<PathBuf>,

    /// Output workbook (default: resumen_cargas-<millis>.xlsx in the temp dir)
    #[arg(short, long, value_name = "FILE")]
    output: Option<PathBuf>,

    /// Vertical tolerance for grouping tokens into lines
    #[arg(long, default_value_t = 3.5)]
    line_tolerance: f32,

    /// Margin below the header row before data starts
    #[arg(long, default_value_t = 6.0)]
    header_margin: f32,
}

fn default_output() -> PathBuf {
    let millis = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis())
        .unwrap_or_default();
    std::env::temp_dir().join(format!("resumen_cargas-{millis}.xlsx"))
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    let config = ExtractionConfig {
        line_tolerance: cli.line_tolerance,
        header_margin: cli.header_margin,
        ..ExtractionConfig::default()
    };
    let output = cli.output.unwrap_or_else(default_output);

    let start = Instant::now();

    let rows = match process_pdf_files_with(cli.inputs.as_slice(), &LopdfDecoder, &config) {
        Ok(rows) => rows,
        Err(e) => {
            eprintln!("Error: {}", e);
            process::exit(1);
        }
    };
    let row_count = rows.len();

    if let Err(e) = write_workbook(rows, &output) {
        eprintln!("Error: {}", e);
        process::exit(1);
    }

    println!("Files: {}", cli.inputs.len());
    println!("Rows: {}", row_count);
    println!("Processing time: {}ms", start.elapsed().as_millis());
    println!("Workbook written to: {}", output.display());
}
