//! Debug tool: dump decoded tokens and inferred column bands per page

use pdf_ledger::extractor::{DecodeOptions, LopdfDecoder, PdfDecoder};
use pdf_ledger::{find_header_bounds, ExtractionConfig};
use std::env;
use std::path::Path;

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args: Vec<String> = env::args().collect();
    if args.len() < 2 {
        eprintln!("Usage: debug_tokens <pdf_path> [max_page | min-max]");
        std::process::exit(1);
    }

    let range = args.get(2).map(|s| s.as_str()).unwrap_or("1-3");
    let (min_page, max_page) = if let Some((a, b)) = range.split_once('-') {
        (a.parse().unwrap_or(1), b.parse().unwrap_or(3))
    } else {
        (1, range.parse().unwrap_or(3))
    };

    let pages = match LopdfDecoder.decode(Path::new(&args[1]), &DecodeOptions::default()) {
        Ok(pages) => pages,
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
    };
    let config = ExtractionConfig::default();

    let wanted = min_page..=max_page;
    for page in pages.iter().filter(|p| wanted.contains(&p.number)) {
        println!(
            "=== PAGE {} ({} tokens, {:.0}x{:.0}) ===",
            page.number,
            page.tokens.len(),
            page.width,
            page.height
        );
        match find_header_bounds(&page.tokens, config.min_headers, config.header_margin) {
            Some(layout) => {
                println!("  header_y={:.1}", layout.header_y);
                for b in &layout.bounds {
                    let name = b.name.as_str();
                    println!("  {:>10} [{:7.1}, {:7.1})", name, b.left, b.right);
                }
            }
            None => println!("  (no header row)"),
        }
        for t in &page.tokens {
            println!(
                "  x0={:7.1} x1={:7.1} top={:7.1} h={:5.1} text={:?}",
                t.left, t.right, t.top, t.height, t.text
            );
        }
        println!();
    }
}
