// Trecento mensural duration engine: CLI entry point.
//
// Loads a document in the JSON tree form (see document.rs), resolves every
// measure, and prints one line per measure with the symbols and their
// lengths in minimae.
//
// Usage:
//   cargo run -p trecento_mensural --bin resolve -- <document.json>
//     [--config engine.json] [--threads N]
//
// Set RUST_LOG=trecento_mensural=debug to see each measure's reading.

use std::path::Path;
use trecento_mensural::config::EngineConfig;
use trecento_mensural::document::Document;
use trecento_mensural::locator::{Locator, Measure};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

fn main() {
    init_tracing();

    let args: Vec<String> = std::env::args().collect();
    let Some(doc_path) = args.get(1).filter(|s| !s.starts_with("--")) else {
        eprintln!("usage: resolve <document.json> [--config engine.json] [--threads N]");
        std::process::exit(2);
    };
    let config_path: Option<String> = parse_flag(&args, "--config");
    let threads: Option<usize> = parse_flag(&args, "--threads");

    let pool = threads.map(|n| rayon::ThreadPoolBuilder::new().num_threads(n).build_global());
    if let Some(Err(e)) = pool {
        eprintln!("Failed to configure thread pool: {e}");
    }

    let config = match config_path {
        Some(path) => match EngineConfig::load(Path::new(&path)) {
            Ok(c) => c,
            Err(e) => fail(&format!("Failed to load config {path}: {e}")),
        },
        None => EngineConfig::default(),
    };

    let doc = match Document::load(Path::new(doc_path)) {
        Ok(d) => d,
        Err(e) => fail(&format!("Failed to load {doc_path}: {e}")),
    };

    let locator = Locator::new(config);
    let lengths = match locator.resolve_document(&doc) {
        Ok(l) => l,
        Err(e) => fail(&format!("Resolution failed: {e}")),
    };
    tracing::info!(positions = lengths.len(), "resolved {doc_path}");

    // The parallel pass filled the cache; walk it again in document order.
    for container in doc.containers() {
        let measures = match locator.segment(&doc, container) {
            Ok(m) => m,
            Err(e) => fail(&format!("Segmentation failed: {e}")),
        };
        if measures.is_empty() {
            continue;
        }
        println!("{container}:");
        for measure in measures {
            let symbols = match measure.symbols(&doc) {
                Ok(s) => s,
                Err(e) => fail(&format!("Bad measure {measure:?}: {e}")),
            };
            let resolution = match locator.resolve_measure(&doc, &measure) {
                Ok(r) => r,
                Err(e) => fail(&format!("Resolution failed: {e}")),
            };
            let cells: Vec<String> = symbols
                .iter()
                .zip(&resolution.lengths)
                .map(|(s, l)| format!("{}={}", s.label(), format_length(*l)))
                .collect();
            let mut line = format!("  {}", cells.join(" "));
            if let Measure::Ligature(_) = measure {
                line.push_str("  (ligature)");
            }
            if resolution.doublings > 0 {
                line.push_str(&format!("  (doubled ×{})", resolution.doublings));
            }
            if !resolution.exact {
                line.push_str("  (underfilled)");
            }
            println!("{line}");
        }
    }
}

fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::from_default_env();
    let filter = match "trecento_mensural=info".parse() {
        Ok(directive) => filter.add_directive(directive),
        Err(_) => filter,
    };
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();
}

fn fail(message: &str) -> ! {
    eprintln!("{message}");
    std::process::exit(1);
}

fn format_length(length: f64) -> String {
    if length.fract() == 0.0 {
        format!("{length}")
    } else {
        format!("{length:.3}")
    }
}

fn parse_flag<T: std::str::FromStr>(args: &[String], flag: &str) -> Option<T> {
    args.iter()
        .position(|a| a == flag)
        .and_then(|i| args.get(i + 1))
        .and_then(|v| v.parse().ok())
}
