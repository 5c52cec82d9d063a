//! summary-forge – command-line chat summary → PDF renderer.
//!
//! Usage:
//!   summary-forge <summary.md> [output.pdf] [--config pdf_config.yaml]
//!                 [--title "Room"] [--messages N] [--date "YYYY-MM-DD HH:MM"]
//!                 [--layout layout.json]
//!
//! Without `output.pdf`, `notes/summary.md` is written to `notes/summary.pdf`.

use std::{env, fs, path::PathBuf, process, sync::Arc};

use chrono::{Local, NaiveDateTime};

use summary_forge::config::PdfConfig;
use summary_forge::document::SummaryMeta;
use summary_forge::pipeline::{write_output, SummaryRenderer};

const DEFAULT_CONFIG: &str = "pdf_config.yaml";
const DATE_INPUT_FORMAT: &str = "%Y-%m-%d %H:%M";

fn main() {
    env_logger::init();

    let args: Vec<String> = env::args().collect();

    let mut input_path: Option<PathBuf> = None;
    let mut output_path: Option<PathBuf> = None;
    let mut config_path = PathBuf::from(DEFAULT_CONFIG);
    let mut layout_path: Option<PathBuf> = None;
    let mut title: Option<String> = None;
    let mut messages: usize = 0;
    let mut created_at: Option<NaiveDateTime> = None;
    let mut positional = 0usize;

    let mut iter = args.iter().skip(1);
    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "--config" | "-c" => config_path = PathBuf::from(flag_value(&mut iter, arg, &args[0])),
            "--title" | "-t" => title = Some(flag_value(&mut iter, arg, &args[0])),
            "--layout" => layout_path = Some(PathBuf::from(flag_value(&mut iter, arg, &args[0]))),
            "--messages" | "-m" => {
                let raw = flag_value(&mut iter, arg, &args[0]);
                messages = raw.parse().unwrap_or_else(|_| {
                    eprintln!("Error: --messages expects a number, got {raw:?}");
                    process::exit(1);
                });
            }
            "--date" | "-d" => {
                let raw = flag_value(&mut iter, arg, &args[0]);
                created_at = Some(
                    NaiveDateTime::parse_from_str(&raw, DATE_INPUT_FORMAT).unwrap_or_else(|e| {
                        eprintln!("Error: --date expects \"YYYY-MM-DD HH:MM\": {e}");
                        process::exit(1);
                    }),
                );
            }
            "--help" | "-h" => {
                print_usage(&args[0]);
                process::exit(0);
            }
            other if other.starts_with('-') => {
                eprintln!("Unknown flag: {other}");
                print_usage(&args[0]);
                process::exit(1);
            }
            path => {
                if positional == 0 {
                    input_path = Some(PathBuf::from(path));
                } else if positional == 1 {
                    output_path = Some(PathBuf::from(path));
                } else {
                    eprintln!("Unexpected argument: {path}");
                    print_usage(&args[0]);
                    process::exit(1);
                }
                positional += 1;
            }
        }
    }

    let input = match input_path {
        Some(p) => p,
        None => {
            eprintln!("Error: missing <summary.md>.");
            print_usage(&args[0]);
            process::exit(1);
        }
    };

    let output = output_path.unwrap_or_else(|| {
        let mut o = input.clone();
        o.set_extension("pdf");
        o
    });

    let markdown = match fs::read_to_string(&input) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("Error reading '{}': {e}", input.display());
            process::exit(1);
        }
    };

    let renderer = match PdfConfig::load_from_path(&config_path)
        .and_then(|config| SummaryRenderer::new(Arc::new(config)))
    {
        Ok(r) => r,
        Err(e) => {
            eprintln!("Error: {e}");
            process::exit(1);
        }
    };

    let default_title = input
        .file_stem()
        .and_then(|s| s.to_str())
        .map(str::to_string)
        .unwrap_or_else(|| renderer.config().labels.untitled_room.clone());

    let meta = SummaryMeta {
        room_title: title.unwrap_or(default_title),
        created_at: created_at.unwrap_or_else(|| Local::now().naive_local()),
        message_count: messages,
    };

    let result = renderer
        .layout_summary(&meta, &markdown)
        .and_then(|layout| renderer.render_layout(&layout).map(|bytes| (bytes, layout)));

    match result {
        Ok((bytes, layout)) => {
            if let Err(e) = write_output(&output, &bytes) {
                eprintln!("Error writing '{}': {e}", output.display());
                process::exit(1);
            }
            if let Some(path) = layout_path {
                if let Err(e) = write_output(&path, layout.to_json()) {
                    eprintln!("Error writing '{}': {e}", path.display());
                    process::exit(1);
                }
            }
            let pages = layout.pages.len();
            eprintln!(
                "Wrote '{}' ({} bytes, {} page{})",
                output.display(),
                bytes.len(),
                pages,
                if pages == 1 { "" } else { "s" }
            );
        }
        Err(e) => {
            eprintln!("Error generating PDF: {e}");
            process::exit(1);
        }
    }
}

fn flag_value<'a>(iter: &mut impl Iterator<Item = &'a String>, flag: &str, prog: &str) -> String {
    match iter.next() {
        Some(v) => v.clone(),
        None => {
            eprintln!("Error: {flag} needs a value.");
            print_usage(prog);
            process::exit(1);
        }
    }
}

fn print_usage(prog: &str) {
    eprintln!("summary-forge – chat summary to PDF renderer");
    eprintln!();
    eprintln!("Usage:");
    eprintln!("  {prog} <summary.md> [output.pdf] [--config pdf_config.yaml] [--title \"Room\"]");
    eprintln!("      [--messages N] [--date \"YYYY-MM-DD HH:MM\"] [--layout layout.json]");
    eprintln!();
    eprintln!("Arguments:");
    eprintln!("  <summary.md>   Summary text in the supported markdown subset");
    eprintln!("  [output.pdf]   Output path (default: the input path with a .pdf extension)");
    eprintln!();
    eprintln!("Flags:");
    eprintln!("  --config, -c   YAML style configuration (default: {DEFAULT_CONFIG})");
    eprintln!("  --title, -t    Room title printed in the header (default: input filename stem)");
    eprintln!("  --messages, -m Message count printed in the header (default: 0)");
    eprintln!("  --date, -d     Conversation timestamp (default: now)");
    eprintln!("  --layout       Also write the paginated layout as JSON");
    eprintln!("  --help         Print this message");
}
