//! CLI binary for utility-bill-processor.
//!
//! Runs each input bill through parse → select → extract, prints the
//! extracted fields, and optionally checks them against expected-values
//! fixtures. Exit status is non-zero when any file failed or differed.

use anyhow::{Context, Result};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use serde::Serialize;
use serde_json::Value;
use std::io;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Duration;
use tracing_subscriber::EnvFilter;
use utility_bill_processor::regression::{self, Comparison};
use utility_bill_processor::{BillProcessor, CacheOrigin, ProcessedBill, ProcessorConfig, Region};

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn red(s: &str) -> String {
    format!("\x1b[31m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}
fn cyan(s: &str) -> String {
    format!("\x1b[36m{s}\x1b[0m")
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Extract one bill (results cached under ./output)
  ubp invoices/GasInvoice_2025-12-04.pdf

  # Every PDF in a directory, reusing cached responses
  ubp --use-cache invoices/

  # Regression run against hand-checked fixtures (<dir>/<basename>.exp)
  ubp --use-cache --expected tests/expected invoices/

  # Machine-readable output
  ubp --json --quiet invoices/WaterInvoice.pdf > water.json

CACHE LAYOUT (per input, under --output-dir):
  <basename>.md5.json       fingerprint of the PDF bytes
  <basename>.parse.json     Parse response (Markdown + chunks)
  <basename>.schema.json    schema sent to Extract
  <basename>.extract.json   Extract response

ENVIRONMENT VARIABLES:
  VISION_AGENT_API_KEY    API key for the document-understanding service (required)
  UBP_OUTPUT_DIR          Default for --output-dir
  UBP_USE_CACHE           Default for --use-cache
  UBP_REGION              Default for --region (eu, us)
  RUST_LOG                Overrides the log filter (e.g. utility_bill_processor=debug)
"#;

/// Extract structured data from utility-bill PDFs.
#[derive(Parser, Debug)]
#[command(
    name = "ubp",
    version,
    about = "Extract structured data from utility-bill PDFs",
    long_about = "Extract issuer, customer, amounts and dates from scanned electricity, gas and \
water bills using a hosted document-understanding API. Responses are cached per file and reused \
while the PDF bytes and the extraction schema are unchanged.",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// PDF files, or directories whose *.pdf files are processed in name order.
    #[arg(required = true)]
    inputs: Vec<PathBuf>,

    /// Directory for cached responses.
    #[arg(short, long, env = "UBP_OUTPUT_DIR", default_value = "./output")]
    output_dir: PathBuf,

    /// Reuse cached responses when the input and schema are unchanged.
    #[arg(long, env = "UBP_USE_CACHE")]
    use_cache: bool,

    /// Service region: eu or us.
    #[arg(long, env = "UBP_REGION", default_value = "eu")]
    region: Region,

    /// Model for the Parse call.
    #[arg(long, env = "UBP_PARSE_MODEL")]
    parse_model: Option<String>,

    /// Model for the Extract call.
    #[arg(long, env = "UBP_EXTRACT_MODEL")]
    extract_model: Option<String>,

    /// Compare each extraction with <DIR>/<basename>.exp and report differences.
    #[arg(long, value_name = "DIR")]
    expected: Option<PathBuf>,

    /// Print one JSON document with every result instead of tables.
    #[arg(long, env = "UBP_JSON")]
    json: bool,

    /// Disable progress bar.
    #[arg(long, env = "UBP_NO_PROGRESS")]
    no_progress: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "UBP_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors and results.
    #[arg(short, long, env = "UBP_QUIET")]
    quiet: bool,
}

/// One entry of the `--json` report.
#[derive(Serialize)]
struct FileReport<'a> {
    #[serde(flatten)]
    bill: &'a ProcessedBill,
    #[serde(skip_serializing_if = "Option::is_none")]
    comparison: Option<Comparison>,
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // The progress bar replaces INFO logs unless --verbose is given.
    let show_progress = !cli.quiet && !cli.no_progress && !cli.json;
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet || show_progress {
        "error"
    } else {
        "info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    let inputs = collect_inputs(&cli.inputs)?;
    if inputs.is_empty() {
        anyhow::bail!("No PDF files found in the given inputs");
    }

    let processor = BillProcessor::new(build_config(&cli)?).context("Failed to start processor")?;

    let bar = if show_progress {
        progress_bar(inputs.len())
    } else {
        ProgressBar::hidden()
    };

    let mut failures = 0usize;
    let mut differences = 0usize;
    let mut bills: Vec<(ProcessedBill, Option<Comparison>)> = Vec::new();

    for path in &inputs {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        bar.set_message(name.clone());

        let bill = match processor.process(path).await {
            Ok(bill) => bill,
            Err(e) => {
                failures += 1;
                log_line(&bar, failure_line(&name, &e));
                bar.inc(1);
                continue;
            }
        };

        let comparison = match cli.expected {
            Some(ref dir) => match regression::load_expected(dir, &bill.filename) {
                Ok(expected) => Some(regression::compare(&bill.extract.extraction, &expected)),
                Err(e) => {
                    failures += 1;
                    log_line(&bar, failure_line(&name, &e));
                    bar.inc(1);
                    continue;
                }
            },
            None => None,
        };
        if let Some(ref cmp) = comparison {
            differences += cmp.mismatches();
        }

        if !cli.quiet {
            let line = format!(
                "  {} {}  {}  {}",
                green("✓"),
                name,
                dim(bill.kind.as_str()),
                dim(&origin_label(&bill)),
            );
            log_line(&bar, line);
        }
        if !cli.json {
            bar.suspend(|| print_table(&bill, comparison.as_ref()));
        }
        bar.inc(1);
        bills.push((bill, comparison));
    }
    bar.finish_and_clear();

    if cli.json {
        let reports: Vec<FileReport<'_>> = bills
            .iter()
            .map(|(bill, comparison)| FileReport {
                bill,
                comparison: comparison.clone(),
            })
            .collect();
        let json = serde_json::to_string_pretty(&reports).context("Failed to serialise output")?;
        println!("{json}");
    }

    if !cli.quiet {
        let processed = inputs.len() - failures;
        eprintln!(
            "{} {}/{} files processed{}",
            if failures == 0 { green("✔") } else { cyan("⚠") },
            bold(&processed.to_string()),
            inputs.len(),
            if failures > 0 {
                format!("  ({} failed)", red(&failures.to_string()))
            } else {
                String::new()
            },
        );
    }
    if cli.expected.is_some() {
        let line = format!("Total differences: {differences}");
        eprintln!("{}", if differences == 0 { green(&line) } else { red(&line) });
    }

    Ok(if failures == 0 && differences == 0 {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

/// Map CLI args to `ProcessorConfig`.
fn build_config(cli: &Cli) -> Result<ProcessorConfig> {
    let mut builder = ProcessorConfig::builder()
        .region(cli.region)
        .output_dir(&cli.output_dir)
        .use_cache(cli.use_cache);

    if let Some(ref model) = cli.parse_model {
        builder = builder.parse_model(model);
    }
    if let Some(ref model) = cli.extract_model {
        builder = builder.extract_model(model);
    }

    builder.build().context("Invalid configuration")
}

/// Expand directories into their `*.pdf` files, sorted by name.
///
/// Plain paths are kept as given, so a missing file is reported by the
/// processor like any other per-file failure.
fn collect_inputs(inputs: &[PathBuf]) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for input in inputs {
        if !input.is_dir() {
            files.push(input.clone());
            continue;
        }
        let mut found: Vec<PathBuf> = std::fs::read_dir(input)
            .with_context(|| format!("Failed to read directory {:?}", input))?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|p| p.is_file() && is_pdf(p))
            .collect();
        found.sort();
        files.extend(found);
    }
    Ok(files)
}

fn is_pdf(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("pdf"))
}

fn progress_bar(total: usize) -> ProgressBar {
    let bar = ProgressBar::new(total as u64);
    let style = ProgressStyle::with_template(
        "{spinner:.cyan} {prefix:.bold}  \
         [{bar:42.green/238}] {pos:>3}/{len} files  \
         ⏱ {elapsed_precise}  {msg}",
    )
    .unwrap_or_else(|_| ProgressStyle::default_bar())
    .progress_chars("█▉▊▋▌▍▎▏  ")
    .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"]);
    bar.set_style(style);
    bar.set_prefix("Processing");
    bar.enable_steady_tick(Duration::from_millis(80));
    bar
}

fn origin_label(bill: &ProcessedBill) -> String {
    let label = |o: CacheOrigin| match o {
        CacheOrigin::Cache => "cached",
        CacheOrigin::Remote => "remote",
    };
    format!(
        "parse {}, extract {}",
        label(bill.parse_origin),
        label(bill.extract_origin)
    )
}

fn print_table(bill: &ProcessedBill, comparison: Option<&Comparison>) {
    println!();
    println!("{}", bold(&format!("{} ({} bill)", bill.filename, bill.kind)));
    match comparison {
        None => {
            println!("{:<32} {}", bold("FIELD"), bold("VALUE"));
            for (field, value) in &bill.extract.extraction {
                println!("{:<32} {}", field, display_value(value));
            }
        }
        Some(cmp) => {
            println!(
                "{:<32} {:<36} {:<36} {}",
                "FIELD", "VALUE", "EXPECTED", "RESULT"
            );
            for row in &cmp.fields {
                let expected = row
                    .expected
                    .as_ref()
                    .map(display_value)
                    .unwrap_or_else(|| "-".to_string());
                println!(
                    "{:<32} {:<36} {:<36} {}",
                    row.field,
                    display_value(&row.extracted),
                    expected,
                    if row.matches { green("OK") } else { red("DIFF") },
                );
            }
            if !cmp.is_clean() {
                println!("{}", red(&format!("{} differences", cmp.mismatches())));
            }
        }
    }
}

/// Strings without quotes, `null` as `None`, everything else as JSON.
fn display_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => "None".to_string(),
        other => other.to_string(),
    }
}

/// Print above the progress bar, or straight to stderr when it is hidden.
fn log_line(bar: &ProgressBar, line: String) {
    if bar.is_hidden() {
        eprintln!("{line}");
    } else {
        bar.println(line);
    }
}

/// Error messages carry hints on later lines; the per-file log shows only the first.
fn failure_line(name: &str, err: &dyn std::error::Error) -> String {
    let msg = err.to_string();
    let first = msg.lines().next().unwrap_or_default();
    format!("  {} {}  {}", red("✗"), name, red(first))
}
