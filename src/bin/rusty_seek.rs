use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::Parser;
use rusty_seek::projection::{CELL_HEADER, WORKSHEET_HEADER};
use rusty_seek::{Engine, EngineConfig, ExportFormat, SearchEvent};
use tokio::runtime::Handle;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(about = "Search every sheet of a CSV or Excel file for a piece of text and export the matching rows.")]
struct Args {
    /// File to search (.csv, .tsv, .txt, .xlsx, .xlsm or .xls).
    file: PathBuf,

    /// Text to look for, case-insensitively.
    query: String,

    /// Search only this sheet instead of all of them.
    #[arg(long)]
    sheet: Option<String>,

    /// Column to keep in the export, as `<sheet>:<column>` (repeatable).
    #[arg(long = "columns")]
    columns: Vec<String>,

    /// Export format: json, csv or xlsx (default: inferred from the output extension).
    #[arg(long)]
    format: Option<String>,

    /// Write the matching rows to this file.
    #[arg(long)]
    output: Option<PathBuf>,

    /// Maximum number of sheets searched at the same time.
    #[arg(long)]
    jobs: Option<usize>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("rusty_seek=info")))
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    let config = match args.jobs {
        Some(jobs) => EngineConfig::from_env().with_max_concurrent_searches(jobs),
        None => EngineConfig::from_env(),
    };
    let (engine, mut events) = Engine::new(config, Handle::current());

    let sheets = engine
        .load(&args.file)
        .await
        .with_context(|| format!("Failed to load {}", args.file.display()))?;
    println!("Loaded {} sheet(s): {}", sheets.len(), sheets.join(", "));

    let pending = match &args.sheet {
        Some(sheet) => {
            engine.search_one(sheet, &args.query);
            1
        }
        None => engine.search_all(&args.query).len(),
    };
    for _ in 0..pending {
        match events.recv().await {
            Some(SearchEvent::Completed { sheet_name, match_count }) => {
                println!("Found {match_count} in '{sheet_name}'");
            }
            Some(SearchEvent::Failed { sheet_name, message }) => {
                println!("Error in '{sheet_name}': {message}");
            }
            None => break,
        }
    }

    let results = engine.results();
    println!("{WORKSHEET_HEADER}\t{CELL_HEADER}\tvalue");
    for record in &results {
        println!("{}\t{}\t{}", record.sheet_name(), record.cell_label(), record.value());
    }
    println!("{} match(es)", results.len());

    if !args.columns.is_empty() {
        let mut draft = engine.begin_selection();
        for entry in &args.columns {
            let Some((sheet, column)) = entry.split_once(':') else {
                bail!("Invalid column '{entry}', expected <sheet>:<column>");
            };
            draft.set(sheet, column, true);
        }
        engine.set_selection(draft.apply());
    }

    if let Some(output) = &args.output {
        let format = match &args.format {
            Some(name) => ExportFormat::parse(name)?,
            None => match ExportFormat::from_path(output) {
                Some(format) => format,
                None => bail!("Cannot infer the export format of {}, use --format", output.display()),
            },
        };
        engine
            .export(format, output)
            .await
            .with_context(|| format!("Failed to export {}", output.display()))?;
        println!("Exported {} to {}", format.as_str(), output.display());
    }

    Ok(())
}
