use anyhow::Result;
use clap::{Parser, Subcommand};
use pagerel::{DocumentRef, EngineConfig, RecommendationEngine, SledStore};
use serde::{Deserialize, Serialize};
use tracing_subscriber::{fmt, EnvFilter};
use walkdir::WalkDir;

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

/// One document with its page text already extracted, page `i + 1` at `pages[i]`.
#[derive(Debug, Deserialize)]
struct InputDoc {
    id: String,
    #[serde(alias = "title")]
    name: String,
    pages: Vec<String>,
}

#[derive(Parser)]
#[command(name = "pagerel")]
#[command(about = "Index page text and find related pages across documents", long_about = None)]
struct Cli {
    /// Corpus database directory
    #[arg(long, default_value = "./pagerel-data", global = true)]
    store: PathBuf,
    /// Optional engine config (JSON)
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Ingest documents from JSON/JSONL files or a directory of them
    Ingest {
        /// Input path (file or directory)
        #[arg(long)]
        input: PathBuf,
    },
    /// Pages related to a stored page, or to free text
    Related {
        #[arg(long)]
        doc: String,
        #[arg(long, default_value_t = 1)]
        page: u32,
        /// Query with this text instead of the stored page
        #[arg(long)]
        text: Option<String>,
    },
    /// List indexed documents
    List,
    /// Remove one document
    Remove {
        #[arg(long)]
        doc: String,
    },
    /// Remove every document
    Clear,
}

#[derive(Serialize)]
struct IngestReport {
    documents: usize,
    pages: usize,
    skipped: usize,
    total_documents: usize,
}

fn main() -> Result<()> {
    fmt().with_env_filter(EnvFilter::from_default_env()).init();
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => EngineConfig::from_json_file(path)?,
        None => EngineConfig::default(),
    };
    let engine = RecommendationEngine::new(SledStore::open(&cli.store)?, config);
    engine.open();

    match cli.command {
        Commands::Ingest { input } => {
            let report = ingest_path(&engine, &input)?;
            print_json(&report)?;
        }
        Commands::Related { doc, page, text } => {
            let results = engine.find_related_sections(&doc, page, text.as_deref());
            print_json(&results)?;
        }
        Commands::List => print_json(&engine.list_documents())?,
        Commands::Remove { doc } => {
            let removed = engine.remove_document(&doc);
            print_json(&serde_json::json!({ "removed": removed, "total_documents": engine.count() }))?;
        }
        Commands::Clear => {
            engine.clear();
            print_json(&serde_json::json!({ "total_documents": engine.count() }))?;
        }
    }
    engine.close();
    Ok(())
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn ingest_path(engine: &RecommendationEngine<SledStore>, input: &Path) -> Result<IngestReport> {
    let docs = read_input(input)?;
    let mut report = IngestReport { documents: 0, pages: 0, skipped: 0, total_documents: 0 };
    for doc in docs {
        let pages = engine.add_document(&DocumentRef::new(doc.id, doc.name), &doc.pages);
        if pages == 0 {
            report.skipped += 1;
        } else {
            report.documents += 1;
            report.pages += pages;
        }
    }
    report.total_documents = engine.count();
    tracing::info!(documents = report.documents, pages = report.pages, skipped = report.skipped, "ingest complete");
    Ok(report)
}

fn read_input(input: &Path) -> Result<Vec<InputDoc>> {
    let mut files: Vec<PathBuf> = Vec::new();
    if input.is_dir() {
        for entry in WalkDir::new(input).sort_by_file_name().into_iter().filter_map(|e| e.ok()) {
            let p = entry.path();
            if p.is_file() {
                if let Some(ext) = p.extension().and_then(|s| s.to_str()) {
                    if matches!(ext, "json" | "jsonl") {
                        files.push(p.to_path_buf());
                    }
                }
            }
        }
    } else if input.is_file() {
        files.push(input.to_path_buf());
    } else {
        anyhow::bail!("input {} does not exist", input.display());
    }

    let mut docs = Vec::new();
    for file in files {
        if file.extension().and_then(|s| s.to_str()) == Some("jsonl") {
            docs.extend(read_jsonl(&file)?);
        } else {
            docs.extend(read_json(&file)?);
        }
    }
    Ok(docs)
}

fn read_jsonl(file: &Path) -> Result<Vec<InputDoc>> {
    let reader = BufReader::new(File::open(file)?);
    let mut docs = Vec::new();
    for line in reader.lines() {
        let line = line?;
        if line.trim().is_empty() { continue; }
        docs.push(serde_json::from_str(&line)?);
    }
    Ok(docs)
}

fn read_json(file: &Path) -> Result<Vec<InputDoc>> {
    let reader = BufReader::new(File::open(file)?);
    let json: serde_json::Value = serde_json::from_reader(reader)?;
    let docs = match json {
        serde_json::Value::Array(arr) => arr.into_iter().map(serde_json::from_value).collect::<Result<Vec<_>, _>>()?,
        serde_json::Value::Object(_) => vec![serde_json::from_value(json)?],
        _ => Vec::new(),
    };
    Ok(docs)
}
