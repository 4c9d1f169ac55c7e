mod config;
mod document;
mod extract;
mod fields;
mod heuristics;
mod linking;
mod llm;
mod pdf;
mod report;
mod rules;
mod search;
mod store;

use clap::Parser;
use config::{Config, LlmBackend};
use llm::LlmClient;
use std::fs;
use std::path::{Path, PathBuf};
use store::DocumentStore;
use tracing::{info, warn};

/// Trade-document compliance agent: extract PDFs into the document store,
/// link them by business identifiers, and generate compliance reports.
#[derive(Parser)]
#[command(name = "doc_compliance")]
struct Cli {
    /// PDF files or directories containing PDFs
    inputs: Vec<PathBuf>,

    /// Force a document type for all inputs (e.g. leminar_invoice)
    #[arg(long = "type")]
    doc_type: Option<String>,

    /// Extract the input PDFs and save them to the document store
    #[arg(long)]
    extract: bool,

    /// Generate a compliance report from the stored documents
    #[arg(long)]
    report: bool,

    /// Generate a retrieval-augmented compliance report
    #[arg(long)]
    rag_report: bool,

    /// Skip embedding generation during extraction
    #[arg(long)]
    no_embeddings: bool,

    /// Path to the config file
    #[arg(short, long, default_value = "compliance.toml")]
    config: String,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // init tracing
    tracing_subscriber::fmt()
        .with_target(true)
        .with_level(true)
        .with_env_filter("info")
        .init();

    let cli = Cli::parse();
    let cfg = Config::load_or_default(&cli.config);

    if let Some(parent) = Path::new(&cfg.db_path).parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    let db = DocumentStore::new(&cfg.db_path)?;

    if cli.extract {
        let files = collect_pdfs(&cli.inputs);
        if files.is_empty() {
            warn!("No PDF files found to process");
        } else {
            let llm = match cfg.llm.backend {
                LlmBackend::Heuristics => None,
                _ => Some(LlmClient::connect(&cfg.llm).await?),
            };
            let records = extract::batch_extract(
                &files,
                cli.doc_type.as_deref(),
                llm.as_ref(),
                &db,
                !cli.no_embeddings,
            )
            .await?;
            info!(count = records.len(), "Extracted and saved documents");
        }
    }

    if cli.report {
        let llm = LlmClient::connect(&cfg.llm).await?;
        let docs = db.get_documents(None)?;
        let links = linking::link_documents(&docs);
        let results = rules::run_deterministic_checks(&links);
        let report = report::generate_compliance_report(&llm, &links, &results).await?;
        print_report("COMPLIANCE REPORT", &report);
        fs::write("compliance_report.txt", &report)?;
        info!("Compliance report saved to compliance_report.txt");
    }

    if cli.rag_report {
        let llm = LlmClient::connect(&cfg.llm).await?;
        let docs = db.get_documents(None)?;
        let links = linking::link_documents(&docs);
        let results = rules::run_deterministic_checks(&links);
        let report = report::generate_rag_compliance_report(
            &llm,
            &db,
            cfg.retrieval.top_k,
            &links,
            &results,
        )
        .await?;
        print_report("RAG COMPLIANCE REPORT", &report);
        fs::write("compliance_report_rag.txt", &report)?;
        info!("RAG compliance report saved to compliance_report_rag.txt");
    }

    // Print statistics
    let (total, embedded) = db.get_counts()?;
    info!(
        documents_total = total,
        documents_embedded = embedded,
        "Document store statistics"
    );

    Ok(())
}

/// Expand the CLI inputs into a sorted list of PDF files; directories are
/// scanned one level deep.
fn collect_pdfs(inputs: &[PathBuf]) -> Vec<PathBuf> {
    let mut files = Vec::new();
    for input in inputs {
        if input.is_dir() {
            let Ok(entries) = fs::read_dir(input) else {
                warn!(path = %input.display(), "Cannot read directory");
                continue;
            };
            for entry in entries.flatten() {
                let path = entry.path();
                if is_pdf(&path) {
                    files.push(path);
                }
            }
        } else if is_pdf(input) {
            files.push(input.clone());
        } else {
            warn!(path = %input.display(), "Not a PDF file — skipping");
        }
    }
    files.sort();
    files
}

fn is_pdf(path: &Path) -> bool {
    path.is_file()
        && path
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("pdf"))
}

fn print_report(title: &str, report: &str) {
    let bar = "=".repeat(60);
    println!("\n{bar}");
    println!("{title}");
    println!("{bar}");
    println!("{report}");
    println!("{bar}\n");
}
