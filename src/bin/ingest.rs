use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;

use deptqa::core::config::{discover_project_root, AppPaths, ConfigService};
use deptqa::core::logging;
use deptqa::department::Department;
use deptqa::ingest::Ingestor;
use deptqa::llm::CohereEmbedder;
use deptqa::rag::{ChunkerConfig, SqliteRagStore, TextChunker};

/// Build or refresh the department vector index
#[derive(Parser, Debug)]
#[command(name = "deptqa-ingest")]
#[command(about = "Index department documents into the vector store", long_about = None)]
struct Args {
    /// Document tree with one folder per department plus `general`
    #[arg(long)]
    source: Option<PathBuf>,

    /// Directory holding the vector index
    #[arg(long)]
    index_dir: Option<PathBuf>,

    /// Department to ingest; repeat for several. Defaults to all.
    #[arg(long = "department")]
    departments: Vec<Department>,

    /// Remove every indexed chunk of each department before ingesting
    #[arg(long)]
    reset: bool,

    /// YAML settings file (defaults to ./config.yml)
    #[arg(long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    let args = Args::parse();

    let config = ConfigService::new(discover_project_root()).with_config_path(args.config);
    let mut settings = config.load_settings().context("Failed to load settings")?;
    if let Some(source) = args.source {
        settings.storage.data_dir = source;
    }
    if let Some(index_dir) = args.index_dir {
        settings.storage.index_dir = index_dir;
    }

    let paths = AppPaths::new(config.project_root().to_path_buf(), &settings.storage);
    logging::init(&paths.log_dir, "deptqa-ingest.log");

    let embedder = CohereEmbedder::from_settings(&settings.embedding)
        .context("Failed to create the embedding client")?;
    let store = SqliteRagStore::open(&paths.index_db_path())
        .await
        .with_context(|| format!("Failed to open index at {}", paths.index_dir.display()))?;

    let ingestor = Ingestor::new(
        Arc::new(store),
        Arc::new(embedder),
        TextChunker::new(ChunkerConfig::from(&settings.retrieval)),
        settings.retrieval.embed_batch_size,
    );

    let departments = if args.departments.is_empty() {
        Department::ALL.to_vec()
    } else {
        args.departments
    };

    tracing::info!(
        "Ingesting {} from {} into {}",
        departments
            .iter()
            .map(Department::as_str)
            .collect::<Vec<_>>()
            .join(", "),
        paths.data_dir.display(),
        paths.index_dir.display()
    );

    let reports = ingestor
        .ingest_all(&paths.data_dir, &departments, args.reset)
        .await
        .context("Ingestion failed")?;

    for report in &reports {
        println!(
            "{:<12} files={:<4} chunks={:<6} removed={:<6} empty={} failed={}",
            report.department.as_str(),
            report.files_indexed,
            report.chunks_written,
            report.chunks_removed,
            report.empty_files.len(),
            report.failed_files.len()
        );
        for failed in &report.failed_files {
            println!("  failed to read {}", failed);
        }
    }

    Ok(())
}
