use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;
use study_rag::{Config, RagSystem};

/// Ingest a directory of PDFs into the vector index, optionally asking a
/// question afterwards.
#[derive(Parser, Debug)]
#[command(name = "study-rag", version, about)]
struct Args {
    /// Directory of PDFs to ingest (defaults to DATA_PATH)
    #[arg(short, long)]
    data_dir: Option<PathBuf>,

    /// Wipe the index before ingesting
    #[arg(long)]
    reset: bool,

    /// Skip ingestion and only answer --query
    #[arg(long)]
    skip_ingest: bool,

    /// Question to answer once ingestion is done
    #[arg(short, long)]
    query: Option<String>,

    /// Number of chunks retrieved for --query
    #[arg(short = 'k', long)]
    top_k: Option<usize>,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();
    env_logger::init();

    let args = Args::parse();
    let config = Config::from_env()?;
    let system = RagSystem::from_config(&config).await?;

    if !args.skip_ingest {
        let data_dir = args.data_dir.unwrap_or_else(|| config.data_path.clone());
        log::info!("Ingesting PDFs from {}", data_dir.display());

        let report = system.ingest.ingest_directory(&data_dir, args.reset).await?;
        println!(
            "Processed {} chunks from {}, {} new",
            report.chunks,
            data_dir.display(),
            report.added
        );
    }

    if let Some(question) = args.query {
        let k = args.top_k.unwrap_or(config.top_k);
        let answer = system.query.answer(&question, k).await?;
        println!("{}", answer.answer_text);
        println!();
        for id in answer.source_ids.iter().flatten() {
            println!("  source: {}", id);
        }
    }

    Ok(())
}
