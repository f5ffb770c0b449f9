use anyhow::{anyhow, Context, Result};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use std::path::PathBuf;
use tracing::info;

use semdex_core::chunker::Chunker;
use semdex_core::config::Config;
use semdex_core::loader::{load_jsonl, load_text_dir};
use semdex_core::schema::SourceSchema;
use semdex_core::types::Collection;
use semdex_core::Error;
use semdex_vector::{store, IndexProgress, IndexingPipeline};

#[derive(Parser)]
#[command(name = "semdex-indexer")]
#[command(about = "Chunk, embed and snapshot the documents of one source", long_about = None)]
#[command(version)]
struct Args {
    /// Source to index (messages, files, knowledge)
    #[arg(long)]
    source: String,

    /// Directory of .txt/.md files, or a JSONL file with one document per line
    #[arg(long)]
    input: PathBuf,

    /// Merge into the existing snapshot instead of replacing it
    #[arg(long)]
    incremental: bool,

    #[arg(short, long, help = "Debug logging")]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    semdex_cli::init_logging(args.verbose);

    let settings = Config::load().and_then(|c| c.settings()).context("loading configuration")?;
    let schema = SourceSchema::builtin(&args.source).ok_or_else(|| {
        let known: Vec<String> = SourceSchema::builtin_sources().into_iter().map(|s| s.name).collect();
        anyhow!("unknown source '{}' (known: {})", args.source, known.join(", "))
    })?;

    let documents = if args.input.is_dir() {
        load_text_dir(&args.input)?
    } else {
        load_jsonl(&args.input)?
    };
    info!(source = %schema.name, input = %args.input.display(), documents = documents.len(), "loaded documents");

    let embedder = semdex_embed::from_settings(&settings.embedding)?;
    let chunker = Chunker::new(settings.chunking.clone())?;
    let pipeline = IndexingPipeline::new(embedder, chunker, schema).with_batch_size(settings.indexing.batch_size);
    let schema = pipeline.schema();
    let snapshot_path = settings.index_dir.join(&schema.snapshot_file);

    let pb = ProgressBar::new(documents.len() as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} documents {msg}")?
            .progress_chars("#>-"),
    );
    let on_progress = |p: IndexProgress| {
        pb.set_position(p.documents_done as u64);
        pb.set_message(format!("batch {}/{}, {} vectors", p.batch, p.total_batches, p.records));
    };

    let collection = if args.incremental {
        let existing = match store::load(&snapshot_path).await {
            Ok(existing) => existing,
            Err(Error::NotFound { .. }) => {
                info!(path = %snapshot_path.display(), "no snapshot yet, starting empty");
                Collection::new(schema.name.clone(), Vec::new())?
            }
            Err(e) => return Err(e.into()),
        };
        pipeline.incremental_index(existing, &documents, on_progress).await?
    } else {
        pipeline.index_documents(&documents, on_progress).await?
    };
    pb.finish_with_message("embedded");

    let descriptor = pipeline
        .save(&collection, &snapshot_path)
        .await
        .with_context(|| format!("saving snapshot {}", snapshot_path.display()))?;

    println!(
        "Indexed {} documents into {} ({} vectors, {} dimensions, model {})",
        documents.len(),
        snapshot_path.display(),
        descriptor.total_vectors,
        descriptor.dimensions,
        descriptor.embedding_model
    );
    Ok(())
}
