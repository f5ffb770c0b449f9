use anyhow::{anyhow, Context, Result};
use clap::Parser;

use semdex_core::config::Config;
use semdex_core::schema::SourceSchema;
use semdex_hybrid::{Aggregator, SearchQuery, SourceAdapter, UnifiedQuery};

#[derive(Parser)]
#[command(name = "semdex-search")]
#[command(about = "Semantic and hybrid search over indexed sources", long_about = None)]
#[command(version)]
struct Args {
    /// Natural-language query
    query: String,

    /// Restrict to a source; repeat for several. Omit to search all sources
    #[arg(long = "source")]
    sources: Vec<String>,

    /// Blend keyword matches into the semantic score
    #[arg(long)]
    hybrid: bool,

    /// Semantic weight in [0, 1] for hybrid ranking (implies --hybrid)
    #[arg(long)]
    weight: Option<f32>,

    #[arg(long, help = "Maximum results")]
    limit: Option<usize>,

    /// Source filter as key=value; repeatable
    #[arg(long = "filter", value_parser = semdex_cli::parse_filter)]
    filters: Vec<(String, String)>,

    #[arg(short, long, help = "Debug logging")]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    semdex_cli::init_logging(args.verbose);

    let settings = Config::load().and_then(|c| c.settings()).context("loading configuration")?;
    let embedder = semdex_embed::from_settings(&settings.embedding)?;
    let limit = args.limit.unwrap_or(settings.search.default_limit);
    let weight = (args.hybrid || args.weight.is_some()).then(|| args.weight.unwrap_or(settings.search.semantic_weight));

    let response = if let [source] = args.sources.as_slice() {
        let schema = SourceSchema::builtin(source).ok_or_else(|| anyhow!("unknown source '{source}'"))?;
        let adapter = SourceAdapter::new(schema, &settings.index_dir, embedder);
        let mut query = SearchQuery::new(&args.query).with_limit(limit);
        query.filters.extend(args.filters);
        match weight {
            Some(w) => adapter.hybrid_search(&query, w).await?,
            None => adapter.semantic_search(&query).await?,
        }
    } else {
        let aggregator = Aggregator::from_schemas(SourceSchema::builtin_sources(), &settings.index_dir, embedder);
        let mut query = UnifiedQuery::new(&args.query).with_sources(args.sources).with_limit(limit);
        query.filters.extend(args.filters);
        if let Some(w) = weight {
            query = query.hybrid(w);
        }
        aggregator.search(&query).await?
    };

    println!("{}", serde_json::to_string_pretty(&response)?);
    Ok(())
}
