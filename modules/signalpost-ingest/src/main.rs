use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use signalpost_common::Config;
use signalpost_geo::{
    Gazetteer, GazetteerAppendLog, GeocodeCache, LlmLocator, LocationExtractor, NominatimClient,
    Resolver,
};
use signalpost_ingest::{
    source, IngestPipeline, IngestStats, MemoryStore, PgRecordStore, RecordStore,
};

#[derive(Parser)]
#[command(name = "signalpost-ingest", about = "Locate and ingest scraped posts")]
struct Cli {
    /// NDJSON input file, one post per line; stdin when omitted
    #[arg(long)]
    input: Option<PathBuf>,

    /// Run the full pipeline against an in-memory store, writing nothing
    #[arg(long)]
    dry_run: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("signalpost=info".parse()?))
        .init();

    let cli = Cli::parse();
    let config = Config::from_env()?;
    config.log_redacted();

    // Reference data. Names learned in earlier runs live in the append
    // log until merged into the canonical file; fold them in here so they
    // resolve as direct hits this run.
    let mut gazetteer = Gazetteer::load(&config.gazetteer_path, &config.bounds)?;
    gazetteer.merge_append_log(&config.append_log_path)?;
    let gazetteer = Arc::new(gazetteer);
    let cache = GeocodeCache::load(&config.cache_path);

    let mut extractor = LocationExtractor::new(Arc::clone(&gazetteer), config.fuzzy_threshold);
    let mut resolver = Resolver::new(
        Arc::clone(&gazetteer),
        cache,
        config.bounds,
        config.fuzzy_threshold,
        &config.region_query_suffix,
    )
    .with_geocoder(Arc::new(NominatimClient::new(&config.nominatim_base_url)))
    .with_append_log(GazetteerAppendLog::new(&config.append_log_path));

    if let Some(api_key) = &config.llm_api_key {
        let locator = Arc::new(LlmLocator::new(api_key, &config.llm_api_base, &config.llm_model));
        extractor = extractor.with_model(locator.clone());
        resolver = resolver.with_model(locator);
    } else {
        info!("LLM_API_KEY not set, model tiers disabled");
    }

    let store: Arc<dyn RecordStore> = if cli.dry_run {
        info!("Dry run: using in-memory store");
        Arc::new(MemoryStore::new())
    } else {
        let database_url = config
            .database_url
            .as_deref()
            .ok_or_else(|| anyhow::anyhow!("DATABASE_URL required (or pass --dry-run)"))?;
        Arc::new(PgRecordStore::connect(database_url).await?)
    };

    let pipeline = IngestPipeline::new(extractor, resolver, store);

    let posts = match &cli.input {
        Some(path) => source::posts_from_file(path)?,
        None => source::posts_from_stdin()?,
    };
    info!(posts = posts.len(), "Input loaded");

    let mut stats = IngestStats::default();
    for post in &posts {
        match pipeline.process(post).await {
            Ok(outcome) => stats.record(outcome),
            Err(e) => warn!(error = %e, "Failed to ingest post"),
        }
    }

    info!("Ingestion complete. {stats}");
    Ok(())
}
