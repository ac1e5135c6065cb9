use anyhow::{bail, Result};
use clap::Parser;
use cordex::{create_router, Engine, EngineConfig};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

#[derive(Parser)]
#[command(name = "cordex")]
#[command(about = "BM25 search engine for a CORD-19 style corpus", long_about = None)]
struct Args {
    /// Index directory (manifest.bin, segments/, metadata.csv)
    #[arg(long, env = "CORDEX_INDEX_DIR")]
    index_dir: PathBuf,

    /// Listen address for the HTTP API
    #[arg(long, env = "CORDEX_LISTEN", default_value = "0.0.0.0:8080")]
    listen: String,

    /// Embedding file path (overrides EMBEDDINGS_PATH and the
    /// conventional filenames in the index directory)
    #[arg(long, env = "CORDEX_EMBEDDINGS")]
    embeddings: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    let args = Args::parse();

    info!("Starting cordex v{}", cordex::VERSION);
    info!("  Index directory: {:?}", args.index_dir);
    info!("  Listen address: {}", args.listen);

    let mut config = EngineConfig::new(&args.index_dir);
    if let Some(path) = &args.embeddings {
        config = config.with_embeddings_path(path);
    }

    let engine = Arc::new(Engine::new(config));
    if !engine.reload() {
        bail!(
            "failed to load index segments from {}",
            args.index_dir.display()
        );
    }
    info!(segments = engine.segment_count(), "initial index loaded");

    let app = create_router(engine);
    let listener = tokio::net::TcpListener::bind(&args.listen).await?;
    info!("API running on http://{}", args.listen);
    info!("Try: /search?q=mycoplasma+pneumonia&k=10");

    axum::serve(listener, app).await?;
    Ok(())
}
