use anyhow::Context;
use clap::Parser;
use dotenv::dotenv;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;

use rfp_rag::config::{AppConfig, PipelineTimings};
use rfp_rag::database::{MemoryVectorDB, VectorDB, VectorIndex};
use rfp_rag::document::PdfExtractor;
use rfp_rag::llm::OpenAIEmbedder;
use rfp_rag::providers::OpenAIProvider;
use rfp_rag::{api, ApiLimits, AppState, Services};

#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
struct Args {
    #[arg(long, env = "RFP_HOST", default_value = "0.0.0.0")]
    host: String,

    #[arg(long, env = "PORT", default_value = "3000")]
    port: u16,

    /// Keep vectors in process memory instead of the index service
    #[arg(long)]
    memory_index: bool,

    #[arg(long, env = "RFP_MAX_UPLOAD_MB", default_value = "25")]
    max_upload_mb: usize,

    #[arg(long, env = "RFP_MAX_CONCURRENT", default_value = "64")]
    max_concurrent: usize,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    let mut config = AppConfig::from_env();

    if config.openai.api_key.is_none() {
        log::warn!("OPENAI_API_KEY is not set; upload, analyze and chat requests will fail");
    }

    let backend: Arc<dyn VectorIndex> = if args.memory_index {
        log::info!("Using in-memory vector index");
        config.timings = PipelineTimings::immediate();
        Arc::new(MemoryVectorDB::new())
    } else {
        let db = VectorDB::new(&config.index)
            .await
            .with_context(|| format!("Failed to connect to vector index at {}", config.index.url))?;
        Arc::new(db)
    };

    let services = Services {
        backend,
        embedder: Arc::new(OpenAIEmbedder::new(&config.openai)),
        completion: Arc::new(OpenAIProvider::new(&config.openai)),
        extractor: Arc::new(PdfExtractor::new()),
    };
    let state = AppState::new(&config, services);

    let limits = ApiLimits {
        max_upload_bytes: args.max_upload_mb.max(1) * 1024 * 1024,
        max_concurrent: args.max_concurrent,
    };
    let app = api::create_api(state, limits);

    let addr: SocketAddr = format!("{}:{}", args.host, args.port)
        .parse()
        .context("Failed to parse address")?;
    log::info!("Starting API server on {}", addr);

    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    axum::serve(listener, app).await.context("Server error")?;

    Ok(())
}
