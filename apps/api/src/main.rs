mod compliance;
mod config;
mod embedding;
mod errors;
mod generation;
mod index;
mod llm_client;
mod matching;
mod models;
mod routes;
mod state;

use anyhow::Result;
use std::net::SocketAddr;
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::compliance::{ComplianceValidator, PdfLatexCompiler};
use crate::config::Config;
use crate::embedding::{create_backend, Embedder};
use crate::generation::{GenerationController, LlmDocumentGenerator};
use crate::index::VectorIndex;
use crate::llm_client::LlmClient;
use crate::matching::{MatchEngine, SkillRanker};
use crate::routes::build_router;
use crate::state::AppState;

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration first (fails on missing required env vars)
    let config = Config::from_env()?;

    // Initialize structured logging
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!("{}={}", env!("CARGO_PKG_NAME"), &config.rust_log))
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting reZume API v{}", env!("CARGO_PKG_VERSION"));

    // Embeddings: backend picked once, wrapped with timeout + degrade
    let backend = create_backend(&config.embedding);
    info!(
        "Embedding backend initialized (model: {}, dims: {})",
        backend.model_name(),
        backend.dims()
    );
    let embedder = Arc::new(Embedder::new(backend, config.embedding.timeout));

    // Per-scope vector index
    let embeddings_dir = config.paths.embeddings_dir();
    tokio::fs::create_dir_all(&embeddings_dir).await?;
    let index = Arc::new(VectorIndex::new(embeddings_dir.clone(), embedder.clone()));
    info!("Vector index root: {}", embeddings_dir.display());

    let matcher = Arc::new(MatchEngine::new(
        index.clone(),
        config.matching.clone(),
        config.scoring.clone(),
    ));
    let skill_ranker = Arc::new(SkillRanker::new(embedder));

    // Generation: LLM + compiler → validator → controller
    let llm = Arc::new(LlmClient::new(config.anthropic_api_key.clone())?);
    info!("LLM client initialized (model: {})", llm_client::MODEL);

    let compiler = Arc::new(PdfLatexCompiler::new(
        config.compiler.binary.clone(),
        config.compiler.timeout,
    ));
    tokio::fs::create_dir_all(&config.paths.output_dir).await?;
    let generator = Arc::new(LlmDocumentGenerator::new(
        llm,
        compiler.clone(),
        config.paths.templates_dir.clone(),
        config.paths.output_dir.clone(),
    ));
    let validator = Arc::new(ComplianceValidator::new(compiler));
    let generation = Arc::new(GenerationController::new(
        generator,
        validator,
        config.generation.max_retries,
    ));
    info!(
        "Generation controller initialized (compiler: {}, max retries: {})",
        config.compiler.binary, config.generation.max_retries
    );

    // Build app state
    let state = AppState {
        config: config.clone(),
        index,
        matcher,
        skill_ranker,
        generation,
    };

    // Build router
    let app = build_router(state).layer(
        ServiceBuilder::new()
            .layer(TraceLayer::new_for_http())
            .layer(CorsLayer::permissive()), // TODO: restrict origins once the web client's domain is fixed
    );

    let addr: SocketAddr = format!("0.0.0.0:{}", config.port).parse()?;
    info!("Listening on {addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
