use aerograph::api::{self, app_state::AppState};
use aerograph::config::loader::{ConfigLoader, config_exists};
use aerograph::index::{SnippetIndex, SnippetSearch, create_embedding_model};
use aerograph::observability::{HealthCheckResult, ObservabilityState, init_tracing};
use aerograph::services::{
    EmbeddingComparison, GraphRetrieval, KeywordQueryRewriter, LlmEntityExtractor, LlmIntentClassifier,
    LlmQueryRewriter, ModelProvider, ModelRegistry, Orchestrator, QueryRewriter, TemplateRouter,
    VectorRetrieval,
};
use aerograph::storage::{Neo4jHttpStore, fetch_journeys};
use anyhow::Context;
use std::sync::Arc;
use std::time::Instant;
use tracing::{info, warn};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = ConfigLoader::load().context("failed to load configuration")?;
    ConfigLoader::validate(&config).context("invalid configuration")?;
    let _log_guard = init_tracing(&config.logging).context("failed to initialize logging")?;

    if !config_exists() {
        info!("No aerograph.toml found, using defaults and environment");
    }
    info!("Starting {} ({})", config.app_name, config.environment);

    let store = Arc::new(Neo4jHttpStore::new(&config.graph)?);
    let embedder = create_embedding_model(&config.embedding)?;
    info!(
        "Embedding model initialized: {} (backend: {})",
        embedder.name(),
        config.embedding.backend
    );

    // 离线构建片段语料（含对比语料）后退出
    if std::env::var("AEROGRAPH_BUILD_INDEX").is_ok() {
        info!("Building snippet corpora from graph...");
        let records = fetch_journeys(store.as_ref()).await?;

        let mut targets = vec![(config.vector.corpus_path.clone(), embedder)];
        for corpus in &config.vector.comparison {
            let embedder = create_embedding_model(&corpus.embedding(&config.embedding))?;
            targets.push((corpus.corpus_path.clone(), embedder));
        }

        for (path, embedder) in targets {
            let model = embedder.name().to_string();
            let index = SnippetIndex::build(&records, embedder).await?;
            index
                .save(&path)
                .with_context(|| format!("failed to write {}", path.display()))?;
            info!(
                "Snippet corpus ({}) with {} entries written to {}",
                model,
                index.len(),
                path.display()
            );
        }
        return Ok(());
    }

    let observability = Arc::new(ObservabilityState::new(env!("CARGO_PKG_VERSION").to_string()));

    let registry = ModelRegistry::from_config(&config.llm)?;
    info!("Answer models available: {:?}", registry.available_models());
    let nlu_model = registry
        .model(&config.llm.nlu_model)
        .context("intent and entity model is not configured")?;
    let models: Arc<dyn ModelProvider> = Arc::new(registry);

    let rewriter: Arc<dyn QueryRewriter> = match config.vector.rewriter.as_str() {
        "llm" => Arc::new(LlmQueryRewriter::new(nlu_model.clone())),
        _ => Arc::new(KeywordQueryRewriter::new()),
    };

    let started = Instant::now();
    let snippet_index: Option<Arc<dyn SnippetSearch>> =
        match SnippetIndex::load(&config.vector.corpus_path, embedder) {
            Ok(index) => {
                info!("Snippet index loaded with {} entries", index.len());
                Some(Arc::new(index))
            }
            Err(e) => {
                warn!("Snippet index unavailable, vector retrieval will degrade: {}", e);
                None
            }
        };
    observability
        .add_health_check(HealthCheckResult {
            name: "snippet_index".to_string(),
            healthy: snippet_index.is_some(),
            message: config.vector.corpus_path.display().to_string(),
            latency_ms: started.elapsed().as_millis() as u64,
        })
        .await;

    let mut comparison = EmbeddingComparison::new();
    for corpus in &config.vector.comparison {
        let loaded = create_embedding_model(&corpus.embedding(&config.embedding))
            .and_then(|embedder| SnippetIndex::load(&corpus.corpus_path, embedder));
        match loaded {
            Ok(index) => comparison = comparison.with_candidate(&corpus.label, Arc::new(index)),
            Err(e) => warn!("Comparison corpus {} unavailable: {}", corpus.label, e),
        }
    }
    if !comparison.is_empty() {
        info!("Embedding comparison corpora: {:?}", comparison.models());
    }

    let started = Instant::now();
    let graph_check = store.verify_connectivity().await;
    if let Err(e) = &graph_check {
        warn!("Neo4j is not reachable, graph retrieval will degrade: {}", e);
    }
    observability
        .add_health_check(HealthCheckResult {
            name: "neo4j".to_string(),
            healthy: graph_check.is_ok(),
            message: graph_check
                .err()
                .map(|e| e.to_string())
                .unwrap_or_else(|| config.graph.url.clone()),
            latency_ms: started.elapsed().as_millis() as u64,
        })
        .await;

    let orchestrator = Orchestrator::new(
        Arc::new(LlmIntentClassifier::new(nlu_model.clone())),
        Arc::new(LlmEntityExtractor::new(nlu_model)),
        TemplateRouter::new(config.routing.clone()),
        GraphRetrieval::new(store),
        VectorRetrieval::new(rewriter, snippet_index).with_top_k(config.vector.top_k),
        models,
    )
    .with_metrics(observability.metrics.clone());
    info!("Orchestrator initialized");

    let app_state = AppState::new(orchestrator, config.llm.default_model.clone(), observability)
        .with_comparison(comparison);
    let router = api::create_router(app_state);

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {}", addr))?;
    info!("Server listening on {}", addr);

    axum::serve(listener, router).await?;

    Ok(())
}
