use std::sync::Arc;

use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

use caredesk::config::AppConfig;
use caredesk::handlers;
use caredesk::services::ai::embedding::{EmbeddingProvider, OllamaEmbeddings, OpenAiEmbeddings};
use caredesk::services::ai::groq::GroqProvider;
use caredesk::services::ai::ollama::OllamaProvider;
use caredesk::services::ai::LlmProvider;
use caredesk::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let config = AppConfig::from_env();

    let llm: Box<dyn LlmProvider> = match config.llm_provider.as_str() {
        "groq" => {
            anyhow::ensure!(
                !config.groq_api_key.is_empty(),
                "GROQ_API_KEY must be set when LLM_PROVIDER=groq"
            );
            tracing::info!("using Groq LLM provider (model: {})", config.groq_model);
            Box::new(GroqProvider::new(
                config.groq_api_key.clone(),
                config.groq_model.clone(),
            ))
        }
        _ => {
            tracing::info!("using Ollama LLM provider (url: {})", config.ollama_url);
            Box::new(OllamaProvider::new(
                config.ollama_url.clone(),
                config.ollama_model.clone(),
            ))
        }
    };

    let embeddings: Box<dyn EmbeddingProvider> = match config.embedding_provider.as_str() {
        "openai" => {
            anyhow::ensure!(
                !config.openai_api_key.is_empty(),
                "OPENAI_API_KEY must be set when EMBEDDING_PROVIDER=openai"
            );
            tracing::info!(
                "using OpenAI embeddings (model: {})",
                config.openai_embedding_model
            );
            Box::new(OpenAiEmbeddings::new(
                config.openai_base_url.clone(),
                config.openai_api_key.clone(),
                config.openai_embedding_model.clone(),
            ))
        }
        _ => {
            tracing::info!(
                "using Ollama embeddings (model: {})",
                config.ollama_embedding_model
            );
            Box::new(OllamaEmbeddings::new(
                config.ollama_url.clone(),
                config.ollama_embedding_model.clone(),
            ))
        }
    };

    let state = Arc::new(AppState::new(config.clone(), llm, embeddings));

    let app = Router::new()
        .route("/health", get(handlers::health::health))
        .route("/api/assistant", post(handlers::assistant::run_assistant))
        .route("/api/slots", get(handlers::admin::get_slots))
        .route(
            "/api/patients/:name/memory",
            get(handlers::admin::get_patient_memory),
        )
        .route("/api/logs", get(handlers::admin::get_logs))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state);

    let addr = format!("0.0.0.0:{}", config.port);
    tracing::info!("starting server on {addr}");

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
