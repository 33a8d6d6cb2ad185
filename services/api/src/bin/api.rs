//! services/api/src/bin/api.rs

use api_lib::{
    adapters::{
        gemini::DEFAULT_BASE_URL, provision_buckets, DbAdapter, GeminiAdapter, GeminiConfig,
        OpenAiGenerationAdapter, S3ContentStore,
    },
    config::{Config, GenerationProvider},
    error::ApiError,
    web::{router, rest::ApiDoc, state::AppState},
};
use async_openai::{config::OpenAIConfig, Client};
use axum::{
    extract::DefaultBodyLimit,
    http::{HeaderValue, Method},
    Router,
};
use pdf_assistant_core::ports::GenerationService;
use sqlx::postgres::PgPoolOptions;
use std::sync::Arc;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

fn generation_backend(config: &Config) -> Result<Arc<dyn GenerationService>, ApiError> {
    match config.provider {
        GenerationProvider::Gemini => {
            let adapter = GeminiAdapter::new(GeminiConfig {
                api_key: config.generation_api_key.clone(),
                model: config.generation_model.clone(),
                base_url: config
                    .generation_base_url
                    .clone()
                    .unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
                timeout: config.generation_timeout,
            })
            .map_err(|e| ApiError::Internal(format!("Failed to build the Gemini client: {}", e)))?;
            Ok(Arc::new(adapter))
        }
        GenerationProvider::OpenAi => {
            let mut openai_config = OpenAIConfig::new().with_api_key(&config.generation_api_key);
            if let Some(base_url) = &config.generation_base_url {
                openai_config = openai_config.with_api_base(base_url);
            }
            Ok(Arc::new(OpenAiGenerationAdapter::new(
                Client::with_config(openai_config),
                config.generation_model.clone(),
                config.generation_timeout,
            )))
        }
    }
}

fn cors_layer(origin: &str) -> Result<CorsLayer, ApiError> {
    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers(Any);
    if origin == "*" {
        return Ok(cors.allow_origin(Any));
    }
    let origin = origin
        .parse::<HeaderValue>()
        .map_err(|e| ApiError::Internal(format!("Invalid CORS origin '{}': {}", origin, e)))?;
    Ok(cors.allow_origin(origin))
}

#[tokio::main]
async fn main() -> Result<(), ApiError> {
    // --- 1. Load Configuration & Set Up Logging ---
    let config = Config::from_env()?;
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(config.log_level.to_string()))
        .with(tracing_subscriber::fmt::layer())
        .init();
    info!("Configuration loaded. Starting server...");

    // --- 2. Connect to Database & Run Migrations ---
    info!("Connecting to database...");
    let db_pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(&config.database_url)
        .await?;
    let db_adapter = Arc::new(DbAdapter::new(db_pool));
    info!("Running database migrations...");
    db_adapter.run_migrations().await?;
    info!("Database migrations complete.");

    // --- 3. Initialize Service Adapters ---
    let store = Arc::new(S3ContentStore::new(&config.storage));
    provision_buckets(
        store.as_ref(),
        &[config.pdf_bucket.as_str(), config.image_bucket.as_str()],
    )
    .await;
    let generator = generation_backend(&config)?;
    info!(
        "Generation backend: {:?} ({})",
        config.provider, config.generation_model
    );

    // --- 4. Build the Shared AppState ---
    let app_state = Arc::new(AppState::new(&config, db_adapter, store, generator));

    // --- 5. Create the Web Router ---
    let api_router = router(app_state)
        .layer(DefaultBodyLimit::max(config.max_upload_bytes))
        .layer(cors_layer(&config.cors_origin)?)
        .layer(TraceLayer::new_for_http());

    let app = Router::new()
        .merge(api_router)
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()));

    // --- 6. Start the Server ---
    info!("Starting server on {}", config.bind_address);
    info!(
        "Swagger UI available at http://{}/swagger-ui",
        config.bind_address
    );
    let listener = tokio::net::TcpListener::bind(config.bind_address).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
