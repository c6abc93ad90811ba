mod analysis;
mod auth;
mod config;
mod errors;
mod llm_client;
mod routes;
mod state;

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::analysis::prompt_builder::PromptBuilder;
use crate::analysis::Analyzer;
use crate::auth::{AssertionSigner, CredentialCache, HttpTokenExchanger, ServiceAccountKey};
use crate::config::Config;
use crate::llm_client::{CompletionClient, CompletionSettings};
use crate::routes::build_router;
use crate::state::AppState;

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration first (fails on a missing model URI or malformed numbers)
    let config = Config::from_env()?;

    // Initialize structured logging
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!(
                "{}={}",
                env!("CARGO_PKG_NAME").replace('-', "_"),
                &config.rust_log
            ))
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Day Analysis API v{}", env!("CARGO_PKG_VERSION"));

    // Service-account key and assertion signer
    let key = ServiceAccountKey::from_file(&config.sa_key_file)
        .with_context(|| format!("Cannot load service-account key {:?}", config.sa_key_file))?;
    let signer = AssertionSigner::new(&key).context("Service-account private key is unusable")?;
    info!("Assertion signer ready (key id: {})", signer.key_id());

    // One HTTP client for both the token exchange and completion calls
    let http = reqwest::Client::builder()
        .timeout(Duration::from_secs(config.http_timeout_secs))
        .build()
        .context("Failed to build HTTP client")?;

    let exchanger = Arc::new(HttpTokenExchanger::new(http.clone(), &config.iam_token_url));
    info!("Token exchange endpoint: {}", exchanger.url());
    let credentials = Arc::new(CredentialCache::new(
        signer,
        &config.iam_token_url,
        exchanger,
    ));

    let completion = Arc::new(CompletionClient::new(
        http,
        CompletionSettings {
            endpoint: config.ai_api_url.clone(),
            model_uri: config.model_uri.clone(),
            temperature: config.temperature,
            max_tokens: config.max_tokens,
            folder_id: config.folder_id.clone(),
            max_retries: config.max_retries,
        },
    )
    .with_retry_backoff(Duration::from_millis(config.retry_backoff_ms)));
    info!("Completion client initialized (model: {})", completion.model_uri());

    let prompts = PromptBuilder::new(
        config.system_prompt.clone(),
        config.user_prompt_template.clone(),
    );

    // Build app state
    let state = AppState {
        analyzer: Arc::new(Analyzer::new(prompts, credentials, completion)),
    };

    // Build router
    let app = build_router(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    let addr: SocketAddr = format!("0.0.0.0:{}", config.port).parse()?;
    info!("Listening on {addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
