mod config;
mod prompt_loader;

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use realtime_middle_tier::upstream::{AzureCliTokenProvider, Credential, UpstreamConfig, UpstreamConnector};
use realtime_middle_tier::{MiddleTier, SessionPolicy, ToolRegistry};
use secrecy::ExposeSecret;
use tower_http::cors::{Any, CorsLayer};
use tracing_subscriber::fmt::time::ChronoLocal;

use crate::config::{Config, REALTIME_ROUTE};

#[derive(Parser)]
#[command(version, about = "Realtime middle tier between browser clients and Azure OpenAI")]
struct Cli {
    /// Address to listen on; overrides BIND_ADDRESS
    #[arg(long)]
    bind: Option<String>,

    /// Markdown file holding the server instructions; overrides SYSTEM_PROMPT_PATH
    #[arg(long)]
    system_prompt: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    // --- 1. Load Configuration ---
    let config = Config::from_env().context("Failed to load application configuration")?;

    // --- 2. Initialize Logging ---
    tracing_subscriber::fmt()
        .with_max_level(config.log_level)
        .with_timer(ChronoLocal::rfc_3339())
        .init();

    // --- 3. Parse Command-Line Arguments ---
    let args = Cli::parse();
    let bind = args.bind.unwrap_or_else(|| config.bind_address.clone());
    let prompt_path = args
        .system_prompt
        .unwrap_or_else(|| config.system_prompt_path.clone());

    // --- 4. Load the System Prompt ---
    let instructions =
        prompt_loader::load_system_prompt(&prompt_path).context("Failed to load system prompt")?;
    tracing::info!("Loaded system prompt from {}", prompt_path.display());

    // --- 5. Build the Relay ---
    let credential = match &config.api_key {
        Some(key) => {
            tracing::info!("Using API key authentication");
            Credential::static_key(key.expose_secret())
        }
        None => {
            tracing::info!("No API key set, using Azure CLI token authentication");
            Credential::token_provider(AzureCliTokenProvider)
        }
    };
    let upstream = UpstreamConfig::builder(&config.endpoint, &config.deployment)
        .with_api_version(&config.api_version)
        .build();
    let connector = UpstreamConnector::new(upstream, credential);

    let mut policy = SessionPolicy::new()
        .with_instructions(&instructions)
        .with_voice(config.voice.clone())
        .with_turn_detection(config.turn_detection.clone());
    if let Some(temperature) = config.temperature {
        policy = policy.with_temperature(temperature);
    }
    if let Some(max_tokens) = config.max_tokens.clone() {
        policy = policy.with_max_tokens(max_tokens);
    }
    if let Some(disable_audio) = config.disable_audio {
        policy = policy.with_disable_audio(disable_audio);
    }

    let registry = ToolRegistry::empty();
    let middle_tier = MiddleTier::new(connector, policy, registry);

    // --- 6. Serve ---
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);
    let app = middle_tier.router(REALTIME_ROUTE).layer(cors);

    let listener = tokio::net::TcpListener::bind(&bind)
        .await
        .with_context(|| format!("Failed to bind {bind}"))?;
    tracing::info!("Middle tier listening on ws://{}{}", bind, REALTIME_ROUTE);

    axum::serve(listener, app).await?;

    Ok(())
}
