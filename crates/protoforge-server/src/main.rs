use protoforge_core::{ai_configured, read_settings, ProjectStore};
use protoforge_gen::{from_settings, Pipeline};
use protoforge_server::{
    config::ServerConfig,
    server::{self, state::AppState},
};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize environment and logging
    dotenv::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("protoforge=info,tower_http=info")),
        )
        .with_target(false)
        .with_level(true)
        .compact()
        .init();

    let config = ServerConfig::from_env()?;

    let settings = read_settings();
    if !ai_configured(&settings) {
        warn!(
            provider = %settings.provider,
            "LLM is not configured; generation will use rule-based fallbacks"
        );
    }
    let llm = from_settings(&settings)?;

    std::fs::create_dir_all(&config.public_dir)?;
    let pipeline = Pipeline::new(llm, ProjectStore::new(config.public_dir.clone()));
    info!(
        llm = %pipeline.describe_llm(),
        public_dir = %config.public_dir.display(),
        "starting protoforge server"
    );
    let app = server::create_app(AppState::new(pipeline), &config.cors_origins);

    server::run_server(app, config.addr()).await
}
