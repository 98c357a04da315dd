use tracing_subscriber::{EnvFilter, fmt};
use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // .env first so RUST_LOG from it applies to the filter
    let _ = dotenvy::dotenv();

    // Init logging
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new("info"))?;
    fmt().with_env_filter(filter).init();

    let config = idaas::config::Config::from_env();

    // Startup banner at info level so something always prints at default verbosity
    let rust_log = std::env::var("RUST_LOG").unwrap_or_else(|_| "<unset>".to_string());
    info!(
        target: "idaas",
        "IDaaS starting: RUST_LOG='{}', bind={}, http_port={}, admin_email='{}', session_ttl_secs={}, policy_template={:?}",
        rust_log, config.bind, config.http_port, config.admin_email, config.session_ttl.as_secs(), config.policy_template
    );

    idaas::server::run_with_config(config).await
}
