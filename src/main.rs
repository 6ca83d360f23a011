use crate::config::{LogFormat, ServerConfig};
use crate::server::{create_server, run_server};
use clap::Parser;
use tracing_subscriber::EnvFilter;

pub mod cache;
pub mod config;
pub mod handlers;
pub mod llm;
pub mod prompts;
pub mod research;
pub mod search;
pub mod server;
pub mod utils;
pub mod webpage_parse;

const DEFAULT_LOG_FILTER: &str = "info,rocket=warn";

fn init_tracing(format: LogFormat) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true);
    match format {
        LogFormat::Pretty => subscriber.init(),
        LogFormat::Json => subscriber.json().init(),
    }
}

#[rocket::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = ServerConfig::parse();
    init_tracing(config.log_format);
    tracing::info!(
        port = config.port,
        searx = %config.searx_url(),
        max_depth = config.max_depth,
        max_breadth = config.max_breadth,
        "starting research server"
    );

    let rocket = create_server(&config)?;
    run_server(rocket).await?;
    Ok(())
}
