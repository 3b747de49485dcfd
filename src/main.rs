//! deepclaude server binary entry point.

use std::net::SocketAddr;
use std::path::PathBuf;

use clap::Parser;
use deepclaude::config::Config;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "deepclaude", about = "Reasoning + answer model stream stitcher")]
struct Cli {
    /// Optional TOML config file, applied before environment variables
    #[arg(long, env = "DEEPCLAUDE_CONFIG")]
    config: Option<PathBuf>,

    /// Address to listen on (overrides LISTEN_ADDR)
    #[arg(long)]
    listen: Option<SocketAddr>,

    /// Log level or filter directive (overrides LOG_LEVEL; RUST_LOG wins over both)
    #[arg(long)]
    log_level: Option<String>,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let mut config = match Config::load(cli.config.as_deref()) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Error: failed to load config: {e}");
            std::process::exit(1);
        }
    };
    if let Some(addr) = cli.listen {
        config.listen_addr = addr;
    }
    if let Some(level) = cli.log_level {
        config.log_level = level;
    }

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level)),
        )
        .with_target(false)
        .init();

    if let Err(e) = config.validate() {
        tracing::error!("invalid config: {e}");
        std::process::exit(1);
    }

    tracing::info!(
        reasoning_model = %config.reasoning_model,
        answer_model = %config.answer_model,
        model_name = %config.model_name,
        auth = config.requires_auth(),
        "config loaded"
    );

    if let Err(e) = deepclaude::server::serve(config).await {
        tracing::error!("server error: {e}");
        std::process::exit(1);
    }
}
