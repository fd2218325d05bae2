//! Supervisor entry point.

use clap::Parser;
use tracing_subscriber::EnvFilter;

use capture_fusion::config::AppConfig;
use capture_fusion::supervisor;

#[derive(Parser, Debug)]
#[command(name = "capture_fusion", about = "Multi-camera capture-and-fusion service")]
struct Cli {
    /// Path to a TOML config file (without extension), e.g. "config" for
    /// "config.toml" in the working directory.
    #[arg(long)]
    config: Option<String>,
}

#[tokio::main]
async fn main() -> std::process::ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();
    let config = match AppConfig::load(cli.config.as_deref()) {
        Ok(cfg) => cfg,
        Err(e) => {
            tracing::error!(error = %e, "failed to load configuration");
            return std::process::ExitCode::FAILURE;
        }
    };

    match supervisor::run(config).await {
        Ok(()) => std::process::ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = ?e, "supervisor exited with an error");
            std::process::ExitCode::FAILURE
        }
    }
}
