use std::process::ExitCode;

use daq_router::router::{launch, RouterConfig, USAGE};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = match RouterConfig::from_args(std::env::args().skip(1)) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("{}", e);
            eprintln!("{}", USAGE);
            return ExitCode::from(2);
        }
    };

    match launch(config).await {
        Ok(stats) => {
            tracing::info!(
                forwarded = stats.counters.forwarded,
                dropped = stats.counters.dropped,
                "Clean shutdown"
            );
            ExitCode::SUCCESS
        }
        Err(e) => {
            tracing::error!(error = %e, "Router failed to start");
            ExitCode::FAILURE
        }
    }
}
