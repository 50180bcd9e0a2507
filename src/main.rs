use std::path::PathBuf;

use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use diffbase_zenoh_runtime::config::{BaseConfig, LOOP_HZ};

/// Differential-drive base runtime
#[derive(Debug, Parser)]
#[command(version, about)]
struct Args {
    /// JSON calibration file (defaults are used when omitted)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Control loop rate in Hz
    #[arg(long, default_value_t = LOOP_HZ)]
    loop_hz: u64,
}

#[tokio::main]
async fn main() {
    // Setup logging (set RUST_LOG=info or debug)
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("info".parse().unwrap()))
        .init(); // installs the subscriber globally

    let args = Args::parse();

    let config = match &args.config {
        Some(path) => {
            info!("Loading config from {}", path.display());
            match BaseConfig::load(path) {
                Ok(config) => config,
                Err(e) => {
                    eprintln!("Config error: {}", e);
                    std::process::exit(2);
                }
            }
        }
        None => BaseConfig::default(),
    };

    if let Err(e) = diffbase_zenoh_runtime::runtime::run(config, args.loop_hz).await {
        eprintln!("Runtime error: {}", e);
        std::process::exit(1);
    }
}
