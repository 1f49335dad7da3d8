use clap::Parser;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use tracing::{error, info};
use zorya_core::{
    install_signal_handler, shutdown_requested, CoreError, Pipeline, PipelineConfig, CONFIG_ENV,
    DEFAULT_CONFIG_FILE,
};

#[derive(Parser)]
#[command(
    name = "zorya-server",
    version,
    about = "HTTP triggers and record API for the Zorya pipeline"
)]
struct Cli {
    /// Path to the pipeline configuration file.
    #[arg(long, env = CONFIG_ENV, default_value = DEFAULT_CONFIG_FILE)]
    config: PathBuf,

    /// Address to listen on.
    #[arg(long, default_value = "127.0.0.1:8000")]
    bind: String,
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_env("ZORYA_LOG")
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    install_signal_handler();

    let pipeline = match PipelineConfig::load(&cli.config).and_then(|c| Pipeline::open(&c)) {
        Ok(p) => p,
        Err(e) => {
            error!("{e}");
            return ExitCode::from(match e {
                CoreError::Config(_) => 2,
                _ => 3,
            });
        }
    };
    let recovered = pipeline.startup_recovery().total();
    if recovered > 0 {
        info!("rolled back {recovered} interrupted stage runs");
    }

    info!("starting zorya-server on {}", cli.bind);
    info!("store directory: {}", pipeline.layout().root().display());

    if let Err(e) = zorya_server::run_server(&Arc::new(pipeline), &cli.bind, shutdown_requested) {
        error!("{e}");
        return ExitCode::from(1);
    }
    info!("stopped");
    ExitCode::SUCCESS
}
