mod commands;

use clap::{Parser, Subcommand};
use clap_complete::Shell;
use commands::{EXIT_CONFIG_ERROR, EXIT_FAILURE, EXIT_STORE_ERROR};
use std::path::PathBuf;
use std::process::ExitCode;
use zorya_core::{install_signal_handler, CONFIG_ENV, DEFAULT_CONFIG_FILE};
use zorya_schema::{BagStatus, Stage};

#[derive(Debug, Parser)]
#[command(
    name = "zorya",
    version,
    about = "Crash-safe staged pipeline for digital preservation packages"
)]
struct Cli {
    /// Path to the pipeline configuration file.
    #[arg(long, global = true, env = CONFIG_ENV, default_value = DEFAULT_CONFIG_FILE)]
    config: PathBuf,

    /// Output results as structured JSON.
    #[arg(long, default_value_t = false, global = true)]
    json: bool,

    /// Enable verbose (debug) logging output.
    #[arg(short, long, default_value_t = false, global = true)]
    verbose: bool,

    /// Enable trace-level logging (more detailed than --verbose).
    #[arg(long, default_value_t = false, global = true)]
    trace: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Run one stage once: claim at most one eligible bag and move it on.
    Run {
        /// fetch, discover, rights, package, archive or deliver.
        stage: Stage,
    },
    /// List bag records, oldest first.
    List {
        /// Only show bags in this status.
        #[arg(long)]
        status: Option<BagStatus>,
    },
    /// Show a single bag record.
    Inspect {
        /// Bag identifier.
        id: String,
    },
    /// Roll back interrupted stage runs.
    Recover,
    /// Verify record checksums and report outstanding claims.
    VerifyStore,
    /// Remove scratch data no record accounts for.
    Prune {
        /// Only report what would be removed.
        #[arg(long, default_value_t = false)]
        dry_run: bool,
    },
    /// Generate shell completions for bash, zsh, fish, elvish, or powershell.
    Completions {
        /// Shell to generate completions for.
        shell: Shell,
    },
}

fn main() -> ExitCode {
    let default_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |info| {
        let msg = info.to_string();
        if msg.contains("Broken pipe")
            || msg.contains("broken pipe")
            || msg.contains("os error 32")
            || msg.contains("failed printing to stdout")
        {
            std::process::exit(0);
        }
        default_hook(info);
    }));

    let cli = Cli::parse();

    let default_level = if cli.trace {
        "trace"
    } else if cli.verbose {
        "debug"
    } else {
        "warn"
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_env("ZORYA_LOG")
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level)),
        )
        .with_target(false)
        .without_time()
        .with_writer(std::io::stderr)
        .init();

    install_signal_handler();

    let json_output = cli.json;
    let config = &cli.config;

    let result = match cli.command {
        Commands::Run { stage } => commands::run::run(config, stage, json_output),
        Commands::List { status } => commands::list::run(config, status, json_output),
        Commands::Inspect { id } => commands::inspect::run(config, &id, json_output),
        Commands::Recover => commands::recover::run(config, json_output),
        Commands::VerifyStore => commands::verify_store::run(config, json_output),
        Commands::Prune { dry_run } => commands::prune::run(config, dry_run, json_output),
        Commands::Completions { shell } => commands::completions::run::<Cli>(shell),
    };

    match result {
        Ok(code) => ExitCode::from(code),
        Err(msg) => {
            eprintln!("error: {msg}");
            let code = if msg.starts_with("configuration error:") {
                EXIT_CONFIG_ERROR
            } else if msg.starts_with("store error:") || msg.starts_with("store lock:") {
                EXIT_STORE_ERROR
            } else {
                EXIT_FAILURE
            };
            ExitCode::from(code)
        }
    }
}
