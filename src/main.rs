//! orderhook - webhook reliability pipeline for order events.
//!
//! # Commands
//!
//! - `orderhook serve --config <path>` - Run the webhook endpoint and delivery worker
//! - `orderhook serve --no-worker` - Run the webhook endpoint only
//! - `orderhook check-config --config <path>` - Validate settings and exit

use clap::{Args, Parser, Subcommand};
use orderhook::{App, AppResult};
use orderhook_config::Settings;
use orderhook_log::LogConfig;
use std::path::PathBuf;
use std::process::ExitCode;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tracing::{error, info};

/// Webhook reliability pipeline for order events
#[derive(Parser)]
#[command(name = "orderhook")]
#[command(author = "Pegasus Heavy Industries LLC")]
#[command(version)]
#[command(propagate_version = true)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the webhook endpoint and delivery worker
    #[command(alias = "s")]
    Serve(ServeArgs),

    /// Load and validate settings, then exit
    CheckConfig(ConfigArgs),
}

#[derive(Args)]
struct ConfigArgs {
    /// Settings file (.toml or .json)
    #[arg(short, long, env = "ORDERHOOK_CONFIG")]
    config: Option<PathBuf>,
}

#[derive(Args)]
struct ServeArgs {
    #[command(flatten)]
    config: ConfigArgs,

    /// Do not start the delivery worker
    #[arg(long)]
    no_worker: bool,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    let _log_guard = LogConfig::from_env().init();

    let result = match cli.command {
        Commands::Serve(args) => serve(args).await,
        Commands::CheckConfig(args) => check_config(args),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(target: "orderhook::cli", error = %e, "exiting");
            eprintln!("orderhook: {}", e);
            ExitCode::FAILURE
        }
    }
}

fn check_config(args: ConfigArgs) -> AppResult<()> {
    let settings = Settings::load(args.config.as_deref())?;
    info!(
        target: "orderhook::cli",
        port = settings.server.port,
        skip_verification = settings.verifier.skip_verification,
        delivery_url = settings.delivery.url.as_deref().unwrap_or("-"),
        "configuration is valid"
    );
    println!("configuration is valid");
    Ok(())
}

async fn serve(args: ServeArgs) -> AppResult<()> {
    let settings = Settings::load(args.config.config.as_deref())?;
    let listener =
        TcpListener::bind((settings.server.host.as_str(), settings.server.port)).await?;
    let app = App::build(settings)?;

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(target: "orderhook::cli", error = %e, "failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
        info!(target: "orderhook::cli", "shutdown requested");
        let _ = shutdown_tx.send(true);
    });

    app.run(listener, !args.no_worker, shutdown_rx).await?;
    info!(target: "orderhook::cli", "stopped");
    Ok(())
}
