use std::process::ExitCode;

use clap::Parser as _;
use tokio::{
    select,
    signal::unix::{SignalKind, signal},
};
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use veilswap_core::config::Config;

use crate::cli::Cli;

mod cli;
mod telemetry;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let config = match Config::load_from(&cli.config) {
        Ok(config) => config,
        Err(err) => {
            eprintln!("failed to read config:\n{err:?}");
            return ExitCode::FAILURE;
        }
    };

    telemetry::init_subscriber(telemetry::get_subscriber());

    let shutdown_token = CancellationToken::new();
    let mut command_jh = tokio::spawn(cli.run(config, shutdown_token.clone()));

    // Set up signal handlers for graceful shutdown
    let mut sigterm = signal(SignalKind::terminate())
        .expect("setting sigterm listener on unix should always work");
    let mut sigint = signal(SignalKind::interrupt())
        .expect("setting sigint listener on unix should always work");

    let exit_reason = select! {
        res = &mut command_jh => {
            return match res {
                Ok(Ok(())) => {
                    info!("command completed");
                    ExitCode::SUCCESS
                }
                Ok(Err(e)) => {
                    error!(error = ?e, "command failed");
                    ExitCode::FAILURE
                }
                Err(e) => {
                    error!(%e, "command panicked");
                    ExitCode::FAILURE
                }
            };
        }
        _ = sigterm.recv() => "received SIGTERM",
        _ = sigint.recv() => "received SIGINT",
    };

    shutdown(exit_reason, shutdown_token, command_jh).await
}

async fn shutdown(
    reason: &str,
    shutdown_token: CancellationToken,
    command_jh: tokio::task::JoinHandle<color_eyre::eyre::Result<()>>,
) -> ExitCode {
    info!(reason, "shutting down");
    shutdown_token.cancel();
    match command_jh.await {
        Ok(Ok(())) => {
            info!("shutdown successful");
            ExitCode::SUCCESS
        }
        Ok(Err(e)) => {
            error!(error = ?e, "command failed during shutdown");
            ExitCode::FAILURE
        }
        Err(e) => {
            error!(%e, "command panicked during shutdown");
            ExitCode::FAILURE
        }
    }
}
