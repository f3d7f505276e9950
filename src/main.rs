//! Binary entry point: parse arguments, stand up the engine, wait for a
//! shutdown signal.

use std::sync::Arc;

use clap::Parser;
use tokio::signal::unix::{SignalKind, signal};

use dchat::cli::Cli;
use dchat::engine::Engine;
use dchat::input;
use dchat::output::StdoutSink;
use dchat::transport::LoopbackTransport;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let config = Cli::parse().into_config()?;
    tracing::info!(
        onion_id = %config.identity.onion_id,
        port = config.identity.listening_port,
        nickname = %config.nickname,
        "starting dchat"
    );

    let engine = Engine::new(config, Arc::new(LoopbackTransport), Arc::new(StdoutSink)).await?;
    let shutdown = engine.shutdown_handle();

    let input_rx = input::spawn(32);
    let run = tokio::spawn(engine.run(input_rx));

    // SIGQUIT has no tokio-portable equivalent outside Unix; the original
    // source treats SIGHUP/SIGINT/SIGQUIT/SIGTERM identically (clean
    // shutdown), so we register all four and race them.
    let mut sighup = signal(SignalKind::hangup())?;
    let mut sigint = signal(SignalKind::interrupt())?;
    let mut sigquit = signal(SignalKind::quit())?;
    let mut sigterm = signal(SignalKind::terminate())?;

    tokio::select! {
        _ = sighup.recv() => tracing::info!("received SIGHUP, shutting down"),
        _ = sigint.recv() => tracing::info!("received SIGINT, shutting down"),
        _ = sigquit.recv() => tracing::info!("received SIGQUIT, shutting down"),
        _ = sigterm.recv() => tracing::info!("received SIGTERM, shutting down"),
    }

    let _ = shutdown.send(true);
    run.await??;
    Ok(())
}
