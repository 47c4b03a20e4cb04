use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use gpt_image_engine::output_dir::OUTPUT_DIR_ENV;
use gpt_image_engine::{
    ensure_output_dir, ArtifactStore, ClientConfig, ImageTools, InputStager, OpenAiImageClient,
    OutputDirResolver,
};
use rmcp::ServiceExt;
use tokio::signal;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

mod response;
mod server;

use server::ImageServer;

#[derive(Debug, Parser)]
#[command(
    name = "gpt-image-mcp",
    version,
    about = "MCP stdio server for gpt-image-1 generation and editing"
)]
struct Cli {
    /// Directory generated images are written to.
    #[arg(long, env = OUTPUT_DIR_ENV)]
    output_dir: Option<PathBuf>,

    /// Log filter, e.g. `info` or `gpt_image_engine=debug`. Overrides RUST_LOG.
    #[arg(long)]
    log_level: Option<String>,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.log_level.as_deref());

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!("{err:#}");
            eprintln!("gpt-image-mcp: {err:#}");
            ExitCode::FAILURE
        }
    }
}

fn init_tracing(level: Option<&str>) {
    let filter = level
        .and_then(|value| EnvFilter::try_new(value).ok())
        .or_else(|| EnvFilter::try_from_default_env().ok())
        .unwrap_or_else(|| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .init();
}

async fn run(cli: Cli) -> Result<()> {
    let config = ClientConfig::from_env().context("cannot start without an API key")?;

    let resolved = OutputDirResolver::from_env()
        .with_override(cli.output_dir.map(|dir| dir.to_string_lossy().into_owned()))
        .resolve();
    info!("Output directory: {} ({:?})", resolved.path.display(), resolved.source);
    ensure_output_dir(&resolved.path).context("output directory is not writable")?;

    let api = OpenAiImageClient::new(config);
    info!("Using model {}", api.model());
    let tools = ImageTools::new(
        Arc::new(api),
        ArtifactStore::new(&resolved.path),
        InputStager::default(),
    );

    let service = ImageServer::new(tools)
        .serve(rmcp::transport::stdio())
        .await
        .context("failed to start MCP stdio transport")?;
    info!("gpt-image-mcp ready on stdio");

    let cancel = service.cancellation_token();
    tokio::spawn(async move {
        shutdown_signal().await;
        cancel.cancel();
    });

    let reason = service.waiting().await.context("MCP service task failed")?;
    info!("Server stopped: {reason:?}");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = signal::ctrl_c().await {
            warn!("Failed to listen for Ctrl+C: {err}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(err) => {
                warn!("Failed to install SIGTERM handler: {err}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => info!("Received Ctrl+C, shutting down"),
        () = terminate => info!("Received SIGTERM, shutting down"),
    }
}
